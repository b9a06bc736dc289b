use std::collections::BTreeSet;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Backend user identifier (opaque string, e.g. `user_1a2b3c4d5e6f`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Subscription tier, ordered `Free < Pro < Premium`.
///
/// Decoding never fails: a missing, null or unrecognised plan is `Free`,
/// the lowest rank.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "Option<String>", into = "String")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Premium,
}

impl Plan {
    /// Position in the plan hierarchy (`free=0, pro=1, premium=2`).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Pro => 1,
            Self::Premium => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }

    /// Lenient parse used for wire values.
    #[must_use]
    pub fn from_wire(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some(p) if p.eq_ignore_ascii_case("pro") => Self::Pro,
            Some(p) if p.eq_ignore_ascii_case("premium") => Self::Premium,
            _ => Self::Free,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Option<String>> for Plan {
    fn from(s: Option<String>) -> Self {
        Self::from_wire(s.as_deref())
    }
}

impl From<Plan> for String {
    fn from(p: Plan) -> Self {
        p.as_str().to_owned()
    }
}

/// Dashboard capability gated by plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Feature {
    ContentAnalysis,
    DashboardOverview,
    GrowthPlan,
    CompetitorIntelligence,
    AdvancedGrowth,
    UnlimitedAnalysis,
    TeamFeatures,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::ContentAnalysis,
        Feature::DashboardOverview,
        Feature::GrowthPlan,
        Feature::CompetitorIntelligence,
        Feature::AdvancedGrowth,
        Feature::UnlimitedAnalysis,
        Feature::TeamFeatures,
    ];

    /// Lowest plan that unlocks this feature.
    #[must_use]
    pub const fn required_plan(self) -> Plan {
        match self {
            Self::ContentAnalysis | Self::DashboardOverview | Self::GrowthPlan => Plan::Free,
            Self::CompetitorIntelligence | Self::AdvancedGrowth => Plan::Pro,
            Self::UnlimitedAnalysis | Self::TeamFeatures => Plan::Premium,
        }
    }
}

/// Signed-in user as reported by `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct User {
    #[serde(rename = "user_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub picture: Option<String>,
    #[serde(default)]
    pub plan: Plan,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            picture: None,
            plan: Plan::Free,
        }
    }

    #[must_use]
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = plan;
        self
    }

    #[must_use]
    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }

    /// Features unlocked by the user's plan.
    #[must_use]
    pub fn entitlements(&self) -> BTreeSet<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|f| self.can_use(*f))
            .collect()
    }

    #[must_use]
    pub fn can_use(&self, feature: Feature) -> bool {
        crate::plan::has_access(Some(self.plan), feature.required_plan())
    }
}

// The backend sends `"picture": ""` for accounts without an avatar.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
