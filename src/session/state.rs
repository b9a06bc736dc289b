use crate::plan;
use crate::types::{Plan, User};

/// Authentication state of the current visitor.
///
/// A user record exists exactly when the session is authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    /// Not yet checked against the backend.
    #[default]
    Unknown,
    Authenticated(User),
    Unauthenticated,
}

impl Session {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Plan gate against the current user; signed-out visitors rank lowest.
    #[must_use]
    pub fn has_access(&self, required: Plan) -> bool {
        plan::has_access(self.user().map(|u| u.plan), required)
    }

    /// What observers render.
    #[must_use]
    pub fn view(&self) -> SessionView {
        match self {
            Self::Unknown => SessionView::Loading,
            Self::Authenticated(user) => SessionView::SignedIn(user.clone()),
            Self::Unauthenticated => SessionView::SignedOut,
        }
    }
}

impl From<Option<User>> for Session {
    fn from(user: Option<User>) -> Self {
        match user {
            Some(user) => Self::Authenticated(user),
            None => Self::Unauthenticated,
        }
    }
}

/// Render-facing projection of [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionView {
    Loading,
    SignedIn(User),
    SignedOut,
}
