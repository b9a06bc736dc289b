use derive_more::From;
use serde::Serialize;
use url::Url;

use crate::error::Error;

/// Fragment key the identity provider uses for the exchange token.
const SESSION_ID_KEY: &str = "session_id";

/// One-time token issued by the identity provider, redeemed at
/// `POST /api/auth/session`.
///
/// Never persisted. No `Display`, so it stays out of logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, From)]
#[serde(transparent)]
pub struct ExchangeToken(String);

impl ExchangeToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// OAuth callback state extracted from the navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOAuthExchange {
    /// Usable exchange token.
    Token(ExchangeToken),
    /// The fragment announced a callback but carried no usable token.
    Missing,
}

impl PendingOAuthExchange {
    /// Inspect the fragment of `location` for a provider callback.
    ///
    /// Only the fragment is read; a `session_id` query parameter is not a
    /// callback. Returns `None` when the fragment does not mention
    /// `session_id=` at all.
    #[must_use]
    pub fn from_location(location: &Url) -> Option<Self> {
        Self::from_fragment(location.fragment()?)
    }

    /// Same as [`from_location`](Self::from_location) for a raw fragment
    /// (with or without the leading `#`).
    #[must_use]
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        if !fragment.contains("session_id=") {
            return None;
        }

        let token = url::form_urlencoded::parse(fragment.as_bytes())
            .find(|(key, _)| key == SESSION_ID_KEY)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());

        Some(match token {
            Some(t) => Self::Token(ExchangeToken(t)),
            None => Self::Missing,
        })
    }
}

/// Build the full-page redirect URL to the external identity provider.
///
/// The callback destination is always `origin + home_path`, where `origin` is
/// the application's current origin. The provider validates it against its
/// registration, so there is no default or fallback destination.
///
/// # Errors
///
/// Returns [`Error::Config`] if `origin` has no host (e.g. `file:` or `data:` URLs).
pub fn provider_redirect_url(provider: &Url, origin: &Url, home_path: &str) -> Result<Url, Error> {
    if origin.host_str().is_none() {
        return Err(Error::Config(format!(
            "application origin has no host: {origin}"
        )));
    }

    let callback = origin
        .join(home_path)
        .map_err(|e| Error::Config(format!("callback path {home_path}: {e}")))?;
    let callback = format!(
        "{}{}",
        origin.origin().ascii_serialization(),
        callback.path()
    );

    let mut url = provider.clone();
    url.set_fragment(None);
    url.query_pairs_mut().append_pair("redirect", &callback);
    Ok(url)
}
