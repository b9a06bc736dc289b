#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Rejected before any network call (empty credentials, short password).
    #[error("Validation error: {0}")]
    Validation(String),
    /// Backend answered with a non-2xx status.
    #[error("{operation} failed ({status}): {detail}")]
    Rejected {
        operation: &'static str,
        status: u16,
        detail: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    /// The backend answered, but the session moved on (logout, shutdown) before
    /// the response could be applied.
    #[error("{0} response arrived after the session changed")]
    Superseded(&'static str),
}

impl Error {
    /// Text to show the user for this failure.
    ///
    /// Client-side validation messages and backend `detail` messages are shown
    /// as-is; everything else collapses to `fallback`.
    #[must_use]
    pub fn user_message<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self {
            Self::Validation(msg) => msg.as_str(),
            Self::Rejected { detail, .. } if !detail.is_empty() => detail.as_str(),
            _ => fallback,
        }
    }

    /// HTTP status of a backend rejection.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
