use std::time::Duration;

use url::Url;

use crate::error::Error;

/// MyAlgorithm client configuration.
///
/// The backend URL is the only required field and is a constructor parameter.
/// Everything else has a default and a `with_*` override.
///
/// ```rust,ignore
/// use myalgorithm_session::ClientConfig;
///
/// let config = ClientConfig::new("https://api.myalgorithm.app".parse()?)
///     .with_sign_in_path("/signin");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) backend_url: Url,
    pub(crate) auth_provider_url: Url,
    pub(crate) sign_in_path: String,
    pub(crate) home_path: String,
    pub(crate) min_secret_len: usize,
    pub(crate) payment_poll_interval: Duration,
    pub(crate) payment_poll_attempts: u32,
}

impl ClientConfig {
    #[must_use]
    pub fn new(backend_url: Url) -> Self {
        Self {
            backend_url,
            auth_provider_url: "https://auth.emergentagent.com/"
                .parse()
                .expect("valid default URL"),
            sign_in_path: "/login".into(),
            home_path: "/dashboard".into(),
            min_secret_len: 6,
            payment_poll_interval: Duration::from_secs(2),
            payment_poll_attempts: 5,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `MYALGORITHM_BACKEND_URL`: backend origin serving `/api/*`
    ///
    /// # Optional env vars
    /// - `MYALGORITHM_AUTH_PROVIDER_URL`: external identity provider entry point
    /// - `MYALGORITHM_SIGN_IN_PATH`: sign-in route (default `/login`)
    /// - `MYALGORITHM_HOME_PATH`: authenticated landing route (default `/dashboard`)
    /// - `MYALGORITHM_PAYMENT_POLL_INTERVAL_MS`: delay between payment status checks
    /// - `MYALGORITHM_PAYMENT_POLL_ATTEMPTS`: payment status checks before giving up
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the backend URL is missing or any value is malformed.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the backend URL is missing or any value is
    /// malformed, including a payment poll attempt count of zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let backend_url = lookup("MYALGORITHM_BACKEND_URL")
            .ok_or_else(|| Error::Config("MYALGORITHM_BACKEND_URL is required".into()))?;
        let backend_url: Url = backend_url
            .parse()
            .map_err(|e| Error::Config(format!("MYALGORITHM_BACKEND_URL: {e}")))?;

        let mut config = Self::new(backend_url);

        if let Some(url_str) = lookup("MYALGORITHM_AUTH_PROVIDER_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| Error::Config(format!("MYALGORITHM_AUTH_PROVIDER_URL: {e}")))?;
            config = config.with_auth_provider_url(url);
        }
        if let Some(path) = lookup("MYALGORITHM_SIGN_IN_PATH") {
            config = config.with_sign_in_path(path);
        }
        if let Some(path) = lookup("MYALGORITHM_HOME_PATH") {
            config = config.with_home_path(path);
        }
        if let Some(ms) = lookup("MYALGORITHM_PAYMENT_POLL_INTERVAL_MS") {
            let ms: u64 = ms.parse().map_err(|e| {
                Error::Config(format!("MYALGORITHM_PAYMENT_POLL_INTERVAL_MS: {e}"))
            })?;
            config = config.with_payment_poll_interval(Duration::from_millis(ms));
        }
        if let Some(n) = lookup("MYALGORITHM_PAYMENT_POLL_ATTEMPTS") {
            let n: u32 = n
                .parse()
                .map_err(|e| Error::Config(format!("MYALGORITHM_PAYMENT_POLL_ATTEMPTS: {e}")))?;
            if n == 0 {
                return Err(Error::Config(
                    "MYALGORITHM_PAYMENT_POLL_ATTEMPTS must be at least 1".into(),
                ));
            }
            config = config.with_payment_poll_attempts(n);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_auth_provider_url(mut self, url: Url) -> Self {
        self.auth_provider_url = url;
        self
    }

    #[must_use]
    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    #[must_use]
    pub fn with_min_secret_len(mut self, len: usize) -> Self {
        self.min_secret_len = len;
        self
    }

    #[must_use]
    pub fn with_payment_poll_interval(mut self, interval: Duration) -> Self {
        self.payment_poll_interval = interval;
        self
    }

    /// Number of payment status checks; at least one check is always made.
    #[must_use]
    pub fn with_payment_poll_attempts(mut self, attempts: u32) -> Self {
        self.payment_poll_attempts = attempts.max(1);
        self
    }

    /// Backend origin; API paths are joined onto it.
    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// External identity provider entry point.
    #[must_use]
    pub fn auth_provider_url(&self) -> &Url {
        &self.auth_provider_url
    }

    #[must_use]
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    #[must_use]
    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    #[must_use]
    pub fn min_secret_len(&self) -> usize {
        self.min_secret_len
    }

    #[must_use]
    pub fn payment_poll_interval(&self) -> Duration {
        self.payment_poll_interval
    }

    #[must_use]
    pub fn payment_poll_attempts(&self) -> u32 {
        self.payment_poll_attempts
    }
}
