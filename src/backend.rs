//! MyAlgorithm backend API.
//!
//! [`AuthApi`] and [`BillingApi`] are the seams the session manager and the
//! payment poller talk through. [`HttpBackend`] is the production
//! implementation: one cookie-carrying `reqwest::Client`, so every request is
//! credentialed the same way the browser's `withCredentials` requests are.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::oauth::ExchangeToken;
use crate::types::User;

/// Authentication and account endpoints.
pub trait AuthApi: Send + Sync + 'static {
    /// `GET /api/auth/me`: the user behind the current session cookie.
    fn current_user(&self) -> impl Future<Output = Result<User, Error>> + Send;

    /// `POST /api/auth/login`.
    fn login(&self, credentials: &Credentials) -> impl Future<Output = Result<User, Error>> + Send;

    /// `POST /api/auth/register`.
    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<User, Error>> + Send;

    /// `POST /api/auth/logout`.
    fn logout(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// `POST /api/auth/session`: redeem a provider exchange token for a session cookie.
    fn exchange_session(
        &self,
        token: &ExchangeToken,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// `PUT /api/account/profile`.
    fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<User, Error>> + Send;

    /// `PUT /api/account/password`.
    fn change_password(
        &self,
        change: &PasswordChange,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// `POST /api/auth/reset-password`.
    fn request_password_reset(&self, email: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Billing endpoints used outside the checkout redirect.
#[cfg(feature = "billing")]
pub trait BillingApi: Send + Sync + 'static {
    /// `GET /api/billing/status/{checkout_session_id}`.
    fn payment_status(
        &self,
        checkout_session_id: &str,
    ) -> impl Future<Output = Result<PaymentStatus, Error>> + Send;
}

/// Password sign-in request body.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Profile edit; `None` fields are left unchanged by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Checkout session status as reported by the billing endpoint.
#[cfg(feature = "billing")]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct PaymentStatus {
    pub status: String,
    pub payment_status: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[cfg(feature = "billing")]
impl PaymentStatus {
    #[must_use]
    pub fn new(status: impl Into<String>, payment_status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            payment_status: payment_status.into(),
            amount_total: None,
            currency: None,
        }
    }

    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.status == "expired"
    }
}

#[derive(Serialize)]
struct SessionExchangeRequest<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
struct PasswordResetRequest<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// HTTP implementation of the backend traits.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: String,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend client with its own cookie store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self::with_http_client(config, http))
    }

    /// Use a custom HTTP client (shared cookie store, connection pool reuse, testing).
    ///
    /// The client must have a cookie store for session cookies to persist.
    #[must_use]
    pub fn with_http_client(config: &ClientConfig, http: reqwest::Client) -> Self {
        Self {
            base: config.backend_url().as_str().trim_end_matches('/').to_owned(),
            http,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api{path}", self.base)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Rejected {
            operation,
            status,
            detail: error_detail(&body),
        })
    }
}

/// The backend reports failures as `{"detail": "..."}`; anything else is passed through.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        _ => body.trim().to_owned(),
    }
}

impl AuthApi for HttpBackend {
    async fn current_user(&self) -> Result<User, Error> {
        let response = self.http.get(self.endpoint("/auth/me")).send().await?;
        let response = Self::ensure_success(response, "session probe").await?;
        response.json::<User>().await.map_err(Into::into)
    }

    async fn login(&self, credentials: &Credentials) -> Result<User, Error> {
        let response = self
            .http
            .post(self.endpoint("/auth/login"))
            .json(credentials)
            .send()
            .await?;
        let response = Self::ensure_success(response, "login").await?;
        response.json::<User>().await.map_err(Into::into)
    }

    async fn register(&self, registration: &Registration) -> Result<User, Error> {
        let response = self
            .http
            .post(self.endpoint("/auth/register"))
            .json(registration)
            .send()
            .await?;
        let response = Self::ensure_success(response, "registration").await?;
        response.json::<User>().await.map_err(Into::into)
    }

    async fn logout(&self) -> Result<(), Error> {
        let response = self
            .http
            .post(self.endpoint("/auth/logout"))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::ensure_success(response, "logout").await?;
        Ok(())
    }

    async fn exchange_session(&self, token: &ExchangeToken) -> Result<(), Error> {
        let response = self
            .http
            .post(self.endpoint("/auth/session"))
            .json(&SessionExchangeRequest {
                session_id: token.as_str(),
            })
            .send()
            .await?;
        Self::ensure_success(response, "session exchange").await?;
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, Error> {
        let response = self
            .http
            .put(self.endpoint("/account/profile"))
            .json(update)
            .send()
            .await?;
        let response = Self::ensure_success(response, "profile update").await?;
        response.json::<User>().await.map_err(Into::into)
    }

    async fn change_password(&self, change: &PasswordChange) -> Result<(), Error> {
        let response = self
            .http
            .put(self.endpoint("/account/password"))
            .json(change)
            .send()
            .await?;
        Self::ensure_success(response, "password change").await?;
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(self.endpoint("/auth/reset-password"))
            .json(&PasswordResetRequest { email })
            .send()
            .await?;
        Self::ensure_success(response, "password reset").await?;
        Ok(())
    }
}

#[cfg(feature = "billing")]
impl BillingApi for HttpBackend {
    async fn payment_status(&self, checkout_session_id: &str) -> Result<PaymentStatus, Error> {
        let path = format!(
            "/billing/status/{}",
            urlencoding::encode(checkout_session_id)
        );
        let response = self.http.get(self.endpoint(&path)).send().await?;
        let response = Self::ensure_success(response, "payment status").await?;
        response.json::<PaymentStatus>().await.map_err(Into::into)
    }
}
