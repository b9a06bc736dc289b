#![doc = include_str!("../README.md")]

pub mod backend;
#[cfg(feature = "billing")]
pub mod billing;
pub mod config;
pub mod error;
pub mod oauth;
pub mod plan;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use backend::{AuthApi, HttpBackend};
#[cfg(feature = "billing")]
pub use backend::{BillingApi, PaymentStatus};
#[cfg(feature = "billing")]
pub use billing::{PaymentOutcome, PaymentPoller};
pub use config::ClientConfig;
pub use error::Error;
pub use oauth::{ExchangeToken, PendingOAuthExchange, provider_redirect_url};
pub use plan::has_access;
pub use session::{
    ExchangeOutcome, GuardDecision, Navigator, Reconciliation, RouteGuard, Session,
    SessionManager, SessionView,
};
pub use types::{Feature, Plan, User, UserId};
