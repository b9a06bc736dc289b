//! Client session lifecycle for MyAlgorithm.
//!
//! [`SessionManager`] owns the visitor's [`Session`] and is the only writer.
//! Everything else reads snapshots and asks for transitions.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myalgorithm_session::{ClientConfig, HttpBackend, SessionManager};
//!
//! let config = ClientConfig::from_env()?;
//! let backend = HttpBackend::new(&config)?;
//! let sessions = SessionManager::new(backend, config);
//!
//! // Once per page load, before rendering guarded routes:
//! sessions.reconcile(&current_location, &router).await;
//!
//! // In route guards:
//! match sessions.guard("/dashboard/billing") {
//!     GuardDecision::Loading => show_spinner(),
//!     GuardDecision::RedirectToSignIn { location } => router.replace(&location),
//!     GuardDecision::Render => render_page(),
//! }
//! ```

mod guard;
mod manager;
mod state;

pub use guard::{GuardDecision, Navigator, RouteGuard};
pub use manager::{ExchangeOutcome, Reconciliation, SessionManager};
pub use state::{Session, SessionView};
