use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use url::Url;

use super::guard::{GuardDecision, Navigator, RouteGuard};
use super::state::Session;
use crate::backend::{AuthApi, Credentials, PasswordChange, ProfileUpdate, Registration};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::oauth::{self, ExchangeToken, PendingOAuthExchange};
use crate::types::User;

/// What the startup reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Reconciliation already ran for this manager; nothing was done.
    AlreadyRan,
    /// No OAuth callback pending; the session was probed.
    Probed,
    /// An OAuth callback was pending and handled.
    OAuth(ExchangeOutcome),
}

/// Result of redeeming an OAuth exchange token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Exchange and follow-up probe succeeded; navigated to the home path.
    SignedIn,
    /// Exchange was accepted but the follow-up probe found no session.
    NoSession,
    /// Backend rejected the token or was unreachable.
    Rejected,
    /// Callback fragment carried no usable token; the exchange endpoint was not called.
    MissingToken,
    /// Token was already submitted once; nothing was done.
    AlreadyConsumed,
    /// Exchange finished after a logout or shutdown; nothing was applied and
    /// no navigation happened.
    Superseded,
}

/// Sole owner of the client [`Session`].
///
/// Consumers read snapshots via [`snapshot`](Self::snapshot) or
/// [`subscribe`](Self::subscribe) and request transitions through the
/// operations below; nothing else writes the session.
///
/// Responses are applied only if they belong to the current epoch. Logging
/// out and [`shutdown`](Self::shutdown) advance the epoch, so a late response
/// from an earlier request is dropped instead of resurrecting a session.
pub struct SessionManager<A> {
    api: A,
    config: ClientConfig,
    guard: RouteGuard,
    state: watch::Sender<Session>,
    epoch: AtomicU64,
    closed: AtomicBool,
    reconciled: AtomicBool,
    consumed_tokens: Mutex<HashSet<ExchangeToken>>,
}

impl<A: AuthApi> SessionManager<A> {
    #[must_use]
    pub fn new(api: A, config: ClientConfig) -> Self {
        let guard = RouteGuard::new(config.sign_in_path());
        let (state, _) = watch::channel(Session::Unknown);
        Self {
            api,
            config,
            guard,
            state,
            epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            reconciled: AtomicBool::new(false),
            consumed_tokens: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub fn route_guard(&self) -> &RouteGuard {
        &self.guard
    }

    /// Current session value.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Read-only stream of session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Guard decision for `requested` against the current session.
    #[must_use]
    pub fn guard(&self, requested: &str) -> GuardDecision {
        self.guard.decide(&self.state.borrow(), requested)
    }

    /// Full-page redirect URL to the identity provider for `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `origin` is not a hosted origin.
    pub fn provider_sign_in_url(&self, origin: &Url) -> Result<Url, Error> {
        oauth::provider_redirect_url(
            self.config.auth_provider_url(),
            origin,
            self.config.home_path(),
        )
    }

    /// Resolve the initial session for this page load.
    ///
    /// A pending OAuth callback in the fragment of `location` takes precedence
    /// over probing, even when a session cookie may already exist. Runs at most
    /// once; later calls return [`Reconciliation::AlreadyRan`].
    pub async fn reconcile(&self, location: &Url, navigator: &dyn Navigator) -> Reconciliation {
        if self.reconciled.swap(true, Ordering::SeqCst) {
            tracing::debug!("Reconciliation already ran; ignoring");
            return Reconciliation::AlreadyRan;
        }

        match PendingOAuthExchange::from_location(location) {
            Some(PendingOAuthExchange::Token(token)) => {
                Reconciliation::OAuth(self.exchange_oauth(token, navigator).await)
            }
            Some(PendingOAuthExchange::Missing) => {
                tracing::warn!("OAuth callback without session_id; redirecting to sign-in");
                self.apply(self.current_epoch(), Session::Unauthenticated);
                navigator.replace(self.config.sign_in_path());
                Reconciliation::OAuth(ExchangeOutcome::MissingToken)
            }
            None => {
                self.probe_session().await;
                Reconciliation::Probed
            }
        }
    }

    /// Ask the backend who the current visitor is.
    ///
    /// Any failure resolves to [`Session::Unauthenticated`] without surfacing an
    /// error: being signed out is the expected answer for most visitors.
    pub async fn probe_session(&self) -> Session {
        self.probe_in(self.current_epoch()).await
    }

    /// Redeem a provider exchange token, then navigate.
    ///
    /// Each token is submitted at most once per manager. Exchange, probe and
    /// navigation run strictly in sequence; navigation always replaces the
    /// current history entry so the callback URL is not revisited.
    pub async fn exchange_oauth(
        &self,
        token: ExchangeToken,
        navigator: &dyn Navigator,
    ) -> ExchangeOutcome {
        let fresh = self
            .consumed_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone());
        if !fresh {
            tracing::debug!("Exchange token already consumed; ignoring");
            return ExchangeOutcome::AlreadyConsumed;
        }

        let epoch = self.current_epoch();
        match self.api.exchange_session(&token).await {
            Ok(()) => {
                let session = self.probe_in(epoch).await;
                if !self.is_live(epoch) {
                    return ExchangeOutcome::Superseded;
                }
                if session.is_authenticated() {
                    navigator.replace(self.config.home_path());
                    ExchangeOutcome::SignedIn
                } else {
                    navigator.replace(self.config.sign_in_path());
                    ExchangeOutcome::NoSession
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "OAuth session exchange failed");
                if !self.apply(epoch, Session::Unauthenticated) {
                    return ExchangeOutcome::Superseded;
                }
                navigator.replace(self.config.sign_in_path());
                ExchangeOutcome::Rejected
            }
        }
    }

    /// Password sign-in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty input (no request is made), the
    /// backend/transport error, or [`Error::Superseded`] if a logout or shutdown
    /// happened while the request was in flight. The session is left unchanged on error.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<User, Error> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(Error::Validation("Email and password are required".into()));
        }

        let epoch = self.current_epoch();
        let user = self
            .api
            .login(&Credentials {
                email: identifier.to_owned(),
                password: secret.to_owned(),
            })
            .await?;

        let user = self.adopt(epoch, user, "login")?;
        tracing::info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty input or a secret shorter than
    /// the configured minimum (no request is made), the backend/transport
    /// error, or [`Error::Superseded`]. The session is left unchanged on error.
    pub async fn register(&self, name: &str, identifier: &str, secret: &str) -> Result<User, Error> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(Error::Validation("Email and password are required".into()));
        }
        self.check_secret_len(secret, "Password")?;

        let epoch = self.current_epoch();
        let user = self
            .api
            .register(&Registration {
                name: name.trim().to_owned(),
                email: identifier.to_owned(),
                password: secret.to_owned(),
            })
            .await?;

        let user = self.adopt(epoch, user, "registration")?;
        tracing::info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Sign out. Always ends signed out, whatever the backend answers.
    pub async fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.api.logout().await {
            tracing::warn!(error = %e, "Logout request failed; clearing session anyway");
        }
        if !self.closed.load(Ordering::SeqCst) {
            self.state.send_replace(Session::Unauthenticated);
        }
    }

    /// Re-read the user from the backend after server-side changes.
    ///
    /// Observers keep seeing the previous session until the probe resolves.
    pub async fn refresh(&self) -> Session {
        self.probe_session().await
    }

    /// Edit name and/or email, then adopt the returned user record.
    ///
    /// # Errors
    ///
    /// Returns the backend/transport error or [`Error::Superseded`]; the session
    /// is left unchanged.
    pub async fn update_profile(
        &self,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, Error> {
        let update = ProfileUpdate {
            name: name.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned),
            email: email.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned),
        };

        let epoch = self.current_epoch();
        let user = self.api.update_profile(&update).await?;
        self.adopt(epoch, user, "profile update")
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the new password is too short (no request
    /// is made), or the backend/transport error.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), Error> {
        self.check_secret_len(new, "New password")?;
        self.api
            .change_password(&PasswordChange {
                current_password: current.to_owned(),
                new_password: new.to_owned(),
            })
            .await
    }

    /// Ask the backend to send a reset link. Does not touch the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty email, or the backend/transport error.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::Validation("Email is required".into()));
        }
        self.api.request_password_reset(email).await
    }

    /// Stop applying responses. In-flight requests complete but are discarded.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    async fn probe_in(&self, epoch: u64) -> Session {
        let session = match self.api.current_user().await {
            Ok(user) => Session::Authenticated(user),
            Err(e) => {
                tracing::debug!(error = %e, "No active session");
                Session::Unauthenticated
            }
        };
        self.apply(epoch, session.clone());
        session
    }

    fn check_secret_len(&self, secret: &str, what: &str) -> Result<(), Error> {
        let min = self.config.min_secret_len();
        if secret.chars().count() < min {
            return Err(Error::Validation(format!(
                "{what} must be at least {min} characters"
            )));
        }
        Ok(())
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_live(&self, epoch: u64) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.current_epoch() == epoch
    }

    /// Sign in as `user` if `epoch` is still current.
    fn adopt(&self, epoch: u64, user: User, operation: &'static str) -> Result<User, Error> {
        if self.apply(epoch, Session::Authenticated(user.clone())) {
            Ok(user)
        } else {
            Err(Error::Superseded(operation))
        }
    }

    /// Replace the session if `epoch` is still current. Returns whether it was applied.
    fn apply(&self, epoch: u64, session: Session) -> bool {
        if !self.is_live(epoch) {
            tracing::debug!("Discarding stale session response");
            return false;
        }
        self.state.send_replace(session);
        true
    }
}

#[cfg(feature = "billing")]
impl<A: AuthApi + crate::backend::BillingApi> SessionManager<A> {
    /// Poll a checkout session until it settles; refresh the session once paid
    /// so the upgraded plan becomes visible.
    ///
    /// # Errors
    ///
    /// Returns the backend/transport error that interrupted polling.
    pub async fn await_payment(
        &self,
        checkout_session_id: &str,
    ) -> Result<crate::billing::PaymentOutcome, Error> {
        let poller = crate::billing::PaymentPoller::from_config(&self.config);
        let outcome = poller.poll(&self.api, checkout_session_id).await?;
        if matches!(outcome, crate::billing::PaymentOutcome::Paid(_)) {
            self.refresh().await;
        }
        Ok(outcome)
    }
}
