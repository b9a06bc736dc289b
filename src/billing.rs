//! Payment status polling after returning from the external checkout page.

use std::time::Duration;

use crate::backend::{BillingApi, PaymentStatus};
use crate::config::ClientConfig;
use crate::error::Error;

/// How a checkout session settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid(PaymentStatus),
    /// The checkout session expired; no further checks were made.
    Expired(PaymentStatus),
    /// Still pending after every allowed attempt.
    TimedOut { attempts: u32 },
}

/// Bounded, fixed-interval poller for `GET /api/billing/status/{id}`.
#[derive(Debug, Clone, Copy)]
pub struct PaymentPoller {
    interval: Duration,
    max_attempts: u32,
}

impl PaymentPoller {
    /// `max_attempts` below one is raised to one.
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.payment_poll_interval(),
            config.payment_poll_attempts(),
        )
    }

    /// Check the status up to `max_attempts` times, `interval` apart.
    ///
    /// "paid" and "expired" end polling immediately; any other status waits
    /// for the next attempt.
    ///
    /// # Errors
    ///
    /// The first backend or transport error ends polling and is returned.
    pub async fn poll<B: BillingApi>(
        &self,
        api: &B,
        checkout_session_id: &str,
    ) -> Result<PaymentOutcome, Error> {
        for attempt in 1..=self.max_attempts {
            let status = api.payment_status(checkout_session_id).await?;
            if status.is_paid() {
                tracing::info!(attempt, "Payment confirmed");
                return Ok(PaymentOutcome::Paid(status));
            }
            if status.is_expired() {
                tracing::warn!(attempt, "Checkout session expired");
                return Ok(PaymentOutcome::Expired(status));
            }
            tracing::debug!(attempt, status = %status.status, "Payment still pending");
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        tracing::warn!(attempts = self.max_attempts, "Payment status check timed out");
        Ok(PaymentOutcome::TimedOut {
            attempts: self.max_attempts,
        })
    }
}
