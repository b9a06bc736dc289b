//! Plan-gate predicate.
//!
//! Advisory UI gating only: it decides whether to show a control, the backend
//! still rejects operations the user's plan does not cover.

use crate::types::Plan;

/// `rank(user_plan) >= rank(required)`; a missing plan ranks lowest.
#[must_use]
pub fn has_access(user_plan: Option<Plan>, required: Plan) -> bool {
    user_plan.unwrap_or_default().rank() >= required.rank()
}
