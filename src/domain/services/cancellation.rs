//! Cancellation penalties.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::models::cancellation::{CancellationPolicy, CancellationQuote};

/// The service's own policy when it has one, otherwise the business default.
pub fn resolve_policy<'a>(
    service_policy_id: Option<&str>,
    policies: &'a [CancellationPolicy],
) -> Option<&'a CancellationPolicy> {
    service_policy_id
        .and_then(|id| policies.iter().find(|p| p.id == id))
        .or_else(|| policies.iter().find(|p| p.is_default))
}

/// Penalty applies only inside the policy's notice window, i.e. when fewer
/// than `hours_before` hours remain until the start.
pub fn compute_cancellation(
    start_at: DateTime<Utc>,
    now: DateTime<Utc>,
    amount_cents: i64,
    policy: Option<&CancellationPolicy>,
) -> CancellationQuote {
    let amount = amount_cents.max(0);
    let Some(policy) = policy else {
        warn!("No cancellation policy configured, refunding in full");
        return CancellationQuote { penalty_cents: 0, refund_cents: amount };
    };

    let seconds_left = (start_at - now).num_seconds();
    let penalty_cents = if seconds_left >= policy.hours_before as i64 * 3600 {
        0
    } else {
        let scaled = amount as i128 * policy.penalty_percent as i128;
        ((scaled + 50) / 100) as i64
    };

    CancellationQuote {
        penalty_cents,
        refund_cents: (amount - penalty_cents).max(0),
    }
}
