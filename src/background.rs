use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};
use crate::state::AppState;

/// Expires lapsed waitlist offers and drops expired idempotency records.
///
/// Reads already apply both expiries lazily; the sweep only keeps the tables
/// from accumulating stale rows.
pub async fn start_sweeper(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.sweep_interval_secs.max(1));
    info!(interval_secs = interval.as_secs(), "Starting background sweeper...");

    loop {
        sleep(interval).await;
        run_sweep(&state).instrument(info_span!("sweep")).await;
    }
}

pub async fn run_sweep(state: &AppState) {
    let now = Utc::now();

    match state.waitlist.sweep(now).await {
        Ok(0) => {}
        Ok(expired) => info!(expired, "Expired lapsed waitlist entries"),
        Err(e) => error!("Waitlist sweep failed: {:?}", e),
    }

    match state.engine.idempotency().purge_expired(now).await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "Purged expired idempotency keys"),
        Err(e) => error!("Idempotency purge failed: {:?}", e),
    }
}
