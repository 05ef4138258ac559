use tracing::info;

use crate::domain::ports::{AuditEntry, AuditSink};

/// Writes audit entries as structured events on the `audit` target, which
/// the JSON file layer picks up.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        let before = entry.before.map(|v| v.to_string()).unwrap_or_default();
        let after = entry.after.map(|v| v.to_string()).unwrap_or_default();
        info!(
            target: "audit",
            business_id = %entry.business_id,
            entity = entry.entity,
            entity_id = %entry.entity_id,
            action = entry.action,
            at = %entry.at,
            before = %before,
            after = %after,
            "state change"
        );
    }
}
