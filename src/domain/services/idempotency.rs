//! Idempotent booking creation.
//!
//! A client key is claimed as `pending` before the booking is attempted and
//! completed inside the booking transaction. Retrying with the same key and
//! the same request replays the stored booking; the same key with a
//! different request is rejected.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::domain::models::idempotency::{IdempotencyRecord, IdempotencyRef, IdempotencyStatus};
use crate::domain::ports::IdempotencyRepository;
use crate::error::AppError;

const MAX_KEY_LEN: usize = 255;

pub fn create_booking_scope(business_id: &str) -> String {
    format!("create_booking:{}", business_id)
}

/// SHA-256 over the canonical JSON form of the request.
///
/// Going through `serde_json::Value` sorts object keys, so two requests
/// that only differ in field order hash the same.
pub fn request_hash<T: Serialize>(request: &T) -> Result<String, AppError> {
    let value = serde_json::to_value(request)
        .map_err(|e| AppError::InternalWithMsg(format!("Failed to canonicalize request: {}", e)))?;
    let canonical = value.to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyDecision {
    /// The key is ours; run the operation and complete the record with it.
    Proceed(IdempotencyRef),
    /// Already done; return the stored booking.
    Replay(String),
    /// A request with this key is still running.
    InProgress,
}

/// Outcome for a request that found a live record under its key.
pub fn decide(existing: &IdempotencyRecord, request_hash: &str) -> Result<IdempotencyDecision, AppError> {
    if existing.request_hash != request_hash {
        return Err(AppError::Conflict(
            "Idempotency key was already used with a different request".into(),
        ));
    }
    match (existing.status, &existing.booking_id) {
        (IdempotencyStatus::Completed, Some(booking_id)) => Ok(IdempotencyDecision::Replay(booking_id.clone())),
        (IdempotencyStatus::Completed, None) => Err(AppError::InternalWithMsg(
            format!("Completed idempotency record {} has no booking", existing.key),
        )),
        (IdempotencyStatus::Pending, _) => Ok(IdempotencyDecision::InProgress),
    }
}

pub struct IdempotencyGuard {
    repo: Arc<dyn IdempotencyRepository>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(repo: Arc<dyn IdempotencyRepository>, ttl: Duration) -> Self {
        Self { repo, ttl }
    }

    pub async fn begin(&self, scope: &str, key: &str, request_hash: &str, now: DateTime<Utc>) -> Result<IdempotencyDecision, AppError> {
        if key.trim().is_empty() || key.len() > MAX_KEY_LEN {
            return Err(AppError::Validation(format!("Idempotency-Key must be 1 to {} characters", MAX_KEY_LEN)));
        }

        let record = IdempotencyRecord::pending(scope.to_string(), key.to_string(), request_hash.to_string(), self.ttl, now);
        match self.repo.claim(&record, now).await? {
            None => {
                debug!(scope, key, "Idempotency key claimed");
                Ok(IdempotencyDecision::Proceed(IdempotencyRef { scope: record.scope, key: record.key }))
            }
            Some(existing) => decide(&existing, request_hash),
        }
    }

    /// Frees a claim whose operation failed. A failure here only delays the
    /// client's retry until the TTL runs out.
    pub async fn release(&self, reference: &IdempotencyRef) {
        if let Err(e) = self.repo.release(&reference.scope, &reference.key).await {
            warn!(scope = %reference.scope, key = %reference.key, "Failed to release idempotency key: {}", e);
        }
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        self.repo.purge_expired(now).await
    }
}
