use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    Pending,
    Completed,
}

impl IdempotencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdempotencyStatus::Pending => "pending",
            IdempotencyStatus::Completed => "completed",
        }
    }
}

impl TryFrom<String> for IdempotencyStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(IdempotencyStatus::Pending),
            "completed" => Ok(IdempotencyStatus::Completed),
            other => Err(AppError::Validation(format!("Unknown idempotency status: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct IdempotencyRecord {
    pub scope: String,
    pub key: String,
    pub request_hash: String,
    #[sqlx(try_from = "String")]
    pub status: IdempotencyStatus,
    pub booking_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn pending(scope: String, key: String, request_hash: String, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            scope,
            key,
            request_hash,
            status: IdempotencyStatus::Pending,
            booking_id: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Identifies the record a booking insert has to complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRef {
    pub scope: String,
    pub key: String,
}
