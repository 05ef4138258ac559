use crate::domain::{models::idempotency::IdempotencyRecord, ports::IdempotencyRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A claim races at most against one purge or takeover per round.
const CLAIM_ATTEMPTS: usize = 3;

pub struct SqliteIdempotencyRepo {
    pool: SqlitePool,
}

impl SqliteIdempotencyRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyRepository for SqliteIdempotencyRepo {
    async fn claim(&self, record: &IdempotencyRecord, now: DateTime<Utc>) -> Result<Option<IdempotencyRecord>, AppError> {
        for _ in 0..CLAIM_ATTEMPTS {
            let inserted = sqlx::query(
                "INSERT INTO idempotency_keys (scope, key, request_hash, status, booking_id, created_at, expires_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (scope, key) DO NOTHING"
            )
                .bind(&record.scope).bind(&record.key).bind(&record.request_hash).bind(record.status.as_str())
                .bind(&record.booking_id).bind(record.created_at).bind(record.expires_at)
                .execute(&self.pool)
                .await
                .map_err(AppError::Database)?;
            if inserted.rows_affected() == 1 {
                return Ok(None);
            }

            let existing = sqlx::query_as::<_, IdempotencyRecord>("SELECT * FROM idempotency_keys WHERE scope = ? AND key = ?")
                .bind(&record.scope)
                .bind(&record.key)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::Database)?;

            match existing {
                None => continue,
                Some(existing) if existing.is_expired(now) => {
                    let taken = sqlx::query(
                        "UPDATE idempotency_keys SET request_hash = ?, status = ?, booking_id = NULL, created_at = ?, expires_at = ?
                         WHERE scope = ? AND key = ? AND expires_at <= ?"
                    )
                        .bind(&record.request_hash).bind(record.status.as_str()).bind(record.created_at)
                        .bind(record.expires_at).bind(&record.scope).bind(&record.key).bind(now)
                        .execute(&self.pool)
                        .await
                        .map_err(AppError::Database)?;
                    if taken.rows_affected() == 1 {
                        return Ok(None);
                    }
                }
                Some(existing) => return Ok(Some(existing)),
            }
        }
        Err(AppError::Conflict("Idempotency key is being claimed concurrently".into()))
    }

    async fn release(&self, scope: &str, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM idempotency_keys WHERE scope = ? AND key = ? AND status = 'pending'")
            .bind(scope)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
