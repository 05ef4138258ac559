use crate::domain::{models::cancellation::CancellationPolicy, ports::CancellationPolicyRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqlitePolicyRepo {
    pool: SqlitePool,
}

impl SqlitePolicyRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CancellationPolicyRepository for SqlitePolicyRepo {
    async fn create(&self, policy: &CancellationPolicy) -> Result<CancellationPolicy, AppError> {
        sqlx::query_as::<_, CancellationPolicy>(
            "INSERT INTO cancellation_policies (id, business_id, name, hours_before, penalty_percent, is_default, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&policy.id).bind(&policy.business_id).bind(&policy.name).bind(policy.hours_before)
            .bind(policy.penalty_percent).bind(policy.is_default).bind(policy.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match AppError::Database(e) {
                err if err.is_unique_violation() => {
                    AppError::Conflict("Business already has a default cancellation policy".into())
                }
                err => err,
            })
    }

    async fn list(&self, business_id: &str) -> Result<Vec<CancellationPolicy>, AppError> {
        sqlx::query_as::<_, CancellationPolicy>(
            "SELECT * FROM cancellation_policies WHERE business_id = ? ORDER BY created_at ASC"
        )
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
