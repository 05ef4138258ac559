use crate::domain::{models::waitlist::{WaitlistEntry, WaitlistTransition}, ports::WaitlistRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

pub struct PostgresWaitlistRepo {
    pool: PgPool,
}

impl PostgresWaitlistRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Compare-and-set on (status, notification_count).
pub(crate) async fn apply_transition(conn: &mut PgConnection, t: &WaitlistTransition) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE waitlist_entries
         SET status = $1, notification_count = $2, last_notified_at = $3, response_deadline = $4, converted_booking_id = $5, updated_at = $6
         WHERE id = $7 AND status = $8 AND notification_count = $9"
    )
        .bind(t.to.as_str()).bind(t.notification_count).bind(t.last_notified_at).bind(t.response_deadline)
        .bind(&t.converted_booking_id).bind(t.at)
        .bind(&t.entry_id).bind(t.expected_status.as_str()).bind(t.expected_count)
        .execute(&mut *conn)
        .await
        .map_err(AppError::Database)?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(format!("Waitlist entry {} was changed concurrently", t.entry_id)));
    }
    Ok(())
}

/// Expires an entry that is still open. A row another request already
/// closed is left alone.
pub(crate) async fn expire_entry(conn: &mut PgConnection, t: &WaitlistTransition) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE waitlist_entries SET status = 'expired', updated_at = $1
         WHERE id = $2 AND status IN ('active', 'notified')"
    )
        .bind(t.at)
        .bind(&t.entry_id)
        .execute(&mut *conn)
        .await
        .map_err(AppError::Database)?;
    Ok(())
}

#[async_trait]
impl WaitlistRepository for PostgresWaitlistRepo {
    async fn create(&self, entry: &WaitlistEntry) -> Result<WaitlistEntry, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "INSERT INTO waitlist_entries (id, business_id, service_id, customer_id, resource_id, preferred_date, preferred_start, preferred_end, status, priority, notification_count, last_notified_at, response_deadline, converted_booking_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING *"
        )
            .bind(&entry.id).bind(&entry.business_id).bind(&entry.service_id).bind(&entry.customer_id)
            .bind(&entry.resource_id).bind(entry.preferred_date).bind(entry.preferred_start).bind(entry.preferred_end)
            .bind(entry.status.as_str()).bind(entry.priority.as_str()).bind(entry.notification_count)
            .bind(entry.last_notified_at).bind(entry.response_deadline).bind(&entry.converted_booking_id)
            .bind(entry.created_at).bind(entry.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>("SELECT * FROM waitlist_entries WHERE business_id = $1 AND id = $2")
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list(&self, business_id: &str) -> Result<Vec<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>("SELECT * FROM waitlist_entries WHERE business_id = $1 ORDER BY created_at ASC")
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_open_for_date(&self, business_id: &str, service_id: &str, date: NaiveDate) -> Result<Vec<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist_entries
             WHERE business_id = $1 AND service_id = $2 AND preferred_date = $3 AND status IN ('active', 'notified')
             ORDER BY created_at ASC"
        )
            .bind(business_id)
            .bind(service_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_open(&self, limit: i64) -> Result<Vec<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist_entries WHERE status IN ('active', 'notified') ORDER BY created_at ASC LIMIT $1"
        )
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn apply(&self, transitions: &[WaitlistTransition]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        for t in transitions {
            apply_transition(&mut tx, t).await?;
        }
        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }
}
