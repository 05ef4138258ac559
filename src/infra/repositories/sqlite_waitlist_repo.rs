use crate::domain::{models::waitlist::{WaitlistEntry, WaitlistTransition}, ports::WaitlistRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};

pub struct SqliteWaitlistRepo {
    pool: SqlitePool,
}

impl SqliteWaitlistRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Compare-and-set on (status, notification_count).
pub(crate) async fn apply_transition(conn: &mut SqliteConnection, t: &WaitlistTransition) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE waitlist_entries
         SET status = ?, notification_count = ?, last_notified_at = ?, response_deadline = ?, converted_booking_id = ?, updated_at = ?
         WHERE id = ? AND status = ? AND notification_count = ?"
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
pub(crate) async fn expire_entry(conn: &mut SqliteConnection, t: &WaitlistTransition) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE waitlist_entries SET status = 'expired', updated_at = ?
         WHERE id = ? AND status IN ('active', 'notified')"
    )
        .bind(t.at)
        .bind(&t.entry_id)
        .execute(&mut *conn)
        .await
        .map_err(AppError::Database)?;
    Ok(())
}

#[async_trait]
impl WaitlistRepository for SqliteWaitlistRepo {
    async fn create(&self, entry: &WaitlistEntry) -> Result<WaitlistEntry, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "INSERT INTO waitlist_entries (id, business_id, service_id, customer_id, resource_id, preferred_date, preferred_start, preferred_end, status, priority, notification_count, last_notified_at, response_deadline, converted_booking_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
        sqlx::query_as::<_, WaitlistEntry>("SELECT * FROM waitlist_entries WHERE business_id = ? AND id = ?")
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list(&self, business_id: &str) -> Result<Vec<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>("SELECT * FROM waitlist_entries WHERE business_id = ? ORDER BY created_at ASC")
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_open_for_date(&self, business_id: &str, service_id: &str, date: NaiveDate) -> Result<Vec<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist_entries
             WHERE business_id = ? AND service_id = ? AND preferred_date = ? AND status IN ('active', 'notified')
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
            "SELECT * FROM waitlist_entries WHERE status IN ('active', 'notified') ORDER BY created_at ASC LIMIT ?"
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
