use crate::domain::{models::notification::Notification, ports::NotificationRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

pub struct SqliteNotificationRepo {
    pool: SqlitePool,
}

impl SqliteNotificationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Outbox rows are only ever written inside the transaction that caused them.
pub(crate) async fn insert_notification(conn: &mut SqliteConnection, notification: &Notification) -> Result<(), AppError> {
    sqlx::query("INSERT INTO notifications (id, business_id, kind, payload, status, created_at) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(&notification.id)
        .bind(&notification.business_id)
        .bind(&notification.kind)
        .bind(&notification.payload)
        .bind(&notification.status)
        .bind(notification.created_at)
        .execute(&mut *conn)
        .await
        .map_err(AppError::Database)?;
    Ok(())
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepo {
    async fn list(&self, business_id: &str) -> Result<Vec<Notification>, AppError> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE business_id = ? ORDER BY created_at ASC")
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
