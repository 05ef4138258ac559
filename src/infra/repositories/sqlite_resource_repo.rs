use crate::domain::{models::resource::{Resource, ResourceException, ResourceHours}, ports::ResourceRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteResourceRepo {
    pool: SqlitePool,
}

impl SqliteResourceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceRepository for SqliteResourceRepo {
    async fn create(&self, resource: &Resource) -> Result<Resource, AppError> {
        sqlx::query_as::<_, Resource>(
            "INSERT INTO resources (id, business_id, name, resource_type, capacity, is_active, deleted_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&resource.id).bind(&resource.business_id).bind(&resource.name)
            .bind(resource.resource_type.as_str()).bind(resource.capacity).bind(resource.is_active)
            .bind(resource.deleted_at).bind(resource.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<Resource>, AppError> {
        sqlx::query_as::<_, Resource>(
            "SELECT * FROM resources WHERE business_id = ? AND id = ? AND is_active = TRUE AND deleted_at IS NULL"
        )
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list(&self, business_id: &str) -> Result<Vec<Resource>, AppError> {
        sqlx::query_as::<_, Resource>(
            "SELECT * FROM resources WHERE business_id = ? AND is_active = TRUE AND deleted_at IS NULL ORDER BY name ASC"
        )
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn replace_hours(&self, resource_id: &str, hours: &[ResourceHours]) -> Result<Vec<ResourceHours>, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        sqlx::query("DELETE FROM resource_hours WHERE resource_id = ?")
            .bind(resource_id)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        for h in hours {
            sqlx::query("INSERT INTO resource_hours (id, resource_id, weekday, start_time, end_time) VALUES (?, ?, ?, ?, ?)")
                .bind(&h.id).bind(resource_id).bind(h.weekday).bind(h.start_time).bind(h.end_time)
                .execute(&mut *tx).await.map_err(AppError::Database)?;
        }
        tx.commit().await.map_err(AppError::Database)?;
        self.list_hours(resource_id).await
    }

    async fn list_hours(&self, resource_id: &str) -> Result<Vec<ResourceHours>, AppError> {
        sqlx::query_as::<_, ResourceHours>(
            "SELECT * FROM resource_hours WHERE resource_id = ? ORDER BY weekday ASC, start_time ASC"
        )
            .bind(resource_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn add_exception(&self, exception: &ResourceException) -> Result<ResourceException, AppError> {
        sqlx::query_as::<_, ResourceException>(
            "INSERT INTO resource_exceptions (id, resource_id, start_at, end_at, reason, created_at) VALUES (?, ?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&exception.id).bind(&exception.resource_id).bind(exception.start_at)
            .bind(exception.end_at).bind(&exception.reason).bind(exception.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_exceptions(&self, resource_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ResourceException>, AppError> {
        sqlx::query_as::<_, ResourceException>(
            "SELECT * FROM resource_exceptions WHERE resource_id = ? AND start_at < ? AND end_at > ? ORDER BY start_at ASC"
        )
            .bind(resource_id)
            .bind(end)
            .bind(start)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
