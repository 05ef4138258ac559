use crate::domain::{models::business::{Business, BusinessHours, Holiday}, ports::BusinessRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;

pub struct SqliteBusinessRepo {
    pool: SqlitePool,
}

impl SqliteBusinessRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BusinessRepository for SqliteBusinessRepo {
    async fn create(&self, business: &Business) -> Result<Business, AppError> {
        sqlx::query_as::<_, Business>(
            "INSERT INTO businesses (id, name, timezone, created_at) VALUES (?, ?, ?, ?) RETURNING *"
        )
            .bind(&business.id)
            .bind(&business.name)
            .bind(&business.timezone)
            .bind(business.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Business>, AppError> {
        sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn replace_hours(&self, business_id: &str, hours: &[BusinessHours]) -> Result<Vec<BusinessHours>, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        sqlx::query("DELETE FROM business_hours WHERE business_id = ?")
            .bind(business_id)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        for h in hours {
            sqlx::query("INSERT INTO business_hours (business_id, weekday, open_time, close_time, is_closed) VALUES (?, ?, ?, ?, ?)")
                .bind(business_id).bind(h.weekday).bind(h.open_time).bind(h.close_time).bind(h.is_closed)
                .execute(&mut *tx).await.map_err(AppError::Database)?;
        }
        tx.commit().await.map_err(AppError::Database)?;
        self.list_hours(business_id).await
    }

    async fn list_hours(&self, business_id: &str) -> Result<Vec<BusinessHours>, AppError> {
        sqlx::query_as::<_, BusinessHours>("SELECT * FROM business_hours WHERE business_id = ? ORDER BY weekday ASC")
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn add_holiday(&self, holiday: &Holiday) -> Result<Holiday, AppError> {
        sqlx::query_as::<_, Holiday>("INSERT INTO holidays (id, business_id, date, name) VALUES (?, ?, ?, ?) RETURNING *")
            .bind(&holiday.id)
            .bind(&holiday.business_id)
            .bind(holiday.date)
            .bind(&holiday.name)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_holidays(&self, business_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Holiday>, AppError> {
        sqlx::query_as::<_, Holiday>("SELECT * FROM holidays WHERE business_id = ? AND date >= ? AND date <= ? ORDER BY date ASC")
            .bind(business_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
