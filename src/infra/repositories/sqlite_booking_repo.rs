use crate::domain::{
    models::booking::{Booking, BookingStatus, BookingWrite, OccupiedInterval, RescheduleWrite, StatusChange},
    ports::BookingRepository,
    services::conflict,
};
use crate::error::AppError;
use crate::infra::repositories::{
    sqlite_group_repo::insert_group, sqlite_notification_repo::insert_notification,
    sqlite_waitlist_repo::{apply_transition, expire_entry},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

const OCCUPIED_SQL: &str =
    "SELECT b.* FROM bookings b
     JOIN booking_resources br ON br.booking_id = b.id
     WHERE br.resource_id = ?
       AND b.status IN ('pending', 'pending_payment', 'confirmed')
       AND b.occupied_from < ? AND b.occupied_until > ?
     ORDER BY b.occupied_from ASC";

pub struct SqliteBookingRepo {
    pool: SqlitePool,
}

impl SqliteBookingRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Bumps the lock version of every resource, in id order. This is the first
/// write of the transaction so concurrent writers queue behind it.
async fn lock_resources(conn: &mut SqliteConnection, business_id: &str, resource_ids: &[String]) -> Result<(), AppError> {
    let mut ids = resource_ids.to_vec();
    ids.sort();
    ids.dedup();

    for id in &ids {
        let result = sqlx::query(
            "UPDATE resources SET lock_version = lock_version + 1
             WHERE id = ? AND business_id = ? AND is_active = TRUE AND deleted_at IS NULL"
        )
            .bind(id)
            .bind(business_id)
            .execute(&mut *conn)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Resource {} not found", id)));
        }
    }
    Ok(())
}

async fn occupied_in_tx(
    conn: &mut SqliteConnection,
    resource_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<OccupiedInterval>, AppError> {
    let rows = sqlx::query_as::<_, Booking>(OCCUPIED_SQL)
        .bind(resource_id)
        .bind(end)
        .bind(start)
        .fetch_all(&mut *conn)
        .await
        .map_err(AppError::Database)?;
    Ok(rows.iter().map(Booking::occupied).collect())
}

async fn ensure_resources_free(
    conn: &mut SqliteConnection,
    resource_ids: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<&str>,
) -> Result<(), AppError> {
    for resource_id in resource_ids {
        let existing = occupied_in_tx(conn, resource_id, start, end).await?;
        conflict::ensure_free(start, end, &existing, exclude)?;
    }
    Ok(())
}

#[async_trait]
impl BookingRepository for SqliteBookingRepo {
    async fn create(&self, write: &BookingWrite) -> Result<Booking, AppError> {
        let booking = &write.booking;
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        lock_resources(&mut tx, &booking.business_id, &write.resource_ids).await?;
        ensure_resources_free(&mut tx, &write.resource_ids, booking.occupied_from, booking.occupied_until, None).await?;

        let created = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, business_id, service_id, resource_id, customer_id, start_at, end_at, occupied_from, occupied_until, status, price_cents, currency, applied_rule_id, waitlist_entry_id, cancellation_reason, penalty_cents, refund_cents, metadata, created_at, updated_at, cancelled_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&booking.id).bind(&booking.business_id).bind(&booking.service_id).bind(&booking.resource_id)
            .bind(&booking.customer_id).bind(booking.start_at).bind(booking.end_at).bind(booking.occupied_from)
            .bind(booking.occupied_until).bind(booking.status.as_str()).bind(booking.price_cents).bind(&booking.currency)
            .bind(&booking.applied_rule_id).bind(&booking.waitlist_entry_id).bind(&booking.cancellation_reason)
            .bind(booking.penalty_cents).bind(booking.refund_cents).bind(&booking.metadata)
            .bind(booking.created_at).bind(booking.updated_at).bind(booking.cancelled_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        for resource_id in &write.resource_ids {
            sqlx::query("INSERT INTO booking_resources (booking_id, resource_id) VALUES (?, ?)")
                .bind(&created.id)
                .bind(resource_id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
        }

        if let Some(key) = &write.idempotency {
            let result = sqlx::query(
                "UPDATE idempotency_keys SET status = 'completed', booking_id = ?
                 WHERE scope = ? AND key = ? AND status = 'pending'"
            )
                .bind(&created.id)
                .bind(&key.scope)
                .bind(&key.key)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
            if result.rows_affected() == 0 {
                return Err(AppError::Conflict("Idempotency key is no longer held by this request".into()));
            }
        }

        if let Some(transition) = &write.waitlist {
            apply_transition(&mut tx, transition).await?;
        }
        if let Some(group) = &write.group {
            insert_group(&mut tx, group).await?;
        }
        for notification in &write.notifications {
            insert_notification(&mut tx, notification).await?;
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(created)
    }

    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE business_id = ? AND id = ?")
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list(&self, business_id: &str, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<Vec<Booking>, AppError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM bookings WHERE business_id = ");
        query.push_bind(business_id);
        if let Some(from) = from {
            query.push(" AND end_at > ").push_bind(from);
        }
        if let Some(until) = until {
            query.push(" AND start_at < ").push_bind(until);
        }
        query.push(" ORDER BY start_at ASC");

        query.build_query_as::<Booking>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_resource_ids(&self, booking_id: &str) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>("SELECT resource_id FROM booking_resources WHERE booking_id = ? ORDER BY resource_id ASC")
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_occupied(&self, resource_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<OccupiedInterval>, AppError> {
        let rows = sqlx::query_as::<_, Booking>(OCCUPIED_SQL)
            .bind(resource_id)
            .bind(end)
            .bind(start)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(rows.iter().map(Booking::occupied).collect())
    }

    async fn reschedule(&self, write: &RescheduleWrite) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        lock_resources(&mut tx, &write.business_id, &write.resource_ids).await?;
        ensure_resources_free(&mut tx, &write.resource_ids, write.occupied_from, write.occupied_until, Some(&write.booking_id)).await?;

        let updated = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET start_at = ?, end_at = ?, occupied_from = ?, occupied_until = ?, updated_at = ?
             WHERE id = ? AND business_id = ? AND status IN ('pending', 'pending_payment', 'confirmed')
             RETURNING *"
        )
            .bind(write.start_at).bind(write.end_at).bind(write.occupied_from).bind(write.occupied_until)
            .bind(write.at).bind(&write.booking_id).bind(&write.business_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::Conflict(format!("Booking {} is no longer active", write.booking_id)))?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(updated)
    }

    async fn change_status(&self, change: &StatusChange) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let updated = match &change.cancellation {
            Some(record) => sqlx::query_as::<_, Booking>(
                "UPDATE bookings SET status = ?, cancellation_reason = ?, penalty_cents = ?, refund_cents = ?, cancelled_at = ?, updated_at = ?
                 WHERE id = ? AND business_id = ? AND status = ?
                 RETURNING *"
            )
                .bind(change.to.as_str()).bind(&record.reason).bind(record.penalty_cents).bind(record.refund_cents)
                .bind(change.at).bind(change.at)
                .bind(&change.booking_id).bind(&change.business_id).bind(change.from.as_str())
                .fetch_optional(&mut *tx)
                .await,
            None => sqlx::query_as::<_, Booking>(
                "UPDATE bookings SET status = ?, updated_at = ?
                 WHERE id = ? AND business_id = ? AND status = ?
                 RETURNING *"
            )
                .bind(change.to.as_str()).bind(change.at)
                .bind(&change.booking_id).bind(&change.business_id).bind(change.from.as_str())
                .fetch_optional(&mut *tx)
                .await,
        }
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::Conflict(format!("Booking {} was changed concurrently", change.booking_id)))?;

        if change.to == BookingStatus::Cancelled {
            sqlx::query(
                "UPDATE group_bookings SET status = 'cancelled', updated_at = ?
                 WHERE booking_id = ? AND status != 'cancelled'"
            )
                .bind(change.at)
                .bind(&updated.id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
        }

        for expiry in &change.waitlist_expirations {
            expire_entry(&mut tx, expiry).await?;
        }
        if let Some(offer) = &change.waitlist_offer {
            apply_transition(&mut tx, offer).await?;
        }
        for notification in &change.notifications {
            insert_notification(&mut tx, notification).await?;
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(updated)
    }
}
