use crate::domain::{
    models::{
        group::{GroupBooking, GroupParticipant, NewGroup, ParticipantShare},
        notification::Notification,
    },
    ports::GroupRepository,
    services::group::compute_shares,
};
use crate::error::AppError;
use crate::infra::repositories::sqlite_notification_repo::insert_notification;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

pub struct SqliteGroupRepo {
    pool: SqlitePool,
}

impl SqliteGroupRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_group(conn: &mut SqliteConnection, new_group: &NewGroup) -> Result<(), AppError> {
    let group = &new_group.group;
    sqlx::query(
        "INSERT INTO group_bookings (id, business_id, booking_id, organizer_customer_id, min_participants, max_participants, current_participants, payment_split_type, total_amount_cents, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
        .bind(&group.id).bind(&group.business_id).bind(&group.booking_id).bind(&group.organizer_customer_id)
        .bind(group.min_participants).bind(group.max_participants).bind(group.current_participants)
        .bind(group.payment_split_type.as_str()).bind(group.total_amount_cents).bind(group.status.as_str())
        .bind(group.created_at).bind(group.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(AppError::Database)?;

    insert_participant(conn, &new_group.organizer).await
}

async fn insert_participant(conn: &mut SqliteConnection, participant: &GroupParticipant) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO group_participants (id, group_booking_id, customer_id, is_organizer, amount_owed_cents, status, joined_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
        .bind(&participant.id).bind(&participant.group_booking_id).bind(&participant.customer_id)
        .bind(participant.is_organizer).bind(participant.amount_owed_cents).bind(participant.status.as_str())
        .bind(participant.joined_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match AppError::Database(e) {
            err if err.is_unique_violation() => {
                AppError::Conflict(format!("Customer {} already joined this group", participant.customer_id))
            }
            err => err,
        })?;
    Ok(())
}

async fn write_shares(conn: &mut SqliteConnection, group_id: &str, shares: &[ParticipantShare]) -> Result<(), AppError> {
    for share in shares {
        let result = sqlx::query(
            "UPDATE group_participants SET amount_owed_cents = ?
             WHERE id = ? AND group_booking_id = ? AND status = 'joined'"
        )
            .bind(share.amount_owed_cents)
            .bind(&share.participant_id)
            .bind(group_id)
            .execute(&mut *conn)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!("Participant {} is no longer in the group", share.participant_id)));
        }
    }
    Ok(())
}

/// Rebalances the shares against the participant rows as seen inside the
/// current transaction.
async fn settle_shares(conn: &mut SqliteConnection, group: &GroupBooking) -> Result<(), AppError> {
    let participants = sqlx::query_as::<_, GroupParticipant>("SELECT * FROM group_participants WHERE group_booking_id = ?")
        .bind(&group.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(AppError::Database)?;

    let shares = compute_shares(group.payment_split_type, group.total_amount_cents, &participants);
    write_shares(conn, &group.id, &shares).await
}

#[async_trait]
impl GroupRepository for SqliteGroupRepo {
    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<GroupBooking>, AppError> {
        sqlx::query_as::<_, GroupBooking>("SELECT * FROM group_bookings WHERE business_id = ? AND id = ?")
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_participants(&self, group_id: &str) -> Result<Vec<GroupParticipant>, AppError> {
        sqlx::query_as::<_, GroupParticipant>(
            "SELECT * FROM group_participants WHERE group_booking_id = ? ORDER BY is_organizer DESC, joined_at ASC, id ASC"
        )
            .bind(group_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn add_participant(&self, group: &GroupBooking, participant: &GroupParticipant) -> Result<GroupBooking, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let updated = sqlx::query_as::<_, GroupBooking>(
            "UPDATE group_bookings SET current_participants = current_participants + 1, updated_at = ?
             WHERE id = ? AND status != 'cancelled' AND current_participants < max_participants
             RETURNING *"
        )
            .bind(participant.joined_at)
            .bind(&group.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::Conflict("Group is full".into()))?;

        insert_participant(&mut tx, participant).await?;
        settle_shares(&mut tx, &updated).await?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(updated)
    }

    async fn remove_participant(&self, group: &GroupBooking, participant_id: &str, now: DateTime<Utc>) -> Result<GroupBooking, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let updated = sqlx::query_as::<_, GroupBooking>(
            "UPDATE group_bookings SET current_participants = current_participants - 1, updated_at = ?
             WHERE id = ? AND status != 'cancelled'
               AND (status = 'open' OR current_participants - 1 >= min_participants)
             RETURNING *"
        )
            .bind(now)
            .bind(&group.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::Conflict("Participant cannot leave this group".into()))?;

        let result = sqlx::query(
            "UPDATE group_participants SET status = 'left', amount_owed_cents = 0
             WHERE id = ? AND group_booking_id = ? AND status = 'joined' AND is_organizer = FALSE"
        )
            .bind(participant_id)
            .bind(&group.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Participant {} not found", participant_id)));
        }

        settle_shares(&mut tx, &updated).await?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(updated)
    }

    async fn set_shares(&self, group_id: &str, shares: &[ParticipantShare]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        write_shares(&mut tx, group_id, shares).await?;
        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn confirm(&self, group: &GroupBooking, notification: &Notification, now: DateTime<Utc>) -> Result<GroupBooking, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let updated = sqlx::query_as::<_, GroupBooking>(
            "UPDATE group_bookings SET status = 'confirmed', updated_at = ?
             WHERE id = ? AND status = 'open' AND current_participants >= min_participants
             RETURNING *"
        )
            .bind(now)
            .bind(&group.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::Conflict("Group can no longer be confirmed".into()))?;

        settle_shares(&mut tx, &updated).await?;

        sqlx::query(
            "UPDATE bookings SET status = 'confirmed', updated_at = ?
             WHERE id = ? AND status IN ('pending', 'pending_payment')"
        )
            .bind(now)
            .bind(&updated.booking_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        insert_notification(&mut tx, notification).await?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(updated)
    }
}
