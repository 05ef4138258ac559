//! Group bookings: participant seats and payment shares.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::models::group::{
    GroupBooking, GroupDetails, GroupParticipant, GroupStatus, ParticipantShare, ParticipantStatus, PaymentSplitType,
};
use crate::domain::models::notification::{Notification, KIND_GROUP_CONFIRMED};
use crate::domain::ports::{AuditEntry, AuditSink, GroupRepository};
use crate::error::AppError;

/// `1 <= min <= max`, and `max` may not exceed what the smallest resource hosts.
pub fn validate_bounds(min: i32, max: i32, resource_capacity: Option<i32>) -> Result<(), AppError> {
    if min < 1 || min > max {
        return Err(AppError::Validation("Group size requires 1 <= min_participants <= max_participants".into()));
    }
    if let Some(capacity) = resource_capacity
        && max > capacity {
        return Err(AppError::Validation(format!(
            "max_participants {} exceeds resource capacity {}", max, capacity
        )));
    }
    Ok(())
}

/// Joined participants, organizer first, then in join order.
pub fn seat_order(participants: &[GroupParticipant]) -> Vec<&GroupParticipant> {
    let mut joined: Vec<&GroupParticipant> = participants.iter()
        .filter(|p| p.status == ParticipantStatus::Joined)
        .collect();
    joined.sort_by(|a, b| {
        b.is_organizer.cmp(&a.is_organizer)
            .then(a.joined_at.cmp(&b.joined_at))
            .then(a.id.cmp(&b.id))
    });
    joined
}

/// Shares for the joined participants.
///
/// For `individual` splits the amounts already assigned to other
/// participants are kept and the organizer absorbs the remainder, so the
/// shares always add up to the total.
pub fn compute_shares(split: PaymentSplitType, total_cents: i64, participants: &[GroupParticipant]) -> Vec<ParticipantShare> {
    let seats = seat_order(participants);
    if seats.is_empty() {
        return Vec::new();
    }

    let amounts: Vec<i64> = match split {
        PaymentSplitType::OrganizerPays => {
            std::iter::once(total_cents).chain(std::iter::repeat_n(0, seats.len() - 1)).collect()
        }
        PaymentSplitType::SplitEqual => {
            let n = seats.len() as i64;
            let each = total_cents / n;
            let remainder = total_cents - each * n;
            (0..seats.len()).map(|i| if i == 0 { each + remainder } else { each }).collect()
        }
        PaymentSplitType::Individual => {
            let others: i64 = seats.iter().skip(1).map(|p| p.amount_owed_cents).sum();
            std::iter::once(total_cents - others)
                .chain(seats.iter().skip(1).map(|p| p.amount_owed_cents))
                .collect()
        }
    };

    seats.iter().zip(amounts)
        .map(|(p, amount)| ParticipantShare { participant_id: p.id.clone(), amount_owed_cents: amount })
        .collect()
}

/// Caller supplied amounts must name every joined participant exactly once
/// and sum to the total.
pub fn validate_individual_shares(
    total_cents: i64,
    participants: &[GroupParticipant],
    requested: &[ParticipantShare],
) -> Result<Vec<ParticipantShare>, AppError> {
    let seats = seat_order(participants);
    let by_id: HashMap<&str, i64> = requested.iter()
        .map(|s| (s.participant_id.as_str(), s.amount_owed_cents))
        .collect();

    if by_id.len() != requested.len() || by_id.len() != seats.len() {
        return Err(AppError::Validation("Shares must list each joined participant exactly once".into()));
    }
    if requested.iter().any(|s| s.amount_owed_cents < 0) {
        return Err(AppError::Validation("Share amounts cannot be negative".into()));
    }

    let mut shares = Vec::with_capacity(seats.len());
    for seat in seats {
        let amount = by_id.get(seat.id.as_str()).copied().ok_or_else(|| {
            AppError::Validation(format!("Missing share for participant {}", seat.id))
        })?;
        shares.push(ParticipantShare { participant_id: seat.id.clone(), amount_owed_cents: amount });
    }

    let sum: i64 = shares.iter().map(|s| s.amount_owed_cents).sum();
    if sum != total_cents {
        return Err(AppError::Validation(format!("Shares sum to {} but the total is {}", sum, total_cents)));
    }
    Ok(shares)
}

pub struct GroupBookingAllocator {
    repo: Arc<dyn GroupRepository>,
    audit: Arc<dyn AuditSink>,
}

impl GroupBookingAllocator {
    pub fn new(repo: Arc<dyn GroupRepository>, audit: Arc<dyn AuditSink>) -> Self {
        Self { repo, audit }
    }

    async fn load(&self, business_id: &str, group_id: &str) -> Result<GroupBooking, AppError> {
        self.repo.find_by_id(business_id, group_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)))
    }

    async fn details(&self, group: GroupBooking) -> Result<GroupDetails, AppError> {
        let participants = self.repo.list_participants(&group.id).await?;
        Ok(GroupDetails { group, participants })
    }

    fn audit(&self, before: &GroupBooking, after: &GroupBooking, action: &'static str, now: DateTime<Utc>) {
        self.audit.record(AuditEntry {
            business_id: after.business_id.clone(),
            entity: "group_booking",
            entity_id: after.id.clone(),
            action,
            before: serde_json::to_value(before).ok(),
            after: serde_json::to_value(after).ok(),
            at: now,
        });
    }

    pub async fn get(&self, business_id: &str, group_id: &str) -> Result<GroupDetails, AppError> {
        let group = self.load(business_id, group_id).await?;
        self.details(group).await
    }

    pub async fn join(&self, business_id: &str, group_id: &str, customer_id: &str, now: DateTime<Utc>) -> Result<GroupDetails, AppError> {
        let group = self.load(business_id, group_id).await?;
        if group.status == GroupStatus::Cancelled {
            return Err(AppError::Conflict("Group booking is cancelled".into()));
        }
        if group.current_participants >= group.max_participants {
            return Err(AppError::Conflict("Group is full".into()));
        }
        let participants = self.repo.list_participants(&group.id).await?;
        if participants.iter().any(|p| p.customer_id == customer_id && p.status == ParticipantStatus::Joined) {
            return Err(AppError::Conflict(format!("Customer {} already joined this group", customer_id)));
        }

        let participant = GroupParticipant::new(group.id.clone(), customer_id.to_string(), false);
        let updated = self.repo.add_participant(&group, &participant).await?;
        info!(group_id = %group.id, customer_id, current = updated.current_participants, "Participant joined group");
        self.audit(&group, &updated, "participant_joined", now);
        self.details(updated).await
    }

    pub async fn leave(&self, business_id: &str, group_id: &str, customer_id: &str, now: DateTime<Utc>) -> Result<GroupDetails, AppError> {
        let group = self.load(business_id, group_id).await?;
        let participants = self.repo.list_participants(&group.id).await?;
        let participant = participants.iter()
            .find(|p| p.customer_id == customer_id && p.status == ParticipantStatus::Joined)
            .ok_or_else(|| AppError::NotFound(format!("Customer {} is not in this group", customer_id)))?;

        if participant.is_organizer {
            return Err(AppError::Validation("The organizer cannot leave the group".into()));
        }
        if group.status == GroupStatus::Cancelled {
            return Err(AppError::Conflict("Group booking is cancelled".into()));
        }
        if group.status == GroupStatus::Confirmed && group.current_participants - 1 < group.min_participants {
            return Err(AppError::Conflict("A confirmed group cannot drop below its minimum size".into()));
        }

        let updated = self.repo.remove_participant(&group, &participant.id, now).await?;
        info!(group_id = %group.id, customer_id, current = updated.current_participants, "Participant left group");
        self.audit(&group, &updated, "participant_left", now);
        self.details(updated).await
    }

    pub async fn confirm(&self, business_id: &str, group_id: &str, actor_customer_id: &str, now: DateTime<Utc>) -> Result<GroupDetails, AppError> {
        let group = self.load(business_id, group_id).await?;
        if group.organizer_customer_id != actor_customer_id {
            return Err(AppError::Forbidden("Only the organizer can confirm the group".into()));
        }
        if !group.status.can_transition_to(GroupStatus::Confirmed) {
            return Err(AppError::Conflict(format!("Group is already {}", group.status.as_str())));
        }
        if group.current_participants < group.min_participants {
            return Err(AppError::Conflict(format!(
                "Group needs at least {} participants, has {}",
                group.min_participants, group.current_participants
            )));
        }

        let notification = Notification::new(&group.business_id, KIND_GROUP_CONFIRMED, serde_json::json!({
            "group_booking_id": group.id,
            "booking_id": group.booking_id,
            "organizer_customer_id": group.organizer_customer_id,
            "total_amount_cents": group.total_amount_cents,
        }));

        let updated = self.repo.confirm(&group, &notification, now).await?;
        info!(group_id = %group.id, "Group booking confirmed");
        self.audit(&group, &updated, "confirmed", now);
        self.details(updated).await
    }

    /// Sets caller chosen amounts on an `individual` split group.
    pub async fn set_shares(
        &self,
        business_id: &str,
        group_id: &str,
        actor_customer_id: &str,
        requested: &[ParticipantShare],
        now: DateTime<Utc>,
    ) -> Result<GroupDetails, AppError> {
        let group = self.load(business_id, group_id).await?;
        if group.organizer_customer_id != actor_customer_id {
            return Err(AppError::Forbidden("Only the organizer can set shares".into()));
        }
        if group.payment_split_type != PaymentSplitType::Individual {
            return Err(AppError::Validation("Shares can only be set on individual split groups".into()));
        }
        if group.status == GroupStatus::Cancelled {
            return Err(AppError::Conflict("Group booking is cancelled".into()));
        }

        let participants = self.repo.list_participants(&group.id).await?;
        let shares = validate_individual_shares(group.total_amount_cents, &participants, requested)?;
        self.repo.set_shares(&group.id, &shares).await?;
        self.audit(&group, &group, "shares_set", now);
        self.details(group).await
    }
}
