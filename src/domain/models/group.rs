use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSplitType {
    OrganizerPays,
    SplitEqual,
    Individual,
}

impl PaymentSplitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSplitType::OrganizerPays => "organizer_pays",
            PaymentSplitType::SplitEqual => "split_equal",
            PaymentSplitType::Individual => "individual",
        }
    }
}

impl TryFrom<String> for PaymentSplitType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "organizer_pays" => Ok(PaymentSplitType::OrganizerPays),
            "split_equal" => Ok(PaymentSplitType::SplitEqual),
            "individual" => Ok(PaymentSplitType::Individual),
            other => Err(AppError::Validation(format!("Unknown payment split type: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Open,
    Confirmed,
    Cancelled,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Open => "open",
            GroupStatus::Confirmed => "confirmed",
            GroupStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: GroupStatus) -> bool {
        matches!(
            (self, next),
            (GroupStatus::Open, GroupStatus::Confirmed)
                | (GroupStatus::Open, GroupStatus::Cancelled)
                | (GroupStatus::Confirmed, GroupStatus::Cancelled)
        )
    }
}

impl TryFrom<String> for GroupStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "open" => Ok(GroupStatus::Open),
            "confirmed" => Ok(GroupStatus::Confirmed),
            "cancelled" => Ok(GroupStatus::Cancelled),
            other => Err(AppError::Validation(format!("Unknown group status: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Joined,
    Left,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Joined => "joined",
            ParticipantStatus::Left => "left",
        }
    }
}

impl TryFrom<String> for ParticipantStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "joined" => Ok(ParticipantStatus::Joined),
            "left" => Ok(ParticipantStatus::Left),
            other => Err(AppError::Validation(format!("Unknown participant status: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct GroupBooking {
    pub id: String,
    pub business_id: String,
    pub booking_id: String,
    pub organizer_customer_id: String,
    pub min_participants: i32,
    pub max_participants: i32,
    pub current_participants: i32,
    #[sqlx(try_from = "String")]
    pub payment_split_type: PaymentSplitType,
    pub total_amount_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct GroupParticipant {
    pub id: String,
    pub group_booking_id: String,
    pub customer_id: String,
    pub is_organizer: bool,
    pub amount_owed_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: ParticipantStatus,
    pub joined_at: DateTime<Utc>,
}

impl GroupParticipant {
    pub fn new(group_booking_id: String, customer_id: String, is_organizer: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group_booking_id,
            customer_id,
            is_organizer,
            amount_owed_cents: 0,
            status: ParticipantStatus::Joined,
            joined_at: Utc::now(),
        }
    }
}

/// Group rows created together with their booking.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub group: GroupBooking,
    pub organizer: GroupParticipant,
}

pub struct NewGroupParams {
    pub business_id: String,
    pub booking_id: String,
    pub organizer_customer_id: String,
    pub min_participants: i32,
    pub max_participants: i32,
    pub payment_split_type: PaymentSplitType,
    pub total_amount_cents: i64,
}

impl NewGroup {
    pub fn new(params: NewGroupParams) -> Self {
        let now = Utc::now();
        let group = GroupBooking {
            id: Uuid::new_v4().to_string(),
            business_id: params.business_id,
            booking_id: params.booking_id,
            organizer_customer_id: params.organizer_customer_id.clone(),
            min_participants: params.min_participants,
            max_participants: params.max_participants,
            current_participants: 1,
            payment_split_type: params.payment_split_type,
            total_amount_cents: params.total_amount_cents,
            status: GroupStatus::Open,
            created_at: now,
            updated_at: now,
        };
        let mut organizer = GroupParticipant::new(group.id.clone(), params.organizer_customer_id, true);
        organizer.amount_owed_cents = params.total_amount_cents;
        Self { group, organizer }
    }
}

/// Amount owed by one participant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ParticipantShare {
    pub participant_id: String,
    pub amount_owed_cents: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct GroupDetails {
    pub group: GroupBooking,
    pub participants: Vec<GroupParticipant>,
}
