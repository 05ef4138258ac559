use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::models::{
    group::NewGroup, idempotency::IdempotencyRef, notification::Notification,
    waitlist::WaitlistTransition,
};
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    PendingPayment,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub const ACTIVE: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::PendingPayment,
        BookingStatus::Confirmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Active bookings hold their resources and take part in conflict checks.
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, PendingPayment)
                | (Pending, Confirmed)
                | (Pending, Cancelled)
                | (PendingPayment, Confirmed)
                | (PendingPayment, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, NoShow)
        )
    }

    /// Transitions that hand the booked slot back to the pool.
    pub fn frees_slot(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::NoShow)
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "pending_payment" => Ok(BookingStatus::PendingPayment),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(AppError::Validation(format!("Unknown booking status: {}", other))),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const METADATA_MAX_KEYS: usize = 32;
const METADATA_MAX_KEY_LEN: usize = 64;
const METADATA_MAX_STRING_LEN: usize = 512;

/// Client supplied extension fields attached to a booking.
///
/// Only flat scalar values are accepted; nested objects and arrays are
/// rejected at the boundary so nothing untyped reaches the engine.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct BookingMetadata(pub BTreeMap<String, serde_json::Value>);

impl BookingMetadata {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.0.len() > METADATA_MAX_KEYS {
            return Err(AppError::Validation(format!("Metadata may hold at most {} keys", METADATA_MAX_KEYS)));
        }
        for (key, value) in &self.0 {
            let key_ok = !key.is_empty()
                && key.len() <= METADATA_MAX_KEY_LEN
                && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !key_ok {
                return Err(AppError::Validation(format!("Invalid metadata key: {}", key)));
            }
            match value {
                serde_json::Value::String(s) if s.chars().count() > METADATA_MAX_STRING_LEN => {
                    return Err(AppError::Validation(format!("Metadata value for {} is too long", key)));
                }
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(AppError::Validation(format!("Metadata value for {} must be a scalar", key)));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Booking {
    pub id: String,
    pub business_id: String,
    pub service_id: Option<String>,
    pub resource_id: Option<String>,
    pub customer_id: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub occupied_from: DateTime<Utc>,
    pub occupied_until: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub price_cents: i64,
    pub currency: String,
    pub applied_rule_id: Option<String>,
    pub waitlist_entry_id: Option<String>,
    pub cancellation_reason: Option<String>,
    pub penalty_cents: Option<i64>,
    pub refund_cents: Option<i64>,
    pub metadata: Option<Json<BookingMetadata>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

pub struct NewBookingParams {
    pub business_id: String,
    pub service_id: Option<String>,
    pub resource_id: Option<String>,
    pub customer_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub buffer_before_min: i64,
    pub buffer_after_min: i64,
    pub status: BookingStatus,
    pub price_cents: i64,
    pub currency: String,
    pub applied_rule_id: Option<String>,
    pub waitlist_entry_id: Option<String>,
    pub metadata: Option<BookingMetadata>,
}

impl Booking {
    pub fn new(params: NewBookingParams) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            business_id: params.business_id,
            service_id: params.service_id,
            resource_id: params.resource_id,
            customer_id: params.customer_id,
            start_at: params.start,
            end_at: params.end,
            occupied_from: params.start - Duration::minutes(params.buffer_before_min),
            occupied_until: params.end + Duration::minutes(params.buffer_after_min),
            status: params.status,
            price_cents: params.price_cents,
            currency: params.currency,
            applied_rule_id: params.applied_rule_id,
            waitlist_entry_id: params.waitlist_entry_id,
            cancellation_reason: None,
            penalty_cents: None,
            refund_cents: None,
            metadata: params.metadata.map(Json),
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        }
    }

    pub fn occupied(&self) -> OccupiedInterval {
        OccupiedInterval {
            booking_id: self.id.clone(),
            start: self.occupied_from,
            end: self.occupied_until,
        }
    }
}

/// The span a booking blocks on its resources, buffers included.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct OccupiedInterval {
    pub booking_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A booking insert together with everything that must commit with it.
pub struct BookingWrite {
    pub booking: Booking,
    pub resource_ids: Vec<String>,
    pub idempotency: Option<IdempotencyRef>,
    /// Conversion of the waitlist entry the booking was made from.
    pub waitlist: Option<WaitlistTransition>,
    pub group: Option<NewGroup>,
    pub notifications: Vec<Notification>,
}

/// Moving an active booking to a new time.
pub struct RescheduleWrite {
    pub business_id: String,
    pub booking_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub occupied_from: DateTime<Utc>,
    pub occupied_until: DateTime<Utc>,
    pub resource_ids: Vec<String>,
    pub at: DateTime<Utc>,
}

/// A status change, optionally carrying the side effects of a freed slot.
pub struct StatusChange {
    pub business_id: String,
    pub booking_id: String,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub at: DateTime<Utc>,
    pub cancellation: Option<CancellationRecord>,
    /// Offer of the freed slot; the whole change fails if the entry moved.
    pub waitlist_offer: Option<WaitlistTransition>,
    /// Lapsed entries found while evaluating. Rows already closed are skipped.
    pub waitlist_expirations: Vec<WaitlistTransition>,
    pub notifications: Vec<Notification>,
}

pub struct CancellationRecord {
    pub reason: Option<String>,
    pub penalty_cents: i64,
    pub refund_cents: i64,
}
