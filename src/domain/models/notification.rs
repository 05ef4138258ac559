use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

pub const KIND_BOOKING_CONFIRMED: &str = "booking_confirmed";
pub const KIND_BOOKING_CANCELLED: &str = "booking_cancelled";
pub const KIND_WAITLIST_OFFER: &str = "waitlist_offer";
pub const KIND_GROUP_CONFIRMED: &str = "group_confirmed";

/// An outbox row. Delivery happens outside the engine.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Notification {
    pub id: String,
    pub business_id: String,
    pub kind: String,
    pub payload: Json<serde_json::Value>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(business_id: &str, kind: &str, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            kind: kind.to_string(),
            payload: Json(payload),
            status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }
}
