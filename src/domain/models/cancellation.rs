use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct CancellationPolicy {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub hours_before: i32,
    pub penalty_percent: i32,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl CancellationPolicy {
    pub fn new(business_id: String, name: String, hours_before: i32, penalty_percent: i32, is_default: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_id,
            name,
            hours_before,
            penalty_percent,
            is_default,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct CancellationQuote {
    pub penalty_cents: i64,
    pub refund_cents: i64,
}
