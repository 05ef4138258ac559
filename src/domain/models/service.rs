use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Service {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub duration_min: Option<i32>,
    pub buffer_before_min: i32,
    pub buffer_after_min: i32,
    pub base_price_cents: i64,
    pub currency: String,
    pub cancellation_policy_id: Option<String>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct NewServiceParams {
    pub business_id: String,
    pub name: String,
    pub duration_min: Option<i32>,
    pub buffer_before_min: i32,
    pub buffer_after_min: i32,
    pub base_price_cents: i64,
    pub currency: String,
    pub cancellation_policy_id: Option<String>,
}

impl Service {
    pub fn new(params: NewServiceParams) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_id: params.business_id,
            name: params.name,
            duration_min: params.duration_min,
            buffer_before_min: params.buffer_before_min,
            buffer_after_min: params.buffer_after_min,
            base_price_cents: params.base_price_cents,
            currency: params.currency,
            cancellation_policy_id: params.cancellation_policy_id,
            is_active: true,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ServiceResource {
    pub service_id: String,
    pub resource_id: String,
    pub is_required: bool,
}
