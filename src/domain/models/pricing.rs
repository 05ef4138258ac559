use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModifierType {
    /// `modifier_value` is a whole percentage added to the base price.
    Percentage,
    /// `modifier_value` is an amount in minor currency units.
    Fixed,
}

impl ModifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifierType::Percentage => "percentage",
            ModifierType::Fixed => "fixed",
        }
    }
}

impl TryFrom<String> for ModifierType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "percentage" => Ok(ModifierType::Percentage),
            "fixed" => Ok(ModifierType::Fixed),
            other => Err(AppError::Validation(format!("Unknown modifier type: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct PricingRule {
    pub id: String,
    pub service_id: String,
    pub name: String,
    /// Bit 0 = Monday ... bit 6 = Sunday. `None` matches every day.
    pub days_mask: Option<i32>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub modifier_type: ModifierType,
    pub modifier_value: i64,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

pub struct NewPricingRuleParams {
    pub service_id: String,
    pub name: String,
    pub days: Option<Vec<Weekday>>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub modifier_type: ModifierType,
    pub modifier_value: i64,
    pub priority: i32,
}

impl PricingRule {
    pub fn new(params: NewPricingRuleParams) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            service_id: params.service_id,
            name: params.name,
            days_mask: params.days.as_deref().map(days_to_mask),
            start_time: params.start_time,
            end_time: params.end_time,
            start_date: params.start_date,
            end_date: params.end_date,
            modifier_type: params.modifier_type,
            modifier_value: params.modifier_value,
            priority: params.priority,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

pub fn days_to_mask(days: &[Weekday]) -> i32 {
    days.iter().fold(0, |mask, day| mask | (1 << day.num_days_from_monday()))
}

pub fn mask_contains(mask: i32, day: Weekday) -> bool {
    mask & (1 << day.num_days_from_monday()) != 0
}

/// Result of a price evaluation.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PriceQuote {
    pub base_price_cents: i64,
    pub effective_price_cents: i64,
    pub applied_rule: Option<AppliedRule>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AppliedRule {
    pub id: String,
    pub name: String,
    pub modifier_type: ModifierType,
    pub modifier_value: i64,
    pub priority: i32,
}
