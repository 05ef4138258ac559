use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use std::fmt;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Active,
    Notified,
    Converted,
    Cancelled,
    Expired,
}

impl WaitlistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitlistStatus::Active => "active",
            WaitlistStatus::Notified => "notified",
            WaitlistStatus::Converted => "converted",
            WaitlistStatus::Cancelled => "cancelled",
            WaitlistStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WaitlistStatus::Converted | WaitlistStatus::Cancelled | WaitlistStatus::Expired)
    }

    pub fn can_transition_to(&self, next: WaitlistStatus) -> bool {
        use WaitlistStatus::*;
        matches!(
            (self, next),
            (Active, Notified)
                | (Notified, Notified)
                | (Notified, Converted)
                | (Active, Expired)
                | (Notified, Expired)
                | (Active, Cancelled)
                | (Notified, Cancelled)
        )
    }
}

impl TryFrom<String> for WaitlistStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(WaitlistStatus::Active),
            "notified" => Ok(WaitlistStatus::Notified),
            "converted" => Ok(WaitlistStatus::Converted),
            "cancelled" => Ok(WaitlistStatus::Cancelled),
            "expired" => Ok(WaitlistStatus::Expired),
            other => Err(AppError::Validation(format!("Unknown waitlist status: {}", other))),
        }
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification tier. Declaration order is ranking order, lowest first.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistPriority {
    Low,
    Normal,
    High,
    Vip,
}

impl WaitlistPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitlistPriority::Low => "low",
            WaitlistPriority::Normal => "normal",
            WaitlistPriority::High => "high",
            WaitlistPriority::Vip => "vip",
        }
    }
}

impl TryFrom<String> for WaitlistPriority {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "low" => Ok(WaitlistPriority::Low),
            "normal" => Ok(WaitlistPriority::Normal),
            "high" => Ok(WaitlistPriority::High),
            "vip" => Ok(WaitlistPriority::Vip),
            other => Err(AppError::Validation(format!("Unknown waitlist priority: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct WaitlistEntry {
    pub id: String,
    pub business_id: String,
    pub service_id: String,
    pub customer_id: String,
    pub resource_id: Option<String>,
    pub preferred_date: NaiveDate,
    pub preferred_start: Option<NaiveTime>,
    pub preferred_end: Option<NaiveTime>,
    #[sqlx(try_from = "String")]
    pub status: WaitlistStatus,
    #[sqlx(try_from = "String")]
    pub priority: WaitlistPriority,
    pub notification_count: i32,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub response_deadline: Option<DateTime<Utc>>,
    pub converted_booking_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewWaitlistParams {
    pub business_id: String,
    pub service_id: String,
    pub customer_id: String,
    pub resource_id: Option<String>,
    pub preferred_date: NaiveDate,
    pub preferred_start: Option<NaiveTime>,
    pub preferred_end: Option<NaiveTime>,
    pub priority: WaitlistPriority,
}

impl WaitlistEntry {
    pub fn new(params: NewWaitlistParams) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            business_id: params.business_id,
            service_id: params.service_id,
            customer_id: params.customer_id,
            resource_id: params.resource_id,
            preferred_date: params.preferred_date,
            preferred_start: params.preferred_start,
            preferred_end: params.preferred_end,
            status: WaitlistStatus::Active,
            priority: params.priority,
            notification_count: 0,
            last_notified_at: None,
            response_deadline: None,
            converted_booking_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A notified entry whose response window has passed without conversion.
    pub fn deadline_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == WaitlistStatus::Notified
            && self.response_deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// A compare-and-set update of one waitlist row.
///
/// The write only applies while the row still carries `expected_status` and
/// `expected_count`; otherwise the surrounding transaction is aborted.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitlistTransition {
    pub entry_id: String,
    pub expected_status: WaitlistStatus,
    pub expected_count: i32,
    pub to: WaitlistStatus,
    pub notification_count: i32,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub response_deadline: Option<DateTime<Utc>>,
    pub converted_booking_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl WaitlistTransition {
    /// Same row, new status, counters untouched.
    pub fn status_only(entry: &WaitlistEntry, to: WaitlistStatus, at: DateTime<Utc>) -> Self {
        Self {
            entry_id: entry.id.clone(),
            expected_status: entry.status,
            expected_count: entry.notification_count,
            to,
            notification_count: entry.notification_count,
            last_notified_at: entry.last_notified_at,
            response_deadline: entry.response_deadline,
            converted_booking_id: entry.converted_booking_id.clone(),
            at,
        }
    }
}
