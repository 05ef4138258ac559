use crate::domain::models::{
    booking::{BookingMetadata, BookingStatus},
    group::{ParticipantShare, PaymentSplitType},
    pricing::ModifierType,
    resource::ResourceType,
    waitlist::WaitlistPriority,
};
use crate::domain::services::booking_engine::CreateBookingRequest;
use crate::error::AppError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;

fn check_weekday(weekday: i32) -> Result<(), AppError> {
    if !(0..=6).contains(&weekday) {
        return Err(AppError::Validation(format!("weekday must be 0 (Monday) to 6 (Sunday), got {}", weekday)));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct CreateBusinessRequest {
    pub name: String,
    pub timezone: String,
}

impl CreateBusinessRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        if self.timezone.parse::<Tz>().is_err() {
            return Err(AppError::Validation(format!("Invalid timezone: {}", self.timezone)));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct BusinessHoursEntry {
    pub weekday: i32,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Deserialize)]
pub struct ReplaceBusinessHoursRequest {
    pub hours: Vec<BusinessHoursEntry>,
}

impl ReplaceBusinessHoursRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut seen = HashSet::new();
        for entry in &self.hours {
            check_weekday(entry.weekday)?;
            if !seen.insert(entry.weekday) {
                return Err(AppError::Validation(format!("weekday {} listed twice", entry.weekday)));
            }
            if !entry.is_closed && entry.close_time <= entry.open_time {
                return Err(AppError::Validation(format!("close_time must be after open_time on weekday {}", entry.weekday)));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct CreateHolidayRequest {
    pub date: NaiveDate,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateResourceRequest {
    pub name: String,
    pub resource_type: ResourceType,
    pub capacity: Option<i32>,
}

impl CreateResourceRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        if self.capacity.is_some_and(|c| c < 1) {
            return Err(AppError::Validation("capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct ResourceHoursEntry {
    pub weekday: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Deserialize)]
pub struct ReplaceResourceHoursRequest {
    pub hours: Vec<ResourceHoursEntry>,
}

impl ReplaceResourceHoursRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        for entry in &self.hours {
            check_weekday(entry.weekday)?;
            if entry.end_time <= entry.start_time {
                return Err(AppError::Validation(format!("end_time must be after start_time on weekday {}", entry.weekday)));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct CreateExceptionRequest {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_min: Option<i32>,
    pub buffer_before_min: Option<i32>,
    pub buffer_after_min: Option<i32>,
    pub base_price_cents: i64,
    pub currency: String,
    pub cancellation_policy_id: Option<String>,
}

impl CreateServiceRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        if self.duration_min.is_some_and(|d| d <= 0) {
            return Err(AppError::Validation("duration_min must be positive".into()));
        }
        if self.buffer_before_min.unwrap_or(0) < 0 || self.buffer_after_min.unwrap_or(0) < 0 {
            return Err(AppError::Validation("buffers cannot be negative".into()));
        }
        if self.base_price_cents < 0 {
            return Err(AppError::Validation("base_price_cents cannot be negative".into()));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AppError::Validation(format!("Invalid currency code: {}", self.currency)));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct AssignResourceRequest {
    pub resource_id: String,
    pub is_required: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreatePricingRuleRequest {
    pub name: String,
    pub days: Option<Vec<Weekday>>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub modifier_type: ModifierType,
    pub modifier_value: i64,
    pub priority: Option<i32>,
}

impl CreatePricingRuleRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.start_time.is_some() != self.end_time.is_some() {
            return Err(AppError::Validation("start_time and end_time must be given together".into()));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time)
            && start == end {
            return Err(AppError::Validation("start_time and end_time must differ".into()));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && end < start {
            return Err(AppError::Validation("end_date must not be before start_date".into()));
        }
        if self.days.as_ref().is_some_and(|d| d.is_empty()) {
            return Err(AppError::Validation("days must not be empty when given".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct PriceQuery {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub hours_before: i32,
    pub penalty_percent: i32,
    #[serde(default)]
    pub is_default: bool,
}

impl CreatePolicyRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.hours_before < 0 {
            return Err(AppError::Validation("hours_before cannot be negative".into()));
        }
        if !(0..=100).contains(&self.penalty_percent) {
            return Err(AppError::Validation("penalty_percent must be between 0 and 100".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct AvailabilityParams {
    pub service_id: Option<String>,
    pub resource_id: Option<String>,
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub granularity: Option<i64>,
}

#[derive(Deserialize)]
pub struct CheckSlotRequest {
    pub service_id: Option<String>,
    pub resource_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateBookingBody {
    pub service_id: Option<String>,
    pub resource_id: Option<String>,
    pub customer_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub status: Option<BookingStatus>,
    pub waitlist_entry_id: Option<String>,
    pub metadata: Option<BookingMetadata>,
}

impl CreateBookingBody {
    pub fn into_request(self, business_id: String) -> CreateBookingRequest {
        CreateBookingRequest {
            business_id,
            service_id: self.service_id,
            resource_id: self.resource_id,
            customer_id: self.customer_id,
            start: self.start,
            end: self.end,
            duration_minutes: self.duration_minutes,
            status: self.status,
            waitlist_entry_id: self.waitlist_entry_id,
            metadata: self.metadata,
        }
    }
}

#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateWaitlistRequest {
    pub service_id: String,
    pub customer_id: String,
    pub resource_id: Option<String>,
    pub preferred_date: NaiveDate,
    pub preferred_start: Option<NaiveTime>,
    pub preferred_end: Option<NaiveTime>,
    pub priority: Option<WaitlistPriority>,
}

#[derive(Deserialize)]
pub struct CreateGroupBody {
    #[serde(flatten)]
    pub booking: CreateBookingBody,
    pub min_participants: i32,
    pub max_participants: i32,
    pub payment_split_type: PaymentSplitType,
}

#[derive(Deserialize)]
pub struct GroupMemberRequest {
    pub customer_id: String,
}

#[derive(Deserialize)]
pub struct SetSharesRequest {
    pub customer_id: String,
    pub shares: Vec<ParticipantShare>,
}
