use crate::domain::models::{
    business::{Business, BusinessHours, Holiday},
    resource::{Resource, ResourceHours, ResourceException},
    service::{Service, ServiceResource},
    pricing::PricingRule,
    cancellation::CancellationPolicy,
    booking::{Booking, BookingWrite, OccupiedInterval, RescheduleWrite, StatusChange},
    waitlist::{WaitlistEntry, WaitlistTransition},
    group::{GroupBooking, GroupParticipant, ParticipantShare},
    idempotency::IdempotencyRecord,
    notification::Notification,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

#[async_trait]
pub trait BusinessRepository: Send + Sync {
    async fn create(&self, business: &Business) -> Result<Business, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Business>, AppError>;
    async fn replace_hours(&self, business_id: &str, hours: &[BusinessHours]) -> Result<Vec<BusinessHours>, AppError>;
    async fn list_hours(&self, business_id: &str) -> Result<Vec<BusinessHours>, AppError>;
    async fn add_holiday(&self, holiday: &Holiday) -> Result<Holiday, AppError>;
    async fn list_holidays(&self, business_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Holiday>, AppError>;
}

/// Catalog queries only ever return active, non-deleted resources.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn create(&self, resource: &Resource) -> Result<Resource, AppError>;
    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<Resource>, AppError>;
    async fn list(&self, business_id: &str) -> Result<Vec<Resource>, AppError>;
    async fn replace_hours(&self, resource_id: &str, hours: &[ResourceHours]) -> Result<Vec<ResourceHours>, AppError>;
    async fn list_hours(&self, resource_id: &str) -> Result<Vec<ResourceHours>, AppError>;
    async fn add_exception(&self, exception: &ResourceException) -> Result<ResourceException, AppError>;
    async fn list_exceptions(&self, resource_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ResourceException>, AppError>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, service: &Service) -> Result<Service, AppError>;
    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<Service>, AppError>;
    async fn list(&self, business_id: &str) -> Result<Vec<Service>, AppError>;
    async fn assign_resource(&self, mapping: &ServiceResource) -> Result<ServiceResource, AppError>;
    async fn list_resources(&self, service_id: &str) -> Result<Vec<ServiceResource>, AppError>;
    async fn create_pricing_rule(&self, rule: &PricingRule) -> Result<PricingRule, AppError>;
    async fn list_pricing_rules(&self, service_id: &str) -> Result<Vec<PricingRule>, AppError>;
}

#[async_trait]
pub trait CancellationPolicyRepository: Send + Sync {
    /// Fails with `Conflict` when a second default is created for a business.
    async fn create(&self, policy: &CancellationPolicy) -> Result<CancellationPolicy, AppError>;
    async fn list(&self, business_id: &str) -> Result<Vec<CancellationPolicy>, AppError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Locks the resources, re-checks conflicts and writes the booking with
    /// everything attached to it in one transaction.
    async fn create(&self, write: &BookingWrite) -> Result<Booking, AppError>;
    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<Booking>, AppError>;
    async fn list(&self, business_id: &str, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<Vec<Booking>, AppError>;
    async fn list_resource_ids(&self, booking_id: &str) -> Result<Vec<String>, AppError>;
    /// Occupied ranges of active bookings on `resource_id` overlapping `[start, end)`.
    async fn list_occupied(&self, resource_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<OccupiedInterval>, AppError>;
    async fn reschedule(&self, write: &RescheduleWrite) -> Result<Booking, AppError>;
    async fn change_status(&self, change: &StatusChange) -> Result<Booking, AppError>;
}

#[async_trait]
pub trait WaitlistRepository: Send + Sync {
    async fn create(&self, entry: &WaitlistEntry) -> Result<WaitlistEntry, AppError>;
    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<WaitlistEntry>, AppError>;
    async fn list(&self, business_id: &str) -> Result<Vec<WaitlistEntry>, AppError>;
    /// Active and notified entries for one service and preferred date.
    async fn list_open_for_date(&self, business_id: &str, service_id: &str, date: NaiveDate) -> Result<Vec<WaitlistEntry>, AppError>;
    /// Active and notified entries across all businesses, oldest first.
    async fn list_open(&self, limit: i64) -> Result<Vec<WaitlistEntry>, AppError>;
    /// Applies compare-and-set transitions atomically. A row that moved on
    /// aborts the whole batch with `Conflict`.
    async fn apply(&self, transitions: &[WaitlistTransition]) -> Result<(), AppError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<GroupBooking>, AppError>;
    async fn list_participants(&self, group_id: &str) -> Result<Vec<GroupParticipant>, AppError>;
    /// Takes a seat if one is free and recomputes shares.
    async fn add_participant(&self, group: &GroupBooking, participant: &GroupParticipant) -> Result<GroupBooking, AppError>;
    async fn remove_participant(&self, group: &GroupBooking, participant_id: &str, now: DateTime<Utc>) -> Result<GroupBooking, AppError>;
    async fn set_shares(&self, group_id: &str, shares: &[ParticipantShare]) -> Result<(), AppError>;
    /// Confirms the group and its booking, settles the shares and enqueues
    /// the notification.
    async fn confirm(&self, group: &GroupBooking, notification: &Notification, now: DateTime<Utc>) -> Result<GroupBooking, AppError>;
}

#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// Inserts `record` unless a live record holds the key. Returns the
    /// existing record in that case; an expired one is replaced.
    async fn claim(&self, record: &IdempotencyRecord, now: DateTime<Utc>) -> Result<Option<IdempotencyRecord>, AppError>;
    /// Drops a pending claim after the guarded operation failed.
    async fn release(&self, scope: &str, key: &str) -> Result<(), AppError>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list(&self, business_id: &str) -> Result<Vec<Notification>, AppError>;
}

/// Before/after record of a state change handed to the audit log.
#[derive(Debug, Serialize, Clone)]
pub struct AuditEntry {
    pub business_id: String,
    pub entity: &'static str,
    pub entity_id: String,
    pub action: &'static str,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}
