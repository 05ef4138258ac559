//! Orchestrates booking operations over the injected repositories.
//!
//! Every decision is made by the pure services (calendar, availability,
//! pricing, cancellation, waitlist, group); this type loads their inputs,
//! hands the resulting writes to the repositories and reports to the audit
//! sink. Callers pass `now` explicitly.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::config::EngineSettings;
use crate::domain::models::booking::{
    Booking, BookingMetadata, BookingStatus, BookingWrite, CancellationRecord, NewBookingParams, RescheduleWrite,
    StatusChange,
};
use crate::domain::models::business::{Business, BusinessCalendar};
use crate::domain::models::cancellation::CancellationQuote;
use crate::domain::models::group::{GroupDetails, NewGroup, NewGroupParams, PaymentSplitType};
use crate::domain::models::idempotency::IdempotencyRef;
use crate::domain::models::notification::{Notification, KIND_BOOKING_CANCELLED, KIND_BOOKING_CONFIRMED};
use crate::domain::models::pricing::PriceQuote;
use crate::domain::models::resource::{Resource, ResourceCalendar};
use crate::domain::models::service::Service;
use crate::domain::models::waitlist::{WaitlistStatus, WaitlistTransition};
use crate::domain::ports::{
    AuditEntry, AuditSink, BookingRepository, BusinessRepository, CancellationPolicyRepository,
    IdempotencyRepository, ResourceRepository, ServiceRepository, WaitlistRepository,
};
use crate::domain::services::availability::{
    check_slot, enumerate_slots, AvailabilityContext, ResourceAvailability, SlotCheck, SlotRequirements,
    UnavailableReason, MAX_SPAN_MINUTES,
};
use crate::domain::services::calendar::{resolve_open_windows, LocalInterval};
use crate::domain::services::cancellation::{compute_cancellation, resolve_policy};
use crate::domain::services::group::validate_bounds;
use crate::domain::services::idempotency::{create_booking_scope, request_hash, IdempotencyDecision, IdempotencyGuard};
use crate::domain::services::pricing::evaluate_price;
use crate::domain::services::waitlist::{FreedSlot, WaitlistManager};
use crate::error::AppError;

const DEFAULT_CURRENCY: &str = "USD";

/// Everything the engine persists through.
#[derive(Clone)]
pub struct EngineRepositories {
    pub businesses: Arc<dyn BusinessRepository>,
    pub resources: Arc<dyn ResourceRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub policies: Arc<dyn CancellationPolicyRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub waitlist: Arc<dyn WaitlistRepository>,
    pub idempotency: Arc<dyn IdempotencyRepository>,
}

/// A booking request as the engine sees it. Its canonical JSON is what the
/// idempotency hash covers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateBookingRequest {
    pub business_id: String,
    pub service_id: Option<String>,
    pub resource_id: Option<String>,
    pub customer_id: Option<String>,
    pub start: DateTime<Utc>,
    /// Defaults to `start + duration` when the duration is known.
    pub end: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub status: Option<BookingStatus>,
    pub waitlist_entry_id: Option<String>,
    pub metadata: Option<BookingMetadata>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateGroupRequest {
    pub booking: CreateBookingRequest,
    pub min_participants: i32,
    pub max_participants: i32,
    pub payment_split_type: PaymentSplitType,
}

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Booking),
    /// Same key, same request: the booking created the first time.
    Replayed(Booking),
    /// Same key, same request, first attempt still running.
    InProgress,
}

#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub business_id: String,
    pub service_id: Option<String>,
    pub resource_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    pub business_id: String,
    pub service_id: Option<String>,
    pub resource_id: Option<String>,
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub granularity_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub booking: Booking,
    #[serde(flatten)]
    pub quote: CancellationQuote,
}

/// Service, resources and slot requirements resolved for one request.
struct Requirements {
    service: Option<Service>,
    resources: Vec<Resource>,
    slot: SlotRequirements,
}

fn slot_error(check: &SlotCheck) -> AppError {
    match check.reason {
        Some(UnavailableReason::Conflict) => AppError::Conflict(format!(
            "Requested time conflicts with booking(s) {}",
            check.conflicting_booking_ids.join(", ")
        )),
        Some(UnavailableReason::InvalidInterval) => AppError::Validation("start must be before end".into()),
        Some(UnavailableReason::DurationMismatch) => {
            AppError::Validation("Slot length does not match the service duration".into())
        }
        Some(UnavailableReason::InThePast) => AppError::Validation("Cannot book a slot in the past".into()),
        Some(UnavailableReason::OutsideHours) => AppError::Validation("Requested time is outside opening hours".into()),
        None => AppError::InternalWithMsg("Slot rejected without a reason".into()),
    }
}

fn to_json<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

pub struct BookingEngine {
    repos: EngineRepositories,
    waitlist: Arc<WaitlistManager>,
    idempotency: IdempotencyGuard,
    audit: Arc<dyn AuditSink>,
    settings: EngineSettings,
}

impl BookingEngine {
    pub fn new(
        repos: EngineRepositories,
        waitlist: Arc<WaitlistManager>,
        audit: Arc<dyn AuditSink>,
        settings: EngineSettings,
    ) -> Self {
        let idempotency = IdempotencyGuard::new(
            repos.idempotency.clone(),
            Duration::hours(settings.idempotency_ttl_hours),
        );
        Self { repos, waitlist, idempotency, audit, settings }
    }

    pub fn idempotency(&self) -> &IdempotencyGuard {
        &self.idempotency
    }

    fn record(&self, business_id: &str, entity: &'static str, entity_id: &str, action: &'static str,
              before: Option<serde_json::Value>, after: Option<serde_json::Value>, now: DateTime<Utc>) {
        self.audit.record(AuditEntry {
            business_id: business_id.to_string(),
            entity,
            entity_id: entity_id.to_string(),
            action,
            before,
            after,
            at: now,
        });
    }

    async fn load_business(&self, business_id: &str) -> Result<(Business, Tz), AppError> {
        let business = self.repos.businesses.find_by_id(business_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Business {} not found", business_id)))?;
        let tz = business.tz()?;
        Ok((business, tz))
    }

    async fn load_service(&self, business_id: &str, service_id: &str) -> Result<Service, AppError> {
        self.repos.services.find_by_id(business_id, service_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Service {} not found", service_id)))
    }

    async fn load_booking(&self, business_id: &str, booking_id: &str) -> Result<Booking, AppError> {
        self.repos.bookings.find_by_id(business_id, booking_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))
    }

    /// Required resources of the service plus the one the client named.
    async fn resolve_resources(
        &self,
        business_id: &str,
        service: Option<&Service>,
        requested: Option<&str>,
    ) -> Result<Vec<Resource>, AppError> {
        let mut ids: Vec<String> = Vec::new();

        if let Some(service) = service {
            let mappings = self.repos.services.list_resources(&service.id).await?;
            if let Some(requested) = requested
                && !mappings.iter().any(|m| m.resource_id == requested) {
                return Err(AppError::Validation(format!(
                    "Resource {} is not mapped to service {}", requested, service.id
                )));
            }
            ids.extend(mappings.into_iter().filter(|m| m.is_required).map(|m| m.resource_id));
        }
        if let Some(requested) = requested {
            ids.push(requested.to_string());
        }
        ids.sort();
        ids.dedup();

        let mut resources = Vec::with_capacity(ids.len());
        for id in ids {
            let resource = self.repos.resources.find_by_id(business_id, &id).await?
                .filter(|r| r.is_bookable())
                .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", id)))?;
            resources.push(resource);
        }
        Ok(resources)
    }

    async fn requirements(
        &self,
        business_id: &str,
        service_id: Option<&str>,
        resource_id: Option<&str>,
        duration_override: Option<i64>,
    ) -> Result<Requirements, AppError> {
        if duration_override.is_some_and(|d| d <= 0) {
            return Err(AppError::Validation("duration_minutes must be positive".into()));
        }
        if duration_override.is_some_and(|d| d > MAX_SPAN_MINUTES) {
            return Err(AppError::Validation(format!("duration_minutes cannot exceed {}", MAX_SPAN_MINUTES)));
        }
        let service = match service_id {
            Some(id) => Some(self.load_service(business_id, id).await?),
            None => None,
        };
        let resources = self.resolve_resources(business_id, service.as_ref(), resource_id).await?;

        let slot = SlotRequirements::new(
            duration_override.or(service.as_ref().and_then(|s| s.duration_min.map(i64::from))),
            service.as_ref().map_or(0, |s| s.buffer_before_min as i64),
            service.as_ref().map_or(0, |s| s.buffer_after_min as i64),
        );
        Ok(Requirements { service, resources, slot })
    }

    async fn business_calendar(&self, business_id: &str, tz: Tz, date: NaiveDate) -> Result<BusinessCalendar, AppError> {
        let hours = self.repos.businesses.list_hours(business_id).await?;
        let holidays = self.repos.businesses.list_holidays(business_id, date, date).await?
            .into_iter()
            .map(|h| h.date)
            .collect();
        Ok(BusinessCalendar { tz, hours, holidays })
    }

    async fn resource_calendar(&self, resource_id: &str, date: NaiveDate) -> Result<ResourceCalendar, AppError> {
        let (from, until) = day_bounds(date);
        Ok(ResourceCalendar {
            resource_id: resource_id.to_string(),
            hours: self.repos.resources.list_hours(resource_id).await?,
            exceptions: self.repos.resources.list_exceptions(resource_id, from, until).await?,
        })
    }

    async fn availability_context(
        &self,
        business_id: &str,
        tz: Tz,
        requirements: &Requirements,
        date: NaiveDate,
    ) -> Result<AvailabilityContext, AppError> {
        let business = self.business_calendar(business_id, tz, date).await?;
        let (from, until) = day_bounds(date);

        let mut resources = Vec::with_capacity(requirements.resources.len());
        for resource in &requirements.resources {
            let calendar = self.resource_calendar(&resource.id, date).await?;
            resources.push(ResourceAvailability {
                resource_id: resource.id.clone(),
                windows: resolve_open_windows(&business, Some(&calendar), date),
                occupied: self.repos.bookings.list_occupied(&resource.id, from, until).await?,
            });
        }

        Ok(AvailabilityContext {
            tz,
            requirements: requirements.slot,
            business_windows: resolve_open_windows(&business, None, date),
            resources,
        })
    }

    /// Open windows of a business, or of one resource, on a local date.
    pub async fn resolve_calendar(&self, business_id: &str, resource_id: Option<&str>, date: NaiveDate) -> Result<Vec<LocalInterval>, AppError> {
        let (_, tz) = self.load_business(business_id).await?;
        let business = self.business_calendar(business_id, tz, date).await?;
        match resource_id {
            Some(id) => {
                self.repos.resources.find_by_id(business_id, id).await?
                    .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", id)))?;
                let calendar = self.resource_calendar(id, date).await?;
                Ok(resolve_open_windows(&business, Some(&calendar), date))
            }
            None => Ok(resolve_open_windows(&business, None, date)),
        }
    }

    #[instrument(skip_all, fields(business_id = %query.business_id))]
    pub async fn check_availability(&self, query: &SlotQuery, now: DateTime<Utc>) -> Result<SlotCheck, AppError> {
        let (_, tz) = self.load_business(&query.business_id).await?;
        let requirements = self.requirements(
            &query.business_id,
            query.service_id.as_deref(),
            query.resource_id.as_deref(),
            query.duration_minutes,
        ).await?;

        let date = query.start.with_timezone(&tz).date_naive();
        let ctx = self.availability_context(&query.business_id, tz, &requirements, date).await?;
        Ok(check_slot(&ctx, query.start, query.end, now, None))
    }

    #[instrument(skip_all, fields(business_id = %query.business_id, date = %query.date))]
    pub async fn list_available_slots(&self, query: &AvailabilityQuery, now: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>, AppError> {
        let (_, tz) = self.load_business(&query.business_id).await?;
        let requirements = self.requirements(
            &query.business_id,
            query.service_id.as_deref(),
            query.resource_id.as_deref(),
            query.duration_minutes,
        ).await?;

        let granularity = query.granularity_minutes.unwrap_or(self.settings.slot_granularity_min);
        if !(1..=MAX_SPAN_MINUTES).contains(&granularity) {
            return Err(AppError::Validation(format!("granularity_minutes must be between 1 and {}", MAX_SPAN_MINUTES)));
        }
        let ctx = self.availability_context(&query.business_id, tz, &requirements, query.date).await?;
        enumerate_slots(&ctx, Duration::minutes(granularity), now)
    }

    /// Price of `service_id` for a start at local `date` and `time`.
    pub async fn price_preview(&self, business_id: &str, service_id: &str, date: NaiveDate, time: NaiveTime) -> Result<PriceQuote, AppError> {
        let service = self.load_service(business_id, service_id).await?;
        let rules = self.repos.services.list_pricing_rules(&service.id).await?;
        Ok(evaluate_price(service.base_price_cents, &rules, date, time))
    }

    /// Creates a booking, honouring an optional idempotency key.
    #[instrument(skip_all, fields(business_id = %request.business_id))]
    pub async fn create_booking(
        &self,
        request: &CreateBookingRequest,
        idempotency_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome, AppError> {
        let Some(key) = idempotency_key else {
            let (booking, _) = self.create_inner(request, None, None, now).await?;
            return Ok(CreateOutcome::Created(booking));
        };

        let scope = create_booking_scope(&request.business_id);
        let hash = request_hash(request)?;
        match self.idempotency.begin(&scope, key, &hash, now).await? {
            IdempotencyDecision::Replay(booking_id) => {
                info!(booking_id = %booking_id, "Replaying idempotent booking");
                let booking = self.load_booking(&request.business_id, &booking_id).await?;
                Ok(CreateOutcome::Replayed(booking))
            }
            IdempotencyDecision::InProgress => Ok(CreateOutcome::InProgress),
            IdempotencyDecision::Proceed(reference) => {
                match self.create_inner(request, Some(reference.clone()), None, now).await {
                    Ok((booking, _)) => Ok(CreateOutcome::Created(booking)),
                    Err(e) => {
                        self.idempotency.release(&reference).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Creates the underlying booking and the group in one transaction. The
    /// booking's customer organizes the group and owes its price.
    #[instrument(skip_all, fields(business_id = %request.booking.business_id))]
    pub async fn create_group_booking(&self, request: &CreateGroupRequest, now: DateTime<Utc>) -> Result<(Booking, GroupDetails), AppError> {
        if request.booking.customer_id.is_none() {
            return Err(AppError::Validation("A group booking needs the organizer's customer_id".into()));
        }
        let (booking, group) = self.create_inner(&request.booking, None, Some(request), now).await?;
        let group = group.ok_or_else(|| AppError::InternalWithMsg("Group was not created".into()))?;
        Ok((booking, GroupDetails { group: group.group, participants: vec![group.organizer] }))
    }

    async fn create_inner(
        &self,
        request: &CreateBookingRequest,
        idempotency: Option<IdempotencyRef>,
        group: Option<&CreateGroupRequest>,
        now: DateTime<Utc>,
    ) -> Result<(Booking, Option<NewGroup>), AppError> {
        if let Some(metadata) = &request.metadata {
            metadata.validate()?;
        }
        let status = request.status.unwrap_or(BookingStatus::Pending);
        if !status.is_active() {
            return Err(AppError::Validation(format!("A booking cannot be created as {}", status)));
        }

        let (_, tz) = self.load_business(&request.business_id).await?;
        let requirements = self.requirements(
            &request.business_id,
            request.service_id.as_deref(),
            request.resource_id.as_deref(),
            request.duration_minutes,
        ).await?;

        let end = match (request.end, requirements.slot.duration) {
            (Some(end), _) => end,
            (None, Some(duration)) => request.start.checked_add_signed(duration)
                .ok_or_else(|| AppError::Validation("start is out of range".into()))?,
            (None, None) => return Err(AppError::Validation("end is required when no duration is configured".into())),
        };

        let local_start = request.start.with_timezone(&tz).naive_local();
        let ctx = self.availability_context(&request.business_id, tz, &requirements, local_start.date()).await?;
        let check = check_slot(&ctx, request.start, end, now, None);
        if !check.available {
            return Err(slot_error(&check));
        }

        let quote = match &requirements.service {
            Some(service) => {
                let rules = self.repos.services.list_pricing_rules(&service.id).await?;
                Some(evaluate_price(service.base_price_cents, &rules, local_start.date(), local_start.time()))
            }
            None => None,
        };

        let resource_ids: Vec<String> = requirements.resources.iter().map(|r| r.id.clone()).collect();
        let primary = request.resource_id.clone().or_else(|| resource_ids.first().cloned());

        let booking = Booking::new(NewBookingParams {
            business_id: request.business_id.clone(),
            service_id: request.service_id.clone(),
            resource_id: primary,
            customer_id: request.customer_id.clone(),
            start: request.start,
            end,
            buffer_before_min: requirements.slot.buffer_before.num_minutes(),
            buffer_after_min: requirements.slot.buffer_after.num_minutes(),
            status,
            price_cents: quote.as_ref().map_or(0, |q| q.effective_price_cents),
            currency: requirements.service.as_ref()
                .map_or_else(|| DEFAULT_CURRENCY.to_string(), |s| s.currency.clone()),
            applied_rule_id: quote.as_ref().and_then(|q| q.applied_rule.as_ref().map(|r| r.id.clone())),
            waitlist_entry_id: request.waitlist_entry_id.clone(),
            metadata: request.metadata.clone(),
        });

        let waitlist = match &request.waitlist_entry_id {
            Some(entry_id) => Some(self.waitlist_conversion(request, entry_id, &booking.id, now).await?),
            None => None,
        };

        let new_group = match group {
            Some(g) => {
                let capacity = requirements.resources.iter().map(|r| r.capacity).min();
                validate_bounds(g.min_participants, g.max_participants, capacity)?;
                let organizer = request.customer_id.clone()
                    .ok_or_else(|| AppError::Validation("A group booking needs the organizer's customer_id".into()))?;
                Some(NewGroup::new(NewGroupParams {
                    business_id: request.business_id.clone(),
                    booking_id: booking.id.clone(),
                    organizer_customer_id: organizer,
                    min_participants: g.min_participants,
                    max_participants: g.max_participants,
                    payment_split_type: g.payment_split_type,
                    total_amount_cents: booking.price_cents,
                }))
            }
            None => None,
        };

        let mut notifications = Vec::new();
        if status == BookingStatus::Confirmed {
            notifications.push(booking_notification(&booking, KIND_BOOKING_CONFIRMED));
        }

        let write = BookingWrite {
            booking,
            resource_ids,
            idempotency,
            waitlist,
            group: new_group.clone(),
            notifications,
        };
        let created = self.repos.bookings.create(&write).await?;

        info!(
            booking_id = %created.id,
            start = %created.start_at,
            price_cents = created.price_cents,
            "Booking created"
        );
        self.record(&created.business_id, "booking", &created.id, "created", None, to_json(&created), now);
        Ok((created, new_group))
    }

    /// Conversion of a notified waitlist entry into the booking being made.
    async fn waitlist_conversion(
        &self,
        request: &CreateBookingRequest,
        entry_id: &str,
        booking_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WaitlistTransition, AppError> {
        let entry = self.repos.waitlist.find_by_id(&request.business_id, entry_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Waitlist entry {} not found", entry_id)))?;

        if request.service_id.as_deref() != Some(entry.service_id.as_str()) {
            return Err(AppError::Validation("Booking service does not match the waitlist entry".into()));
        }
        if request.customer_id.as_deref() != Some(entry.customer_id.as_str()) {
            return Err(AppError::Forbidden("Waitlist entry belongs to another customer".into()));
        }
        if !entry.status.can_transition_to(WaitlistStatus::Converted) {
            return Err(AppError::Conflict(format!("Waitlist entry is {}, not notified", entry.status)));
        }

        let mut transition = WaitlistTransition::status_only(&entry, WaitlistStatus::Converted, now);
        transition.converted_booking_id = Some(booking_id.to_string());
        Ok(transition)
    }

    pub async fn get_booking(&self, business_id: &str, booking_id: &str) -> Result<Booking, AppError> {
        self.load_booking(business_id, booking_id).await
    }

    pub async fn list_bookings(&self, business_id: &str, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<Vec<Booking>, AppError> {
        self.load_business(business_id).await?;
        self.repos.bookings.list(business_id, from, until).await
    }

    /// Moves an active booking. Resources, buffers and the locked price stay.
    #[instrument(skip_all, fields(business_id = %business_id, booking_id = %booking_id))]
    pub async fn reschedule_booking(
        &self,
        business_id: &str,
        booking_id: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        let (_, tz) = self.load_business(business_id).await?;
        let booking = self.load_booking(business_id, booking_id).await?;
        ensure_mutable(&booking)?;

        let service = match &booking.service_id {
            Some(id) => self.repos.services.find_by_id(business_id, id).await?,
            None => None,
        };
        let duration = service.as_ref()
            .and_then(|s| s.duration_min.map(|d| Duration::minutes(d as i64)))
            .unwrap_or(booking.end_at - booking.start_at);
        let end = match end {
            Some(end) => end,
            None => start.checked_add_signed(duration)
                .ok_or_else(|| AppError::Validation("start is out of range".into()))?,
        };

        let resource_ids = self.repos.bookings.list_resource_ids(&booking.id).await?;
        let mut resources = Vec::with_capacity(resource_ids.len());
        for id in &resource_ids {
            let resource = self.repos.resources.find_by_id(business_id, id).await?
                .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", id)))?;
            resources.push(resource);
        }

        let requirements = Requirements {
            slot: SlotRequirements {
                duration: Some(duration),
                buffer_before: booking.start_at - booking.occupied_from,
                buffer_after: booking.occupied_until - booking.end_at,
            },
            service,
            resources,
        };

        let date = start.with_timezone(&tz).date_naive();
        let ctx = self.availability_context(business_id, tz, &requirements, date).await?;
        let check = check_slot(&ctx, start, end, now, Some(&booking.id));
        if !check.available {
            return Err(slot_error(&check));
        }

        let write = RescheduleWrite {
            business_id: business_id.to_string(),
            booking_id: booking.id.clone(),
            start_at: start,
            end_at: end,
            occupied_from: start - requirements.slot.buffer_before,
            occupied_until: end + requirements.slot.buffer_after,
            resource_ids,
            at: now,
        };
        let updated = self.repos.bookings.reschedule(&write).await?;

        info!(from = %booking.start_at, to = %updated.start_at, "Booking rescheduled");
        self.record(business_id, "booking", &updated.id, "rescheduled", to_json(&booking), to_json(&updated), now);
        Ok(updated)
    }

    /// Moves a booking along its lifecycle. Cancellation goes through
    /// [`Self::cancel_booking`] so the penalty is always computed.
    #[instrument(skip_all, fields(business_id = %business_id, booking_id = %booking_id, to = %to))]
    pub async fn transition_booking(
        &self,
        business_id: &str,
        booking_id: &str,
        to: BookingStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        if to == BookingStatus::Cancelled {
            return Ok(self.cancel_booking(business_id, booking_id, reason, now).await?.booking);
        }

        let booking = self.load_booking(business_id, booking_id).await?;
        ensure_mutable(&booking)?;
        if !booking.status.can_transition_to(to) {
            return Err(AppError::Conflict(format!("Cannot move booking from {} to {}", booking.status, to)));
        }

        let mut change = StatusChange {
            business_id: business_id.to_string(),
            booking_id: booking.id.clone(),
            from: booking.status,
            to,
            at: now,
            cancellation: None,
            waitlist_offer: None,
            waitlist_expirations: Vec::new(),
            notifications: Vec::new(),
        };
        if to == BookingStatus::Confirmed {
            change.notifications.push(booking_notification(&booking, KIND_BOOKING_CONFIRMED));
        }
        if to.frees_slot() {
            self.offer_freed_slot(&booking, now, &mut change).await?;
        }

        let updated = self.repos.bookings.change_status(&change).await?;
        info!(from = %booking.status, "Booking status changed");
        self.record(business_id, "booking", &updated.id, "status_changed", to_json(&booking), to_json(&updated), now);
        Ok(updated)
    }

    /// Cancels with the applicable policy and offers the slot to the waitlist
    /// in the same transaction.
    #[instrument(skip_all, fields(business_id = %business_id, booking_id = %booking_id))]
    pub async fn cancel_booking(
        &self,
        business_id: &str,
        booking_id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CancellationOutcome, AppError> {
        let booking = self.load_booking(business_id, booking_id).await?;
        ensure_mutable(&booking)?;
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(AppError::Conflict(format!("Cannot cancel a {} booking", booking.status)));
        }

        let service_policy = match &booking.service_id {
            Some(id) => self.repos.services.find_by_id(business_id, id).await?
                .and_then(|s| s.cancellation_policy_id),
            None => None,
        };
        let policies = self.repos.policies.list(business_id).await?;
        let policy = resolve_policy(service_policy.as_deref(), &policies);
        let quote = compute_cancellation(booking.start_at, now, booking.price_cents, policy);

        let mut change = StatusChange {
            business_id: business_id.to_string(),
            booking_id: booking.id.clone(),
            from: booking.status,
            to: BookingStatus::Cancelled,
            at: now,
            cancellation: Some(CancellationRecord {
                reason,
                penalty_cents: quote.penalty_cents,
                refund_cents: quote.refund_cents,
            }),
            waitlist_offer: None,
            waitlist_expirations: Vec::new(),
            notifications: vec![Notification::new(business_id, KIND_BOOKING_CANCELLED, json!({
                "booking_id": booking.id,
                "customer_id": booking.customer_id,
                "start_at": booking.start_at,
                "penalty_cents": quote.penalty_cents,
                "refund_cents": quote.refund_cents,
            }))],
        };
        self.offer_freed_slot(&booking, now, &mut change).await?;

        let updated = self.repos.bookings.change_status(&change).await?;
        info!(
            penalty_cents = quote.penalty_cents,
            refund_cents = quote.refund_cents,
            policy_id = policy.map(|p| p.id.as_str()).unwrap_or("none"),
            "Booking cancelled"
        );
        self.record(business_id, "booking", &updated.id, "cancelled", to_json(&booking), to_json(&updated), now);
        Ok(CancellationOutcome { booking: updated, quote })
    }

    async fn offer_freed_slot(&self, booking: &Booking, now: DateTime<Utc>, change: &mut StatusChange) -> Result<(), AppError> {
        let Some(service_id) = &booking.service_id else {
            return Ok(());
        };
        let (_, tz) = self.load_business(&booking.business_id).await?;
        let slot = FreedSlot {
            business_id: booking.business_id.clone(),
            service_id: service_id.clone(),
            resource_ids: self.repos.bookings.list_resource_ids(&booking.id).await?,
            start: booking.start_at,
            end: booking.end_at,
        };

        let evaluation = self.waitlist.evaluate(&slot, tz, now).await?;
        if let Some((entry, _)) = &evaluation.offer {
            info!(entry_id = %entry.id, priority = entry.priority.as_str(), "Offering freed slot to waitlist");
        }
        change.notifications.extend(evaluation.notification(&slot));
        change.waitlist_offer = evaluation.offer.map(|(_, offer)| offer);
        change.waitlist_expirations = evaluation.expirations;
        Ok(())
    }
}

/// Closed bookings are history and cannot be changed.
fn ensure_mutable(booking: &Booking) -> Result<(), AppError> {
    match booking.status {
        BookingStatus::Completed | BookingStatus::NoShow => Err(AppError::Forbidden(format!(
            "Booking {} is {} and can no longer be changed", booking.id, booking.status
        ))),
        _ => Ok(()),
    }
}

fn booking_notification(booking: &Booking, kind: &str) -> Notification {
    Notification::new(&booking.business_id, kind, json!({
        "booking_id": booking.id,
        "customer_id": booking.customer_id,
        "service_id": booking.service_id,
        "start_at": booking.start_at,
        "end_at": booking.end_at,
    }))
}

/// A UTC range wide enough to hold every instant of the local `date` in any
/// timezone.
fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = date.and_time(NaiveTime::default());
    let from = Utc.from_utc_datetime(&(midnight - Duration::days(1)));
    let until = Utc.from_utc_datetime(&(midnight + Duration::days(2)));
    (from, until)
}
