//! Priority waitlist.
//!
//! Selection and expiry are decided here from plain entries; every write is
//! a compare-and-set [`WaitlistTransition`] so that two evaluations racing
//! over the same row cannot both win.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{info, warn};

use crate::config::EngineSettings;
use crate::domain::models::notification::{Notification, KIND_WAITLIST_OFFER};
use crate::domain::models::waitlist::{NewWaitlistParams, WaitlistEntry, WaitlistStatus, WaitlistTransition};
use crate::domain::ports::{
    AuditEntry, AuditSink, BusinessRepository, ResourceRepository, ServiceRepository, WaitlistRepository,
};
use crate::error::AppError;

const SWEEP_BATCH: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitlistPolicy {
    pub response_window: Duration,
    pub max_notifications: i32,
}

impl From<&EngineSettings> for WaitlistPolicy {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            response_window: Duration::minutes(settings.waitlist_response_window_min),
            max_notifications: settings.waitlist_max_notifications,
        }
    }
}

/// A slot handed back by a cancellation or a no-show.
#[derive(Debug, Clone)]
pub struct FreedSlot {
    pub business_id: String,
    pub service_id: String,
    pub resource_ids: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct WaitlistEvaluation {
    pub offer: Option<(WaitlistEntry, WaitlistTransition)>,
    pub expirations: Vec<WaitlistTransition>,
}

impl WaitlistEvaluation {
    pub fn notification(&self, slot: &FreedSlot) -> Option<Notification> {
        self.offer.as_ref().map(|(entry, offer)| {
            Notification::new(&entry.business_id, KIND_WAITLIST_OFFER, json!({
                "waitlist_entry_id": entry.id,
                "customer_id": entry.customer_id,
                "service_id": entry.service_id,
                "slot_start": slot.start,
                "slot_end": slot.end,
                "response_deadline": offer.response_deadline,
                "notification_count": offer.notification_count,
            }))
        })
    }
}

/// Expiry applied at read time. Entries whose preferred date has passed, and
/// notified entries that used up their notifications and let the last
/// deadline lapse, are expired.
pub fn lazy_expiry(
    entry: &WaitlistEntry,
    now: DateTime<Utc>,
    today: NaiveDate,
    policy: &WaitlistPolicy,
) -> Option<WaitlistTransition> {
    if entry.status.is_terminal() {
        return None;
    }
    let date_passed = entry.preferred_date < today;
    let exhausted = entry.deadline_lapsed(now) && entry.notification_count >= policy.max_notifications;
    (date_passed || exhausted).then(|| WaitlistTransition::status_only(entry, WaitlistStatus::Expired, now))
}

pub fn is_eligible(entry: &WaitlistEntry, now: DateTime<Utc>, policy: &WaitlistPolicy) -> bool {
    match entry.status {
        WaitlistStatus::Active => true,
        WaitlistStatus::Notified => {
            entry.deadline_lapsed(now) && entry.notification_count < policy.max_notifications
        }
        _ => false,
    }
}

/// Same service, resource (when the entry names one), date, and a preferred
/// window that intersects the slot's local time range.
pub fn matches_slot(entry: &WaitlistEntry, slot: &FreedSlot, tz: Tz) -> bool {
    if entry.business_id != slot.business_id || entry.service_id != slot.service_id {
        return false;
    }
    if let Some(resource_id) = &entry.resource_id
        && !slot.resource_ids.contains(resource_id) {
        return false;
    }

    let slot_start = slot.start.with_timezone(&tz).naive_local();
    let slot_end = slot.end.with_timezone(&tz).naive_local();
    if slot_start.date() != entry.preferred_date {
        return false;
    }

    let day_start = entry.preferred_date.and_time(chrono::NaiveTime::default());
    let preferred_start: NaiveDateTime = entry.preferred_start
        .map(|t| entry.preferred_date.and_time(t))
        .unwrap_or(day_start);
    let preferred_end: NaiveDateTime = entry.preferred_end
        .map(|t| entry.preferred_date.and_time(t))
        .unwrap_or(day_start + Duration::days(1));

    preferred_start < slot_end && slot_start < preferred_end
}

pub fn offer_transition(entry: &WaitlistEntry, now: DateTime<Utc>, policy: &WaitlistPolicy) -> WaitlistTransition {
    WaitlistTransition {
        entry_id: entry.id.clone(),
        expected_status: entry.status,
        expected_count: entry.notification_count,
        to: WaitlistStatus::Notified,
        notification_count: entry.notification_count + 1,
        last_notified_at: Some(now),
        response_deadline: Some(now + policy.response_window),
        converted_booking_id: None,
        at: now,
    }
}

/// Decides who, if anyone, is offered `slot`. Highest priority first, then
/// the oldest entry; ids break exact ties so the choice is stable.
pub fn evaluate_freed_slot(
    entries: &[WaitlistEntry],
    slot: &FreedSlot,
    tz: Tz,
    now: DateTime<Utc>,
    policy: &WaitlistPolicy,
) -> WaitlistEvaluation {
    let today = now.with_timezone(&tz).date_naive();
    let mut evaluation = WaitlistEvaluation::default();
    let mut candidates: Vec<&WaitlistEntry> = Vec::new();

    for entry in entries {
        if let Some(expiry) = lazy_expiry(entry, now, today, policy) {
            evaluation.expirations.push(expiry);
            continue;
        }
        if is_eligible(entry, now, policy) && matches_slot(entry, slot, tz) {
            candidates.push(entry);
        }
    }

    if slot.start <= now {
        return evaluation;
    }

    candidates.sort_by(|a, b| {
        b.priority.cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    if let Some(winner) = candidates.first() {
        evaluation.offer = Some(((*winner).clone(), offer_transition(winner, now, policy)));
    }
    evaluation
}

fn audit_entry(entry: &WaitlistEntry, action: &'static str, before: Option<&WaitlistEntry>, now: DateTime<Utc>) -> AuditEntry {
    AuditEntry {
        business_id: entry.business_id.clone(),
        entity: "waitlist_entry",
        entity_id: entry.id.clone(),
        action,
        before: before.and_then(|b| serde_json::to_value(b).ok()),
        after: serde_json::to_value(entry).ok(),
        at: now,
    }
}

pub struct WaitlistManager {
    repo: Arc<dyn WaitlistRepository>,
    businesses: Arc<dyn BusinessRepository>,
    services: Arc<dyn ServiceRepository>,
    resources: Arc<dyn ResourceRepository>,
    audit: Arc<dyn AuditSink>,
    policy: WaitlistPolicy,
}

impl WaitlistManager {
    pub fn new(
        repo: Arc<dyn WaitlistRepository>,
        businesses: Arc<dyn BusinessRepository>,
        services: Arc<dyn ServiceRepository>,
        resources: Arc<dyn ResourceRepository>,
        audit: Arc<dyn AuditSink>,
        settings: &EngineSettings,
    ) -> Self {
        Self { repo, businesses, services, resources, audit, policy: WaitlistPolicy::from(settings) }
    }

    pub fn policy(&self) -> &WaitlistPolicy {
        &self.policy
    }

    async fn business_tz(&self, business_id: &str) -> Result<Tz, AppError> {
        let business = self.businesses.find_by_id(business_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Business {} not found", business_id)))?;
        business.tz()
    }

    pub async fn add(&self, params: NewWaitlistParams, now: DateTime<Utc>) -> Result<WaitlistEntry, AppError> {
        let tz = self.business_tz(&params.business_id).await?;

        let service = self.services.find_by_id(&params.business_id, &params.service_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Service {} not found", params.service_id)))?;
        if let Some(resource_id) = &params.resource_id {
            self.resources.find_by_id(&params.business_id, resource_id).await?
                .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", resource_id)))?;
        }
        if let (Some(start), Some(end)) = (params.preferred_start, params.preferred_end)
            && start >= end {
            return Err(AppError::Validation("preferred_start must be before preferred_end".into()));
        }
        if params.preferred_date < now.with_timezone(&tz).date_naive() {
            return Err(AppError::Validation("preferred_date is in the past".into()));
        }

        let entry = self.repo.create(&WaitlistEntry::new(params)).await?;
        info!(entry_id = %entry.id, service_id = %service.id, priority = entry.priority.as_str(), "Waitlist entry added");
        self.audit.record(audit_entry(&entry, "created", None, now));
        Ok(entry)
    }

    /// Returns the entry with lazy expiry applied.
    pub async fn get(&self, business_id: &str, id: &str, now: DateTime<Utc>) -> Result<WaitlistEntry, AppError> {
        let entry = self.repo.find_by_id(business_id, id).await?
            .ok_or_else(|| AppError::NotFound(format!("Waitlist entry {} not found", id)))?;
        let tz = self.business_tz(business_id).await?;
        let today = now.with_timezone(&tz).date_naive();

        match lazy_expiry(&entry, now, today, &self.policy) {
            Some(expiry) => {
                self.apply_quietly(&expiry).await?;
                self.repo.find_by_id(business_id, id).await?
                    .ok_or_else(|| AppError::NotFound(format!("Waitlist entry {} not found", id)))
            }
            None => Ok(entry),
        }
    }

    pub async fn list(&self, business_id: &str, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, AppError> {
        let tz = self.business_tz(business_id).await?;
        let today = now.with_timezone(&tz).date_naive();
        let entries = self.repo.list(business_id).await?;

        let mut changed = false;
        for entry in &entries {
            if let Some(expiry) = lazy_expiry(entry, now, today, &self.policy) {
                self.apply_quietly(&expiry).await?;
                changed = true;
            }
        }
        if changed {
            return self.repo.list(business_id).await;
        }
        Ok(entries)
    }

    pub async fn cancel(&self, business_id: &str, id: &str, now: DateTime<Utc>) -> Result<WaitlistEntry, AppError> {
        let entry = self.get(business_id, id, now).await?;
        if !entry.status.can_transition_to(WaitlistStatus::Cancelled) {
            return Err(AppError::Conflict(format!("Waitlist entry is already {}", entry.status)));
        }

        self.repo.apply(&[WaitlistTransition::status_only(&entry, WaitlistStatus::Cancelled, now)]).await?;
        let updated = self.repo.find_by_id(business_id, id).await?
            .ok_or_else(|| AppError::NotFound(format!("Waitlist entry {} not found", id)))?;
        info!(entry_id = %id, "Waitlist entry cancelled");
        self.audit.record(audit_entry(&updated, "cancelled", Some(&entry), now));
        Ok(updated)
    }

    /// Candidates for a freed slot, decided against the current rows.
    pub async fn evaluate(&self, slot: &FreedSlot, tz: Tz, now: DateTime<Utc>) -> Result<WaitlistEvaluation, AppError> {
        let date = slot.start.with_timezone(&tz).date_naive();
        let entries = self.repo.list_open_for_date(&slot.business_id, &slot.service_id, date).await?;
        Ok(evaluate_freed_slot(&entries, slot, tz, now, &self.policy))
    }

    /// Expires lapsed entries across all businesses. Returns how many rows moved.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let entries = self.repo.list_open(SWEEP_BATCH).await?;
        let mut zones: HashMap<String, Tz> = HashMap::new();
        let mut expired = 0;

        for entry in &entries {
            let tz = match zones.get(&entry.business_id) {
                Some(tz) => *tz,
                None => {
                    let tz = self.business_tz(&entry.business_id).await?;
                    zones.insert(entry.business_id.clone(), tz);
                    tz
                }
            };
            let today = now.with_timezone(&tz).date_naive();
            if let Some(expiry) = lazy_expiry(entry, now, today, &self.policy)
                && self.apply_quietly(&expiry).await? {
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Applies a single transition, treating a lost race as already done.
    async fn apply_quietly(&self, transition: &WaitlistTransition) -> Result<bool, AppError> {
        match self.repo.apply(std::slice::from_ref(transition)).await {
            Ok(()) => Ok(true),
            Err(AppError::Conflict(msg)) => {
                warn!(entry_id = %transition.entry_id, "Skipped waitlist transition: {}", msg);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::waitlist::WaitlistPriority;
    use chrono::{NaiveTime, TimeZone};

    fn policy() -> WaitlistPolicy {
        WaitlistPolicy { response_window: Duration::minutes(120), max_notifications: 3 }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 19, 12, 0, 0).unwrap()
    }

    fn entry(priority: WaitlistPriority, created: DateTime<Utc>) -> WaitlistEntry {
        let mut e = WaitlistEntry::new(NewWaitlistParams {
            business_id: "biz".into(),
            service_id: "svc".into(),
            customer_id: format!("cust-{}", priority.as_str()),
            resource_id: None,
            preferred_date: date(),
            preferred_start: None,
            preferred_end: None,
            priority,
        });
        e.created_at = created;
        e
    }

    fn slot() -> FreedSlot {
        FreedSlot {
            business_id: "biz".into(),
            service_id: "svc".into(),
            resource_ids: vec!["r1".into()],
            start: Utc.with_ymd_and_hms(2025, 5, 20, 14, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 5, 20, 15, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_vip_beats_earlier_high() {
        let high = entry(WaitlistPriority::High, Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap());
        let vip = entry(WaitlistPriority::Vip, Utc.with_ymd_and_hms(2025, 5, 1, 10, 5, 0).unwrap());

        let eval = evaluate_freed_slot(&[high, vip.clone()], &slot(), chrono_tz::UTC, now(), &policy());
        let (winner, offer) = eval.offer.unwrap();
        assert_eq!(winner.id, vip.id);
        assert_eq!(offer.to, WaitlistStatus::Notified);
        assert_eq!(offer.notification_count, 1);
        assert_eq!(offer.response_deadline, Some(now() + Duration::minutes(120)));
    }

    #[test]
    fn test_same_priority_oldest_wins() {
        let first = entry(WaitlistPriority::Normal, Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap());
        let second = entry(WaitlistPriority::Normal, Utc.with_ymd_and_hms(2025, 5, 1, 9, 30, 0).unwrap());
        let eval = evaluate_freed_slot(&[second, first.clone()], &slot(), chrono_tz::UTC, now(), &policy());
        assert_eq!(eval.offer.unwrap().0.id, first.id);
    }

    #[test]
    fn test_preferred_window_must_intersect() {
        let mut morning = entry(WaitlistPriority::Vip, now());
        morning.preferred_start = Some(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        morning.preferred_end = Some(NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert!(!matches_slot(&morning, &slot(), chrono_tz::UTC));

        morning.preferred_end = Some(NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert!(matches_slot(&morning, &slot(), chrono_tz::UTC));
    }

    #[test]
    fn test_resource_preference_filters() {
        let mut e = entry(WaitlistPriority::Normal, now());
        e.resource_id = Some("r2".into());
        assert!(!matches_slot(&e, &slot(), chrono_tz::UTC));
        e.resource_id = Some("r1".into());
        assert!(matches_slot(&e, &slot(), chrono_tz::UTC));
    }

    #[test]
    fn test_notified_entry_reselected_after_lapse() {
        let mut e = entry(WaitlistPriority::Normal, now());
        e.status = WaitlistStatus::Notified;
        e.notification_count = 1;
        e.response_deadline = Some(now() + Duration::minutes(5));
        assert!(!is_eligible(&e, now(), &policy()));

        e.response_deadline = Some(now() - Duration::minutes(5));
        assert!(is_eligible(&e, now(), &policy()));
        let offer = offer_transition(&e, now(), &policy());
        assert_eq!(offer.expected_status, WaitlistStatus::Notified);
        assert_eq!(offer.expected_count, 1);
        assert_eq!(offer.notification_count, 2);
    }

    #[test]
    fn test_exhausted_entry_expires_during_evaluation() {
        let mut e = entry(WaitlistPriority::Vip, now());
        e.status = WaitlistStatus::Notified;
        e.notification_count = 3;
        e.response_deadline = Some(now() - Duration::minutes(1));

        let eval = evaluate_freed_slot(&[e.clone()], &slot(), chrono_tz::UTC, now(), &policy());
        assert!(eval.offer.is_none());
        assert_eq!(eval.expirations.len(), 1);
        assert_eq!(eval.expirations[0].to, WaitlistStatus::Expired);
        assert_eq!(eval.expirations[0].entry_id, e.id);
    }

    #[test]
    fn test_past_preferred_date_expires() {
        let e = entry(WaitlistPriority::Normal, now());
        let later = Utc.with_ymd_and_hms(2025, 5, 21, 8, 0, 0).unwrap();
        let today = later.date_naive();
        assert!(lazy_expiry(&e, later, today, &policy()).is_some());
        assert!(lazy_expiry(&e, now(), now().date_naive(), &policy()).is_none());
    }

    #[test]
    fn test_no_offer_for_slot_already_started() {
        let e = entry(WaitlistPriority::Normal, now());
        let late = Utc.with_ymd_and_hms(2025, 5, 20, 14, 30, 0).unwrap();
        let eval = evaluate_freed_slot(&[e], &slot(), chrono_tz::UTC, late, &policy());
        assert!(eval.offer.is_none());
    }
}
