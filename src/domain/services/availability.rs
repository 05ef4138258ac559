//! Slot feasibility and slot enumeration over resolved calendars.
//!
//! The engine loads calendars and occupied intervals, this module only
//! decides. A slot is feasible when its buffered range fits in an open
//! window of every required resource and collides with nothing.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::models::booking::OccupiedInterval;
use crate::domain::services::calendar::{intersect, LocalInterval};
use crate::domain::services::conflict::find_conflicts;
use crate::error::AppError;

/// Upper bound for client-supplied lengths and steps, one week in minutes.
pub const MAX_SPAN_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRequirements {
    /// Expected slot length. `None` accepts any positive length.
    pub duration: Option<Duration>,
    pub buffer_before: Duration,
    pub buffer_after: Duration,
}

impl SlotRequirements {
    pub fn new(duration_min: Option<i64>, buffer_before_min: i64, buffer_after_min: i64) -> Self {
        Self {
            duration: duration_min.map(Duration::minutes),
            buffer_before: Duration::minutes(buffer_before_min),
            buffer_after: Duration::minutes(buffer_after_min),
        }
    }
}

/// One required resource: its open windows for the day and what already
/// occupies it.
#[derive(Debug, Clone)]
pub struct ResourceAvailability {
    pub resource_id: String,
    pub windows: Vec<LocalInterval>,
    pub occupied: Vec<OccupiedInterval>,
}

#[derive(Debug, Clone)]
pub struct AvailabilityContext {
    pub tz: Tz,
    pub requirements: SlotRequirements,
    /// Used only when no resource is required.
    pub business_windows: Vec<LocalInterval>,
    pub resources: Vec<ResourceAvailability>,
}

impl AvailabilityContext {
    /// Windows in which every required resource is open.
    pub fn combined_windows(&self) -> Vec<LocalInterval> {
        let mut iter = self.resources.iter();
        let Some(first) = iter.next() else {
            return self.business_windows.clone();
        };
        iter.fold(first.windows.clone(), |acc, r| intersect(&acc, &r.windows))
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    InvalidInterval,
    DurationMismatch,
    InThePast,
    OutsideHours,
    Conflict,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SlotCheck {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicting_booking_ids: Vec<String>,
}

impl SlotCheck {
    fn available() -> Self {
        Self { available: true, reason: None, conflicting_booking_ids: Vec::new() }
    }

    fn unavailable(reason: UnavailableReason) -> Self {
        Self { available: false, reason: Some(reason), conflicting_booking_ids: Vec::new() }
    }
}

/// Checks one concrete slot.
///
/// `exclude` names a booking whose own occupied range is ignored, used when
/// a booking is moved.
pub fn check_slot(
    ctx: &AvailabilityContext,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    exclude: Option<&str>,
) -> SlotCheck {
    if start >= end {
        return SlotCheck::unavailable(UnavailableReason::InvalidInterval);
    }
    if let Some(duration) = ctx.requirements.duration
        && end - start != duration {
        return SlotCheck::unavailable(UnavailableReason::DurationMismatch);
    }
    if start <= now {
        return SlotCheck::unavailable(UnavailableReason::InThePast);
    }

    let (Some(occupied_from), Some(occupied_until)) = (
        start.checked_sub_signed(ctx.requirements.buffer_before),
        end.checked_add_signed(ctx.requirements.buffer_after),
    ) else {
        return SlotCheck::unavailable(UnavailableReason::InvalidInterval);
    };
    let local_from = occupied_from.with_timezone(&ctx.tz).naive_local();
    let local_until = occupied_until.with_timezone(&ctx.tz).naive_local();
    let fits = |windows: &[LocalInterval]| windows.iter().any(|w| w.contains(local_from, local_until));

    let inside = if ctx.resources.is_empty() {
        fits(&ctx.business_windows)
    } else {
        ctx.resources.iter().all(|r| fits(&r.windows))
    };
    if !inside {
        return SlotCheck::unavailable(UnavailableReason::OutsideHours);
    }

    let mut conflicting: Vec<String> = ctx.resources.iter()
        .flat_map(|r| find_conflicts(occupied_from, occupied_until, &r.occupied, exclude))
        .map(|o| o.booking_id.clone())
        .collect();
    if !conflicting.is_empty() {
        conflicting.sort();
        conflicting.dedup();
        return SlotCheck {
            available: false,
            reason: Some(UnavailableReason::Conflict),
            conflicting_booking_ids: conflicting,
        };
    }

    SlotCheck::available()
}

/// Walks the combined open windows at `granularity` and returns every start
/// that passes [`check_slot`], ordered and without duplicates.
pub fn enumerate_slots(
    ctx: &AvailabilityContext,
    granularity: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, AppError> {
    let Some(duration) = ctx.requirements.duration else {
        return Err(AppError::Validation(
            "Slots can only be listed for a fixed duration; pass duration_minutes or use a service with a duration".into(),
        ));
    };
    if duration <= Duration::zero() {
        return Err(AppError::Validation("Duration must be positive".into()));
    }
    if granularity <= Duration::zero() {
        return Err(AppError::Validation("Granularity must be positive".into()));
    }
    let max_span = Duration::minutes(MAX_SPAN_MINUTES);
    if granularity > max_span || duration > max_span {
        return Err(AppError::Validation(format!(
            "Granularity and duration cannot exceed {} minutes", MAX_SPAN_MINUTES
        )));
    }

    let before = ctx.requirements.buffer_before;
    let after = ctx.requirements.buffer_after;
    let mut slots = Vec::new();

    for window in ctx.combined_windows() {
        let mut next = window.start.checked_add_signed(before);
        while let Some(cursor) = next {
            let fits = cursor.checked_add_signed(duration + after).is_some_and(|end| end <= window.end);
            if !fits {
                break;
            }
            // Local times inside a DST gap or fold have no single instant
            if let Some(local) = ctx.tz.from_local_datetime(&cursor).single() {
                let start = local.with_timezone(&Utc);
                if let Some(end) = start.checked_add_signed(duration)
                    && check_slot(ctx, start, end, now, None).available {
                    slots.push(start);
                }
            }
            next = cursor.checked_add_signed(granularity);
        }
    }

    slots.sort();
    slots.dedup();
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 12).unwrap()
    }

    fn local(h: u32, m: u32) -> chrono::NaiveDateTime {
        day().and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&local(h, m))
    }

    fn past() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap()
    }

    fn resource(id: &str, windows: Vec<LocalInterval>, occupied: Vec<OccupiedInterval>) -> ResourceAvailability {
        ResourceAvailability { resource_id: id.into(), windows, occupied }
    }

    fn ctx(requirements: SlotRequirements, resources: Vec<ResourceAvailability>) -> AvailabilityContext {
        AvailabilityContext {
            tz: chrono_tz::UTC,
            requirements,
            business_windows: vec![LocalInterval::new(local(9, 0), local(18, 0))],
            resources,
        }
    }

    #[test]
    fn test_buffer_after_blocks_adjacent_slot() {
        let existing = OccupiedInterval { booking_id: "b1".into(), start: utc(10, 0), end: utc(11, 15) };
        let c = ctx(
            SlotRequirements::new(Some(60), 0, 15),
            vec![resource("r1", vec![LocalInterval::new(local(9, 0), local(18, 0))], vec![existing])],
        );

        let blocked = check_slot(&c, utc(11, 0), utc(12, 0), past(), None);
        assert!(!blocked.available);
        assert_eq!(blocked.reason, Some(UnavailableReason::Conflict));
        assert_eq!(blocked.conflicting_booking_ids, vec!["b1".to_string()]);

        assert!(check_slot(&c, utc(11, 15), utc(12, 15), past(), None).available);
    }

    #[test]
    fn test_reasons() {
        let c = ctx(SlotRequirements::new(Some(60), 0, 0), vec![]);
        assert_eq!(check_slot(&c, utc(11, 0), utc(11, 0), past(), None).reason, Some(UnavailableReason::InvalidInterval));
        assert_eq!(check_slot(&c, utc(11, 0), utc(11, 30), past(), None).reason, Some(UnavailableReason::DurationMismatch));
        assert_eq!(check_slot(&c, utc(11, 0), utc(12, 0), utc(11, 0), None).reason, Some(UnavailableReason::InThePast));
        assert_eq!(check_slot(&c, utc(17, 30), utc(18, 30), past(), None).reason, Some(UnavailableReason::OutsideHours));
        assert!(check_slot(&c, utc(17, 0), utc(18, 0), past(), None).available);
    }

    #[test]
    fn test_buffers_must_fit_inside_hours() {
        let c = ctx(SlotRequirements::new(Some(60), 10, 0), vec![]);
        assert_eq!(check_slot(&c, utc(9, 0), utc(10, 0), past(), None).reason, Some(UnavailableReason::OutsideHours));
        assert!(check_slot(&c, utc(9, 10), utc(10, 10), past(), None).available);
    }

    #[test]
    fn test_any_length_without_duration() {
        let c = ctx(SlotRequirements::new(None, 0, 0), vec![]);
        assert!(check_slot(&c, utc(9, 0), utc(9, 40), past(), None).available);
        assert!(enumerate_slots(&c, Duration::minutes(15), past()).is_err());
    }

    #[test]
    fn test_enumeration_walks_granularity() {
        let c = ctx(SlotRequirements::new(Some(60), 0, 0), vec![]);
        let slots = enumerate_slots(&c, Duration::minutes(15), past()).unwrap();
        assert_eq!(slots.first(), Some(&utc(9, 0)));
        assert_eq!(slots.last(), Some(&utc(17, 0)));
        assert_eq!(slots.len(), 33);
    }

    #[test]
    fn test_enumeration_is_conjunctive_and_inside_windows() {
        let r1 = resource("r1", vec![LocalInterval::new(local(9, 0), local(13, 0))], vec![]);
        let r2 = resource(
            "r2",
            vec![LocalInterval::new(local(11, 0), local(18, 0))],
            vec![OccupiedInterval { booking_id: "x".into(), start: utc(11, 0), end: utc(11, 30) }],
        );
        let c = ctx(SlotRequirements::new(Some(30), 0, 0), vec![r1, r2]);

        let slots = enumerate_slots(&c, Duration::minutes(30), past()).unwrap();
        assert_eq!(slots, vec![utc(11, 30), utc(12, 0), utc(12, 30)]);

        let combined = c.combined_windows();
        for s in &slots {
            let end = (*s + Duration::minutes(30)).naive_utc();
            assert!(combined.iter().any(|w| w.contains(s.naive_utc(), end)));
        }
    }

    #[test]
    fn test_enumeration_drops_past_starts() {
        let c = ctx(SlotRequirements::new(Some(60), 0, 0), vec![]);
        let slots = enumerate_slots(&c, Duration::minutes(60), utc(12, 0)).unwrap();
        assert_eq!(slots.first(), Some(&utc(13, 0)));
    }

    #[test]
    fn test_excluded_booking_is_ignored() {
        let existing = OccupiedInterval { booking_id: "self".into(), start: utc(10, 0), end: utc(11, 0) };
        let c = ctx(
            SlotRequirements::new(Some(60), 0, 0),
            vec![resource("r1", vec![LocalInterval::new(local(9, 0), local(18, 0))], vec![existing])],
        );
        assert!(!check_slot(&c, utc(10, 30), utc(11, 30), past(), None).available);
        assert!(check_slot(&c, utc(10, 30), utc(11, 30), past(), Some("self")).available);
    }

    #[test]
    fn test_dst_gap_is_skipped() {
        // 2025-03-30 Berlin jumps from 02:00 to 03:00
        let date = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        let c = AvailabilityContext {
            tz: chrono_tz::Europe::Berlin,
            requirements: SlotRequirements::new(Some(30), 0, 0),
            business_windows: vec![LocalInterval::new(
                date.and_hms_opt(1, 0, 0).unwrap(),
                date.and_hms_opt(4, 0, 0).unwrap(),
            )],
            resources: vec![],
        };
        let before_the_switch = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let slots = enumerate_slots(&c, Duration::minutes(30), before_the_switch).unwrap();
        let locals: Vec<String> = slots.iter()
            .map(|s| s.with_timezone(&chrono_tz::Europe::Berlin).format("%H:%M").to_string())
            .collect();
        assert!(!locals.iter().any(|l| l.starts_with("02:")));
        assert!(locals.contains(&"01:00".to_string()));
        assert!(locals.contains(&"03:00".to_string()));
    }

    #[test]
    fn test_oversized_steps_are_rejected() {
        let c = ctx(SlotRequirements::new(Some(60), 0, 0), vec![]);
        assert!(enumerate_slots(&c, Duration::minutes(MAX_SPAN_MINUTES + 1), past()).is_err());
        assert!(enumerate_slots(&c, Duration::minutes(MAX_SPAN_MINUTES), past()).is_ok());

        let long = ctx(SlotRequirements::new(Some(MAX_SPAN_MINUTES + 1), 0, 0), vec![]);
        assert!(enumerate_slots(&long, Duration::minutes(15), past()).is_err());
    }

    #[test]
    fn test_window_near_the_end_of_time_does_not_overflow() {
        let last = chrono::NaiveDateTime::MAX;
        let c = AvailabilityContext {
            tz: chrono_tz::UTC,
            requirements: SlotRequirements::new(Some(60), 0, 30),
            business_windows: vec![LocalInterval::new(last - Duration::minutes(90), last)],
            resources: vec![],
        };
        let slots = enumerate_slots(&c, Duration::minutes(MAX_SPAN_MINUTES), past()).unwrap();
        assert_eq!(slots.len(), 1);

        // The trailing buffer would run past the last representable instant
        let start = Utc.from_utc_datetime(&(last - Duration::minutes(60)));
        let check = check_slot(&c, start, Utc.from_utc_datetime(&last), past(), None);
        assert_eq!(check.reason, Some(UnavailableReason::InvalidInterval));
    }
}
