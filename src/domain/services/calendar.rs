//! Open-hours resolution for a business, optionally narrowed to one resource.
//!
//! Everything here works on local wall-clock time in the business timezone.
//! Resource exceptions are stored as UTC instants and are converted before
//! they are cut out of the day.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::domain::models::business::BusinessCalendar;
use crate::domain::models::resource::ResourceCalendar;

/// Half-open local interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LocalInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl LocalInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start <= start && end <= self.end
    }
}

pub fn weekday_index(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_monday() as i32
}

/// Computes the open windows of `date`.
///
/// Business hours and holidays come first. A resource with its own hours is
/// restricted to them, and a weekday it has no hours for is closed for that
/// resource even when the business is open. Exceptions are subtracted last.
pub fn resolve_open_windows(
    business: &BusinessCalendar,
    resource: Option<&ResourceCalendar>,
    date: NaiveDate,
) -> Vec<LocalInterval> {
    let weekday = weekday_index(date);

    let Some(hours) = business.hours.iter().find(|h| h.weekday == weekday) else {
        return Vec::new();
    };
    if hours.is_closed || business.holidays.contains(&date) {
        return Vec::new();
    }

    let mut windows = normalize(vec![LocalInterval::new(
        date.and_time(hours.open_time),
        date.and_time(hours.close_time),
    )]);

    let Some(resource) = resource else {
        return windows;
    };

    if !resource.hours.is_empty() {
        let own: Vec<LocalInterval> = resource.hours.iter()
            .filter(|h| h.weekday == weekday)
            .map(|h| LocalInterval::new(date.and_time(h.start_time), date.and_time(h.end_time)))
            .collect();
        windows = intersect(&windows, &normalize(own));
    }

    let cuts: Vec<LocalInterval> = resource.exceptions.iter()
        .map(|e| LocalInterval::new(
            e.start_at.with_timezone(&business.tz).naive_local(),
            e.end_at.with_timezone(&business.tz).naive_local(),
        ))
        .collect();

    subtract(&windows, &normalize(cuts))
}

/// Sorts, drops empty pieces and merges overlapping or touching intervals.
pub fn normalize(mut intervals: Vec<LocalInterval>) -> Vec<LocalInterval> {
    intervals.retain(|i| !i.is_empty());
    intervals.sort();

    let mut merged: Vec<LocalInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Intersection of two normalized lists.
pub fn intersect(a: &[LocalInterval], b: &[LocalInterval]) -> Vec<LocalInterval> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if start < end {
            result.push(LocalInterval::new(start, end));
        }
        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

/// Removes every interval of `cuts` from `base`. Both lists must be normalized.
pub fn subtract(base: &[LocalInterval], cuts: &[LocalInterval]) -> Vec<LocalInterval> {
    let mut result = Vec::new();

    for interval in base {
        let mut cursor = interval.start;
        for cut in cuts {
            if cut.end <= cursor || cut.start >= interval.end {
                continue;
            }
            if cut.start > cursor {
                result.push(LocalInterval::new(cursor, cut.start));
            }
            cursor = cursor.max(cut.end);
            if cursor >= interval.end {
                break;
            }
        }
        if cursor < interval.end {
            result.push(LocalInterval::new(cursor, interval.end));
        }
    }
    result
}
