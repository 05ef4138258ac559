//! The overlap predicate shared by availability checks and the
//! transactional re-check that runs before a booking row is written.

use chrono::{DateTime, Utc};

use crate::domain::models::booking::OccupiedInterval;
use crate::error::AppError;

/// Half-open overlap. Touching intervals do not overlap.
pub fn overlaps(a_start: DateTime<Utc>, a_end: DateTime<Utc>, b_start: DateTime<Utc>, b_end: DateTime<Utc>) -> bool {
    a_start < b_end && b_start < a_end
}

/// Occupied intervals that collide with `[start, end)`.
///
/// `exclude` skips the booking being moved during a reschedule.
pub fn find_conflicts<'a>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: &'a [OccupiedInterval],
    exclude: Option<&str>,
) -> Vec<&'a OccupiedInterval> {
    existing.iter()
        .filter(|o| exclude != Some(o.booking_id.as_str()))
        .filter(|o| overlaps(start, end, o.start, o.end))
        .collect()
}

/// Fails with `Conflict` when anything in `existing` collides.
pub fn ensure_free(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: &[OccupiedInterval],
    exclude: Option<&str>,
) -> Result<(), AppError> {
    let conflicts = find_conflicts(start, end, existing, exclude);
    if let Some(first) = conflicts.first() {
        return Err(AppError::Conflict(format!(
            "Requested time overlaps booking {} ({} - {})",
            first.booking_id, first.start.to_rfc3339(), first.end.to_rfc3339()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, h, m, 0).unwrap()
    }

    fn occupied(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> OccupiedInterval {
        OccupiedInterval { booking_id: id.into(), start, end }
    }

    #[test]
    fn test_adjacent_intervals_do_not_conflict() {
        let existing = vec![occupied("a", at(10, 0), at(11, 0))];
        assert!(find_conflicts(at(11, 0), at(12, 0), &existing, None).is_empty());
        assert!(find_conflicts(at(9, 0), at(10, 0), &existing, None).is_empty());
    }

    #[test]
    fn test_buffer_extends_occupied_range() {
        // Existing 10:00-11:00 with a 15 minute buffer after
        let existing = vec![occupied("a", at(10, 0), at(11, 15))];
        assert_eq!(find_conflicts(at(11, 0), at(12, 0), &existing, None).len(), 1);
        assert!(ensure_free(at(11, 15), at(12, 15), &existing, None).is_ok());
    }

    #[test]
    fn test_buffers_collide_without_core_overlap() {
        // 10:00-11:00 + 10 min after, candidate 11:15-12:00 with 10 min before
        let existing = vec![occupied("a", at(10, 0), at(11, 10))];
        assert_eq!(find_conflicts(at(11, 5), at(12, 0), &existing, None).len(), 1);
    }

    #[test]
    fn test_excluded_booking_is_ignored() {
        let existing = vec![occupied("a", at(10, 0), at(11, 0))];
        assert!(find_conflicts(at(10, 30), at(11, 30), &existing, Some("a")).is_empty());
        let err = ensure_free(at(10, 30), at(11, 30), &existing, None).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
