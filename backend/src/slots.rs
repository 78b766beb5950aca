//! Pure candidate-slot generation for property viewings.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::Serialize;

/// Booked interval that candidate slots must not overlap.
#[derive(Debug, Clone, Copy)]
pub struct BookedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateSlot {
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub is_preferred: bool,
}

/// Business-hour window the generator enumerates.
#[derive(Debug, Clone, Copy)]
pub struct SlotRules {
    pub horizon_days: i64,
    pub open_hour: u32,
    /// Inclusive last start hour of the day.
    pub close_hour: u32,
    pub closed_weekday: Weekday,
    pub slot_minutes: i64,
}

impl Default for SlotRules {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            open_hour: 9,
            close_hour: 18,
            closed_weekday: Weekday::Sun,
            slot_minutes: 30,
        }
    }
}

/// Enumerates conflict-free candidate start times, hourly, starting the day
/// after `now`, in chronological order.
///
/// Overlap uses half-open intervals: a candidate is discarded when
/// `slot_start < booked_end && slot_end > booked_start`. Candidates on a
/// caller-preferred date are flagged but not reordered.
pub fn generate_slots(
    now: DateTime<Utc>,
    booked: &[BookedInterval],
    preferred_dates: &[NaiveDate],
    rules: SlotRules,
) -> Vec<CandidateSlot> {
    let mut slots = Vec::new();
    for day_offset in 1..=rules.horizon_days {
        let date = (now + Duration::days(day_offset)).date_naive();
        if date.weekday() == rules.closed_weekday {
            continue;
        }
        for hour in rules.open_hour..=rules.close_hour {
            let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            let start = naive.and_utc();
            let end = start + Duration::minutes(rules.slot_minutes);
            if booked.iter().any(|b| start < b.end && end > b.start) {
                continue;
            }
            slots.push(CandidateSlot {
                starts_at: start,
                duration_minutes: rules.slot_minutes,
                is_preferred: preferred_dates.contains(&date),
            });
        }
    }
    slots
}
