use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

use super::SESSION_LENGTH_MINUTES;

/// True when two standard-length sessions starting at `candidate` and `existing` overlap.
pub fn overlaps<A: TimeZone, B: TimeZone>(candidate: &DateTime<A>, existing: &DateTime<B>) -> bool {
    overlaps_for(candidate, existing, Duration::minutes(SESSION_LENGTH_MINUTES))
}

/// Half-open interval test on `[start, start + length)`, after moving both starts to UTC
/// and dropping seconds.
pub fn overlaps_for<A: TimeZone, B: TimeZone>(
    candidate: &DateTime<A>,
    existing: &DateTime<B>,
    length: Duration,
) -> bool {
    let candidate_start = to_utc_minute(candidate);
    let existing_start = to_utc_minute(existing);
    ends_after(existing_start, length, candidate_start)
        && ends_after(candidate_start, length, existing_start)
}

/// `start + length > other`. An end past the representable range is later than anything.
fn ends_after(start: DateTime<Utc>, length: Duration, other: DateTime<Utc>) -> bool {
    start
        .checked_add_signed(length)
        .is_none_or(|end| end > other)
}

fn to_utc_minute<Tz: TimeZone>(dt: &DateTime<Tz>) -> DateTime<Utc> {
    let utc = dt.with_timezone(&Utc);
    utc.with_second(0)
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(utc)
}
