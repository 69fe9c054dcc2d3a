use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc,
};
use regex::Regex;
use tracing::warn;

use super::{SESSION_INTERVAL_DAYS, SESSIONS_PER_CLASS, Session, SessionStatus};
use crate::error::AppError;

static SESSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"date: ([\d\-T:.+Z]+)\s+status:\s*([A-Za-z_]*)").unwrap()
});
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"date: ([\d\-T:.+Z]+)").unwrap());

/// Years the stored format can hold; wider years encode with a sign the decoder rejects.
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

const ACTIVE_MARK: &str = "status: active";
const DEACTIVATED_MARK: &str = "status: deactived";

/// A session recovered from a stored schedule, with the segment it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSession {
    pub start: DateTime<FixedOffset>,
    pub status: String,
    pub segment: String,
}

impl DecodedSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active.as_str()
    }
}

/// Builds `count` active sessions, `interval` apart, starting at `anchor`.
///
/// Fails when a session would fall outside the years the stored format can hold.
pub fn expand(
    anchor: DateTime<Utc>,
    count: usize,
    interval: Duration,
) -> Result<Vec<Session>, AppError> {
    (0..count)
        .map(|i| {
            let start = i32::try_from(i)
                .ok()
                .and_then(|i| interval.checked_mul(i))
                .and_then(|offset| anchor.checked_add_signed(offset))
                .filter(|start| STORABLE_YEARS.contains(&start.year()))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "session {} after {} falls outside years {}..={}",
                        i + 1,
                        anchor.to_rfc3339(),
                        STORABLE_YEARS.start(),
                        STORABLE_YEARS.end()
                    ))
                })?;
            Ok(Session {
                start,
                status: SessionStatus::Active,
            })
        })
        .collect()
}

/// The standard four weekly sessions of a class.
pub fn weekly(anchor: DateTime<Utc>) -> Result<Vec<Session>, AppError> {
    expand(
        anchor,
        SESSIONS_PER_CLASS,
        Duration::days(SESSION_INTERVAL_DAYS),
    )
}

pub fn encode(sessions: &[Session]) -> String {
    sessions
        .iter()
        .map(|s| {
            format!(
                "{{date: {} status: {}}}",
                s.start.to_rfc3339_opts(SecondsFormat::AutoSi, false),
                s.status
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Extracts every session from a stored schedule, in order.
///
/// Segments whose date does not parse are skipped with a warning so that legacy rows stay
/// readable. An empty result is not an error.
pub fn decode(blob: &str) -> Vec<DecodedSession> {
    let mut sessions = Vec::new();

    for segment in blob.split(',') {
        for caps in SESSION_PATTERN.captures_iter(segment) {
            let token = &caps[1];
            match parse_timestamp(token) {
                Some(start) => sessions.push(DecodedSession {
                    start,
                    status: caps[2].to_string(),
                    segment: segment.to_string(),
                }),
                None => warn!("skipping schedule segment with unparseable date '{}'", token),
            }
        }
    }

    sessions
}

/// Marks the first active session falling on `date` as deactivated.
///
/// Only the matching segment is rewritten; every other byte of `blob` is kept as is.
/// Returns `None` when no active session exists on that date.
pub fn deactivate_on(blob: &str, date: NaiveDate) -> Option<String> {
    let mut updated = false;

    let segments: Vec<Cow<'_, str>> = blob
        .split(',')
        .map(|segment| {
            if updated || !segment.contains(ACTIVE_MARK) {
                return Cow::Borrowed(segment);
            }
            let on_date = DATE_PATTERN
                .captures(segment)
                .and_then(|caps| parse_timestamp(&caps[1]))
                .is_some_and(|start| start.date_naive() == date);
            if on_date {
                updated = true;
                Cow::Owned(segment.replacen(ACTIVE_MARK, DEACTIVATED_MARK, 1))
            } else {
                Cow::Borrowed(segment)
            }
        })
        .collect();

    updated.then(|| segments.join(","))
}

/// Resolves a user supplied anchor to a UTC instant. Naive inputs are taken as UTC.
pub fn parse_anchor(input: &str) -> Result<DateTime<Utc>, AppError> {
    let normalized = input.trim().replacen(' ', "T", 1);
    parse_timestamp(&normalized)
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            AppError::Validation(format!("cannot resolve a date and time from '{}'", input))
        })
}

pub(crate) fn parse_timestamp(token: &str) -> Option<DateTime<FixedOffset>> {
    let parsed = DateTime::parse_from_rfc3339(token)
        .or_else(|_| DateTime::parse_from_str(token, "%Y-%m-%dT%H:%M%:z"))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(token, fmt).ok())
                .map(|naive| naive.and_utc().fixed_offset())
        })?;

    // `%Y` also accepts signed years of any width.
    STORABLE_YEARS
        .contains(&parsed.with_timezone(&Utc).year())
        .then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_weekly_round_trip() {
        let anchor = utc(2025, 1, 6, 9, 0);
        let blob = encode(&weekly(anchor).unwrap());
        let decoded = decode(&blob);

        assert_eq!(decoded.len(), 4);
        for (i, session) in decoded.iter().enumerate() {
            assert_eq!(
                session.start.with_timezone(&Utc),
                anchor + Duration::days(7 * i as i64)
            );
            assert!(session.is_active());
        }
    }

    #[test]
    fn test_encode_format() {
        let blob = encode(&weekly(utc(2025, 1, 6, 9, 0)).unwrap()[..2]);
        assert_eq!(
            blob,
            "{date: 2025-01-06T09:00:00+00:00 status: active},{date: 2025-01-13T09:00:00+00:00 status: active}"
        );
    }

    #[test]
    fn test_round_trip_keeps_status_and_order() {
        let mut sessions = weekly(utc(2025, 3, 3, 14, 30)).unwrap();
        sessions[1].status = SessionStatus::Deactived;
        let decoded = decode(&encode(&sessions));

        let statuses: Vec<&str> = decoded.iter().map(|s| s.status.as_str()).collect();
        assert_eq!(statuses, ["active", "deactived", "active", "active"]);
        let starts: Vec<DateTime<Utc>> =
            decoded.iter().map(|s| s.start.with_timezone(&Utc)).collect();
        let expected: Vec<DateTime<Utc>> = sessions.iter().map(|s| s.start).collect();
        assert_eq!(starts, expected);
    }

    #[test]
    fn test_decode_skips_bad_segments() {
        let blob = "{date: 2025-13-45T99:00:00+00:00 status: active},\
                    {date: 2025-01-13T09:00:00+00:00 status: active},\
                    free text";
        let decoded = decode(blob);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].start.with_timezone(&Utc), utc(2025, 1, 13, 9, 0));
        assert!(decoded[0].segment.contains("2025-01-13"));
    }

    #[test]
    fn test_decode_empty_and_garbage() {
        assert!(decode("").is_empty());
        assert!(decode("Mon 9:00 Room A").is_empty());
    }

    #[test]
    fn test_decode_keeps_stored_offset() {
        let decoded = decode("{date: 2025-01-06T16:00:00+07:00 status: active}");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].start.offset().local_minus_utc(), 7 * 3600);
        assert_eq!(decoded[0].start.with_timezone(&Utc), utc(2025, 1, 6, 9, 0));
    }

    #[test]
    fn test_decode_naive_legacy_token_is_utc() {
        let decoded = decode("{date: 2025-01-06T09:00:00 status: active}");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].start.with_timezone(&Utc), utc(2025, 1, 6, 9, 0));
    }

    #[test]
    fn test_parse_anchor_forms() {
        let expected = utc(2025, 1, 6, 9, 0);
        assert_eq!(parse_anchor("2025-01-06T09:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_anchor("2025-01-06T09:00:00Z").unwrap(), expected);
        assert_eq!(parse_anchor("2025-01-06T16:00:00+07:00").unwrap(), expected);
        assert_eq!(parse_anchor("2025-01-06T09:00").unwrap(), expected);
        assert_eq!(parse_anchor(" 2025-01-06 09:00 ").unwrap(), expected);
    }

    #[test]
    fn test_parse_anchor_rejects_unresolvable() {
        for input in ["", "next monday", "2025-01-06", "2025-02-30T09:00:00Z"] {
            assert!(
                matches!(parse_anchor(input), Err(AppError::Validation(_))),
                "{input} should not resolve"
            );
        }
    }

    #[test]
    fn test_parse_anchor_rejects_unstorable_years() {
        for input in ["+262142-12-20T09:00", "+10000-01-06T09:00", "-0001-01-06T09:00"] {
            assert!(
                matches!(parse_anchor(input), Err(AppError::Validation(_))),
                "{input} should not resolve"
            );
        }
        assert_eq!(parse_anchor("9999-12-01T09:00").unwrap(), utc(9999, 12, 1, 9, 0));
    }

    #[test]
    fn test_weekly_rejects_sessions_past_year_9999() {
        let anchor = parse_anchor("9999-12-20T09:00").unwrap();
        assert!(matches!(weekly(anchor), Err(AppError::Validation(_))));
        assert!(matches!(
            weekly(DateTime::<Utc>::MAX_UTC),
            Err(AppError::Validation(_))
        ));

        let last = weekly(parse_anchor("9999-12-01T09:00").unwrap()).unwrap();
        let blob = encode(&last);
        assert_eq!(decode(&blob).len(), 4);
    }

    #[test]
    fn test_decode_skips_unstorable_years() {
        let blob = "{date: +262142-12-31T23:00:00 status: active},\
                    {date: 2025-01-13T09:00:00+00:00 status: active}";
        let decoded = decode(blob);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].start.with_timezone(&Utc), utc(2025, 1, 13, 9, 0));
    }

    #[test]
    fn test_deactivate_on_touches_one_segment() {
        let blob = "{date: 2025-02-03T09:00:00+00:00 status: active},\
                    {date: 2025-02-10T09:00:00+00:00 status: active},\
                    {date:   2025-02-17T09:00:00+00:00   status: active}";
        let updated = deactivate_on(blob, NaiveDate::from_ymd_opt(2025, 2, 10).unwrap())
            .expect("session on 2025-02-10");

        let before: Vec<&str> = blob.split(',').collect();
        let after: Vec<&str> = updated.split(',').collect();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], "{date: 2025-02-10T09:00:00+00:00 status: deactived}");
        assert_eq!(after[2], before[2]);
    }

    #[test]
    fn test_deactivate_on_uses_stored_offset_date() {
        // 01:00 on the 11th at +07:00 is still the 10th in UTC.
        let blob = "{date: 2025-02-11T01:00:00+07:00 status: active}";
        assert!(deactivate_on(blob, NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()).is_none());
        assert!(deactivate_on(blob, NaiveDate::from_ymd_opt(2025, 2, 11).unwrap()).is_some());
    }

    #[test]
    fn test_deactivate_on_requires_active_session() {
        let blob = "{date: 2025-02-10T09:00:00+00:00 status: deactived}";
        let date = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
        assert!(deactivate_on(blob, date).is_none());
        assert!(deactivate_on("", date).is_none());
    }
}
