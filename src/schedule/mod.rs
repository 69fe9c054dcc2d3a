//! Recurring class sessions: the stored schedule text format and the overlap rules
//! used for conflict detection.

pub mod codec;
pub mod overlap;

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

pub use codec::{DecodedSession, decode, deactivate_on, encode, expand, parse_anchor};
pub use overlap::{overlaps, overlaps_for};

/// Sessions generated for a new class, or when a class is re-anchored.
pub const SESSIONS_PER_CLASS: usize = 4;
/// Days between consecutive sessions.
pub const SESSION_INTERVAL_DAYS: i64 = 7;
/// Every session is assumed to last this long.
pub const SESSION_LENGTH_MINUTES: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    // Spelling matches rows already in production.
    Deactived,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Deactived => "deactived",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub start: DateTime<Utc>,
    pub status: SessionStatus,
}

/// JSON view of one decoded session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    pub start: DateTime<FixedOffset>,
    pub status: String,
}

impl From<&DecodedSession> for SessionView {
    fn from(session: &DecodedSession) -> Self {
        Self {
            start: session.start,
            status: session.status.clone(),
        }
    }
}

/// Decodes `blob` and returns every session start in UTC.
pub fn session_starts(blob: &str) -> Vec<DateTime<Utc>> {
    decode(blob)
        .iter()
        .map(|s| s.start.with_timezone(&Utc))
        .collect()
}
