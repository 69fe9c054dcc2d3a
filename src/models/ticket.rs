use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

pub const CLASS_REQUEST: &str = "Class Request";
pub const LEAVE_REQUEST: &str = "Leave Request";

static CLASS_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Class ID:\s*(\d+)").unwrap());
static LEAVE_TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Leave Request: User (\d+) - Class (\d+) - Date ([\d\-]+)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub ticket_id: i64,
    pub submitted_by: i64,
    pub assigned_to: Option<i64>,
    pub issue_type: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub class_id: Option<i64>,
    pub leave_date: Option<String>,
}

/// What a leave request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveRef {
    pub user_id: i64,
    pub class_id: i64,
    pub date: NaiveDate,
}

impl Ticket {
    pub fn ensure_open(&self) -> Result<(), AppError> {
        if self.status != TicketStatus::Open {
            return Err(AppError::Conflict(format!(
                "ticket {} is not open, status is '{}'",
                self.ticket_id, self.status
            )));
        }
        Ok(())
    }

    pub fn ensure_issue_type(&self, expected: &str) -> Result<(), AppError> {
        if self.issue_type != expected {
            return Err(AppError::Validation(format!(
                "ticket {} is a '{}', not a '{}'",
                self.ticket_id, self.issue_type, expected
            )));
        }
        Ok(())
    }

    /// Class targeted by an assignment request. Rows written before the `class_id`
    /// column existed only carry it in the title.
    pub fn requested_class_id(&self) -> Result<i64, AppError> {
        if let Some(class_id) = self.class_id {
            return Ok(class_id);
        }
        parse_class_id(&self.title)
    }

    /// Lecturer, class and date of a leave request, from the structured columns when set,
    /// otherwise from the title.
    pub fn leave_ref(&self) -> Result<LeaveRef, AppError> {
        if let (Some(class_id), Some(date)) = (self.class_id, self.leave_date.as_deref()) {
            return Ok(LeaveRef {
                user_id: self.submitted_by,
                class_id,
                date: parse_leave_date(date)?,
            });
        }
        parse_leave_title(&self.title)
    }
}

pub fn class_request_title(class_id: i64) -> String {
    format!("Class Assignment Request for Class ID: {}", class_id)
}

pub fn leave_request_title(user_id: i64, class_id: i64, date: NaiveDate) -> String {
    format!(
        "Leave Request: User {} - Class {} - Date {}",
        user_id,
        class_id,
        date.format("%Y-%m-%d")
    )
}

pub fn parse_class_id(title: &str) -> Result<i64, AppError> {
    CLASS_ID_PATTERN
        .captures(title)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .ok_or_else(|| AppError::Parse(format!("no class id in ticket title '{}'", title)))
}

pub fn parse_leave_title(title: &str) -> Result<LeaveRef, AppError> {
    let caps = LEAVE_TITLE_PATTERN.captures(title).ok_or_else(|| {
        AppError::Parse(format!("cannot parse leave request title '{}'", title))
    })?;
    let number = |i: usize| {
        caps[i]
            .parse::<i64>()
            .map_err(|_| AppError::Parse(format!("id out of range in '{}'", title)))
    };

    Ok(LeaveRef {
        user_id: number(1)?,
        class_id: number(2)?,
        date: parse_leave_date(&caps[3])?,
    })
}

fn parse_leave_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| AppError::Parse(format!("invalid leave date '{}': {}", raw, e)))
}

/// Ticket row to insert; always starts `open`.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub submitted_by: i64,
    pub issue_type: String,
    pub title: String,
    pub description: String,
    pub class_id: Option<i64>,
    pub leave_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRequestBody {
    pub class_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequestBody {
    pub class_id: i64,
    pub leave_date: NaiveDate,
    pub reason: String,
}

/// Open assignment request with the submitter's name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassAssignmentRequestInfo {
    pub ticket_id: i64,
    pub submitted_by_user_id: i64,
    pub submitted_by_name: String,
    pub class_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
