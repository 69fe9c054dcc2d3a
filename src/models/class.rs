use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Patch;
use crate::error::AppError;
use crate::schedule::{self, SessionView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ClassStatus {
    Pending,
    Active,
    Archived,
}

impl ClassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassStatus::Pending => "pending",
            ClassStatus::Active => "active",
            ClassStatus::Archived => "archived",
        }
    }

    /// Status after a toggle: archive an active class, reopen an archived one, start a
    /// pending one.
    pub fn toggled(self) -> ClassStatus {
        match self {
            ClassStatus::Active => ClassStatus::Archived,
            ClassStatus::Archived => ClassStatus::Active,
            ClassStatus::Pending => ClassStatus::Active,
        }
    }
}

impl fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ClassStatus::Pending),
            "active" => Ok(ClassStatus::Active),
            "archived" => Ok(ClassStatus::Archived),
            other => Err(AppError::Validation(format!(
                "invalid class status '{}', expected pending, active or archived",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub class_id: i64,
    pub class_name: String,
    pub lecturer_id: Option<i64>,
    pub schedule: String,
    pub created_by: i64,
    pub status: ClassStatus,
    pub created_at: String,
    pub place: Option<String>,
}

impl Class {
    /// A class with a lecturer may not stay pending once committed.
    pub fn settle_status(&mut self) {
        if self.lecturer_id.is_some() && self.status == ClassStatus::Pending {
            self.status = ClassStatus::Active;
        }
    }
}

/// Class row joined with the assigned lecturer's display name.
#[derive(Debug, Clone, FromRow)]
pub struct ClassDetail {
    #[sqlx(flatten)]
    pub class: Class,
    pub lecturer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    pub class_id: i64,
    pub class_name: String,
    pub lecturer_id: Option<i64>,
    pub lecturer_name: Option<String>,
    pub status: ClassStatus,
    pub place: Option<String>,
    pub schedule: String,
    pub sessions: Vec<SessionView>,
    pub created_by: i64,
    pub created_at: String,
}

impl From<ClassDetail> for ClassInfo {
    fn from(detail: ClassDetail) -> Self {
        let ClassDetail {
            class,
            lecturer_name,
        } = detail;
        let sessions = schedule::decode(&class.schedule)
            .iter()
            .map(SessionView::from)
            .collect();

        Self {
            class_id: class.class_id,
            class_name: class.class_name,
            lecturer_id: class.lecturer_id,
            lecturer_name,
            status: class.status,
            place: class.place,
            schedule: class.schedule,
            sessions,
            created_by: class.created_by,
            created_at: class.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClassRequest {
    pub creator_id: i64,
    pub class_name: String,
    /// Start of the first session.
    #[serde(alias = "schedule")]
    pub anchor: String,
    pub status: Option<String>,
    pub lecturer_id: Option<i64>,
    pub place: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClassRequest {
    pub class_name: Option<String>,
    #[serde(default, alias = "schedule")]
    pub anchor: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub lecturer_id: Patch<i64>,
    #[serde(default)]
    pub place: Patch<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignTeacherRequest {
    pub lecturer_user_id: i64,
    pub class_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub class_id: i64,
    pub status: ClassStatus,
}

/// Row data for a class that has passed every check.
#[derive(Debug, Clone)]
pub struct NewClass {
    pub class_name: String,
    pub lecturer_id: Option<i64>,
    pub schedule: String,
    pub created_by: i64,
    pub status: ClassStatus,
    pub place: Option<String>,
}

/// Blank or whitespace-only places mean "no place".
pub fn normalize_place(place: Option<String>) -> Option<String> {
    place
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}
