//! Class and ticket state transitions.
//!
//! Every function runs on a single connection, normally a transaction opened by the caller,
//! and either performs all of its writes or returns an error before the first one.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::conflict::ensure_no_conflicts;
use crate::db::repository;
use crate::error::AppError;
use crate::models::class::normalize_place;
use crate::models::ticket::{
    CLASS_REQUEST, LEAVE_REQUEST, class_request_title, leave_request_title,
};
use crate::models::{
    Class, ClassStatus, Lecturer, LeaveRequestBody, NewClass, NewClassRequest, NewTicket, Patch,
    Ticket, UpdateClassRequest,
};
use crate::schedule::{self, codec::weekly};

async fn load_class(conn: &mut SqliteConnection, class_id: i64) -> Result<Class, AppError> {
    repository::find_class(&mut *conn, class_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("class {} does not exist", class_id)))
}

async fn load_ticket(conn: &mut SqliteConnection, ticket_id: i64) -> Result<Ticket, AppError> {
    repository::find_ticket(&mut *conn, ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ticket {} does not exist", ticket_id)))
}

async fn lecturer_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Lecturer, AppError> {
    repository::find_lecturer_by_user(&mut *conn, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {} is not a lecturer", user_id)))
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("class name must not be empty".to_string()));
    }
    Ok(())
}

/// Session starts of a stored schedule. A non-empty schedule with no readable session
/// cannot be checked and is rejected.
fn stored_starts(class: &Class) -> Result<Vec<DateTime<Utc>>, AppError> {
    let starts = schedule::session_starts(&class.schedule);
    if starts.is_empty() && !class.schedule.trim().is_empty() {
        return Err(AppError::Parse(format!(
            "schedule of class {} has no readable session",
            class.class_id
        )));
    }
    Ok(starts)
}

async fn persist(conn: &mut SqliteConnection, class: &Class) -> Result<(), AppError> {
    if !repository::update_class(&mut *conn, class).await? {
        return Err(AppError::NotFound(format!("class {} does not exist", class.class_id)));
    }
    Ok(())
}

async fn open_ticket_of_type(
    conn: &mut SqliteConnection,
    ticket_id: i64,
    issue_type: &str,
) -> Result<Ticket, AppError> {
    let ticket = load_ticket(conn, ticket_id).await?;
    ticket.ensure_open()?;
    ticket.ensure_issue_type(issue_type)?;
    Ok(ticket)
}

async fn resolve(conn: &mut SqliteConnection, ticket_id: i64) -> Result<Ticket, AppError> {
    repository::resolve_ticket(&mut *conn, ticket_id).await?;
    load_ticket(conn, ticket_id).await
}

pub async fn create_class(
    conn: &mut SqliteConnection,
    req: NewClassRequest,
) -> Result<Class, AppError> {
    validate_name(&req.class_name)?;
    let mut status = match req.status.as_deref() {
        Some(raw) => raw.parse::<ClassStatus>()?,
        None => ClassStatus::Pending,
    };

    if repository::find_user(&mut *conn, req.creator_id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {} does not exist", req.creator_id)));
    }
    if let Some(lecturer_id) = req.lecturer_id {
        if repository::find_lecturer_by_id(&mut *conn, lecturer_id).await?.is_none() {
            return Err(AppError::NotFound(format!("lecturer {} does not exist", lecturer_id)));
        }
    }

    let anchor = schedule::parse_anchor(&req.anchor)?;
    let sessions = weekly(anchor)?;
    let starts: Vec<_> = sessions.iter().map(|s| s.start).collect();
    let place = normalize_place(req.place);

    ensure_no_conflicts(&mut *conn, &starts, place.as_deref(), req.lecturer_id, None).await?;

    if req.lecturer_id.is_some() && status == ClassStatus::Pending {
        status = ClassStatus::Active;
    }

    let class = repository::insert_class(
        &mut *conn,
        NewClass {
            class_name: req.class_name,
            lecturer_id: req.lecturer_id,
            schedule: schedule::encode(&sessions),
            created_by: req.creator_id,
            status,
            place,
        },
    )
    .await?;

    info!(
        "created class {} '{}' starting {}",
        class.class_id,
        class.class_name,
        anchor.to_rfc3339()
    );
    Ok(class)
}

pub async fn update_class(
    conn: &mut SqliteConnection,
    class_id: i64,
    req: UpdateClassRequest,
) -> Result<Class, AppError> {
    let mut class = load_class(conn, class_id).await?;
    let needs_check =
        req.anchor.is_some() || !req.place.is_missing() || !req.lecturer_id.is_missing();

    if let Some(name) = req.class_name {
        validate_name(&name)?;
        class.class_name = name;
    }
    if let Some(raw) = req.status.as_deref() {
        class.status = raw.parse::<ClassStatus>()?;
    }
    if let Patch::Value(lecturer_id) = req.lecturer_id {
        if repository::find_lecturer_by_id(&mut *conn, lecturer_id).await?.is_none() {
            return Err(AppError::NotFound(format!("lecturer {} does not exist", lecturer_id)));
        }
    }
    class.lecturer_id = req.lecturer_id.apply(class.lecturer_id);
    class.place = normalize_place(req.place.apply(class.place));

    // A new anchor replaces every session, including deactivated ones.
    let starts = match req.anchor.as_deref() {
        Some(raw) => {
            let sessions = weekly(schedule::parse_anchor(raw)?)?;
            class.schedule = schedule::encode(&sessions);
            sessions.into_iter().map(|s| s.start).collect()
        }
        None if needs_check => stored_starts(&class)?,
        None => Vec::new(),
    };

    if needs_check {
        ensure_no_conflicts(
            &mut *conn,
            &starts,
            class.place.as_deref(),
            class.lecturer_id,
            Some(class_id),
        )
        .await?;
    }

    class.settle_status();
    persist(conn, &class).await?;

    debug!("updated class {}", class_id);
    Ok(class)
}

pub async fn assign_teacher(
    conn: &mut SqliteConnection,
    lecturer_user_id: i64,
    class_id: i64,
) -> Result<Class, AppError> {
    let lecturer = lecturer_for_user(conn, lecturer_user_id).await?;
    let mut class = load_class(conn, class_id).await?;
    if let Some(current) = class.lecturer_id {
        return Err(AppError::Conflict(format!(
            "class {} is already assigned to lecturer {}",
            class_id, current
        )));
    }

    let starts = stored_starts(&class)?;
    ensure_no_conflicts(&mut *conn, &starts, None, Some(lecturer.lecturer_id), Some(class_id)).await?;

    class.lecturer_id = Some(lecturer.lecturer_id);
    class.settle_status();
    persist(conn, &class).await?;

    info!("assigned lecturer {} to class {}", lecturer.lecturer_id, class_id);
    Ok(class)
}

pub async fn toggle_status(conn: &mut SqliteConnection, class_id: i64) -> Result<Class, AppError> {
    let mut class = load_class(conn, class_id).await?;
    let previous = class.status;
    class.status = previous.toggled();
    persist(conn, &class).await?;

    info!("class {} status {} -> {}", class_id, previous, class.status);
    Ok(class)
}

pub async fn approve_assignment_request(
    conn: &mut SqliteConnection,
    ticket_id: i64,
) -> Result<Class, AppError> {
    let ticket = open_ticket_of_type(conn, ticket_id, CLASS_REQUEST).await?;
    let class_id = ticket.requested_class_id()?;
    let lecturer = lecturer_for_user(conn, ticket.submitted_by).await?;
    let mut class = load_class(conn, class_id).await?;

    if let Some(current) = class.lecturer_id {
        return Err(AppError::Conflict(format!(
            "class {} is already assigned to lecturer {}",
            class_id, current
        )));
    }

    // Same sweep as assign_teacher: the place was settled when the class was scheduled.
    let starts = stored_starts(&class)?;
    ensure_no_conflicts(
        &mut *conn,
        &starts,
        None,
        Some(lecturer.lecturer_id),
        Some(class_id),
    )
    .await?;

    class.lecturer_id = Some(lecturer.lecturer_id);
    class.status = ClassStatus::Active;
    persist(conn, &class).await?;
    resolve(conn, ticket_id).await?;

    info!(
        "approved ticket {}: lecturer {} assigned to class {}",
        ticket_id, lecturer.lecturer_id, class_id
    );
    Ok(class)
}

pub async fn reject_assignment_request(
    conn: &mut SqliteConnection,
    ticket_id: i64,
) -> Result<Ticket, AppError> {
    open_ticket_of_type(conn, ticket_id, CLASS_REQUEST).await?;
    let ticket = resolve(conn, ticket_id).await?;
    info!("rejected class assignment ticket {}", ticket_id);
    Ok(ticket)
}

pub async fn approve_leave(conn: &mut SqliteConnection, ticket_id: i64) -> Result<Class, AppError> {
    let ticket = open_ticket_of_type(conn, ticket_id, LEAVE_REQUEST).await?;
    let leave = ticket.leave_ref()?;
    let mut class = load_class(conn, leave.class_id).await?;

    class.schedule = schedule::deactivate_on(&class.schedule, leave.date).ok_or_else(|| {
        AppError::NotFound(format!(
            "class {} has no active session on {} for lecturer user {}",
            leave.class_id, leave.date, leave.user_id
        ))
    })?;
    persist(conn, &class).await?;
    resolve(conn, ticket_id).await?;

    info!(
        "approved leave ticket {} from user {}: class {} session on {} deactivated",
        ticket_id, leave.user_id, leave.class_id, leave.date
    );
    Ok(class)
}

pub async fn reject_leave(conn: &mut SqliteConnection, ticket_id: i64) -> Result<Ticket, AppError> {
    open_ticket_of_type(conn, ticket_id, LEAVE_REQUEST).await?;
    let ticket = resolve(conn, ticket_id).await?;
    info!("rejected leave ticket {}", ticket_id);
    Ok(ticket)
}

pub async fn submit_class_request(
    conn: &mut SqliteConnection,
    user_id: i64,
    class_id: i64,
) -> Result<Ticket, AppError> {
    let lecturer = lecturer_for_user(conn, user_id).await?;
    let class = load_class(conn, class_id).await?;
    if class.lecturer_id.is_some() {
        return Err(AppError::Conflict(format!(
            "class {} already has a lecturer",
            class_id
        )));
    }

    let title = class_request_title(class_id);
    if repository::find_pending_ticket(&mut *conn, user_id, &title)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "an assignment request for class {} is already pending",
            class_id
        )));
    }

    let ticket = repository::insert_ticket(
        &mut *conn,
        NewTicket {
            submitted_by: user_id,
            issue_type: CLASS_REQUEST.to_string(),
            title,
            description: format!(
                "{} asks to teach '{}' (class {})",
                lecturer.name, class.class_name, class_id
            ),
            class_id: Some(class_id),
            leave_date: None,
        },
    )
    .await?;

    info!("user {} requested class {} (ticket {})", user_id, class_id, ticket.ticket_id);
    Ok(ticket)
}

pub async fn submit_leave_request(
    conn: &mut SqliteConnection,
    user_id: i64,
    body: LeaveRequestBody,
) -> Result<Ticket, AppError> {
    let lecturer = lecturer_for_user(conn, user_id).await?;
    let class = load_class(conn, body.class_id).await?;
    if class.lecturer_id != Some(lecturer.lecturer_id) {
        return Err(AppError::Forbidden(format!(
            "user {} does not teach class {}",
            user_id, body.class_id
        )));
    }

    let title = leave_request_title(user_id, body.class_id, body.leave_date);
    if repository::find_pending_ticket(&mut *conn, user_id, &title)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "a leave request for class {} on {} is already pending",
            body.class_id, body.leave_date
        )));
    }

    let reason = body.reason.trim();
    let description = if reason.is_empty() {
        format!(
            "{} requests leave from '{}' on {}",
            lecturer.name, class.class_name, body.leave_date
        )
    } else {
        format!(
            "{} requests leave from '{}' on {}. Reason: {}",
            lecturer.name, class.class_name, body.leave_date, reason
        )
    };

    let ticket = repository::insert_ticket(
        &mut *conn,
        NewTicket {
            submitted_by: user_id,
            issue_type: LEAVE_REQUEST.to_string(),
            title,
            description,
            class_id: Some(body.class_id),
            leave_date: Some(body.leave_date),
        },
    )
    .await?;

    info!(
        "user {} requested leave from class {} on {} (ticket {})",
        user_id, body.class_id, body.leave_date, ticket.ticket_id
    );
    Ok(ticket)
}
