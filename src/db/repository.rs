use chrono::Utc;
use sqlx::sqlite::SqliteExecutor;

use crate::models::{
    Class, ClassAssignmentRequestInfo, ClassDetail, Lecturer, NewClass, NewTicket, Ticket, User,
};

pub async fn find_user<'e, E>(db: E, user_id: i64) -> Result<Option<User>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, User>("SELECT user_id, name, email FROM users WHERE user_id = ?1")
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn find_lecturer_by_id<'e, E>(
    db: E,
    lecturer_id: i64,
) -> Result<Option<Lecturer>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Lecturer>(
        r#"
        SELECT l.lecturer_id, l.user_id, u.name, l.department
        FROM lecturers l
        JOIN users u ON u.user_id = l.user_id
        WHERE l.lecturer_id = ?1
        "#,
    )
    .bind(lecturer_id)
    .fetch_optional(db)
    .await
}

pub async fn find_lecturer_by_user<'e, E>(
    db: E,
    user_id: i64,
) -> Result<Option<Lecturer>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Lecturer>(
        r#"
        SELECT l.lecturer_id, l.user_id, u.name, l.department
        FROM lecturers l
        JOIN users u ON u.user_id = l.user_id
        WHERE l.user_id = ?1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn find_class<'e, E>(db: E, class_id: i64) -> Result<Option<Class>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Class>(
        "SELECT class_id, class_name, lecturer_id, schedule, created_by, status, created_at, place FROM classes WHERE class_id = ?1"
    )
    .bind(class_id)
    .fetch_optional(db)
    .await
}

pub async fn find_class_detail<'e, E>(
    db: E,
    class_id: i64,
) -> Result<Option<ClassDetail>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, ClassDetail>(
        r#"
        SELECT
            c.class_id, c.class_name, c.lecturer_id, c.schedule, c.created_by,
            c.status, c.created_at, c.place, u.name AS lecturer_name
        FROM classes c
        LEFT JOIN lecturers l ON l.lecturer_id = c.lecturer_id
        LEFT JOIN users u ON u.user_id = l.user_id
        WHERE c.class_id = ?1
        "#,
    )
    .bind(class_id)
    .fetch_optional(db)
    .await
}

pub async fn fetch_class_details<'e, E>(db: E) -> Result<Vec<ClassDetail>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, ClassDetail>(
        r#"
        SELECT
            c.class_id, c.class_name, c.lecturer_id, c.schedule, c.created_by,
            c.status, c.created_at, c.place, u.name AS lecturer_name
        FROM classes c
        LEFT JOIN lecturers l ON l.lecturer_id = c.lecturer_id
        LEFT JOIN users u ON u.user_id = l.user_id
        ORDER BY c.class_id
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn fetch_unassigned_classes<'e, E>(db: E) -> Result<Vec<ClassDetail>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, ClassDetail>(
        r#"
        SELECT
            class_id, class_name, lecturer_id, schedule, created_by,
            status, created_at, place, NULL AS lecturer_name
        FROM classes
        WHERE lecturer_id IS NULL AND status IN ('active', 'pending')
        ORDER BY class_id
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn fetch_lecturer_classes<'e, E>(
    db: E,
    lecturer_id: i64,
) -> Result<Vec<ClassDetail>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, ClassDetail>(
        r#"
        SELECT
            c.class_id, c.class_name, c.lecturer_id, c.schedule, c.created_by,
            c.status, c.created_at, c.place, u.name AS lecturer_name
        FROM classes c
        JOIN lecturers l ON l.lecturer_id = c.lecturer_id
        JOIN users u ON u.user_id = l.user_id
        WHERE c.lecturer_id = ?1
        ORDER BY c.class_id
        "#,
    )
    .bind(lecturer_id)
    .fetch_all(db)
    .await
}

pub async fn fetch_classes_at_place<'e, E>(
    db: E,
    place: &str,
    excluding: Option<i64>,
) -> Result<Vec<Class>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Class>(
        r#"
        SELECT class_id, class_name, lecturer_id, schedule, created_by, status, created_at, place
        FROM classes
        WHERE place = ?1 AND (?2 IS NULL OR class_id != ?2)
        ORDER BY class_id
        "#,
    )
    .bind(place)
    .bind(excluding)
    .fetch_all(db)
    .await
}

pub async fn fetch_active_classes_for_lecturer<'e, E>(
    db: E,
    lecturer_id: i64,
    excluding: Option<i64>,
) -> Result<Vec<Class>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Class>(
        r#"
        SELECT class_id, class_name, lecturer_id, schedule, created_by, status, created_at, place
        FROM classes
        WHERE lecturer_id = ?1 AND status = 'active' AND (?2 IS NULL OR class_id != ?2)
        ORDER BY class_id
        "#,
    )
    .bind(lecturer_id)
    .bind(excluding)
    .fetch_all(db)
    .await
}

pub async fn insert_class<'e, E>(db: E, new: NewClass) -> Result<Class, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now().to_rfc3339();

    sqlx::query_as::<_, Class>(
        r#"
        INSERT INTO classes
            (class_name, lecturer_id, schedule, created_by, status, created_at, place)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING class_id, class_name, lecturer_id, schedule, created_by, status, created_at, place
        "#,
    )
    .bind(new.class_name)
    .bind(new.lecturer_id)
    .bind(new.schedule)
    .bind(new.created_by)
    .bind(new.status)
    .bind(now)
    .bind(new.place)
    .fetch_one(db)
    .await
}

pub async fn update_class<'e, E>(db: E, class: &Class) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE classes
        SET class_name = ?1,
            lecturer_id = ?2,
            schedule = ?3,
            status = ?4,
            place = ?5
        WHERE class_id = ?6
        "#,
    )
    .bind(&class.class_name)
    .bind(class.lecturer_id)
    .bind(&class.schedule)
    .bind(class.status)
    .bind(&class.place)
    .bind(class.class_id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn find_ticket<'e, E>(db: E, ticket_id: i64) -> Result<Option<Ticket>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Ticket>(
        "SELECT ticket_id, submitted_by, assigned_to, issue_type, title, description, status, created_at, resolved_at, class_id, leave_date FROM tickets WHERE ticket_id = ?1"
    )
    .bind(ticket_id)
    .fetch_optional(db)
    .await
}

/// An `open` or `in_progress` ticket from `submitted_by` with exactly this title.
pub async fn find_pending_ticket<'e, E>(
    db: E,
    submitted_by: i64,
    title: &str,
) -> Result<Option<Ticket>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Ticket>(
        r#"
        SELECT ticket_id, submitted_by, assigned_to, issue_type, title, description,
               status, created_at, resolved_at, class_id, leave_date
        FROM tickets
        WHERE submitted_by = ?1 AND title = ?2 AND status IN ('open', 'in_progress')
        LIMIT 1
        "#,
    )
    .bind(submitted_by)
    .bind(title)
    .fetch_optional(db)
    .await
}

pub async fn insert_ticket<'e, E>(db: E, new: NewTicket) -> Result<Ticket, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now().to_rfc3339();
    let leave_date = new.leave_date.map(|d| d.format("%Y-%m-%d").to_string());

    sqlx::query_as::<_, Ticket>(
        r#"
        INSERT INTO tickets
            (submitted_by, assigned_to, issue_type, title, description, status,
            created_at, resolved_at, class_id, leave_date)
        VALUES (?1, NULL, ?2, ?3, ?4, 'open', ?5, NULL, ?6, ?7)
        RETURNING ticket_id, submitted_by, assigned_to, issue_type, title, description,
                  status, created_at, resolved_at, class_id, leave_date
        "#,
    )
    .bind(new.submitted_by)
    .bind(new.issue_type)
    .bind(new.title)
    .bind(new.description)
    .bind(now)
    .bind(new.class_id)
    .bind(leave_date)
    .fetch_one(db)
    .await
}

pub async fn resolve_ticket<'e, E>(db: E, ticket_id: i64) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE tickets
        SET status = 'resolved',
            resolved_at = ?2
        WHERE ticket_id = ?1
        "#,
    )
    .bind(ticket_id)
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn fetch_open_class_requests<'e, E>(
    db: E,
) -> Result<Vec<ClassAssignmentRequestInfo>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, ClassAssignmentRequestInfo>(
        r#"
        SELECT
            t.ticket_id,
            t.submitted_by AS submitted_by_user_id,
            u.name AS submitted_by_name,
            t.class_id,
            t.title,
            t.description,
            t.created_at
        FROM tickets t
        JOIN users u ON u.user_id = t.submitted_by
        WHERE t.issue_type = 'Class Request' AND t.status = 'open'
        ORDER BY t.created_at, t.ticket_id
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn fetch_leave_requests<'e, E>(db: E) -> Result<Vec<Ticket>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Ticket>(
        r#"
        SELECT ticket_id, submitted_by, assigned_to, issue_type, title, description,
               status, created_at, resolved_at, class_id, leave_date
        FROM tickets
        WHERE issue_type = 'Leave Request'
        ORDER BY created_at DESC, ticket_id DESC
        "#,
    )
    .fetch_all(db)
    .await
}
