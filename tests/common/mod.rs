#![allow(dead_code)]

use chrono::Utc;
use lms_backend::db::MIGRATOR;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// In-memory database with the schema applied. One connection keeps the database alive.
pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

pub async fn seed_user(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (name, email, created_at) VALUES (?1, ?2, ?3) RETURNING user_id",
    )
    .bind(name)
    .bind(format!("{}@example.edu", name.to_lowercase().replace(' ', ".")))
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await
    .expect("Failed to seed user")
}

/// Returns `(user_id, lecturer_id)`.
pub async fn seed_lecturer(pool: &SqlitePool, name: &str) -> (i64, i64) {
    let user_id = seed_user(pool, name).await;
    let lecturer_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO lecturers (user_id, department) VALUES (?1, 'Mathematics') RETURNING lecturer_id",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("Failed to seed lecturer");
    (user_id, lecturer_id)
}

/// Inserts a ticket row the way older clients wrote them: no structured references.
pub async fn seed_legacy_ticket(
    pool: &SqlitePool,
    submitted_by: i64,
    issue_type: &str,
    title: &str,
) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO tickets (submitted_by, issue_type, title, description, status, created_at)
        VALUES (?1, ?2, ?3, '', 'open', ?4)
        RETURNING ticket_id
        "#,
    )
    .bind(submitted_by)
    .bind(issue_type)
    .bind(title)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await
    .expect("Failed to seed ticket")
}

pub async fn stored_schedule(pool: &SqlitePool, class_id: i64) -> String {
    sqlx::query_scalar::<_, String>("SELECT schedule FROM classes WHERE class_id = ?1")
        .bind(class_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read schedule")
}

pub async fn set_schedule(pool: &SqlitePool, class_id: i64, schedule: &str) {
    sqlx::query("UPDATE classes SET schedule = ?1 WHERE class_id = ?2")
        .bind(schedule)
        .bind(class_id)
        .execute(pool)
        .await
        .expect("Failed to set schedule");
}
