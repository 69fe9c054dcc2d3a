pub mod repository;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::Class;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn connect(config: &AppConfig) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
}

/// Competing classes consulted by the conflict detector.
#[async_trait]
pub trait ScheduleStore: Send {
    /// Every class held at `place`, in any status, except `excluding`.
    async fn classes_at_place(
        &mut self,
        place: &str,
        excluding: Option<i64>,
    ) -> Result<Vec<Class>, AppError>;

    /// Active classes taught by `lecturer_id`, except `excluding`.
    async fn active_classes_for_lecturer(
        &mut self,
        lecturer_id: i64,
        excluding: Option<i64>,
    ) -> Result<Vec<Class>, AppError>;
}

#[async_trait]
impl ScheduleStore for SqliteConnection {
    async fn classes_at_place(
        &mut self,
        place: &str,
        excluding: Option<i64>,
    ) -> Result<Vec<Class>, AppError> {
        Ok(repository::fetch_classes_at_place(&mut *self, place, excluding).await?)
    }

    async fn active_classes_for_lecturer(
        &mut self,
        lecturer_id: i64,
        excluding: Option<i64>,
    ) -> Result<Vec<Class>, AppError> {
        Ok(repository::fetch_active_classes_for_lecturer(&mut *self, lecturer_id, excluding).await?)
    }
}
