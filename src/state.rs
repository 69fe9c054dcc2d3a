use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::ScheduleLocks;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub locks: Arc<ScheduleLocks>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            locks: Arc::new(ScheduleLocks::new()),
        }
    }
}
