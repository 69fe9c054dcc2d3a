use std::collections::BTreeSet;
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::debug;

use super::lifecycle;
use super::locks::{LockKey, ScheduleLocks};
use crate::db::repository;
use crate::error::AppError;
use crate::models::class::normalize_place;
use crate::models::{
    AssignTeacherRequest, Class, ClassInfo, NewClassRequest, StatusChange, UpdateClassRequest,
};

pub struct ClassService {
    db: SqlitePool,
    locks: Arc<ScheduleLocks>,
}

/// Keys an update of `class` with `req` has to hold: the class itself plus the place and
/// lecturer it ends up with.
fn update_keys(class: &Class, req: &UpdateClassRequest) -> BTreeSet<LockKey> {
    let mut keys = BTreeSet::from([LockKey::Class(class.class_id)]);
    if let Some(place) = normalize_place(req.place.clone().apply(class.place.clone())) {
        keys.insert(LockKey::Place(place));
    }
    if let Some(lecturer_id) = req.lecturer_id.clone().apply(class.lecturer_id) {
        keys.insert(LockKey::Lecturer(lecturer_id));
    }
    keys
}

impl ClassService {
    pub fn new(db: SqlitePool, locks: Arc<ScheduleLocks>) -> Self {
        Self { db, locks }
    }

    pub async fn list_classes(&self) -> Result<Vec<ClassInfo>, AppError> {
        let classes = repository::fetch_class_details(&self.db).await?;
        Ok(classes.into_iter().map(ClassInfo::from).collect())
    }

    pub async fn get_class(&self, class_id: i64) -> Result<ClassInfo, AppError> {
        repository::find_class_detail(&self.db, class_id)
            .await?
            .map(ClassInfo::from)
            .ok_or_else(|| AppError::NotFound(format!("class {} does not exist", class_id)))
    }

    pub async fn list_unassigned(&self) -> Result<Vec<ClassInfo>, AppError> {
        let classes = repository::fetch_unassigned_classes(&self.db).await?;
        Ok(classes.into_iter().map(ClassInfo::from).collect())
    }

    pub async fn lecturer_schedule(&self, user_id: i64) -> Result<Vec<ClassInfo>, AppError> {
        let lecturer = repository::find_lecturer_by_user(&self.db, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {} is not a lecturer", user_id)))?;
        let classes = repository::fetch_lecturer_classes(&self.db, lecturer.lecturer_id).await?;
        Ok(classes.into_iter().map(ClassInfo::from).collect())
    }

    pub async fn create_class(&self, req: NewClassRequest) -> Result<ClassInfo, AppError> {
        let mut keys = Vec::new();
        if let Some(place) = normalize_place(req.place.clone()) {
            keys.push(LockKey::Place(place));
        }
        if let Some(lecturer_id) = req.lecturer_id {
            keys.push(LockKey::Lecturer(lecturer_id));
        }

        let guard = self.locks.acquire(keys).await;
        let mut tx = self.db.begin().await?;
        let class = lifecycle::create_class(&mut *tx, req).await?;
        tx.commit().await?;
        drop(guard);

        self.get_class(class.class_id).await
    }

    pub async fn update_class(
        &self,
        class_id: i64,
        req: UpdateClassRequest,
    ) -> Result<ClassInfo, AppError> {
        loop {
            let current = self.find(class_id).await?;
            let keys = update_keys(&current, &req);
            let guard = self.locks.acquire(keys.clone()).await;

            // Place or lecturer may have moved while waiting; retry with the new keys.
            let latest = self.find(class_id).await?;
            if update_keys(&latest, &req) != keys {
                debug!("lock keys of class {} changed, retrying update", class_id);
                continue;
            }

            let mut tx = self.db.begin().await?;
            let class = lifecycle::update_class(&mut *tx, class_id, req).await?;
            tx.commit().await?;
            drop(guard);

            return self.get_class(class.class_id).await;
        }
    }

    pub async fn assign_teacher(&self, req: AssignTeacherRequest) -> Result<ClassInfo, AppError> {
        let mut keys = vec![LockKey::Class(req.class_id)];
        if let Some(lecturer) =
            repository::find_lecturer_by_user(&self.db, req.lecturer_user_id).await?
        {
            keys.push(LockKey::Lecturer(lecturer.lecturer_id));
        }

        let guard = self.locks.acquire(keys).await;
        let mut tx = self.db.begin().await?;
        let class = lifecycle::assign_teacher(&mut *tx, req.lecturer_user_id, req.class_id).await?;
        tx.commit().await?;
        drop(guard);

        self.get_class(class.class_id).await
    }

    pub async fn toggle_status(&self, class_id: i64) -> Result<StatusChange, AppError> {
        let _guard = self.locks.acquire([LockKey::Class(class_id)]).await;
        let mut tx = self.db.begin().await?;
        let class = lifecycle::toggle_status(&mut *tx, class_id).await?;
        tx.commit().await?;

        Ok(StatusChange {
            class_id: class.class_id,
            status: class.status,
        })
    }

    async fn find(&self, class_id: i64) -> Result<Class, AppError> {
        repository::find_class(&self.db, class_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("class {} does not exist", class_id)))
    }
}
