use std::sync::Arc;

use sqlx::SqlitePool;

use super::lifecycle;
use super::locks::{LockKey, ScheduleLocks};
use crate::db::repository;
use crate::error::AppError;
use crate::models::ticket::{CLASS_REQUEST, LEAVE_REQUEST};
use crate::models::{
    ClassAssignmentRequestInfo, ClassInfo, ClassRequestBody, LeaveRequestBody, Ticket,
};

/// Lecturer requests and their review by coordinators.
pub struct RequestService {
    db: SqlitePool,
    locks: Arc<ScheduleLocks>,
}

impl RequestService {
    pub fn new(db: SqlitePool, locks: Arc<ScheduleLocks>) -> Self {
        Self { db, locks }
    }

    pub async fn list_class_requests(&self) -> Result<Vec<ClassAssignmentRequestInfo>, AppError> {
        Ok(repository::fetch_open_class_requests(&self.db).await?)
    }

    pub async fn list_leave_requests(&self) -> Result<Vec<Ticket>, AppError> {
        Ok(repository::fetch_leave_requests(&self.db).await?)
    }

    pub async fn submit_class_request(
        &self,
        user_id: i64,
        body: ClassRequestBody,
    ) -> Result<Ticket, AppError> {
        let _guard = self.locks.acquire([LockKey::Class(body.class_id)]).await;
        let mut tx = self.db.begin().await?;
        let ticket = lifecycle::submit_class_request(&mut *tx, user_id, body.class_id).await?;
        tx.commit().await?;
        Ok(ticket)
    }

    pub async fn submit_leave_request(
        &self,
        user_id: i64,
        body: LeaveRequestBody,
    ) -> Result<Ticket, AppError> {
        let _guard = self.locks.acquire([LockKey::Class(body.class_id)]).await;
        let mut tx = self.db.begin().await?;
        let ticket = lifecycle::submit_leave_request(&mut *tx, user_id, body).await?;
        tx.commit().await?;
        Ok(ticket)
    }

    pub async fn approve_class_request(&self, ticket_id: i64) -> Result<ClassInfo, AppError> {
        let guard = self.locks.acquire(self.ticket_keys(ticket_id).await?).await;
        let mut tx = self.db.begin().await?;
        let class = lifecycle::approve_assignment_request(&mut *tx, ticket_id).await?;
        tx.commit().await?;
        drop(guard);

        self.class_info(class.class_id).await
    }

    pub async fn reject_class_request(&self, ticket_id: i64) -> Result<Ticket, AppError> {
        let _guard = self.locks.acquire(self.ticket_keys(ticket_id).await?).await;
        let mut tx = self.db.begin().await?;
        let ticket = lifecycle::reject_assignment_request(&mut *tx, ticket_id).await?;
        tx.commit().await?;
        Ok(ticket)
    }

    pub async fn approve_leave(&self, ticket_id: i64) -> Result<ClassInfo, AppError> {
        let guard = self.locks.acquire(self.ticket_keys(ticket_id).await?).await;
        let mut tx = self.db.begin().await?;
        let class = lifecycle::approve_leave(&mut *tx, ticket_id).await?;
        tx.commit().await?;
        drop(guard);

        self.class_info(class.class_id).await
    }

    pub async fn reject_leave(&self, ticket_id: i64) -> Result<Ticket, AppError> {
        let _guard = self.locks.acquire(self.ticket_keys(ticket_id).await?).await;
        let mut tx = self.db.begin().await?;
        let ticket = lifecycle::reject_leave(&mut *tx, ticket_id).await?;
        tx.commit().await?;
        Ok(ticket)
    }

    /// Keys guarding the class a ticket refers to. Unreadable tickets yield no keys and are
    /// rejected inside the transaction.
    async fn ticket_keys(&self, ticket_id: i64) -> Result<Vec<LockKey>, AppError> {
        let mut keys = Vec::new();
        let Some(ticket) = repository::find_ticket(&self.db, ticket_id).await? else {
            return Ok(keys);
        };

        let class_id = match ticket.issue_type.as_str() {
            CLASS_REQUEST => ticket.requested_class_id().ok(),
            LEAVE_REQUEST => ticket.leave_ref().ok().map(|leave| leave.class_id),
            _ => None,
        };
        if let Some(class_id) = class_id {
            keys.push(LockKey::Class(class_id));
        }
        if ticket.issue_type == CLASS_REQUEST {
            if let Some(lecturer) =
                repository::find_lecturer_by_user(&self.db, ticket.submitted_by).await?
            {
                keys.push(LockKey::Lecturer(lecturer.lecturer_id));
            }
        }

        Ok(keys)
    }

    async fn class_info(&self, class_id: i64) -> Result<ClassInfo, AppError> {
        repository::find_class_detail(&self.db, class_id)
            .await?
            .map(ClassInfo::from)
            .ok_or_else(|| AppError::NotFound(format!("class {} does not exist", class_id)))
    }
}
