use axum::Json;
use axum::extract::Path;
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::error::AppError;
use crate::models::*;
use crate::services::{ClassService, RequestService};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/unassigned", get(list_unassigned))
        .route("/classes/assign-teacher", post(assign_teacher))
        .route("/classes/{class_id}", get(get_class).patch(update_class))
        .route("/classes/{class_id}/toggle-status", post(toggle_status))
        .route("/lecturers/{user_id}/schedule", get(lecturer_schedule))
        .route("/lecturers/{user_id}/class-requests", post(submit_class_request))
        .route("/lecturers/{user_id}/leave-requests", post(submit_leave_request))
        .route("/requests/class-assignments", get(list_class_requests))
        .route(
            "/requests/class-assignments/{ticket_id}/approve",
            post(approve_class_request),
        )
        .route(
            "/requests/class-assignments/{ticket_id}/reject",
            post(reject_class_request),
        )
        .route("/leave-requests", get(list_leave_requests))
        .route("/leave-requests/{ticket_id}/approve", post(approve_leave))
        .route("/leave-requests/{ticket_id}/reject", post(reject_leave))
        .with_state(state)
}

fn class_service(state: &AppState) -> ClassService {
    ClassService::new(state.db.clone(), state.locks.clone())
}

fn request_service(state: &AppState) -> RequestService {
    RequestService::new(state.db.clone(), state.locks.clone())
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_classes(State(state): State<AppState>) -> Result<Json<Vec<ClassInfo>>, AppError> {
    let classes = class_service(&state).list_classes().await?;
    Ok(Json(classes))
}

async fn create_class(
    State(state): State<AppState>,
    Json(req): Json<NewClassRequest>,
) -> Result<(StatusCode, Json<ClassInfo>), AppError> {
    let class = class_service(&state).create_class(req).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

async fn list_unassigned(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassInfo>>, AppError> {
    let classes = class_service(&state).list_unassigned().await?;
    Ok(Json(classes))
}

async fn assign_teacher(
    State(state): State<AppState>,
    Json(req): Json<AssignTeacherRequest>,
) -> Result<Json<ClassInfo>, AppError> {
    let class = class_service(&state).assign_teacher(req).await?;
    Ok(Json(class))
}

async fn get_class(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
) -> Result<Json<ClassInfo>, AppError> {
    let class = class_service(&state).get_class(class_id).await?;
    Ok(Json(class))
}

async fn update_class(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
    Json(req): Json<UpdateClassRequest>,
) -> Result<Json<ClassInfo>, AppError> {
    let class = class_service(&state).update_class(class_id, req).await?;
    Ok(Json(class))
}

async fn toggle_status(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
) -> Result<Json<StatusChange>, AppError> {
    let change = class_service(&state).toggle_status(class_id).await?;
    Ok(Json(change))
}

async fn lecturer_schedule(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ClassInfo>>, AppError> {
    let classes = class_service(&state).lecturer_schedule(user_id).await?;
    Ok(Json(classes))
}

async fn submit_class_request(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<ClassRequestBody>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let ticket = request_service(&state).submit_class_request(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn submit_leave_request(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<LeaveRequestBody>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let ticket = request_service(&state).submit_leave_request(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn list_class_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassAssignmentRequestInfo>>, AppError> {
    let open = request_service(&state).list_class_requests().await?;
    Ok(Json(open))
}

async fn approve_class_request(
    State(state): State<AppState>,
    Path(ticket_id): Path<i64>,
) -> Result<Json<ClassInfo>, AppError> {
    let class = request_service(&state).approve_class_request(ticket_id).await?;
    Ok(Json(class))
}

async fn reject_class_request(
    State(state): State<AppState>,
    Path(ticket_id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let ticket = request_service(&state).reject_class_request(ticket_id).await?;
    Ok(Json(MessageResponse::new(format!(
        "class assignment request {} rejected",
        ticket.ticket_id
    ))))
}

async fn list_leave_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let tickets = request_service(&state).list_leave_requests().await?;
    Ok(Json(tickets))
}

async fn approve_leave(
    State(state): State<AppState>,
    Path(ticket_id): Path<i64>,
) -> Result<Json<ClassInfo>, AppError> {
    let class = request_service(&state).approve_leave(ticket_id).await?;
    Ok(Json(class))
}

async fn reject_leave(
    State(state): State<AppState>,
    Path(ticket_id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let ticket = request_service(&state).reject_leave(ticket_id).await?;
    Ok(Json(MessageResponse::new(format!(
        "leave request {} rejected",
        ticket.ticket_id
    ))))
}
