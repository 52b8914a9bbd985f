use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    crud::{crud_routes, Page},
    error::AppResult,
    extract::{AppJson, AppQuery},
    leaves::{
        dto::{DecisionResponse, LeaveInput},
        repo_types::Leave,
        services::LeaveService,
    },
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .merge(crud_routes::<LeaveService>("/admin/leaves"))
        .route("/admin/leaves/:id/approve", post(approve))
        .route("/admin/leaves/:id/reject", post(reject))
}

pub fn self_routes() -> Router<AppState> {
    Router::new().route("/me/leaves", get(my_leaves).post(request_leave))
}

#[instrument(skip(svc))]
pub async fn approve(
    State(svc): State<Arc<LeaveService>>,
    AuthUser(acting): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DecisionResponse>> {
    Ok(Json(svc.approve(&acting, id).await?))
}

#[instrument(skip(svc))]
pub async fn reject(
    State(svc): State<Arc<LeaveService>>,
    AuthUser(acting): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DecisionResponse>> {
    Ok(Json(svc.reject(&acting, id).await?))
}

#[instrument(skip(svc))]
pub async fn my_leaves(
    State(svc): State<Arc<LeaveService>>,
    AuthUser(acting): AuthUser,
    AppQuery(page): AppQuery<Page>,
) -> AppResult<Json<Vec<Leave>>> {
    Ok(Json(svc.my_leaves(&acting, page).await?))
}

#[instrument(skip(svc, payload))]
pub async fn request_leave(
    State(svc): State<Arc<LeaveService>>,
    AuthUser(acting): AuthUser,
    AppJson(payload): AppJson<LeaveInput>,
) -> AppResult<(StatusCode, Json<Leave>)> {
    let leave = svc.request_leave(&acting, payload).await?;
    Ok((StatusCode::CREATED, Json(leave)))
}
