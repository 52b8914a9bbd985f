use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    crud::crud_routes,
    employees::{
        dto::{CreateEmployeeWithUser, EmployeeInput, EmployeeWithUser},
        repo_types::Employee,
        services::EmployeeService,
    },
    error::AppResult,
    extract::AppJson,
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/employees/with-user", post(create_with_user))
        .merge(crud_routes::<EmployeeService>("/admin/employees"))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route(
        "/me/profile",
        get(get_profile).post(create_profile).put(update_profile),
    )
}

#[instrument(skip(svc, payload))]
pub async fn create_with_user(
    State(svc): State<Arc<EmployeeService>>,
    AuthUser(acting): AuthUser,
    AppJson(payload): AppJson<CreateEmployeeWithUser>,
) -> AppResult<(StatusCode, Json<EmployeeWithUser>)> {
    let created = svc.create_with_user(&acting, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(svc))]
pub async fn get_profile(
    State(svc): State<Arc<EmployeeService>>,
    AuthUser(acting): AuthUser,
) -> AppResult<Json<Employee>> {
    Ok(Json(svc.profile(&acting).await?))
}

#[instrument(skip(svc, payload))]
pub async fn create_profile(
    State(svc): State<Arc<EmployeeService>>,
    AuthUser(acting): AuthUser,
    AppJson(payload): AppJson<EmployeeInput>,
) -> AppResult<(StatusCode, Json<Employee>)> {
    let employee = svc.create_profile(&acting, payload).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

#[instrument(skip(svc, payload))]
pub async fn update_profile(
    State(svc): State<Arc<EmployeeService>>,
    AuthUser(acting): AuthUser,
    AppJson(payload): AppJson<EmployeeInput>,
) -> AppResult<Json<Employee>> {
    Ok(Json(svc.update_profile(&acting, payload).await?))
}
