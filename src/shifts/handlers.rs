use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    crud::crud_routes,
    error::AppResult,
    extract::AppJson,
    shifts::{
        dto::{MembersInput, ShiftView},
        services::ShiftService,
    },
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .merge(crud_routes::<ShiftService>("/admin/shifts"))
        .route("/admin/shifts/:id/members", put(set_members))
}

#[instrument(skip(svc, payload))]
pub async fn set_members(
    State(svc): State<Arc<ShiftService>>,
    AuthUser(acting): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<MembersInput>,
) -> AppResult<Json<ShiftView>> {
    Ok(Json(svc.set_members(&acting, id, payload.employee_ids).await?))
}
