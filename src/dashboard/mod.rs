//! Aggregate views for the admin console and the employee self-service page.

use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use crate::auth::{ActingIdentity, AuthUser};
use crate::employees::dto::EmployeeStatus;
use crate::employees::repo_types::Employee;
use crate::employees::EmployeeService;
use crate::error::AppResult;
use crate::leaves::LeaveService;
use crate::shifts::dto::ShiftView;
use crate::shifts::ShiftService;
use crate::state::AppState;

const RECENT_LIMIT: i64 = 5;

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub total_employees: i64,
    pub total_shifts: i64,
    pub active_shifts: i64,
    pub pending_leaves: i64,
    pub recent_employees: Vec<Employee>,
    pub recent_shifts: Vec<ShiftView>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeDashboard {
    pub employee: Employee,
    #[serde(flatten)]
    pub status: EmployeeStatus,
}

#[derive(Clone)]
pub struct Dashboards {
    employees: Arc<EmployeeService>,
    shifts: Arc<ShiftService>,
    leaves: Arc<LeaveService>,
}

impl FromRef<AppState> for Dashboards {
    fn from_ref(state: &AppState) -> Self {
        Self {
            employees: state.employees.clone(),
            shifts: state.shifts.clone(),
            leaves: state.leaves.clone(),
        }
    }
}

impl Dashboards {
    pub async fn admin(&self, acting: &ActingIdentity) -> AppResult<AdminDashboard> {
        acting.require_admin()?;
        Ok(AdminDashboard {
            total_employees: self.employees.count().await?,
            total_shifts: self.shifts.count().await?,
            active_shifts: self.shifts.count_active().await?,
            pending_leaves: self.leaves.count_pending().await?,
            recent_employees: self.employees.recent(RECENT_LIMIT).await?,
            recent_shifts: self.shifts.recent(RECENT_LIMIT).await?,
        })
    }

    pub async fn employee(&self, acting: &ActingIdentity) -> AppResult<EmployeeDashboard> {
        let employee = self.employees.profile(acting).await?;
        let status = self.employees.status(&employee).await?;
        Ok(EmployeeDashboard { employee, status })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard", get(admin_dashboard))
        .route("/me/dashboard", get(employee_dashboard))
}

#[instrument(skip(dash))]
async fn admin_dashboard(
    State(dash): State<Dashboards>,
    AuthUser(acting): AuthUser,
) -> AppResult<Json<AdminDashboard>> {
    Ok(Json(dash.admin(&acting).await?))
}

#[instrument(skip(dash))]
async fn employee_dashboard(
    State(dash): State<Dashboards>,
    AuthUser(acting): AuthUser,
) -> AppResult<Json<EmployeeDashboard>> {
    Ok(Json(dash.employee(&acting).await?))
}
