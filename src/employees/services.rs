use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::repo::UserRepo;
use crate::auth::services::{is_valid_email, normalize_email, prepare_user};
use crate::auth::ActingIdentity;
use crate::clock::Clock;
use crate::crud::{CrudService, Page};
use crate::employees::dto::{
    CreateEmployee, CreateEmployeeWithUser, EmployeeFilter, EmployeeInput, EmployeeStatus, EmployeeWithUser,
};
use crate::employees::repo::EmployeeRepo;
use crate::employees::repo_types::{Employee, EmployeeFields};
use crate::error::{AppError, AppResult, Violations};
use crate::leaves::repo::LeaveRepo;
use crate::leaves::repo_types::{Leave, LeaveStatus};
use crate::shifts::repo::ShiftRepo;
use crate::shifts::repo_types::Shift;

/// NUMERIC(5,2) upper bound.
const MAX_WORKING_HOURS: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2);
const MAX_NAME_LEN: usize = 100;

/// Normalizes and checks profile input; `prefix` namespaces field names.
pub(crate) fn prepare_fields(input: EmployeeInput, prefix: &str) -> AppResult<EmployeeFields> {
    let fields = EmployeeFields {
        name: input.name.trim().to_string(),
        email: normalize_email(&input.email),
        working_hours: input.working_hours,
    };
    let mut v = Violations::new();
    let name = format!("{prefix}name");
    v.check(!fields.name.is_empty(), &name, "must not be empty");
    v.check(fields.name.chars().count() <= MAX_NAME_LEN, &name, "at most 100 characters");
    v.check(is_valid_email(&fields.email), &format!("{prefix}email"), "invalid email");
    let hours = format!("{prefix}working_hours");
    v.check(!fields.working_hours.is_sign_negative(), &hours, "must not be negative");
    v.check(fields.working_hours <= MAX_WORKING_HOURS, &hours, "must be at most 999.99");
    v.check(fields.working_hours.scale() <= 2, &hours, "at most two decimal places");
    v.into_result()?;
    Ok(fields)
}

pub struct EmployeeService {
    employees: Arc<dyn EmployeeRepo>,
    users: Arc<dyn UserRepo>,
    shifts: Arc<dyn ShiftRepo>,
    leaves: Arc<dyn LeaveRepo>,
    clock: Arc<dyn Clock>,
}

impl EmployeeService {
    pub fn new(
        employees: Arc<dyn EmployeeRepo>,
        users: Arc<dyn UserRepo>,
        shifts: Arc<dyn ShiftRepo>,
        leaves: Arc<dyn LeaveRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { employees, users, shifts, leaves, clock }
    }

    /// Creates a user account and its employee profile atomically.
    #[instrument(skip(self, input))]
    pub async fn create_with_user(
        &self,
        acting: &ActingIdentity,
        input: CreateEmployeeWithUser,
    ) -> AppResult<EmployeeWithUser> {
        acting.require_admin()?;

        // Report problems in both halves of the form together.
        let user = prepare_user(input.user, "user.", input.is_admin);
        let fields = prepare_fields(input.employee, "employee.");
        let (new_user, fields) = match (user, fields) {
            (Ok(u), Ok(f)) => (u, f),
            (Err(AppError::Validation(mut a)), Err(AppError::Validation(b))) => {
                a.extend(b);
                return Err(AppError::Validation(a));
            }
            (Err(e), _) | (_, Err(e)) => return Err(e),
        };

        let (user, employee) = self.employees.create_with_user(&new_user, &fields).await?;
        info!(user_id = %user.id, employee_id = %employee.id, "user and employee created");
        Ok(EmployeeWithUser {
            user: user.into(),
            employee,
        })
    }

    /// The caller's own profile.
    pub async fn profile(&self, acting: &ActingIdentity) -> AppResult<Employee> {
        self.employees
            .find_by_owner(acting.id)
            .await?
            .ok_or(AppError::MissingProfile)
    }

    #[instrument(skip(self, input))]
    pub async fn create_profile(&self, acting: &ActingIdentity, input: EmployeeInput) -> AppResult<Employee> {
        if self.employees.find_by_owner(acting.id).await?.is_some() {
            warn!(user_id = %acting.id, "profile already exists");
            return Err(AppError::StateConflict("employee profile already exists".into()));
        }
        let fields = prepare_fields(input, "")?;
        let employee = self.employees.create(acting.id, &fields).await?;
        info!(user_id = %acting.id, employee_id = %employee.id, "employee profile created");
        Ok(employee)
    }

    #[instrument(skip(self, input))]
    pub async fn update_profile(&self, acting: &ActingIdentity, input: EmployeeInput) -> AppResult<Employee> {
        let current = self.profile(acting).await?;
        let fields = prepare_fields(input, "")?;
        self.employees
            .update(current.id, &fields)
            .await?
            .ok_or(AppError::MissingProfile)
    }

    /// First of the employee's shifts whose window contains `now`.
    pub async fn current_shift(&self, employee: &Employee) -> AppResult<Option<Shift>> {
        self.shifts.find_active_at(employee.id, self.clock.now()).await
    }

    /// Earliest of the employee's shifts that has not started yet.
    pub async fn next_shift(&self, employee: &Employee) -> AppResult<Option<Shift>> {
        self.shifts.find_next_after(employee.id, self.clock.now()).await
    }

    /// Only approved leaves count.
    pub async fn today_leave(&self, employee: &Employee) -> AppResult<Option<Leave>> {
        self.leaves
            .find_on_date(employee.id, self.clock.today(), LeaveStatus::Approved)
            .await
    }

    pub async fn on_leave_today(&self, employee: &Employee) -> AppResult<bool> {
        Ok(self.today_leave(employee).await?.is_some())
    }

    pub async fn status(&self, employee: &Employee) -> AppResult<EmployeeStatus> {
        let today_leave = self.today_leave(employee).await?;
        Ok(EmployeeStatus {
            current_shift: self.current_shift(employee).await?,
            next_shift: self.next_shift(employee).await?,
            on_leave_today: today_leave.is_some(),
            today_leave,
            now: self.clock.now(),
        })
    }

    pub async fn count(&self) -> AppResult<i64> {
        self.employees.count().await
    }

    pub async fn recent(&self, limit: i64) -> AppResult<Vec<Employee>> {
        self.employees.recent(limit).await
    }
}

#[async_trait]
impl CrudService for EmployeeService {
    type Entity = Employee;
    type Filter = EmployeeFilter;
    type Create = CreateEmployee;
    type Update = EmployeeInput;

    const NAME: &'static str = "Employee";

    async fn list(&self, acting: &ActingIdentity, filter: &EmployeeFilter, page: Page) -> AppResult<Vec<Employee>> {
        acting.require_admin()?;
        let (limit, offset) = page.bounds();
        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        self.employees.list(search, limit, offset).await
    }

    async fn get(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<Employee> {
        acting.require_admin()?;
        self.employees
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(Self::NAME.into()))
    }

    #[instrument(skip(self, input))]
    async fn create(&self, acting: &ActingIdentity, input: CreateEmployee) -> AppResult<Employee> {
        acting.require_admin()?;
        let fields = prepare_fields(input.profile, "")?;
        if self.users.find_by_id(input.user_id).await?.is_none() {
            return Err(AppError::invalid("user_id", "user does not exist"));
        }
        let employee = self.employees.create(input.user_id, &fields).await?;
        info!(employee_id = %employee.id, "employee created");
        Ok(employee)
    }

    #[instrument(skip(self, input))]
    async fn update(&self, acting: &ActingIdentity, id: Uuid, input: EmployeeInput) -> AppResult<Employee> {
        acting.require_admin()?;
        let fields = prepare_fields(input, "")?;
        let employee = self
            .employees
            .update(id, &fields)
            .await?
            .ok_or_else(|| AppError::NotFound(Self::NAME.into()))?;
        info!(employee_id = %id, "employee updated");
        Ok(employee)
    }

    #[instrument(skip(self))]
    async fn delete(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<()> {
        acting.require_admin()?;
        if !self.employees.delete(id).await? {
            return Err(AppError::NotFound(Self::NAME.into()));
        }
        info!(employee_id = %id, "employee deleted");
        Ok(())
    }
}
