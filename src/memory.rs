//! In-memory repositories used by tests in place of Postgres.
//!
//! Mirrors the schema's unique, foreign-key and cascade rules so services
//! see the same errors they would get from the database.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::{macros::datetime, Date, OffsetDateTime};
use uuid::Uuid;

use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{NewUser, User};
use crate::clock::{Clock, FixedClock};
use crate::employees::repo::EmployeeRepo;
use crate::employees::repo_types::{Employee, EmployeeFields};
use crate::error::{AppError, AppResult};
use crate::leaves::repo::{LeaveFields, LeaveQuery, LeaveRepo};
use crate::leaves::repo_types::{Leave, LeaveStatus};
use crate::shifts::repo::{ShiftFields, ShiftRepo};
use crate::shifts::repo_types::{Shift, ShiftState};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    employees: Vec<Employee>,
    shifts: Vec<Shift>,
    members: Vec<(Uuid, Uuid)>,
    leaves: Vec<Leave>,
}

pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    tables: Mutex<Tables>,
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

impl Tables {
    fn insert_user(&mut self, new: &NewUser, now: OffsetDateTime) -> AppResult<User> {
        if self.users.iter().any(|u| u.username == new.username) {
            return Err(AppError::constraint("users_username_key"));
        }
        if self.users.iter().any(|u| u.email == new.email) {
            return Err(AppError::constraint("users_email_key"));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            is_admin: new.is_admin,
            created_at: now,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    fn check_employee(&self, id: Option<Uuid>, user_id: Uuid, fields: &EmployeeFields) -> AppResult<()> {
        let others = || self.employees.iter().filter(move |e| Some(e.id) != id);
        if others().any(|e| e.email == fields.email) {
            return Err(AppError::constraint("employees_email_key"));
        }
        if others().any(|e| e.name == fields.name) {
            return Err(AppError::constraint("employees_name_key"));
        }
        if id.is_none() {
            if !self.users.iter().any(|u| u.id == user_id) {
                return Err(AppError::constraint("employees_user_id_fkey"));
            }
            if self.employees.iter().any(|e| e.user_id == user_id) {
                return Err(AppError::constraint("employees_user_id_key"));
            }
        }
        Ok(())
    }

    fn insert_employee(&mut self, user_id: Uuid, fields: &EmployeeFields, now: OffsetDateTime) -> AppResult<Employee> {
        self.check_employee(None, user_id, fields)?;
        let employee = Employee {
            id: Uuid::new_v4(),
            user_id,
            name: fields.name.clone(),
            email: fields.email.clone(),
            working_hours: fields.working_hours.round_dp(2),
            created_at: now,
            updated_at: now,
        };
        self.employees.push(employee.clone());
        Ok(employee)
    }

    fn replace_members(&mut self, shift_id: Uuid, employee_ids: &[Uuid]) -> AppResult<()> {
        if employee_ids
            .iter()
            .any(|id| !self.employees.iter().any(|e| e.id == *id))
        {
            return Err(AppError::constraint("shift_employees_employee_id_fkey"));
        }
        self.members.retain(|(s, _)| *s != shift_id);
        for id in employee_ids {
            if !self.members.contains(&(shift_id, *id)) {
                self.members.push((shift_id, *id));
            }
        }
        Ok(())
    }

    fn member_shifts(&self, employee_id: Uuid) -> Vec<&Shift> {
        let mut shifts: Vec<&Shift> = self
            .shifts
            .iter()
            .filter(|s| self.members.contains(&(s.id, employee_id)))
            .collect();
        shifts.sort_by_key(|s| s.start_time);
        shifts
    }

    fn check_leave(&self, id: Option<Uuid>, employee_id: Uuid, date: Date) -> AppResult<()> {
        if !self.employees.iter().any(|e| e.id == employee_id) {
            return Err(AppError::constraint("leaves_employee_id_fkey"));
        }
        if self
            .leaves
            .iter()
            .any(|l| Some(l.id) != id && l.employee_id == employee_id && l.date == date)
        {
            return Err(AppError::constraint("leaves_employee_id_date_key"));
        }
        Ok(())
    }
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            tables: Mutex::new(Tables::default()),
        })
    }

    /// Store on a fixed clock at 2024-05-06 12:00 UTC.
    pub fn fake() -> Arc<Self> {
        Self::new(Arc::new(FixedClock::at(datetime!(2024-05-06 12:00 UTC))))
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock")
    }

    /// Adds a user directly, skipping password hashing.
    pub fn seed_user(&self, username: &str, is_admin: bool) -> User {
        let now = self.clock.now();
        self.tables()
            .insert_user(
                &NewUser {
                    username: username.into(),
                    email: format!("{username}@example.com"),
                    password_hash: "unused".into(),
                    is_admin,
                },
                now,
            )
            .expect("seed user")
    }

    pub fn seed_employee(&self, name: &str) -> Employee {
        let user = self.seed_user(&name.to_lowercase(), false);
        let now = self.clock.now();
        self.tables()
            .insert_employee(
                user.id,
                &EmployeeFields {
                    name: name.into(),
                    email: format!("{}@staff.example.com", name.to_lowercase()),
                    working_hours: Decimal::new(4000, 2),
                },
                now,
            )
            .expect("seed employee")
    }

    pub fn set_admin(&self, user_id: Uuid, is_admin: bool) {
        if let Some(user) = self.tables().users.iter_mut().find(|u| u.id == user_id) {
            user.is_admin = is_admin;
        }
    }

    pub fn user_count(&self) -> usize {
        self.tables().users.len()
    }

    pub fn leave_count(&self) -> usize {
        self.tables().leaves.len()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, new: &NewUser) -> AppResult<User> {
        let now = self.clock.now();
        self.tables().insert_user(new, now)
    }
}

#[async_trait]
impl EmployeeRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Employee>> {
        Ok(self.tables().employees.iter().find(|e| e.id == id).cloned())
    }

    async fn find_by_owner(&self, user_id: Uuid) -> AppResult<Option<Employee>> {
        Ok(self.tables().employees.iter().find(|e| e.user_id == user_id).cloned())
    }

    async fn list(&self, search: Option<&str>, limit: i64, offset: i64) -> AppResult<Vec<Employee>> {
        let needle = search.map(str::to_lowercase);
        let mut rows: Vec<Employee> = self
            .tables()
            .employees
            .iter()
            .filter(|e| match &needle {
                Some(n) => e.name.to_lowercase().contains(n) || e.email.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page(rows, limit, offset))
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Employee>> {
        let mut rows: Vec<Employee> = self.tables().employees.iter().rev().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, limit, 0))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.tables().employees.len() as i64)
    }

    async fn create(&self, user_id: Uuid, fields: &EmployeeFields) -> AppResult<Employee> {
        let now = self.clock.now();
        self.tables().insert_employee(user_id, fields, now)
    }

    async fn create_with_user(&self, user: &NewUser, fields: &EmployeeFields) -> AppResult<(User, Employee)> {
        let now = self.clock.now();
        let mut tables = self.tables();
        // Work on a copy and swap it in only when both inserts succeed.
        let mut tx = tables.clone();
        let user = tx.insert_user(user, now)?;
        let employee = tx.insert_employee(user.id, fields, now)?;
        *tables = tx;
        Ok((user, employee))
    }

    async fn update(&self, id: Uuid, fields: &EmployeeFields) -> AppResult<Option<Employee>> {
        let now = self.clock.now();
        let mut tables = self.tables();
        let Some(user_id) = tables.employees.iter().find(|e| e.id == id).map(|e| e.user_id) else {
            return Ok(None);
        };
        tables.check_employee(Some(id), user_id, fields)?;
        let employee = tables
            .employees
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| {
                e.name = fields.name.clone();
                e.email = fields.email.clone();
                e.working_hours = fields.working_hours.round_dp(2);
                e.updated_at = now;
                e.clone()
            });
        Ok(employee)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables();
        let before = tables.employees.len();
        tables.employees.retain(|e| e.id != id);
        let removed = tables.employees.len() < before;
        if removed {
            tables.members.retain(|(_, e)| *e != id);
            tables.leaves.retain(|l| l.employee_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ShiftRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Shift>> {
        Ok(self.tables().shifts.iter().find(|s| s.id == id).cloned())
    }

    async fn list(
        &self,
        state: Option<ShiftState>,
        now: OffsetDateTime,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Shift>> {
        let mut rows: Vec<Shift> = self
            .tables()
            .shifts
            .iter()
            .filter(|s| state.map_or(true, |st| s.state(now) == st))
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.start_time);
        Ok(page(rows, limit, offset))
    }

    async fn recent(&self, limit: i64) -> AppResult<Vec<Shift>> {
        let mut rows: Vec<Shift> = self.tables().shifts.iter().rev().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, limit, 0))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.tables().shifts.len() as i64)
    }

    async fn count_active_at(&self, now: OffsetDateTime) -> AppResult<i64> {
        Ok(self.tables().shifts.iter().filter(|s| s.is_active(now)).count() as i64)
    }

    async fn find_active_at(&self, employee_id: Uuid, now: OffsetDateTime) -> AppResult<Option<Shift>> {
        let tables = self.tables();
        let found = tables
            .member_shifts(employee_id)
            .into_iter()
            .find(|s| s.is_active(now))
            .cloned();
        Ok(found)
    }

    async fn find_next_after(&self, employee_id: Uuid, now: OffsetDateTime) -> AppResult<Option<Shift>> {
        let tables = self.tables();
        let found = tables
            .member_shifts(employee_id)
            .into_iter()
            .find(|s| s.start_time > now)
            .cloned();
        Ok(found)
    }

    async fn members(&self, shift_ids: &[Uuid]) -> AppResult<Vec<(Uuid, Uuid)>> {
        let tables = self.tables();
        let name_of = |id: Uuid| {
            tables
                .employees
                .iter()
                .find(|e| e.id == id)
                .map(|e| e.name.clone())
                .unwrap_or_default()
        };
        let mut pairs: Vec<(Uuid, Uuid)> = tables
            .members
            .iter()
            .filter(|(s, _)| shift_ids.contains(s))
            .copied()
            .collect();
        pairs.sort_by_key(|(_, e)| name_of(*e));
        Ok(pairs)
    }

    async fn create(&self, fields: &ShiftFields) -> AppResult<Shift> {
        let now = self.clock.now();
        let mut tables = self.tables();
        let mut tx = tables.clone();
        let shift = Shift {
            id: Uuid::new_v4(),
            name: fields.name.clone(),
            start_time: fields.start_time,
            end_time: fields.end_time,
            created_at: now,
            updated_at: now,
        };
        tx.shifts.push(shift.clone());
        tx.replace_members(shift.id, &fields.employee_ids)?;
        *tables = tx;
        Ok(shift)
    }

    async fn update(&self, id: Uuid, fields: &ShiftFields) -> AppResult<Option<Shift>> {
        let now = self.clock.now();
        let mut tables = self.tables();
        let mut tx = tables.clone();
        let Some(shift) = tx.shifts.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        shift.name = fields.name.clone();
        shift.start_time = fields.start_time;
        shift.end_time = fields.end_time;
        shift.updated_at = now;
        let shift = shift.clone();
        tx.replace_members(id, &fields.employee_ids)?;
        *tables = tx;
        Ok(Some(shift))
    }

    async fn set_members(&self, id: Uuid, employee_ids: &[Uuid]) -> AppResult<bool> {
        let mut tables = self.tables();
        if !tables.shifts.iter().any(|s| s.id == id) {
            return Ok(false);
        }
        tables.replace_members(id, employee_ids)?;
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables();
        let before = tables.shifts.len();
        tables.shifts.retain(|s| s.id != id);
        let removed = tables.shifts.len() < before;
        if removed {
            tables.members.retain(|(s, _)| *s != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl LeaveRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Leave>> {
        Ok(self.tables().leaves.iter().find(|l| l.id == id).cloned())
    }

    async fn find_by_owner(&self, employee_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Leave>> {
        LeaveRepo::list(
            self,
            LeaveQuery {
                employee_id: Some(employee_id),
                status: None,
            },
            limit,
            offset,
        )
        .await
    }

    async fn list(&self, query: LeaveQuery, limit: i64, offset: i64) -> AppResult<Vec<Leave>> {
        let mut rows: Vec<Leave> = self
            .tables()
            .leaves
            .iter()
            .filter(|l| query.employee_id.map_or(true, |id| l.employee_id == id))
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(page(rows, limit, offset))
    }

    async fn find_on_date(&self, employee_id: Uuid, date: Date, status: LeaveStatus) -> AppResult<Option<Leave>> {
        Ok(self
            .tables()
            .leaves
            .iter()
            .find(|l| l.employee_id == employee_id && l.date == date && l.status == status)
            .cloned())
    }

    async fn count_by_status(&self, status: LeaveStatus) -> AppResult<i64> {
        Ok(self.tables().leaves.iter().filter(|l| l.status == status).count() as i64)
    }

    async fn create(&self, employee_id: Uuid, fields: &LeaveFields) -> AppResult<Leave> {
        let now = self.clock.now();
        let mut tables = self.tables();
        tables.check_leave(None, employee_id, fields.date)?;
        let leave = Leave {
            id: Uuid::new_v4(),
            employee_id,
            date: fields.date,
            leave_type: fields.leave_type,
            reason: fields.reason.clone(),
            status: LeaveStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.leaves.push(leave.clone());
        Ok(leave)
    }

    async fn update(&self, id: Uuid, fields: &LeaveFields) -> AppResult<Option<Leave>> {
        let now = self.clock.now();
        let mut tables = self.tables();
        let Some(employee_id) = tables.leaves.iter().find(|l| l.id == id).map(|l| l.employee_id) else {
            return Ok(None);
        };
        tables.check_leave(Some(id), employee_id, fields.date)?;
        Ok(tables.leaves.iter_mut().find(|l| l.id == id).map(|l| {
            l.date = fields.date;
            l.leave_type = fields.leave_type;
            l.reason = fields.reason.clone();
            l.updated_at = now;
            l.clone()
        }))
    }

    async fn save_decision(&self, leave: &Leave) -> AppResult<bool> {
        let mut tables = self.tables();
        let Some(stored) = tables.leaves.iter_mut().find(|l| l.id == leave.id) else {
            return Ok(false);
        };
        stored.status = leave.status;
        stored.approved_by = leave.approved_by;
        stored.approved_at = leave.approved_at;
        stored.updated_at = leave.updated_at;
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables();
        let before = tables.leaves.len();
        tables.leaves.retain(|l| l.id != id);
        Ok(tables.leaves.len() < before)
    }
}
