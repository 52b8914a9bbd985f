//! Leave requests and their approval workflow.
//!
//! A leave is created `pending` and moves exactly once to `approved` or
//! `rejected`. Both decisions go through [`LeaveService::decide`], so they
//! share preconditions, logging and response shape.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::ActingIdentity;
use crate::clock::Clock;
use crate::crud::{CrudService, Page};
use crate::employees::repo::EmployeeRepo;
use crate::employees::repo_types::Employee;
use crate::error::{AppError, AppResult};
use crate::leaves::dto::{CreateLeave, DecisionResponse, LeaveFilter, LeaveInput};
use crate::leaves::repo::{LeaveFields, LeaveQuery, LeaveRepo};
use crate::leaves::repo_types::{Decision, Leave, LeaveStatus};

pub struct LeaveService {
    leaves: Arc<dyn LeaveRepo>,
    employees: Arc<dyn EmployeeRepo>,
    clock: Arc<dyn Clock>,
}

impl LeaveService {
    pub fn new(leaves: Arc<dyn LeaveRepo>, employees: Arc<dyn EmployeeRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { leaves, employees, clock }
    }

    async fn find(&self, id: Uuid) -> AppResult<Leave> {
        self.leaves
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(Self::NAME.into()))
    }

    async fn own_profile(&self, acting: &ActingIdentity) -> AppResult<Employee> {
        self.employees
            .find_by_owner(acting.id)
            .await?
            .ok_or(AppError::MissingProfile)
    }

    pub async fn approve(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<DecisionResponse> {
        self.decide(acting, id, Decision::Approve).await
    }

    pub async fn reject(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<DecisionResponse> {
        self.decide(acting, id, Decision::Reject).await
    }

    #[instrument(skip(self))]
    async fn decide(&self, acting: &ActingIdentity, id: Uuid, decision: Decision) -> AppResult<DecisionResponse> {
        acting.require_admin()?;
        let mut leave = self.find(id).await?;
        if let Err(e) = leave.decide(decision, acting.id, self.clock.now()) {
            warn!(leave_id = %id, status = %leave.status, action = decision.verb(), "leave transition refused");
            return Err(e);
        }
        if !self.leaves.save_decision(&leave).await? {
            return Err(AppError::NotFound(Self::NAME.into()));
        }
        info!(leave_id = %id, status = %leave.status, by = %acting.id, "leave decided");
        let message = format!("Leave {}", leave.status);
        Ok(DecisionResponse { leave, message })
    }

    /// The caller's own leaves, newest date first.
    pub async fn my_leaves(&self, acting: &ActingIdentity, page: Page) -> AppResult<Vec<Leave>> {
        let employee = self.own_profile(acting).await?;
        let (limit, offset) = page.bounds();
        self.leaves.find_by_owner(employee.id, limit, offset).await
    }

    /// Files a pending leave for the caller.
    #[instrument(skip(self, input))]
    pub async fn request_leave(&self, acting: &ActingIdentity, input: LeaveInput) -> AppResult<Leave> {
        let employee = self.own_profile(acting).await?;
        let leave = self.leaves.create(employee.id, &input.into()).await?;
        info!(leave_id = %leave.id, employee_id = %employee.id, "leave requested");
        Ok(leave)
    }

    pub async fn count_pending(&self) -> AppResult<i64> {
        self.leaves.count_by_status(LeaveStatus::Pending).await
    }
}

#[async_trait]
impl CrudService for LeaveService {
    type Entity = Leave;
    type Filter = LeaveFilter;
    type Create = CreateLeave;
    type Update = LeaveInput;

    const NAME: &'static str = "Leave";

    async fn list(&self, acting: &ActingIdentity, filter: &LeaveFilter, page: Page) -> AppResult<Vec<Leave>> {
        acting.require_admin()?;
        let (limit, offset) = page.bounds();
        let query = LeaveQuery {
            employee_id: filter.employee_id,
            status: filter.status,
        };
        self.leaves.list(query, limit, offset).await
    }

    async fn get(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<Leave> {
        acting.require_admin()?;
        self.find(id).await
    }

    #[instrument(skip(self, input))]
    async fn create(&self, acting: &ActingIdentity, input: CreateLeave) -> AppResult<Leave> {
        acting.require_admin()?;
        let fields: LeaveFields = input.leave.into();
        let leave = self.leaves.create(input.employee_id, &fields).await?;
        info!(leave_id = %leave.id, employee_id = %input.employee_id, "leave created");
        Ok(leave)
    }

    #[instrument(skip(self, input))]
    async fn update(&self, acting: &ActingIdentity, id: Uuid, input: LeaveInput) -> AppResult<Leave> {
        acting.require_admin()?;
        self.leaves
            .update(id, &input.into())
            .await?
            .ok_or_else(|| AppError::NotFound(Self::NAME.into()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<()> {
        acting.require_admin()?;
        if !self.leaves.delete(id).await? {
            return Err(AppError::NotFound(Self::NAME.into()));
        }
        info!(leave_id = %id, "leave deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::leaves::repo_types::LeaveType;
    use crate::memory::MemoryStore;
    use time::macros::{date, datetime};

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        svc: LeaveService,
        admin: ActingIdentity,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::at(datetime!(2024-05-06 09:00 UTC)));
        let store = MemoryStore::new(clock.clone());
        let svc = LeaveService::new(store.clone(), store.clone(), clock.clone());
        let admin = store.seed_user("root", true).identity();
        Fixture { store, clock, svc, admin }
    }

    fn on(date: time::Date) -> LeaveInput {
        LeaveInput {
            date,
            leave_type: LeaveType::Annual,
            reason: "family".into(),
        }
    }

    async fn pending(f: &Fixture) -> Leave {
        let emp = f.store.seed_employee("Alice");
        f.svc
            .create(&f.admin, CreateLeave { employee_id: emp.id, leave: on(date!(2024 - 05 - 10)) })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn approve_sets_approver_and_time() {
        let f = fixture();
        let leave = pending(&f).await;
        assert_eq!(leave.status, LeaveStatus::Pending);

        f.clock.set(datetime!(2024-05-06 11:30 UTC));
        let out = f.svc.approve(&f.admin, leave.id).await.unwrap();
        assert_eq!(out.message, "Leave approved");
        assert_eq!(out.leave.status, LeaveStatus::Approved);
        assert_eq!(out.leave.approved_by, Some(f.admin.id));
        assert_eq!(out.leave.approved_at, Some(datetime!(2024-05-06 11:30 UTC)));

        let stored = f.svc.get(&f.admin, leave.id).await.unwrap();
        assert_eq!(stored, out.leave);
    }

    #[tokio::test]
    async fn second_decision_is_a_conflict_and_changes_nothing() {
        let f = fixture();
        let leave = pending(&f).await;
        let approved = f.svc.approve(&f.admin, leave.id).await.unwrap().leave;

        f.clock.set(datetime!(2024-05-07 09:00 UTC));
        let err = f.svc.approve(&f.admin, leave.id).await.unwrap_err();
        assert!(matches!(err, AppError::StateConflict(ref m) if m.contains("approve") && m.contains("approved")));
        let err = f.svc.reject(&f.admin, leave.id).await.unwrap_err();
        assert!(matches!(err, AppError::StateConflict(ref m) if m.contains("reject")));

        assert_eq!(f.svc.get(&f.admin, leave.id).await.unwrap(), approved);
    }

    #[tokio::test]
    async fn reject_is_symmetric() {
        let f = fixture();
        let leave = pending(&f).await;
        let out = f.svc.reject(&f.admin, leave.id).await.unwrap();
        assert_eq!(out.message, "Leave rejected");
        assert_eq!(out.leave.status, LeaveStatus::Rejected);
        assert_eq!(out.leave.approved_by, Some(f.admin.id));

        let err = f.svc.reject(&f.admin, leave.id).await.unwrap_err();
        assert!(matches!(err, AppError::StateConflict(_)));
        let err = f.svc.approve(&f.admin, leave.id).await.unwrap_err();
        assert!(matches!(err, AppError::StateConflict(_)));
    }

    #[tokio::test]
    async fn decisions_need_admin_and_existing_leave() {
        let f = fixture();
        let leave = pending(&f).await;
        let staff = f.store.seed_user("staff", false).identity();
        assert!(matches!(f.svc.approve(&staff, leave.id).await, Err(AppError::Forbidden(_))));
        assert!(matches!(f.svc.reject(&f.admin, Uuid::new_v4()).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_date_is_a_validation_error() {
        let f = fixture();
        let leave = pending(&f).await;
        let err = f
            .svc
            .create(&f.admin, CreateLeave { employee_id: leave.employee_id, leave: on(leave.date) })
            .await
            .unwrap_err();
        let AppError::Validation(fields) = err else { panic!("expected validation") };
        assert_eq!(fields[0].field, "date");
        assert_eq!(f.store.leave_count(), 1);
    }

    #[tokio::test]
    async fn moving_onto_a_taken_date_is_a_validation_error() {
        let f = fixture();
        let first = pending(&f).await;
        let second = f
            .svc
            .create(&f.admin, CreateLeave { employee_id: first.employee_id, leave: on(date!(2024 - 05 - 12)) })
            .await
            .unwrap();

        let err = f.svc.update(&f.admin, second.id, on(first.date)).await.unwrap_err();
        let AppError::Validation(fields) = err else { panic!("expected validation") };
        assert_eq!(fields[0].field, "date");
        assert_eq!(f.svc.get(&f.admin, second.id).await.unwrap().date, date!(2024 - 05 - 12));

        // Same date on its own row is not a clash.
        let kept = f.svc.update(&f.admin, second.id, on(date!(2024 - 05 - 12))).await.unwrap();
        assert_eq!(kept.id, second.id);
    }

    #[tokio::test]
    async fn update_keeps_status() {
        let f = fixture();
        let leave = pending(&f).await;
        f.svc.approve(&f.admin, leave.id).await.unwrap();
        let mut input = on(date!(2024 - 05 - 11));
        input.leave_type = LeaveType::Personal;
        let updated = f.svc.update(&f.admin, leave.id, input).await.unwrap();
        assert_eq!(updated.date, date!(2024 - 05 - 11));
        assert_eq!(updated.leave_type, LeaveType::Personal);
        assert_eq!(updated.status, LeaveStatus::Approved);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_employee() {
        let f = fixture();
        let first = pending(&f).await;
        let bob = f.store.seed_employee("Bob");
        f.svc
            .create(&f.admin, CreateLeave { employee_id: bob.id, leave: on(date!(2024 - 05 - 12)) })
            .await
            .unwrap();
        f.svc.approve(&f.admin, first.id).await.unwrap();

        let filter = LeaveFilter { employee_id: None, status: Some(LeaveStatus::Pending) };
        let found = f.svc.list(&f.admin, &filter, Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].employee_id, bob.id);

        let filter = LeaveFilter { employee_id: Some(first.employee_id), status: None };
        let found = f.svc.list(&f.admin, &filter, Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(f.svc.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn self_service_requests_are_pending_and_scoped() {
        let f = fixture();
        let me = f.store.seed_user("nobody", false).identity();
        assert!(matches!(f.svc.my_leaves(&me, Page::default()).await, Err(AppError::MissingProfile)));

        let alice = f.store.seed_employee("Alice");
        let bob = f.store.seed_employee("Bob");
        let me = ActingIdentity { id: alice.user_id, is_admin: false };
        f.svc
            .create(&f.admin, CreateLeave { employee_id: bob.id, leave: on(date!(2024 - 05 - 20)) })
            .await
            .unwrap();

        let first = f.svc.request_leave(&me, on(date!(2024 - 05 - 08))).await.unwrap();
        let second = f.svc.request_leave(&me, on(date!(2024 - 05 - 09))).await.unwrap();
        assert_eq!(first.status, LeaveStatus::Pending);
        assert_eq!(first.employee_id, alice.id);

        let mine = f.svc.my_leaves(&me, Page::default()).await.unwrap();
        let ids: Vec<_> = mine.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn deleting_an_employee_removes_their_leaves() {
        let f = fixture();
        let leave = pending(&f).await;
        let employees: &dyn EmployeeRepo = &*f.store;
        assert!(employees.delete(leave.employee_id).await.unwrap());
        assert!(matches!(f.svc.get(&f.admin, leave.id).await, Err(AppError::NotFound(_))));
    }
}
