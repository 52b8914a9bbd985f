use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::ActingIdentity;
use crate::clock::Clock;
use crate::crud::{CrudService, Page};
use crate::error::{AppError, AppResult, Violations};
use crate::shifts::dto::{ShiftFilter, ShiftInput, ShiftView};
use crate::shifts::repo::{ShiftFields, ShiftRepo};
use crate::shifts::repo_types::Shift;

const MAX_NAME_LEN: usize = 100;

fn prepare_fields(input: ShiftInput) -> AppResult<ShiftFields> {
    let name = input.name.trim().to_string();
    let mut v = Violations::new();
    v.check(!name.is_empty(), "name", "must not be empty");
    v.check(name.chars().count() <= MAX_NAME_LEN, "name", "at most 100 characters");
    v.check(input.start_time <= input.end_time, "end_time", "must not be before start_time");
    v.into_result()?;

    let mut employee_ids = input.employee_ids;
    employee_ids.sort_unstable();
    employee_ids.dedup();
    Ok(ShiftFields {
        name,
        start_time: input.start_time,
        end_time: input.end_time,
        employee_ids,
    })
}

pub struct ShiftService {
    shifts: Arc<dyn ShiftRepo>,
    clock: Arc<dyn Clock>,
}

impl ShiftService {
    pub fn new(shifts: Arc<dyn ShiftRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { shifts, clock }
    }

    /// Attaches state, duration and member ids, evaluated at one instant.
    async fn views(&self, shifts: Vec<Shift>, now: OffsetDateTime) -> AppResult<Vec<ShiftView>> {
        let ids: Vec<Uuid> = shifts.iter().map(|s| s.id).collect();
        let members = self.shifts.members(&ids).await?;
        Ok(shifts
            .into_iter()
            .map(|shift| ShiftView {
                state: shift.state(now),
                duration_hours: shift.duration_hours(),
                employee_ids: members
                    .iter()
                    .filter(|(s, _)| *s == shift.id)
                    .map(|(_, e)| *e)
                    .collect(),
                shift,
            })
            .collect())
    }

    async fn view(&self, shift: Shift) -> AppResult<ShiftView> {
        let now = self.clock.now();
        let mut views = self.views(vec![shift], now).await?;
        views.pop().ok_or_else(|| AppError::NotFound(Self::NAME.into()))
    }

    /// Replaces the shift's membership and nothing else.
    #[instrument(skip(self, employee_ids))]
    pub async fn set_members(&self, acting: &ActingIdentity, id: Uuid, employee_ids: Vec<Uuid>) -> AppResult<ShiftView> {
        acting.require_admin()?;
        let mut employee_ids = employee_ids;
        employee_ids.sort_unstable();
        employee_ids.dedup();
        if !self.shifts.set_members(id, &employee_ids).await? {
            return Err(AppError::NotFound(Self::NAME.into()));
        }
        info!(shift_id = %id, members = employee_ids.len(), "shift membership replaced");
        self.get(acting, id).await
    }

    pub async fn count(&self) -> AppResult<i64> {
        self.shifts.count().await
    }

    pub async fn count_active(&self) -> AppResult<i64> {
        self.shifts.count_active_at(self.clock.now()).await
    }

    pub async fn recent(&self, limit: i64) -> AppResult<Vec<ShiftView>> {
        let shifts = self.shifts.recent(limit).await?;
        self.views(shifts, self.clock.now()).await
    }
}

#[async_trait]
impl CrudService for ShiftService {
    type Entity = ShiftView;
    type Filter = ShiftFilter;
    type Create = ShiftInput;
    type Update = ShiftInput;

    const NAME: &'static str = "Shift";

    async fn list(&self, acting: &ActingIdentity, filter: &ShiftFilter, page: Page) -> AppResult<Vec<ShiftView>> {
        acting.require_admin()?;
        let (limit, offset) = page.bounds();
        let now = self.clock.now();
        let shifts = self.shifts.list(filter.state, now, limit, offset).await?;
        self.views(shifts, now).await
    }

    async fn get(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<ShiftView> {
        acting.require_admin()?;
        let shift = self
            .shifts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(Self::NAME.into()))?;
        self.view(shift).await
    }

    #[instrument(skip(self, input))]
    async fn create(&self, acting: &ActingIdentity, input: ShiftInput) -> AppResult<ShiftView> {
        acting.require_admin()?;
        let fields = prepare_fields(input)?;
        let shift = self.shifts.create(&fields).await?;
        info!(shift_id = %shift.id, "shift created");
        self.view(shift).await
    }

    #[instrument(skip(self, input))]
    async fn update(&self, acting: &ActingIdentity, id: Uuid, input: ShiftInput) -> AppResult<ShiftView> {
        acting.require_admin()?;
        let fields = prepare_fields(input)?;
        let shift = self
            .shifts
            .update(id, &fields)
            .await?
            .ok_or_else(|| AppError::NotFound(Self::NAME.into()))?;
        info!(shift_id = %id, "shift updated");
        self.view(shift).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<()> {
        acting.require_admin()?;
        if !self.shifts.delete(id).await? {
            return Err(AppError::NotFound(Self::NAME.into()));
        }
        info!(shift_id = %id, "shift deleted");
        Ok(())
    }
}
