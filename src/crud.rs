//! Generic list/create/update/delete surface shared by the admin resources.
//!
//! Each resource implements [`CrudService`] once; [`crud_routes`] turns any
//! implementation into the standard collection and item routes.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{ActingIdentity, AuthUser};
use crate::error::AppResult;
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { DEFAULT_PAGE_SIZE }

impl Default for Page {
    fn default() -> Self {
        Self { limit: DEFAULT_PAGE_SIZE, offset: 0 }
    }
}

impl Page {
    /// `(limit, offset)` with limit in `1..=MAX_PAGE_SIZE` and offset >= 0.
    pub fn bounds(self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_PAGE_SIZE), self.offset.max(0))
    }
}

#[async_trait]
pub trait CrudService: Send + Sync + 'static {
    type Entity: Serialize + Send + 'static;
    type Filter: DeserializeOwned + Send + Sync + 'static;
    type Create: DeserializeOwned + Send + 'static;
    type Update: DeserializeOwned + Send + 'static;

    /// Name used in "not found" messages.
    const NAME: &'static str;

    async fn list(&self, acting: &ActingIdentity, filter: &Self::Filter, page: Page) -> AppResult<Vec<Self::Entity>>;
    async fn get(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<Self::Entity>;
    async fn create(&self, acting: &ActingIdentity, input: Self::Create) -> AppResult<Self::Entity>;
    async fn update(&self, acting: &ActingIdentity, id: Uuid, input: Self::Update) -> AppResult<Self::Entity>;
    async fn delete(&self, acting: &ActingIdentity, id: Uuid) -> AppResult<()>;
}

/// `GET|POST {base}` and `GET|PUT|DELETE {base}/:id` for one service.
pub fn crud_routes<S>(base: &str) -> Router<AppState>
where
    S: CrudService,
    Arc<S>: FromRef<AppState>,
{
    Router::new()
        .route(base, get(list::<S>).post(create::<S>))
        .route(
            &format!("{base}/:id"),
            get(fetch::<S>).put(update::<S>).delete(remove::<S>),
        )
}

async fn list<S: CrudService>(
    State(svc): State<Arc<S>>,
    AuthUser(acting): AuthUser,
    AppQuery(filter): AppQuery<S::Filter>,
    AppQuery(page): AppQuery<Page>,
) -> AppResult<Json<Vec<S::Entity>>> {
    Ok(Json(svc.list(&acting, &filter, page).await?))
}

async fn fetch<S: CrudService>(
    State(svc): State<Arc<S>>,
    AuthUser(acting): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<S::Entity>> {
    Ok(Json(svc.get(&acting, id).await?))
}

async fn create<S: CrudService>(
    State(svc): State<Arc<S>>,
    AuthUser(acting): AuthUser,
    AppJson(input): AppJson<S::Create>,
) -> AppResult<(StatusCode, Json<S::Entity>)> {
    Ok((StatusCode::CREATED, Json(svc.create(&acting, input).await?)))
}

async fn update<S: CrudService>(
    State(svc): State<Arc<S>>,
    AuthUser(acting): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<S::Update>,
) -> AppResult<Json<S::Entity>> {
    Ok(Json(svc.update(&acting, id, input).await?))
}

async fn remove<S: CrudService>(
    State(svc): State<Arc<S>>,
    AuthUser(acting): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    svc.delete(&acting, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
