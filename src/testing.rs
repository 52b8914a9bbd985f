//! In-process HTTP helpers for router tests.

use axum::{
    body::{to_bytes, Body},
    extract::FromRef,
    http::{header, Request, Response, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::app::build_app;
use crate::auth::repo_types::NewUser;
use crate::auth::services::JwtKeys;
use crate::auth::ActingIdentity;
use crate::state::AppState;

pub async fn raw_call(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    build_app(state.clone())
        .oneshot(req.body(body).unwrap())
        .await
        .unwrap()
}

/// Status and JSON body; non-JSON bodies come back as `Value::Null`.
pub async fn call_with(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let res = raw_call(state, method, uri, token, body).await;
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    call_with(state, method, uri, None, body).await
}

pub fn token_for(state: &AppState, id: Uuid, is_admin: bool) -> String {
    JwtKeys::from_ref(state)
        .sign_access(ActingIdentity { id, is_admin })
        .unwrap()
}

async fn seeded_token(state: &AppState, username: &str, is_admin: bool) -> String {
    let user = state
        .users
        .create(&NewUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            password_hash: "unused".into(),
            is_admin,
        })
        .await
        .unwrap();
    token_for(state, user.id, is_admin)
}

/// Token for a fresh administrator account.
pub async fn admin_token(state: &AppState) -> String {
    seeded_token(state, &format!("admin-{}", Uuid::new_v4().simple()), true).await
}

/// Token for a fresh non-admin account without an employee profile.
pub async fn user_token(state: &AppState, username: &str) -> String {
    seeded_token(state, username, false).await
}
