//! Body and query extractors whose rejections use the `AppError` body.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AppError;

/// `Json<T>` whose malformed or incomplete bodies become `Validation` errors.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query<T>` whose unparsable query strings become `Validation` errors.
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Name inside serde's "missing field `x`" message, if any.
fn missing_field(text: &str) -> Option<&str> {
    let rest = &text[text.find("missing field `")? + "missing field `".len()..];
    rest.split('`').next().filter(|name| !name.is_empty())
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        warn!(error = %text, "rejected json body");
        match &rejection {
            JsonRejection::JsonDataError(_) => {
                let field = missing_field(&text).unwrap_or("body").to_string();
                AppError::invalid(field, text)
            }
            JsonRejection::MissingJsonContentType(_) => {
                AppError::invalid("body", "Content-Type must be application/json")
            }
            _ => AppError::invalid("body", text),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        let text = rejection.body_text();
        warn!(error = %text, "rejected query string");
        AppError::invalid("query", text)
    }
}
