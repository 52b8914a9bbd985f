use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Where a caller without an employee profile is sent.
pub const PROFILE_PATH: &str = "/api/v1/me/profile";

/// One field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {}", summary(.0))]
    Validation(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    StateConflict(String),

    #[error("employee profile required")]
    MissingProfile,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

fn summary(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }

    /// Error for a violated unique or foreign-key constraint, by constraint name.
    pub fn constraint(name: &str) -> Self {
        match constraint_field(name) {
            Some((field, message)) => AppError::invalid(field, message),
            None => AppError::Internal(anyhow::anyhow!("constraint {name} violated")),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StateConflict(_) => StatusCode::CONFLICT,
            AppError::MissingProfile => StatusCode::SEE_OTHER,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Collects field errors before deciding whether input is acceptable.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

// Postgres constraint names from migrations/0001_init.sql.
fn constraint_field(constraint: &str) -> Option<(&'static str, &'static str)> {
    Some(match constraint {
        "users_username_key" => ("username", "username already taken"),
        "users_email_key" => ("email", "email already registered"),
        "employees_email_key" => ("email", "an employee with this email already exists"),
        "employees_name_key" => ("name", "an employee with this name already exists"),
        "employees_user_id_key" => ("user_id", "user already has an employee profile"),
        "employees_user_id_fkey" => ("user_id", "user does not exist"),
        "leaves_employee_id_date_key" => ("date", "employee already has a leave on this date"),
        "leaves_employee_id_fkey" => ("employee_id", "employee does not exist"),
        "shift_employees_employee_id_fkey" => ("employee_ids", "unknown employee"),
        _ => return None,
    })
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code();
            let is_constraint = matches!(code.as_deref(), Some("23505") | Some("23503"));
            if is_constraint {
                if let Some(name) = db_err.constraint() {
                    if constraint_field(name).is_some() {
                        return AppError::constraint(name);
                    }
                }
            }
        }
        AppError::Internal(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldError]>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Validation(fields) => (
                status,
                Json(ErrorBody {
                    error: "validation failed".into(),
                    fields: Some(fields.as_slice()),
                }),
            )
                .into_response(),
            AppError::MissingProfile => (
                status,
                [(header::LOCATION, PROFILE_PATH)],
                Json(ErrorBody {
                    error: self.to_string(),
                    fields: None,
                }),
            )
                .into_response(),
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    status,
                    Json(ErrorBody {
                        error: "internal error".into(),
                        fields: None,
                    }),
                )
                    .into_response()
            }
            _ => (
                status,
                Json(ErrorBody {
                    error: self.to_string(),
                    fields: None,
                }),
            )
                .into_response(),
        }
    }
}
