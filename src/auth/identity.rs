use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// The authenticated principal performing an operation.
///
/// Handed explicitly to every service call; services decide what it may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingIdentity {
    pub id: Uuid,
    pub is_admin: bool,
}

impl ActingIdentity {
    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("administrator access required".into()))
        }
    }
}
