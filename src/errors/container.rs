//! Errors raised by the ordered-container operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    /// Container or child row does not exist (or is outside the caller's team)
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i32 },

    /// The child exists but its id is not in the container's order list
    #[error("{kind} {id} is not in the order list")]
    NotListed { kind: &'static str, id: i32 },

    #[error("Invalid value: {0}")]
    Invalid(String),

    /// The order list kept changing underneath us
    #[error("Gave up updating order of {kind} {id} after {attempts} attempts")]
    Contention {
        kind: &'static str,
        id: i32,
        attempts: usize,
    },

    #[error("Stored order list is not valid JSON: {0}")]
    CorruptOrder(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl ContainerError {
    pub fn not_found(kind: &'static str, id: i32) -> Self {
        ContainerError::NotFound { kind, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound { .. })
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ContainerError::NotFound { .. }
                | ContainerError::NotListed { .. }
                | ContainerError::Invalid(_)
        )
    }
}
