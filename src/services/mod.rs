// src/services/mod.rs

//! Domain operations. Each function takes the store explicitly and returns a
//! [`ServiceError`] from the five-way taxonomy the HTTP layer maps to status
//! codes.

use crate::store::StoreError;

pub mod actor;
pub mod lifecycle;
pub mod ratings;
pub mod stats;
pub mod status;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Internal(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
