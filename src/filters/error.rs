use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterErrorKind {
    UnsupportedType,
    ServicesMissing,
    NotFound,
    UnsupportedOperation,
    CallFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct FilterError {
    pub kind: FilterErrorKind,
    pub message: String,
}

impl FilterError {
    pub fn new(kind: FilterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub fn unsupported_type(message: impl Into<String>) -> FilterError {
    FilterError::new(FilterErrorKind::UnsupportedType, message)
}

pub fn services_missing(message: impl Into<String>) -> FilterError {
    FilterError::new(FilterErrorKind::ServicesMissing, message)
}

pub fn not_found(message: impl Into<String>) -> FilterError {
    FilterError::new(FilterErrorKind::NotFound, message)
}

pub fn unsupported_operation(message: impl Into<String>) -> FilterError {
    FilterError::new(FilterErrorKind::UnsupportedOperation, message)
}

pub fn call_failed(message: impl Into<String>) -> FilterError {
    FilterError::new(FilterErrorKind::CallFailed, message)
}
