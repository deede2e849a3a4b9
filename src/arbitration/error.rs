use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationErrorKind {
    InvalidRequest,
    EffectorRejected,
    SolverFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ArbitrationError {
    pub kind: ArbitrationErrorKind,
    pub message: String,
}

impl ArbitrationError {
    pub fn new(kind: ArbitrationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub fn invalid_request(message: impl Into<String>) -> ArbitrationError {
    ArbitrationError::new(ArbitrationErrorKind::InvalidRequest, message)
}

pub fn effector_rejected(message: impl Into<String>) -> ArbitrationError {
    ArbitrationError::new(ArbitrationErrorKind::EffectorRejected, message)
}

pub fn solver_failure(message: impl Into<String>) -> ArbitrationError {
    ArbitrationError::new(ArbitrationErrorKind::SolverFailure, message)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("solver: {message}")]
pub struct SolverError {
    pub message: String,
}

impl SolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorErrorKind {
    Rejected,
    Unavailable,
    Timeout,
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("evaluator: {message}")]
pub struct EvaluatorError {
    pub kind: EvaluatorErrorKind,
    pub message: String,
}

impl EvaluatorError {
    pub fn new(kind: EvaluatorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(EvaluatorErrorKind::Rejected, message)
    }
}
