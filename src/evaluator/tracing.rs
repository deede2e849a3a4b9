use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;

use crate::arbitration::{error::EvaluatorError, ports::EvaluatorPort};

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$";

/// Evaluator that only records what would have been executed. Used when no
/// remote script engine is attached.
pub struct TracingEvaluator {
    identifier: Option<Regex>,
}

impl TracingEvaluator {
    pub fn new(strict_identifiers: bool) -> Result<Self> {
        let identifier = if strict_identifiers {
            Some(Regex::new(IDENTIFIER_PATTERN).context("failed to compile identifier pattern")?)
        } else {
            None
        };
        Ok(Self { identifier })
    }

    pub fn permissive() -> Self {
        Self { identifier: None }
    }
}

#[async_trait]
impl EvaluatorPort for TracingEvaluator {
    async fn evaluate(&self, expression: &str) -> Result<String, EvaluatorError> {
        tracing::info!(
            target: "evaluator",
            expression = %expression,
            "expression_evaluated"
        );
        Ok(String::new())
    }

    async fn validate_entry_point(&self, name: &str) -> Result<(), EvaluatorError> {
        if name.trim().is_empty() {
            return Err(EvaluatorError::rejected("entry point name cannot be empty"));
        }
        if let Some(identifier) = &self.identifier {
            if !identifier.is_match(name) {
                tracing::warn!(
                    target: "evaluator",
                    entry_point = %name,
                    "entry_point_rejected"
                );
                return Err(EvaluatorError::rejected(format!(
                    "'{name}' is not a callable identifier"
                )));
            }
        }
        Ok(())
    }
}
