use async_trait::async_trait;

use crate::arbitration::{
    error::{EvaluatorError, SolverError},
    types::{ActivationResult, ArbitrationEvent, CostVector, Utility, UtilityMinimums},
};

/// Constrained-optimization backend. Request setters stage state for the next
/// `solve`; `reset_requests` clears it.
#[async_trait]
pub trait SolverPort: Send + Sync {
    fn reset_requests(&mut self);

    fn set_utility_minimum(&mut self, goal_class: &str, value: f64);

    fn set_utility_intensity(&mut self, goal_class: &str, value: f64);

    async fn solve(&mut self) -> Result<ActivationResult, SolverError>;

    fn strategy_count(&self) -> usize;

    fn register_strategy(
        &mut self,
        strategy_id: &str,
        cost: &CostVector,
        utility: &Utility,
        utility_min: &UtilityMinimums,
    ) -> Result<(), SolverError>;

    fn set_resource_ceiling(&mut self, resource_id: &str, value: f64) -> Result<(), SolverError>;
}

/// Remote effector evaluation facility.
#[async_trait]
pub trait EvaluatorPort: Send + Sync {
    async fn evaluate(&self, expression: &str) -> Result<String, EvaluatorError>;

    /// Checks that `name` resolves to something callable without invoking it.
    async fn validate_entry_point(&self, name: &str) -> Result<(), EvaluatorError> {
        self.evaluate(name).await.map(|_| ())
    }
}

pub trait ArbitrationSink: Send + Sync {
    fn on_event(&self, event: ArbitrationEvent);
}
