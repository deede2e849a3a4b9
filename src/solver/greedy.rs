use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::arbitration::{
    error::SolverError,
    ports::SolverPort,
    types::{
        ActivationEntry, ActivationResult, CostVector, GoalClass, ResourceId, StrategyId, Utility,
        UtilityMinimums,
    },
};

#[derive(Debug, Clone)]
struct SolverStrategy {
    cost: CostVector,
    utility: Utility,
    utility_min: UtilityMinimums,
}

impl SolverStrategy {
    fn total_cost(&self) -> f64 {
        self.cost.values().sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UtilityRequest {
    minimum: f64,
    intensity: f64,
}

#[derive(Debug, Clone, Default)]
struct Allocation {
    active: BTreeSet<StrategyId>,
    usage: BTreeMap<ResourceId, f64>,
    provided: BTreeMap<GoalClass, f64>,
}

impl Allocation {
    fn serves(&self, goal_class: &str, minimum: f64) -> bool {
        self.provided
            .get(goal_class)
            .is_some_and(|provided| *provided > 0.0 && *provided >= minimum)
    }

    fn activate(&mut self, strategy_id: &str, strategy: &SolverStrategy) {
        self.active.insert(strategy_id.to_string());
        for (resource, cost) in &strategy.cost {
            *self.usage.entry(resource.clone()).or_insert(0.0) += cost;
        }
        *self
            .provided
            .entry(strategy.utility.id.clone())
            .or_insert(0.0) += strategy.utility.value;
    }
}

/// In-process reference backend. Serves requested classes by descending
/// intensity, cheapest satisfying strategy first, honoring resource ceilings
/// and each strategy's own utility minimums. Any unserved requested class
/// makes the whole solution infeasible (all strategies deactivated).
#[derive(Debug, Clone, Default)]
pub struct GreedySolver {
    strategies: BTreeMap<StrategyId, SolverStrategy>,
    ceilings: BTreeMap<ResourceId, f64>,
    requests: BTreeMap<GoalClass, UtilityRequest>,
}

impl GreedySolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn fits(&self, allocation: &Allocation, strategy: &SolverStrategy) -> bool {
        strategy.cost.iter().all(|(resource, cost)| {
            match self.ceilings.get(resource) {
                Some(ceiling) => {
                    let used = allocation.usage.get(resource).copied().unwrap_or(0.0);
                    used + cost <= *ceiling
                }
                None => true,
            }
        })
    }

    fn candidates(&self, goal_class: &str, minimum: f64) -> Vec<(&StrategyId, &SolverStrategy)> {
        let mut candidates: Vec<_> = self
            .strategies
            .iter()
            .filter(|(_, strategy)| {
                strategy.utility.id == goal_class
                    && strategy.utility.value > 0.0
                    && strategy.utility.value >= minimum
            })
            .collect();
        candidates.sort_by(|(lhs_id, lhs), (rhs_id, rhs)| {
            lhs.total_cost()
                .total_cmp(&rhs.total_cost())
                .then_with(|| lhs_id.cmp(rhs_id))
        });
        candidates
    }

    fn satisfy(
        &self,
        allocation: &Allocation,
        goal_class: &str,
        minimum: f64,
        depth: usize,
    ) -> Option<Allocation> {
        if allocation.serves(goal_class, minimum) {
            return Some(allocation.clone());
        }
        if depth == 0 {
            return None;
        }

        for (strategy_id, strategy) in self.candidates(goal_class, minimum) {
            if allocation.active.contains(strategy_id) || !self.fits(allocation, strategy) {
                continue;
            }

            let mut trial = allocation.clone();
            trial.activate(strategy_id, strategy);
            let satisfied = strategy
                .utility_min
                .iter()
                .try_fold(trial, |current, (dependency, dependency_minimum)| {
                    self.satisfy(&current, dependency, *dependency_minimum, depth - 1)
                });
            if satisfied.is_some() {
                return satisfied;
            }
        }

        None
    }

    fn result_for(&self, active: &BTreeSet<StrategyId>) -> ActivationResult {
        ActivationResult {
            entries: self
                .strategies
                .keys()
                .map(|strategy_id| ActivationEntry {
                    strategy_id: strategy_id.clone(),
                    active: active.contains(strategy_id),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl SolverPort for GreedySolver {
    fn reset_requests(&mut self) {
        self.requests.clear();
    }

    fn set_utility_minimum(&mut self, goal_class: &str, value: f64) {
        self.requests.entry(goal_class.to_string()).or_default().minimum = value;
    }

    fn set_utility_intensity(&mut self, goal_class: &str, value: f64) {
        self.requests
            .entry(goal_class.to_string())
            .or_default()
            .intensity = value;
    }

    async fn solve(&mut self) -> Result<ActivationResult, SolverError> {
        let mut ordered: Vec<_> = self.requests.iter().collect();
        ordered.sort_by(|(lhs_class, lhs), (rhs_class, rhs)| {
            rhs.intensity
                .total_cmp(&lhs.intensity)
                .then_with(|| lhs_class.cmp(rhs_class))
        });

        let depth = self.strategies.len();
        let mut allocation = Allocation::default();
        for (goal_class, request) in ordered {
            match self.satisfy(&allocation, goal_class, request.minimum, depth) {
                Some(next) => allocation = next,
                None => return Ok(self.result_for(&BTreeSet::new())),
            }
        }

        Ok(self.result_for(&allocation.active))
    }

    fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    fn register_strategy(
        &mut self,
        strategy_id: &str,
        cost: &CostVector,
        utility: &Utility,
        utility_min: &UtilityMinimums,
    ) -> Result<(), SolverError> {
        if strategy_id.is_empty() {
            return Err(SolverError::new("strategy id cannot be empty"));
        }
        self.strategies.insert(
            strategy_id.to_string(),
            SolverStrategy {
                cost: cost.clone(),
                utility: utility.clone(),
                utility_min: utility_min.clone(),
            },
        );
        Ok(())
    }

    fn set_resource_ceiling(&mut self, resource_id: &str, value: f64) -> Result<(), SolverError> {
        if !value.is_finite() {
            return Err(SolverError::new(format!(
                "ceiling for '{resource_id}' must be finite"
            )));
        }
        self.ceilings.insert(resource_id.to_string(), value);
        Ok(())
    }
}
