use std::collections::{BTreeMap, BTreeSet};

use crate::arbitration::types::{ActivationResult, RegistrationOutcome, Strategy, StrategyId};

/// Strategy definitions keyed by identifier. Iteration order is identifier
/// order and is the catalog order used for synthesized activation results.
#[derive(Debug, Clone, Default)]
pub struct StrategyCatalog {
    version: u64,
    by_id: BTreeMap<StrategyId, Strategy>,
}

impl StrategyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Stores `strategy`, replacing any prior definition with the same id wholesale.
    pub fn upsert(&mut self, strategy: Strategy) -> RegistrationOutcome {
        self.version = self.version.saturating_add(1);
        match self.by_id.insert(strategy.id.clone(), strategy) {
            Some(_) => RegistrationOutcome::Replaced,
            None => RegistrationOutcome::Inserted,
        }
    }

    pub fn get(&self, strategy_id: &str) -> Option<&Strategy> {
        self.by_id.get(strategy_id)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.by_id.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &StrategyId> {
        self.by_id.keys()
    }

    pub fn serving(&self, goal_class: &str) -> Option<&Strategy> {
        self.by_id.values().find(|strategy| strategy.serves(goal_class))
    }

    pub fn has_class(&self, goal_class: &str) -> bool {
        self.serving(goal_class).is_some()
    }

    pub fn all_deactivated(&self) -> ActivationResult {
        ActivationResult::all_deactivated(self.by_id.keys())
    }

    /// True when `result` names every registered strategy exactly once.
    pub fn covers(&self, result: &ActivationResult) -> bool {
        if result.len() != self.by_id.len() {
            return false;
        }

        let mut seen = BTreeSet::new();
        result.entries.iter().all(|entry| {
            self.by_id.contains_key(&entry.strategy_id) && seen.insert(entry.strategy_id.as_str())
        })
    }

    pub fn snapshot(&self) -> Vec<Strategy> {
        self.by_id.values().cloned().collect()
    }
}
