use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub type DesireId = String;
pub type StrategyId = String;
pub type GoalClass = String;
pub type ResourceId = String;
pub type CycleId = u64;

pub type CostVector = BTreeMap<ResourceId, f64>;
pub type UtilityMinimums = BTreeMap<GoalClass, f64>;

/// A weighted request for one goal class, valid for a single arbitration cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Desire {
    #[validate(length(min = 1))]
    pub id: DesireId,
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub goal_class: GoalClass,
    #[validate(custom(function = "finite_scalar"))]
    pub intensity: f64,
    #[serde(default)]
    pub security: bool,
    /// Minimum utility requested for `goal_class`.
    #[serde(default)]
    #[validate(custom(function = "finite_scalar"))]
    pub utility: f64,
    /// Passed verbatim to the matched strategy's effector call.
    #[serde(default)]
    pub params: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Utility {
    #[validate(length(min = 1))]
    pub id: GoalClass,
    #[validate(custom(function = "finite_scalar"))]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Strategy {
    #[validate(length(min = 1))]
    pub id: StrategyId,
    #[serde(default)]
    #[validate(custom(function = "finite_map"))]
    pub cost: CostVector,
    #[validate(nested)]
    pub utility: Utility,
    #[serde(default)]
    #[validate(custom(function = "finite_map"))]
    pub utility_min: UtilityMinimums,
    #[validate(length(min = 1))]
    pub bringup_function: String,
    #[validate(length(min = 1))]
    pub bringdown_function: String,
    /// Script evaluated once at registration, typically defining the entry points.
    #[serde(default)]
    pub source: Option<String>,
}

impl Strategy {
    pub fn serves(&self, goal_class: &str) -> bool {
        self.utility.id == goal_class
    }

    pub fn entry_point(&self, active: bool) -> &str {
        if active {
            &self.bringup_function
        } else {
            &self.bringdown_function
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationEntry {
    pub strategy_id: StrategyId,
    pub active: bool,
}

/// Activate/deactivate assignment over every registered strategy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivationResult {
    pub entries: Vec<ActivationEntry>,
}

impl ActivationResult {
    pub fn all_deactivated<'a>(strategy_ids: impl IntoIterator<Item = &'a StrategyId>) -> Self {
        Self {
            entries: strategy_ids
                .into_iter()
                .map(|strategy_id| ActivationEntry {
                    strategy_id: strategy_id.clone(),
                    active: false,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn any_active(&self) -> bool {
        self.entries.iter().any(|entry| entry.active)
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.active).count()
    }

    pub fn is_active(&self, strategy_id: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|entry| entry.strategy_id == strategy_id)
            .map(|entry| entry.active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IntentionEntry {
    pub strategy_id: StrategyId,
    pub enabled: bool,
    #[serde(default)]
    pub desire_id: Option<DesireId>,
    #[serde(default)]
    pub desire_type: Option<GoalClass>,
    #[serde(default)]
    pub intensity: Option<f64>,
}

/// Diagnostic projection of one cycle's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intention {
    pub cycle_id: CycleId,
    pub stamp: String,
    pub entries: Vec<IntentionEntry>,
}

impl Intention {
    pub fn desire_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| entry.desire_id.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCeiling {
    pub id: ResourceId,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResourceCeilingSnapshot {
    pub version: u64,
    pub ceilings: Vec<ResourceCeiling>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// A pass activated at least one strategy.
    Feasible,
    /// The inbound batch was empty; the solver was not invoked.
    EmptyBatch,
    /// No desire survived filtering; the solver was not invoked.
    NoResolvableDesires,
    /// Every removable desire was dropped without reaching a feasible pass.
    Exhausted,
    /// Only security-flagged desires remain and the solver still finds no activation.
    ProtectedInfeasible,
}

impl CycleOutcome {
    pub fn solver_invoked(self) -> bool {
        !matches!(self, Self::EmptyBatch | Self::NoResolvableDesires)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feasible => "feasible",
            Self::EmptyBatch => "empty_batch",
            Self::NoResolvableDesires => "no_resolvable_desires",
            Self::Exhausted => "exhausted",
            Self::ProtectedInfeasible => "protected_infeasible",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedDesire {
    pub desire_id: DesireId,
    pub goal_class: GoalClass,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub outcome: CycleOutcome,
    pub passes: u32,
    pub dropped: Vec<DroppedDesire>,
    pub degraded: Vec<DesireId>,
    pub activation: ActivationResult,
    pub intention: Intention,
    pub dispatch_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArbitrationEvent {
    Intention(Intention),
    ResourceMax(ResourceCeilingSnapshot),
    SolveTime {
        cycle_id: CycleId,
        pass: u32,
        elapsed_micros: u64,
    },
}

fn finite_scalar(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("non_finite"))
    }
}

fn finite_map(values: &BTreeMap<String, f64>) -> Result<(), ValidationError> {
    if values.iter().all(|(key, value)| !key.is_empty() && value.is_finite()) {
        Ok(())
    } else {
        Err(ValidationError::new("non_finite_entry"))
    }
}
