mod cycle;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use desire_arbiter::arbitration::{
    ActivationEntry, ActivationResult, Arbiter, ArbitrationEvent, ArbitrationSink, CostVector,
    Desire, EvaluatorError, EvaluatorPort, SolverError, SolverPort, Strategy, Utility,
    UtilityMinimums,
};

/// goal class -> (utility minimum, intensity) as staged before one `solve`.
pub type Requests = BTreeMap<String, (f64, f64)>;

/// Decides which strategies a solve activates, given the staged requests and
/// the registered strategy -> goal class map.
pub type Policy = dyn Fn(&Requests, &BTreeMap<String, String>) -> Result<BTreeSet<String>, SolverError>
    + Send
    + Sync;

#[derive(Debug, Default)]
pub struct SolverLog {
    pub registered: Vec<String>,
    pub solves: Vec<Requests>,
    pub ceilings: Vec<(String, f64)>,
}

pub struct ScriptedSolver {
    strategies: BTreeMap<String, String>,
    pending: Requests,
    policy: Arc<Policy>,
    log: Arc<Mutex<SolverLog>>,
    reject_registration: bool,
}

#[async_trait]
impl SolverPort for ScriptedSolver {
    fn reset_requests(&mut self) {
        self.pending.clear();
    }

    fn set_utility_minimum(&mut self, goal_class: &str, value: f64) {
        self.pending.entry(goal_class.to_string()).or_default().0 = value;
    }

    fn set_utility_intensity(&mut self, goal_class: &str, value: f64) {
        self.pending.entry(goal_class.to_string()).or_default().1 = value;
    }

    async fn solve(&mut self) -> Result<ActivationResult, SolverError> {
        self.log
            .lock()
            .expect("solver log lock should not be poisoned")
            .solves
            .push(self.pending.clone());
        let active = (self.policy)(&self.pending, &self.strategies)?;
        Ok(ActivationResult {
            entries: self
                .strategies
                .keys()
                .map(|strategy_id| ActivationEntry {
                    strategy_id: strategy_id.clone(),
                    active: active.contains(strategy_id),
                })
                .collect(),
        })
    }

    fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    fn register_strategy(
        &mut self,
        strategy_id: &str,
        _cost: &CostVector,
        utility: &Utility,
        _utility_min: &UtilityMinimums,
    ) -> Result<(), SolverError> {
        if self.reject_registration {
            return Err(SolverError::new("registration refused"));
        }
        self.strategies
            .insert(strategy_id.to_string(), utility.id.clone());
        self.log
            .lock()
            .expect("solver log lock should not be poisoned")
            .registered
            .push(strategy_id.to_string());
        Ok(())
    }

    fn set_resource_ceiling(&mut self, resource_id: &str, value: f64) -> Result<(), SolverError> {
        self.log
            .lock()
            .expect("solver log lock should not be poisoned")
            .ceilings
            .push((resource_id.to_string(), value));
        Ok(())
    }
}

/// Activates every strategy serving a requested class.
fn active_for(
    requests: &Requests,
    strategies: &BTreeMap<String, String>,
) -> Result<BTreeSet<String>, SolverError> {
    Ok(strategies
        .iter()
        .filter(|(_, class)| requests.contains_key(*class))
        .map(|(id, _)| id.clone())
        .collect())
}

pub fn serve_requested() -> Arc<Policy> {
    Arc::new(active_for)
}

/// Like `serve_requested`, but any pass requesting `class` finds nothing.
pub fn infeasible_with(class: &'static str) -> Arc<Policy> {
    Arc::new(move |requests: &Requests, strategies: &BTreeMap<String, String>| {
        if requests.contains_key(class) {
            Ok(BTreeSet::new())
        } else {
            active_for(requests, strategies)
        }
    })
}

/// Like `serve_requested`, but a pass staging `class` at exactly `intensity`
/// finds nothing.
pub fn infeasible_at(class: &'static str, intensity: f64) -> Arc<Policy> {
    Arc::new(move |requests: &Requests, strategies: &BTreeMap<String, String>| {
        match requests.get(class) {
            Some((_, staged)) if (staged - intensity).abs() < f64::EPSILON => Ok(BTreeSet::new()),
            _ => active_for(requests, strategies),
        }
    })
}

/// Like `serve_requested`, but any pass requesting `class` errors out.
pub fn failing_with(class: &'static str) -> Arc<Policy> {
    Arc::new(move |requests: &Requests, strategies: &BTreeMap<String, String>| {
        if requests.contains_key(class) {
            Err(SolverError::new(format!("no model for {class}")))
        } else {
            active_for(requests, strategies)
        }
    })
}

pub fn never_feasible() -> Arc<Policy> {
    Arc::new(|_: &Requests, _: &BTreeMap<String, String>| {
        Ok::<BTreeSet<String>, SolverError>(BTreeSet::new())
    })
}

#[derive(Default)]
pub struct SpyEvaluator {
    pub expressions: Mutex<Vec<String>>,
    reject_containing: Vec<String>,
}

impl SpyEvaluator {
    pub fn rejecting(fragments: &[&str]) -> Self {
        Self {
            expressions: Mutex::new(Vec::new()),
            reject_containing: fragments.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn expressions(&self) -> Vec<String> {
        self.expressions
            .lock()
            .expect("evaluator lock should not be poisoned")
            .clone()
    }
}

#[async_trait]
impl EvaluatorPort for SpyEvaluator {
    async fn evaluate(&self, expression: &str) -> Result<String, EvaluatorError> {
        self.expressions
            .lock()
            .expect("evaluator lock should not be poisoned")
            .push(expression.to_string());
        if self
            .reject_containing
            .iter()
            .any(|fragment| expression.contains(fragment.as_str()))
        {
            return Err(EvaluatorError::rejected(format!("{expression} is not defined")));
        }
        Ok(String::new())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ArbitrationEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ArbitrationEvent> {
        self.events
            .lock()
            .expect("sink lock should not be poisoned")
            .clone()
    }

    pub fn solve_times(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, ArbitrationEvent::SolveTime { .. }))
            .count()
    }
}

impl ArbitrationSink for RecordingSink {
    fn on_event(&self, event: ArbitrationEvent) {
        self.events
            .lock()
            .expect("sink lock should not be poisoned")
            .push(event);
    }
}

pub struct Harness {
    pub arbiter: Arbiter,
    pub solver_log: Arc<Mutex<SolverLog>>,
    pub evaluator: Arc<SpyEvaluator>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(policy: Arc<Policy>) -> Self {
        Self::build(policy, SpyEvaluator::default(), false)
    }

    pub fn build(policy: Arc<Policy>, evaluator: SpyEvaluator, reject_registration: bool) -> Self {
        let solver_log = Arc::new(Mutex::new(SolverLog::default()));
        let evaluator = Arc::new(evaluator);
        let sink = Arc::new(RecordingSink::default());
        let solver = ScriptedSolver {
            strategies: BTreeMap::new(),
            pending: Requests::new(),
            policy,
            log: Arc::clone(&solver_log),
            reject_registration,
        };
        Self {
            arbiter: Arbiter::new(Box::new(solver), evaluator.clone(), sink.clone()),
            solver_log,
            evaluator,
            sink,
        }
    }

    pub async fn with_strategies(self, strategies: &[(&str, &str)]) -> Self {
        for (id, class) in strategies {
            self.arbiter
                .register_strategy(strategy(id, class))
                .await
                .expect("strategy should register");
        }
        self
    }

    pub fn solver_calls(&self) -> usize {
        self.solver_log
            .lock()
            .expect("solver log lock should not be poisoned")
            .solves
            .len()
    }

    pub fn solves(&self) -> Vec<Requests> {
        self.solver_log
            .lock()
            .expect("solver log lock should not be poisoned")
            .solves
            .clone()
    }

    /// Expressions dispatched after registration (entry-point validation excluded).
    pub fn dispatched(&self) -> Vec<String> {
        self.evaluator
            .expressions()
            .into_iter()
            .filter(|expression| expression.ends_with(';'))
            .collect()
    }
}

pub fn strategy(id: &str, class: &str) -> Strategy {
    Strategy {
        id: id.to_string(),
        cost: BTreeMap::new(),
        utility: Utility {
            id: class.to_string(),
            value: 1.0,
        },
        utility_min: BTreeMap::new(),
        bringup_function: format!("{id}_up"),
        bringdown_function: format!("{id}_down"),
        source: None,
    }
}

pub fn desire(id: &str, class: &str, intensity: f64) -> Desire {
    Desire {
        id: id.to_string(),
        goal_class: class.to_string(),
        intensity,
        security: false,
        utility: 1.0,
        params: String::new(),
    }
}

pub fn protected(id: &str, class: &str, intensity: f64) -> Desire {
    Desire {
        security: true,
        ..desire(id, class, intensity)
    }
}
