use std::sync::Arc;

use tokio::sync::Mutex;
use validator::Validate;

use crate::{
    arbitration::{
        degradation::{ArbitrationLoop, LoopOutcome},
        error::{ArbitrationError, effector_rejected, invalid_request, solver_failure},
        filter::DesireFilter,
        ports::{ArbitrationSink, EvaluatorPort, SolverPort},
        sequencer::ActivationSequencer,
        state::ArbiterState,
        types::{
            ArbitrationEvent, CycleOutcome, CycleReport, Desire, RegistrationOutcome,
            ResourceCeilingSnapshot, Strategy,
        },
    },
    observability::metrics,
};

/// Entry point for the three inbound operations. Cycles, strategy
/// registrations and ceiling updates are serialized on one lock.
pub struct Arbiter {
    state: Mutex<ArbiterState>,
    evaluator: Arc<dyn EvaluatorPort>,
    sink: Arc<dyn ArbitrationSink>,
}

impl Arbiter {
    pub fn new(
        solver: Box<dyn SolverPort>,
        evaluator: Arc<dyn EvaluatorPort>,
        sink: Arc<dyn ArbitrationSink>,
    ) -> Self {
        Self {
            state: Mutex::new(ArbiterState::new(solver)),
            evaluator,
            sink,
        }
    }

    #[tracing::instrument(
        name = "arbiter_register_strategy",
        target = "registry",
        skip(self, strategy),
        fields(strategy_id = %strategy.id)
    )]
    pub async fn register_strategy(
        &self,
        strategy: Strategy,
    ) -> Result<RegistrationOutcome, ArbitrationError> {
        strategy
            .validate()
            .map_err(|err| invalid_request(format!("strategy '{}': {err}", strategy.id)))?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(source) = strategy.source.as_deref() {
            self.evaluator.evaluate(source).await.map_err(|err| {
                effector_rejected(format!("strategy '{}' source: {err}", strategy.id))
            })?;
        }
        for name in [&strategy.bringup_function, &strategy.bringdown_function] {
            self.evaluator
                .validate_entry_point(name)
                .await
                .map_err(|err| {
                    effector_rejected(format!(
                        "strategy '{}' entry point '{name}': {err}",
                        strategy.id
                    ))
                })?;
        }

        state
            .solver
            .register_strategy(
                &strategy.id,
                &strategy.cost,
                &strategy.utility,
                &strategy.utility_min,
            )
            .map_err(|err| solver_failure(format!("strategy '{}': {err}", strategy.id)))?;

        let strategy_id = strategy.id.clone();
        let outcome = state.catalog.upsert(strategy);
        metrics::record_registered_strategies(state.catalog.len());
        tracing::info!(
            target: "registry",
            strategy_id = %strategy_id,
            outcome = ?outcome,
            catalog_version = state.catalog.version(),
            "strategy_registered"
        );

        Ok(outcome)
    }

    #[tracing::instrument(
        name = "arbiter_set_resource_ceiling",
        target = "registry",
        skip(self)
    )]
    pub async fn set_resource_ceiling(
        &self,
        resource_id: &str,
        value: f64,
    ) -> Result<ResourceCeilingSnapshot, ArbitrationError> {
        if resource_id.trim().is_empty() {
            return Err(invalid_request("resource id cannot be empty"));
        }
        if !value.is_finite() {
            return Err(invalid_request(format!(
                "resource '{resource_id}' ceiling must be finite"
            )));
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state
            .solver
            .set_resource_ceiling(resource_id, value)
            .map_err(|err| solver_failure(format!("resource '{resource_id}': {err}")))?;
        state.ceilings.set(resource_id, value);

        let snapshot = state.ceilings.snapshot();
        self.sink
            .on_event(ArbitrationEvent::ResourceMax(snapshot.clone()));
        tracing::info!(
            target: "registry",
            resource_id = %resource_id,
            value = value,
            version = snapshot.version,
            "resource_ceiling_set"
        );

        Ok(snapshot)
    }

    /// Runs one full arbitration cycle for `desires`. Never aborted midway.
    #[tracing::instrument(
        name = "arbiter_update_desire_set",
        target = "arbitration",
        skip(self, desires),
        fields(desire_count = desires.len())
    )]
    pub async fn update_desire_set(&self, desires: Vec<Desire>) -> CycleReport {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let cycle_id = state.next_cycle();

        let (looped, dropped) = if desires.is_empty() {
            let looped = LoopOutcome {
                outcome: CycleOutcome::EmptyBatch,
                result: state.catalog.all_deactivated(),
                surviving: Vec::new(),
                passes: 0,
                removed: Vec::new(),
            };
            (looped, Vec::new())
        } else {
            let filtered = DesireFilter::filter(&state.catalog, desires);
            let looped = ArbitrationLoop::run(
                state.solver.as_mut(),
                &state.catalog,
                self.sink.as_ref(),
                cycle_id,
                filtered.kept,
            )
            .await;
            (looped, filtered.dropped)
        };

        let sequenced = ActivationSequencer::apply(
            &state.catalog,
            self.evaluator.as_ref(),
            self.sink.as_ref(),
            cycle_id,
            looped.result,
            &looped.surviving,
        )
        .await;

        metrics::record_cycle(looped.outcome.as_str());
        tracing::info!(
            target: "arbitration",
            cycle_id = cycle_id,
            outcome = looped.outcome.as_str(),
            passes = looped.passes,
            dropped = dropped.len(),
            degraded = looped.removed.len(),
            active = sequenced.activation.active_count(),
            dispatch_failures = sequenced.dispatch_failures,
            "cycle_completed"
        );

        CycleReport {
            cycle_id,
            outcome: looped.outcome,
            passes: looped.passes,
            dropped,
            degraded: looped.removed,
            activation: sequenced.activation,
            intention: sequenced.intention,
            dispatch_failures: sequenced.dispatch_failures,
        }
    }

    pub async fn strategies(&self) -> Vec<Strategy> {
        self.state.lock().await.catalog.snapshot()
    }

    pub async fn resource_ceilings(&self) -> ResourceCeilingSnapshot {
        self.state.lock().await.ceilings.snapshot()
    }

    pub async fn strategy_count(&self) -> usize {
        self.state.lock().await.catalog.len()
    }
}
