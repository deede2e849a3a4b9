use std::time::Instant;

use crate::{
    arbitration::{
        catalog::StrategyCatalog,
        ports::{ArbitrationSink, SolverPort},
        types::{ActivationResult, ArbitrationEvent, CycleId, CycleOutcome, Desire, DesireId},
    },
    observability::metrics,
};

#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub outcome: CycleOutcome,
    pub result: ActivationResult,
    /// Desires present in the pass that produced `result`.
    pub surviving: Vec<Desire>,
    pub passes: u32,
    pub removed: Vec<DesireId>,
}

enum PassOutcome {
    Feasible(ActivationResult),
    Infeasible(ActivationResult),
}

pub struct ArbitrationLoop;

impl ArbitrationLoop {
    /// Solves for `desires`, dropping the weakest unprotected desire after each
    /// failed pass. Terminates after at most one removal per unprotected desire.
    pub async fn run(
        solver: &mut dyn SolverPort,
        catalog: &StrategyCatalog,
        sink: &dyn ArbitrationSink,
        cycle_id: CycleId,
        desires: Vec<Desire>,
    ) -> LoopOutcome {
        let mut desires = desires;
        let mut removed = Vec::new();
        let mut passes = 0u32;

        if desires.is_empty() {
            return LoopOutcome {
                outcome: CycleOutcome::NoResolvableDesires,
                result: catalog.all_deactivated(),
                surviving: desires,
                passes,
                removed,
            };
        }

        loop {
            passes = passes.saturating_add(1);
            let last = match Self::solving_pass(solver, catalog, sink, cycle_id, passes, &desires)
                .await
            {
                PassOutcome::Feasible(result) => {
                    tracing::debug!(
                        target: "arbitration",
                        cycle_id = cycle_id,
                        passes = passes,
                        "solved"
                    );
                    return LoopOutcome {
                        outcome: CycleOutcome::Feasible,
                        result,
                        surviving: desires,
                        passes,
                        removed,
                    };
                }
                PassOutcome::Infeasible(result) => result,
            };

            let Some(index) = degradation_candidate(&desires) else {
                tracing::warn!(
                    target: "arbitration",
                    cycle_id = cycle_id,
                    passes = passes,
                    protected = desires.len(),
                    "degradation_blocked_by_protected_desires"
                );
                return LoopOutcome {
                    outcome: CycleOutcome::ProtectedInfeasible,
                    result: last,
                    surviving: desires,
                    passes,
                    removed,
                };
            };

            let dropped = desires.remove(index);
            tracing::debug!(
                target: "arbitration",
                cycle_id = cycle_id,
                desire_id = %dropped.id,
                goal_class = %dropped.goal_class,
                intensity = dropped.intensity,
                "degradation_removed_desire"
            );
            metrics::record_degradation_removal();
            removed.push(dropped.id);

            if desires.is_empty() {
                tracing::warn!(
                    target: "arbitration",
                    cycle_id = cycle_id,
                    passes = passes,
                    "degradation_exhausted_desires"
                );
                return LoopOutcome {
                    outcome: CycleOutcome::Exhausted,
                    result: last,
                    surviving: desires,
                    passes,
                    removed,
                };
            }
        }
    }

    async fn solving_pass(
        solver: &mut dyn SolverPort,
        catalog: &StrategyCatalog,
        sink: &dyn ArbitrationSink,
        cycle_id: CycleId,
        pass: u32,
        desires: &[Desire],
    ) -> PassOutcome {
        let started = Instant::now();

        solver.reset_requests();
        for desire in desires {
            solver.set_utility_minimum(&desire.goal_class, desire.utility);
            solver.set_utility_intensity(&desire.goal_class, desire.intensity);
        }
        let solved = solver.solve().await;

        let elapsed = started.elapsed();
        metrics::record_solve_duration(elapsed);
        sink.on_event(ArbitrationEvent::SolveTime {
            cycle_id,
            pass,
            elapsed_micros: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        });

        match solved {
            Ok(result) if !catalog.covers(&result) => {
                tracing::warn!(
                    target: "arbitration",
                    cycle_id = cycle_id,
                    pass = pass,
                    result_len = result.len(),
                    strategy_count = catalog.len(),
                    "solver_result_shape_mismatch"
                );
                PassOutcome::Infeasible(catalog.all_deactivated())
            }
            Ok(result) if result.any_active() => PassOutcome::Feasible(result),
            Ok(result) => PassOutcome::Infeasible(result),
            Err(err) => {
                tracing::warn!(
                    target: "arbitration",
                    cycle_id = cycle_id,
                    pass = pass,
                    error = %err,
                    "solver_failed"
                );
                PassOutcome::Infeasible(catalog.all_deactivated())
            }
        }
    }
}

/// Index of the unprotected desire with the strictly lowest intensity; the
/// first one encountered wins ties. `None` when every desire is protected.
pub fn degradation_candidate(desires: &[Desire]) -> Option<usize> {
    let mut lowest: Option<(usize, f64)> = None;
    for (index, desire) in desires.iter().enumerate() {
        if desire.security {
            continue;
        }
        match lowest {
            Some((_, intensity)) if desire.intensity >= intensity => {}
            _ => lowest = Some((index, desire.intensity)),
        }
    }
    lowest.map(|(index, _)| index)
}
