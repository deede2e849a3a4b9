use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::arbitration::{
    catalog::StrategyCatalog,
    ports::{ArbitrationSink, EvaluatorPort},
    types::{
        ActivationResult, ArbitrationEvent, CycleId, Desire, Intention, IntentionEntry, Strategy,
    },
};

/// One effector invocation, bound to the desires that motivated it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCall {
    pub strategy_id: String,
    pub active: bool,
    pub expression: String,
    pub entry: IntentionEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport {
    pub activation: ActivationResult,
    pub intention: Intention,
    pub dispatch_failures: usize,
}

pub struct ActivationSequencer;

impl ActivationSequencer {
    /// Stable sort placing every deactivation before any activation.
    pub fn order(result: &mut ActivationResult) {
        result.entries.sort_by_key(|entry| entry.active);
    }

    /// Builds `<entry_point>(<args>);`. Each matching desire's non-empty payload
    /// is one argument group, joined in desire order. The intention entry
    /// records the first matching desire, not the last: later matches only
    /// contribute arguments and never overwrite the recorded id, class or
    /// intensity.
    pub fn bind(strategy: &Strategy, active: bool, desires: &[Desire]) -> BoundCall {
        let mut entry = IntentionEntry {
            strategy_id: strategy.id.clone(),
            enabled: active,
            ..IntentionEntry::default()
        };

        let mut args: Vec<&str> = Vec::new();
        for desire in desires.iter().filter(|desire| strategy.serves(&desire.goal_class)) {
            if !desire.params.trim().is_empty() {
                args.push(desire.params.as_str());
            }
            if entry.desire_id.is_none() {
                entry.desire_id = Some(desire.id.clone());
                entry.desire_type = Some(desire.goal_class.clone());
                entry.intensity = Some(desire.intensity);
            }
        }

        BoundCall {
            strategy_id: strategy.id.clone(),
            active,
            expression: format!("{}({});", strategy.entry_point(active), args.join(", ")),
            entry,
        }
    }

    /// Dispatches bring-down calls, then bring-up calls, and publishes the
    /// resulting intention. Dispatch failures are counted, never fatal.
    pub async fn apply(
        catalog: &StrategyCatalog,
        evaluator: &dyn EvaluatorPort,
        sink: &dyn ArbitrationSink,
        cycle_id: CycleId,
        mut result: ActivationResult,
        desires: &[Desire],
    ) -> SequenceReport {
        Self::order(&mut result);

        let mut entries = Vec::with_capacity(result.len());
        let mut dispatch_failures = 0usize;
        for activation in &result.entries {
            let Some(strategy) = catalog.get(&activation.strategy_id) else {
                tracing::warn!(
                    target: "sequencer",
                    cycle_id = cycle_id,
                    strategy_id = %activation.strategy_id,
                    "dispatch_skipped_unknown_strategy"
                );
                dispatch_failures = dispatch_failures.saturating_add(1);
                entries.push(IntentionEntry {
                    strategy_id: activation.strategy_id.clone(),
                    enabled: activation.active,
                    ..IntentionEntry::default()
                });
                continue;
            };

            let call = Self::bind(strategy, activation.active, desires);
            tracing::debug!(
                target: "sequencer",
                cycle_id = cycle_id,
                strategy_id = %call.strategy_id,
                active = call.active,
                expression = %call.expression,
                "dispatch_attempt"
            );
            if let Err(err) = evaluator.evaluate(&call.expression).await {
                dispatch_failures = dispatch_failures.saturating_add(1);
                tracing::error!(
                    target: "sequencer",
                    cycle_id = cycle_id,
                    strategy_id = %call.strategy_id,
                    expression = %call.expression,
                    error = %err,
                    "dispatch_failed"
                );
            }
            entries.push(call.entry);
        }

        if !result.any_active() {
            tracing::warn!(
                target: "sequencer",
                cycle_id = cycle_id,
                "no_strategies_activated"
            );
        }

        let intention = Intention {
            cycle_id,
            stamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            entries,
        };
        sink.on_event(ArbitrationEvent::Intention(intention.clone()));

        SequenceReport {
            activation: result,
            intention,
            dispatch_failures,
        }
    }
}
