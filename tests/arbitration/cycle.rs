use desire_arbiter::arbitration::{ArbitrationEvent, CycleOutcome};

use crate::{
    Harness, Requests, desire, failing_with, infeasible_at, infeasible_with, never_feasible,
    protected, serve_requested,
};

#[tokio::test]
async fn given_empty_batch_when_updating_then_all_strategies_deactivate_without_solving() {
    let harness = Harness::new(serve_requested())
        .with_strategies(&[("dock", "recharge"), ("goto", "nav")])
        .await;

    let report = harness.arbiter.update_desire_set(Vec::new()).await;

    assert_eq!(report.outcome, CycleOutcome::EmptyBatch);
    assert_eq!(harness.solver_calls(), 0);
    assert_eq!(report.passes, 0);
    assert!(!report.activation.any_active());
    assert_eq!(
        harness.dispatched(),
        vec!["dock_down();".to_string(), "goto_down();".to_string()]
    );
    assert_eq!(report.intention.entries.len(), 2);
    assert!(report.intention.entries.iter().all(|entry| !entry.enabled));
}

#[tokio::test]
async fn given_only_unknown_classes_when_updating_then_solver_is_not_invoked() {
    let harness = Harness::new(serve_requested())
        .with_strategies(&[("goto", "nav")])
        .await;

    let report = harness
        .arbiter
        .update_desire_set(vec![desire("d1", "fly", 0.9)])
        .await;

    assert_eq!(report.outcome, CycleOutcome::NoResolvableDesires);
    assert_eq!(harness.solver_calls(), 0);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].desire_id, "d1");
    assert_eq!(report.dropped[0].reason, "unknown_class");
    assert_eq!(harness.dispatched(), vec!["goto_down();".to_string()]);
}

#[tokio::test]
async fn given_mixed_batch_when_updating_then_only_known_classes_reach_the_solver() {
    let harness = Harness::new(serve_requested())
        .with_strategies(&[("goto", "nav")])
        .await;

    let report = harness
        .arbiter
        .update_desire_set(vec![desire("d0", "fly", 0.3), desire("d1", "nav", 0.7)])
        .await;

    assert_eq!(report.outcome, CycleOutcome::Feasible);
    let solves = harness.solves();
    assert_eq!(solves.len(), 1);
    assert_eq!(solves[0].keys().collect::<Vec<_>>(), vec!["nav"]);
    assert_eq!(solves[0]["nav"], (1.0, 0.7));
    assert_eq!(report.intention.desire_ids(), vec!["d1"]);
}

#[tokio::test]
async fn given_conflicting_desires_when_updating_then_weakest_is_degraded() {
    let harness = Harness::new(infeasible_with("talk"))
        .with_strategies(&[("goto", "nav"), ("speak", "talk")])
        .await;
    let mut nav = desire("d1", "nav", 0.9);
    nav.params = "1.0, 2.0".to_string();
    let mut talk = desire("d2", "talk", 0.1);
    talk.params = "'hello'".to_string();

    let report = harness.arbiter.update_desire_set(vec![nav, talk]).await;

    assert_eq!(report.outcome, CycleOutcome::Feasible);
    assert_eq!(report.passes, 2);
    assert_eq!(report.degraded, vec!["d2".to_string()]);
    assert_eq!(report.activation.is_active("goto"), Some(true));
    assert_eq!(report.activation.is_active("speak"), Some(false));
    assert_eq!(
        harness.dispatched(),
        vec!["speak_down();".to_string(), "goto_up(1.0, 2.0);".to_string()]
    );

    let speak = &report.intention.entries[0];
    assert_eq!(speak.strategy_id, "speak");
    assert!(!speak.enabled);
    assert!(speak.desire_id.is_none());
    let goto = &report.intention.entries[1];
    assert_eq!(goto.strategy_id, "goto");
    assert!(goto.enabled);
    assert_eq!(goto.desire_id.as_deref(), Some("d1"));
    assert_eq!(goto.desire_type.as_deref(), Some("nav"));
    assert_eq!(goto.intensity, Some(0.9));
}

#[tokio::test]
async fn given_security_desire_when_degrading_then_it_is_never_removed() {
    let harness = Harness::new(infeasible_with("nav"))
        .with_strategies(&[("alarm", "safety"), ("goto", "nav")])
        .await;

    let report = harness
        .arbiter
        .update_desire_set(vec![
            protected("d0", "safety", 0.05),
            desire("d1", "nav", 0.95),
        ])
        .await;

    assert_eq!(report.outcome, CycleOutcome::Feasible);
    assert_eq!(report.degraded, vec!["d1".to_string()]);
    assert_eq!(report.activation.is_active("alarm"), Some(true));

    let solves = harness.solves();
    assert_eq!(solves.len(), 2);
    assert!(solves.iter().all(|requests| requests.contains_key("safety")));
}

#[tokio::test]
async fn given_same_class_desires_when_weaker_conflicts_then_only_it_is_degraded() {
    let harness = Harness::new(infeasible_at("nav", 0.3))
        .with_strategies(&[("goto", "nav")])
        .await;
    let mut strong = desire("d1", "nav", 0.8);
    strong.params = "1, 2".to_string();
    let mut weak = desire("d2", "nav", 0.3);
    weak.params = "3, 4".to_string();

    let report = harness.arbiter.update_desire_set(vec![strong, weak]).await;

    assert_eq!(report.outcome, CycleOutcome::Feasible);
    assert_eq!(report.passes, 2);
    assert_eq!(report.degraded, vec!["d2".to_string()]);
    assert_eq!(report.intention.desire_ids(), vec!["d1"]);
    assert_eq!(
        harness.solves(),
        vec![
            Requests::from([("nav".to_string(), (1.0, 0.3))]),
            Requests::from([("nav".to_string(), (1.0, 0.8))]),
        ]
    );
    assert_eq!(harness.dispatched(), vec!["goto_up(1, 2);".to_string()]);
}

#[tokio::test]
async fn given_equal_intensities_when_degrading_then_first_in_batch_goes_first() {
    let harness = Harness::new(infeasible_with("a"))
        .with_strategies(&[("sa", "a"), ("sb", "b")])
        .await;

    let report = harness
        .arbiter
        .update_desire_set(vec![desire("da", "a", 0.5), desire("db", "b", 0.5)])
        .await;

    assert_eq!(report.degraded, vec!["da".to_string()]);
    assert_eq!(report.activation.is_active("sb"), Some(true));
}

#[tokio::test]
async fn given_never_feasible_solver_when_updating_then_loop_stops_after_k_passes() {
    let harness = Harness::new(never_feasible())
        .with_strategies(&[("sa", "a"), ("sb", "b"), ("sc", "c")])
        .await;

    let report = harness
        .arbiter
        .update_desire_set(vec![
            desire("d1", "a", 0.3),
            desire("d2", "b", 0.1),
            desire("d3", "c", 0.2),
        ])
        .await;

    assert_eq!(report.outcome, CycleOutcome::Exhausted);
    assert_eq!(harness.solver_calls(), 3);
    assert_eq!(report.passes, 3);
    assert_eq!(
        report.degraded,
        vec!["d2".to_string(), "d3".to_string(), "d1".to_string()]
    );
    assert!(!report.activation.any_active());
    assert_eq!(report.activation.len(), 3);
    assert_eq!(harness.sink.solve_times(), 3);
}

#[tokio::test]
async fn given_only_protected_desires_left_when_infeasible_then_cycle_reports_it() {
    let harness = Harness::new(never_feasible())
        .with_strategies(&[("alarm", "safety"), ("goto", "nav")])
        .await;

    let report = harness
        .arbiter
        .update_desire_set(vec![
            protected("d0", "safety", 0.9),
            desire("d1", "nav", 0.4),
            desire("d2", "nav", 0.6),
        ])
        .await;

    assert_eq!(report.outcome, CycleOutcome::ProtectedInfeasible);
    assert_eq!(report.degraded, vec!["d1".to_string(), "d2".to_string()]);
    assert_eq!(harness.solver_calls(), 3);
    assert!(!report.activation.any_active());
    assert!(
        harness
            .solves()
            .iter()
            .all(|requests| requests.contains_key("safety"))
    );
}

#[tokio::test]
async fn given_solver_error_when_updating_then_pass_counts_as_failed() {
    let harness = Harness::new(failing_with("talk"))
        .with_strategies(&[("goto", "nav"), ("speak", "talk")])
        .await;

    let report = harness
        .arbiter
        .update_desire_set(vec![desire("d1", "nav", 0.8), desire("d2", "talk", 0.2)])
        .await;

    assert_eq!(report.outcome, CycleOutcome::Feasible);
    assert_eq!(report.degraded, vec!["d2".to_string()]);
    assert_eq!(report.activation.is_active("goto"), Some(true));
}

#[tokio::test]
async fn given_cycle_when_completed_then_one_intention_is_published_per_cycle() {
    let harness = Harness::new(serve_requested())
        .with_strategies(&[("goto", "nav")])
        .await;

    let first = harness
        .arbiter
        .update_desire_set(vec![desire("d1", "nav", 0.5)])
        .await;
    let second = harness.arbiter.update_desire_set(Vec::new()).await;

    let intentions: Vec<_> = harness
        .sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ArbitrationEvent::Intention(intention) => Some(intention),
            _ => None,
        })
        .collect();
    assert_eq!(intentions.len(), 2);
    assert_eq!(intentions[0].cycle_id, first.cycle_id);
    assert_eq!(intentions[1].cycle_id, second.cycle_id);
    assert!(second.cycle_id > first.cycle_id);
    assert!(!intentions[0].stamp.is_empty());
}

#[tokio::test]
async fn given_ceiling_update_when_applied_then_solver_and_observers_see_full_snapshot() {
    let harness = Harness::new(serve_requested());

    harness
        .arbiter
        .set_resource_ceiling("cpu", 2.0)
        .await
        .expect("cpu ceiling should apply");
    let snapshot = harness
        .arbiter
        .set_resource_ceiling("wheels", 1.0)
        .await
        .expect("wheels ceiling should apply");

    assert_eq!(snapshot.ceilings.len(), 2);
    assert_eq!(
        harness
            .solver_log
            .lock()
            .expect("solver log lock should not be poisoned")
            .ceilings,
        vec![("cpu".to_string(), 2.0), ("wheels".to_string(), 1.0)]
    );
    let published: Vec<_> = harness
        .sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ArbitrationEvent::ResourceMax(snapshot) => Some(snapshot),
            _ => None,
        })
        .collect();
    assert_eq!(published.len(), 2);
    assert_eq!(published[1], snapshot);

    assert!(harness.arbiter.set_resource_ceiling("", 1.0).await.is_err());
    assert!(
        harness
            .arbiter
            .set_resource_ceiling("cpu", f64::NAN)
            .await
            .is_err()
    );
}
