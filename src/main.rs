use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tracing::Instrument;

use desire_arbiter::{
    arbitration::{Arbiter, BroadcastArbitrationSink, EvaluatorPort, SolverPort},
    cli::config_path_from_args,
    config::{Config, EvaluatorConfig, SolverConfig},
    evaluator::{TracingEvaluator, UnixSocketEvaluator},
    filters::{FilterManager, InMemoryFilterServices},
    logging::init_tracing,
    observability::metrics,
    server::{self, ServerContext},
    solver::GreedySolver,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let logging = init_tracing(&config.logging)?;

    serve(config).instrument(logging.run_span()).await
}

async fn serve(config: Config) -> Result<()> {
    if config.metrics.enabled {
        let runtime = metrics::start_prometheus_exporter(config.metrics.listen_addr)
            .context("failed to start prometheus exporter")?;
        tracing::info!(
            target: "metrics",
            listen_addr = %runtime.listen_addr,
            "metrics_exporter_started"
        );
    }

    let solver: Box<dyn SolverPort> = match config.solver {
        SolverConfig::Greedy => Box::new(GreedySolver::new()),
    };
    let evaluator: Arc<dyn EvaluatorPort> = match &config.evaluator {
        EvaluatorConfig::Tracing { strict_identifiers } => {
            Arc::new(TracingEvaluator::new(*strict_identifiers)?)
        }
        EvaluatorConfig::UnixSocket {
            socket_path,
            timeout_ms,
        } => Arc::new(UnixSocketEvaluator::new(socket_path.clone(), *timeout_ms)),
    };
    let events = Arc::new(BroadcastArbitrationSink::new(
        config.arbitration.event_channel_capacity,
    ));
    let arbiter = Arc::new(Arbiter::new(solver, evaluator, events.clone()));

    for ceiling in &config.arbitration.resource_ceilings {
        arbiter
            .set_resource_ceiling(&ceiling.id, ceiling.value)
            .await
            .with_context(|| format!("failed to preload resource ceiling '{}'", ceiling.id))?;
    }
    for strategy in config.arbitration.strategies.iter().cloned() {
        let strategy_id = strategy.id.clone();
        arbiter
            .register_strategy(strategy)
            .await
            .with_context(|| format!("failed to preload strategy '{strategy_id}'"))?;
    }

    let filter_services = Arc::new(InMemoryFilterServices::new());
    let filters = Arc::new(FilterManager::new(
        filter_services.clone(),
        Duration::from_millis(config.filters.service_wait_timeout_ms),
    ));

    server::run(
        &config.socket_path,
        ServerContext {
            arbiter,
            events,
            filters,
            filter_services,
        },
        config.arbitration.desire_queue_capacity,
    )
    .await
}
