use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use metrics::{
    Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const SOLVE_DURATION_METRIC: &str = "arbiter_solve_duration_seconds";
pub const CYCLES_METRIC: &str = "arbiter_cycles_total";
pub const DEGRADATION_REMOVALS_METRIC: &str = "arbiter_degradation_removals_total";
pub const REGISTERED_STRATEGIES_METRIC: &str = "arbiter_registered_strategies";

const DEFAULT_METRICS_PORT: u16 = 9464;

#[derive(Debug, Clone, Copy)]
pub struct MetricsRuntime {
    pub listen_addr: SocketAddr,
}

impl MetricsRuntime {
    pub fn default_listen_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_METRICS_PORT)
    }
}

pub fn start_prometheus_exporter(listen_addr: SocketAddr) -> Result<MetricsRuntime, BuildError> {
    describe_histogram!(
        SOLVE_DURATION_METRIC,
        Unit::Seconds,
        "Wall time of one solver invocation, successful or not."
    );
    describe_counter!(
        CYCLES_METRIC,
        Unit::Count,
        "Arbitration cycles completed, labelled by outcome."
    );
    describe_counter!(
        DEGRADATION_REMOVALS_METRIC,
        Unit::Count,
        "Desires removed by the degradation search."
    );
    describe_gauge!(
        REGISTERED_STRATEGIES_METRIC,
        Unit::Count,
        "Strategies currently held in the catalog."
    );

    PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .install()?;

    Ok(MetricsRuntime { listen_addr })
}

pub fn record_solve_duration(elapsed: Duration) {
    histogram!(SOLVE_DURATION_METRIC).record(elapsed.as_secs_f64());
}

pub fn record_cycle(outcome: &'static str) {
    counter!(CYCLES_METRIC, "outcome" => outcome).increment(1);
}

pub fn record_degradation_removal() {
    counter!(DEGRADATION_REMOVALS_METRIC).increment(1);
}

pub fn record_registered_strategies(count: usize) {
    gauge!(REGISTERED_STRATEGIES_METRIC).set(count as f64);
}
