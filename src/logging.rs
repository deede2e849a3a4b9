use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow, bail};
use tracing::Span;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "arbiter.log";

/// Targets the arbiter emits under. `logging.targets` may only name these.
pub const SUBSYSTEM_TARGETS: [&str; 8] = [
    "arbitration",
    "evaluator",
    "filters",
    "logging",
    "metrics",
    "registry",
    "sequencer",
    "server",
];

pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: Uuid,
}

impl LoggingGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Root span of the process. Cycle and registration spans nest under it,
    /// so every file record carries the run id in its span list.
    pub fn run_span(&self) -> Span {
        tracing::info_span!(target: "arbitration", "arbiter_run", run_id = %self.run_id)
    }
}

pub fn init_tracing(logging_config: &LoggingConfig) -> Result<LoggingGuard> {
    let directives = subsystem_directives(&logging_config.filter, &logging_config.targets)?;
    let env_filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("failed to parse logging.filter '{directives}'"))?;

    let log_dir = &logging_config.dir;
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create logging directory {}", log_dir.display()))?;
    let sweep = purge_expired_logs_at(log_dir, logging_config.retention_days, SystemTime::now());

    let appender = match logging_config.rotation {
        LoggingRotation::Daily => rolling::daily(log_dir, LOG_FILE_PREFIX),
        LoggingRotation::Hourly => rolling::hourly(log_dir, LOG_FILE_PREFIX),
    };
    let (writer, worker_guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter);
    let stderr_layer = logging_config.stderr_warn_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = %log_dir.display(),
        directives = %directives,
        rotation = ?logging_config.rotation,
        retention_days = logging_config.retention_days,
        expired_removed = sweep.removed,
        "logging_initialized"
    );
    for (path, err) in &sweep.failures {
        tracing::warn!(
            target: "logging",
            path = %path.display(),
            error = %err,
            "log_retention_failed"
        );
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
    })
}

/// `filter` followed by one `<subsystem>=<level>` directive per entry of
/// `targets`. Later directives win, so subsystem levels override the base.
fn subsystem_directives(filter: &str, targets: &BTreeMap<String, String>) -> Result<String> {
    let base = filter.trim();
    if base.is_empty() {
        bail!("logging.filter cannot be empty");
    }

    let mut directives = vec![base.to_string()];
    for (target, level) in targets {
        if !SUBSYSTEM_TARGETS.contains(&target.as_str()) {
            bail!("logging.targets names unknown subsystem '{target}'");
        }
        let level = level.trim().to_ascii_lowercase();
        level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow!("logging.targets.{target} has invalid level '{level}'"))?;
        directives.push(format!("{target}={level}"));
    }

    Ok(directives.join(","))
}

#[derive(Debug, Default)]
struct RetentionSweep {
    removed: usize,
    failures: Vec<(PathBuf, std::io::Error)>,
}

/// Deletes `arbiter.log*` files last modified before the retention window.
fn purge_expired_logs_at(
    log_dir: &Path,
    retention_days: usize,
    now: SystemTime,
) -> RetentionSweep {
    let window = Duration::from_secs((retention_days as u64).saturating_mul(24 * 60 * 60));
    let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);

    let mut sweep = RetentionSweep::default();
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) => {
            sweep.failures.push((log_dir.to_path_buf(), err));
            return sweep;
        }
    };

    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let path = entry.path();
        let expired = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => {
                metadata.modified().map(|modified| modified <= cutoff)
            }
            Ok(_) => continue,
            Err(err) => Err(err),
        };
        match expired.and_then(|expired| {
            if expired {
                fs::remove_file(&path).map(|()| true)
            } else {
                Ok(false)
            }
        }) {
            Ok(true) => sweep.removed += 1,
            Ok(false) => {}
            Err(err) => sweep.failures.push((path, err)),
        }
    }

    sweep
}
