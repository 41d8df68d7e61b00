//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Tracing setup for media controller clients."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppConfig;

pub const LOG_ENV: &str = "DMC_LOG";
/// tonic's transport stack is chatty at `info`.
pub const DEFAULT_DIRECTIVE: &str = "info,h2=warn,tower=warn,hyper=warn";

/// Console log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Keeps the non-blocking writers flushing; logs written after drop are lost.
#[must_use = "dropping the guard stops log output"]
#[derive(Debug)]
pub struct TracingGuard {
    _console: WorkerGuard,
    _file: Option<WorkerGuard>,
}

/// Build the filter from `DMC_LOG`, then `RUST_LOG`, then [`DEFAULT_DIRECTIVE`].
pub fn filter_from(dmc_log: Option<String>, rust_log: Option<String>) -> Result<EnvFilter> {
    match (dmc_log, rust_log) {
        (Some(directive), _) => EnvFilter::try_new(&directive)
            .with_context(|| format!("invalid {} directive '{}'", LOG_ENV, directive)),
        (None, Some(directive)) => EnvFilter::try_new(&directive)
            .with_context(|| format!("invalid RUST_LOG directive '{}'", directive)),
        (None, None) => Ok(EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

/// Install the global subscriber for `service`.
///
/// Console output goes to stderr in `logging.format` so stdout stays free for
/// command output. With `logging.file` set, a daily JSON log named
/// `<prefix>-<service>.log` is kept under `logging.directory`. If a subscriber
/// is already installed the existing one is kept.
pub fn init_tracing(service: &str, config: &AppConfig) -> Result<TracingGuard> {
    let logging = &config.logging;
    let filter = filter_from(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    )?;

    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    let console_layer = match logging.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(console_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(console_writer)
            .boxed(),
    };

    let (file_layer, file_guard) = if logging.file {
        std::fs::create_dir_all(&logging.directory).with_context(|| {
            format!("unable to create log directory {}", logging.directory.display())
        })?;
        let prefix = logging.file_prefix.as_deref().unwrap_or("dmc");
        let appender = daily(&logging.directory, format!("{}-{}.log", prefix, service));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(writer)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    if installed {
        info!(
            service,
            endpoint = %config.endpoint,
            targets = ?config.targets,
            log_file = logging.file,
            "tracing initialised"
        );
    } else {
        debug!(service, "subscriber already installed; keeping it");
    }

    Ok(TracingGuard {
        _console: console_guard,
        _file: file_guard,
    })
}
