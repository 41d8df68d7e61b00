//! ---
//! dmc_section: "03-persistence-logging"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Metrics collection for media controller RPCs."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use prometheus::{self, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::types::RpcOperation;

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Render every registered family in the prometheus text format.
pub fn encode_text(registry: &Registry) -> prometheus::Result<String> {
    TextEncoder::new().encode_to_string(&registry.gather())
}

/// Counters and latency histogram for RPCs issued to the media controller.
#[derive(Clone)]
pub struct RpcMetrics {
    registry: SharedRegistry,
    calls_total: IntCounterVec,
    latency_seconds: HistogramVec,
}

impl RpcMetrics {
    /// Register the RPC metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> prometheus::Result<Self> {
        let calls_total = IntCounterVec::new(
            Opts::new(
                "dmc_rpc_calls_total",
                "Media controller RPCs issued, by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "dmc_rpc_latency_seconds",
            "Round-trip time of media controller RPCs",
        )
        .buckets(prometheus::exponential_buckets(0.0005, 2.0, 16)?);
        let latency_seconds = HistogramVec::new(histogram_opts, &["operation"])?;
        registry.register(Box::new(latency_seconds.clone()))?;

        Ok(Self {
            registry,
            calls_total,
            latency_seconds,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Record one completed (or failed) call.
    pub fn observe(&self, operation: RpcOperation, success: bool, elapsed: Duration) {
        let outcome = if success { "success" } else { "failure" };
        self.calls_total
            .with_label_values(&[operation.as_str(), outcome])
            .inc();
        self.latency_seconds
            .with_label_values(&[operation.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn calls(&self, operation: RpcOperation, success: bool) -> u64 {
        let outcome = if success { "success" } else { "failure" };
        self.calls_total
            .with_label_values(&[operation.as_str(), outcome])
            .get()
    }
}

impl std::fmt::Debug for RpcMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcMetrics").finish_non_exhaustive()
    }
}
