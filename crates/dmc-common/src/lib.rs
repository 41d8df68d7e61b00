//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Shared primitives and utilities for the media controller client."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
//! Shared primitives for the DMC workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the core library and the CLI.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, LabelConfig, LineConfig, LoadedAppConfig, LoggingConfig, MediaConfig,
    MetricsConfig, RectangleConfig, RpcConfig, SlideDefinitionConfig, WidgetDefinitionConfig,
    DEFAULT_TARGET,
};
pub use logging::{filter_from, init_tracing, LogFormat, TracingGuard};
