//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Wiring of transport, definitions, orchestrator, and players into one controller."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use dmc_common::{AppConfig, DEFAULT_TARGET};
use tracing::info;

use crate::cache::ResourceCache;
use crate::definitions::{ConfigDefinitions, SlideDefinitions, WidgetDefinitions};
use crate::grpc::GrpcTransport;
use crate::metrics::RpcMetrics;
use crate::orchestrator::RemoteOrchestrator;
use crate::players::{SlidePlayer, WidgetPlayer};
use crate::registry::InstanceRegistry;
use crate::transport::{MediaControllerTransport, RemoteClient};
use crate::{DmcError, Result};

/// Builder for [`DirectMediaController`].
pub struct ControllerBuilder {
    transport: Arc<dyn MediaControllerTransport>,
    slide_definitions: Option<Arc<dyn SlideDefinitions>>,
    widget_definitions: Option<Arc<dyn WidgetDefinitions>>,
    metrics: Option<RpcMetrics>,
    timeout: Duration,
    targets: Vec<String>,
    strict_removal: bool,
}

impl ControllerBuilder {
    pub fn new(transport: Arc<dyn MediaControllerTransport>) -> Self {
        Self {
            transport,
            slide_definitions: None,
            widget_definitions: None,
            metrics: None,
            timeout: Duration::from_millis(5000),
            targets: vec![DEFAULT_TARGET.to_owned()],
            strict_removal: false,
        }
    }

    /// Take timeout, targets, removal mode and definitions from `config`.
    pub fn with_config(self, config: &AppConfig) -> Self {
        let definitions = Arc::new(ConfigDefinitions::from_config(config));
        self.definitions(definitions)
            .timeout(config.rpc.timeout)
            .targets(config.targets.iter().cloned())
            .strict_removal(config.strict_removal)
    }

    /// Use one value for both slide and widget lookups.
    pub fn definitions<D>(self, definitions: Arc<D>) -> Self
    where
        D: SlideDefinitions + WidgetDefinitions + 'static,
    {
        self.slide_definitions(definitions.clone())
            .widget_definitions(definitions)
    }

    pub fn slide_definitions(mut self, definitions: Arc<dyn SlideDefinitions>) -> Self {
        self.slide_definitions = Some(definitions);
        self
    }

    pub fn widget_definitions(mut self, definitions: Arc<dyn WidgetDefinitions>) -> Self {
        self.widget_definitions = Some(definitions);
        self
    }

    pub fn metrics(mut self, metrics: RpcMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn strict_removal(mut self, strict: bool) -> Self {
        self.strict_removal = strict;
        self
    }

    pub fn build(self) -> Result<DirectMediaController> {
        let slide_definitions = self.slide_definitions.ok_or_else(|| DmcError::Definition {
            name: "slides".into(),
            reason: "no slide definitions configured".into(),
        })?;
        let widget_definitions = self.widget_definitions.ok_or_else(|| DmcError::Definition {
            name: "widgets".into(),
            reason: "no widget definitions configured".into(),
        })?;
        if !self.targets.iter().any(|target| target == DEFAULT_TARGET) {
            return Err(DmcError::StateInconsistency(format!(
                "target '{}' must be configured",
                DEFAULT_TARGET
            )));
        }

        let remote = RemoteClient::new(self.transport, self.timeout, self.metrics);
        let registry = Arc::new(InstanceRegistry::new());
        let cache = ResourceCache::new(slide_definitions, widget_definitions, remote.clone());
        let orchestrator = Arc::new(RemoteOrchestrator::new(
            cache,
            remote.clone(),
            registry.clone(),
            self.targets.iter().cloned(),
        ));
        info!(
            transport = remote.transport_name(),
            targets = ?self.targets,
            strict_removal = self.strict_removal,
            "media controller client ready"
        );
        Ok(DirectMediaController {
            slides: SlidePlayer::new(orchestrator.clone(), registry.clone(), self.strict_removal),
            widgets: WidgetPlayer::new(orchestrator.clone()),
            orchestrator,
            registry,
        })
    }
}

/// Entry point for hosts: the slide and widget players sharing one
/// orchestrator and one instance registry.
#[derive(Debug, Clone)]
pub struct DirectMediaController {
    slides: SlidePlayer,
    widgets: WidgetPlayer,
    orchestrator: Arc<RemoteOrchestrator>,
    registry: Arc<InstanceRegistry>,
}

impl DirectMediaController {
    pub fn builder(transport: Arc<dyn MediaControllerTransport>) -> ControllerBuilder {
        ControllerBuilder::new(transport)
    }

    /// Connect over gRPC using `config` for endpoint, timeouts and definitions.
    pub async fn connect(config: &AppConfig, metrics: Option<RpcMetrics>) -> Result<Self> {
        let transport =
            GrpcTransport::connect(&config.endpoint, config.rpc.connect_timeout).await?;
        let mut builder = ControllerBuilder::new(Arc::new(transport)).with_config(config);
        if let Some(metrics) = metrics {
            builder = builder.metrics(metrics);
        }
        builder.build()
    }

    pub fn slide_player(&self) -> &SlidePlayer {
        &self.slides
    }

    pub fn widget_player(&self) -> &WidgetPlayer {
        &self.widgets
    }

    pub fn orchestrator(&self) -> &Arc<RemoteOrchestrator> {
        &self.orchestrator
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::FnDefinitions;
    use crate::transport::InMemoryTransport;

    #[test]
    fn build_requires_definitions_and_default_target() {
        let transport = Arc::new(InMemoryTransport::new());
        assert!(matches!(
            ControllerBuilder::new(transport.clone()).build(),
            Err(DmcError::Definition { .. })
        ));
        assert!(matches!(
            ControllerBuilder::new(transport)
                .definitions(Arc::new(FnDefinitions::new()))
                .targets(["backbox"])
                .build(),
            Err(DmcError::StateInconsistency(_))
        ));
    }

    #[tokio::test]
    async fn config_declares_targets() {
        let config: AppConfig = r#"
            targets = ["default", "backbox"]
            [slides.intro]
            widgets = []
        "#
        .parse()
        .expect("config parses");
        let controller = ControllerBuilder::new(Arc::new(InMemoryTransport::new()))
            .with_config(&config)
            .build()
            .expect("controller builds");
        assert!(controller.orchestrator().has_target("backbox").await);
        assert!(!controller.orchestrator().has_target("topper").await);
    }
}
