//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Context-scoped slide player with best-effort teardown."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{PlayAction, PlayOutcome, PlaySettings, TeardownFailure, TeardownReport};
use crate::orchestrator::RemoteOrchestrator;
use crate::registry::InstanceRegistry;
use crate::types::ResourceKind;
use crate::{DmcError, Result};

/// Shows and removes slides on behalf of host contexts.
///
/// The orchestrator records every slide a context shows against it, so a
/// context can only remove what it showed and its teardown removes exactly
/// that.
#[derive(Debug, Clone)]
pub struct SlidePlayer {
    orchestrator: Arc<RemoteOrchestrator>,
    registry: Arc<InstanceRegistry>,
    strict_removal: bool,
}

impl SlidePlayer {
    pub fn new(
        orchestrator: Arc<RemoteOrchestrator>,
        registry: Arc<InstanceRegistry>,
        strict_removal: bool,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            strict_removal,
        }
    }

    /// Apply `settings` in order on behalf of `context`.
    ///
    /// Stops at the first failing entry; entries already applied stay applied.
    pub async fn play(
        &self,
        settings: &PlaySettings,
        context: &str,
        calling_context: Option<&str>,
        priority: i32,
    ) -> Result<PlayOutcome> {
        let mut outcome = PlayOutcome::default();
        for (name, entry) in settings {
            let target = entry.target();
            debug!(
                context,
                calling_context,
                priority,
                slide = name.as_str(),
                display = target,
                action = ?entry.action,
                "slide player entry"
            );
            match entry.action {
                PlayAction::Play | PlayAction::Show => {
                    let handle = self
                        .orchestrator
                        .add_and_show_slide(name, context, target, &entry.params)
                        .await?;
                    outcome.shown.push(handle);
                }
                PlayAction::Remove => {
                    if self.remove(context, target, name).await? {
                        outcome.removed.push(name.clone());
                    }
                }
            }
        }
        Ok(outcome)
    }

    async fn remove(&self, context: &str, target: &str, name: &str) -> Result<bool> {
        if !self.orchestrator.has_target(target).await {
            return Err(DmcError::StateInconsistency(format!(
                "unknown target '{}'",
                target
            )));
        }
        if self
            .registry
            .lookup(context, ResourceKind::Slide, target, name)
            .is_none()
        {
            if self.strict_removal {
                return Err(DmcError::StateInconsistency(format!(
                    "slide '{}' on target '{}' was not shown by context '{}'",
                    name, target, context
                )));
            }
            debug!(context, slide = name, display = target, "remove of unrecorded slide ignored");
            return Ok(false);
        }
        let removed = self.orchestrator.remove_slide(name, target).await?;
        self.registry
            .forget(context, ResourceKind::Slide, target, name);
        Ok(removed)
    }

    /// Remove every slide `context` recorded, then drop the context.
    ///
    /// Failures are collected rather than returned; the context is cleared
    /// either way.
    pub async fn clear_context(&self, context: &str) -> TeardownReport {
        let mut report = TeardownReport::default();
        for entry in self.registry.entries(context, ResourceKind::Slide) {
            match self.orchestrator.remove_slide(&entry.name, &entry.target).await {
                Ok(true) => report.removed.push(entry.name),
                Ok(false) => {
                    debug!(context, slide = entry.name.as_str(), "slide already gone");
                }
                Err(error) => {
                    warn!(
                        context,
                        slide = entry.name.as_str(),
                        display = entry.target.as_str(),
                        %error,
                        "failed to remove slide during teardown"
                    );
                    report.failures.push(TeardownFailure {
                        target: entry.target,
                        name: entry.name,
                        error,
                    });
                }
            }
        }
        let dropped = self.registry.clear(context);
        info!(
            context,
            removed = report.removed.len(),
            failed = report.failures.len(),
            dropped,
            "context cleared"
        );
        report
    }
}
