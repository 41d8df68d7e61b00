//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Widget player attaching widgets to the active slide of a target."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::{PlayAction, PlayOutcome, PlaySettings};
use crate::definitions::DefinitionArgs;
use crate::orchestrator::{RemoteOrchestrator, WidgetRequest};
use crate::types::SlideHandle;
use crate::Result;

/// Widget refreshed by [`WidgetPlayer::refresh_score`].
pub const SCORE_WIDGET: &str = "score_widget";

/// Attaches widgets to whatever slide is active; keeps no state of its own.
#[derive(Debug, Clone)]
pub struct WidgetPlayer {
    orchestrator: Arc<RemoteOrchestrator>,
}

impl WidgetPlayer {
    pub fn new(orchestrator: Arc<RemoteOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Attach every widget in `settings`, one request per target.
    ///
    /// Every target's widgets resolve before the first request is sent, so an
    /// unknown name on one target leaves the others untouched. Widgets cannot
    /// be removed individually; `remove` entries are skipped.
    pub async fn play(
        &self,
        settings: &PlaySettings,
        context: &str,
        calling_context: Option<&str>,
        priority: i32,
    ) -> Result<PlayOutcome> {
        let mut by_target: IndexMap<String, Vec<WidgetRequest>> = IndexMap::new();
        for (name, entry) in settings {
            if entry.action == PlayAction::Remove {
                warn!(context, widget = name.as_str(), "widgets have no remove path; entry skipped");
                continue;
            }
            by_target
                .entry(entry.target().to_owned())
                .or_default()
                .push(WidgetRequest::new(name.clone(), entry.params.clone()));
        }
        if by_target.is_empty() {
            return Ok(PlayOutcome::default());
        }

        debug!(
            context,
            calling_context,
            priority,
            targets = by_target.len(),
            "widget player attach"
        );
        let attached = self.orchestrator.attach_widgets_by_target(&by_target).await?;
        Ok(PlayOutcome {
            attached,
            ..PlayOutcome::default()
        })
    }

    /// Push a new score to the active slide of `target` as `score_widget`.
    ///
    /// The definition receives the raw `value` and the display string under
    /// `score`.
    pub async fn refresh_score(&self, value: i64, target: &str) -> Result<SlideHandle> {
        let mut args = DefinitionArgs::new();
        args.insert("value".into(), Value::from(value));
        args.insert("score".into(), Value::from(format_score(value)));
        debug!(value, display = target, "score refresh");
        self.orchestrator
            .attach_widgets_to_active_slide(&[WidgetRequest::new(SCORE_WIDGET, args)], target)
            .await
    }
}

/// Group thousands with commas and zero-pad to two characters.
pub fn format_score(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if value < 0 {
        grouped.insert(0, '-');
    }
    format!("{grouped:0>2}")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dmc_schemas::{widget, LabelWidget, SlideAddRequest, Widget};

    use super::*;
    use crate::cache::ResourceCache;
    use crate::definitions::{DefinitionArgs, FnDefinitions};
    use crate::players::ResourceSettings;
    use crate::registry::InstanceRegistry;
    use crate::transport::{InMemoryTransport, RemoteClient, RpcCall};
    use crate::types::RpcOperation;
    use crate::DmcError;

    fn orchestrator(transport: &InMemoryTransport) -> Arc<RemoteOrchestrator> {
        let definitions = Arc::new(
            FnDefinitions::new()
                .with_slide("score", |_| SlideAddRequest::default())
                .with_widget("ball", |_| Widget::default())
                .with_widget("player", |_| Widget::default())
                .with_widget(SCORE_WIDGET, |args| Widget {
                    kind: Some(widget::Kind::Label(LabelWidget {
                        text: args
                            .get("score")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned(),
                        ..LabelWidget::default()
                    })),
                    ..Widget::default()
                }),
        );
        let remote = RemoteClient::new(
            Arc::new(transport.clone()),
            Duration::from_secs(1),
            None,
        );
        let cache = ResourceCache::new(definitions.clone(), definitions, remote.clone());
        Arc::new(RemoteOrchestrator::new(
            cache,
            remote,
            Arc::new(InstanceRegistry::new()),
            ["default", "backbox"],
        ))
    }

    fn widgets() -> PlaySettings {
        let mut settings = PlaySettings::new();
        settings.insert("ball".into(), ResourceSettings::default());
        settings.insert("player".into(), ResourceSettings::default());
        settings.insert("ghost".into(), ResourceSettings::new(PlayAction::Remove));
        settings
    }

    #[tokio::test]
    async fn attaches_to_the_active_slide() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let slide = orchestrator
            .add_and_show_slide("score", "game", "default", &DefinitionArgs::new())
            .await
            .unwrap();

        let outcome = WidgetPlayer::new(orchestrator)
            .play(&widgets(), "game", None, 0)
            .await
            .unwrap();
        assert_eq!(outcome.attached, vec![slide.clone()]);

        let last = transport.calls().pop();
        match last {
            Some(RpcCall::AddWidgets(request)) => {
                assert_eq!(request.slide_id, slide.slide_id());
                assert_eq!(request.widgets.len(), 2);
            }
            other => panic!("unexpected last call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fails_without_an_active_slide() {
        let transport = InMemoryTransport::new();
        let err = WidgetPlayer::new(orchestrator(&transport))
            .play(&widgets(), "game", None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DmcError::StateInconsistency(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn resolves_every_target_before_attaching() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        for target in ["default", "backbox"] {
            orchestrator
                .add_and_show_slide("score", "game", target, &DefinitionArgs::new())
                .await
                .unwrap();
        }

        let mut settings = PlaySettings::new();
        settings.insert("ball".into(), ResourceSettings::default());
        settings.insert(
            "confetti".into(),
            ResourceSettings::default().on_target("backbox"),
        );
        let err = WidgetPlayer::new(orchestrator.clone())
            .play(&settings, "game", None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DmcError::NotFound { .. }));
        assert_eq!(transport.count(RpcOperation::AttachWidgets), 0);

        settings.shift_remove("confetti");
        settings.insert(
            "player".into(),
            ResourceSettings::default().on_target("backbox"),
        );
        let outcome = WidgetPlayer::new(orchestrator)
            .play(&settings, "game", None, 0)
            .await
            .unwrap();
        assert_eq!(outcome.attached.len(), 2);
        assert_eq!(transport.count(RpcOperation::AttachWidgets), 2);
    }

    #[tokio::test]
    async fn score_refresh_renders_grouped_digits() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let slide = orchestrator
            .add_and_show_slide("score", "game", "default", &DefinitionArgs::new())
            .await
            .unwrap();

        let attached = WidgetPlayer::new(orchestrator)
            .refresh_score(1_234_567, "default")
            .await
            .unwrap();
        assert_eq!(attached, slide);
        match transport.calls().pop() {
            Some(RpcCall::AddWidgets(request)) => match &request.widgets[0].kind {
                Some(widget::Kind::Label(label)) => assert_eq!(label.text, "1,234,567"),
                other => panic!("unexpected widget: {other:?}"),
            },
            other => panic!("unexpected last call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn score_refresh_needs_an_active_slide() {
        let transport = InMemoryTransport::new();
        let err = WidgetPlayer::new(orchestrator(&transport))
            .refresh_score(10, "backbox")
            .await
            .unwrap_err();
        assert!(matches!(err, DmcError::StateInconsistency(_)));
    }

    #[test]
    fn scores_are_padded_and_grouped() {
        assert_eq!(format_score(0), "00");
        assert_eq!(format_score(5), "05");
        assert_eq!(format_score(42), "42");
        assert_eq!(format_score(1000), "1,000");
        assert_eq!(format_score(987_654_321), "987,654,321");
        assert_eq!(format_score(-1500), "-1,500");
    }
}
