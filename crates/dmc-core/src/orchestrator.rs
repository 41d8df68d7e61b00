//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Remote orchestration of slide creation, display, removal, and widget attachment."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::sync::Arc;

use dmc_schemas::WidgetAddRequest;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::ResourceCache;
use crate::definitions::DefinitionArgs;
use crate::registry::InstanceRegistry;
use crate::transport::RemoteClient;
use crate::types::{ResourceKind, SlideHandle};
use crate::{DmcError, Result};

/// A widget to attach, with the parameters for its definition lookup.
#[derive(Debug, Clone, Default)]
pub struct WidgetRequest {
    pub name: String,
    pub args: DefinitionArgs,
}

impl WidgetRequest {
    pub fn new(name: impl Into<String>, args: DefinitionArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, DefinitionArgs::new())
    }
}

#[derive(Debug, Default)]
struct TargetState {
    slides: IndexMap<String, SlideHandle>,
}

#[derive(Debug)]
struct SceneState {
    cache: ResourceCache,
    targets: IndexMap<String, TargetState>,
}

impl SceneState {
    fn active_on(&self, target: &str) -> Result<SlideHandle> {
        if !self.targets.contains_key(target) {
            return Err(DmcError::StateInconsistency(format!(
                "unknown target '{}'",
                target
            )));
        }
        self.cache.active(target).cloned().ok_or_else(|| {
            DmcError::StateInconsistency(format!("no active slide on target '{}'", target))
        })
    }

    fn target_mut(&mut self, target: &str) -> Result<&mut TargetState> {
        self.targets
            .get_mut(target)
            .ok_or_else(|| DmcError::StateInconsistency(format!("unknown target '{}'", target)))
    }
}

/// Sole owner of the slide cache and per-target state.
///
/// Every operation holds the scene lock for its whole RPC sequence, so calls
/// from different contexts are applied one at a time and in arrival order.
#[derive(Debug)]
pub struct RemoteOrchestrator {
    scene: Mutex<SceneState>,
    remote: RemoteClient,
    registry: Arc<InstanceRegistry>,
}

impl RemoteOrchestrator {
    pub fn new<I, S>(
        cache: ResourceCache,
        remote: RemoteClient,
        registry: Arc<InstanceRegistry>,
        targets: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = targets
            .into_iter()
            .map(|target| (target.into(), TargetState::default()))
            .collect();
        Self {
            scene: Mutex::new(SceneState { cache, targets }),
            remote,
            registry,
        }
    }

    /// Create the slide if it is not cached, then show it on `target`.
    ///
    /// A show RPC is issued on every call. Once the slide exists remotely it
    /// is tracked on `target` and recorded for `context`, even when the show
    /// fails, so the context's teardown can still remove it.
    pub async fn add_and_show_slide(
        &self,
        name: &str,
        context: &str,
        target: &str,
        args: &DefinitionArgs,
    ) -> Result<SlideHandle> {
        let mut guard = self.scene.lock().await;
        let scene = &mut *guard;
        scene.target_mut(target)?;
        let handle = scene.cache.resolve_or_create_slide(name, args).await?;
        scene
            .target_mut(target)?
            .slides
            .insert(name.to_owned(), handle.clone());
        self.registry.record(
            context,
            ResourceKind::Slide,
            target,
            name,
            handle.clone().into(),
        );

        if let Err(err) = self.remote.show_slide(&handle).await {
            warn!(
                context,
                display = target,
                slide = name,
                slide_id = handle.slide_id(),
                "slide created but not shown; kept for teardown"
            );
            return Err(err);
        }
        scene.cache.set_active(target, handle.clone());
        info!(
            context,
            display = target,
            slide = name,
            slide_id = handle.slide_id(),
            "slide shown"
        );
        Ok(handle)
    }

    /// Showing and adding-then-showing are the same operation.
    pub async fn show_slide(
        &self,
        name: &str,
        context: &str,
        target: &str,
        args: &DefinitionArgs,
    ) -> Result<SlideHandle> {
        self.add_and_show_slide(name, context, target, args).await
    }

    /// Remove a slide the target has shown.
    ///
    /// Returns `false` without any RPC when the target never showed `name`.
    /// After a confirmed removal the slide is evicted from the cache, every
    /// target, the active pointers, and every registry context.
    pub async fn remove_slide(&self, name: &str, target: &str) -> Result<bool> {
        let mut guard = self.scene.lock().await;
        let scene = &mut *guard;
        let Some(handle) = scene.target_mut(target)?.slides.get(name).cloned() else {
            debug!(display = target, slide = name, "slide not present on target; nothing to remove");
            return Ok(false);
        };

        self.remote.remove_slide(&handle).await?;

        let slide_id = handle.slide_id();
        scene.cache.evict(name);
        scene.cache.clear_active(slide_id);
        for state in scene.targets.values_mut() {
            state.slides.retain(|_, shown| shown.slide_id() != slide_id);
        }
        let purged = self.registry.purge_slide(slide_id);
        info!(display = target, slide = name, slide_id, purged, "slide removed");
        Ok(true)
    }

    /// Resolve every widget, then attach them all in one request.
    ///
    /// Any unresolvable widget fails the call before an RPC is sent.
    pub async fn attach_widgets_to_slide(
        &self,
        widgets: &[WidgetRequest],
        slide: &SlideHandle,
    ) -> Result<()> {
        let guard = self.scene.lock().await;
        self.attach_locked(&guard, widgets, slide).await
    }

    /// Attach widgets to whatever slide is active on `target`.
    pub async fn attach_widgets_to_active_slide(
        &self,
        widgets: &[WidgetRequest],
        target: &str,
    ) -> Result<SlideHandle> {
        let guard = self.scene.lock().await;
        let slide = guard.active_on(target)?;
        self.attach_locked(&guard, widgets, &slide).await?;
        Ok(slide)
    }

    /// Attach each group of widgets to the active slide of its target.
    ///
    /// Every target and widget is resolved before the first RPC, so a bad
    /// entry in any group leaves every target untouched.
    pub async fn attach_widgets_by_target(
        &self,
        groups: &IndexMap<String, Vec<WidgetRequest>>,
    ) -> Result<Vec<SlideHandle>> {
        let guard = self.scene.lock().await;
        let mut requests = Vec::with_capacity(groups.len());
        for (target, widgets) in groups {
            let slide = guard.active_on(target)?;
            let request = Self::resolve_widgets(&guard, widgets, &slide)?;
            requests.push((slide, request, widgets.len()));
        }

        let mut attached = Vec::with_capacity(requests.len());
        for (slide, request, count) in requests {
            self.send_widgets(request, &slide, count).await?;
            attached.push(slide);
        }
        Ok(attached)
    }

    async fn attach_locked(
        &self,
        scene: &SceneState,
        widgets: &[WidgetRequest],
        slide: &SlideHandle,
    ) -> Result<()> {
        let request = Self::resolve_widgets(scene, widgets, slide)?;
        self.send_widgets(request, slide, widgets.len()).await
    }

    fn resolve_widgets(
        scene: &SceneState,
        widgets: &[WidgetRequest],
        slide: &SlideHandle,
    ) -> Result<WidgetAddRequest> {
        let payloads = widgets
            .iter()
            .map(|widget| {
                scene
                    .cache
                    .resolve_widget(&widget.name, &widget.args)
                    .map(|handle| handle.payload)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(WidgetAddRequest {
            slide_id: slide.slide_id(),
            widgets: payloads,
        })
    }

    async fn send_widgets(
        &self,
        request: WidgetAddRequest,
        slide: &SlideHandle,
        count: usize,
    ) -> Result<()> {
        self.remote.add_widgets(request).await?;
        info!(
            slide = slide.name(),
            slide_id = slide.slide_id(),
            widgets = count,
            "widgets attached"
        );
        Ok(())
    }

    pub async fn active_slide(&self, target: &str) -> Option<SlideHandle> {
        self.scene.lock().await.cache.active(target).cloned()
    }

    /// Handle `target` has shown under `name`, if still live.
    pub async fn target_slide(&self, target: &str, name: &str) -> Option<SlideHandle> {
        let scene = self.scene.lock().await;
        scene.targets.get(target)?.slides.get(name).cloned()
    }

    pub async fn cached_slide(&self, name: &str) -> Option<SlideHandle> {
        self.scene.lock().await.cache.get(name).cloned()
    }

    pub async fn has_target(&self, target: &str) -> bool {
        self.scene.lock().await.targets.contains_key(target)
    }

    pub fn registry(&self) -> Arc<InstanceRegistry> {
        self.registry.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dmc_schemas::{widget, LabelWidget, SlideAddRequest, Widget};
    use serde_json::Value;

    use super::*;
    use crate::definitions::FnDefinitions;
    use crate::transport::{InMemoryTransport, RpcCall};
    use crate::types::{ResourceKind, RpcOperation};

    fn orchestrator(transport: &InMemoryTransport) -> RemoteOrchestrator {
        let definitions = Arc::new(
            FnDefinitions::new()
                .with_slide("intro", |_| SlideAddRequest::default())
                .with_slide("score", |_| SlideAddRequest::default())
                .with_widget("score_widget", |args| Widget {
                    kind: Some(widget::Kind::Label(LabelWidget {
                        text: args
                            .get("text")
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
        RemoteOrchestrator::new(
            cache,
            remote,
            Arc::new(InstanceRegistry::new()),
            ["default", "backbox"],
        )
    }

    #[tokio::test]
    async fn repeated_show_creates_once_and_shows_each_time() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let args = DefinitionArgs::new();

        let first = orchestrator
            .add_and_show_slide("intro", "attract", "default", &args)
            .await
            .unwrap();
        let second = orchestrator
            .show_slide("intro", "attract", "default", &args)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.count(RpcOperation::CreateSlide), 1);
        assert_eq!(transport.count(RpcOperation::ShowSlide), 2);
        assert_eq!(orchestrator.active_slide("default").await, Some(first));
    }

    #[tokio::test]
    async fn remove_evicts_everywhere_and_recreates_later() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let args = DefinitionArgs::new();
        let handle = orchestrator
            .add_and_show_slide("intro", "attract", "default", &args)
            .await
            .unwrap();
        assert_eq!(
            orchestrator
                .registry()
                .lookup("attract", ResourceKind::Slide, "default", "intro"),
            Some(handle.clone().into())
        );

        assert!(orchestrator.remove_slide("intro", "default").await.unwrap());
        assert!(orchestrator.cached_slide("intro").await.is_none());
        assert!(orchestrator.target_slide("default", "intro").await.is_none());
        assert!(orchestrator.active_slide("default").await.is_none());
        assert!(orchestrator
            .registry()
            .entries("attract", ResourceKind::Slide)
            .is_empty());

        let again = orchestrator
            .add_and_show_slide("intro", "attract", "default", &args)
            .await
            .unwrap();
        assert_ne!(again, handle);
        assert_eq!(transport.count(RpcOperation::CreateSlide), 2);
    }

    #[tokio::test]
    async fn remove_of_unknown_slide_is_a_no_op() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        assert!(!orchestrator.remove_slide("intro", "default").await.unwrap());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_remove_keeps_local_state() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let handle = orchestrator
            .add_and_show_slide("intro", "attract", "default", &DefinitionArgs::new())
            .await
            .unwrap();
        transport.fail_operation(RpcOperation::RemoveSlide);

        assert!(orchestrator.remove_slide("intro", "default").await.is_err());
        assert_eq!(orchestrator.cached_slide("intro").await, Some(handle.clone()));
        assert_eq!(orchestrator.active_slide("default").await, Some(handle));
    }

    #[tokio::test]
    async fn unknown_target_is_rejected_before_any_rpc() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let err = orchestrator
            .add_and_show_slide("intro", "attract", "topper", &DefinitionArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DmcError::StateInconsistency(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn attach_batches_all_widgets_into_one_request() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let slide = orchestrator
            .add_and_show_slide("score", "game", "default", &DefinitionArgs::new())
            .await
            .unwrap();
        let mut args = DefinitionArgs::new();
        args.insert("text".into(), Value::from("00"));
        let widgets = [
            WidgetRequest::new("score_widget", args),
            WidgetRequest::named("score_widget"),
        ];

        orchestrator
            .attach_widgets_to_slide(&widgets, &slide)
            .await
            .unwrap();

        let attach: Vec<_> = transport
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RpcCall::AddWidgets(request) => Some(request),
                _ => None,
            })
            .collect();
        assert_eq!(attach.len(), 1);
        assert_eq!(attach[0].slide_id, slide.slide_id());
        assert_eq!(attach[0].widgets.len(), 2);
    }

    #[tokio::test]
    async fn attach_with_unknown_widget_sends_nothing() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        orchestrator
            .add_and_show_slide("score", "game", "default", &DefinitionArgs::new())
            .await
            .unwrap();
        let before = transport.calls().len();

        let err = orchestrator
            .attach_widgets_to_active_slide(
                &[
                    WidgetRequest::named("score_widget"),
                    WidgetRequest::named("missing"),
                ],
                "default",
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DmcError::NotFound {
                kind: ResourceKind::Widget,
                ..
            }
        ));
        assert_eq!(transport.calls().len(), before);
    }

    #[tokio::test]
    async fn attach_to_active_requires_an_active_slide() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let err = orchestrator
            .attach_widgets_to_active_slide(&[WidgetRequest::named("score_widget")], "backbox")
            .await
            .unwrap_err();
        assert!(matches!(err, DmcError::StateInconsistency(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_show_keeps_the_created_slide_owned() {
        let transport = InMemoryTransport::new();
        transport.fail_operation(RpcOperation::ShowSlide);
        let orchestrator = orchestrator(&transport);

        let err = orchestrator
            .add_and_show_slide("intro", "attract", "default", &DefinitionArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DmcError::Transport {
                operation: RpcOperation::ShowSlide,
                ..
            }
        ));
        assert!(orchestrator.active_slide("default").await.is_none());
        let stranded = orchestrator
            .target_slide("default", "intro")
            .await
            .expect("created slide tracked on target");
        assert_eq!(
            orchestrator
                .registry()
                .lookup("attract", ResourceKind::Slide, "default", "intro"),
            Some(stranded.into())
        );

        transport.clear_failures();
        assert!(orchestrator.remove_slide("intro", "default").await.unwrap());
        assert!(transport.live_slides().is_empty());
    }

    #[tokio::test]
    async fn grouped_attach_resolves_every_target_first() {
        let transport = InMemoryTransport::new();
        let orchestrator = orchestrator(&transport);
        let args = DefinitionArgs::new();
        orchestrator
            .add_and_show_slide("score", "game", "default", &args)
            .await
            .unwrap();
        orchestrator
            .add_and_show_slide("intro", "game", "backbox", &args)
            .await
            .unwrap();

        let mut groups = IndexMap::new();
        groups.insert("default".to_owned(), vec![WidgetRequest::named("score_widget")]);
        groups.insert("backbox".to_owned(), vec![WidgetRequest::named("missing")]);
        let err = orchestrator
            .attach_widgets_by_target(&groups)
            .await
            .unwrap_err();
        assert!(matches!(err, DmcError::NotFound { .. }));
        assert_eq!(transport.count(RpcOperation::AttachWidgets), 0);

        groups.insert("backbox".to_owned(), vec![WidgetRequest::named("score_widget")]);
        let attached = orchestrator.attach_widgets_by_target(&groups).await.unwrap();
        let names: Vec<_> = attached.iter().map(SlideHandle::name).collect();
        assert_eq!(names, vec!["score", "intro"]);
        assert_eq!(transport.count(RpcOperation::AttachWidgets), 2);
    }
}
