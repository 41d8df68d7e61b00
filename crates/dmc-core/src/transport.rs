//! ---
//! dmc_section: "05-networking-external-interfaces"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Media controller transport abstraction and in-memory double."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dmc_schemas::{SlideAddRequest, WidgetAddRequest};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::metrics::RpcMetrics;
use crate::types::{RpcOperation, SlideHandle};
use crate::{DmcError, Result};

/// Request/response channel to a single media controller endpoint.
#[async_trait]
pub trait MediaControllerTransport: Send + Sync {
    /// Create a slide and return its server-assigned identifier.
    async fn add_slide(&self, request: SlideAddRequest) -> Result<u64>;
    async fn show_slide(&self, slide_id: u64) -> Result<()>;
    async fn remove_slide(&self, slide_id: u64) -> Result<()>;
    async fn add_widgets_to_slide(&self, request: WidgetAddRequest) -> Result<()>;
    /// Human-readable transport name for logging/metrics.
    fn name(&self) -> &'static str;
}

/// Issues RPCs through a transport with a per-call timeout, logging, and metrics.
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn MediaControllerTransport>,
    timeout: Duration,
    metrics: Option<RpcMetrics>,
}

impl RemoteClient {
    pub fn new(
        transport: Arc<dyn MediaControllerTransport>,
        timeout: Duration,
        metrics: Option<RpcMetrics>,
    ) -> Self {
        Self {
            transport,
            timeout,
            metrics,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub async fn create_slide(&self, name: &str, request: SlideAddRequest) -> Result<SlideHandle> {
        let slide_id = self
            .call(RpcOperation::CreateSlide, self.transport.add_slide(request))
            .await?;
        debug!(slide = name, slide_id, "slide created");
        Ok(SlideHandle::new(slide_id, name))
    }

    pub async fn show_slide(&self, slide: &SlideHandle) -> Result<()> {
        self.call(
            RpcOperation::ShowSlide,
            self.transport.show_slide(slide.slide_id()),
        )
        .await
    }

    pub async fn remove_slide(&self, slide: &SlideHandle) -> Result<()> {
        self.call(
            RpcOperation::RemoveSlide,
            self.transport.remove_slide(slide.slide_id()),
        )
        .await
    }

    pub async fn add_widgets(&self, request: WidgetAddRequest) -> Result<()> {
        self.call(
            RpcOperation::AttachWidgets,
            self.transport.add_widgets_to_slide(request),
        )
        .await
    }

    async fn call<T, F>(&self, operation: RpcOperation, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DmcError::transport(
                operation,
                format!("timed out after {}ms", self.timeout.as_millis()),
            )),
        };
        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.observe(operation, result.is_ok(), elapsed);
        }
        if let Err(err) = &result {
            warn!(%operation, transport = self.transport.name(), error = %err, "rpc failed");
        }
        result
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("transport", &self.transport.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A call observed by [`InMemoryTransport`], recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    AddSlide(SlideAddRequest),
    ShowSlide(u64),
    RemoveSlide(u64),
    AddWidgets(WidgetAddRequest),
}

impl RpcCall {
    pub fn operation(&self) -> RpcOperation {
        match self {
            RpcCall::AddSlide(_) => RpcOperation::CreateSlide,
            RpcCall::ShowSlide(_) => RpcOperation::ShowSlide,
            RpcCall::RemoveSlide(_) => RpcOperation::RemoveSlide,
            RpcCall::AddWidgets(_) => RpcOperation::AttachWidgets,
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    next_slide_id: u64,
    slides: BTreeSet<u64>,
    calls: Vec<RpcCall>,
    failing: HashSet<RpcOperation>,
    failing_slides: HashSet<u64>,
}

/// In-process media controller double backed by a mutex protected scene.
///
/// Mirrors the remote service: ids are assigned sequentially from 1, and
/// operations on unknown slide ids are rejected.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<InMemoryState>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call records itself and then fails for `operation`.
    pub fn fail_operation(&self, operation: RpcOperation) {
        self.state.lock().failing.insert(operation);
    }

    /// Show/remove/attach calls targeting `slide_id` fail.
    pub fn fail_slide(&self, slide_id: u64) {
        self.state.lock().failing_slides.insert(slide_id);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing.clear();
        state.failing_slides.clear();
    }

    /// Delay every call, used to exercise client timeouts.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, operation: RpcOperation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Slide ids the double currently believes exist.
    pub fn live_slides(&self) -> Vec<u64> {
        self.state.lock().slides.iter().copied().collect()
    }

    async fn pause(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(state: &InMemoryState, operation: RpcOperation, slide_id: Option<u64>) -> Result<()> {
        if state.failing.contains(&operation) {
            return Err(DmcError::transport(operation, "injected failure"));
        }
        if let Some(slide_id) = slide_id {
            if state.failing_slides.contains(&slide_id) {
                return Err(DmcError::transport(
                    operation,
                    format!("injected failure for slide {}", slide_id),
                ));
            }
            if !state.slides.contains(&slide_id) {
                return Err(DmcError::transport(
                    operation,
                    format!("could not find slide {}", slide_id),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MediaControllerTransport for InMemoryTransport {
    async fn add_slide(&self, request: SlideAddRequest) -> Result<u64> {
        self.pause().await;
        let mut state = self.state.lock();
        state.calls.push(RpcCall::AddSlide(request));
        Self::check(&state, RpcOperation::CreateSlide, None)?;
        state.next_slide_id += 1;
        let slide_id = state.next_slide_id;
        state.slides.insert(slide_id);
        Ok(slide_id)
    }

    async fn show_slide(&self, slide_id: u64) -> Result<()> {
        self.pause().await;
        let mut state = self.state.lock();
        state.calls.push(RpcCall::ShowSlide(slide_id));
        Self::check(&state, RpcOperation::ShowSlide, Some(slide_id))
    }

    async fn remove_slide(&self, slide_id: u64) -> Result<()> {
        self.pause().await;
        let mut state = self.state.lock();
        state.calls.push(RpcCall::RemoveSlide(slide_id));
        Self::check(&state, RpcOperation::RemoveSlide, Some(slide_id))?;
        state.slides.remove(&slide_id);
        Ok(())
    }

    async fn add_widgets_to_slide(&self, request: WidgetAddRequest) -> Result<()> {
        self.pause().await;
        let mut state = self.state.lock();
        let slide_id = request.slide_id;
        state.calls.push(RpcCall::AddWidgets(request));
        Self::check(&state, RpcOperation::AttachWidgets, Some(slide_id))
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
