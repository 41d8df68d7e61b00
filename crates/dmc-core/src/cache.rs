//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Process-wide cache of remote slides and active slide pointers."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::definitions::{DefinitionArgs, SlideDefinitions, WidgetDefinitions};
use crate::transport::RemoteClient;
use crate::types::{SlideHandle, WidgetHandle};
use crate::Result;

/// Name-keyed cache of slides that exist on the media controller.
///
/// Not synchronised on its own; the orchestrator owns it behind a lock.
pub struct ResourceCache {
    slide_definitions: Arc<dyn SlideDefinitions>,
    widget_definitions: Arc<dyn WidgetDefinitions>,
    remote: RemoteClient,
    slides: IndexMap<String, SlideHandle>,
    active: HashMap<String, SlideHandle>,
}

impl ResourceCache {
    pub fn new(
        slide_definitions: Arc<dyn SlideDefinitions>,
        widget_definitions: Arc<dyn WidgetDefinitions>,
        remote: RemoteClient,
    ) -> Self {
        Self {
            slide_definitions,
            widget_definitions,
            remote,
            slides: IndexMap::new(),
            active: HashMap::new(),
        }
    }

    /// Return the cached slide or create it remotely.
    ///
    /// A definition lookup failure issues no RPC. A failed create leaves the
    /// cache untouched.
    pub async fn resolve_or_create_slide(
        &mut self,
        name: &str,
        args: &DefinitionArgs,
    ) -> Result<SlideHandle> {
        if let Some(handle) = self.slides.get(name) {
            debug!(slide = name, slide_id = handle.slide_id(), "slide cache hit");
            return Ok(handle.clone());
        }
        let request = self.slide_definitions.resolve(name, args)?;
        let handle = self.remote.create_slide(name, request).await?;
        self.slides.insert(name.to_owned(), handle.clone());
        Ok(handle)
    }

    /// Build a fresh widget payload; widgets are never cached.
    pub fn resolve_widget(&self, name: &str, args: &DefinitionArgs) -> Result<WidgetHandle> {
        let payload = self.widget_definitions.resolve(name, args)?;
        Ok(WidgetHandle::new(name, payload))
    }

    pub fn get(&self, name: &str) -> Option<&SlideHandle> {
        self.slides.get(name)
    }

    /// Drop a slide after its remote removal was confirmed.
    pub fn evict(&mut self, name: &str) -> Option<SlideHandle> {
        let evicted = self.slides.shift_remove(name);
        if let Some(handle) = &evicted {
            debug!(slide = name, slide_id = handle.slide_id(), "slide evicted from cache");
        }
        evicted
    }

    pub fn set_active(&mut self, target: &str, handle: SlideHandle) {
        self.active.insert(target.to_owned(), handle);
    }

    pub fn active(&self, target: &str) -> Option<&SlideHandle> {
        self.active.get(target)
    }

    /// Clear every target whose active slide is `slide_id`.
    pub fn clear_active(&mut self, slide_id: u64) {
        self.active.retain(|_, handle| handle.slide_id() != slide_id);
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("slides", &self.slides)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
