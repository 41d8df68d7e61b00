//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Context-scoped ownership of live slide and widget instances."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::types::{InstanceHandle, ResourceKind};

/// `target -> name -> handle`, insertion ordered.
type TargetInstances = IndexMap<String, IndexMap<String, InstanceHandle>>;

#[derive(Debug, Default)]
struct RegistryInner {
    contexts: IndexMap<String, HashMap<ResourceKind, TargetInstances>>,
}

/// One live instance owned by a context.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub target: String,
    pub name: String,
    pub handle: InstanceHandle,
}

/// Ownership map `context -> kind -> target -> name -> handle`.
///
/// A `(context, kind, target, name)` tuple holds at most one handle;
/// recording it again replaces the previous one.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    inner: Mutex<RegistryInner>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handle` under the tuple, returning the handle it replaced.
    pub fn record(
        &self,
        context: &str,
        kind: ResourceKind,
        target: &str,
        name: &str,
        handle: InstanceHandle,
    ) -> Option<InstanceHandle> {
        let mut inner = self.inner.lock();
        let replaced = inner
            .contexts
            .entry(context.to_owned())
            .or_default()
            .entry(kind)
            .or_default()
            .entry(target.to_owned())
            .or_default()
            .insert(name.to_owned(), handle);
        if replaced.is_some() {
            debug!(context, %kind, display = target, instance = name, "registry entry replaced");
        }
        replaced
    }

    pub fn lookup(
        &self,
        context: &str,
        kind: ResourceKind,
        target: &str,
        name: &str,
    ) -> Option<InstanceHandle> {
        let inner = self.inner.lock();
        inner
            .contexts
            .get(context)?
            .get(&kind)?
            .get(target)?
            .get(name)
            .cloned()
    }

    /// Snapshot of every instance of `kind` owned by `context`.
    ///
    /// Names within one target keep their recording order.
    pub fn entries(&self, context: &str, kind: ResourceKind) -> Vec<RegistryEntry> {
        let inner = self.inner.lock();
        let Some(targets) = inner.contexts.get(context).and_then(|kinds| kinds.get(&kind)) else {
            return Vec::new();
        };
        targets
            .iter()
            .flat_map(|(target, names)| {
                names.iter().map(move |(name, handle)| RegistryEntry {
                    target: target.clone(),
                    name: name.clone(),
                    handle: handle.clone(),
                })
            })
            .collect()
    }

    /// Remove a single tuple, keyed by name.
    pub fn forget(
        &self,
        context: &str,
        kind: ResourceKind,
        target: &str,
        name: &str,
    ) -> Option<InstanceHandle> {
        let mut inner = self.inner.lock();
        inner
            .contexts
            .get_mut(context)?
            .get_mut(&kind)?
            .get_mut(target)?
            .shift_remove(name)
    }

    /// Remove the slide with `slide_id` from every context and target.
    pub fn purge_slide(&self, slide_id: u64) -> usize {
        let mut inner = self.inner.lock();
        let mut purged = 0;
        for kinds in inner.contexts.values_mut() {
            let Some(targets) = kinds.get_mut(&ResourceKind::Slide) else {
                continue;
            };
            for names in targets.values_mut() {
                let before = names.len();
                names.retain(|_, handle| {
                    handle
                        .as_slide()
                        .map_or(true, |slide| slide.slide_id() != slide_id)
                });
                purged += before - names.len();
            }
        }
        if purged > 0 {
            debug!(slide_id, purged, "slide purged from registry");
        }
        purged
    }

    /// Drop everything owned by `context`, returning how many instances it held.
    pub fn clear(&self, context: &str) -> usize {
        let mut inner = self.inner.lock();
        let Some(kinds) = inner.contexts.shift_remove(context) else {
            return 0;
        };
        kinds
            .values()
            .flat_map(|targets| targets.values())
            .map(IndexMap::len)
            .sum()
    }

    /// Contexts currently owning at least one instance.
    pub fn contexts(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .contexts
            .iter()
            .filter(|(_, kinds)| {
                kinds
                    .values()
                    .any(|targets| targets.values().any(|names| !names.is_empty()))
            })
            .map(|(context, _)| context.clone())
            .collect()
    }
}
