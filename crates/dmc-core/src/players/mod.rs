//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Host-facing slide and widget players driven by ordered play settings."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use dmc_common::DEFAULT_TARGET;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::definitions::DefinitionArgs;
use crate::types::SlideHandle;
use crate::DmcError;

pub mod slide;
pub mod widget;

pub use slide::SlidePlayer;
pub use widget::{format_score, WidgetPlayer, SCORE_WIDGET};

/// What a settings entry asks the player to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayAction {
    #[default]
    Play,
    Show,
    Remove,
}

/// One entry of [`PlaySettings`].
///
/// `action` is required when parsed. Keys other than `action` and `target`
/// are handed to the definition lookup untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSettings {
    pub action: PlayAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(flatten)]
    pub params: DefinitionArgs,
}

impl ResourceSettings {
    pub fn new(action: PlayAction) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }

    pub fn on_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or(DEFAULT_TARGET)
    }
}

/// Ordered `name -> settings`; entries are applied in this order.
pub type PlaySettings = IndexMap<String, ResourceSettings>;

/// What a single `play` call changed on the media controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayOutcome {
    pub shown: Vec<SlideHandle>,
    pub removed: Vec<String>,
    /// Slides that received widgets, one entry per attach request.
    pub attached: Vec<SlideHandle>,
}

/// A slide that could not be removed during teardown.
#[derive(Debug)]
pub struct TeardownFailure {
    pub target: String,
    pub name: String,
    pub error: DmcError,
}

/// Result of a best-effort context teardown.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub removed: Vec<String>,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
