//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Handles and identifiers shared by the lifecycle core."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::fmt;

use dmc_schemas::Widget;
use serde::{Deserialize, Serialize};

/// Resource families tracked by the instance registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Slide,
    Widget,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Slide => "slide",
            ResourceKind::Widget => "widget",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote calls understood by the media controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcOperation {
    Connect,
    CreateSlide,
    ShowSlide,
    RemoveSlide,
    AttachWidgets,
}

impl RpcOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcOperation::Connect => "connect",
            RpcOperation::CreateSlide => "create_slide",
            RpcOperation::ShowSlide => "show_slide",
            RpcOperation::RemoveSlide => "remove_slide",
            RpcOperation::AttachWidgets => "attach_widgets",
        }
    }
}

impl fmt::Display for RpcOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local reference to a slide that exists on the media controller.
///
/// Identity is the server-assigned `slide_id`; the name is only a local
/// lookup key.
#[derive(Debug, Clone)]
pub struct SlideHandle {
    slide_id: u64,
    name: String,
}

impl SlideHandle {
    pub fn new(slide_id: u64, name: impl Into<String>) -> Self {
        Self {
            slide_id,
            name: name.into(),
        }
    }

    pub fn slide_id(&self) -> u64 {
        self.slide_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for SlideHandle {
    fn eq(&self, other: &Self) -> bool {
        self.slide_id == other.slide_id
    }
}

impl Eq for SlideHandle {}

/// A widget payload built for a single attach request.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetHandle {
    pub name: String,
    pub payload: Widget,
}

impl WidgetHandle {
    pub fn new(name: impl Into<String>, payload: Widget) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Value stored in the instance registry.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceHandle {
    Slide(SlideHandle),
    Widget(WidgetHandle),
}

impl InstanceHandle {
    pub fn kind(&self) -> ResourceKind {
        match self {
            InstanceHandle::Slide(_) => ResourceKind::Slide,
            InstanceHandle::Widget(_) => ResourceKind::Widget,
        }
    }

    pub fn as_slide(&self) -> Option<&SlideHandle> {
        match self {
            InstanceHandle::Slide(handle) => Some(handle),
            InstanceHandle::Widget(_) => None,
        }
    }
}

impl From<SlideHandle> for InstanceHandle {
    fn from(handle: SlideHandle) -> Self {
        InstanceHandle::Slide(handle)
    }
}

impl From<WidgetHandle> for InstanceHandle {
    fn from(handle: WidgetHandle) -> Self {
        InstanceHandle::Widget(handle)
    }
}
