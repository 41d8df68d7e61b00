//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Slide and widget lifecycle coordination against a remote media controller."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
//! Translates host intents ("play slide X in context Y", "remove slide X",
//! "attach these widgets") into an ordered sequence of media controller RPCs,
//! caching remote slides by name and scoping ownership to contexts.

pub mod cache;
pub mod controller;
pub mod definitions;
pub mod grpc;
pub mod metrics;
pub mod orchestrator;
pub mod players;
pub mod registry;
pub mod transport;
pub mod types;

/// Shared result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, DmcError>;

/// Failures surfaced by the lifecycle core.
#[derive(Debug, thiserror::Error)]
pub enum DmcError {
    /// No definition is registered under the referenced name.
    #[error("{kind} '{name}' is unconfigured")]
    NotFound { kind: ResourceKind, name: String },
    /// The RPC could not be completed; remote state is unknown.
    #[error("{operation} failed: {reason}")]
    Transport {
        operation: RpcOperation,
        reason: String,
    },
    /// The request does not match the locally tracked state.
    #[error("state inconsistency: {0}")]
    StateInconsistency(String),
    /// A definition exists but could not be turned into a payload.
    #[error("invalid definition for '{name}': {reason}")]
    Definition { name: String, reason: String },
}

impl DmcError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        DmcError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn transport(operation: RpcOperation, reason: impl Into<String>) -> Self {
        DmcError::Transport {
            operation,
            reason: reason.into(),
        }
    }
}

pub use cache::ResourceCache;
pub use controller::{ControllerBuilder, DirectMediaController};
pub use definitions::{
    ConfigDefinitions, DefinitionArgs, FnDefinitions, SlideDefinitions, WidgetDefinitions,
};
pub use grpc::GrpcTransport;
pub use metrics::{new_registry, RpcMetrics, SharedRegistry};
pub use orchestrator::{RemoteOrchestrator, WidgetRequest};
pub use players::{
    format_score, PlayAction, PlayOutcome, PlaySettings, ResourceSettings, SlidePlayer,
    TeardownFailure, TeardownReport, WidgetPlayer, SCORE_WIDGET,
};
pub use registry::{InstanceRegistry, RegistryEntry};
pub use transport::{InMemoryTransport, MediaControllerTransport, RemoteClient, RpcCall};
pub use types::{InstanceHandle, ResourceKind, RpcOperation, SlideHandle, WidgetHandle};
