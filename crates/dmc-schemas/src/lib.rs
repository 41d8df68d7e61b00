//! ---
//! dmc_section: "02-messaging-ipc-data-model"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Generated media controller wire types."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
//! Media controller schema library.
//!
//! Re-exports the generated protobuf module so the client core and test
//! servers share one definition of the wire format.

#[allow(missing_docs, clippy::derive_partial_eq_without_eq)]
pub mod mpf {
    tonic::include_proto!("mpf");
}

pub use mpf::media_controller_client::MediaControllerClient;
pub use mpf::media_controller_server::{MediaController, MediaControllerServer};
pub use mpf::{
    widget, Color, ImageWidget, LabelWidget, LineWidget, RectangleWidget, ShowSlideRequest,
    ShowSlideResponse, SlideAddRequest, SlideAddResponse, SlideRemoveRequest,
    SlideRemoveResponse, VideoWidget, Widget, WidgetAddRequest, WidgetAddResponse,
};

impl Widget {
    /// Short label for the populated widget variant, used in logs.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            Some(widget::Kind::Rectangle(_)) => "rectangle",
            Some(widget::Kind::Label(_)) => "label",
            Some(widget::Kind::Image(_)) => "image",
            Some(widget::Kind::Video(_)) => "video",
            Some(widget::Kind::Line(_)) => "line",
            None => "empty",
        }
    }
}
