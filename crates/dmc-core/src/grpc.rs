//! ---
//! dmc_section: "05-networking-external-interfaces"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "gRPC binding of the media controller transport."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use dmc_schemas::{
    MediaControllerClient, ShowSlideRequest, SlideAddRequest, SlideRemoveRequest,
    WidgetAddRequest,
};
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tracing::info;

use crate::transport::MediaControllerTransport;
use crate::types::RpcOperation;
use crate::{DmcError, Result};

/// Transport speaking the `mpf.MediaController` gRPC service.
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: MediaControllerClient<Channel>,
}

impl GrpcTransport {
    /// Connect to `endpoint` (e.g. `http://[::1]:50051`).
    pub async fn connect(endpoint: &str, connect_timeout: Duration) -> Result<Self> {
        let channel = Endpoint::from_shared(endpoint.to_owned())
            .map_err(|err| DmcError::transport(RpcOperation::Connect, err.to_string()))?
            .connect_timeout(connect_timeout)
            .connect()
            .await
            .map_err(|err| DmcError::transport(RpcOperation::Connect, err.to_string()))?;
        info!(%endpoint, "connected to media controller");
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: MediaControllerClient::new(channel),
        }
    }
}

fn status_error(operation: RpcOperation) -> impl FnOnce(Status) -> DmcError {
    move |status| {
        DmcError::transport(
            operation,
            format!("{:?}: {}", status.code(), status.message()),
        )
    }
}

#[async_trait]
impl MediaControllerTransport for GrpcTransport {
    async fn add_slide(&self, request: SlideAddRequest) -> Result<u64> {
        let mut client = self.client.clone();
        let response = client
            .add_slide(Request::new(request))
            .await
            .map_err(status_error(RpcOperation::CreateSlide))?;
        Ok(response.into_inner().slide_id)
    }

    async fn show_slide(&self, slide_id: u64) -> Result<()> {
        let mut client = self.client.clone();
        client
            .show_slide(Request::new(ShowSlideRequest { slide_id }))
            .await
            .map_err(status_error(RpcOperation::ShowSlide))?;
        Ok(())
    }

    async fn remove_slide(&self, slide_id: u64) -> Result<()> {
        let mut client = self.client.clone();
        client
            .remove_slide(Request::new(SlideRemoveRequest { slide_id }))
            .await
            .map_err(status_error(RpcOperation::RemoveSlide))?;
        Ok(())
    }

    async fn add_widgets_to_slide(&self, request: WidgetAddRequest) -> Result<()> {
        let mut client = self.client.clone();
        client
            .add_widgets_to_slide(Request::new(request))
            .await
            .map_err(status_error(RpcOperation::AttachWidgets))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "grpc"
    }
}
