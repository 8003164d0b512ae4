use std::sync::Arc;

use picker_core::MediaKind;
use picker_logging::picker_info;

use crate::acquire::{AcquisitionService, MediaRequest};
use crate::protocol::{Response, ServiceCommand};

/// Maps service commands onto acquisition operations.
pub async fn handle_service_command(service: &AcquisitionService, command: ServiceCommand) -> Response {
    match command {
        ServiceCommand::DownloadBatch { urls } => {
            picker_info!("batch zip of {} items", urls.len());
            match service.download_batch_zip(&urls).await {
                Ok(delivery) => delivery.into(),
                Err(err) => err.into(),
            }
        }
        ServiceCommand::DownloadIndividual { urls } => {
            picker_info!("individual download of {} items", urls.len());
            service.download_individually(&urls).await.into()
        }
        ServiceCommand::CreateZipFromBlobs { blobs, filenames } => {
            picker_info!("zip from {} blobs", blobs.len());
            match service.create_zip_from_blobs(&blobs, &filenames).await {
                Ok(delivery) => delivery.into(),
                Err(err) => err.into(),
            }
        }
        ServiceCommand::DownloadSingle { url, kind } => {
            match service.download_single(&MediaRequest::new(url, kind)).await {
                Ok(delivery) => delivery.into(),
                Err(err) => err.into(),
            }
        }
        ServiceCommand::GetDownloadStatus => Response::DownloadStatus(service.status()),
    }
}

/// Runs service commands on the current runtime, one task per command.
#[derive(Clone)]
pub struct ServiceHandle {
    service: Arc<AcquisitionService>,
}

impl ServiceHandle {
    pub fn new(service: Arc<AcquisitionService>) -> Self {
        Self { service }
    }

    pub async fn request(&self, command: ServiceCommand) -> Response {
        let service = self.service.clone();
        match tokio::spawn(async move { handle_service_command(&service, command).await }).await {
            Ok(response) => response,
            Err(err) => Response::failure(format!("service task failed: {err}")),
        }
    }

    /// Convenience for a single image or video URL.
    pub async fn download_single(&self, url: impl Into<String>, kind: MediaKind) -> Response {
        self.request(ServiceCommand::DownloadSingle {
            url: url.into(),
            kind,
        })
        .await
    }
}
