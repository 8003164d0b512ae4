//! Typed messages between the UI, the page engine and the service.

use picker_core::{Affordance, MediaId, MediaKind, StateSnapshot};
use serde::{Deserialize, Serialize};

use crate::acquire::{AcquireError, MediaRequest, SingleDelivery, ZipDelivery};
use crate::config::UserSettings;
use crate::download::DownloadStatus;
use crate::retrieve::{BlobBundle, BlobsError};
use crate::{DownloadId, DownloadResult, FailedItem, MediaError};

/// Commands handled by the page engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageCommand {
    Ping,
    GetState,
    StartSelection,
    StopSelection,
    ClearSelection,
    Rescan,
    ToggleItem { id: MediaId },
    RemoveItem { id: MediaId },
    GetDetected,
    GetDownloadUrls,
    FetchMediaAsBlobs,
    UpdateConfig { settings: UserSettings },
}

/// Commands handled by the acquisition service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ServiceCommand {
    DownloadBatch {
        urls: Vec<MediaRequest>,
    },
    DownloadIndividual {
        urls: Vec<MediaRequest>,
    },
    CreateZipFromBlobs {
        blobs: Vec<String>,
        filenames: Vec<String>,
    },
    DownloadSingle {
        url: String,
        #[serde(rename = "type", default = "image_kind")]
        kind: MediaKind,
    },
    GetDownloadStatus,
}

fn image_kind() -> MediaKind {
    MediaKind::Image
}

/// Unsolicited pushes from the page engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageEvent {
    StateUpdate { state: StateSnapshot },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<DownloadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FailedItem>>,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            results: None,
            errors: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pong {
    pub pong: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedList {
    pub detected: Vec<Affordance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadUrls {
    pub urls: Vec<MediaRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobsResponse {
    pub success: bool,
    pub blobs: Vec<String>,
    pub filenames: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FailedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipResponse {
    pub success: bool,
    pub count: usize,
    pub filename: String,
    pub download_id: DownloadId,
    pub results: DownloadResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualResponse {
    pub success: bool,
    pub count: usize,
    pub failed: usize,
    pub results: DownloadResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleResponse {
    pub success: bool,
    pub download_id: DownloadId,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Pong(Pong),
    Ack(Ack),
    State(StateSnapshot),
    Detected(DetectedList),
    DownloadUrls(DownloadUrls),
    Blobs(BlobsResponse),
    Zip(ZipResponse),
    Individual(IndividualResponse),
    Single(SingleResponse),
    DownloadStatus(DownloadStatus),
    Failure(Failure),
}

impl Response {
    pub fn ack() -> Self {
        Response::Ack(Ack { success: true })
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Response::Failure(Failure::new(error))
    }

    pub fn messaging_failure() -> Self {
        Response::failure(MediaError::MessagingFailure.to_string())
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::Ack(ack) => ack.success,
            Response::Blobs(blobs) => blobs.success,
            Response::Zip(zip) => zip.success,
            Response::Individual(individual) => individual.success,
            Response::Single(single) => single.success,
            Response::Failure(_) => false,
            Response::Pong(_)
            | Response::State(_)
            | Response::Detected(_)
            | Response::DownloadUrls(_)
            | Response::DownloadStatus(_) => true,
        }
    }

    /// The error text of a failed response.
    pub fn error(&self) -> Option<&str> {
        match self {
            Response::Failure(failure) => Some(&failure.error),
            _ => None,
        }
    }
}

impl From<ZipDelivery> for Response {
    fn from(delivery: ZipDelivery) -> Self {
        Response::Zip(ZipResponse {
            success: true,
            count: delivery.archived(),
            filename: delivery.filename,
            download_id: delivery.download_id,
            results: delivery.result,
        })
    }
}

impl From<SingleDelivery> for Response {
    fn from(delivery: SingleDelivery) -> Self {
        Response::Single(SingleResponse {
            success: true,
            download_id: delivery.download_id,
            filename: delivery.filename,
        })
    }
}

impl From<DownloadResult> for Response {
    fn from(results: DownloadResult) -> Self {
        Response::Individual(IndividualResponse {
            success: true,
            count: results.succeeded.len(),
            failed: results.unsuccessful(),
            results,
        })
    }
}

impl From<AcquireError> for Response {
    fn from(err: AcquireError) -> Self {
        let mut failure = Failure::new(err.to_string());
        failure.results = err.result().cloned();
        Response::Failure(failure)
    }
}

impl From<Result<BlobBundle, BlobsError>> for Response {
    fn from(outcome: Result<BlobBundle, BlobsError>) -> Self {
        match outcome {
            Ok(bundle) => Response::Blobs(BlobsResponse {
                success: true,
                blobs: bundle.blobs,
                filenames: bundle.filenames,
                errors: bundle.errors,
            }),
            Err(err) => {
                let mut failure = Failure::new(err.to_string());
                if let BlobsError::NothingRetrieved { errors } = err {
                    failure.errors = Some(errors);
                }
                Response::Failure(failure)
            }
        }
    }
}
