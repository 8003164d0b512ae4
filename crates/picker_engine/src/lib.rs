//! Picker engine: page scanning, retrieval and download packaging.
mod acquire;
mod archive;
mod classify;
mod config;
mod data_url;
mod decode;
mod detect;
mod download;
mod engine;
mod fetch;
mod filename;
mod page;
mod page_engine;
mod persist;
mod protocol;
mod retrieve;
mod service;
mod srcset;
mod types;
mod watcher;

pub use acquire::{AcquireError, AcquisitionService, MediaRequest, SingleDelivery, ZipDelivery};
pub use archive::{archive_filename, build_zip, build_zip_async, ArchiveEntry, ArchiveError};
pub use classify::{
    classify, to_absolute_url, Classification, RejectReason, UrlType,
    Verdict, EXCLUDED_PATTERNS, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS,
};
pub use config::{
    system_clock, AcquisitionSettings, Clock, DetectorConfig, EngineConfig, LightboxSelectors,
    RetrievalSettings, SelectorGroup, UserSettings, WatchSettings, DEFAULT_LAZY_LOAD_ATTRS,
    DEFAULT_MIN_DIMENSION, DEFAULT_SIZE_GATE_BYPASS,
};
pub use data_url::{decode_data_url, encode_data_url, guess_mime, DataUrl, DataUrlError};
pub use decode::{decode_page, DecodeError, DecodedPage};
pub use detect::{
    locate, resolve_locator, ElementMetrics, LayoutProbe, MediaDetector, NoLayout,
};
pub use download::{
    DirectoryDownloader, DownloadError, DownloadRecord, DownloadRequest, DownloadSource,
    DownloadStatus, Downloader,
};
pub use engine::{build, EngineHandle};
pub use fetch::{Credentials, FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::{
    derive_filename, sanitize_filename, truncate_preserving_extension, FilenameRegistry,
    DEFAULT_FILENAME_MAX_LEN,
};
pub use page::{HttpPageSource, PageError, PageSnapshot, PageSource, SharedPage, StaticPage};
pub use page_engine::{PageEngineDeps, PageEngineHandle};
pub use persist::{ensure_output_dir, AtomicFileWriter, ConflictAction, PersistError};
pub use protocol::{
    Ack, BlobsResponse, DetectedList, DownloadUrls, Failure, IndividualResponse, PageCommand,
    PageEvent, Pong, Response, ServiceCommand, SingleResponse, ZipResponse,
};
pub use retrieve::{
    BlobBundle, BlobsError, CanvasReadback, CorsFetch, LegacyRequest, NoSurfaces, ReadbackError,
    RetrievalChain, RetrievalError, RetrievalItem, RetrievalStrategy, Retrieved, SurfaceProvider,
};
pub use service::{handle_service_command, ServiceHandle};
pub use srcset::{best_srcset_url, parse_srcset, Descriptor, SrcsetEntry, SrcsetRanking};
pub use types::{
    DownloadId, DownloadResult, FailedItem, FailureKind, FetchError, FetchMetadata, FetchOutput,
    MediaError, MediaErrorKind, SucceededItem,
};
pub use watcher::{DetectionEvent, DetectionTask};
