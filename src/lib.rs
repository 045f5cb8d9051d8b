pub mod auth;
pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod persistence;
pub mod session;
pub mod ui;
pub mod visualizer;

pub use auth::{AccessGate, AuthProvider, Identity, LocalAuth};
pub use config::Config;
pub use error::{ErrorKind, StudioError, StudioResult};
pub use host::{
    CaptureConstraints, CaptureFailure, CodecPairing, EncoderEvent, EncoderFactory, FileHost,
    FileHostConfig, FrequencyAnalyzer, Host, MediaDevices, MediaEncoder, MediaStream, StreamInfo,
};
pub use http::{create_router, AppState};
pub use persistence::{
    Artifact, DirectorySaver, ExportReport, FsObjectStore, JsonlMetadataStore, LocalSaver,
    MetadataStore, ObjectStore, PersistenceBridge, RecordingRecord, RemoteOutcome,
};
pub use session::{
    CaptureState, Controls, RecordingState, Studio, StudioConfig, StudioDeps, StudioHandle,
    StudioStatus,
};
pub use ui::{Notice, UiState, UiSurface};
pub use visualizer::{Canvas, RasterCanvas, SharedCanvas};
