//! Host capabilities the studio drives but does not implement
//!
//! Device capture, frequency analysis and media encoding all live behind the
//! traits in this module. The studio only ever talks to them through
//! [`Host`]; the bundled [`file::FileHost`] backs them with a WAV file.

pub mod file;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::StudioResult;

pub use file::{FileHost, FileHostConfig};

/// What to ask the capture collaborator for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub video: bool,
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// Why a capture request was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    #[error("permission denied")]
    PermissionDenied,

    #[error("no device: {0}")]
    NoDevice(String),

    #[error("{0}")]
    Other(String),
}

/// Kind of a track inside a captured stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub kind: TrackKind,
    pub label: String,
}

/// Description of a live stream, used to bind the preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub id: String,
    pub tracks: Vec<TrackInfo>,
}

/// A live camera/microphone stream
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;

    fn tracks(&self) -> Vec<TrackInfo>;

    /// Wire the audio track into a frequency analyzer with the given window
    fn create_analyzer(&self, fft_size: usize) -> StudioResult<Box<dyn FrequencyAnalyzer>>;

    /// Release every track. Calling it again is a no-op.
    fn stop_tracks(&mut self);

    fn is_live(&self) -> bool;

    /// Lets an encoder factory reach its own stream type
    fn as_any(&self) -> &dyn Any;

    fn info(&self) -> StreamInfo {
        StreamInfo {
            id: self.id().to_string(),
            tracks: self.tracks(),
        }
    }
}

/// Frequency-domain view of a stream's audio
pub trait FrequencyAnalyzer: Send {
    /// Half of the analysis window
    fn frequency_bin_count(&self) -> usize;

    /// Fill `out` with the current byte-scaled amplitudes (0..=255)
    fn byte_frequency_data(&mut self, out: &mut [u8]);

    /// Dispose of the analysis context. Idempotent.
    fn close(&mut self);
}

/// Capture collaborator
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn request(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureFailure>;
}

/// Requested container + codec pairing, e.g. `video/webm;codecs=vp9,opus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecPairing(pub String);

impl CodecPairing {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self(mime_type.into())
    }

    pub fn mime_type(&self) -> &str {
        &self.0
    }

    /// Container mime type without codec parameters
    pub fn container(&self) -> &str {
        self.0.split(';').next().unwrap_or_default().trim()
    }

    /// File extension for artifacts of this container
    pub fn extension(&self) -> &str {
        let container = self.container();
        match container.split_once('/') {
            Some((_, subtype)) if !subtype.is_empty() => subtype,
            _ => "bin",
        }
    }
}

impl Default for CodecPairing {
    fn default() -> Self {
        Self::new("video/webm;codecs=vp9,opus")
    }
}

impl std::fmt::Display for CodecPairing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output of a running encoder, delivered in order on one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A chunk of encoded media; may be empty
    Data(Vec<u8>),
    /// Finalize completed. Nothing follows.
    Stopped,
}

/// Encoder bound to one stream
///
/// Implementations must deliver every `Data` event before `Stopped`, and
/// nothing after it.
#[async_trait]
pub trait MediaEncoder: Send {
    async fn start(&mut self) -> StudioResult<mpsc::Receiver<EncoderEvent>>;

    /// Ask the encoder to finalize
    async fn stop(&mut self) -> StudioResult<()>;

    fn mime_type(&self) -> &str;
}

/// Encoder collaborator. Fails with `CodecUnsupported` if it cannot honour the
/// requested pairing.
pub trait EncoderFactory: Send + Sync {
    fn create(
        &self,
        stream: &dyn MediaStream,
        codec: &CodecPairing,
    ) -> StudioResult<Box<dyn MediaEncoder>>;
}

/// The capture and encoding capabilities handed to a studio
#[derive(Clone)]
pub struct Host {
    pub devices: Arc<dyn MediaDevices>,
    pub encoders: Arc<dyn EncoderFactory>,
}

impl Host {
    pub fn new(devices: Arc<dyn MediaDevices>, encoders: Arc<dyn EncoderFactory>) -> Self {
        Self { devices, encoders }
    }
}
