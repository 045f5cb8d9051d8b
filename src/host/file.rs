//! File-backed host
//!
//! Stands in for a camera/microphone pair: the "microphone" plays a WAV file
//! in a loop starting at the moment capture is granted, and the "camera" is a
//! synthetic test-pattern track with no data. Frequency analysis runs a real
//! FFT over the current playback window, and the encoder writes the span
//! played while recording as a single WAV fragment on stop.

use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use spectrum_analyzer::scaling::divide_by_N_sqrt;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{samples_fft_to_spectrum, FrequencyLimit};
use std::any::Any;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    CaptureConstraints, CaptureFailure, CodecPairing, EncoderEvent, EncoderFactory,
    FrequencyAnalyzer, MediaDevices, MediaEncoder, MediaStream, TrackInfo, TrackKind,
};
use crate::error::{StudioError, StudioResult};

/// Decibel range mapped onto 0..=255, same window as browser analysers use
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Configuration for the file-backed host
#[derive(Debug, Clone)]
pub struct FileHostConfig {
    /// WAV file played as the microphone
    pub source: PathBuf,
    /// Whether a synthetic camera track is offered
    pub provides_video: bool,
    /// Mime types the encoder accepts verbatim
    pub supported_mime_types: Vec<String>,
}

impl FileHostConfig {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            provides_video: true,
            supported_mime_types: vec!["audio/wav".to_string()],
        }
    }
}

/// Decoded mono audio used as the microphone signal
#[derive(Debug)]
pub struct WavSource {
    pub path: String,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio source: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        if samples.is_empty() {
            anyhow::bail!("Audio source {} contains no samples", path.display());
        }

        info!(
            "Audio source loaded: {:.1}s, {}Hz, {} channels",
            samples.len() as f64 / spec.sample_rate as f64,
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            path: path.display().to_string(),
            sample_rate: spec.sample_rate,
            samples,
        })
    }

    /// Sample index playing `elapsed_secs` after the start, looping
    fn position(&self, elapsed_secs: f64) -> usize {
        (elapsed_secs * self.sample_rate as f64) as usize % self.samples.len()
    }

    /// `len` samples starting at `start`, wrapping around the end
    fn window(&self, start: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| self.samples[(start + i) % self.samples.len()])
            .collect()
    }
}

/// Capture and encoder collaborator backed by a WAV file
pub struct FileHost {
    config: FileHostConfig,
}

impl FileHost {
    pub fn new(config: FileHostConfig) -> Self {
        Self { config }
    }

    pub fn encoders(&self) -> FileEncoderFactory {
        FileEncoderFactory {
            supported_mime_types: self.config.supported_mime_types.clone(),
        }
    }
}

#[async_trait]
impl MediaDevices for FileHost {
    async fn request(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureFailure> {
        if constraints.video && !self.config.provides_video {
            return Err(CaptureFailure::NoDevice("no camera attached".to_string()));
        }
        if constraints.audio && !self.config.source.exists() {
            return Err(CaptureFailure::NoDevice(format!(
                "audio source {} not found",
                self.config.source.display()
            )));
        }

        let path = self.config.source.clone();
        let source = tokio::task::spawn_blocking(move || WavSource::open(path))
            .await
            .map_err(|e| CaptureFailure::Other(format!("audio source loader panicked: {}", e)))?
            .map_err(|e| CaptureFailure::Other(format!("{:#}", e)))?;

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(TrackInfo {
                kind: TrackKind::Audio,
                label: format!("file:{}", source.path),
            });
        }
        if constraints.video {
            tracks.push(TrackInfo {
                kind: TrackKind::Video,
                label: "test-pattern".to_string(),
            });
        }

        let stream = FileStream {
            id: uuid::Uuid::new_v4().to_string(),
            source: Arc::new(source),
            started: Instant::now(),
            live: Arc::new(AtomicBool::new(true)),
            tracks,
        };
        info!("Capture granted: stream {}", stream.id);

        Ok(Box::new(stream))
    }
}

pub struct FileStream {
    id: String,
    source: Arc<WavSource>,
    started: Instant,
    live: Arc<AtomicBool>,
    tracks: Vec<TrackInfo>,
}

impl MediaStream for FileStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks.clone()
    }

    fn create_analyzer(&self, fft_size: usize) -> StudioResult<Box<dyn FrequencyAnalyzer>> {
        if !self.tracks.iter().any(|t| t.kind == TrackKind::Audio) {
            return Err(StudioError::Host("stream has no audio track".to_string()));
        }
        if !fft_size.is_power_of_two() || !(32..=16384).contains(&fft_size) {
            return Err(StudioError::Host(format!(
                "fft size {} must be a power of two between 32 and 16384",
                fft_size
            )));
        }

        Ok(Box::new(FileAnalyzer {
            source: Arc::clone(&self.source),
            started: self.started,
            live: Arc::clone(&self.live),
            fft_size,
            closed: false,
        }))
    }

    fn stop_tracks(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            info!("Stopped {} track(s) of stream {}", self.tracks.len(), self.id);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct FileAnalyzer {
    source: Arc<WavSource>,
    started: Instant,
    live: Arc<AtomicBool>,
    fft_size: usize,
    closed: bool,
}

impl FrequencyAnalyzer for FileAnalyzer {
    fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        out.fill(0);
        if self.closed || !self.live.load(Ordering::SeqCst) {
            return;
        }

        let start = self.source.position(self.started.elapsed().as_secs_f64());
        let window = self.source.window(start, self.fft_size);
        let windowed = hann_window(&window);

        let spectrum = match samples_fft_to_spectrum(
            &windowed,
            self.source.sample_rate,
            FrequencyLimit::All,
            Some(&divide_by_N_sqrt),
        ) {
            Ok(s) => s,
            Err(e) => {
                debug!("FFT failed: {:?}", e);
                return;
            }
        };

        for (slot, (_, value)) in out.iter_mut().zip(spectrum.data().iter()) {
            *slot = magnitude_to_byte(value.val());
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Map a linear magnitude onto the 0..=255 decibel scale
fn magnitude_to_byte(magnitude: f32) -> u8 {
    let db = 20.0 * magnitude.max(1e-12).log10();
    let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

pub struct FileEncoderFactory {
    supported_mime_types: Vec<String>,
}

impl EncoderFactory for FileEncoderFactory {
    fn create(
        &self,
        stream: &dyn MediaStream,
        codec: &CodecPairing,
    ) -> StudioResult<Box<dyn MediaEncoder>> {
        if !self
            .supported_mime_types
            .iter()
            .any(|m| m == codec.mime_type())
        {
            return Err(StudioError::CodecUnsupported(codec.to_string()));
        }

        let stream = stream
            .as_any()
            .downcast_ref::<FileStream>()
            .ok_or_else(|| StudioError::Host("stream was not produced by the file host".into()))?;

        Ok(Box::new(FileEncoder {
            source: Arc::clone(&stream.source),
            stream_started: stream.started,
            mime_type: codec.mime_type().to_string(),
            started_at: None,
            tx: None,
        }))
    }
}

/// Encodes the span played between start and stop as one WAV fragment
pub struct FileEncoder {
    source: Arc<WavSource>,
    stream_started: Instant,
    mime_type: String,
    started_at: Option<Instant>,
    tx: Option<mpsc::Sender<EncoderEvent>>,
}

/// 16-bit mono WAV of `duration_secs` of `source`, starting `offset_secs` in
fn encode_span(source: &WavSource, offset_secs: f64, duration_secs: f64) -> Result<Vec<u8>> {
    let start = source.position(offset_secs);
    let len = (duration_secs * source.sample_rate as f64) as usize;

    let spec = WavSpec {
        channels: 1,
        sample_rate: source.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).context("Failed to create WAV encoder")?;
        for sample in source.window(start, len) {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(pcm)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}

#[async_trait]
impl MediaEncoder for FileEncoder {
    async fn start(&mut self) -> StudioResult<mpsc::Receiver<EncoderEvent>> {
        if self.tx.is_some() {
            return Err(StudioError::InvalidState("encoder already started".into()));
        }

        let (tx, rx) = mpsc::channel(16);
        self.tx = Some(tx);
        self.started_at = Some(Instant::now());
        info!("File encoder started ({})", self.mime_type);

        Ok(rx)
    }

    async fn stop(&mut self) -> StudioResult<()> {
        let (Some(tx), Some(started_at)) = (self.tx.take(), self.started_at.take()) else {
            warn!("File encoder stop requested while not running");
            return Ok(());
        };

        let offset = started_at.duration_since(self.stream_started).as_secs_f64();
        let duration = started_at.elapsed().as_secs_f64();
        let source = Arc::clone(&self.source);
        let bytes = tokio::task::spawn_blocking(move || encode_span(&source, offset, duration))
            .await
            .map_err(|e| StudioError::Host(format!("WAV encoder panicked: {}", e)))?
            .map_err(|e| StudioError::Host(format!("{:#}", e)))?;
        info!("File encoder finalized: {} bytes", bytes.len());

        // Receiver may already be gone if the recording was discarded.
        if tx.send(EncoderEvent::Data(bytes)).await.is_ok() {
            let _ = tx.send(EncoderEvent::Stopped).await;
        }

        Ok(())
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }
}
