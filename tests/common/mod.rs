// Shared fakes for the integration tests
//
// Every host collaborator is replaced by an in-memory fake that records what
// the studio did to it, so tests can assert on resource handling.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use webcam_studio::{
    Artifact, CaptureConstraints, CaptureFailure, CodecPairing, EncoderEvent, EncoderFactory,
    FrequencyAnalyzer, Host, Identity, LocalAuth, LocalSaver, MediaDevices, MediaEncoder,
    MediaStream, MetadataStore, ObjectStore, PersistenceBridge, RasterCanvas, RecordingRecord,
    Studio, StudioConfig, StudioDeps, StudioError, StudioHandle, StudioResult, StudioStatus,
    UiState,
};
use webcam_studio::host::{TrackInfo, TrackKind};
use webcam_studio::persistence::{ObjectRef, SavedArtifact};

pub const LEVEL: u8 = 128;

pub fn identity() -> Identity {
    Identity {
        id: "user-1".to_string(),
        email: Some("user-1@example.com".to_string()),
    }
}

/// Fail the test instead of hanging
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

pub async fn wait_status(
    studio: &StudioHandle,
    f: impl FnMut(&StudioStatus) -> bool,
) -> StudioStatus {
    within(studio.wait_for(f)).await.expect("studio closed")
}

/// Poll a condition that is not reflected in the studio status
pub async fn eventually(mut f: impl FnMut() -> bool) {
    within(async {
        while !f() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

// ============================================================================
// Capture
// ============================================================================

/// What happened to one granted stream
#[derive(Default)]
pub struct StreamProbe {
    pub tracks_stopped: AtomicBool,
    pub analyzer_closed: AtomicBool,
    pub frames_read: AtomicUsize,
    pub reads_after_stop: AtomicUsize,
}

#[derive(Default)]
pub struct FakeDevices {
    requests: AtomicUsize,
    failure: Mutex<Option<CaptureFailure>>,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    probes: Mutex<Vec<Arc<StreamProbe>>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every request with `failure`
    pub fn refuse(&self, failure: CaptureFailure) {
        *self.failure.lock().unwrap() = Some(failure);
    }

    /// Park the next request until the returned sender fires
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold.lock().unwrap() = Some(rx);
        tx
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> Vec<Arc<StreamProbe>> {
        self.probes.lock().unwrap().clone()
    }

    pub fn last_probe(&self) -> Arc<StreamProbe> {
        self.probes().last().cloned().expect("no stream granted")
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn request(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureFailure> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }

        if let Some(failure) = self.failure.lock().unwrap().clone() {
            return Err(failure);
        }

        let probe = Arc::new(StreamProbe::default());
        self.probes.lock().unwrap().push(Arc::clone(&probe));

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(TrackInfo {
                kind: TrackKind::Audio,
                label: "fake-mic".into(),
            });
        }
        if constraints.video {
            tracks.push(TrackInfo {
                kind: TrackKind::Video,
                label: "fake-cam".into(),
            });
        }

        Ok(Box::new(FakeStream {
            id: format!("stream-{}", self.request_count()),
            tracks,
            probe,
        }))
    }
}

pub struct FakeStream {
    id: String,
    tracks: Vec<TrackInfo>,
    probe: Arc<StreamProbe>,
}

impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks.clone()
    }

    fn create_analyzer(&self, fft_size: usize) -> StudioResult<Box<dyn FrequencyAnalyzer>> {
        Ok(Box::new(FakeAnalyzer {
            bins: fft_size / 2,
            probe: Arc::clone(&self.probe),
        }))
    }

    fn stop_tracks(&mut self) {
        self.probe.tracks_stopped.store(true, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        !self.probe.tracks_stopped.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct FakeAnalyzer {
    bins: usize,
    probe: Arc<StreamProbe>,
}

impl FrequencyAnalyzer for FakeAnalyzer {
    fn frequency_bin_count(&self) -> usize {
        self.bins
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        if self.probe.tracks_stopped.load(Ordering::SeqCst) {
            self.probe.reads_after_stop.fetch_add(1, Ordering::SeqCst);
        }
        self.probe.frames_read.fetch_add(1, Ordering::SeqCst);
        out.fill(LEVEL);
    }

    fn close(&mut self) {
        self.probe.analyzer_closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Handle on one encoder the studio created
#[derive(Default)]
pub struct EncoderProbe {
    tx: Mutex<Option<mpsc::Sender<EncoderEvent>>>,
    pub stop_requested: AtomicBool,
}

impl EncoderProbe {
    /// Deliver a fragment as the encoder would
    pub async fn emit(&self, bytes: &[u8]) {
        let tx = self.tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(EncoderEvent::Data(bytes.to_vec())).await;
        }
    }

    /// A sender that stays usable after finalize, like a misbehaving encoder
    pub fn sender(&self) -> Option<mpsc::Sender<EncoderEvent>> {
        self.tx.lock().unwrap().clone()
    }

    /// Deliver a final fragment and the finalize notification
    pub async fn finish(&self, tail: &[u8]) {
        let tx = self.tx.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx.send(EncoderEvent::Data(tail.to_vec())).await;
            let _ = tx.send(EncoderEvent::Stopped).await;
        }
    }
}

pub struct FakeEncoders {
    supported: Vec<String>,
    /// Finalize as soon as stop is requested
    finalize_on_stop: AtomicBool,
    probes: Mutex<Vec<Arc<EncoderProbe>>>,
}

impl FakeEncoders {
    pub fn supporting(mime_types: &[&str]) -> Self {
        Self {
            supported: mime_types.iter().map(|m| m.to_string()).collect(),
            finalize_on_stop: AtomicBool::new(true),
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn defer_finalize(&self) {
        self.finalize_on_stop.store(false, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    pub fn probe(&self, index: usize) -> Arc<EncoderProbe> {
        self.probes.lock().unwrap()[index].clone()
    }

    pub fn last_probe(&self) -> Arc<EncoderProbe> {
        self.probes
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no encoder created")
    }
}

impl EncoderFactory for FakeEncoders {
    fn create(
        &self,
        _stream: &dyn MediaStream,
        codec: &CodecPairing,
    ) -> StudioResult<Box<dyn MediaEncoder>> {
        if !self.supported.iter().any(|m| m == codec.mime_type()) {
            return Err(StudioError::CodecUnsupported(codec.to_string()));
        }

        let probe = Arc::new(EncoderProbe::default());
        self.probes.lock().unwrap().push(Arc::clone(&probe));

        Ok(Box::new(FakeEncoder {
            mime_type: codec.mime_type().to_string(),
            probe,
            finalize_on_stop: self.finalize_on_stop.load(Ordering::SeqCst),
        }))
    }
}

pub struct FakeEncoder {
    mime_type: String,
    probe: Arc<EncoderProbe>,
    finalize_on_stop: bool,
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    async fn start(&mut self) -> StudioResult<mpsc::Receiver<EncoderEvent>> {
        let (tx, rx) = mpsc::channel(32);
        *self.probe.tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> StudioResult<()> {
        self.probe.stop_requested.store(true, Ordering::SeqCst);
        if self.finalize_on_stop {
            let tx = self.probe.tx.lock().unwrap().take();
            if let Some(tx) = tx {
                let _ = tx.send(EncoderEvent::Stopped).await;
            }
        }
        Ok(())
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[derive(Default)]
pub struct MemorySaver {
    pub saved: Mutex<Vec<Artifact>>,
}

impl MemorySaver {
    pub fn saved(&self) -> Vec<Artifact> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalSaver for MemorySaver {
    async fn save(&self, artifact: &Artifact) -> Result<SavedArtifact> {
        self.saved.lock().unwrap().push(artifact.clone());
        Ok(SavedArtifact {
            location: format!("memory://{}", artifact.name),
        })
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<ObjectRef> {
        self.objects
            .lock()
            .unwrap()
            .push((path.to_string(), bytes.to_vec()));
        Ok(ObjectRef {
            path: path.to_string(),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://cdn.example.com/recordings/{}", path)
    }
}

pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn upload(&self, _path: &str, _bytes: &[u8]) -> Result<ObjectRef> {
        anyhow::bail!("storage unreachable")
    }

    fn public_url(&self, path: &str) -> String {
        path.to_string()
    }
}

#[derive(Default)]
pub struct MemoryMetadata {
    pub records: Mutex<Vec<RecordingRecord>>,
}

#[async_trait]
impl MetadataStore for MemoryMetadata {
    async fn insert(&self, record: &RecordingRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub struct FailingMetadata;

#[async_trait]
impl MetadataStore for FailingMetadata {
    async fn insert(&self, _record: &RecordingRecord) -> Result<()> {
        anyhow::bail!("insert rejected")
    }
}

// ============================================================================
// Studio fixture
// ============================================================================

pub struct Fixture {
    pub studio: StudioHandle,
    pub devices: Arc<FakeDevices>,
    pub encoders: Arc<FakeEncoders>,
    pub auth: Arc<LocalAuth>,
    pub ui: Arc<UiState>,
    pub canvas: Arc<tokio::sync::Mutex<RasterCanvas>>,
    pub saver: Arc<MemorySaver>,
}

pub struct FixtureBuilder {
    config: StudioConfig,
    signed_in: bool,
    object_store: Option<Arc<dyn ObjectStore>>,
    metadata: Option<Arc<dyn MetadataStore>>,
    encoders: FakeEncoders,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        let config = StudioConfig {
            frame_rate: 200,
            ..StudioConfig::default()
        };
        Self {
            config,
            signed_in: true,
            object_store: None,
            metadata: None,
            encoders: FakeEncoders::supporting(&["video/webm;codecs=vp9,opus"]),
        }
    }

    pub fn signed_out(mut self) -> Self {
        self.signed_in = false;
        self
    }

    pub fn ungated(mut self) -> Self {
        self.config.require_login = false;
        self
    }

    pub fn encoders(mut self, encoders: FakeEncoders) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn metadata(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(store);
        self
    }

    pub async fn build(self) -> Fixture {
        let devices = Arc::new(FakeDevices::new());
        let encoders = Arc::new(self.encoders);
        let auth = Arc::new(if self.signed_in {
            LocalAuth::signed_in(identity())
        } else {
            LocalAuth::new(identity())
        });
        let ui = Arc::new(UiState::new());
        let canvas = RasterCanvas::shared(64, 32);
        let saver = Arc::new(MemorySaver::default());

        let mut persistence = PersistenceBridge::new(saver.clone());
        if let Some(store) = self.object_store {
            persistence = persistence.with_object_store(store);
        }
        if let Some(store) = self.metadata {
            persistence = persistence.with_metadata_store(store);
        }

        let studio = Studio::spawn(
            self.config,
            StudioDeps {
                host: Host::new(devices.clone(), encoders.clone()),
                auth: auth.clone(),
                ui: ui.clone(),
                canvas: canvas.clone(),
                persistence,
            },
        );

        if self.signed_in {
            wait_status(&studio, |s| s.identity.is_some()).await;
        }

        Fixture {
            studio,
            devices,
            encoders,
            auth,
            ui,
            canvas,
            saver,
        }
    }
}

impl Fixture {
    pub async fn signed_in() -> Self {
        FixtureBuilder::new().build().await
    }

    pub async fn signed_out() -> Self {
        FixtureBuilder::new().signed_out().build().await
    }

    /// Capture active and visualizer drawing
    pub async fn capturing() -> Self {
        let fixture = Self::signed_in().await;
        fixture
            .studio
            .start_capture()
            .await
            .expect("capture should start");
        fixture
    }
}
