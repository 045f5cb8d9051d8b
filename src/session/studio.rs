use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::capture::{CaptureSession, CaptureState};
use super::config::StudioConfig;
use super::controls::Controls;
use super::recording::{RecordingSession, RecordingState};
use super::Epoch;
use crate::auth::{AccessChange, AccessGate, AuthProvider, Identity};
use crate::error::{StudioError, StudioResult};
use crate::host::{CaptureFailure, EncoderEvent, Host, MediaStream, StreamInfo};
use crate::persistence::{Artifact, ExportReport, PersistenceBridge};
use crate::ui::{Notice, UiSurface};
use crate::visualizer::{pixel_count, SharedCanvas, MAX_CANVAS_SIDE};

type Reply<T> = oneshot::Sender<StudioResult<T>>;

/// Everything the studio reacts to, processed one at a time
enum Event {
    // User commands
    SignIn(Reply<()>),
    SignOut(Reply<()>),
    StartCapture(Reply<StreamInfo>),
    StopCapture(Reply<()>),
    StartRecording(Reply<()>),
    StopRecording(Reply<()>),
    Export(Reply<ExportReport>),
    ResizeCanvas {
        width: u32,
        height: u32,
        reply: Reply<()>,
    },
    Status(oneshot::Sender<StudioStatus>),
    Shutdown(oneshot::Sender<()>),

    // Host notifications
    IdentityChanged(Option<Identity>),
    CaptureResolved {
        epoch: Epoch,
        result: Result<Box<dyn MediaStream>, CaptureFailure>,
    },
    Encoder {
        epoch: Epoch,
        event: EncoderEvent,
    },
    AuthFinished {
        action: AuthAction,
        result: StudioResult<()>,
        reply: Reply<()>,
    },
    ExportFinished {
        report: ExportReport,
        reply: Reply<ExportReport>,
    },
}

#[derive(Debug, Clone, Copy)]
enum AuthAction {
    SignIn,
    SignOut,
}

/// Collaborators a studio is built from
pub struct StudioDeps {
    pub host: Host,
    pub auth: Arc<dyn AuthProvider>,
    pub ui: Arc<dyn UiSurface>,
    pub canvas: SharedCanvas,
    pub persistence: PersistenceBridge,
}

/// Point-in-time view of the studio
#[derive(Debug, Clone, Serialize)]
pub struct StudioStatus {
    pub identity: Option<Identity>,
    pub authorized: bool,
    pub capture: CaptureState,
    pub stream: Option<StreamInfo>,
    pub capture_started_at: Option<DateTime<Utc>>,
    pub recording: RecordingState,
    pub recording_started_at: Option<DateTime<Utc>>,
    pub fragments: usize,
    pub export_ready: bool,
    pub controls: Controls,
}

/// The single owner of all capture, recording and access state
///
/// Runs as one task; user commands and host notifications arrive on the same
/// queue and are handled strictly one after another. Slow host work (device
/// negotiation, sign-in, export) is spawned and reports back through the
/// queue stamped with the epoch it belongs to.
pub struct Studio {
    config: StudioConfig,
    host: Host,
    auth: Arc<dyn AuthProvider>,
    ui: Arc<dyn UiSurface>,
    canvas: SharedCanvas,
    persistence: PersistenceBridge,

    gate: AccessGate,
    capture: CaptureSession,
    recording: RecordingSession,
    pending_capture: Option<Reply<StreamInfo>>,
    last_epoch: u64,
    controls: Option<Controls>,

    events: mpsc::WeakSender<Event>,
    status_tx: watch::Sender<StudioStatus>,
}

impl Studio {
    /// Start the studio task and return a handle to it
    pub fn spawn(config: StudioConfig, deps: StudioDeps) -> StudioHandle {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        let gate = AccessGate::new(config.require_login);
        let initial = StudioStatus {
            identity: None,
            authorized: gate.is_authorized(),
            capture: CaptureState::Idle,
            stream: None,
            capture_started_at: None,
            recording: RecordingState::Inactive,
            recording_started_at: None,
            fragments: 0,
            export_ready: false,
            controls: Controls::default(),
        };
        let (status_tx, status_rx) = watch::channel(initial);

        let studio = Studio {
            config,
            host: deps.host,
            auth: deps.auth,
            ui: deps.ui,
            canvas: deps.canvas,
            persistence: deps.persistence,
            gate,
            capture: CaptureSession::new(),
            recording: RecordingSession::new(),
            pending_capture: None,
            last_epoch: 0,
            controls: None,
            events: tx.downgrade(),
            status_tx,
        };

        let identity_task = studio.forward_identity();
        tokio::spawn(studio.run(rx, identity_task));

        StudioHandle {
            tx,
            status: status_rx,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Event>, identity_task: JoinHandle<()>) {
        info!("Studio started");
        self.publish();

        let mut shutdown_ack = None;
        while let Some(event) = rx.recv().await {
            if let Event::Shutdown(ack) = event {
                shutdown_ack = Some(ack);
                break;
            }
            self.handle(event).await;
            self.publish();
        }

        identity_task.abort();
        self.stop_capture().await;
        self.recording.discard();
        self.publish();
        info!("Studio stopped");

        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    /// Relay identity notifications, starting with the current one
    fn forward_identity(&self) -> JoinHandle<()> {
        let mut identities = self.auth.subscribe();
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                let Some(tx) = events.upgrade() else { break };
                if tx.send(Event::IdentityChanged(identity)).await.is_err() {
                    break;
                }
                drop(tx);

                if identities.changed().await.is_err() {
                    debug!("Auth provider dropped its identity channel");
                    break;
                }
            }
        })
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::SignIn(reply) => self.spawn_auth(AuthAction::SignIn, reply),
            Event::SignOut(reply) => self.spawn_auth(AuthAction::SignOut, reply),
            Event::StartCapture(reply) => self.start_capture(reply),
            Event::StopCapture(reply) => {
                self.stop_capture().await;
                let _ = reply.send(Ok(()));
            }
            Event::StartRecording(reply) => {
                let result = self.start_recording().await;
                let _ = reply.send(result);
            }
            Event::StopRecording(reply) => {
                let result = self.stop_recording().await;
                let _ = reply.send(result);
            }
            Event::Export(reply) => self.export(reply),
            Event::ResizeCanvas {
                width,
                height,
                reply,
            } => {
                let result = self.resize_canvas(width, height).await;
                let _ = reply.send(result);
            }
            Event::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Event::Shutdown(_) => {}

            Event::IdentityChanged(identity) => self.identity_changed(identity).await,
            Event::CaptureResolved { epoch, result } => self.capture_resolved(epoch, result),
            Event::Encoder { epoch, event } => self.encoder_event(epoch, event),
            Event::AuthFinished {
                action,
                result,
                reply,
            } => {
                if let Err(e) = &result {
                    let message = match action {
                        AuthAction::SignIn => {
                            error!("Error logging in: {}", e);
                            "Failed to login. Please try again."
                        }
                        AuthAction::SignOut => {
                            error!("Error logging out: {}", e);
                            "Failed to logout. Please try again."
                        }
                    };
                    self.notify(e, message);
                }
                let _ = reply.send(result);
            }
            Event::ExportFinished { report, reply } => {
                if let Some(e) = report.remote_error() {
                    self.notify(&e, "Failed to save recording. Please try again.");
                }
                if let Some(local) = &report.local_error {
                    let e = StudioError::Host(local.clone());
                    self.notify(&e, format!("Failed to save recording locally: {}", local));
                }
                let _ = reply.send(Ok(report));
            }
        }
    }

    fn next_epoch(&mut self) -> Epoch {
        self.last_epoch += 1;
        Epoch(self.last_epoch)
    }

    fn notify(&self, error: &StudioError, message: impl Into<String>) {
        self.ui.notify(&Notice::new(error, message));
    }

    fn spawn_auth(&self, action: AuthAction, reply: Reply<()>) {
        let auth = Arc::clone(&self.auth);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = match action {
                AuthAction::SignIn => auth.sign_in().await,
                AuthAction::SignOut => auth.sign_out().await,
            };
            if let Some(tx) = events.upgrade() {
                let _ = tx
                    .send(Event::AuthFinished {
                        action,
                        result,
                        reply,
                    })
                    .await;
            }
        });
    }

    async fn resize_canvas(&mut self, width: u32, height: u32) -> StudioResult<()> {
        if pixel_count(width, height).is_none() {
            let e = StudioError::InvalidState(format!(
                "canvas is limited to {}x{}",
                MAX_CANVAS_SIDE, MAX_CANVAS_SIDE
            ));
            warn!("Canvas resize to {}x{} rejected", width, height);
            self.notify(&e, format!("Cannot draw the visualizer at {}x{}", width, height));
            return Err(e);
        }

        debug!("Canvas resized to {}x{}", width, height);
        self.canvas.lock().await.resize(width, height);
        Ok(())
    }

    async fn identity_changed(&mut self, identity: Option<Identity>) {
        match self.gate.apply(identity) {
            AccessChange::Revoked => {
                info!("Access revoked, stopping capture");
                self.stop_capture().await;
            }
            AccessChange::Granted => info!("Access granted"),
            AccessChange::Unchanged => {}
        }
    }

    fn start_capture(&mut self, reply: Reply<StreamInfo>) {
        if !self.gate.is_authorized() {
            warn!("Capture start rejected: not signed in");
            self.notify(&StudioError::Unauthenticated, "Please login to start the camera");
            let _ = reply.send(Err(StudioError::Unauthenticated));
            return;
        }

        let epoch = self.next_epoch();
        if let Err(e) = self.capture.begin(epoch) {
            warn!("Capture start rejected: {}", e);
            let _ = reply.send(Err(e));
            return;
        }
        self.pending_capture = Some(reply);

        let devices = Arc::clone(&self.host.devices);
        let constraints = self.config.constraints;
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = devices.request(constraints).await;
            match events.upgrade() {
                Some(tx) => {
                    if let Err(mpsc::error::SendError(event)) =
                        tx.send(Event::CaptureResolved { epoch, result }).await
                    {
                        release_unclaimed(event);
                    }
                }
                None => release_unclaimed(Event::CaptureResolved { epoch, result }),
            }
        });
    }

    fn capture_resolved(&mut self, epoch: Epoch, result: Result<Box<dyn MediaStream>, CaptureFailure>) {
        if !self.capture.is_pending(epoch) {
            match result {
                Ok(mut stream) => {
                    info!("Releasing stale capture grant {}", epoch);
                    stream.stop_tracks();
                }
                Err(failure) => debug!("Ignoring stale capture failure {}: {}", epoch, failure),
            }
            return;
        }

        let reply = self.pending_capture.take();
        let result = match result {
            Ok(stream) => self
                .capture
                .activate(
                    epoch,
                    stream,
                    Arc::clone(&self.canvas),
                    self.config.fft_size,
                    self.config.frame_interval(),
                    self.config.style,
                )
                .map(|info| {
                    self.ui.bind_preview(Some(&info));
                    info
                })
                .map_err(|e| {
                    error!("Failed to wire audio analysis: {}", e);
                    self.notify(&e, format!("Failed to start audio analysis: {}", e));
                    e
                }),
            Err(failure) => {
                self.capture.fail(epoch);
                error!("Error accessing media devices: {}", failure);
                let e = StudioError::from(failure);
                self.notify(
                    &e,
                    "Failed to access camera and microphone. Please ensure you have granted permission.",
                );
                Err(e)
            }
        };

        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    /// Stop capture from any state. A recording in progress is asked to
    /// finalize first so what it gathered stays exportable.
    async fn stop_capture(&mut self) {
        if let Some(reply) = self.pending_capture.take() {
            let _ = reply.send(Err(StudioError::InvalidState(
                "capture stopped before access was granted".to_string(),
            )));
        }

        if self.recording.state() == RecordingState::Recording {
            if let Err(e) = self.stop_recording().await {
                warn!("Recording stop during capture teardown failed: {}", e);
            }
        }

        if self.capture.stop(&self.canvas).await {
            self.ui.bind_preview(None);
        }
    }

    async fn start_recording(&mut self) -> StudioResult<()> {
        if !self.gate.is_authorized() {
            warn!("Recording start rejected: not signed in");
            self.notify(&StudioError::Unauthenticated, "Please login to record");
            return Err(StudioError::Unauthenticated);
        }
        if self.recording.state() == RecordingState::Recording {
            return Err(StudioError::InvalidState("already recording".to_string()));
        }
        let created = match self.capture.stream() {
            Some(stream) => self.host.encoders.create(stream, &self.config.codec),
            None => {
                return Err(StudioError::InvalidState(format!(
                    "capture is {:?}",
                    self.capture.state()
                )))
            }
        };

        let mut encoder = match created {
            Ok(encoder) => encoder,
            Err(e) => {
                error!("Error creating media encoder: {}", e);
                self.notify(&e, format!("Recording is not supported here: {}", e));
                return Err(e);
            }
        };

        let mut encoder_events = match encoder.start().await {
            Ok(rx) => rx,
            Err(e) => {
                error!("Error starting media encoder: {}", e);
                self.notify(&e, format!("Failed to start recording: {}", e));
                return Err(e);
            }
        };

        let epoch = self.next_epoch();
        self.recording.begin(epoch, encoder);

        // One forwarder per recording keeps fragments ahead of the finalize
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = encoder_events.recv().await {
                let done = matches!(event, EncoderEvent::Stopped);
                let Some(tx) = events.upgrade() else { break };
                if tx.send(Event::Encoder { epoch, event }).await.is_err() || done {
                    break;
                }
            }
            debug!("Encoder forwarder for {} finished", epoch);
        });

        Ok(())
    }

    async fn stop_recording(&mut self) -> StudioResult<()> {
        if self.recording.state() != RecordingState::Recording {
            return Err(StudioError::InvalidState(format!(
                "recording is {:?}",
                self.recording.state()
            )));
        }

        if let Err(e) = self.recording.request_stop().await {
            // The encoder will not report back; freeze what arrived so far
            error!("Error stopping media encoder: {}", e);
            self.notify(&e, format!("Recording did not stop cleanly: {}", e));
            if let Some(epoch) = self.recording.epoch() {
                self.recording.finalize(epoch);
            }
            return Err(e);
        }

        Ok(())
    }

    fn encoder_event(&mut self, epoch: Epoch, event: EncoderEvent) {
        match event {
            EncoderEvent::Data(bytes) => {
                self.recording.append(epoch, bytes);
            }
            EncoderEvent::Stopped => {
                self.recording.finalize(epoch);
            }
        }
    }

    fn export(&mut self, reply: Reply<ExportReport>) {
        let Some(recording) = self.recording.take_finalized() else {
            warn!("Export requested with nothing to export");
            let _ = reply.send(Err(StudioError::NothingToExport));
            return;
        };

        let artifact = Artifact::assemble(recording.fragments(), &self.config.codec, Utc::now());
        let identity = self.gate.identity().cloned();
        let persistence = self.persistence.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let report = persistence.export(artifact, identity.as_ref()).await;
            match events.upgrade() {
                Some(tx) => {
                    if let Err(mpsc::error::SendError(event)) =
                        tx.send(Event::ExportFinished { report, reply }).await
                    {
                        if let Event::ExportFinished { report, reply } = event {
                            let _ = reply.send(Ok(report));
                        }
                    }
                }
                None => {
                    let _ = reply.send(Ok(report));
                }
            }
        });
    }

    fn snapshot(&self) -> StudioStatus {
        StudioStatus {
            identity: self.gate.identity().cloned(),
            authorized: self.gate.is_authorized(),
            capture: self.capture.state(),
            stream: self.capture.stream_info(),
            capture_started_at: self.capture.started_at(),
            recording: self.recording.state(),
            recording_started_at: self.recording.started_at(),
            fragments: self.recording.fragment_count(),
            export_ready: self.recording.export_ready(),
            controls: self.derive_controls(),
        }
    }

    fn derive_controls(&self) -> Controls {
        Controls::derive(
            self.gate.identity().is_some(),
            self.gate.is_authorized(),
            self.capture.state(),
            self.recording.state(),
            self.recording.export_ready(),
        )
    }

    /// Push controls to the UI if they changed and refresh the status channel
    fn publish(&mut self) {
        let status = self.snapshot();
        if self.controls != Some(status.controls) {
            self.ui.update_controls(&status.controls);
            self.controls = Some(status.controls);
        }
        self.status_tx.send_replace(status);
    }
}

/// A grant nobody will claim still owns live tracks
fn release_unclaimed(event: Event) {
    if let Event::CaptureResolved {
        epoch,
        result: Ok(mut stream),
    } = event
    {
        info!("Releasing capture grant {} after studio shutdown", epoch);
        stream.stop_tracks();
    }
}

/// Cloneable front door to a running [`Studio`]
#[derive(Clone)]
pub struct StudioHandle {
    tx: mpsc::Sender<Event>,
    status: watch::Receiver<StudioStatus>,
}

impl StudioHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Event) -> StudioResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StudioError::Closed)?;
        reply_rx.await.map_err(|_| StudioError::Closed)?
    }

    pub async fn sign_in(&self) -> StudioResult<()> {
        self.request(Event::SignIn).await
    }

    pub async fn sign_out(&self) -> StudioResult<()> {
        self.request(Event::SignOut).await
    }

    /// Resolves once the host grants or refuses, or the request is superseded
    pub async fn start_capture(&self) -> StudioResult<StreamInfo> {
        self.request(Event::StartCapture).await
    }

    pub async fn stop_capture(&self) -> StudioResult<()> {
        self.request(Event::StopCapture).await
    }

    pub async fn start_recording(&self) -> StudioResult<()> {
        self.request(Event::StartRecording).await
    }

    /// Resolves once the encoder was asked to finalize; the finalized
    /// recording shows up as `export_ready` in the status
    pub async fn stop_recording(&self) -> StudioResult<()> {
        self.request(Event::StopRecording).await
    }

    pub async fn export(&self) -> StudioResult<ExportReport> {
        self.request(Event::Export).await
    }

    /// Fails with `InvalidState` past `MAX_CANVAS_SIDE` on either side
    pub async fn resize_canvas(&self, width: u32, height: u32) -> StudioResult<()> {
        self.request(|reply| Event::ResizeCanvas {
            width,
            height,
            reply,
        })
        .await
    }

    /// Status after every previously sent command has been handled
    pub async fn status(&self) -> StudioResult<StudioStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Event::Status(reply_tx))
            .await
            .map_err(|_| StudioError::Closed)?;
        reply_rx.await.map_err(|_| StudioError::Closed)
    }

    /// Status updates published after every handled event
    pub fn subscribe(&self) -> watch::Receiver<StudioStatus> {
        self.status.clone()
    }

    /// Wait until the published status satisfies `f`
    pub async fn wait_for(
        &self,
        f: impl FnMut(&StudioStatus) -> bool,
    ) -> StudioResult<StudioStatus> {
        let mut rx = self.status.clone();
        let status = rx.wait_for(f).await.map_err(|_| StudioError::Closed)?;
        Ok(status.clone())
    }

    /// Stop capture, drop any recording and end the studio task
    pub async fn shutdown(&self) -> StudioResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Event::Shutdown(ack_tx))
            .await
            .map_err(|_| StudioError::Closed)?;
        ack_rx.await.map_err(|_| StudioError::Closed)
    }
}
