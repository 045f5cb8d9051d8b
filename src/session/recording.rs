use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::Epoch;
use crate::error::{StudioError, StudioResult};
use crate::host::MediaEncoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Inactive,
    Recording,
    /// Stop requested, waiting for the encoder to finalize
    Stopping,
}

/// A recording whose fragment sequence is frozen
#[derive(Debug)]
pub struct FinalizedRecording {
    epoch: Epoch,
    mime_type: String,
    fragments: Vec<Vec<u8>>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl FinalizedRecording {
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn fragments(&self) -> &[Vec<u8>] {
        &self.fragments
    }

    pub fn size(&self) -> usize {
        self.fragments.iter().map(Vec::len).sum()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }
}

struct ActiveRecording {
    epoch: Epoch,
    encoder: Box<dyn MediaEncoder>,
    fragments: Vec<Vec<u8>>,
    stopping: bool,
    started_at: DateTime<Utc>,
}

/// Recording state machine: `Inactive -> Recording -> (Stopping) -> Inactive`
///
/// Holds at most one recording: either the one in progress or the last
/// finalized one waiting for export.
#[derive(Default)]
pub struct RecordingSession {
    active: Option<ActiveRecording>,
    finalized: Option<FinalizedRecording>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordingState {
        match &self.active {
            None => RecordingState::Inactive,
            Some(r) if r.stopping => RecordingState::Stopping,
            Some(_) => RecordingState::Recording,
        }
    }

    pub fn epoch(&self) -> Option<Epoch> {
        self.active.as_ref().map(|r| r.epoch)
    }

    pub fn fragment_count(&self) -> usize {
        match (&self.active, &self.finalized) {
            (Some(r), _) => r.fragments.len(),
            (None, Some(f)) => f.fragments.len(),
            (None, None) => 0,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.active.as_ref().map(|r| r.started_at)
    }

    pub fn export_ready(&self) -> bool {
        self.finalized.is_some()
    }

    /// Start a fresh recording with an already started encoder
    ///
    /// Any previous fragment sequence, finalized or not, is discarded.
    pub fn begin(&mut self, epoch: Epoch, encoder: Box<dyn MediaEncoder>) {
        if let Some(previous) = self.active.take() {
            warn!(
                "Discarding unfinished recording {} ({} fragments)",
                previous.epoch,
                previous.fragments.len()
            );
        }
        if let Some(previous) = self.finalized.take() {
            info!("Discarding unexported recording {}", previous.epoch);
        }

        info!("Recording {} started ({})", epoch, encoder.mime_type());
        self.active = Some(ActiveRecording {
            epoch,
            encoder,
            fragments: Vec::new(),
            stopping: false,
            started_at: Utc::now(),
        });
    }

    /// Append a fragment emitted for `epoch`. Empty fragments and fragments of
    /// any other recording are dropped.
    pub fn append(&mut self, epoch: Epoch, fragment: Vec<u8>) -> bool {
        if fragment.is_empty() {
            debug!("Ignoring empty fragment for {}", epoch);
            return false;
        }

        match &mut self.active {
            Some(recording) if recording.epoch == epoch => {
                recording.fragments.push(fragment);
                true
            }
            _ => {
                debug!("Ignoring fragment for stale recording {}", epoch);
                false
            }
        }
    }

    /// `Recording -> Stopping`: ask the encoder to finalize
    pub async fn request_stop(&mut self) -> StudioResult<()> {
        let state = self.state();
        let Some(recording) = self.active.as_mut().filter(|r| !r.stopping) else {
            return Err(StudioError::InvalidState(format!("recording is {:?}", state)));
        };

        info!("Stopping recording {}", recording.epoch);
        recording.stopping = true;
        recording.encoder.stop().await
    }

    /// Freeze the fragment sequence of `epoch` once the encoder reports it is
    /// done. Returns false for any other epoch.
    pub fn finalize(&mut self, epoch: Epoch) -> bool {
        match &self.active {
            Some(r) if r.epoch == epoch => {}
            _ => {
                debug!("Ignoring finalize for stale recording {}", epoch);
                return false;
            }
        }

        let Some(recording) = self.active.take() else {
            return false;
        };

        let finalized = FinalizedRecording {
            epoch: recording.epoch,
            mime_type: recording.encoder.mime_type().to_string(),
            fragments: recording.fragments,
            started_at: recording.started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Recording {} finalized: {} fragments, {} bytes",
            finalized.epoch,
            finalized.fragments.len(),
            finalized.size()
        );
        self.finalized = Some(finalized);
        true
    }

    /// Hand the finalized recording over for export; at most once
    pub fn take_finalized(&mut self) -> Option<FinalizedRecording> {
        self.finalized.take()
    }

    /// Drop everything, in progress or finalized
    pub fn discard(&mut self) {
        self.active = None;
        self.finalized = None;
    }
}
