use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::Epoch;
use crate::error::{StudioError, StudioResult};
use crate::host::{MediaStream, StreamInfo};
use crate::visualizer::{BarStyle, SharedCanvas, VisualizerLoop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Requesting,
    Active,
}

/// Live capture: owns the stream, and the analyzer through its visualizer loop
struct ActiveCapture {
    epoch: Epoch,
    stream: Box<dyn MediaStream>,
    visualizer: VisualizerLoop,
    started_at: DateTime<Utc>,
}

enum Phase {
    Idle,
    Requesting { epoch: Epoch },
    Active(ActiveCapture),
}

/// Capture state machine: `Idle -> Requesting -> Active -> Idle`
pub struct CaptureSession {
    phase: Phase,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    pub fn state(&self) -> CaptureState {
        match self.phase {
            Phase::Idle => CaptureState::Idle,
            Phase::Requesting { .. } => CaptureState::Requesting,
            Phase::Active(_) => CaptureState::Active,
        }
    }

    pub fn stream(&self) -> Option<&dyn MediaStream> {
        match &self.phase {
            Phase::Active(active) => Some(active.stream.as_ref()),
            _ => None,
        }
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.stream().map(|s| s.info())
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match &self.phase {
            Phase::Active(active) => Some(active.started_at),
            _ => None,
        }
    }

    /// `Idle -> Requesting`
    pub fn begin(&mut self, epoch: Epoch) -> StudioResult<()> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(StudioError::InvalidState(format!(
                "capture is {:?}",
                self.state()
            )));
        }

        info!("Requesting capture {}", epoch);
        self.phase = Phase::Requesting { epoch };
        Ok(())
    }

    /// Whether a resolution for `epoch` is still wanted
    pub fn is_pending(&self, epoch: Epoch) -> bool {
        matches!(self.phase, Phase::Requesting { epoch: e } if e == epoch)
    }

    /// `Requesting -> Active`: wire the analyzer and start drawing
    ///
    /// If the analyzer cannot be created the stream is released and the
    /// session returns to `Idle`.
    pub fn activate(
        &mut self,
        epoch: Epoch,
        mut stream: Box<dyn MediaStream>,
        canvas: SharedCanvas,
        fft_size: usize,
        frame_interval: Duration,
        style: BarStyle,
    ) -> StudioResult<StreamInfo> {
        if !self.is_pending(epoch) {
            stream.stop_tracks();
            return Err(StudioError::InvalidState(format!(
                "capture {} is no longer pending",
                epoch
            )));
        }

        let analyzer = match stream.create_analyzer(fft_size) {
            Ok(a) => a,
            Err(e) => {
                stream.stop_tracks();
                self.phase = Phase::Idle;
                return Err(e);
            }
        };

        let info = stream.info();
        let visualizer = VisualizerLoop::spawn(analyzer, canvas, frame_interval, style);
        self.phase = Phase::Active(ActiveCapture {
            epoch,
            stream,
            visualizer,
            started_at: Utc::now(),
        });

        info!(
            "Capture {} active: stream {} ({} tracks)",
            epoch,
            info.id,
            info.tracks.len()
        );
        Ok(info)
    }

    /// `Requesting -> Idle` after the host refused
    pub fn fail(&mut self, epoch: Epoch) -> bool {
        if self.is_pending(epoch) {
            self.phase = Phase::Idle;
            true
        } else {
            false
        }
    }

    /// Tear everything down and return to `Idle`
    ///
    /// The visualizer is cancelled and awaited before any track is released,
    /// so no frame is drawn against a stopped stream. Returns whether a live
    /// stream was released. Safe to call in any state, any number of times.
    pub async fn stop(&mut self, canvas: &SharedCanvas) -> bool {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => false,
            Phase::Requesting { epoch } => {
                info!("Capture request {} superseded by stop", epoch);
                false
            }
            Phase::Active(mut active) => {
                info!("Stopping capture {}", active.epoch);

                let analyzer = active.visualizer.cancel().await;
                active.stream.stop_tracks();

                match analyzer {
                    Some(mut analyzer) => analyzer.close(),
                    None => warn!("Visualizer did not hand back its analyzer"),
                }

                canvas.lock().await.clear();

                info!("Capture {} stopped", active.epoch);
                true
            }
        }
    }
}
