//! Capture/record session management
//!
//! This module provides the `Studio` aggregate that manages:
//! - The capture session (stream, analyzer, visualizer loop)
//! - The recording session (encoder, fragment sequence)
//! - The access gate and export hand-off
//! - Entry-point enablement pushed to the UI surface

mod capture;
mod config;
mod controls;
mod recording;
mod studio;

use serde::Serialize;

pub use capture::{CaptureSession, CaptureState};
pub use config::StudioConfig;
pub use controls::Controls;
pub use recording::{FinalizedRecording, RecordingSession, RecordingState};
pub use studio::{Studio, StudioDeps, StudioHandle, StudioStatus};

/// Sequence number tying an asynchronous notification to the capture request
/// or recording that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Epoch(pub u64);

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
