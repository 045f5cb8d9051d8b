use serde::Serialize;

use super::{CaptureState, RecordingState};

/// Which UI entry points are enabled (or visible, for login/logout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Controls {
    pub login: bool,
    pub logout: bool,
    pub start_capture: bool,
    pub stop_capture: bool,
    pub start_recording: bool,
    pub stop_recording: bool,
    pub download: bool,
}

impl Controls {
    /// Derive enablement from the current studio state
    pub fn derive(
        signed_in: bool,
        authorized: bool,
        capture: CaptureState,
        recording: RecordingState,
        export_ready: bool,
    ) -> Self {
        Self {
            login: !signed_in,
            logout: signed_in,
            start_capture: authorized && capture == CaptureState::Idle,
            stop_capture: capture != CaptureState::Idle,
            start_recording: authorized
                && capture == CaptureState::Active
                && recording != RecordingState::Recording,
            stop_recording: recording == RecordingState::Recording,
            download: export_ready,
        }
    }
}
