//! Error taxonomy for studio operations
//!
//! Every failure that reaches a user-facing entry point is one of these.
//! Infrastructure code (config loading, file IO in the bundled collaborators)
//! stays on `anyhow` and is folded into [`StudioError::Host`] or
//! [`StudioError::Transport`] at the boundary.

use serde::Serialize;
use thiserror::Error;

use crate::host::CaptureFailure;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StudioError {
    #[error("Permission to use the camera and microphone was denied")]
    PermissionDenied,

    #[error("No capture device available: {0}")]
    DeviceUnavailable(String),

    #[error("Codec pairing not supported by the host: {0}")]
    CodecUnsupported(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Sign in required")]
    Unauthenticated,

    #[error("Operation not valid while {0}")]
    InvalidState(String),

    #[error("No finished recording to export")]
    NothingToExport,

    #[error("Host error: {0}")]
    Host(String),

    #[error("Studio is shut down")]
    Closed,
}

impl StudioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StudioError::PermissionDenied => ErrorKind::PermissionDenied,
            StudioError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            StudioError::CodecUnsupported(_) => ErrorKind::CodecUnsupported,
            StudioError::Transport(_) => ErrorKind::Transport,
            StudioError::Unauthenticated => ErrorKind::Unauthenticated,
            StudioError::InvalidState(_) | StudioError::NothingToExport => ErrorKind::InvalidState,
            StudioError::Host(_) | StudioError::Closed => ErrorKind::Host,
        }
    }
}

impl From<CaptureFailure> for StudioError {
    fn from(failure: CaptureFailure) -> Self {
        match failure {
            CaptureFailure::PermissionDenied => StudioError::PermissionDenied,
            CaptureFailure::NoDevice(reason) => StudioError::DeviceUnavailable(reason),
            CaptureFailure::Other(reason) => StudioError::Host(reason),
        }
    }
}

/// Coarse classification carried by user notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    CodecUnsupported,
    Transport,
    Unauthenticated,
    InvalidState,
    Host,
}

pub type StudioResult<T> = std::result::Result<T, StudioError>;
