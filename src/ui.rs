//! UI surface the studio reports to
//!
//! The studio pushes entry-point enablement, blocking notices and the preview
//! binding; it never reads anything back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::{ErrorKind, StudioError};
use crate::host::StreamInfo;
use crate::session::Controls;

/// How many notices [`UiState`] keeps
const NOTICE_HISTORY: usize = 50;

/// A user-visible failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(error: &StudioError, message: impl Into<String>) -> Self {
        Self {
            kind: error.kind(),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

pub trait UiSurface: Send + Sync {
    fn update_controls(&self, controls: &Controls);

    /// Show a blocking notification
    fn notify(&self, notice: &Notice);

    /// Bind the live preview to a stream, or unbind it
    fn bind_preview(&self, stream: Option<&StreamInfo>);
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UiSnapshot {
    pub controls: Controls,
    pub preview: Option<StreamInfo>,
    pub notices: Vec<Notice>,
}

/// UI surface that keeps the latest state in memory for polling clients
#[derive(Default)]
pub struct UiState {
    inner: Mutex<UiInner>,
}

#[derive(Default)]
struct UiInner {
    controls: Controls,
    preview: Option<StreamInfo>,
    notices: VecDeque<Notice>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UiSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        UiSnapshot {
            controls: inner.controls,
            preview: inner.preview.clone(),
            notices: inner.notices.iter().cloned().collect(),
        }
    }
}

impl UiSurface for UiState {
    fn update_controls(&self, controls: &Controls) {
        debug!("Controls: {:?}", controls);
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .controls = *controls;
    }

    fn notify(&self, notice: &Notice) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.notices.len() == NOTICE_HISTORY {
            inner.notices.pop_front();
        }
        inner.notices.push_back(notice.clone());
    }

    fn bind_preview(&self, stream: Option<&StreamInfo>) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .preview = stream.cloned();
    }
}
