use crate::session::StudioHandle;
use crate::ui::UiState;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The running studio
    pub studio: StudioHandle,

    /// UI surface the studio reports to (controls, notices, preview)
    pub ui: Arc<UiState>,

    /// Object store root served under /storage, if uploads are enabled
    pub storage_root: Option<PathBuf>,
}

impl AppState {
    pub fn new(studio: StudioHandle, ui: Arc<UiState>) -> Self {
        Self {
            studio,
            ui,
            storage_root: None,
        }
    }

    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(root.into());
        self
    }
}
