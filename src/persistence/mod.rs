//! Export of finished recordings
//!
//! A finalized recording becomes an [`Artifact`], which is optionally
//! uploaded and registered with the metadata store, then always handed to the
//! local saver.

mod fs;

pub use fs::{DirectorySaver, FsObjectStore, JsonlMetadataStore};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::Identity;
use crate::error::StudioError;
use crate::host::CodecPairing;

/// Default byte rate used for the duration estimate
pub const DEFAULT_BYTES_PER_SECOND: u64 = 16_000;

/// Recorded media ready to leave the studio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Concatenate fragments in order and name the result after `now`
    pub fn assemble(fragments: &[Vec<u8>], codec: &CodecPairing, now: DateTime<Utc>) -> Self {
        let bytes = fragments.concat();
        Self {
            name: format!("recording-{}.{}", now.timestamp_millis(), codec.extension()),
            mime_type: codec.container().to_string(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Rough duration in whole seconds for a given byte rate
    pub fn estimated_duration_secs(&self, bytes_per_second: u64) -> u64 {
        if bytes_per_second == 0 {
            return 0;
        }
        (self.bytes.len() as f64 / bytes_per_second as f64).round() as u64
    }
}

/// Location of an uploaded object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub path: String,
}

/// Metadata row written after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub user_id: String,
    pub title: String,
    pub recording_url: String,
    /// Estimated duration in seconds
    pub duration: u64,
}

/// Where a local save ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedArtifact {
    pub location: String,
}

/// Object storage collaborator
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<ObjectRef>;

    fn public_url(&self, path: &str) -> String;
}

/// Metadata store collaborator
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert(&self, record: &RecordingRecord) -> Result<()>;
}

/// Local save collaborator
#[async_trait]
pub trait LocalSaver: Send + Sync {
    async fn save(&self, artifact: &Artifact) -> Result<SavedArtifact>;
}

/// What happened to the remote half of an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// No store configured or nobody signed in
    Skipped,
    Stored { record: RecordingRecord },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub artifact_name: String,
    pub size_bytes: usize,
    pub remote: RemoteOutcome,
    pub saved: Option<SavedArtifact>,
    pub local_error: Option<String>,
}

impl ExportReport {
    pub fn remote_error(&self) -> Option<StudioError> {
        match &self.remote {
            RemoteOutcome::Failed { error } => Some(StudioError::Transport(error.clone())),
            _ => None,
        }
    }
}

/// Runs one export: remote upload + metadata (optional), then local save
#[derive(Clone)]
pub struct PersistenceBridge {
    object_store: Option<Arc<dyn ObjectStore>>,
    metadata: Option<Arc<dyn MetadataStore>>,
    saver: Arc<dyn LocalSaver>,
    bytes_per_second: u64,
}

impl PersistenceBridge {
    pub fn new(saver: Arc<dyn LocalSaver>) -> Self {
        Self {
            object_store: None,
            metadata: None,
            saver,
            bytes_per_second: DEFAULT_BYTES_PER_SECOND,
        }
    }

    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn with_metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(store);
        self
    }

    pub fn with_bytes_per_second(mut self, bytes_per_second: u64) -> Self {
        self.bytes_per_second = bytes_per_second;
        self
    }

    pub async fn export(&self, artifact: Artifact, identity: Option<&Identity>) -> ExportReport {
        info!("Exporting {} ({} bytes)", artifact.name, artifact.size());

        let remote = match (&self.object_store, identity) {
            (Some(store), Some(identity)) => {
                match self.store_remote(store.as_ref(), &artifact, identity).await {
                    Ok(record) => {
                        info!("Stored {} at {}", record.title, record.recording_url);
                        RemoteOutcome::Stored { record }
                    }
                    Err(e) => {
                        error!("Error saving recording: {:#}", e);
                        RemoteOutcome::Failed {
                            error: format!("{:#}", e),
                        }
                    }
                }
            }
            (Some(_), None) => {
                warn!("No identity established, skipping upload");
                RemoteOutcome::Skipped
            }
            (None, _) => RemoteOutcome::Skipped,
        };

        let (saved, local_error) = match self.saver.save(&artifact).await {
            Ok(saved) => {
                info!("Saved {} locally to {}", artifact.name, saved.location);
                (Some(saved), None)
            }
            Err(e) => {
                error!("Local save of {} failed: {:#}", artifact.name, e);
                (None, Some(format!("{:#}", e)))
            }
        };

        ExportReport {
            artifact_name: artifact.name.clone(),
            size_bytes: artifact.size(),
            remote,
            saved,
            local_error,
        }
    }

    async fn store_remote(
        &self,
        store: &dyn ObjectStore,
        artifact: &Artifact,
        identity: &Identity,
    ) -> Result<RecordingRecord> {
        let path = format!("{}/{}", identity.id, artifact.name);
        let object = store.upload(&path, &artifact.bytes).await?;

        let record = RecordingRecord {
            user_id: identity.id.clone(),
            title: artifact.name.clone(),
            recording_url: store.public_url(&object.path),
            duration: artifact.estimated_duration_secs(self.bytes_per_second),
        };

        if let Some(metadata) = &self.metadata {
            metadata.insert(&record).await?;
        }

        Ok(record)
    }
}
