use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{Artifact, LocalSaver, MetadataStore, ObjectRef, ObjectStore, RecordingRecord, SavedArtifact};

/// Object store laid out as `<root>/<bucket>/<path>` on disk
pub struct FsObjectStore {
    bucket_dir: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, bucket: &str, public_base_url: &str) -> Self {
        Self {
            bucket_dir: root.into().join(bucket),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("Invalid object path: {:?}", path);
        }
        Ok(self.bucket_dir.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<ObjectRef> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        // Uploads never overwrite an existing object
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .with_context(|| format!("Failed to create object {:?}", target))?;
        file.write_all(bytes)
            .await
            .context("Failed to write object")?;
        file.flush().await.context("Failed to flush object")?;

        info!("Uploaded {} bytes to {:?}", bytes.len(), target);

        Ok(ObjectRef {
            path: path.to_string(),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }
}

/// Metadata store appending one JSON object per line
pub struct JsonlMetadataStore {
    path: PathBuf,
}

impl JsonlMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn records(&self) -> Result<Vec<RecordingRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read metadata store"),
        };

        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("Corrupt metadata record"))
            .collect()
    }
}

#[async_trait]
impl MetadataStore for JsonlMetadataStore {
    async fn insert(&self, record: &RecordingRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create metadata directory")?;
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open metadata store {:?}", self.path))?;
        file.write_all(&line)
            .await
            .context("Failed to append metadata record")?;
        file.flush().await?;

        info!("Recorded metadata for {}", record.title);
        Ok(())
    }
}

/// Saves artifacts into a downloads directory
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl LocalSaver for DirectorySaver {
    async fn save(&self, artifact: &Artifact) -> Result<SavedArtifact> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create downloads directory {:?}", self.dir))?;

        let target = self.dir.join(&artifact.name);
        tokio::fs::write(&target, &artifact.bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", target))?;

        Ok(SavedArtifact {
            location: target.display().to_string(),
        })
    }
}
