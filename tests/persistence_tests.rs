// Tests for the export bridge and the filesystem collaborators
//
// Run with: cargo test --test persistence_tests

mod common;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use common::{identity, FailingMetadata, MemorySaver};
use std::sync::Arc;
use tempfile::TempDir;
use webcam_studio::{
    Artifact, CodecPairing, DirectorySaver, FsObjectStore, JsonlMetadataStore, ObjectStore,
    PersistenceBridge, RemoteOutcome,
};

fn artifact(bytes: usize) -> Artifact {
    let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    Artifact::assemble(&[vec![0xab; bytes]], &CodecPairing::default(), now)
}

struct Stores {
    _dir: TempDir,
    bridge: PersistenceBridge,
    objects: Arc<FsObjectStore>,
    metadata: Arc<JsonlMetadataStore>,
    downloads: std::path::PathBuf,
}

fn stores() -> Result<Stores> {
    let dir = TempDir::new()?;
    let objects = Arc::new(FsObjectStore::new(
        dir.path().join("storage"),
        "recordings",
        "http://localhost:8080/storage/recordings",
    ));
    let metadata = Arc::new(JsonlMetadataStore::new(dir.path().join("recordings.jsonl")));
    let downloads = dir.path().join("downloads");

    let bridge = PersistenceBridge::new(Arc::new(DirectorySaver::new(&downloads)))
        .with_object_store(objects.clone())
        .with_metadata_store(metadata.clone())
        .with_bytes_per_second(1_000);

    Ok(Stores {
        _dir: dir,
        bridge,
        objects,
        metadata,
        downloads,
    })
}

#[tokio::test]
async fn test_export_uploads_records_and_saves() -> Result<()> {
    let stores = stores()?;
    let artifact = artifact(2_500);

    let report = stores.bridge.export(artifact.clone(), Some(&identity())).await;

    let RemoteOutcome::Stored { record } = &report.remote else {
        panic!("expected upload to succeed: {:?}", report.remote);
    };
    assert_eq!(record.user_id, "user-1");
    assert_eq!(record.title, "recording-1700000000000.webm");
    assert_eq!(record.duration, 3);
    assert_eq!(
        record.recording_url,
        "http://localhost:8080/storage/recordings/user-1/recording-1700000000000.webm"
    );

    let uploaded = tokio::fs::read(
        stores
            .objects
            .bucket_dir()
            .join("user-1/recording-1700000000000.webm"),
    )
    .await?;
    assert_eq!(uploaded, artifact.bytes);

    let records = stores.metadata.records().await?;
    assert_eq!(records, vec![record.clone()]);

    let saved = report.saved.expect("local save");
    let local = tokio::fs::read(&saved.location).await?;
    assert_eq!(local, artifact.bytes);
    assert!(saved
        .location
        .starts_with(&stores.downloads.display().to_string()));
    assert!(report.local_error.is_none());

    Ok(())
}

#[tokio::test]
async fn test_export_without_identity_stays_local() -> Result<()> {
    let stores = stores()?;

    let report = stores.bridge.export(artifact(10), None).await;

    assert_eq!(report.remote, RemoteOutcome::Skipped);
    assert!(report.saved.is_some());
    assert!(stores.metadata.records().await?.is_empty());
    assert!(!stores.objects.bucket_dir().exists());

    Ok(())
}

#[tokio::test]
async fn test_upload_never_overwrites() -> Result<()> {
    let stores = stores()?;
    let artifact = artifact(10);

    let first = stores.bridge.export(artifact.clone(), Some(&identity())).await;
    assert!(matches!(first.remote, RemoteOutcome::Stored { .. }));

    let second = stores.bridge.export(artifact, Some(&identity())).await;
    assert!(matches!(second.remote, RemoteOutcome::Failed { .. }));
    assert!(second.remote_error().is_some());
    // Local save is still attempted after the remote failure
    assert!(second.saved.is_some());
    assert_eq!(stores.metadata.records().await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_metadata_failure_fails_remote_but_saves_locally() -> Result<()> {
    let dir = TempDir::new()?;
    let saver = Arc::new(MemorySaver::default());
    let bridge = PersistenceBridge::new(saver.clone())
        .with_object_store(Arc::new(FsObjectStore::new(
            dir.path(),
            "recordings",
            "http://localhost",
        )))
        .with_metadata_store(Arc::new(FailingMetadata));

    let report = bridge.export(artifact(4), Some(&identity())).await;

    match &report.remote {
        RemoteOutcome::Failed { error } => assert!(error.contains("insert rejected")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(saver.saved().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_object_store_rejects_escaping_paths() -> Result<()> {
    let dir = TempDir::new()?;
    let store = FsObjectStore::new(dir.path(), "recordings", "http://localhost");

    assert!(store.upload("../outside.webm", b"x").await.is_err());
    assert!(store.upload("", b"x").await.is_err());
    assert!(!dir.path().join("outside.webm").exists());

    Ok(())
}
