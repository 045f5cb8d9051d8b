// Tests for the WAV-file backed host
//
// Run with: cargo test --test file_host_tests

use anyhow::Result;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use webcam_studio::host::TrackKind;
use webcam_studio::{
    CaptureConstraints, CaptureFailure, CodecPairing, EncoderEvent, EncoderFactory, FileHost,
    FileHostConfig, FrequencyAnalyzer, MediaDevices, MediaEncoder, MediaStream, StudioError,
};

fn tone() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tone.wav")
}

fn host() -> FileHost {
    FileHost::new(FileHostConfig::new(tone()))
}

#[tokio::test]
async fn test_request_grants_audio_and_video_tracks() -> Result<()> {
    let stream = host().request(CaptureConstraints::default()).await?;

    let kinds: Vec<TrackKind> = stream.tracks().iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TrackKind::Audio, TrackKind::Video]);
    assert!(stream.is_live());
    assert!(!stream.id().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_missing_source_is_no_device() {
    let host = FileHost::new(FileHostConfig::new("/nonexistent/mic.wav"));

    let result = host.request(CaptureConstraints::default()).await;
    assert!(matches!(result, Err(CaptureFailure::NoDevice(_))));
}

#[tokio::test]
async fn test_video_without_camera_is_no_device() {
    let host = FileHost::new(FileHostConfig {
        provides_video: false,
        ..FileHostConfig::new(tone())
    });

    let result = host.request(CaptureConstraints::default()).await;
    assert!(matches!(result, Err(CaptureFailure::NoDevice(_))));

    let audio_only = host
        .request(CaptureConstraints {
            video: false,
            audio: true,
        })
        .await;
    assert!(audio_only.is_ok());
}

#[tokio::test]
async fn test_analyzer_sees_the_tone_until_stopped() -> Result<()> {
    let mut stream = host().request(CaptureConstraints::default()).await?;

    let mut analyzer = stream.create_analyzer(256)?;
    assert_eq!(analyzer.frequency_bin_count(), 128);

    let mut bins = vec![0u8; analyzer.frequency_bin_count()];
    analyzer.byte_frequency_data(&mut bins);
    assert!(bins.iter().any(|&b| b > 0), "tone should show up in the spectrum");

    stream.stop_tracks();
    stream.stop_tracks();
    assert!(!stream.is_live());

    analyzer.byte_frequency_data(&mut bins);
    assert!(bins.iter().all(|&b| b == 0));
    analyzer.close();
    analyzer.close();

    Ok(())
}

#[tokio::test]
async fn test_analyzer_rejects_bad_window() -> Result<()> {
    let stream = host().request(CaptureConstraints::default()).await?;

    assert!(matches!(
        stream.create_analyzer(100),
        Err(StudioError::Host(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_encoder_refuses_unlisted_codec() -> Result<()> {
    let host = host();
    let stream = host.request(CaptureConstraints::default()).await?;

    let result = host
        .encoders()
        .create(stream.as_ref(), &CodecPairing::default());
    assert!(matches!(result, Err(StudioError::CodecUnsupported(_))));

    Ok(())
}

#[tokio::test]
async fn test_encoder_emits_one_wav_fragment_then_stops() -> Result<()> {
    let host = host();
    let stream = host.request(CaptureConstraints::default()).await?;

    let mut encoder = host
        .encoders()
        .create(stream.as_ref(), &CodecPairing::new("audio/wav"))?;
    assert_eq!(encoder.mime_type(), "audio/wav");

    let mut events = encoder.start().await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    encoder.stop().await?;

    let Some(EncoderEvent::Data(bytes)) = events.recv().await else {
        panic!("expected a data fragment first");
    };
    assert_eq!(events.recv().await, Some(EncoderEvent::Stopped));
    assert_eq!(events.recv().await, None);

    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    assert_eq!(reader.spec().sample_rate, 16_000);
    assert_eq!(reader.spec().channels, 1);
    // Roughly the 100ms that passed between start and stop
    assert!(reader.duration() >= 1_600);

    // A second stop has nothing left to finalize
    encoder.stop().await?;

    Ok(())
}
