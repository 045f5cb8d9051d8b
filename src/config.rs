use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::auth::Identity;
use crate::host::{CaptureConstraints, CodecPairing, FileHostConfig};
use crate::session::StudioConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub recording: RecordingConfig,
    pub access: AccessConfig,
    pub storage: StorageConfig,
    pub downloads: DownloadsConfig,
    pub host: HostConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    pub video: bool,
    pub audio: bool,
    pub fft_size: usize,
    pub frame_rate: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    pub mime_type: String,
    pub bytes_per_second: u64,
}

#[derive(Debug, Deserialize)]
pub struct AccessConfig {
    pub require_login: bool,
    pub identity: Identity,
    /// Start with the identity already established
    #[serde(default)]
    pub restore_session: bool,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub enabled: bool,
    pub root: String,
    pub bucket: String,
    pub public_base_url: String,
    pub metadata_path: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadsConfig {
    pub dir: String,
}

#[derive(Debug, Deserialize)]
pub struct HostConfig {
    pub source: String,
    pub provides_video: bool,
    pub supported_mime_types: Vec<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("STUDIO").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn studio(&self) -> StudioConfig {
        StudioConfig {
            constraints: CaptureConstraints {
                video: self.capture.video,
                audio: self.capture.audio,
            },
            fft_size: self.capture.fft_size,
            frame_rate: self.capture.frame_rate,
            codec: CodecPairing::new(self.recording.mime_type.clone()),
            require_login: self.access.require_login,
            ..StudioConfig::default()
        }
    }

    pub fn file_host(&self) -> FileHostConfig {
        FileHostConfig {
            source: PathBuf::from(&self.host.source),
            provides_video: self.host.provides_video,
            supported_mime_types: self.host.supported_mime_types.clone(),
        }
    }
}
