use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webcam_studio::{
    create_router, AppState, Config, DirectorySaver, FileHost, FsObjectStore, Host,
    JsonlMetadataStore, LocalAuth, PersistenceBridge, RasterCanvas, Studio, StudioDeps, UiState,
};

#[derive(Parser, Debug)]
#[command(name = "webcam-studio", about = "Camera/microphone capture, recording and export")]
struct Args {
    /// Config file path, without extension
    #[arg(short, long, default_value = "config/webcam-studio")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config))?;

    info!("Webcam Studio v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Audio source: {}", cfg.host.source);

    let file_host = Arc::new(FileHost::new(cfg.file_host()));
    let host = Host::new(file_host.clone(), Arc::new(file_host.encoders()));

    let auth = if cfg.access.restore_session {
        LocalAuth::signed_in(cfg.access.identity.clone())
    } else {
        LocalAuth::new(cfg.access.identity.clone())
    };

    let mut persistence = PersistenceBridge::new(Arc::new(DirectorySaver::new(&cfg.downloads.dir)))
        .with_bytes_per_second(cfg.recording.bytes_per_second);
    if cfg.storage.enabled {
        persistence = persistence
            .with_object_store(Arc::new(FsObjectStore::new(
                &cfg.storage.root,
                &cfg.storage.bucket,
                &cfg.storage.public_base_url,
            )))
            .with_metadata_store(Arc::new(JsonlMetadataStore::new(&cfg.storage.metadata_path)));
    } else {
        warn!("Storage disabled: recordings are only saved locally");
    }

    let ui = Arc::new(UiState::new());
    let canvas = Arc::new(tokio::sync::Mutex::new(RasterCanvas::new(
        cfg.capture.canvas_width,
        cfg.capture.canvas_height,
    )));

    let studio = Studio::spawn(
        cfg.studio(),
        StudioDeps {
            host,
            auth: Arc::new(auth),
            ui: ui.clone(),
            canvas,
            persistence,
        },
    );

    let mut state = AppState::new(studio.clone(), ui);
    if cfg.storage.enabled {
        state = state.with_storage_root(&cfg.storage.root);
    }
    let app = create_router(state);

    let bind = args.bind.unwrap_or(cfg.service.http.bind);
    let port = args.port.unwrap_or(cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind, port))?;
    info!("HTTP API listening on {}:{}", bind, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    if let Err(e) = studio.shutdown().await {
        warn!("Studio shutdown: {}", e);
    }

    Ok(())
}
