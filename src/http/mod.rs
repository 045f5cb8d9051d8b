//! HTTP API standing in for the studio's buttons
//!
//! - POST /auth/login, /auth/logout - Sign in or out
//! - POST /capture/start, /capture/stop - Camera and microphone
//! - POST /record/start, /record/stop - Recording
//! - POST /record/export - Upload and save the finished recording
//! - POST /canvas/resize - Resize the visualizer canvas
//! - GET /status - Studio state and enabled controls
//! - GET /notices - User-visible failures
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
