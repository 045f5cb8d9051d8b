use std::time::Duration;

use crate::host::{CaptureConstraints, CodecPairing};
use crate::visualizer::BarStyle;

/// Runtime settings for a studio
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// What capture asks the host for
    pub constraints: CaptureConstraints,

    /// Analyzer window in samples; half of it is the bar count
    /// Default: 256
    pub fft_size: usize,

    /// Visualizer redraw rate in frames per second
    pub frame_rate: u32,

    /// Colours used by the visualizer
    pub style: BarStyle,

    /// Codec pairing requested from the encoder, no fallback
    pub codec: CodecPairing,

    /// Capture and recording require a signed-in identity
    pub require_login: bool,

    /// Capacity of the studio event queue
    pub queue_capacity: usize,
}

impl StudioConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            constraints: CaptureConstraints::default(),
            fft_size: 256,
            frame_rate: 60,
            style: BarStyle::default(),
            codec: CodecPairing::default(),
            require_login: true,
            queue_capacity: 64,
        }
    }
}
