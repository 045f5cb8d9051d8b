//! Audio-level bar visualizer
//!
//! [`layout_bars`] turns one set of frequency bins into bar geometry,
//! [`draw_frame`] paints it, and [`VisualizerLoop`] repeats that once per
//! display refresh until it is cancelled.

mod canvas;

pub use canvas::{pixel_count, Canvas, RasterCanvas, Rgb, SharedCanvas, MAX_CANVAS_SIDE};

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::host::FrequencyAnalyzer;

/// Horizontal stretch applied to each bar
pub const BAR_SPACING_FACTOR: f32 = 2.5;

/// Gap between neighbouring bars in pixels
pub const BAR_GAP: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarStyle {
    pub background: Rgb,
    pub bar: Rgb,
}

impl Default for BarStyle {
    fn default() -> Self {
        Self {
            background: Rgb(0xf0, 0xf0, 0xf0),
            bar: Rgb(0, 123, 255),
        }
    }
}

/// Bars for one frame, left to right, one per bin, anchored to the bottom
pub fn layout_bars(bins: &[u8], width: u32, height: u32) -> Vec<Bar> {
    if bins.is_empty() {
        return Vec::new();
    }

    let width = width as f32;
    let height = height as f32;
    let bar_width = width / bins.len() as f32 * BAR_SPACING_FACTOR;

    let mut x = 0.0;
    bins.iter()
        .map(|&value| {
            let bar_height = value as f32 / 255.0 * height;
            let bar = Bar {
                x,
                y: height - bar_height,
                width: bar_width,
                height: bar_height,
            };
            x += bar_width + BAR_GAP;
            bar
        })
        .collect()
}

/// Full redraw: background first, then every bar
pub fn draw_frame(canvas: &mut dyn Canvas, bins: &[u8], style: &BarStyle) {
    let (width, height) = canvas.size();
    canvas.fill_rect(0.0, 0.0, width as f32, height as f32, style.background);

    for bar in layout_bars(bins, width, height) {
        canvas.fill_rect(bar.x, bar.y, bar.width, bar.height, style.bar);
    }
}

/// Redraw loop running on its own task while capture is active
///
/// The loop owns the analyzer while it runs and hands it back from
/// [`VisualizerLoop::cancel`], so the caller can dispose of it once no more
/// frames can be drawn.
pub struct VisualizerLoop {
    cancel_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Box<dyn FrequencyAnalyzer>>>,
}

impl VisualizerLoop {
    pub fn spawn(
        mut analyzer: Box<dyn FrequencyAnalyzer>,
        canvas: SharedCanvas,
        frame_interval: Duration,
        style: BarStyle,
    ) -> Self {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            info!("Visualizer loop started");

            let mut ticker = tokio::time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut bins = vec![0u8; analyzer.frequency_bin_count()];
            let mut frames: u64 = 0;

            loop {
                tokio::select! {
                    biased;
                    // A dropped sender counts as cancellation too
                    _ = &mut cancel_rx => break,
                    _ = ticker.tick() => {
                        analyzer.byte_frequency_data(&mut bins);
                        let mut canvas = canvas.lock().await;
                        draw_frame(&mut *canvas, &bins, &style);
                        frames += 1;
                    }
                }
            }

            debug!("Visualizer loop drew {} frames", frames);
            info!("Visualizer loop stopped");
            analyzer
        });

        Self {
            cancel_tx: Some(cancel_tx),
            handle: Some(handle),
        }
    }

    /// Stop the loop and wait for it to exit. Returns the analyzer the first
    /// time; later calls return `None`.
    pub async fn cancel(&mut self) -> Option<Box<dyn FrequencyAnalyzer>> {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }

        let handle = self.handle.take()?;
        match handle.await {
            Ok(analyzer) => Some(analyzer),
            Err(e) => {
                error!("Visualizer task panicked: {}", e);
                None
            }
        }
    }
}

impl Drop for VisualizerLoop {
    fn drop(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }
}
