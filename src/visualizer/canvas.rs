use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Opaque RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn packed(self) -> u32 {
        0xff00_0000 | (self.0 as u32) << 16 | (self.1 as u32) << 8 | self.2 as u32
    }
}

/// Drawing surface the visualizer paints on
pub trait Canvas: Send {
    /// Current (width, height) in pixels
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb);

    /// Reset every pixel to transparent
    fn clear(&mut self);
}

pub type SharedCanvas = Arc<Mutex<dyn Canvas>>;

/// Largest accepted width or height in pixels
pub const MAX_CANVAS_SIDE: u32 = 8192;

/// Pixel count of a `width` x `height` canvas, `None` past [`MAX_CANVAS_SIDE`]
pub fn pixel_count(width: u32, height: u32) -> Option<usize> {
    if width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
        return None;
    }
    (width as usize).checked_mul(height as usize)
}

/// In-memory canvas; a pixel is painted when its centre lies inside the rect
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    frames_painted: u64,
}

impl RasterCanvas {
    /// Sides past [`MAX_CANVAS_SIDE`] are clamped
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.min(MAX_CANVAS_SIDE);
        let height = height.min(MAX_CANVAS_SIDE);
        Self {
            width,
            height,
            pixels: vec![0; pixel_count(width, height).unwrap_or_default()],
            frames_painted: 0,
        }
    }

    pub fn shared(width: u32, height: u32) -> Arc<Mutex<RasterCanvas>> {
        Arc::new(Mutex::new(Self::new(width, height)))
    }

    /// Packed ARGB at (x, y); 0 means transparent
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }

    /// Number of full-canvas background fills, i.e. frames started
    pub fn frames_painted(&self) -> u64 {
        self.frames_painted
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        let Some(count) = pixel_count(width, height) else {
            warn!("Ignoring canvas resize to {}x{}", width, height);
            return;
        };
        self.width = width;
        self.height = height;
        self.pixels = vec![0; count];
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        if x <= 0.0 && y <= 0.0 && x + width >= self.width as f32 && y + height >= self.height as f32
        {
            self.frames_painted += 1;
        }

        let col_start = (x - 0.5).ceil().max(0.0) as u32;
        let col_end = ((x + width - 0.5).ceil().max(0.0) as u32).min(self.width);
        let row_start = (y - 0.5).ceil().max(0.0) as u32;
        let row_end = ((y + height - 0.5).ceil().max(0.0) as u32).min(self.height);

        let packed = color.packed();
        for row in row_start..row_end {
            let base = (row * self.width) as usize;
            for col in col_start..col_end {
                self.pixels[base + col as usize] = packed;
            }
        }
    }

    fn clear(&mut self) {
        self.pixels.fill(0);
    }
}
