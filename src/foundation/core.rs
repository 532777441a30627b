use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default edge length of the lab canvas, in pixels.
pub const DEFAULT_CANVAS_SIZE: u32 = 250;

/// Quiet period after the last input change before a render is attempted.
pub const RENDER_DELAY: Duration = Duration::from_millis(100);

/// Hard deadline for a single sandbox session.
pub const WORKER_TIMEOUT: Duration = Duration::from_millis(2000);

/// Size of the turtle sprite drawn by `stamp`.
pub const TURTLE_WIDTH: f64 = 10.0;
pub const TURTLE_HEIGHT: f64 = 10.0;

/// Message shown when a session hits [`WORKER_TIMEOUT`].
pub const WORKER_TIMEOUT_MSG: &str =
    "Your code has taken too long to execute. Perhaps it contains an infinite loop?";

/// Pixel dimensions of a drawing surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(edge: u32) -> Self {
        Self::new(edge, edge)
    }

    pub fn pixel_count(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::square(DEFAULT_CANVAS_SIZE)
    }
}

/// Straight (non-premultiplied) RGBA8 colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Self = Self::opaque(0, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}
