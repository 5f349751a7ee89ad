//! Display state: canvas extent, scrollable viewport position, and the frame
//! counter that paces the world clock.

use parking_lot::{Mutex, RwLock};
use rand::Rng;

use orrery_core::prelude::{FrameCounter, Rect, Vec2};

/// How far beyond the canvas edge off-screen spawns are placed.
const OFF_SCREEN_MARGIN: f32 = 64.0;

/// Fixed canvas plus a movable window position. Sprite coordinates are world
/// coordinates; the window position is subtracted at render time for
/// everything that is not fixed to the screen.
pub struct Display {
    canvas: Vec2,
    window_position: RwLock<Vec2>,
    frame_counter: Mutex<FrameCounter>,
}

impl Display {
    pub fn new(canvas: Vec2) -> Self {
        Self {
            canvas,
            window_position: RwLock::new(Vec2::ZERO),
            frame_counter: Mutex::new(FrameCounter::new()),
        }
    }

    pub fn canvas_size(&self) -> Vec2 {
        self.canvas
    }

    pub fn center(&self) -> Vec2 {
        self.canvas * 0.5
    }

    pub fn window_position(&self) -> Vec2 {
        *self.window_position.read()
    }

    pub fn set_window_position(&self, position: Vec2) {
        *self.window_position.write() = position;
    }

    pub fn scroll(&self, delta: Vec2) {
        *self.window_position.write() += delta;
    }

    /// The world-space rectangle currently on screen.
    pub fn viewport(&self) -> Rect {
        let position = self.window_position();
        Rect::new(position.x, position.y, self.canvas.x, self.canvas.y)
    }

    /// A random world-space point just outside the visible canvas, used when
    /// spawning sprites that should drift into view.
    pub fn random_off_screen_location(&self, rng: &mut impl Rng) -> Vec2 {
        let position = self.window_position();
        // Pick an edge, then a point along it.
        match rng.gen_range(0..4) {
            0 => Vec2::new(
                position.x - OFF_SCREEN_MARGIN,
                position.y + rng.gen_range(0.0..self.canvas.y),
            ),
            1 => Vec2::new(
                position.x + self.canvas.x + OFF_SCREEN_MARGIN,
                position.y + rng.gen_range(0.0..self.canvas.y),
            ),
            2 => Vec2::new(
                position.x + rng.gen_range(0.0..self.canvas.x),
                position.y - OFF_SCREEN_MARGIN,
            ),
            _ => Vec2::new(
                position.x + rng.gen_range(0.0..self.canvas.x),
                position.y + self.canvas.y + OFF_SCREEN_MARGIN,
            ),
        }
    }

    /// Runs `f` against the frame counter under its lock.
    pub fn with_frame_counter<R>(&self, f: impl FnOnce(&mut FrameCounter) -> R) -> R {
        f(&mut self.frame_counter.lock())
    }

    pub fn current_frame_rate(&self) -> f32 {
        self.frame_counter.lock().current_rate()
    }

    pub fn average_frame_rate(&self) -> f32 {
        self.frame_counter.lock().average_rate()
    }
}
