//! Host-supplied collaborator traits: rendering and player input.
//!
//! The engine never talks to a window, a GPU, or a keyboard directly. A host
//! hands it a [`Renderer`] and an [`InputSource`] at construction time and the
//! world clock drives both once per frame. The [`NullRenderer`] and
//! [`NullInput`] implementations make the engine fully headless, which is how
//! the integration tests run it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use orrery_core::prelude::Rect;

use crate::sprite::SharedSprite;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Logical player controls. Hosts map physical keys or gamepad axes onto
/// these; the engine only ever sees the logical names. Serializable so
/// hosts can persist key bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKey {
    Forward,
    Reverse,
    RotateClockwise,
    RotateCounterClockwise,
    StrafeLeft,
    StrafeRight,
    SpeedBoost,
    PrimaryFire,
    SecondaryFire,
    Pause,
    Escape,
}

/// One frame's worth of input state, sampled once per tick.
///
/// Keys carry an analog weight in `0.0..=1.0` so gamepad triggers and
/// keyboards share one representation; a plain key press is weight `1.0`.
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    keys: HashMap<PlayerKey, f32>,
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` held at full weight.
    pub fn press(&mut self, key: PlayerKey) {
        self.set(key, 1.0);
    }

    /// Records `key` at an analog weight. A weight of zero releases the key.
    pub fn set(&mut self, key: PlayerKey, weight: f32) {
        if weight <= 0.0 {
            self.keys.remove(&key);
        } else {
            self.keys.insert(key, weight.min(1.0));
        }
    }

    pub fn is_pressed(&self, key: PlayerKey) -> bool {
        self.keys.contains_key(&key)
    }

    /// Analog weight for `key`, `0.0` when not held.
    pub fn weight(&self, key: PlayerKey) -> f32 {
        self.keys.get(&key).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Source of per-frame input snapshots. Sampled exactly once per tick by the
/// world clock; the same snapshot is then visible to every controller for the
/// remainder of that tick.
pub trait InputSource: Send {
    fn snapshot(&mut self) -> InputSnapshot;
}

/// Input source that never reports any keys held.
#[derive(Debug, Default)]
pub struct NullInput;

impl InputSource for NullInput {
    fn snapshot(&mut self) -> InputSnapshot {
        InputSnapshot::new()
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// One-shot screen-space effects a host renderer may implement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VisualEffect {
    ScreenShake { magnitude: f32, duration_ms: u32 },
    FlashWhite { duration_ms: u32 },
}

/// Presents one frame. `sprites` arrives already culled to the viewport and
/// sorted into draw order (ascending z, player last); the renderer's job is
/// purely to put pixels somewhere.
///
/// Render failures are logged and swallowed by the frame loop, so a renderer
/// error costs one frame, never the simulation.
pub trait Renderer: Send {
    fn render_frame(&mut self, sprites: &[SharedSprite], viewport: Rect) -> Result<(), EngineError>;

    /// Optional; renderers without effect support ignore these.
    fn visual_effect(&mut self, _effect: VisualEffect) {}
}

/// Renderer that draws nothing and always succeeds.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render_frame(&mut self, _sprites: &[SharedSprite], _viewport: Rect) -> Result<(), EngineError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
