//! Engine settings.
//!
//! A flat configuration object loaded once at engine construction and
//! immutable thereafter. Serialized as JSON so a host can persist it between
//! runs; unknown fields are rejected so typos surface immediately.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// All recognized engine options.
///
/// `ticks_per_second` defines epoch normalization: one epoch is
/// `1000 / ticks_per_second` milliseconds, so motion speeds are expressed
/// independent of the achieved frame rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineSettings {
    /// Worker threads for the world-clock fan-out pool.
    pub world_clock_threads: usize,

    /// Run the vectored/unvectored controller phases on the worker pool.
    /// When false (the default) controllers run serially in registration
    /// order on the frame thread.
    pub multithreaded_world_clock: bool,

    /// Simulation ticks per second; defines `ms_per_epoch`.
    pub ticks_per_second: f32,

    /// Pace frames to the display refresh instead of `target_frame_rate`.
    pub vertical_sync: bool,

    /// Frames per second to pace to when `vertical_sync` is off.
    pub target_frame_rate: f32,

    /// Yield the thread while spin-waiting out the remainder of a frame
    /// instead of busy-looping.
    pub yield_remaining_frame_time: bool,

    /// Warm all registered asset and sprite factories during startup
    /// hydration.
    pub pre_cache_all_assets: bool,

    /// Logical canvas width in world units.
    pub canvas_width: f32,

    /// Logical canvas height in world units.
    pub canvas_height: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            world_clock_threads: 10,
            multithreaded_world_clock: false,
            ticks_per_second: 120.0,
            vertical_sync: false,
            target_frame_rate: 70.0,
            yield_remaining_frame_time: false,
            pre_cache_all_assets: true,
            canvas_width: 1024.0,
            canvas_height: 768.0,
        }
    }
}

impl EngineSettings {
    /// Milliseconds of real time per simulation epoch.
    #[inline]
    pub fn ms_per_epoch(&self) -> f32 {
        1000.0 / self.ticks_per_second
    }

    /// Parse settings from a JSON document, validating ranges.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let settings: EngineSettings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.ticks_per_second.is_finite() && self.ticks_per_second > 0.0) {
            return Err(CoreError::InvalidSetting {
                name: "ticks_per_second",
                details: format!("must be positive and finite, got {}", self.ticks_per_second),
            });
        }
        if !(self.target_frame_rate.is_finite() && self.target_frame_rate > 0.0) {
            return Err(CoreError::InvalidSetting {
                name: "target_frame_rate",
                details: format!("must be positive and finite, got {}", self.target_frame_rate),
            });
        }
        if self.world_clock_threads == 0 {
            return Err(CoreError::InvalidSetting {
                name: "world_clock_threads",
                details: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
