//! Orrery core -- leaf data structures for the Orrery simulation engine.
//!
//! This crate holds everything below the engine itself: 2D vector and
//! rectangle math, the frame-rate counter, the monotonic sprite-id
//! allocator, the flat engine settings, and the deferred-event queue that
//! the world clock polls once per tick.
//!
//! # Quick Start
//!
//! ```
//! use orrery_core::prelude::*;
//! use std::time::{Duration, Instant};
//!
//! let queue = EventQueue::new();
//! let now = Instant::now();
//! queue.schedule_at(now, Duration::from_millis(10), |_fired| {
//!     // deferred work here
//! });
//!
//! // Nothing fires before the timeout has elapsed.
//! assert_eq!(queue.poll_due(now), 0);
//! assert_eq!(queue.poll_due(now + Duration::from_millis(10)), 1);
//! ```

#![deny(unsafe_code)]

pub mod event;
pub mod frame;
pub mod sequence;
pub mod settings;
pub mod vector;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The settings document could not be parsed.
    #[error("failed to parse engine settings: {0}")]
    SettingsParse(#[from] serde_json::Error),

    /// A settings value is outside its valid range.
    #[error("invalid setting '{name}': {details}")]
    InvalidSetting {
        /// Name of the offending field.
        name: &'static str,
        /// Why the value was rejected.
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::event::{
        EventFired, EventId, EventParam, EventQueue, ExecutionMode, Recurrence,
    };
    pub use crate::frame::FrameCounter;
    pub use crate::sequence::{SpriteId, SpriteIdAllocator, NO_OWNER};
    pub use crate::settings::EngineSettings;
    pub use crate::vector::{Rect, Vec2};
    pub use crate::CoreError;
}
