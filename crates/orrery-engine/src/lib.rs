//! Orrery Engine -- real-time 2D sprite simulation with a fixed-cadence
//! world clock.
//!
//! This crate builds on [`orrery_core`] to provide the simulation driver: a
//! world-clock loop that normalizes wall time into epochs, a sprite
//! collection where every structural mutation is deferred to tick
//! boundaries, and a controller framework that runs the player first so the
//! whole frame shares one displacement vector.
//!
//! # Quick Start
//!
//! ```
//! use orrery_engine::prelude::*;
//!
//! let engine = Engine::new(
//!     EngineSettings::default(),
//!     Box::new(NullRenderer),
//!     Box::new(NullInput),
//!     Box::new(MemoryAssetLoader::new()),
//! )
//! .unwrap();
//!
//! engine.show_player(engine.display().center());
//!
//! // Drive frames headlessly: 25 ms of wall time per frame.
//! engine.step_frame(25.0);
//! assert!(engine.player().read().base().visible());
//! ```

#![deny(unsafe_code)]

pub mod assets;
pub mod clock;
pub mod collection;
pub mod controller;
pub mod display;
pub mod engine;
pub mod io;
pub mod sprite;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine was started while already running.
    #[error("engine is already running")]
    AlreadyRunning,

    /// Controllers and factories are frozen once the clock starts.
    #[error("registration is frozen after the engine starts")]
    RegistrationAfterStart,

    /// No factory is registered under the requested tag.
    #[error("no sprite kind registered under tag '{tag}'")]
    UnknownCategory { tag: String },

    /// A factory is already registered under this tag.
    #[error("sprite kind '{tag}' is already registered")]
    DuplicateFactory { tag: String },

    /// An asset path did not resolve through the host loader.
    #[error("asset not found: {path}")]
    AssetNotFound { path: String },

    /// The world-clock thread or pool could not be set up.
    #[error("world clock failed: {details}")]
    WorldClock { details: String },

    /// A core-layer failure (settings parsing or validation).
    #[error(transparent)]
    Core(#[from] orrery_core::CoreError),
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the core crate for convenience.
pub use orrery_core;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the core prelude.
    pub use orrery_core::prelude::*;

    // Engine surface.
    pub use crate::engine::{
        Engine, DEBUG_TEXT_TAG, PAUSED_TEXT_TAG, STATUS_TEXT_TAG,
    };
    pub use crate::EngineError;

    // Sprites.
    pub use crate::collection::SpriteCollection;
    pub use crate::sprite::kinds::{
        DrifterSprite, ParticleCleanup, ParticleSprite, PlayerSprite, TextSprite,
    };
    pub use crate::sprite::{share, SharedSprite, Sprite, SpriteBase, SpriteCategory};

    // Controllers and spawning.
    pub use crate::controller::{
        particle_burst, spawn_off_screen, CategoryTickController, FactoryRegistry,
        PlayerTickController, SpawnContext, SpriteFactory, UnvectoredTickController,
        VectoredTickController,
    };

    // Collaborators.
    pub use crate::assets::{
        AssetCatalog, AssetLoader, AudioHandle, ImageHandle, MemoryAssetLoader,
    };
    pub use crate::clock::WorldClock;
    pub use crate::display::Display;
    pub use crate::io::{
        InputSnapshot, InputSource, NullInput, NullRenderer, PlayerKey, Renderer, VisualEffect,
    };
}
