//! The engine facade: owns every subsystem, wires the world clock, and
//! exposes the lifecycle surface hosts call.
//!
//! An [`Engine`] runs at most once. [`Engine::start`] warms the asset
//! catalog, fires the initialization callbacks, and launches the world-clock
//! thread; [`Engine::shutdown`] stops the clock, joins the thread, and fires
//! the shutdown callbacks. To run again, build a new engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use orrery_core::prelude::{
    EngineSettings, EventQueue, ExecutionMode, Recurrence, SpriteId, Vec2,
};

use crate::assets::{AssetCatalog, AssetLoader};
use crate::clock::WorldClock;
use crate::collection::SpriteCollection;
use crate::controller::{
    spawn_off_screen, CategoryTickController, FactoryRegistry, PlayerTickController, SpawnContext,
    SpriteFactory, UnvectoredTickController, VectoredTickController,
};
use crate::display::Display;
use crate::io::{InputSnapshot, InputSource, Renderer};
use crate::sprite::kinds::{PlayerSprite, TextSprite};
use crate::sprite::{share, SharedSprite, Sprite, SpriteCategory};
use crate::EngineError;

/// Tags of the text overlays the engine owns.
pub const STATUS_TEXT_TAG: &str = "status-text";
pub const DEBUG_TEXT_TAG: &str = "debug-text";
pub const PAUSED_TEXT_TAG: &str = "paused-text";

/// How often the status overlay refreshes.
const STATUS_REFRESH: Duration = Duration::from_millis(250);

/// Categories that get a built-in vectored controller. The player is
/// deliberately absent; its controller is privileged and runs first.
const BUILT_IN_CATEGORIES: [SpriteCategory; 6] = [
    SpriteCategory::Drifter,
    SpriteCategory::Particle,
    SpriteCategory::Animation,
    SpriteCategory::Bitmap,
    SpriteCategory::TextBlock,
    SpriteCategory::Debug,
];

const RNG_SEED: u64 = 0x6F72_7265_7279;

pub struct Engine {
    settings: EngineSettings,
    sprites: Arc<SpriteCollection>,
    events: Arc<EventQueue>,
    assets: Arc<AssetCatalog>,
    display: Arc<Display>,
    clock: Arc<WorldClock>,
    factories: Arc<FactoryRegistry>,
    rng: Mutex<Pcg64Mcg>,
    running: AtomicBool,
    frame_thread: Mutex<Option<JoinHandle<()>>>,
    on_initialized: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
    on_shutdown: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
    player: SharedSprite,
    status_text: SharedSprite,
    debug_text: SharedSprite,
    paused_text: SharedSprite,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        renderer: Box<dyn Renderer>,
        input: Box<dyn InputSource>,
        loader: Box<dyn AssetLoader>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;

        let sprites = Arc::new(SpriteCollection::new());
        let events = Arc::new(EventQueue::new());
        let assets = Arc::new(AssetCatalog::new(loader));
        let display = Arc::new(Display::new(Vec2::new(
            settings.canvas_width,
            settings.canvas_height,
        )));

        let player = share(PlayerSprite::new(sprites.allocate_id()));
        sprites.set_player(player.clone());

        let status_text = Self::overlay(&sprites, STATUS_TEXT_TAG, Vec2::new(10.0, 10.0), true);
        let debug_text = Self::overlay(&sprites, DEBUG_TEXT_TAG, Vec2::new(10.0, 30.0), false);
        let paused_text = Self::overlay(&sprites, PAUSED_TEXT_TAG, display.center(), false);

        let clock = Arc::new(WorldClock::new(
            settings.clone(),
            sprites.clone(),
            events.clone(),
            display.clone(),
            PlayerTickController::new(player.clone()),
            renderer,
            input,
        )?);
        for category in BUILT_IN_CATEGORIES {
            clock.register_vectored(Arc::new(CategoryTickController::new(
                category,
                sprites.clone(),
            )));
        }

        Ok(Self {
            settings,
            sprites,
            events,
            assets,
            display,
            clock,
            factories: Arc::new(FactoryRegistry::new()),
            rng: Mutex::new(Pcg64Mcg::seed_from_u64(RNG_SEED)),
            running: AtomicBool::new(false),
            frame_thread: Mutex::new(None),
            on_initialized: Mutex::new(Vec::new()),
            on_shutdown: Mutex::new(Vec::new()),
            player,
            status_text,
            debug_text,
            paused_text,
        })
    }

    fn overlay(
        sprites: &SpriteCollection,
        tag: &str,
        location: Vec2,
        visible: bool,
    ) -> SharedSprite {
        let mut text = TextSprite::new(sprites.allocate_id(), "");
        text.base_mut().set_tag(tag);
        text.base_mut().set_location(location);
        text.base_mut().set_visible(visible);
        text.base_mut().set_z_order(i32::MAX);
        let shared = share(text);
        sprites.insert_now(shared.clone());
        shared
    }

    // -- accessors -----------------------------------------------------------

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn sprites(&self) -> &Arc<SpriteCollection> {
        &self.sprites
    }

    pub fn events(&self) -> &Arc<EventQueue> {
        &self.events
    }

    pub fn assets(&self) -> &Arc<AssetCatalog> {
        &self.assets
    }

    pub fn display(&self) -> &Arc<Display> {
        &self.display
    }

    pub fn player(&self) -> SharedSprite {
        self.player.clone()
    }

    pub fn status_text(&self) -> SharedSprite {
        self.status_text.clone()
    }

    pub fn debug_text(&self) -> SharedSprite {
        self.debug_text.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Input sampled for the current tick.
    pub fn latest_input(&self) -> InputSnapshot {
        self.clock.latest_input()
    }

    // -- registration (frozen once started) ----------------------------------

    pub fn register_vectored(
        &self,
        controller: Arc<dyn VectoredTickController>,
    ) -> Result<(), EngineError> {
        self.ensure_not_started()?;
        self.clock.register_vectored(controller);
        Ok(())
    }

    pub fn register_unvectored(
        &self,
        controller: Arc<dyn UnvectoredTickController>,
    ) -> Result<(), EngineError> {
        self.ensure_not_started()?;
        self.clock.register_unvectored(controller);
        Ok(())
    }

    pub fn register_sprite_factory(
        &self,
        tag: &str,
        factory: SpriteFactory,
    ) -> Result<(), EngineError> {
        self.ensure_not_started()?;
        self.factories.register(tag, factory)
    }

    fn ensure_not_started(&self) -> Result<(), EngineError> {
        if self.is_running() {
            Err(EngineError::RegistrationAfterStart)
        } else {
            Ok(())
        }
    }

    // -- lifecycle callbacks -------------------------------------------------

    pub fn on_initialized(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.on_initialized.lock().push(Box::new(callback));
    }

    pub fn on_shutdown(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.on_shutdown.lock().push(Box::new(callback));
    }

    // -- lifecycle -----------------------------------------------------------

    /// Starts the engine: warms the asset catalog (with sprite insertion
    /// suppressed), fires the initialization callbacks, schedules the status
    /// overlay refresh, and launches the world-clock thread. Starting twice
    /// is an error.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }

        if self.settings.pre_cache_all_assets {
            self.sprites.set_hydrating(true);
            let warmed = self.warm_asset_catalog();
            self.sprites.set_hydrating(false);
            if let Err(error) = warmed {
                self.running.store(false, Ordering::SeqCst);
                return Err(error);
            }
        }

        self.schedule_status_refresh();
        for callback in self.on_initialized.lock().iter() {
            callback();
        }

        let clock = Arc::clone(&self.clock);
        let handle = std::thread::Builder::new()
            .name("world-clock".to_owned())
            .spawn(move || clock.run())
            .map_err(|source| EngineError::WorldClock { details: source.to_string() })?;
        *self.frame_thread.lock() = Some(handle);
        tracing::info!("engine started");
        Ok(())
    }

    /// Stops the world clock, joins its thread, and fires the shutdown
    /// callbacks. Idempotent.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.clock.request_shutdown();
        if let Some(handle) = self.frame_thread.lock().take() {
            if handle.join().is_err() {
                tracing::error!("world-clock thread panicked");
            }
        }
        for callback in self.on_shutdown.lock().iter() {
            callback();
        }
        self.sprites.clear();
        self.assets.clear();
        tracing::info!("engine shut down");
    }

    /// Constructs one sprite of every registered kind so their assets land
    /// in the catalog before the clock starts. The sprites themselves are
    /// discarded; insertion is suppressed for the duration.
    fn warm_asset_catalog(&self) -> Result<(), EngineError> {
        let ctx = SpawnContext {
            sprites: &self.sprites,
            assets: &self.assets,
            display: &self.display,
        };
        let tags = self.factories.registered_tags();
        for tag in &tags {
            self.factories.build(tag, &ctx)?;
        }
        tracing::info!(
            kinds = tags.len(),
            images = self.assets.cached_image_count(),
            "asset catalog warmed"
        );
        Ok(())
    }

    fn schedule_status_refresh(&self) {
        let player = self.player.clone();
        let status = self.status_text.clone();
        let display = self.display.clone();
        self.events.schedule_with(
            Instant::now(),
            STATUS_REFRESH,
            None,
            Recurrence::Recurring,
            ExecutionMode::Synchronous,
            move |_| {
                let (location, speed, dead) = {
                    let guard = player.read();
                    (
                        guard.base().location(),
                        guard.base().speed(),
                        guard.base().is_dead(),
                    )
                };
                let line = if dead {
                    "down".to_owned()
                } else {
                    format!(
                        "pos {:.0},{:.0}  spd {:.1}  fps {:.0}",
                        location.x,
                        location.y,
                        speed,
                        display.average_frame_rate(),
                    )
                };
                let mut guard = status.write();
                if let Some(text) = guard.as_any_mut().downcast_mut::<TextSprite>() {
                    text.set_text(line);
                }
            },
        );
    }

    // -- pause ---------------------------------------------------------------

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn set_paused(&self, paused: bool) {
        self.clock.set_paused(paused);
        self.apply_pause_overlay(paused);
    }

    /// Flips pause and returns the new state. While paused the clock keeps
    /// rendering but ticks nothing, so the world resumes exactly where it
    /// stopped.
    pub fn toggle_paused(&self) -> bool {
        let paused = self.clock.toggle_paused();
        self.apply_pause_overlay(paused);
        paused
    }

    fn apply_pause_overlay(&self, paused: bool) {
        let mut guard = self.paused_text.write();
        if paused {
            let center = self.display.center();
            if let Some(text) = guard.as_any_mut().downcast_mut::<TextSprite>() {
                text.set_text("paused");
            }
            guard.base_mut().set_location(center);
        }
        guard.base_mut().set_visible(paused);
    }

    // -- the player ----------------------------------------------------------

    /// Resets the player and shows it at `location`.
    pub fn show_player(&self, location: Vec2) {
        let mut guard = self.player.write();
        if let Some(player) = guard.as_any_mut().downcast_mut::<PlayerSprite>() {
            player.reset(location);
        }
        guard.base_mut().set_visible(true);
    }

    pub fn hide_player(&self) {
        self.player.write().base_mut().set_visible(false);
    }

    // -- spawning ------------------------------------------------------------

    /// Spawns a sprite of a registered kind just off screen on a random
    /// heading. The sprite materializes at the next event-poll phase.
    pub fn spawn(&self, tag: &str) -> Result<SpriteId, EngineError> {
        let ctx = SpawnContext {
            sprites: &self.sprites,
            assets: &self.assets,
            display: &self.display,
        };
        spawn_off_screen(&self.factories, &ctx, tag, &mut *self.rng.lock())
    }

    /// Fires a one-shot screen effect at the renderer. No result; renderers
    /// without effect support ignore it.
    pub fn visual_effect(&self, effect: crate::io::VisualEffect) {
        self.clock.visual_effect(effect);
    }

    /// Point-in-time engine state as JSON, for debug overlays and logging.
    /// Take the world-clock gate around this call for a tick-consistent view.
    pub fn diagnostics(&self) -> serde_json::Value {
        serde_json::json!({
            "running": self.is_running(),
            "paused": self.is_paused(),
            "sprites": self.sprites.len(),
            "pending_inserts": self.sprites.pending_count(),
            "events": self.events.len(),
            "cached_images": self.assets.cached_image_count(),
            "fps_current": self.display.current_frame_rate(),
            "fps_average": self.display.average_frame_rate(),
        })
    }

    // -- external access -----------------------------------------------------

    /// Runs `f` holding the world-clock gate, blocking until any frame in
    /// flight completes.
    pub fn with_world_clock<R>(&self, f: impl FnOnce() -> R) -> R {
        self.clock.with_gate(f)
    }

    /// Gate access with a deadline; `None` when the gate stayed contended.
    pub fn try_with_world_clock<R>(&self, timeout: Duration, f: impl FnOnce() -> R) -> Option<R> {
        self.clock.try_with_gate(timeout, f)
    }

    /// Drives one frame headlessly as if `elapsed_ms` of wall time passed.
    /// For hosts that pace the clock themselves instead of calling
    /// [`Self::start`].
    pub fn step_frame(&self, elapsed_ms: f32) {
        self.clock.step_frame(elapsed_ms);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
