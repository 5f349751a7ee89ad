//! The world clock: the single loop that advances simulated time.
//!
//! Each frame measures the wall time the previous frame took, converts it to
//! an epoch (`elapsed_ms / ms_per_epoch`), and drives one tick:
//!
//! 1. poll the deferred-event queue, then materialize pending sprite inserts
//! 2. sample input once for the whole tick
//! 3. run the player controller, producing the frame's displacement vector
//! 4. fan out to every vectored controller with that displacement
//! 5. fan out to every unvectored controller
//! 6. sweep deleted sprites, then spent events
//!
//! Scaling all motion by the epoch keeps world speed independent of frame
//! rate. Fan-out is serial by default; with `multithreaded_world_clock` set,
//! each phase runs its controllers on a thread pool and still joins before
//! the next phase begins, so the phase ordering above is a hard barrier
//! either way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use orrery_core::prelude::{EngineSettings, EventQueue};

use crate::collection::SpriteCollection;
use crate::controller::{PlayerTickController, UnvectoredTickController, VectoredTickController};
use crate::display::Display;
use crate::io::{InputSnapshot, InputSource, Renderer};
use crate::EngineError;

pub struct WorldClock {
    settings: EngineSettings,
    sprites: Arc<SpriteCollection>,
    events: Arc<EventQueue>,
    display: Arc<Display>,
    player: PlayerTickController,
    input: Mutex<Box<dyn InputSource>>,
    latest_input: RwLock<InputSnapshot>,
    renderer: Mutex<Box<dyn Renderer>>,
    vectored: RwLock<Vec<Arc<dyn VectoredTickController>>>,
    unvectored: RwLock<Vec<Arc<dyn UnvectoredTickController>>>,
    pool: Option<rayon::ThreadPool>,
    paused: AtomicBool,
    shutdown: AtomicBool,
    /// Process-wide consistency gate. The frame loop holds it across tick
    /// plus render; external threads take it to observe or mutate engine
    /// state between frames.
    gate: Mutex<()>,
}

impl WorldClock {
    pub fn new(
        settings: EngineSettings,
        sprites: Arc<SpriteCollection>,
        events: Arc<EventQueue>,
        display: Arc<Display>,
        player: PlayerTickController,
        renderer: Box<dyn Renderer>,
        input: Box<dyn InputSource>,
    ) -> Result<Self, EngineError> {
        let pool = if settings.multithreaded_world_clock {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(settings.world_clock_threads)
                .thread_name(|index| format!("world-clock-{index}"))
                .build()
                .map_err(|source| EngineError::WorldClock { details: source.to_string() })?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            settings,
            sprites,
            events,
            display,
            player,
            input: Mutex::new(input),
            latest_input: RwLock::new(InputSnapshot::new()),
            renderer: Mutex::new(renderer),
            vectored: RwLock::new(Vec::new()),
            unvectored: RwLock::new(Vec::new()),
            pool,
            paused: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            gate: Mutex::new(()),
        })
    }

    // -- registration --------------------------------------------------------

    pub fn register_vectored(&self, controller: Arc<dyn VectoredTickController>) {
        self.vectored.write().push(controller);
    }

    pub fn register_unvectored(&self, controller: Arc<dyn UnvectoredTickController>) {
        self.unvectored.write().push(controller);
    }

    // -- lifecycle flags -----------------------------------------------------

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Flips pause and returns the new state.
    pub fn toggle_paused(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Input sampled for the current tick.
    pub fn latest_input(&self) -> InputSnapshot {
        self.latest_input.read().clone()
    }

    // -- the gate ------------------------------------------------------------

    /// Runs `f` while holding the world-clock gate. Blocks until the frame
    /// in flight, if any, completes.
    pub fn with_gate<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.gate.lock();
        f()
    }

    /// Like [`Self::with_gate`] but gives up after `timeout`. Returns `None`
    /// when the gate could not be taken in time.
    pub fn try_with_gate<R>(&self, timeout: Duration, f: impl FnOnce() -> R) -> Option<R> {
        let _guard = self.gate.try_lock_for(timeout)?;
        Some(f())
    }

    // -- one tick ------------------------------------------------------------

    /// Advances the world by `epoch` epochs of simulated time. Callers are
    /// expected to hold the gate; [`Self::step_frame`] and the frame loop
    /// both do.
    pub fn execute_tick(&self, epoch: f32, now: Instant) {
        let fired = self.events.poll_due(now);
        let inserted = self.sprites.apply_pending_inserts();
        if fired > 0 || inserted > 0 {
            tracing::trace!(fired, inserted, "event-poll phase");
        }

        let snapshot = self.input.lock().snapshot();
        *self.latest_input.write() = snapshot.clone();

        let displacement = self.player.execute_tick(epoch, &snapshot);

        {
            let vectored = self.vectored.read();
            match &self.pool {
                Some(pool) => pool.scope(|scope| {
                    for controller in vectored.iter() {
                        let controller = Arc::clone(controller);
                        scope.spawn(move |_| controller.execute_tick(epoch, displacement));
                    }
                }),
                None => {
                    for controller in vectored.iter() {
                        controller.execute_tick(epoch, displacement);
                    }
                }
            }
        }

        {
            let unvectored = self.unvectored.read();
            match &self.pool {
                Some(pool) => pool.scope(|scope| {
                    for controller in unvectored.iter() {
                        let controller = Arc::clone(controller);
                        scope.spawn(move |_| controller.execute_tick());
                    }
                }),
                None => {
                    for controller in unvectored.iter() {
                        controller.execute_tick();
                    }
                }
            }
        }

        self.sprites.sweep_deletions();
        self.events.sweep();
    }

    /// Presents one frame. Renderer failures cost the frame, never the
    /// simulation.
    pub fn render(&self) {
        let offset = self.display.window_position();
        let draw_list = self.sprites.render_order(offset, self.display.canvas_size());
        let viewport = self.display.viewport();
        if let Err(error) = self.renderer.lock().render_frame(&draw_list, viewport) {
            tracing::warn!(%error, "frame dropped: renderer failed");
        }
    }

    /// Forwards a one-shot effect to the renderer, fire and forget.
    pub fn visual_effect(&self, effect: crate::io::VisualEffect) {
        self.renderer.lock().visual_effect(effect);
    }

    /// Drives exactly one frame as if `elapsed_ms` of wall time had passed
    /// since the previous one: tick (unless paused), then render. This is
    /// the headless entry point; the frame loop is the same sequence plus
    /// pacing.
    pub fn step_frame(&self, elapsed_ms: f32) {
        let _guard = self.gate.lock();
        if !self.is_paused() {
            let epoch = elapsed_ms / self.settings.ms_per_epoch();
            self.execute_tick(epoch, Instant::now());
        }
        self.render();
    }

    // -- the frame loop ------------------------------------------------------

    /// Runs until shutdown is requested. Call on a dedicated thread.
    pub fn run(self: &Arc<Self>) {
        tracing::info!(
            ticks_per_second = self.settings.ticks_per_second,
            multithreaded = self.settings.multithreaded_world_clock,
            "world clock started"
        );
        let target_frame_us = 1_000_000.0 / self.settings.target_frame_rate;
        // First frame has no previous frame to measure; assume one epoch.
        let mut elapsed_ms = self.settings.ms_per_epoch();

        while !self.is_shutdown_requested() {
            {
                let _guard = self.gate.lock();
                if !self.is_paused() {
                    let epoch = elapsed_ms / self.settings.ms_per_epoch();
                    self.execute_tick(epoch, Instant::now());
                }
                self.render();
            }

            if self.is_paused() {
                std::thread::sleep(Duration::from_millis(5));
            } else if !self.settings.vertical_sync {
                // Pace the loop up to the frame target.
                while self.display.with_frame_counter(|counter| counter.elapsed_us())
                    < target_frame_us
                {
                    if self.settings.yield_remaining_frame_time {
                        std::thread::yield_now();
                    } else {
                        std::hint::spin_loop();
                    }
                }
            }

            elapsed_ms = self.display.with_frame_counter(|counter| {
                let measured = counter.elapsed_ms();
                counter.mark_frame();
                measured
            });
        }
        tracing::info!("world clock stopped");
    }
}
