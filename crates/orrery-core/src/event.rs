//! Deferred events -- timer-based callbacks polled once per tick.
//!
//! The [`EventQueue`] lets any code defer work without sleeping, and it is
//! the engine's sole sanctioned channel for structural mutation of the
//! sprite collection during simulation: inserts and mass deletions are
//! issued from inside a scheduled callback so they land at a well-defined
//! point in the frame instead of mid-enumeration.
//!
//! Events carry an explicit trigger-base [`Instant`]. The scheduler passes
//! one coherent `now` per tick to [`poll_due`](EventQueue::poll_due), which
//! also lets tests step simulated time deterministically without sleeping.
//!
//! # Firing discipline
//!
//! `poll_due` marks OneTime events for deletion and resets Recurring
//! trigger bases under the queue's internal lock, then invokes callbacks
//! *outside* that lock (in schedule order), so a callback may freely
//! schedule or cancel further events. An event scheduled during a poll is
//! first considered at the *next* poll.
//!
//! ```
//! use orrery_core::event::{EventQueue, Recurrence};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//!
//! let queue = EventQueue::new();
//! let hits = Arc::new(AtomicU32::new(0));
//! let now = Instant::now();
//!
//! let hits2 = Arc::clone(&hits);
//! queue.schedule_recurring_at(now, Duration::from_millis(10), move |_| {
//!     hits2.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! for step in 1..=3 {
//!     queue.poll_due(now + Duration::from_millis(10 * step));
//! }
//! assert_eq!(hits.load(Ordering::SeqCst), 3);
//! ```

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Opaque parameter passed through to an event callback.
pub type EventParam = Arc<dyn Any + Send + Sync>;

/// Unique handle for a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// Whether an event fires once or repeats until canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// Fires once, then is marked for deletion.
    OneTime,
    /// Resets its trigger base on every fire; never auto-deleted.
    Recurring,
}

/// Where an event callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Inline on the polling (frame) thread. A panic propagates into the
    /// tick.
    Synchronous,
    /// On a detached thread, one per invocation; never awaited by the
    /// scheduler, and a panic dies with its thread.
    Asynchronous,
}

/// What a callback receives when its event fires.
#[derive(Clone)]
pub struct EventFired {
    /// The firing event's handle (usable for self-cancel).
    pub event_id: EventId,
    /// The parameter supplied at schedule time, if any.
    pub param: Option<EventParam>,
}

impl EventFired {
    /// Downcast the parameter to a concrete type.
    pub fn param_as<T: 'static>(&self) -> Option<&T> {
        self.param.as_deref().and_then(|p| p.downcast_ref::<T>())
    }
}

/// Event callback. `Fn` (not `FnMut`) so asynchronous invocations can clone
/// the callback into a detached thread.
pub type EventCallback = Arc<dyn Fn(&EventFired) + Send + Sync>;

// ---------------------------------------------------------------------------
// DefermentEvent
// ---------------------------------------------------------------------------

/// A single scheduled unit of deferred work.
struct DefermentEvent {
    id: EventId,
    timeout: Duration,
    param: Option<EventParam>,
    callback: EventCallback,
    recurrence: Recurrence,
    mode: ExecutionMode,
    /// Elapsed time is measured from here; reset on every Recurring fire.
    trigger_base: Instant,
    queued_for_deletion: bool,
}

impl DefermentEvent {
    fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.trigger_base) >= self.timeout
    }
}

// ---------------------------------------------------------------------------
// EventQueue
// ---------------------------------------------------------------------------

/// Holds scheduled events; polled exactly once per tick by the scheduler.
///
/// Structural cleanup is two-phase like the sprite collection: firing or
/// canceling marks an event, and [`sweep`](Self::sweep) -- called once per
/// tick after controller execution, never concurrently with
/// [`poll_due`](Self::poll_due) -- physically removes marked events.
pub struct EventQueue {
    events: Mutex<Vec<DefermentEvent>>,
    next_id: AtomicU64,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    // -- scheduling ---------------------------------------------------------

    /// Full-control scheduling against an explicit base time.
    pub fn schedule_with(
        &self,
        now: Instant,
        timeout: Duration,
        param: Option<EventParam>,
        recurrence: Recurrence,
        mode: ExecutionMode,
        callback: impl Fn(&EventFired) + Send + Sync + 'static,
    ) -> EventId {
        let id = EventId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let event = DefermentEvent {
            id,
            timeout,
            param,
            callback: Arc::new(callback),
            recurrence,
            mode,
            trigger_base: now,
            queued_for_deletion: false,
        };
        self.events.lock().push(event);
        id
    }

    /// One-shot synchronous event with no parameter, based at `now`.
    pub fn schedule_at(
        &self,
        now: Instant,
        timeout: Duration,
        callback: impl Fn(&EventFired) + Send + Sync + 'static,
    ) -> EventId {
        self.schedule_with(
            now,
            timeout,
            None,
            Recurrence::OneTime,
            ExecutionMode::Synchronous,
            callback,
        )
    }

    /// Recurring synchronous event with no parameter, based at `now`.
    pub fn schedule_recurring_at(
        &self,
        now: Instant,
        timeout: Duration,
        callback: impl Fn(&EventFired) + Send + Sync + 'static,
    ) -> EventId {
        self.schedule_with(
            now,
            timeout,
            None,
            Recurrence::Recurring,
            ExecutionMode::Synchronous,
            callback,
        )
    }

    /// One-shot synchronous event based at the current wall clock.
    pub fn schedule(
        &self,
        timeout: Duration,
        callback: impl Fn(&EventFired) + Send + Sync + 'static,
    ) -> EventId {
        self.schedule_at(Instant::now(), timeout, callback)
    }

    /// Zero-timeout one-shot: fires at the next poll phase. This is the
    /// deferred-insert channel.
    pub fn schedule_now(&self, callback: impl Fn(&EventFired) + Send + Sync + 'static) -> EventId {
        self.schedule_at(Instant::now(), Duration::ZERO, callback)
    }

    /// One-shot synchronous event carrying a typed parameter.
    pub fn schedule_with_param<T: Send + Sync + 'static>(
        &self,
        timeout: Duration,
        param: T,
        callback: impl Fn(&EventFired) + Send + Sync + 'static,
    ) -> EventId {
        self.schedule_with(
            Instant::now(),
            timeout,
            Some(Arc::new(param)),
            Recurrence::OneTime,
            ExecutionMode::Synchronous,
            callback,
        )
    }

    // -- cancellation -------------------------------------------------------

    /// Mark an event for deletion. It will not fire again and is removed at
    /// the next [`sweep`](Self::sweep). Returns `false` for unknown ids.
    pub fn cancel(&self, id: EventId) -> bool {
        let mut events = self.events.lock();
        match events.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                event.queued_for_deletion = true;
                true
            }
            None => false,
        }
    }

    // -- polling ------------------------------------------------------------

    /// Fire every non-deleted event whose timeout has elapsed at `now`.
    ///
    /// OneTime events are marked for deletion before their callback runs;
    /// Recurring events have their trigger base reset to `now`. Returns the
    /// number of events fired (asynchronous ones counted at spawn).
    pub fn poll_due(&self, now: Instant) -> usize {
        let due: Vec<(EventCallback, EventFired, ExecutionMode)> = {
            let mut events = self.events.lock();
            let mut due = Vec::new();
            for event in events.iter_mut() {
                if event.queued_for_deletion || !event.is_due(now) {
                    continue;
                }
                match event.recurrence {
                    Recurrence::OneTime => event.queued_for_deletion = true,
                    Recurrence::Recurring => event.trigger_base = now,
                }
                let fired = EventFired {
                    event_id: event.id,
                    param: event.param.clone(),
                };
                due.push((Arc::clone(&event.callback), fired, event.mode));
            }
            due
        };

        let fired_count = due.len();
        for (callback, fired, mode) in due {
            match mode {
                ExecutionMode::Synchronous => callback(&fired),
                ExecutionMode::Asynchronous => {
                    std::thread::spawn(move || callback(&fired));
                }
            }
        }
        fired_count
    }

    // -- sweep and introspection --------------------------------------------

    /// Physically remove every event marked for deletion. Returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| !e.queued_for_deletion);
        let removed = before - events.len();
        if removed > 0 {
            debug!(removed, remaining = events.len(), "event sweep");
        }
        removed
    }

    /// Number of events in the queue, including ones marked for deletion.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether the queue holds no events at all.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Whether `id` is still present (marked-for-deletion events count until
    /// swept).
    pub fn contains(&self, id: EventId) -> bool {
        self.events.lock().iter().any(|e| e.id == id)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::mpsc;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn counter() -> (Arc<AtomicU32>, impl Fn(&EventFired) + Clone + Send + Sync + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        (count, move |_: &EventFired| {
            count2.fetch_add(1, Ordering::SeqCst);
        })
    }

    // -- 1. One-time semantics ----------------------------------------------

    #[test]
    fn one_time_fires_exactly_once_then_swept() {
        let queue = EventQueue::new();
        let now = Instant::now();
        let (count, cb) = counter();
        let id = queue.schedule_at(now, ms(10), cb);

        assert_eq!(queue.poll_due(now + ms(5)), 0, "not due yet");
        assert_eq!(queue.poll_due(now + ms(10)), 1);
        assert_eq!(queue.poll_due(now + ms(50)), 0, "one-time never refires");
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(queue.contains(id), "still present until swept");
        assert_eq!(queue.sweep(), 1);
        assert!(!queue.contains(id));
    }

    #[test]
    fn zero_timeout_fires_at_next_poll() {
        let queue = EventQueue::new();
        let (count, cb) = counter();
        queue.schedule_now(cb);
        queue.poll_due(Instant::now());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    // -- 2. Recurring semantics ---------------------------------------------

    #[test]
    fn recurring_counter_scenario_105ms_in_10ms_steps() {
        // Recurring event, timeout 10ms, stepped through 105ms of simulated
        // time: exactly 10 fires, and the event survives.
        let queue = EventQueue::new();
        let now = Instant::now();
        let (count, cb) = counter();
        let id = queue.schedule_recurring_at(now, ms(10), cb);

        let mut t = now;
        let mut remaining_ms = 105i64;
        while remaining_ms > 0 {
            let step = remaining_ms.min(10) as u64;
            t += ms(step);
            queue.poll_due(t);
            queue.sweep();
            remaining_ms -= step as i64;
        }

        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert!(queue.contains(id), "recurring event must not be deleted");
    }

    #[test]
    fn recurring_waits_full_timeout_since_last_fire() {
        let queue = EventQueue::new();
        let now = Instant::now();
        let (count, cb) = counter();
        queue.schedule_recurring_at(now, ms(10), cb);

        queue.poll_due(now + ms(15)); // fires, base resets to now+15
        assert_eq!(count.load(Ordering::SeqCst), 1);
        queue.poll_due(now + ms(20)); // only 5ms since last fire
        assert_eq!(count.load(Ordering::SeqCst), 1);
        queue.poll_due(now + ms(25));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn recurring_stops_after_cancel() {
        let queue = EventQueue::new();
        let now = Instant::now();
        let (count, cb) = counter();
        let id = queue.schedule_recurring_at(now, ms(10), cb);

        queue.poll_due(now + ms(10));
        assert!(queue.cancel(id));
        queue.poll_due(now + ms(20));
        queue.poll_due(now + ms(30));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        queue.sweep();
        assert!(!queue.contains(id));
    }

    // -- 3. Cancellation ----------------------------------------------------

    #[test]
    fn canceled_before_due_never_fires() {
        let queue = EventQueue::new();
        let now = Instant::now();
        let (count, cb) = counter();
        let id = queue.schedule_at(now, ms(10), cb);
        assert!(queue.cancel(id));
        queue.poll_due(now + ms(100));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_unknown_id_returns_false() {
        let queue = EventQueue::new();
        let known = queue.schedule(ms(10), |_| {});
        assert!(queue.cancel(known));
        assert!(!queue.cancel(EventId(9999)));
    }

    // -- 4. Parameters ------------------------------------------------------

    #[test]
    fn typed_parameter_reaches_callback() {
        let queue = EventQueue::new();
        let (tx, rx) = mpsc::channel::<String>();
        let tx = std::sync::Mutex::new(tx);
        queue.schedule_with_param(ms(0), "payload".to_owned(), move |fired| {
            let text = fired.param_as::<String>().expect("param type");
            tx.lock().unwrap().send(text.clone()).unwrap();
        });
        queue.poll_due(Instant::now());
        assert_eq!(rx.try_recv().unwrap(), "payload");
    }

    // -- 5. Callbacks scheduling callbacks ----------------------------------

    #[test]
    fn callback_may_schedule_more_events() {
        let queue = Arc::new(EventQueue::new());
        let now = Instant::now();
        let (count, cb) = counter();

        let queue2 = Arc::clone(&queue);
        queue.schedule_at(now, ms(0), move |_| {
            queue2.schedule_now(cb.clone());
        });

        queue.poll_due(now);
        assert_eq!(count.load(Ordering::SeqCst), 0, "chained event defers");
        queue.poll_due(now + ms(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_cancel_itself() {
        let queue = Arc::new(EventQueue::new());
        let now = Instant::now();
        let fired = Arc::new(AtomicU32::new(0));

        let queue2 = Arc::clone(&queue);
        let fired2 = Arc::clone(&fired);
        queue.schedule_recurring_at(now, ms(10), move |ctx| {
            fired2.fetch_add(1, Ordering::SeqCst);
            queue2.cancel(ctx.event_id);
        });

        queue.poll_due(now + ms(10));
        queue.poll_due(now + ms(20));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    // -- 6. Asynchronous execution ------------------------------------------

    #[test]
    fn asynchronous_callback_runs_detached() {
        let queue = EventQueue::new();
        let now = Instant::now();
        let (tx, rx) = mpsc::channel::<u32>();
        let tx = std::sync::Mutex::new(tx);
        queue.schedule_with(
            now,
            ms(0),
            None,
            Recurrence::OneTime,
            ExecutionMode::Asynchronous,
            move |_| {
                tx.lock().unwrap().send(7).unwrap();
            },
        );
        queue.poll_due(now);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            7,
            "detached callback must eventually run"
        );
    }

    // -- 7. Sweep hygiene ---------------------------------------------------

    #[test]
    fn sweep_leaves_unfired_events_alone() {
        let queue = EventQueue::new();
        let now = Instant::now();
        queue.schedule_at(now, ms(50), |_| {});
        queue.schedule_at(now, ms(5), |_| {});
        queue.poll_due(now + ms(10)); // fires only the 5ms one
        assert_eq!(queue.sweep(), 1);
        assert_eq!(queue.len(), 1);
    }
}
