//! Frame-rate accounting for the world clock.
//!
//! [`FrameCounter`] measures the wall-clock duration of each frame and keeps
//! a bounded window of recent frame rates so the engine can report current,
//! average, minimum and maximum FPS for diagnostics.

use std::collections::VecDeque;
use std::time::Instant;

/// How many frame samples the rolling window retains.
const SAMPLE_WINDOW: usize = 1000;

/// Tracks elapsed frame time and derived frame-rate statistics.
///
/// The scheduler reads [`elapsed_ms`](Self::elapsed_ms) at the end of a frame
/// to feed epoch normalization, then calls [`mark_frame`](Self::mark_frame)
/// to restart the stopwatch and record the sample.
#[derive(Debug)]
pub struct FrameCounter {
    frame_start: Instant,
    current_rate: f32,
    samples: VecDeque<f32>,
}

impl FrameCounter {
    /// Create a counter; the stopwatch starts immediately.
    pub fn new() -> Self {
        Self {
            frame_start: Instant::now(),
            current_rate: 0.0,
            samples: VecDeque::with_capacity(SAMPLE_WINDOW),
        }
    }

    /// Milliseconds elapsed since the last [`mark_frame`](Self::mark_frame).
    pub fn elapsed_ms(&self) -> f32 {
        self.frame_start.elapsed().as_secs_f32() * 1000.0
    }

    /// Microseconds elapsed since the last [`mark_frame`](Self::mark_frame).
    pub fn elapsed_us(&self) -> f32 {
        self.frame_start.elapsed().as_secs_f32() * 1_000_000.0
    }

    /// Close out the current frame: compute its rate, restart the stopwatch
    /// and push the sample into the rolling window.
    pub fn mark_frame(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        self.current_rate = if elapsed_ms > 0.0 {
            1000.0 / elapsed_ms
        } else {
            0.0
        };
        self.frame_start = Instant::now();
        if self.samples.len() == SAMPLE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(self.current_rate);
    }

    /// Frame rate of the most recently completed frame.
    pub fn current_rate(&self) -> f32 {
        self.current_rate
    }

    /// Mean frame rate over the sample window. Zero with no samples.
    pub fn average_rate(&self) -> f32 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f32>() / self.samples.len() as f32
        }
    }

    /// Slowest frame in the window. Zero with no samples.
    pub fn minimum_rate(&self) -> f32 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().copied().fold(f32::INFINITY, f32::min)
        }
    }

    /// Fastest frame in the window. Zero with no samples.
    pub fn maximum_rate(&self) -> f32 {
        self.samples
            .iter()
            .copied()
            .fold(0.0f32, f32::max)
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Default for FrameCounter {
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
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn starts_with_no_samples() {
        let counter = FrameCounter::new();
        assert_eq!(counter.sample_count(), 0);
        assert_eq!(counter.average_rate(), 0.0);
        assert_eq!(counter.minimum_rate(), 0.0);
        assert_eq!(counter.maximum_rate(), 0.0);
    }

    #[test]
    fn mark_frame_records_samples() {
        let mut counter = FrameCounter::new();
        sleep(Duration::from_millis(2));
        counter.mark_frame();
        assert_eq!(counter.sample_count(), 1);
        assert!(counter.current_rate() > 0.0);
        assert!(counter.average_rate() > 0.0);
    }

    #[test]
    fn window_is_bounded() {
        let mut counter = FrameCounter::new();
        for _ in 0..(SAMPLE_WINDOW + 10) {
            counter.mark_frame();
        }
        assert_eq!(counter.sample_count(), SAMPLE_WINDOW);
    }

    #[test]
    fn elapsed_grows_until_marked() {
        let mut counter = FrameCounter::new();
        sleep(Duration::from_millis(2));
        assert!(counter.elapsed_ms() >= 1.0);
        counter.mark_frame();
        assert!(counter.elapsed_ms() < 2.0, "stopwatch restarts on mark");
    }
}
