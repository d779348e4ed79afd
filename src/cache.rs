//! Per-field averaging cache
//!
//! A [`ThrottledAverage`] absorbs raw bus-rate samples and emits at most one
//! averaged value per throttle interval, decoupling how fast the bus is
//! sampled from how fast consumers observe changes. One instance exists per
//! enabled numeric field per inverter.

use std::time::{Duration, Instant};

/// Rate-limited accumulator emitting the arithmetic mean of each window.
#[derive(Debug, Clone)]
pub struct ThrottledAverage {
    throttle: Duration,
    sum: f64,
    count: u32,
    window_opened_at: Option<Instant>,
    last_emitted: Option<f64>,
}

impl ThrottledAverage {
    pub fn new(throttle: Duration) -> Self {
        Self {
            throttle,
            sum: 0.0,
            count: 0,
            window_opened_at: None,
            last_emitted: None,
        }
    }

    /// Fold a raw sample into the current window.
    ///
    /// When the window has been open for at least the throttle interval, the
    /// mean of the accumulated samples is published: it becomes the new
    /// cached value, the window resets, and the mean is returned so the
    /// caller can notify its telemetry sink. Samples inside a window are
    /// never published individually.
    pub fn record_sample(&mut self, value: f64, now: Instant) -> Option<f64> {
        let opened = *self.window_opened_at.get_or_insert(now);
        self.sum += value;
        self.count += 1;

        if now.duration_since(opened) < self.throttle {
            return None;
        }

        // Window closed with at least one sample (the one just folded in)
        let mean = self.sum / f64::from(self.count);
        self.last_emitted = Some(mean);
        self.sum = 0.0;
        self.count = 0;
        self.window_opened_at = Some(now);
        Some(mean)
    }

    /// The most recently published average, or `None` if no window has
    /// closed yet. Never changes between emissions.
    pub fn current_value(&self) -> Option<f64> {
        self.last_emitted
    }
}
