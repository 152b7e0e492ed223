use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::timer::Timer;

/// Fraction at which the tracker emits its near-complete diagnostic.
pub const NEAR_COMPLETE: f64 = 0.995;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub slide_start: Instant,
    pub elapsed_fraction: f64,
    pub paused_at: Option<Instant>,
    pub paused_fraction: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSignal {
    NearComplete { index: usize },
}

/// Tracks elapsed time within the current slide.
///
/// Starts paused at fraction zero; the controller resumes it whenever the
/// rotation timer runs. It never moves the canonical index itself.
pub struct ProgressTracker {
    tracked_index: Option<usize>,
    interval: Duration,
    resolution: Duration,
    slide_start: Instant,
    fraction: f64,
    paused_at: Option<Instant>,
    paused_fraction: Option<f64>,
    near_complete_sent: bool,
    resets: u64,
    timer: Timer,
}

impl ProgressTracker {
    pub fn new(interval: Duration, resolution: Duration, now: Instant) -> Self {
        Self {
            tracked_index: None,
            interval: interval.max(Duration::from_millis(1)),
            resolution: resolution.max(Duration::from_millis(1)),
            slide_start: now,
            fraction: 0.0,
            paused_at: Some(now),
            paused_fraction: Some(0.0),
            near_complete_sent: false,
            resets: 0,
            timer: Timer::new("progress"),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Number of times the tracker was reset by an index change.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Most recently computed elapsed fraction.
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            slide_start: self.slide_start,
            elapsed_fraction: self.fraction,
            paused_at: self.paused_at,
            paused_fraction: self.paused_fraction,
        }
    }

    fn compute(&self, now: Instant) -> f64 {
        if let Some(paused) = self.paused_fraction {
            return paused;
        }
        let elapsed = now.saturating_duration_since(self.slide_start);
        (elapsed.as_secs_f64() / self.interval.as_secs_f64()).min(1.0)
    }

    /// Time left in the current slide at the current interval.
    pub fn remaining(&self, now: Instant) -> Duration {
        let fraction = self.compute(now).clamp(0.0, 1.0);
        self.interval.mul_f64(1.0 - fraction)
    }

    pub fn pause(&mut self, now: Instant) {
        if self.is_paused() {
            return;
        }
        self.fraction = self.compute(now);
        self.paused_at = Some(now);
        self.paused_fraction = Some(self.fraction);
        self.timer.cancel();
        trace!(fraction = self.fraction, "progress paused");
    }

    pub fn resume(&mut self, now: Instant) {
        let Some(paused_fraction) = self.paused_fraction.take() else {
            return;
        };
        self.paused_at = None;
        self.slide_start = self.virtual_start(now, paused_fraction);
        self.fraction = paused_fraction;
        self.timer.arm_periodic(now, self.resolution, self.resolution);
        trace!(fraction = self.fraction, "progress resumed");
    }

    /// Reset for a new canonical index. Returns whether a reset happened.
    pub fn sync_to_index(&mut self, index: usize, now: Instant) -> bool {
        if self.tracked_index == Some(index) {
            return false;
        }
        self.tracked_index = Some(index);
        self.reset(now);
        true
    }

    /// Start the current slide over at fraction zero, keeping the pause state.
    pub fn reset(&mut self, now: Instant) {
        self.fraction = 0.0;
        self.slide_start = now;
        self.near_complete_sent = false;
        self.resets += 1;
        if self.is_paused() {
            self.paused_at = Some(now);
            self.paused_fraction = Some(0.0);
        }
    }

    /// Change the interval while keeping the elapsed fraction.
    pub fn set_interval(&mut self, interval: Duration, now: Instant) {
        let interval = interval.max(Duration::from_millis(1));
        if interval == self.interval {
            return;
        }
        let fraction = self.compute(now);
        self.interval = interval;
        if !self.is_paused() {
            self.slide_start = self.virtual_start(now, fraction);
            self.fraction = fraction;
        }
    }

    pub fn set_resolution(&mut self, resolution: Duration, now: Instant) {
        let resolution = resolution.max(Duration::from_millis(1));
        if resolution == self.resolution {
            return;
        }
        self.resolution = resolution;
        if self.timer.is_armed() {
            self.timer.arm_periodic(now, resolution, resolution);
        }
    }

    fn virtual_start(&self, now: Instant, fraction: f64) -> Instant {
        let offset = self.interval.mul_f64(fraction.clamp(0.0, 1.0));
        now.checked_sub(offset).unwrap_or(now)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn on_timer(&mut self, now: Instant) -> Option<ProgressSignal> {
        self.timer.fire(now)?;
        self.fraction = self.compute(now);
        if self.fraction >= NEAR_COMPLETE && !self.near_complete_sent {
            self.near_complete_sent = true;
            return self
                .tracked_index
                .map(|index| ProgressSignal::NearComplete { index });
        }
        None
    }

    pub fn destroy(&mut self) {
        self.timer.cancel();
    }
}
