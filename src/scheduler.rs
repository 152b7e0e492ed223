use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::state::{PerformanceLevel, SlideshowState};
use crate::timer::{Timer, TimerHandle};

const LOW_LEVEL_FLOOR: Duration = Duration::from_secs(30);
const VERY_LOW_FPS: f64 = 20.0;
const VERY_LOW_FPS_FLOOR: Duration = Duration::from_secs(40);
const LOW_FPS: f64 = 30.0;
const LOW_FPS_FLOOR: Duration = Duration::from_secs(30);

/// Delay between automatic advances after performance throttling.
///
/// The performance-level rule and the frame-rate rule are evaluated
/// independently and the slower of the two wins.
pub fn effective_interval(base: Duration, level: PerformanceLevel, fps: f64) -> Duration {
    let by_level = match level {
        PerformanceLevel::Low => scale(base, 3, 2).max(LOW_LEVEL_FLOOR),
        PerformanceLevel::Basic => scale(base, 6, 5),
        _ => base,
    };
    let by_fps = if fps < VERY_LOW_FPS {
        scale(base, 2, 1).max(VERY_LOW_FPS_FLOOR)
    } else if fps < LOW_FPS {
        scale(base, 13, 10).max(LOW_FPS_FLOOR)
    } else {
        base
    };
    by_level.max(by_fps)
}

// Exact rational scaling so configured millisecond values stay exact.
fn scale(base: Duration, num: u32, den: u32) -> Duration {
    let nanos = base.as_nanos() * u128::from(num) / u128::from(den);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Conditions that must all hold for the rotation timer to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateInputs {
    pub total_slides: usize,
    pub config_loaded: bool,
    pub auto_rotation_enabled: bool,
    pub paused_by_user: bool,
    pub carousel_ready: bool,
    pub has_error: bool,
}

impl GateInputs {
    pub fn from_state(state: &SlideshowState, config_loaded: bool) -> Self {
        Self {
            total_slides: state.total_slides,
            config_loaded,
            auto_rotation_enabled: state.auto_rotation_enabled,
            paused_by_user: state.paused_by_user,
            carousel_ready: state.carousel_ready,
            has_error: state.has_error,
        }
    }

    pub fn should_run(&self) -> bool {
        self.total_slides > 1
            && self.config_loaded
            && self.auto_rotation_enabled
            && !self.paused_by_user
            && self.carousel_ready
            && !self.has_error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    Started,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Advance,
    /// The device is struggling; this cycle is skipped but the timer keeps running.
    Skipped,
}

pub struct RotationScheduler {
    rotation: Timer,
    /// Handle of the armed rotation timer; anything else firing is stale.
    rotation_handle: Option<TimerHandle>,
    backoff: Timer,
    should_run: Option<bool>,
    interval: Duration,
    min_fps: f64,
    backoff_delay: Duration,
}

impl RotationScheduler {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            rotation: Timer::new("rotation"),
            rotation_handle: None,
            backoff: Timer::new("rotation-backoff"),
            should_run: None,
            interval: cfg.base_slide_duration,
            min_fps: cfg.min_fps_for_advance,
            backoff_delay: cfg.error_backoff,
        }
    }

    pub fn apply_config(&mut self, cfg: &EngineConfig) {
        self.min_fps = cfg.min_fps_for_advance;
        self.backoff_delay = cfg.error_backoff;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.rotation_handle.is_some_and(|handle| self.rotation.is_live(handle))
    }

    /// Re-evaluate the start gate. Acts only when the outcome changes.
    ///
    /// `first_tick` is the delay before the first advance when starting,
    /// normally the time left on the current slide.
    pub fn evaluate(
        &mut self,
        gate: GateInputs,
        now: Instant,
        first_tick: Duration,
    ) -> Option<GateTransition> {
        let run = gate.should_run();
        if self.should_run == Some(run) {
            return None;
        }
        let was_running = self.should_run == Some(true);
        self.should_run = Some(run);
        if run {
            let handle = self.rotation.arm_periodic(now, first_tick, self.interval);
            self.rotation_handle = Some(handle);
            info!(
                interval_ms = self.interval.as_millis() as u64,
                first_tick_ms = first_tick.as_millis() as u64,
                "auto-rotation started"
            );
            Some(GateTransition::Started)
        } else {
            self.rotation.cancel();
            self.rotation_handle = None;
            debug!(gate = ?gate, "auto-rotation gate closed");
            if was_running {
                info!("auto-rotation stopped");
                Some(GateTransition::Stopped)
            } else {
                None
            }
        }
    }

    /// Adopt a new effective interval. A running timer is restarted with
    /// `first_tick` before its next advance.
    pub fn set_interval(&mut self, interval: Duration, now: Instant, first_tick: Duration) -> bool {
        if interval == self.interval {
            return false;
        }
        info!(
            from_ms = self.interval.as_millis() as u64,
            to_ms = interval.as_millis() as u64,
            "effective rotation interval changed"
        );
        self.interval = interval;
        if self.is_running() {
            let handle = self.rotation.arm_periodic(now, first_tick, interval);
            self.rotation_handle = Some(handle);
        }
        true
    }

    /// Give the current slide a full interval again.
    pub fn restart(&mut self, now: Instant) {
        if self.is_running() {
            let handle = self.rotation.arm_periodic(now, self.interval, self.interval);
            self.rotation_handle = Some(handle);
        }
    }

    pub fn on_timer(&mut self, now: Instant, current_fps: f64) -> Option<Tick> {
        let fired = self.rotation.fire(now)?;
        if self.rotation_handle != Some(fired) {
            warn!(slot = fired.slot(), "ignoring tick from a stale rotation timer");
            return None;
        }
        if current_fps < self.min_fps {
            debug!(fps = current_fps, "skipping rotation tick on a struggling device");
            return Some(Tick::Skipped);
        }
        Some(Tick::Advance)
    }

    pub fn begin_backoff(&mut self, now: Instant) {
        self.backoff.arm_once(now, self.backoff_delay);
    }

    pub fn backoff_active(&self) -> bool {
        self.backoff.is_armed()
    }

    pub fn cancel_backoff(&mut self) -> bool {
        self.backoff.cancel()
    }

    /// Whether the back-off elapsed at `now`.
    pub fn on_backoff_timer(&mut self, now: Instant) -> bool {
        self.backoff.fire(now).is_some()
    }

    pub fn deadlines(&self) -> [Option<Instant>; 2] {
        [self.rotation.deadline(), self.backoff.deadline()]
    }

    pub fn destroy(&mut self) {
        self.rotation.cancel();
        self.rotation_handle = None;
        self.backoff.cancel();
        self.should_run = Some(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(20_000);

    fn open_gate() -> GateInputs {
        GateInputs {
            total_slides: 5,
            config_loaded: true,
            auto_rotation_enabled: true,
            paused_by_user: false,
            carousel_ready: true,
            has_error: false,
        }
    }

    #[test]
    fn interval_adjustments() {
        assert_eq!(
            effective_interval(BASE, PerformanceLevel::Low, 60.0),
            Duration::from_millis(30_000)
        );
        assert_eq!(
            effective_interval(BASE, PerformanceLevel::Standard, 18.0),
            Duration::from_millis(40_000)
        );
        assert_eq!(
            effective_interval(BASE, PerformanceLevel::Basic, 35.0),
            Duration::from_millis(24_000)
        );
        assert_eq!(effective_interval(BASE, PerformanceLevel::High, 60.0), BASE);
    }

    #[test]
    fn slower_rule_wins() {
        // Low tier alone: 30s; fps 25 alone: 30s; fps 10 alone: 40s.
        assert_eq!(
            effective_interval(BASE, PerformanceLevel::Low, 10.0),
            Duration::from_millis(40_000)
        );
        let long = Duration::from_secs(40);
        assert_eq!(
            effective_interval(long, PerformanceLevel::Low, 25.0),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn gate_requires_more_than_one_slide() {
        for total in 0..=1 {
            let gate = GateInputs {
                total_slides: total,
                ..open_gate()
            };
            assert!(!gate.should_run());
        }
        assert!(open_gate().should_run());
        assert!(
            !GateInputs {
                paused_by_user: true,
                ..open_gate()
            }
            .should_run()
        );
    }

    #[test]
    fn evaluate_only_acts_on_change() {
        let t0 = Instant::now();
        let mut scheduler = RotationScheduler::new(&EngineConfig::default());
        assert_eq!(
            scheduler.evaluate(open_gate(), t0, BASE),
            Some(GateTransition::Started)
        );
        let deadline = scheduler.deadlines()[0];
        assert_eq!(scheduler.evaluate(open_gate(), t0 + BASE / 2, BASE), None);
        assert_eq!(scheduler.deadlines()[0], deadline);
        let closed = GateInputs {
            carousel_ready: false,
            ..open_gate()
        };
        assert_eq!(
            scheduler.evaluate(closed, t0, BASE),
            Some(GateTransition::Stopped)
        );
        assert!(!scheduler.is_running());
    }

    #[test]
    fn ticks_skip_when_fps_is_too_low() {
        let t0 = Instant::now();
        let mut scheduler = RotationScheduler::new(&EngineConfig::default());
        scheduler.evaluate(open_gate(), t0, BASE);
        assert_eq!(scheduler.on_timer(t0 + BASE, 12.0), Some(Tick::Skipped));
        assert!(scheduler.is_running());
        assert_eq!(scheduler.on_timer(t0 + BASE * 2, 40.0), Some(Tick::Advance));
    }

    #[test]
    fn restart_rearms_with_full_interval() {
        let t0 = Instant::now();
        let mut scheduler = RotationScheduler::new(&EngineConfig::default());
        scheduler.evaluate(open_gate(), t0, BASE / 4);
        assert_eq!(scheduler.deadlines()[0], Some(t0 + BASE / 4));

        let t1 = t0 + Duration::from_secs(2);
        scheduler.restart(t1);
        assert!(scheduler.is_running());
        assert_eq!(scheduler.deadlines()[0], Some(t1 + BASE));
        assert_eq!(scheduler.on_timer(t0 + BASE / 4, 60.0), None);
        assert_eq!(scheduler.on_timer(t1 + BASE, 60.0), Some(Tick::Advance));

        scheduler.destroy();
        assert!(!scheduler.is_running());
        scheduler.restart(t1);
        assert_eq!(scheduler.deadlines()[0], None);
    }

    #[test]
    fn backoff_is_one_shot() {
        let t0 = Instant::now();
        let mut scheduler = RotationScheduler::new(&EngineConfig::default());
        scheduler.begin_backoff(t0);
        assert!(scheduler.backoff_active());
        assert!(!scheduler.on_backoff_timer(t0 + Duration::from_millis(4_999)));
        assert!(scheduler.on_backoff_timer(t0 + Duration::from_millis(5_000)));
        assert!(!scheduler.backoff_active());
    }
}
