//! Owned timer slots.
//!
//! Every component that needs a timer owns a [`Timer`] slot. Arming a slot
//! bumps its generation, so any [`TimerHandle`] issued earlier stops being
//! live and can never fire again; a slot therefore never holds two
//! overlapping timers. Slots do not sleep themselves: the engine loop asks
//! for the earliest deadline and calls [`Timer::fire`] once it has passed.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    slot: &'static str,
    generation: u64,
}

impl TimerHandle {
    pub fn slot(&self) -> &'static str {
        self.slot
    }
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    deadline: Instant,
    period: Option<Duration>,
}

#[derive(Debug)]
pub struct Timer {
    slot: &'static str,
    generation: u64,
    armed: Option<Armed>,
}

impl Timer {
    pub fn new(slot: &'static str) -> Self {
        Self {
            slot,
            generation: 0,
            armed: None,
        }
    }

    /// Arm a one-shot timer firing `delay` after `now`.
    pub fn arm_once(&mut self, now: Instant, delay: Duration) -> TimerHandle {
        self.arm(Armed {
            deadline: now + delay,
            period: None,
        })
    }

    /// Arm a periodic timer whose first firing is `first` after `now`.
    pub fn arm_periodic(&mut self, now: Instant, first: Duration, period: Duration) -> TimerHandle {
        self.arm(Armed {
            deadline: now + first,
            period: Some(period.max(Duration::from_millis(1))),
        })
    }

    fn arm(&mut self, armed: Armed) -> TimerHandle {
        self.generation = self.generation.wrapping_add(1);
        self.armed = Some(armed);
        self.handle()
    }

    /// Disarm the slot. Returns whether a timer was armed.
    pub fn cancel(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        self.armed.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.armed.is_some() && handle.slot == self.slot && handle.generation == self.generation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|a| a.deadline)
    }

    /// Fire the timer if its deadline has passed.
    ///
    /// Periodic timers are rescheduled one period later (skipping missed
    /// periods rather than bursting); one-shot timers are disarmed.
    pub fn fire(&mut self, now: Instant) -> Option<TimerHandle> {
        let armed = self.armed?;
        if armed.deadline > now {
            return None;
        }
        let handle = self.handle();
        match armed.period {
            Some(period) => {
                let mut next = armed.deadline + period;
                if next <= now {
                    next = now + period;
                }
                self.armed = Some(Armed {
                    deadline: next,
                    period: Some(period),
                });
            }
            None => self.armed = None,
        }
        Some(handle)
    }

    fn handle(&self) -> TimerHandle {
        TimerHandle {
            slot: self.slot,
            generation: self.generation,
        }
    }
}

/// Earliest of a set of optional deadlines.
pub fn earliest<I>(deadlines: I) -> Option<Instant>
where
    I: IntoIterator<Item = Option<Instant>>,
{
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_invalidates_previous_handle() {
        let t0 = Instant::now();
        let mut timer = Timer::new("rotation");
        let first = timer.arm_periodic(t0, Duration::from_secs(1), Duration::from_secs(1));
        let second = timer.arm_periodic(t0, Duration::from_secs(2), Duration::from_secs(2));
        assert!(!timer.is_live(first));
        assert!(timer.is_live(second));
        assert!(timer.fire(t0 + Duration::from_secs(1)).is_none());
        assert_eq!(timer.fire(t0 + Duration::from_secs(2)), Some(second));
    }

    #[test]
    fn periodic_reschedules_and_once_disarms() {
        let t0 = Instant::now();
        let mut periodic = Timer::new("progress");
        periodic.arm_periodic(t0, Duration::from_millis(100), Duration::from_millis(100));
        assert!(periodic.fire(t0 + Duration::from_millis(100)).is_some());
        assert_eq!(periodic.deadline(), Some(t0 + Duration::from_millis(200)));
        // A late wake-up skips the missed periods.
        assert!(periodic.fire(t0 + Duration::from_millis(550)).is_some());
        assert_eq!(periodic.deadline(), Some(t0 + Duration::from_millis(650)));

        let mut once = Timer::new("backoff");
        once.arm_once(t0, Duration::from_secs(5));
        assert!(once.fire(t0 + Duration::from_secs(5)).is_some());
        assert!(!once.is_armed());
        assert!(once.fire(t0 + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn cancel_reports_prior_state() {
        let t0 = Instant::now();
        let mut timer = Timer::new("resume");
        assert!(!timer.cancel());
        let handle = timer.arm_once(t0, Duration::from_secs(3));
        assert!(timer.cancel());
        assert!(!timer.is_live(handle));
        assert_eq!(
            earliest([None, Some(t0 + Duration::from_secs(2)), Some(t0 + Duration::from_secs(1))]),
            Some(t0 + Duration::from_secs(1))
        );
    }
}
