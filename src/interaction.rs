use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::EngineConfig;
use crate::events::Key;
use crate::timer::Timer;

/// What the controller should do in response to viewer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Hold auto-rotation (`paused_by_user = true`).
    Pause,
    /// Release the hold (`paused_by_user = false`).
    Resume,
    Seek(usize),
    Fullscreen,
    HelpToggled(bool),
}

/// Turns viewer input into pauses, seeks and the delayed auto-resume.
pub struct InteractionGate {
    pause_on_interaction: bool,
    resume_delay: Duration,
    auto_hide_delay: Duration,
    remote_control_enabled: bool,
    hovered: bool,
    help_open: bool,
    controls_visible: bool,
    resume: Timer,
    hide: Timer,
}

impl InteractionGate {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            pause_on_interaction: cfg.pause_on_interaction,
            resume_delay: cfg.resume_delay,
            auto_hide_delay: cfg.auto_hide_delay,
            remote_control_enabled: cfg.remote_control_enabled,
            hovered: false,
            help_open: false,
            controls_visible: false,
            resume: Timer::new("interaction-resume"),
            hide: Timer::new("controls-hide"),
        }
    }

    pub fn apply_config(&mut self, cfg: &EngineConfig) {
        self.pause_on_interaction = cfg.pause_on_interaction;
        self.resume_delay = cfg.resume_delay;
        self.auto_hide_delay = cfg.auto_hide_delay;
        self.remote_control_enabled = cfg.remote_control_enabled;
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    pub fn help_open(&self) -> bool {
        self.help_open
    }

    pub fn resume_pending(&self) -> bool {
        self.resume.is_armed()
    }

    /// Show the controls and restart the auto-hide countdown.
    pub fn on_activity(&mut self, now: Instant) {
        self.controls_visible = true;
        if self.hovered || self.help_open {
            self.hide.cancel();
        } else {
            self.hide.arm_once(now, self.auto_hide_delay);
        }
    }

    pub fn on_user_navigate(&mut self, target: usize, now: Instant) -> Vec<GateAction> {
        self.on_activity(now);
        let mut actions = Vec::with_capacity(2);
        if self.pause_on_interaction {
            actions.push(GateAction::Pause);
            if !self.hovered {
                self.resume.arm_once(now, self.resume_delay);
            }
        }
        actions.push(GateAction::Seek(target));
        actions
    }

    pub fn on_hover_start(&mut self, now: Instant) -> Vec<GateAction> {
        self.hovered = true;
        self.on_activity(now);
        if !self.pause_on_interaction {
            return Vec::new();
        }
        self.resume.cancel();
        vec![GateAction::Pause]
    }

    pub fn on_hover_end(&mut self, now: Instant) -> Vec<GateAction> {
        self.hovered = false;
        self.on_activity(now);
        if self.pause_on_interaction {
            self.resume.arm_once(now, self.resume_delay);
        }
        Vec::new()
    }

    /// Progress-bar click at `fraction` of its width.
    pub fn on_progress_click(
        &mut self,
        fraction: f64,
        total_slides: usize,
        now: Instant,
    ) -> Vec<GateAction> {
        if total_slides == 0 || !fraction.is_finite() {
            self.on_activity(now);
            return Vec::new();
        }
        let target = (fraction.clamp(0.0, 1.0) * total_slides as f64).floor() as usize;
        self.on_user_navigate(target.min(total_slides - 1), now)
    }

    pub fn on_key(
        &mut self,
        key: Key,
        current: usize,
        total_slides: usize,
        paused_by_user: bool,
        now: Instant,
    ) -> Vec<GateAction> {
        if !self.remote_control_enabled {
            debug!(?key, "remote control disabled; ignoring key");
            return Vec::new();
        }
        match key {
            Key::ArrowLeft if total_slides > 0 => {
                self.on_user_navigate(current.saturating_sub(1), now)
            }
            Key::ArrowRight if total_slides > 0 => {
                self.on_user_navigate((current + 1).min(total_slides - 1), now)
            }
            Key::Space => {
                self.on_activity(now);
                self.resume.cancel();
                if paused_by_user {
                    vec![GateAction::Resume]
                } else {
                    vec![GateAction::Pause]
                }
            }
            Key::Digit(d @ 1..=9) => {
                let target = usize::from(d) - 1;
                if target < total_slides {
                    self.on_user_navigate(target, now)
                } else {
                    self.on_activity(now);
                    Vec::new()
                }
            }
            Key::Char('f') => {
                self.on_activity(now);
                vec![GateAction::Fullscreen]
            }
            Key::Char('h') => {
                self.help_open = !self.help_open;
                self.on_activity(now);
                vec![GateAction::HelpToggled(self.help_open)]
            }
            Key::Escape if self.help_open => {
                self.help_open = false;
                self.on_activity(now);
                vec![GateAction::HelpToggled(false)]
            }
            _ => {
                self.on_activity(now);
                Vec::new()
            }
        }
    }

    /// Cancel any pending auto-resume (explicit resume or restart).
    pub fn clear_resume(&mut self) {
        self.resume.cancel();
    }

    pub fn deadlines(&self) -> [Option<Instant>; 2] {
        [self.resume.deadline(), self.hide.deadline()]
    }

    pub fn on_timer(&mut self, now: Instant) -> Vec<GateAction> {
        let mut actions = Vec::new();
        if self.resume.fire(now).is_some() {
            debug!("interaction idle; releasing pause");
            actions.push(GateAction::Resume);
        }
        if self.hide.fire(now).is_some() && !self.hovered && !self.help_open {
            self.controls_visible = false;
        }
        actions
    }

    pub fn destroy(&mut self) {
        self.resume.cancel();
        self.hide.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> InteractionGate {
        InteractionGate::new(&EngineConfig::default())
    }

    #[test]
    fn navigate_pauses_and_schedules_resume() {
        let t0 = Instant::now();
        let mut gate = gate();
        let actions = gate.on_user_navigate(3, t0);
        assert_eq!(actions, vec![GateAction::Pause, GateAction::Seek(3)]);
        assert!(gate.on_timer(t0 + Duration::from_millis(2_999)).is_empty());
        // A second interaction pushes the resume out again.
        gate.on_user_navigate(4, t0 + Duration::from_millis(2_000));
        assert!(gate.on_timer(t0 + Duration::from_millis(3_000)).is_empty());
        assert_eq!(
            gate.on_timer(t0 + Duration::from_millis(5_000)),
            vec![GateAction::Resume]
        );
    }

    #[test]
    fn no_pause_when_disabled() {
        let t0 = Instant::now();
        let mut gate = InteractionGate::new(&EngineConfig {
            pause_on_interaction: false,
            ..EngineConfig::default()
        });
        assert_eq!(gate.on_user_navigate(1, t0), vec![GateAction::Seek(1)]);
        assert!(gate.on_hover_start(t0).is_empty());
        assert!(!gate.resume_pending());
    }

    #[test]
    fn hover_holds_until_left() {
        let t0 = Instant::now();
        let mut gate = gate();
        assert_eq!(gate.on_hover_start(t0), vec![GateAction::Pause]);
        assert!(gate.on_timer(t0 + Duration::from_secs(60)).is_empty());
        assert!(gate.controls_visible());
        gate.on_hover_end(t0 + Duration::from_secs(60));
        assert_eq!(
            gate.on_timer(t0 + Duration::from_secs(63)),
            vec![GateAction::Resume]
        );
    }

    #[test]
    fn controls_auto_hide_unless_help_open() {
        let t0 = Instant::now();
        let mut gate = gate();
        gate.on_activity(t0);
        gate.on_timer(t0 + Duration::from_secs(5));
        assert!(!gate.controls_visible());

        gate.on_key(Key::Char('h'), 0, 5, false, t0);
        gate.on_timer(t0 + Duration::from_secs(30));
        assert!(gate.controls_visible() && gate.help_open());
        assert_eq!(
            gate.on_key(Key::Escape, 0, 5, false, t0 + Duration::from_secs(30)),
            vec![GateAction::HelpToggled(false)]
        );
        gate.on_timer(t0 + Duration::from_secs(35));
        assert!(!gate.controls_visible());
    }

    #[test]
    fn key_mapping() {
        let t0 = Instant::now();
        let mut gate = gate();
        assert_eq!(
            gate.on_key(Key::ArrowRight, 4, 5, false, t0),
            vec![GateAction::Pause, GateAction::Seek(4)]
        );
        assert_eq!(
            gate.on_key(Key::ArrowLeft, 0, 5, false, t0),
            vec![GateAction::Pause, GateAction::Seek(0)]
        );
        assert_eq!(
            gate.on_key(Key::Digit(3), 0, 5, false, t0),
            vec![GateAction::Pause, GateAction::Seek(2)]
        );
        assert!(gate.on_key(Key::Digit(9), 0, 5, false, t0).is_empty());
        assert_eq!(
            gate.on_key(Key::Space, 0, 5, true, t0),
            vec![GateAction::Resume]
        );
        assert_eq!(
            gate.on_key(Key::Char('f'), 0, 5, false, t0),
            vec![GateAction::Fullscreen]
        );
        assert!(gate.on_key(Key::Escape, 0, 5, false, t0).is_empty());
    }

    #[test]
    fn keys_ignored_without_remote_control() {
        let t0 = Instant::now();
        let mut gate = InteractionGate::new(&EngineConfig {
            remote_control_enabled: false,
            ..EngineConfig::default()
        });
        assert!(gate.on_key(Key::ArrowRight, 0, 5, false, t0).is_empty());
        assert_eq!(
            gate.on_progress_click(0.5, 4, t0),
            vec![GateAction::Pause, GateAction::Seek(2)]
        );
    }
}
