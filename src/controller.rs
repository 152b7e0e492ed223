//! Top-level orchestration of the rotation engine.
//!
//! Every index mutation (rotation tick, carousel selection, user command)
//! goes through [`SlideshowController::set_index`]. After every mutation the
//! controller re-derives the rotation gate and the lifecycle phase, so
//! start/stop decisions are pushed on change instead of being polled.

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::carousel::{CarouselAdapter, CarouselEvents, CarouselOptions, CarouselWidget};
use crate::config::EngineConfig;
use crate::error::Error;
use crate::events::{
    CarouselEvent, IndexChange, Notice, PerformanceSample, Presentation, SlideSource, UserInput,
};
use crate::interaction::{GateAction, InteractionGate};
use crate::progress::{ProgressSignal, ProgressTracker};
use crate::scheduler::{GateInputs, GateTransition, RotationScheduler, Tick, effective_interval};
use crate::state::{Phase, PhaseInputs, PhaseSM, SlideshowState};
use crate::timer::{Timer, earliest};

pub struct SlideshowController<W> {
    state: SlideshowState,
    config: EngineConfig,
    config_loaded: bool,
    carousel: CarouselAdapter<W>,
    scheduler: RotationScheduler,
    tracker: ProgressTracker,
    gate: InteractionGate,
    phase: PhaseSM,
    init_attempts: u32,
    init_retry: Timer,
    carousel_moved_this_turn: bool,
    notices: Vec<Notice>,
}

impl<W: CarouselWidget> SlideshowController<W> {
    /// Build the engine for `total_slides` slides. `None` configuration keeps
    /// the rotation gate closed until [`Self::apply_config`] provides one.
    pub fn new(
        widget: W,
        events: CarouselEvents,
        total_slides: usize,
        config: Option<EngineConfig>,
        now: Instant,
    ) -> Self {
        let config_loaded = config.is_some();
        let config = config.unwrap_or_default();
        let state = SlideshowState::new(total_slides);
        let interval = effective_interval(
            config.base_slide_duration,
            state.performance_level,
            state.current_fps,
        );
        let mut tracker = ProgressTracker::new(interval, config.progress_resolution, now);
        tracker.sync_to_index(state.current_index, now);
        Self {
            scheduler: RotationScheduler::new(&config),
            gate: InteractionGate::new(&config),
            carousel: CarouselAdapter::new(widget, events),
            phase: PhaseSM::new(),
            init_attempts: 0,
            init_retry: Timer::new("carousel-init-retry"),
            carousel_moved_this_turn: false,
            notices: Vec::new(),
            state,
            config,
            config_loaded,
            tracker,
        }
    }

    /// Initialise the carousel (when there is something to show) and evaluate the gate.
    pub fn start(&mut self, now: Instant) {
        if self.state.total_slides > 0 {
            self.initialize_carousel(now);
        }
        self.reconcile(now);
    }

    pub fn state(&self) -> &SlideshowState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn carousel(&self) -> &CarouselAdapter<W> {
        &self.carousel
    }

    pub fn rotation_interval(&self) -> std::time::Duration {
        self.scheduler.interval()
    }

    /// The single authoritative index setter.
    ///
    /// Clamps the proposal, moves the carousel when the proposal did not come
    /// from it, and resets progress only when the index actually changes.
    pub fn set_index(&mut self, change: IndexChange, now: Instant) -> Result<bool, Error> {
        let index = self.state.clamp_index(change.index);
        if change.source != SlideSource::Carousel
            && self.carousel.is_ready()
            && self.carousel.position() != index
        {
            self.carousel.seek(index, false)?;
        }
        if index == self.state.current_index {
            return Ok(false);
        }
        let from = self.state.current_index;
        self.state.current_index = index;
        self.tracker.sync_to_index(index, now);
        match change.source {
            // The widget already committed this slide; a rotation tick later
            // in the same turn must not advance past it.
            SlideSource::Carousel => self.carousel_moved_this_turn = true,
            // Explicit navigation gives the chosen slide a full interval.
            SlideSource::User => self.scheduler.restart(now),
            SlideSource::Scheduler => {}
        }
        info!(from, to = index, source = ?change.source, "slide changed");
        Ok(true)
    }

    pub fn next(&mut self, now: Instant) -> Result<bool, Error> {
        self.advance(SlideSource::User, now)
    }

    pub fn previous(&mut self, now: Instant) -> Result<bool, Error> {
        let total = self.state.total_slides;
        if total == 0 {
            return Ok(false);
        }
        let target = (self.state.current_index + total - 1) % total;
        let result = self.set_index(IndexChange::new(SlideSource::User, target), now);
        self.reconcile(now);
        result
    }

    pub fn go_to(&mut self, index: usize, now: Instant) -> Result<bool, Error> {
        let result = self.set_index(IndexChange::new(SlideSource::User, index), now);
        self.reconcile(now);
        result
    }

    /// Back to the first slide with auto-play resumed.
    pub fn restart(&mut self, now: Instant) -> Result<bool, Error> {
        self.gate.clear_resume();
        self.scheduler.cancel_backoff();
        self.state.paused_by_user = false;
        self.state.auto_rotation_enabled = true;
        let result = self.set_index(IndexChange::new(SlideSource::User, 0), now);
        if matches!(result, Ok(false)) {
            // Already on the first slide: start it over all the same.
            self.tracker.reset(now);
            self.scheduler.restart(now);
        }
        info!("slideshow restarted");
        self.reconcile(now);
        result
    }

    pub fn toggle_auto_play(&mut self, now: Instant) {
        let enabled = !self.state.auto_rotation_enabled;
        if self.scheduler.cancel_backoff() {
            debug!("manual toggle overrides error back-off");
        }
        self.state.auto_rotation_enabled = enabled;
        info!(enabled, "auto-play toggled");
        self.reconcile(now);
    }

    /// Leave the terminal error state and run carousel initialisation again.
    pub fn retry_carousel(&mut self, now: Instant) {
        info!("carousel retry requested");
        self.state.has_error = false;
        self.init_attempts = 0;
        self.init_retry.cancel();
        self.initialize_carousel(now);
        self.reconcile(now);
    }

    fn advance(&mut self, source: SlideSource, now: Instant) -> Result<bool, Error> {
        let total = self.state.total_slides;
        if total == 0 {
            return Ok(false);
        }
        if source == SlideSource::Scheduler && !self.carousel.is_ready() {
            return Err(Error::CarouselNotReady);
        }
        let target = (self.state.current_index + 1) % total;
        let result = self.set_index(IndexChange::new(source, target), now);
        self.reconcile(now);
        result
    }

    fn initialize_carousel(&mut self, now: Instant) {
        if self.state.total_slides == 0 || self.state.has_error {
            return;
        }
        self.init_attempts += 1;
        let attempt = self.init_attempts;
        let max_attempts = self.config.carousel_init_attempts.max(1);
        let fallback = max_attempts > 1 && attempt >= max_attempts;
        let mut options = CarouselOptions::from_config(&self.config, self.state.current_index);
        if fallback {
            options = options.fallback();
        }
        match self.carousel.initialize(options, self.state.total_slides) {
            Ok(()) => {
                info!(attempt, fallback, slides = self.state.total_slides, "carousel ready");
                self.state.carousel_ready = true;
                self.init_attempts = 0;
                self.init_retry.cancel();
            }
            Err(err) if attempt >= max_attempts => {
                self.state.carousel_ready = false;
                self.state.has_error = true;
                let err = Error::CarouselInit {
                    attempts: attempt,
                    reason: format!("{err:#}"),
                };
                error!(error = %err, "carousel unavailable");
            }
            Err(err) => {
                self.state.carousel_ready = false;
                let reason = format!("{err:#}");
                warn!(
                    attempt,
                    max_attempts,
                    error = %reason,
                    "carousel initialisation failed; retrying"
                );
                self.init_retry.arm_once(now, self.config.carousel_retry_delay);
            }
        }
    }

    pub fn handle_carousel_event(&mut self, event: CarouselEvent, now: Instant) {
        self.carousel.observe(&event);
        match event {
            CarouselEvent::Select(index) => {
                let change = IndexChange::new(SlideSource::Carousel, index);
                if let Err(err) = self.set_index(change, now) {
                    warn!(error = %err, "failed to apply carousel selection");
                }
            }
            CarouselEvent::Settle => debug!(index = self.state.current_index, "carousel settled"),
            CarouselEvent::Resize { .. } => {}
            CarouselEvent::Init => {
                if !self.state.has_error && !self.state.carousel_ready {
                    info!("carousel reported ready");
                    self.state.carousel_ready = true;
                    self.carousel.mark_ready();
                    self.init_retry.cancel();
                }
            }
        }
        self.reconcile(now);
    }

    pub fn handle_performance(&mut self, sample: PerformanceSample, now: Instant) {
        if sample.level != self.state.performance_level {
            info!(
                from = ?self.state.performance_level,
                to = ?sample.level,
                fps = sample.fps,
                "performance level changed"
            );
        }
        debug!(fps = sample.fps, memory_mb = sample.memory_usage_mb, "performance sample");
        self.state.current_fps = sample.fps;
        self.state.performance_level = sample.level;
        self.reconcile(now);
    }

    pub fn apply_config(&mut self, config: Option<EngineConfig>, now: Instant) {
        match config {
            Some(cfg) => {
                self.scheduler.apply_config(&cfg);
                self.gate.apply_config(&cfg);
                self.tracker.set_resolution(cfg.progress_resolution, now);
                if !self.config_loaded {
                    info!("configuration loaded");
                }
                self.config = cfg;
                self.config_loaded = true;
            }
            None => {
                if self.config_loaded {
                    warn!(error = %Error::ConfigMissing, "rotation blocked");
                }
                self.config_loaded = false;
            }
        }
        self.reconcile(now);
    }

    pub fn set_total_slides(&mut self, total: usize, now: Instant) {
        let from = self.state.total_slides;
        if total == from {
            return;
        }
        info!(from, to = total, "slide count changed");
        self.state.total_slides = total;
        self.carousel.set_total(total);
        let clamped = self.state.clamp_index(self.state.current_index);
        if clamped != self.state.current_index {
            let change = IndexChange::new(SlideSource::Carousel, clamped);
            if let Err(err) = self.set_index(change, now) {
                warn!(error = %err, "failed to clamp index to new slide count");
            }
        }
        if from == 0 && total > 0 && !self.carousel.is_ready() {
            self.init_attempts = 0;
            self.initialize_carousel(now);
        }
        self.reconcile(now);
    }

    pub fn handle_input(&mut self, input: UserInput, now: Instant) -> Result<(), Error> {
        let total = self.state.total_slides;
        let current = self.state.current_index;
        let actions = match input {
            UserInput::Navigate(index) => {
                let target = self.state.clamp_index(index);
                self.gate.on_user_navigate(target, now)
            }
            UserInput::Next if total > 0 => self.gate.on_user_navigate((current + 1) % total, now),
            UserInput::Previous if total > 0 => {
                self.gate.on_user_navigate((current + total - 1) % total, now)
            }
            UserInput::Next | UserInput::Previous | UserInput::Activity => {
                self.gate.on_activity(now);
                Vec::new()
            }
            UserInput::ProgressClick(fraction) => self.gate.on_progress_click(fraction, total, now),
            UserInput::HoverStart => self.gate.on_hover_start(now),
            UserInput::HoverEnd => self.gate.on_hover_end(now),
            UserInput::Key(key) => {
                self.gate.on_key(key, current, total, self.state.paused_by_user, now)
            }
        };
        self.apply_gate_actions(actions, now)
    }

    fn apply_gate_actions(&mut self, actions: Vec<GateAction>, now: Instant) -> Result<(), Error> {
        let mut result = Ok(());
        for action in actions {
            match action {
                GateAction::Pause => {
                    if !self.state.paused_by_user {
                        info!("paused by user interaction");
                        self.state.paused_by_user = true;
                    }
                }
                GateAction::Resume => {
                    if self.state.paused_by_user {
                        info!("resuming after user interaction");
                        self.state.paused_by_user = false;
                    }
                }
                GateAction::Seek(target) => {
                    let change = IndexChange::new(SlideSource::User, target);
                    if let Err(err) = self.set_index(change, now) {
                        warn!(target, error = %err, "user navigation failed");
                        result = Err(err);
                    }
                }
                GateAction::Fullscreen => self.notices.push(Notice::FullscreenRequested),
                GateAction::HelpToggled(open) => self.notices.push(Notice::HelpToggled(open)),
            }
        }
        self.reconcile(now);
        result
    }

    /// Start a new logical turn of the engine loop.
    pub fn begin_turn(&mut self) {
        self.carousel_moved_this_turn = false;
    }

    /// Earliest instant at which [`Self::on_timers`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let [resume, hide] = self.gate.deadlines();
        let [rotation, backoff] = self.scheduler.deadlines();
        earliest([
            self.init_retry.deadline(),
            resume,
            hide,
            backoff,
            self.tracker.deadline(),
            rotation,
        ])
    }

    /// Fire every timer that is due at `now`.
    pub fn on_timers(&mut self, now: Instant) {
        if self.init_retry.fire(now).is_some() {
            self.initialize_carousel(now);
            self.reconcile(now);
        }

        let actions = self.gate.on_timer(now);
        if !actions.is_empty() {
            // Timer-driven actions never seek, so this cannot fail.
            let _ = self.apply_gate_actions(actions, now);
        }

        if self.scheduler.on_backoff_timer(now) {
            info!("error back-off elapsed; re-enabling auto-rotation");
            self.state.auto_rotation_enabled = true;
            self.reconcile(now);
        }

        if let Some(ProgressSignal::NearComplete { index }) = self.tracker.on_timer(now) {
            debug!(index, "slide progress near complete");
            self.notices.push(Notice::NearComplete { index });
        }

        if let Some(Tick::Advance) = self.scheduler.on_timer(now, self.state.current_fps) {
            self.on_rotation_tick(now);
        }
    }

    fn on_rotation_tick(&mut self, now: Instant) {
        if self.carousel_moved_this_turn {
            debug!(
                index = self.state.current_index,
                "carousel selection superseded rotation tick"
            );
            return;
        }
        if let Err(err) = self.advance(SlideSource::Scheduler, now) {
            warn!(
                error = %err,
                backoff_ms = self.config.error_backoff.as_millis() as u64,
                "automatic advance failed; pausing rotation"
            );
            self.state.auto_rotation_enabled = false;
            self.scheduler.begin_backoff(now);
            self.reconcile(now);
        }
    }

    /// Recompute the interval, re-evaluate the gate and the phase.
    fn reconcile(&mut self, now: Instant) {
        let interval = effective_interval(
            self.config.base_slide_duration,
            self.state.performance_level,
            self.state.current_fps,
        );
        if interval != self.scheduler.interval() {
            self.tracker.set_interval(interval, now);
            let remaining = self.tracker.remaining(now);
            self.scheduler.set_interval(interval, now, remaining);
        }

        let gate = GateInputs::from_state(&self.state, self.config_loaded);
        let first_tick = self.tracker.remaining(now);
        match self.scheduler.evaluate(gate, now, first_tick) {
            Some(GateTransition::Started) => self.tracker.resume(now),
            Some(GateTransition::Stopped) => {
                self.tracker.pause(now);
                debug!(progress = ?self.tracker.snapshot(), "slide progress held");
            }
            None => {}
        }
        self.state.is_auto_playing = self.scheduler.is_running();

        let inputs = PhaseInputs {
            config_loaded: self.config_loaded,
            backoff_active: self.scheduler.backoff_active(),
            gate_open: gate.should_run(),
        };
        if let Some(change) = self.phase.observe(&self.state, inputs) {
            info!(from = ?change.from, to = ?change.to, "slideshow phase changed");
            self.notices.push(Notice::PhaseChanged(change));
        }
    }

    /// Combined progress through the whole show, in percent.
    pub fn progress_percentage(&self) -> f64 {
        let total = self.state.total_slides;
        if total == 0 {
            return 0.0;
        }
        let position = self.state.current_index as f64 + self.tracker.fraction();
        (position / total as f64 * 100.0).min(100.0)
    }

    pub fn presentation(&self) -> Presentation {
        let total = self.state.total_slides;
        Presentation {
            display_index: if total == 0 {
                0
            } else {
                self.state.current_index + 1
            },
            total_slides: total,
            progress_percentage: self.progress_percentage(),
            is_playing: self.state.is_auto_playing,
            controls_visible: self.gate.controls_visible(),
            help_open: self.gate.help_open(),
            can_navigate: self.state.can_navigate(),
            phase: self.phase.current(),
        }
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Cancel every timer and release the carousel in one pass.
    pub fn destroy(&mut self) {
        self.scheduler.destroy();
        self.tracker.destroy();
        self.gate.destroy();
        self.init_retry.cancel();
        self.carousel.destroy();
        self.state.is_auto_playing = false;
        self.state.carousel_ready = false;
        info!("slideshow torn down");
    }
}
