use serde::Serialize;

/// Coarse device performance tier reported by the performance monitor.
///
/// Ordered from slowest to fastest so floors can be expressed as comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceLevel {
    Low,
    Basic,
    Standard,
    High,
    Premium,
}

impl PerformanceLevel {
    /// One tier lower, saturating at [`PerformanceLevel::Low`].
    pub fn demoted(self) -> Self {
        match self {
            PerformanceLevel::Premium => PerformanceLevel::High,
            PerformanceLevel::High => PerformanceLevel::Standard,
            PerformanceLevel::Standard => PerformanceLevel::Basic,
            PerformanceLevel::Basic | PerformanceLevel::Low => PerformanceLevel::Low,
        }
    }
}

/// Canonical slideshow state. Only the controller mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideshowState {
    pub current_index: usize,
    pub total_slides: usize,
    /// The rotation timer is currently armed.
    pub is_auto_playing: bool,
    pub auto_rotation_enabled: bool,
    pub paused_by_user: bool,
    pub carousel_ready: bool,
    /// Terminal carousel failure; cleared only by an explicit retry.
    pub has_error: bool,
    pub performance_level: PerformanceLevel,
    pub current_fps: f64,
}

impl SlideshowState {
    pub fn new(total_slides: usize) -> Self {
        Self {
            current_index: 0,
            total_slides,
            is_auto_playing: false,
            auto_rotation_enabled: true,
            paused_by_user: false,
            carousel_ready: false,
            has_error: false,
            performance_level: PerformanceLevel::Standard,
            current_fps: 60.0,
        }
    }

    /// Clamp `index` into `[0, total_slides - 1]`; `0` when there are no slides.
    pub fn clamp_index(&self, index: usize) -> usize {
        if self.total_slides == 0 {
            0
        } else {
            index.min(self.total_slides - 1)
        }
    }

    pub fn can_navigate(&self) -> bool {
        self.total_slides > 1
    }
}

/// Externally visible lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Loading,
    Playing,
    PausedByUser,
    PausedByError,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

/// Inputs the phase is derived from, gathered by the controller after every mutation.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInputs {
    pub config_loaded: bool,
    pub backoff_active: bool,
    pub gate_open: bool,
}

pub struct PhaseSM {
    phase: Phase,
}

impl PhaseSM {
    pub fn new() -> Self {
        Self {
            phase: Phase::Loading,
        }
    }

    pub fn current(&self) -> Phase {
        self.phase
    }

    /// Re-derive the phase from the canonical state; returns the change, if any.
    pub fn observe(&mut self, state: &SlideshowState, inputs: PhaseInputs) -> Option<PhaseChange> {
        let next = Self::derive(state, inputs);
        self.goto(next)
    }

    fn derive(state: &SlideshowState, inputs: PhaseInputs) -> Phase {
        if state.has_error {
            return Phase::Error;
        }
        if state.total_slides == 0 || !inputs.config_loaded || !state.carousel_ready {
            return Phase::Loading;
        }
        if inputs.backoff_active {
            return Phase::PausedByError;
        }
        if state.paused_by_user || !state.auto_rotation_enabled {
            return Phase::PausedByUser;
        }
        if inputs.gate_open || !state.can_navigate() {
            return Phase::Playing;
        }
        Phase::Loading
    }

    fn goto(&mut self, to: Phase) -> Option<PhaseChange> {
        if self.phase == to {
            return None;
        }
        let ch = PhaseChange {
            from: self.phase,
            to,
        };
        self.phase = to;
        Some(ch)
    }
}

impl Default for PhaseSM {
    fn default() -> Self {
        Self::new()
    }
}
