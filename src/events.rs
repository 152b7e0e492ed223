use serde::Serialize;

use crate::state::{PerformanceLevel, Phase, PhaseChange};

/// Which subsystem proposed an index change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlideSource {
    Scheduler,
    Carousel,
    User,
}

/// A proposed canonical index, fed into the controller's single setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexChange {
    pub source: SlideSource,
    pub index: usize,
}

impl IndexChange {
    pub fn new(source: SlideSource, index: usize) -> Self {
        Self { source, index }
    }
}

/// Events reported by the carousel widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselEvent {
    /// A navigation completed and `index` is now selected.
    Select(usize),
    /// The transition animation finished.
    Settle,
    /// Viewport or resolution changed; re-layout only.
    Resize { width: u32, height: u32 },
    /// The widget finished initialising.
    Init,
}

/// One reading from the performance monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSample {
    pub fps: f64,
    pub memory_usage_mb: f64,
    pub level: PerformanceLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Space,
    Escape,
    Digit(u8),
    Char(char),
}

impl Key {
    /// Map a DOM-style key name (`"ArrowLeft"`, `" "`, `"7"`, `"f"`) to a [`Key`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ArrowLeft" => Some(Key::ArrowLeft),
            "ArrowRight" => Some(Key::ArrowRight),
            " " | "Space" | "Spacebar" => Some(Key::Space),
            "Escape" | "Esc" => Some(Key::Escape),
            _ => {
                let mut chars = name.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                match c.to_digit(10) {
                    Some(d) => Some(Key::Digit(d as u8)),
                    None => Some(Key::Char(c.to_ascii_lowercase())),
                }
            }
        }
    }
}

/// Raw viewer input, interpreted by the interaction gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserInput {
    /// Navigation click on a specific slide (dot / thumbnail).
    Navigate(usize),
    /// Next-arrow click; wraps like the carousel.
    Next,
    /// Previous-arrow click; wraps like the carousel.
    Previous,
    /// Click on the progress bar at `0.0..=1.0` of its width.
    ProgressClick(f64),
    HoverStart,
    HoverEnd,
    /// Pointer movement or touch without navigation intent.
    Activity,
    Key(Key),
}

/// Commands accepted by the engine from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    Next,
    Previous,
    GoTo(usize),
    Restart,
    ToggleAutoPlay,
    /// Leave the terminal error state and re-run carousel initialisation.
    RetryCarousel,
    Input(UserInput),
}

/// Snapshot published to the presentation layer after every engine turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    /// 1-based index for display; `0` when there are no slides.
    pub display_index: usize,
    pub total_slides: usize,
    pub progress_percentage: f64,
    pub is_playing: bool,
    pub controls_visible: bool,
    pub help_open: bool,
    pub can_navigate: bool,
    pub phase: Phase,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            display_index: 0,
            total_slides: 0,
            progress_percentage: 0.0,
            is_playing: false,
            controls_visible: false,
            help_open: false,
            can_navigate: false,
            phase: Phase::Loading,
        }
    }
}

/// One-shot signals for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notice {
    PhaseChanged(PhaseChange),
    FullscreenRequested,
    HelpToggled(bool),
    /// Diagnostic only: the progress loop reached the end of slide `index`.
    NearComplete { index: usize },
}
