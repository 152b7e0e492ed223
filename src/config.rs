use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::state::PerformanceLevel;

/// Runtime configuration of the rotation engine.
///
/// Delivered through the config provider stream; the engine treats the absence
/// of a value as "configuration missing" and keeps the rotation gate closed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Configured time each slide stays on screen before performance throttling.
    #[serde(with = "humantime_serde")]
    pub base_slide_duration: Duration,
    /// Duration of the carousel's animated transition between slides.
    #[serde(with = "humantime_serde")]
    pub transition_duration: Duration,
    /// Pause auto-rotation while the viewer interacts with the display.
    pub pause_on_interaction: bool,
    /// Idle time after the last interaction before auto-rotation resumes.
    #[serde(with = "humantime_serde")]
    pub resume_delay: Duration,
    /// Accept keyboard / remote-control input.
    pub remote_control_enabled: bool,
    /// Idle time before the on-screen controls hide again.
    #[serde(with = "humantime_serde")]
    pub auto_hide_delay: Duration,
    /// Resolution of the progress indicator loop.
    #[serde(with = "humantime_serde")]
    pub progress_resolution: Duration,
    /// Back-off after a failed automatic advance before rotation is re-enabled.
    #[serde(with = "humantime_serde")]
    pub error_backoff: Duration,
    /// Below this frame rate a rotation tick is skipped instead of advancing.
    pub min_fps_for_advance: f64,
    /// Number of carousel initialisation attempts, the last one using fallback options.
    pub carousel_init_attempts: u32,
    /// Delay between carousel initialisation attempts.
    #[serde(with = "humantime_serde")]
    pub carousel_retry_delay: Duration,
    /// How often the performance monitor is sampled.
    #[serde(with = "humantime_serde")]
    pub performance_poll_interval: Duration,
    /// Thresholds used to classify performance samples.
    pub performance: PerformanceThresholds,
}

impl EngineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.base_slide_duration.is_zero(),
            "base-slide-duration must be greater than zero"
        );
        ensure!(
            !self.progress_resolution.is_zero(),
            "progress-resolution must be greater than zero"
        );
        ensure!(
            self.progress_resolution <= self.base_slide_duration,
            "progress-resolution must not exceed base-slide-duration"
        );
        ensure!(
            self.min_fps_for_advance.is_finite() && self.min_fps_for_advance >= 0.0,
            "min-fps-for-advance must be a non-negative number"
        );
        ensure!(
            self.carousel_init_attempts >= 1,
            "carousel-init-attempts must be >= 1"
        );
        ensure!(
            !self.performance_poll_interval.is_zero(),
            "performance-poll-interval must be greater than zero"
        );
        self.performance
            .validate()
            .context("invalid performance thresholds")?;
        Ok(self)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_slide_duration: Duration::from_secs(20),
            transition_duration: Duration::from_millis(600),
            pause_on_interaction: true,
            resume_delay: Duration::from_secs(3),
            remote_control_enabled: true,
            auto_hide_delay: Duration::from_secs(5),
            progress_resolution: Duration::from_millis(100),
            error_backoff: Duration::from_secs(5),
            min_fps_for_advance: 15.0,
            carousel_init_attempts: 3,
            carousel_retry_delay: Duration::from_secs(1),
            performance_poll_interval: Duration::from_secs(5),
            performance: PerformanceThresholds::default(),
        }
    }
}

/// Frame-rate and memory thresholds for deriving a [`PerformanceLevel`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PerformanceThresholds {
    pub premium_fps: f64,
    pub high_fps: f64,
    pub standard_fps: f64,
    pub basic_fps: f64,
    /// Memory usage above which the fps-derived level is demoted by one step.
    pub memory_pressure_mb: f64,
}

impl PerformanceThresholds {
    pub fn classify(&self, fps: f64, memory_usage_mb: f64) -> PerformanceLevel {
        let by_fps = if fps >= self.premium_fps {
            PerformanceLevel::Premium
        } else if fps >= self.high_fps {
            PerformanceLevel::High
        } else if fps >= self.standard_fps {
            PerformanceLevel::Standard
        } else if fps >= self.basic_fps {
            PerformanceLevel::Basic
        } else {
            PerformanceLevel::Low
        };
        if memory_usage_mb > self.memory_pressure_mb {
            by_fps.demoted()
        } else {
            by_fps
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.premium_fps >= self.high_fps
                && self.high_fps >= self.standard_fps
                && self.standard_fps >= self.basic_fps
                && self.basic_fps >= 0.0,
            "fps thresholds must be non-negative and descend premium > high > standard > basic"
        );
        ensure!(
            self.memory_pressure_mb > 0.0,
            "memory-pressure-mb must be positive"
        );
        Ok(())
    }
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            premium_fps: 55.0,
            high_fps: 45.0,
            standard_fps: 30.0,
            basic_fps: 20.0,
            memory_pressure_mb: 512.0,
        }
    }
}
