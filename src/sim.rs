//! Stand-ins for the external collaborators used by the headless simulator.

use std::time::Duration;

use anyhow::{Result, bail};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::time::sleep;
use tracing::debug;

use slideshow_engine::carousel::{CarouselEvents, CarouselOptions, CarouselWidget};
use slideshow_engine::events::{CarouselEvent, EngineCommand, Key, UserInput};
use slideshow_engine::tasks::performance::{PerformanceProbe, RawSample};

/// Carousel that reports selection immediately and settles after the transition.
pub struct SimulatedCarousel {
    events: Option<CarouselEvents>,
    transition: Duration,
    fail_every: Option<u32>,
    moves: u32,
}

impl SimulatedCarousel {
    pub fn new(fail_every: Option<u32>) -> Self {
        Self {
            events: None,
            transition: Duration::ZERO,
            fail_every: fail_every.filter(|n| *n > 0),
            moves: 0,
        }
    }
}

impl CarouselWidget for SimulatedCarousel {
    fn init(
        &mut self,
        options: &CarouselOptions,
        slide_count: usize,
        events: CarouselEvents,
    ) -> Result<()> {
        debug!(slide_count, ?options, "simulated carousel init");
        self.transition = options.transition_duration;
        let _ = events.send(CarouselEvent::Init);
        self.events = Some(events);
        Ok(())
    }

    fn scroll_to(&mut self, index: usize, jump: bool) -> Result<()> {
        let Some(events) = self.events.clone() else {
            bail!("carousel destroyed");
        };
        self.moves += 1;
        if self.fail_every.is_some_and(|n| self.moves % n == 0) {
            bail!("simulated carousel hiccup on move {}", self.moves);
        }
        let _ = events.send(CarouselEvent::Select(index));
        if jump || self.transition.is_zero() {
            let _ = events.send(CarouselEvent::Settle);
        } else {
            let transition = self.transition;
            tokio::spawn(async move {
                sleep(transition).await;
                let _ = events.send(CarouselEvent::Settle);
            });
        }
        Ok(())
    }

    fn re_layout(&mut self, slide_count: usize) {
        debug!(slide_count, "simulated carousel re-layout");
    }

    fn destroy(&mut self) {
        self.events = None;
    }
}

/// Random-walk frame rate and memory usage.
pub struct SyntheticProbe {
    rng: StdRng,
    fps: f64,
    memory_usage_mb: f64,
}

impl SyntheticProbe {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            fps: 50.0,
            memory_usage_mb: 250.0,
        }
    }
}

impl PerformanceProbe for SyntheticProbe {
    fn sample(&mut self) -> Option<RawSample> {
        self.fps = (self.fps + self.rng.random_range(-12.0..12.0)).clamp(8.0, 60.0);
        self.memory_usage_mb =
            (self.memory_usage_mb + self.rng.random_range(-40.0..40.0)).clamp(120.0, 900.0);
        Some(RawSample {
            fps: self.fps,
            memory_usage_mb: self.memory_usage_mb,
        })
    }
}

/// Parse one line typed on stdin into an engine command.
pub fn parse_command(line: &str) -> Option<EngineCommand> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    let arg = parts.next();
    let command = match verb {
        "next" | "n" => EngineCommand::Next,
        "prev" | "previous" | "p" => EngineCommand::Previous,
        "goto" | "g" => EngineCommand::GoTo(arg?.parse().ok()?),
        "restart" => EngineCommand::Restart,
        "toggle" | "t" => EngineCommand::ToggleAutoPlay,
        "retry" => EngineCommand::RetryCarousel,
        "hover" => EngineCommand::Input(UserInput::HoverStart),
        "leave" => EngineCommand::Input(UserInput::HoverEnd),
        "click" => EngineCommand::Input(UserInput::ProgressClick(arg?.parse().ok()?)),
        "key" => {
            let name = match arg? {
                "space" => " ",
                other => other,
            };
            EngineCommand::Input(UserInput::Key(Key::from_name(name)?))
        }
        _ => return None,
    };
    Some(command)
}
