//! Glue between the engine and the external carousel widget.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::events::CarouselEvent;

pub type CarouselEvents = UnboundedSender<CarouselEvent>;

#[derive(Debug, Clone, PartialEq)]
pub struct CarouselOptions {
    /// Wrap from the last slide to the first (and back).
    pub looping: bool,
    /// Drag/swipe gestures. The engine always disables them.
    pub draggable: bool,
    pub transition_duration: Duration,
    pub start_index: usize,
}

impl CarouselOptions {
    pub fn from_config(cfg: &EngineConfig, start_index: usize) -> Self {
        Self {
            looping: true,
            draggable: false,
            transition_duration: cfg.transition_duration,
            start_index,
        }
    }

    /// Reduced options used for the last initialisation attempt.
    pub fn fallback(self) -> Self {
        Self {
            transition_duration: Duration::ZERO,
            ..self
        }
    }
}

/// Operations of the carousel widget being driven.
///
/// All operations are fire-and-forget: results of motion are reported back
/// asynchronously through the [`CarouselEvents`] sender handed to `init`.
pub trait CarouselWidget {
    fn init(
        &mut self,
        options: &CarouselOptions,
        slide_count: usize,
        events: CarouselEvents,
    ) -> Result<()>;

    /// Start moving to `index`; `jump` skips the animation.
    fn scroll_to(&mut self, index: usize, jump: bool) -> Result<()>;

    /// Recompute layout after a viewport or slide-count change.
    fn re_layout(&mut self, slide_count: usize);

    /// Release the widget and stop emitting events.
    fn destroy(&mut self);
}

pub struct CarouselAdapter<W> {
    widget: W,
    events: CarouselEvents,
    total: usize,
    position: usize,
    ready: bool,
    in_transition: bool,
    options: Option<CarouselOptions>,
}

impl<W: CarouselWidget> CarouselAdapter<W> {
    pub fn new(widget: W, events: CarouselEvents) -> Self {
        Self {
            widget,
            events,
            total: 0,
            position: 0,
            ready: false,
            in_transition: false,
            options: None,
        }
    }

    pub fn initialize(&mut self, options: CarouselOptions, total: usize) -> Result<()> {
        self.ready = false;
        self.total = total;
        self.position = if total == 0 {
            0
        } else {
            options.start_index.min(total - 1)
        };
        let options = CarouselOptions {
            draggable: false,
            start_index: self.position,
            ..options
        };
        self.widget.init(&options, total, self.events.clone())?;
        self.options = Some(options);
        self.ready = true;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn in_transition(&self) -> bool {
        self.in_transition
    }

    fn looping(&self) -> bool {
        self.options.as_ref().is_none_or(|o| o.looping)
    }

    pub fn can_advance(&self) -> bool {
        self.ready && self.total > 1 && (self.looping() || self.position + 1 < self.total)
    }

    pub fn can_retreat(&self) -> bool {
        self.ready && self.total > 1 && (self.looping() || self.position > 0)
    }

    /// Move to `index`, clamped to the slide range. Returns the clamped target.
    pub fn seek(&mut self, index: usize, immediate: bool) -> Result<usize, Error> {
        if !self.ready {
            return Err(Error::CarouselNotReady);
        }
        if self.total == 0 {
            return Ok(0);
        }
        let target = index.min(self.total - 1);
        self.widget
            .scroll_to(target, immediate)
            .map_err(|err| Error::AdvanceFailure(format!("{err:#}")))?;
        let animated = !immediate
            && self
                .options
                .as_ref()
                .is_some_and(|o| !o.transition_duration.is_zero());
        self.in_transition = animated && target != self.position;
        self.position = target;
        Ok(target)
    }

    pub fn step_next(&mut self) -> Result<usize, Error> {
        if self.total == 0 {
            return self.seek(0, false);
        }
        let target = if self.position + 1 >= self.total {
            0
        } else {
            self.position + 1
        };
        self.seek(target, false)
    }

    pub fn step_prev(&mut self) -> Result<usize, Error> {
        if self.total == 0 {
            return self.seek(0, false);
        }
        let target = if self.position == 0 {
            self.total - 1
        } else {
            self.position - 1
        };
        self.seek(target, false)
    }

    /// Accept the widget's own late readiness report. The owner decides
    /// whether it is still welcome (it is not once initialisation gave up).
    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Track a widget event. Only `Select` can move the recorded position;
    /// readiness is left to [`Self::mark_ready`].
    pub fn observe(&mut self, event: &CarouselEvent) {
        match *event {
            CarouselEvent::Select(index) => {
                if self.total > 0 {
                    self.position = index.min(self.total - 1);
                }
            }
            CarouselEvent::Settle => self.in_transition = false,
            CarouselEvent::Resize { width, height } => {
                debug!(width, height, "carousel re-layout");
                self.widget.re_layout(self.total);
            }
            CarouselEvent::Init => debug!(ready = self.ready, "carousel init event"),
        }
    }

    pub fn set_total(&mut self, total: usize) {
        if total == self.total {
            return;
        }
        self.total = total;
        self.position = if total == 0 {
            0
        } else {
            self.position.min(total - 1)
        };
        if self.ready {
            self.widget.re_layout(total);
        }
    }

    pub fn destroy(&mut self) {
        if self.options.take().is_some() {
            self.widget.destroy();
        }
        self.ready = false;
        self.in_transition = false;
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }
}
