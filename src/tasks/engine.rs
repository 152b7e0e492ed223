use anyhow::Result;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::carousel::{CarouselEvents, CarouselWidget};
use crate::config::EngineConfig;
use crate::controller::SlideshowController;
use crate::events::{CarouselEvent, EngineCommand, Notice, PerformanceSample, Presentation};

/// Inputs and outputs of the engine task.
pub struct EngineChannels {
    /// Config provider; `None` while configuration is missing.
    pub config: watch::Receiver<Option<EngineConfig>>,
    /// Number of slides supplied by the product source.
    pub slides: watch::Receiver<usize>,
    /// Sender handed to the carousel widget for its events.
    pub carousel_tx: CarouselEvents,
    pub carousel_rx: mpsc::UnboundedReceiver<CarouselEvent>,
    pub performance: mpsc::Receiver<PerformanceSample>,
    pub commands: mpsc::Receiver<EngineCommand>,
    pub presentation: watch::Sender<Presentation>,
    pub notices: mpsc::Sender<Notice>,
}

/// Drive the slideshow until `cancel` fires.
///
/// Single task, no locks: every input is folded into the controller in turn.
/// Within a turn, carousel events already queued are applied before any
/// timer fires, so a carousel selection always beats a rotation tick.
pub async fn run<W: CarouselWidget>(
    widget: W,
    channels: EngineChannels,
    cancel: CancellationToken,
) -> Result<()> {
    let EngineChannels {
        mut config,
        mut slides,
        carousel_tx,
        mut carousel_rx,
        mut performance,
        mut commands,
        presentation,
        notices,
    } = channels;

    let initial_config = config.borrow_and_update().clone();
    let initial_slides = *slides.borrow_and_update();
    let mut controller = SlideshowController::new(
        widget,
        carousel_tx,
        initial_slides,
        initial_config,
        Instant::now(),
    );
    controller.start(Instant::now());
    publish(&mut controller, &presentation, &notices);
    info!(slides = initial_slides, "slideshow engine started");

    let mut config_open = true;
    let mut slides_open = true;

    loop {
        let deadline = controller.next_deadline();
        let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
        controller.begin_turn();

        select! {
            biased;

            _ = cancel.cancelled() => break,

            Some(event) = carousel_rx.recv() => {
                controller.handle_carousel_event(event, Instant::now());
            }

            changed = config.changed(), if config_open => {
                if changed.is_ok() {
                    let cfg = config.borrow_and_update().clone();
                    controller.apply_config(cfg, Instant::now());
                } else {
                    debug!("config provider closed; keeping last configuration");
                    config_open = false;
                }
            }

            changed = slides.changed(), if slides_open => {
                if changed.is_ok() {
                    let total = *slides.borrow_and_update();
                    controller.set_total_slides(total, Instant::now());
                } else {
                    debug!("product source closed; keeping slide count");
                    slides_open = false;
                }
            }

            Some(sample) = performance.recv() => {
                controller.handle_performance(sample, Instant::now());
            }

            Some(command) = commands.recv() => {
                apply_command(&mut controller, command, Instant::now());
            }

            _ = sleep_until(wake_at), if deadline.is_some() => {}
        }

        // Carousel events that arrived during this turn take precedence over
        // timers that are due in the same turn.
        while let Ok(event) = carousel_rx.try_recv() {
            controller.handle_carousel_event(event, Instant::now());
        }
        controller.on_timers(Instant::now());
        publish(&mut controller, &presentation, &notices);
    }

    controller.destroy();
    publish(&mut controller, &presentation, &notices);
    info!("slideshow engine stopped");
    Ok(())
}

fn apply_command<W: CarouselWidget>(
    controller: &mut SlideshowController<W>,
    command: EngineCommand,
    now: Instant,
) {
    debug!(?command, "engine command");
    let result = match command {
        EngineCommand::Next => controller.next(now).map(|_| ()),
        EngineCommand::Previous => controller.previous(now).map(|_| ()),
        EngineCommand::GoTo(index) => controller.go_to(index, now).map(|_| ()),
        EngineCommand::Restart => controller.restart(now).map(|_| ()),
        EngineCommand::ToggleAutoPlay => {
            controller.toggle_auto_play(now);
            Ok(())
        }
        EngineCommand::RetryCarousel => {
            controller.retry_carousel(now);
            Ok(())
        }
        EngineCommand::Input(input) => controller.handle_input(input, now),
    };
    if let Err(err) = result {
        warn!(?command, error = %err, "command failed");
    }
}

fn publish<W: CarouselWidget>(
    controller: &mut SlideshowController<W>,
    presentation: &watch::Sender<Presentation>,
    notices: &mpsc::Sender<Notice>,
) {
    let snapshot = controller.presentation();
    presentation.send_if_modified(|current| {
        if *current == snapshot {
            false
        } else {
            *current = snapshot;
            true
        }
    });
    for notice in controller.drain_notices() {
        if let Err(err) = notices.try_send(notice) {
            debug!(error = %err, "dropping presentation notice");
        }
    }
}
