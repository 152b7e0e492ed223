//! Headless simulator for the slideshow rotation engine.
//!
//! Runs the engine against a simulated carousel and a synthetic performance
//! probe, printing every presentation snapshot as a JSON line.

mod sim;

use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use slideshow_engine::config::EngineConfig;
use slideshow_engine::events::{
    CarouselEvent, EngineCommand, Notice, PerformanceSample, Presentation,
};
use slideshow_engine::tasks::{engine, performance};

#[derive(Debug, Parser)]
#[command(
    name = "slideshow-sim",
    version,
    about = "headless slideshow rotation engine simulator"
)]
struct Args {
    /// Path to YAML config (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Number of slides supplied by the product source
    #[arg(long, default_value_t = 5)]
    slides: usize,
    /// Stop after this long (e.g. "2m"); runs until Ctrl-C otherwise
    #[arg(long = "run-for", value_name = "DURATION", value_parser = humantime::parse_duration)]
    run_for: Option<Duration>,
    /// Deterministic RNG seed for the synthetic performance probe
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Make every Nth carousel move fail to exercise the error back-off
    #[arg(long = "fail-every", value_name = "N")]
    fail_every: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let Args {
        config,
        slides,
        run_for,
        seed,
        fail_every,
    } = Args::parse();

    let cfg = match config {
        Some(path) => EngineConfig::from_yaml_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?
            .validated()
            .context("invalid configuration values")?,
        None => EngineConfig::default(),
    };
    tracing::info!("Using configuration:\n{:#?}", cfg);

    // Channels (small/bounded where the producer can wait)
    let (config_tx, config_rx) = watch::channel(Some(cfg.clone())); // ConfigProvider -> Engine
    let (slides_tx, slides_rx) = watch::channel(slides); // ProductSource -> Engine
    let (carousel_tx, carousel_rx) = mpsc::unbounded_channel::<CarouselEvent>(); // Widget -> Engine
    let (perf_tx, perf_rx) = mpsc::channel::<PerformanceSample>(8); // Monitor -> Engine
    let (command_tx, command_rx) = mpsc::channel::<EngineCommand>(16); // Presentation -> Engine
    // Engine -> Presentation
    let (presentation_tx, mut presentation_rx) = watch::channel(Presentation::default());
    let (notice_tx, mut notice_rx) = mpsc::channel::<Notice>(64); // Engine -> Presentation

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    if let Some(limit) = run_for {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(limit) => {
                    tracing::info!(
                        after = %humantime::format_duration(limit),
                        "run-for elapsed; initiating shutdown"
                    );
                    cancel.cancel();
                }
            }
        });
    }

    // Commands typed on stdin drive the engine like a remote control.
    if io::stdin().is_terminal() {
        let command_tx = command_tx.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match sim::parse_command(&line) {
                    Some(cmd) => {
                        if command_tx.blocking_send(cmd).is_err() {
                            break;
                        }
                    }
                    None => tracing::warn!(input = line.trim(), "unrecognised command"),
                }
            }
            tracing::info!("stdin closed; initiating shutdown");
            cancel.cancel();
        });
    } else {
        tracing::debug!("stdin is not a terminal; skipping command reader");
    }

    let mut tasks = JoinSet::new();

    // Engine
    tasks.spawn({
        let cancel = cancel.clone();
        let channels = engine::EngineChannels {
            config: config_rx,
            slides: slides_rx,
            carousel_tx,
            carousel_rx,
            performance: perf_rx,
            commands: command_rx,
            presentation: presentation_tx,
            notices: notice_tx,
        };
        let widget = sim::SimulatedCarousel::new(fail_every);
        async move {
            engine::run(widget, channels, cancel)
                .await
                .context("engine task failed")
        }
    });

    // PerformanceMonitor
    tasks.spawn({
        let cancel = cancel.clone();
        let thresholds = cfg.performance.clone();
        let poll = cfg.performance_poll_interval;
        let probe = sim::SyntheticProbe::new(seed);
        async move {
            performance::run(probe, thresholds, poll, perf_tx, cancel)
                .await
                .context("performance task failed")
        }
    });

    // Presentation output
    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = presentation_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = presentation_rx.borrow_and_update().clone();
                        println!("{}", serde_json::to_string(&snapshot)?);
                    }
                    Some(notice) = notice_rx.recv() => {
                        tracing::info!(?notice, "presentation notice");
                    }
                }
            }
            Ok::<_, anyhow::Error>(())
        }
    });

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    // Providers outlive the engine so it never sees them close mid-run.
    drop(config_tx);
    drop(slides_tx);
    drop(command_tx);
    Ok(())
}
