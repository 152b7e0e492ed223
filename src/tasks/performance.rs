use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PerformanceThresholds;
use crate::events::PerformanceSample;

/// Raw frame-rate and memory reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub fps: f64,
    pub memory_usage_mb: f64,
}

/// Source of performance readings (frame counter, memory statistics).
pub trait PerformanceProbe {
    /// Current reading, or `None` when no measurement is available yet.
    fn sample(&mut self) -> Option<RawSample>;
}

/// Poll `probe` every `poll` and forward classified samples to the engine.
pub async fn run<P: PerformanceProbe>(
    mut probe: P,
    thresholds: PerformanceThresholds,
    poll: Duration,
    to_engine: Sender<PerformanceSample>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(raw) = probe.sample() else {
                    debug!("performance probe has no reading yet");
                    continue;
                };
                let sample = PerformanceSample {
                    fps: raw.fps,
                    memory_usage_mb: raw.memory_usage_mb,
                    level: thresholds.classify(raw.fps, raw.memory_usage_mb),
                };
                if to_engine.send(sample).await.is_err() {
                    warn!("engine channel closed");
                    break;
                }
            }
        }
    }

    Ok(())
}
