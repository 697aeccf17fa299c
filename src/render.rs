//! Periodic snapshot reader.
//!
//! The renderer never touches the producer; it copies the shared log on a
//! timer and turns the copy into a [`Frame`]. Drawing is left to whatever
//! implements [`Render`]; the bundled [`ConsoleRenderer`] just reports
//! progress through `tracing`.

use crate::sample::Sample;
use crate::sample_log::SharedSampleLog;
use chrono::{DateTime, Local, TimeDelta};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Trailing span of time kept on screen.
pub const VISIBLE_SPAN: TimeDelta = TimeDelta::minutes(5);
/// Empty space after the newest point.
pub const LEAD: TimeDelta = TimeDelta::seconds(10);
pub const MIN_Y_MAX: f64 = 2000.0;
const Y_HEADROOM: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x_min: DateTime<Local>,
    pub x_max: DateTime<Local>,
    pub y_min: f64,
    pub y_max: f64,
}

impl Viewport {
    /// `None` for an empty log.
    pub fn fit(samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?.timestamp;
        let last = samples.last()?.timestamp;
        let peak = samples.iter().map(|s| s.value).fold(f64::MIN, f64::max);

        Some(Self {
            x_min: first.max(last - VISIBLE_SPAN),
            x_max: last + LEAD,
            y_min: 0.0,
            y_max: (peak * Y_HEADROOM).max(MIN_Y_MAX),
        })
    }
}

/// What a renderer gets on each tick.
#[derive(Debug, Clone)]
pub struct Frame {
    pub samples: Vec<Sample>,
    pub anomalies: Vec<Sample>,
    pub viewport: Option<Viewport>,
}

impl Frame {
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let anomalies = samples.iter().filter(|s| s.is_anomaly).copied().collect();
        let viewport = Viewport::fit(&samples);
        Self {
            samples,
            anomalies,
            viewport,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

pub trait Render {
    fn render(&mut self, frame: &Frame);
}

/// Logs point and anomaly counts whenever the point count changes.
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    last_count: usize,
    pub frames_reported: u64,
}

impl Render for ConsoleRenderer {
    fn render(&mut self, frame: &Frame) {
        if frame.is_empty() || frame.len() == self.last_count {
            return;
        }
        self.last_count = frame.len();
        self.frames_reported += 1;

        if let Some(vp) = frame.viewport {
            info!(
                points = frame.len(),
                anomalies = frame.anomalies.len(),
                x_min = %vp.x_min.format("%H:%M:%S"),
                x_max = %vp.x_max.format("%H:%M:%S"),
                y_max = vp.y_max,
                "Frame"
            );
        }
    }
}

/// Poll `log` every `interval` until `token` is cancelled, then hand the
/// renderer back.
pub async fn run_renderer<R: Render>(
    log: SharedSampleLog,
    mut renderer: R,
    interval: Duration,
    token: CancellationToken,
) -> R {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let frame = Frame::from_samples(log.snapshot());
                renderer.render(&frame);
            }
        }
    }

    // One last frame so the final state is visible.
    renderer.render(&Frame::from_samples(log.snapshot()));
    renderer
}
