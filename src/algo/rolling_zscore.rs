//! Rolling-window z-score detector.
//!
//! Keeps the trailing `window_size` observations (the current one included)
//! and flags a value whose population z-score exceeds `threshold`. Memory is
//! bounded by the window; statistics are recomputed from the window on every
//! call, so a single bad value only affects results while it is inside it.

use crate::error::DetectorError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SIZE: usize = 100;
pub const DEFAULT_THRESHOLD: f64 = 3.0;

/// Outcome of a single observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Fewer than `window_size` values seen so far.
    Warmup,
    /// Window is full but has zero standard deviation.
    Flat { mean: f64 },
    Scored {
        z_score: f64,
        mean: f64,
        std_dev: f64,
        is_anomaly: bool,
    },
}

impl Verdict {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Verdict::Scored { is_anomaly: true, .. })
    }

    pub fn z_score(&self) -> Option<f64> {
        match self {
            Verdict::Scored { z_score, .. } => Some(*z_score),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RollingZScore {
    window_size: usize,
    threshold: f64,
    window: VecDeque<f64>,
}

impl RollingZScore {
    pub fn new(window_size: usize, threshold: f64) -> Result<Self, DetectorError> {
        if window_size == 0 {
            return Err(DetectorError::InvalidWindow(window_size));
        }
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(DetectorError::InvalidThreshold(threshold));
        }
        Ok(Self {
            window_size,
            threshold,
            window: VecDeque::with_capacity(window_size + 1),
        })
    }

    /// Classify `value`. Returns `true` iff `|z| > threshold`.
    pub fn detect(&mut self, value: f64) -> bool {
        self.observe(value).is_anomaly()
    }

    pub fn observe(&mut self, value: f64) -> Verdict {
        self.window.push_back(value);
        if self.window.len() > self.window_size {
            self.window.pop_front();
        }

        if self.window.len() < self.window_size {
            return Verdict::Warmup;
        }

        let (mean, std_dev) = mean_std(&self.window);

        // Non-finite inputs make both of these NaN; every comparison below
        // is then false, so the value is reported as not anomalous.
        if std_dev == 0.0 {
            return Verdict::Flat { mean };
        }

        let z_score = (value - mean) / std_dev;
        Verdict::Scored {
            z_score,
            mean,
            std_dev,
            is_anomaly: z_score.abs() > self.threshold,
        }
    }

    /// Current window contents, oldest first.
    pub fn window(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_warm(&self) -> bool {
        self.window.len() >= self.window_size
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for RollingZScore {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            threshold: DEFAULT_THRESHOLD,
            window: VecDeque::with_capacity(DEFAULT_WINDOW_SIZE + 1),
        }
    }
}

/// Arithmetic mean and population standard deviation (two-pass).
fn mean_std(vals: &VecDeque<f64>) -> (f64, f64) {
    let n = vals.len() as f64;
    let mean = vals.iter().sum::<f64>() / n;
    let sq_diff: f64 = vals.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, (sq_diff / n).sqrt())
}
