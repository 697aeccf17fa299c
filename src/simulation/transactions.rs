//! Synthetic financial transaction stream.
//!
//! Amounts hover around a base value with uniform noise, get a daytime
//! boost, and occasionally jump 5-10x to give the detector something to find.

use super::Source;
use crate::config::SimulatorConfig;
use crate::error::SourceError;
use chrono::{Local, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use std::time::Duration;

const BUSINESS_HOURS: std::ops::Range<u32> = 6..18;

pub struct TransactionSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    noise: Uniform<f64>,
    spike: Uniform<f64>,
    emitted: u64,
}

impl TransactionSimulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, SourceError> {
        let noise = Uniform::new_inclusive(-config.noise_level, config.noise_level)
            .map_err(|e| SourceError::Other(format!("invalid noise level: {e}")))?;
        let spike = Uniform::new_inclusive(5.0, 10.0)
            .map_err(|e| SourceError::Other(format!("invalid spike range: {e}")))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            config,
            rng,
            noise,
            spike,
            emitted: 0,
        })
    }

    pub fn seasonal_factor(&self, hour: u32) -> f64 {
        if BUSINESS_HOURS.contains(&hour) {
            self.config.business_hours_factor
        } else {
            1.0
        }
    }

    /// Generate one amount as if the local clock read `hour`.
    pub fn amount_at(&mut self, hour: u32) -> f64 {
        let mut amount = self.config.base_amount + self.noise.sample(&mut self.rng);
        amount *= self.seasonal_factor(hour);

        if self.rng.random::<f64>() < self.config.anomaly_probability {
            amount *= self.spike.sample(&mut self.rng);
        }

        (amount * 100.0).round() / 100.0
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Source for TransactionSimulator {
    fn name(&self) -> &str {
        "transaction-simulator"
    }

    fn next_observation(&mut self) -> Result<Option<f64>, SourceError> {
        // The generator paces itself between values, not before the first.
        if self.emitted > 0 && self.config.emit_interval_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.emit_interval_ms));
        }
        let amount = self.amount_at(Local::now().hour());
        self.emitted += 1;
        Ok(Some(amount))
    }
}
