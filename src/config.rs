//! Runtime configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes. CLI flags are applied on top by the binary.

use crate::algo::{DEFAULT_THRESHOLD, DEFAULT_WINDOW_SIZE, RollingZScore};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub window_size: usize,
    pub threshold: f64,
    /// Delay between producer iterations.
    pub pace_ms: u64,
    /// Upper bound on waiting for the producer during shutdown.
    pub join_timeout_ms: u64,
    pub render_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            threshold: DEFAULT_THRESHOLD,
            pace_ms: 100,
            join_timeout_ms: 2000,
            render_interval_ms: 100,
        }
    }
}

impl PipelineConfig {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn build_detector(&self) -> Result<RollingZScore, ConfigError> {
        Ok(RollingZScore::new(self.window_size, self.threshold)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_detector()?;
        if self.render_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "render_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the synthetic transaction stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    pub base_amount: f64,
    pub noise_level: f64,
    pub anomaly_probability: f64,
    /// Multiplier applied between 06:00 and 18:00 local time.
    pub business_hours_factor: f64,
    pub emit_interval_ms: u64,
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            base_amount: 1000.0,
            noise_level: 100.0,
            anomaly_probability: 0.01,
            business_hours_factor: 1.5,
            emit_interval_ms: 100,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_amount.is_finite() {
            return Err(ConfigError::Invalid("base_amount must be finite".into()));
        }
        if !(self.noise_level.is_finite() && self.noise_level >= 0.0) {
            return Err(ConfigError::Invalid(
                "noise_level must be a non-negative finite number".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.anomaly_probability) {
            return Err(ConfigError::Invalid(
                "anomaly_probability must be within [0, 1]".into(),
            ));
        }
        if !self.business_hours_factor.is_finite() {
            return Err(ConfigError::Invalid(
                "business_hours_factor must be finite".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub simulator: SimulatorConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.simulator.validate()
    }
}

/// Parse `30s`, `5m`, `1h` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, "s"),
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| ConfigError::Duration(s.to_string()))?;
    let secs = match unit {
        "ms" => return Ok(Duration::from_millis(n)),
        "s" => Some(n),
        "m" => n.checked_mul(60),
        "h" => n.checked_mul(3600),
        _ => None,
    };
    secs.map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Duration(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.window_size, 100);
        assert_eq!(cfg.threshold, 3.0);
        assert_eq!(cfg.pace(), Duration::from_millis(100));
        assert_eq!(cfg.join_timeout(), Duration::from_secs(2));
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pipeline": {{"window_size": 20}}, "simulator": {{"seed": 7}}}}"#
        )
        .unwrap();

        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.pipeline.window_size, 20);
        assert_eq!(cfg.pipeline.threshold, 3.0);
        assert_eq!(cfg.simulator.seed, Some(7));
        assert_eq!(cfg.simulator.base_amount, 1000.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = AppConfig::default();
        cfg.pipeline.window_size = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Detector(_))));

        let mut cfg = AppConfig::default();
        cfg.simulator.anomaly_probability = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("12").unwrap(), Duration::from_secs(12));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("3d").is_err());
        assert!(matches!(
            parse_duration("99999999999999999h"),
            Err(ConfigError::Duration(_))
        ));
        assert!(parse_duration("99999999999999999999s").is_err());
    }
}
