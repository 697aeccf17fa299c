use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One observation enriched with its arrival time and classification.
///
/// Samples are `Copy` and never mutated after construction, so handing them
/// across threads is a plain memcpy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    pub value: f64,
    pub is_anomaly: bool,
}

impl Sample {
    pub fn new(timestamp: DateTime<Local>, value: f64, is_anomaly: bool) -> Self {
        Self {
            timestamp,
            value,
            is_anomaly,
        }
    }

    /// Stamp a classified observation with the current local time.
    pub fn now(value: f64, is_anomaly: bool) -> Self {
        Self::new(Local::now(), value, is_anomaly)
    }
}
