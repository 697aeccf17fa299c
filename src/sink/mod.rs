//! Persistence sinks for the final sample log.

pub mod csv;
pub mod jsonl;

use crate::error::PersistError;
use crate::sample::Sample;

pub use self::csv::CsvSink;
pub use self::jsonl::JsonLinesSink;

pub const DEFAULT_OUTPUT_PATH: &str = "transaction_data.csv";

/// Consumes the ordered sample sequence once, at shutdown.
pub trait SampleSink {
    /// Write every sample as one record. Returns the number of records written.
    fn write_samples(&mut self, samples: &[Sample]) -> Result<usize, PersistError>;
}

/// Collects samples in memory. Handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<Sample>>,
}

impl SampleSink for MemorySink {
    fn write_samples(&mut self, samples: &[Sample]) -> Result<usize, PersistError> {
        self.batches.push(samples.to_vec());
        Ok(samples.len())
    }
}
