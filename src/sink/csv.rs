use super::SampleSink;
use crate::error::PersistError;
use crate::sample::Sample;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HEADER: [&str; 3] = ["Timestamp", "Amount", "Is Anomaly"];

/// Writes `Timestamp,Amount,Is Anomaly` rows.
pub struct CsvSink<W: Write> {
    writer: ::csv::Writer<W>,
    label: String,
}

impl CsvSink<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| PersistError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            writer: ::csv::Writer::from_writer(file),
            label: path.display().to_string(),
        })
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: ::csv::Writer::from_writer(writer),
            label: "<writer>".to_string(),
        }
    }

    pub fn into_inner(self) -> Result<W, PersistError> {
        self.writer
            .into_inner()
            .map_err(|e| PersistError::Io(e.into_error()))
    }
}

impl<W: Write> SampleSink for CsvSink<W> {
    fn write_samples(&mut self, samples: &[Sample]) -> Result<usize, PersistError> {
        self.writer.write_record(HEADER)?;
        for sample in samples {
            let timestamp = sample.timestamp.format(TIMESTAMP_FORMAT).to_string();
            // `{:?}` keeps the trailing `.0` on whole amounts.
            let amount = format!("{:?}", sample.value);
            let flag = if sample.is_anomaly { "True" } else { "False" };
            self.writer.write_record([timestamp.as_str(), amount.as_str(), flag])?;
        }
        self.writer.flush()?;
        tracing::info!(path = %self.label, rows = samples.len(), "Data saved");
        Ok(samples.len())
    }
}
