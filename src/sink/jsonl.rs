use super::SampleSink;
use crate::error::PersistError;
use crate::sample::Sample;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: BufWriter<W>,
}

impl JsonLinesSink<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| PersistError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(128 * 1024, writer),
        }
    }

    pub fn into_inner(self) -> Result<W, PersistError> {
        self.writer
            .into_inner()
            .map_err(|e| PersistError::Io(e.into_error()))
    }
}

impl<W: Write> SampleSink for JsonLinesSink<W> {
    fn write_samples(&mut self, samples: &[Sample]) -> Result<usize, PersistError> {
        for sample in samples {
            serde_json::to_writer(&mut self.writer, sample)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        tracing::info!(rows = samples.len(), "Data saved as JSON lines");
        Ok(samples.len())
    }
}
