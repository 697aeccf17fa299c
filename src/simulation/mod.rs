//! Observation sources.
//!
//! A source is pulled by the producer thread one value at a time.
//! `Ok(None)` ends the stream; any `Err` ends the run.

pub mod transactions;

use crate::error::SourceError;
use std::io::BufRead;

pub use transactions::TransactionSimulator;

pub trait Source {
    fn name(&self) -> &str;
    fn next_observation(&mut self) -> Result<Option<f64>, SourceError>;
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_observation(&mut self) -> Result<Option<f64>, SourceError> {
        (**self).next_observation()
    }
}

/// Finite source over any iterator of values.
pub struct IterSource<I> {
    inner: I,
}

impl<I: Iterator<Item = f64>> IterSource<I> {
    pub fn new(inner: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: inner.into_iter(),
        }
    }
}

impl<I: Iterator<Item = f64>> Source for IterSource<I> {
    fn name(&self) -> &str {
        "iter"
    }

    fn next_observation(&mut self) -> Result<Option<f64>, SourceError> {
        Ok(self.inner.next())
    }
}

/// One number per line, e.g. piped from stdin. Blank lines are skipped.
pub struct LineSource<R> {
    reader: R,
    line_no: u64,
    buf: String,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Source for LineSource<R> {
    fn name(&self) -> &str {
        "lines"
    }

    fn next_observation(&mut self) -> Result<Option<f64>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| SourceError::Malformed {
                    line: self.line_no,
                    content: trimmed.to_string(),
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn iter_source_ends_with_none() {
        let mut src = IterSource::new(vec![1.0, 2.5]);
        assert_eq!(src.next_observation().unwrap(), Some(1.0));
        assert_eq!(src.next_observation().unwrap(), Some(2.5));
        assert_eq!(src.next_observation().unwrap(), None);
    }

    #[test]
    fn line_source_parses_and_skips_blanks() {
        let mut src = LineSource::new(Cursor::new("10.5\n\n  -3 \n1e3\n"));
        assert_eq!(src.next_observation().unwrap(), Some(10.5));
        assert_eq!(src.next_observation().unwrap(), Some(-3.0));
        assert_eq!(src.next_observation().unwrap(), Some(1000.0));
        assert_eq!(src.next_observation().unwrap(), None);
    }

    #[test]
    fn line_source_reports_malformed_line() {
        let mut src = LineSource::new(Cursor::new("1\n\nabc\n2\n"));
        assert_eq!(src.next_observation().unwrap(), Some(1.0));
        match src.next_observation() {
            Err(SourceError::Malformed { line, content }) => {
                assert_eq!(line, 3);
                assert_eq!(content, "abc");
            }
            other => panic!("expected malformed error, got {:?}", other),
        }
    }
}
