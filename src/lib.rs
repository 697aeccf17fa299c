//! # stream-sentry
//!
//! Real-time outlier flagging for a stream of numeric observations.
//!
//! ```text
//!   Source ──▶ RollingZScore ──▶ SharedSampleLog ──┬──▶ renderer (snapshot on a timer)
//!     (producer thread, paced)                      └──▶ sink (export once at shutdown)
//! ```
//!
//! The producer thread is owned by [`StreamingCoordinator`], which also owns
//! the cancellation token and the bounded shutdown join.

pub mod algo;
pub mod config;
pub mod engine;
pub mod error;
pub mod render;
pub mod sample;
pub mod sample_log;
pub mod simulation;
pub mod sink;

pub use algo::{RollingZScore, Verdict};
pub use config::{AppConfig, PipelineConfig, SimulatorConfig};
pub use engine::{
    CoordinatorState, ExitReason, PipelineStats, ProducerExit, ShutdownReport,
    StreamingCoordinator,
};
pub use error::{ConfigError, DetectorError, PersistError, PipelineError, SourceError};
pub use sample::Sample;
pub use sample_log::SharedSampleLog;
pub use simulation::{IterSource, LineSource, Source, TransactionSimulator};
pub use sink::{CsvSink, JsonLinesSink, SampleSink};
