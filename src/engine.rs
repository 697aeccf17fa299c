//! Streaming coordinator.
//!
//! Owns one producer thread that pulls observations, classifies them and
//! appends samples to the shared log. Shutdown is cooperative: the producer
//! checks a cancellation token at the top of every iteration, and the
//! coordinator waits for it only up to `join_timeout`.
//!
//! ```text
//!   Idle ──start──▶ Running ──request_stop──▶ StopRequested ──join/timeout──▶ Stopped
//! ```

use crate::algo::RollingZScore;
use crate::config::PipelineConfig;
use crate::error::{PersistError, PipelineError};
use crate::sample::Sample;
use crate::sample_log::SharedSampleLog;
use crate::simulation::Source;
use crate::sink::SampleSink;
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Running,
    StopRequested,
    Stopped,
}

impl CoordinatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::StopRequested => "stop-requested",
            Self::Stopped => "stopped",
        }
    }
}

/// Why the producer loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    Cancelled,
    SourceExhausted,
    Failed(String),
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducerExit {
    pub reason: ExitReason,
    pub produced: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    /// `None` if the producer never ran or did not report before the timeout.
    pub exit: Option<ProducerExit>,
    pub timed_out: bool,
    /// Log length at the moment shutdown completed.
    pub samples: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    observations: AtomicU64,
    anomalies: AtomicU64,
}

impl PipelineStats {
    fn record(&self, is_anomaly: bool) {
        self.observations.fetch_add(1, Ordering::Relaxed);
        if is_anomaly {
            self.anomalies.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn observations(&self) -> u64 {
        self.observations.load(Ordering::Relaxed)
    }

    pub fn anomalies(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }
}

struct ProducerHandle {
    thread: thread::JoinHandle<()>,
    done_rx: Receiver<ProducerExit>,
}

impl ProducerHandle {
    /// Returns the producer's exit report and whether the wait timed out.
    fn join_within(self, timeout: Duration) -> (Option<ProducerExit>, bool) {
        match self.done_rx.recv_timeout(timeout) {
            Ok(exit) => {
                if self.thread.join().is_err() {
                    error!("Producer thread panicked after reporting exit");
                }
                (Some(exit), false)
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Exit report lost; the thread is gone or going.
                let _ = self.thread.join();
                (None, false)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Producer did not exit in time, detaching"
                );
                (None, true)
            }
        }
    }
}

struct Lifecycle {
    state: CoordinatorState,
    producer: Option<ProducerHandle>,
    report: Option<ShutdownReport>,
    /// A `stop()` call is joining the producer.
    stopping: bool,
    persisted: bool,
}

pub struct StreamingCoordinator {
    config: PipelineConfig,
    run_id: Uuid,
    log: SharedSampleLog,
    token: CancellationToken,
    stats: Arc<PipelineStats>,
    lifecycle: Mutex<Lifecycle>,
    stopped: Condvar,
}

impl StreamingCoordinator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            run_id: Uuid::new_v4(),
            log: SharedSampleLog::new(),
            token: CancellationToken::new(),
            stats: Arc::new(PipelineStats::default()),
            lifecycle: Mutex::new(Lifecycle {
                state: CoordinatorState::Idle,
                producer: None,
                report: None,
                stopping: false,
                persisted: false,
            }),
            stopped: Condvar::new(),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn log(&self) -> &SharedSampleLog {
        &self.log
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Token observed by the producer. Cancelling it from outside has the
    /// same effect as [`request_stop`](Self::request_stop).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> CoordinatorState {
        let mut lc = self.lifecycle();
        // The token may have been cancelled by an external holder.
        if lc.state == CoordinatorState::Running && self.token.is_cancelled() {
            lc.state = CoordinatorState::StopRequested;
        }
        lc.state
    }

    /// Spawn the producer thread. Only valid from `Idle`.
    pub fn start<S>(&self, source: S) -> Result<(), PipelineError>
    where
        S: Source + Send + 'static,
    {
        let mut lc = self.lifecycle();
        if lc.state != CoordinatorState::Idle || lc.stopping {
            return Err(PipelineError::AlreadyStarted(lc.state.as_str()));
        }

        let detector = RollingZScore::new(self.config.window_size, self.config.threshold)?;
        let (done_tx, done_rx) = bounded::<ProducerExit>(1);

        let producer = Producer {
            source,
            detector,
            log: self.log.clone(),
            token: self.token.clone(),
            stats: self.stats.clone(),
            pace: self.config.pace(),
            run_id: self.run_id,
        };

        let thread = thread::Builder::new()
            .name("stream-producer".into())
            .spawn(move || {
                let exit = producer.run();
                let _ = done_tx.send(exit);
            })
            .map_err(PipelineError::Spawn)?;

        lc.producer = Some(ProducerHandle { thread, done_rx });
        lc.state = CoordinatorState::Running;
        info!(
            run_id = %self.run_id,
            window_size = self.config.window_size,
            threshold = self.config.threshold,
            pace_ms = self.config.pace_ms,
            "Pipeline started"
        );
        Ok(())
    }

    /// Signal the producer to stop without waiting for it.
    pub fn request_stop(&self) {
        let mut lc = self.lifecycle();
        self.token.cancel();
        if lc.state == CoordinatorState::Running {
            lc.state = CoordinatorState::StopRequested;
            info!(run_id = %self.run_id, "Stop requested");
        }
    }

    /// True once the producer thread has exited on its own (source ended,
    /// failed, or observed cancellation). False before start and after stop.
    pub fn is_producer_finished(&self) -> bool {
        self.lifecycle()
            .producer
            .as_ref()
            .is_some_and(|p| p.thread.is_finished())
    }

    /// Cancel the producer and wait for it up to the join timeout.
    ///
    /// The join runs without holding the lifecycle lock, so `state()` reports
    /// `StopRequested` meanwhile. Idempotent: concurrent and later calls wait
    /// for and return the first report.
    pub fn stop(&self) -> ShutdownReport {
        let started = Instant::now();
        let mut lc = self.lifecycle();
        loop {
            if let Some(report) = &lc.report {
                return report.clone();
            }
            if !lc.stopping {
                break;
            }
            lc = self
                .stopped
                .wait(lc)
                .unwrap_or_else(PoisonError::into_inner);
        }

        lc.stopping = true;
        self.token.cancel();
        if lc.state == CoordinatorState::Running {
            lc.state = CoordinatorState::StopRequested;
        }
        let producer = lc.producer.take();
        drop(lc);

        let (exit, timed_out) = match producer {
            Some(producer) => {
                info!(run_id = %self.run_id, "Stopping data processing");
                producer.join_within(self.config.join_timeout())
            }
            None => (None, false),
        };

        let report = ShutdownReport {
            exit,
            timed_out,
            samples: self.log.len(),
            elapsed: started.elapsed(),
        };

        let mut lc = self.lifecycle();
        lc.state = CoordinatorState::Stopped;
        lc.stopping = false;
        lc.report = Some(report.clone());
        drop(lc);
        self.stopped.notify_all();

        info!(
            run_id = %self.run_id,
            samples = report.samples,
            timed_out = report.timed_out,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Pipeline stopped"
        );
        report
    }

    /// Stop the pipeline and hand the full log to `sink`.
    ///
    /// The log is exported at most once per run; later calls return
    /// `Ok(None)`. A failed write is reported, not retried.
    pub fn finish<K>(&self, sink: &mut K) -> Result<Option<usize>, PersistError>
    where
        K: SampleSink + ?Sized,
    {
        self.stop();
        {
            let mut lc = self.lifecycle();
            if lc.persisted {
                return Ok(None);
            }
            lc.persisted = true;
        }

        let samples = self.log.export();
        match sink.write_samples(&samples) {
            Ok(written) => Ok(Some(written)),
            Err(e) => {
                error!(run_id = %self.run_id, error = %e, "Failed to persist samples");
                Err(e)
            }
        }
    }
}

impl Drop for StreamingCoordinator {
    fn drop(&mut self) {
        // Let a still-running producer wind down instead of looping forever.
        self.token.cancel();
    }
}

struct Producer<S> {
    source: S,
    detector: RollingZScore,
    log: SharedSampleLog,
    token: CancellationToken,
    stats: Arc<PipelineStats>,
    pace: Duration,
    run_id: Uuid,
}

impl<S: Source> Producer<S> {
    fn run(mut self) -> ProducerExit {
        let source_name = self.source.name().to_string();
        let span = info_span!("producer", run_id = %self.run_id, source = %source_name);
        let _enter = span.enter();
        info!("Data processing started");

        let mut produced = 0u64;
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| self.pump(&mut produced))) {
            Ok(reason) => reason,
            Err(payload) => ExitReason::Panicked(panic_message(payload.as_ref())),
        };

        match &reason {
            ExitReason::Cancelled => info!("Stop signal observed, ending data processing"),
            ExitReason::SourceExhausted => info!("Source exhausted"),
            ExitReason::Failed(e) => error!(error = %e, "Error in data processing"),
            ExitReason::Panicked(e) => error!(error = %e, "Data processing panicked"),
        }
        info!(produced, "Data processing ended");

        ProducerExit { reason, produced }
    }

    /// The ingestion loop. Any source error ends the run; the bad
    /// observation is not skipped.
    fn pump(&mut self, produced: &mut u64) -> ExitReason {
        loop {
            if self.token.is_cancelled() {
                return ExitReason::Cancelled;
            }

            let value = match self.source.next_observation() {
                Ok(Some(value)) => value,
                Ok(None) => return ExitReason::SourceExhausted,
                Err(e) => return ExitReason::Failed(e.to_string()),
            };

            let timestamp = Local::now();
            let verdict = self.detector.observe(value);
            let sample = Sample::new(timestamp, value, verdict.is_anomaly());

            self.log.append(sample);
            *produced += 1;
            self.stats.record(sample.is_anomaly);

            if sample.is_anomaly {
                warn!(
                    timestamp = %sample.timestamp,
                    amount = sample.value,
                    z_score = verdict.z_score().unwrap_or_default(),
                    "ANOMALY"
                );
            } else {
                debug!(timestamp = %sample.timestamp, amount = sample.value, "Processed");
            }

            if !self.pace.is_zero() {
                thread::sleep(self.pace);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
