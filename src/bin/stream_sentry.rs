//! stream-sentry - live outlier flagging for a stream of amounts
//!
//! Usage:
//!   stream-sentry                                  # simulated transactions until Ctrl+C
//!   stream-sentry --duration 2m --seed 7           # reproducible two-minute run
//!   cat amounts.txt | stream-sentry --input stdin --pace-ms 0 --format json-lines -o out.jsonl

use clap::{Parser, ValueEnum};
use std::error::Error;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use stream_sentry::config::{AppConfig, parse_duration};
use stream_sentry::render::{ConsoleRenderer, run_renderer};
use stream_sentry::sink::{CsvSink, DEFAULT_OUTPUT_PATH, JsonLinesSink, SampleSink};
use stream_sentry::{LineSource, Source, StreamingCoordinator, TransactionSimulator};
use tokio::time;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stream-sentry")]
#[command(about = "Rolling z-score anomaly flagging for a live stream of amounts")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of trailing observations in the statistics window
    #[arg(long)]
    window_size: Option<usize>,

    /// Z-score above which a value is flagged
    #[arg(long)]
    threshold: Option<f64>,

    /// Delay between producer iterations in milliseconds
    #[arg(long)]
    pace_ms: Option<u64>,

    /// Max time to wait for the producer on shutdown, in milliseconds
    #[arg(long)]
    join_timeout_ms: Option<u64>,

    /// Where to write the samples on shutdown
    #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Where observations come from
    #[arg(short, long, value_enum, default_value = "simulate")]
    input: InputKind,

    /// Seed for the transaction simulator
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this long (e.g. 30s, 5m); otherwise run until Ctrl+C
    #[arg(short, long)]
    duration: Option<String>,

    /// Disable the periodic progress renderer
    #[arg(long)]
    no_render: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    JsonLines,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum InputKind {
    Simulate,
    Stdin,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "An error occurred");
            ExitCode::FAILURE
        }
    };
    info!("Program finished");
    code
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(v) = cli.window_size {
        config.pipeline.window_size = v;
    }
    if let Some(v) = cli.threshold {
        config.pipeline.threshold = v;
    }
    if let Some(v) = cli.pace_ms {
        config.pipeline.pace_ms = v;
    }
    if let Some(v) = cli.join_timeout_ms {
        config.pipeline.join_timeout_ms = v;
    }
    if cli.seed.is_some() {
        config.simulator.seed = cli.seed;
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(&cli)?;
    let run_for = cli.duration.as_deref().map(parse_duration).transpose()?;

    let source: Box<dyn Source + Send> = match cli.input {
        InputKind::Simulate => Box::new(TransactionSimulator::new(config.simulator.clone())?),
        InputKind::Stdin => Box::new(LineSource::new(BufReader::new(std::io::stdin()))),
    };

    let coordinator = Arc::new(StreamingCoordinator::new(config.pipeline.clone()));
    coordinator.start(source)?;

    let renderer = (!cli.no_render).then(|| {
        tokio::spawn(run_renderer(
            coordinator.log().clone(),
            ConsoleRenderer::default(),
            config.pipeline.render_interval(),
            coordinator.cancellation_token(),
        ))
    });

    wait_for_stop(&coordinator, run_for).await;

    // Everything past this point runs regardless of how the wait ended.
    let stopper = coordinator.clone();
    match tokio::task::spawn_blocking(move || stopper.stop()).await {
        Ok(report) if report.timed_out => {
            warn!("Producer still running at shutdown; saving what was collected");
        }
        Ok(_) => {}
        // finish() below retries the stop before exporting.
        Err(e) => error!(error = %e, "Shutdown task failed"),
    }

    if let Some(handle) = renderer {
        if let Err(e) = handle.await {
            warn!(error = %e, "Renderer task failed");
        }
    }

    let mut sink: Box<dyn SampleSink + Send> = match cli.format {
        OutputFormat::Csv => Box::new(CsvSink::create(&cli.output)?),
        OutputFormat::JsonLines => Box::new(JsonLinesSink::create(&cli.output)?),
    };
    let persister = coordinator.clone();
    let written = tokio::task::spawn_blocking(move || persister.finish(sink.as_mut())).await??;

    info!(
        samples = written.unwrap_or(0),
        anomalies = coordinator.stats().anomalies(),
        output = %cli.output.display(),
        "Data processing has stopped and data has been saved"
    );
    Ok(())
}

/// Block until Ctrl+C, the optional run duration elapses, or the producer
/// exits on its own.
async fn wait_for_stop(coordinator: &StreamingCoordinator, run_for: Option<Duration>) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut signals = true;

    let deadline = async {
        match run_for {
            Some(d) => time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut poll = time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            res = &mut ctrl_c, if signals => match res {
                Ok(()) => {
                    info!("Keyboard interrupt detected");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install Ctrl+C handler");
                    signals = false;
                }
            },
            _ = &mut deadline => {
                info!("Run duration elapsed");
                return;
            }
            _ = poll.tick() => {
                if coordinator.is_producer_finished() {
                    info!("Producer exited on its own");
                    return;
                }
            }
        }
    }
}
