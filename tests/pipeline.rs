use std::io::Cursor;
use std::thread;
use std::time::{Duration, Instant};
use stream_sentry::render::{ConsoleRenderer, run_renderer};
use stream_sentry::sink::MemorySink;
use stream_sentry::{
    CoordinatorState, CsvSink, ExitReason, IterSource, LineSource, PipelineConfig,
    SimulatorConfig, StreamingCoordinator, TransactionSimulator,
};

fn unpaced(window_size: usize) -> PipelineConfig {
    PipelineConfig {
        window_size,
        pace_ms: 0,
        ..PipelineConfig::default()
    }
}

fn run_to_completion(coord: &StreamingCoordinator) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !coord.is_producer_finished() {
        assert!(Instant::now() < deadline, "producer did not finish");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn spike_after_flat_run_is_the_only_anomaly() {
    let window = PipelineConfig::default().window_size;
    let mut values = vec![100.0; window - 1];
    values.push(1000.0);

    let coord = StreamingCoordinator::new(unpaced(window));
    coord.start(IterSource::new(values)).unwrap();
    run_to_completion(&coord);
    coord.stop();

    let samples = coord.log().export();
    assert_eq!(samples.len(), window);
    let flags: Vec<bool> = samples.iter().map(|s| s.is_anomaly).collect();
    assert!(flags[..window - 1].iter().all(|f| !f));
    assert!(flags[window - 1]);
    assert_eq!(coord.stats().anomalies(), 1);
}

#[test]
fn flat_stream_never_flags_even_when_full() {
    let window = 100;
    let coord = StreamingCoordinator::new(unpaced(window));
    coord.start(IterSource::new(vec![50.0; window + 1])).unwrap();
    run_to_completion(&coord);
    coord.stop();

    assert_eq!(coord.log().len(), window + 1);
    assert_eq!(coord.log().anomaly_count(), 0);
}

#[test]
fn samples_are_timestamp_ordered() {
    let coord = StreamingCoordinator::new(unpaced(10));
    coord
        .start(IterSource::new((0..500).map(|i| (i % 17) as f64)))
        .unwrap();
    run_to_completion(&coord);
    coord.stop();

    let samples = coord.log().export();
    assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn immediate_stop_with_default_timings() {
    let coord = StreamingCoordinator::new(PipelineConfig::default());
    let sim = TransactionSimulator::new(SimulatorConfig {
        seed: Some(11),
        anomaly_probability: 0.0,
        ..SimulatorConfig::default()
    })
    .unwrap();
    coord.start(sim).unwrap();

    let started = Instant::now();
    let report = coord.stop();
    assert!(started.elapsed() <= Duration::from_millis(2000));
    assert_eq!(coord.state(), CoordinatorState::Stopped);
    assert!(!report.timed_out);

    for s in coord.log().export() {
        assert!(s.value.is_finite());
        assert!(s.value >= 900.0 && s.value <= 1650.0);
        assert!(!s.is_anomaly);
    }

    // A second stop changes nothing.
    assert_eq!(coord.stop(), report);
}

#[test]
fn malformed_line_ends_run_but_keeps_collected_data() {
    let input = "10\n11\n12\noops\n13\n";
    let coord = StreamingCoordinator::new(unpaced(2));
    coord.start(LineSource::new(Cursor::new(input))).unwrap();
    run_to_completion(&coord);

    let report = coord.stop();
    let exit = report.exit.unwrap();
    assert!(matches!(exit.reason, ExitReason::Failed(ref m) if m.contains("line 4")));
    assert_eq!(exit.produced, 3);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transactions.csv");
    let mut sink = CsvSink::create(&path).unwrap();
    assert_eq!(coord.finish(&mut sink).unwrap(), Some(3));

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["Timestamp", "Amount", "Is Anomaly"]);
    let amounts: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[1].to_string())
        .collect();
    assert_eq!(amounts, vec!["10.0", "11.0", "12.0"]);
}

#[tokio::test]
async fn renderer_reads_while_producer_writes() {
    let coord = std::sync::Arc::new(StreamingCoordinator::new(PipelineConfig {
        pace_ms: 1,
        ..unpaced(5)
    }));
    coord
        .start(IterSource::new((0..200).map(|i| i as f64)))
        .unwrap();

    let renderer = tokio::spawn(run_renderer(
        coord.log().clone(),
        ConsoleRenderer::default(),
        Duration::from_millis(5),
        coord.cancellation_token(),
    ));

    while !coord.is_producer_finished() {
        let snap = coord.log().snapshot();
        for (i, s) in snap.iter().enumerate() {
            assert_eq!(s.value, i as f64);
        }
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    let stopper = coord.clone();
    let report = tokio::task::spawn_blocking(move || stopper.stop())
        .await
        .unwrap();
    assert_eq!(report.samples, 200);

    let console = renderer.await.unwrap();
    assert!(console.frames_reported >= 1);

    let mut sink = MemorySink::default();
    coord.finish(&mut sink).unwrap();
    assert_eq!(sink.batches[0].len(), 200);
}
