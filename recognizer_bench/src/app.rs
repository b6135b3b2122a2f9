use crate::client::RecognizerClient;
use crate::config::{BenchmarkConfig, Config};
use crate::harness::{BenchmarkHarness, RecognitionReport, StreamReport, UnaryReport};
use futures::StreamExt;
use recognizer_proto::Image;
use tokio::signal;
use tokio::task::JoinHandle;

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let client = RecognizerClient::connect(&config.recognizer_service).await?;
    let live_state_watcher = watch_live_state(client.clone()).await?;
    let harness = BenchmarkHarness::new(client);

    tokio::select! {
        result = run_benchmarks(&harness, &config.benchmark) => result?,
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, cancelling benchmark runs");
        }
    }

    live_state_watcher.abort();
    Ok(())
}

async fn run_benchmarks(
    harness: &BenchmarkHarness,
    config: &BenchmarkConfig,
) -> anyhow::Result<()> {
    let images = (0..config.recognize_images)
        .map(|i| Image::new(vec![(i % 2) as u8, 1, 2, 3]))
        .collect();
    log_recognition(&harness.run_recognition(images).await?);

    log_unary(&harness.run_large_image(config.unary_repetitions).await?);
    log_unary(
        &harness
            .run_pose_batch(config.pose_count, config.unary_repetitions)
            .await?,
    );

    for result in harness.run_sweep(&config.sweep.runs()).await {
        match result.outcome {
            Ok(report) => log_stream(&report),
            Err(e) => tracing::warn!(
                size = result.params.size,
                count = result.params.count,
                delay_ms = result.params.delay_ms,
                "Benchmark run failed, no numbers reported: {}",
                e
            ),
        }
    }

    Ok(())
}

async fn watch_live_state(client: RecognizerClient) -> anyhow::Result<JoinHandle<()>> {
    let mut states = client.watch_live_state().await?;

    Ok(tokio::spawn(async move {
        while let Some(state) = states.next().await {
            match state {
                Ok(state) => match state.image {
                    Some(image) => tracing::info!("New state, current image: {}", image),
                    None => tracing::info!("New state, no image in progress"),
                },
                Err(status) => {
                    tracing::warn!("Live state subscription ended: {}", status);
                    break;
                }
            }
        }
    }))
}

fn log_recognition(report: &RecognitionReport) {
    let categories: Vec<_> = report
        .categories
        .iter()
        .map(|category| category.as_str_name())
        .collect();
    tracing::info!(
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Recognized categories: {:?}",
        categories
    );
}

fn log_unary(report: &UnaryReport) {
    tracing::info!(
        operation = %report.operation,
        calls = report.calls,
        total_ms = report.total.as_millis() as u64,
        avg_per_call_ms = report.average_per_call().as_secs_f64() * 1000.0,
        "{}",
        report.latency
    );
}

fn log_stream(report: &StreamReport) {
    tracing::info!(
        size = report.params.size,
        count = report.params.count,
        delay_ms = report.params.delay_ms,
        bytes = report.bytes_received,
        min_inter_arrival_ms = report
            .min_inter_arrival
            .map(|gap| gap.as_secs_f64() * 1000.0),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "{}",
        report.latency
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
