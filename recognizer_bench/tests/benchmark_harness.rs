use futures::{stream, StreamExt};
use recognizer_bench::{
    config::{Compression, RecognizerServiceConfig},
    BenchError, BenchmarkHarness, RecognizerClient, StreamParams,
};
use recognizer_proto::{Category, Image, Operation, StreamScope};
use recognizer_service::{
    config::{self as service_config, RecognizerConfig, ServerConfig},
    GrpcServer, ParityClassifier, Recognizer,
};
use std::time::Duration;
use tokio::{net::TcpListener, sync::oneshot, time};
use tonic::Code;

const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

struct TestServer {
    recognizer: Recognizer<ParityClassifier>,
    client: RecognizerClient,
    _shutdown: oneshot::Sender<()>,
}

async fn spawn_server(processing_delay_ms: u64) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let recognizer_config = RecognizerConfig {
        processing_delay_ms,
        ..RecognizerConfig::default()
    };
    let recognizer = Recognizer::new(
        ParityClassifier::new(recognizer_config.get_processing_delay()),
        &recognizer_config,
    );

    let server_config = ServerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        max_message_size: MAX_MESSAGE_SIZE,
        compression: service_config::Compression::Gzip,
    };
    let server = GrpcServer::new(recognizer.clone(), &server_config).unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .run_with_listener(listener, async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    let client = RecognizerClient::connect(&RecognizerServiceConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        compression: Compression::Gzip,
        max_message_size: MAX_MESSAGE_SIZE,
        connect_timeout_ms: 1000,
        max_retries: 5,
    })
    .await
    .unwrap();

    TestServer {
        recognizer,
        client,
        _shutdown: shutdown_tx,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn benchmark_stream_reports_latency() {
    let server = spawn_server(0).await;
    let harness = BenchmarkHarness::new(server.client.clone());

    let report = harness
        .run_stream(StreamParams {
            size: 1024,
            count: 5,
            delay_ms: 10,
        })
        .await
        .unwrap();

    let latency = report.latency;
    assert_eq!(latency.count, 5);
    assert_eq!(report.bytes_received, 5 * 1024);
    assert!(latency.min_ms >= 0);
    assert!(latency.min_ms as f64 <= latency.avg_ms);
    assert!(latency.avg_ms <= latency.max_ms as f64);
    assert!(report.elapsed >= Duration::from_millis(50));
    assert!(report.min_inter_arrival.unwrap() >= Duration::from_millis(10));
    assert!(server.recognizer.live_state().current().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recognize_publishes_live_state_around_the_call() {
    let server = spawn_server(100).await;
    let mut states = server.client.watch_live_state().await.unwrap();

    let initial = states.next().await.unwrap().unwrap();
    assert!(initial.image.is_none());

    let image = Image::new(vec![0, 1, 2, 3]);
    let (category, observed) = tokio::join!(server.client.recognize(image.clone()), async {
        let populated = states.next().await.unwrap().unwrap();
        let cleared = states.next().await.unwrap().unwrap();
        (populated.image, cleared.image)
    });

    assert_eq!(category.unwrap(), Category::Cat);
    assert_eq!(observed.0, Some(image));
    assert_eq!(observed.1, None);

    let category = server.client.recognize(Image::new(vec![1, 0])).await;
    assert_eq!(category.unwrap(), Category::Dog);
    assert!(server.recognizer.live_state().current().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recognize_all_preserves_order_and_length() {
    let server = spawn_server(5).await;
    let harness = BenchmarkHarness::new(server.client.clone());

    let images = (0..10u8).map(|i| Image::new(vec![i % 2, 7])).collect();
    let report = harness.run_recognition(images).await.unwrap();

    let expected: Vec<_> = (0..10)
        .map(|i| if i % 2 == 0 { Category::Cat } else { Category::Dog })
        .collect();
    assert_eq!(report.categories, expected);
    assert!(server.recognizer.live_state().current().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_requests_fail_without_numbers() {
    let server = spawn_server(0).await;
    let harness = BenchmarkHarness::new(server.client.clone());

    let result = harness
        .run_stream(StreamParams {
            size: 1024,
            count: 0,
            delay_ms: 0,
        })
        .await;
    match result {
        Err(BenchError::Rpc(status)) => assert_eq!(status.code(), Code::InvalidArgument),
        other => panic!("expected a validation error, got {:?}", other),
    }

    let result = server.client.recognize(Image::new(vec![])).await;
    match result {
        Err(BenchError::Rpc(status)) => assert_eq!(status.code(), Code::InvalidArgument),
        other => panic!("expected a validation error, got {:?}", other),
    }

    let result = server.client.benchmark3(100_000).await;
    match result {
        Err(BenchError::Rpc(status)) => assert_eq!(status.code(), Code::InvalidArgument),
        other => panic!("expected an oversized batch to be rejected, got {:?}", other),
    }
    assert!(server.recognizer.live_state().current().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sweep_runs_are_independent() {
    let server = spawn_server(0).await;
    let harness = BenchmarkHarness::new(server.client.clone());

    let runs = [
        StreamParams {
            size: 64,
            count: 3,
            delay_ms: 0,
        },
        StreamParams {
            size: -1,
            count: 3,
            delay_ms: 0,
        },
        StreamParams {
            size: 128,
            count: 2,
            delay_ms: 5,
        },
    ];
    let results = harness.run_sweep(&runs).await;

    assert_eq!(results.len(), 3);
    let first = results[0].outcome.as_ref().unwrap();
    assert_eq!(first.latency.count, 3);
    assert!(results[1].outcome.is_err());
    let third = results[2].outcome.as_ref().unwrap();
    assert_eq!(third.latency.count, 2);
    assert_eq!(third.bytes_received, 256);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unary_benchmarks_report_per_call_average() {
    let server = spawn_server(0).await;
    let harness = BenchmarkHarness::new(server.client.clone());

    let large = harness.run_large_image(3).await.unwrap();
    assert_eq!(large.operation, Operation::Benchmark2);
    assert_eq!(large.calls, 3);
    assert_eq!(large.latency.count, 3);
    assert!(large.average_per_call() <= large.total);

    let poses = harness.run_pose_batch(5, 2).await.unwrap();
    assert_eq!(poses.operation, Operation::Benchmark3);
    assert_eq!(poses.latency.count, 2);

    let frame = server.client.benchmark3(5).await.unwrap();
    assert_eq!(frame.items.len(), 5);

    assert!(matches!(
        harness.run_large_image(0).await,
        Err(BenchError::Empty)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_recognize_all_stops_work_and_clears_live_state() {
    let server = spawn_server(100).await;

    let scope = StreamScope::new(Operation::RecognizeAll);
    let images = (0..10u8).map(|i| Image::new(vec![i % 2])).collect::<Vec<_>>();
    let outbound = scope.register(stream::iter(images));
    let mut recognitions = scope.register(server.client.recognize_all(outbound).await.unwrap());

    let mut received = 0;
    while received < 3 {
        recognitions.next().await.unwrap().unwrap();
        received += 1;
    }

    // The response stream is not polled again: cancelling alone must reset it.
    assert!(scope.cancel() >= 1);
    assert_eq!(scope.open_streams(), 0);

    time::sleep(Duration::from_millis(300)).await;
    assert!(server.recognizer.live_state().current().is_none());

    let mut states = server.recognizer.live_state().subscribe();
    let changed = time::timeout(Duration::from_millis(200), states.changed()).await;
    assert!(changed.is_err(), "server kept processing after cancellation");

    assert!(recognitions.next().await.is_none());
    assert!(recognitions.is_cancelled());
    assert_eq!(received, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_stream_run_reports_no_numbers() {
    let server = spawn_server(0).await;
    let harness = BenchmarkHarness::new(server.client.clone());
    let scope = StreamScope::new(Operation::Benchmark);

    let params = StreamParams {
        size: 64,
        count: 100,
        delay_ms: 10,
    };
    let (result, _) = tokio::join!(harness.run_stream_in(&scope, params), async {
        time::sleep(Duration::from_millis(55)).await;
        scope.cancel()
    });

    match result {
        Err(BenchError::Cancelled { received }) => assert!(received < 100),
        other => panic!("expected a cancelled run, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recognition_failing_mid_stream_reports_no_categories() {
    let server = spawn_server(0).await;
    let harness = BenchmarkHarness::new(server.client.clone());

    let images = vec![
        Image::new(vec![0]),
        Image::new(vec![1]),
        Image::new(vec![]),
        Image::new(vec![0]),
    ];
    match harness.run_recognition(images).await {
        Err(BenchError::Incomplete { received, source }) => {
            assert_eq!(received, 2);
            assert_eq!(source.code(), Code::InvalidArgument);
        }
        other => panic!("expected an incomplete run, got {:?}", other),
    }
    assert!(server.recognizer.live_state().current().is_none());
}
