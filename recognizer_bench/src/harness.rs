use crate::client::RecognizerClient;
use crate::error::BenchError;
use crate::stats::{LatencyStats, LatencySummary};
use futures::{stream, StreamExt};
use recognizer_proto::{now_millis, BenchmarkRequest, Category, Image, Operation, StreamScope};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Parameters of one `Benchmark` stream run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub size: i32,
    pub count: i32,
    pub delay_ms: i64,
}

impl From<StreamParams> for BenchmarkRequest {
    fn from(params: StreamParams) -> Self {
        Self {
            size: params.size,
            count: params.count,
            delay_ms: params.delay_ms,
        }
    }
}

/// Numbers from a stream that completed with every requested item.
#[derive(Debug, Clone)]
pub struct StreamReport {
    pub params: StreamParams,
    pub latency: LatencySummary,
    pub bytes_received: u64,
    /// Shortest gap between two consecutive arrivals.
    pub min_inter_arrival: Option<Duration>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct UnaryReport {
    pub operation: Operation,
    pub calls: u32,
    pub total: Duration,
    pub latency: LatencySummary,
}

impl UnaryReport {
    pub fn average_per_call(&self) -> Duration {
        self.total / self.calls
    }
}

#[derive(Debug)]
pub struct SweepResult {
    pub params: StreamParams,
    pub outcome: Result<StreamReport, BenchError>,
}

#[derive(Debug, Clone)]
pub struct RecognitionReport {
    pub categories: Vec<Category>,
    pub elapsed: Duration,
}

pub struct BenchmarkHarness {
    client: RecognizerClient,
}

impl BenchmarkHarness {
    pub fn new(client: RecognizerClient) -> Self {
        Self { client }
    }

    /// Consumes one `Benchmark` stream. Aggregates are only returned when the
    /// stream ends on its own after exactly `params.count` items.
    pub async fn run_stream(&self, params: StreamParams) -> Result<StreamReport, BenchError> {
        let scope = StreamScope::new(Operation::Benchmark);
        self.run_stream_in(&scope, params).await
    }

    /// Like [`run_stream`](Self::run_stream), inside a scope owned by the
    /// caller. Cancelling `scope` ends the run with [`BenchError::Cancelled`].
    #[instrument(skip(self, scope))]
    pub async fn run_stream_in(
        &self,
        scope: &StreamScope,
        params: StreamParams,
    ) -> Result<StreamReport, BenchError> {
        let started = Instant::now();
        let mut images = scope.register(self.client.benchmark(params).await?);

        let mut stats = LatencyStats::default();
        let mut bytes_received = 0u64;
        let mut last_arrival: Option<Instant> = None;
        let mut min_inter_arrival: Option<Duration> = None;

        while let Some(item) = images.next().await {
            let image = item.map_err(|source| BenchError::Incomplete {
                received: stats.count(),
                source,
            })?;

            let arrival = Instant::now();
            let latency = image.latency_ms(now_millis());
            tracing::debug!(latency, size = image.data.len(), "Received image");

            if let Some(previous) = last_arrival {
                let gap = arrival - previous;
                min_inter_arrival = Some(min_inter_arrival.map_or(gap, |min| min.min(gap)));
            }
            last_arrival = Some(arrival);
            bytes_received += image.data.len() as u64;
            stats.record(latency);
        }

        if images.is_cancelled() {
            return Err(BenchError::Cancelled {
                received: stats.count(),
            });
        }

        let expected = params.count.max(0) as u64;
        if stats.count() != expected {
            return Err(BenchError::Truncated {
                expected,
                received: stats.count(),
            });
        }

        let latency = stats.summary().ok_or(BenchError::Empty)?;
        Ok(StreamReport {
            params,
            latency,
            bytes_received,
            min_inter_arrival,
            elapsed: started.elapsed(),
        })
    }

    /// Runs every parameter set in order, each with its own aggregates.
    pub async fn run_sweep(&self, runs: &[StreamParams]) -> Vec<SweepResult> {
        let mut results = Vec::with_capacity(runs.len());
        for &params in runs {
            let outcome = self.run_stream(params).await;
            results.push(SweepResult { params, outcome });
        }
        results
    }

    /// Repeated `Benchmark2` calls: raw transfer cost of one large image.
    pub async fn run_large_image(&self, repetitions: u32) -> Result<UnaryReport, BenchError> {
        let client = &self.client;
        self.run_unary(Operation::Benchmark2, repetitions, move || async move {
            let image = client.benchmark2().await?;
            tracing::debug!("Received image: {}", image.data.len());
            Ok::<_, BenchError>(image.timestamp)
        })
        .await
    }

    /// Repeated `Benchmark3` calls: cost of a batch of optional-field records.
    pub async fn run_pose_batch(
        &self,
        count: i32,
        repetitions: u32,
    ) -> Result<UnaryReport, BenchError> {
        let client = &self.client;
        self.run_unary(Operation::Benchmark3, repetitions, move || async move {
            let frame = client.benchmark3(count).await?;
            tracing::debug!("Received {} pose detections", frame.items.len());
            Ok::<_, BenchError>(frame.timestamp)
        })
        .await
    }

    async fn run_unary<F, Fut>(
        &self,
        operation: Operation,
        repetitions: u32,
        mut call: F,
    ) -> Result<UnaryReport, BenchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<i64, BenchError>>,
    {
        let mut stats = LatencyStats::default();
        let started = Instant::now();

        for _ in 0..repetitions {
            let timestamp = call().await?;
            stats.record(now_millis() - timestamp);
        }

        let total = started.elapsed();
        let latency = stats.summary().ok_or(BenchError::Empty)?;
        Ok(UnaryReport {
            operation,
            calls: repetitions,
            total,
            latency,
        })
    }

    /// Streams `images` through `RecognizeAll` and collects the categories.
    #[instrument(skip_all, fields(images = images.len()))]
    pub async fn run_recognition(
        &self,
        images: Vec<Image>,
    ) -> Result<RecognitionReport, BenchError> {
        let scope = StreamScope::new(Operation::RecognizeAll);
        let started = Instant::now();
        let expected = images.len() as u64;

        let outbound = scope.register(stream::iter(images));
        let mut recognitions = scope.register(self.client.recognize_all(outbound).await?);

        let mut categories = Vec::new();
        while let Some(item) = recognitions.next().await {
            let recognition = item.map_err(|source| BenchError::Incomplete {
                received: categories.len() as u64,
                source,
            })?;
            let category = recognition.checked_category()?;
            tracing::debug!("Recognized category: {}", category.as_str_name());
            categories.push(category);
        }

        if categories.len() as u64 != expected {
            return Err(BenchError::Truncated {
                expected,
                received: categories.len() as u64,
            });
        }

        Ok(RecognitionReport {
            categories,
            elapsed: started.elapsed(),
        })
    }
}
