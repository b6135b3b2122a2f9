use crate::{
    classifier::Classifier, config::RecognizerConfig, error::RecognizerError,
    live_state::LiveState, mock,
};
use async_stream::{stream, try_stream};
use futures::{Stream, StreamExt};
use recognizer_proto::{
    BenchmarkRequest, Category, Image, PoseDetectionFrame, LARGE_IMAGE_BYTES,
};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::instrument;

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_payload_bytes: usize,
    max_benchmark_count: i32,
}

/// Recognition and synthetic payload generation behind the RPC surface.
#[derive(Debug, Clone)]
pub struct Recognizer<C: Classifier> {
    classifier: Arc<C>,
    live_state: LiveState,
    limits: Limits,
}

impl<C: Classifier> Recognizer<C> {
    pub fn new(classifier: C, config: &RecognizerConfig) -> Self {
        Self {
            classifier: Arc::new(classifier),
            live_state: LiveState::new(),
            limits: Limits {
                max_payload_bytes: config.max_payload_bytes,
                max_benchmark_count: config.max_benchmark_count,
            },
        }
    }

    pub fn live_state(&self) -> &LiveState {
        &self.live_state
    }

    #[instrument(skip_all, fields(ts = image.timestamp, len = image.data.len()))]
    pub async fn recognize(&self, image: Image) -> Result<Category, RecognizerError> {
        if image.data.is_empty() {
            return Err(RecognizerError::InvalidInput(
                "image payload is empty".to_string(),
            ));
        }

        let _processing = self.live_state.begin(image.clone());
        let category = self.classifier.classify(&image).await?;

        tracing::debug!(category = category.as_str_name(), "image recognized");
        Ok(category)
    }

    /// Recognizes each inbound image in order. The next image is only pulled
    /// once the previous result has been taken, and the stream ends after the
    /// first failure.
    pub fn recognize_all<S, E>(
        &self,
        images: S,
    ) -> impl Stream<Item = Result<Category, RecognizerError>> + Send + 'static
    where
        S: Stream<Item = Result<Image, E>> + Send + 'static,
        E: Into<RecognizerError> + Send + 'static,
    {
        let recognizer = self.clone();

        try_stream! {
            let mut images = Box::pin(images);
            while let Some(image) = images.next().await {
                let image = image.map_err(Into::<RecognizerError>::into)?;
                let category = recognizer.recognize(image).await?;
                yield category;
            }
        }
    }

    /// Emits `count` zero-filled images of `size` bytes, sleeping `delay_ms`
    /// before each one. Parameters are checked before the stream is built.
    pub fn benchmark(
        &self,
        request: &BenchmarkRequest,
    ) -> Result<impl Stream<Item = Image> + Send + 'static, RecognizerError> {
        let size = self.check_size(request.size)?;
        if request.count <= 0 {
            return Err(RecognizerError::InvalidInput(format!(
                "count must be at least 1, got {}",
                request.count
            )));
        }
        self.check_count(request.count)?;
        if request.delay_ms < 0 {
            return Err(RecognizerError::InvalidInput(format!(
                "delay_ms must not be negative, got {}",
                request.delay_ms
            )));
        }

        let count = request.count;
        let delay = Duration::from_millis(request.delay_ms as u64);
        tracing::debug!(size, count, delay_ms = request.delay_ms, "benchmark stream accepted");

        Ok(stream! {
            for _ in 0..count {
                sleep(delay).await;
                yield Image::synthetic(size);
            }
        })
    }

    pub fn benchmark2(&self) -> Image {
        Image::synthetic(LARGE_IMAGE_BYTES)
    }

    pub fn benchmark3(&self, count: i32) -> Result<PoseDetectionFrame, RecognizerError> {
        if count < 0 {
            return Err(RecognizerError::InvalidInput(format!(
                "count must not be negative, got {}",
                count
            )));
        }
        self.check_count(count)?;

        let frame_bytes = count as usize * mock::batch_item_len();
        if frame_bytes > self.limits.max_payload_bytes {
            return Err(RecognizerError::InvalidInput(format!(
                "a batch of {} detections encodes to {} bytes, above the {} byte limit",
                count, frame_bytes, self.limits.max_payload_bytes
            )));
        }

        Ok(PoseDetectionFrame::new(
            vec![mock::mock_detection(); count as usize],
            Some(0),
        ))
    }

    fn check_size(&self, size: i32) -> Result<usize, RecognizerError> {
        let size = usize::try_from(size).map_err(|_| {
            RecognizerError::InvalidInput(format!("size must not be negative, got {}", size))
        })?;
        if size > self.limits.max_payload_bytes {
            return Err(RecognizerError::InvalidInput(format!(
                "size {} exceeds the {} byte limit",
                size, self.limits.max_payload_bytes
            )));
        }
        Ok(size)
    }

    fn check_count(&self, count: i32) -> Result<(), RecognizerError> {
        if count > self.limits.max_benchmark_count {
            return Err(RecognizerError::InvalidInput(format!(
                "count {} exceeds the limit of {}",
                count, self.limits.max_benchmark_count
            )));
        }
        Ok(())
    }
}
