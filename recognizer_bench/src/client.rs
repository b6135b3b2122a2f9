use crate::config::{Compression, RecognizerServiceConfig};
use crate::error::BenchError;
use crate::harness::StreamParams;
use futures::Stream;
use recognizer_proto::{
    image_recognizer_client::ImageRecognizerClient, BenchmarkRequest, Category, Empty, Image,
    PoseBatchRequest, PoseDetectionFrame, ProcessingState, Recognition,
};
use tokio::time::{sleep, timeout, Duration};
use tonic::{codec::CompressionEncoding, transport::Channel, Request, Streaming};
use tracing::instrument;

/// Typed access to one connection to the recognizer service. Clones share
/// the underlying channel.
#[derive(Debug, Clone)]
pub struct RecognizerClient {
    inner: ImageRecognizerClient<Channel>,
}

impl RecognizerClient {
    pub async fn connect(config: &RecognizerServiceConfig) -> Result<Self, BenchError> {
        let address = config.get_address();
        let mut retry_delay = Duration::from_millis(50);
        let max_retry_delay = Duration::from_secs(1);
        let mut retry_count = 0;

        while retry_count < config.max_retries {
            match timeout(
                config.get_connect_timeout(),
                ImageRecognizerClient::connect(address.clone()),
            )
            .await
            {
                Ok(Ok(client)) => {
                    tracing::info!("Connected to recognizer service at {}", address);
                    return Ok(Self {
                        inner: Self::configure(client, config),
                    });
                }
                Ok(Err(e)) => {
                    tracing::error!("Failed to connect to gRPC server: {:?}", e);
                }
                Err(_) => {
                    tracing::error!("Connection timeout");
                }
            }

            retry_count += 1;
            let jitter = rand::random::<f32>() * 0.2 + 0.9;
            sleep(retry_delay.mul_f32(jitter)).await;
            retry_delay = (retry_delay * 2).min(max_retry_delay);
        }

        Err(BenchError::MaxRetriesExceeded)
    }

    fn configure(
        client: ImageRecognizerClient<Channel>,
        config: &RecognizerServiceConfig,
    ) -> ImageRecognizerClient<Channel> {
        let client = client
            .max_decoding_message_size(config.max_message_size)
            .max_encoding_message_size(config.max_message_size);

        match config.compression {
            Compression::Gzip => client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip),
            Compression::None => client,
        }
    }

    #[instrument(skip_all)]
    pub async fn recognize(&self, image: Image) -> Result<Category, BenchError> {
        let mut client = self.inner.clone();
        let recognition = client.recognize(Request::new(image)).await?.into_inner();

        Ok(recognition.checked_category()?)
    }

    /// Streams `images` to the service. The returned stream yields one
    /// recognition per image, in order.
    pub async fn recognize_all<S>(&self, images: S) -> Result<Streaming<Recognition>, BenchError>
    where
        S: Stream<Item = Image> + Send + 'static,
    {
        let mut client = self.inner.clone();
        let response = client.recognize_all(Request::new(images)).await?;

        Ok(response.into_inner())
    }

    pub async fn benchmark(&self, params: StreamParams) -> Result<Streaming<Image>, BenchError> {
        let mut client = self.inner.clone();
        let response = client
            .benchmark(Request::new(BenchmarkRequest::from(params)))
            .await?;

        Ok(response.into_inner())
    }

    pub async fn benchmark2(&self) -> Result<Image, BenchError> {
        let mut client = self.inner.clone();
        let response = client.benchmark2(Request::new(Empty {})).await?;

        Ok(response.into_inner())
    }

    pub async fn benchmark3(&self, count: i32) -> Result<PoseDetectionFrame, BenchError> {
        let mut client = self.inner.clone();
        let response = client
            .benchmark3(Request::new(PoseBatchRequest { count }))
            .await?;

        Ok(response.into_inner())
    }

    /// Subscribes to the live-state field. The first message carries the
    /// current value.
    pub async fn watch_live_state(&self) -> Result<Streaming<ProcessingState>, BenchError> {
        let mut client = self.inner.clone();
        let response = client
            .currently_processed_image(Request::new(Empty {}))
            .await?;

        Ok(response.into_inner())
    }
}
