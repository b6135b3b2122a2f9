use crate::{classifier::Classifier, recognizer::Recognizer};
use futures::{Stream, StreamExt};
use recognizer_proto::{
    image_recognizer_server::ImageRecognizer, BenchmarkRequest, Empty, Image, Operation,
    PoseBatchRequest, PoseDetectionFrame, ProcessingState, Recognition, StreamScope,
};
use std::pin::Pin;
use tokio_stream::wrappers::WatchStream;
use tonic::{async_trait, Request, Response, Status, Streaming};
use tracing::instrument;

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

#[derive(Debug, Clone)]
pub struct RecognizerService<C: Classifier> {
    recognizer: Recognizer<C>,
}

impl<C: Classifier> RecognizerService<C> {
    pub fn new(recognizer: Recognizer<C>) -> Self {
        Self { recognizer }
    }
}

#[async_trait]
impl<C: Classifier> ImageRecognizer for RecognizerService<C> {
    type RecognizeAllStream = ResponseStream<Recognition>;
    type BenchmarkStream = ResponseStream<Image>;
    type CurrentlyProcessedImageStream = ResponseStream<ProcessingState>;

    async fn recognize(&self, request: Request<Image>) -> Result<Response<Recognition>, Status> {
        let image = request.into_inner();
        let category = self.recognizer.recognize(image).await?;

        Ok(Response::new(Recognition::from(category)))
    }

    #[instrument(skip_all)]
    async fn recognize_all(
        &self,
        request: Request<Streaming<Image>>,
    ) -> Result<Response<Self::RecognizeAllStream>, Status> {
        let scope = StreamScope::new(Operation::RecognizeAll);
        let images = scope.register(request.into_inner());

        let recognitions = self
            .recognizer
            .recognize_all(images)
            .map(|result| result.map(Recognition::from).map_err(Status::from));

        Ok(Response::new(Box::pin(scope.into_stream(recognitions))))
    }

    #[instrument(skip_all)]
    async fn benchmark(
        &self,
        request: Request<BenchmarkRequest>,
    ) -> Result<Response<Self::BenchmarkStream>, Status> {
        let images = self.recognizer.benchmark(request.get_ref())?;

        let scope = StreamScope::new(Operation::Benchmark);
        let images = scope.register(images).map(Ok::<_, Status>);

        Ok(Response::new(Box::pin(scope.into_stream(images))))
    }

    async fn benchmark2(&self, _request: Request<Empty>) -> Result<Response<Image>, Status> {
        Ok(Response::new(self.recognizer.benchmark2()))
    }

    async fn benchmark3(
        &self,
        request: Request<PoseBatchRequest>,
    ) -> Result<Response<PoseDetectionFrame>, Status> {
        let frame = self.recognizer.benchmark3(request.into_inner().count)?;
        tracing::debug!("Returning {} pose detections", frame.items.len());

        Ok(Response::new(frame))
    }

    async fn currently_processed_image(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Self::CurrentlyProcessedImageStream>, Status> {
        let receiver = self.recognizer.live_state().subscribe();
        tracing::debug!(
            subscribers = self.recognizer.live_state().subscriber_count(),
            "live state subscriber attached"
        );

        let states =
            WatchStream::new(receiver).map(|image| Ok::<_, Status>(ProcessingState { image }));
        Ok(Response::new(Box::pin(states)))
    }
}
