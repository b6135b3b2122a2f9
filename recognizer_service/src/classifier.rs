use crate::error::RecognizerError;
use recognizer_proto::{Category, Image};
use std::time::Duration;
use tonic::async_trait;

#[async_trait]
pub trait Classifier: Send + Sync + Clone + 'static {
    async fn classify(&self, image: &Image) -> Result<Category, RecognizerError>;
}

/// Placeholder recognition: waits out a fixed processing time, then calls a
/// zero first byte a cat and anything else a dog.
#[derive(Debug, Clone)]
pub struct ParityClassifier {
    processing_delay: Duration,
}

impl ParityClassifier {
    pub fn new(processing_delay: Duration) -> Self {
        Self { processing_delay }
    }
}

#[async_trait]
impl Classifier for ParityClassifier {
    async fn classify(&self, image: &Image) -> Result<Category, RecognizerError> {
        let first = *image
            .data
            .first()
            .ok_or_else(|| RecognizerError::InvalidInput("image payload is empty".to_string()))?;

        tokio::time::sleep(self.processing_delay).await;

        Ok(if first == 0 {
            Category::Cat
        } else {
            Category::Dog
        })
    }
}
