use thiserror::Error;
use tonic::Status;

#[derive(Error, Debug)]
pub enum RecognizerError {
    /// Rejected before any work or state mutation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Processing failed: {0}")]
    Processing(String),
    #[error("Transport failure: {0}")]
    Transport(#[from] Status),
}

impl From<RecognizerError> for Status {
    fn from(error: RecognizerError) -> Self {
        match error {
            RecognizerError::InvalidInput(message) => Status::invalid_argument(message),
            RecognizerError::Processing(message) => Status::internal(message),
            RecognizerError::Transport(status) => status,
        }
    }
}
