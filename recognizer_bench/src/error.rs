use thiserror::Error;
use tonic::Status;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Failed to connect to gRPC server: {0}")]
    ConnectionFailed(#[from] tonic::transport::Error),
    #[error("Maximum connection retries exceeded.")]
    MaxRetriesExceeded,
    #[error("gRPC request failed: {0}")]
    Rpc(#[from] Status),
    #[error("Stream failed after {received} items: {source}")]
    Incomplete {
        received: u64,
        #[source]
        source: Status,
    },
    #[error("Stream cancelled after {received} items")]
    Cancelled { received: u64 },
    #[error("Stream ended after {received} of {expected} items")]
    Truncated { expected: u64, received: u64 },
    #[error("No samples were recorded")]
    Empty,
    #[error("Server sent an unknown category: {0}")]
    UnknownCategory(#[from] prost::UnknownEnumValue),
}
