mod app;

pub mod client;
pub mod config;
pub mod error;
pub mod harness;
pub mod stats;

pub use app::start_app;
pub use client::RecognizerClient;
pub use error::BenchError;
pub use harness::{BenchmarkHarness, StreamParams};
