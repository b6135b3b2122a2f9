mod mock;
mod service;

pub mod classifier;
pub mod config;
pub mod error;
pub mod live_state;
pub mod recognizer;
pub mod server;

pub use classifier::{Classifier, ParityClassifier};
pub use error::RecognizerError;
pub use recognizer::Recognizer;
pub use server::{start_server, GrpcServer};
