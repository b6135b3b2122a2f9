tonic::include_proto!("image_recognizer");

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("image_recognizer");

pub mod operation;
pub mod payload;
pub mod scope;

pub use operation::{CallShape, Operation};
pub use payload::{now_millis, KEYPOINT_COUNT, LARGE_IMAGE_BYTES};
pub use scope::{ScopeBoundStream, ScopedStream, StreamScope};
