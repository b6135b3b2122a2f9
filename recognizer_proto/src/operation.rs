use std::fmt;

/// How requests and responses flow for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    Unary,
    /// The client streams requests; the server may answer with a stream.
    ClientStreaming,
    ServerStreaming,
    /// A server-held value pushed to subscribers without polling.
    PushField,
}

impl CallShape {
    pub fn is_streaming(&self) -> bool {
        !matches!(self, CallShape::Unary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Recognize,
    RecognizeAll,
    Benchmark,
    Benchmark2,
    Benchmark3,
    CurrentlyProcessedImage,
}

impl Operation {
    pub fn shape(&self) -> CallShape {
        match self {
            Operation::Recognize | Operation::Benchmark2 | Operation::Benchmark3 => CallShape::Unary,
            Operation::RecognizeAll => CallShape::ClientStreaming,
            Operation::Benchmark => CallShape::ServerStreaming,
            Operation::CurrentlyProcessedImage => CallShape::PushField,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Recognize => "recognize",
            Operation::RecognizeAll => "recognize_all",
            Operation::Benchmark => "benchmark",
            Operation::Benchmark2 => "benchmark2",
            Operation::Benchmark3 => "benchmark3",
            Operation::CurrentlyProcessedImage => "currently_processed_image",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_shapes() {
        assert_eq!(Operation::Recognize.shape(), CallShape::Unary);
        assert_eq!(Operation::RecognizeAll.shape(), CallShape::ClientStreaming);
        assert_eq!(Operation::Benchmark.shape(), CallShape::ServerStreaming);
        assert_eq!(
            Operation::CurrentlyProcessedImage.shape(),
            CallShape::PushField
        );
        assert!(!Operation::Benchmark3.shape().is_streaming());
        assert!(Operation::Benchmark.shape().is_streaming());
    }
}
