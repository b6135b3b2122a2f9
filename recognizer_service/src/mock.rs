use prost::Message;
use recognizer_proto::{Keypoints, Point, PoseDetection, Rect, KEYPOINT_COUNT};

fn mock_skeleton() -> Keypoints {
    (0..KEYPOINT_COUNT)
        .map(|i| {
            let step = i as f32 * 0.2;
            Point::new(0.1 + step, 0.2 + step)
        })
        .collect::<Vec<_>>()
        .into()
}

/// A fully populated detection used to size pose batches.
pub fn mock_detection() -> PoseDetection {
    PoseDetection {
        index: Some(0),
        point: Some(Point::new(0.1, 0.2)),
        adjusted_box: Some(Rect::new(0.1, 0.2, 0.3, 0.4)),
        adjusted_keypoints: Some(mock_skeleton()),
        restored_box: Some(Rect::new(0.1, 0.2, 0.3, 0.4)),
        restored_keypoints: Some(mock_skeleton()),
        count: Some(1),
        confidence: Some(0.9),
    }
}

/// Bytes one mock detection adds to an encoded `PoseDetectionFrame`,
/// field tag and length prefix included.
pub fn batch_item_len() -> usize {
    let len = mock_detection().encoded_len();
    1 + prost::length_delimiter_len(len) + len
}
