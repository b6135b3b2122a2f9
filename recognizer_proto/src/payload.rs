use crate::{Category, Image, Keypoints, Point, PoseDetectionFrame, Recognition, Rect};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of the fixed-dimension image returned by `Benchmark2` (1280x720 RGBA).
pub const LARGE_IMAGE_BYTES: usize = 1280 * 720 * 4;

/// Number of points in a full pose skeleton.
pub const KEYPOINT_COUNT: usize = 17;

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl Image {
    /// Builds an image stamped with the current time.
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_timestamp(data, now_millis())
    }

    pub fn with_timestamp(data: Vec<u8>, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    /// A zero-filled image of `size` bytes, stamped now.
    pub fn synthetic(size: usize) -> Self {
        Self::new(vec![0x00; size])
    }

    /// Milliseconds between the embedded timestamp and `received_at`.
    pub fn latency_ms(&self, received_at: i64) -> i64 {
        received_at - self.timestamp
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image(ts={}, len={})", self.timestamp, self.data.len())
    }
}

impl From<Category> for Recognition {
    fn from(category: Category) -> Self {
        Self {
            category: category as i32,
        }
    }
}

impl Recognition {
    /// Decodes the category, rejecting values outside the declared variants.
    pub fn checked_category(&self) -> Result<Category, prost::UnknownEnumValue> {
        Category::try_from(self.category)
    }
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

impl From<Vec<Point>> for Keypoints {
    fn from(points: Vec<Point>) -> Self {
        Self { points }
    }
}

impl Keypoints {
    pub fn is_full_skeleton(&self) -> bool {
        self.points.len() == KEYPOINT_COUNT
    }
}

impl PoseDetectionFrame {
    /// Builds a frame stamped with the current time.
    pub fn new(items: Vec<crate::PoseDetection>, frame_index: Option<i32>) -> Self {
        Self {
            items,
            frame_index,
            timestamp: now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_is_stamped_at_construction() {
        let before = now_millis();
        let image = Image::new(vec![1, 2, 3]);
        let after = now_millis();

        assert!(image.timestamp >= before && image.timestamp <= after);
        assert_eq!(image.data, vec![1, 2, 3]);
    }

    #[test]
    fn test_synthetic_image_size() {
        let image = Image::synthetic(1024);
        assert_eq!(image.data.len(), 1024);
        assert!(image.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_latency_is_measured_against_embedded_timestamp() {
        let image = Image::with_timestamp(vec![], 1_000);
        assert_eq!(image.latency_ms(1_250), 250);
    }

    #[test]
    fn test_recognition_rejects_unknown_category() {
        let recognition = Recognition::from(Category::Dog);
        assert_eq!(recognition.checked_category().unwrap(), Category::Dog);

        let bogus = Recognition { category: 7 };
        assert!(bogus.checked_category().is_err());
    }

    #[test]
    fn test_display_omits_payload() {
        let image = Image::with_timestamp(vec![0; 4096], 42);
        assert_eq!(image.to_string(), "Image(ts=42, len=4096)");
    }
}
