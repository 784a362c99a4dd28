//! Decoded frame type.

use bytes::Bytes;
use image::imageops::FilterType;
use image::RgbImage;

use reel_ipc::DisplaySize;

use crate::error::CaptureError;
use crate::CaptureResult;

/// A decoded RGB24 video frame.
///
/// The pixel buffer is reference counted and never mutated, so clones are
/// cheap and readers can hold a frame while the producer moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Packed RGB24 pixel data, row major.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl Frame {
    /// Create a new frame.
    pub fn new(data: Bytes, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Calculate expected RGB24 buffer size for given dimensions.
    pub fn rgb24_buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Validate that the frame data matches expected dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::rgb24_buffer_size(self.width, self.height)
    }

    /// True when both frames hold the same picture, ignoring sequence numbers.
    pub fn same_pixels(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.data == other.data
    }

    /// Replace the sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Resize to the display size. Returns a cheap clone if already sized.
    pub fn resized(&self, size: DisplaySize) -> CaptureResult<Frame> {
        if self.width == size.width && self.height == size.height {
            return Ok(self.clone());
        }

        let image = RgbImage::from_raw(self.width, self.height, self.data.to_vec()).ok_or_else(
            || {
                CaptureError::FrameConversion(format!(
                    "{} bytes do not fit a {}x{} RGB frame",
                    self.data.len(),
                    self.width,
                    self.height
                ))
            },
        )?;

        let resized = image::imageops::resize(&image, size.width, size.height, FilterType::Triangle);

        Ok(Frame::new(
            Bytes::from(resized.into_raw()),
            size.width,
            size.height,
            self.sequence,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        let data = vec![value; Frame::rgb24_buffer_size(width, height)];
        Frame::new(Bytes::from(data), width, height, 0)
    }

    #[test]
    fn test_same_pixels_ignores_sequence() {
        let a = solid(4, 2, 10);
        let b = solid(4, 2, 10).with_sequence(7);
        let c = solid(4, 2, 11);
        assert!(a.same_pixels(&b));
        assert!(!a.same_pixels(&c));
        assert!(!a.same_pixels(&solid(2, 4, 10)));
    }

    #[test]
    fn test_resized_dimensions() {
        let frame = solid(8, 4, 200).with_sequence(3);
        let resized = frame.resized(DisplaySize::new(4, 2)).unwrap();
        assert_eq!((resized.width, resized.height), (4, 2));
        assert_eq!(resized.sequence, 3);
        assert!(resized.is_valid());
        assert!(resized.data.iter().all(|&v| v == 200));
    }

    #[test]
    fn test_resized_rejects_short_buffer() {
        let frame = Frame::new(Bytes::from_static(&[0, 0, 0]), 4, 4, 0);
        assert!(!frame.is_valid());
        assert!(matches!(
            frame.resized(DisplaySize::new(2, 2)),
            Err(CaptureError::FrameConversion(_))
        ));
    }
}
