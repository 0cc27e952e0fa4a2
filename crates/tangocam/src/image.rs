//! Raw camera image formats and samples
//!
//! The sensing service tags each buffer with a HAL pixel format code. Only the
//! three layouts the colour camera produces are accepted; anything else is a
//! malformed event rather than a guess at the byte length.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pose::PoseEstimate;

/// Pixel layouts delivered by the colour camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Planar YUV 4:2:0, V before U.
    Yv12,
    /// Semi-planar YUV 4:2:0 with interleaved VU (NV21).
    YCrCb420Sp,
    /// Packed 8-bit RGBA.
    Rgba8888,
}

impl ImageFormat {
    /// HAL code for `RGBA_8888`.
    pub const HAL_RGBA_8888: u32 = 1;
    /// HAL code for `YCrCb_420_SP`.
    pub const HAL_YCRCB_420_SP: u32 = 0x11;
    /// HAL code for `YV12` (fourcc "YV12").
    pub const HAL_YV12: u32 = 0x3231_5659;

    pub fn from_code(code: u32) -> Result<Self, ImageError> {
        match code {
            Self::HAL_YV12 => Ok(Self::Yv12),
            Self::HAL_YCRCB_420_SP => Ok(Self::YCrCb420Sp),
            Self::HAL_RGBA_8888 => Ok(Self::Rgba8888),
            other => Err(ImageError::UnknownFormat(other)),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Yv12 => Self::HAL_YV12,
            Self::YCrCb420Sp => Self::HAL_YCRCB_420_SP,
            Self::Rgba8888 => Self::HAL_RGBA_8888,
        }
    }

    /// The `android.graphics.ImageFormat` constant consumers decode with.
    ///
    /// YV12 is reported as `YUV_420_888`; RGBA is reported as `FLEX_RGBA_8888`
    /// even though the bytes are packed rather than planar.
    pub fn output_code(self) -> i32 {
        match self {
            Self::Yv12 => 0x23,
            Self::YCrCb420Sp => 0x11,
            Self::Rgba8888 => 0x2A,
        }
    }

    /// Bytes occupied by one `width` x `height` frame.
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Yv12 | Self::YCrCb420Sp => pixels * 12 / 8,
            Self::Rgba8888 => pixels * 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("unknown pixel format code {0:#x}")]
    UnknownFormat(u32),

    #[error("{format:?} buffer too short: expected {expected} bytes, got {actual}")]
    Truncated {
        format: ImageFormat,
        expected: usize,
        actual: usize,
    },
}

/// One raw image event from the sensing service.
#[derive(Debug, Clone)]
pub struct ImageSample {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    /// HAL pixel format code, validated on ingest.
    pub format_code: u32,
    /// Capture time in seconds on the service's clock.
    pub timestamp: f64,
}

impl ImageSample {
    /// Validate the format and length, returning the format and the
    /// frame-sized slice of the buffer.
    pub fn frame(&self) -> Result<(ImageFormat, Bytes), ImageError> {
        let format = ImageFormat::from_code(self.format_code)?;
        let expected = format.byte_len(self.width, self.height);
        if self.data.len() < expected {
            return Err(ImageError::Truncated {
                format,
                expected,
                actual: self.data.len(),
            });
        }
        Ok((format, self.data.slice(..expected)))
    }
}

/// An image paired with its pose, as handed to the sink.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub format: ImageFormat,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pose: PoseEstimate,
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(format_code: u32, len: usize) -> ImageSample {
        ImageSample {
            data: Bytes::from(vec![7u8; len]),
            width: 4,
            height: 2,
            stride: 4,
            format_code,
            timestamp: 1.0,
        }
    }

    #[test]
    fn test_code_mapping_is_closed() {
        for format in [ImageFormat::Yv12, ImageFormat::YCrCb420Sp, ImageFormat::Rgba8888] {
            assert_eq!(ImageFormat::from_code(format.code()), Ok(format));
        }
        assert_eq!(
            ImageFormat::from_code(0x99),
            Err(ImageError::UnknownFormat(0x99))
        );
    }

    #[test]
    fn test_byte_len() {
        assert_eq!(ImageFormat::Yv12.byte_len(640, 480), 460_800);
        assert_eq!(ImageFormat::YCrCb420Sp.byte_len(640, 480), 460_800);
        assert_eq!(ImageFormat::Rgba8888.byte_len(640, 480), 1_228_800);
    }

    #[test]
    fn test_output_codes() {
        assert_eq!(ImageFormat::Yv12.output_code(), 0x23);
        assert_eq!(ImageFormat::YCrCb420Sp.output_code(), 0x11);
        assert_eq!(ImageFormat::Rgba8888.output_code(), 0x2A);
    }

    #[test]
    fn test_frame_slices_to_format_length() {
        // 4x2 NV21 = 12 bytes; padding beyond that is dropped
        let (format, data) = sample(ImageFormat::HAL_YCRCB_420_SP, 16).frame().unwrap();
        assert_eq!(format, ImageFormat::YCrCb420Sp);
        assert_eq!(data.len(), 12);
    }

    #[test]
    fn test_frame_rejects_short_buffer() {
        let err = sample(ImageFormat::HAL_RGBA_8888, 31).frame().unwrap_err();
        assert_eq!(
            err,
            ImageError::Truncated {
                format: ImageFormat::Rgba8888,
                expected: 32,
                actual: 31
            }
        );
    }
}
