use opencv::{
    core::{self, Mat, Scalar},
    imgproc,
    prelude::*,
};
use thiserror::Error;

use super::frame_data::{PixelFormat, RawFrame, StreamKind};

/// In-memory layout of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Bgr8,
    Bgra8,
    Gray8,
    Gray16,
}

/// Decoded pixel buffer shared by the preview and write stages.
pub struct CanonicalImage {
    layout: PixelLayout,
    mat: Mat,
}

impl CanonicalImage {
    pub fn new(layout: PixelLayout, mat: Mat) -> Self {
        Self { layout, mat }
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn mat(&self) -> &Mat {
        &self.mat
    }

    pub fn is_empty(&self) -> bool {
        self.mat.empty()
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported {kind:?} pixel format {format} (encoding \"{encoding}\") on stream {stream}")]
    UnsupportedFormat {
        stream: String,
        kind: StreamKind,
        format: PixelFormat,
        encoding: String,
    },

    #[error("frame {frame_number} of {stream} is truncated: {actual} bytes, expected at least {expected}")]
    TruncatedFrame {
        stream: String,
        frame_number: u64,
        expected: usize,
        actual: usize,
    },

    #[error("frame {frame_number} of {stream} has invalid geometry {width}x{height} (stride {stride})")]
    InvalidGeometry {
        stream: String,
        frame_number: u64,
        width: u32,
        height: u32,
        stride: usize,
    },

    #[error("expected a 16-bit depth image, got {0:?}")]
    NotDepth(PixelLayout),

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Conversion {
    None,
    CvtColor(i32),
    Scale(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DecodeRule {
    source_type: i32,
    bytes_per_pixel: usize,
    conversion: Conversion,
    layout: PixelLayout,
}

const fn rule(
    source_type: i32,
    bytes_per_pixel: usize,
    conversion: Conversion,
    layout: PixelLayout,
) -> DecodeRule {
    DecodeRule { source_type, bytes_per_pixel, conversion, layout }
}

const Y16_TO_Y8: f64 = 255.0 / 65535.0;

const RGB8: DecodeRule = rule(
    core::CV_8UC3,
    3,
    Conversion::CvtColor(imgproc::COLOR_RGB2BGR),
    PixelLayout::Bgr8,
);
const RGBA8: DecodeRule = rule(
    core::CV_8UC4,
    4,
    Conversion::CvtColor(imgproc::COLOR_RGBA2BGRA),
    PixelLayout::Bgra8,
);
const BGR8: DecodeRule = rule(core::CV_8UC3, 3, Conversion::None, PixelLayout::Bgr8);
const BGRA8: DecodeRule = rule(core::CV_8UC4, 4, Conversion::None, PixelLayout::Bgra8);
const Y8: DecodeRule = rule(core::CV_8UC1, 1, Conversion::None, PixelLayout::Gray8);
const Y16: DecodeRule = rule(
    core::CV_16UC1,
    2,
    Conversion::Scale(Y16_TO_Y8),
    PixelLayout::Gray8,
);
const YUYV: DecodeRule = rule(
    core::CV_8UC2,
    2,
    Conversion::CvtColor(imgproc::COLOR_YUV2BGR_YUYV),
    PixelLayout::Bgr8,
);
const UYVY_GRAY: DecodeRule = rule(
    core::CV_8UC2,
    2,
    Conversion::CvtColor(imgproc::COLOR_YUV2GRAY_UYVY),
    PixelLayout::Gray8,
);

// Depth accepts any recorded format and keeps raw depth units.
const DEPTH: DecodeRule = rule(core::CV_16UC1, 2, Conversion::None, PixelLayout::Gray16);

static DECODE_TABLE: &[(StreamKind, PixelFormat, DecodeRule)] = &[
    (StreamKind::Color, PixelFormat::Rgb8, RGB8),
    (StreamKind::Color, PixelFormat::Rgba8, RGBA8),
    (StreamKind::Color, PixelFormat::Bgr8, BGR8),
    (StreamKind::Color, PixelFormat::Bgra8, BGRA8),
    (StreamKind::Color, PixelFormat::Y16, Y16),
    (StreamKind::Color, PixelFormat::Yuyv, YUYV),
    (StreamKind::Infrared, PixelFormat::Rgb8, RGB8),
    (StreamKind::Infrared, PixelFormat::Rgba8, RGBA8),
    (StreamKind::Infrared, PixelFormat::Bgr8, BGR8),
    (StreamKind::Infrared, PixelFormat::Bgra8, BGRA8),
    (StreamKind::Infrared, PixelFormat::Y8, Y8),
    (StreamKind::Infrared, PixelFormat::Uyvy, UYVY_GRAY),
];

fn lookup(kind: StreamKind, format: PixelFormat) -> Option<DecodeRule> {
    if kind == StreamKind::Depth {
        return Some(DEPTH);
    }
    DECODE_TABLE
        .iter()
        .find(|(k, f, _)| *k == kind && *f == format)
        .map(|(_, _, r)| *r)
}

/// True if frames of this stream kind and format can be decoded.
pub fn is_supported(kind: StreamKind, format: PixelFormat) -> bool {
    lookup(kind, format).is_some()
}

/// Decodes a raw frame into an owned canonical image.
///
/// The raw buffer is copied row by row (dropping any stride padding) so the
/// result does not borrow from the bundle.
pub fn decode(frame: &RawFrame) -> Result<CanonicalImage, DecodeError> {
    let stream = &frame.stream;
    let rule = lookup(stream.kind, stream.format).ok_or_else(|| DecodeError::UnsupportedFormat {
        stream: stream.stream_name(),
        kind: stream.kind,
        format: stream.format,
        encoding: stream.encoding.clone(),
    })?;

    let row_bytes = frame.width as usize * rule.bytes_per_pixel;
    let stride = if frame.stride == 0 { row_bytes } else { frame.stride };
    if frame.width == 0 || frame.height == 0 || stride < row_bytes {
        return Err(DecodeError::InvalidGeometry {
            stream: stream.stream_name(),
            frame_number: frame.frame_number,
            width: frame.width,
            height: frame.height,
            stride: frame.stride,
        });
    }

    let expected = stride * (frame.height as usize - 1) + row_bytes;
    if frame.data.len() < expected {
        return Err(DecodeError::TruncatedFrame {
            stream: stream.stream_name(),
            frame_number: frame.frame_number,
            expected,
            actual: frame.data.len(),
        });
    }

    let mut source = Mat::new_rows_cols_with_default(
        frame.height as i32,
        frame.width as i32,
        rule.source_type,
        Scalar::all(0.0),
    )?;
    {
        let dst = source.data_bytes_mut()?;
        for (row, out) in dst.chunks_exact_mut(row_bytes).enumerate() {
            let start = row * stride;
            out.copy_from_slice(&frame.data[start..start + row_bytes]);
        }
    }

    let mat = match rule.conversion {
        Conversion::None => source,
        Conversion::CvtColor(code) => {
            let mut converted = Mat::default();
            imgproc::cvt_color_def(&source, &mut converted, code)?;
            converted
        }
        Conversion::Scale(alpha) => {
            let mut scaled = Mat::default();
            source.convert_to(&mut scaled, core::CV_8U, alpha, 0.0)?;
            scaled
        }
    };

    Ok(CanonicalImage::new(rule.layout, mat))
}
