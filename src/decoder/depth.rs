use opencv::{core, prelude::*};

use super::format::{CanonicalImage, DecodeError, PixelLayout};
use crate::shared::constants::DEPTH_VISUAL_RANGE;

/// 0 → 255 (near, white), `DEPTH_VISUAL_RANGE` and beyond → 0 (far, black).
pub const DEPTH_ALPHA: f64 = -255.0 / DEPTH_VISUAL_RANGE;
pub const DEPTH_BETA: f64 = 255.0;

/// Maps a 16-bit depth image to an 8-bit grayscale visualization.
/// `convert_to` saturates and rounds half to even.
pub fn rescale_depth(image: &CanonicalImage) -> Result<CanonicalImage, DecodeError> {
    if image.layout() != PixelLayout::Gray16 {
        return Err(DecodeError::NotDepth(image.layout()));
    }

    let mut scaled = core::Mat::default();
    image
        .mat()
        .convert_to(&mut scaled, core::CV_8U, DEPTH_ALPHA, DEPTH_BETA)?;
    Ok(CanonicalImage::new(PixelLayout::Gray8, scaled))
}
