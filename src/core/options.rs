use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::shared::constants;
use crate::utils::file_utils;

/// Validated settings for one conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    pub bag_path: PathBuf,
    /// Write depth as the 8-bit visualization instead of raw 16-bit.
    pub scaling: bool,
    pub jpeg_quality: i32,
    pub display: bool,
}

impl ConversionOptions {
    /// Fails before any I/O when the recording is missing or not a `.bag`.
    pub fn new(bag_path: &Path, scaling: bool, jpeg_quality: i32, display: bool) -> Result<Self> {
        Ok(Self {
            bag_path: file_utils::validate_bag_path(bag_path)?,
            scaling,
            jpeg_quality: clamp_quality(jpeg_quality),
            display,
        })
    }

    pub fn output_root(&self) -> PathBuf {
        file_utils::output_root(&self.bag_path)
    }
}

pub fn clamp_quality(quality: i32) -> i32 {
    quality.clamp(constants::MIN_JPEG_QUALITY, constants::MAX_JPEG_QUALITY)
}
