use anyhow::{anyhow, Context, Result};
use opencv::{
    core::{Mat, Vector},
    imgcodecs,
    prelude::*,
};
use std::fs;
use std::path::{Path, PathBuf};

use crate::decoder::{rescale_depth, CanonicalImage, StreamKind};
use crate::utils::file_utils;

/// Persists decoded images under `<root>/<StreamName>/<frame:06>.<ext>`.
/// Color and infrared go out as JPEG, depth as PNG.
pub struct ImageWriter {
    root: PathBuf,
    jpeg_params: Vector<i32>,
    scaling: bool,
}

impl ImageWriter {
    pub fn new(root: impl Into<PathBuf>, jpeg_quality: i32, scaling: bool) -> Self {
        Self {
            root: root.into(),
            jpeg_params: Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, jpeg_quality]),
            scaling,
        }
    }

    pub fn write_color(&self, image: &CanonicalImage, frame_number: u64) -> Result<PathBuf> {
        let path = file_utils::output_path(&self.root, StreamKind::Color, 0, frame_number);
        write_image(&path, image.mat(), &self.jpeg_params)?;
        Ok(path)
    }

    /// Writes raw 16-bit depth, or the 8-bit visualization when scaling is on.
    pub fn write_depth(&self, image: &CanonicalImage, frame_number: u64) -> Result<PathBuf> {
        let path = file_utils::output_path(&self.root, StreamKind::Depth, 0, frame_number);
        if self.scaling {
            let scaled = rescale_depth(image)?;
            write_image(&path, scaled.mat(), &Vector::new())?;
        } else {
            write_image(&path, image.mat(), &Vector::new())?;
        }
        Ok(path)
    }

    pub fn write_infrared(
        &self,
        image: &CanonicalImage,
        stream_index: u32,
        frame_number: u64,
    ) -> Result<PathBuf> {
        let path =
            file_utils::output_path(&self.root, StreamKind::Infrared, stream_index, frame_number);
        write_image(&path, image.mat(), &self.jpeg_params)?;
        Ok(path)
    }
}

fn write_image(path: &Path, mat: &Mat, params: &Vector<i32>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let filename = path
        .to_str()
        .ok_or_else(|| anyhow!("output path is not valid UTF-8: {}", path.display()))?;
    let written = imgcodecs::imwrite(filename, mat, params)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    if !written {
        anyhow::bail!("OpenCV refused to write {}", path.display());
    }
    Ok(())
}
