use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::decoder::frame_data::{stream_name, StreamKind};
use crate::shared::constants;

/// Checks that `path` names an existing regular file with the `.bag` extension.
pub fn validate_bag_path(path: &Path) -> Result<PathBuf> {
    let is_bag = path
        .extension()
        .map_or(false, |ext| ext == constants::BAG_EXTENSION);
    if !path.is_file() || !is_bag {
        anyhow::bail!("failed can't find input bag file: {}", path.display());
    }
    Ok(path.to_path_buf())
}

/// `<parent>/<stem>` of the input recording.
pub fn output_root(bag_path: &Path) -> PathBuf {
    let parent = bag_path.parent().unwrap_or_else(|| Path::new(""));
    let stem = bag_path.file_stem().unwrap_or_default();
    parent.join(stem)
}

pub fn extension_for(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Color => constants::COLOR_EXTENSION,
        StreamKind::Depth => constants::DEPTH_EXTENSION,
        StreamKind::Infrared => constants::INFRARED_EXTENSION,
    }
}

pub fn frame_file_name(frame_number: u64, extension: &str) -> String {
    format!(
        "{:0width$}.{}",
        frame_number,
        extension,
        width = constants::FRAME_NUMBER_WIDTH
    )
}

/// `<root>/<StreamName>/<frame:06>.<ext>`
pub fn output_path(root: &Path, kind: StreamKind, stream_index: u32, frame_number: u64) -> PathBuf {
    root.join(stream_name(kind, stream_index))
        .join(frame_file_name(frame_number, extension_for(kind)))
}

/// Creates the root directory and one sub directory per stream name.
/// Existing directories are kept.
pub fn create_output_dirs<S: AsRef<str>>(root: &Path, stream_names: &[S]) -> Result<()> {
    fs::create_dir_all(root)
        .with_context(|| format!("failed can't create root directory: {}", root.display()))?;

    for name in stream_names {
        let sub_directory = root.join(name.as_ref());
        fs::create_dir_all(&sub_directory)
            .with_context(|| format!("Failed to create directory: {}", sub_directory.display()))?;
    }
    Ok(())
}
