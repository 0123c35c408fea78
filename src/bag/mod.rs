//! Reader for RealSense `.bag` recordings (ROS bag format v2.0).

pub mod messages;
pub mod playback;
pub mod reader;
pub mod record;

#[cfg(test)]
pub mod test_support;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use playback::BagPlayback;

#[derive(Debug, Error)]
pub enum BagError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("recording not found: {0}")]
    NotFound(PathBuf),

    #[error("not a ROS bag v2.0 recording: {0}")]
    NotARecording(PathBuf),

    #[error("recording {0} has no index, it was probably not closed properly")]
    Unindexed(PathBuf),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("record is missing field '{0}'")]
    MissingField(String),

    #[error("unsupported chunk compression '{0}'")]
    UnsupportedCompression(String),
}
