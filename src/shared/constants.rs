pub const APP_NAME: &str = "rs_bag2image";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "debug.log";

pub const BAG_EXTENSION: &str = "bag";
pub const COLOR_EXTENSION: &str = "jpg";
pub const DEPTH_EXTENSION: &str = "png";
pub const INFRARED_EXTENSION: &str = "jpg";

pub const DEFAULT_JPEG_QUALITY: i32 = 95;
pub const MIN_JPEG_QUALITY: i32 = 0;
pub const MAX_JPEG_QUALITY: i32 = 100;

/// Frame numbers are zero padded to this many digits in file names.
pub const FRAME_NUMBER_WIDTH: usize = 6;

/// Depth values at or beyond this (in depth units, typically mm) render black.
pub const DEPTH_VISUAL_RANGE: f64 = 10000.0;

/// At most two infrared imagers are tracked per bundle.
pub const INFRARED_SLOTS: usize = 2;

pub const QUIT_KEY: char = 'q';
pub const PREVIEW_WAIT_MS: i32 = 1;
