mod bag;
mod core;
mod decoder;
mod renderer;
mod shared;
mod utils;

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::core::options::ConversionOptions;
use crate::core::session;
use crate::shared::constants;
use crate::utils::logger;

/// Convert a RealSense .bag recording into per-frame images
/// (Color and Infrared as JPEG, Depth as PNG).
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the input .bag file
    #[arg(short, long)]
    bag: PathBuf,

    /// Write depth as an 8-bit visualization (0..10m mapped to 255..0)
    #[arg(
        short,
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    scaling: bool,

    /// JPEG quality for Color and Infrared, clamped to 0..100
    #[arg(
        short,
        long,
        default_value_t = constants::DEFAULT_JPEG_QUALITY,
        allow_negative_numbers = true
    )]
    quality: i32,

    /// Show a preview window per stream; press q in one to quit
    #[arg(
        short,
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    display: bool,
}

impl Cli {
    fn options(&self) -> Result<ConversionOptions> {
        ConversionOptions::new(&self.bag, self.scaling, self.quality, self.display)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // Bad arguments abort before the log files are touched
    let options = cli.options()?;

    logger::init();

    let result = session::run_conversion(&options);
    if let Err(e) = &result {
        logger::error(&format!("{:#}", e));
    }
    result.map(|_| ())
}
