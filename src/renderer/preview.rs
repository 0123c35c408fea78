use anyhow::Result;
use opencv::highgui;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::decoder::CanonicalImage;
use crate::shared::constants;

/// On-screen preview plus the manual quit poll, kept apart from the
/// conversion loop so the loop runs without any windowing system.
pub trait PreviewSink {
    fn show(&mut self, name: &str, image: &CanonicalImage) -> Result<()>;

    /// Checked once per loop iteration.
    fn poll_quit(&mut self) -> Result<bool>;

    fn close(&mut self) -> Result<()>;

    /// False when `show` discards its input, so callers can skip preview-only work.
    fn is_visible(&self) -> bool {
        true
    }
}

/// No windows. Quit only through the shared flag (Ctrl+C).
pub struct HeadlessPreview {
    quit: Arc<AtomicBool>,
}

impl HeadlessPreview {
    pub fn new(quit: Arc<AtomicBool>) -> Self {
        Self { quit }
    }
}

impl PreviewSink for HeadlessPreview {
    fn show(&mut self, _name: &str, _image: &CanonicalImage) -> Result<()> {
        Ok(())
    }

    fn poll_quit(&mut self) -> Result<bool> {
        Ok(self.quit.load(Ordering::SeqCst))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_visible(&self) -> bool {
        false
    }
}

/// One OpenCV highgui window per stream. `q` in any window quits.
pub struct WindowPreview {
    quit: Arc<AtomicBool>,
    opened: bool,
}

impl WindowPreview {
    pub fn new(quit: Arc<AtomicBool>) -> Self {
        Self { quit, opened: false }
    }
}

impl PreviewSink for WindowPreview {
    fn show(&mut self, name: &str, image: &CanonicalImage) -> Result<()> {
        if image.is_empty() {
            return Ok(());
        }
        highgui::imshow(name, image.mat())?;
        self.opened = true;
        Ok(())
    }

    fn poll_quit(&mut self) -> Result<bool> {
        // wait_key also pumps the window event loop
        let key = highgui::wait_key(constants::PREVIEW_WAIT_MS)?;
        if key == constants::QUIT_KEY as i32 {
            self.quit.store(true, Ordering::SeqCst);
        }
        Ok(self.quit.load(Ordering::SeqCst))
    }

    fn close(&mut self) -> Result<()> {
        if self.opened {
            highgui::destroy_all_windows()?;
            self.opened = false;
        }
        Ok(())
    }
}
