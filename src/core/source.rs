use anyhow::Result;

use crate::decoder::{FrameBundle, StreamDescriptor};

/// Recorded session that yields synchronized frame bundles.
pub trait CaptureSource {
    /// Streams found when the recording was opened, ordered by kind and index.
    fn streams(&self) -> &[StreamDescriptor];

    /// Enables the given streams and restarts playback from the beginning,
    /// as fast as frames can be read.
    fn start(&mut self, enabled: &[StreamDescriptor]) -> Result<()>;

    /// Blocks until the next bundle is available. `None` means the source
    /// cannot produce any more bundles.
    fn next_bundle(&mut self) -> Result<Option<FrameBundle>>;

    /// Non-decreasing within one pass over the recording; drops when playback
    /// loops back to the start.
    fn position(&self) -> u64;

    fn stop(&mut self);
}
