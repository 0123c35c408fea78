pub mod depth;
pub mod format;
pub mod frame_data;

pub use depth::rescale_depth;
pub use format::{decode, CanonicalImage, DecodeError, PixelLayout};
pub use frame_data::{FrameBundle, PixelFormat, RawFrame, StreamDescriptor, StreamKind};
