pub mod preview;

pub use preview::{HeadlessPreview, PreviewSink, WindowPreview};
