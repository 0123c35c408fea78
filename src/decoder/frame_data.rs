use std::fmt;

/// Category of sensor output, each with its own formats and output policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    Color,
    Depth,
    Infrared,
}

impl StreamKind {
    /// Maps the stream name used in recording topics (`Color_0`, `Infrared_1`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Color" => Some(StreamKind::Color),
            "Depth" => Some(StreamKind::Depth),
            "Infrared" => Some(StreamKind::Infrared),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Color => "Color",
            StreamKind::Depth => "Depth",
            StreamKind::Infrared => "Infrared",
        }
    }
}

/// Pixel formats a depth camera recording may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Z16,
    Disparity16,
    Y8,
    Y16,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Yuyv,
    Uyvy,
    Raw8,
    Raw10,
    Raw16,
    Mjpeg,
    Unknown,
}

impl PixelFormat {
    /// Parses either a RealSense format name (`Z16`, `RGB8`, ...) or a legacy
    /// ROS image encoding (`mono16`, `rgb8`, `yuv422`, ...).
    pub fn from_encoding(encoding: &str) -> Self {
        match encoding.trim().to_ascii_uppercase().as_str() {
            "Z16" | "MONO16" => PixelFormat::Z16,
            "DISPARITY16" => PixelFormat::Disparity16,
            "Y8" | "8UC1" => PixelFormat::Y8,
            "Y16" | "16UC1" => PixelFormat::Y16,
            "RGB8" => PixelFormat::Rgb8,
            "BGR8" => PixelFormat::Bgr8,
            "RGBA8" => PixelFormat::Rgba8,
            "BGRA8" => PixelFormat::Bgra8,
            "YUYV" | "YUV422_YUY2" => PixelFormat::Yuyv,
            // ROS yuv422 is UYVY byte order
            "UYVY" | "YUV422" => PixelFormat::Uyvy,
            "RAW8" | "MONO8" => PixelFormat::Raw8,
            "RAW10" => PixelFormat::Raw10,
            "RAW16" => PixelFormat::Raw16,
            "MJPEG" => PixelFormat::Mjpeg,
            _ => PixelFormat::Unknown,
        }
    }

    /// True for formats stored as one 16-bit word per pixel.
    pub fn is_16bit(&self) -> bool {
        matches!(
            self,
            PixelFormat::Z16 | PixelFormat::Disparity16 | PixelFormat::Y16 | PixelFormat::Raw16
        )
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Z16 => "Z16",
            PixelFormat::Disparity16 => "DISPARITY16",
            PixelFormat::Y8 => "Y8",
            PixelFormat::Y16 => "Y16",
            PixelFormat::Rgb8 => "RGB8",
            PixelFormat::Bgr8 => "BGR8",
            PixelFormat::Rgba8 => "RGBA8",
            PixelFormat::Bgra8 => "BGRA8",
            PixelFormat::Yuyv => "YUYV",
            PixelFormat::Uyvy => "UYVY",
            PixelFormat::Raw8 => "RAW8",
            PixelFormat::Raw10 => "RAW10",
            PixelFormat::Raw16 => "RAW16",
            PixelFormat::Mjpeg => "MJPEG",
            PixelFormat::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Description of one recorded stream, fixed once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub kind: StreamKind,
    pub index: u32,
    pub format: PixelFormat,
    /// Encoding text exactly as found in the recording.
    pub encoding: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl StreamDescriptor {
    pub fn new(kind: StreamKind, index: u32, encoding: &str, width: u32, height: u32) -> Self {
        Self {
            kind,
            index,
            format: PixelFormat::from_encoding(encoding),
            encoding: encoding.to_string(),
            width,
            height,
            fps: 0,
        }
    }

    /// Display name, also used as the output directory name:
    /// `Color`, `Depth`, `Infrared` for index 0 and `Infrared N` otherwise.
    pub fn stream_name(&self) -> String {
        stream_name(self.kind, self.index)
    }
}

pub fn stream_name(kind: StreamKind, index: u32) -> String {
    match kind {
        StreamKind::Infrared if index != 0 => format!("{} {}", kind.name(), index),
        _ => kind.name().to_string(),
    }
}

/// A single frame as stored in the recording, still in its source format.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub stream: StreamDescriptor,
    pub frame_number: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, may exceed `width * bytes_per_pixel`.
    pub stride: usize,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(
        stream: StreamDescriptor,
        frame_number: u64,
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<u8>,
    ) -> Self {
        Self { stream, frame_number, width, height, stride, data }
    }
}

/// Frames of all enabled streams that belong to one instant of the recording.
#[derive(Debug, Clone, Default)]
pub struct FrameBundle {
    /// Playback position at which the bundle was produced.
    pub position: u64,
    pub frames: Vec<RawFrame>,
}

impl FrameBundle {
    pub fn new(position: u64) -> Self {
        Self { position, frames: Vec::new() }
    }

    pub fn contains(&self, kind: StreamKind, index: u32) -> bool {
        self.frames
            .iter()
            .any(|f| f.stream.kind == kind && f.stream.index == index)
    }
}
