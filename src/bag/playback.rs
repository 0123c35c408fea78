use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::messages::{ImageMessage, StreamInfoMessage};
use super::reader::{BagFile, MessageStream};
use crate::core::source::CaptureSource;
use crate::decoder::format::is_supported;
use crate::decoder::{FrameBundle, PixelFormat, RawFrame, StreamDescriptor, StreamKind};
use crate::utils::logger;

const IMAGE_TYPE: &str = "sensor_msgs/Image";
const STREAM_INFO_TYPE: &str = "realsense_msgs/StreamInfo";

type StreamKey = (StreamKind, u32);

/// Splits `/device_<d>/sensor_<s>/<Name>_<index>/<rest>` into
/// (`Name`, index, `rest`).
fn parse_stream_topic(topic: &str) -> Option<(&str, u32, &str)> {
    let mut parts = topic.strip_prefix('/')?.splitn(4, '/');
    let device = parts.next()?;
    let sensor = parts.next()?;
    let stream = parts.next()?;
    let rest = parts.next()?;
    if !device.starts_with("device_") || !sensor.starts_with("sensor_") {
        return None;
    }
    let (name, index) = stream.rsplit_once('_')?;
    Some((name, index.parse().ok()?, rest))
}

fn image_to_frame(stream: &StreamDescriptor, image: ImageMessage) -> RawFrame {
    let mut stream = stream.clone();
    if image.encoding != stream.encoding {
        stream.format = PixelFormat::from_encoding(&image.encoding);
        stream.encoding = image.encoding.clone();
    }

    let mut data = image.data;
    if stream.format.is_16bit() && image.is_bigendian != cfg!(target_endian = "big") {
        for pair in data.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
    }

    RawFrame::new(stream, image.seq as u64, image.width, image.height, image.step as usize, data)
}

/// Plays a RealSense recording back as frame bundles, as fast as it can be
/// read. Like the camera SDK's repeat playback it loops back to the start at
/// the end of the recording, so the position drops once per pass.
pub struct BagPlayback {
    bag: BagFile,
    streams: Vec<StreamDescriptor>,
    image_connections: HashMap<u32, StreamKey>,
    enabled: HashMap<u32, usize>,
    messages: MessageStream,
    origin: u64,
    pending: Option<(u64, RawFrame)>,
    position: u64,
    pass_start: Option<u64>,
    running: bool,
}

impl BagPlayback {
    pub fn open(path: &Path) -> Result<Self> {
        let bag = BagFile::open(path)?;
        let origin = bag.start_time().unwrap_or(0);
        let length = bag.end_time().unwrap_or(origin).saturating_sub(origin);
        logger::debug(&format!("recording spans {} ms", length / 1_000_000));

        let mut playback = Self {
            bag,
            streams: Vec::new(),
            image_connections: HashMap::new(),
            enabled: HashMap::new(),
            messages: MessageStream::new(),
            origin,
            pending: None,
            position: 0,
            pass_start: None,
            running: false,
        };
        playback
            .discover_streams()
            .with_context(|| format!("failed to discover streams in {}", path.display()))?;
        Ok(playback)
    }

    /// Resolves each image stream's format and size from its first frame.
    fn discover_streams(&mut self) -> Result<()> {
        let mut info_connections: HashMap<u32, StreamKey> = HashMap::new();
        for connection in self.bag.connections() {
            let Some((name, index, rest)) = parse_stream_topic(&connection.topic) else {
                continue;
            };
            let Some(kind) = StreamKind::from_name(name) else {
                if rest == "image/data" {
                    logger::debug(&format!("skipping unsupported stream {}", connection.topic));
                }
                continue;
            };
            match (rest, connection.message_type.as_str()) {
                ("image/data", IMAGE_TYPE) => {
                    self.image_connections.insert(connection.id, (kind, index));
                }
                ("info", STREAM_INFO_TYPE) => {
                    info_connections.insert(connection.id, (kind, index));
                }
                _ => {}
            }
        }

        let wanted: usize = {
            let mut keys: Vec<_> = self.image_connections.values().collect();
            keys.sort();
            keys.dedup();
            keys.len()
        };

        let mut found: BTreeMap<StreamKey, StreamDescriptor> = BTreeMap::new();
        let mut infos: HashMap<StreamKey, StreamInfoMessage> = HashMap::new();
        let mut scan = MessageStream::new();
        while found.len() < wanted {
            let Some(message) = scan.next(&mut self.bag)? else {
                break;
            };
            if let Some(key) = info_connections.get(&message.conn_id) {
                infos.insert(*key, StreamInfoMessage::parse(&message.data)?);
            } else if let Some(key) = self.image_connections.get(&message.conn_id) {
                if found.contains_key(key) {
                    continue;
                }
                let image = ImageMessage::parse(&message.data)?;
                let (kind, index) = *key;
                found.insert(
                    *key,
                    StreamDescriptor::new(kind, index, &image.encoding, image.width, image.height),
                );
            }
        }

        for (key, mut descriptor) in found {
            if let Some(info) = infos.get(&key) {
                descriptor.fps = info.fps;
                if !info.encoding.eq_ignore_ascii_case(&descriptor.encoding) {
                    logger::debug(&format!(
                        "stream {} announced {} but records {}",
                        descriptor.stream_name(),
                        info.encoding,
                        descriptor.encoding
                    ));
                }
            }
            if !is_supported(descriptor.kind, descriptor.format) {
                logger::warn(&format!(
                    "stream {} uses {} which cannot be decoded",
                    descriptor.stream_name(),
                    descriptor.encoding
                ));
            }
            logger::info(&format!(
                "stream {}: {} {}x{} @ {} fps",
                descriptor.stream_name(),
                descriptor.encoding,
                descriptor.width,
                descriptor.height,
                descriptor.fps
            ));
            self.streams.push(descriptor);
        }
        if self.streams.len() < wanted {
            logger::warn("some image streams have no frames and were left out");
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<(u64, RawFrame)>> {
        while let Some(message) = self.messages.next(&mut self.bag)? {
            let Some(&slot) = self.enabled.get(&message.conn_id) else {
                continue;
            };
            let image = ImageMessage::parse(&message.data)?;
            return Ok(Some((message.time, image_to_frame(&self.streams[slot], image))));
        }
        Ok(None)
    }

    /// Loops back to the start. Refuses when a new pass would not be visible
    /// as a drop in position, which would otherwise replay forever.
    fn rewind(&mut self) -> bool {
        let observable = matches!(self.pass_start, Some(start) if self.position > start);
        if observable {
            logger::debug("end of recording, looping back to start");
            self.messages.rewind();
            self.pass_start = None;
        }
        observable
    }

    fn deliver(&mut self, bundle: FrameBundle) -> FrameBundle {
        if self.pass_start.is_none() {
            self.pass_start = Some(bundle.position);
        }
        self.position = bundle.position;
        bundle
    }
}

impl CaptureSource for BagPlayback {
    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn start(&mut self, enabled: &[StreamDescriptor]) -> Result<()> {
        self.enabled.clear();
        for (conn_id, key) in &self.image_connections {
            let Some(slot) = self.streams.iter().position(|s| (s.kind, s.index) == *key) else {
                continue;
            };
            if enabled.iter().any(|s| (s.kind, s.index) == *key) {
                self.enabled.insert(*conn_id, slot);
            }
        }
        if self.enabled.is_empty() {
            anyhow::bail!(
                "no color, depth or infrared stream to play back in {}",
                self.bag.path().display()
            );
        }

        self.messages.rewind();
        self.pending = None;
        self.position = 0;
        self.pass_start = None;
        self.running = true;
        Ok(())
    }

    fn next_bundle(&mut self) -> Result<Option<FrameBundle>> {
        if !self.running {
            anyhow::bail!("playback has not been started");
        }

        let mut bundle: Option<FrameBundle> = None;
        loop {
            let next = match self.pending.take() {
                Some(timed) => Some(timed),
                None => self.next_frame()?,
            };
            let Some((time, frame)) = next else {
                if bundle.is_some() {
                    break;
                }
                if !self.rewind() {
                    return Ok(None);
                }
                continue;
            };

            match bundle {
                None => {
                    let mut started = FrameBundle::new(time.saturating_sub(self.origin));
                    started.frames.push(frame);
                    bundle = Some(started);
                }
                Some(ref mut current) => {
                    // a second frame of the same stream belongs to the next instant
                    if current.contains(frame.stream.kind, frame.stream.index) {
                        self.pending = Some((time, frame));
                        break;
                    }
                    current.frames.push(frame);
                }
            }
        }

        Ok(bundle.map(|b| self.deliver(b)))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn stop(&mut self) {
        self.running = false;
        self.pending = None;
        self.messages.rewind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::test_support::{image_message, BagBuilder, IMAGE_TYPE as TEST_IMAGE_TYPE};

    const MS: u64 = 1_000_000;

    fn write(builder: &BagBuilder) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.bag");
        builder.write_to(&path);
        (dir, path)
    }

    /// Color + depth at 0, 33 and 66 ms, infrared only at 33 ms.
    fn three_instants() -> BagBuilder {
        let mut b = BagBuilder::new().compression("lz4").messages_per_chunk(3);
        let depth = b.stream("Depth", 0, 30, "Z16");
        let color = b.stream("Color", 0, 30, "RGB8");
        let infrared = b.stream("Infrared", 1, 30, "Y8");
        let fisheye = b.connection("/device_0/sensor_2/Fisheye_0/image/data", TEST_IMAGE_TYPE);
        for (i, t) in [0, 33 * MS, 66 * MS].into_iter().enumerate() {
            let seq = i as u32 + 1;
            b.image(depth, t, seq, 2, 1, "Z16", &[1, 0, 2, 0]);
            b.image(color, t, seq + 100, 1, 1, "RGB8", &[1, 2, 3]);
            if i == 1 {
                b.image(infrared, t, seq + 200, 2, 1, "Y8", &[5, 6]);
            }
            b.image(fisheye, t, seq, 1, 1, "Y8", &[0]);
        }
        b
    }

    #[test]
    fn test_parse_stream_topic() {
        assert_eq!(
            parse_stream_topic("/device_0/sensor_1/Color_0/image/data"),
            Some(("Color", 0, "image/data"))
        );
        assert_eq!(
            parse_stream_topic("/device_0/sensor_0/Infrared_2/info"),
            Some(("Infrared", 2, "info"))
        );
        assert_eq!(parse_stream_topic("/file_version"), None);
        assert_eq!(parse_stream_topic("/device_0/info"), None);
    }

    #[test]
    fn test_discovers_streams_in_order() {
        let (_dir, path) = write(&three_instants());
        let playback = BagPlayback::open(&path).unwrap();
        let streams = playback.streams();

        let names: Vec<_> = streams.iter().map(|s| s.stream_name()).collect();
        assert_eq!(names, vec!["Color", "Depth", "Infrared 1"]);
        assert_eq!(streams[0].format, PixelFormat::Rgb8);
        assert_eq!((streams[1].width, streams[1].height), (2, 1));
        assert_eq!(streams[1].format, PixelFormat::Z16);
        assert_eq!(streams[2].fps, 30);
    }

    #[test]
    fn test_bundles_group_frames_by_instant() {
        let (_dir, path) = write(&three_instants());
        let mut playback = BagPlayback::open(&path).unwrap();
        let streams = playback.streams().to_vec();
        playback.start(&streams).unwrap();
        assert_eq!(playback.position(), 0);

        let first = playback.next_bundle().unwrap().unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(first.frames.len(), 2);
        assert!(first.contains(StreamKind::Color, 0));
        assert!(first.contains(StreamKind::Depth, 0));

        let second = playback.next_bundle().unwrap().unwrap();
        assert_eq!(second.position, 33 * MS);
        assert_eq!(playback.position(), 33 * MS);
        assert_eq!(second.frames.len(), 3);
        let ir = second.frames.iter().find(|f| f.stream.kind == StreamKind::Infrared).unwrap();
        assert_eq!(ir.frame_number, 202);
        assert_eq!(ir.data, vec![5, 6]);

        let third = playback.next_bundle().unwrap().unwrap();
        assert_eq!(third.position, 66 * MS);
        assert!(!third.contains(StreamKind::Infrared, 1));
    }

    #[test]
    fn test_loops_back_at_end_of_recording() {
        let (_dir, path) = write(&three_instants());
        let mut playback = BagPlayback::open(&path).unwrap();
        let streams = playback.streams().to_vec();
        playback.start(&streams).unwrap();

        let mut positions = Vec::new();
        for _ in 0..4 {
            positions.push(playback.next_bundle().unwrap().unwrap().position);
        }
        assert_eq!(positions, vec![0, 33 * MS, 66 * MS, 0]);
        assert_eq!(playback.position(), 0);
    }

    #[test]
    fn test_enabled_subset_only() {
        let (_dir, path) = write(&three_instants());
        let mut playback = BagPlayback::open(&path).unwrap();
        let depth: Vec<_> = playback
            .streams()
            .iter()
            .filter(|s| s.kind == StreamKind::Depth)
            .cloned()
            .collect();
        playback.start(&depth).unwrap();

        let bundle = playback.next_bundle().unwrap().unwrap();
        assert_eq!(bundle.frames.len(), 1);
        assert_eq!(bundle.frames[0].stream.kind, StreamKind::Depth);
        assert_eq!(bundle.frames[0].frame_number, 1);
    }

    #[test]
    fn test_single_instant_recording_ends() {
        let mut b = BagBuilder::new();
        let color = b.stream("Color", 0, 30, "BGR8");
        b.image(color, 5 * MS, 1, 1, 1, "BGR8", &[1, 2, 3]);
        let (_dir, path) = write(&b);

        let mut playback = BagPlayback::open(&path).unwrap();
        let streams = playback.streams().to_vec();
        playback.start(&streams).unwrap();
        assert!(playback.next_bundle().unwrap().is_some());
        assert!(playback.next_bundle().unwrap().is_none());
    }

    #[test]
    fn test_recording_without_images_cannot_start() {
        let mut b = BagBuilder::new();
        b.stream("Color", 0, 30, "BGR8");
        let (_dir, path) = write(&b);

        let mut playback = BagPlayback::open(&path).unwrap();
        assert!(playback.streams().is_empty());
        assert!(playback.start(&[]).is_err());
    }

    #[test]
    fn test_next_bundle_requires_start() {
        let (_dir, path) = write(&three_instants());
        let mut playback = BagPlayback::open(&path).unwrap();
        assert!(playback.next_bundle().is_err());
    }

    #[test]
    fn test_big_endian_depth_is_swapped() {
        let mut b = BagBuilder::new();
        let depth = b.stream("Depth", 0, 30, "Z16");
        let value: u16 = 0x1234;
        b.message(depth, 0, image_message(9, 1, 1, "Z16", true, 2, &value.to_be_bytes()));
        let (_dir, path) = write(&b);

        let mut playback = BagPlayback::open(&path).unwrap();
        let streams = playback.streams().to_vec();
        playback.start(&streams).unwrap();
        let bundle = playback.next_bundle().unwrap().unwrap();
        assert_eq!(bundle.frames[0].data, value.to_ne_bytes().to_vec());
    }
}
