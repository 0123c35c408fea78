//! Builds small in-memory bag recordings for tests.

use std::io::Write;
use std::path::Path;

use super::record::{
    BAG_MAGIC, OP_BAG_HEADER, OP_CHUNK, OP_CHUNK_INFO, OP_CONNECTION, OP_MESSAGE_DATA,
};

pub const IMAGE_TYPE: &str = "sensor_msgs/Image";
pub const STREAM_INFO_TYPE: &str = "realsense_msgs/StreamInfo";

pub fn encode_time(nanos: u64) -> Vec<u8> {
    let mut out = ((nanos / 1_000_000_000) as u32).to_le_bytes().to_vec();
    out.extend(((nanos % 1_000_000_000) as u32).to_le_bytes());
    out
}

pub fn encode_header(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in fields {
        out.extend(((name.len() + 1 + value.len()) as u32).to_le_bytes());
        out.extend(name.as_bytes());
        out.push(b'=');
        out.extend(value);
    }
    out
}

pub fn encode_record(fields: &[(&str, Vec<u8>)], data: &[u8]) -> Vec<u8> {
    let header = encode_header(fields);
    let mut out = (header.len() as u32).to_le_bytes().to_vec();
    out.extend(header);
    out.extend((data.len() as u32).to_le_bytes());
    out.extend(data);
    out
}

fn ros_string(out: &mut Vec<u8>, value: &str) {
    out.extend((value.len() as u32).to_le_bytes());
    out.extend(value.as_bytes());
}

/// Serialized `sensor_msgs/Image`.
pub fn image_message(
    seq: u32,
    width: u32,
    height: u32,
    encoding: &str,
    big_endian: bool,
    step: u32,
    data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(seq.to_le_bytes());
    out.extend(encode_time(0));
    ros_string(&mut out, "0");
    out.extend(height.to_le_bytes());
    out.extend(width.to_le_bytes());
    ros_string(&mut out, encoding);
    out.push(big_endian as u8);
    out.extend(step.to_le_bytes());
    out.extend((data.len() as u32).to_le_bytes());
    out.extend(data);
    out
}

/// Serialized `realsense_msgs/StreamInfo`.
pub fn stream_info_message(fps: u32, encoding: &str) -> Vec<u8> {
    let mut out = fps.to_le_bytes().to_vec();
    ros_string(&mut out, encoding);
    out.push(1);
    out
}

pub fn image_topic(sensor: u32, name: &str, index: u32) -> String {
    format!("/device_0/sensor_{}/{}_{}/image/data", sensor, name, index)
}

pub fn info_topic(sensor: u32, name: &str, index: u32) -> String {
    format!("/device_0/sensor_{}/{}_{}/info", sensor, name, index)
}

struct Connection {
    id: u32,
    topic: String,
    message_type: String,
}

struct Message {
    conn: u32,
    time: u64,
    data: Vec<u8>,
}

pub struct BagBuilder {
    connections: Vec<Connection>,
    messages: Vec<Message>,
    compression: &'static str,
    messages_per_chunk: usize,
    indexed: bool,
}

impl BagBuilder {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            messages: Vec::new(),
            compression: "none",
            messages_per_chunk: 4,
            indexed: true,
        }
    }

    pub fn compression(mut self, compression: &'static str) -> Self {
        self.compression = compression;
        self
    }

    pub fn messages_per_chunk(mut self, count: usize) -> Self {
        self.messages_per_chunk = count.max(1);
        self
    }

    pub fn unindexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    pub fn connection(&mut self, topic: &str, message_type: &str) -> u32 {
        let id = self.connections.len() as u32;
        self.connections.push(Connection {
            id,
            topic: topic.to_string(),
            message_type: message_type.to_string(),
        });
        id
    }

    /// Adds `<Name>_<index>` image and info connections, returns the image connection.
    pub fn stream(&mut self, name: &str, index: u32, fps: u32, encoding: &str) -> u32 {
        let sensor = if name == "Color" { 1 } else { 0 };
        let info = self.connection(&info_topic(sensor, name, index), STREAM_INFO_TYPE);
        self.message(info, 0, stream_info_message(fps, encoding));
        self.connection(&image_topic(sensor, name, index), IMAGE_TYPE)
    }

    pub fn message(&mut self, conn: u32, time: u64, data: Vec<u8>) {
        self.messages.push(Message { conn, time, data });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn image(
        &mut self,
        conn: u32,
        time: u64,
        seq: u32,
        width: u32,
        height: u32,
        encoding: &str,
        data: &[u8],
    ) {
        let step = if height == 0 { 0 } else { data.len() as u32 / height };
        self.message(conn, time, image_message(seq, width, height, encoding, false, step, data));
    }

    fn connection_record(&self, conn: &Connection) -> Vec<u8> {
        let data = encode_header(&[
            ("topic", conn.topic.as_bytes().to_vec()),
            ("type", conn.message_type.as_bytes().to_vec()),
            ("md5sum", b"*".to_vec()),
        ]);
        encode_record(
            &[
                ("op", vec![OP_CONNECTION]),
                ("conn", conn.id.to_le_bytes().to_vec()),
                ("topic", conn.topic.as_bytes().to_vec()),
            ],
            &data,
        )
    }

    fn compress(&self, data: Vec<u8>) -> Vec<u8> {
        match self.compression {
            "lz4" => {
                let mut encoder = lz4::EncoderBuilder::new().build(Vec::new()).unwrap();
                encoder.write_all(&data).unwrap();
                let (out, result) = encoder.finish();
                result.unwrap();
                out
            }
            _ => data,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let bag_header = |index_pos: u64| {
            encode_record(
                &[
                    ("op", vec![OP_BAG_HEADER]),
                    ("index_pos", index_pos.to_le_bytes().to_vec()),
                    ("conn_count", (self.connections.len() as u32).to_le_bytes().to_vec()),
                    ("chunk_count", 0u32.to_le_bytes().to_vec()),
                ],
                &[b' '; 16],
            )
        };
        let body_start = (BAG_MAGIC.len() + bag_header(0).len()) as u64;

        let mut body = Vec::new();
        let mut chunk_infos = Vec::new();
        for group in self.messages.chunks(self.messages_per_chunk) {
            let mut inner = Vec::new();
            for conn in &self.connections {
                if group.iter().any(|m| m.conn == conn.id) {
                    inner.extend(self.connection_record(conn));
                }
            }
            for message in group {
                inner.extend(encode_record(
                    &[
                        ("op", vec![OP_MESSAGE_DATA]),
                        ("conn", message.conn.to_le_bytes().to_vec()),
                        ("time", encode_time(message.time)),
                    ],
                    &message.data,
                ));
            }

            let chunk_pos = body_start + body.len() as u64;
            let size = inner.len() as u32;
            body.extend(encode_record(
                &[
                    ("op", vec![OP_CHUNK]),
                    ("compression", self.compression.as_bytes().to_vec()),
                    ("size", size.to_le_bytes().to_vec()),
                ],
                &self.compress(inner),
            ));

            let start = group.iter().map(|m| m.time).min().unwrap_or(0);
            let end = group.iter().map(|m| m.time).max().unwrap_or(0);
            chunk_infos.push(encode_record(
                &[
                    ("op", vec![OP_CHUNK_INFO]),
                    ("ver", 1u32.to_le_bytes().to_vec()),
                    ("chunk_pos", chunk_pos.to_le_bytes().to_vec()),
                    ("start_time", encode_time(start)),
                    ("end_time", encode_time(end)),
                    ("count", 0u32.to_le_bytes().to_vec()),
                ],
                &[],
            ));
        }

        let index_pos = if self.indexed { body_start + body.len() as u64 } else { 0 };
        let mut out = BAG_MAGIC.to_vec();
        out.extend(bag_header(index_pos));
        out.extend(body);
        if self.indexed {
            for conn in &self.connections {
                out.extend(self.connection_record(conn));
            }
            for info in chunk_infos {
                out.extend(info);
            }
        }
        out
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}
