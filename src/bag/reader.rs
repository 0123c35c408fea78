use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::record::{
    read_record, Record, RecordHeader, BAG_MAGIC, OP_BAG_HEADER, OP_CHUNK, OP_CHUNK_INFO,
    OP_CONNECTION, OP_MESSAGE_DATA,
};
use super::BagError;
use crate::utils::logger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: u32,
    pub topic: String,
    pub message_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub position: u64,
    pub start_time: u64,
    pub end_time: u64,
}

/// One message-data record.
#[derive(Debug, Clone)]
pub struct Message {
    pub conn_id: u32,
    /// Nanoseconds.
    pub time: u64,
    pub data: Vec<u8>,
}

/// An opened, indexed bag file.
pub struct BagFile {
    path: PathBuf,
    reader: BufReader<File>,
    connections: BTreeMap<u32, Connection>,
    chunks: Vec<ChunkInfo>,
}

impl BagFile {
    pub fn open(path: &Path) -> Result<Self, BagError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BagError::NotFound(path.to_path_buf()),
            _ => BagError::Io(e),
        })?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 13];
        if reader.read_exact(&mut magic).is_err() || magic != BAG_MAGIC {
            return Err(BagError::NotARecording(path.to_path_buf()));
        }

        let header = match read_record(&mut reader) {
            Ok(Some(record)) if record.op().ok() == Some(OP_BAG_HEADER) => record.header,
            _ => return Err(BagError::NotARecording(path.to_path_buf())),
        };
        let index_pos = header.u64("index_pos")?;
        if index_pos == 0 {
            return Err(BagError::Unindexed(path.to_path_buf()));
        }

        let mut bag = Self {
            path: path.to_path_buf(),
            reader,
            connections: BTreeMap::new(),
            chunks: Vec::new(),
        };
        bag.read_index(index_pos)?;

        logger::debug(&format!(
            "opened {}: {} connections, {} chunks",
            bag.path.display(),
            bag.connections.len(),
            bag.chunks.len()
        ));
        Ok(bag)
    }

    fn read_index(&mut self, index_pos: u64) -> Result<(), BagError> {
        self.reader.seek(SeekFrom::Start(index_pos))?;
        while let Some(record) = read_record(&mut self.reader)? {
            match record.op()? {
                OP_CONNECTION => {
                    let connection = parse_connection(&record)?;
                    self.connections.insert(connection.id, connection);
                }
                OP_CHUNK_INFO => self.chunks.push(ChunkInfo {
                    position: record.header.u64("chunk_pos")?,
                    start_time: record.header.time("start_time")?,
                    end_time: record.header.time("end_time")?,
                }),
                _ => {}
            }
        }
        self.chunks.sort_by_key(|c| c.position);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Time of the earliest chunk, in nanoseconds.
    pub fn start_time(&self) -> Option<u64> {
        self.chunks.iter().map(|c| c.start_time).min()
    }

    pub fn end_time(&self) -> Option<u64> {
        self.chunks.iter().map(|c| c.end_time).max()
    }

    /// Loads and decompresses the records held by chunk `index`.
    fn read_chunk(&mut self, index: usize) -> Result<Vec<u8>, BagError> {
        let position = self.chunks[index].position;
        self.reader.seek(SeekFrom::Start(position))?;
        let record = read_record(&mut self.reader)?
            .ok_or_else(|| BagError::MalformedRecord(format!("no chunk at offset {}", position)))?;
        if record.op()? != OP_CHUNK {
            return Err(BagError::MalformedRecord(format!(
                "record at offset {} is not a chunk",
                position
            )));
        }
        let compression = record.header.string("compression")?;
        let size = record.header.u32("size")?;
        decompress(&compression, record.data, size)
    }
}

fn parse_connection(record: &Record) -> Result<Connection, BagError> {
    let details = RecordHeader::parse(&record.data)?;
    let message_type = if details.has("type") {
        details.string("type")?
    } else {
        String::new()
    };
    Ok(Connection {
        id: record.header.u32("conn")?,
        topic: record.header.string("topic")?,
        message_type,
    })
}

fn decompress(compression: &str, data: Vec<u8>, size: u32) -> Result<Vec<u8>, BagError> {
    match compression {
        "none" => Ok(data),
        "lz4" => {
            let decoder = lz4::Decoder::new(Cursor::new(data))?;
            // one byte past `size` is enough to tell the header lied
            let mut out = Vec::new();
            decoder.take(size as u64 + 1).read_to_end(&mut out)?;
            if out.len() != size as usize {
                return Err(BagError::MalformedRecord(format!(
                    "lz4 chunk decompressed to {} bytes, header says {}",
                    out.len(),
                    size
                )));
            }
            Ok(out)
        }
        other => Err(BagError::UnsupportedCompression(other.to_string())),
    }
}

/// Walks message records chunk by chunk in file order.
#[derive(Default)]
pub struct MessageStream {
    next_chunk: usize,
    current: Option<Cursor<Vec<u8>>>,
}

impl MessageStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rewind(&mut self) {
        self.next_chunk = 0;
        self.current = None;
    }

    pub fn next(&mut self, bag: &mut BagFile) -> Result<Option<Message>, BagError> {
        loop {
            if let Some(cursor) = self.current.as_mut() {
                match read_record(cursor)? {
                    Some(record) => {
                        if record.op()? == OP_MESSAGE_DATA {
                            return Ok(Some(Message {
                                conn_id: record.header.u32("conn")?,
                                time: record.header.time("time")?,
                                data: record.data,
                            }));
                        }
                        continue;
                    }
                    None => self.current = None,
                }
            }

            if self.next_chunk >= bag.chunks.len() {
                return Ok(None);
            }
            let records = bag.read_chunk(self.next_chunk)?;
            self.next_chunk += 1;
            self.current = Some(Cursor::new(records));
        }
    }
}
