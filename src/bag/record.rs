use std::collections::HashMap;
use std::io::{self, Read};

use super::BagError;

pub const BAG_MAGIC: &[u8] = b"#ROSBAG V2.0\n";

pub const OP_MESSAGE_DATA: u8 = 0x02;
pub const OP_BAG_HEADER: u8 = 0x03;
pub const OP_CHUNK: u8 = 0x05;
pub const OP_CHUNK_INFO: u8 = 0x06;
pub const OP_CONNECTION: u8 = 0x07;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// `name=value` fields of a record header (also used for connection headers).
#[derive(Debug, Clone, Default)]
pub struct RecordHeader {
    fields: HashMap<String, Vec<u8>>,
}

impl RecordHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, BagError> {
        let mut fields = HashMap::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let len = le_u32(bytes, pos)? as usize;
            pos += 4;
            let end = pos
                .checked_add(len)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| {
                    BagError::MalformedRecord(format!(
                        "header field of {} bytes overruns header",
                        len
                    ))
                })?;
            let field = &bytes[pos..end];
            let split = field
                .iter()
                .position(|b| *b == b'=')
                .ok_or_else(|| BagError::MalformedRecord("header field without '='".to_string()))?;
            let name = String::from_utf8_lossy(&field[..split]).into_owned();
            fields.insert(name, field[split + 1..].to_vec());
            pos = end;
        }
        Ok(Self { fields })
    }

    pub fn field(&self, name: &str) -> Result<&[u8], BagError> {
        self.fields
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| BagError::MissingField(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn op(&self) -> Result<u8, BagError> {
        let value = self.field("op")?;
        value
            .first()
            .copied()
            .ok_or_else(|| BagError::MalformedRecord("empty op field".to_string()))
    }

    pub fn u32(&self, name: &str) -> Result<u32, BagError> {
        le_u32(self.field(name)?, 0)
    }

    pub fn u64(&self, name: &str) -> Result<u64, BagError> {
        le_u64(self.field(name)?, 0)
    }

    /// Time fields are returned in nanoseconds.
    pub fn time(&self, name: &str) -> Result<u64, BagError> {
        le_time(self.field(name)?, 0)
    }

    pub fn string(&self, name: &str) -> Result<String, BagError> {
        Ok(String::from_utf8_lossy(self.field(name)?).into_owned())
    }
}

#[derive(Debug)]
pub struct Record {
    pub header: RecordHeader,
    pub data: Vec<u8>,
}

impl Record {
    pub fn op(&self) -> Result<u8, BagError> {
        self.header.op()
    }
}

/// Reads the next record. `Ok(None)` on a clean end of input.
pub fn read_record<R: Read>(reader: &mut R) -> Result<Option<Record>, BagError> {
    let mut len = [0u8; 4];
    match read_full(reader, &mut len)? {
        0 => return Ok(None),
        4 => {}
        n => {
            return Err(BagError::MalformedRecord(format!(
                "record length cut short after {} bytes",
                n
            )))
        }
    }
    let header_bytes = read_block(reader, u32::from_le_bytes(len), "header")?;
    let header = RecordHeader::parse(&header_bytes)?;

    if read_full(reader, &mut len)? != 4 {
        return Err(BagError::MalformedRecord("missing data length".to_string()));
    }
    let data = read_block(reader, u32::from_le_bytes(len), "data")?;

    Ok(Some(Record { header, data }))
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// Reads through `take` so a corrupt length cannot force a huge allocation.
fn read_block<R: Read>(reader: &mut R, len: u32, what: &str) -> Result<Vec<u8>, BagError> {
    let mut block = Vec::new();
    reader.take(len as u64).read_to_end(&mut block)?;
    if block.len() != len as usize {
        return Err(BagError::MalformedRecord(format!(
            "record {} cut short: {} of {} bytes",
            what,
            block.len(),
            len
        )));
    }
    Ok(block)
}

pub fn le_u32(bytes: &[u8], offset: usize) -> Result<u32, BagError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| BagError::MalformedRecord(format!("expected u32 at offset {}", offset)))
}

pub fn le_u64(bytes: &[u8], offset: usize) -> Result<u64, BagError> {
    let low = le_u32(bytes, offset)? as u64;
    let high = le_u32(bytes, offset + 4)? as u64;
    Ok(high << 32 | low)
}

/// `u32 sec` + `u32 nsec` as nanoseconds.
pub fn le_time(bytes: &[u8], offset: usize) -> Result<u64, BagError> {
    let sec = le_u32(bytes, offset)? as u64;
    let nsec = le_u32(bytes, offset + 4)? as u64;
    Ok(sec * NANOS_PER_SEC + nsec)
}
