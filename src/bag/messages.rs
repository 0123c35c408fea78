use super::record::{le_time, le_u32};
use super::BagError;

/// Sequential reader over a serialized ROS message.
struct MessageCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MessageCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, BagError> {
        let value = *self
            .data
            .get(self.pos)
            .ok_or_else(|| {
                BagError::MalformedRecord(format!("message ends at byte {}", self.pos))
            })?;
        self.pos += 1;
        Ok(value)
    }

    fn u32(&mut self) -> Result<u32, BagError> {
        let value = le_u32(self.data, self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    fn skip_time(&mut self) -> Result<(), BagError> {
        le_time(self.data, self.pos)?;
        self.pos += 8;
        Ok(())
    }

    fn bytes(&mut self) -> Result<&'a [u8], BagError> {
        let len = self.u32()? as usize;
        let data = self
            .data
            .get(self.pos..self.pos.saturating_add(len))
            .ok_or_else(|| {
                BagError::MalformedRecord(format!(
                    "field of {} bytes at offset {} overruns message of {} bytes",
                    len,
                    self.pos,
                    self.data.len()
                ))
            })?;
        self.pos += len;
        Ok(data)
    }

    fn string(&mut self) -> Result<String, BagError> {
        Ok(String::from_utf8_lossy(self.bytes()?).into_owned())
    }
}

/// `sensor_msgs/Image`
#[derive(Debug, Clone)]
pub struct ImageMessage {
    /// RealSense stores the frame number here.
    pub seq: u32,
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    pub is_bigendian: bool,
    pub step: u32,
    pub data: Vec<u8>,
}

impl ImageMessage {
    pub fn parse(data: &[u8]) -> Result<Self, BagError> {
        let mut cursor = MessageCursor::new(data);
        let seq = cursor.u32()?;
        // header stamp and frame_id are not needed
        cursor.skip_time()?;
        cursor.bytes()?;
        Ok(Self {
            seq,
            height: cursor.u32()?,
            width: cursor.u32()?,
            encoding: cursor.string()?,
            is_bigendian: cursor.u8()? != 0,
            step: cursor.u32()?,
            data: cursor.bytes()?.to_vec(),
        })
    }
}

/// `realsense_msgs/StreamInfo`, without the trailing `is_recommended` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfoMessage {
    pub fps: u32,
    pub encoding: String,
}

impl StreamInfoMessage {
    pub fn parse(data: &[u8]) -> Result<Self, BagError> {
        let mut cursor = MessageCursor::new(data);
        Ok(Self {
            fps: cursor.u32()?,
            encoding: cursor.string()?,
        })
    }
}
