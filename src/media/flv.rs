//! FLV container writing
//!
//! FLV is the container the muxing stage emits toward clients. The gateway
//! writes the file header once per connection, then one tag per delivered
//! media unit.
//!
//! FLV File Header (9 bytes, followed by PreviousTagSize0):
//! ```text
//! +---------+------------+----------+-------------+
//! | "FLV"(3)| Version(1) | Flags(1) | DataOfs(4)  |
//! +---------+------------+----------+-------------+
//! ```
//!
//! FLV Tag (11-byte header + data + PreviousTagSize):
//! ```text
//! +--------+-------------+-----------+-------------+---------+------------+
//! | Type(1)| DataSize(3) | TS(3)+Ext | StreamID(3) | Data(N) | PrevSize(4)|
//! +--------+-------------+-----------+-------------+---------+------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::media::MediaKind;

/// Size of the FLV file header, excluding PreviousTagSize0
pub const FLV_HEADER_SIZE: usize = 9;

/// Size of an FLV tag header, excluding data and PreviousTagSize
pub const TAG_HEADER_SIZE: usize = 11;

/// FLV tag type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio,
    Video,
}

impl FlvTagType {
    /// Wire value of the tag type byte
    pub fn tag_byte(&self) -> u8 {
        match self {
            FlvTagType::Audio => 8,
            FlvTagType::Video => 9,
        }
    }
}

impl From<MediaKind> for FlvTagType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => FlvTagType::Video,
            MediaKind::Audio => FlvTagType::Audio,
        }
    }
}

/// An FLV tag ready to be written
#[derive(Debug, Clone)]
pub struct FlvTag {
    /// Tag type
    pub tag_type: FlvTagType,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Raw tag data (including codec headers)
    pub data: Bytes,
}

impl FlvTag {
    /// Create a new video tag
    pub fn video(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Video,
            timestamp,
            data,
        }
    }

    /// Create a new audio tag
    pub fn audio(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Audio,
            timestamp,
            data,
        }
    }

    /// Total encoded size: header, data, PreviousTagSize
    pub fn size(&self) -> usize {
        TAG_HEADER_SIZE + self.data.len() + 4
    }

    /// Encode the tag, including the trailing PreviousTagSize field that
    /// back-references this tag
    pub fn encode(&self) -> Bytes {
        let data_size = self.data.len() as u32;
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u8(self.tag_type.tag_byte());

        // DataSize: 24-bit big-endian
        buf.put_u8(((data_size >> 16) & 0xFF) as u8);
        buf.put_u8(((data_size >> 8) & 0xFF) as u8);
        buf.put_u8((data_size & 0xFF) as u8);

        // Timestamp: lower 24 bits, then the extended upper 8 bits
        buf.put_u8(((self.timestamp >> 16) & 0xFF) as u8);
        buf.put_u8(((self.timestamp >> 8) & 0xFF) as u8);
        buf.put_u8((self.timestamp & 0xFF) as u8);
        buf.put_u8(((self.timestamp >> 24) & 0xFF) as u8);

        // StreamID is always zero
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u8(0);

        buf.put_slice(&self.data);

        // PreviousTagSize: header + data of the tag just written
        buf.put_u32(TAG_HEADER_SIZE as u32 + data_size);

        buf.freeze()
    }
}

/// Encode the FLV file header plus PreviousTagSize0
///
/// The flags byte advertises which media kinds the stream carries:
/// bit 0 = video, bit 2 = audio.
pub fn file_header(has_audio: bool, has_video: bool) -> Bytes {
    let mut flags = 0u8;
    if has_audio {
        flags |= 0x04;
    }
    if has_video {
        flags |= 0x01;
    }

    let mut buf = BytesMut::with_capacity(FLV_HEADER_SIZE + 4);
    buf.put_slice(b"FLV");
    buf.put_u8(1);
    buf.put_u8(flags);
    buf.put_u32(FLV_HEADER_SIZE as u32);
    buf.put_u32(0); // PreviousTagSize0
    buf.freeze()
}
