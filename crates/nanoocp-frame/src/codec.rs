use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Header: sync (1) + version (2) + size (4) + type (1) + count (2) = 10 bytes.
pub const HEADER_SIZE: usize = 10;

/// First byte of every OCP.1 message.
pub const SYNC_BYTE: u8 = 0x3B;

/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default upper bound for a single message on the wire: 16 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default chunk size used when reading message bodies.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// OCP.1 message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Command = 0,
    CommandResponseRequired = 1,
    Notification = 2,
    Response = 3,
    KeepAlive = 4,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Command),
            1 => Some(Self::CommandResponseRequired),
            2 => Some(Self::Notification),
            3 => Some(Self::Response),
            4 => Some(Self::KeepAlive),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "Command",
            Self::CommandResponseRequired => "CommandResponseRequired",
            Self::Notification => "Notification",
            Self::Response => "Response",
            Self::KeepAlive => "KeepAlive",
        }
    }
}

/// Value of the header size field for a message of `message_type` carrying
/// `payload_len` parameter bytes. The field counts everything but the sync
/// byte.
pub fn calculate_message_size(message_type: MessageType, payload_len: usize) -> u32 {
    let fixed = match message_type {
        MessageType::Command | MessageType::CommandResponseRequired => 26,
        MessageType::Notification => 37,
        MessageType::Response => 19,
        MessageType::KeepAlive => 9,
    };
    (fixed + payload_len) as u32
}

/// The fixed 10 byte header in front of every message.
///
/// ```text
/// ┌──────┬─────────┬──────────┬──────┬───────┬──────────────┐
/// │ 0x3B │ version │ size     │ type │ count │ body ...     │
/// │ (1B) │ (2B BE) │ (4B BE)  │ (1B) │ (2B)  │ (size-9 B)   │
/// └──────┴─────────┴──────────┴──────┴───────┴──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sync: u8,
    pub protocol_version: u16,
    pub message_size: u32,
    pub message_type: u8,
    pub message_count: u16,
}

impl Header {
    /// Header for a single message of the given type and payload length.
    pub fn new(message_type: MessageType, payload_len: usize) -> Self {
        Self {
            sync: SYNC_BYTE,
            protocol_version: PROTOCOL_VERSION,
            message_size: calculate_message_size(message_type, payload_len),
            message_type: message_type.as_u8(),
            message_count: 1,
        }
    }

    /// Parse the first ten bytes of `data`. Field values are not checked.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let bytes: &[u8; HEADER_SIZE] = data.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            sync: bytes[0],
            protocol_version: u16::from_be_bytes([bytes[1], bytes[2]]),
            message_size: u32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
            message_type: bytes[7],
            message_count: u16::from_be_bytes([bytes[8], bytes[9]]),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sync == SYNC_BYTE
            && self.protocol_version == PROTOCOL_VERSION
            && self.message_size >= HEADER_SIZE as u32
            && self.message_type <= MessageType::KeepAlive.as_u8()
            && self.message_count > 0
    }

    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_u8(self.message_type)
    }

    /// Number of bytes the whole message occupies on the wire.
    pub fn frame_len(&self) -> usize {
        self.message_size as usize + 1
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.sync);
        dst.put_u16(self.protocol_version);
        dst.put_u32(self.message_size);
        dst.put_u8(self.message_type);
        dst.put_u16(self.message_count);
    }
}

/// Check the parts of a header needed to find the end of the frame.
///
/// Other field errors are left to message parsing so that a malformed but
/// frameable message can be dropped without losing stream sync.
pub(crate) fn check_framing(header: &Header, max_message_size: usize) -> Result<usize> {
    if header.sync != SYNC_BYTE || header.message_size < HEADER_SIZE as u32 {
        return Err(FrameError::InvalidHeader {
            sync: header.sync,
            size: header.message_size,
        });
    }
    let len = header.frame_len();
    if len > max_message_size {
        return Err(FrameError::MessageTooLarge {
            size: len,
            max: max_message_size,
        });
    }
    Ok(len)
}

/// Split one complete message (header included) off the front of `src`.
///
/// Returns `Ok(None)` if the buffer doesn't hold a complete message yet.
pub fn decode_frame(src: &mut BytesMut, max_message_size: usize) -> Result<Option<Bytes>> {
    let Some(header) = Header::parse(src) else {
        return Ok(None);
    };
    let len = check_framing(&header, max_message_size)?;

    if src.len() < len {
        src.reserve(len - src.len());
        return Ok(None);
    }

    let frame = src.split_to(len).freeze();
    Ok(Some(frame))
}

/// Configuration for frame reading.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message size in bytes, header included. Default: 16 MiB.
    pub max_message_size: usize,
    /// Largest single read issued for a message body. Default: 64 KiB.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}
