use crate::data::DataType;

/// Errors that can occur while framing, reading or writing OCP.1 messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream does not start with a frameable OCP.1 header.
    #[error("invalid frame header (sync 0x{sync:02x}, declared size {size})")]
    InvalidHeader { sync: u8, size: u32 },

    /// The declared message size exceeds the configured maximum.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A single write call accepted fewer bytes than the message holds.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// A dynamic value cannot be decoded from bytes as the requested type.
    #[error("cannot decode {len} bytes as {data_type:?}")]
    UnsupportedType { data_type: DataType, len: usize },

    /// A frame read was abandoned because the caller asked to stop.
    #[error("frame read aborted")]
    Aborted,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
