//! OCP.1 (AES70 over TCP) message framing, byte codec and property values.
//!
//! Every OCP.1 message starts with a 10 byte big-endian header:
//! - a sync byte (0x3B) for stream synchronization
//! - the protocol version (1)
//! - the message size, counting everything but the sync byte
//! - the message type and a message count
//!
//! On top of the framing this crate provides the five message kinds, a
//! dynamic [`Variant`] value and [`CommandDefinition`] builders for get,
//! set and subscription calls.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod data;
pub mod definition;
pub mod error;
pub mod message;
pub mod reader;
pub mod variant;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::Ocp1Codec;
pub use codec::{
    calculate_message_size, decode_frame, FrameConfig, Header, MessageType,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_CHUNK_SIZE, HEADER_SIZE, PROTOCOL_VERSION, SYNC_BYTE,
};
pub use data::DataType;
pub use definition::{CommandDefinition, DefinitionKind};
pub use error::{FrameError, Result};
pub use message::{
    next_handle, Command, CommandResponseRequired, KeepAlive, Message, Notification, Response,
};
pub use reader::FrameReader;
pub use variant::Variant;
pub use writer::FrameWriter;
