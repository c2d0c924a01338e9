//! `tokio_util` codec for use with `Framed` streams.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, Header, DEFAULT_MAX_MESSAGE_SIZE};
use crate::error::FrameError;
use crate::message::Message;

/// Splits a byte stream into whole OCP.1 messages and serializes outgoing
/// ones.
#[derive(Debug, Clone)]
pub struct Ocp1Codec {
    max_message_size: usize,
}

impl Ocp1Codec {
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for Ocp1Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Ocp1Codec {
    type Item = Bytes;
    type Error = FrameError;

    /// Errors on a header that frames but does not validate; the frame has
    /// already been consumed, so a caller may keep decoding after it.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = decode_frame(src, self.max_message_size)? else {
            return Ok(None);
        };
        match Header::parse(&frame) {
            Some(header) if header.is_valid() => Ok(Some(frame)),
            Some(header) => Err(FrameError::InvalidHeader {
                sync: header.sync,
                size: header.message_size,
            }),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for Ocp1Codec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

impl Encoder<&Message> for Ocp1Codec {
    type Error = FrameError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}
