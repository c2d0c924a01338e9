use std::io::{ErrorKind, Write};

use crate::error::{FrameError, Result};
use crate::message::Message;

/// Writes serialized OCP.1 messages to any `Write` stream.
///
/// Each message goes out in a single write call. A write that accepts only
/// part of the message is reported as [`FrameError::ShortWrite`] since the
/// peer would otherwise see a truncated frame followed by the next one.
pub struct FrameWriter<T> {
    inner: T,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Write one complete serialized message (blocking).
    pub fn write_message(&mut self, data: &[u8]) -> Result<()> {
        let written = loop {
            match self.inner.write(data) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        if written != data.len() {
            return Err(FrameError::ShortWrite {
                written,
                expected: data.len(),
            });
        }

        self.flush()
    }

    /// Serialize and send a message.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        self.write_message(&message.to_bytes())
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
