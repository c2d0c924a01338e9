use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::codec::{check_framing, FrameConfig, Header, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::message::Message;

/// Reads complete OCP.1 messages from any `Read` stream.
///
/// The 10 byte header is read exactly, then the body is read in chunks of at
/// most `read_chunk_size` bytes until the declared size is reached. Callers
/// always get whole messages.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
    stop: Option<Arc<AtomicBool>>,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            stop: None,
        }
    }

    /// Abort reads with [`FrameError::Aborted`] once `stop` is set.
    ///
    /// With a stop flag installed, read timeouts on the underlying stream
    /// are retried so the flag is polled between them.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Read the next complete message, header included (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        self.fill(&mut header_bytes)?;

        let header = Header::from_bytes(&header_bytes);
        let len = check_framing(&header, self.config.max_message_size)?;

        let mut frame = BytesMut::zeroed(len);
        frame[..HEADER_SIZE].copy_from_slice(&header_bytes);

        let chunk = self.config.read_chunk_size.max(1);
        let mut filled = HEADER_SIZE;
        while filled < len {
            let end = (filled + chunk).min(len);
            filled += self.read_some(&mut frame[filled..end])?;
        }

        Ok(frame.freeze())
    }

    /// Read and parse the next message. Frames that parse to nothing are
    /// skipped.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            let frame = self.read_frame()?;
            match Message::unmarshal(&frame) {
                Some(message) => return Ok(message),
                None => tracing::debug!(len = frame.len(), "skipping unparseable OCP.1 message"),
            }
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read_some(&mut buf[filled..])?;
        }
        Ok(())
    }

    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if self.stop_requested() {
                return Err(FrameError::Aborted);
            }
            match self.inner.read(buf) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if self.stop.is_some()
                        && matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| stop.load(Ordering::Acquire))
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

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::message::{KeepAlive, Response};

    fn wire(messages: &[Message]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for message in messages {
            message.encode(&mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_message() {
        let bytes = wire(&[KeepAlive::from_seconds(5).into()]);
        let mut reader = FrameReader::new(Cursor::new(bytes.clone()));

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.as_ref(), bytes.as_slice());
    }

    #[test]
    fn read_consecutive_messages() {
        let first: Message = Response::new(7, 0, 1, vec![1, 2, 3, 4]).into();
        let second: Message = KeepAlive::from_seconds(1).into();
        let mut reader = FrameReader::new(Cursor::new(wire(&[first.clone(), second.clone()])));

        assert_eq!(reader.read_message().unwrap(), first);
        assert_eq!(reader.read_message().unwrap(), second);
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn body_is_read_in_chunks() {
        let message: Message = Response::new(3, 0, 1, vec![0xAB; 1000]).into();
        let config = FrameConfig {
            read_chunk_size: 7,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire(&[message.clone()])), config);
        assert_eq!(reader.read_message().unwrap(), message);
    }

    #[test]
    fn partial_read_handling() {
        let message: Message = KeepAlive::from_seconds(9).into();
        let reader = ByteByByteReader {
            bytes: wire(&[message.clone()]),
            pos: 0,
        };
        let mut reader = FrameReader::new(reader);
        assert_eq!(reader.read_message().unwrap(), message);
    }

    #[test]
    fn unparseable_messages_are_skipped() {
        let mut bytes = wire(&[KeepAlive::from_seconds(1).into()]);
        // Unsupported protocol version, still frameable.
        bytes[2] = 9;
        bytes.extend_from_slice(&wire(&[KeepAlive::from_seconds(2).into()]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let Message::KeepAlive(keepalive) = reader.read_message().unwrap() else {
            panic!("expected keep-alive");
        };
        assert_eq!(keepalive.heartbeat_seconds(), 2);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let bytes = wire(&[Response::new(7, 0, 1, vec![1, 2, 3, 4]).into()]);
        let mut reader = FrameReader::new(Cursor::new(bytes[..15].to_vec()));
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn bad_sync_in_stream() {
        let mut bytes = wire(&[KeepAlive::from_seconds(1).into()]);
        bytes[0] = 0x00;
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(reader.read_frame(), Err(FrameError::InvalidHeader { .. })));
    }

    #[test]
    fn oversized_message_in_stream() {
        let bytes = wire(&[Response::new(7, 0, 1, vec![0; 64]).into()]);
        let config = FrameConfig {
            max_message_size: 32,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes), config);
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::MessageTooLarge { size: 84, max: 32 })
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let message: Message = KeepAlive::from_seconds(3).into();
        let reader = FlakyReader {
            error: ErrorKind::Interrupted,
            failed: false,
            bytes: wire(&[message.clone()]),
            pos: 0,
        };
        let mut reader = FrameReader::new(reader);
        assert_eq!(reader.read_message().unwrap(), message);
    }

    #[test]
    fn would_block_propagates_without_stop_flag() {
        let reader = FlakyReader {
            error: ErrorKind::WouldBlock,
            failed: false,
            bytes: wire(&[KeepAlive::from_seconds(3).into()]),
            pos: 0,
        };
        let mut reader = FrameReader::new(reader);
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::Io(e)) if e.kind() == ErrorKind::WouldBlock
        ));
    }

    #[test]
    fn would_block_retries_with_stop_flag() {
        let message: Message = KeepAlive::from_seconds(3).into();
        let reader = FlakyReader {
            error: ErrorKind::WouldBlock,
            failed: false,
            bytes: wire(&[message.clone()]),
            pos: 0,
        };
        let mut reader = FrameReader::new(reader).with_stop_flag(Arc::new(AtomicBool::new(false)));
        assert_eq!(reader.read_message().unwrap(), message);
    }

    #[test]
    fn stop_flag_aborts_read() {
        let stop = Arc::new(AtomicBool::new(true));
        let bytes = wire(&[KeepAlive::from_seconds(3).into()]);
        let mut reader = FrameReader::new(Cursor::new(bytes)).with_stop_flag(stop);
        assert!(matches!(reader.read_frame(), Err(FrameError::Aborted)));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(reader.config().read_chunk_size, 64 * 1024);
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct FlakyReader {
        error: ErrorKind,
        failed: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::from(self.error));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
