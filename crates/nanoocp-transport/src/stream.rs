use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Host used when a connect is requested with an empty host name.
const DEFAULT_HOST: &str = "127.0.0.1";

/// Outcome of a bounded wait for readable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data, or an orderly shutdown by the peer, is waiting to be read.
    Ready,
    /// The wait elapsed with nothing to read.
    TimedOut,
}

/// A connected OCP.1 stream. Implements Read + Write.
///
/// Reads and writes are also implemented for `&Ocp1Stream`, so a read
/// thread and a writer can share one stream behind a read lock.
pub struct Ocp1Stream {
    inner: TcpStream,
    peer: Option<SocketAddr>,
}

impl Read for Ocp1Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for Ocp1Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl Read for &Ocp1Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        (&self.inner).read(buf)
    }
}

impl Write for &Ocp1Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        (&self.inner).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        (&self.inner).flush()
    }
}

impl Ocp1Stream {
    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            inner: stream,
            peer,
        }
    }

    /// Connect to `host:port`, giving each resolved address at most `timeout`.
    ///
    /// An empty host connects to the IPv4 loopback address. A zero timeout
    /// falls back to the operating system's default connect timeout.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        let addr = format!("{host}:{port}");

        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for candidate in candidates {
            let attempt = if timeout.is_zero() {
                TcpStream::connect(candidate)
            } else {
                TcpStream::connect_timeout(&candidate, timeout)
            };

            match attempt {
                Ok(stream) => {
                    // Small control messages must not wait for Nagle coalescing.
                    stream.set_nodelay(true)?;
                    debug!(%candidate, "connected to ocp.1 peer");
                    return Ok(Self::from_tcp(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(match last_err {
            Some(err) if err.kind() == ErrorKind::TimedOut => {
                TransportError::ConnectTimeout { addr, timeout }
            }
            Some(source) => TransportError::Connect { addr, source },
            None => TransportError::Resolve {
                addr,
                source: std::io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
            },
        })
    }

    /// Wait at most `timeout` for the stream to become readable.
    ///
    /// Returns an error when the socket is in an error state; an orderly
    /// shutdown by the peer reports [`Readiness::Ready`] and the following
    /// read returns zero bytes.
    #[cfg(unix)]
    pub fn wait_readable(&self, timeout: Duration) -> Result<Readiness> {
        use std::os::fd::AsRawFd;

        poll_readable(self.inner.as_raw_fd(), timeout)
    }

    /// Wait at most `timeout` for the stream to become readable.
    #[cfg(not(unix))]
    pub fn wait_readable(&self, timeout: Duration) -> Result<Readiness> {
        let previous = self.inner.read_timeout()?;
        self.inner
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;

        let mut probe = [0u8; 1];
        let outcome = match self.inner.peek(&mut probe) {
            Ok(_) => Ok(Readiness::Ready),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(Readiness::TimedOut)
            }
            Err(err) => Err(TransportError::Io(err)),
        };

        self.inner.set_read_timeout(previous)?;
        outcome
    }

    /// Shut down both directions; a stream that is already disconnected is not an error.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Address of the connected peer, if the OS reported one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Printable host of the connected peer.
    pub fn host_name(&self) -> String {
        self.peer
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }
}

/// Bounded `poll(2)` for readability on a single descriptor.
#[cfg(unix)]
pub(crate) fn poll_readable(fd: std::os::fd::RawFd, timeout: Duration) -> Result<Readiness> {
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        // SAFETY: `pfd` is a valid, writable pollfd for a descriptor owned by
        // the caller, and the count passed matches the single entry.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(TransportError::Io(err));
        }
        if rc == 0 {
            return Ok(Readiness::TimedOut);
        }
        if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
            return Err(TransportError::SocketError);
        }
        return Ok(Readiness::Ready);
    }
}

impl std::fmt::Debug for Ocp1Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ocp1Stream")
            .field("type", &"tcp")
            .field("peer", &self.peer)
            .finish()
    }
}
