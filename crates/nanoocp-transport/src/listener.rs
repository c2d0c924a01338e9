use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::Ocp1Stream;

/// Address used when a listener is bound with an empty address.
const ANY_ADDRESS: &str = "0.0.0.0";

/// TCP listener for inbound OCP.1 sessions.
pub struct Ocp1Listener {
    listener: TcpListener,
    local: SocketAddr,
}

impl Ocp1Listener {
    /// Bind and listen on `address:port`.
    ///
    /// An empty address listens on all IPv4 interfaces; port 0 lets the OS pick.
    pub fn bind(address: &str, port: u16) -> Result<Self> {
        let address = if address.is_empty() {
            ANY_ADDRESS
        } else {
            address
        };
        let addr = format!("{address}:{port}");

        let listener = TcpListener::bind((address, port)).map_err(|source| TransportError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        #[cfg(not(unix))]
        listener.set_nonblocking(true)?;

        info!(%local, "listening for ocp.1 connections");
        Ok(Self { listener, local })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<Ocp1Stream> {
        loop {
            if let Some(stream) = self.accept_timeout(Duration::from_secs(1))? {
                return Ok(stream);
            }
        }
    }

    /// Accept an incoming connection, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nobody connected in time.
    #[cfg(unix)]
    pub fn accept_timeout(&self, timeout: Duration) -> Result<Option<Ocp1Stream>> {
        use std::os::fd::AsRawFd;

        match crate::stream::poll_readable(self.listener.as_raw_fd(), timeout)? {
            crate::Readiness::TimedOut => Ok(None),
            crate::Readiness::Ready => self.accept_ready().map(Some),
        }
    }

    /// Accept an incoming connection, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nobody connected in time.
    #[cfg(not(unix))]
    pub fn accept_timeout(&self, timeout: Duration) -> Result<Option<Ocp1Stream>> {
        const STEP: Duration = Duration::from_millis(10);

        let deadline = std::time::Instant::now() + timeout;
        loop {
            match self.accept_ready() {
                Ok(stream) => return Ok(Some(stream)),
                Err(TransportError::Accept(err))
                    if err.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    if std::time::Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(STEP);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn accept_ready(&self) -> Result<Ocp1Stream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted ocp.1 connection");
        Ok(Ocp1Stream::from_tcp(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// The bound port; useful after binding port 0.
    pub fn port(&self) -> u16 {
        self.local.port()
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl std::fmt::Debug for Ocp1Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ocp1Listener")
            .field("local", &self.local)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = Ocp1Listener::bind("127.0.0.1", 0).unwrap();
        let port = listener.port();
        assert_ne!(port, 0);

        let handle = std::thread::spawn(move || {
            let mut client =
                Ocp1Stream::connect("127.0.0.1", port, Duration::from_secs(1)).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_accept_timeout_without_client() {
        let listener = Ocp1Listener::bind("127.0.0.1", 0).unwrap();
        let started = std::time::Instant::now();
        let accepted = listener.accept_timeout(Duration::from_millis(30)).unwrap();
        assert!(accepted.is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_accept_timeout_with_pending_client() {
        let listener = Ocp1Listener::bind("127.0.0.1", 0).unwrap();
        let _client =
            Ocp1Stream::connect("127.0.0.1", listener.port(), Duration::from_secs(1)).unwrap();

        let accepted = listener.accept_timeout(Duration::from_secs(1)).unwrap();
        let stream = accepted.expect("pending client should be accepted");
        assert!(stream.peer_addr().is_some());
    }

    #[test]
    fn test_bind_rejects_port_in_use() {
        let first = Ocp1Listener::bind("127.0.0.1", 0).unwrap();
        let result = Ocp1Listener::bind("127.0.0.1", first.port());
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_bind_rejects_unresolvable_address() {
        let result = Ocp1Listener::bind("definitely not an address", 0);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }
}
