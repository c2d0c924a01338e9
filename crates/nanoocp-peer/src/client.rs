use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use bytes::Bytes;
use nanoocp_frame::Message;
use nanoocp_transport::Ocp1Stream;
use tracing::{debug, info, warn};

use crate::callbacks::Callbacks;
use crate::config::{ClientConfig, ConnectionConfig};
use crate::connection::{Connection, Notify};
use crate::error::Result;
use crate::handler::ConnectionHandler;
use crate::timer::RetryTimer;

struct ClientInner {
    connection: Connection,
    config: ClientConfig,
    address: RwLock<String>,
    port: AtomicU16,
    running: AtomicBool,
    timer: RetryTimer,
    callbacks: Arc<Callbacks>,
}

impl ClientInner {
    fn address(&self) -> String {
        self.address
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn connect_once(&self) -> Result<()> {
        let address = self.address();
        let port = self.port.load(Ordering::Acquire);
        self.connection
            .connect(&address, port, self.config.connect_timeout)
    }

    fn start_retry(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.timer.start(self.config.retry_interval, move || {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            if !inner.running.load(Ordering::Acquire) || inner.connection.is_connected() {
                return false;
            }
            match inner.connect_once() {
                Ok(()) => {
                    info!(address = %inner.address(), port = inner.port.load(Ordering::Acquire), "reconnected");
                    false
                }
                Err(err) => {
                    debug!(error = %err, "reconnect attempt failed");
                    true
                }
            }
        });
    }
}

struct ClientHandler {
    inner: Weak<ClientInner>,
}

impl ConnectionHandler for ClientHandler {
    fn connection_made(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.timer.stop();
            inner.callbacks.connection_established();
        }
    }

    fn connection_lost(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.callbacks.connection_lost();
            if inner.running.load(Ordering::Acquire) {
                inner.start_retry();
            }
        }
    }

    fn message_received(&self, data: Bytes) {
        if let Some(inner) = self.inner.upgrade() {
            inner.callbacks.data_received(&data);
        }
    }
}

/// An OCP.1 client that keeps reconnecting to its device.
///
/// [`Client::start`] tries to connect right away. When that fails, or when an
/// established connection is lost later, a retry timer attempts a new
/// connection every `retry_interval` until one succeeds or the client is
/// stopped.
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn new(address: impl Into<String>, port: u16, config: ClientConfig) -> Self {
        Self::build(address.into(), port, config, Arc::new(Callbacks::default()))
    }

    /// A session for a server-accepted stream, reporting to `callbacks`.
    pub(crate) fn session(connection: ConnectionConfig, callbacks: Arc<Callbacks>) -> Self {
        let config = ClientConfig::default().with_connection(connection);
        Self::build(String::new(), 0, config, callbacks)
    }

    fn build(address: String, port: u16, config: ClientConfig, callbacks: Arc<Callbacks>) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ClientInner>| {
            let handler = Arc::new(ClientHandler {
                inner: weak.clone(),
            });
            ClientInner {
                connection: Connection::new(handler, config.connection.clone()),
                config,
                address: RwLock::new(address),
                port: AtomicU16::new(port),
                running: AtomicBool::new(false),
                timer: RetryTimer::new(),
                callbacks,
            }
        });
        Self { inner }
    }

    /// Connect now, or keep retrying in the background.
    ///
    /// Returns `true` if the immediate attempt connected.
    pub fn start(&self) -> bool {
        self.inner.running.store(true, Ordering::Release);
        match self.inner.connect_once() {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "connect failed, retrying in the background");
                self.inner.start_retry();
                false
            }
        }
    }

    /// Stop retrying and disconnect.
    ///
    /// If connection-established had been delivered, connection-lost is
    /// delivered once on the callback context before this returns.
    pub fn stop(&self) -> Result<()> {
        self.inner.running.store(false, Ordering::Release);
        self.inner.timer.stop();

        self.inner
            .connection
            .disconnect(self.inner.connection.config().stop_timeout, Notify::Yes)
    }

    pub(crate) fn attach(&self, stream: Ocp1Stream) -> Result<()> {
        self.inner.connection.initialise_with_stream(stream)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Send one serialized OCP.1 message.
    pub fn send_data(&self, data: &[u8]) -> Result<()> {
        self.inner.connection.send_message(data)
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        self.inner.connection.send(message)
    }

    pub fn address(&self) -> String {
        self.inner.address()
    }

    /// Takes effect on the next connect attempt.
    pub fn set_address(&self, address: impl Into<String>) {
        *self
            .inner
            .address
            .write()
            .unwrap_or_else(PoisonError::into_inner) = address.into();
    }

    pub fn port(&self) -> u16 {
        self.inner.port.load(Ordering::Acquire)
    }

    pub fn set_port(&self, port: u16) {
        self.inner.port.store(port, Ordering::Release);
    }

    pub fn connected_host_name(&self) -> Option<String> {
        self.inner.connection.connected_host_name()
    }

    pub fn on_data_received<F>(&self, callback: F)
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.inner.callbacks.set_data_received(Some(Arc::new(callback)));
    }

    pub fn on_connection_established<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .callbacks
            .set_connection_established(Some(Arc::new(callback)));
    }

    pub fn on_connection_lost<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .callbacks
            .set_connection_lost(Some(Arc::new(callback)));
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "client dropped while its read thread was still running");
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.address())
            .field("port", &self.port())
            .field("running", &self.is_running())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::thread;
    use std::time::{Duration, Instant};

    use crossbeam_channel::Receiver;
    use nanoocp_frame::KeepAlive;
    use nanoocp_transport::Ocp1Listener;

    use super::*;
    use crate::config::CallbackMode;
    use crate::error::PeerError;

    #[derive(Debug, PartialEq)]
    enum Seen {
        Established,
        Lost,
        Data(Vec<u8>),
    }

    fn test_config() -> ClientConfig {
        ClientConfig::default()
            .with_connect_timeout(Duration::from_millis(200))
            .with_retry_interval(Duration::from_millis(50))
            .with_connection(
                ConnectionConfig::default()
                    .with_callback_mode(CallbackMode::Inline)
                    .with_poll_interval(Duration::from_millis(20)),
            )
    }

    fn observed(client: &Client) -> Receiver<Seen> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let data_tx = tx.clone();
        client.on_data_received(move |data| data_tx.send(Seen::Data(data.to_vec())).is_ok());
        let made_tx = tx.clone();
        client.on_connection_established(move || {
            let _ = made_tx.send(Seen::Established);
        });
        client.on_connection_lost(move || {
            let _ = tx.send(Seen::Lost);
        });
        rx
    }

    fn free_port() -> u16 {
        Ocp1Listener::bind("127.0.0.1", 0)
            .expect("listener should bind")
            .port()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_start_connects_and_receives() {
        let listener = Ocp1Listener::bind("127.0.0.1", 0).expect("listener should bind");
        let client = Client::new("127.0.0.1", listener.port(), test_config());
        let rx = observed(&client);

        assert!(client.start());
        assert!(client.is_running());
        let mut peer = listener.accept().expect("listener should accept");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(Seen::Established)
        );

        let frame = Message::from(KeepAlive::from_seconds(30)).to_bytes();
        peer.write_all(&frame).expect("frame should be written");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(Seen::Data(frame.to_vec()))
        );
        assert_eq!(client.connected_host_name().as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_reconnects_when_device_appears() {
        let port = free_port();
        let client = Client::new("127.0.0.1", port, test_config());
        let rx = observed(&client);

        assert!(!client.start());
        assert!(!client.is_connected());

        let listener = Ocp1Listener::bind("127.0.0.1", port).expect("listener should rebind");
        let _peer = listener.accept().expect("client should retry");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(Seen::Established)
        );
        assert!(wait_until(|| client.is_connected()));
    }

    #[test]
    fn test_reconnects_after_loss() {
        let listener = Ocp1Listener::bind("127.0.0.1", 0).expect("listener should bind");
        let client = Client::new("127.0.0.1", listener.port(), test_config());
        let rx = observed(&client);

        assert!(client.start());
        let peer = listener.accept().expect("listener should accept");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Seen::Established));

        drop(peer);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Seen::Lost));

        let _peer = listener.accept().expect("client should reconnect");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Seen::Established));
    }

    #[test]
    fn test_stop_reports_lost_once() {
        let listener = Ocp1Listener::bind("127.0.0.1", 0).expect("listener should bind");
        let client = Client::new("127.0.0.1", listener.port(), test_config());
        let rx = observed(&client);

        assert!(client.start());
        let _peer = listener.accept().expect("listener should accept");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Seen::Established));

        client.stop().expect("stop should succeed");
        assert!(!client.is_running());
        assert!(!client.is_connected());
        assert_eq!(rx.try_recv(), Ok(Seen::Lost));

        client.stop().expect("second stop should succeed");
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_stop_halts_retries() {
        let port = free_port();
        let client = Client::new("127.0.0.1", port, test_config());
        let rx = observed(&client);

        assert!(!client.start());
        client.stop().expect("stop should succeed");

        let listener = Ocp1Listener::bind("127.0.0.1", port).expect("listener should rebind");
        assert!(listener
            .accept_timeout(Duration::from_millis(300))
            .expect("accept should not fail")
            .is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_address_change_between_cycles() {
        let first = Ocp1Listener::bind("127.0.0.1", 0).expect("listener should bind");
        let second = Ocp1Listener::bind("127.0.0.1", 0).expect("listener should bind");
        let client = Client::new("", first.port(), test_config());

        assert!(client.start());
        let _a = first.accept().expect("first listener should accept");
        client.stop().expect("stop should succeed");

        client.set_address("127.0.0.1");
        client.set_port(second.port());
        assert_eq!(client.port(), second.port());
        assert_eq!(client.address(), "127.0.0.1");
        assert!(client.start());
        let _b = second.accept().expect("second listener should accept");
    }

    #[test]
    fn test_send_data_without_connection() {
        let client = Client::new("127.0.0.1", free_port(), test_config());
        let err = client
            .send_data(&Message::from(KeepAlive::from_seconds(1)).to_bytes())
            .unwrap_err();
        assert!(matches!(err, PeerError::NotConnected));
    }
}
