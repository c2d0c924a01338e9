use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use nanoocp_frame::Message;
use nanoocp_transport::Ocp1Stream;
use tracing::{info, warn};

use crate::acceptor::Acceptor;
use crate::callbacks::Callbacks;
use crate::client::Client;
use crate::config::ServerConfig;
use crate::error::{PeerError, Result};

struct ServerInner {
    address: String,
    port: u16,
    config: ServerConfig,
    callbacks: Arc<Callbacks>,
    acceptor: Mutex<Option<Acceptor>>,
    active: Mutex<Option<Arc<Client>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ServerInner {
    fn active(&self) -> Option<Arc<Client>> {
        lock(&self.active).clone()
    }

    fn accepted(&self, stream: Ocp1Stream) {
        let session = Arc::new(Client::session(
            self.config.connection.clone(),
            Arc::clone(&self.callbacks),
        ));

        // Must be visible before attach reports the connection as made.
        let previous = lock(&self.active).replace(Arc::clone(&session));
        if let Some(previous) = previous {
            info!("replacing active session");
            if let Err(err) = previous.stop() {
                warn!(error = %err, "replaced session did not stop cleanly");
            }
        }

        if let Err(err) = session.attach(stream) {
            warn!(error = %err, "failed to start session for accepted connection");
            let mut active = lock(&self.active);
            if active.as_ref().is_some_and(|current| Arc::ptr_eq(current, &session)) {
                *active = None;
            }
        }
    }
}

/// An OCP.1 server holding at most one active session.
///
/// Accepting a new connection replaces the current session; the replaced
/// session reports connection-lost.
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// An empty address listens on all IPv4 interfaces; port 0 picks a free
    /// port, see [`Server::bound_port`].
    pub fn new(address: impl Into<String>, port: u16, config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                address: address.into(),
                port,
                config,
                callbacks: Arc::new(Callbacks::default()),
                acceptor: Mutex::new(None),
                active: Mutex::new(None),
            }),
        }
    }

    /// Bind and start accepting, restarting if already running.
    pub fn start(&self) -> Result<()> {
        if let Err(err) = self.stop() {
            warn!(error = %err, "previous server instance did not stop cleanly");
        }

        let weak: Weak<ServerInner> = Arc::downgrade(&self.inner);
        let acceptor = Acceptor::begin(
            &self.inner.address,
            self.inner.port,
            self.inner.config.accept_poll_interval,
            move |stream| {
                if let Some(inner) = weak.upgrade() {
                    inner.accepted(stream);
                }
            },
        )?;
        info!(port = acceptor.bound_port(), "server started");
        *lock(&self.inner.acceptor) = Some(acceptor);
        Ok(())
    }

    /// Stop accepting and close the active session.
    pub fn stop(&self) -> Result<()> {
        let acceptor = lock(&self.inner.acceptor).take();
        let stopped = match acceptor {
            Some(acceptor) => acceptor.stop(self.inner.config.stop_timeout),
            None => Ok(()),
        };

        let session = lock(&self.inner.active).take();
        let closed = match session {
            Some(session) => session.stop(),
            None => Ok(()),
        };

        stopped.and(closed)
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.inner.acceptor).is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .active()
            .is_some_and(|session| session.is_connected())
    }

    /// The port actually bound, once started.
    pub fn bound_port(&self) -> Option<u16> {
        lock(&self.inner.acceptor)
            .as_ref()
            .map(Acceptor::bound_port)
    }

    /// Send one serialized message to the active session.
    pub fn send_data(&self, data: &[u8]) -> Result<()> {
        match self.inner.active() {
            Some(session) => session.send_data(data),
            None => Err(PeerError::NotConnected),
        }
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        self.send_data(&message.to_bytes())
    }

    pub fn connected_host_name(&self) -> Option<String> {
        self.inner
            .active()
            .and_then(|session| session.connected_host_name())
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

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "server dropped while a background thread was still running");
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.inner.address)
            .field("port", &self.inner.port)
            .field("bound_port", &self.bound_port())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::thread;
    use std::time::{Duration, Instant};

    use nanoocp_frame::{FrameReader, KeepAlive};

    use super::*;
    use crate::config::{CallbackMode, ConnectionConfig};
    use crate::dispatch::CallbackDispatcher;

    fn test_config() -> ServerConfig {
        ServerConfig::default()
            .with_accept_poll_interval(Duration::from_millis(20))
            .with_stop_timeout(Duration::from_secs(2))
            .with_connection(
                ConnectionConfig::default()
                    .with_callback_mode(CallbackMode::Inline)
                    .with_poll_interval(Duration::from_millis(20)),
            )
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
    fn test_accept_exchange_and_stop() {
        let server = Server::new("127.0.0.1", 0, test_config());
        let (tx, rx) = crossbeam_channel::unbounded();
        let data_tx = tx.clone();
        server.on_data_received(move |data| data_tx.send(data.to_vec()).is_ok());
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        let made_tx = state_tx.clone();
        server.on_connection_established(move || {
            let _ = made_tx.send("established");
        });
        server.on_connection_lost(move || {
            let _ = state_tx.send("lost");
        });

        assert!(server.bound_port().is_none());
        server.start().expect("server should start");
        assert!(server.is_listening());
        let port = server.bound_port().expect("port should be bound");

        let mut device = Ocp1Stream::connect("127.0.0.1", port, Duration::from_secs(1))
            .expect("connect should succeed");
        assert_eq!(state_rx.recv_timeout(Duration::from_secs(5)), Ok("established"));
        assert!(wait_until(|| server.is_connected()));

        let inbound = Message::from(KeepAlive::from_seconds(5)).to_bytes();
        device.write_all(&inbound).expect("frame should be written");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(inbound.to_vec()));

        let outbound = Message::from(KeepAlive::from_millis(1500));
        server.send(&outbound).expect("send should succeed");
        let mut reader = FrameReader::new(&mut device);
        assert_eq!(reader.read_message().expect("frame should arrive"), outbound);

        server.stop().expect("server should stop");
        assert_eq!(state_rx.try_recv(), Ok("lost"));
        assert!(!server.is_listening());
        assert!(!server.is_connected());
    }

    #[test]
    fn test_send_without_session() {
        let server = Server::new("127.0.0.1", 0, test_config());
        server.start().expect("server should start");
        let err = server.send_data(&[0x3B]).unwrap_err();
        assert!(matches!(err, PeerError::NotConnected));
    }

    #[test]
    fn test_new_connection_replaces_session() {
        let server = Server::new("127.0.0.1", 0, test_config());
        let (tx, rx) = crossbeam_channel::unbounded();
        let made_tx = tx.clone();
        server.on_connection_established(move || {
            let _ = made_tx.send("established");
        });
        server.on_connection_lost(move || {
            let _ = tx.send("lost");
        });
        server.start().expect("server should start");
        let port = server.bound_port().expect("port should be bound");

        let _first = Ocp1Stream::connect("127.0.0.1", port, Duration::from_secs(1))
            .expect("connect should succeed");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("established"));

        let _second = Ocp1Stream::connect("127.0.0.1", port, Duration::from_secs(1))
            .expect("connect should succeed");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("lost"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("established"));
    }

    #[test]
    fn test_replacement_callbacks_stay_on_dispatch_thread() {
        let dispatcher = CallbackDispatcher::new("test-server-callbacks");
        let config = test_config().with_connection(
            ConnectionConfig::default()
                .with_callback_mode(CallbackMode::Dispatcher(dispatcher))
                .with_poll_interval(Duration::from_millis(20)),
        );
        let server = Server::new("127.0.0.1", 0, config);
        let (tx, rx) = crossbeam_channel::unbounded();
        let made_tx = tx.clone();
        server.on_connection_established(move || {
            let _ = made_tx.send(("established", thread::current().name().map(str::to_string)));
        });
        server.on_connection_lost(move || {
            let _ = tx.send(("lost", thread::current().name().map(str::to_string)));
        });
        server.start().expect("server should start");
        let port = server.bound_port().expect("port should be bound");

        let on_dispatcher = Some("test-server-callbacks".to_string());
        let _first = Ocp1Stream::connect("127.0.0.1", port, Duration::from_secs(1))
            .expect("connect should succeed");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(("established", on_dispatcher.clone()))
        );

        let _second = Ocp1Stream::connect("127.0.0.1", port, Duration::from_secs(1))
            .expect("connect should succeed");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(("lost", on_dispatcher.clone()))
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(("established", on_dispatcher.clone()))
        );

        server.stop().expect("server should stop");
        assert_eq!(rx.try_recv(), Ok(("lost", on_dispatcher)));
    }

    #[test]
    fn test_start_fails_on_port_in_use() {
        let first = Server::new("127.0.0.1", 0, test_config());
        first.start().expect("server should start");
        let port = first.bound_port().expect("port should be bound");

        let second = Server::new("127.0.0.1", port, test_config());
        assert!(second.start().is_err());
        assert!(!second.is_listening());
    }
}
