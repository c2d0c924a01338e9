//! The connection engine: one TCP stream, one read thread, gated callbacks.
//!
//! A [`Connection`] owns at most one [`Ocp1Stream`] at a time. While
//! connected, a background read thread waits for readability in bounded
//! polls, reads one complete OCP.1 message at a time and hands it to the
//! [`ConnectionHandler`]. Writes go straight to the socket from the calling
//! thread.
//!
//! Every connect starts a new session with its own [`DeliveryGate`].
//! Disconnect disarms that gate before anything else, so no event of the
//! old session reaches the handler once disconnect has returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use nanoocp_frame::{FrameError, FrameReader, FrameWriter, Message};
use nanoocp_transport::{Ocp1Stream, Readiness};
use tracing::{debug, info, warn};

use crate::config::{CallbackMode, ConnectionConfig};
use crate::error::{PeerError, Result};
use crate::gate::DeliveryGate;
use crate::handler::ConnectionHandler;
use crate::worker::join_bounded;

/// Whether [`Connection::disconnect`] reports the loss to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    Yes,
    No,
}

/// State of one connected period.
struct Session {
    gate: DeliveryGate,
    stop: Arc<AtomicBool>,
    running: AtomicBool,
    /// Set once the handler has actually seen `connection_made`.
    announced: AtomicBool,
}

impl Session {
    fn new(armed: bool) -> Self {
        Self {
            gate: if armed {
                DeliveryGate::armed()
            } else {
                DeliveryGate::default()
            },
            stop: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(false),
            announced: AtomicBool::new(false),
        }
    }
}

enum Event {
    Made,
    Lost,
    Message(Bytes),
}

struct ConnectionShared {
    handler: Arc<dyn ConnectionHandler>,
    config: ConnectionConfig,
    stream: RwLock<Option<Arc<Ocp1Stream>>>,
    session: Mutex<Arc<Session>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    reported_connected: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionShared {
    fn current_stream(&self) -> Option<Arc<Ocp1Stream>> {
        self.stream
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install_stream(&self, stream: Arc<Ocp1Stream>) {
        *self.stream.write().unwrap_or_else(PoisonError::into_inner) = Some(stream);
    }

    fn take_stream(&self) -> Option<Arc<Ocp1Stream>> {
        self.stream
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Drop `stream` if it is still the installed one.
    fn delete_stream_if(&self, stream: &Arc<Ocp1Stream>) {
        let mut slot = self.stream.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, stream)) {
            *slot = None;
        }
        drop(slot);
        let _ = stream.shutdown();
    }

    fn current_session(&self) -> Arc<Session> {
        Arc::clone(&lock(&self.session))
    }

    fn dispatch(&self, session: &Arc<Session>, event: Event) {
        let handler = Arc::clone(&self.handler);
        let session = Arc::clone(session);
        let deliver = move || {
            session.gate.if_armed(|| match event {
                Event::Made => {
                    handler.connection_made();
                    session.announced.store(true, Ordering::Release);
                }
                Event::Lost => handler.connection_lost(),
                Event::Message(data) => handler.message_received(data),
            });
        };

        match &self.config.callback_mode {
            CallbackMode::Inline => deliver(),
            CallbackMode::Dispatcher(dispatcher) => dispatcher.post(deliver),
        }
    }

    fn connection_made_int(&self, session: &Arc<Session>) {
        if !self.reported_connected.swap(true, Ordering::AcqRel) {
            self.dispatch(session, Event::Made);
        }
    }

    /// Report a loss outside any session gate, on the callback context.
    ///
    /// With a dispatcher this waits up to `timeout` for the callback to run.
    fn report_lost(&self, timeout: Duration) {
        match &self.config.callback_mode {
            CallbackMode::Dispatcher(dispatcher) if !dispatcher.is_dispatch_thread() => {
                let handler = Arc::clone(&self.handler);
                dispatcher.post(move || handler.connection_lost());
                if !dispatcher.flush(timeout) {
                    warn!(?timeout, "connection-lost callback still pending");
                }
            }
            _ => self.handler.connection_lost(),
        }
    }

    fn connection_lost_int(&self, session: &Arc<Session>) {
        if self.reported_connected.swap(false, Ordering::AcqRel) {
            self.dispatch(session, Event::Lost);
        }
    }

    fn read_loop(&self, session: Arc<Session>) {
        debug!("read thread started");
        let frame_config = self.config.frame_config();

        while !session.stop.load(Ordering::Acquire) {
            let Some(stream) = self.current_stream() else {
                break;
            };

            match stream.wait_readable(self.config.poll_interval) {
                Ok(Readiness::TimedOut) => continue,
                Ok(Readiness::Ready) => {}
                Err(err) => {
                    if !session.stop.load(Ordering::Acquire) {
                        debug!(error = %err, "socket error, dropping connection");
                        self.delete_stream_if(&stream);
                        self.connection_lost_int(&session);
                    }
                    break;
                }
            }

            let mut reader = FrameReader::with_config(&*stream, frame_config.clone())
                .with_stop_flag(Arc::clone(&session.stop));
            match reader.read_frame() {
                Ok(frame) => {
                    debug!(size = frame.len(), "message received");
                    self.dispatch(&session, Event::Message(frame));
                }
                Err(FrameError::Aborted) => break,
                Err(_) if session.stop.load(Ordering::Acquire) => break,
                Err(err) => {
                    info!(error = %err, "connection lost");
                    self.delete_stream_if(&stream);
                    self.connection_lost_int(&session);
                    break;
                }
            }
        }

        session.running.store(false, Ordering::Release);
        debug!("read thread stopped");
    }
}

/// A single OCP.1 connection: one stream plus its read thread.
pub struct Connection {
    shared: Arc<ConnectionShared>,
}

impl Connection {
    pub fn new(handler: Arc<dyn ConnectionHandler>, config: ConnectionConfig) -> Self {
        Self {
            shared: Arc::new(ConnectionShared {
                handler,
                config,
                stream: RwLock::new(None),
                session: Mutex::new(Arc::new(Session::new(false))),
                reader: Mutex::new(None),
                reported_connected: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Tear down any current stream, then connect to `host:port`.
    ///
    /// A failed attempt leaves the connection disconnected and fires no
    /// callbacks.
    pub fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        if let Err(err) = self.disconnect(self.shared.config.stop_timeout, Notify::Yes) {
            warn!(error = %err, "previous connection did not shut down cleanly");
        }

        let stream = Ocp1Stream::connect(host, port, timeout)?;
        debug!(host, port, "connected");
        self.initialise_with_stream(stream)
    }

    /// Adopt an already connected stream and start reading from it.
    pub fn initialise_with_stream(&self, stream: Ocp1Stream) -> Result<()> {
        // Lets body reads wake up to check the stop flag.
        stream.set_read_timeout(Some(self.shared.config.poll_interval))?;
        let stream = Arc::new(stream);
        self.shared.install_stream(Arc::clone(&stream));

        let session = Arc::new(Session::new(true));
        session.running.store(true, Ordering::Release);
        *lock(&self.shared.session) = Arc::clone(&session);
        self.shared.connection_made_int(&session);

        let spawned = thread::Builder::new().name("nanoocp-read".to_string()).spawn({
            let shared = Arc::clone(&self.shared);
            let session = Arc::clone(&session);
            move || shared.read_loop(session)
        });

        match spawned {
            Ok(handle) => {
                *lock(&self.shared.reader) = Some(handle);
                Ok(())
            }
            Err(err) => {
                session.gate.disarm();
                session.running.store(false, Ordering::Release);
                self.shared.delete_stream_if(&stream);
                self.shared.reported_connected.store(false, Ordering::Release);
                Err(PeerError::Spawn(err))
            }
        }
    }

    /// Stop the read thread, close the stream and optionally report the
    /// loss.
    ///
    /// Safe to call repeatedly. Deliveries are disarmed first. With
    /// [`Notify::Yes`] the handler's `connection_lost` runs once if it had
    /// seen `connection_made`: inline on this thread, or on the dispatcher,
    /// in which case this waits for it. If the read thread does not finish
    /// within `timeout` it is left running and
    /// [`PeerError::ThreadStopTimeout`] is returned after cleanup.
    pub fn disconnect(&self, timeout: Duration, notify: Notify) -> Result<()> {
        let session = self.shared.current_session();
        session.gate.disarm();
        session.stop.store(true, Ordering::Release);

        let reader = lock(&self.shared.reader).take();
        if let Some(stream) = self.shared.current_stream() {
            let _ = stream.shutdown();
        }

        let result = match reader {
            Some(handle) => join_bounded(handle, timeout),
            None => Ok(()),
        };

        if self.shared.take_stream().is_some() {
            debug!("stream released");
        }

        let was_reported = self.shared.reported_connected.swap(false, Ordering::AcqRel);
        let announced = session.announced.swap(false, Ordering::AcqRel);
        if notify == Notify::Yes && was_reported && announced {
            self.shared.report_lost(timeout);
        }

        result
    }

    pub fn is_connected(&self) -> bool {
        self.shared.current_stream().is_some()
            && self.shared.current_session().running.load(Ordering::Acquire)
    }

    /// Write one serialized message in a single call.
    pub fn send_message(&self, data: &[u8]) -> Result<()> {
        let stream = self.shared.current_stream().ok_or(PeerError::NotConnected)?;
        FrameWriter::new(&*stream).write_message(data)?;
        Ok(())
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        self.send_message(&message.to_bytes())
    }

    /// Host name or address of the connected peer.
    pub fn connected_host_name(&self) -> Option<String> {
        self.shared.current_stream().map(|stream| stream.host_name())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let timeout = self.shared.config.stop_timeout;
        if let Err(err) = self.disconnect(timeout, Notify::No) {
            warn!(error = %err, "connection dropped while its read thread was still running");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("peer", &self.connected_host_name())
            .finish()
    }
}
