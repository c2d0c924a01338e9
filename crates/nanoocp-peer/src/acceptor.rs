use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nanoocp_transport::{Ocp1Listener, Ocp1Stream};
use tracing::{debug, info, warn};

use crate::error::{PeerError, Result};
use crate::worker::join_bounded;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);
const DROP_STOP_TIMEOUT: Duration = Duration::from_secs(4);

/// A listening socket with its own accept thread.
///
/// Every accepted stream is passed to the `on_accept` callback on the
/// accept thread.
pub struct Acceptor {
    local: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Acceptor {
    /// Bind `address:port` and start accepting.
    ///
    /// An empty address listens on all IPv4 interfaces.
    pub fn begin<F>(address: &str, port: u16, poll_interval: Duration, mut on_accept: F) -> Result<Self>
    where
        F: FnMut(Ocp1Stream) + Send + 'static,
    {
        let listener = Ocp1Listener::bind(address, port)?;
        let local = listener.local_addr();
        let stop = Arc::new(AtomicBool::new(false));

        let handle = thread::Builder::new()
            .name("nanoocp-accept".to_string())
            .spawn({
                let stop = Arc::clone(&stop);
                move || {
                    while !stop.load(Ordering::Acquire) {
                        match listener.accept_timeout(poll_interval) {
                            Ok(Some(stream)) => {
                                info!(peer = %stream.host_name(), "accepted connection");
                                on_accept(stream);
                            }
                            Ok(None) => {}
                            Err(err) => {
                                warn!(error = %err, "accept failed");
                                thread::sleep(ACCEPT_ERROR_BACKOFF);
                            }
                        }
                    }
                    debug!(%local, "acceptor stopped");
                }
            })
            .map_err(PeerError::Spawn)?;

        Ok(Self {
            local,
            stop,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn bound_port(&self) -> u16 {
        self.local.port()
    }

    /// Stop accepting and wait at most `timeout` for the accept thread.
    pub fn stop(mut self, timeout: Duration) -> Result<()> {
        self.shutdown(timeout)
    }

    fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => join_bounded(handle, timeout),
            None => Ok(()),
        }
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        let _ = self.shutdown(DROP_STOP_TIMEOUT);
    }
}

impl std::fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acceptor")
            .field("local", &self.local)
            .field("running", &self.handle.is_some())
            .finish()
    }
}
