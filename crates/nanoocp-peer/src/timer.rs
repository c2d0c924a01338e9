use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, error, warn};

struct Running {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

/// A periodic timer on its own thread.
///
/// The tick callback runs every `interval` until it returns `false` or the
/// timer is stopped. Used to drive reconnect attempts.
#[derive(Default)]
pub struct RetryTimer {
    running: Mutex<Option<Running>>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start ticking. Does nothing while a previous timer thread is alive.
    pub fn start<F>(&self, interval: Duration, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let mut running = self.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }

        let (cancel, cancelled) = crossbeam_channel::bounded::<()>(1);
        let spawned = thread::Builder::new()
            .name("nanoocp-retry".to_string())
            .spawn(move || loop {
                match cancelled.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !tick() {
                            debug!("retry timer finished");
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        match spawned {
            Ok(handle) => *running = Some(Running { cancel, handle }),
            Err(err) => error!(error = %err, "failed to spawn retry timer"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Cancel the timer and wait for an in-flight tick to return.
    ///
    /// Called from inside a tick it only cancels.
    pub fn stop(&self) {
        let Some(Running { cancel, handle }) = self.lock().take() else {
            return;
        };
        let _ = cancel.try_send(());
        drop(cancel);

        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("retry timer thread panicked");
        }
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RetryTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryTimer")
            .field("running", &self.is_running())
            .finish()
    }
}
