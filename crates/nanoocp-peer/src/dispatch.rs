use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single thread that runs posted callbacks one after another.
///
/// Events posted from any thread are delivered in posting order on the
/// dispatch thread, which gives handlers a single callback context no
/// matter how many connections feed it.
#[derive(Clone)]
pub struct CallbackDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    sender: Option<Sender<Job>>,
    thread: Option<ThreadId>,
    name: String,
}

impl CallbackDispatcher {
    /// Start a dispatcher with its own named thread.
    ///
    /// If the thread cannot be spawned the dispatcher runs jobs inline on
    /// the posting thread.
    pub fn new(name: &str) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(receiver));

        let (sender, thread) = match spawned {
            Ok(handle) => (Some(sender), Some(handle.thread().id())),
            Err(err) => {
                error!(error = %err, name, "failed to spawn callback thread, running callbacks inline");
                (None, None)
            }
        };

        Self {
            inner: Arc::new(DispatcherInner {
                sender,
                thread,
                name: name.to_string(),
            }),
        }
    }

    /// The process wide dispatcher shared by connections that don't bring
    /// their own.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<CallbackDispatcher> = OnceLock::new();
        GLOBAL
            .get_or_init(|| CallbackDispatcher::new("nanoocp-callbacks"))
            .clone()
    }

    /// Queue `job` for the dispatch thread.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        let Some(sender) = &self.inner.sender else {
            job();
            return;
        };
        if let Err(err) = sender.send(Box::new(job)) {
            // Receiver gone: the dispatch thread died, deliver here instead.
            (err.into_inner())();
        }
    }

    pub fn is_dispatch_thread(&self) -> bool {
        self.inner.thread == Some(thread::current().id())
    }

    /// Wait until everything posted before this call has run.
    ///
    /// Returns `false` if that takes longer than `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.is_dispatch_thread() {
            return true;
        }
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        self.post(move || {
            let _ = done_tx.send(());
        });
        done_rx.recv_timeout(timeout).is_ok()
    }
}

impl fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("name", &self.inner.name)
            .field("threaded", &self.inner.sender.is_some())
            .finish()
    }
}

fn run(receiver: Receiver<Job>) {
    for job in receiver {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("callback panicked");
        }
    }
    debug!("callback dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_jobs_run_in_order_on_dispatch_thread() {
        let dispatcher = CallbackDispatcher::new("test-dispatch");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = Arc::clone(&seen);
            let check = dispatcher.clone();
            dispatcher.post(move || {
                assert!(check.is_dispatch_thread());
                seen.lock().expect("lock should not be poisoned").push(i);
            });
        }

        assert!(dispatcher.flush(Duration::from_secs(5)));
        let seen = seen.lock().expect("lock should not be poisoned");
        assert_eq!(*seen, (0..50).collect::<Vec<_>>());
        assert!(!dispatcher.is_dispatch_thread());
    }

    #[test]
    fn test_panicking_job_does_not_stop_dispatcher() {
        let dispatcher = CallbackDispatcher::new("test-panic");
        dispatcher.post(|| panic!("boom"));

        let (tx, rx) = crossbeam_channel::bounded(1);
        dispatcher.post(move || tx.send(42).expect("receiver should be alive"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(42));
    }

    #[test]
    fn test_flush_from_dispatch_thread() {
        let dispatcher = CallbackDispatcher::new("test-flush");
        let (tx, rx) = crossbeam_channel::bounded(1);
        let inner = dispatcher.clone();
        dispatcher.post(move || {
            tx.send(inner.flush(Duration::from_millis(10)))
                .expect("receiver should be alive");
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    }

    #[test]
    fn test_global_is_shared() {
        let a = CallbackDispatcher::global();
        let b = CallbackDispatcher::global();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
        assert!(format!("{a:?}").contains("nanoocp-callbacks"));
    }
}
