use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::error::{PeerError, Result};

const JOIN_POLL: Duration = Duration::from_millis(5);

/// Join `handle`, giving up after `timeout`.
///
/// Joining from the thread itself returns immediately. A thread that is
/// still running at the deadline is left detached and reported as
/// [`PeerError::ThreadStopTimeout`].
pub(crate) fn join_bounded(handle: JoinHandle<()>, timeout: Duration) -> Result<()> {
    if handle.thread().id() == thread::current().id() {
        return Ok(());
    }

    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            error!(
                thread = handle.thread().name().unwrap_or("unnamed"),
                ?timeout,
                "background thread did not stop in time"
            );
            return Err(PeerError::ThreadStopTimeout { timeout });
        }
        thread::sleep(JOIN_POLL);
    }

    if handle.join().is_err() {
        warn!("background thread panicked");
    }
    Ok(())
}
