use std::time::Duration;

/// Errors that can occur in connection, client and server operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] nanoocp_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] nanoocp_frame::FrameError),

    /// No stream is installed.
    #[error("not connected")]
    NotConnected,

    /// A background thread did not finish within its bound and was left
    /// running.
    #[error("background thread did not stop within {timeout:?}")]
    ThreadStopTimeout { timeout: Duration },

    /// A background thread could not be spawned.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeerError>;
