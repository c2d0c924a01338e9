use std::time::Duration;

use nanoocp_frame::{FrameConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_CHUNK_SIZE};

use crate::dispatch::CallbackDispatcher;

/// Where connection events are delivered.
#[derive(Debug, Clone)]
pub enum CallbackMode {
    /// On the thread that produced the event (usually the read thread).
    Inline,
    /// Posted to a dispatcher thread.
    Dispatcher(CallbackDispatcher),
}

impl Default for CallbackMode {
    fn default() -> Self {
        Self::Dispatcher(CallbackDispatcher::global())
    }
}

/// Behavior of a single connection engine.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub callback_mode: CallbackMode,
    /// Readiness poll bound of the read thread. Default: 100 ms.
    pub poll_interval: Duration,
    /// Largest single read for a message body. Default: 64 KiB.
    pub read_chunk_size: usize,
    /// Messages declaring a larger size drop the connection. Default: 16 MiB.
    pub max_message_size: usize,
    /// Bound on waiting for the read thread during disconnect. Default: 1 s.
    pub stop_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            callback_mode: CallbackMode::default(),
            poll_interval: Duration::from_millis(100),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            stop_timeout: Duration::from_millis(1000),
        }
    }
}

impl ConnectionConfig {
    pub fn with_callback_mode(mut self, callback_mode: CallbackMode) -> Self {
        self.callback_mode = callback_mode;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_message_size: self.max_message_size,
            read_chunk_size: self.read_chunk_size,
        }
    }
}

/// Behavior of a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on each connect attempt. Default: 50 ms.
    pub connect_timeout: Duration,
    /// Delay between reconnect attempts. Default: 500 ms.
    pub retry_interval: Duration,
    pub connection: ConnectionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(50),
            retry_interval: Duration::from_millis(500),
            connection: ConnectionConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }
}

/// Behavior of a [`crate::Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How often the accept thread checks for shutdown. Default: 100 ms.
    pub accept_poll_interval: Duration,
    /// Bound on stopping the accept thread. Default: 4 s.
    pub stop_timeout: Duration,
    /// Applied to each accepted session.
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            accept_poll_interval: Duration::from_millis(100),
            stop_timeout: Duration::from_millis(4000),
            connection: ConnectionConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_accept_poll_interval(mut self, accept_poll_interval: Duration) -> Self {
        self.accept_poll_interval = accept_poll_interval;
        self
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }
}
