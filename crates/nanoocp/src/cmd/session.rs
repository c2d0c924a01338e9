use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use nanoocp_frame::{CommandDefinition, Message, Response};
use nanoocp_peer::{CallbackMode, Connection, ConnectionConfig, ConnectionHandler, Notify};
use tracing::debug;

use crate::cmd::TargetArgs;
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, TIMEOUT, TRANSPORT_ERROR, USAGE};

enum Inbound {
    Frame(Bytes),
    Lost,
}

struct Forward(Sender<Inbound>);

impl ConnectionHandler for Forward {
    fn connection_lost(&self) {
        let _ = self.0.send(Inbound::Lost);
    }

    fn message_received(&self, data: Bytes) {
        let _ = self.0.send(Inbound::Frame(data));
    }
}

/// A controller connection used by one CLI command.
pub struct Session {
    connection: Connection,
    inbound: Receiver<Inbound>,
    timeout: Duration,
}

impl Session {
    pub fn open(target: &TargetArgs) -> CliResult<Self> {
        let timeout = parse_duration(&target.timeout)?;
        let (tx, inbound) = crossbeam_channel::unbounded();
        let config = ConnectionConfig::default().with_callback_mode(CallbackMode::Inline);
        let connection = Connection::new(Arc::new(Forward(tx)), config);

        connection
            .connect(&target.host, target.port, timeout)
            .map_err(|err| peer_error("connect failed", err))?;
        debug!(host = %target.host, port = target.port, "session open");

        Ok(Self {
            connection,
            inbound,
            timeout,
        })
    }

    /// Send the command for `definition` and wait for its response.
    pub fn request(&self, definition: &CommandDefinition) -> CliResult<Response> {
        let command = definition.to_command();
        let handle = command.handle();
        self.connection
            .send(&Message::from(command))
            .map_err(|err| peer_error("send failed", err))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_message(remaining)? {
                Some(Message::Response(response)) if response.handle() == handle => {
                    return Ok(response)
                }
                Some(other) => debug!(kind = other.message_type().name(), "ignoring message"),
                None => {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("no response to handle {handle} within {:?}", self.timeout),
                    ))
                }
            }
        }
    }

    /// Wait up to `wait` for the next parseable message.
    ///
    /// `Ok(None)` means nothing arrived in time.
    pub fn next_message(&self, wait: Duration) -> CliResult<Option<Message>> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbound.recv_timeout(remaining) {
                Ok(Inbound::Frame(frame)) => match Message::unmarshal(&frame) {
                    Some(message) => return Ok(Some(message)),
                    None => debug!(size = frame.len(), "dropping unparseable message"),
                },
                Ok(Inbound::Lost) => {
                    return Err(CliError::new(TRANSPORT_ERROR, "connection lost"));
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CliError::new(INTERNAL, "connection handler dropped"));
                }
            }
        }
    }

    pub fn send(&self, message: &Message) -> CliResult<()> {
        self.connection
            .send(message)
            .map_err(|err| peer_error("send failed", err))
    }

    pub fn close(self) -> CliResult<()> {
        let timeout = self.connection.config().stop_timeout;
        self.connection
            .disconnect(timeout, Notify::No)
            .map_err(|err| peer_error("disconnect failed", err))
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
