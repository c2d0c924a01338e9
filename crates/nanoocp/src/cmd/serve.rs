use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use nanoocp_frame::data::data_from_f32;
use nanoocp_frame::{KeepAlive, Message, Response};
use nanoocp_peer::{Server, ServerConfig};
use tracing::{debug, info, warn};

use crate::cmd::session::install_ctrlc_handler;
use crate::cmd::ServeArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_report, MessageReport, OutputFormat};

const POLL: Duration = Duration::from_millis(200);

enum Event {
    Established,
    Lost,
    Data(Vec<u8>),
}

/// What the stand-in device answers to one inbound message.
fn reply_to(message: &Message, reply_float: Option<f32>) -> Option<Message> {
    match message {
        Message::CommandResponseRequired(command) => {
            let response = match reply_float {
                Some(value) => Response::new(command.handle(), 0, 1, data_from_f32(value)),
                None => Response::new(command.handle(), 0, 0, Vec::new()),
            };
            Some(Message::from(response))
        }
        Message::KeepAlive(keepalive) => Some(Message::from(keepalive.clone())),
        _ => None,
    }
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let server = Server::new(args.bind.clone(), args.port, ServerConfig::default());
    let (tx, events) = crossbeam_channel::unbounded();

    let data_tx = tx.clone();
    server.on_data_received(move |data| data_tx.send(Event::Data(data.to_vec())).is_ok());
    let made_tx = tx.clone();
    server.on_connection_established(move || {
        let _ = made_tx.send(Event::Established);
    });
    server.on_connection_lost(move || {
        let _ = tx.send(Event::Lost);
    });

    server
        .start()
        .map_err(|err| peer_error("bind failed", err))?;
    if let Some(port) = server.bound_port() {
        info!(bind = %args.bind, port, "serving");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut answered = 0usize;
    while running.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match event {
            Event::Established => {
                info!(peer = ?server.connected_host_name(), "controller connected");
                let keepalive = Message::from(KeepAlive::from_seconds(args.keepalive));
                if let Err(err) = server.send(&keepalive) {
                    warn!(error = %err, "failed to send keep-alive");
                }
            }
            Event::Lost => info!("controller disconnected"),
            Event::Data(frame) => {
                let Some(message) = Message::unmarshal(&frame) else {
                    debug!(size = frame.len(), "ignoring unparseable message");
                    continue;
                };
                print_report(&MessageReport::new(&message), format);

                let Some(reply) = reply_to(&message, args.reply_float) else {
                    continue;
                };
                if let Err(err) = server.send(&reply) {
                    warn!(error = %err, "failed to send reply");
                    continue;
                }
                if matches!(message, Message::CommandResponseRequired(_)) {
                    answered = answered.saturating_add(1);
                    if args.count.is_some_and(|count| answered >= count) {
                        break;
                    }
                }
            }
        }
    }

    server
        .stop()
        .map_err(|err| peer_error("shutdown failed", err))?;
    Ok(SUCCESS)
}
