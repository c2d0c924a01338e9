//! Stand-in device: accepts one controller at a time and answers every
//! command with OK.
//!
//! Run with:
//!   cargo run --example stand-in-device --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- get --port 50014 --ono 0x10002001

use std::sync::Arc;

use nanoocp::frame::{KeepAlive, Message, Response};
use nanoocp::peer::{Server, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(Server::new("127.0.0.1", 50014, ServerConfig::default()));

    let replies = Arc::downgrade(&server);
    server.on_data_received(move |data| {
        let Some(server) = replies.upgrade() else {
            return false;
        };
        if let Some(Message::CommandResponseRequired(command)) = Message::unmarshal(data) {
            eprintln!(
                "command 0x{:08x} {}.{}",
                command.target_ono(),
                command.method_def_level(),
                command.method_index()
            );
            let reply = Response::new(command.handle(), 0, 0, Vec::new());
            if let Err(err) = server.send(&Message::from(reply)) {
                eprintln!("reply failed: {err}");
            }
        }
        true
    });

    let greeter = Arc::downgrade(&server);
    server.on_connection_established(move || {
        eprintln!("controller connected");
        if let Some(server) = greeter.upgrade() {
            let _ = server.send(&Message::from(KeepAlive::from_seconds(30)));
        }
    });
    server.on_connection_lost(|| eprintln!("controller disconnected"));

    server.start()?;
    eprintln!("listening on port {:?}, Ctrl-C to quit", server.bound_port());
    loop {
        std::thread::park();
    }
}
