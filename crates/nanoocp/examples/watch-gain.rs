//! Persistent client: keeps a connection to a device, subscribes to one
//! gain property and prints every change.
//!
//! Run with:
//!   cargo run --example watch-gain --features peer -- 192.168.1.100 0x10002001

use std::time::Duration;

use nanoocp::frame::{CommandDefinition, DataType, Message, Variant};
use nanoocp::peer::{Client, ClientConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let ono = match args.next() {
        Some(raw) => u32::from_str_radix(raw.trim_start_matches("0x"), 16)?,
        None => 0x1000_2001,
    };
    let gain = CommandDefinition::new(ono, DataType::Float32, 4, 2);

    let client = Client::new(host, 50014, ClientConfig::default());
    client.on_data_received(move |data| {
        if let Some(Message::Notification(notification)) = Message::unmarshal(data) {
            if let Ok(value) =
                Variant::from_param_data(notification.parameter_data(), DataType::Float32)
            {
                println!("gain: {value}");
            }
        }
        true
    });

    let subscribe = Message::from(gain.add_subscription().to_command());
    let connected = client.start();
    eprintln!("connected on first attempt: {connected}");

    loop {
        if client.is_connected() {
            client.send(&subscribe)?;
            break;
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    std::thread::sleep(Duration::from_secs(60));
    client.stop()?;
    Ok(())
}
