//! Connection management for OCP.1 controllers and devices.
//!
//! [`Connection`] is the engine: a TCP stream, a read thread delivering
//! whole messages, and a delivery gate that keeps callbacks from reaching
//! a connection being torn down. [`Client`] adds reconnect-on-loss,
//! [`Server`] accepts a single session at a time.
//!
//! Callbacks run on a shared dispatcher thread by default
//! ([`CallbackMode::Dispatcher`]), or directly on the read thread with
//! [`CallbackMode::Inline`].

pub mod acceptor;
pub mod callbacks;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod handler;
pub mod server;
pub mod timer;
mod worker;

pub use acceptor::Acceptor;
pub use callbacks::{Callbacks, DataCallback, StateCallback};
pub use client::Client;
pub use config::{CallbackMode, ClientConfig, ConnectionConfig, ServerConfig};
pub use connection::{Connection, Notify};
pub use dispatch::CallbackDispatcher;
pub use error::{PeerError, Result};
pub use gate::DeliveryGate;
pub use handler::ConnectionHandler;
pub use server::Server;
pub use timer::RetryTimer;
