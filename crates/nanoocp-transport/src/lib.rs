//! TCP transport for OCP.1 sessions.
//!
//! OCP.1 runs over a single persistent TCP stream per connection. This
//! crate is the lowest layer of nanoocp and provides:
//! - [`Ocp1Stream`]: a connected stream with connect timeout and a bounded
//!   readiness poll used by the read thread
//! - [`Ocp1Listener`]: a listening socket whose accept can be bounded in time
//!   so an acceptor thread can observe shutdown requests

pub mod error;
pub mod listener;
pub mod stream;

pub use error::{Result, TransportError};
pub use listener::Ocp1Listener;
pub use stream::{Ocp1Stream, Readiness};
