//! Minimal AES70 / OCP.1 client and server.
//!
//! nanoocp speaks the binary OCP.1 protocol to audio devices over TCP:
//! build get, set and subscription commands, send them over a persistent
//! connection that reconnects on its own, and decode the responses and
//! property-change notifications that come back.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP stream and listener with bounded waits
//! - [`frame`]: Header framing, the five message kinds, byte codec and [`frame::Variant`]
//! - [`peer`]: Connection engine plus client and server facades (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use nanoocp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use nanoocp_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use nanoocp_peer::*;
}
