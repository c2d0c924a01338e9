use bytes::Bytes;

/// Receives the lifecycle and data events of a [`crate::Connection`].
///
/// Depending on the connection's callback mode the methods run on the read
/// thread or on a dispatcher thread. `connection_made` and
/// `connection_lost` fire at most once per gained or lost connection.
pub trait ConnectionHandler: Send + Sync + 'static {
    fn connection_made(&self) {}

    fn connection_lost(&self) {}

    /// One complete framed message, header included.
    fn message_received(&self, data: Bytes);
}
