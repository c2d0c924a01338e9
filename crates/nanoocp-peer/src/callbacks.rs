use std::sync::{Arc, PoisonError, RwLock};

/// Called with every raw message received. The return value is ignored.
pub type DataCallback = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Called when a connection is established or lost.
pub type StateCallback = Arc<dyn Fn() + Send + Sync>;

/// The three user callbacks of a client or server.
///
/// Each slot can be replaced at any time. The current callback is cloned
/// out of its lock before being invoked, so a callback may replace itself.
#[derive(Default)]
pub struct Callbacks {
    data_received: RwLock<Option<DataCallback>>,
    connection_established: RwLock<Option<StateCallback>>,
    connection_lost: RwLock<Option<StateCallback>>,
}

fn current<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn replace<T>(slot: &RwLock<Option<T>>, value: Option<T>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl Callbacks {
    pub fn set_data_received(&self, callback: Option<DataCallback>) {
        replace(&self.data_received, callback);
    }

    pub fn set_connection_established(&self, callback: Option<StateCallback>) {
        replace(&self.connection_established, callback);
    }

    pub fn set_connection_lost(&self, callback: Option<StateCallback>) {
        replace(&self.connection_lost, callback);
    }

    pub(crate) fn data_received(&self, data: &[u8]) {
        if let Some(callback) = current(&self.data_received) {
            callback(data);
        }
    }

    pub(crate) fn connection_established(&self) {
        if let Some(callback) = current(&self.connection_established) {
            callback();
        }
    }

    pub(crate) fn connection_lost(&self) {
        if let Some(callback) = current(&self.connection_lost) {
            callback();
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("data_received", &current(&self.data_received).is_some())
            .field(
                "connection_established",
                &current(&self.connection_established).is_some(),
            )
            .field("connection_lost", &current(&self.connection_lost).is_some())
            .finish()
    }
}
