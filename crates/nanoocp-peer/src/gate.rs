//! Shared flag deciding whether queued callbacks may still run.
//!
//! A connection hands an `Arc` of its gate to every event it queues. The
//! event checks the gate when it is finally delivered, never the connection
//! itself, so an event that outlives its connection is dropped instead of
//! reaching a handler that is being torn down.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct GateState {
    armed: bool,
    delivering: Vec<ThreadId>,
}

#[derive(Debug, Default)]
pub struct DeliveryGate {
    state: Mutex<GateState>,
    idle: Condvar,
}

impl DeliveryGate {
    /// A gate that lets deliveries through until disarmed.
    pub fn armed() -> Self {
        Self {
            state: Mutex::new(GateState {
                armed: true,
                delivering: Vec::new(),
            }),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed
    }

    /// Run `deliver` if the gate is still armed.
    ///
    /// The gate lock is not held while `deliver` runs, so the callback may
    /// disarm this gate itself.
    pub fn if_armed<R>(&self, deliver: impl FnOnce() -> R) -> Option<R> {
        {
            let mut state = self.lock();
            if !state.armed {
                return None;
            }
            state.delivering.push(thread::current().id());
        }
        let _delivery = Delivery { gate: self };
        Some(deliver())
    }

    /// Stop all further deliveries.
    ///
    /// Blocks until deliveries running on other threads have returned, so
    /// once this returns no callback guarded by the gate is executing or
    /// will start. A delivery on the calling thread is not waited for.
    pub fn disarm(&self) {
        let current = thread::current().id();
        let mut state = self.lock();
        state.armed = false;
        while state.delivering.iter().any(|id| *id != current) {
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct Delivery<'a> {
    gate: &'a DeliveryGate,
}

impl Drop for Delivery<'_> {
    fn drop(&mut self) {
        let current = thread::current().id();
        let mut state = self.gate.lock();
        if let Some(pos) = state.delivering.iter().position(|id| *id == current) {
            state.delivering.swap_remove(pos);
        }
        drop(state);
        self.gate.idle.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_armed_gate_delivers() {
        let gate = DeliveryGate::armed();
        assert!(gate.is_armed());
        assert_eq!(gate.if_armed(|| 7), Some(7));
    }

    #[test]
    fn test_disarmed_gate_drops() {
        let gate = DeliveryGate::armed();
        gate.disarm();
        assert!(!gate.is_armed());
        assert_eq!(gate.if_armed(|| 7), None);
        assert!(!DeliveryGate::default().is_armed());
    }

    #[test]
    fn test_disarm_from_inside_delivery() {
        let gate = DeliveryGate::armed();
        let result = gate.if_armed(|| {
            gate.disarm();
            gate.is_armed()
        });
        assert_eq!(result, Some(false));
    }

    #[test]
    fn test_disarm_waits_for_running_delivery() {
        let gate = Arc::new(DeliveryGate::armed());
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let worker = {
            let gate = Arc::clone(&gate);
            let finished = Arc::clone(&finished);
            std::thread::spawn(move || {
                gate.if_armed(|| {
                    started_tx.send(()).expect("test channel should be open");
                    std::thread::sleep(Duration::from_millis(100));
                    finished.store(true, Ordering::SeqCst);
                });
            })
        };

        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("delivery should start");
        gate.disarm();
        assert!(finished.load(Ordering::SeqCst));
        worker.join().expect("worker should finish");
    }

    #[test]
    fn test_no_delivery_after_disarm_returns() {
        let gate = Arc::new(DeliveryGate::armed());
        let delivered_after = Arc::new(AtomicUsize::new(0));
        let disarmed = Arc::new(AtomicBool::new(false));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let delivered_after = Arc::clone(&delivered_after);
                let disarmed = Arc::clone(&disarmed);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        gate.if_armed(|| {
                            if disarmed.load(Ordering::SeqCst) {
                                delivered_after.fetch_add(1, Ordering::SeqCst);
                            }
                        });
                    }
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(1));
        gate.disarm();
        disarmed.store(true, Ordering::SeqCst);

        for worker in workers {
            worker.join().expect("worker should finish");
        }
        assert_eq!(delivered_after.load(Ordering::SeqCst), 0);
    }
}
