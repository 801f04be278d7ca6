//! Upward change notifications.
//!
//! When the door's current state, target state or obstruction flag changes,
//! subscribers (the MQTT publisher, a host framework) are pushed a
//! [`DoorEvent`] immediately rather than having to poll.

use super::state::DoorEvent;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::broadcast;

/// Buffered events per subscriber before a slow subscriber starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Fan-out of door change events with a change counter.
///
/// The version is incremented once per emitted event, so callers can detect
/// changes without holding a subscription.
pub struct DoorNotifier {
    tx: broadcast::Sender<DoorEvent>,
    version: AtomicU32,
}

impl DoorNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tx,
            version: AtomicU32::new(0),
        }
    }

    /// Push a change to all subscribers. Never blocks; no subscribers is fine.
    pub fn notify(&self, event: DoorEvent) {
        self.version.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DoorEvent> {
        self.tx.subscribe()
    }

    /// Number of changes emitted so far.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }
}

impl Default for DoorNotifier {
    fn default() -> Self {
        Self::new()
    }
}
