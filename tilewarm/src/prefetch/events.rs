//! Engine event feed.
//!
//! Events are published on a Tokio broadcast channel. Publishing never
//! blocks and never fails: a lagging subscriber loses its oldest events, and
//! having no subscribers at all is fine.

use tokio::sync::broadcast;

use crate::health::{ErrorState, HealthState, RecoveryPolicy};
use crate::source::WarmError;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something the engine did or decided.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A new image was opened; warmed state was cleared.
    ImageOpened { width: u64, height: u64, max_level: u32 },

    /// A planning pass produced candidates and replaced the pending queue.
    PlanScheduled {
        level: u32,
        candidates: usize,
        current_level: usize,
        adjacent_levels: usize,
    },

    /// A cache-warming request completed successfully.
    TileWarmed { url: String },

    /// A cache-warming request failed. The URL is eligible again.
    WarmFailed { url: String, error: WarmError },

    /// A failure signal was classified and needs a recovery action.
    Recovery {
        error: ErrorState,
        policy: RecoveryPolicy,
    },

    /// Rendered-tile health statistics were cleared.
    HealthReset { previous: HealthState },

    /// The engine was destroyed; no further events follow.
    Destroyed,
}

/// Broadcast publisher for [`EngineEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: EngineEvent) {
        // No subscribers is OK
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
