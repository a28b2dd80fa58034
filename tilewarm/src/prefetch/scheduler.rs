//! Bounded-concurrency cache warming.
//!
//! The scheduler holds a queue of planned candidates and a set of warmed
//! URLs (cached or in flight). Draining the queue starts warm requests until
//! the concurrency cap is reached; every completion frees a slot and drains
//! again.
//!
//! ```text
//! schedule(candidates) ──► pending queue ──drain──► warm request ──► complete
//!   (replaces queue)        skip if warmed    ▲       (spawned)         │
//!                                             └── free slot, drain ◄────┘
//! ```
//!
//! A URL enters the warmed set before its request starts, leaves it as soon
//! as the request fails, and stays after success. That gives at most one
//! outstanding request per URL.
//!
//! Opening a new image bumps the epoch. Requests still running for the
//! previous image move to a stale in-flight set, and their URLs stay
//! blocked until those requests finish.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, trace};

use crate::source::{TileWarmer, WarmError};

use super::events::{EngineEvent, EventBus};
use super::planner::PrefetchCandidate;

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrefetchStats {
    /// URLs cached or in flight.
    pub warmed_count: usize,
    /// Candidates waiting for a free slot.
    pub pending_count: usize,
    /// Warm requests currently in flight.
    pub active_count: usize,
    /// Warm requests started since the engine was created.
    pub requests_issued: u64,
    /// Warm requests that failed since the engine was created.
    pub requests_failed: u64,
}

impl PrefetchStats {
    /// Nothing pending and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.pending_count == 0 && self.active_count == 0
    }
}

#[derive(Debug)]
struct SchedulerState {
    warmed: HashSet<String>,
    /// URLs with a request outstanding in the current epoch.
    in_flight: HashSet<String>,
    /// URLs with a request outstanding from an earlier epoch.
    stale_in_flight: HashSet<String>,
    pending: VecDeque<PrefetchCandidate>,
    active: usize,
    max_concurrent: usize,
    /// Bumped on every image open. Completions from an older epoch only
    /// release their slot.
    epoch: u64,
    destroyed: bool,
    requests_issued: u64,
    requests_failed: u64,
}

struct Shared<W> {
    warmer: Arc<W>,
    state: Mutex<SchedulerState>,
    events: EventBus,
    runtime: Handle,
    idle: Notify,
}

/// Issues cache-warming requests under a concurrency cap.
pub struct FetchScheduler<W: TileWarmer + 'static> {
    shared: Arc<Shared<W>>,
}

impl<W: TileWarmer + 'static> Clone for FetchScheduler<W> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<W: TileWarmer + 'static> FetchScheduler<W> {
    /// Create a scheduler that spawns warm requests on `runtime`.
    pub fn new(warmer: Arc<W>, max_concurrent: usize, events: EventBus, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                warmer,
                state: Mutex::new(SchedulerState {
                    warmed: HashSet::new(),
                    in_flight: HashSet::new(),
                    stale_in_flight: HashSet::new(),
                    pending: VecDeque::new(),
                    active: 0,
                    max_concurrent: max_concurrent.max(1),
                    epoch: 0,
                    destroyed: false,
                    requests_issued: 0,
                    requests_failed: 0,
                }),
                events,
                runtime,
                idle: Notify::new(),
            }),
        }
    }

    /// Replace the pending queue with `candidates` and start draining.
    ///
    /// Candidates still waiting from an earlier pass are discarded; requests
    /// already in flight are unaffected.
    pub fn schedule(&self, candidates: Vec<PrefetchCandidate>) {
        {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return;
            }
            state.pending = candidates.into();
        }
        Self::drain(&self.shared);
    }

    /// Like [`schedule`](Self::schedule), but only if no reset happened
    /// since `epoch` was read.
    ///
    /// Returns `false` and leaves the queue untouched when the candidates
    /// were planned for an image that is no longer open.
    pub fn schedule_for(&self, epoch: u64, candidates: Vec<PrefetchCandidate>) -> bool {
        {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return false;
            }
            if state.epoch != epoch {
                debug!(
                    planned = epoch,
                    current = state.epoch,
                    "Dropping plan for a previous image"
                );
                return false;
            }
            state.pending = candidates.into();
        }
        Self::drain(&self.shared);
        true
    }

    /// Current epoch, bumped by every [`reset`](Self::reset).
    pub fn epoch(&self) -> u64 {
        self.shared.state.lock().epoch
    }

    /// Change the concurrency cap. Raising it starts queued requests at once.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.shared.state.lock().max_concurrent = max_concurrent.max(1);
        Self::drain(&self.shared);
    }

    /// Whether `url` is cached or currently being warmed.
    pub fn is_warmed(&self, url: &str) -> bool {
        self.shared.state.lock().warmed.contains(url)
    }

    pub fn stats(&self) -> PrefetchStats {
        let state = self.shared.state.lock();
        PrefetchStats {
            warmed_count: state.warmed.len(),
            pending_count: state.pending.len(),
            active_count: state.active,
            requests_issued: state.requests_issued,
            requests_failed: state.requests_failed,
        }
    }

    /// Forget everything warmed for the previous image.
    ///
    /// In-flight requests keep their slots until they complete, but their
    /// outcomes no longer touch the warmed set.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            return;
        }
        state.epoch += 1;
        let still_running: Vec<String> = state.in_flight.drain().collect();
        state.stale_in_flight.extend(still_running);
        state.warmed.clear();
        state.pending.clear();
        debug!(
            epoch = state.epoch,
            stale_in_flight = state.stale_in_flight.len(),
            "Prefetch scheduler reset"
        );
    }

    /// Make the scheduler inert.
    ///
    /// Clears the queue and warmed set. Outstanding requests are not
    /// aborted; their completions become no-ops. Calling this again does
    /// nothing.
    pub fn destroy(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.warmed.clear();
            state.in_flight.clear();
            state.stale_in_flight.clear();
            state.pending.clear();
            state.active = 0;
        }
        self.shared.idle.notify_waiters();
        info!("Prefetch scheduler destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().destroyed
    }

    /// Wait until nothing is pending or in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            {
                let state = self.shared.state.lock();
                if state.destroyed || (state.pending.is_empty() && state.active == 0) {
                    return;
                }
            }
            notified.await;
        }
    }

    fn drain(shared: &Arc<Shared<W>>) {
        let (launches, idle) = {
            let mut state = shared.state.lock();
            let mut launches = Vec::new();

            while !state.destroyed && state.active < state.max_concurrent {
                let Some(candidate) = state.pending.pop_front() else {
                    break;
                };
                if state.warmed.contains(&candidate.url) {
                    trace!(url = %candidate.url, "Skipping warmed tile");
                    continue;
                }
                if state.stale_in_flight.contains(&candidate.url) {
                    trace!(url = %candidate.url, "Skipping tile still in flight for a previous image");
                    continue;
                }

                state.warmed.insert(candidate.url.clone());
                state.in_flight.insert(candidate.url.clone());
                state.active += 1;
                state.requests_issued += 1;
                launches.push((candidate, state.epoch));
            }

            let idle = state.pending.is_empty() && state.active == 0;
            (launches, idle)
        };

        for (candidate, epoch) in launches {
            trace!(
                url = %candidate.url,
                level = candidate.level,
                priority = candidate.priority,
                "Starting warm request"
            );
            let task = Arc::clone(shared);
            shared.runtime.spawn(async move {
                let result = task.warmer.warm(&candidate.url).await;
                Self::complete(&task, candidate.url, epoch, result);
            });
        }

        if idle {
            shared.idle.notify_waiters();
        }
    }

    fn complete(shared: &Arc<Shared<W>>, url: String, epoch: u64, result: Result<(), WarmError>) {
        let current = {
            let mut state = shared.state.lock();
            if state.destroyed {
                trace!(url = %url, "Ignoring completion after destroy");
                return;
            }

            state.active = state.active.saturating_sub(1);
            let current = epoch == state.epoch;
            if current {
                state.in_flight.remove(&url);
            } else {
                state.stale_in_flight.remove(&url);
            }
            if result.is_err() {
                state.requests_failed += 1;
                if current {
                    state.warmed.remove(&url);
                }
            }
            current
        };

        match result {
            Ok(()) => {
                debug!(url = %url, "Tile warmed");
                if current {
                    shared.events.publish(EngineEvent::TileWarmed { url });
                }
            }
            Err(error) => {
                debug!(url = %url, error = %error, "Warm request failed");
                if current {
                    shared.events.publish(EngineEvent::WarmFailed { url, error });
                }
            }
        }

        Self::drain(shared);
    }
}
