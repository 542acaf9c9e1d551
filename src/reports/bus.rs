//! Report bus fanning operation reports out to watchers.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::types::{DropReason, EngineReport, WatchConfig, WatchHandle, WatchId};

/// Internal watcher state.
struct Watcher {
    config: WatchConfig,
    sender: Sender<EngineReport>,
}

impl Watcher {
    /// Returns false if the buffer is full or the receiver is gone.
    fn try_send(&self, report: EngineReport) -> bool {
        self.sender.try_send(report).is_ok()
    }
}

/// Delivers reports to registered watchers.
pub struct ReportBus {
    watchers: RwLock<HashMap<WatchId, Watcher>>,
    next_id: AtomicU64,
}

impl ReportBus {
    pub fn new() -> Self {
        Self {
            watchers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a watcher.
    pub fn watch(&self, config: WatchConfig) -> WatchHandle {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.watchers.write().insert(id, Watcher { config, sender });

        WatchHandle { id, receiver }
    }

    /// Remove a watcher.
    pub fn unwatch(&self, id: WatchId) {
        if let Some(watcher) = self.watchers.write().remove(&id) {
            let _ = watcher.sender.try_send(EngineReport::Dropped {
                reason: DropReason::Unwatched,
            });
        }
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    /// Deliver a report to every matching watcher. Drops watchers that fail
    /// to receive.
    pub fn publish(&self, report: &EngineReport) {
        let mut to_remove = Vec::new();

        {
            let watchers = self.watchers.read();
            if watchers.is_empty() {
                return;
            }
            for (id, watcher) in watchers.iter() {
                if watcher.config.filter.matches(report) && !watcher.try_send(report.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut watchers = self.watchers.write();
            for id in to_remove {
                if let Some(watcher) = watchers.remove(&id) {
                    debug!(watcher = id.0, "dropping slow report watcher");
                    let _ = watcher.sender.try_send(EngineReport::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for ReportBus {
    fn default() -> Self {
        Self::new()
    }
}
