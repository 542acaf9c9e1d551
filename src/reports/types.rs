//! Operation reports and watcher types.

use crate::types::{EventId, GroupId, SubscriberId, Timestamp};
use serde::{Deserialize, Serialize};

/// Live event ids of one group, ascending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupListing {
    pub group: GroupId,
    pub live: Vec<EventId>,
}

/// Subscriber list of one group, ascending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembers {
    pub group: GroupId,
    pub subscribers: Vec<SubscriberId>,
}

/// Full archive of one group for one subscriber, ascending timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveListing {
    pub group: GroupId,
    pub events: Vec<EventId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub event: EventId,
    pub timestamp: Timestamp,
    /// One entry per group the event went to.
    pub groups: Vec<GroupListing>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeReport {
    pub subscriber: SubscriberId,
    pub registered_at: Timestamp,
    /// Directory enumeration after registration.
    pub directory: Vec<SubscriberId>,
    /// One entry per group subscribed to.
    pub groups: Vec<GroupMembers>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunedGroup {
    pub group: GroupId,
    /// Ids moved out of the live store, in archival order.
    pub archived: Vec<EventId>,
    /// Ids still live, ascending.
    pub live: Vec<EventId>,
    pub subscribers: Vec<SubscriberId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberArchive {
    pub subscriber: SubscriberId,
    pub archives: Vec<ArchiveListing>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub threshold: Timestamp,
    /// Every group, ascending.
    pub groups: Vec<PrunedGroup>,
    /// Every subscriber, in directory order.
    pub subscribers: Vec<SubscriberArchive>,
}

impl PruneReport {
    /// Number of live events removed across all groups.
    pub fn archived_count(&self) -> usize {
        self.groups.iter().map(|g| g.archived.len()).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedGroup {
    pub group: GroupId,
    /// Newly read ids, oldest first.
    pub delivered: Vec<EventId>,
    /// Id at the cursor after the read.
    pub cursor: Option<EventId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeReport {
    pub subscriber: SubscriberId,
    /// One entry per interested group, ascending.
    pub groups: Vec<ConsumedGroup>,
}

impl ConsumeReport {
    /// Delta delivered for one group (None if not interested).
    pub fn delivered(&self, group: GroupId) -> Option<&[EventId]> {
        self.groups
            .iter()
            .find(|g| g.group == group)
            .map(|g| g.delivered.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.delivered.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeReport {
    pub subscriber: SubscriberId,
    /// Archived entries released with the subscriber.
    pub released: usize,
    pub directory: Vec<SubscriberId>,
    /// One entry per group the subscriber left.
    pub groups: Vec<GroupMembers>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group: GroupId,
    pub live: Vec<EventId>,
    pub subscribers: Vec<SubscriberId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberSnapshot {
    pub subscriber: SubscriberId,
    pub registered_at: Timestamp,
    pub archives: Vec<ArchiveListing>,
}

/// Whole-engine listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub groups: Vec<GroupSnapshot>,
    /// Directory order.
    pub subscribers: Vec<SubscriberSnapshot>,
    pub group_count: usize,
    pub subscriber_count: usize,
}

/// Which operation produced a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Publish,
    Subscribe,
    Prune,
    Consume,
    Unsubscribe,
}

/// Reports delivered to watchers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineReport {
    Published(PublishReport),
    Subscribed(SubscribeReport),
    Pruned(PruneReport),
    Consumed(ConsumeReport),
    Unsubscribed(UnsubscribeReport),

    /// Watcher was dropped.
    Dropped { reason: DropReason },
}

impl EngineReport {
    pub fn kind(&self) -> Option<ReportKind> {
        match self {
            EngineReport::Published(_) => Some(ReportKind::Publish),
            EngineReport::Subscribed(_) => Some(ReportKind::Subscribe),
            EngineReport::Pruned(_) => Some(ReportKind::Prune),
            EngineReport::Consumed(_) => Some(ReportKind::Consume),
            EngineReport::Unsubscribed(_) => Some(ReportKind::Unsubscribe),
            EngineReport::Dropped { .. } => None,
        }
    }

    /// Whether the report mentions `group`.
    pub fn touches(&self, group: GroupId) -> bool {
        match self {
            EngineReport::Published(r) => r.groups.iter().any(|g| g.group == group),
            EngineReport::Subscribed(r) => r.groups.iter().any(|g| g.group == group),
            EngineReport::Pruned(r) => r
                .groups
                .iter()
                .any(|g| g.group == group && !g.archived.is_empty()),
            EngineReport::Consumed(r) => r.groups.iter().any(|g| g.group == group),
            EngineReport::Unsubscribed(r) => r.groups.iter().any(|g| g.group == group),
            EngineReport::Dropped { .. } => false,
        }
    }
}

/// Why a watcher was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unwatched.
    Unwatched,
}

/// Filter criteria for watchers.
#[derive(Clone, Debug, Default)]
pub struct WatchFilter {
    /// Operation kinds (None = all).
    pub kinds: Option<Vec<ReportKind>>,

    /// Groups (None = all). Reports touching none of these are skipped.
    pub groups: Option<Vec<GroupId>>,
}

impl WatchFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kinds(kinds: Vec<ReportKind>) -> Self {
        Self {
            kinds: Some(kinds),
            ..Default::default()
        }
    }

    pub fn groups(groups: Vec<GroupId>) -> Self {
        Self {
            groups: Some(groups),
            ..Default::default()
        }
    }

    pub fn matches(&self, report: &EngineReport) -> bool {
        let Some(kind) = report.kind() else {
            return true;
        };
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&kind) {
                return false;
            }
        }
        if let Some(ref groups) = self.groups {
            if !groups.iter().any(|g| report.touches(*g)) {
                return false;
            }
        }
        true
    }
}

/// Configuration for a watcher.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Max buffered reports before the watcher is dropped.
    /// Default: 1000
    pub buffer_size: usize,

    pub filter: WatchFilter,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: WatchFilter::default(),
        }
    }
}

/// Unique identifier for a watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Handle to receive reports.
pub struct WatchHandle {
    pub id: WatchId,
    pub receiver: crossbeam_channel::Receiver<EngineReport>,
}

impl WatchHandle {
    /// Receive the next report (blocking).
    pub fn recv(&self) -> Result<EngineReport, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a report (non-blocking).
    pub fn try_recv(&self) -> Result<EngineReport, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<EngineReport, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<EngineReport> {
        self.receiver.try_iter().collect()
    }
}
