//! Retention engine tying groups, the subscriber directory and the report
//! bus together.

use crate::config::EngineConfig;
use crate::directory::{Subscriber, SubscriberDirectory};
use crate::error::{EngineError, Result};
use crate::groups::Group;
use crate::hashing::UniversalHash;
use crate::reports::{
    ArchiveListing, ConsumeReport, ConsumedGroup, EngineReport, EngineSnapshot, GroupListing,
    GroupMembers, GroupSnapshot, PruneReport, PrunedGroup, PublishReport, ReportBus,
    SubscribeReport, SubscriberArchive, SubscriberSnapshot, UnsubscribeReport,
};
use crate::types::{Event, EventId, GroupId, SubscriberId, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The retention-and-consumption index.
///
/// Provides the five caller-driven operations:
/// - `publish`: index an event into its groups' live stores
/// - `subscribe`: register a subscriber and its interests
/// - `prune`: move events at or before a threshold into subscriber archives
/// - `consume`: read each archive forward from the subscriber's cursor
/// - `unsubscribe`: drop a subscriber and everything archived for it
///
/// Every operation validates its arguments before touching any structure, so
/// a rejected call leaves the engine unchanged.
pub struct RetentionEngine {
    config: EngineConfig,

    /// One per group id, index == id.
    groups: Vec<Group>,

    directory: SubscriberDirectory,

    /// Shared with watchers; receives every successful operation's report.
    reports: Arc<ReportBus>,
}

impl RetentionEngine {
    /// Build an engine. Fails with `InvalidConfig` if the configuration is
    /// unusable.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let hash = match config.hash_params {
            Some(params) => UniversalHash::with_params(params, config.prime, config.table_size)?,
            None => UniversalHash::random(config.prime, config.table_size)?,
        };
        let groups = (0..config.groups).map(|g| Group::new(GroupId(g))).collect();

        info!(
            groups = config.groups,
            table_size = config.table_size,
            prime = config.prime,
            "retention engine initialized"
        );

        Ok(Self {
            config,
            groups,
            directory: SubscriberDirectory::new(hash),
            reports: Arc::new(ReportBus::new()),
        })
    }

    // --- Accessors ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.directory.len()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0)
    }

    pub fn subscriber(&self, id: SubscriberId) -> Option<&Subscriber> {
        self.directory.get(id)
    }

    pub fn directory(&self) -> &SubscriberDirectory {
        &self.directory
    }

    pub fn report_bus(&self) -> Arc<ReportBus> {
        Arc::clone(&self.reports)
    }

    // --- Validation ---

    fn timestamp(value: i64) -> Result<Timestamp> {
        u64::try_from(value)
            .map(Timestamp)
            .map_err(|_| EngineError::InvalidArgument(format!("negative timestamp {}", value)))
    }

    fn identifier(value: i64) -> Result<u64> {
        u64::try_from(value)
            .map_err(|_| EngineError::InvalidArgument(format!("negative id {}", value)))
    }

    /// Filter a group list down to the ids in `0..MG`, ascending and without
    /// duplicates. Out-of-range ids are skipped; only a list with nothing
    /// valid left is rejected.
    fn group_set(&self, groups: &[i64]) -> Result<Vec<GroupId>> {
        let limit = self.groups.len();
        let mut set: Vec<GroupId> = groups
            .iter()
            .filter_map(|&g| usize::try_from(g).ok())
            .filter(|&idx| idx < limit)
            .map(GroupId)
            .collect();
        set.sort_unstable();
        set.dedup();

        if set.len() < groups.len() {
            debug!(requested = groups.len(), kept = set.len(), "group list filtered");
        }
        if set.is_empty() {
            return Err(EngineError::InvalidArgument(format!(
                "no group in 0..{} among {:?}",
                limit, groups
            )));
        }
        Ok(set)
    }

    /// An id is taken while it is live in any group, or while any subscriber
    /// archive holds it at the same timestamp.
    fn event_id_taken(&self, id: EventId, timestamp: Timestamp) -> bool {
        self.groups.iter().any(|g| g.has_event(id))
            || self
                .directory
                .iter()
                .any(|s| s.has_archived(timestamp, id))
    }

    // --- Operations ---

    /// Publish an event into each of `groups`.
    pub fn publish(&mut self, timestamp: i64, id: i64, groups: &[i64]) -> Result<PublishReport> {
        let report = self
            .try_publish(timestamp, id, groups)
            .inspect_err(|e| debug!(timestamp, id, error = %e, "publish rejected"))?;
        self.reports.publish(&EngineReport::Published(report.clone()));
        Ok(report)
    }

    fn try_publish(&mut self, timestamp: i64, id: i64, groups: &[i64]) -> Result<PublishReport> {
        let timestamp = Self::timestamp(timestamp)?;
        let id = EventId(Self::identifier(id)?);
        let groups = self.group_set(groups)?;
        if self.event_id_taken(id, timestamp) {
            return Err(EngineError::DuplicateEvent(id));
        }

        let event = Event {
            id,
            timestamp,
            groups: groups.clone(),
        };
        for group in &groups {
            self.groups[group.0].insert_event(event.clone());
        }

        debug!(id = %id, timestamp = %timestamp, groups = groups.len(), "event published");

        Ok(PublishReport {
            event: id,
            timestamp,
            groups: groups.iter().map(|&g| self.listing(g)).collect(),
        })
    }

    /// Register a subscriber interested in `groups`.
    pub fn subscribe(&mut self, timestamp: i64, id: i64, groups: &[i64]) -> Result<SubscribeReport> {
        let report = self
            .try_subscribe(timestamp, id, groups)
            .inspect_err(|e| debug!(timestamp, id, error = %e, "subscribe rejected"))?;
        self.reports.publish(&EngineReport::Subscribed(report.clone()));
        Ok(report)
    }

    fn try_subscribe(&mut self, timestamp: i64, id: i64, groups: &[i64]) -> Result<SubscribeReport> {
        let registered_at = Self::timestamp(timestamp)?;
        let id = SubscriberId(Self::identifier(id)?);
        let groups = self.group_set(groups)?;
        if self.directory.contains(id) {
            return Err(EngineError::DuplicateSubscriber(id));
        }

        for group in &groups {
            self.groups[group.0].add_subscriber(id);
        }
        self.directory
            .insert(Subscriber::new(id, registered_at, &groups, self.groups.len()))?;

        debug!(subscriber = %id, groups = groups.len(), "subscriber registered");

        Ok(SubscribeReport {
            subscriber: id,
            registered_at,
            directory: self.directory.ids(),
            groups: groups.iter().map(|&g| self.members(g)).collect(),
        })
    }

    /// Archive every live event with `timestamp <= threshold` into the
    /// archives of the group's subscribers, then drop it from the live store.
    pub fn prune(&mut self, threshold: i64) -> Result<PruneReport> {
        let report = self
            .try_prune(threshold)
            .inspect_err(|e| debug!(threshold, error = %e, "prune rejected"))?;
        self.reports.publish(&EngineReport::Pruned(report.clone()));
        Ok(report)
    }

    fn try_prune(&mut self, threshold: i64) -> Result<PruneReport> {
        let threshold = Self::timestamp(threshold)?;

        let mut pruned = Vec::with_capacity(self.groups.len());
        for group in self.groups.iter_mut() {
            let gid = group.id();
            let expired = group.take_expired(threshold);

            for &sid in group.subscribers() {
                let Some(archive) = self
                    .directory
                    .get_mut(sid)
                    .and_then(|s| s.archive_mut(gid))
                else {
                    warn!(group = %gid, subscriber = %sid, "group lists a subscriber with no archive");
                    continue;
                };
                for event in &expired {
                    archive.archive(event.archived());
                }
            }

            if !expired.is_empty() {
                debug!(
                    group = %gid,
                    archived = expired.len(),
                    subscribers = group.subscribers().len(),
                    "group pruned"
                );
            }

            pruned.push(PrunedGroup {
                group: gid,
                archived: expired.iter().map(|e| e.id).collect(),
                live: group.live_ids(),
                subscribers: group.subscribers().to_vec(),
            });
        }

        let report = PruneReport {
            threshold,
            groups: pruned,
            subscribers: self
                .directory
                .iter()
                .map(|s| SubscriberArchive {
                    subscriber: s.id(),
                    archives: Self::archive_listings(s),
                })
                .collect(),
        };

        info!(
            threshold = %threshold,
            archived = report.archived_count(),
            "prune complete"
        );

        Ok(report)
    }

    /// Read every interested group's archive forward from the cursor.
    ///
    /// Deltas are reported oldest first.
    pub fn consume(&mut self, id: i64) -> Result<ConsumeReport> {
        let report = self
            .try_consume(id)
            .inspect_err(|e| debug!(id, error = %e, "consume rejected"))?;
        self.reports.publish(&EngineReport::Consumed(report.clone()));
        Ok(report)
    }

    fn try_consume(&mut self, id: i64) -> Result<ConsumeReport> {
        let id = SubscriberId(Self::identifier(id)?);
        let subscriber = self
            .directory
            .get_mut(id)
            .ok_or(EngineError::SubscriberNotFound(id))?;

        let groups: Vec<ConsumedGroup> = subscriber
            .archives_mut()
            .map(|(group, archive)| {
                let consumed = archive.consume();
                ConsumedGroup {
                    group,
                    delivered: consumed.delivered,
                    cursor: consumed.cursor,
                }
            })
            .collect();

        debug!(
            subscriber = %id,
            delivered = groups.iter().map(|g| g.delivered.len()).sum::<usize>(),
            "subscriber consumed"
        );

        Ok(ConsumeReport {
            subscriber: id,
            groups,
        })
    }

    /// Remove a subscriber from its groups and the directory, releasing its
    /// archives.
    pub fn unsubscribe(&mut self, id: i64) -> Result<UnsubscribeReport> {
        let report = self
            .try_unsubscribe(id)
            .inspect_err(|e| debug!(id, error = %e, "unsubscribe rejected"))?;
        self.reports
            .publish(&EngineReport::Unsubscribed(report.clone()));
        Ok(report)
    }

    fn try_unsubscribe(&mut self, id: i64) -> Result<UnsubscribeReport> {
        let id = SubscriberId(Self::identifier(id)?);
        let interests = self
            .directory
            .get(id)
            .ok_or(EngineError::SubscriberNotFound(id))?
            .interests();

        for group in &interests {
            self.groups[group.0].remove_subscriber(id);
        }
        let released = self
            .directory
            .remove(id)
            .map(|s| s.archived_len())
            .unwrap_or(0);

        debug!(subscriber = %id, released, "subscriber removed");

        Ok(UnsubscribeReport {
            subscriber: id,
            released,
            directory: self.directory.ids(),
            groups: interests.iter().map(|&g| self.members(g)).collect(),
        })
    }

    /// Listing of every group and subscriber.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            groups: self
                .groups
                .iter()
                .map(|g| GroupSnapshot {
                    group: g.id(),
                    live: g.live_ids(),
                    subscribers: g.subscribers().to_vec(),
                })
                .collect(),
            subscribers: self
                .directory
                .iter()
                .map(|s| SubscriberSnapshot {
                    subscriber: s.id(),
                    registered_at: s.registered_at(),
                    archives: Self::archive_listings(s),
                })
                .collect(),
            group_count: self.groups.len(),
            subscriber_count: self.directory.len(),
        }
    }

    // --- Report helpers ---

    fn listing(&self, group: GroupId) -> GroupListing {
        GroupListing {
            group,
            live: self.groups[group.0].live_ids(),
        }
    }

    fn members(&self, group: GroupId) -> GroupMembers {
        GroupMembers {
            group,
            subscribers: self.groups[group.0].subscribers().to_vec(),
        }
    }

    fn archive_listings(subscriber: &Subscriber) -> Vec<ArchiveListing> {
        subscriber
            .archives()
            .map(|(group, archive)| ArchiveListing {
                group,
                events: archive.tree().ids(),
            })
            .collect()
    }
}

/// Thread-safe handle to a [`RetentionEngine`].
///
/// Operations from any number of threads are serialized; each runs to
/// completion before the next starts.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<RetentionEngine>>,
    reports: Arc<ReportBus>,
}

impl SharedEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self::from_engine(RetentionEngine::new(config)?))
    }

    pub fn from_engine(engine: RetentionEngine) -> Self {
        let reports = engine.report_bus();
        Self {
            inner: Arc::new(Mutex::new(engine)),
            reports,
        }
    }

    pub fn publish(&self, timestamp: i64, id: i64, groups: &[i64]) -> Result<PublishReport> {
        self.inner.lock().publish(timestamp, id, groups)
    }

    pub fn subscribe(&self, timestamp: i64, id: i64, groups: &[i64]) -> Result<SubscribeReport> {
        self.inner.lock().subscribe(timestamp, id, groups)
    }

    pub fn prune(&self, threshold: i64) -> Result<PruneReport> {
        self.inner.lock().prune(threshold)
    }

    pub fn consume(&self, id: i64) -> Result<ConsumeReport> {
        self.inner.lock().consume(id)
    }

    pub fn unsubscribe(&self, id: i64) -> Result<UnsubscribeReport> {
        self.inner.lock().unsubscribe(id)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.lock().snapshot()
    }

    /// Run a read-only closure against the engine.
    pub fn with<R>(&self, f: impl FnOnce(&RetentionEngine) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn report_bus(&self) -> Arc<ReportBus> {
        Arc::clone(&self.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(groups: usize) -> RetentionEngine {
        RetentionEngine::new(EngineConfig::new(groups, 11, 101).with_hash_params(7, 3)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = RetentionEngine::new(EngineConfig::new(4, 11, 100));
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_group_set_dedups_and_sorts() {
        let engine = engine(5);
        let set = engine.group_set(&[3, 1, 3, 0, 1]).unwrap();
        assert_eq!(set, vec![GroupId(0), GroupId(1), GroupId(3)]);
        assert!(engine.group_set(&[]).is_err());
        assert!(engine.group_set(&[5]).is_err());
        assert!(engine.group_set(&[-1, 9]).is_err());
    }

    #[test]
    fn test_group_set_skips_out_of_range() {
        let engine = engine(3);
        let set = engine.group_set(&[7, 2, -4, 0, 3, 2]).unwrap();
        assert_eq!(set, vec![GroupId(0), GroupId(2)]);
    }

    #[test]
    fn test_publish_then_prune_then_consume() {
        let mut engine = engine(2);
        engine.publish(1, 5, &[0]).unwrap();
        engine.publish(2, 6, &[0]).unwrap();
        engine.subscribe(0, 100, &[0]).unwrap();

        let pruned = engine.prune(2).unwrap();
        assert_eq!(pruned.archived_count(), 2);
        assert!(engine.group(GroupId(0)).unwrap().live_ids().is_empty());

        let consumed = engine.consume(100).unwrap();
        assert_eq!(
            consumed.delivered(GroupId(0)),
            Some(&[EventId(5), EventId(6)][..])
        );
        assert_eq!(consumed.groups[0].cursor, Some(EventId(6)));
        assert!(engine.consume(100).unwrap().is_empty());
    }

    #[test]
    fn test_prune_without_subscribers_discards() {
        let mut engine = engine(1);
        engine.publish(1, 1, &[0]).unwrap();
        let report = engine.prune(5).unwrap();
        assert_eq!(report.groups[0].archived, vec![EventId(1)]);
        assert!(report.subscribers.is_empty());
        // nothing holds the id any more
        engine.publish(1, 1, &[0]).unwrap();
    }

    #[test]
    fn test_event_id_taken_by_archive_at_same_timestamp() {
        let mut engine = engine(1);
        engine.subscribe(0, 1, &[0]).unwrap();
        engine.publish(3, 9, &[0]).unwrap();
        engine.prune(3).unwrap();

        assert!(engine.event_id_taken(EventId(9), Timestamp(3)));
        assert!(!engine.event_id_taken(EventId(9), Timestamp(4)));
    }

    #[test]
    fn test_unsubscribe_reports_released() {
        let mut engine = engine(2);
        engine.subscribe(0, 7, &[0, 1]).unwrap();
        engine.publish(1, 1, &[0, 1]).unwrap();
        engine.prune(1).unwrap();

        let report = engine.unsubscribe(7).unwrap();
        assert_eq!(report.released, 2);
        assert_eq!(report.groups.len(), 2);
        assert!(report.groups.iter().all(|g| g.subscribers.is_empty()));
        assert_eq!(engine.subscriber_count(), 0);
    }

    #[test]
    fn test_shared_engine_serializes_operations() {
        let shared = SharedEngine::new(EngineConfig::new(4, 11, 101)).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        shared.publish(i, t * 100 + i, &[t]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let total: usize = shared.with(|e| (0..4).map(|g| e.group(GroupId(g)).unwrap().live_len()).sum());
        assert_eq!(total, 100);
    }
}
