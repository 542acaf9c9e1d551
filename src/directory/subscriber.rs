//! Subscriber records and their per-group archives.

use crate::trees::{ConsumptionTree, Cursor};
use crate::types::{ArchivedEvent, EventId, GroupId, SubscriberId, Timestamp};

/// Result of reading one archive forward to its newest entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Consumed {
    /// Newly read ids, oldest first.
    pub delivered: Vec<EventId>,
    /// Id at the cursor after the read (None while the archive is empty).
    pub cursor: Option<EventId>,
}

/// Archive of one group for one subscriber.
#[derive(Clone, Debug, Default)]
pub struct GroupArchive {
    tree: ConsumptionTree,
    cursor: Cursor,
}

impl GroupArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pruned event, keeping the cursor on its list position.
    pub fn archive(&mut self, entry: ArchivedEvent) {
        self.tree.insert(entry, &mut self.cursor);
    }

    /// Everything after the cursor up to the newest entry, then advance.
    pub fn consume(&mut self) -> Consumed {
        let Some(newest) = self.tree.newest() else {
            return Consumed {
                delivered: Vec::new(),
                cursor: None,
            };
        };
        let delivered = self.tree.delta(self.cursor, newest);
        self.cursor = Some(newest);
        Consumed {
            delivered,
            cursor: Some(self.tree.entry(newest).id),
        }
    }

    /// Ids that a consume would return right now, without advancing.
    pub fn pending(&self) -> Vec<EventId> {
        match self.tree.newest() {
            Some(newest) => self.tree.delta(self.cursor, newest),
            None => Vec::new(),
        }
    }

    pub fn tree(&self) -> &ConsumptionTree {
        &self.tree
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Entry the cursor names, if any.
    pub fn cursor_entry(&self) -> Option<ArchivedEvent> {
        self.cursor.map(|p| self.tree.entry(p))
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Interest of one subscriber in one group.
#[derive(Clone, Debug)]
pub enum GroupSlot {
    NotInterested,
    Interested(GroupArchive),
}

impl GroupSlot {
    pub fn archive(&self) -> Option<&GroupArchive> {
        match self {
            GroupSlot::Interested(archive) => Some(archive),
            GroupSlot::NotInterested => None,
        }
    }

    pub fn archive_mut(&mut self) -> Option<&mut GroupArchive> {
        match self {
            GroupSlot::Interested(archive) => Some(archive),
            GroupSlot::NotInterested => None,
        }
    }
}

/// A registered subscriber.
#[derive(Clone, Debug)]
pub struct Subscriber {
    id: SubscriberId,
    registered_at: Timestamp,
    slots: Vec<GroupSlot>,
}

impl Subscriber {
    /// New subscriber with an empty archive for each group in `interests`.
    ///
    /// `interests` must already be validated against `group_count`.
    pub fn new(
        id: SubscriberId,
        registered_at: Timestamp,
        interests: &[GroupId],
        group_count: usize,
    ) -> Self {
        let mut slots = vec![GroupSlot::NotInterested; group_count];
        for group in interests {
            slots[group.0] = GroupSlot::Interested(GroupArchive::new());
        }
        Self {
            id,
            registered_at,
            slots,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn registered_at(&self) -> Timestamp {
        self.registered_at
    }

    pub fn slot(&self, group: GroupId) -> Option<&GroupSlot> {
        self.slots.get(group.0)
    }

    pub fn is_interested(&self, group: GroupId) -> bool {
        self.archive(group).is_some()
    }

    pub fn archive(&self, group: GroupId) -> Option<&GroupArchive> {
        self.slots.get(group.0).and_then(GroupSlot::archive)
    }

    pub fn archive_mut(&mut self, group: GroupId) -> Option<&mut GroupArchive> {
        self.slots.get_mut(group.0).and_then(GroupSlot::archive_mut)
    }

    /// Interested groups, ascending.
    pub fn interests(&self) -> Vec<GroupId> {
        self.archives().map(|(group, _)| group).collect()
    }

    /// `(group, archive)` for every interested group, ascending.
    pub fn archives(&self) -> impl Iterator<Item = (GroupId, &GroupArchive)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.archive().map(|a| (GroupId(i), a)))
    }

    pub fn archives_mut(&mut self) -> impl Iterator<Item = (GroupId, &mut GroupArchive)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.archive_mut().map(|a| (GroupId(i), a)))
    }

    /// Whether any archive holds exactly this `(timestamp, id)`.
    pub fn has_archived(&self, timestamp: Timestamp, id: EventId) -> bool {
        self.archives()
            .any(|(_, archive)| archive.tree().contains(timestamp, id))
    }

    /// Total archived entries across all groups.
    pub fn archived_len(&self) -> usize {
        self.archives().map(|(_, archive)| archive.len()).sum()
    }
}
