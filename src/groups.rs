//! Interest groups: a Live Event Store plus the group's subscriber list.

use crate::trees::OrderedTree;
use crate::types::{Event, EventId, GroupId, SubscriberId, Timestamp};

/// One interest group.
pub struct Group {
    id: GroupId,
    /// Live Event Store, keyed by event id.
    live: OrderedTree<EventId, Event>,
    /// Ascending, no duplicates.
    subscribers: Vec<SubscriberId>,
}

impl Group {
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            live: OrderedTree::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    // --- Live Event Store ---

    /// Insert a live event. Returns false if the id was already live here.
    pub fn insert_event(&mut self, event: Event) -> bool {
        if self.live.contains_key(&event.id) {
            return false;
        }
        self.live.insert(event.id, event);
        true
    }

    pub fn get_event(&self, id: EventId) -> Option<&Event> {
        self.live.get(&id)
    }

    pub fn has_event(&self, id: EventId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn remove_event(&mut self, id: EventId) -> Option<Event> {
        self.live.remove(&id).map(|(_, event)| event)
    }

    /// Remove every live event at or before `threshold`, in post-order.
    pub fn take_expired(&mut self, threshold: Timestamp) -> Vec<Event> {
        self.live
            .extract_if(|_, event| event.timestamp <= threshold)
            .into_iter()
            .map(|(_, event)| event)
            .collect()
    }

    /// Live event ids, ascending.
    pub fn live_ids(&self) -> Vec<EventId> {
        self.live.keys().copied().collect()
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn live_height(&self) -> usize {
        self.live.height()
    }

    // --- Subscriber list ---

    /// Register a subscriber. Returns false if it was already listed.
    pub fn add_subscriber(&mut self, id: SubscriberId) -> bool {
        match self.subscribers.binary_search(&id) {
            Ok(_) => false,
            Err(at) => {
                self.subscribers.insert(at, id);
                true
            }
        }
    }

    pub fn remove_subscriber(&mut self, id: SubscriberId) -> bool {
        match self.subscribers.binary_search(&id) {
            Ok(at) => {
                self.subscribers.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    pub fn subscribers(&self) -> &[SubscriberId] {
        &self.subscribers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, ts: u64) -> Event {
        Event {
            id: EventId(id),
            timestamp: Timestamp(ts),
            groups: vec![GroupId(0)],
        }
    }

    #[test]
    fn test_live_store() {
        let mut group = Group::new(GroupId(0));
        assert!(group.insert_event(event(5, 1)));
        assert!(group.insert_event(event(3, 2)));
        assert!(group.insert_event(event(8, 3)));
        assert!(!group.insert_event(event(5, 9)));

        assert_eq!(group.get_event(EventId(5)).unwrap().timestamp, Timestamp(1));
        assert_eq!(group.live_ids(), vec![EventId(3), EventId(5), EventId(8)]);

        assert!(group.remove_event(EventId(5)).is_some());
        assert!(!group.has_event(EventId(5)));
        assert_eq!(group.live_len(), 2);
    }

    #[test]
    fn test_take_expired() {
        let mut group = Group::new(GroupId(1));
        for (id, ts) in [(50, 5), (30, 1), (70, 9), (20, 2), (40, 6)] {
            group.insert_event(event(id, ts));
        }
        let taken: Vec<u64> = group
            .take_expired(Timestamp(5))
            .iter()
            .map(|e| e.id.0)
            .collect();
        // post-order: 20 40 30 70 50
        assert_eq!(taken, vec![20, 30, 50]);
        assert_eq!(group.live_ids(), vec![EventId(40), EventId(70)]);
    }

    #[test]
    fn test_live_height_degenerates_on_ascending_ids() {
        let mut group = Group::new(GroupId(0));
        assert_eq!(group.live_height(), 0);
        for id in 1..=6 {
            group.insert_event(event(id, id));
        }
        // no rebalancing: ascending ids form a right spine
        assert_eq!(group.live_height(), 6);

        let mut balanced = Group::new(GroupId(0));
        for id in [4, 2, 6, 1, 3, 5, 7] {
            balanced.insert_event(event(id, id));
        }
        assert_eq!(balanced.live_height(), 3);
    }

    #[test]
    fn test_subscriber_list_sorted_and_unique() {
        let mut group = Group::new(GroupId(0));
        assert!(group.add_subscriber(SubscriberId(9)));
        assert!(group.add_subscriber(SubscriberId(2)));
        assert!(group.add_subscriber(SubscriberId(5)));
        assert!(!group.add_subscriber(SubscriberId(5)));
        assert_eq!(
            group.subscribers(),
            &[SubscriberId(2), SubscriberId(5), SubscriberId(9)]
        );

        assert!(group.remove_subscriber(SubscriberId(5)));
        assert!(!group.remove_subscriber(SubscriberId(5)));
        assert_eq!(group.subscribers(), &[SubscriberId(2), SubscriberId(9)]);
    }
}
