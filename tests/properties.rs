//! Property tests for archive ordering, consumption and id uniqueness.

use backlog::{
    ArchivedEvent, ConsumptionTree, EngineConfig, EventId, GroupId, OrderedTree,
    RetentionEngine, SubscriberId, Timestamp,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

fn test_engine(groups: usize) -> RetentionEngine {
    RetentionEngine::new(EngineConfig::new(groups, 5, 101).with_hash_params(2, 9)).unwrap()
}

proptest! {
    #[test]
    fn leaf_list_is_sorted_for_any_insert_order(
        stamps in prop::collection::vec(0u64..50, 0..200)
    ) {
        let mut tree = ConsumptionTree::new();
        let mut cursor = None;
        for (i, ts) in stamps.iter().enumerate() {
            tree.insert(
                ArchivedEvent { id: EventId(i as u64), timestamp: Timestamp(*ts) },
                &mut cursor,
            );
        }

        let listed: Vec<u64> = tree.iter().map(|e| e.timestamp.0).collect();
        let mut expected = stamps.clone();
        expected.sort_unstable();
        prop_assert_eq!(listed, expected);
        prop_assert_eq!(tree.len(), stamps.len());
    }

    #[test]
    fn every_inserted_entry_is_found(
        stamps in prop::collection::vec(0u64..20, 1..100)
    ) {
        let mut tree = ConsumptionTree::new();
        let mut cursor = None;
        for (i, ts) in stamps.iter().enumerate() {
            tree.insert(
                ArchivedEvent { id: EventId(i as u64), timestamp: Timestamp(*ts) },
                &mut cursor,
            );
        }
        for (i, ts) in stamps.iter().enumerate() {
            prop_assert!(tree.contains(Timestamp(*ts), EventId(i as u64)));
            prop_assert!(!tree.contains(Timestamp(*ts + 100), EventId(i as u64)));
        }
    }

    #[test]
    fn cursor_is_never_behind_itself(
        batches in prop::collection::vec(prop::collection::vec(0u64..1000, 0..20), 1..10)
    ) {
        let mut tree = ConsumptionTree::new();
        let mut cursor = None;
        let mut next_id = 0u64;
        for batch in batches {
            for ts in batch {
                tree.insert(ArchivedEvent { id: EventId(next_id), timestamp: Timestamp(ts) }, &mut cursor);
                next_id += 1;
            }
            if let Some(newest) = tree.newest() {
                let _ = tree.delta(cursor, newest);
                cursor = Some(newest);
                prop_assert!(tree.is_leaf(newest));
                prop_assert!(tree.delta(cursor, newest).is_empty());
            }
        }
    }

    #[test]
    fn ordered_tree_matches_btreemap(
        ops in prop::collection::vec((any::<bool>(), 0u32..64), 0..300)
    ) {
        let mut tree = OrderedTree::new();
        let mut model = BTreeMap::new();
        for (insert, key) in ops {
            if insert {
                prop_assert_eq!(tree.insert(key, key * 2), model.insert(key, key * 2));
            } else {
                prop_assert_eq!(tree.remove(&key), model.remove(&key).map(|v| (key, v)));
            }
        }
        let listed: Vec<_> = tree.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<_> = model.into_iter().collect();
        prop_assert_eq!(listed, expected);
    }

    #[test]
    fn accepted_id_rejected_while_live(
        events in prop::collection::vec((0i64..20, 0i64..30), 1..40)
    ) {
        let mut engine = test_engine(2);
        let mut live = HashSet::new();
        for (ts, id) in events {
            let result = engine.publish(ts, id, &[0]);
            if live.contains(&id) {
                prop_assert!(result.unwrap_err().is_duplicate_id());
            } else {
                prop_assert!(result.is_ok());
                live.insert(id);
            }
            prop_assert!(engine.publish(ts, id, &[1]).is_err());
        }
    }

    #[test]
    fn consume_delivers_each_event_exactly_once(
        rounds in prop::collection::vec(prop::collection::vec(0i64..5, 0..8), 1..6)
    ) {
        let mut engine = test_engine(1);
        engine.subscribe(0, 1, &[0]).unwrap();

        // monotone timestamps keep every arrival ahead of the cursor
        let mut clock = 0i64;
        let mut next_id = 0i64;
        let mut published = Vec::new();
        let mut delivered = Vec::new();
        for round in rounds {
            for step in round {
                clock += step + 1;
                engine.publish(clock, next_id, &[0]).unwrap();
                published.push(EventId(next_id as u64));
                next_id += 1;
            }
            engine.prune(clock).unwrap();
            let report = engine.consume(1).unwrap();
            delivered.extend_from_slice(report.delivered(GroupId(0)).unwrap());
            prop_assert!(engine.consume(1).unwrap().is_empty());
        }
        prop_assert_eq!(delivered, published);
        let sub = engine.subscriber(SubscriberId(1)).unwrap();
        prop_assert_eq!(sub.archived_len(), next_id as usize);
    }
}
