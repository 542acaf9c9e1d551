//! Leaf-split archive tree with a linked leaf list.
//!
//! Only leaves carry archived events. Inserting splits the leaf reached by
//! the descent into two children, one holding the old entry and one the new,
//! so the tree only ever grows. Every leaf is also threaded into a doubly
//! linked list kept in ascending timestamp order; that list is what readers
//! consume.
//!
//! Internal nodes route on a timestamp key: entries at or below the key go
//! left, entries above it go right. Nodes are never freed while the tree is
//! alive, so a [`Position`] stays a valid arena index forever; it names a
//! leaf until that leaf is split, at which point any cursor passed to
//! [`ConsumptionTree::insert`] is rebound to the child that kept the old entry.

use crate::types::{ArchivedEvent, EventId, Timestamp};
use serde::{Deserialize, Serialize};

type NodeId = usize;

/// Handle to a leaf of a [`ConsumptionTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position(NodeId);

/// A subscriber's last-consumed position; `None` before the first read.
pub type Cursor = Option<Position>;

#[derive(Clone, Debug)]
struct Node {
    /// Archived entry for a leaf, routing key for an internal node.
    entry: ArchivedEvent,
    /// `(left, right)`; both or neither.
    children: Option<(NodeId, NodeId)>,
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl Node {
    fn leaf(entry: ArchivedEvent, parent: Option<NodeId>) -> Self {
        Self {
            entry,
            children: None,
            parent,
            prev: None,
            next: None,
        }
    }
}

/// Append-ordered archive for one subscriber and one group.
#[derive(Clone, Debug, Default)]
pub struct ConsumptionTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    leaves: usize,
}

impl ConsumptionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of archived entries (leaves).
    pub fn len(&self) -> usize {
        self.leaves
    }

    pub fn is_empty(&self) -> bool {
        self.leaves == 0
    }

    /// Archive an entry, keeping the leaf list in timestamp order.
    ///
    /// If `cursor` names the leaf that gets split it is moved to the child
    /// carrying that leaf's entry, so it keeps naming the same list position.
    /// An entry whose timestamp equals an existing leaf's lands before it.
    pub fn insert(&mut self, entry: ArchivedEvent, cursor: &mut Cursor) {
        let Some(root) = self.root else {
            self.nodes.push(Node::leaf(entry, None));
            self.root = Some(0);
            self.leaves = 1;
            return;
        };

        let mut at = root;
        while let Some((left, right)) = self.nodes[at].children {
            at = if self.nodes[at].entry.timestamp < entry.timestamp {
                right
            } else {
                left
            };
        }

        let old = self.nodes[at].entry;
        let (prev, next) = (self.nodes[at].prev, self.nodes[at].next);
        let left = self.nodes.len();
        let right = left + 1;

        let newer = old.timestamp < entry.timestamp;
        let (left_entry, right_entry, keeper) = if newer {
            (old, entry, left)
        } else {
            (entry, old, right)
        };

        let mut left_node = Node::leaf(left_entry, Some(at));
        left_node.prev = prev;
        left_node.next = Some(right);
        let mut right_node = Node::leaf(right_entry, Some(at));
        right_node.prev = Some(left);
        right_node.next = next;
        self.nodes.push(left_node);
        self.nodes.push(right_node);

        if let Some(p) = prev {
            self.nodes[p].next = Some(left);
        }
        if let Some(n) = next {
            self.nodes[n].prev = Some(right);
        }

        let split = &mut self.nodes[at];
        split.children = Some((left, right));
        split.prev = None;
        split.next = None;
        if !newer {
            split.entry = entry;
        }

        if *cursor == Some(Position(at)) {
            *cursor = Some(Position(keeper));
        }
        self.leaves += 1;
    }

    /// Last leaf in list order, found by following right children.
    pub fn newest(&self) -> Option<Position> {
        let mut at = self.root?;
        while let Some((_, right)) = self.nodes[at].children {
            at = right;
        }
        Some(Position(at))
    }

    /// First leaf in list order.
    pub fn oldest(&self) -> Option<Position> {
        let mut at = self.root?;
        while let Some((left, _)) = self.nodes[at].children {
            at = left;
        }
        Some(Position(at))
    }

    /// Entry stored at a position.
    ///
    /// # Panics
    ///
    /// Panics if `position` was not handed out by this tree.
    pub fn entry(&self, position: Position) -> ArchivedEvent {
        self.nodes[position.0].entry
    }

    pub fn is_leaf(&self, position: Position) -> bool {
        position.0 < self.nodes.len() && self.nodes[position.0].children.is_none()
    }

    /// Ids strictly after `from` up to and including `to`, oldest first.
    ///
    /// Walks `prev` links back from `to`; with `from == None` the walk runs
    /// to the start of the list.
    ///
    /// # Panics
    ///
    /// Panics if `to` was not handed out by this tree. Use [`is_leaf`] to
    /// check a position of unknown origin first.
    ///
    /// [`is_leaf`]: ConsumptionTree::is_leaf
    pub fn delta(&self, from: Cursor, to: Position) -> Vec<EventId> {
        let mut ids = Vec::new();
        let mut at = Some(to.0);
        while let Some(id) = at {
            if Some(Position(id)) == from {
                break;
            }
            ids.push(self.nodes[id].entry.id);
            at = self.nodes[id].prev;
        }
        ids.reverse();
        ids
    }

    /// Whether an entry with exactly this `(timestamp, id)` is archived.
    pub fn contains(&self, timestamp: Timestamp, id: EventId) -> bool {
        let Some(mut at) = self.root else {
            return false;
        };
        // Every leaf before the one reached here is strictly older.
        while let Some((left, right)) = self.nodes[at].children {
            at = if self.nodes[at].entry.timestamp < timestamp {
                right
            } else {
                left
            };
        }

        let mut cursor = Some(at);
        while let Some(node) = cursor.map(|i| &self.nodes[i]) {
            if node.entry.timestamp > timestamp {
                break;
            }
            if node.entry.timestamp == timestamp && node.entry.id == id {
                return true;
            }
            cursor = node.next;
        }
        false
    }

    /// Leaves in ascending timestamp order.
    pub fn iter(&self) -> Leaves<'_> {
        Leaves {
            tree: self,
            at: self.oldest().map(|p| p.0),
        }
    }

    pub fn ids(&self) -> Vec<EventId> {
        self.iter().map(|e| e.id).collect()
    }

    /// Length of the longest root-to-leaf path (0 when empty).
    pub fn height(&self) -> usize {
        let mut best = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((at, depth)) = stack.pop() {
            best = best.max(depth);
            if let Some((left, right)) = self.nodes[at].children {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        best
    }
}

/// Iterator over a [`ConsumptionTree`]'s leaf list.
pub struct Leaves<'a> {
    tree: &'a ConsumptionTree,
    at: Option<NodeId>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = ArchivedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.tree.nodes[self.at?];
        self.at = node.next;
        Some(node.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: u64, id: u64) -> ArchivedEvent {
        ArchivedEvent {
            id: EventId(id),
            timestamp: Timestamp(timestamp),
        }
    }

    fn tree_of(pairs: &[(u64, u64)]) -> ConsumptionTree {
        let mut tree = ConsumptionTree::new();
        let mut cursor = None;
        for &(ts, id) in pairs {
            tree.insert(entry(ts, id), &mut cursor);
        }
        tree
    }

    fn timestamps(tree: &ConsumptionTree) -> Vec<u64> {
        tree.iter().map(|e| e.timestamp.0).collect()
    }

    /// Walking `prev` from the newest leaf must mirror walking `next`.
    fn assert_links_consistent(tree: &ConsumptionTree) {
        let forward: Vec<_> = tree.iter().map(|e| e.id).collect();
        let mut backward = Vec::new();
        let mut at = tree.newest().map(|p| p.0);
        while let Some(i) = at {
            backward.push(tree.nodes[i].entry.id);
            at = tree.nodes[i].prev;
        }
        backward.reverse();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), tree.len());
    }

    #[test]
    fn test_empty_tree() {
        let tree = ConsumptionTree::new();
        assert!(tree.is_empty());
        assert!(tree.newest().is_none());
        assert!(tree.iter().next().is_none());
        assert!(!tree.contains(Timestamp(1), EventId(1)));
    }

    #[test]
    fn test_single_insert() {
        let tree = tree_of(&[(5, 50)]);
        let newest = tree.newest().unwrap();
        assert_eq!(tree.entry(newest), entry(5, 50));
        assert_eq!(tree.delta(None, newest), vec![EventId(50)]);
    }

    #[test]
    fn test_ascending_inserts() {
        let tree = tree_of(&[(1, 10), (2, 20), (3, 30), (4, 40)]);
        assert_eq!(timestamps(&tree), vec![1, 2, 3, 4]);
        assert_eq!(tree.entry(tree.newest().unwrap()).id, EventId(40));
        assert_links_consistent(&tree);
    }

    #[test]
    fn test_out_of_order_inserts_stay_sorted() {
        let tree = tree_of(&[(5, 1), (2, 2), (9, 3), (7, 4), (1, 5), (6, 6), (3, 7)]);
        assert_eq!(timestamps(&tree), vec![1, 2, 3, 5, 6, 7, 9]);
        assert_eq!(tree.entry(tree.newest().unwrap()).timestamp, Timestamp(9));
        assert_eq!(tree.entry(tree.oldest().unwrap()).timestamp, Timestamp(1));
        assert_links_consistent(&tree);
    }

    #[test]
    fn test_equal_timestamps() {
        let tree = tree_of(&[(4, 1), (4, 2), (4, 3), (2, 4), (6, 5)]);
        assert_eq!(timestamps(&tree), vec![2, 4, 4, 4, 6]);
        // later arrivals with an equal timestamp come first
        let ids: Vec<u64> = tree.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![4, 3, 2, 1, 5]);
        assert_links_consistent(&tree);
    }

    #[test]
    fn test_cursor_rebound_when_newer_entry_splits_it() {
        let mut tree = ConsumptionTree::new();
        let mut cursor = None;
        tree.insert(entry(1, 10), &mut cursor);
        cursor = tree.newest();

        tree.insert(entry(2, 20), &mut cursor);
        let at = cursor.unwrap();
        assert!(tree.is_leaf(at));
        assert_eq!(tree.entry(at).id, EventId(10));
        assert_eq!(tree.delta(cursor, tree.newest().unwrap()), vec![EventId(20)]);
    }

    #[test]
    fn test_cursor_rebound_when_older_entry_splits_it() {
        let mut tree = ConsumptionTree::new();
        let mut cursor = None;
        tree.insert(entry(5, 50), &mut cursor);
        cursor = tree.newest();

        tree.insert(entry(3, 30), &mut cursor);
        let at = cursor.unwrap();
        assert!(tree.is_leaf(at));
        assert_eq!(tree.entry(at).id, EventId(50));
        // the older entry sits behind the cursor
        assert!(tree.delta(cursor, tree.newest().unwrap()).is_empty());
    }

    #[test]
    fn test_unrelated_cursor_untouched() {
        let mut tree = tree_of(&[(1, 1), (5, 5)]);
        let mut cursor = tree.oldest();
        let before = cursor;
        tree.insert(entry(9, 9), &mut cursor);
        assert_eq!(cursor, before);
        assert_eq!(tree.delta(cursor, tree.newest().unwrap()), vec![EventId(5), EventId(9)]);
    }

    #[test]
    fn test_delta_is_empty_at_newest() {
        let tree = tree_of(&[(1, 1), (2, 2), (3, 3)]);
        let newest = tree.newest().unwrap();
        assert!(tree.delta(Some(newest), newest).is_empty());
        assert_eq!(
            tree.delta(None, newest),
            vec![EventId(1), EventId(2), EventId(3)]
        );
    }

    #[test]
    fn test_contains_matches_timestamp_and_id() {
        let tree = tree_of(&[(4, 1), (4, 2), (2, 3), (8, 4), (4, 5)]);
        assert!(tree.contains(Timestamp(4), EventId(1)));
        assert!(tree.contains(Timestamp(4), EventId(2)));
        assert!(tree.contains(Timestamp(4), EventId(5)));
        assert!(tree.contains(Timestamp(2), EventId(3)));
        assert!(tree.contains(Timestamp(8), EventId(4)));
        assert!(!tree.contains(Timestamp(3), EventId(1)));
        assert!(!tree.contains(Timestamp(4), EventId(3)));
        assert!(!tree.contains(Timestamp(9), EventId(4)));
    }

    #[test]
    fn test_is_leaf_rejects_foreign_position() {
        let big = tree_of(&[(1, 1), (2, 2), (3, 3)]);
        let small = tree_of(&[(1, 1)]);
        let far = big.newest().unwrap();
        assert!(!small.is_leaf(far));
    }

    #[test]
    #[should_panic]
    fn test_entry_panics_on_foreign_position() {
        let big = tree_of(&[(1, 1), (2, 2), (3, 3)]);
        let small = tree_of(&[(1, 1)]);
        small.entry(big.newest().unwrap());
    }

    #[test]
    #[should_panic]
    fn test_delta_panics_on_foreign_position() {
        let big = tree_of(&[(1, 1), (2, 2), (3, 3)]);
        let small = tree_of(&[(1, 1)]);
        small.delta(None, big.newest().unwrap());
    }

    #[test]
    fn test_leaf_count_and_height() {
        let tree = tree_of(&[(1, 1), (2, 2), (3, 3), (4, 4)]);
        assert_eq!(tree.len(), 4);
        // each ascending insert splits the rightmost leaf
        assert_eq!(tree.height(), 4);
        assert_eq!(tree.nodes.len(), 7);
    }
}
