//! Unbalanced binary search tree over an index arena.
//!
//! Nodes live in a slot vector and refer to each other by index, so parent
//! links cost nothing in ownership terms. Removed slots are recycled through
//! a free list. No rebalancing is performed.

use std::cmp::Ordering;

type NodeId = usize;

struct Node<K, V> {
    key: K,
    value: V,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
}

/// Keyed binary search tree with classic three-case removal.
pub struct OrderedTree<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
}

impl<K: Ord, V> OrderedTree<K, V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, id: NodeId) -> &Node<K, V> {
        self.slots[id].as_ref().expect("tree link points at a vacant slot")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        self.slots[id].as_mut().expect("tree link points at a vacant slot")
    }

    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) -> Node<K, V> {
        let node = self.slots[id].take().expect("released a vacant slot");
        self.free.push(id);
        node
    }

    /// Insert by key comparison, O(height).
    ///
    /// If the key is already present its value is replaced and the old value
    /// returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let mut parent = None;
        let mut went_left = false;
        let mut cursor = self.root;

        while let Some(id) = cursor {
            let node = self.node(id);
            match key.cmp(&node.key) {
                Ordering::Less => {
                    parent = Some(id);
                    went_left = true;
                    cursor = node.left;
                }
                Ordering::Greater => {
                    parent = Some(id);
                    went_left = false;
                    cursor = node.right;
                }
                Ordering::Equal => {
                    return Some(std::mem::replace(&mut self.node_mut(id).value, value));
                }
            }
        }

        let id = self.alloc(Node {
            key,
            value,
            left: None,
            right: None,
            parent,
        });
        match parent {
            None => self.root = Some(id),
            Some(p) if went_left => self.node_mut(p).left = Some(id),
            Some(p) => self.node_mut(p).right = Some(id),
        }
        self.len += 1;
        None
    }

    fn find(&self, key: &K) -> Option<NodeId> {
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = self.node(id);
            cursor = match key.cmp(&node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|id| &self.node(id).value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Point `parent`'s link that referenced `old` at `new` instead.
    fn relink(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = self.node_mut(p);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    node.right = new;
                }
            }
        }
        if let Some(child) = new {
            self.node_mut(child).parent = parent;
        }
    }

    /// Remove a key, returning the stored entry.
    ///
    /// Leaf: detach. One child: promote the child into the node's slot.
    /// Two children: the node takes over its in-order successor's entry and
    /// the successor, which has no left child, is unlinked instead.
    pub fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let id = self.find(key)?;
        let (left, right, parent) = {
            let node = self.node(id);
            (node.left, node.right, node.parent)
        };

        let removed = match (left, right) {
            (Some(_), Some(right)) => {
                let mut successor = right;
                while let Some(next) = self.node(successor).left {
                    successor = next;
                }
                let (succ_parent, succ_right) = {
                    let node = self.node(successor);
                    (node.parent, node.right)
                };
                self.relink(succ_parent, successor, succ_right);

                let mut taken = self.release(successor);
                let node = self.node_mut(id);
                std::mem::swap(&mut node.key, &mut taken.key);
                std::mem::swap(&mut node.value, &mut taken.value);
                taken
            }
            (child, None) | (None, child) => {
                self.relink(parent, id, child);
                self.release(id)
            }
        };

        self.len -= 1;
        Some((removed.key, removed.value))
    }

    /// Remove every entry matching `pred`, returning them in post-order.
    ///
    /// A node is visited only after both of its subtrees, so removals never
    /// invalidate a pending visit.
    pub fn extract_if<F>(&mut self, mut pred: F) -> Vec<(K, V)>
    where
        F: FnMut(&K, &V) -> bool,
        K: Clone,
    {
        let doomed: Vec<K> = self
            .post_order()
            .into_iter()
            .filter_map(|id| {
                let node = self.node(id);
                pred(&node.key, &node.value).then(|| node.key.clone())
            })
            .collect();

        doomed.iter().filter_map(|key| self.remove(key)).collect()
    }

    fn post_order(&self) -> Vec<NodeId> {
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        let mut out = Vec::with_capacity(self.len);
        while let Some(id) = stack.pop() {
            out.push(id);
            let node = self.node(id);
            stack.extend(node.left);
            stack.extend(node.right);
        }
        out.reverse();
        out
    }

    /// Length of the longest root-to-leaf path (0 when empty).
    pub fn height(&self) -> usize {
        let mut best = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            best = best.max(depth);
            let node = self.node(id);
            stack.extend(node.left.map(|c| (c, depth + 1)));
            stack.extend(node.right.map(|c| (c, depth + 1)));
        }
        best
    }

    /// In-order iteration (ascending keys).
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left_spine(self.root);
        iter
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }
}

impl<K: Ord, V> Default for OrderedTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// In-order iterator over an [`OrderedTree`].
pub struct Iter<'a, K, V> {
    tree: &'a OrderedTree<K, V>,
    stack: Vec<NodeId>,
}

impl<'a, K: Ord, V> Iter<'a, K, V> {
    fn push_left_spine(&mut self, mut cursor: Option<NodeId>) {
        while let Some(id) = cursor {
            self.stack.push(id);
            cursor = self.tree.node(id).left;
        }
    }
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let tree = self.tree;
        let node = tree.node(id);
        self.push_left_spine(node.right);
        Some((&node.key, &node.value))
    }
}
