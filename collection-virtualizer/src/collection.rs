use alloc::format;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::key::{KeyMap, KeySet, NodeKey};
use crate::{CollectionError, Node, NodeRef, NodeType};

/// Read-only access to an immutable, keyed tree of nodes.
///
/// `iter`, `len` and `at` address the collection's top-level sequence. What that sequence is
/// depends on the implementation: the root nodes for [`NodeCollection`], the visible rows for
/// [`crate::TreeCollection`].
pub trait Collection {
    type Key: NodeKey;
    type Value;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> impl Iterator<Item = &NodeRef<Self::Key, Self::Value>>;

    fn keys(&self) -> impl Iterator<Item = &Self::Key>;

    fn item(&self, key: &Self::Key) -> Option<&NodeRef<Self::Key, Self::Value>>;

    fn at(&self, index: usize) -> Option<&NodeRef<Self::Key, Self::Value>>;

    fn first_key(&self) -> Option<&Self::Key>;

    fn last_key(&self) -> Option<&Self::Key>;

    fn key_after(&self, key: &Self::Key) -> Option<&Self::Key>;

    fn key_before(&self, key: &Self::Key) -> Option<&Self::Key>;

    /// Iterates the direct children of `key` by following `first_child_key`/`next_key`.
    ///
    /// A dangling `next_key` ends the iteration.
    fn children<'a>(&'a self, key: &Self::Key) -> Children<'a, Self> {
        Children {
            collection: self,
            next: self
                .item(key)
                .and_then(|node| node.first_child_key.as_ref()),
        }
    }
}

pub struct Children<'a, C: Collection + ?Sized> {
    collection: &'a C,
    next: Option<&'a C::Key>,
}

impl<'a, C: Collection + ?Sized> Iterator for Children<'a, C> {
    type Item = &'a NodeRef<C::Key, C::Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next.take()?;
        let node = self.collection.item(key)?;
        self.next = node.next_key.as_ref();
        Some(node)
    }
}

/// The collection produced by [`CollectionBuilder`].
///
/// Nodes reachable from the roots are stored in pre-order; `key_after`/`key_before` walk that
/// order. Nodes whose parent was never added are kept (so `item` finds them) but are not
/// reachable from the roots.
#[derive(Clone, Debug)]
pub struct NodeCollection<K, T> {
    nodes: Vec<NodeRef<K, T>>,
    positions: KeyMap<K, usize>,
    roots: Vec<usize>,
    reachable: usize,
}

impl<K: NodeKey, T> NodeCollection<K, T> {
    pub fn builder() -> CollectionBuilder<K, T> {
        CollectionBuilder::new()
    }

    /// Number of nodes of any kind, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether `key` is reachable from the roots.
    pub fn is_attached(&self, key: &K) -> bool {
        self.positions
            .get(key)
            .is_some_and(|&pos| pos < self.reachable)
    }
}

impl<K: NodeKey, T> Default for NodeCollection<K, T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            positions: KeyMap::default(),
            roots: Vec::new(),
            reachable: 0,
        }
    }
}

impl<K: NodeKey, T> Collection for NodeCollection<K, T> {
    type Key = K;
    type Value = T;

    fn len(&self) -> usize {
        self.roots.len()
    }

    fn iter(&self) -> impl Iterator<Item = &NodeRef<K, T>> {
        self.roots.iter().map(|&pos| &self.nodes[pos])
    }

    fn keys(&self) -> impl Iterator<Item = &K> {
        self.nodes.iter().map(|node| &node.key)
    }

    fn item(&self, key: &K) -> Option<&NodeRef<K, T>> {
        self.positions.get(key).map(|&pos| &self.nodes[pos])
    }

    fn at(&self, index: usize) -> Option<&NodeRef<K, T>> {
        self.roots.get(index).map(|&pos| &self.nodes[pos])
    }

    fn first_key(&self) -> Option<&K> {
        self.nodes[..self.reachable].first().map(|node| &node.key)
    }

    fn last_key(&self) -> Option<&K> {
        self.nodes[..self.reachable].last().map(|node| &node.key)
    }

    fn key_after(&self, key: &K) -> Option<&K> {
        let pos = *self.positions.get(key)?;
        let next = pos.checked_add(1)?;
        (next < self.reachable).then(|| &self.nodes[next].key)
    }

    fn key_before(&self, key: &K) -> Option<&K> {
        let pos = *self.positions.get(key)?;
        if pos >= self.reachable {
            return None;
        }
        pos.checked_sub(1).map(|prev| &self.nodes[prev].key)
    }
}

struct PendingNode<K, T> {
    key: K,
    node_type: NodeType,
    value: T,
    parent_key: Option<K>,
}

/// Builds a [`NodeCollection`].
///
/// Nodes may be added in any order as long as keys are unique; parents are resolved in
/// [`CollectionBuilder::build`].
pub struct CollectionBuilder<K, T> {
    pending: Vec<PendingNode<K, T>>,
    keys: KeySet<K>,
}

impl<K: NodeKey, T> Default for CollectionBuilder<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NodeKey, T> CollectionBuilder<K, T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            keys: KeySet::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    /// Adds a top-level item.
    pub fn push_item(&mut self, key: K, value: T) -> Result<&mut Self, CollectionError> {
        self.insert(None, NodeType::Item, key, value)
    }

    /// Adds a top-level node of any kind.
    pub fn push(
        &mut self,
        node_type: NodeType,
        key: K,
        value: T,
    ) -> Result<&mut Self, CollectionError> {
        self.insert(None, node_type, key, value)
    }

    /// Adds a child of `parent`. The parent does not have to exist yet.
    pub fn push_child(
        &mut self,
        parent: K,
        node_type: NodeType,
        key: K,
        value: T,
    ) -> Result<&mut Self, CollectionError> {
        self.insert(Some(parent), node_type, key, value)
    }

    fn insert(
        &mut self,
        parent_key: Option<K>,
        node_type: NodeType,
        key: K,
        value: T,
    ) -> Result<&mut Self, CollectionError> {
        if !self.keys.insert(key.clone()) {
            return Err(CollectionError::DuplicateKey {
                key: format!("{key:?}"),
            });
        }
        self.pending.push(PendingNode {
            key,
            node_type,
            value,
            parent_key,
        });
        Ok(self)
    }

    pub fn build(self) -> NodeCollection<K, T> {
        let n = self.pending.len();
        let keys: Vec<K> = self.pending.iter().map(|p| p.key.clone()).collect();

        let mut slot_of: KeyMap<K, usize> = KeyMap::default();
        for (i, key) in keys.iter().enumerate() {
            slot_of.insert(key.clone(), i);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut roots = Vec::new();
        let mut detached = Vec::new();
        for (i, p) in self.pending.iter().enumerate() {
            match &p.parent_key {
                None => roots.push(i),
                Some(parent) => match slot_of.get(parent) {
                    Some(&pi) if pi != i => children[pi].push(i),
                    _ => detached.push(i),
                },
            }
        }

        let mut index = vec![0usize; n];
        let mut next: Vec<Option<usize>> = vec![None; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        for list in children.iter().chain(core::iter::once(&roots)) {
            for (pos, &slot) in list.iter().enumerate() {
                index[slot] = pos;
                if pos > 0 {
                    let before = list[pos - 1];
                    prev[slot] = Some(before);
                    next[before] = Some(slot);
                }
            }
        }

        let mut order = Vec::with_capacity(n);
        let mut level = vec![0usize; n];
        let mut visited = vec![false; n];
        let mut visit = |stack: &mut Vec<(usize, usize)>, order: &mut Vec<usize>| {
            while let Some((slot, depth)) = stack.pop() {
                if visited[slot] {
                    continue;
                }
                visited[slot] = true;
                level[slot] = depth;
                order.push(slot);
                for &child in children[slot].iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        };

        let mut stack: Vec<(usize, usize)> = roots.iter().rev().map(|&r| (r, 0)).collect();
        visit(&mut stack, &mut order);
        let reachable = order.len();

        if reachable < n {
            vdebug!(
                detached = n - reachable,
                "CollectionBuilder::build: nodes without a reachable parent"
            );
        }

        // Detached subtrees hang off a missing parent, so they start one level down.
        stack = detached.iter().rev().map(|&d| (d, 1)).collect();
        visit(&mut stack, &mut order);
        // Anything left is part of a parent cycle.
        for slot in 0..n {
            if !visited[slot] {
                visited[slot] = true;
                level[slot] = 1;
                order.push(slot);
            }
        }

        let mut pending: Vec<Option<PendingNode<K, T>>> =
            self.pending.into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(n);
        let mut positions: KeyMap<K, usize> = KeyMap::default();
        let mut position_of_slot = vec![0usize; n];
        for (pos, &slot) in order.iter().enumerate() {
            let Some(p) = pending[slot].take() else {
                continue;
            };
            position_of_slot[slot] = pos;
            positions.insert(p.key.clone(), pos);
            nodes.push(Arc::new(Node {
                key: p.key,
                node_type: p.node_type,
                value: p.value,
                level: level[slot],
                index: index[slot],
                parent_key: p.parent_key,
                first_child_key: children[slot].first().map(|&c| keys[c].clone()),
                next_key: next[slot].map(|s| keys[s].clone()),
                prev_key: prev[slot].map(|s| keys[s].clone()),
            }));
        }

        let roots = roots.iter().map(|&slot| position_of_slot[slot]).collect();

        NodeCollection {
            nodes,
            positions,
            roots,
            reachable,
        }
    }
}
