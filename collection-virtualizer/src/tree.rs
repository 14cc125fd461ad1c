use alloc::vec::Vec;

use crate::key::{KeyMap, NodeKey};
use crate::{Collection, ExpandedKeys, FlattenedTree, NodeRef, RowPosition, flatten};

/// A flat, index-addressable view of a tree: its visible rows.
///
/// `iter`/`len`/`at` and the key navigation methods follow the visible rows. `item` and
/// `children` resolve any node that was walked, including collapsed ones, and return the
/// index-adjusted nodes produced by [`flatten`].
#[derive(Clone, Debug)]
pub struct TreeCollection<K, T> {
    tree: FlattenedTree<K, T>,
    row_index: KeyMap<K, usize>,
}

impl<K: NodeKey, T: Clone> TreeCollection<K, T> {
    pub fn new<C>(collection: &C, expanded_keys: &ExpandedKeys<K>) -> Self
    where
        C: Collection<Key = K, Value = T>,
    {
        Self::from_flattened(flatten(collection, expanded_keys))
    }
}

impl<K: NodeKey, T> TreeCollection<K, T> {
    pub fn from_flattened(tree: FlattenedTree<K, T>) -> Self {
        let mut row_index = KeyMap::default();
        for (i, row) in tree.rows.iter().enumerate() {
            row_index.insert(row.key.clone(), i);
        }
        Self { tree, row_index }
    }

    pub fn rows(&self) -> &[NodeRef<K, T>] {
        &self.tree.rows
    }

    pub fn flattened(&self) -> &FlattenedTree<K, T> {
        &self.tree
    }

    pub fn into_flattened(self) -> FlattenedTree<K, T> {
        self.tree
    }

    /// Index of `key` among the visible rows.
    pub fn row_index(&self, key: &K) -> Option<usize> {
        self.row_index.get(key).copied()
    }

    pub fn is_visible(&self, key: &K) -> bool {
        self.row_index.contains_key(key)
    }

    pub fn position(&self, key: &K) -> Option<RowPosition> {
        self.tree.position(key)
    }
}

impl<K: NodeKey, T> Collection for TreeCollection<K, T> {
    type Key = K;
    type Value = T;

    fn len(&self) -> usize {
        self.tree.rows.len()
    }

    fn iter(&self) -> impl Iterator<Item = &NodeRef<K, T>> {
        self.tree.rows.iter()
    }

    fn keys(&self) -> impl Iterator<Item = &K> {
        self.tree.key_order.iter()
    }

    fn item(&self, key: &K) -> Option<&NodeRef<K, T>> {
        self.tree.key_map.get(key)
    }

    fn at(&self, index: usize) -> Option<&NodeRef<K, T>> {
        self.tree.rows.get(index)
    }

    fn first_key(&self) -> Option<&K> {
        self.tree.rows.first().map(|row| &row.key)
    }

    fn last_key(&self) -> Option<&K> {
        self.tree.rows.last().map(|row| &row.key)
    }

    fn key_after(&self, key: &K) -> Option<&K> {
        let index = self.row_index(key)?;
        self.tree.rows.get(index + 1).map(|row| &row.key)
    }

    fn key_before(&self, key: &K) -> Option<&K> {
        let index = self.row_index(key)?;
        index
            .checked_sub(1)
            .and_then(|i| self.tree.rows.get(i))
            .map(|row| &row.key)
    }
}

impl<K: NodeKey, T> Default for TreeCollection<K, T> {
    fn default() -> Self {
        Self::from_flattened(FlattenedTree {
            rows: Vec::new(),
            key_map: KeyMap::default(),
            key_order: Vec::new(),
            set_sizes: KeyMap::default(),
        })
    }
}
