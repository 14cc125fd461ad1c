use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::key::{KeyMap, KeySet, NodeKey};
use crate::{Collection, Node, NodeRef, NodeType};

/// The set of expanded parent keys driving [`flatten`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpandedKeys<K: NodeKey> {
    All,
    Keys(KeySet<K>),
}

impl<K: NodeKey> Default for ExpandedKeys<K> {
    fn default() -> Self {
        Self::Keys(KeySet::default())
    }
}

impl<K: NodeKey> FromIterator<K> for ExpandedKeys<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self::Keys(iter.into_iter().collect())
    }
}

impl<K: NodeKey> ExpandedKeys<K> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn contains(&self, key: &K) -> bool {
        match self {
            Self::All => true,
            Self::Keys(keys) => keys.contains(key),
        }
    }

    /// Expands `key`. Returns `false` if it was already expanded.
    pub fn insert(&mut self, key: K) -> bool {
        match self {
            Self::All => false,
            Self::Keys(keys) => keys.insert(key),
        }
    }

    /// Toggles `key` and returns whether it is expanded afterwards.
    ///
    /// `All` is first replaced by the explicit set of every key in `collection` that has
    /// children, so that collapsing a single key out of `All` works.
    pub fn toggle<C>(&mut self, key: &K, collection: &C) -> bool
    where
        C: Collection<Key = K>,
    {
        if let Self::All = self {
            let keys = collection
                .keys()
                .filter(|k| collection.item(k).is_some_and(|node| node.has_children()))
                .cloned()
                .collect();
            *self = Self::Keys(keys);
        }
        let Self::Keys(keys) = self else {
            return true;
        };
        if keys.remove(key) {
            false
        } else {
            keys.insert(key.clone());
            true
        }
    }
}

/// A callback fired when an [`ExpansionState`] changes.
pub type OnExpandedChange<K> = Arc<dyn Fn(&ExpandedKeys<K>) + Send + Sync>;

/// Owns the expanded keys of a tree and reports changes to an `on_expanded_change` sink.
#[derive(Clone)]
pub struct ExpansionState<K: NodeKey> {
    expanded: ExpandedKeys<K>,
    on_expanded_change: Option<OnExpandedChange<K>>,
}

impl<K: NodeKey> ExpansionState<K> {
    pub fn new(expanded: ExpandedKeys<K>) -> Self {
        Self {
            expanded,
            on_expanded_change: None,
        }
    }

    pub fn with_on_expanded_change(
        mut self,
        on_expanded_change: Option<impl Fn(&ExpandedKeys<K>) + Send + Sync + 'static>,
    ) -> Self {
        self.on_expanded_change = on_expanded_change.map(|f| Arc::new(f) as _);
        self
    }

    pub fn expanded_keys(&self) -> &ExpandedKeys<K> {
        &self.expanded
    }

    pub fn is_expanded(&self, key: &K) -> bool {
        self.expanded.contains(key)
    }

    pub fn set_expanded_keys(&mut self, expanded: ExpandedKeys<K>) {
        if self.expanded == expanded {
            return;
        }
        self.expanded = expanded;
        self.notify();
    }

    /// Toggles `key`, notifies the sink, and returns whether it is now expanded.
    pub fn toggle_key<C>(&mut self, key: &K, collection: &C) -> bool
    where
        C: Collection<Key = K>,
    {
        let expanded = self.expanded.toggle(key, collection);
        vtrace!(key = ?key, expanded, "ExpansionState::toggle_key");
        self.notify();
        expanded
    }

    fn notify(&self) {
        if let Some(cb) = &self.on_expanded_change {
            cb(&self.expanded);
        }
    }
}

impl<K: NodeKey> core::fmt::Debug for ExpansionState<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExpansionState")
            .field("expanded", &self.expanded)
            .finish_non_exhaustive()
    }
}

/// 1-based positional metadata of a row (`level`, `pos_in_set` of `set_size`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowPosition {
    pub level: usize,
    pub pos_in_set: usize,
    pub set_size: usize,
}

/// The output of [`flatten`].
///
/// `rows` and `key_map` share node instances: for a row key, `key_map[key]` and the row are the
/// same `Arc`.
#[derive(Clone, Debug)]
pub struct FlattenedTree<K, T> {
    pub rows: Vec<NodeRef<K, T>>,
    pub key_map: KeyMap<K, NodeRef<K, T>>,
    /// Visit order of every key in `key_map`.
    pub(crate) key_order: Vec<K>,
    /// Row-kind children per parent (`None` is the top level).
    pub(crate) set_sizes: KeyMap<Option<K>, usize>,
}

impl<K: NodeKey, T> FlattenedTree<K, T> {
    pub fn position(&self, key: &K) -> Option<RowPosition> {
        let node = self.key_map.get(key)?;
        if !node.is_row() {
            return None;
        }
        let set_size = self
            .set_sizes
            .get(&node.parent_key)
            .copied()
            .unwrap_or(1);
        Some(RowPosition {
            level: node.level + 1,
            pos_in_set: node.index + 1,
            set_size,
        })
    }
}

enum Anchor<'a, K> {
    /// No row-kind ancestor: always visible.
    Root,
    /// Visible iff this ancestor row is expanded and was appended.
    Row(&'a K),
    /// An ancestor is missing.
    Blocked,
}

impl<K> Clone for Anchor<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Anchor<'_, K> {}

fn root_anchor<'a, C: Collection>(
    collection: &'a C,
    node: &'a Node<C::Key, C::Value>,
) -> Anchor<'a, C::Key> {
    let mut seen: KeySet<&C::Key> = KeySet::default();
    let mut parent = node.parent_key.as_ref();
    while let Some(key) = parent {
        if !seen.insert(key) {
            return Anchor::Blocked;
        }
        let Some(p) = collection.item(key) else {
            return Anchor::Blocked;
        };
        if p.is_row() {
            return Anchor::Row(&p.key);
        }
        parent = p.parent_key.as_ref();
    }
    Anchor::Root
}

/// Flattens a hierarchical collection into its visible rows.
///
/// Walks every top-level node depth-first in pre-order. Only items are rows; every other node
/// (sections, headers, loaders, content) lands in `key_map` only. An item is appended when it
/// has no item ancestor, or when its nearest item ancestor is expanded and was itself appended.
/// Sections are transparent to expansion.
///
/// When the first child of a parent is not an item, the `index` of every item child is shifted
/// down by one so it counts sibling items only. Header and content nodes are expected to be the
/// first child of their parent.
pub fn flatten<C>(
    collection: &C,
    expanded_keys: &ExpandedKeys<C::Key>,
) -> FlattenedTree<C::Key, C::Value>
where
    C: Collection,
    C::Value: Clone,
{
    let mut rows = Vec::new();
    let mut key_map: KeyMap<C::Key, NodeRef<C::Key, C::Value>> = KeyMap::default();
    let mut key_order = Vec::new();
    let mut set_sizes: KeyMap<Option<C::Key>, usize> = KeyMap::default();
    let mut appended: KeySet<C::Key> = KeySet::default();

    let mut stack: Vec<(&NodeRef<C::Key, C::Value>, Anchor<'_, C::Key>)> = Vec::new();
    let mut scratch: Vec<&NodeRef<C::Key, C::Value>> = Vec::new();

    let roots: Vec<_> = collection.iter().collect();
    for root in roots.into_iter().rev() {
        stack.push((root, root_anchor(collection, root)));
    }

    while let Some((node, anchor)) = stack.pop() {
        if key_map.contains_key(&node.key) {
            continue;
        }

        let child_anchor = if node.is_row() {
            let entry = match &node.parent_key {
                Some(parent) if starts_with_structural(collection, parent) => {
                    Arc::new(Node {
                        index: node.index.saturating_sub(1),
                        ..Node::clone(node)
                    })
                }
                _ => Arc::clone(node),
            };
            *set_sizes.entry(node.parent_key.clone()).or_insert(0) += 1;

            let visible = match anchor {
                Anchor::Root => true,
                Anchor::Row(parent) => expanded_keys.contains(parent) && appended.contains(parent),
                Anchor::Blocked => false,
            };
            if visible {
                appended.insert(node.key.clone());
                rows.push(Arc::clone(&entry));
            }
            key_map.insert(node.key.clone(), entry);
            match anchor {
                Anchor::Blocked => Anchor::Blocked,
                _ => Anchor::Row(&node.key),
            }
        } else {
            check_structural_position(node);
            key_map.insert(node.key.clone(), Arc::clone(node));
            anchor
        };
        key_order.push(node.key.clone());

        scratch.clear();
        scratch.extend(collection.children(&node.key));
        for &child in scratch.iter().rev() {
            stack.push((child, child_anchor));
        }
    }

    vtrace!(
        rows = rows.len(),
        nodes = key_map.len(),
        all = expanded_keys.is_all(),
        "flatten"
    );

    FlattenedTree {
        rows,
        key_map,
        key_order,
        set_sizes,
    }
}

fn starts_with_structural<C: Collection>(collection: &C, parent: &C::Key) -> bool {
    collection
        .children(parent)
        .next()
        .is_some_and(|first| !first.is_row())
}

fn check_structural_position<K: NodeKey, T>(node: &Node<K, T>) {
    let leading_only = matches!(node.node_type, NodeType::Header | NodeType::Content);
    if leading_only && node.parent_key.is_some() && node.index > 0 {
        vwarn!(
            key = ?node.key,
            index = node.index,
            "flatten: header/content node must be the first child of its parent"
        );
        debug_assert!(
            false,
            "flatten: header/content node {:?} must be the first child of its parent (index={})",
            node.key, node.index
        );
    }
}
