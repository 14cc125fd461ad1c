use alloc::sync::Arc;

/// The kind of a collection node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeType {
    Item,
    Section,
    Header,
    /// A loading placeholder that is part of the collection itself (e.g. a nested "load more"
    /// marker in a tree). Flattening records it but never turns it into a row.
    Loader,
    /// Non-row content that belongs to its parent (e.g. the cell content of a tree row).
    Content,
}

impl NodeType {
    /// Whether nodes of this kind occupy a row of their own. Only items do.
    pub const fn is_row(self) -> bool {
        match self {
            Self::Item => true,
            Self::Section | Self::Header | Self::Loader | Self::Content => false,
        }
    }
}

/// A node of a [`crate::Collection`].
///
/// Relations to other nodes are stored as keys and resolved through the owning collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Node<K, T> {
    pub key: K,
    pub node_type: NodeType,
    pub value: T,
    /// Depth in the tree (roots are level 0).
    pub level: usize,
    /// Position among siblings.
    pub index: usize,
    pub parent_key: Option<K>,
    pub first_child_key: Option<K>,
    pub next_key: Option<K>,
    pub prev_key: Option<K>,
}

impl<K, T> Node<K, T> {
    pub fn is_row(&self) -> bool {
        self.node_type.is_row()
    }

    pub fn has_children(&self) -> bool {
        self.first_child_key.is_some()
    }
}

/// Nodes are shared between collections, flattened views and the view pool.
pub type NodeRef<K, T> = Arc<Node<K, T>>;
