use crate::{LayoutInfo, Node, NodeRef, NodeType};

/// The kind of a rendered view. A view never changes kind once created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ViewType {
    Item,
    Section,
    Header,
    Loader,
    /// Empty-state row synthesized by a layout.
    Placeholder,
    Content,
}

impl ViewType {
    pub const ALL: [ViewType; 6] = [
        Self::Item,
        Self::Section,
        Self::Header,
        Self::Loader,
        Self::Placeholder,
        Self::Content,
    ];

    pub(crate) const fn slot(self) -> usize {
        match self {
            Self::Item => 0,
            Self::Section => 1,
            Self::Header => 2,
            Self::Loader => 3,
            Self::Placeholder => 4,
            Self::Content => 5,
        }
    }
}

impl From<NodeType> for ViewType {
    fn from(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Item => Self::Item,
            NodeType::Section => Self::Section,
            NodeType::Header => Self::Header,
            NodeType::Loader => Self::Loader,
            NodeType::Content => Self::Content,
        }
    }
}

/// Key of a layout info or a view.
///
/// Rows a layout synthesizes (the trailing loader, the empty-state placeholder) have their own
/// keys so they can never collide with collection keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ViewKey<K> {
    Node(K),
    Loader,
    Placeholder,
}

impl<K> ViewKey<K> {
    pub fn node_key(&self) -> Option<&K> {
        match self {
            Self::Node(key) => Some(key),
            Self::Loader | Self::Placeholder => None,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        !matches!(self, Self::Node(_))
    }
}

impl<K> From<K> for ViewKey<K> {
    fn from(key: K) -> Self {
        Self::Node(key)
    }
}

/// Handle of a view in the pool arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub(crate) usize);

impl ViewId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A pooled render slot.
///
/// `key`, `layout_info`, `node` and `content` are rebound when the view is recycled; the view
/// type is fixed at creation.
#[derive(Clone, Debug)]
pub struct ReusableView<K, T, V> {
    id: ViewId,
    view_type: ViewType,
    pub(crate) key: Option<ViewKey<K>>,
    pub(crate) layout_info: Option<LayoutInfo<K>>,
    pub(crate) node: Option<NodeRef<K, T>>,
    pub(crate) content: Option<V>,
}

impl<K, T, V> ReusableView<K, T, V> {
    pub(crate) fn new(id: ViewId, view_type: ViewType) -> Self {
        Self {
            id,
            view_type,
            key: None,
            layout_info: None,
            node: None,
            content: None,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn key(&self) -> Option<&ViewKey<K>> {
        self.key.as_ref()
    }

    pub fn layout_info(&self) -> Option<&LayoutInfo<K>> {
        self.layout_info.as_ref()
    }

    pub fn node(&self) -> Option<&Node<K, T>> {
        self.node.as_deref()
    }

    pub fn content(&self) -> Option<&V> {
        self.content.as_ref()
    }

    pub fn parent_key(&self) -> Option<&K> {
        self.layout_info.as_ref().and_then(|info| info.parent_key.as_ref())
    }

    pub fn is_bound(&self) -> bool {
        self.key.is_some()
    }
}
