use crate::Rect;

/// Coarse state of a [`crate::Virtualizer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VirtualizerState {
    #[default]
    Idle,
    Scrolling,
    /// The layout must be validated before the next reconciliation. Only observable inside
    /// [`crate::Virtualizer::batch_update`].
    LayoutDirty,
}

/// A lightweight, serializable snapshot of the current scroll state.
///
/// With `feature = "serde"`, this type implements `Serialize`/`Deserialize`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollState {
    pub visible_rect: Rect,
    pub is_scrolling: bool,
}
