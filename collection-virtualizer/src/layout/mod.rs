//! The layout contract and the built-in layouts.

mod list;
mod waterfall;

use alloc::vec::Vec;

use crate::{Collection, Rect, Size, ViewKey, ViewType};

pub use list::{ListLayout, ListLayoutOptions};
pub use waterfall::{WaterfallLayout, WaterfallLayoutOptions};

/// Geometry of one view, valid until the layout is validated again.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutInfo<K> {
    pub key: ViewKey<K>,
    pub view_type: ViewType,
    pub rect: Rect,
    pub z_index: i32,
    pub is_sticky: bool,
    /// Key of the wrapping section, if any.
    pub parent_key: Option<K>,
    /// `true` while the size is an estimate rather than a measurement.
    pub estimated: bool,
}

impl<K> LayoutInfo<K> {
    pub fn new(key: ViewKey<K>, view_type: ViewType, rect: Rect) -> Self {
        Self {
            key,
            view_type,
            rect,
            z_index: 0,
            is_sticky: false,
            parent_key: None,
            estimated: false,
        }
    }

    pub fn with_parent_key(mut self, parent_key: Option<K>) -> Self {
        self.parent_key = parent_key;
        self
    }

    pub fn with_estimated(mut self, estimated: bool) -> Self {
        self.estimated = estimated;
        self
    }
}

/// What changed since the previous [`Layout::validate`] call.
///
/// All flags `false` means only item sizes changed through [`Layout::update_item_size`], which a
/// layout has already applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub collection_changed: bool,
    pub size_changed: bool,
    pub options_changed: bool,
}

impl Invalidation {
    pub const ALL: Self = Self {
        collection_changed: true,
        size_changed: true,
        options_changed: true,
    };

    pub fn any(&self) -> bool {
        self.collection_changed || self.size_changed || self.options_changed
    }

    pub(crate) fn merge(&mut self, other: Invalidation) {
        self.collection_changed |= other.collection_changed;
        self.size_changed |= other.size_changed;
        self.options_changed |= other.options_changed;
    }
}

pub struct LayoutContext<'a, C> {
    pub collection: &'a C,
    pub viewport: Size,
    pub invalidation: Invalidation,
}

/// Maps a collection and a viewport size to per-key geometry.
///
/// Implementations may only emit [`ViewKey::Node`] keys that exist in the collection they were
/// last validated with; [`crate::Virtualizer`] treats anything else as a contract violation.
pub trait Layout<C: Collection> {
    fn validate(&mut self, ctx: &LayoutContext<'_, C>);

    /// Calls `f` for every layout info whose rect intersects `rect`, including synthesized
    /// loader/placeholder rows.
    fn for_each_visible_layout_info(&self, rect: Rect, f: &mut dyn FnMut(LayoutInfo<C::Key>));

    fn visible_layout_infos(&self, rect: Rect) -> Vec<LayoutInfo<C::Key>> {
        let mut out = Vec::new();
        self.for_each_visible_layout_info(rect, &mut |info| out.push(info));
        out
    }

    fn layout_info(&self, key: &ViewKey<C::Key>) -> Option<LayoutInfo<C::Key>>;

    fn content_size(&self) -> Size;

    /// Records the measured size of `key`. Returns `true` if any geometry changed.
    fn update_item_size(&mut self, _key: &ViewKey<C::Key>, _size: Size) -> bool {
        false
    }

    /// Toggles the trailing loader row. Returns `true` if the layout must be validated again.
    fn set_loading(&mut self, _is_loading: bool) -> bool {
        false
    }

    fn should_invalidate(&self, new_rect: Rect, old_rect: Rect) -> bool {
        new_rect.width != old_rect.width || new_rect.height != old_rect.height
    }
}
