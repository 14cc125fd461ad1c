use core::fmt;

use collection_virtualizer::{
    Collection, Layout, Rect, ScrollState, ViewKey, ViewType, Virtualizer,
};

/// A scroll anchor that can be used to preserve visual position across data changes.
///
/// Typical use cases:
/// - chat/timeline "prepend" (load older messages above) without content jumping
/// - expanding or collapsing rows above the viewport
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollAnchor<K> {
    pub key: K,
    /// The distance from the anchor row's top to the top of the visible rect. Negative when the
    /// row starts below it.
    pub offset_in_viewport: f64,
}

impl<K: fmt::Debug> fmt::Debug for ScrollAnchor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollAnchor")
            .field("key", &self.key)
            .field("offset_in_viewport", &self.offset_in_viewport)
            .finish()
    }
}

/// Captures an anchor for the topmost live row that reaches into the visible rect.
///
/// Sections (wrappers) and pinned headers are skipped since their position does not follow the
/// content. Returns `None` if no such row is live.
pub fn capture_first_visible_anchor<C, L, V>(
    v: &Virtualizer<C, L, V>,
) -> Option<ScrollAnchor<C::Key>>
where
    C: Collection,
    L: Layout<C>,
{
    let visible = v.visible_rect();
    let mut best: Option<(&C::Key, Rect)> = None;
    for view in v.visible_views() {
        let (Some(ViewKey::Node(key)), Some(info)) = (view.key(), view.layout_info()) else {
            continue;
        };
        if view.view_type() == ViewType::Section || info.is_sticky {
            continue;
        }
        if info.rect.max_y() <= visible.y || info.rect.y >= visible.max_y() {
            continue;
        }
        if best.is_none_or(|(_, rect)| info.rect.y < rect.y) {
            best = Some((key, info.rect));
        }
    }
    let (key, rect) = best?;
    Some(ScrollAnchor {
        key: key.clone(),
        offset_in_viewport: visible.y - rect.y,
    })
}

/// Applies a previously captured anchor by moving the visible rect, clamped to the content.
///
/// The scrolling flag is left as it was. Returns `true` when the anchor key still has a layout
/// info.
pub fn apply_anchor<C, L, V>(v: &mut Virtualizer<C, L, V>, anchor: &ScrollAnchor<C::Key>) -> bool
where
    C: Collection,
    L: Layout<C>,
{
    let Some(info) = v.layout_info(&ViewKey::Node(anchor.key.clone())) else {
        vdebug!(key = ?anchor.key, "apply_anchor: anchor key is gone");
        return false;
    };
    let target = (info.rect.y + anchor.offset_in_viewport)
        .min(v.max_scroll_offset())
        .max(0.0);
    let current = v.visible_rect();
    let is_scrolling = v.is_scrolling();
    vtrace!(key = ?anchor.key, from = current.y, to = target, "apply_anchor");
    v.restore_scroll_state(ScrollState {
        visible_rect: Rect::new(current.x, target, current.width, current.height),
        is_scrolling,
    });
    true
}
