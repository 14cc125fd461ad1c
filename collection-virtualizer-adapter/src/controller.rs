use alloc::sync::Arc;

use collection_virtualizer::{
    Align, Collection, Layout, Rect, Size, Virtualizer, VirtualizerOptions,
};

use crate::{ScrollAnchor, apply_anchor, capture_first_visible_anchor};

/// A framework-neutral controller that wraps a `collection_virtualizer::Virtualizer` and provides
/// common adapter workflows (scroll settling, focus-driven scrolling, anchoring).
///
/// This type does not hold any UI objects. Adapters drive it by calling:
/// - `on_resize` / `on_scroll` when UI events occur
/// - `tick(now_ms)` each frame/timer tick, which ends scrolling once no scroll event arrived for
///   `settle_delay_ms`
///
/// Methods that move the visible rect return the offset the host must apply to its real scroll
/// container.
pub struct Controller<C: Collection, L, V> {
    v: Virtualizer<C, L, V>,
    settle_delay_ms: u64,
    last_scroll_ms: Option<u64>,
}

impl<C, L, V> Controller<C, L, V>
where
    C: Collection,
    L: Layout<C>,
{
    pub const DEFAULT_SETTLE_DELAY_MS: u64 = 150;

    pub fn new(
        layout: L,
        collection: Arc<C>,
        options: VirtualizerOptions<C::Key, C::Value, V>,
    ) -> Self {
        Self::from_virtualizer(Virtualizer::new(layout, collection, options))
    }

    pub fn from_virtualizer(v: Virtualizer<C, L, V>) -> Self {
        Self {
            v,
            settle_delay_ms: Self::DEFAULT_SETTLE_DELAY_MS,
            last_scroll_ms: None,
        }
    }

    pub fn with_settle_delay_ms(mut self, settle_delay_ms: u64) -> Self {
        self.settle_delay_ms = settle_delay_ms;
        self
    }

    pub fn settle_delay_ms(&self) -> u64 {
        self.settle_delay_ms
    }

    pub fn virtualizer(&self) -> &Virtualizer<C, L, V> {
        &self.v
    }

    pub fn virtualizer_mut(&mut self) -> &mut Virtualizer<C, L, V> {
        &mut self.v
    }

    pub fn into_virtualizer(self) -> Virtualizer<C, L, V> {
        self.v
    }

    /// Call this when the UI reports a scroll offset change (e.g. user wheel/drag).
    pub fn on_scroll(&mut self, offset: f64, now_ms: u64) {
        let r = self.v.visible_rect();
        self.v
            .on_visible_rect_change(Rect::new(r.x, offset, r.width, r.height));
        self.last_scroll_ms = Some(now_ms);
    }

    /// Call this when the viewport is resized. Does not start scrolling.
    pub fn on_resize(&mut self, size: Size) {
        let r = self.v.visible_rect();
        self.v
            .on_visible_rect_change(Rect::new(r.x, r.y, size.width, size.height));
    }

    /// Ends scrolling once `settle_delay_ms` passed since the last scroll event.
    ///
    /// Returns `true` on the tick that ended scrolling.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        let Some(last) = self.last_scroll_ms else {
            return false;
        };
        if now_ms.saturating_sub(last) < self.settle_delay_ms {
            return false;
        }
        self.last_scroll_ms = None;
        vtrace!(now_ms, last, "Controller::tick: scroll settled");
        self.v.end_scrolling();
        true
    }

    /// Scrolls `key` into view immediately and returns the applied offset.
    pub fn scroll_to_key(&mut self, key: &C::Key, align: Align) -> Option<f64> {
        self.v.scroll_to_key(key, align).map(|rect| rect.y)
    }

    /// Focuses `key` (keeping it rendered) and scrolls the least amount needed to show it.
    ///
    /// Returns the applied offset, or `None` if the layout does not know `key`.
    pub fn focus_key(&mut self, key: C::Key) -> Option<f64> {
        self.v.set_focused_key(Some(key.clone()));
        self.scroll_to_key(&key, Align::Auto)
    }

    pub fn clear_focus(&mut self) {
        self.v.set_focused_key(None);
    }

    pub fn capture_first_visible_anchor(&self) -> Option<ScrollAnchor<C::Key>> {
        capture_first_visible_anchor(&self.v)
    }

    /// Applies a previously captured anchor and returns whether it was applied.
    pub fn apply_anchor(&mut self, anchor: &ScrollAnchor<C::Key>) -> bool {
        apply_anchor(&mut self.v, anchor)
    }

    /// Replaces the collection, keeping the first visible row at the same place in the viewport.
    ///
    /// Returns the offset the host must apply when the anchor was applied.
    pub fn set_collection_anchored(&mut self, collection: Arc<C>) -> Option<f64> {
        let anchor = self.capture_first_visible_anchor();
        self.v.set_collection(collection);
        let anchor = anchor?;
        if !apply_anchor(&mut self.v, &anchor) {
            return None;
        }
        vdebug!(
            key = ?anchor.key,
            offset = self.v.visible_rect().y,
            "Controller::set_collection_anchored"
        );
        Some(self.v.visible_rect().y)
    }
}

impl<C, L, V> core::fmt::Debug for Controller<C, L, V>
where
    C: Collection,
    L: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("v", &self.v)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("last_scroll_ms", &self.last_scroll_ms)
            .finish()
    }
}
