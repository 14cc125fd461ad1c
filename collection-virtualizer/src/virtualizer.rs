use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp;

use crate::key::{KeyMap, KeySet};
use crate::load_more::LoadMore;
use crate::pool::ViewPool;
use crate::{
    Align, Collection, ContractViolation, Invalidation, Layout, LayoutContext, LayoutInfo,
    LayoutInfoEmitter, NodeRef, Rect, ReusableView, ScrollDirection, ScrollState, Size, ViewId,
    ViewKey, ViewType, VirtualizerOptions, VirtualizerState,
};

/// A live view and the live views nested under it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewNode {
    pub id: ViewId,
    pub children: Vec<ViewNode>,
}

/// A headless collection virtualizer.
///
/// This type is UI-agnostic:
/// - It holds rendered content only as the opaque `V` returned by `render_view`.
/// - Your adapter drives it by reporting the visible rect (`on_visible_rect_change`) and scroll
///   gestures (`start_scrolling`/`end_scrolling`).
/// - Rendering is exposed as an ordered list of pooled views (`visible_views`) and a wrapper tree
///   (`render_tree`).
///
/// Every event runs validation and reconciliation to completion before returning. A layout that
/// breaks its contract makes the event methods panic; use [`Self::try_reconcile`] to observe the
/// error instead.
///
/// For scroll settling and anchoring across rebuilds, see the `collection-virtualizer-adapter`
/// crate.
pub struct Virtualizer<C: Collection, L, V> {
    collection: Arc<C>,
    layout: L,
    options: VirtualizerOptions<C::Key, C::Value, V>,
    pool: ViewPool<C::Key, C::Value, V>,
    /// Pre-order rank of every collection key.
    order: KeyMap<C::Key, usize>,
    ordered: Vec<ViewId>,

    visible_rect: Rect,
    is_scrolling: bool,
    scroll_direction: Option<ScrollDirection>,

    dirty: bool,
    invalidation: Invalidation,

    focused_key: Option<C::Key>,
    persisted_keys: KeySet<C::Key>,
    load_more: LoadMore,

    batch_depth: usize,
    batch_pending: bool,
    /// A visible-rect move inside a batch still owes a load-more check.
    batch_scroll_check: bool,
}

fn pre_order<C: Collection>(collection: &C) -> KeyMap<C::Key, usize> {
    collection
        .keys()
        .enumerate()
        .map(|(i, key)| (key.clone(), i))
        .collect()
}

fn same_node<K, T>(a: &Option<NodeRef<K, T>>, b: &Option<NodeRef<K, T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn render_rank<K: crate::NodeKey>(
    order: &KeyMap<K, usize>,
    key: Option<&ViewKey<K>>,
) -> (u8, usize) {
    match key {
        Some(ViewKey::Node(key)) => (0, order.get(key).copied().unwrap_or(usize::MAX)),
        Some(ViewKey::Loader) => (1, 0),
        Some(ViewKey::Placeholder) => (2, 0),
        None => (3, 0),
    }
}

impl<C, L, V> Virtualizer<C, L, V>
where
    C: Collection,
    L: Layout<C>,
{
    /// Creates a virtualizer and runs the first layout pass.
    ///
    /// The visible rect starts at `options.initial_rect` (or empty) until the host reports one.
    pub fn new(
        layout: L,
        collection: Arc<C>,
        options: VirtualizerOptions<C::Key, C::Value, V>,
    ) -> Self {
        let visible_rect = options.initial_rect.unwrap_or_default();
        vdebug!(
            len = collection.len(),
            width = visible_rect.width,
            height = visible_rect.height,
            overscan = options.overscan,
            "Virtualizer::new"
        );
        let mut v = Self {
            order: pre_order(&*collection),
            collection,
            layout,
            options,
            pool: ViewPool::new(),
            ordered: Vec::new(),
            visible_rect,
            is_scrolling: false,
            scroll_direction: None,
            dirty: true,
            invalidation: Invalidation::ALL,
            focused_key: None,
            persisted_keys: KeySet::default(),
            load_more: LoadMore::default(),
            batch_depth: 0,
            batch_pending: false,
            batch_scroll_check: false,
        };
        v.flush();
        v
    }

    pub fn options(&self) -> &VirtualizerOptions<C::Key, C::Value, V> {
        &self.options
    }

    pub fn collection(&self) -> &Arc<C> {
        &self.collection
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn set_on_load_more(&mut self, on_load_more: Option<impl Fn() + Send + Sync + 'static>) {
        self.options.on_load_more = on_load_more.map(|f| Arc::new(f) as _);
    }

    pub fn set_on_change(
        &mut self,
        on_change: Option<impl Fn(ScrollState) + Send + Sync + 'static>,
    ) {
        self.options.on_change = on_change.map(|f| Arc::new(f) as _);
    }

    /// Replaces the options and reconciles.
    ///
    /// Live views keep their binding; they are re-rendered only when `render_view` changed.
    pub fn set_options(&mut self, options: VirtualizerOptions<C::Key, C::Value, V>) {
        let render_view_unchanged = Arc::ptr_eq(&self.options.render_view, &options.render_view);
        self.options = options;
        vtrace!(
            overscan = self.options.overscan,
            load_more_threshold = self.options.load_more_threshold,
            render_view_unchanged,
            "Virtualizer::set_options"
        );
        if !render_view_unchanged {
            let live: Vec<ViewId> = self.pool.live_ids().collect();
            for id in live {
                if let Some(view) = self.pool.get_mut(id) {
                    view.content =
                        Some((self.options.render_view)(view.view_type(), view.node.as_deref()));
                }
            }
        }
        self.flush();
    }

    pub fn update_options(&mut self, f: impl FnOnce(&mut VirtualizerOptions<C::Key, C::Value, V>)) {
        let mut next = self.options.clone();
        f(&mut next);
        self.set_options(next);
    }

    fn notify(&self) {
        if let Some(cb) = &self.options.on_change {
            cb(self.scroll_state());
        }
    }

    fn invalidate(&mut self, invalidation: Invalidation) {
        self.invalidation.merge(invalidation);
        self.dirty = true;
    }

    /// Reconciles now, or at the end of the current batch.
    fn flush(&mut self) {
        if self.batch_depth > 0 {
            self.batch_pending = true;
            return;
        }
        if let Err(violation) = self.try_reconcile() {
            vwarn!(%violation, "Virtualizer: layout contract violation");
            panic!("collection-virtualizer: {violation}");
        }
    }

    /// Batches multiple updates into a single validation and reconciliation pass.
    ///
    /// Inside the batch, [`Self::state`] reports [`VirtualizerState::LayoutDirty`] once something
    /// invalidated the layout.
    pub fn batch_update(&mut self, f: impl FnOnce(&mut Self)) {
        self.batch_depth = self.batch_depth.saturating_add(1);

        f(self);

        debug_assert!(self.batch_depth > 0, "batch_depth underflow");
        self.batch_depth = self.batch_depth.saturating_sub(1);

        if self.batch_depth > 0 {
            return;
        }
        if core::mem::take(&mut self.batch_pending) {
            self.flush();
        }
        if core::mem::take(&mut self.batch_scroll_check) {
            self.check_load_more_on_scroll();
        }
    }

    /// Validates the layout if needed and reconciles the pool against the visible rect.
    ///
    /// On error the pool is left as it was before the call.
    pub fn try_reconcile(&mut self) -> Result<(), ContractViolation> {
        if self.dirty {
            let invalidation = core::mem::take(&mut self.invalidation);
            self.layout.validate(&LayoutContext {
                collection: &*self.collection,
                viewport: self.visible_rect.size(),
                invalidation,
            });
            self.dirty = false;
        }

        let collection = Arc::clone(&self.collection);
        let query = self.visible_rect.inflate_y(self.options.overscan);
        let mut wanted: Vec<(LayoutInfo<C::Key>, Option<NodeRef<C::Key, C::Value>>)> = Vec::new();
        let mut push = |info: LayoutInfo<C::Key>, node: Option<&NodeRef<C::Key, C::Value>>| {
            wanted.push((info, node.cloned()));
        };
        let mut emitter = LayoutInfoEmitter::new(&*collection, &mut push);
        self.layout
            .for_each_visible_layout_info(query, &mut |info| emitter.emit(info));
        for key in self.focused_key.iter().chain(self.persisted_keys.iter()) {
            let key = ViewKey::Node(key.clone());
            if emitter.contains(&key) {
                continue;
            }
            if let Some(info) = self.layout.layout_info(&key) {
                emitter.emit(info);
            }
        }
        emitter.finish()?;

        let wanted_keys: KeySet<ViewKey<C::Key>> =
            wanted.iter().map(|(info, _)| info.key.clone()).collect();
        let stale: Vec<ViewKey<C::Key>> = self
            .pool
            .live_keys()
            .filter(|key| !wanted_keys.contains(*key))
            .cloned()
            .collect();
        for key in &stale {
            self.pool.release(key);
        }

        for (info, node) in wanted {
            if let Some(id) = self.pool.live_id(&info.key) {
                if let Some(view) = self.pool.get_mut(id) {
                    if view.view_type() == info.view_type {
                        if !same_node(&view.node, &node) {
                            view.content = Some((self.options.render_view)(
                                info.view_type,
                                node.as_deref(),
                            ));
                            view.node = node;
                        }
                        view.layout_info = Some(info);
                        continue;
                    }
                }
                // The key changed kind across a rebuild.
                self.pool.release(&info.key);
            }
            let id = self.pool.acquire(info.view_type);
            let content = (self.options.render_view)(info.view_type, node.as_deref());
            self.pool.bind(id, info, node, content)?;
        }

        self.ordered.clear();
        self.ordered.extend(self.pool.live_ids());
        let (order, pool) = (&self.order, &self.pool);
        self.ordered
            .sort_by_key(|&id| render_rank(order, pool.get(id).and_then(|v| v.key())));

        vtrace!(
            y = self.visible_rect.y,
            height = self.visible_rect.height,
            live = self.pool.live_count(),
            released = stale.len(),
            created = self.pool.created_count(),
            "Virtualizer::reconcile"
        );

        if self.options.on_load_more.is_some() {
            let content = self.layout.content_size();
            if self
                .load_more
                .check_content_fit(self.visible_rect.size(), content)
            {
                self.fire_load_more();
            }
        }

        self.notify();
        Ok(())
    }

    fn fire_load_more(&self) {
        if let Some(cb) = &self.options.on_load_more {
            vdebug!(
                y = self.visible_rect.y,
                content_height = self.layout.content_size().height,
                "Virtualizer: load more"
            );
            cb();
        }
    }

    fn check_load_more_on_scroll(&mut self) {
        if self.options.on_load_more.is_none() {
            return;
        }
        if self.batch_depth > 0 {
            self.batch_scroll_check = true;
            return;
        }
        let content = self.layout.content_size();
        if self.load_more.check_scroll(
            self.visible_rect,
            content,
            self.options.load_more_threshold,
        ) {
            self.fire_load_more();
        }
    }

    /// Replaces the collection. A no-op when `collection` is the current one.
    pub fn set_collection(&mut self, collection: Arc<C>) {
        if Arc::ptr_eq(&self.collection, &collection) {
            return;
        }
        vdebug!(
            previous = self.collection.len(),
            len = collection.len(),
            "Virtualizer::set_collection"
        );
        self.order = pre_order(&*collection);
        self.collection = collection;
        self.invalidate(Invalidation {
            collection_changed: true,
            ..Invalidation::default()
        });
        self.flush();
    }

    /// The single inbound geometry event from the host.
    ///
    /// An offset change starts scrolling; a size change the layout cares about (see
    /// [`Layout::should_invalidate`]) invalidates the layout.
    pub fn on_visible_rect_change(&mut self, rect: Rect) {
        let old = self.visible_rect;
        if rect == old {
            return;
        }
        self.visible_rect = rect;
        if rect.x != old.x || rect.y != old.y {
            self.scroll_direction = match rect.y.partial_cmp(&old.y) {
                Some(cmp::Ordering::Greater) => Some(ScrollDirection::Forward),
                Some(cmp::Ordering::Less) => Some(ScrollDirection::Backward),
                _ => self.scroll_direction,
            };
            self.is_scrolling = true;
        }
        if self.layout.should_invalidate(rect, old) {
            self.invalidate(Invalidation {
                size_changed: true,
                ..Invalidation::default()
            });
        }
        vtrace!(
            y = rect.y,
            height = rect.height,
            width = rect.width,
            "Virtualizer::on_visible_rect_change"
        );
        self.flush();
        self.check_load_more_on_scroll();
    }

    pub fn start_scrolling(&mut self) {
        if self.is_scrolling {
            return;
        }
        self.is_scrolling = true;
        self.notify();
    }

    pub fn end_scrolling(&mut self) {
        if !self.is_scrolling {
            return;
        }
        self.is_scrolling = false;
        self.scroll_direction = None;
        self.notify();
    }

    /// Reports the measured size of a live view. Returns `true` if the layout changed.
    ///
    /// Keys without a live view are ignored.
    pub fn update_item_size(&mut self, key: &C::Key, size: Size) -> bool {
        let view_key = ViewKey::Node(key.clone());
        if self.pool.live_id(&view_key).is_none() {
            vdebug!(key = ?key, "Virtualizer::update_item_size: no live view");
            return false;
        }
        if !self.layout.update_item_size(&view_key, size) {
            return false;
        }
        self.invalidate(Invalidation::default());
        self.flush();
        true
    }

    /// Sets the key that must stay rendered regardless of the visible rect.
    pub fn set_focused_key(&mut self, key: Option<C::Key>) {
        if self.focused_key == key {
            return;
        }
        self.focused_key = key;
        self.flush();
    }

    pub fn focused_key(&self) -> Option<&C::Key> {
        self.focused_key.as_ref()
    }

    /// Replaces the explicit set of keys that stay rendered regardless of the visible rect.
    pub fn set_persisted_keys(&mut self, keys: impl IntoIterator<Item = C::Key>) {
        self.persisted_keys = keys.into_iter().collect();
        self.flush();
    }

    pub fn persisted_keys(&self) -> impl Iterator<Item = &C::Key> {
        self.persisted_keys.iter()
    }

    /// Applies `f` to the layout, then validates and reconciles.
    pub fn update_layout(&mut self, f: impl FnOnce(&mut L)) {
        f(&mut self.layout);
        self.invalidate(Invalidation {
            options_changed: true,
            ..Invalidation::default()
        });
        self.flush();
    }

    /// Reports whether the caller is loading more items.
    ///
    /// Clearing the flag re-arms `on_load_more`; the layout's loader row follows the flag.
    pub fn set_loading(&mut self, is_loading: bool) {
        self.load_more.set_loading(is_loading);
        if self.layout.set_loading(is_loading) {
            self.invalidate(Invalidation {
                options_changed: true,
                ..Invalidation::default()
            });
        }
        self.flush();
    }

    pub fn is_load_more_pending(&self) -> bool {
        self.load_more.is_guarded()
    }

    /// Computes the offset (`y` of the visible rect) that shows `key` with `align`, clamped to
    /// the content. `None` if the layout has no info for `key`.
    pub fn scroll_to_key_offset(&self, key: &C::Key, align: Align) -> Option<f64> {
        let info = self.layout.layout_info(&ViewKey::Node(key.clone()))?;
        let rect = info.rect;
        let current = self.visible_rect;
        let view = current.height;

        let target = match align {
            Align::Start => rect.y,
            Align::End => rect.max_y() - view,
            Align::Center => rect.y + rect.height / 2.0 - view / 2.0,
            Align::Auto => {
                if rect.y >= current.y && rect.max_y() <= current.max_y() {
                    current.y
                } else if rect.y < current.y {
                    rect.y
                } else {
                    rect.max_y() - view
                }
            }
        };
        Some(self.clamp_offset(target))
    }

    /// Scrolls so that `key` is shown with `align` and returns the new visible rect, which the
    /// host must apply to its scroll surface.
    pub fn scroll_to_key(&mut self, key: &C::Key, align: Align) -> Option<Rect> {
        let y = self.scroll_to_key_offset(key, align)?;
        let current = self.visible_rect;
        let rect = Rect::new(current.x, y, current.width, current.height);
        if rect != self.visible_rect {
            self.scroll_direction = if y > self.visible_rect.y {
                Some(ScrollDirection::Forward)
            } else {
                Some(ScrollDirection::Backward)
            };
            self.visible_rect = rect;
            self.flush();
            self.check_load_more_on_scroll();
        }
        Some(rect)
    }

    pub fn max_scroll_offset(&self) -> f64 {
        (self.layout.content_size().height - self.visible_rect.height).max(0.0)
    }

    fn clamp_offset(&self, offset: f64) -> f64 {
        offset.min(self.max_scroll_offset()).max(0.0)
    }

    /// Live views in render order: collection pre-order, then the synthesized loader and
    /// placeholder.
    pub fn visible_views(&self) -> Vec<&ReusableView<C::Key, C::Value, V>> {
        self.ordered
            .iter()
            .filter_map(|&id| self.pool.get(id))
            .collect()
    }

    pub fn for_each_visible_view(&self, mut f: impl FnMut(&ReusableView<C::Key, C::Value, V>)) {
        for &id in &self.ordered {
            if let Some(view) = self.pool.get(id) {
                f(view);
            }
        }
    }

    /// Live views nested under the live view of their parent (section wrappers), in render
    /// order.
    pub fn render_tree(&self) -> Vec<ViewNode> {
        let views: Vec<&ReusableView<C::Key, C::Value, V>> = self.visible_views();
        let mut position: KeyMap<&C::Key, usize> = KeyMap::default();
        for (i, view) in views.iter().enumerate() {
            if let Some(ViewKey::Node(key)) = view.key() {
                position.insert(key, i);
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); views.len()];
        let mut roots = Vec::new();
        for (i, view) in views.iter().enumerate() {
            match view.parent_key().and_then(|p| position.get(p)) {
                Some(&p) if p < i => children[p].push(i),
                _ => roots.push(i),
            }
        }

        // Children sit after their parent: back to front completes every subtree first.
        let mut built: Vec<Option<ViewNode>> = vec![None; views.len()];
        for i in (0..views.len()).rev() {
            let nested = children[i]
                .iter()
                .filter_map(|&c| built[c].take())
                .collect();
            built[i] = Some(ViewNode {
                id: views[i].id(),
                children: nested,
            });
        }

        roots.into_iter().filter_map(|i| built[i].take()).collect()
    }

    pub fn view(&self, id: ViewId) -> Option<&ReusableView<C::Key, C::Value, V>> {
        self.pool.get(id)
    }

    /// The live view bound to `key`.
    pub fn live_view(&self, key: &ViewKey<C::Key>) -> Option<&ReusableView<C::Key, C::Value, V>> {
        self.pool.live_id(key).and_then(|id| self.pool.get(id))
    }

    pub fn layout_info(&self, key: &ViewKey<C::Key>) -> Option<LayoutInfo<C::Key>> {
        self.layout.layout_info(key)
    }

    pub fn content_size(&self) -> Size {
        self.layout.content_size()
    }

    pub fn visible_rect(&self) -> Rect {
        self.visible_rect
    }

    pub fn state(&self) -> VirtualizerState {
        if self.dirty {
            VirtualizerState::LayoutDirty
        } else if self.is_scrolling {
            VirtualizerState::Scrolling
        } else {
            VirtualizerState::Idle
        }
    }

    pub fn is_scrolling(&self) -> bool {
        self.is_scrolling
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.scroll_direction
    }

    /// Returns a lightweight snapshot of the current scroll state.
    pub fn scroll_state(&self) -> ScrollState {
        ScrollState {
            visible_rect: self.visible_rect,
            is_scrolling: self.is_scrolling,
        }
    }

    /// Restores a previously captured snapshot in one pass.
    pub fn restore_scroll_state(&mut self, state: ScrollState) {
        self.batch_update(|v| {
            v.on_visible_rect_change(state.visible_rect);
            if state.is_scrolling {
                v.start_scrolling();
            } else {
                v.end_scrolling();
            }
        });
    }

    /// Destroys free views, keeping at most `keep_per_type` of each view type. Returns how many
    /// were destroyed.
    pub fn shrink_pool(&mut self, keep_per_type: usize) -> usize {
        let destroyed = self.pool.shrink(keep_per_type);
        vdebug!(destroyed, keep_per_type, "Virtualizer::shrink_pool");
        destroyed
    }

    pub fn live_view_count(&self) -> usize {
        self.pool.live_count()
    }

    pub fn free_view_count(&self, view_type: ViewType) -> usize {
        self.pool.free_count(view_type)
    }

    /// Views created over the lifetime of the pool.
    pub fn created_view_count(&self) -> usize {
        self.pool.created_count()
    }
}

impl<C, L, V> core::fmt::Debug for Virtualizer<C, L, V>
where
    C: Collection,
    L: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Virtualizer")
            .field("len", &self.collection.len())
            .field("layout", &self.layout)
            .field("options", &self.options)
            .field("visible_rect", &self.visible_rect)
            .field("is_scrolling", &self.is_scrolling)
            .field("dirty", &self.dirty)
            .field("live", &self.pool.live_count())
            .finish_non_exhaustive()
    }
}
