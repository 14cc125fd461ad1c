use alloc::sync::Arc;

use crate::{Node, Rect, ScrollState, ViewType};

/// Renders the content of a newly bound view.
///
/// Synthesized rows (loader, placeholder) have no node.
pub type RenderView<K, T, V> = Arc<dyn Fn(ViewType, Option<&Node<K, T>>) -> V + Send + Sync>;

/// A callback fired when the virtualizer wants more items.
pub type OnLoadMore = Arc<dyn Fn() + Send + Sync>;

/// A callback fired after a reconciliation or a scrolling state change.
pub type OnChangeCallback = Arc<dyn Fn(ScrollState) + Send + Sync>;

/// Configuration for [`crate::Virtualizer`].
///
/// This type is designed to be cheap to clone: callbacks are stored in `Arc`s.
pub struct VirtualizerOptions<K, T, V> {
    pub render_view: RenderView<K, T, V>,
    pub on_load_more: Option<OnLoadMore>,
    pub on_change: Option<OnChangeCallback>,

    /// Extra content queried above and below the visible rect.
    pub overscan: f64,

    /// The visible rect before the host reports one.
    pub initial_rect: Option<Rect>,

    /// `on_load_more` fires once the visible rect starts within this many viewport heights of
    /// the end of the content.
    pub load_more_threshold: f64,
}

impl<K, T, V> Clone for VirtualizerOptions<K, T, V> {
    fn clone(&self) -> Self {
        Self {
            render_view: Arc::clone(&self.render_view),
            on_load_more: self.on_load_more.clone(),
            on_change: self.on_change.clone(),
            overscan: self.overscan,
            initial_rect: self.initial_rect,
            load_more_threshold: self.load_more_threshold,
        }
    }
}

impl<K, T, V> VirtualizerOptions<K, T, V> {
    pub fn new(
        render_view: impl Fn(ViewType, Option<&Node<K, T>>) -> V + Send + Sync + 'static,
    ) -> Self {
        Self {
            render_view: Arc::new(render_view),
            on_load_more: None,
            on_change: None,
            overscan: 0.0,
            initial_rect: None,
            load_more_threshold: 2.0,
        }
    }

    pub fn with_render_view(
        mut self,
        render_view: impl Fn(ViewType, Option<&Node<K, T>>) -> V + Send + Sync + 'static,
    ) -> Self {
        self.render_view = Arc::new(render_view);
        self
    }

    pub fn with_on_load_more(
        mut self,
        on_load_more: Option<impl Fn() + Send + Sync + 'static>,
    ) -> Self {
        self.on_load_more = on_load_more.map(|f| Arc::new(f) as _);
        self
    }

    pub fn with_on_change(
        mut self,
        on_change: Option<impl Fn(ScrollState) + Send + Sync + 'static>,
    ) -> Self {
        self.on_change = on_change.map(|f| Arc::new(f) as _);
        self
    }

    pub fn with_overscan(mut self, overscan: f64) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_initial_rect(mut self, initial_rect: Option<Rect>) -> Self {
        self.initial_rect = initial_rect;
        self
    }

    pub fn with_load_more_threshold(mut self, threshold: f64) -> Self {
        self.load_more_threshold = threshold;
        self
    }
}

impl<K, T, V> core::fmt::Debug for VirtualizerOptions<K, T, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VirtualizerOptions")
            .field("on_load_more", &self.on_load_more.is_some())
            .field("on_change", &self.on_change.is_some())
            .field("overscan", &self.overscan)
            .field("initial_rect", &self.initial_rect)
            .field("load_more_threshold", &self.load_more_threshold)
            .finish_non_exhaustive()
    }
}
