use alloc::vec;
use alloc::vec::Vec;

use crate::key::{KeyMap, NodeKey};
use crate::{Collection, Layout, LayoutContext, LayoutInfo, Rect, Size, ViewKey, ViewType};

/// Configuration for [`WaterfallLayout`].
#[derive(Clone, Debug, PartialEq)]
pub struct WaterfallLayoutOptions {
    pub min_item_width: f64,
    pub max_item_width: f64,
    pub max_columns: usize,
    /// Gap between columns and between items of a column.
    pub spacing: f64,
    /// Space around the grid.
    pub margin: f64,
    pub estimated_item_height: f64,
    pub loader_height: f64,
    pub placeholder_height: Option<f64>,
    pub is_loading: bool,
    pub has_empty_state: bool,
}

impl Default for WaterfallLayoutOptions {
    fn default() -> Self {
        Self {
            min_item_width: 200.0,
            max_item_width: f64::INFINITY,
            max_columns: usize::MAX,
            spacing: 18.0,
            margin: 24.0,
            estimated_item_height: 200.0,
            loader_height: 48.0,
            placeholder_height: None,
            is_loading: false,
            has_empty_state: false,
        }
    }
}

impl WaterfallLayoutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item_width(mut self, min: f64, max: f64) -> Self {
        self.min_item_width = min;
        self.max_item_width = max;
        self
    }

    pub fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = max_columns;
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_estimated_item_height(mut self, height: f64) -> Self {
        self.estimated_item_height = height;
        self
    }

    pub fn with_loader_height(mut self, height: f64) -> Self {
        self.loader_height = height;
        self
    }

    pub fn with_placeholder_height(mut self, height: Option<f64>) -> Self {
        self.placeholder_height = height;
        self
    }

    pub fn with_is_loading(mut self, is_loading: bool) -> Self {
        self.is_loading = is_loading;
        self
    }

    pub fn with_has_empty_state(mut self, has_empty_state: bool) -> Self {
        self.has_empty_state = has_empty_state;
        self
    }
}

#[derive(Clone, Debug)]
struct Placement<K> {
    key: K,
    view_type: ViewType,
    column: usize,
    y: f64,
    height: f64,
    estimated: bool,
}

/// Items in columns of equal width; each item goes into the currently shortest column.
///
/// Only top-level items are placed; loader nodes are left to the synthesized loader row. Since every item starts at the height of the
/// shortest column, item `y` offsets are non-decreasing in collection order.
#[derive(Clone, Debug)]
pub struct WaterfallLayout<K> {
    options: WaterfallLayoutOptions,
    placements: Vec<Placement<K>>,
    index: KeyMap<K, usize>,
    measured: KeyMap<K, f64>,
    columns: usize,
    item_width: f64,
    width: f64,
    viewport_height: f64,
    column_heights: Vec<f64>,
    tallest_item: f64,
    synthesized: Option<LayoutInfo<K>>,
}

impl<K: NodeKey> Default for WaterfallLayout<K> {
    fn default() -> Self {
        Self::new(WaterfallLayoutOptions::default())
    }
}

impl<K: NodeKey> WaterfallLayout<K> {
    pub fn new(options: WaterfallLayoutOptions) -> Self {
        Self {
            options,
            placements: Vec::new(),
            index: KeyMap::default(),
            measured: KeyMap::default(),
            columns: 1,
            item_width: 0.0,
            width: 0.0,
            viewport_height: 0.0,
            column_heights: Vec::new(),
            tallest_item: 0.0,
            synthesized: None,
        }
    }

    pub fn options(&self) -> &WaterfallLayoutOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: WaterfallLayoutOptions) {
        self.options = options;
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn item_width(&self) -> f64 {
        self.item_width
    }

    /// Column each placed item landed in.
    pub fn column_of(&self, key: &K) -> Option<usize> {
        self.index.get(key).map(|&i| self.placements[i].column)
    }

    fn compute_columns(&mut self, width: f64) {
        let o = &self.options;
        let available = (width - 2.0 * o.margin).max(0.0);
        let step = o.min_item_width + o.spacing;
        let fit = if step > 0.0 {
            ((available + o.spacing) / step) as usize
        } else {
            o.max_columns
        };
        let columns = fit.min(o.max_columns).max(1);
        let gaps = o.spacing * (columns - 1) as f64;
        let item_width = ((available - gaps) / columns as f64)
            .min(o.max_item_width)
            .max(0.0);

        if item_width != self.item_width && !self.measured.is_empty() {
            vdebug!(
                item_width,
                previous = self.item_width,
                "WaterfallLayout: item width changed, dropping measurements"
            );
            self.measured.clear();
        }
        self.columns = columns;
        self.item_width = item_width;
        self.width = width;
    }

    fn column_x(&self, column: usize) -> f64 {
        self.options.margin + column as f64 * (self.item_width + self.options.spacing)
    }

    fn item_height(&self, key: &K) -> (f64, bool) {
        match self.measured.get(key) {
            Some(&height) => (height, false),
            None => (self.options.estimated_item_height, true),
        }
    }

    /// Places items from `from` on, starting with column heights rebuilt from the placements
    /// before it.
    fn place_from(&mut self, from: usize) {
        let spacing = self.options.spacing;
        let mut heights = vec![self.options.margin; self.columns];
        for p in &self.placements[..from] {
            heights[p.column] = p.y + p.height + spacing;
        }
        for i in from..self.placements.len() {
            let column = shortest(&heights);
            let (height, estimated) = self.item_height(&self.placements[i].key);
            let p = &mut self.placements[i];
            p.column = column;
            p.y = heights[column];
            p.height = height;
            p.estimated = estimated;
            heights[column] = p.y + height + spacing;
        }
        self.column_heights = heights;
        self.tallest_item = self
            .placements
            .iter()
            .map(|p| p.height)
            .fold(0.0, f64::max);
        self.place_synthesized();
    }

    fn items_height(&self) -> f64 {
        if self.placements.is_empty() {
            return self.options.margin;
        }
        let tallest = self.column_heights.iter().copied().fold(0.0, f64::max);
        tallest - self.options.spacing
    }

    fn place_synthesized(&mut self) {
        let o = &self.options;
        let is_empty = self.placements.is_empty();
        let y = self.items_height();
        let fill = (self.viewport_height - 2.0 * o.margin).max(0.0);
        let synthesized = if o.is_loading {
            let height = if is_empty {
                fill.max(o.loader_height)
            } else {
                o.loader_height
            };
            Some((ViewKey::Loader, ViewType::Loader, height))
        } else if is_empty && o.has_empty_state {
            let height = o.placeholder_height.unwrap_or(fill);
            Some((ViewKey::Placeholder, ViewType::Placeholder, height))
        } else {
            None
        };
        let width = (self.width - 2.0 * o.margin).max(0.0);
        let x = o.margin;
        self.synthesized = synthesized
            .map(|(key, view_type, height)| {
                LayoutInfo::new(key, view_type, Rect::new(x, y, width, height))
            });
    }

    fn placement_info(&self, p: &Placement<K>) -> LayoutInfo<K> {
        let rect = Rect::new(self.column_x(p.column), p.y, self.item_width, p.height);
        LayoutInfo::new(ViewKey::Node(p.key.clone()), p.view_type, rect)
            .with_estimated(p.estimated)
    }
}

fn shortest(heights: &[f64]) -> usize {
    let mut best = 0;
    for (i, &h) in heights.iter().enumerate() {
        if h < heights[best] {
            best = i;
        }
    }
    best
}

impl<C: Collection> Layout<C> for WaterfallLayout<C::Key> {
    fn validate(&mut self, ctx: &LayoutContext<'_, C>) {
        let inv = ctx.invalidation;
        if !inv.any() {
            return;
        }
        self.compute_columns(ctx.viewport.width);
        self.viewport_height = ctx.viewport.height;

        self.placements.clear();
        self.index.clear();
        for node in ctx.collection.iter().filter(|node| node.is_row()) {
            self.index.insert(node.key.clone(), self.placements.len());
            self.placements.push(Placement {
                key: node.key.clone(),
                view_type: node.node_type.into(),
                column: 0,
                y: 0.0,
                height: 0.0,
                estimated: true,
            });
        }
        self.place_from(0);
        vdebug!(
            items = self.placements.len(),
            columns = self.columns,
            item_width = self.item_width,
            "WaterfallLayout::validate"
        );
    }

    fn for_each_visible_layout_info(&self, rect: Rect, f: &mut dyn FnMut(LayoutInfo<C::Key>)) {
        // `y` is non-decreasing, so nothing before `start` can reach `rect`.
        let start = self
            .placements
            .partition_point(|p| p.y + self.tallest_item <= rect.y);
        for p in &self.placements[start..] {
            if p.y >= rect.max_y() {
                break;
            }
            let info = self.placement_info(p);
            if info.rect.intersects(&rect) {
                f(info);
            }
        }
        if let Some(info) = &self.synthesized {
            if info.rect.intersects(&rect) {
                f(info.clone());
            }
        }
    }

    fn layout_info(&self, key: &ViewKey<C::Key>) -> Option<LayoutInfo<C::Key>> {
        match key {
            ViewKey::Node(k) => {
                let &i = self.index.get(k)?;
                Some(self.placement_info(&self.placements[i]))
            }
            ViewKey::Loader | ViewKey::Placeholder => self
                .synthesized
                .as_ref()
                .filter(|info| &info.key == key)
                .cloned(),
        }
    }

    fn content_size(&self) -> Size {
        let mut height = self.items_height() + self.options.margin;
        if let Some(info) = &self.synthesized {
            height = height.max(info.rect.max_y() + self.options.margin);
        }
        Size::new(self.width.max(0.0), height.max(0.0))
    }

    fn update_item_size(&mut self, key: &ViewKey<C::Key>, size: Size) -> bool {
        let Some(node_key) = key.node_key() else {
            return false;
        };
        let Some(&index) = self.index.get(node_key) else {
            return false;
        };
        self.measured.insert(node_key.clone(), size.height);
        let p = &mut self.placements[index];
        p.estimated = false;
        if p.height == size.height {
            return false;
        }
        vtrace!(key = ?node_key, height = size.height, "WaterfallLayout::update_item_size");
        self.place_from(index);
        true
    }

    fn set_loading(&mut self, is_loading: bool) -> bool {
        if self.options.is_loading == is_loading {
            return false;
        }
        self.options.is_loading = is_loading;
        true
    }
}
