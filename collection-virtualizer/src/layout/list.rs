use alloc::vec::Vec;

use crate::fenwick::Fenwick;
use crate::key::{KeyMap, NodeKey};
use crate::{
    Collection, Layout, LayoutContext, LayoutInfo, Node, NodeType, Rect, Size, ViewKey, ViewType,
};

/// Configuration for [`ListLayout`].
#[derive(Clone, Debug, PartialEq)]
pub struct ListLayoutOptions {
    /// Height of an unmeasured row.
    pub estimated_row_height: f64,
    /// Fixed row height. When set, measurements of rows are ignored.
    pub row_height: Option<f64>,
    pub estimated_heading_height: f64,
    pub heading_height: Option<f64>,
    /// Space above the first and below the last row.
    pub padding: f64,
    pub loader_height: f64,
    /// Height of the empty-state row. Defaults to the viewport height.
    pub placeholder_height: Option<f64>,
    /// Appends a loader row (or fills an empty list with one).
    pub is_loading: bool,
    /// Whether an empty, idle list renders a placeholder row.
    pub has_empty_state: bool,
    /// Pins the header of each visible section to the top of the visible rect.
    pub sticky_headers: bool,
}

impl Default for ListLayoutOptions {
    fn default() -> Self {
        Self {
            estimated_row_height: 48.0,
            row_height: None,
            estimated_heading_height: 48.0,
            heading_height: None,
            padding: 0.0,
            loader_height: 48.0,
            placeholder_height: None,
            is_loading: false,
            has_empty_state: false,
            sticky_headers: false,
        }
    }
}

impl ListLayoutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_estimated_row_height(mut self, height: f64) -> Self {
        self.estimated_row_height = height;
        self
    }

    pub fn with_row_height(mut self, height: Option<f64>) -> Self {
        self.row_height = height;
        self
    }

    pub fn with_estimated_heading_height(mut self, height: f64) -> Self {
        self.estimated_heading_height = height;
        self
    }

    pub fn with_heading_height(mut self, height: Option<f64>) -> Self {
        self.heading_height = height;
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
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

    pub fn with_sticky_headers(mut self, sticky_headers: bool) -> Self {
        self.sticky_headers = sticky_headers;
        self
    }
}

#[derive(Clone, Debug)]
struct Slot<K> {
    key: ViewKey<K>,
    view_type: ViewType,
    parent_key: Option<K>,
    /// Innermost enclosing section.
    section: Option<usize>,
    estimated: bool,
    measurable: bool,
}

#[derive(Clone, Debug)]
struct SectionSpan<K> {
    key: K,
    parent_key: Option<K>,
    start: usize,
    end: usize,
    header: Option<usize>,
}

#[derive(Default)]
struct Slots<K> {
    slots: Vec<Slot<K>>,
    heights: Vec<f64>,
    sections: Vec<SectionSpan<K>>,
}

/// A single-column list.
///
/// Top-level rows and the children of sections are laid out top to bottom; other children are
/// not (use a [`crate::TreeCollection`] to lay out a tree). Row offsets are prefix sums, so a
/// measurement only moves the rows after it.
#[derive(Clone, Debug)]
pub struct ListLayout<K> {
    options: ListLayoutOptions,
    slots: Vec<Slot<K>>,
    heights: Fenwick,
    slot_index: KeyMap<ViewKey<K>, usize>,
    sections: Vec<SectionSpan<K>>,
    section_index: KeyMap<K, usize>,
    measured: KeyMap<K, f64>,
    width: Option<f64>,
    viewport_height: f64,
}

impl<K: NodeKey> Default for ListLayout<K> {
    fn default() -> Self {
        Self::new(ListLayoutOptions::default())
    }
}

impl<K: NodeKey> ListLayout<K> {
    pub fn new(options: ListLayoutOptions) -> Self {
        Self {
            options,
            slots: Vec::new(),
            heights: Fenwick::default(),
            slot_index: KeyMap::default(),
            sections: Vec::new(),
            section_index: KeyMap::default(),
            measured: KeyMap::default(),
            width: None,
            viewport_height: 0.0,
        }
    }

    pub fn options(&self) -> &ListLayoutOptions {
        &self.options
    }

    /// Replaces the options. Takes effect on the next validation.
    pub fn set_options(&mut self, options: ListLayoutOptions) {
        self.options = options;
    }

    pub fn measured_height(&self, key: &K) -> Option<f64> {
        self.measured.get(key).copied()
    }

    /// Measured heights by key, for persisting across sessions.
    pub fn export_measurements(&self) -> Vec<(K, f64)> {
        self.measured
            .iter()
            .map(|(key, height)| (key.clone(), *height))
            .collect()
    }

    /// Seeds the measurement cache. Takes effect on the next validation.
    pub fn import_measurements(&mut self, measurements: impl IntoIterator<Item = (K, f64)>) {
        self.measured.extend(measurements);
    }

    pub fn clear_measurements(&mut self) {
        self.measured.clear();
    }

    fn width(&self) -> f64 {
        self.width.unwrap_or(0.0)
    }

    fn height_of(&self, node: &Node<K, impl Sized>) -> (f64, bool, bool) {
        let (fixed, estimate) = match node.node_type {
            NodeType::Header => (
                self.options.heading_height,
                self.options.estimated_heading_height,
            ),
            NodeType::Loader => (Some(self.options.loader_height), 0.0),
            _ => (self.options.row_height, self.options.estimated_row_height),
        };
        match fixed {
            Some(height) => (height, false, false),
            None => match self.measured.get(&node.key) {
                Some(&height) => (height, false, true),
                None => (estimate, true, true),
            },
        }
    }

    fn push_node<C>(
        &self,
        collection: &C,
        node: &Node<K, C::Value>,
        section: Option<usize>,
        out: &mut Slots<K>,
    ) where
        C: Collection<Key = K>,
    {
        let parent_key = section.map(|s| out.sections[s].key.clone());
        match node.node_type {
            NodeType::Section => {
                let index = out.sections.len();
                let start = out.slots.len();
                out.sections.push(SectionSpan {
                    key: node.key.clone(),
                    parent_key,
                    start,
                    end: start,
                    header: None,
                });
                for child in collection.children(&node.key) {
                    self.push_node(collection, child, Some(index), out);
                }
                out.sections[index].end = out.slots.len();
            }
            NodeType::Item | NodeType::Header | NodeType::Loader => {
                let (height, estimated, measurable) = self.height_of(node);
                let slot = out.slots.len();
                if node.node_type == NodeType::Header {
                    if let Some(s) = section {
                        out.sections[s].header.get_or_insert(slot);
                    }
                }
                out.slots.push(Slot {
                    key: ViewKey::Node(node.key.clone()),
                    view_type: node.node_type.into(),
                    parent_key,
                    section,
                    estimated,
                    measurable,
                });
                out.heights.push(height);
            }
            NodeType::Content => {}
        }
    }

    fn push_synthesized(&self, is_empty: bool, out: &mut Slots<K>) {
        let fill = (self.viewport_height - 2.0 * self.options.padding).max(0.0);
        let synthesized = if self.options.is_loading {
            let height = if is_empty {
                fill.max(self.options.loader_height)
            } else {
                self.options.loader_height
            };
            Some((ViewKey::Loader, ViewType::Loader, height))
        } else if is_empty && self.options.has_empty_state {
            let height = self.options.placeholder_height.unwrap_or(fill);
            Some((ViewKey::Placeholder, ViewType::Placeholder, height))
        } else {
            None
        };
        if let Some((key, view_type, height)) = synthesized {
            out.slots.push(Slot {
                key,
                view_type,
                parent_key: None,
                section: None,
                estimated: false,
                measurable: false,
            });
            out.heights.push(height);
        }
    }

    fn rebuild<C: Collection<Key = K>>(&mut self, collection: &C) {
        let mut out = Slots {
            slots: Vec::with_capacity(collection.len()),
            heights: Vec::with_capacity(collection.len()),
            sections: Vec::new(),
        };
        for node in collection.iter() {
            self.push_node(collection, node, None, &mut out);
        }
        self.push_synthesized(collection.is_empty(), &mut out);

        self.slot_index.clear();
        for (i, slot) in out.slots.iter().enumerate() {
            self.slot_index.insert(slot.key.clone(), i);
        }
        self.section_index.clear();
        for (i, section) in out.sections.iter().enumerate() {
            self.section_index.insert(section.key.clone(), i);
        }
        self.heights = Fenwick::from_sizes(&out.heights);
        self.slots = out.slots;
        self.sections = out.sections;

        vdebug!(
            slots = self.slots.len(),
            sections = self.sections.len(),
            height = self.heights.total(),
            "ListLayout::rebuild"
        );
    }

    fn slot_rect(&self, index: usize) -> Rect {
        Rect::new(
            0.0,
            self.options.padding + self.heights.prefix_sum(index),
            self.width(),
            self.heights.get(index),
        )
    }

    fn slot_info(&self, index: usize) -> LayoutInfo<K> {
        let slot = &self.slots[index];
        LayoutInfo::new(slot.key.clone(), slot.view_type, self.slot_rect(index))
            .with_parent_key(slot.parent_key.clone())
            .with_estimated(slot.estimated)
    }

    fn section_rect(&self, section: &SectionSpan<K>) -> Rect {
        let y = self.heights.prefix_sum(section.start);
        let max_y = self.heights.prefix_sum(section.end);
        Rect::new(0.0, self.options.padding + y, self.width(), max_y - y)
    }

    fn section_info(&self, section: &SectionSpan<K>) -> LayoutInfo<K> {
        LayoutInfo::new(
            ViewKey::Node(section.key.clone()),
            ViewType::Section,
            self.section_rect(section),
        )
        .with_parent_key(section.parent_key.clone())
    }

    /// The header of `section`, pinned inside `rect` but never outside its section.
    fn sticky_header_info(&self, section: &SectionSpan<K>, rect: Rect) -> Option<LayoutInfo<K>> {
        let header = section.header?;
        let mut info = self.slot_info(header);
        let section_max_y = self.section_rect(section).max_y();
        let pinned = rect.y.min(section_max_y - info.rect.height);
        info.rect.y = info.rect.y.max(pinned);
        info.is_sticky = true;
        info.z_index = 1;
        Some(info)
    }

    fn is_pinned_header(&self, index: usize) -> bool {
        self.options.sticky_headers
            && self.slots[index]
                .section
                .is_some_and(|s| self.sections[s].header == Some(index))
    }
}

impl<C: Collection> Layout<C> for ListLayout<C::Key> {
    fn validate(&mut self, ctx: &LayoutContext<'_, C>) {
        let inv = ctx.invalidation;
        if !inv.any() {
            return;
        }
        let width = ctx.viewport.width;
        if self.width.is_some_and(|w| w != width) && !self.measured.is_empty() {
            vdebug!(width, "ListLayout: width changed, dropping measurements");
            self.measured.clear();
        }
        self.width = Some(width);
        self.viewport_height = ctx.viewport.height;
        self.rebuild(ctx.collection);
    }

    fn for_each_visible_layout_info(&self, rect: Rect, f: &mut dyn FnMut(LayoutInfo<C::Key>)) {
        for section in &self.sections {
            let section_rect = self.section_rect(section);
            if !section_rect.intersects_y(&rect) {
                continue;
            }
            f(self.section_info(section));
            if self.options.sticky_headers {
                if let Some(info) = self.sticky_header_info(section, rect) {
                    f(info);
                }
            }
        }

        let start = self.heights.lower_bound(rect.y - self.options.padding);
        for i in start..self.slots.len() {
            let slot_rect = self.slot_rect(i);
            if slot_rect.y >= rect.max_y() {
                break;
            }
            if slot_rect.intersects_y(&rect) && !self.is_pinned_header(i) {
                f(self.slot_info(i));
            }
        }
    }

    fn layout_info(&self, key: &ViewKey<C::Key>) -> Option<LayoutInfo<C::Key>> {
        if let Some(&i) = self.slot_index.get(key) {
            return Some(self.slot_info(i));
        }
        let section = self.section_index.get(key.node_key()?)?;
        Some(self.section_info(&self.sections[*section]))
    }

    fn content_size(&self) -> Size {
        let height = self.heights.total() + 2.0 * self.options.padding;
        Size::new(self.width().max(0.0), height.max(0.0))
    }

    fn update_item_size(&mut self, key: &ViewKey<C::Key>, size: Size) -> bool {
        let Some(&index) = self.slot_index.get(key) else {
            return false;
        };
        let (Some(node_key), true) = (key.node_key(), self.slots[index].measurable) else {
            return false;
        };
        self.measured.insert(node_key.clone(), size.height);
        self.slots[index].estimated = false;
        let delta = self.heights.set(index, size.height);
        vtrace!(key = ?node_key, height = size.height, delta, "ListLayout::update_item_size");
        delta != 0.0
    }

    fn set_loading(&mut self, is_loading: bool) -> bool {
        if self.options.is_loading == is_loading {
            return false;
        }
        self.options.is_loading = is_loading;
        true
    }
}
