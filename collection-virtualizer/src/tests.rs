use crate::*;

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_u64(&mut self, start: u64, end_exclusive: u64) -> u64 {
        debug_assert!(start < end_exclusive);
        let span = end_exclusive - start;
        start + (self.next_u64() % span)
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        self.gen_range_u64(start as u64, end_exclusive as u64) as usize
    }

    fn gen_bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

type Items = NodeCollection<u32, u32>;
type ListV = Virtualizer<Items, ListLayout<u32>, u32>;

fn items(n: u32) -> Arc<Items> {
    let mut b = CollectionBuilder::new();
    for i in 0..n {
        b.push_item(i, i).unwrap();
    }
    Arc::new(b.build())
}

fn render_value(_: ViewType, node: Option<&Node<u32, u32>>) -> u32 {
    node.map_or(u32::MAX, |n| n.value)
}

fn list_with(n: u32, options: ListLayoutOptions, rect: Rect) -> ListV {
    Virtualizer::new(
        ListLayout::new(options),
        items(n),
        VirtualizerOptions::new(render_value).with_initial_rect(Some(rect)),
    )
}

fn list(n: u32, row_height: f64, rect: Rect) -> ListV {
    list_with(
        n,
        ListLayoutOptions::new().with_row_height(Some(row_height)),
        rect,
    )
}

fn live_keys<C: Collection, L: Layout<C>, V>(v: &Virtualizer<C, L, V>) -> Vec<ViewKey<C::Key>> {
    v.visible_views()
        .iter()
        .filter_map(|view| view.key().cloned())
        .collect()
}

fn live_node_keys<C: Collection, L: Layout<C>, V>(v: &Virtualizer<C, L, V>) -> Vec<C::Key> {
    live_keys(v)
        .into_iter()
        .filter_map(|key| key.node_key().cloned())
        .collect()
}

fn query<C: Collection>(layout: &impl Layout<C>, rect: Rect) -> Vec<ViewKey<C::Key>> {
    layout
        .visible_layout_infos(rect)
        .into_iter()
        .map(|info| info.key)
        .collect()
}

fn expanded<K: NodeKey + Copy>(keys: &[K]) -> ExpandedKeys<K> {
    keys.iter().copied().collect()
}

fn row_keys<K: NodeKey, T>(tree: &FlattenedTree<K, T>) -> Vec<K> {
    tree.rows.iter().map(|row| row.key.clone()).collect()
}

/// Two sections, each a header followed by two items.
fn sections() -> NodeCollection<&'static str, ()> {
    let mut b = CollectionBuilder::new();
    for (section, header, rows) in [("A", "hA", ["a1", "a2"]), ("B", "hB", ["b1", "b2"])] {
        b.push(NodeType::Section, section, ()).unwrap();
        b.push_child(section, NodeType::Header, header, ()).unwrap();
        for row in rows {
            b.push_child(section, NodeType::Item, row, ()).unwrap();
        }
    }
    b.build()
}

/// Random tree of items; some parents get a leading content node keyed `n + parent`.
fn random_tree(rng: &mut Lcg, n: usize, with_content: bool) -> NodeCollection<usize, ()> {
    let mut b = CollectionBuilder::new();
    for i in 0..n {
        if i == 0 || rng.gen_range_usize(0, 4) == 0 {
            b.push_item(i, ()).unwrap();
        } else {
            let parent = rng.gen_range_usize(0, i);
            b.push_child(parent, NodeType::Item, i, ()).unwrap();
        }
        if with_content && rng.gen_range_usize(0, 3) == 0 {
            b.push_child(i, NodeType::Content, n + i, ()).unwrap();
        }
    }
    b.build()
}

fn descendants<C: Collection>(c: &C, key: &C::Key) -> Vec<C::Key> {
    let mut out = Vec::new();
    let mut stack: Vec<C::Key> = c.children(key).map(|n| n.key.clone()).collect();
    while let Some(k) = stack.pop() {
        stack.extend(c.children(&k).map(|n| n.key.clone()));
        out.push(k);
    }
    out
}

#[test]
fn rect_intersection_is_strict() {
    let a = Rect::new(0.0, 0.0, 100.0, 50.0);
    assert!(!a.intersects(&Rect::new(0.0, 50.0, 100.0, 50.0)));
    assert!(a.intersects(&Rect::new(0.0, 49.5, 100.0, 50.0)));
    assert!(!a.intersects(&Rect::new(100.0, 0.0, 10.0, 10.0)));
    assert_eq!(
        Rect::new(0.0, 10.0, 100.0, 50.0).inflate_y(20.0),
        Rect::new(0.0, 0.0, 100.0, 80.0)
    );
}

#[test]
fn builder_links_siblings_and_levels() {
    let mut b = CollectionBuilder::new();
    b.push_item("a", 0).unwrap();
    b.push_child("a", NodeType::Item, "a1", 1).unwrap();
    b.push_child("a", NodeType::Item, "a2", 2).unwrap();
    b.push_item("b", 3).unwrap();
    let c = b.build();

    assert_eq!(c.len(), 2);
    assert_eq!(c.node_count(), 4);
    assert_eq!(
        c.keys().copied().collect::<Vec<_>>(),
        vec!["a", "a1", "a2", "b"]
    );

    let a2 = c.item(&"a2").unwrap();
    assert_eq!(a2.level, 1);
    assert_eq!(a2.index, 1);
    assert_eq!(a2.parent_key, Some("a"));
    assert_eq!(a2.prev_key, Some("a1"));
    assert_eq!(a2.next_key, None);
    assert_eq!(c.item(&"a").unwrap().first_child_key, Some("a1"));
    assert_eq!(c.item(&"a").unwrap().next_key, Some("b"));

    assert_eq!(c.first_key(), Some(&"a"));
    assert_eq!(c.last_key(), Some(&"b"));
    assert_eq!(c.key_after(&"a2"), Some(&"b"));
    assert_eq!(c.key_before(&"a"), None);
    assert_eq!(c.at(1).map(|n| n.key), Some("b"));
    assert_eq!(
        c.children(&"a").map(|n| n.key).collect::<Vec<_>>(),
        vec!["a1", "a2"]
    );
}

#[test]
fn builder_rejects_duplicate_keys() {
    let mut b = CollectionBuilder::new();
    b.push_item("a", ()).unwrap();
    let err = b.push_child("a", NodeType::Item, "a", ()).err();
    assert_eq!(
        err,
        Some(CollectionError::DuplicateKey {
            key: "\"a\"".into()
        })
    );
    assert_eq!(b.len(), 1);
}

#[test]
fn nodes_with_missing_parent_are_kept_but_never_rows() {
    let mut b = CollectionBuilder::new();
    b.push_item("a", ()).unwrap();
    b.push_child("missing", NodeType::Item, "x", ()).unwrap();
    b.push_child("x", NodeType::Item, "x1", ()).unwrap();
    let c = b.build();

    assert!(c.item(&"x").is_some());
    assert!(!c.is_attached(&"x"));
    assert_eq!(c.item(&"x1").unwrap().level, 2);
    assert_eq!(c.key_after(&"a"), None);

    let tree = flatten(&c, &ExpandedKeys::All);
    assert_eq!(row_keys(&tree), vec!["a"]);
}

#[test]
fn flatten_sections_without_expansion() {
    let c = sections();
    let tree = flatten(&c, &ExpandedKeys::none());

    assert_eq!(row_keys(&tree), vec!["a1", "a2", "b1", "b2"]);
    assert!(tree.key_map.contains_key("hA"));
    assert!(tree.key_map.contains_key("B"));
    assert_eq!(tree.key_map["a1"].index, 0);
    assert_eq!(tree.key_map["a2"].index, 1);
    assert!(Arc::ptr_eq(&tree.rows[0], &tree.key_map["a1"]));
    assert_eq!(
        tree.position(&"b2"),
        Some(RowPosition {
            level: 2,
            pos_in_set: 2,
            set_size: 2
        })
    );
    assert_eq!(tree.position(&"hA"), None);
}

#[test]
fn flatten_shifts_index_after_leading_content() {
    let mut b = CollectionBuilder::new();
    b.push_item("p", ()).unwrap();
    b.push_child("p", NodeType::Content, "p.cell", ()).unwrap();
    b.push_child("p", NodeType::Item, "c1", ()).unwrap();
    b.push_child("p", NodeType::Item, "c2", ()).unwrap();
    let c = b.build();
    assert_eq!(c.item(&"c1").unwrap().index, 1);

    let collapsed = flatten(&c, &ExpandedKeys::none());
    assert_eq!(row_keys(&collapsed), vec!["p"]);
    // Collapsed rows still get adjusted entries.
    assert_eq!(collapsed.key_map["c2"].index, 1);

    let tree = flatten(&c, &expanded(&["p"]));
    assert_eq!(row_keys(&tree), vec!["p", "c1", "c2"]);
    assert_eq!(tree.key_map["c1"].index, 0);
    assert_eq!(tree.key_map["c2"].index, 1);
    assert!(Arc::ptr_eq(&tree.rows[2], &tree.key_map["c2"]));
    assert_eq!(
        tree.position(&"c1"),
        Some(RowPosition {
            level: 2,
            pos_in_set: 1,
            set_size: 2
        })
    );
}

#[test]
fn flatten_never_turns_loader_nodes_into_rows() {
    let mut b = CollectionBuilder::new();
    b.push_item("p", ()).unwrap();
    b.push_child("p", NodeType::Item, "c1", ()).unwrap();
    b.push_child("p", NodeType::Loader, "p.loader", ()).unwrap();
    b.push(NodeType::Loader, "loader", ()).unwrap();
    let c = b.build();

    let tree = flatten(&c, &ExpandedKeys::All);
    assert_eq!(row_keys(&tree), vec!["p", "c1"]);
    assert!(tree.key_map.contains_key("p.loader"));
    assert!(tree.key_map.contains_key("loader"));
    assert_eq!(tree.position(&"p.loader"), None);
    assert_eq!(
        tree.position(&"c1"),
        Some(RowPosition {
            level: 2,
            pos_in_set: 1,
            set_size: 1
        })
    );
    assert_eq!(
        tree.position(&"p"),
        Some(RowPosition {
            level: 1,
            pos_in_set: 1,
            set_size: 1
        })
    );

    let waterfall_items = {
        let mut layout = WaterfallLayout::new(WaterfallLayoutOptions::new());
        layout.validate(&LayoutContext {
            collection: &c,
            viewport: Size::new(500.0, 1000.0),
            invalidation: Invalidation::ALL,
        });
        query::<NodeCollection<&str, ()>>(&layout, Rect::new(0.0, 0.0, 500.0, 1000.0))
    };
    assert_eq!(waterfall_items, vec![ViewKey::Node("p")]);
}

#[test]
fn flatten_requires_expanded_and_appended_parent() {
    let mut b = CollectionBuilder::new();
    b.push_item("a", ()).unwrap();
    b.push_child("a", NodeType::Item, "b", ()).unwrap();
    b.push_child("b", NodeType::Item, "c", ()).unwrap();
    let c = b.build();

    // `b` is expanded but hidden, so `c` stays hidden too.
    let tree = flatten(&c, &expanded(&["b"]));
    assert_eq!(row_keys(&tree), vec!["a"]);
    let tree = flatten(&c, &expanded(&["a", "b"]));
    assert_eq!(row_keys(&tree), vec!["a", "b", "c"]);
}

#[test]
fn property_flatten_index_counts_row_siblings_only() {
    for seed in 1..=20u64 {
        let mut rng = Lcg::new(seed);
        let n = rng.gen_range_usize(1, 60);
        let c = random_tree(&mut rng, n, true);
        let tree = flatten(&c, &ExpandedKeys::All);

        for key in 0..n {
            let parent = c.item(&key).unwrap().parent_key;
            let rank = match parent {
                Some(p) => c
                    .children(&p)
                    .filter(|s| s.is_row())
                    .position(|s| s.key == key),
                None => c.iter().position(|s| s.key == key),
            }
            .unwrap();
            assert_eq!(tree.key_map[&key].index, rank, "seed={seed} key={key}");
        }
        // Every item is visible under `All`, content never is.
        assert_eq!(tree.rows.len(), n, "seed={seed}");
    }
}

#[test]
fn property_flatten_never_duplicates_and_respects_expansion() {
    for seed in 1..=30u64 {
        let mut rng = Lcg::new(seed);
        let n = rng.gen_range_usize(1, 80);
        let c = random_tree(&mut rng, n, seed % 2 == 0);
        let expanded: ExpandedKeys<usize> = (0..n).filter(|_| rng.gen_bool()).collect();
        let tree = flatten(&c, &expanded);

        let rows = row_keys(&tree);
        let mut seen = std::collections::HashSet::new();
        for (i, key) in rows.iter().enumerate() {
            assert!(seen.insert(*key), "seed={seed} duplicate {key}");
            if let Some(parent) = c.item(key).unwrap().parent_key {
                assert!(expanded.contains(&parent), "seed={seed} key={key}");
                let p = rows.iter().position(|k| *k == parent);
                assert!(p.is_some_and(|p| p < i), "seed={seed} key={key}");
            }
        }
    }
}

#[test]
fn property_collapse_round_trip() {
    for seed in 1..=20u64 {
        let mut rng = Lcg::new(seed);
        let n = rng.gen_range_usize(2, 60);
        let c = random_tree(&mut rng, n, false);
        let all = row_keys(&flatten(&c, &ExpandedKeys::All));

        let parents: Vec<usize> = (0..n)
            .filter(|k| c.item(k).unwrap().has_children())
            .collect();
        if parents.is_empty() {
            continue;
        }
        let key = parents[rng.gen_range_usize(0, parents.len())];
        let hidden = descendants(&c, &key);

        let mut expanded = ExpandedKeys::All;
        assert!(!expanded.toggle(&key, &c));
        let collapsed = row_keys(&flatten(&c, &expanded));
        let expected: Vec<usize> = all
            .iter()
            .copied()
            .filter(|k| !hidden.contains(k))
            .collect();
        assert_eq!(collapsed, expected, "seed={seed} key={key}");

        assert!(expanded.toggle(&key, &c));
        assert_eq!(row_keys(&flatten(&c, &expanded)), all, "seed={seed}");
    }
}

#[test]
fn tree_collection_navigates_visible_rows() {
    let mut b = CollectionBuilder::new();
    b.push_item("a", ()).unwrap();
    b.push_child("a", NodeType::Item, "a1", ()).unwrap();
    b.push_item("b", ()).unwrap();
    let c = b.build();

    let collapsed = TreeCollection::new(&c, &ExpandedKeys::none());
    assert_eq!(collapsed.len(), 2);
    assert_eq!(collapsed.key_after(&"a"), Some(&"b"));
    assert!(collapsed.item(&"a1").is_some());
    assert!(!collapsed.is_visible(&"a1"));

    let expanded = TreeCollection::new(&c, &ExpandedKeys::All);
    assert_eq!(expanded.len(), 3);
    assert_eq!(expanded.at(1).map(|n| n.key), Some("a1"));
    assert_eq!(expanded.row_index(&"b"), Some(2));
    assert_eq!(expanded.key_before(&"b"), Some(&"a1"));
    assert_eq!(expanded.last_key(), Some(&"b"));
    assert_eq!(
        expanded.children(&"a").map(|n| n.key).collect::<Vec<_>>(),
        vec!["a1"]
    );
}

#[test]
fn expansion_state_notifies_on_change() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = sections();
    let mut state = ExpansionState::new(ExpandedKeys::none()).with_on_expanded_change(Some({
        let calls = Arc::clone(&calls);
        move |_: &ExpandedKeys<&'static str>| {
            calls.fetch_add(1, Ordering::Relaxed);
        }
    }));

    assert!(state.toggle_key(&"A", &c));
    assert!(state.is_expanded(&"A"));
    state.set_expanded_keys(["A"].into_iter().collect());
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    state.set_expanded_keys(ExpandedKeys::All);
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn five_rows_scenario() {
    let mut v = list(5, 50.0, Rect::new(0.0, 0.0, 100.0, 150.0));
    // Row 3 starts exactly at the bottom edge, which the strict overlap test excludes.
    assert_eq!(live_node_keys(&v), vec![0, 1, 2]);

    v.on_visible_rect_change(Rect::new(0.0, 100.0, 100.0, 150.0));
    assert_eq!(live_node_keys(&v), vec![2, 3, 4]);
    assert_eq!(v.content_size(), Size::new(100.0, 250.0));
    assert_eq!(v.scroll_direction(), Some(ScrollDirection::Forward));

    let mut layout = ListLayout::new(ListLayoutOptions::new().with_row_height(Some(50.0)));
    let c = items(5);
    layout.validate(&LayoutContext {
        collection: &*c,
        viewport: Size::new(100.0, 150.0),
        invalidation: Invalidation::ALL,
    });
    assert_eq!(
        query::<Items>(&layout, Rect::new(0.0, 10.0, 100.0, 150.0)),
        (0..4u32).map(ViewKey::Node).collect::<Vec<_>>()
    );
}

#[test]
fn list_layout_sections_span_their_rows() {
    let c = Arc::new(sections());
    let v = Virtualizer::new(
        ListLayout::new(
            ListLayoutOptions::new()
                .with_row_height(Some(50.0))
                .with_heading_height(Some(30.0)),
        ),
        Arc::clone(&c),
        VirtualizerOptions::new(|_, _| ())
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 100.0, 500.0))),
    );

    let a = v.layout_info(&ViewKey::Node("A")).unwrap();
    assert_eq!(a.view_type, ViewType::Section);
    assert_eq!(a.rect, Rect::new(0.0, 0.0, 100.0, 130.0));
    let b1 = v.layout_info(&ViewKey::Node("b1")).unwrap();
    assert_eq!(b1.rect.y, 160.0);
    assert_eq!(b1.parent_key, Some("B"));
    assert_eq!(v.content_size().height, 260.0);

    assert_eq!(
        live_node_keys(&v),
        vec!["A", "hA", "a1", "a2", "B", "hB", "b1", "b2"]
    );
    let tree = v.render_tree();
    assert_eq!(tree.len(), 2);
    assert!(tree.iter().all(|node| node.children.len() == 3));
    let section = v.view(tree[1].id).unwrap();
    assert_eq!(section.key(), Some(&ViewKey::Node("B")));
    let header = v.view(tree[1].children[0].id).unwrap();
    assert_eq!(header.view_type(), ViewType::Header);
}

#[test]
fn sticky_headers_pin_to_the_top_of_their_section() {
    let mut b: CollectionBuilder<std::string::String, ()> = CollectionBuilder::new();
    for section in ["A", "B"] {
        b.push(NodeType::Section, section.into(), ()).unwrap();
        b.push_child(section.into(), NodeType::Header, alloc::format!("h{section}"), ())
            .unwrap();
        for i in 0..4 {
            b.push_child(section.into(), NodeType::Item, alloc::format!("{section}{i}"), ())
                .unwrap();
        }
    }
    let c = b.build();

    let mut layout = ListLayout::new(
        ListLayoutOptions::new()
            .with_row_height(Some(50.0))
            .with_heading_height(Some(30.0))
            .with_sticky_headers(true),
    );
    layout.validate(&LayoutContext {
        collection: &c,
        viewport: Size::new(100.0, 100.0),
        invalidation: Invalidation::ALL,
    });
    let header = |rect: Rect, key: &str| {
        Layout::<NodeCollection<std::string::String, ()>>::visible_layout_infos(&layout, rect)
            .into_iter()
            .find(|info| info.key == ViewKey::Node(key.into()))
    };

    let ha = header(Rect::new(0.0, 100.0, 100.0, 100.0), "hA").unwrap();
    assert!(ha.is_sticky);
    assert_eq!(ha.z_index, 1);
    assert_eq!(ha.rect.y, 100.0);

    // Section A spans 0..230; its header never leaves it.
    let ha = header(Rect::new(0.0, 215.0, 100.0, 100.0), "hA").unwrap();
    assert_eq!(ha.rect.y, 200.0);
    let hb = header(Rect::new(0.0, 215.0, 100.0, 100.0), "hB").unwrap();
    assert_eq!(hb.rect.y, 230.0);

    assert!(header(Rect::new(0.0, 300.0, 100.0, 100.0), "hA").is_none());
    let hb = header(Rect::new(0.0, 300.0, 100.0, 100.0), "hB").unwrap();
    assert_eq!(hb.rect.y, 300.0);
}

#[test]
fn loader_and_placeholder_rows() {
    let rect = Rect::new(0.0, 0.0, 100.0, 400.0);
    let mut v = list_with(
        0,
        ListLayoutOptions::new()
            .with_row_height(Some(50.0))
            .with_has_empty_state(true),
        rect,
    );
    assert_eq!(live_keys(&v), vec![ViewKey::Placeholder]);
    let placeholder = v.layout_info(&ViewKey::Placeholder).unwrap();
    assert_eq!(placeholder.rect.height, 400.0);
    assert_eq!(placeholder.view_type, ViewType::Placeholder);

    // An empty, loading list shows a full-height loader instead.
    v.set_loading(true);
    assert_eq!(live_keys(&v), vec![ViewKey::Loader]);
    assert_eq!(v.content_size().height, 400.0);

    v.set_collection(items(3));
    assert_eq!(
        live_keys(&v),
        vec![
            ViewKey::Node(0),
            ViewKey::Node(1),
            ViewKey::Node(2),
            ViewKey::Loader
        ]
    );
    let loader = v.layout_info(&ViewKey::Loader).unwrap();
    assert_eq!(loader.rect, Rect::new(0.0, 150.0, 100.0, 48.0));

    v.set_loading(false);
    assert_eq!(live_node_keys(&v), vec![0, 1, 2]);
    assert_eq!(v.live_view_count(), 3);
    assert_eq!(v.free_view_count(ViewType::Loader), 1);
    assert_eq!(v.free_view_count(ViewType::Placeholder), 1);
}

#[test]
fn update_item_size_moves_only_followers() {
    let mut v = list_with(
        5,
        ListLayoutOptions::new().with_estimated_row_height(50.0),
        Rect::new(0.0, 0.0, 100.0, 500.0),
    );
    let before = v.layout_info(&ViewKey::Node(0)).unwrap();
    assert!(before.estimated);

    assert!(v.update_item_size(&1, Size::new(100.0, 80.0)));
    assert_eq!(v.state(), VirtualizerState::Idle);
    assert_eq!(v.layout_info(&ViewKey::Node(0)).unwrap(), before);
    let one = v.layout_info(&ViewKey::Node(1)).unwrap();
    assert_eq!(one.rect.height, 80.0);
    assert!(!one.estimated);
    assert_eq!(v.layout_info(&ViewKey::Node(2)).unwrap().rect.y, 130.0);
    assert_eq!(v.content_size().height, 280.0);
    assert_eq!(v.layout().measured_height(&1), Some(80.0));

    // Same size again: nothing moves.
    assert!(!v.update_item_size(&1, Size::new(100.0, 80.0)));
    let live = v.live_view(&ViewKey::Node(2)).unwrap();
    assert_eq!(live.layout_info().unwrap().rect.y, 130.0);
}

#[test]
fn update_item_size_ignores_keys_without_a_live_view() {
    let mut v = list_with(
        10,
        ListLayoutOptions::new().with_estimated_row_height(50.0),
        Rect::new(0.0, 0.0, 100.0, 100.0),
    );
    assert!(!v.update_item_size(&7, Size::new(100.0, 10.0)));
    assert!(!v.update_item_size(&70, Size::new(100.0, 10.0)));
    assert_eq!(v.content_size().height, 500.0);

    // Fixed row heights ignore measurements.
    let mut fixed = list(10, 50.0, Rect::new(0.0, 0.0, 100.0, 100.0));
    assert!(!fixed.update_item_size(&0, Size::new(100.0, 10.0)));
}

#[test]
fn measurements_can_roundtrip_and_reset_on_width_change() {
    let rect = Rect::new(0.0, 0.0, 100.0, 500.0);
    let mut v = list_with(5, ListLayoutOptions::new().with_estimated_row_height(50.0), rect);
    v.update_item_size(&0, Size::new(100.0, 20.0));
    v.update_item_size(&3, Size::new(100.0, 70.0));
    let mut exported = v.layout().export_measurements();
    exported.sort_by_key(|(k, _)| *k);
    assert_eq!(exported, vec![(0, 20.0), (3, 70.0)]);

    let mut w = list_with(5, ListLayoutOptions::new().with_estimated_row_height(50.0), rect);
    w.update_layout(|l| l.import_measurements(exported));
    assert_eq!(w.content_size().height, v.content_size().height);

    w.on_visible_rect_change(Rect::new(0.0, 0.0, 80.0, 500.0));
    assert_eq!(w.content_size(), Size::new(80.0, 250.0));
    assert_eq!(w.layout().measured_height(&3), None);
}

#[test]
fn waterfall_places_items_in_the_shortest_column() {
    let options = WaterfallLayoutOptions::new()
        .with_item_width(100.0, f64::INFINITY)
        .with_spacing(10.0)
        .with_margin(0.0)
        .with_max_columns(3)
        .with_estimated_item_height(100.0);
    let mut v = Virtualizer::new(
        WaterfallLayout::new(options),
        items(6),
        VirtualizerOptions::new(render_value)
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 500.0, 1000.0))),
    );
    assert_eq!(v.layout().columns(), 3);
    assert_eq!(v.layout().item_width(), 160.0);
    assert_eq!(v.live_view_count(), 6);

    assert!(v.update_item_size(&0, Size::new(160.0, 50.0)));
    assert_eq!(v.layout().column_of(&3), Some(0));
    assert_eq!(v.layout_info(&ViewKey::Node(3)).unwrap().rect.y, 60.0);

    assert!(v.update_item_size(&1, Size::new(160.0, 20.0)));
    let info0 = v.layout_info(&ViewKey::Node(0)).unwrap();
    assert_eq!(info0.rect, Rect::new(0.0, 0.0, 160.0, 50.0));
    assert_eq!(v.layout().column_of(&3), Some(1));
    let info3 = v.layout_info(&ViewKey::Node(3)).unwrap();
    assert_eq!(info3.rect, Rect::new(170.0, 30.0, 160.0, 100.0));
    assert_eq!(v.layout().column_of(&4), Some(0));
    assert_eq!(v.content_size().height, 210.0);

    // Only items reaching into the rect are live.
    v.on_visible_rect_change(Rect::new(0.0, 150.0, 500.0, 30.0));
    let mut live = live_node_keys(&v);
    live.sort();
    assert_eq!(live, vec![4, 5]);
}

#[test]
fn property_view_pool_conservation() {
    for seed in 1..=10u64 {
        let mut rng = Lcg::new(seed);
        let n = rng.gen_range_usize(1, 400) as u32;
        let mut v = list(n, 50.0, Rect::new(0.0, 0.0, 100.0, 300.0));
        let mut max_live = v.live_view_count();

        for _ in 0..100 {
            let y = rng.gen_range_u64(0, n as u64 * 50 + 100) as f64;
            let height = rng.gen_range_u64(1, 600) as f64;
            let rect = Rect::new(0.0, y, 100.0, height);
            v.on_visible_rect_change(rect);

            let expected: Vec<u32> = (0..n)
                .filter(|&i| {
                    let top = i as f64 * 50.0;
                    top < rect.max_y() && top + 50.0 > rect.y
                })
                .collect();
            assert_eq!(live_node_keys(&v), expected, "seed={seed} rect={rect:?}");
            assert_eq!(v.live_view_count(), expected.len());

            max_live = max_live.max(v.live_view_count());
            assert!(v.free_view_count(ViewType::Item) <= max_live, "seed={seed}");
            assert!(v.created_view_count() <= max_live, "seed={seed}");
        }
    }
}

#[test]
fn recycling_never_crosses_view_type() {
    let mut v = list_with(
        3,
        ListLayoutOptions::new()
            .with_row_height(Some(50.0))
            .with_loader_height(50.0)
            .with_is_loading(true),
        Rect::new(0.0, 0.0, 100.0, 100.0),
    );
    v.on_visible_rect_change(Rect::new(0.0, 100.0, 100.0, 100.0));
    let loader = v.live_view(&ViewKey::Loader).unwrap().id();

    let check = |v: &ListV| {
        for view in v.visible_views() {
            assert_eq!(view.view_type(), view.layout_info().unwrap().view_type);
            if view.id() == loader {
                assert_eq!(view.key(), Some(&ViewKey::Loader));
            }
        }
    };
    check(&v);

    v.set_loading(false);
    assert_eq!(v.free_view_count(ViewType::Loader), 1);
    for y in [0.0, 50.0, 100.0, 25.0] {
        v.on_visible_rect_change(Rect::new(0.0, y, 100.0, 100.0));
        check(&v);
    }
    assert_eq!(v.view(loader).unwrap().view_type(), ViewType::Loader);
    assert!(!v.view(loader).unwrap().is_bound());

    v.set_loading(true);
    v.on_visible_rect_change(Rect::new(0.0, 100.0, 100.0, 100.0));
    assert_eq!(v.live_view(&ViewKey::Loader).unwrap().id(), loader);
}

#[test]
fn load_more_fires_once_per_threshold_crossing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut v = Virtualizer::new(
        ListLayout::new(ListLayoutOptions::new().with_row_height(Some(50.0))),
        items(20),
        VirtualizerOptions::new(render_value)
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 100.0, 100.0)))
            .with_on_load_more(Some({
                let calls = Arc::clone(&calls);
                move || {
                    calls.fetch_add(1, Ordering::Relaxed);
                }
            })),
    );
    assert_eq!(calls.load(Ordering::Relaxed), 0);

    v.on_visible_rect_change(Rect::new(0.0, 500.0, 100.0, 100.0));
    assert_eq!(calls.load(Ordering::Relaxed), 0);
    for y in [810.0, 850.0, 900.0, 820.0] {
        v.on_visible_rect_change(Rect::new(0.0, y, 100.0, 100.0));
    }
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert!(v.is_load_more_pending());

    v.set_loading(true);
    v.set_collection(items(40));
    v.on_visible_rect_change(Rect::new(0.0, 1900.0, 100.0, 100.0));
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    v.set_loading(false);
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    v.on_visible_rect_change(Rect::new(0.0, 1000.0, 100.0, 100.0));
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    v.on_visible_rect_change(Rect::new(0.0, 1850.0, 100.0, 100.0));
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn load_more_checks_scroll_moves_made_inside_a_batch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut v = Virtualizer::new(
        ListLayout::new(ListLayoutOptions::new().with_row_height(Some(50.0))),
        items(20),
        VirtualizerOptions::new(render_value)
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 100.0, 100.0)))
            .with_on_load_more(Some({
                let calls = Arc::clone(&calls);
                move || {
                    calls.fetch_add(1, Ordering::Relaxed);
                }
            })),
    );

    v.restore_scroll_state(ScrollState {
        visible_rect: Rect::new(0.0, 900.0, 100.0, 100.0),
        is_scrolling: false,
    });
    assert_eq!(v.visible_rect().y, 900.0);
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    v.set_loading(false);
    v.batch_update(|v| {
        v.on_visible_rect_change(Rect::new(0.0, 0.0, 100.0, 100.0));
        v.on_visible_rect_change(Rect::new(0.0, 850.0, 100.0, 100.0));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    });
    assert_eq!(calls.load(Ordering::Relaxed), 2);

    // Only the final rect counts.
    v.set_loading(false);
    v.batch_update(|v| {
        v.on_visible_rect_change(Rect::new(0.0, 900.0, 100.0, 100.0));
        v.on_visible_rect_change(Rect::new(0.0, 100.0, 100.0, 100.0));
    });
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn load_more_fires_when_content_does_not_fill_the_viewport() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut v = Virtualizer::new(
        ListLayout::new(ListLayoutOptions::new().with_row_height(Some(50.0))),
        items(1),
        VirtualizerOptions::new(render_value)
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 100.0, 100.0)))
            .with_on_load_more(Some({
                let calls = Arc::clone(&calls);
                move || {
                    calls.fetch_add(1, Ordering::Relaxed);
                }
            })),
    );
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    v.set_loading(true);
    v.set_collection(items(2));
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    // Loading finished and the content still fits.
    v.set_loading(false);
    assert_eq!(calls.load(Ordering::Relaxed), 2);

    v.set_loading(true);
    v.set_collection(items(10));
    v.set_loading(false);
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn render_runs_once_per_newly_bound_view() {
    let renders = Arc::new(AtomicUsize::new(0));
    let mut v = Virtualizer::new(
        ListLayout::new(ListLayoutOptions::new().with_row_height(Some(50.0))),
        items(10),
        VirtualizerOptions::new({
            let renders = Arc::clone(&renders);
            move |view_type: ViewType, node: Option<&Node<u32, u32>>| {
                renders.fetch_add(1, Ordering::Relaxed);
                render_value(view_type, node)
            }
        })
        .with_initial_rect(Some(Rect::new(0.0, 0.0, 100.0, 100.0))),
    );
    assert_eq!(renders.load(Ordering::Relaxed), 2);

    v.on_visible_rect_change(Rect::new(0.0, 10.0, 100.0, 100.0));
    assert_eq!(renders.load(Ordering::Relaxed), 3);
    v.on_visible_rect_change(Rect::new(0.0, 20.0, 100.0, 100.0));
    assert_eq!(renders.load(Ordering::Relaxed), 3);

    // Rebuilt nodes are re-rendered in place.
    let ids: Vec<ViewId> = v.visible_views().iter().map(|view| view.id()).collect();
    v.set_collection(items(10));
    assert_eq!(renders.load(Ordering::Relaxed), 6);
    let after: Vec<ViewId> = v.visible_views().iter().map(|view| view.id()).collect();
    assert_eq!(ids, after);

    let contents: Vec<u32> = v
        .visible_views()
        .iter()
        .map(|view| *view.content().unwrap())
        .collect();
    assert_eq!(contents, vec![0, 1, 2]);
}

#[test]
fn update_options_applies_overscan_and_rerenders_in_place() {
    let mut v = list(100, 50.0, Rect::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(live_node_keys(&v), vec![0, 1]);

    v.update_options(|o| o.overscan = 50.0);
    assert_eq!(live_node_keys(&v), vec![0, 1, 2]);
    assert_eq!(v.created_view_count(), 3);

    let ids: Vec<ViewId> = v.visible_views().iter().map(|view| view.id()).collect();
    v.update_options(|o| {
        *o = o.clone().with_render_view(|_, node: Option<&Node<u32, u32>>| {
            node.map_or(0, |n| n.value + 100)
        });
    });
    let after: Vec<ViewId> = v.visible_views().iter().map(|view| view.id()).collect();
    assert_eq!(ids, after);
    let contents: Vec<u32> = v
        .visible_views()
        .iter()
        .map(|view| *view.content().unwrap())
        .collect();
    assert_eq!(contents, vec![100, 101, 102]);
    assert_eq!(v.created_view_count(), 3);
}

#[test]
fn focused_and_persisted_keys_stay_live() {
    let mut v = list(100, 50.0, Rect::new(0.0, 0.0, 100.0, 100.0));
    v.set_focused_key(Some(0));
    v.set_persisted_keys([50, 1000]);

    v.on_visible_rect_change(Rect::new(0.0, 400.0, 100.0, 100.0));
    assert_eq!(live_node_keys(&v), vec![0, 8, 9, 50]);

    v.set_focused_key(None);
    v.set_persisted_keys([]);
    assert_eq!(live_node_keys(&v), vec![8, 9]);
    assert_eq!(v.free_view_count(ViewType::Item), 2);
}

#[test]
fn state_machine_transitions() {
    let mut v = list(100, 50.0, Rect::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(v.state(), VirtualizerState::Idle);

    v.on_visible_rect_change(Rect::new(0.0, 30.0, 100.0, 100.0));
    assert_eq!(v.state(), VirtualizerState::Scrolling);
    v.end_scrolling();
    assert_eq!(v.state(), VirtualizerState::Idle);
    assert_eq!(v.scroll_direction(), None);

    // Resizing does not start scrolling.
    v.on_visible_rect_change(Rect::new(0.0, 30.0, 100.0, 200.0));
    assert_eq!(v.state(), VirtualizerState::Idle);
    assert_eq!(v.live_view_count(), 5);

    v.start_scrolling();
    assert_eq!(v.state(), VirtualizerState::Scrolling);

    v.batch_update(|v| {
        v.set_collection(items(3));
        assert_eq!(v.state(), VirtualizerState::LayoutDirty);
    });
    assert_eq!(v.state(), VirtualizerState::Scrolling);
    assert_eq!(live_node_keys(&v), vec![0, 1, 2]);
}

#[test]
fn batch_update_coalesces_on_change() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut v = Virtualizer::new(
        ListLayout::new(ListLayoutOptions::new().with_row_height(Some(50.0))),
        items(100),
        VirtualizerOptions::new(render_value)
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 100.0, 100.0)))
            .with_on_change(Some({
                let calls = Arc::clone(&calls);
                move |_: ScrollState| {
                    calls.fetch_add(1, Ordering::Relaxed);
                }
            })),
    );
    calls.store(0, Ordering::Relaxed);

    v.batch_update(|v| {
        v.on_visible_rect_change(Rect::new(0.0, 100.0, 100.0, 100.0));
        v.batch_update(|v| {
            v.on_visible_rect_change(Rect::new(0.0, 200.0, 100.0, 100.0));
            v.update_layout(|l| {
                l.set_options(ListLayoutOptions::new().with_row_height(Some(25.0)))
            });
        });
    });
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert_eq!(live_node_keys(&v), (8..12).collect::<Vec<u32>>());
}

#[test]
fn scroll_to_key_aligns_and_clamps() {
    let mut v = list(20, 50.0, Rect::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(v.scroll_to_key_offset(&10, Align::Start), Some(500.0));
    assert_eq!(v.scroll_to_key_offset(&10, Align::End), Some(450.0));
    assert_eq!(v.scroll_to_key_offset(&10, Align::Center), Some(475.0));
    assert_eq!(v.scroll_to_key_offset(&10, Align::Auto), Some(450.0));
    assert_eq!(v.scroll_to_key_offset(&1, Align::Auto), Some(0.0));
    assert_eq!(v.scroll_to_key_offset(&19, Align::Start), Some(900.0));
    assert_eq!(v.scroll_to_key_offset(&99, Align::Start), None);

    let rect = v.scroll_to_key(&10, Align::Start).unwrap();
    assert_eq!(rect, Rect::new(0.0, 500.0, 100.0, 100.0));
    assert_eq!(v.visible_rect(), rect);
    assert_eq!(live_node_keys(&v), vec![10, 11]);
    assert!(!v.is_scrolling());

    assert_eq!(v.scroll_to_key_offset(&5, Align::Auto), Some(250.0));
}

#[test]
fn scroll_state_can_roundtrip() {
    let mut v = list(100, 50.0, Rect::new(0.0, 0.0, 100.0, 100.0));
    v.on_visible_rect_change(Rect::new(0.0, 700.0, 100.0, 100.0));
    let state = v.scroll_state();
    assert!(state.is_scrolling);

    v.on_visible_rect_change(Rect::new(0.0, 0.0, 100.0, 100.0));
    v.end_scrolling();
    v.restore_scroll_state(state);
    assert_eq!(v.scroll_state(), state);
    assert_eq!(live_node_keys(&v), vec![14, 15]);
}

#[test]
fn shrink_pool_destroys_free_views() {
    let mut v = list(100, 50.0, Rect::new(0.0, 0.0, 100.0, 300.0));
    assert_eq!(v.created_view_count(), 6);

    v.on_visible_rect_change(Rect::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(v.live_view_count(), 2);
    assert_eq!(v.free_view_count(ViewType::Item), 4);

    assert_eq!(v.shrink_pool(1), 3);
    assert_eq!(v.free_view_count(ViewType::Item), 1);

    v.on_visible_rect_change(Rect::new(0.0, 0.0, 100.0, 300.0));
    assert_eq!(v.live_view_count(), 6);
    assert_eq!(v.created_view_count(), 9);
}

#[test]
fn tree_collection_drives_the_virtualizer() {
    let mut b = CollectionBuilder::new();
    for i in 0..10u32 {
        b.push_item(i, i).unwrap();
        b.push_child(i, NodeType::Content, 1000 + i, i).unwrap();
        for j in 0..3 {
            b.push_child(i, NodeType::Item, 100 + i * 3 + j, j).unwrap();
        }
    }
    let c = b.build();
    let mut state = ExpansionState::new(ExpandedKeys::none());

    let mut v = Virtualizer::new(
        ListLayout::new(ListLayoutOptions::new().with_row_height(Some(50.0))),
        Arc::new(TreeCollection::new(&c, state.expanded_keys())),
        VirtualizerOptions::new(render_value)
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 100.0, 200.0))),
    );
    assert_eq!(live_node_keys(&v), vec![0, 1, 2, 3]);
    assert_eq!(v.content_size().height, 500.0);

    state.toggle_key(&0, &c);
    v.set_collection(Arc::new(TreeCollection::new(&c, state.expanded_keys())));
    assert_eq!(live_node_keys(&v), vec![0, 100, 101, 102]);
    assert_eq!(v.content_size().height, 650.0);
    let row = v.live_view(&ViewKey::Node(101)).unwrap();
    assert_eq!(row.node().unwrap().index, 1);
    assert_eq!(
        v.collection().position(&101),
        Some(RowPosition {
            level: 2,
            pos_in_set: 2,
            set_size: 3
        })
    );
}

struct FixedLayout {
    infos: Vec<LayoutInfo<u32>>,
}

impl Layout<Items> for FixedLayout {
    fn validate(&mut self, _ctx: &LayoutContext<'_, Items>) {}

    fn for_each_visible_layout_info(&self, _rect: Rect, f: &mut dyn FnMut(LayoutInfo<u32>)) {
        for info in &self.infos {
            f(info.clone());
        }
    }

    fn layout_info(&self, key: &ViewKey<u32>) -> Option<LayoutInfo<u32>> {
        self.infos.iter().find(|info| &info.key == key).cloned()
    }

    fn content_size(&self) -> Size {
        Size::new(100.0, 100.0)
    }
}

fn item_info(key: ViewKey<u32>, view_type: ViewType) -> LayoutInfo<u32> {
    LayoutInfo::new(key, view_type, Rect::new(0.0, 0.0, 100.0, 50.0))
}

#[test]
fn contract_violations_are_reported() {
    let mut v = Virtualizer::new(
        FixedLayout {
            infos: vec![item_info(ViewKey::Node(0), ViewType::Item)],
        },
        items(3),
        VirtualizerOptions::new(render_value),
    );
    assert_eq!(v.live_view_count(), 1);

    let cases = [
        (
            vec![item_info(ViewKey::Node(9), ViewType::Item)],
            "unknown",
        ),
        (
            vec![
                item_info(ViewKey::Node(1), ViewType::Item),
                item_info(ViewKey::Node(1), ViewType::Item),
            ],
            "duplicate",
        ),
        (
            vec![item_info(ViewKey::Node(1), ViewType::Header)],
            "mismatch",
        ),
        (vec![item_info(ViewKey::Loader, ViewType::Item)], "mismatch"),
    ];
    for (infos, kind) in cases {
        v.batch_update(|v| {
            v.update_layout(|l| l.infos = infos);
            let err = v.try_reconcile().unwrap_err();
            match kind {
                "unknown" => assert!(matches!(err, ContractViolation::UnknownKey { .. })),
                "duplicate" => assert!(matches!(err, ContractViolation::DuplicateKey { .. })),
                _ => assert!(matches!(err, ContractViolation::ViewTypeMismatch { .. })),
            }
            // The pool is untouched by a failed pass.
            assert_eq!(v.live_view_count(), 1);
            v.update_layout(|l| l.infos = vec![item_info(ViewKey::Node(0), ViewType::Item)]);
        });
    }
    assert_eq!(live_node_keys(&v), vec![0]);
}

#[test]
fn render_tree_nests_deep_section_chains() {
    const DEPTH: u32 = 1000;
    let mut b = CollectionBuilder::new();
    b.push(NodeType::Section, 0, 0).unwrap();
    for key in 1..DEPTH {
        b.push_child(key - 1, NodeType::Section, key, key).unwrap();
    }
    b.push_child(DEPTH - 1, NodeType::Item, DEPTH, DEPTH).unwrap();

    let infos = (0..=DEPTH)
        .map(|key| {
            let view_type = if key == DEPTH {
                ViewType::Item
            } else {
                ViewType::Section
            };
            item_info(ViewKey::Node(key), view_type).with_parent_key(key.checked_sub(1))
        })
        .collect();
    let v = Virtualizer::new(
        FixedLayout { infos },
        Arc::new(b.build()),
        VirtualizerOptions::new(render_value),
    );
    assert_eq!(v.live_view_count(), DEPTH as usize + 1);

    let tree = v.render_tree();
    assert_eq!(tree.len(), 1);
    let mut node = &tree[0];
    let mut depth = 0;
    while let Some(child) = node.children.first() {
        assert_eq!(node.children.len(), 1);
        node = child;
        depth += 1;
    }
    assert_eq!(depth, DEPTH);
    assert_eq!(v.view(node.id).unwrap().key(), Some(&ViewKey::Node(DEPTH)));
}

#[test]
#[should_panic(expected = "not in the collection")]
fn contract_violation_panics_in_event_methods() {
    let mut v = Virtualizer::new(
        FixedLayout { infos: Vec::new() },
        items(3),
        VirtualizerOptions::new(render_value),
    );
    v.update_layout(|l| l.infos = vec![item_info(ViewKey::Node(42), ViewType::Item)]);
}

#[test]
fn layout_info_emitter_checks_the_contract() {
    let c = items(2);
    let mut out = Vec::new();
    let mut push = |info: LayoutInfo<u32>, node: Option<&NodeRef<u32, u32>>| {
        out.push((info.key, node.map(|n| n.value)));
    };
    let mut emitter = LayoutInfoEmitter::new(&*c, &mut push);
    emitter.emit(item_info(ViewKey::Node(1), ViewType::Item));
    emitter.emit(item_info(ViewKey::Placeholder, ViewType::Placeholder));
    assert_eq!(emitter.len(), 2);
    assert!(emitter.finish().is_ok());
    assert_eq!(
        out,
        vec![(ViewKey::Node(1), Some(1)), (ViewKey::Placeholder, None)]
    );
}
