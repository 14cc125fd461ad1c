// Example: flatten a tree, toggle expansion and render nested sections.
use std::sync::Arc;

use collection_virtualizer::{
    CollectionBuilder, ExpandedKeys, ExpansionState, ListLayout, ListLayoutOptions, Node, NodeType,
    Rect, TreeCollection, ViewKey, Virtualizer, VirtualizerOptions,
};

fn main() {
    let mut b = CollectionBuilder::new();
    for dir in 0..50u32 {
        let key = format!("dir{dir}");
        b.push_item(key.clone(), key.clone()).expect("unique keys");
        b.push_child(key.clone(), NodeType::Content, format!("{key}/cell"), key.clone())
            .expect("unique keys");
        for file in 0..5 {
            let child = format!("{key}/file{file}");
            b.push_child(key.clone(), NodeType::Item, child.clone(), child)
                .expect("unique keys");
        }
    }
    let tree = b.build();

    let mut expansion = ExpansionState::new(ExpandedKeys::none())
        .with_on_expanded_change(Some(|keys: &ExpandedKeys<String>| {
            println!("expanded changed: all={}", keys.is_all());
        }));

    let mut v = Virtualizer::new(
        ListLayout::new(ListLayoutOptions::new().with_row_height(Some(20.0))),
        Arc::new(TreeCollection::new(&tree, expansion.expanded_keys())),
        VirtualizerOptions::new(|_, node: Option<&Node<String, String>>| {
            node.map(|n| n.value.clone()).unwrap_or_default()
        })
        .with_initial_rect(Some(Rect::new(0.0, 0.0, 200.0, 100.0))),
    );
    println!("collapsed content={:?}", v.content_size());

    expansion.toggle_key(&"dir0".to_string(), &tree);
    v.set_collection(Arc::new(TreeCollection::new(&tree, expansion.expanded_keys())));
    for view in v.visible_views() {
        let key = view.key().and_then(ViewKey::node_key);
        let position = key.and_then(|k| v.collection().position(k));
        println!("{key:?} {position:?}");
    }

    expansion.set_expanded_keys(ExpandedKeys::All);
    v.set_collection(Arc::new(TreeCollection::new(&tree, expansion.expanded_keys())));
    println!("expanded content={:?}", v.content_size());
}
