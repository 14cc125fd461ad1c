use std::sync::Arc;

use collection_virtualizer::{
    CollectionBuilder, ListLayout, ListLayoutOptions, Node, NodeCollection, Rect,
    VirtualizerOptions,
};
use collection_virtualizer_adapter::Controller;

fn messages(keys: impl IntoIterator<Item = u64>) -> Arc<NodeCollection<u64, String>> {
    let mut b = CollectionBuilder::new();
    for key in keys {
        b.push_item(key, format!("message {key}"))
            .expect("unique keys");
    }
    Arc::new(b.build())
}

fn main() {
    // Preserve the visual scroll position across a prepend (a chat loading older messages).
    //
    // The adapter flow is typically:
    // 1) capture an anchor (key + offset_in_viewport) before data changes
    // 2) replace the collection
    // 3) apply the anchor so the same row stays in the same place
    //
    // `set_collection_anchored` does all three.
    let mut c = Controller::new(
        ListLayout::new(ListLayoutOptions::new().with_estimated_row_height(40.0)),
        messages(1000..1100),
        VirtualizerOptions::new(|_, node: Option<&Node<u64, String>>| {
            node.map(|n| n.value.clone()).unwrap_or_default()
        })
        .with_initial_rect(Some(Rect::new(0.0, 2010.0, 320.0, 400.0))),
    );

    let anchor = c
        .capture_first_visible_anchor()
        .expect("a row must be visible");
    println!(
        "before prepend: y={} anchor={anchor:?}",
        c.virtualizer().visible_rect().y
    );

    let offset = c.set_collection_anchored(messages((900..1000).chain(1000..1100)));
    println!(
        "after prepend: apply offset={offset:?} anchor={:?}",
        c.capture_first_visible_anchor()
    );
}
