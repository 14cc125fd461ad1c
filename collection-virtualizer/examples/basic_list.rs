// Example: a flat list, scrolling and scroll-to-key.
use std::sync::Arc;

use collection_virtualizer::{
    Align, CollectionBuilder, ListLayout, ListLayoutOptions, Node, Rect, Size, Virtualizer,
    VirtualizerOptions,
};

fn main() {
    let mut b = CollectionBuilder::new();
    for i in 0..10_000u32 {
        b.push_item(i, format!("row {i}")).expect("unique keys");
    }
    let collection = Arc::new(b.build());

    let mut v = Virtualizer::new(
        ListLayout::new(ListLayoutOptions::new().with_estimated_row_height(24.0)),
        collection,
        VirtualizerOptions::new(|_, node: Option<&Node<u32, String>>| {
            node.map(|n| n.value.clone()).unwrap_or_default()
        })
        .with_overscan(48.0)
        .with_initial_rect(Some(Rect::new(0.0, 0.0, 320.0, 240.0))),
    );
    println!(
        "content={:?} live={}",
        v.content_size(),
        v.live_view_count()
    );

    v.on_visible_rect_change(Rect::new(0.0, 12_000.0, 320.0, 240.0));
    let first = v.visible_views().first().and_then(|view| view.content().cloned());
    println!("state={:?} first={first:?}", v.state());
    v.end_scrolling();

    // Measuring a live row moves only the rows after it.
    let key = v
        .visible_views()
        .first()
        .and_then(|view| view.node().map(|n| n.key));
    if let Some(key) = key {
        let changed = v.update_item_size(&key, Size::new(320.0, 60.0));
        println!("update_item_size({key}): changed={changed}");
    }

    let rect = v.scroll_to_key(&9_999, Align::End);
    println!(
        "scroll_to_key(9999)={rect:?} created_views={}",
        v.created_view_count()
    );
}
