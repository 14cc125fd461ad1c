// Example: incremental loading with a trailing loader row.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use collection_virtualizer::{
    CollectionBuilder, ListLayout, ListLayoutOptions, Node, NodeCollection, Rect, ViewKey,
    Virtualizer, VirtualizerOptions,
};

fn page(len: u32) -> Arc<NodeCollection<u32, u32>> {
    let mut b = CollectionBuilder::new();
    for i in 0..len {
        b.push_item(i, i).expect("unique keys");
    }
    Arc::new(b.build())
}

fn main() {
    let requested = Arc::new(AtomicBool::new(false));
    let mut v = Virtualizer::new(
        ListLayout::new(
            ListLayoutOptions::new()
                .with_row_height(Some(30.0))
                .with_has_empty_state(true),
        ),
        page(20),
        VirtualizerOptions::new(|_, node: Option<&Node<u32, u32>>| node.map_or(0, |n| n.value))
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 300.0, 150.0)))
            .with_on_load_more(Some({
                let requested = Arc::clone(&requested);
                move || requested.store(true, Ordering::Relaxed)
            })),
    );

    let mut len = 20;
    let mut y = 0.0;
    while len < 100 {
        y += 90.0;
        v.on_visible_rect_change(Rect::new(0.0, y, 300.0, 150.0));
        if requested.swap(false, Ordering::Relaxed) {
            v.set_loading(true);
            println!(
                "load more at y={y}: loader visible={}",
                v.live_view(&ViewKey::Loader).is_some()
            );
            len += 20;
            v.batch_update(|v| {
                v.set_collection(page(len));
                v.set_loading(false);
            });
        }
    }
    println!("len={len} content={:?}", v.content_size());
}
