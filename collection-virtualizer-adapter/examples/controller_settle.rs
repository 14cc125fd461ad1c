use std::sync::Arc;

use collection_virtualizer::{
    Align, CollectionBuilder, ListLayout, ListLayoutOptions, Node, Rect, VirtualizerOptions,
};
use collection_virtualizer_adapter::Controller;

fn main() {
    // Example: drive scrolling from host events and let `tick` settle it.
    let mut b = CollectionBuilder::new();
    for i in 0..1_000u32 {
        b.push_item(i, i).expect("unique keys");
    }
    let mut c = Controller::new(
        ListLayout::new(ListLayoutOptions::new().with_row_height(Some(20.0))),
        Arc::new(b.build()),
        VirtualizerOptions::new(|_, node: Option<&Node<u32, u32>>| node.map_or(0, |n| n.value))
            .with_initial_rect(Some(Rect::new(0.0, 0.0, 200.0, 100.0))),
    )
    .with_settle_delay_ms(100);

    for (now_ms, offset) in [(0u64, 20.0), (16, 60.0), (32, 120.0)] {
        c.on_scroll(offset, now_ms);
        println!(
            "t={now_ms} state={:?} live={}",
            c.virtualizer().state(),
            c.virtualizer().live_view_count()
        );
    }
    for now_ms in [50u64, 100, 132, 200] {
        let settled = c.tick(now_ms);
        println!("tick({now_ms}) settled={settled} state={:?}", c.virtualizer().state());
    }

    let offset = c.focus_key(500);
    println!("focus_key(500): apply offset={offset:?}");
    let offset = c.scroll_to_key(&0, Align::Start);
    println!(
        "scroll_to_key(0): apply offset={offset:?} focused still live={}",
        c.virtualizer()
            .live_view(&collection_virtualizer::ViewKey::Node(500))
            .is_some()
    );
}
