//! A headless collection virtualization and layout engine.
//!
//! For adapter-level utilities (scroll settling, anchoring across rebuilds), see the
//! `collection-virtualizer-adapter` crate.
//!
//! The crate takes a large, possibly hierarchical, possibly incrementally loaded collection and
//! renders only what is visible while keeping view identity stable as the visible rect moves:
//! - [`flatten`] / [`TreeCollection`] turn a tree plus its expanded keys into visible rows.
//! - A [`Layout`] ([`ListLayout`], [`WaterfallLayout`]) maps the collection to geometry.
//! - The [`Virtualizer`] queries the layout for the visible rect and recycles pooled views by
//!   view type.
//!
//! It is UI-agnostic. A TUI/GUI layer is expected to provide:
//! - the visible rect (scroll offset and viewport size)
//! - a `render_view` callback producing opaque content for newly bound views
//! - measured sizes for views whose layout info is an estimate
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod collection;
mod emitter;
mod error;
mod fenwick;
mod flatten;
mod key;
mod layout;
mod load_more;
mod node;
mod options;
mod pool;
mod state;
mod tree;
mod types;
mod view;
mod virtualizer;

#[cfg(test)]
mod tests;

pub use collection::{Children, Collection, CollectionBuilder, NodeCollection};
pub use emitter::LayoutInfoEmitter;
pub use error::{CollectionError, ContractViolation};
pub use flatten::{
    ExpandedKeys, ExpansionState, FlattenedTree, OnExpandedChange, RowPosition, flatten,
};
pub use key::{KeyMap, KeySet, NodeKey};
pub use layout::{
    Invalidation, Layout, LayoutContext, LayoutInfo, ListLayout, ListLayoutOptions,
    WaterfallLayout, WaterfallLayoutOptions,
};
pub use node::{Node, NodeRef, NodeType};
pub use options::{OnChangeCallback, OnLoadMore, RenderView, VirtualizerOptions};
pub use state::{ScrollState, VirtualizerState};
pub use tree::TreeCollection;
pub use types::{Align, Point, Rect, ScrollDirection, Size};
pub use view::{ReusableView, ViewId, ViewKey, ViewType};
pub use virtualizer::{ViewNode, Virtualizer};
