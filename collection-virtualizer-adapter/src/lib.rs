//! Adapter utilities for the `collection-virtualizer` crate.
//!
//! The `collection-virtualizer` crate is UI-agnostic and focuses on flattening, layout and view
//! recycling. This crate provides small, framework-neutral helpers commonly needed by adapters:
//!
//! - Scroll settling (ending `is_scrolling` after a quiet period)
//! - Focus-driven scrolling
//! - Scroll anchoring (e.g. prepend in chat/timelines without visual jumps)
//!
//! This crate is intentionally framework-agnostic (no ratatui/egui bindings).
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod anchor;
mod controller;


pub use anchor::{ScrollAnchor, apply_anchor, capture_first_visible_anchor};
pub use controller::Controller;
