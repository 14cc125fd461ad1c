#[cfg(not(feature = "std"))]
use alloc::collections::{BTreeMap, BTreeSet};
#[cfg(feature = "std")]
use std::collections::{HashMap, HashSet};

#[cfg(feature = "std")]
pub type KeyMap<K, V> = HashMap<K, V>;
#[cfg(not(feature = "std"))]
pub type KeyMap<K, V> = BTreeMap<K, V>;

#[cfg(feature = "std")]
pub type KeySet<K> = HashSet<K>;
#[cfg(not(feature = "std"))]
pub type KeySet<K> = BTreeSet<K>;

/// Bound for collection keys.
///
/// With `std`, keys are hashed; without it they are ordered.
#[cfg(feature = "std")]
pub trait NodeKey: core::hash::Hash + Eq + Clone + core::fmt::Debug {}
#[cfg(feature = "std")]
impl<K: core::hash::Hash + Eq + Clone + core::fmt::Debug> NodeKey for K {}

#[cfg(not(feature = "std"))]
pub trait NodeKey: Ord + Clone + core::fmt::Debug {}
#[cfg(not(feature = "std"))]
impl<K: Ord + Clone + core::fmt::Debug> NodeKey for K {}
