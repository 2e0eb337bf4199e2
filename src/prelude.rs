//! Shared collection aliases.
//!
//! Every hashed table in the engine uses FxHasher; property tables and
//! ordered collections use IndexMap so iteration follows insertion order.

pub use rustc_hash::{FxHashMap, FxHashSet};

// ═══════════════════════════════════════════════════════════════════════════════
// IndexMap/IndexSet with FxHasher
// ═══════════════════════════════════════════════════════════════════════════════

pub type FxBuildHasher = core::hash::BuildHasherDefault<rustc_hash::FxHasher>;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;

pub type IndexSet<T> = indexmap::IndexSet<T, FxBuildHasher>;

/// Create an empty IndexMap
#[inline]
pub fn index_map_new<K, V>() -> IndexMap<K, V> {
    IndexMap::with_hasher(FxBuildHasher::default())
}

/// Create an IndexMap with capacity
#[inline]
pub fn index_map_with_capacity<K, V>(capacity: usize) -> IndexMap<K, V> {
    IndexMap::with_capacity_and_hasher(capacity, FxBuildHasher::default())
}

/// Create an empty IndexSet
#[inline]
pub fn index_set_new<T>() -> IndexSet<T> {
    IndexSet::with_hasher(FxBuildHasher::default())
}
