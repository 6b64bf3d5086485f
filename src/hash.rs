//! Hasher selection for the bin tables and the registry.
//!
//! `rustc-hash` is the default; `ahash` or `std-hash` can be picked instead.
//! Conflicting selections fall back to the std hasher.

#[cfg(all(feature = "rustc-hash", not(any(feature = "ahash", feature = "std-hash"))))]
mod selected {
    pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;
}

#[cfg(all(feature = "ahash", not(any(feature = "rustc-hash", feature = "std-hash"))))]
mod selected {
    pub type Map<K, V> = ahash::AHashMap<K, V>;
}

#[cfg(not(any(
    all(feature = "rustc-hash", not(any(feature = "ahash", feature = "std-hash"))),
    all(feature = "ahash", not(any(feature = "rustc-hash", feature = "std-hash"))),
)))]
mod selected {
    pub type Map<K, V> = std::collections::HashMap<K, V>;
}

use std::hash::Hash;

pub type FastMap<K, V> = selected::Map<K, V>;

/// Empty map with room for `capacity` entries, whatever hasher is selected.
pub fn fast_map_with_capacity<K: Eq + Hash, V>(capacity: usize) -> FastMap<K, V> {
    let mut map = FastMap::default();
    map.reserve(capacity);
    map
}
