//! Single-entry caches keyed by input identity.
//!
//! Graphs, layouts and overlays are immutable once built, so a derived value
//! stays valid for as long as the caller keeps handing in the same `Arc`.
//! Equal-but-distinct allocations count as a new input.

use std::fmt;
use std::sync::Arc;

/// Key compared by identity rather than by value.
pub trait IdentityKey: Clone {
    fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> IdentityKey for Arc<T> {
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<K: IdentityKey> IdentityKey for Option<K> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<A: IdentityKey, B: IdentityKey> IdentityKey for (A, B) {
    fn same(&self, other: &Self) -> bool {
        self.0.same(&other.0) && self.1.same(&other.1)
    }
}

pub struct Memo<K, V> {
    entry: Option<(K, Arc<V>)>,
    hits: u64,
    misses: u64,
}

/// Memo keyed by a single shared allocation.
pub type IdentityMemo<K, V> = Memo<Arc<K>, V>;

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entry: None,
            hits: 0,
            misses: 0,
        }
    }
}

impl<K, V> fmt::Debug for Memo<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("cached", &self.entry.is_some())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

impl<K: IdentityKey, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, key: &K, compute: impl FnOnce(&K) -> V) -> Arc<V> {
        if let Some((cached_key, value)) = &self.entry
            && cached_key.same(key)
        {
            self.hits += 1;
            return Arc::clone(value);
        }

        self.misses += 1;
        let value = Arc::new(compute(key));
        self.entry = Some((key.clone(), Arc::clone(&value)));
        value
    }

    /// Cached value for `key`, without computing anything.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.entry
            .as_ref()
            .filter(|(cached_key, _)| cached_key.same(key))
            .map(|(_, value)| Arc::clone(value))
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
