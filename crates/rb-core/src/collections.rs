//! Shared collection abstractions used by modules and scopes.
//!
//! Backed by `dashmap::DashMap` so a module table can be read from several
//! execution contexts at once.

use dashmap::DashMap;
use std::hash::Hash;

pub struct ConcurrentMap<K, V> {
    inner: DashMap<K, V>,
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        V: Clone,
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// Replace the value under `key` with `f(previous)` while holding the entry lock.
    pub fn update<F, E>(&self, key: K, f: F) -> Result<(), E>
    where
        F: FnOnce(Option<&V>) -> Result<V, E>,
    {
        use dashmap::mapref::entry::Entry;
        match self.inner.entry(key) {
            Entry::Occupied(mut occupied) => {
                let next = f(Some(occupied.get()))?;
                occupied.insert(next);
            }
            Entry::Vacant(vacant) => {
                let next = f(None)?;
                vacant.insert(next);
            }
        }
        Ok(())
    }
}
