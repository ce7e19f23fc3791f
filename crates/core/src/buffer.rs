//! Generic keyed entry buffer.
//!
//! The RMW and AIT controllers each hold a bounded set of in-flight block
//! entries keyed by block address. This generalizes that shape: a
//! capacity-bounded `HashMap` whose values are reference-counted so a
//! completion [`Callback`](crate::common::Callback) can hold a clone of the
//! entry handle directly instead of re-resolving a key against a table that
//! might rehash out from under it between when the callback is created and
//! when it fires.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

/// A handle to a buffer entry, shared between the owning buffer and any
/// completion callbacks issued against it.
pub type EntryHandle<V> = Rc<RefCell<V>>;

/// A capacity-bounded map of keyed entries.
pub struct EntryBuffer<K, V> {
    entries: HashMap<K, EntryHandle<V>>,
    max_entries: usize,
}

impl<K, V> EntryBuffer<K, V>
where
    K: Eq + Hash + Copy,
{
    /// Creates an empty buffer with room for `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_entries),
            max_entries,
        }
    }

    /// Returns whether the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the buffer is at capacity.
    pub fn full(&self) -> bool {
        self.entries.len() >= self.max_entries
    }

    /// Inserts a new entry under `key`, returning a shared handle to it.
    ///
    /// Returns `None` without inserting if the buffer is full or `key` is
    /// already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<EntryHandle<V>> {
        if self.full() || self.entries.contains_key(&key) {
            return None;
        }
        let handle = Rc::new(RefCell::new(value));
        let _ = self.entries.insert(key, Rc::clone(&handle));
        Some(handle)
    }

    /// Returns a shared handle to the entry at `key`, if present.
    pub fn get(&self, key: K) -> Option<EntryHandle<V>> {
        self.entries.get(&key).map(Rc::clone)
    }

    /// Returns whether an entry exists at `key`.
    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    /// Removes and returns the entry at `key`, if present.
    pub fn remove(&mut self, key: K) -> Option<EntryHandle<V>> {
        self.entries.remove(&key)
    }

    /// Returns the key of the least-recently-used entry matching
    /// `eligible`, using `last_used` to read each candidate's timestamp.
    ///
    /// Mirrors the controllers' eviction policy: scan is linear and
    /// confined to entries `eligible` reports as idle, since a full scan of
    /// a few dozen in-flight blocks is cheap and the alternative (an LRU
    /// list threaded through every entry) buys nothing at this scale.
    pub fn least_recently_used<Eligible, LastUsed>(
        &self,
        mut eligible: Eligible,
        mut last_used: LastUsed,
    ) -> Option<K>
    where
        Eligible: FnMut(&V) -> bool,
        LastUsed: FnMut(&V) -> u64,
    {
        self.entries
            .iter()
            .filter(|(_, v)| eligible(&v.borrow()))
            .min_by_key(|(_, v)| last_used(&v.borrow()))
            .map(|(k, _)| *k)
    }

    /// Returns whether any entry satisfies `predicate`.
    pub fn any<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&V) -> bool,
    {
        self.entries.values().any(|v| predicate(&v.borrow()))
    }

    /// Iterates the keys and value handles currently held.
    pub fn iter(&self) -> impl Iterator<Item = (K, EntryHandle<V>)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, Rc::clone(v)))
    }
}
