//! Fixed-capacity open-addressing hash map with inline storage.
//!
//! [`HashMapLocal`] probes exactly like [`HashMap`](crate::hash_map::HashMap)
//! but never allocates and never rehashes: all `N` slots live inside the
//! struct. Removed entries become placeholders that later insertions reuse.

use std::fmt;
use std::hash::Hash;

use crate::hash::{hash_key, Equivalent};
use crate::probe::{self, Probe, SlotState};
use crate::MapError;

enum Slot<K, V> {
    Empty,
    Placeholder,
    Occupied(K, V),
}

impl<K, V> Slot<K, V> {
    #[inline]
    fn state(&self) -> SlotState {
        match self {
            Slot::Empty => SlotState::Empty,
            Slot::Placeholder => SlotState::Placeholder,
            Slot::Occupied(..) => SlotState::Occupied,
        }
    }
}

/// Open-addressing hash map with `N` inline slots.
pub struct HashMapLocal<K, V, const N: usize> {
    slots: [Slot<K, V>; N],
    size: usize,
    placeholders: usize,
}

impl<K, V, const N: usize> HashMapLocal<K, V, N> {
    /// An empty map.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::Empty),
            size: 0,
            placeholders: 0,
        }
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Always `N`.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of placeholder slots.
    #[inline]
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Drop all entries and reset every slot to empty.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        self.size = 0;
        self.placeholders = 0;
    }

    /// Iterate over `(&K, &V)` in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(k, v) => Some((k, v)),
            _ => None,
        })
    }

    /// Iterate over `(&K, &mut V)` in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> + '_ {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Occupied(k, v) => Some((&*k, v)),
            _ => None,
        })
    }
}

impl<K: Hash + Eq, V, const N: usize> HashMapLocal<K, V, N> {
    fn find<Q>(&self, key: &Q) -> Probe
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        probe::probe(
            hash_key(key),
            N,
            |index| self.slots[index].state(),
            |index| matches!(&self.slots[index], Slot::Occupied(k, _) if key.equivalent(k)),
        )
    }

    /// Look up a value by key or an equivalent alternate key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        match self.find(key) {
            Probe::Found(index) => match &self.slots[index] {
                Slot::Occupied(_, v) => Some(v),
                _ => None,
            },
            _ => None,
        }
    }

    /// Mutable lookup.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        match self.find(key) {
            Probe::Found(index) => match &mut self.slots[index] {
                Slot::Occupied(_, v) => Some(v),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        matches!(self.find(key), Probe::Found(_))
    }

    /// Insert or overwrite. Fails with [`MapError::Full`] when the key is new
    /// and no empty or placeholder slot is left.
    pub fn put(&mut self, key: K, value: V) -> Result<&mut V, MapError> {
        let index = match self.find(&key) {
            Probe::Found(index) => index,
            Probe::Vacant(index) => {
                if self.slots[index].state() == SlotState::Placeholder {
                    self.placeholders -= 1;
                }
                self.size += 1;
                index
            }
            Probe::Full => return Err(MapError::Full { capacity: N }),
        };
        self.slots[index] = Slot::Occupied(key, value);
        match &mut self.slots[index] {
            Slot::Occupied(_, v) => Ok(v),
            _ => unreachable!("slot was just filled"),
        }
    }

    /// Remove `key`, leaving a placeholder. Returns whether it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        match self.find(key) {
            Probe::Found(index) => {
                self.slots[index] = Slot::Placeholder;
                self.size -= 1;
                self.placeholders += 1;
                true
            }
            _ => false,
        }
    }
}

impl<K, V, const N: usize> Default for HashMapLocal<K, V, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-insertion clone: placeholders are not carried over.
impl<K: Hash + Eq + Clone, V: Clone, const N: usize> Clone for HashMapLocal<K, V, N> {
    fn clone(&self) -> Self {
        let mut copy = Self::new();
        for (k, v) in self.iter() {
            // Never fails: the copy has at least as many free slots.
            let _ = copy.put(k.clone(), v.clone());
        }
        copy
    }
}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize> fmt::Debug for HashMapLocal<K, V, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
