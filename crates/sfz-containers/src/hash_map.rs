//! Growable open-addressing hash map.
//!
//! [`HashMap`] stores keys and values directly in one backing block obtained
//! from an [`Allocator`]. Collisions are resolved with linear probing and
//! removals leave placeholders (tombstones) behind, which are reclaimed the
//! next time the map rehashes.
//!
//! # Memory layout
//!
//! ```text
//! [ slot info (2 bits/slot) | pad ][ keys | pad ][ values | pad ]
//! ```
//!
//! Each region starts on a [`ALIGNMENT`]-byte boundary (or the stricter
//! alignment of `K`/`V`). The whole map is one allocation and one
//! deallocation.
//!
//! # Policy
//!
//! - Capacity is always odd and at least [`MIN_CAPACITY`].
//! - Before every insertion, if `len + placeholders >= capacity * 0.80` the
//!   map grows to `max(ceil(capacity * 1.75), DEFAULT_INITIAL_CAPACITY)`.
//! - Lookups and removals never rehash.
//!
//! # Safety
//!
//! The backing block is raw memory. A slot's key and value are initialized
//! if and only if its state is `Occupied`; every access below relies on that.

use std::alloc::Layout;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

use tracing::debug;

use crate::allocator::Allocator;
use crate::hash::{hash_key, Equivalent};
use crate::probe::{self, Probe, SlotState};
use crate::MapError;

// ---------------------------------------------------------------------------
// Policy constants
// ---------------------------------------------------------------------------

/// Smallest capacity a map ever allocates.
pub const MIN_CAPACITY: usize = 67;

/// Capacity requested when an unallocated map receives its first insertion.
/// Rounded up to [`MIN_CAPACITY`].
pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

/// Fraction of slots (live + placeholders) that triggers a rehash.
pub const MAX_LOAD_FACTOR: f32 = 0.80;

/// Capacity multiplier applied on growth.
pub const GROW_RATE: f32 = 1.75;

/// Minimum alignment of each region in the backing block.
pub const ALIGNMENT: usize = 32;

/// Whether `occupied` slots out of `capacity` is at or above the load limit.
#[inline]
fn exceeds_load(occupied: usize, capacity: usize) -> bool {
    // occupied >= capacity * 4/5
    occupied.saturating_mul(5) >= capacity.saturating_mul(4)
}

/// Capacity to grow to from `capacity`: `ceil(capacity * 7/4)`, never below
/// [`DEFAULT_INITIAL_CAPACITY`]. Not yet rounded to an odd value.
#[inline]
pub fn grown_capacity(capacity: usize) -> usize {
    capacity
        .saturating_mul(7)
        .div_ceil(4)
        .max(DEFAULT_INITIAL_CAPACITY)
}

/// Round a requested capacity to one the map actually uses: at least
/// [`MIN_CAPACITY`], and odd.
#[inline]
pub fn round_capacity(requested: usize) -> usize {
    let capacity = requested.max(MIN_CAPACITY);
    if capacity % 2 == 0 {
        capacity.saturating_add(1)
    } else {
        capacity
    }
}

// ---------------------------------------------------------------------------
// Backing block layout
// ---------------------------------------------------------------------------

fn round_up(value: usize, align: usize) -> Option<usize> {
    Some(value.checked_add(align - 1)? / align * align)
}

#[derive(Debug, Clone, Copy)]
struct BlockLayout {
    layout: Layout,
    keys_offset: usize,
    values_offset: usize,
}

impl BlockLayout {
    fn new<K, V>(capacity: usize) -> Option<Self> {
        let align = ALIGNMENT
            .max(mem::align_of::<K>())
            .max(mem::align_of::<V>());
        let info = round_up(probe::info_bytes(capacity), align)?;
        let keys = round_up(mem::size_of::<K>().checked_mul(capacity)?, align)?;
        let values = round_up(mem::size_of::<V>().checked_mul(capacity)?, align)?;
        let total = info.checked_add(keys)?.checked_add(values)?;
        Some(Self {
            layout: Layout::from_size_align(total, align).ok()?,
            keys_offset: info,
            values_offset: info + keys,
        })
    }
}

// ---------------------------------------------------------------------------
// HashMap
// ---------------------------------------------------------------------------

/// Open-addressing hash map backed by a single allocation.
///
/// The map borrows its allocator for `'a`. A map without an allocator (the
/// [`Default`] state, or after [`destroy`](Self::destroy)) can be read from
/// but panics if asked to grow.
///
/// References returned by [`put`](Self::put) and friends are invalidated by
/// the next insertion, since any insertion may rehash. The borrow checker
/// enforces this.
pub struct HashMap<'a, K, V> {
    /// Base of the backing block; dangling while `capacity == 0`.
    data: NonNull<u8>,
    layout: Layout,
    keys_offset: usize,
    values_offset: usize,
    size: usize,
    capacity: usize,
    placeholders: usize,
    allocator: Option<&'a dyn Allocator>,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K, V> HashMap<'a, K, V> {
    /// An empty map with no allocator and no storage.
    pub const fn new() -> Self {
        Self {
            data: NonNull::dangling(),
            layout: Layout::new::<()>(),
            keys_offset: 0,
            values_offset: 0,
            size: 0,
            capacity: 0,
            placeholders: 0,
            allocator: None,
            _marker: PhantomData,
        }
    }

    /// An empty map that will allocate from `allocator` on first insertion.
    pub fn with_allocator(allocator: &'a dyn Allocator) -> Self {
        let mut map = Self::new();
        map.allocator = Some(allocator);
        map
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the map holds no live entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of placeholder (tombstone) slots.
    #[inline]
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// The allocator this map draws memory from, if any.
    #[inline]
    pub fn allocator(&self) -> Option<&'a dyn Allocator> {
        self.allocator
    }

    /// Exchange the full state (storage and allocator) of two maps.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    // -- raw slot access ----------------------------------------------------

    #[inline]
    fn info(&self) -> &[u8] {
        // SAFETY: the first info_bytes(capacity) bytes of the block are the
        // slot-info region. With capacity 0 this is an empty slice over a
        // dangling, non-null pointer.
        unsafe { slice::from_raw_parts(self.data.as_ptr(), probe::info_bytes(self.capacity)) }
    }

    #[inline]
    fn info_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `info`.
        unsafe {
            slice::from_raw_parts_mut(self.data.as_ptr(), probe::info_bytes(self.capacity))
        }
    }

    #[inline]
    fn slot_state(&self, index: usize) -> SlotState {
        probe::read_slot(self.info(), index)
    }

    #[inline]
    fn set_slot_state(&mut self, index: usize, state: SlotState) {
        probe::write_slot(self.info_mut(), index, state);
    }

    #[inline]
    fn key_ptr(&self, index: usize) -> *mut K {
        debug_assert!(index < self.capacity);
        // SAFETY: index < capacity, so the offset stays inside the key region.
        unsafe {
            self.data
                .as_ptr()
                .add(self.keys_offset)
                .cast::<K>()
                .add(index)
        }
    }

    #[inline]
    fn value_ptr(&self, index: usize) -> *mut V {
        debug_assert!(index < self.capacity);
        // SAFETY: index < capacity, so the offset stays inside the value region.
        unsafe {
            self.data
                .as_ptr()
                .add(self.values_offset)
                .cast::<V>()
                .add(index)
        }
    }

    /// Drop every live entry and mark all slots empty. Keeps the storage.
    pub fn clear(&mut self) {
        if self.capacity == 0 {
            return;
        }
        for index in 0..self.capacity {
            if self.slot_state(index) == SlotState::Occupied {
                // SAFETY: occupied slots hold initialized keys and values.
                unsafe {
                    ptr::drop_in_place(self.key_ptr(index));
                    ptr::drop_in_place(self.value_ptr(index));
                }
            }
        }
        self.info_mut().fill(0);
        self.size = 0;
        self.placeholders = 0;
    }

    /// Drop every live entry, return the backing block to the allocator and
    /// forget the allocator. The map is left in its [`Default`] state.
    pub fn destroy(&mut self) {
        self.clear();
        self.release_storage();
        self.allocator = None;
    }

    /// Hand the backing block back without touching slot contents.
    fn release_storage(&mut self) {
        if self.capacity > 0 {
            if let Some(allocator) = self.allocator {
                // SAFETY: data/layout came from this allocator in
                // `allocate_storage` and have not been freed since.
                unsafe { allocator.deallocate(self.data, self.layout) };
            }
        }
        self.data = NonNull::dangling();
        self.layout = Layout::new::<()>();
        self.keys_offset = 0;
        self.values_offset = 0;
        self.size = 0;
        self.capacity = 0;
        self.placeholders = 0;
    }

    /// Allocate a zeroed-info block for exactly `capacity` slots. The map
    /// must currently hold no storage.
    fn allocate_storage(&mut self, capacity: usize) -> Result<(), MapError> {
        debug_assert_eq!(self.capacity, 0);
        let allocator = self.allocator.ok_or(MapError::NoAllocator)?;
        let block = BlockLayout::new::<K, V>(capacity)
            .ok_or(MapError::CapacityOverflow { capacity })?;
        let data = allocator
            .allocate(crate::sfz_dbg!("HashMap"), block.layout)
            .ok_or(MapError::AllocationFailed {
                bytes: block.layout.size(),
                align: block.layout.align(),
            })?;

        self.data = data;
        self.layout = block.layout;
        self.keys_offset = block.keys_offset;
        self.values_offset = block.values_offset;
        self.capacity = capacity;
        self.size = 0;
        self.placeholders = 0;
        self.info_mut().fill(0);
        Ok(())
    }

    /// Write a key/value pair into a free slot and mark it occupied.
    fn write_entry(&mut self, index: usize, key: K, value: V) -> &mut V {
        debug_assert_ne!(self.slot_state(index), SlotState::Occupied);
        if self.slot_state(index) == SlotState::Placeholder {
            self.placeholders -= 1;
        }
        // SAFETY: the slot is free, so nothing initialized is overwritten.
        unsafe {
            ptr::write(self.key_ptr(index), key);
            ptr::write(self.value_ptr(index), value);
        }
        self.set_slot_state(index, SlotState::Occupied);
        self.size += 1;
        // SAFETY: just initialized.
        unsafe { &mut *self.value_ptr(index) }
    }

    /// Replace the value in an occupied slot, dropping the old one.
    fn overwrite_value(&mut self, index: usize, value: V) -> &mut V {
        debug_assert_eq!(self.slot_state(index), SlotState::Occupied);
        // SAFETY: occupied slot, value is initialized; assignment drops it.
        let slot = unsafe { &mut *self.value_ptr(index) };
        *slot = value;
        slot
    }

    /// Iterate over `(&K, &V)` in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            data: self.data,
            keys_offset: self.keys_offset,
            values_offset: self.values_offset,
            capacity: self.capacity,
            index: 0,
            remaining: self.size,
            _marker: PhantomData,
        }
    }

    /// Iterate over `(&K, &mut V)` in slot order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            data: self.data,
            keys_offset: self.keys_offset,
            values_offset: self.values_offset,
            capacity: self.capacity,
            index: 0,
            remaining: self.size,
            _marker: PhantomData,
        }
    }

    /// Iterate over keys in slot order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterate over values in slot order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Iterate mutably over values in slot order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }
}

impl<'a, K: Hash + Eq, V> HashMap<'a, K, V> {
    /// An allocated map with room for at least `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if the allocator fails.
    pub fn with_capacity(capacity: usize, allocator: &'a dyn Allocator) -> Self {
        let mut map = Self::with_allocator(allocator);
        map.rehash(capacity);
        map
    }

    /// Destroy any current contents, adopt `allocator`, and allocate at least
    /// `capacity` slots (nothing is allocated if `capacity` is 0).
    pub fn init(&mut self, capacity: usize, allocator: &'a dyn Allocator) {
        self.destroy();
        self.allocator = Some(allocator);
        self.rehash(capacity);
    }

    fn find<Q>(&self, key: &Q) -> Probe
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        if self.capacity == 0 {
            return Probe::Full;
        }
        let info = self.info();
        probe::probe(
            hash_key(key),
            self.capacity,
            |index| probe::read_slot(info, index),
            // SAFETY: only called on occupied slots.
            |index| key.equivalent(unsafe { &*self.key_ptr(index) }),
        )
    }

    /// Look up a value by key or by any equivalent alternate key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        match self.find(key) {
            // SAFETY: found slots are occupied.
            Probe::Found(index) => Some(unsafe { &*self.value_ptr(index) }),
            _ => None,
        }
    }

    /// Mutable lookup.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        match self.find(key) {
            // SAFETY: found slots are occupied; `&mut self` guarantees
            // exclusivity.
            Probe::Found(index) => Some(unsafe { &mut *self.value_ptr(index) }),
            _ => None,
        }
    }

    /// Look up the stored key and value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        match self.find(key) {
            // SAFETY: found slots are occupied.
            Probe::Found(index) => unsafe {
                Some((&*self.key_ptr(index), &*self.value_ptr(index)))
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

    /// Insert or overwrite, returning a reference to the stored value.
    ///
    /// # Panics
    ///
    /// Panics if the map needs to grow and has no allocator, or if the
    /// allocator fails.
    pub fn put(&mut self, key: K, value: V) -> &mut V {
        match self.try_put(key, value) {
            Ok(slot) => slot,
            Err(err) => panic!("HashMap::put failed: {err}"),
        }
    }

    /// Fallible [`put`](Self::put).
    pub fn try_put(&mut self, key: K, value: V) -> Result<&mut V, MapError> {
        self.try_ensure_properly_hashed()?;
        match self.find(&key) {
            Probe::Found(index) => Ok(self.overwrite_value(index, value)),
            Probe::Vacant(index) => Ok(self.write_entry(index, key, value)),
            Probe::Full => Err(MapError::Full {
                capacity: self.capacity,
            }),
        }
    }

    /// Insert or overwrite through an alternate key. The owned key is only
    /// built when the entry does not exist yet.
    ///
    /// # Panics
    ///
    /// Same as [`put`](Self::put).
    pub fn put_alt<Q>(&mut self, key: &Q, value: V) -> &mut V
    where
        Q: Hash + Equivalent<K> + ToOwned<Owned = K> + ?Sized,
    {
        if let Err(err) = self.try_ensure_properly_hashed() {
            panic!("HashMap::put_alt failed: {err}");
        }
        match self.find(key) {
            Probe::Found(index) => self.overwrite_value(index, value),
            Probe::Vacant(index) => self.write_entry(index, key.to_owned(), value),
            Probe::Full => panic!("HashMap::put_alt found no free slot after rehash"),
        }
    }

    /// Return the value for `key`, inserting `V::default()` if absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        if let Err(err) = self.try_ensure_properly_hashed() {
            panic!("HashMap::get_or_insert_default failed: {err}");
        }
        match self.find(&key) {
            // SAFETY: found slots are occupied.
            Probe::Found(index) => unsafe { &mut *self.value_ptr(index) },
            Probe::Vacant(index) => self.write_entry(index, key, V::default()),
            Probe::Full => panic!("HashMap::get_or_insert_default found no free slot"),
        }
    }

    /// Remove `key`, leaving a placeholder. Returns whether it was present.
    /// Never rehashes.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        self.take(key).is_some()
    }

    /// Remove `key` and hand back its value.
    pub fn take<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let Probe::Found(index) = self.find(key) else {
            return None;
        };
        // SAFETY: the slot is occupied; it is marked a placeholder right
        // after, so nothing reads or drops these again.
        let value = unsafe {
            ptr::drop_in_place(self.key_ptr(index));
            ptr::read(self.value_ptr(index))
        };
        self.set_slot_state(index, SlotState::Placeholder);
        self.size -= 1;
        self.placeholders += 1;
        Some(value)
    }

    /// Grow if live entries plus placeholders have reached the load limit.
    fn try_ensure_properly_hashed(&mut self) -> Result<(), MapError> {
        if exceeds_load(self.size + self.placeholders, self.capacity) {
            self.try_rehash(grown_capacity(self.capacity))?;
        }
        Ok(())
    }

    /// Rebuild the map into a fresh block with at least `new_capacity`
    /// slots (and never fewer than it has now). Every live entry is
    /// re-probed from scratch and all placeholders are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the map has no allocator or the allocator fails.
    pub fn rehash(&mut self, new_capacity: usize) {
        if let Err(err) = self.try_rehash(new_capacity) {
            panic!("HashMap::rehash failed: {err}");
        }
    }

    /// Fallible [`rehash`](Self::rehash). On error the map is unchanged.
    pub fn try_rehash(&mut self, new_capacity: usize) -> Result<(), MapError> {
        if new_capacity == 0 {
            return Ok(());
        }
        let allocator = self.allocator.ok_or(MapError::NoAllocator)?;
        let target = round_capacity(new_capacity.max(self.capacity));

        let mut fresh: HashMap<'a, K, V> = HashMap::with_allocator(allocator);
        fresh.allocate_storage(target)?;

        for index in 0..self.capacity {
            if self.slot_state(index) != SlotState::Occupied {
                continue;
            }
            // SAFETY: occupied slot. It is marked empty immediately so the
            // moved-out pair is never dropped here.
            let (key, value) =
                unsafe { (ptr::read(self.key_ptr(index)), ptr::read(self.value_ptr(index))) };
            self.set_slot_state(index, SlotState::Empty);
            fresh.insert_unique(key, value);
        }

        debug!(
            old_capacity = self.capacity,
            new_capacity = fresh.capacity,
            size = fresh.size,
            dropped_placeholders = self.placeholders,
            "hash map rehashed"
        );

        self.release_storage();
        mem::swap(self, &mut fresh);
        Ok(())
    }

    /// Insert a key known not to be present, without load checks.
    fn insert_unique(&mut self, key: K, value: V) {
        let info = self.info();
        let result = probe::probe(
            hash_key(&key),
            self.capacity,
            |index| probe::read_slot(info, index),
            |_| false,
        );
        match result {
            Probe::Vacant(index) => {
                self.write_entry(index, key, value);
            }
            _ => unreachable!("rehash target always has free slots"),
        }
    }
}

impl<K, V> Default for HashMap<'_, K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for HashMap<'_, K, V> {
    fn drop(&mut self) {
        self.clear();
        self.release_storage();
    }
}

/// Deep copy by re-insertion. The clone shares the allocator, has the same
/// capacity and never carries placeholders over.
impl<'a, K: Hash + Eq + Clone, V: Clone> Clone for HashMap<'a, K, V> {
    fn clone(&self) -> Self {
        let Some(allocator) = self.allocator else {
            return Self::new();
        };
        let mut copy = Self::with_allocator(allocator);
        copy.rehash(self.capacity);
        for (key, value) in self.iter() {
            copy.insert_unique(key.clone(), value.clone());
        }
        copy
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashMap<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, V> Extend<(K, V)> for HashMap<'_, K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<'m, K, V> IntoIterator for &'m HashMap<'_, K, V> {
    type Item = (&'m K, &'m V);
    type IntoIter = Iter<'m, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'m, K, V> IntoIterator for &'m mut HashMap<'_, K, V> {
    type Item = (&'m K, &'m mut V);
    type IntoIter = IterMut<'m, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

// ---------------------------------------------------------------------------
// Iterators
// ---------------------------------------------------------------------------

#[inline]
fn raw_slot_state(data: NonNull<u8>, index: usize) -> SlotState {
    // SAFETY: callers only pass index < capacity of a live block.
    let byte = unsafe { *data.as_ptr().add(index / 4) };
    probe::slot_in_byte(byte, index)
}

/// Shared iterator over a [`HashMap`].
pub struct Iter<'m, K, V> {
    data: NonNull<u8>,
    keys_offset: usize,
    values_offset: usize,
    capacity: usize,
    index: usize,
    remaining: usize,
    _marker: PhantomData<(&'m K, &'m V)>,
}

impl<'m, K, V> Iterator for Iter<'m, K, V> {
    type Item = (&'m K, &'m V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.capacity {
            let index = self.index;
            self.index += 1;
            if raw_slot_state(self.data, index) == SlotState::Occupied {
                self.remaining -= 1;
                // SAFETY: occupied slot inside a block borrowed for 'm.
                unsafe {
                    let base = self.data.as_ptr();
                    let key = &*base.add(self.keys_offset).cast::<K>().add(index);
                    let value = &*base.add(self.values_offset).cast::<V>().add(index);
                    return Some((key, value));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Mutable iterator over a [`HashMap`].
pub struct IterMut<'m, K, V> {
    data: NonNull<u8>,
    keys_offset: usize,
    values_offset: usize,
    capacity: usize,
    index: usize,
    remaining: usize,
    _marker: PhantomData<(&'m K, &'m mut V)>,
}

impl<'m, K, V> Iterator for IterMut<'m, K, V> {
    type Item = (&'m K, &'m mut V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.capacity {
            let index = self.index;
            self.index += 1;
            if raw_slot_state(self.data, index) == SlotState::Occupied {
                self.remaining -= 1;
                // SAFETY: occupied slot; each index is yielded once, so the
                // mutable references never alias.
                unsafe {
                    let base = self.data.as_ptr();
                    let key = &*base.add(self.keys_offset).cast::<K>().add(index);
                    let value = &mut *base.add(self.values_offset).cast::<V>().add(index);
                    return Some((key, value));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
