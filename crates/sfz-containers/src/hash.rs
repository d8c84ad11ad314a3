//! Key hashing and alternate-key equivalence.
//!
//! Every key stored in a map is hashed with [`hash_key`], a 64-bit FNV-1a
//! hash fed through the standard [`Hash`] trait. Because `String` and `str`
//! (and every other `Borrow` pair in std) feed identical bytes to the hasher,
//! a lookup by a borrowed form lands on the same probe sequence as the owned
//! key, so no temporary owned key is ever built.

use std::borrow::Borrow;
use std::hash::{Hash, Hasher};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hasher.
#[derive(Debug, Clone, Copy)]
pub struct KeyHasher {
    state: u64,
}

impl Default for KeyHasher {
    fn default() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }
}

impl Hasher for KeyHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }
}

/// Hash a key (or any alternate form of it).
#[inline]
pub fn hash_key<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = KeyHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A lookup type that can be compared against a stored key `K`.
///
/// Implementors must hash identically (through [`hash_key`]) to the key they
/// compare equal to. The blanket impl covers every `Borrow` relationship, e.g.
/// `str` against `String` or `[u8]` against `Vec<u8>`.
pub trait Equivalent<K: ?Sized> {
    /// Whether `self` denotes the same key as `key`.
    fn equivalent(&self, key: &K) -> bool;
}

impl<Q, K> Equivalent<K> for Q
where
    Q: Eq + ?Sized,
    K: Borrow<Q> + ?Sized,
{
    #[inline]
    fn equivalent(&self, key: &K) -> bool {
        self == key.borrow()
    }
}
