//! sfz containers: allocator-aware open-addressing hash maps.
//!
//! [`HashMap`](hash_map::HashMap) is a linear-probing map with placeholder
//! (tombstone) deletion that keeps all of its slots, keys and values in one
//! block obtained from a caller-supplied [`Allocator`](allocator::Allocator).
//! [`HashMapLocal`](hash_map_local::HashMapLocal) is its fixed-capacity
//! sibling with inline storage.
//!
//! Lookups accept any alternate key type that hashes like the stored key and
//! compares equal to it, so a `HashMap<String, _>` can be queried with a
//! plain `&str`.
//!
//! # Quick Start
//!
//! ```
//! use sfz_containers::prelude::*;
//!
//! let allocator = StandardAllocator;
//! let mut textures: HashMap<'_, String, u32> = HashMap::with_allocator(&allocator);
//! textures.put("albedo".to_owned(), 1);
//! textures.put_alt("normal", 2);
//!
//! assert_eq!(textures.get("albedo"), Some(&1));
//! assert!(textures.remove("normal"));
//! assert_eq!(textures.placeholders(), 1);
//! ```
//!
//! Maps are single-threaded; none of their operations block.

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod allocator;
pub mod hash;
#[allow(unsafe_code)]
pub mod hash_map;
pub mod hash_map_local;
mod probe;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by map operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// The map has no allocator (default-constructed or destroyed).
    #[error("hash map has no allocator set")]
    NoAllocator,

    /// The allocator could not provide the backing block.
    #[error("allocator failed to provide {bytes} bytes aligned to {align}")]
    AllocationFailed {
        bytes: usize,
        align: usize,
    },

    /// The requested capacity does not fit in the address space.
    #[error("capacity {capacity} overflows the addressable size")]
    CapacityOverflow {
        capacity: usize,
    },

    /// No empty or placeholder slot is left for a new key.
    #[error("hash map is full ({capacity} slots)")]
    Full {
        capacity: usize,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::allocator::{Allocator, CountingAllocator, DbgInfo, StandardAllocator};
    pub use crate::hash::{hash_key, Equivalent};
    pub use crate::hash_map::HashMap;
    pub use crate::hash_map_local::HashMapLocal;
    pub use crate::sfz_dbg;
    pub use crate::MapError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
