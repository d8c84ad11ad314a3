//! Entity handles.
//!
//! An [`Entity`] pairs an *id* (an index into every per-entity array of a
//! game state) with an 8-bit *generation*. The generation stored in the game
//! state is bumped each time an id is freed, so a handle kept across a delete
//! no longer matches and is detected as stale.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A generational entity handle.
///
/// Generation `0` is reserved: entity id 0 starts at generation 1 and bumps
/// skip 0, so the default handle `(0, 0)` can never be valid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Entity {
    id: u32,
    generation: u8,
}

impl Entity {
    /// Handle that never refers to a live entity. Equal to `Entity::default()`.
    pub const INVALID: Entity = Entity {
        id: 0,
        generation: 0,
    };

    /// Construct a handle from an id and generation.
    #[inline]
    pub const fn new(id: u32, generation: u8) -> Self {
        Self { id, generation }
    }

    /// Index into the per-entity arrays.
    #[inline]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Generation this handle was issued with.
    #[inline]
    pub const fn generation(self) -> u8 {
        self.generation
    }

    /// Whether this is the [`INVALID`](Self::INVALID) sentinel.
    #[inline]
    pub fn is_invalid(self) -> bool {
        self == Self::INVALID
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.id, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.generation)
    }
}

/// Next generation after `generation`, wrapping and skipping 0.
#[inline]
pub(crate) fn next_generation(generation: u8) -> u8 {
    match generation.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_invalid() {
        assert_eq!(Entity::default(), Entity::INVALID);
        assert!(Entity::default().is_invalid());
        assert!(!Entity::new(0, 1).is_invalid());
    }

    #[test]
    fn generation_wraps_past_zero() {
        assert_eq!(next_generation(0), 1);
        assert_eq!(next_generation(7), 8);
        assert_eq!(next_generation(254), 255);
        assert_eq!(next_generation(255), 1);
    }

    #[test]
    fn formatting() {
        let e = Entity::new(12, 3);
        assert_eq!(format!("{e:?}"), "Entity(12v3)");
        assert_eq!(format!("{e}"), "12v3");
    }

    #[test]
    fn serde_round_trip() {
        let e = Entity::new(42, 9);
        let json = serde_json::to_string(&e).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
