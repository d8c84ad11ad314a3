//! Component types and presence masks.
//!
//! Component types are plain indices. Type [`ACTIVE_COMPONENT`] (0) is the
//! "entity slot is in use" flag and never carries data; user components are
//! numbered from 1 in the order their sizes are listed in a
//! [`GameStateLayout`](crate::layout::GameStateLayout).

use std::fmt;
use std::ops::{BitAnd, BitOr};

use bytemuck_derive::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Index of a component type within a game state.
pub type ComponentType = u32;

/// The reserved type whose mask bit marks an entity as active.
pub const ACTIVE_COMPONENT: ComponentType = 0;

/// Mask bits available, including the active bit.
pub const MAX_NUM_COMPONENT_TYPES: usize = 64;

/// Component types a layout may declare on top of the active bit.
pub const MAX_NUM_USER_COMPONENTS: usize = MAX_NUM_COMPONENT_TYPES - 1;

/// Per-entity set of component types, one bit per type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(transparent)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// No bits set.
    pub const EMPTY: ComponentMask = ComponentMask(0);

    /// Only the active bit set.
    pub const ACTIVE: ComponentMask = ComponentMask(1);

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Mask with only `component`'s bit set. Types past the last bit give
    /// an empty mask.
    #[inline]
    pub const fn from_type(component: ComponentType) -> Self {
        if (component as usize) < MAX_NUM_COMPONENT_TYPES {
            Self(1 << component)
        } else {
            Self::EMPTY
        }
    }

    /// The active bit; same as [`ComponentMask::ACTIVE`].
    #[inline]
    pub const fn active_mask() -> Self {
        Self::ACTIVE
    }

    /// Mask with every listed type set.
    pub fn from_types(components: &[ComponentType]) -> Self {
        components
            .iter()
            .fold(Self::EMPTY, |mask, &c| mask | Self::from_type(c))
    }

    #[inline]
    pub const fn has(self, component: ComponentType) -> bool {
        let bit = Self::from_type(component).0;
        bit != 0 && self.0 & bit == bit
    }

    #[inline]
    pub const fn is_active(self) -> bool {
        self.has(ACTIVE_COMPONENT)
    }

    /// Set or clear `component`'s bit.
    #[inline]
    pub fn set(&mut self, component: ComponentType, present: bool) {
        let bit = Self::from_type(component).0;
        if present {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// Builder form of [`set`](Self::set) with `present = true`.
    #[inline]
    pub const fn with(self, component: ComponentType) -> Self {
        Self(self.0 | Self::from_type(component).0)
    }

    /// Whether every bit of `query` is also set in `self`.
    #[inline]
    pub const fn fulfills(self, query: ComponentMask) -> bool {
        self.0 & query.0 == query.0
    }

    /// Number of set bits, the active bit included.
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate over the set component types in ascending order.
    pub fn types(self) -> impl Iterator<Item = ComponentType> {
        (0..MAX_NUM_COMPONENT_TYPES as ComponentType).filter(move |&c| self.has(c))
    }
}

impl BitOr for ComponentMask {
    type Output = ComponentMask;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for ComponentMask {
    type Output = ComponentMask;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask({:#066b})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
