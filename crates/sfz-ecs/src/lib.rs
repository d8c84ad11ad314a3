//! sfz ECS: a fixed-capacity entity/component store in one flat byte block.
//!
//! A [`GameState`](state::GameState) packs a header, singletons, a component
//! registry, a free-entity-id stack, per-entity component masks, per-entity
//! generation counters and one fixed-stride array per sized component type
//! into a single buffer. Regions are addressed only through byte offsets
//! stored in the header, so a block can be duplicated with a plain memory
//! copy, written to disk or sent over a wire, and reopened with
//! [`GameState::from_bytes`](state::GameState::from_bytes).
//!
//! Entity handles are generational: deleting an entity bumps the generation
//! stored for its id, which turns every outstanding handle to it stale.
//!
//! # Quick Start
//!
//! ```
//! use sfz_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
//! #[repr(C)]
//! struct Position { x: f32, y: f32 }
//!
//! const POSITION: ComponentType = 1;
//! const FROZEN: ComponentType = 2;
//!
//! let layout = GameStateLayout::new(16)
//!     .with_component(std::mem::size_of::<Position>() as u32)
//!     .with_component(0);
//! let mut state = GameState::new(&layout).unwrap();
//!
//! let e = state.create_entity().unwrap();
//! state.add_component(e, POSITION, &Position { x: 1.0, y: 2.0 }).unwrap();
//! state.set_component_unsized(e, FROZEN, true).unwrap();
//!
//! let copy = state.clone_entity(e).unwrap();
//! assert_eq!(state.component::<Position>(copy, POSITION).unwrap().x, 1.0);
//!
//! assert!(state.delete_entity(e));
//! assert!(!state.check_entity_valid(e));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod layout;
pub mod query;
pub mod snapshot;
pub mod state;

use component::ComponentType;
use entity::Entity;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by game state operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The destination buffer cannot hold the requested layout.
    #[error("buffer too small for game state: {required} bytes required, {provided} provided")]
    BufferTooSmall {
        required: usize,
        provided: usize,
    },

    /// The buffer does not start on the required boundary.
    #[error("game state buffer must be aligned to {align} bytes")]
    Misaligned {
        align: usize,
    },

    /// More user component types than mask bits.
    #[error("{requested} component types requested, at most {max} supported")]
    TooManyComponents {
        requested: usize,
        max: usize,
    },

    /// The layout does not fit in 32-bit offsets.
    #[error("game state layout exceeds the 4 GiB offset range")]
    LayoutOverflow,

    /// The buffer does not start with the game state magic number.
    #[error("buffer is not a game state (bad magic number)")]
    BadMagic,

    /// The header was written by an incompatible layout version.
    #[error("unsupported game state version {found}, expected {expected}")]
    UnsupportedVersion {
        found: u32,
        expected: u32,
    },

    /// The size recorded in the header disagrees with the buffer.
    #[error("header records {header} bytes but the buffer holds {buffer}")]
    SizeMismatch {
        header: u64,
        buffer: usize,
    },

    /// Header offsets or array headers contradict the layout the header's
    /// own counts describe.
    #[error("game state header is corrupt: {details}")]
    CorruptLayout {
        details: String,
    },

    /// The entity handle is stale, out of range or inactive.
    #[error("entity {entity:?} does not exist (stale or never created)")]
    StaleEntity {
        entity: Entity,
    },

    /// A component type outside the user range of this game state.
    #[error("component type {component} unknown, game state has {num_component_types} types")]
    UnknownComponent {
        component: ComponentType,
        num_component_types: u32,
    },

    /// Component data does not have the registered size.
    #[error("component type {component} is {expected} bytes, got {provided}")]
    ComponentSizeMismatch {
        component: ComponentType,
        expected: u32,
        provided: usize,
    },

    /// A flag-only operation was used on a component type that has data.
    #[error("component type {component} carries data and cannot be set as a flag")]
    ComponentIsSized {
        component: ComponentType,
    },

    /// The entity does not have the component.
    #[error("entity {entity:?} has no component of type {component}")]
    MissingComponent {
        entity: Entity,
        component: ComponentType,
    },

    /// Singleton index outside the registry.
    #[error("singleton {index} unknown, game state has {num_singletons} singletons")]
    UnknownSingleton {
        index: u32,
        num_singletons: u32,
    },

    /// Typed access with a type whose size or alignment does not match.
    #[error("requested type does not match the stored size or alignment")]
    TypeMismatch,

    /// A layout description could not be parsed or is unusable.
    #[error("invalid game state layout: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{
        ComponentMask, ComponentType, ACTIVE_COMPONENT, MAX_NUM_USER_COMPONENTS,
    };
    pub use crate::entity::Entity;
    pub use crate::layout::{
        calc_game_state_size, ArrayHeader, GameStateHeader, GameStateLayout, RegistryEntry,
    };
    pub use crate::query::EntitiesMatching;
    pub use crate::snapshot::GameStateSummary;
    pub use crate::state::{create_game_state, AlignedBuffer, GameState};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
    #[repr(C)]
    struct Transform {
        pos: [f32; 3],
        scale: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
    #[repr(C)]
    struct Health(u32);

    #[derive(Debug, Clone, Copy, PartialEq, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
    #[repr(C)]
    struct FrameInfo {
        tick: u64,
        dt: f32,
        pad: u32,
    }

    const TRANSFORM: ComponentType = 1;
    const HEALTH: ComponentType = 2;
    const ENEMY: ComponentType = 3;

    fn game_layout() -> GameStateLayout {
        GameStateLayout::new(64)
            .with_singleton(std::mem::size_of::<FrameInfo>() as u32)
            .with_component(std::mem::size_of::<Transform>() as u32)
            .with_component(std::mem::size_of::<Health>() as u32)
            .with_component(0)
    }

    #[test]
    fn spawn_query_and_delete() {
        let mut state = GameState::new(&game_layout()).unwrap();

        let mut enemies = Vec::new();
        for i in 0..10u32 {
            let e = state.create_entity().unwrap();
            state
                .add_component(e, TRANSFORM, &Transform { pos: [i as f32, 0.0, 0.0], scale: 1.0 })
                .unwrap();
            if i % 2 == 0 {
                state.add_component(e, HEALTH, &Health(100)).unwrap();
                state.set_component_unsized(e, ENEMY, true).unwrap();
                enemies.push(e);
            }
        }

        let query = ComponentMask::from_types(&[HEALTH, ENEMY]);
        let found: Vec<Entity> = state.entities_matching(query).collect();
        assert_eq!(found, enemies);

        for e in &enemies {
            state.component_mut::<Health>(*e, HEALTH).unwrap().0 -= 40;
        }
        assert!(state
            .entities_matching(query)
            .all(|e| state.component::<Health>(e, HEALTH).unwrap().0 == 60));

        assert!(state.delete_entity(enemies[0]));
        assert_eq!(state.entities_matching(query).count(), 4);
        assert_eq!(state.current_num_entities(), 9);
    }

    #[test]
    fn singleton_round_trip() {
        let mut state = GameState::new(&game_layout()).unwrap();
        *state.singleton_mut::<FrameInfo>(0).unwrap() = FrameInfo { tick: 7, dt: 0.016, pad: 0 };
        assert_eq!(state.singleton::<FrameInfo>(0).unwrap().tick, 7);
        assert!(matches!(
            state.singleton::<FrameInfo>(1),
            Err(EcsError::UnknownSingleton { index: 1, num_singletons: 1 })
        ));
        assert_eq!(state.singleton::<u32>(0), Err(EcsError::TypeMismatch));
    }

    #[test]
    fn raw_copy_is_a_working_snapshot() {
        let mut state = GameState::new(&game_layout()).unwrap();
        let e = state.create_entity().unwrap();
        state.add_component(e, HEALTH, &Health(5)).unwrap();

        let bytes = AlignedBuffer::from_bytes(state.as_bytes());
        let mut restored = GameState::from_bytes(bytes).unwrap();
        assert_eq!(restored.content_hash(), state.content_hash());
        assert_eq!(restored.component::<Health>(e, HEALTH).unwrap(), &Health(5));

        // The two blocks are independent.
        restored.component_mut::<Health>(e, HEALTH).unwrap().0 = 6;
        assert_eq!(state.component::<Health>(e, HEALTH).unwrap(), &Health(5));
        assert_ne!(restored.content_hash(), state.content_hash());
    }
}
