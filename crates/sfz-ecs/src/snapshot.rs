//! Snapshot support.
//!
//! A game state needs no serializer: its bytes are the snapshot. This module
//! adds the helpers around that fact: raw byte access, owned copies, block
//! copies for double buffering and a BLAKE3 content hash. A serializable
//! [`GameStateSummary`] covers diagnostics.

use serde::{Deserialize, Serialize};

use crate::layout::RegistryEntry;
use crate::state::{AlignedBuffer, GameState};
use crate::EcsError;

/// Header counts and region offsets of a game state, for logs and tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateSummary {
    pub version: u32,
    pub state_size_bytes: u64,
    pub max_num_entities: u32,
    pub current_num_entities: u32,
    pub num_free_entity_ids: u32,
    pub num_component_types: u32,
    pub singletons: Vec<RegistryEntry>,
    pub components: Vec<RegistryEntry>,
    pub offset_singleton_registry: u32,
    pub offset_component_registry: u32,
    pub offset_free_entity_ids: u32,
    pub offset_entity_masks: u32,
    pub offset_entity_generations: u32,
    /// BLAKE3 hex digest of the block.
    pub content_hash: String,
}

impl GameStateSummary {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .expect("GameStateSummary should always be JSON-serializable")
    }
}

impl<B: AsRef<[u8]>> GameState<B> {
    /// The block itself, without any trailing storage.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes()[..self.state_size()]
    }

    /// BLAKE3 hex digest of [`as_bytes`](Self::as_bytes). Two states hash
    /// equal exactly when their blocks are byte-identical.
    pub fn content_hash(&self) -> String {
        blake3::hash(self.as_bytes()).to_hex().to_string()
    }

    /// Independent owned copy of this block.
    pub fn to_owned_state(&self) -> GameState<AlignedBuffer> {
        GameState::from_valid_storage(AlignedBuffer::from_bytes(self.as_bytes()))
    }

    pub fn summary(&self) -> GameStateSummary {
        let head = *self.header();
        GameStateSummary {
            version: head.version,
            state_size_bytes: head.state_size_bytes,
            max_num_entities: head.max_num_entities,
            current_num_entities: head.current_num_entities,
            num_free_entity_ids: self.free_entity_ids().len() as u32,
            num_component_types: head.num_component_types,
            singletons: self.singleton_registry().to_vec(),
            components: self.component_registry().to_vec(),
            offset_singleton_registry: head.offset_singleton_registry,
            offset_component_registry: head.offset_component_registry,
            offset_free_entity_ids: head.offset_free_entity_ids,
            offset_entity_masks: head.offset_entity_masks,
            offset_entity_generations: head.offset_entity_generations,
            content_hash: self.content_hash(),
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> GameState<B> {
    /// Overwrite this block with `other`. Both blocks must be the same size;
    /// the layout travels with the bytes.
    pub fn copy_from<C: AsRef<[u8]>>(&mut self, other: &GameState<C>) -> Result<(), EcsError> {
        let size = self.state_size();
        let source = other.as_bytes();
        if source.len() != size {
            tracing::warn!(
                source = source.len(),
                destination = size,
                "cannot copy game states of different sizes"
            );
            return Err(EcsError::SizeMismatch {
                header: source.len() as u64,
                buffer: size,
            });
        }
        self.bytes_mut()[..size].copy_from_slice(source);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::GameStateLayout;

    fn populated() -> GameState<AlignedBuffer> {
        let layout = GameStateLayout::new(16).with_singleton(8).with_component(4);
        let mut state = GameState::new(&layout).unwrap();
        for i in 0..5u32 {
            let e = state.create_entity().unwrap();
            state.add_component(e, 1, &(i * 10)).unwrap();
        }
        state
    }

    #[test]
    fn hash_tracks_content() {
        let mut state = populated();
        let before = state.content_hash();
        assert_eq!(before, populated().content_hash());
        assert_eq!(before.len(), 64);

        let e = state.create_entity().unwrap();
        assert_ne!(state.content_hash(), before);
        state.delete_entity(e);
        // The generation bump is part of the block.
        assert_ne!(state.content_hash(), before);
    }

    #[test]
    fn owned_copy_is_independent() {
        let mut state = populated();
        let copy = state.to_owned_state();
        assert_eq!(copy.as_bytes(), state.as_bytes());
        state.create_entity().unwrap();
        assert_eq!(copy.current_num_entities(), 5);
        assert_eq!(state.current_num_entities(), 6);
    }

    #[test]
    fn copy_from_double_buffer() {
        let front = populated();
        let mut back = GameState::new(&front.layout()).unwrap();
        assert_ne!(back.content_hash(), front.content_hash());
        back.copy_from(&front).unwrap();
        assert_eq!(back.content_hash(), front.content_hash());
        assert_eq!(back.entities().count(), 5);

        let mut other = GameState::new(&GameStateLayout::new(3)).unwrap();
        assert!(matches!(other.copy_from(&front), Err(EcsError::SizeMismatch { .. })));
    }

    #[test]
    fn summary_serializes() {
        let state = populated();
        let summary = state.summary();
        assert_eq!(summary.current_num_entities, 5);
        assert_eq!(summary.num_free_entity_ids, 11);
        assert_eq!(summary.num_component_types, 2);
        assert_eq!(summary.singletons.len(), 1);
        assert_eq!(summary.components[1].size_bytes, 4);

        let json = summary.to_json();
        let back: GameStateSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
