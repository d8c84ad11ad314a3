//! Iteration over entities by component mask.

use crate::component::ComponentMask;
use crate::entity::Entity;
use crate::state::GameState;

/// Iterator over the active entities whose mask fulfills a query, in id
/// order. Created by [`GameState::entities_matching`].
pub struct EntitiesMatching<'s> {
    masks: &'s [ComponentMask],
    generations: &'s [u8],
    query: ComponentMask,
    next_id: usize,
}

impl Iterator for EntitiesMatching<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while self.next_id < self.masks.len() {
            let id = self.next_id;
            self.next_id += 1;
            if self.masks[id].fulfills(self.query) {
                return Some(Entity::new(id as u32, self.generations[id]));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.masks.len() - self.next_id))
    }
}

impl<B: AsRef<[u8]>> GameState<B> {
    /// Handles of every active entity that has all components in `query`.
    /// The active bit is always added to the query.
    pub fn entities_matching(&self, query: ComponentMask) -> EntitiesMatching<'_> {
        EntitiesMatching {
            masks: self.entity_masks(),
            generations: self.entity_generations(),
            query: query | ComponentMask::ACTIVE,
            next_id: 0,
        }
    }

    /// Handles of every active entity.
    pub fn entities(&self) -> EntitiesMatching<'_> {
        self.entities_matching(ComponentMask::ACTIVE)
    }
}
