//! Binary layout of a game state block.
//!
//! A game state is one flat, relocatable byte block. Nothing inside it is a
//! pointer; every region is found through a byte offset from the start of
//! the block, so the block can be copied, mapped or sent as raw bytes and
//! reinterpreted anywhere as long as its base stays 16-byte aligned.
//!
//! ```text
//! offset 0   GameStateHeader (80 bytes)
//!            singleton registry   [RegistryEntry; num_singletons]
//!            singleton data       one 16-aligned chunk per singleton
//!            component registry   [RegistryEntry; num_component_types]
//!            free entity ids      ArrayHeader + [u32; max_num_entities]
//!            entity masks         ArrayHeader + [u64; max_num_entities]
//!            entity generations   ArrayHeader + [u8;  max_num_entities]
//!            component arrays     ArrayHeader + [T; max_num_entities]
//!                                 for each component type with size > 0
//! ```
//!
//! Every region starts on a [`REGION_ALIGNMENT`] boundary. All multi-byte
//! fields use the host's native byte order.

use bytemuck_derive::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::component::{ComponentType, MAX_NUM_USER_COMPONENTS};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// `"SFZGSTAT"` read as a little-endian `u64`.
pub const GAME_STATE_MAGIC: u64 = u64::from_le_bytes(*b"SFZGSTAT");

/// Layout version written into every header.
pub const GAME_STATE_VERSION: u32 = 1;

/// Alignment of the block base and of every region inside it.
pub const REGION_ALIGNMENT: usize = 16;

/// Size of [`GameStateHeader`].
pub const HEADER_SIZE: usize = std::mem::size_of::<GameStateHeader>();

/// Size of [`ArrayHeader`].
pub const ARRAY_HEADER_SIZE: usize = std::mem::size_of::<ArrayHeader>();

const REGISTRY_ENTRY_SIZE: usize = std::mem::size_of::<RegistryEntry>();

// ---------------------------------------------------------------------------
// On-disk structs
// ---------------------------------------------------------------------------

/// Fixed header at offset 0 of every game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct GameStateHeader {
    pub magic: u64,
    pub version: u32,
    pub num_singletons: u32,
    pub state_size_bytes: u64,
    /// User component types plus the active bit.
    pub num_component_types: u32,
    pub max_num_entities: u32,
    pub current_num_entities: u32,
    pad0: u32,
    pub offset_singleton_registry: u32,
    pub offset_component_registry: u32,
    pub offset_free_entity_ids: u32,
    pub offset_entity_masks: u32,
    pub offset_entity_generations: u32,
    pad1: [u32; 5],
}

const _: () = assert!(HEADER_SIZE == 80);
const _: () = assert!(HEADER_SIZE % REGION_ALIGNMENT == 0);

/// Prefix of every array region; the elements follow immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct ArrayHeader {
    pub capacity: u32,
    pub size: u32,
    pub element_size: u32,
    pad: u32,
}

const _: () = assert!(ARRAY_HEADER_SIZE == REGION_ALIGNMENT);

impl ArrayHeader {
    pub(crate) fn new(capacity: u32, size: u32, element_size: u32) -> Self {
        Self {
            capacity,
            size,
            element_size,
            pad: 0,
        }
    }
}

/// Where a singleton or a component array lives. Both fields are 0 for
/// component types without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct RegistryEntry {
    pub offset: u32,
    pub size_bytes: u32,
}

// ---------------------------------------------------------------------------
// Sizing
// ---------------------------------------------------------------------------

#[inline]
fn align16(value: u64) -> Option<u64> {
    const MASK: u64 = REGION_ALIGNMENT as u64 - 1;
    Some(value.checked_add(MASK)? & !MASK)
}

/// Bytes taken by an array region: header plus `count` elements, padded.
#[inline]
fn array_region(count: u32, element_size: u32) -> Option<u64> {
    let elements = u64::from(count).checked_mul(u64::from(element_size))?;
    align16(elements.checked_add(ARRAY_HEADER_SIZE as u64)?)
}

#[inline]
fn registry_region(entries: usize) -> Option<u64> {
    align16(u64::try_from(entries).ok()?.checked_mul(REGISTRY_ENTRY_SIZE as u64)?)
}

pub(crate) fn check_component_count(num_user_components: usize) -> Result<(), EcsError> {
    if num_user_components > MAX_NUM_USER_COMPONENTS {
        return Err(EcsError::TooManyComponents {
            requested: num_user_components,
            max: MAX_NUM_USER_COMPONENTS,
        });
    }
    Ok(())
}

/// Bytes needed for a game state with the given singleton sizes, entity
/// capacity and user component sizes (type 1 first).
///
/// The whole block must be addressable with `u32` offsets.
pub fn calc_game_state_size(
    singleton_sizes: &[u32],
    max_num_entities: u32,
    component_sizes: &[u32],
) -> Result<usize, EcsError> {
    check_component_count(component_sizes.len())?;

    let size = (|| {
        let singleton_data = singleton_sizes
            .iter()
            .try_fold(0u64, |acc, &s| acc.checked_add(align16(u64::from(s))?))?;
        let component_data = component_sizes
            .iter()
            .filter(|&&s| s > 0)
            .try_fold(0u64, |acc, &s| {
                acc.checked_add(array_region(max_num_entities, s)?)
            })?;

        [
            Some(HEADER_SIZE as u64),
            registry_region(singleton_sizes.len()),
            Some(singleton_data),
            registry_region(component_sizes.len() + 1),
            array_region(max_num_entities, 4),
            array_region(max_num_entities, 8),
            array_region(max_num_entities, 1),
            Some(component_data),
        ]
        .into_iter()
        .try_fold(0u64, |acc, region| acc.checked_add(region?))
    })()
    .ok_or(EcsError::LayoutOverflow)?;

    if size > u64::from(u32::MAX) {
        return Err(EcsError::LayoutOverflow);
    }
    Ok(size as usize)
}

// ---------------------------------------------------------------------------
// LayoutPlan
// ---------------------------------------------------------------------------

/// Bump allocator over block offsets. Every claim ends on a region boundary.
struct Cursor {
    offset: u64,
}

impl Cursor {
    fn claim(&mut self, bytes: u64) -> Result<u32, EcsError> {
        let start = self.offset;
        let end = start
            .checked_add(bytes)
            .and_then(align16)
            .filter(|&end| end <= u64::from(u32::MAX))
            .ok_or(EcsError::LayoutOverflow)?;
        self.offset = end;
        Ok(start as u32)
    }
}

/// Offsets of every region, produced by walking the layout region by
/// region. Used when writing a fresh block and when checking a foreign one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LayoutPlan {
    pub singleton_registry: u32,
    pub singletons: Vec<RegistryEntry>,
    pub component_registry: u32,
    /// Indexed by component type, the active type included.
    pub components: Vec<RegistryEntry>,
    pub free_entity_ids: u32,
    pub entity_masks: u32,
    pub entity_generations: u32,
    pub total: u32,
}

impl LayoutPlan {
    /// `type_sizes[0]` is the active type and must be 0.
    pub(crate) fn build(
        singleton_sizes: &[u32],
        max_num_entities: u32,
        type_sizes: &[u32],
    ) -> Result<Self, EcsError> {
        debug_assert_eq!(type_sizes.first().copied(), Some(0));
        let max = u64::from(max_num_entities);
        let mut cursor = Cursor {
            offset: HEADER_SIZE as u64,
        };

        let singleton_registry =
            cursor.claim((singleton_sizes.len() * REGISTRY_ENTRY_SIZE) as u64)?;
        let singletons = singleton_sizes
            .iter()
            .map(|&size| {
                Ok(RegistryEntry {
                    offset: cursor.claim(u64::from(size))?,
                    size_bytes: size,
                })
            })
            .collect::<Result<Vec<_>, EcsError>>()?;

        let component_registry = cursor.claim((type_sizes.len() * REGISTRY_ENTRY_SIZE) as u64)?;
        let free_entity_ids = cursor.claim(ARRAY_HEADER_SIZE as u64 + max * 4)?;
        let entity_masks = cursor.claim(ARRAY_HEADER_SIZE as u64 + max * 8)?;
        let entity_generations = cursor.claim(ARRAY_HEADER_SIZE as u64 + max)?;

        let components = type_sizes
            .iter()
            .map(|&size| {
                if size == 0 {
                    return Ok(RegistryEntry::default());
                }
                Ok(RegistryEntry {
                    offset: cursor.claim(ARRAY_HEADER_SIZE as u64 + max * u64::from(size))?,
                    size_bytes: size,
                })
            })
            .collect::<Result<Vec<_>, EcsError>>()?;

        Ok(Self {
            singleton_registry,
            singletons,
            component_registry,
            components,
            free_entity_ids,
            entity_masks,
            entity_generations,
            total: cursor.claim(0)?,
        })
    }

    /// Header describing this plan, with no live entities.
    pub(crate) fn header(&self, max_num_entities: u32) -> GameStateHeader {
        GameStateHeader {
            magic: GAME_STATE_MAGIC,
            version: GAME_STATE_VERSION,
            num_singletons: self.singletons.len() as u32,
            state_size_bytes: u64::from(self.total),
            num_component_types: self.components.len() as u32,
            max_num_entities,
            current_num_entities: 0,
            pad0: 0,
            offset_singleton_registry: self.singleton_registry,
            offset_component_registry: self.component_registry,
            offset_free_entity_ids: self.free_entity_ids,
            offset_entity_masks: self.entity_masks,
            offset_entity_generations: self.entity_generations,
            pad1: [0; 5],
        }
    }

    /// Whether `header` points every region where this plan puts it.
    pub(crate) fn matches(&self, header: &GameStateHeader) -> bool {
        header.state_size_bytes == u64::from(self.total)
            && header.offset_singleton_registry == self.singleton_registry
            && header.offset_component_registry == self.component_registry
            && header.offset_free_entity_ids == self.free_entity_ids
            && header.offset_entity_masks == self.entity_masks
            && header.offset_entity_generations == self.entity_generations
    }
}

// ---------------------------------------------------------------------------
// GameStateLayout (configuration)
// ---------------------------------------------------------------------------

/// Shape of a game state: singleton sizes, entity capacity and the size of
/// each user component type. Loadable from JSON:
///
/// ```
/// use sfz_ecs::layout::GameStateLayout;
///
/// let layout = GameStateLayout::from_json(
///     r#"{ "singleton_sizes": [64], "max_num_entities": 128, "component_sizes": [8, 0, 12] }"#,
/// ).unwrap();
/// assert_eq!(layout.num_component_types(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameStateLayout {
    #[serde(default)]
    pub singleton_sizes: Vec<u32>,
    pub max_num_entities: u32,
    /// Size in bytes of component types 1, 2, ... A size of 0 declares a
    /// flag component that only occupies a mask bit.
    #[serde(default)]
    pub component_sizes: Vec<u32>,
}

impl GameStateLayout {
    /// Layout with room for `max_num_entities` and nothing else.
    pub fn new(max_num_entities: u32) -> Self {
        Self {
            max_num_entities,
            ..Self::default()
        }
    }

    /// Append a singleton of `size` bytes. Its index is the number of
    /// singletons declared before it.
    pub fn with_singleton(mut self, size: u32) -> Self {
        self.singleton_sizes.push(size);
        self
    }

    /// Append a component type of `size` bytes. Its type is the number of
    /// component types declared before it, plus one.
    pub fn with_component(mut self, size: u32) -> Self {
        self.component_sizes.push(size);
        self
    }

    /// Parse and validate a layout.
    pub fn from_json(json: &str) -> Result<Self, EcsError> {
        let layout: Self =
            serde_json::from_str(json).map_err(|e| EcsError::Config(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .expect("GameStateLayout should always be JSON-serializable")
    }

    /// Reject layouts that cannot back a usable game state.
    pub fn validate(&self) -> Result<(), EcsError> {
        if self.max_num_entities == 0 {
            return Err(EcsError::Config(
                "max_num_entities must be greater than zero".to_owned(),
            ));
        }
        self.state_size().map(|_| ())
    }

    /// Component types including the active bit.
    pub fn num_component_types(&self) -> u32 {
        self.component_sizes.len() as u32 + 1
    }

    /// Size of each component type, indexed by type (type 0 is 0).
    pub fn type_sizes(&self) -> Vec<u32> {
        std::iter::once(0).chain(self.component_sizes.iter().copied()).collect()
    }

    /// Size in bytes of `component`, if the layout declares it.
    pub fn component_size(&self, component: ComponentType) -> Option<u32> {
        match component {
            0 => Some(0),
            c => self.component_sizes.get(c as usize - 1).copied(),
        }
    }

    /// See [`calc_game_state_size`].
    pub fn state_size(&self) -> Result<usize, EcsError> {
        calc_game_state_size(&self.singleton_sizes, self.max_num_entities, &self.component_sizes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_sizes() {
        assert_eq!(HEADER_SIZE, 80);
        assert_eq!(ARRAY_HEADER_SIZE, 16);
        assert_eq!(REGISTRY_ENTRY_SIZE, 8);
    }

    #[test]
    fn magic_spells_name() {
        assert_eq!(&GAME_STATE_MAGIC.to_le_bytes(), b"SFZGSTAT");
    }

    #[test]
    fn minimal_size_by_hand() {
        // header 80
        // singleton registry 0, component registry 8 -> 16
        // free ids 16 + 40 -> 64, masks 16 + 80 -> 96, generations 16 + 10 -> 32
        let size = calc_game_state_size(&[], 10, &[]).unwrap();
        assert_eq!(size, 80 + 16 + 64 + 96 + 32);
    }

    #[test]
    fn singletons_and_components_are_padded() {
        let base = calc_game_state_size(&[], 4, &[]).unwrap();
        // one singleton registry entry (16) + 20 bytes of data (32)
        assert_eq!(calc_game_state_size(&[20], 4, &[]).unwrap(), base + 16 + 32);
        // registry grows from 8 to 16 bytes (still 16), array 16 + 4*12 = 64
        assert_eq!(calc_game_state_size(&[], 4, &[12]).unwrap(), base + 64);
        // flag components take no data
        assert_eq!(calc_game_state_size(&[], 4, &[0]).unwrap(), base);
    }

    #[test]
    fn plan_total_matches_sizing() {
        let singletons = [4u32, 100, 0, 33];
        let components = [0u32, 8, 12, 0, 64, 1];
        let type_sizes: Vec<u32> = std::iter::once(0).chain(components).collect();
        for max in [0u32, 1, 7, 100, 1000] {
            let plan = LayoutPlan::build(&singletons, max, &type_sizes).unwrap();
            let size = calc_game_state_size(&singletons, max, &components).unwrap();
            assert_eq!(plan.total as usize, size, "max_num_entities = {max}");
        }
    }

    #[test]
    fn plan_regions_are_aligned_and_ordered() {
        let type_sizes = [0u32, 8, 0, 24];
        let plan = LayoutPlan::build(&[3, 17], 50, &type_sizes).unwrap();
        let mut offsets = vec![plan.singleton_registry];
        offsets.extend(plan.singletons.iter().map(|e| e.offset));
        offsets.push(plan.component_registry);
        offsets.extend([plan.free_entity_ids, plan.entity_masks, plan.entity_generations]);
        offsets.extend(plan.components.iter().filter(|e| e.size_bytes > 0).map(|e| e.offset));
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert!(offsets.iter().all(|o| *o as usize % REGION_ALIGNMENT == 0));
        assert_eq!(plan.singleton_registry as usize, HEADER_SIZE);
        assert_eq!(plan.components[0], RegistryEntry::default());
        assert_eq!(plan.components[2], RegistryEntry::default());
    }

    #[test]
    fn too_many_components() {
        let sizes = vec![4u32; MAX_NUM_USER_COMPONENTS + 1];
        let err = calc_game_state_size(&[], 1, &sizes).unwrap_err();
        assert!(matches!(err, EcsError::TooManyComponents { requested: 64, max: 63 }));
        assert!(calc_game_state_size(&[], 1, &sizes[..63]).is_ok());
    }

    #[test]
    fn overflow_is_reported() {
        let err = calc_game_state_size(&[], u32::MAX, &[u32::MAX]).unwrap_err();
        assert!(matches!(err, EcsError::LayoutOverflow));
        let err = calc_game_state_size(&[u32::MAX], 1, &[]).unwrap_err();
        assert!(matches!(err, EcsError::LayoutOverflow));
    }

    #[test]
    fn layout_json_round_trip() {
        let layout = GameStateLayout::new(32)
            .with_singleton(16)
            .with_component(8)
            .with_component(0);
        let back = GameStateLayout::from_json(&layout.to_json()).unwrap();
        assert_eq!(layout, back);
        assert_eq!(back.num_component_types(), 3);
        assert_eq!(back.type_sizes(), vec![0, 8, 0]);
        assert_eq!(back.component_size(1), Some(8));
        assert_eq!(back.component_size(3), None);
    }

    #[test]
    fn layout_validation() {
        let err = GameStateLayout::from_json(r#"{ "max_num_entities": 0 }"#).unwrap_err();
        assert!(matches!(err, EcsError::Config(_)));

        let err = GameStateLayout::from_json("not json").unwrap_err();
        assert!(matches!(err, EcsError::Config(_)));

        let layout = GameStateLayout {
            component_sizes: vec![1; 70],
            ..GameStateLayout::new(4)
        };
        assert!(matches!(layout.validate(), Err(EcsError::TooManyComponents { .. })));
    }
}
