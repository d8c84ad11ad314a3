//! The game state block and its entity/component operations.
//!
//! [`GameState<B>`] is a typed view over any byte storage `B` that holds a
//! block written by [`create_game_state`]. Read-only storage (`&[u8]`) gives
//! queries; mutable storage (`&mut [u8]`, [`AlignedBuffer`]) adds entity and
//! component mutation.
//!
//! Recoverable failures (capacity exhausted, stale handle, wrong size) are
//! reported through `Option`/`bool`/[`EcsError`] and leave the block as it
//! was. A block whose header or entity tables were tampered with is
//! rejected when it is opened, not when it is used.

use std::fmt;
use std::ops::Range;

use bytemuck::Pod;
use tracing::{debug, warn};

use crate::component::{ComponentMask, ComponentType, ACTIVE_COMPONENT, MAX_NUM_COMPONENT_TYPES};
use crate::entity::{next_generation, Entity};
use crate::layout::{
    calc_game_state_size, ArrayHeader, GameStateHeader, GameStateLayout, LayoutPlan,
    RegistryEntry, ARRAY_HEADER_SIZE, GAME_STATE_MAGIC, GAME_STATE_VERSION, HEADER_SIZE,
    REGION_ALIGNMENT,
};
use crate::EcsError;

// ---------------------------------------------------------------------------
// AlignedBuffer
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, bytemuck_derive::Pod, bytemuck_derive::Zeroable)]
#[repr(C, align(16))]
struct Chunk([u8; REGION_ALIGNMENT]);

/// Owned, zero-initialized byte buffer whose base is 16-byte aligned.
#[derive(Clone)]
pub struct AlignedBuffer {
    chunks: Vec<Chunk>,
    len: usize,
}

impl AlignedBuffer {
    /// `len` zero bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            chunks: vec![Chunk([0; REGION_ALIGNMENT]); len.div_ceil(REGION_ALIGNMENT)],
            len,
        }
    }

    /// Aligned copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::zeroed(bytes.len());
        buffer.as_mut().copy_from_slice(bytes);
        buffer
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for AlignedBuffer {
    fn as_ref(&self) -> &[u8] {
        &bytemuck::cast_slice::<Chunk, u8>(&self.chunks)[..self.len]
    }
}

impl AsMut<[u8]> for AlignedBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Chunk, u8>(&mut self.chunks)[..self.len]
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer").field("len", &self.len).finish()
    }
}

// ---------------------------------------------------------------------------
// Raw region access
// ---------------------------------------------------------------------------

// All offsets below are 16-byte aligned relative to a 16-byte aligned base,
// which is checked once when a block is created or opened.

fn check_alignment(bytes: &[u8]) -> Result<(), EcsError> {
    if bytes.as_ptr() as usize % REGION_ALIGNMENT != 0 {
        return Err(EcsError::Misaligned {
            align: REGION_ALIGNMENT,
        });
    }
    Ok(())
}

#[inline]
fn header(bytes: &[u8]) -> &GameStateHeader {
    bytemuck::from_bytes(&bytes[..HEADER_SIZE])
}

#[inline]
fn header_mut(bytes: &mut [u8]) -> &mut GameStateHeader {
    bytemuck::from_bytes_mut(&mut bytes[..HEADER_SIZE])
}

#[inline]
fn registry_range(offset: u32, count: u32) -> Range<usize> {
    let start = offset as usize;
    start..start + count as usize * std::mem::size_of::<RegistryEntry>()
}

#[inline]
fn array_header(bytes: &[u8], offset: u32) -> &ArrayHeader {
    let start = offset as usize;
    bytemuck::from_bytes(&bytes[start..start + ARRAY_HEADER_SIZE])
}

#[inline]
fn array_header_mut(bytes: &mut [u8], offset: u32) -> &mut ArrayHeader {
    let start = offset as usize;
    bytemuck::from_bytes_mut(&mut bytes[start..start + ARRAY_HEADER_SIZE])
}

/// Byte range of the elements of the array region at `offset`.
#[inline]
fn array_data_range(bytes: &[u8], offset: u32) -> Range<usize> {
    let array = array_header(bytes, offset);
    let start = offset as usize + ARRAY_HEADER_SIZE;
    start..start + array.capacity as usize * array.element_size as usize
}

#[inline]
fn array_data<T: Pod>(bytes: &[u8], offset: u32) -> &[T] {
    let range = array_data_range(bytes, offset);
    bytemuck::cast_slice(&bytes[range])
}

#[inline]
fn array_data_mut<T: Pod>(bytes: &mut [u8], offset: u32) -> &mut [T] {
    let range = array_data_range(bytes, offset);
    bytemuck::cast_slice_mut(&mut bytes[range])
}

// ---------------------------------------------------------------------------
// create_game_state
// ---------------------------------------------------------------------------

/// Lay out a fresh game state in `dst`.
///
/// `component_sizes` lists user component types starting at type 1. The
/// buffer is zeroed completely, every id is pushed onto the free stack so id
/// 0 is handed out first, and entity 0 starts at generation 1 so that
/// `Entity::default()` never validates.
///
/// Fails if `dst` is smaller than [`calc_game_state_size`] reports or not
/// 16-byte aligned. `dst` is untouched on failure.
pub fn create_game_state(
    dst: &mut [u8],
    singleton_sizes: &[u32],
    max_num_entities: u32,
    component_sizes: &[u32],
) -> Result<(), EcsError> {
    let required = calc_game_state_size(singleton_sizes, max_num_entities, component_sizes)?;
    if dst.len() < required {
        warn!(
            required,
            provided = dst.len(),
            "destination buffer too small for game state"
        );
        return Err(EcsError::BufferTooSmall {
            required,
            provided: dst.len(),
        });
    }
    check_alignment(dst)?;

    let type_sizes: Vec<u32> = std::iter::once(0)
        .chain(component_sizes.iter().copied())
        .collect();
    let plan = LayoutPlan::build(singleton_sizes, max_num_entities, &type_sizes)?;
    assert_eq!(
        plan.total as usize, required,
        "game state layout tally disagrees with calc_game_state_size"
    );

    dst.fill(0);
    *header_mut(dst) = plan.header(max_num_entities);

    let num_singletons = plan.singletons.len() as u32;
    bytemuck::cast_slice_mut::<u8, RegistryEntry>(
        &mut dst[registry_range(plan.singleton_registry, num_singletons)],
    )
    .copy_from_slice(&plan.singletons);
    let num_types = plan.components.len() as u32;
    bytemuck::cast_slice_mut::<u8, RegistryEntry>(
        &mut dst[registry_range(plan.component_registry, num_types)],
    )
    .copy_from_slice(&plan.components);

    let max = max_num_entities;
    *array_header_mut(dst, plan.free_entity_ids) = ArrayHeader::new(max, max, 4);
    for (slot, id) in array_data_mut::<u32>(dst, plan.free_entity_ids)
        .iter_mut()
        .zip((0..max).rev())
    {
        *slot = id;
    }

    *array_header_mut(dst, plan.entity_masks) = ArrayHeader::new(max, max, 8);
    *array_header_mut(dst, plan.entity_generations) = ArrayHeader::new(max, max, 1);
    if let Some(first) = array_data_mut::<u8>(dst, plan.entity_generations).first_mut() {
        *first = 1;
    }

    for entry in plan.components.iter().filter(|e| e.size_bytes > 0) {
        *array_header_mut(dst, entry.offset) = ArrayHeader::new(max, max, entry.size_bytes);
    }

    debug!(
        state_size = required,
        buffer_size = dst.len(),
        num_singletons,
        num_component_types = num_types,
        max_num_entities,
        "game state created"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation of foreign blocks
// ---------------------------------------------------------------------------

fn corrupt(details: impl Into<String>) -> EcsError {
    let details = details.into();
    warn!(%details, "rejecting corrupt game state");
    EcsError::CorruptLayout { details }
}

fn read_registry_sizes(
    block: &[u8],
    offset: u32,
    count: u32,
    what: &str,
) -> Result<Vec<u32>, EcsError> {
    let range = registry_range(offset, count);
    let raw = block
        .get(range)
        .ok_or_else(|| corrupt(format!("{what} registry lies outside the block")))?;
    let entries: &[RegistryEntry] = bytemuck::try_cast_slice(raw)
        .map_err(|_| corrupt(format!("{what} registry is misaligned")))?;
    Ok(entries.iter().map(|e| e.size_bytes).collect())
}

/// Check that `bytes` holds a complete, self-consistent game state.
fn validate_block(bytes: &[u8]) -> Result<(), EcsError> {
    if bytes.len() < HEADER_SIZE {
        return Err(EcsError::BufferTooSmall {
            required: HEADER_SIZE,
            provided: bytes.len(),
        });
    }
    check_alignment(bytes)?;

    let head = *header(bytes);
    if head.magic != GAME_STATE_MAGIC {
        warn!(magic = head.magic, "buffer does not hold a game state");
        return Err(EcsError::BadMagic);
    }
    if head.version != GAME_STATE_VERSION {
        warn!(
            found = head.version,
            expected = GAME_STATE_VERSION,
            "unsupported game state version"
        );
        return Err(EcsError::UnsupportedVersion {
            found: head.version,
            expected: GAME_STATE_VERSION,
        });
    }
    let state_size = usize::try_from(head.state_size_bytes).unwrap_or(usize::MAX);
    if state_size < HEADER_SIZE || state_size > bytes.len() {
        warn!(header = head.state_size_bytes, buffer = bytes.len(), "game state size mismatch");
        return Err(EcsError::SizeMismatch {
            header: head.state_size_bytes,
            buffer: bytes.len(),
        });
    }
    let block = &bytes[..state_size];

    if head.num_component_types == 0
        || head.num_component_types as usize > MAX_NUM_COMPONENT_TYPES
    {
        return Err(corrupt(format!(
            "{} component types recorded",
            head.num_component_types
        )));
    }
    let singleton_sizes = read_registry_sizes(
        block,
        head.offset_singleton_registry,
        head.num_singletons,
        "singleton",
    )?;
    let type_sizes = read_registry_sizes(
        block,
        head.offset_component_registry,
        head.num_component_types,
        "component",
    )?;
    if type_sizes[0] != 0 {
        return Err(corrupt("active component type carries data"));
    }

    let plan = LayoutPlan::build(&singleton_sizes, head.max_num_entities, &type_sizes)
        .map_err(|_| corrupt("recorded counts overflow the layout"))?;
    if !plan.matches(&head) {
        return Err(corrupt("region offsets do not match the recorded counts"));
    }
    let singletons: &[RegistryEntry] =
        bytemuck::cast_slice(&block[registry_range(plan.singleton_registry, head.num_singletons)]);
    let components: &[RegistryEntry] = bytemuck::cast_slice(
        &block[registry_range(plan.component_registry, head.num_component_types)],
    );
    if singletons != plan.singletons.as_slice() || components != plan.components.as_slice() {
        return Err(corrupt("registry offsets do not match the recorded sizes"));
    }

    let max = head.max_num_entities;
    let expect_array = |offset: u32, element_size: u32, what: &str| {
        let array = array_header(block, offset);
        if array.capacity != max || array.element_size != element_size {
            return Err(corrupt(format!("{what} array header is inconsistent")));
        }
        Ok(*array)
    };
    let free = expect_array(plan.free_entity_ids, 4, "free entity id")?;
    expect_array(plan.entity_masks, 8, "entity mask")?;
    expect_array(plan.entity_generations, 1, "entity generation")?;
    for (component, entry) in plan.components.iter().enumerate() {
        if entry.size_bytes > 0 {
            expect_array(entry.offset, entry.size_bytes, &format!("component {component}"))?;
        }
    }

    if free.size > max
        || u64::from(free.size) + u64::from(head.current_num_entities) != u64::from(max)
    {
        return Err(corrupt("free entity count does not match the live entity count"));
    }
    let free_ids = &array_data::<u32>(block, plan.free_entity_ids)[..free.size as usize];
    if free_ids.iter().any(|&id| id >= max) {
        return Err(corrupt("free entity id out of range"));
    }

    // With the counts above, these checks make the free stack exactly the
    // set of inactive ids.
    let masks = array_data::<ComponentMask>(block, plan.entity_masks);
    let active = masks.iter().filter(|m| m.is_active()).count();
    if active as u64 != u64::from(head.current_num_entities) {
        return Err(corrupt(format!(
            "{active} active entities but {} recorded",
            head.current_num_entities
        )));
    }
    let mut on_free_stack = vec![false; max as usize];
    for &id in free_ids {
        if std::mem::replace(&mut on_free_stack[id as usize], true) {
            return Err(corrupt(format!("entity id {id} is on the free stack twice")));
        }
        if masks[id as usize].is_active() {
            return Err(corrupt(format!("active entity id {id} is on the free stack")));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Typed view over a game state block held in `B`.
#[derive(Clone)]
pub struct GameState<B> {
    storage: B,
}

impl GameState<AlignedBuffer> {
    /// Allocate an owned block sized exactly for `layout` and initialize it.
    pub fn new(layout: &GameStateLayout) -> Result<Self, EcsError> {
        let size = layout.state_size()?;
        let mut storage = AlignedBuffer::zeroed(size);
        create_game_state(
            storage.as_mut(),
            &layout.singleton_sizes,
            layout.max_num_entities,
            &layout.component_sizes,
        )?;
        Ok(Self { storage })
    }
}

impl<'a> GameState<&'a mut [u8]> {
    /// Initialize a block for `layout` inside caller-provided memory.
    pub fn create_in(dst: &'a mut [u8], layout: &GameStateLayout) -> Result<Self, EcsError> {
        create_game_state(
            dst,
            &layout.singleton_sizes,
            layout.max_num_entities,
            &layout.component_sizes,
        )?;
        Ok(Self { storage: dst })
    }
}

impl<B> GameState<B> {
    /// Wrap storage already known to hold a valid block.
    pub(crate) fn from_valid_storage(storage: B) -> Self {
        Self { storage }
    }
}

impl<B: AsRef<[u8]>> GameState<B> {
    /// Open an existing block. Checks magic, version, size and that every
    /// offset in the header agrees with the counts it records.
    pub fn from_bytes(storage: B) -> Result<Self, EcsError> {
        validate_block(storage.as_ref())?;
        Ok(Self { storage })
    }

    /// Give the storage back.
    pub fn into_inner(self) -> B {
        self.storage
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        self.storage.as_ref()
    }

    #[inline]
    pub fn header(&self) -> &GameStateHeader {
        header(self.bytes())
    }

    /// Size of the block in bytes. The storage may be larger.
    #[inline]
    pub fn state_size(&self) -> usize {
        self.header().state_size_bytes as usize
    }

    #[inline]
    pub fn num_singletons(&self) -> u32 {
        self.header().num_singletons
    }

    /// Component types including the active bit.
    #[inline]
    pub fn num_component_types(&self) -> u32 {
        self.header().num_component_types
    }

    #[inline]
    pub fn max_num_entities(&self) -> u32 {
        self.header().max_num_entities
    }

    #[inline]
    pub fn current_num_entities(&self) -> u32 {
        self.header().current_num_entities
    }

    pub fn singleton_registry(&self) -> &[RegistryEntry] {
        let head = self.header();
        bytemuck::cast_slice(
            &self.bytes()[registry_range(head.offset_singleton_registry, head.num_singletons)],
        )
    }

    /// Indexed by component type; entry 0 is the active bit.
    pub fn component_registry(&self) -> &[RegistryEntry] {
        let head = self.header();
        bytemuck::cast_slice(
            &self.bytes()[registry_range(head.offset_component_registry, head.num_component_types)],
        )
    }

    /// Rebuild the layout this block was created from.
    pub fn layout(&self) -> GameStateLayout {
        GameStateLayout {
            singleton_sizes: self.singleton_registry().iter().map(|e| e.size_bytes).collect(),
            max_num_entities: self.max_num_entities(),
            component_sizes: self.component_registry()[1..]
                .iter()
                .map(|e| e.size_bytes)
                .collect(),
        }
    }

    /// Size in bytes of `component`'s data; 0 for flag components.
    pub fn component_size(&self, component: ComponentType) -> Result<u32, EcsError> {
        self.component_registry()
            .get(component as usize)
            .map(|e| e.size_bytes)
            .ok_or(EcsError::UnknownComponent {
                component,
                num_component_types: self.num_component_types(),
            })
    }

    /// Ids on the free stack, bottom first; the last one is handed out next.
    pub fn free_entity_ids(&self) -> &[u32] {
        let offset = self.header().offset_free_entity_ids;
        let size = array_header(self.bytes(), offset).size as usize;
        &array_data::<u32>(self.bytes(), offset)[..size]
    }

    /// Masks of every entity slot, indexed by id.
    pub fn entity_masks(&self) -> &[ComponentMask] {
        array_data(self.bytes(), self.header().offset_entity_masks)
    }

    /// Generation counters of every entity slot, indexed by id.
    pub fn entity_generations(&self) -> &[u8] {
        array_data(self.bytes(), self.header().offset_entity_generations)
    }

    pub fn entity_mask(&self, id: u32) -> Option<ComponentMask> {
        self.entity_masks().get(id as usize).copied()
    }

    pub fn entity_generation(&self, id: u32) -> Option<u8> {
        self.entity_generations().get(id as usize).copied()
    }

    /// Current handle for `id` if that slot is active.
    pub fn entity_handle(&self, id: u32) -> Option<Entity> {
        let mask = self.entity_mask(id)?;
        if !mask.is_active() {
            return None;
        }
        Some(Entity::new(id, self.entity_generations()[id as usize]))
    }

    /// In range, active, and of the current generation.
    pub fn check_entity_valid(&self, entity: Entity) -> bool {
        let id = entity.id();
        match (self.entity_mask(id), self.entity_generation(id)) {
            (Some(mask), Some(generation)) => {
                mask.is_active() && generation == entity.generation()
            }
            _ => false,
        }
    }

    /// Whether a valid `entity` has `component`'s bit set.
    pub fn has_component(&self, entity: Entity, component: ComponentType) -> bool {
        self.check_entity_valid(entity)
            && component < self.num_component_types()
            && self.entity_masks()[entity.id() as usize].has(component)
    }

    /// Byte range of `id`'s row in `component`'s array, if the type has data.
    fn component_row(&self, component: ComponentType, id: u32) -> Option<Range<usize>> {
        let entry = *self.component_registry().get(component as usize)?;
        if entry.size_bytes == 0 || id >= self.max_num_entities() {
            return None;
        }
        let size = entry.size_bytes as usize;
        let start = entry.offset as usize + ARRAY_HEADER_SIZE + id as usize * size;
        Some(start..start + size)
    }

    /// Entity must be valid; component must be a user type of this block.
    fn check_component(
        &self,
        entity: Entity,
        component: ComponentType,
    ) -> Result<RegistryEntry, EcsError> {
        if !self.check_entity_valid(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let num_component_types = self.num_component_types();
        if component == ACTIVE_COMPONENT || component >= num_component_types {
            return Err(EcsError::UnknownComponent {
                component,
                num_component_types,
            });
        }
        Ok(self.component_registry()[component as usize])
    }

    /// Row range for a present, sized component of a valid entity.
    fn present_row(
        &self,
        entity: Entity,
        component: ComponentType,
    ) -> Result<Range<usize>, EcsError> {
        self.check_component(entity, component)?;
        if !self.entity_masks()[entity.id() as usize].has(component) {
            return Err(EcsError::MissingComponent { entity, component });
        }
        self.component_row(component, entity.id())
            .ok_or(EcsError::TypeMismatch)
    }

    /// Raw bytes of `entity`'s `component`, or `None` if the handle is
    /// stale, the component is absent, or the type has no data.
    pub fn component_untyped(&self, entity: Entity, component: ComponentType) -> Option<&[u8]> {
        let row = self.present_row(entity, component).ok()?;
        Some(&self.bytes()[row])
    }

    pub fn component<T: Pod>(
        &self,
        entity: Entity,
        component: ComponentType,
    ) -> Result<&T, EcsError> {
        let row = self.present_row(entity, component)?;
        bytemuck::try_from_bytes(&self.bytes()[row]).map_err(|_| EcsError::TypeMismatch)
    }

    /// The whole array of `component`, indexed by entity id. Rows of
    /// entities without the component are zero.
    pub fn components<T: Pod>(&self, component: ComponentType) -> Result<&[T], EcsError> {
        let range = self.component_array_range::<T>(component)?;
        bytemuck::try_cast_slice(&self.bytes()[range]).map_err(|_| EcsError::TypeMismatch)
    }

    fn component_array_range<T: Pod>(
        &self,
        component: ComponentType,
    ) -> Result<Range<usize>, EcsError> {
        let size = self.component_size(component)?;
        if size == 0 || size as usize != std::mem::size_of::<T>() {
            return Err(EcsError::TypeMismatch);
        }
        let offset = self.component_registry()[component as usize].offset;
        Ok(array_data_range(self.bytes(), offset))
    }

    fn singleton_range(&self, index: u32) -> Result<Range<usize>, EcsError> {
        let entry = self
            .singleton_registry()
            .get(index as usize)
            .ok_or(EcsError::UnknownSingleton {
                index,
                num_singletons: self.num_singletons(),
            })?;
        let start = entry.offset as usize;
        Ok(start..start + entry.size_bytes as usize)
    }

    pub fn singleton_untyped(&self, index: u32) -> Result<&[u8], EcsError> {
        let range = self.singleton_range(index)?;
        Ok(&self.bytes()[range])
    }

    pub fn singleton<T: Pod>(&self, index: u32) -> Result<&T, EcsError> {
        bytemuck::try_from_bytes(self.singleton_untyped(index)?).map_err(|_| EcsError::TypeMismatch)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> GameState<B> {
    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.storage.as_mut()
    }

    #[inline]
    fn header_mut(&mut self) -> &mut GameStateHeader {
        header_mut(self.bytes_mut())
    }

    fn entity_masks_mut(&mut self) -> &mut [ComponentMask] {
        let offset = self.header().offset_entity_masks;
        array_data_mut(self.bytes_mut(), offset)
    }

    fn entity_generations_mut(&mut self) -> &mut [u8] {
        let offset = self.header().offset_entity_generations;
        array_data_mut(self.bytes_mut(), offset)
    }

    /// Pop an id off the free stack and mark it active with no components.
    /// `None` once all `max_num_entities` ids are in use.
    pub fn create_entity(&mut self) -> Option<Entity> {
        let offset = self.header().offset_free_entity_ids;
        let bytes = self.bytes_mut();
        let free = array_header(bytes, offset).size;
        if free == 0 {
            let max_num_entities = self.max_num_entities();
            warn!(max_num_entities, "no free entity ids left");
            return None;
        }
        let id = array_data::<u32>(bytes, offset)[free as usize - 1];
        array_header_mut(bytes, offset).size = free - 1;

        self.entity_masks_mut()[id as usize] = ComponentMask::ACTIVE;
        self.header_mut().current_num_entities += 1;
        Some(Entity::new(id, self.entity_generations()[id as usize]))
    }

    /// Delete `entity` if the handle is valid.
    pub fn delete_entity(&mut self, entity: Entity) -> bool {
        if !self.check_entity_valid(entity) {
            return false;
        }
        self.delete_entity_by_id(entity.id())
    }

    /// Delete whatever entity currently occupies `id`, ignoring
    /// generations. Zeroes its component rows, clears its mask, bumps its
    /// generation and returns the id to the free stack.
    pub fn delete_entity_by_id(&mut self, id: u32) -> bool {
        match self.entity_mask(id) {
            Some(mask) if mask.is_active() => {}
            _ => return false,
        }

        for component in 1..self.num_component_types() {
            if let Some(row) = self.component_row(component, id) {
                self.bytes_mut()[row].fill(0);
            }
        }
        self.entity_masks_mut()[id as usize] = ComponentMask::EMPTY;
        let generation = &mut self.entity_generations_mut()[id as usize];
        *generation = next_generation(*generation);

        let offset = self.header().offset_free_entity_ids;
        let bytes = self.bytes_mut();
        let free = array_header(bytes, offset).size;
        array_data_mut::<u32>(bytes, offset)[free as usize] = id;
        array_header_mut(bytes, offset).size = free + 1;

        self.header_mut().current_num_entities -= 1;
        true
    }

    /// New entity with `entity`'s mask and a byte copy of each of its sized
    /// components. `None` if `entity` is not valid or no id is free.
    pub fn clone_entity(&mut self, entity: Entity) -> Option<Entity> {
        if !self.check_entity_valid(entity) {
            return None;
        }
        let clone = self.create_entity()?;
        let mask = self.entity_masks()[entity.id() as usize];
        self.entity_masks_mut()[clone.id() as usize] = mask;

        for component in mask.types().filter(|&c| c != ACTIVE_COMPONENT) {
            let rows = (
                self.component_row(component, entity.id()),
                self.component_row(component, clone.id()),
            );
            if let (Some(from), Some(to)) = rows {
                self.bytes_mut().copy_within(from, to.start);
            }
        }
        Some(clone)
    }

    /// Copy `data` into `entity`'s row and set the component bit. `data`
    /// must be exactly the registered size.
    pub fn add_component_untyped(
        &mut self,
        entity: Entity,
        component: ComponentType,
        data: &[u8],
    ) -> Result<(), EcsError> {
        let entry = self.check_component(entity, component)?;
        if data.len() != entry.size_bytes as usize {
            warn!(
                %entity,
                component,
                expected = entry.size_bytes,
                provided = data.len(),
                "component size mismatch"
            );
            return Err(EcsError::ComponentSizeMismatch {
                component,
                expected: entry.size_bytes,
                provided: data.len(),
            });
        }
        if let Some(row) = self.component_row(component, entity.id()) {
            self.bytes_mut()[row].copy_from_slice(data);
        }
        self.entity_masks_mut()[entity.id() as usize].set(component, true);
        Ok(())
    }

    pub fn add_component<T: Pod>(
        &mut self,
        entity: Entity,
        component: ComponentType,
        value: &T,
    ) -> Result<(), EcsError> {
        self.add_component_untyped(entity, component, bytemuck::bytes_of(value))
    }

    /// Set or clear a flag component (one registered with size 0).
    pub fn set_component_unsized(
        &mut self,
        entity: Entity,
        component: ComponentType,
        present: bool,
    ) -> Result<(), EcsError> {
        let entry = self.check_component(entity, component)?;
        if entry.size_bytes != 0 {
            return Err(EcsError::ComponentIsSized { component });
        }
        self.entity_masks_mut()[entity.id() as usize].set(component, present);
        Ok(())
    }

    /// Clear the component bit and zero the row. Removing a component the
    /// entity does not have is not an error.
    pub fn delete_component(
        &mut self,
        entity: Entity,
        component: ComponentType,
    ) -> Result<(), EcsError> {
        self.check_component(entity, component)?;
        self.entity_masks_mut()[entity.id() as usize].set(component, false);
        if let Some(row) = self.component_row(component, entity.id()) {
            self.bytes_mut()[row].fill(0);
        }
        Ok(())
    }

    pub fn component_untyped_mut(
        &mut self,
        entity: Entity,
        component: ComponentType,
    ) -> Option<&mut [u8]> {
        let row = self.present_row(entity, component).ok()?;
        Some(&mut self.bytes_mut()[row])
    }

    pub fn component_mut<T: Pod>(
        &mut self,
        entity: Entity,
        component: ComponentType,
    ) -> Result<&mut T, EcsError> {
        let row = self.present_row(entity, component)?;
        bytemuck::try_from_bytes_mut(&mut self.bytes_mut()[row]).map_err(|_| EcsError::TypeMismatch)
    }

    pub fn components_mut<T: Pod>(
        &mut self,
        component: ComponentType,
    ) -> Result<&mut [T], EcsError> {
        let range = self.component_array_range::<T>(component)?;
        bytemuck::try_cast_slice_mut(&mut self.bytes_mut()[range])
            .map_err(|_| EcsError::TypeMismatch)
    }

    pub fn singleton_untyped_mut(&mut self, index: u32) -> Result<&mut [u8], EcsError> {
        let range = self.singleton_range(index)?;
        Ok(&mut self.bytes_mut()[range])
    }

    pub fn singleton_mut<T: Pod>(&mut self, index: u32) -> Result<&mut T, EcsError> {
        bytemuck::try_from_bytes_mut(self.singleton_untyped_mut(index)?)
            .map_err(|_| EcsError::TypeMismatch)
    }
}

impl<B: AsRef<[u8]>> fmt::Debug for GameState<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameState")
            .field("state_size", &self.state_size())
            .field("num_singletons", &self.num_singletons())
            .field("num_component_types", &self.num_component_types())
            .field("max_num_entities", &self.max_num_entities())
            .field("current_num_entities", &self.current_num_entities())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
