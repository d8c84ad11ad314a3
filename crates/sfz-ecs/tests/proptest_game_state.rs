//! Property tests for game state entity and component operations.
//!
//! Random operation sequences run against a game state and a plain shadow
//! model; after each operation the block must agree with the model.

use proptest::prelude::*;
use sfz_ecs::prelude::*;

const MAX_ENTITIES: u32 = 24;
const VALUE: ComponentType = 1;
const FLAG: ComponentType = 2;
const BLOB: ComponentType = 3;

#[derive(Debug, Clone)]
enum Op {
    Create,
    Delete(usize),
    DeleteStale(usize),
    Clone(usize),
    AddValue(usize, u64),
    RemoveValue(usize),
    SetFlag(usize, bool),
    AddBlob(usize, [u8; 12]),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Create),
        2 => any::<usize>().prop_map(Op::Delete),
        1 => any::<usize>().prop_map(Op::DeleteStale),
        2 => any::<usize>().prop_map(Op::Clone),
        3 => (any::<usize>(), any::<u64>()).prop_map(|(i, v)| Op::AddValue(i, v)),
        1 => any::<usize>().prop_map(Op::RemoveValue),
        2 => (any::<usize>(), any::<bool>()).prop_map(|(i, f)| Op::SetFlag(i, f)),
        1 => (any::<usize>(), any::<[u8; 12]>()).prop_map(|(i, b)| Op::AddBlob(i, b)),
    ]
}

#[derive(Debug, Clone, PartialEq)]
struct ShadowEntity {
    handle: Entity,
    value: Option<u64>,
    flag: bool,
    blob: Option<[u8; 12]>,
}

fn layout() -> GameStateLayout {
    GameStateLayout::new(MAX_ENTITIES)
        .with_singleton(32)
        .with_component(8)
        .with_component(0)
        .with_component(12)
}

fn check_against_model(
    state: &GameState<AlignedBuffer>,
    alive: &[ShadowEntity],
    dead: &[Entity],
) -> Result<(), TestCaseError> {
    prop_assert_eq!(state.current_num_entities() as usize, alive.len());
    prop_assert_eq!(
        state.free_entity_ids().len() + alive.len(),
        MAX_ENTITIES as usize
    );
    for shadow in alive {
        let e = shadow.handle;
        prop_assert!(state.check_entity_valid(e));
        prop_assert_eq!(state.component::<u64>(e, VALUE).ok().copied(), shadow.value);
        prop_assert_eq!(state.has_component(e, FLAG), shadow.flag);
        prop_assert_eq!(
            state.component_untyped(e, BLOB).map(|b| b.to_vec()),
            shadow.blob.map(|b| b.to_vec())
        );
    }
    for e in dead {
        prop_assert!(!state.check_entity_valid(*e));
    }
    prop_assert_eq!(state.entities().count(), alive.len());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    #[test]
    fn random_ops_match_shadow_model(ops in prop::collection::vec(op_strategy(), 1..120)) {
        let mut state = GameState::new(&layout()).unwrap();
        let mut alive: Vec<ShadowEntity> = Vec::new();
        let mut dead: Vec<Entity> = Vec::new();

        for op in ops {
            match op {
                Op::Create => {
                    let created = state.create_entity();
                    if alive.len() < MAX_ENTITIES as usize {
                        let e = created.unwrap();
                        prop_assert!(!alive.iter().any(|s| s.handle.id() == e.id()));
                        alive.push(ShadowEntity {
                            handle: e,
                            value: None,
                            flag: false,
                            blob: None,
                        });
                    } else {
                        prop_assert_eq!(created, None);
                    }
                }
                Op::Delete(i) if !alive.is_empty() => {
                    let shadow = alive.swap_remove(i % alive.len());
                    prop_assert!(state.delete_entity(shadow.handle));
                    dead.push(shadow.handle);
                }
                Op::DeleteStale(i) if !dead.is_empty() => {
                    let before = state.current_num_entities();
                    prop_assert!(!state.delete_entity(dead[i % dead.len()]));
                    prop_assert_eq!(state.current_num_entities(), before);
                }
                Op::Clone(i) if !alive.is_empty() => {
                    let source = alive[i % alive.len()].clone();
                    let cloned = state.clone_entity(source.handle);
                    if alive.len() < MAX_ENTITIES as usize {
                        let handle = cloned.unwrap();
                        alive.push(ShadowEntity { handle, ..source });
                    } else {
                        prop_assert_eq!(cloned, None);
                    }
                }
                Op::AddValue(i, v) if !alive.is_empty() => {
                    let len = alive.len();
                    let shadow = &mut alive[i % len];
                    state.add_component(shadow.handle, VALUE, &v).unwrap();
                    shadow.value = Some(v);
                }
                Op::RemoveValue(i) if !alive.is_empty() => {
                    let len = alive.len();
                    let shadow = &mut alive[i % len];
                    state.delete_component(shadow.handle, VALUE).unwrap();
                    shadow.value = None;
                }
                Op::SetFlag(i, flag) if !alive.is_empty() => {
                    let len = alive.len();
                    let shadow = &mut alive[i % len];
                    state.set_component_unsized(shadow.handle, FLAG, flag).unwrap();
                    shadow.flag = flag;
                }
                Op::AddBlob(i, blob) if !alive.is_empty() => {
                    let len = alive.len();
                    let shadow = &mut alive[i % len];
                    state.add_component_untyped(shadow.handle, BLOB, &blob).unwrap();
                    shadow.blob = Some(blob);
                }
                _ => {}
            }
            check_against_model(&state, &alive, &dead)?;
        }

        // Whatever happened, the block still opens as a valid game state.
        let reopened = GameState::from_bytes(state.as_bytes());
        prop_assert!(reopened.is_ok());
    }

    #[test]
    fn sizing_matches_created_block(
        singletons in prop::collection::vec(0..200u32, 0..6),
        max in 0..500u32,
        components in prop::collection::vec(0..96u32, 0..20),
    ) {
        let layout = GameStateLayout {
            singleton_sizes: singletons,
            max_num_entities: max,
            component_sizes: components,
        };
        let size =
            calc_game_state_size(&layout.singleton_sizes, max, &layout.component_sizes).unwrap();
        let state = GameState::new(&layout).unwrap();
        prop_assert_eq!(state.state_size(), size);
        prop_assert_eq!(state.layout(), layout);
        prop_assert_eq!(size % 16, 0);
    }

    /// A clone is byte-identical at clone time and independent afterwards.
    #[test]
    fn clone_fidelity(value in any::<u64>(), blob in any::<[u8; 12]>(), later in any::<u64>()) {
        let mut state = GameState::new(&layout()).unwrap();
        let src = state.create_entity().unwrap();
        state.add_component(src, VALUE, &value).unwrap();
        state.add_component_untyped(src, BLOB, &blob).unwrap();

        let copy = state.clone_entity(src).unwrap();
        prop_assert_eq!(state.component_untyped(copy, VALUE), state.component_untyped(src, VALUE));
        prop_assert_eq!(state.component_untyped(copy, BLOB), Some(&blob[..]));

        *state.component_mut::<u64>(copy, VALUE).unwrap() = later;
        prop_assert_eq!(*state.component::<u64>(src, VALUE).unwrap(), value);
        state.component_untyped_mut(src, BLOB).unwrap().fill(0);
        prop_assert_eq!(state.component_untyped(copy, BLOB), Some(&blob[..]));
    }
}

#[test]
fn generation_invalidation_survives_reuse() {
    let mut state = GameState::new(&layout()).unwrap();
    let old = state.create_entity().unwrap();
    assert!(state.delete_entity(old));
    let reused = state.create_entity().unwrap();
    assert_eq!(reused.id(), old.id());
    assert!(!state.check_entity_valid(old));
    assert!(state.check_entity_valid(reused));
    assert_eq!(
        state.add_component(old, VALUE, &1u64),
        Err(EcsError::StaleEntity { entity: old })
    );
}
