use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use sfz_ecs::prelude::*;

const POS: ComponentType = 1;
const VEL: ComponentType = 2;
const FROZEN: ComponentType = 3;

fn layout(max: u32) -> GameStateLayout {
    GameStateLayout::new(max)
        .with_component(8)
        .with_component(8)
        .with_component(0)
}

fn populated(max: u32) -> GameState<AlignedBuffer> {
    let mut rng = Pcg64::seed_from_u64(7);
    let mut state = GameState::new(&layout(max)).unwrap();
    for _ in 0..max {
        let e = state.create_entity().unwrap();
        state.add_component(e, POS, &[rng.gen::<f32>(), rng.gen::<f32>()]).unwrap();
        if rng.gen_bool(0.5) {
            state.add_component(e, VEL, &[1.0f32, -1.0]).unwrap();
        }
        if rng.gen_bool(0.1) {
            state.set_component_unsized(e, FROZEN, true).unwrap();
        }
    }
    state
}

fn bench_create_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_delete");
    for &max in &[1_000u32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(max), &max, |b, &max| {
            let mut state = GameState::new(&layout(max)).unwrap();
            b.iter(|| {
                let entities: Vec<Entity> =
                    (0..max).map(|_| state.create_entity().unwrap()).collect();
                for e in entities {
                    state.delete_entity(e);
                }
                black_box(state.current_num_entities())
            });
        });
    }
    group.finish();
}

fn bench_query_update(c: &mut Criterion) {
    let mut state = populated(10_000);
    let query = ComponentMask::from_types(&[POS, VEL]);
    c.bench_function("query_pos_vel_10k", |b| {
        b.iter(|| {
            let moving: Vec<Entity> = state.entities_matching(query).collect();
            for e in moving {
                let vel = *state.component::<[f32; 2]>(e, VEL).unwrap();
                let pos = state.component_mut::<[f32; 2]>(e, POS).unwrap();
                pos[0] += vel[0];
                pos[1] += vel[1];
            }
        });
    });
}

fn bench_clone_entity(c: &mut Criterion) {
    let mut state = populated(5_000);
    let source = state.entities().next().unwrap();
    let rest: Vec<Entity> = state.entities().skip(1).collect();
    for e in rest {
        state.delete_entity(e);
    }
    c.bench_function("clone_entity", |b| {
        b.iter(|| {
            let copy = state.clone_entity(source).unwrap();
            state.delete_entity(copy);
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let state = populated(10_000);
    c.bench_function("snapshot_copy_10k", |b| b.iter(|| black_box(state.to_owned_state())));
    c.bench_function("snapshot_hash_10k", |b| b.iter(|| black_box(state.content_hash())));
}

criterion_group!(
    benches,
    bench_create_delete,
    bench_query_update,
    bench_clone_entity,
    bench_snapshot
);
criterion_main!(benches);
