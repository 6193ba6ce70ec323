use std::collections::HashMap;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::Value;
use uuid::Uuid;

use outline_tree::algorithms::descendant_ids;
use outline_tree::invariants::would_create_cycle;
use outline_tree::models::{NodeId, OutlineNode};

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn synthetic_forest(node_count: usize) -> Vec<OutlineNode> {
    let mut state = 0x1234_5678_9abc_def0u64;
    let ids: Vec<NodeId> = (0..node_count)
        .map(|idx| NodeId(Uuid::from_u128(idx as u128 + 1)))
        .collect();

    let mut next_order: HashMap<Option<NodeId>, u32> = HashMap::new();
    let mut nodes = Vec::with_capacity(node_count);
    for (idx, id) in ids.iter().enumerate() {
        // Parents always point at an earlier node, so the forest is acyclic.
        let parent_id = if idx == 0 || idx % 50 == 0 {
            None
        } else {
            Some(ids[(lcg_next(&mut state) as usize) % idx])
        };
        let entry = next_order.entry(parent_id).or_insert(0);
        *entry += 1;
        nodes.push(OutlineNode {
            id: *id,
            parent_id,
            order: *entry,
            title: "N".to_string(),
            done: false,
            payload: Value::Null,
        });
    }

    nodes
}

fn bench_move_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("move_checks");
    for node_count in [1_000usize, 3_000usize] {
        let nodes = synthetic_forest(node_count);
        let ids: Vec<NodeId> = nodes.iter().map(|node| node.id).collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("would_create_cycle", format!("{node_count}n")),
            &(nodes, ids),
            |b, (nodes, ids)| {
                let mut seed = 42u64;
                b.iter(|| {
                    let moved = ids[(lcg_next(&mut seed) as usize) % ids.len()];
                    let target = ids[(lcg_next(&mut seed) as usize) % ids.len()];
                    black_box(would_create_cycle(nodes, moved, Some(target)));
                });
            },
        );
    }
    group.finish();
}

fn bench_subtree_closures(c: &mut Criterion) {
    let mut group = c.benchmark_group("subtree_closures");
    for node_count in [1_000usize, 3_000usize] {
        let nodes = synthetic_forest(node_count);
        let ids: Vec<NodeId> = nodes.iter().map(|node| node.id).collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("descendant_ids", format!("{node_count}n")),
            &(nodes, ids),
            |b, (nodes, ids)| {
                let mut seed = 7u64;
                b.iter(|| {
                    let root = ids[(lcg_next(&mut seed) as usize) % ids.len()];
                    black_box(descendant_ids(nodes, root));
                });
            },
        );
    }
    group.finish();
}

criterion_group!(structure_checks, bench_move_checks, bench_subtree_closures);
criterion_main!(structure_checks);
