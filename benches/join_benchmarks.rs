//! Join performance benchmarks: delta probes against growing base relations.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use deltaleap::{Atom, AtomSpec, QueryEngine, QueryPlan, Tuple};

fn user(i: u64) -> Tuple {
    Tuple::new(vec![Atom::id(format!("u{i}")), Atom::str(format!("user-{i}"))])
}

fn order(i: u64, user: u64, amount: i64) -> Tuple {
    Tuple::new(vec![
        Atom::id(format!("o{i}")),
        Atom::id(format!("u{user}")),
        Atom::Int(amount),
    ])
}

fn users_orders_engine(users: u64, orders_per_user: u64) -> QueryEngine {
    let plan = QueryPlan::new(
        ["user_id", "name", "order_id", "amount"],
        vec![
            AtomSpec::new("users", ["user_id", "name"]),
            AtomSpec::new("orders", ["order_id", "user_id", "amount"]),
        ],
    )
    .expect("plan");
    let engine = QueryEngine::new(plan).expect("engine");

    engine
        .insert("users", (0..users).map(user))
        .expect("seed users");
    engine
        .insert(
            "orders",
            (0..users).flat_map(|u| {
                (0..orders_per_user).map(move |k| order(u * orders_per_user + k, u, 100))
            }),
        )
        .expect("seed orders");
    engine.take_output();
    engine
}

/// Steady-state probe cost: insert one order and retract it again, so the
/// base relations keep their size across iterations.
fn bench_order_delta_probe(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_delta_probe");
    for users in [100u64, 1_000, 10_000] {
        let engine = users_orders_engine(users, 4);
        let fresh = order(u64::MAX, users / 2, 999);
        group.bench_with_input(BenchmarkId::from_parameter(users), &users, |b, _| {
            b.iter(|| {
                engine.insert("orders", vec![fresh.clone()]).expect("insert");
                engine.remove("orders", vec![fresh.clone()]).expect("remove");
                engine.take_output();
            });
        });
    }
    group.finish();
}

/// Removing and re-adding a user retracts and re-derives all their orders.
fn bench_user_flap(c: &mut Criterion) {
    let mut group = c.benchmark_group("user_flap");
    for orders_per_user in [1u64, 16, 64] {
        let engine = users_orders_engine(256, orders_per_user);
        let victim = user(128);
        group.bench_with_input(
            BenchmarkId::from_parameter(orders_per_user),
            &orders_per_user,
            |b, _| {
                b.iter(|| {
                    engine.remove("users", vec![victim.clone()]).expect("remove");
                    engine.insert("users", vec![victim.clone()]).expect("insert");
                    engine.take_output();
                });
            },
        );
    }
    group.finish();
}

/// Two-hop self-join growth: each new chain edge extends existing paths.
fn bench_two_hop_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_hop_insert");
    for size in [100i64, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let plan = QueryPlan::new(
                    ["x", "y", "z"],
                    vec![
                        AtomSpec::new("edge", ["x", "y"]),
                        AtomSpec::new("edge", ["y", "z"]),
                    ],
                )
                .expect("plan");
                let engine = QueryEngine::new(plan).expect("engine");
                for i in 0..size {
                    engine
                        .insert(
                            "edge",
                            vec![Tuple::new(vec![Atom::Int(i), Atom::Int(i + 1)])],
                        )
                        .expect("insert");
                }
                engine.take_output();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_order_delta_probe,
    bench_user_flap,
    bench_two_hop_insert
);
criterion_main!(benches);
