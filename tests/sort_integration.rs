//! In-memory and two-pass sort around the pool capacity boundary.


use blockdb::catalog::Schema;
use blockdb::datum::{Field, FieldType};
use blockdb::engine::{Engine, ErrorKind};
use blockdb::executor::{
    ExecutorError, Expression, SelectStatement, TempScope, sort, sort_into, sort_to_relation,
};
use blockdb::storage::{MemoryStorage, PoolError};
use blockdb::tuple::Tuple;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use query_test_support::{assert_clean, id_rows, id_schema, ints, memory_engine};

/// Two `(id INT)` tuples per block.
const BLOCK: usize = 21;
const SLOTS: usize = 4;
/// Tuples that fit in the pool at once.
const POOL_TUPLES: usize = SLOTS * 2;

fn random_ids(n: usize, seed: u64) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-50..50)).collect()
}

fn engine_with(ids: &[i64]) -> Engine<MemoryStorage> {
    let engine = memory_engine(SLOTS, BLOCK);
    engine.create_table("R", id_schema()).unwrap();
    engine.insert("R", id_rows(ids)).unwrap();
    engine
}

/// Sorts R on `id`, returning whether it stayed resident and the tuples.
fn sort_r(engine: &Engine<MemoryStorage>) -> (bool, Vec<Tuple>) {
    let ctx = engine.ctx();
    let mut scope = TempScope::new(engine.catalog());
    let relation = engine.catalog().relation("R").unwrap();
    let sorted = sort(&ctx, &mut scope, &relation, "id").unwrap();
    (sorted.is_resident(), sorted.tuples(&ctx).unwrap())
}

#[test]
fn test_sort_around_pool_capacity() {
    for (n, resident) in [
        (POOL_TUPLES - 1, true),
        (POOL_TUPLES, true),
        (POOL_TUPLES + 1, false),
    ] {
        let ids = random_ids(n, n as u64);
        let engine = engine_with(&ids);
        let (was_resident, tuples) = sort_r(&engine);

        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(was_resident, resident, "{} tuples", n);
        assert_eq!(ints(&tuples, 0), expected, "{} tuples", n);
        assert_clean(&engine);
    }
}

#[test]
fn test_streaming_sort_merges_one_more_run() {
    // 15 blocks in 4 slots: 4 runs, which leaves no output slot.
    let ids = random_ids(30, 99);
    let engine = engine_with(&ids);
    let ctx = engine.ctx();
    let relation = engine.catalog().relation("R").unwrap();

    {
        let mut scope = TempScope::new(engine.catalog());
        let err = sort_to_relation(&ctx, &mut scope, &relation, "id").unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::ResourceExhausted(PoolError::Exhausted {
                requested: 5,
                available: 4
            })
        ));
    }
    assert_clean(&engine);

    let mut streamed = Vec::new();
    {
        let mut scope = TempScope::new(engine.catalog());
        let n = sort_into(&ctx, &mut scope, &relation, "id", &mut |t| {
            streamed.push(t);
            Ok(())
        })
        .unwrap();
        assert_eq!(n, ids.len());
    }
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(ints(&streamed, 0), expected);
    assert_clean(&engine);

    // ORDER BY at the root takes the streaming path too.
    let stmt = SelectStatement::new(["R"]).order_by("id");
    assert_eq!(ints(&engine.select_rows(&stmt).unwrap(), 0), expected);

    // Under a projection the sort is still at the root of the stream.
    let stmt = SelectStatement::new(["R"]).project(["id"]).order_by("id");
    assert_eq!(ints(&engine.select_rows(&stmt).unwrap(), 0), expected);
}

#[test]
fn test_too_many_runs_is_resource_exhausted() {
    // 25 blocks in 4 slots: 7 runs.
    let engine = engine_with(&random_ids(50, 5));
    let stmt = SelectStatement::new(["R"]).order_by("id");
    let err = engine.select_rows(&stmt).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert_clean(&engine);
}

#[test]
fn test_sort_is_stable_on_both_paths() {
    // (k INT, s STR20): two tuples per 60-byte block.
    let schema = Schema::from_pairs([("k", FieldType::Integer), ("s", FieldType::Str20)]).unwrap();
    for slots in [3, 8] {
        let engine = memory_engine(slots, 60);
        engine.create_table("T", schema.clone()).unwrap();
        let rows: Vec<Vec<Field>> = (0..10)
            .map(|i| vec![Field::Int(i % 3), Field::from(format!("v{}", i))])
            .collect();
        engine.insert("T", rows).unwrap();

        let stmt = SelectStatement::new(["T"]).order_by("k");
        let sorted = engine.select_rows(&stmt).unwrap();
        let labels: Vec<String> = sorted
            .iter()
            .map(|t| t.fields()[1].as_text().unwrap().to_string())
            .collect();
        assert_eq!(
            labels,
            ["v0", "v3", "v6", "v9", "v1", "v4", "v7", "v2", "v5", "v8"],
            "{} slots",
            slots
        );
        assert_clean(&engine);
    }
}

#[test]
fn test_sort_empty_relation() {
    let engine = engine_with(&[]);
    let (resident, tuples) = sort_r(&engine);
    assert!(resident);
    assert!(tuples.is_empty());
    assert_clean(&engine);
}

#[test]
fn test_sort_unknown_column() {
    let engine = engine_with(&[3, 1, 2]);
    let ctx = engine.ctx();
    let mut scope = TempScope::new(engine.catalog());
    let relation = engine.catalog().relation("R").unwrap();
    let err = sort_to_relation(&ctx, &mut scope, &relation, "missing").unwrap_err();
    assert!(matches!(err, ExecutorError::Schema(_)));
}

#[test]
fn test_sort_skips_deleted_rows() {
    let ids = random_ids(20, 11);
    let engine = engine_with(&ids);
    let predicate = Expression::parse("id 0 <").unwrap();
    engine.delete("R", Some(&predicate)).unwrap();

    let (_, tuples) = sort_r(&engine);
    let mut expected: Vec<i64> = ids.into_iter().filter(|&id| id >= 0).collect();
    expected.sort();
    assert_eq!(ints(&tuples, 0), expected);
}
