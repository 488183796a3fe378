//! Block-nested-loop join against a tuple-at-a-time reference.
//!
//! The join must produce the same multiset of rows whatever the pool size,
//! that is whatever batch of outer blocks fits in memory at once.


use blockdb::engine::Engine;
use blockdb::executor::{
    Expression, JoinSpec, Output, SelectStatement, TempScope, cross_join, scan,
};
use blockdb::storage::MemoryStorage;
use blockdb::tuple::Tuple;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use query_test_support::{assert_clean, id_rows, id_schema, ints, memory_engine};

/// Two `(id INT)` tuples per block; one `(R.id, S.id)` output per block.
const BLOCK: usize = 21;

fn load(engine: &Engine<MemoryStorage>, r: &[i64], s: &[i64]) {
    engine.create_table("R", id_schema()).unwrap();
    engine.create_table("S", id_schema()).unwrap();
    engine.insert("R", id_rows(r)).unwrap();
    engine.insert("S", id_rows(s)).unwrap();
}

fn pairs(tuples: &[Tuple]) -> Vec<(i64, i64)> {
    let mut pairs: Vec<_> = ints(tuples, 0).into_iter().zip(ints(tuples, 1)).collect();
    pairs.sort_unstable();
    pairs
}

fn reference(r: &[i64], s: &[i64], keep: impl Fn(i64, i64) -> bool) -> Vec<(i64, i64)> {
    let mut expected = Vec::new();
    for &a in r {
        for &b in s {
            if keep(a, b) {
                expected.push((a, b));
            }
        }
    }
    expected.sort_unstable();
    expected
}

/// Materializes the join, then reads the output back.
fn join_materialized(engine: &Engine<MemoryStorage>, predicate: &str) -> Vec<Tuple> {
    let ctx = engine.ctx();
    let mut scope = TempScope::new(engine.catalog());
    let r = engine.catalog().relation("R").unwrap();
    let s = engine.catalog().relation("S").unwrap();
    let predicate = Expression::parse(predicate).unwrap();
    let spec = JoinSpec {
        predicate: Some(&predicate),
        ..JoinSpec::default()
    };

    let output = cross_join(&ctx, &mut scope, &r, &s, &spec, Output::Materialize).unwrap();
    let relation = output.relation.unwrap();
    let mut tuples = Vec::new();
    let read = scan(&ctx, &relation, None, &mut |t| {
        tuples.push(t);
        Ok(())
    })
    .unwrap();
    assert_eq!(read, output.rows);
    tuples
}

#[test]
fn test_equi_join_emits_matching_pair() {
    let engine = memory_engine(3, BLOCK);
    load(&engine, &[1, 2], &[2, 3]);

    let stmt = SelectStatement::new(["R", "S"]).filter(Expression::parse("R.id S.id =").unwrap());
    let rows = engine.select_rows(&stmt).unwrap();
    assert_eq!(pairs(&rows), vec![(2, 2)]);
    assert_clean(&engine);
}

#[test]
fn test_output_independent_of_pool_size() {
    let mut rng = StdRng::seed_from_u64(7);
    let r: Vec<i64> = (0..23).map(|_| rng.gen_range(0..8)).collect();
    let s: Vec<i64> = (0..17).map(|_| rng.gen_range(0..8)).collect();
    let expected = reference(&r, &s, |a, b| a == b);
    assert!(!expected.is_empty());

    for slots in 3..=8 {
        let engine = memory_engine(slots, BLOCK);
        load(&engine, &r, &s);

        let materialized = join_materialized(&engine, "R.id S.id =");
        assert_eq!(pairs(&materialized), expected, "materialized, {} slots", slots);

        let stmt =
            SelectStatement::new(["R", "S"]).filter(Expression::parse("R.id S.id =").unwrap());
        let streamed = engine.select_rows(&stmt).unwrap();
        assert_eq!(pairs(&streamed), expected, "streamed, {} slots", slots);
        assert_clean(&engine);
    }
}

#[test]
fn test_arithmetic_predicate() {
    let r = [1, 2, 3, 4, 5];
    let s = [2, 4, 6];
    let engine = memory_engine(4, BLOCK);
    load(&engine, &r, &s);

    let rows = join_materialized(&engine, "R.id 1 + S.id = R.id 2 * S.id = OR");
    let expected = reference(&r, &s, |a, b| a + 1 == b || a * 2 == b);
    assert_eq!(pairs(&rows), expected);
}

#[test]
fn test_join_without_predicate_is_cross_product() {
    let r = [1, 2, 3];
    let s = [10, 20];
    let engine = memory_engine(3, BLOCK);
    load(&engine, &r, &s);

    let rows = engine.select_rows(&SelectStatement::new(["R", "S"])).unwrap();
    assert_eq!(pairs(&rows), reference(&r, &s, |_, _| true));
}

#[test]
fn test_empty_side_yields_nothing() {
    let engine = memory_engine(3, BLOCK);
    load(&engine, &[1, 2, 3], &[]);

    let rows = join_materialized(&engine, "R.id S.id =");
    assert!(rows.is_empty());
    assert_clean(&engine);
}

#[test]
fn test_projection_of_join() {
    let engine = memory_engine(3, BLOCK);
    load(&engine, &[1, 2, 3], &[3, 2]);

    let stmt = SelectStatement::new(["R", "S"])
        .project(["S.id"])
        .filter(Expression::parse("R.id S.id =").unwrap())
        .order_by("S.id");
    let rows = engine.select_rows(&stmt).unwrap();
    assert_eq!(ints(&rows, 0), vec![2, 3]);
    assert!(rows.iter().all(|t| t.fields().len() == 1));
    assert_clean(&engine);
}
