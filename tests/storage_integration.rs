//! File-backed storage through the engine.


use std::fs;

use blockdb::catalog::CatalogError;
use blockdb::datum::Field;
use blockdb::engine::{Engine, EngineConfig, EngineError, ErrorKind};
use blockdb::executor::{Expression, SelectStatement};
use blockdb::storage::{FileStorage, Storage};
use tempfile::TempDir;

use query_test_support::{id_name_rows, id_name_schema, init_tracing};

/// Two `(id INT, name STR20)` tuples per block.
const BLOCK: usize = 64;

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_pool_slots(4)
        .with_block_size(BLOCK)
}

fn open(dir: &TempDir) -> Engine<FileStorage> {
    init_tracing();
    Engine::open_dir(dir.path(), config()).unwrap()
}

#[test]
fn test_block_file_layout() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir);
    engine.create_table("people", id_name_schema()).unwrap();
    engine
        .insert("people", id_name_rows(&[(1, "ann"), (2, "bob"), (3, "cy")]))
        .unwrap();

    let bytes = fs::read(dir.path().join("people.blk")).unwrap();
    assert_eq!(bytes.len(), 2 * BLOCK);

    // First record: live flag, INT, then the zero-padded STR20.
    assert_eq!(bytes[0], 1);
    assert_eq!(i64::from_le_bytes(bytes[1..9].try_into().unwrap()), 1);
    assert_eq!(&bytes[9..12], b"ann");
    assert!(bytes[12..29].iter().all(|&b| b == 0));

    // Second record follows directly; the 6 spare bytes stay zero.
    assert_eq!(bytes[29], 1);
    assert_eq!(&bytes[38..41], b"bob");
    assert!(bytes[58..BLOCK].iter().all(|&b| b == 0));

    // Last block: one record, then an empty slot.
    assert_eq!(bytes[BLOCK], 1);
    assert_eq!(&bytes[BLOCK + 9..BLOCK + 11], b"cy");
    assert_eq!(bytes[BLOCK + 29], 0);
}

#[test]
fn test_delete_rewrites_slot_flags() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir);
    engine.create_table("people", id_name_schema()).unwrap();
    engine
        .insert("people", id_name_rows(&[(1, "ann"), (2, "bob")]))
        .unwrap();
    let storage = engine.catalog().storage();
    let relation = engine.catalog().relation("people").unwrap();
    assert_eq!(relation.tuple_count().unwrap(), 2);

    let predicate = Expression::parse("id 2 =").unwrap();
    assert_eq!(engine.delete("people", Some(&predicate)).unwrap(), 1);
    assert_eq!(relation.tuple_count().unwrap(), 1);
    assert_eq!(storage.block_count("people").unwrap(), 1);

    let bytes = fs::read(dir.path().join("people.blk")).unwrap();
    assert_eq!(bytes[0], 1);
    assert_eq!(bytes[29], 0);
}

#[test]
fn test_reopen_and_attach() {
    let dir = TempDir::new().unwrap();
    {
        let engine = open(&dir);
        engine.create_table("R", id_name_schema()).unwrap();
        engine
            .insert("R", id_name_rows(&[(2, "b"), (1, "a"), (3, "c")]))
            .unwrap();
    }

    let engine = open(&dir);
    let err = engine.select_rows(&SelectStatement::new(["R"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    engine.attach_table("R", id_name_schema()).unwrap();
    let rows = engine
        .select_rows(&SelectStatement::new(["R"]).order_by("id"))
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|t| t.fields()[1].as_text().unwrap()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_attach_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir);
    let err = engine.attach_table("ghost", id_name_schema()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Catalog(CatalogError::Storage(_))
    ));
}

#[test]
fn test_temporaries_leave_no_files() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir);
    engine.create_table("R", id_name_schema()).unwrap();
    let rows: Vec<(i64, String)> = (0..12).map(|i| ((i * 7) % 13, format!("n{}", i % 5))).collect();
    let rows: Vec<(i64, &str)> = rows.iter().map(|(id, n)| (*id, n.as_str())).collect();
    engine.insert("R", id_name_rows(&rows)).unwrap();

    // 6 blocks over 4 slots: both statements spill.
    let sorted = engine
        .select_rows(&SelectStatement::new(["R"]).order_by("id"))
        .unwrap();
    assert_eq!(sorted.len(), 12);
    let distinct = engine
        .select_rows(&SelectStatement::new(["R"]).project(["name"]).distinct())
        .unwrap();
    assert_eq!(distinct.len(), 5);

    let files: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files, vec!["R.blk".to_string()]);
}

#[test]
fn test_delete_truncates_file() {
    let dir = TempDir::new().unwrap();
    let engine = open(&dir);
    engine.create_table("R", id_name_schema()).unwrap();
    let rows: Vec<(i64, &str)> = (0..10).map(|i| (i, "x")).collect();
    engine.insert("R", id_name_rows(&rows)).unwrap();
    let storage = engine.catalog().storage();
    assert_eq!(storage.block_count("R").unwrap(), 5);

    let predicate = Expression::parse("id 2 > id 7 < AND NOT").unwrap();
    assert_eq!(engine.delete("R", Some(&predicate)).unwrap(), 6);
    assert_eq!(storage.block_count("R").unwrap(), 2);

    let len = fs::metadata(dir.path().join("R.blk")).unwrap().len();
    assert_eq!(len, 2 * BLOCK as u64);

    let rows = engine.select_rows(&SelectStatement::new(["R"])).unwrap();
    let ids: Vec<Field> = rows.iter().map(|t| t.fields()[0].clone()).collect();
    assert_eq!(ids, [3, 4, 5, 6].map(Field::Int).to_vec());
}
