//! Universal invariants the query engine must uphold across every storage
//! mode and operator. Some are checked as properties across randomized
//! inputs; the rest are checked against concrete fixtures chosen to
//! exercise the property directly.

mod common;

use common::{fields, CollectingSink, TestEngines};
use duoq::aggregate::AggFn;
use duoq::operators::{Direction, QueryEngine};
use duoq::store::relational;
use duoq::value::Scalar;
use proptest::prelude::*;

fn load_rows(engines: &TestEngines, rows: &[(i32, String)]) {
    let ingest = engines.relational.config.ingest_dir.clone();
    std::fs::create_dir_all(&ingest).unwrap();
    let mut csv_text = String::from("id,name\n");
    for (id, name) in rows {
        csv_text.push_str(&format!("{id},{name}\n"));
    }
    std::fs::write(ingest.join("r.csv"), csv_text).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Round-trip: `load` then a full projection emits exactly the rows in
    /// the source file, ignoring order. The id column is kept non-negative
    /// so every generated value parses as a digit-only token and the table's
    /// first-row type inference lands on `Int`, matching this test's
    /// `Scalar::Int` destructure; a leading `-` makes a token `Text` instead
    /// (see the literal-parsing rule in `value.rs`), which is a distinct
    /// behavior covered elsewhere, not this round-trip check.
    #[test]
    fn round_trip_load_then_project_returns_every_source_row(rows in proptest::collection::vec((0i32..i32::MAX, "[a-zA-Z]{1,8}"), 1..12)) {
        let engines = TestEngines::new(4);
        load_rows(&engines, &rows);

        let mut sink = CollectingSink::default();
        engines.relational.load_csv("r.csv", &mut sink);
        prop_assert!(sink.diagnostics.is_empty());

        let mut out = CollectingSink::default();
        engines.relational.projection("r", &["*".to_string()], &mut out);

        let mut expected: Vec<(i64, String)> = rows.iter().map(|(id, name)| (*id as i64, name.clone())).collect();
        let mut actual: Vec<(i64, String)> = out
            .rows
            .iter()
            .map(|row| {
                let Scalar::Int(id) = row[0] else { unreachable!() };
                let Scalar::Text(name) = row[1].clone() else { unreachable!() };
                (id, name)
            })
            .collect();
        expected.sort();
        actual.sort();
        prop_assert_eq!(expected, actual);
    }

    /// Chunk layout after an arbitrary sequence of inserts and a delete:
    /// chunks stay numbered contiguously from 0, and the surviving rows are
    /// exactly those that don't match the delete condition. Chunk rewriting
    /// on delete truncates and rewrites each chunk file independently, with
    /// no merging across chunks, so a delete that only partially matches an
    /// interior chunk can legitimately leave that chunk under-full — this
    /// test does not assert fullness for non-last chunks after a delete;
    /// `append_fills_then_rolls_chunks` in `store/relational.rs` already
    /// covers the "chunks fill before rolling over" behavior for the
    /// insert-only case.
    #[test]
    fn chunk_numbering_stays_contiguous_after_inserts_and_a_delete(
        inserted in proptest::collection::vec(1i64..1000, 1..20),
        delete_threshold in 1i64..1000,
    ) {
        let engines = TestEngines::new(3);
        let mut sink = CollectingSink::default();
        engines.relational.create_table("t", &fields(&["id"]), &mut sink);
        for v in &inserted {
            engines.relational.insert("t", &format!("id={v}"), &mut sink);
        }
        engines.relational.delete("t", &format!("id>={delete_threshold}"), &mut sink);
        prop_assert!(sink.diagnostics.is_empty());

        let root = engines.relational.config.relational_root();
        let chunks = relational::chunks(&root, "t").unwrap();
        for (i, path) in chunks.iter().enumerate() {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            prop_assert_eq!(name, format!("chunk_{i}.csv"));
        }

        let schema_types = relational::read_schema(&root, "t").unwrap().types.unwrap();
        let mut remaining: Vec<i64> = chunks
            .iter()
            .flat_map(|c| relational::read_chunk(c, &schema_types).unwrap())
            .map(|row| match row[0] {
                Scalar::Int(v) => v,
                _ => unreachable!(),
            })
            .collect();
        let mut expected: Vec<i64> = inserted.iter().copied().filter(|v| *v < delete_threshold).collect();
        remaining.sort();
        expected.sort();
        prop_assert_eq!(remaining, expected);
    }

    /// Sort totality: ascending sort emits non-decreasing keys and the same
    /// multiset as an unsorted full projection. Keys are kept non-negative so
    /// every generated value is a digit-only token and the `k` column's
    /// first-row type inference lands on `Int`, matching this test's
    /// `Scalar::Int` match arm (a leading `-` would infer `Text` instead; see
    /// the literal-parsing rule in `value.rs`, exercised separately by the
    /// mixed-key ordering test).
    #[test]
    fn ascending_sort_is_non_decreasing_and_preserves_the_multiset(values in proptest::collection::vec(0i64..1000, 1..20)) {
        let engines = TestEngines::new(4);
        let mut sink = CollectingSink::default();
        engines.relational.create_table("t", &fields(&["k"]), &mut sink);
        for v in &values {
            engines.relational.insert("t", &format!("k={v}"), &mut sink);
        }

        let mut sorted_sink = CollectingSink::default();
        engines.relational.order("t", "k", Direction::Asc, &mut sorted_sink);
        let sorted_values: Vec<i64> = sorted_sink
            .rows
            .iter()
            .map(|r| match r[0] { Scalar::Int(v) => v, _ => unreachable!() })
            .collect();

        let mut is_sorted = true;
        for w in sorted_values.windows(2) {
            if w[0] > w[1] {
                is_sorted = false;
            }
        }
        prop_assert!(is_sorted);

        let mut expected = values.clone();
        expected.sort();
        let mut actual = sorted_values;
        actual.sort();
        prop_assert_eq!(expected, actual);
    }
}

/// Idempotent drop: dropping an already-dropped table reports `NotFound`
/// and leaves no files behind.
#[test]
fn dropping_a_dropped_table_reports_not_found() {
    let engines = TestEngines::new(4);
    let mut sink = CollectingSink::default();
    engines.relational.create_table("t", &fields(&["id"]), &mut sink);
    engines.relational.drop_table("t", &mut sink);
    assert!(sink.diagnostics.is_empty());
    assert!(!engines.relational.config.relational_root().join("t").exists());

    engines.relational.drop_table("t", &mut sink);
    assert!(matches!(sink.diagnostics.last(), Some(duoq::EngineError::NotFound(_))));
}

/// Group detection: `group T by F` is the sorted set of distinct values.
#[test]
fn group_emits_the_sorted_set_of_distinct_values() {
    let engines = TestEngines::new(10);
    let mut sink = CollectingSink::default();
    engines.relational.create_table("t", &fields(&["f"]), &mut sink);
    for v in ["banana", "apple", "banana", "cherry", "apple"] {
        engines.relational.insert("t", &format!("f={v}"), &mut sink);
    }
    engines.relational.group("t", "f", &mut sink);
    assert_eq!(sink.texts, vec!["apple", "banana", "cherry"]);
}

/// Aggregate correctness against a naive in-memory computation.
#[test]
fn aggregate_total_matches_a_naive_in_memory_sum() {
    let engines = TestEngines::new(3);
    let mut sink = CollectingSink::default();
    engines.relational.create_table("t", &fields(&["v"]), &mut sink);
    let values = [4, 1, 7, 2, 9, 3];
    for v in values {
        engines.relational.insert("t", &format!("v={v}"), &mut sink);
    }
    engines.relational.aggregate_total("t", AggFn::Sum, "v", &mut sink);
    assert_eq!(sink.scalars, vec![Scalar::Int(values.iter().sum())]);
}

/// Mixed-key order: document sort agrees with Text < Numeric, natural
/// order within a category.
#[test]
fn document_sort_places_text_before_numeric_values() {
    let engines = TestEngines::new(10);
    let mut sink = CollectingSink::default();
    engines.document.create_table("t", &[], &mut sink);
    for assignment in ["k=z", "k=-3", "k=2.5", "k=a"] {
        engines.document.insert("t", assignment, &mut sink);
    }
    engines.document.order("t", "k", Direction::Asc, &mut sink);
    let ordered: Vec<Scalar> = sink.docs.iter().map(|d| d["k"].clone()).collect();
    assert_eq!(
        ordered,
        vec![
            Scalar::Text("a".into()),
            Scalar::Text("z".into()),
            Scalar::Int(-3),
            Scalar::Float(2.5),
        ]
    );
}

/// Join symmetry modulo qualification: exactly the matching pairs, with
/// fields qualified by table name.
#[test]
fn join_emits_exactly_the_matching_pairs_qualified_by_table() {
    let engines = TestEngines::new(10);
    let mut sink = CollectingSink::default();
    engines.relational.create_table("l", &fields(&["x"]), &mut sink);
    engines.relational.create_table("r", &fields(&["y"]), &mut sink);
    for v in [1, 2, 2, 3] {
        engines.relational.insert("l", &format!("x={v}"), &mut sink);
    }
    for v in [2, 3, 3, 4] {
        engines.relational.insert("r", &format!("y={v}"), &mut sink);
    }
    engines.relational.join("l", "r", "x=y", &mut sink);
    assert_eq!(sink.header, vec!["l.x", "r.y"]);

    let mut expected = Vec::new();
    for lv in [1, 2, 2, 3] {
        for rv in [2, 3, 3, 4] {
            if lv == rv {
                expected.push((lv, rv));
            }
        }
    }
    let mut actual: Vec<(i64, i64)> = sink
        .rows
        .iter()
        .map(|row| {
            let (Scalar::Int(l), Scalar::Int(r)) = (row[0].clone(), row[1].clone()) else { unreachable!() };
            (l, r)
        })
        .collect();
    expected.sort();
    actual.sort();
    assert_eq!(expected, actual);
}
