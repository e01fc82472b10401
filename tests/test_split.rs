//! Tests for the seeded train/test split and unseen-level auditing

#[path = "common/mod.rs"]
mod common;

use std::collections::BTreeSet;

use fitflow::error::{DataError, FitflowError};
use fitflow::pipeline::{
    audit_unseen_levels, drop_unseen_rows, initial_split, SplitConfig,
};
use polars::prelude::*;

use common::*;

fn config(prop: f64, seed: u64) -> SplitConfig {
    SplitConfig {
        prop,
        seed,
        strata: None,
    }
}

#[test]
fn test_split_sizes_follow_floor() {
    let df = create_flights_dataframe(101, 1);
    let split = initial_split(&df, &config(0.75, 222)).unwrap();

    assert_eq!(split.train.height(), 75, "floor(101 * 0.75) rows should train");
    assert_eq!(split.test.height(), 26);
}

#[test]
fn test_split_partitions_rows() {
    let df = create_flights_dataframe(200, 1);
    let split = initial_split(&df, &config(0.75, 222)).unwrap();

    let train: BTreeSet<usize> = split.train_rows.iter().copied().collect();
    let test: BTreeSet<usize> = split.test_rows.iter().copied().collect();
    assert!(train.is_disjoint(&test), "A row landed in both partitions");

    let union: BTreeSet<usize> = train.union(&test).copied().collect();
    assert_eq!(union, (0..200).collect::<BTreeSet<_>>(), "Every row belongs to a partition");
}

#[test]
fn test_split_is_deterministic_per_seed() {
    let df = create_flights_dataframe(200, 1);

    let first = initial_split(&df, &config(0.75, 222)).unwrap();
    let second = initial_split(&df, &config(0.75, 222)).unwrap();
    assert_eq!(first.train_rows, second.train_rows);
    assert!(first.train.equals_missing(&second.train));

    let other = initial_split(&df, &config(0.75, 223)).unwrap();
    assert_ne!(first.train_rows, other.train_rows, "A new seed should give a new partition");
}

#[test]
fn test_split_keeps_schema() {
    let df = create_flights_dataframe(40, 1);
    let split = initial_split(&df, &config(0.5, 1)).unwrap();

    assert_eq!(schema_of(&split.train), schema_of(&df));
    assert_eq!(schema_of(&split.test), schema_of(&df));
}

#[test]
fn test_split_rejects_invalid_fraction() {
    let df = create_flights_dataframe(10, 1);
    for prop in [0.0, 1.0, -0.5, 1.5] {
        let err = initial_split(&df, &config(prop, 1)).unwrap_err();
        assert!(
            matches!(err, FitflowError::Data(DataError::InvalidFraction(_))),
            "prop {} should be rejected, got {:?}",
            prop,
            err
        );
    }
}

#[test]
fn test_split_rejects_empty_partition() {
    let df = create_flights_dataframe(2, 1);
    let err = initial_split(&df, &config(0.4, 1)).unwrap_err();
    assert!(matches!(err, FitflowError::Data(DataError::EmptyPartition("training"))));
}

#[test]
fn test_stratified_split_keeps_group_shares() {
    let df = df! {
        "id" => (0..40i64).collect::<Vec<_>>(),
        "class" => (0..40).map(|i| if i < 8 { "rare" } else { "common" }).collect::<Vec<_>>(),
    }
    .unwrap();
    let split = initial_split(
        &df,
        &SplitConfig {
            prop: 0.75,
            seed: 9,
            strata: Some("class".to_string()),
        },
    )
    .unwrap();

    let rare_in_train = split.train_rows.iter().filter(|&&r| r < 8).count();
    assert_eq!(rare_in_train, 6, "floor(8 * 0.75) rare rows should train");
    assert_eq!(split.train.height(), 30);
}

#[test]
fn test_unseen_levels_audit_and_drop() {
    let train = df! {
        "dest" => ["ATL", "BOS", "ATL"],
        "carrier" => ["AA", "AA", "DL"],
    }
    .unwrap();
    let test = df! {
        "dest" => ["ATL", "LEX", "LEX", "BOS"],
        "carrier" => ["AA", "AA", "UA", "DL"],
    }
    .unwrap();

    let unseen = audit_unseen_levels(&train, &test, &[]).unwrap();
    assert_eq!(unseen.len(), 2);
    assert_eq!(unseen[0].column, "dest");
    assert_eq!(unseen[0].levels, vec!["LEX"]);
    assert_eq!(unseen[0].rows, 2);
    assert_eq!(unseen[1].column, "carrier");
    assert_eq!(unseen[1].levels, vec!["UA"]);

    let (kept, removed) = drop_unseen_rows(&test, &unseen).unwrap();
    assert_eq!(removed, 2, "Rows 1 and 2 carry an unseen level");
    assert_eq!(kept.height(), 2);
    assert!(audit_unseen_levels(&train, &kept, &[]).unwrap().is_empty());
}
