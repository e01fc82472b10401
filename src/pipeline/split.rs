//! Reproducible train/test partitioning and unseen-level auditing

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::columns::{is_categorical, require_column, string_values};
use crate::error::{DataError, Result};

/// Configuration for `initial_split`
#[derive(Debug, Clone, Serialize)]
pub struct SplitConfig {
    /// Fraction of rows assigned to training, in (0, 1)
    pub prop: f64,
    pub seed: u64,
    /// Optional categorical column to stratify on
    pub strata: Option<String>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            prop: 0.75,
            seed: 222,
            strata: None,
        }
    }
}

/// A train/test partition of one record set
#[derive(Debug, Clone)]
pub struct Split {
    pub train: DataFrame,
    pub test: DataFrame,
    /// Original row indices of the training rows, ascending
    pub train_rows: Vec<usize>,
    /// Original row indices of the testing rows, ascending
    pub test_rows: Vec<usize>,
}

/// Partition rows into training and testing sets.
///
/// `floor(n * prop)` rows go to training, chosen by shuffling the row
/// indices with a generator seeded from `seed`. Both partitions keep the
/// original row order.
pub fn initial_split(df: &DataFrame, config: &SplitConfig) -> Result<Split> {
    if !(config.prop > 0.0 && config.prop < 1.0) {
        return Err(DataError::InvalidFraction(config.prop).into());
    }

    let mut rng = StdRng::seed_from_u64(config.seed);

    let groups: Vec<Vec<usize>> = match &config.strata {
        None => vec![(0..df.height()).collect()],
        Some(strata) => strata_groups(df, strata)?,
    };

    let mut train_rows = Vec::new();
    let mut test_rows = Vec::new();
    for mut rows in groups {
        let n_train = (rows.len() as f64 * config.prop).floor() as usize;
        rows.shuffle(&mut rng);
        train_rows.extend_from_slice(&rows[..n_train]);
        test_rows.extend_from_slice(&rows[n_train..]);
    }
    train_rows.sort_unstable();
    test_rows.sort_unstable();

    if train_rows.is_empty() {
        return Err(DataError::EmptyPartition("training").into());
    }
    if test_rows.is_empty() {
        return Err(DataError::EmptyPartition("testing").into());
    }

    debug!(
        "Split {} rows into {} training / {} testing (seed {})",
        df.height(),
        train_rows.len(),
        test_rows.len(),
        config.seed
    );

    Ok(Split {
        train: take_rows(df, &train_rows)?,
        test: take_rows(df, &test_rows)?,
        train_rows,
        test_rows,
    })
}

fn strata_groups(df: &DataFrame, strata: &str) -> Result<Vec<Vec<usize>>> {
    let values = string_values(df, strata)?;
    let mut groups: BTreeMap<Option<String>, Vec<usize>> = BTreeMap::new();
    for (row, value) in values.into_iter().enumerate() {
        groups.entry(value).or_default().push(row);
    }
    Ok(groups.into_values().collect())
}

/// Gather rows by index into a new DataFrame
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = rows.iter().map(|&r| r as IdxSize).collect();
    Ok(df.take(&IdxCa::from_vec("idx".into(), idx))?)
}

/// Levels of one column that occur in testing data but never in training
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnseenLevels {
    pub column: String,
    pub levels: Vec<String>,
    /// Number of testing rows carrying one of these levels
    pub rows: usize,
}

/// Report categorical levels present only in the testing partition.
///
/// With `columns` empty, every categorical column of `train` is audited.
pub fn audit_unseen_levels(
    train: &DataFrame,
    test: &DataFrame,
    columns: &[&str],
) -> Result<Vec<UnseenLevels>> {
    let audited: Vec<String> = if columns.is_empty() {
        train
            .get_columns()
            .iter()
            .filter(|c| is_categorical(c.dtype()))
            .map(|c| c.name().to_string())
            .collect()
    } else {
        columns.iter().map(|c| c.to_string()).collect()
    };

    let mut report = Vec::new();
    for column in audited {
        require_column(test, &column)?;
        let seen: BTreeSet<String> = string_values(train, &column)?.into_iter().flatten().collect();
        let test_values = string_values(test, &column)?;

        let mut unseen = BTreeSet::new();
        let mut rows = 0;
        for value in test_values.iter().flatten() {
            if !seen.contains(value) {
                unseen.insert(value.clone());
                rows += 1;
            }
        }

        if !unseen.is_empty() {
            report.push(UnseenLevels {
                column,
                levels: unseen.into_iter().collect(),
                rows,
            });
        }
    }
    Ok(report)
}

/// Remove testing rows that carry any audited unseen level.
/// Returns the filtered frame and the number of rows removed.
pub fn drop_unseen_rows(test: &DataFrame, unseen: &[UnseenLevels]) -> Result<(DataFrame, usize)> {
    if unseen.is_empty() {
        return Ok((test.clone(), 0));
    }

    let mut keep = vec![true; test.height()];
    for entry in unseen {
        let levels: BTreeSet<&str> = entry.levels.iter().map(|s| s.as_str()).collect();
        for (row, value) in string_values(test, &entry.column)?.iter().enumerate() {
            if value.as_deref().is_some_and(|v| levels.contains(v)) {
                keep[row] = false;
            }
        }
    }

    let rows: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect();
    let removed = test.height() - rows.len();
    Ok((take_rows(test, &rows)?, removed))
}
