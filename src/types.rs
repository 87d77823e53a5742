//! Input data model: per-example feature values, examples and record batches.
//!
//! A [`RecordBatch`] is the unit handed to generators. It maps feature names
//! (in first-seen order) to columns of per-example cells, where each cell is
//! `None` when the feature is missing for that example and `Some(values)`
//! otherwise. A present cell may hold zero values; that is distinct from a
//! missing one.

use anyhow::{Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::statistics::FeatureType;

/// The decoded values of one feature in one example.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureValues {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bytes(Vec<Vec<u8>>),
}

/// Primitive kind of a [`FeatureValues`] cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Int,
    Float,
    Bytes,
}

impl FeatureValues {
    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        Self::Int(values.into_iter().collect())
    }

    pub fn floats(values: impl IntoIterator<Item = f64>) -> Self {
        Self::Float(values.into_iter().collect())
    }

    /// UTF-8 strings stored as bytes.
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Bytes(
            values
                .into_iter()
                .map(|s| s.as_ref().as_bytes().to_vec())
                .collect(),
        )
    }

    pub fn bytes<I, B>(values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::Bytes(values.into_iter().map(|b| b.as_ref().to_vec()).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Bytes(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn kind(&self) -> FeatureKind {
        match self {
            Self::Int(_) => FeatureKind::Int,
            Self::Float(_) => FeatureKind::Float,
            Self::Bytes(_) => FeatureKind::Bytes,
        }
    }

    /// Every value rendered as bytes: numbers through their decimal form,
    /// byte strings unchanged. Used for categorical numeric features and
    /// for slice keys.
    #[must_use]
    pub fn to_byte_values(&self) -> Vec<Vec<u8>> {
        match self {
            Self::Int(v) => v.iter().map(|x| x.to_string().into_bytes()).collect(),
            Self::Float(v) => v.iter().map(|x| x.to_string().into_bytes()).collect(),
            Self::Bytes(v) => v.clone(),
        }
    }
}

/// One column of a batch: a cell per example.
pub type FeatureColumn = Vec<Option<FeatureValues>>;

/// A single example: feature name to its (possibly missing) values.
pub type Example = IndexMap<String, Option<FeatureValues>>;

/// Build an [`Example`] from `(name, values)` pairs.
pub fn example<I, S>(cells: I) -> Example
where
    I: IntoIterator<Item = (S, Option<FeatureValues>)>,
    S: Into<String>,
{
    cells.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// A batch of examples in columnar form.
///
/// Immutable once handed to the engine; generators only ever borrow it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordBatch {
    num_rows: usize,
    columns: IndexMap<String, FeatureColumn>,
}

impl RecordBatch {
    /// An empty batch of `num_rows` examples with no features.
    #[must_use]
    pub fn new(num_rows: usize) -> Self {
        Self {
            num_rows,
            columns: IndexMap::new(),
        }
    }

    /// Add (or replace) a column.
    ///
    /// # Errors
    /// Fails if the column length differs from the batch row count.
    pub fn insert_column(&mut self, name: impl Into<String>, column: FeatureColumn) -> Result<()> {
        let name = name.into();
        if column.len() != self.num_rows {
            bail!(
                "column `{name}` has {} cells but the batch has {} rows",
                column.len(),
                self.num_rows
            );
        }
        self.columns.insert(name, column);
        Ok(())
    }

    /// Builder form of [`insert_column`](Self::insert_column).
    ///
    /// # Errors
    /// Fails if the column length differs from the batch row count.
    pub fn with_column(mut self, name: impl Into<String>, column: FeatureColumn) -> Result<Self> {
        self.insert_column(name, column)?;
        Ok(self)
    }

    /// Transpose a slice of examples into a batch. Features are ordered by
    /// first appearance; an example lacking a feature gets a missing cell.
    #[must_use]
    pub fn from_examples(examples: &[Example]) -> Self {
        let num_rows = examples.len();
        let mut columns: IndexMap<String, FeatureColumn> = IndexMap::new();
        for (row, ex) in examples.iter().enumerate() {
            for (name, cell) in ex {
                let column = columns
                    .entry(name.clone())
                    .or_insert_with(|| vec![None; num_rows]);
                column[row].clone_from(cell);
            }
        }
        Self { num_rows, columns }
    }

    #[must_use]
    pub const fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &FeatureColumn)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.get(name)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// The example at `row`, restricted to the features this batch carries.
    #[must_use]
    pub fn example(&self, row: usize) -> Example {
        self.columns
            .iter()
            .map(|(name, col)| (name.clone(), col.get(row).cloned().flatten()))
            .collect()
    }

    /// All rows as examples, in order.
    #[must_use]
    pub fn examples(&self) -> Vec<Example> {
        (0..self.num_rows).map(|row| self.example(row)).collect()
    }

    /// A new batch made of the given rows, in the given order.
    /// Out-of-range rows are skipped.
    #[must_use]
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        let rows: Vec<usize> = rows.iter().copied().filter(|r| *r < self.num_rows).collect();
        Self {
            num_rows: rows.len(),
            columns: self
                .columns
                .iter()
                .map(|(name, col)| (name.clone(), rows.iter().map(|r| col[*r].clone()).collect()))
                .collect(),
        }
    }

    /// Split into consecutive batches of at most `size` rows.
    #[must_use]
    pub fn chunks(&self, size: usize) -> Vec<Self> {
        if size == 0 || self.num_rows <= size {
            return vec![self.clone()];
        }
        (0..self.num_rows)
            .step_by(size)
            .map(|start| {
                let rows: Vec<usize> = (start..(start + size).min(self.num_rows)).collect();
                self.take_rows(&rows)
            })
            .collect()
    }

    /// A copy keeping only the features accepted by `keep`.
    #[must_use]
    pub fn select<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&str) -> bool,
    {
        Self {
            num_rows: self.num_rows,
            columns: self
                .columns
                .iter()
                .filter(|(name, _)| keep(name))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Restrict a batch to an allow-list of feature names.
///
/// An empty allow-list keeps nothing.
#[must_use]
pub fn filter_features(batch: &RecordBatch, allowlist: &[String]) -> RecordBatch {
    batch.select(|name| allowlist.iter().any(|a| a == name))
}

/// Per-kind example counts for one feature.
///
/// Used to resolve the feature's output type deterministically no matter how
/// examples were partitioned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindTally {
    pub int: u64,
    pub float: u64,
    pub bytes: u64,
}

impl KindTally {
    pub fn record(&mut self, kind: FeatureKind) {
        match kind {
            FeatureKind::Int => self.int += 1,
            FeatureKind::Float => self.float += 1,
            FeatureKind::Bytes => self.bytes += 1,
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.int += other.int;
        self.float += other.float;
        self.bytes += other.bytes;
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.int + self.float + self.bytes
    }

    /// Resolve the feature type. A declared (schema) type wins; otherwise
    /// numeric and byte examples compete by count, ties going to STRING.
    #[must_use]
    pub const fn resolve(&self, declared: Option<FeatureType>) -> Option<FeatureType> {
        if let Some(t) = declared {
            return Some(t);
        }
        if self.total() == 0 {
            return None;
        }
        let numeric = self.int + self.float;
        if self.bytes >= numeric {
            Some(FeatureType::String)
        } else if self.float > 0 {
            Some(FeatureType::Float)
        } else {
            Some(FeatureType::Int)
        }
    }

    /// Number of examples whose kind does not fit `resolved`.
    #[must_use]
    pub const fn mismatched(&self, resolved: FeatureType) -> u64 {
        match resolved {
            FeatureType::Int => self.float + self.bytes,
            FeatureType::Float => self.bytes,
            FeatureType::String => self.int + self.float,
        }
    }
}

/// Whether values of `kind` contribute to a feature of type `resolved`.
#[must_use]
pub const fn kind_accepted(resolved: FeatureType, kind: FeatureKind) -> bool {
    matches!(
        (resolved, kind),
        (FeatureType::Int, FeatureKind::Int)
            | (FeatureType::Float, FeatureKind::Int | FeatureKind::Float)
            | (FeatureType::String, FeatureKind::Bytes)
    )
}
