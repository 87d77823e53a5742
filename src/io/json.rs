//! JSON serialisation of statistics results.
//!
//! Non-finite doubles (histogram bounds of infinite values, NaN means) are
//! written as the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.

use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::statistics::DatasetFeatureStatisticsList;

/// Pretty-printed JSON for a result collection.
///
/// # Errors
/// Fails only if serialisation fails.
pub fn statistics_to_json_string(stats: &DatasetFeatureStatisticsList) -> Result<String> {
    serde_json::to_string_pretty(stats).context("serialize statistics")
}

/// Write a result collection as pretty JSON. Parent directories are created
/// as needed.
///
/// # Errors
/// Returns an error if the file or its directories cannot be created, or the
/// write fails.
pub fn write_statistics_json(path: impl AsRef<Path>, stats: &DatasetFeatureStatisticsList) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, stats)
        .with_context(|| format!("write statistics to {}", path.display()))?;
    w.write_all(b"\n")?;
    w.flush().with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

/// Read a result collection written by [`write_statistics_json`].
///
/// # Errors
/// Returns an error if the file cannot be opened or does not parse.
pub fn read_statistics_json(path: impl AsRef<Path>) -> Result<DatasetFeatureStatisticsList> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse statistics JSON in {}", path.display()))
}
