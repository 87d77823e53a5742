//! Arrow input: decode an Arrow record batch into a [`RecordBatch`].
//!
//! Each Arrow column becomes one feature. List and large-list columns give
//! one cell per row (a null list is a missing cell, null elements are
//! dropped); plain primitive columns give single-valued cells; a
//! `Null`-typed column is missing everywhere.
//!
//! Value types: signed/unsigned integers decode as `Int`, floats as `Float`,
//! utf8 and binary (regular or large) as `Bytes`.

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch as ArrowRecordBatch;

use crate::types::{FeatureColumn, FeatureValues, RecordBatch};

impl RecordBatch {
    /// Decode an Arrow record batch.
    ///
    /// # Errors
    /// Fails on column value types with no feature-value counterpart.
    pub fn try_from_arrow(batch: &ArrowRecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let mut out = Self::new(batch.num_rows());
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            let cells =
                decode_column(column).with_context(|| format!("decode column `{}`", field.name()))?;
            out.insert_column(field.name().clone(), cells)?;
        }
        Ok(out)
    }
}

fn decode_column(column: &ArrayRef) -> Result<FeatureColumn> {
    match column.data_type() {
        DataType::Null => Ok(vec![None; column.len()]),
        DataType::List(_) => {
            let list = column.as_list::<i32>();
            (0..list.len())
                .map(|row| {
                    if list.is_null(row) {
                        Ok(None)
                    } else {
                        decode_values(&list.value(row)).map(Some)
                    }
                })
                .collect()
        }
        DataType::LargeList(_) => {
            let list = column.as_list::<i64>();
            (0..list.len())
                .map(|row| {
                    if list.is_null(row) {
                        Ok(None)
                    } else {
                        decode_values(&list.value(row)).map(Some)
                    }
                })
                .collect()
        }
        _ => (0..column.len())
            .map(|row| {
                if column.is_null(row) {
                    Ok(None)
                } else {
                    decode_values(&column.slice(row, 1)).map(Some)
                }
            })
            .collect(),
    }
}

fn decode_values(values: &ArrayRef) -> Result<FeatureValues> {
    use DataType as T;
    Ok(match values.data_type() {
        T::Int8 | T::Int16 | T::Int32 | T::Int64 | T::UInt8 | T::UInt16 | T::UInt32 | T::UInt64 => {
            let ints = cast(values, &T::Int64)?;
            FeatureValues::Int(ints.as_primitive::<Int64Type>().iter().flatten().collect())
        }
        T::Float16 | T::Float32 | T::Float64 => {
            let floats = cast(values, &T::Float64)?;
            FeatureValues::Float(floats.as_primitive::<Float64Type>().iter().flatten().collect())
        }
        T::Utf8 | T::LargeUtf8 | T::Binary | T::LargeBinary => {
            let bytes = cast(values, &T::LargeBinary)?;
            FeatureValues::Bytes(
                bytes
                    .as_binary::<i64>()
                    .iter()
                    .flatten()
                    .map(<[u8]>::to_vec)
                    .collect(),
            )
        }
        other => bail!("unsupported Arrow value type {other}"),
    })
}
