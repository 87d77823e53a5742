//! Arrow record batches as input.
#![cfg(feature = "io-arrow")]

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch as ArrowRecordBatch;

use featstats::testing::*;
use featstats::{RecordBatch, StatsOptions, generate_statistics};

fn arrow_fixture() -> ArrowRecordBatch {
    let mut a = ListBuilder::new(Float64Builder::new());
    a.values().append_slice(&[1.0, 2.0]);
    a.append(true);
    a.values().append_slice(&[3.0, 4.0, f64::NAN, 5.0]);
    a.append(true);
    a.values().append_value(1.0);
    a.append(true);
    let a = a.finish();
    let city = StringArray::from(vec![Some("Oslo"), None, Some("Lima")]);
    let score = Float64Array::from(vec![Some(0.5), Some(1.5), None]);

    let schema = Schema::new(vec![
        Field::new("a", a.data_type().clone(), true),
        Field::new("city", DataType::Utf8, true),
        Field::new("score", DataType::Float64, true),
    ]);
    let columns: Vec<ArrayRef> = vec![Arc::new(a), Arc::new(city), Arc::new(score)];
    ArrowRecordBatch::try_new(Arc::new(schema), columns).unwrap()
}

#[test]
fn test_arrow_and_builder_inputs_agree() {
    let from_arrow = RecordBatch::try_from_arrow(&arrow_fixture()).unwrap();

    let examples = numeric_examples();
    let built = BatchBuilder::new()
        .example(
            ExampleBuilder::new()
                .values("a", examples[0]["a"].clone().unwrap())
                .strings("city", ["Oslo"])
                .floats("score", [0.5])
                .build(),
        )
        .example(
            ExampleBuilder::new()
                .values("a", examples[1]["a"].clone().unwrap())
                .missing("city")
                .floats("score", [1.5])
                .build(),
        )
        .example(
            ExampleBuilder::new()
                .values("a", examples[2]["a"].clone().unwrap())
                .strings("city", ["Lima"])
                .missing("score")
                .build(),
        )
        .build();

    let options = StatsOptions::default();
    let left = generate_statistics([from_arrow], &options).unwrap();
    let right = generate_statistics([built], &options).unwrap();
    assert_eq!(left.datasets.len(), 1);
    let (l, r) = (&left.datasets[0], &right.datasets[0]);
    assert_eq!(l.num_examples, r.num_examples);
    for name in ["a", "city", "score"] {
        let (lf, rf) = (expect_feature(l, name), expect_feature(r, name));
        assert_eq!(lf.feature_type, rf.feature_type, "{name}");
        assert_eq!(lf.common_stats(), rf.common_stats(), "{name}");
        assert_eq!(lf.string_stats, rf.string_stats, "{name}");
    }
    let (ln, rn) = (
        expect_feature(l, "a").num_stats.as_ref().unwrap(),
        expect_feature(r, "a").num_stats.as_ref().unwrap(),
    );
    assert_eq!(ln.mean, rn.mean);
    assert_eq!(ln.histograms, rn.histograms);
}

#[test]
fn test_unsupported_arrow_types_are_rejected() {
    let flags = arrow::array::BooleanArray::from(vec![true, false]);
    let schema = Schema::new(vec![Field::new("flag", DataType::Boolean, false)]);
    let columns: Vec<ArrayRef> = vec![Arc::new(flags)];
    let batch = ArrowRecordBatch::try_new(Arc::new(schema), columns).unwrap();
    let err = RecordBatch::try_from_arrow(&batch).unwrap_err();
    assert!(format!("{err:#}").contains("flag"));
}
