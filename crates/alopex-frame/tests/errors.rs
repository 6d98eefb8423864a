mod common;

use std::sync::Arc;

use alopex_frame::expr::{col, lit};
use alopex_frame::lazy::{DynamicGroupOptions, JoinOptions};
use alopex_frame::{CollectOptions, DataFrame, DataFrameError, Series};
use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use common::{frame, i64s, strs};

#[test]
fn column_not_found_is_reported() {
    let df = frame(vec![i64s("a", vec![Some(1)])]);
    let err = df.column("missing").unwrap_err();
    assert!(matches!(err, DataFrameError::ColumnNotFound { .. }));
    assert!(err.to_string().contains("missing"));

    let err = df.select(vec![col("nope")]).unwrap_err();
    assert!(matches!(err, DataFrameError::ColumnNotFound { .. }));
}

#[test]
fn schema_mismatch_duplicate_column_name() {
    let err = DataFrame::new(vec![i64s("a", vec![Some(1)]), i64s("a", vec![Some(2)])]).unwrap_err();
    assert!(matches!(err, DataFrameError::SchemaMismatch { .. }));
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn duplicate_output_names_are_rejected() {
    let df = frame(vec![i64s("a", vec![Some(1)])]);
    let err = df.select(vec![col("a"), col("a")]).unwrap_err();
    assert!(matches!(err, DataFrameError::SchemaMismatch { .. }));
}

#[test]
fn schema_mismatch_length_mismatch() {
    let err = DataFrame::new(vec![
        i64s("a", vec![Some(1), Some(2)]),
        i64s("b", vec![Some(10)]),
    ])
    .unwrap_err();
    assert!(matches!(err, DataFrameError::SchemaMismatch { .. }));
    assert!(err.to_string().contains("length"));
}

#[test]
fn from_batches_schema_mismatch() {
    let s1 = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, true)]));
    let s2 = Arc::new(Schema::new(vec![Field::new("b", DataType::Int64, true)]));
    let b1 = RecordBatch::try_new(s1, vec![Arc::new(Int64Array::from(vec![1_i64])) as ArrayRef])
        .unwrap();
    let b2 = RecordBatch::try_new(s2, vec![Arc::new(Int64Array::from(vec![2_i64])) as ArrayRef])
        .unwrap();
    let err = DataFrame::from_batches(vec![b1, b2]).unwrap_err();
    assert!(matches!(err, DataFrameError::SchemaMismatch { .. }));
    let msg = err.to_string();
    assert!(msg.contains("batch 0"));
    assert!(msg.contains("batch 1"));
}

#[test]
fn type_mismatch_for_mixed_series_dtypes() {
    let a: ArrayRef = Arc::new(Int64Array::from(vec![1_i64]));
    let b: ArrayRef = Arc::new(Float64Array::from(vec![1.0]));
    let err = Series::from_arrow("x", vec![a, b]).unwrap_err();
    assert!(matches!(err, DataFrameError::TypeMismatch { .. }));
    assert!(err.to_string().contains("expected"));
}

#[test]
fn comparing_strings_with_numbers_is_type_mismatch() {
    let df = frame(vec![strs("s", vec![Some("a")])]);
    let err = df.filter(col("s").gt(lit(1_i64))).unwrap_err();
    assert!(matches!(err, DataFrameError::TypeMismatch { .. }));
}

#[test]
fn one_sided_join_keys_are_rejected_before_execution() {
    let df = frame(vec![i64s("k", vec![Some(1)])]);
    let err = df
        .lazy()
        .join(df.lazy(), JoinOptions::default().with_right_on(["k"]))
        .unwrap_err();
    assert!(matches!(err, DataFrameError::InvalidArgument { .. }));
    assert!(err.to_string().contains("must pass both sides"));
}

#[test]
fn calendar_durations_are_configuration_errors() {
    let df = frame(vec![i64s("t", vec![Some(1)]), i64s("v", vec![Some(1)])]);
    let err = df
        .lazy()
        .group_by_dynamic(DynamicGroupOptions::new("t", "1mo"))
        .agg(vec![col("v").sum()])
        .collect_sync(CollectOptions::default())
        .unwrap_err();
    assert!(matches!(err, DataFrameError::Configuration { .. }));
}

#[test]
fn invalid_strftime_pattern_is_configuration_error() {
    let df = frame(vec![i64s("t", vec![Some(0)])]);
    let err = df
        .select(vec![col("t")
            .cast(alopex_frame::DataType::datetime(
                alopex_frame::TimeUnit::Milliseconds,
                None,
            ))
            .dt()
            .strftime("%Q")])
        .unwrap_err();
    assert!(matches!(err, DataFrameError::Configuration { .. }));
}
