mod common;

use alopex_frame::expr::col;
use alopex_frame::{
    ColumnBuilder, DataFrame, DataFrameError, DataType, HostBuffer, HostValue, Series,
};
use serde_json::json;

use common::floats;

#[test]
fn host_numbers_build_float_columns_end_to_end() {
    let df = DataFrame::new(vec![
        Series::new("a", json!([1, 2, 3])).unwrap(),
        Series::new("b", json!([6, 7, 8])).unwrap(),
    ])
    .unwrap();
    assert_eq!(df.column("a").unwrap().dtype(), DataType::Float64);

    let out = df.select(vec![col("a").add(col("b")).alias("sum")]).unwrap();
    assert_eq!(floats(&out, "sum"), vec![Some(7.0), Some(9.0), Some(11.0)]);
}

#[test]
fn inference_follows_the_first_resolvable_value() {
    let s = Series::new("s", json!([null, "x", "y"])).unwrap();
    assert_eq!(s.dtype(), DataType::Utf8);
    assert_eq!(s.null_count(), 1);

    let nested = Series::new("l", json!([[1, 2], null, [3]])).unwrap();
    assert_eq!(nested.dtype(), DataType::list(DataType::Float64));
    assert_eq!(nested.len(), 3);

    let empty = Series::new("e", json!([])).unwrap();
    assert_eq!(empty.dtype(), DataType::Float64);
    assert!(empty.is_empty());
}

#[test]
fn declared_types_convert_elements() {
    let s = ColumnBuilder::new("n")
        .with_dtype(DataType::Int32)
        .build(&HostValue::from(json!([1, null, "3"])))
        .unwrap();
    assert_eq!(s.dtype(), DataType::Int32);
    assert_eq!(s.get(1).unwrap(), HostValue::Null);
    assert_eq!(s.get(2).unwrap(), HostValue::Number(3.0));
}

#[test]
fn strictness_decides_between_error_and_null() {
    let values = HostValue::from(json!([1, "x"]));
    let err = ColumnBuilder::new("n")
        .with_dtype(DataType::Int64)
        .build(&values)
        .unwrap_err();
    assert!(matches!(err, DataFrameError::Conversion { .. }));

    let lenient = ColumnBuilder::new("n")
        .with_dtype(DataType::Int64)
        .with_strict(false)
        .build(&values)
        .unwrap();
    assert_eq!(lenient.null_count(), 1);
}

#[test]
fn typed_buffers_keep_their_width() {
    let s = ColumnBuilder::new("b")
        .build(&HostValue::Buffer(HostBuffer::Int16(vec![1, 2, 3])))
        .unwrap();
    assert_eq!(s.dtype(), DataType::Int16);

    let err = ColumnBuilder::new("b")
        .build(&HostValue::Buffer(HostBuffer::Other {
            ctor_name: "Float16Array".into(),
        }))
        .unwrap_err();
    assert!(matches!(err, DataFrameError::UnsupportedBufferKind { .. }));
}

#[test]
fn records_become_rows() {
    let rows = match HostValue::from(json!([{"a": 1, "b": "x"}, {"a": 2}])) {
        HostValue::Array(rows) => rows,
        other => panic!("expected an array, got {other}"),
    };
    let df = DataFrame::from_rows(&rows, None).unwrap();
    assert_eq!(df.column_names(), vec!["a", "b"]);
    assert_eq!(df.height(), 2);
    assert_eq!(
        df.row(1).unwrap(),
        vec![HostValue::Number(2.0), HostValue::Null]
    );
}
