use std::sync::Arc;

use alopex_frame::expr::{col, lit};
use alopex_frame::{DataFrameError, DataType, Expr, Field, SerializationFormat, Series, TimeUnit};
use arrow::array::{ArrayRef, Float64Array, Int64Array};

fn nested() -> DataType {
    DataType::list(DataType::list(DataType::struct_(vec![
        Field::new("id", DataType::Int64),
        Field::new("at", DataType::datetime(TimeUnit::Milliseconds, Some("UTC"))),
        Field::new("tags", DataType::list(DataType::Utf8)),
    ])))
}

#[test]
fn canonical_json_wraps_every_level() {
    assert_eq!(DataType::Int64.to_json().unwrap(), r#"{"DataType":"Int64"}"#);
    assert_eq!(
        DataType::list(DataType::Utf8).to_json().unwrap(),
        r#"{"DataType":{"List":{"DataType":"Utf8"}}}"#
    );
}

#[test]
fn nested_types_survive_both_formats() {
    let dtype = nested();
    for format in [SerializationFormat::Json, SerializationFormat::Bincode] {
        let bytes = dtype.serialize_to(format).unwrap();
        assert_eq!(DataType::deserialize_from(format, &bytes).unwrap(), dtype);
    }
}

#[test]
fn expressions_survive_both_formats() {
    let expr = col("a")
        .gt(lit(1_i64))
        .and_(col("b").is_null())
        .alias("flag");
    for format in [SerializationFormat::Json, SerializationFormat::Bincode] {
        let bytes = expr.serialize_to(format).unwrap();
        assert_eq!(Expr::deserialize_from(format, &bytes).unwrap(), expr);
    }
}

#[test]
fn series_literals_keep_exact_values() {
    let wide: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(i64::MAX)]));
    let odd: ArrayRef = Arc::new(Float64Array::from(vec![f64::NAN, f64::INFINITY, -1.0]));
    let expr = col("a")
        .add(lit(Series::from_arrow("s", vec![wide]).unwrap()))
        .mul(lit(Series::from_arrow("f", vec![odd]).unwrap()));
    for format in [SerializationFormat::Json, SerializationFormat::Bincode] {
        let bytes = expr.serialize_to(format).unwrap();
        assert_eq!(Expr::deserialize_from(format, &bytes).unwrap(), expr);
    }
}

#[test]
fn struct_equality_is_ordered() {
    let ab = DataType::struct_(vec![
        Field::new("a", DataType::Int64),
        Field::new("b", DataType::Utf8),
    ]);
    let ba = DataType::struct_(vec![
        Field::new("b", DataType::Utf8),
        Field::new("a", DataType::Int64),
    ]);
    assert_ne!(ab, ba);
    assert_eq!(ab, ab.clone());
}

#[test]
fn unknown_format_name_is_a_configuration_error() {
    assert_eq!(
        "bincode".parse::<SerializationFormat>().unwrap(),
        SerializationFormat::Bincode
    );
    let err = "xml".parse::<SerializationFormat>().unwrap_err();
    assert!(matches!(err, DataFrameError::Configuration { .. }));
}

#[test]
fn garbage_bytes_fail_to_decode() {
    let err = DataType::deserialize_from(SerializationFormat::Json, b"{\"DataType\":").unwrap_err();
    assert!(matches!(err, DataFrameError::Serialization { .. }));
}
