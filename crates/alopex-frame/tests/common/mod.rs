#![allow(dead_code)]

use std::sync::{Arc, Once};

use alopex_frame::{DataFrame, Series};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness; honours `RUST_LOG`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn i64s(name: &str, values: Vec<Option<i64>>) -> Series {
    let a: ArrayRef = Arc::new(Int64Array::from(values));
    Series::from_arrow(name, vec![a]).unwrap()
}

pub fn f64s(name: &str, values: Vec<Option<f64>>) -> Series {
    let a: ArrayRef = Arc::new(Float64Array::from(values));
    Series::from_arrow(name, vec![a]).unwrap()
}

pub fn strs(name: &str, values: Vec<Option<&str>>) -> Series {
    let a: ArrayRef = Arc::new(StringArray::from(values));
    Series::from_arrow(name, vec![a]).unwrap()
}

pub fn frame(columns: Vec<Series>) -> DataFrame {
    DataFrame::new(columns).unwrap()
}

/// Column values as `i64`, `None` for nulls.
pub fn ints(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
    let array = df.column(name).unwrap().to_array().unwrap();
    let array = arrow::compute::cast(&array, &arrow::datatypes::DataType::Int64).unwrap();
    array
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap()
        .iter()
        .collect()
}

pub fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    let array = df.column(name).unwrap().to_array().unwrap();
    let array = arrow::compute::cast(&array, &arrow::datatypes::DataType::Float64).unwrap();
    array
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap()
        .iter()
        .collect()
}

pub fn texts(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    let array = df.column(name).unwrap().to_array().unwrap();
    let array = arrow::compute::cast(&array, &arrow::datatypes::DataType::Utf8).unwrap();
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect()
}
