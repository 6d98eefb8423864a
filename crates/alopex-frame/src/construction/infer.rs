use crate::construction::HostValue;
use crate::datatypes::{DataType, Field, TimeUnit};
use crate::Result;

/// Return the first element of `values` that is not null.
///
/// When that element is itself an array, every array element of `values` is
/// flattened one level and the result is the first non-null leaf wrapped back
/// into a single-element array, so lists of lists resolve to their eventual
/// scalar. Yields `None` for empty or all-null input.
pub fn first_non_null(values: &[HostValue]) -> Option<HostValue> {
    let first = values.iter().find(|v| !v.is_null())?;
    match first {
        HostValue::Array(_) => {
            let flattened: Vec<HostValue> = values
                .iter()
                .flat_map(|v| match v {
                    HostValue::Array(items) => items.clone(),
                    HostValue::Null => Vec::new(),
                    other => vec![other.clone()],
                })
                .collect();
            Some(HostValue::Array(vec![
                first_non_null(&flattened).unwrap_or(HostValue::Null)
            ]))
        }
        other => Some(other.clone()),
    }
}

/// Deduce the column type able to hold `sample`.
///
/// Only fails for a fixed-width buffer of an unrecognized kind.
pub fn infer_type(sample: &HostValue) -> Result<DataType> {
    match sample {
        HostValue::Null => Ok(unknown_fallback()),
        HostValue::Buffer(buffer) => buffer.dtype(),
        HostValue::Date(_) => Ok(DataType::datetime(TimeUnit::Milliseconds, None)),
        HostValue::Record(pairs) => {
            let fields = pairs
                .iter()
                .map(|(name, value)| Ok(Field::new(name.clone(), infer_type(value)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(DataType::struct_(fields))
        }
        HostValue::Array(items) => Ok(DataType::list(infer_column_type(items)?)),
        HostValue::BigInt(_) => Ok(DataType::UInt64),
        HostValue::Number(_) => Ok(DataType::Float64),
        HostValue::Str(_) => Ok(DataType::Utf8),
        HostValue::Bool(_) => Ok(DataType::Bool),
    }
}

/// Deduce the type of a column holding `values`, driven by the first
/// resolvable element.
///
/// A buffer inside a sequence is one list-valued row.
pub fn infer_column_type(values: &[HostValue]) -> Result<DataType> {
    match first_non_null(values) {
        None => Ok(unknown_fallback()),
        Some(HostValue::Buffer(buffer)) => Ok(DataType::list(buffer.dtype()?)),
        Some(sample) => infer_type(&sample),
    }
}

// Null or unresolvable samples become Float64; kept for compatibility.
fn unknown_fallback() -> DataType {
    tracing::debug!("no resolvable sample, falling back to Float64");
    DataType::Float64
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{first_non_null, infer_column_type, infer_type};
    use crate::construction::{HostBuffer, HostValue};
    use crate::datatypes::{DataType, Field, TimeUnit};
    use crate::DataFrameError;

    fn values(v: serde_json::Value) -> Vec<HostValue> {
        match HostValue::from(v) {
            HostValue::Array(items) => items,
            other => vec![other],
        }
    }

    #[test]
    fn first_non_null_skips_leading_nulls() {
        let xs = values(json!([null, null, "a", 1]));
        assert_eq!(first_non_null(&xs), Some(HostValue::from("a")));
        assert_eq!(first_non_null(&values(json!([null, null]))), None);
        assert_eq!(first_non_null(&[]), None);
    }

    #[test]
    fn first_non_null_flattens_nested_arrays() {
        let xs = values(json!([null, [], [null, 2], [3]]));
        assert_eq!(
            first_non_null(&xs),
            Some(HostValue::Array(vec![HostValue::Number(2.0)]))
        );
    }

    #[test]
    fn scalars_map_by_kind() {
        assert_eq!(infer_type(&HostValue::from(1.5)).unwrap(), DataType::Float64);
        assert_eq!(infer_type(&HostValue::from(7_i64)).unwrap(), DataType::UInt64);
        assert_eq!(infer_type(&HostValue::from("x")).unwrap(), DataType::Utf8);
        assert_eq!(infer_type(&HostValue::from(true)).unwrap(), DataType::Bool);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            infer_type(&HostValue::from(date)).unwrap(),
            DataType::datetime(TimeUnit::Milliseconds, None)
        );
    }

    #[test]
    fn null_sample_falls_back_to_float64() {
        assert_eq!(infer_type(&HostValue::Null).unwrap(), DataType::Float64);
        assert_eq!(
            infer_column_type(&values(json!([null, null]))).unwrap(),
            DataType::Float64
        );
    }

    #[test]
    fn trailing_nulls_do_not_change_the_result() {
        for xs in [json!([1, 2]), json!([["a"], ["b"]]), json!([{"k": true}])] {
            let mut padded = values(xs.clone());
            padded.push(HostValue::Null);
            assert_eq!(
                infer_column_type(&values(xs)).unwrap(),
                infer_column_type(&padded).unwrap()
            );
        }
        assert_eq!(
            infer_column_type(&values(json!([[1, 2], [3]]))).unwrap(),
            DataType::list(DataType::Float64)
        );
    }

    #[test]
    fn records_keep_key_order() {
        let dt = infer_column_type(&values(json!([{"b": "x", "a": 1}]))).unwrap();
        assert_eq!(
            dt,
            DataType::struct_(vec![
                Field::new("b", DataType::Utf8),
                Field::new("a", DataType::Float64),
            ])
        );
    }

    #[test]
    fn buffers_map_by_element_kind() {
        let buf = HostValue::Buffer(HostBuffer::Int16(vec![1, 2]));
        assert_eq!(infer_type(&buf).unwrap(), DataType::Int16);
        assert_eq!(
            infer_column_type(&[HostValue::Null, buf]).unwrap(),
            DataType::list(DataType::Int16)
        );
        let err = infer_type(&HostValue::Buffer(HostBuffer::Other {
            ctor_name: "DataView".to_string(),
        }))
        .unwrap_err();
        assert!(matches!(err, DataFrameError::UnsupportedBufferKind { .. }));
    }
}
