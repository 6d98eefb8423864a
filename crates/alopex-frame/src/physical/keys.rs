use std::collections::HashMap;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};

use crate::{DataFrameError, Result};

/// Hashable identity of one row across a set of key columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct GroupKey(pub(crate) Vec<KeyValue>);

impl GroupKey {
    pub(crate) fn has_null(&self) -> bool {
        self.0.iter().any(|v| matches!(v, KeyValue::Null))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum KeyValue {
    Null,
    Boolean(bool),
    Signed(i128),
    Unsigned(u128),
    Float64(u64),
    Utf8(String),
    /// Nested values, keyed by their rendered form.
    Other(String),
}

/// Key columns with temporal and dictionary types reduced to hashable primitives.
pub(crate) struct KeyColumns {
    columns: Vec<ArrayRef>,
}

impl KeyColumns {
    pub(crate) fn new(arrays: &[ArrayRef]) -> Result<Self> {
        let columns = arrays
            .iter()
            .map(normalize)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub(crate) fn key(&self, row: usize) -> Result<GroupKey> {
        self.columns
            .iter()
            .map(|c| key_value(c.as_ref(), row))
            .collect::<Result<Vec<_>>>()
            .map(GroupKey)
    }

    /// Row indices per distinct key, groups in order of first appearance.
    pub(crate) fn groups(&self, num_rows: usize) -> Result<Vec<Vec<u32>>> {
        let mut index = HashMap::<GroupKey, usize>::new();
        let mut groups: Vec<Vec<u32>> = Vec::new();
        for row in 0..num_rows {
            let key = self.key(row)?;
            let group_idx = match index.get(&key) {
                Some(&i) => i,
                None => {
                    let i = groups.len();
                    groups.push(Vec::new());
                    index.insert(key, i);
                    i
                }
            };
            groups[group_idx].push(row as u32);
        }
        Ok(groups)
    }
}

fn normalize(array: &ArrayRef) -> Result<ArrayRef> {
    let target = match array.data_type() {
        DataType::Dictionary(_, _) | DataType::LargeUtf8 | DataType::Utf8View => DataType::Utf8,
        DataType::Date32 | DataType::Time32(_) => DataType::Int32,
        DataType::Date64 | DataType::Timestamp(_, _) | DataType::Time64(_) | DataType::Duration(_) => {
            DataType::Int64
        }
        _ => return Ok(array.clone()),
    };
    cast(array, &target).map_err(|source| DataFrameError::Arrow { source })
}

fn key_value(array: &dyn Array, row: usize) -> Result<KeyValue> {
    if array.is_null(row) {
        return Ok(KeyValue::Null);
    }

    let value = match array.data_type() {
        DataType::Boolean => KeyValue::Boolean(array.as_boolean().value(row)),
        DataType::Int8 => KeyValue::Signed(array.as_primitive::<Int8Type>().value(row) as i128),
        DataType::Int16 => KeyValue::Signed(array.as_primitive::<Int16Type>().value(row) as i128),
        DataType::Int32 => KeyValue::Signed(array.as_primitive::<Int32Type>().value(row) as i128),
        DataType::Int64 => KeyValue::Signed(array.as_primitive::<Int64Type>().value(row) as i128),
        DataType::UInt8 => KeyValue::Unsigned(array.as_primitive::<UInt8Type>().value(row) as u128),
        DataType::UInt16 => {
            KeyValue::Unsigned(array.as_primitive::<UInt16Type>().value(row) as u128)
        }
        DataType::UInt32 => {
            KeyValue::Unsigned(array.as_primitive::<UInt32Type>().value(row) as u128)
        }
        DataType::UInt64 => {
            KeyValue::Unsigned(array.as_primitive::<UInt64Type>().value(row) as u128)
        }
        DataType::Float32 => {
            float_key(array.as_primitive::<Float32Type>().value(row) as f64)
        }
        DataType::Float64 => float_key(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => KeyValue::Utf8(array.as_string::<i32>().value(row).to_string()),
        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())
                .map_err(|source| DataFrameError::Arrow { source })?;
            KeyValue::Other(formatter.value(row).to_string())
        }
    };
    Ok(value)
}

fn float_key(v: f64) -> KeyValue {
    // -0.0 and 0.0 share a group, as do all NaNs.
    let v = if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    };
    KeyValue::Float64(v.to_bits())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array, StringArray};

    use super::KeyColumns;

    #[test]
    fn groups_follow_first_appearance() {
        let a: ArrayRef = Arc::new(StringArray::from(vec![
            Some("b"),
            Some("a"),
            None,
            Some("b"),
            None,
        ]));
        let keys = KeyColumns::new(&[a]).unwrap();
        let groups = keys.groups(5).unwrap();
        assert_eq!(groups, vec![vec![0, 3], vec![1], vec![2, 4]]);
    }

    #[test]
    fn signed_zero_is_one_group() {
        let a: ArrayRef = Arc::new(Float64Array::from(vec![0.0, -0.0]));
        let keys = KeyColumns::new(&[a]).unwrap();
        assert_eq!(keys.groups(2).unwrap().len(), 1);
    }
}
