use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::datatypes::DataType;
use crate::{DataFrameError, Result};

/// A value drawn from the host's dynamic value space.
///
/// Generic numbers are `f64` (`Number`); 64-bit integer-likes are `BigInt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostValue {
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    Str(String),
    /// Calendar date/time (naive, interpreted as UTC).
    Date(NaiveDateTime),
    Array(Vec<HostValue>),
    /// Plain key/value record; keys keep their enumeration order.
    Record(Vec<(String, HostValue)>),
    Buffer(HostBuffer),
}

/// A homogeneous fixed-width numeric buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostBuffer {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// A buffer kind with no native counterpart, identified by its constructor name.
    Other { ctor_name: String },
}

impl HostBuffer {
    /// Host constructor name of this buffer kind.
    pub fn ctor_name(&self) -> &str {
        match self {
            HostBuffer::Int8(_) => "Int8Array",
            HostBuffer::Int16(_) => "Int16Array",
            HostBuffer::Int32(_) => "Int32Array",
            HostBuffer::Int64(_) => "BigInt64Array",
            HostBuffer::UInt8(_) => "Uint8Array",
            HostBuffer::UInt16(_) => "Uint16Array",
            HostBuffer::UInt32(_) => "Uint32Array",
            HostBuffer::UInt64(_) => "BigUint64Array",
            HostBuffer::Float32(_) => "Float32Array",
            HostBuffer::Float64(_) => "Float64Array",
            HostBuffer::Other { ctor_name } => ctor_name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HostBuffer::Int8(v) => v.len(),
            HostBuffer::Int16(v) => v.len(),
            HostBuffer::Int32(v) => v.len(),
            HostBuffer::Int64(v) => v.len(),
            HostBuffer::UInt8(v) => v.len(),
            HostBuffer::UInt16(v) => v.len(),
            HostBuffer::UInt32(v) => v.len(),
            HostBuffer::UInt64(v) => v.len(),
            HostBuffer::Float32(v) => v.len(),
            HostBuffer::Float64(v) => v.len(),
            HostBuffer::Other { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type by width and signedness.
    pub fn dtype(&self) -> Result<DataType> {
        match self {
            HostBuffer::Int8(_) => Ok(DataType::Int8),
            HostBuffer::Int16(_) => Ok(DataType::Int16),
            HostBuffer::Int32(_) => Ok(DataType::Int32),
            HostBuffer::Int64(_) => Ok(DataType::Int64),
            HostBuffer::UInt8(_) => Ok(DataType::UInt8),
            HostBuffer::UInt16(_) => Ok(DataType::UInt16),
            HostBuffer::UInt32(_) => Ok(DataType::UInt32),
            HostBuffer::UInt64(_) => Ok(DataType::UInt64),
            HostBuffer::Float32(_) => Ok(DataType::Float32),
            HostBuffer::Float64(_) => Ok(DataType::Float64),
            HostBuffer::Other { ctor_name } => {
                Err(DataFrameError::unsupported_buffer_kind(ctor_name.clone()))
            }
        }
    }

    /// Expand the buffer into individual host values.
    pub fn to_values(&self) -> Result<Vec<HostValue>> {
        let values = match self {
            HostBuffer::Int8(v) => v.iter().map(|x| HostValue::Number(*x as f64)).collect(),
            HostBuffer::Int16(v) => v.iter().map(|x| HostValue::Number(*x as f64)).collect(),
            HostBuffer::Int32(v) => v.iter().map(|x| HostValue::Number(*x as f64)).collect(),
            HostBuffer::Int64(v) => v.iter().map(|x| HostValue::BigInt(*x as i128)).collect(),
            HostBuffer::UInt8(v) => v.iter().map(|x| HostValue::Number(*x as f64)).collect(),
            HostBuffer::UInt16(v) => v.iter().map(|x| HostValue::Number(*x as f64)).collect(),
            HostBuffer::UInt32(v) => v.iter().map(|x| HostValue::Number(*x as f64)).collect(),
            HostBuffer::UInt64(v) => v.iter().map(|x| HostValue::BigInt(*x as i128)).collect(),
            HostBuffer::Float32(v) => v.iter().map(|x| HostValue::Number(*x as f64)).collect(),
            HostBuffer::Float64(v) => v.iter().map(|x| HostValue::Number(*x)).collect(),
            HostBuffer::Other { ctor_name } => {
                return Err(DataFrameError::unsupported_buffer_kind(ctor_name.clone()))
            }
        };
        Ok(values)
    }
}

impl HostValue {
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Build a record from `(key, value)` pairs, keeping their order.
    pub fn record<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<HostValue>,
    {
        HostValue::Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Look up a record member by key.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            HostValue::Record(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            HostValue::Number(n) => write!(f, "{n}"),
            HostValue::BigInt(n) => write!(f, "{n}n"),
            HostValue::Str(s) => write!(f, "{s:?}"),
            HostValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S%.3f")),
            HostValue::Array(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            HostValue::Record(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            HostValue::Buffer(b) => write!(f, "{}({})", b.ctor_name(), b.len()),
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Number(v as f64)
    }
}

impl From<u32> for HostValue {
    fn from(v: u32) -> Self {
        HostValue::Number(v as f64)
    }
}

impl From<f32> for HostValue {
    fn from(v: f32) -> Self {
        HostValue::Number(v as f64)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Number(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::BigInt(v as i128)
    }
}

impl From<u64> for HostValue {
    fn from(v: u64) -> Self {
        HostValue::BigInt(v as i128)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Str(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Str(v)
    }
}

impl From<NaiveDateTime> for HostValue {
    fn from(v: NaiveDateTime) -> Self {
        HostValue::Date(v)
    }
}

impl From<NaiveDate> for HostValue {
    fn from(v: NaiveDate) -> Self {
        HostValue::Date(v.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<HostBuffer> for HostValue {
    fn from(v: HostBuffer) -> Self {
        HostValue::Buffer(v)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(HostValue::Null)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(v: Vec<T>) -> Self {
        HostValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => HostValue::Null,
            Value::Bool(b) => HostValue::Bool(b),
            Value::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => HostValue::Str(s),
            Value::Array(values) => {
                HostValue::Array(values.into_iter().map(HostValue::from).collect())
            }
            Value::Object(map) => HostValue::Record(
                map.into_iter()
                    .map(|(k, v)| (k, HostValue::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{HostBuffer, HostValue};
    use crate::datatypes::DataType;
    use crate::DataFrameError;

    #[test]
    fn json_objects_keep_key_order() {
        let v = HostValue::from(json!({"z": 1, "a": "x"}));
        match v {
            HostValue::Record(pairs) => {
                let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["z", "a"]);
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn json_numbers_are_generic_numbers() {
        assert_eq!(HostValue::from(json!(3)), HostValue::Number(3.0));
    }

    #[test]
    fn unknown_buffer_kind_is_rejected() {
        let buf = HostBuffer::Other {
            ctor_name: "Uint8ClampedArray".to_string(),
        };
        let err = buf.dtype().unwrap_err();
        assert!(matches!(err, DataFrameError::UnsupportedBufferKind { .. }));
        assert!(err.to_string().contains("Uint8ClampedArray"));
        assert_eq!(HostBuffer::UInt16(vec![1]).dtype().unwrap(), DataType::UInt16);
    }

    #[test]
    fn display_quotes_strings() {
        assert_eq!(HostValue::from("x").to_string(), "\"x\"");
        assert_eq!(HostValue::Number(2.0).to_string(), "2");
    }
}
