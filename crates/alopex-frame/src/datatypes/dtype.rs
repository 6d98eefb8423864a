use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{
    DataType as ArrowDataType, Field as ArrowField, Fields as ArrowFields,
    TimeUnit as ArrowTimeUnit,
};
use serde::{Deserialize, Serialize};

use crate::datatypes::Field;
use crate::format::SerializationFormat;
use crate::{DataFrameError, Result};

/// Resolution of a `Datetime` column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
}

impl TimeUnit {
    /// Number of units in one second.
    pub fn per_second(self) -> i64 {
        match self {
            TimeUnit::Nanoseconds => 1_000_000_000,
            TimeUnit::Microseconds => 1_000_000,
            TimeUnit::Milliseconds => 1_000,
        }
    }

    pub(crate) fn to_arrow(self) -> ArrowTimeUnit {
        match self {
            TimeUnit::Nanoseconds => ArrowTimeUnit::Nanosecond,
            TimeUnit::Microseconds => ArrowTimeUnit::Microsecond,
            TimeUnit::Milliseconds => ArrowTimeUnit::Millisecond,
        }
    }

    pub(crate) fn from_arrow(unit: &ArrowTimeUnit) -> Self {
        match unit {
            ArrowTimeUnit::Nanosecond => TimeUnit::Nanoseconds,
            ArrowTimeUnit::Microsecond => TimeUnit::Microseconds,
            ArrowTimeUnit::Millisecond | ArrowTimeUnit::Second => TimeUnit::Milliseconds,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Nanoseconds => f.write_str("ns"),
            TimeUnit::Microseconds => f.write_str("us"),
            TimeUnit::Milliseconds => f.write_str("ms"),
        }
    }
}

/// The closed set of column types.
///
/// Equality is structural: parameterized variants compare their payloads
/// recursively, and `Struct` fields compare in order by name and type.
///
/// The serde form is the canonical one: `{"DataType": "Int64"}` for leaf
/// variants and `{"DataType": {"List": {"DataType": "Utf8"}}}` for
/// parameterized ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "CanonicalDataType", from = "CanonicalDataType")]
pub enum DataType {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Date,
    /// Timestamp with a unit and an optional time zone.
    Datetime(TimeUnit, Option<String>),
    Time,
    Categorical,
    /// Opaque host objects; no native representation.
    Object,
    List(Box<DataType>),
    Struct(Vec<Field>),
}

impl DataType {
    /// Build a `List` of `inner`.
    pub fn list(inner: DataType) -> Self {
        DataType::List(Box::new(inner))
    }

    /// Build a `Datetime` with the given unit and time zone.
    pub fn datetime(unit: TimeUnit, time_zone: Option<&str>) -> Self {
        DataType::Datetime(unit, time_zone.map(str::to_string))
    }

    /// Build a `Struct` from its member fields.
    pub fn struct_(fields: Vec<Field>) -> Self {
        DataType::Struct(fields)
    }

    /// Name of the variant tag (payload excluded).
    pub fn variant(&self) -> &'static str {
        match self {
            DataType::Null => "Null",
            DataType::Bool => "Bool",
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::UInt8 => "UInt8",
            DataType::UInt16 => "UInt16",
            DataType::UInt32 => "UInt32",
            DataType::UInt64 => "UInt64",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::Utf8 => "Utf8",
            DataType::Date => "Date",
            DataType::Datetime(..) => "Datetime",
            DataType::Time => "Time",
            DataType::Categorical => "Categorical",
            DataType::Object => "Object",
            DataType::List(_) => "List",
            DataType::Struct(_) => "Struct",
        }
    }

    /// Inner type of a `List`, if this is one.
    pub fn inner(&self) -> Option<&DataType> {
        match self {
            DataType::List(inner) => Some(inner),
            _ => None,
        }
    }

    /// Member fields of a `Struct`, if this is one.
    pub fn fields(&self) -> Option<&[Field]> {
        match self {
            DataType::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// The innermost non-list type.
    pub fn leaf(&self) -> &DataType {
        match self {
            DataType::List(inner) => inner.leaf(),
            other => other,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Datetime(..) | DataType::Time)
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, DataType::List(_) | DataType::Struct(_))
    }

    /// Return a new `Struct` whose fields carry `names` (in order).
    ///
    /// Fails when this is not a struct or the name count differs.
    pub fn rename_fields(&self, names: &[String]) -> Result<DataType> {
        let fields = self.fields().ok_or_else(|| {
            DataFrameError::type_mismatch(None::<String>, "Struct", self.to_string())
        })?;
        if fields.len() != names.len() {
            return Err(DataFrameError::invalid_argument(format!(
                "expected {} field names, got {}",
                fields.len(),
                names.len()
            )));
        }
        Ok(DataType::Struct(
            fields
                .iter()
                .zip(names)
                .map(|(f, n)| f.with_name(n.clone()))
                .collect(),
        ))
    }

    /// Map this type to its Arrow representation.
    pub fn to_arrow(&self) -> Result<ArrowDataType> {
        let dt = match self {
            DataType::Null => ArrowDataType::Null,
            DataType::Bool => ArrowDataType::Boolean,
            DataType::Int8 => ArrowDataType::Int8,
            DataType::Int16 => ArrowDataType::Int16,
            DataType::Int32 => ArrowDataType::Int32,
            DataType::Int64 => ArrowDataType::Int64,
            DataType::UInt8 => ArrowDataType::UInt8,
            DataType::UInt16 => ArrowDataType::UInt16,
            DataType::UInt32 => ArrowDataType::UInt32,
            DataType::UInt64 => ArrowDataType::UInt64,
            DataType::Float32 => ArrowDataType::Float32,
            DataType::Float64 => ArrowDataType::Float64,
            DataType::Utf8 => ArrowDataType::Utf8,
            DataType::Date => ArrowDataType::Date32,
            DataType::Datetime(unit, tz) => {
                ArrowDataType::Timestamp(unit.to_arrow(), tz.as_deref().map(Arc::from))
            }
            DataType::Time => ArrowDataType::Time64(ArrowTimeUnit::Nanosecond),
            DataType::Categorical => ArrowDataType::Dictionary(
                Box::new(ArrowDataType::UInt32),
                Box::new(ArrowDataType::Utf8),
            ),
            DataType::Object => return Err(DataFrameError::unsupported_type(self.variant())),
            DataType::List(inner) => {
                ArrowDataType::List(Arc::new(ArrowField::new("item", inner.to_arrow()?, true)))
            }
            DataType::Struct(fields) => ArrowDataType::Struct(ArrowFields::from(
                fields
                    .iter()
                    .map(Field::to_arrow)
                    .collect::<Result<Vec<_>>>()?,
            )),
        };
        Ok(dt)
    }

    /// Map an Arrow type back into this type system.
    ///
    /// Arrow types with no counterpart map to `Object`.
    pub fn from_arrow(dt: &ArrowDataType) -> DataType {
        match dt {
            ArrowDataType::Null => DataType::Null,
            ArrowDataType::Boolean => DataType::Bool,
            ArrowDataType::Int8 => DataType::Int8,
            ArrowDataType::Int16 => DataType::Int16,
            ArrowDataType::Int32 => DataType::Int32,
            ArrowDataType::Int64 => DataType::Int64,
            ArrowDataType::UInt8 => DataType::UInt8,
            ArrowDataType::UInt16 => DataType::UInt16,
            ArrowDataType::UInt32 => DataType::UInt32,
            ArrowDataType::UInt64 => DataType::UInt64,
            ArrowDataType::Float16 | ArrowDataType::Float32 => DataType::Float32,
            ArrowDataType::Float64 => DataType::Float64,
            ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 => DataType::Utf8,
            ArrowDataType::Date32 | ArrowDataType::Date64 => DataType::Date,
            ArrowDataType::Timestamp(unit, tz) => DataType::Datetime(
                TimeUnit::from_arrow(unit),
                tz.as_ref().map(|t| t.to_string()),
            ),
            ArrowDataType::Time32(_) | ArrowDataType::Time64(_) => DataType::Time,
            ArrowDataType::Dictionary(_, values)
                if matches!(
                    values.as_ref(),
                    ArrowDataType::Utf8 | ArrowDataType::LargeUtf8
                ) =>
            {
                DataType::Categorical
            }
            ArrowDataType::List(f)
            | ArrowDataType::LargeList(f)
            | ArrowDataType::FixedSizeList(f, _) => {
                DataType::List(Box::new(DataType::from_arrow(f.data_type())))
            }
            ArrowDataType::Struct(fields) => DataType::Struct(
                fields
                    .iter()
                    .map(|f| Field::from_arrow(f.as_ref()))
                    .collect(),
            ),
            _ => DataType::Object,
        }
    }

    /// Serialize into the canonical form using `format`.
    pub fn serialize_to(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        format.encode(self)
    }

    /// Reconstruct a value produced by [`DataType::serialize_to`].
    pub fn deserialize_from(format: SerializationFormat, bytes: &[u8]) -> Result<Self> {
        format.decode(bytes)
    }

    /// Canonical JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| DataFrameError::serialization("json", e.to_string()))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Datetime(unit, None) => write!(f, "Datetime({unit})"),
            DataType::Datetime(unit, Some(tz)) => write!(f, "Datetime({unit}, {tz})"),
            DataType::List(inner) => write!(f, "List({inner})"),
            DataType::Struct(fields) => {
                f.write_str("Struct{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name(), field.dtype())?;
                }
                f.write_str("}")
            }
            other => f.write_str(other.variant()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CanonicalDataType {
    #[serde(rename = "DataType")]
    dtype: Tagged,
}

#[derive(Serialize, Deserialize)]
enum Tagged {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Date,
    Datetime(TimeUnit, Option<String>),
    Time,
    Categorical,
    Object,
    List(Box<DataType>),
    Struct(Vec<Field>),
}

impl From<DataType> for CanonicalDataType {
    fn from(dt: DataType) -> Self {
        let dtype = match dt {
            DataType::Null => Tagged::Null,
            DataType::Bool => Tagged::Bool,
            DataType::Int8 => Tagged::Int8,
            DataType::Int16 => Tagged::Int16,
            DataType::Int32 => Tagged::Int32,
            DataType::Int64 => Tagged::Int64,
            DataType::UInt8 => Tagged::UInt8,
            DataType::UInt16 => Tagged::UInt16,
            DataType::UInt32 => Tagged::UInt32,
            DataType::UInt64 => Tagged::UInt64,
            DataType::Float32 => Tagged::Float32,
            DataType::Float64 => Tagged::Float64,
            DataType::Utf8 => Tagged::Utf8,
            DataType::Date => Tagged::Date,
            DataType::Datetime(unit, tz) => Tagged::Datetime(unit, tz),
            DataType::Time => Tagged::Time,
            DataType::Categorical => Tagged::Categorical,
            DataType::Object => Tagged::Object,
            DataType::List(inner) => Tagged::List(inner),
            DataType::Struct(fields) => Tagged::Struct(fields),
        };
        CanonicalDataType { dtype }
    }
}

impl From<CanonicalDataType> for DataType {
    fn from(c: CanonicalDataType) -> Self {
        match c.dtype {
            Tagged::Null => DataType::Null,
            Tagged::Bool => DataType::Bool,
            Tagged::Int8 => DataType::Int8,
            Tagged::Int16 => DataType::Int16,
            Tagged::Int32 => DataType::Int32,
            Tagged::Int64 => DataType::Int64,
            Tagged::UInt8 => DataType::UInt8,
            Tagged::UInt16 => DataType::UInt16,
            Tagged::UInt32 => DataType::UInt32,
            Tagged::UInt64 => DataType::UInt64,
            Tagged::Float32 => DataType::Float32,
            Tagged::Float64 => DataType::Float64,
            Tagged::Utf8 => DataType::Utf8,
            Tagged::Date => DataType::Date,
            Tagged::Datetime(unit, tz) => DataType::Datetime(unit, tz),
            Tagged::Time => DataType::Time,
            Tagged::Categorical => DataType::Categorical,
            Tagged::Object => DataType::Object,
            Tagged::List(inner) => DataType::List(inner),
            Tagged::Struct(fields) => DataType::Struct(fields),
        }
    }
}
