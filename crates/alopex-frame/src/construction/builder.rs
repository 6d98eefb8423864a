use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, ListArray, NullArray, StringArray, StructArray,
    Time64NanosecondArray, TimestampMillisecondArray, UInt16Array, UInt32Array, UInt64Array,
    UInt8Array,
};
use arrow::buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow::compute::CastOptions;
use arrow::datatypes::{
    DataType as ArrowDataType, Field as ArrowField, Fields as ArrowFields, Float64Type,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::construction::extract::value_at;
use crate::construction::{infer_column_type, HostBuffer, HostValue};
use crate::datatypes::{DataType, Field, TimeUnit};
use crate::string_cache::StringCache;
use crate::{DataFrameError, Result, Series};

/// Builds a native column from host values.
///
/// Without a declared type the column type is inferred from the first
/// resolvable element. `strict` (the default) turns a failed element
/// conversion into [`DataFrameError::Conversion`]; otherwise the offending
/// element becomes null.
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    name: String,
    dtype: Option<DataType>,
    strict: bool,
    string_cache: Option<StringCache>,
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: None,
            strict: true,
            string_cache: None,
        }
    }

    /// Declare the column type instead of inferring it.
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Encode categorical columns against `cache` while it is active.
    pub fn with_string_cache(mut self, cache: StringCache) -> Self {
        self.string_cache = Some(cache);
        self
    }

    /// Build from an array of host values or a fixed-width buffer.
    pub fn build(&self, values: &HostValue) -> Result<Series> {
        match values {
            HostValue::Buffer(buffer) => {
                let array = self.build_buffer(buffer)?;
                Ok(Series::from_array(&self.name, array))
            }
            HostValue::Array(items) => self.build_values(items),
            HostValue::Null => self.build_values(&[]),
            other => Err(DataFrameError::invalid_argument(format!(
                "expected an array or buffer of values, got {other}"
            ))),
        }
    }

    /// Build from a sequence of host values.
    pub fn build_values(&self, values: &[HostValue]) -> Result<Series> {
        let array = self.build_array(values)?;
        Ok(Series::from_array(&self.name, array))
    }

    pub(crate) fn build_array(&self, values: &[HostValue]) -> Result<ArrayRef> {
        let dtype = match &self.dtype {
            Some(dtype) => dtype.clone(),
            None => infer_column_type(values)?,
        };
        tracing::trace!(column = %self.name, %dtype, len = values.len(), "building column");
        match &dtype {
            DataType::Struct(fields) => self.build_struct(values, fields),
            DataType::List(inner) => self.build_list(values, inner),
            leaf => self.build_leaf(values, leaf),
        }
    }

    fn build_buffer(&self, buffer: &HostBuffer) -> Result<ArrayRef> {
        let array: ArrayRef = match buffer {
            HostBuffer::Int8(v) => Arc::new(Int8Array::from(v.clone())),
            HostBuffer::Int16(v) => Arc::new(Int16Array::from(v.clone())),
            HostBuffer::Int32(v) => Arc::new(Int32Array::from(v.clone())),
            HostBuffer::Int64(v) => Arc::new(Int64Array::from(v.clone())),
            HostBuffer::UInt8(v) => Arc::new(UInt8Array::from(v.clone())),
            HostBuffer::UInt16(v) => Arc::new(UInt16Array::from(v.clone())),
            HostBuffer::UInt32(v) => Arc::new(UInt32Array::from(v.clone())),
            HostBuffer::UInt64(v) => Arc::new(UInt64Array::from(v.clone())),
            HostBuffer::Float32(v) => Arc::new(Float32Array::from(v.clone())),
            HostBuffer::Float64(v) => Arc::new(Float64Array::from(v.clone())),
            HostBuffer::Other { ctor_name } => {
                return Err(DataFrameError::unsupported_buffer_kind(ctor_name.clone()))
            }
        };
        match &self.dtype {
            Some(dtype) if *dtype != buffer.dtype()? => {
                cast_array(&array, dtype, self.strict, self.string_cache.as_ref())
            }
            _ => Ok(array),
        }
    }

    fn build_leaf(&self, values: &[HostValue], dtype: &DataType) -> Result<ArrayRef> {
        let native: ArrayRef = match dtype {
            DataType::Null => Arc::new(NullArray::new(values.len())),
            DataType::Bool => Arc::new(BooleanArray::from(self.coerce(values, dtype, to_bool)?)),
            DataType::Int8 | DataType::Int16 | DataType::Int32 => {
                Arc::new(Int32Array::from(self.coerce(values, dtype, to_i32)?))
            }
            DataType::Int64 => Arc::new(Int64Array::from(self.coerce(values, dtype, to_i64)?)),
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => {
                Arc::new(UInt32Array::from(self.coerce(values, dtype, to_u32)?))
            }
            DataType::UInt64 => Arc::new(UInt64Array::from(self.coerce(values, dtype, to_u64)?)),
            DataType::Float32 | DataType::Float64 => {
                Arc::new(Float64Array::from(self.coerce(values, dtype, to_f64)?))
            }
            DataType::Utf8 | DataType::Categorical => {
                Arc::new(StringArray::from(self.coerce(values, dtype, to_text)?))
            }
            DataType::Date | DataType::Datetime(..) => Arc::new(TimestampMillisecondArray::from(
                self.coerce(values, dtype, to_epoch_millis)?,
            )),
            DataType::Time => {
                Arc::new(Time64NanosecondArray::from(self.coerce(values, dtype, to_time_nanos)?))
            }
            DataType::Object => return Err(DataFrameError::unsupported_type(dtype.variant())),
            DataType::List(_) | DataType::Struct(_) => {
                return ColumnBuilder {
                    dtype: Some(dtype.clone()),
                    ..self.clone()
                }
                .build_array(values)
            }
        };
        if is_narrowed(dtype) {
            cast_array(&native, dtype, self.strict, self.string_cache.as_ref())
        } else {
            Ok(native)
        }
    }

    fn build_list(&self, values: &[HostValue], inner: &DataType) -> Result<ArrayRef> {
        let target = DataType::list(inner.clone());
        let mut offsets = Vec::with_capacity(values.len() + 1);
        let mut validity = Vec::with_capacity(values.len());
        let mut flat = Vec::new();
        offsets.push(0_i32);
        for value in values {
            match value {
                HostValue::Array(items) => {
                    flat.extend(items.iter().cloned());
                    validity.push(true);
                }
                HostValue::Buffer(buffer) => {
                    flat.extend(buffer.to_values()?);
                    validity.push(true);
                }
                HostValue::Null => validity.push(false),
                other if self.strict => {
                    return Err(DataFrameError::conversion(other.to_string(), target.to_string()))
                }
                _ => validity.push(false),
            }
            offsets.push(i32::try_from(flat.len()).map_err(|_| {
                DataFrameError::invalid_operation("list column exceeds 32-bit offsets")
            })?);
        }
        let child = ColumnBuilder {
            name: "item".to_string(),
            dtype: Some(inner.clone()),
            ..self.clone()
        }
        .build_array(&flat)?;
        let field = Arc::new(ArrowField::new("item", child.data_type().clone(), true));
        Ok(Arc::new(ListArray::try_new(
            field,
            OffsetBuffer::new(ScalarBuffer::from(offsets)),
            child,
            Some(NullBuffer::from(validity)),
        )?))
    }

    fn build_struct(&self, values: &[HostValue], fields: &[Field]) -> Result<ArrayRef> {
        let target = DataType::struct_(fields.to_vec());
        let mut validity = Vec::with_capacity(values.len());
        for value in values {
            match value {
                HostValue::Record(_) => validity.push(true),
                HostValue::Null => validity.push(false),
                other if self.strict => {
                    return Err(DataFrameError::conversion(other.to_string(), target.to_string()))
                }
                _ => validity.push(false),
            }
        }
        let columns = self.build_record_columns(values, fields)?;
        let arrow_fields = ArrowFields::from(
            fields
                .iter()
                .zip(&columns)
                .map(|(f, c)| ArrowField::new(f.name(), c.data_type().clone(), true))
                .collect::<Vec<_>>(),
        );
        Ok(Arc::new(StructArray::try_new(
            arrow_fields,
            columns,
            Some(NullBuffer::from(validity)),
        )?))
    }

    /// Build one column per field from row-oriented records.
    ///
    /// Missing keys and non-record rows contribute nulls.
    pub(crate) fn build_record_columns(
        &self,
        rows: &[HostValue],
        fields: &[Field],
    ) -> Result<Vec<ArrayRef>> {
        fields
            .iter()
            .map(|field| {
                let column: Vec<HostValue> = rows
                    .iter()
                    .map(|row| row.get(field.name()).cloned().unwrap_or(HostValue::Null))
                    .collect();
                ColumnBuilder {
                    name: field.name().to_string(),
                    dtype: Some(field.dtype().clone()),
                    ..self.clone()
                }
                .build_array(&column)
            })
            .collect()
    }

    fn coerce<T>(
        &self,
        values: &[HostValue],
        dtype: &DataType,
        convert: impl Fn(&HostValue) -> Option<T>,
    ) -> Result<Vec<Option<T>>> {
        values
            .iter()
            .map(|v| {
                if v.is_null() {
                    return Ok(None);
                }
                match convert(v) {
                    Some(x) => Ok(Some(x)),
                    None if self.strict => {
                        Err(DataFrameError::conversion(v.to_string(), dtype.to_string()))
                    }
                    None => Ok(None),
                }
            })
            .collect()
    }
}

/// Types whose native constructor produces a wider representation.
fn is_narrowed(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(..)
            | DataType::Date
            | DataType::Categorical
            | DataType::Int8
            | DataType::Int16
            | DataType::UInt8
            | DataType::UInt16
            | DataType::Float32
    )
}

/// Cast `array` to `target`.
///
/// Values that do not survive the cast become null, or fail with
/// [`DataFrameError::Conversion`] under `strict`. Categorical targets are
/// encoded against `cache` when one is active.
pub(crate) fn cast_array(
    array: &ArrayRef,
    target: &DataType,
    strict: bool,
    cache: Option<&StringCache>,
) -> Result<ArrayRef> {
    let out: ArrayRef = match (target, cache) {
        (DataType::Categorical, Some(cache)) if cache.is_active() => {
            let text = arrow::compute::cast(array, &ArrowDataType::Utf8)?;
            let text = text
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| DataFrameError::invalid_operation("bad StringArray downcast"))?;
            Arc::new(cache.encode(text)?)
        }
        _ => {
            let options = CastOptions {
                safe: true,
                ..Default::default()
            };
            arrow::compute::cast_with_options(array, &target.to_arrow()?, &options)?
        }
    };
    if strict && out.null_count() != array.null_count() {
        if let Some(row) = (0..array.len()).find(|&i| array.is_valid(i) && out.is_null(i)) {
            return Err(DataFrameError::conversion(
                value_at(array.as_ref(), row)?.to_string(),
                target.to_string(),
            ));
        }
    }
    if strict && target.is_float() {
        if let Some(row) = overflowed_row(array, &out)? {
            return Err(DataFrameError::conversion(
                value_at(array.as_ref(), row)?.to_string(),
                target.to_string(),
            ));
        }
    }
    Ok(out)
}

/// First row whose finite input became infinite or NaN after a float cast.
fn overflowed_row(input: &ArrayRef, out: &ArrayRef) -> Result<Option<usize>> {
    if !input.data_type().is_numeric() {
        return Ok(None);
    }
    let before = arrow::compute::cast(input, &ArrowDataType::Float64)?;
    let after = arrow::compute::cast(out, &ArrowDataType::Float64)?;
    let (before, after) = (
        before.as_primitive::<Float64Type>(),
        after.as_primitive::<Float64Type>(),
    );
    Ok((0..before.len()).find(|&i| {
        before.is_valid(i)
            && after.is_valid(i)
            && before.value(i).is_finite()
            && !after.value(i).is_finite()
    }))
}

fn to_bool(v: &HostValue) -> Option<bool> {
    match v {
        HostValue::Bool(b) => Some(*b),
        HostValue::Number(n) if *n == 0.0 || *n == 1.0 => Some(*n == 1.0),
        HostValue::BigInt(n) if *n == 0 || *n == 1 => Some(*n == 1),
        HostValue::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_i64(v: &HostValue) -> Option<i64> {
    match v {
        HostValue::Number(n) => integral(*n),
        HostValue::BigInt(n) => i64::try_from(*n).ok(),
        HostValue::Bool(b) => Some(i64::from(*b)),
        HostValue::Str(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        HostValue::Date(d) => Some(d.and_utc().timestamp_millis()),
        _ => None,
    }
}

fn to_i32(v: &HostValue) -> Option<i32> {
    to_i64(v).and_then(|x| i32::try_from(x).ok())
}

fn to_u32(v: &HostValue) -> Option<u32> {
    to_i64(v).and_then(|x| u32::try_from(x).ok())
}

fn to_u64(v: &HostValue) -> Option<u64> {
    match v {
        HostValue::BigInt(n) => u64::try_from(*n).ok(),
        HostValue::Str(s) => s
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| to_i64(v).and_then(|x| u64::try_from(x).ok())),
        other => to_i64(other).and_then(|x| u64::try_from(x).ok()),
    }
}

fn to_f64(v: &HostValue) -> Option<f64> {
    match v {
        HostValue::Number(n) => Some(*n),
        HostValue::BigInt(n) => Some(*n as f64),
        HostValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        HostValue::Str(s) => s.trim().parse().ok(),
        HostValue::Date(d) => Some(d.and_utc().timestamp_millis() as f64),
        _ => None,
    }
}

fn to_text(v: &HostValue) -> Option<String> {
    match v {
        HostValue::Str(s) => Some(s.clone()),
        HostValue::Bool(_) | HostValue::Number(_) | HostValue::Date(_) => Some(v.to_string()),
        HostValue::BigInt(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_epoch_millis(v: &HostValue) -> Option<i64> {
    match v {
        HostValue::Date(d) => Some(d.and_utc().timestamp_millis()),
        HostValue::Number(n) => integral(*n),
        HostValue::BigInt(n) => i64::try_from(*n).ok(),
        HostValue::Str(s) => parse_datetime(s.trim()).map(|d| d.and_utc().timestamp_millis()),
        _ => None,
    }
}

fn to_time_nanos(v: &HostValue) -> Option<i64> {
    let time = match v {
        HostValue::Str(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").ok()?,
        HostValue::Date(d) => d.time(),
        HostValue::Number(n) => return integral(*n),
        HostValue::BigInt(n) => return i64::try_from(*n).ok(),
        _ => return None,
    };
    Some(time.num_seconds_from_midnight() as i64 * 1_000_000_000 + time.nanosecond() as i64)
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}
