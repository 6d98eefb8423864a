use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType as ArrowDataType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
    Time64NanosecondType, TimeUnit as ArrowTimeUnit, UInt16Type, UInt32Type, UInt64Type,
    UInt8Type,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::construction::HostValue;
use crate::datatypes::TimeUnit;
use crate::{DataFrameError, Result};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Read row `row` of `array` back into the host value space.
///
/// Integers up to 32 bits come back as numbers, `Int64` and `UInt64` as `BigInt`,
/// temporal values as dates (`Time` as an `HH:MM:SS` string) and nested
/// values as arrays and records.
pub(crate) fn value_at(array: &dyn Array, row: usize) -> Result<HostValue> {
    if array.is_null(row) {
        return Ok(HostValue::Null);
    }
    let value = match array.data_type() {
        ArrowDataType::Null => HostValue::Null,
        ArrowDataType::Boolean => HostValue::Bool(array.as_boolean().value(row)),
        ArrowDataType::Int8 => HostValue::Number(array.as_primitive::<Int8Type>().value(row) as f64),
        ArrowDataType::Int16 => {
            HostValue::Number(array.as_primitive::<Int16Type>().value(row) as f64)
        }
        ArrowDataType::Int32 => {
            HostValue::Number(array.as_primitive::<Int32Type>().value(row) as f64)
        }
        ArrowDataType::Int64 => {
            HostValue::BigInt(array.as_primitive::<Int64Type>().value(row) as i128)
        }
        ArrowDataType::UInt8 => {
            HostValue::Number(array.as_primitive::<UInt8Type>().value(row) as f64)
        }
        ArrowDataType::UInt16 => {
            HostValue::Number(array.as_primitive::<UInt16Type>().value(row) as f64)
        }
        ArrowDataType::UInt32 => {
            HostValue::Number(array.as_primitive::<UInt32Type>().value(row) as f64)
        }
        ArrowDataType::UInt64 => {
            HostValue::BigInt(array.as_primitive::<UInt64Type>().value(row) as i128)
        }
        ArrowDataType::Float32 => {
            HostValue::Number(array.as_primitive::<Float32Type>().value(row) as f64)
        }
        ArrowDataType::Float64 => HostValue::Number(array.as_primitive::<Float64Type>().value(row)),
        ArrowDataType::Utf8 => HostValue::Str(array.as_string::<i32>().value(row).to_string()),
        ArrowDataType::LargeUtf8 => {
            HostValue::Str(array.as_string::<i64>().value(row).to_string())
        }
        ArrowDataType::Date32 => {
            let days = array.as_primitive::<Date32Type>().value(row);
            HostValue::Date(date32_to_datetime(days).ok_or_else(|| out_of_range(days))?)
        }
        ArrowDataType::Timestamp(unit, _) => {
            let arr = arrow::compute::cast(&array.slice(row, 1), &ArrowDataType::Int64)?;
            let raw = arr.as_primitive::<Int64Type>().value(0);
            let unit = match unit {
                ArrowTimeUnit::Second => {
                    return DateTime::from_timestamp(raw, 0)
                        .map(|d| HostValue::Date(d.naive_utc()))
                        .ok_or_else(|| out_of_range(raw))
                }
                other => TimeUnit::from_arrow(other),
            };
            HostValue::Date(epoch_to_datetime(raw, unit).ok_or_else(|| out_of_range(raw))?)
        }
        ArrowDataType::Time32(_) | ArrowDataType::Time64(_) => {
            let nanos = time_nanos_at(array, row)?;
            HostValue::Str(nanos_to_time(nanos).ok_or_else(|| out_of_range(nanos))?.to_string())
        }
        ArrowDataType::Dictionary(_, _) => {
            let arr = arrow::compute::cast(&array.slice(row, 1), &ArrowDataType::Utf8)?;
            value_at(arr.as_ref(), 0)?
        }
        ArrowDataType::List(_) => values_of(array.as_list::<i32>().value(row).as_ref())
            .map(HostValue::Array)?,
        ArrowDataType::LargeList(_) => values_of(array.as_list::<i64>().value(row).as_ref())
            .map(HostValue::Array)?,
        ArrowDataType::Struct(fields) => {
            let st = array.as_struct();
            let pairs = fields
                .iter()
                .zip(st.columns())
                .map(|(f, col)| Ok((f.name().clone(), value_at(col.as_ref(), row)?)))
                .collect::<Result<Vec<_>>>()?;
            HostValue::Record(pairs)
        }
        other => return Err(DataFrameError::unsupported_type(other.to_string())),
    };
    Ok(value)
}

/// Read every row of `array`.
pub(crate) fn values_of(array: &dyn Array) -> Result<Vec<HostValue>> {
    (0..array.len()).map(|i| value_at(array, i)).collect()
}

/// Read every row of a sequence of chunks.
pub(crate) fn values_of_chunks(chunks: &[ArrayRef]) -> Result<Vec<HostValue>> {
    let mut out = Vec::with_capacity(chunks.iter().map(|c| c.len()).sum());
    for chunk in chunks {
        out.extend(values_of(chunk.as_ref())?);
    }
    Ok(out)
}

/// Convert an epoch offset in `unit` into a naive UTC date/time.
pub(crate) fn epoch_to_datetime(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let per_second = unit.per_second();
    let secs = value.div_euclid(per_second);
    let sub = value.rem_euclid(per_second);
    let nanos = sub * (NANOS_PER_SECOND / per_second);
    DateTime::from_timestamp(secs, nanos as u32).map(|d| d.naive_utc())
}

/// Convert a naive UTC date/time into an epoch offset in `unit`.
pub(crate) fn datetime_to_epoch(value: &NaiveDateTime, unit: TimeUnit) -> i64 {
    let utc = value.and_utc();
    match unit {
        TimeUnit::Milliseconds => utc.timestamp_millis(),
        TimeUnit::Microseconds => utc.timestamp_micros(),
        TimeUnit::Nanoseconds => utc
            .timestamp_nanos_opt()
            .unwrap_or_else(|| utc.timestamp_micros().saturating_mul(1_000)),
    }
}

pub(crate) fn date32_to_datetime(days: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
        .map(|d| d.and_time(NaiveTime::MIN))
}

pub(crate) fn nanos_to_time(nanos: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
    let sub = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, sub)
}

/// Days between 0001-01-01 and 1970-01-01.
pub(crate) const EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn time_nanos_at(array: &dyn Array, row: usize) -> Result<i64> {
    let nanos = match array.data_type() {
        ArrowDataType::Time32(ArrowTimeUnit::Second) => {
            array.as_primitive::<Time32SecondType>().value(row) as i64 * NANOS_PER_SECOND
        }
        ArrowDataType::Time32(_) => {
            array.as_primitive::<Time32MillisecondType>().value(row) as i64 * 1_000_000
        }
        ArrowDataType::Time64(ArrowTimeUnit::Microsecond) => {
            array.as_primitive::<Time64MicrosecondType>().value(row) * 1_000
        }
        ArrowDataType::Time64(_) => array.as_primitive::<Time64NanosecondType>().value(row),
        other => return Err(DataFrameError::type_mismatch(None::<String>, "Time", other.to_string())),
    };
    Ok(nanos)
}

fn out_of_range(raw: impl std::fmt::Display) -> DataFrameError {
    DataFrameError::invalid_operation(format!("temporal value {raw} is out of range"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{
        ArrayRef, Date32Array, Int64Array, ListArray, StringArray, TimestampMillisecondArray,
    };
    use arrow::datatypes::Int32Type;
    use chrono::NaiveDate;

    use super::{epoch_to_datetime, value_at, values_of};
    use crate::construction::HostValue;
    use crate::datatypes::TimeUnit;

    #[test]
    fn reads_primitive_and_null_rows() {
        let a: ArrayRef = Arc::new(Int64Array::from(vec![Some(3), None]));
        assert_eq!(
            values_of(a.as_ref()).unwrap(),
            vec![HostValue::Number(3.0), HostValue::Null]
        );
        let s: ArrayRef = Arc::new(StringArray::from(vec!["x"]));
        assert_eq!(value_at(s.as_ref(), 0).unwrap(), HostValue::from("x"));
    }

    #[test]
    fn reads_temporal_rows_as_dates() {
        let day = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        let midnight = day.and_hms_opt(0, 0, 0).unwrap();
        let d: ArrayRef = Arc::new(Date32Array::from(vec![18690]));
        assert_eq!(value_at(d.as_ref(), 0).unwrap(), HostValue::Date(midnight));

        let ms = midnight.and_utc().timestamp_millis() + 1_500;
        let t: ArrayRef = Arc::new(TimestampMillisecondArray::from(vec![ms]));
        assert_eq!(
            value_at(t.as_ref(), 0).unwrap(),
            HostValue::Date(epoch_to_datetime(ms, TimeUnit::Milliseconds).unwrap())
        );
    }

    #[test]
    fn reads_lists_as_arrays() {
        let l: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
        ]));
        assert_eq!(
            value_at(l.as_ref(), 0).unwrap(),
            HostValue::Array(vec![HostValue::Number(1.0), HostValue::Number(2.0)])
        );
        assert_eq!(value_at(l.as_ref(), 1).unwrap(), HostValue::Null);
    }

    #[test]
    fn epoch_conversion_handles_negative_offsets() {
        let dt = epoch_to_datetime(-1, TimeUnit::Milliseconds).unwrap();
        assert_eq!(dt.and_utc().timestamp_millis(), -1);
    }
}
