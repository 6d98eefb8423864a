use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Int32Array, ListBuilder, StringArray, StringBuilder,
    StructArray, UInt32Array,
};
use arrow::compute::{cast, take};
use arrow::datatypes::{DataType, Date32Type, Fields, Int64Type, TimeUnit as ArrowTimeUnit};
use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::{NoExpand, Regex};

use crate::construction::extract::{date32_to_datetime, epoch_to_datetime};
use crate::datatypes::TimeUnit;
use crate::expr::{FunctionExpr, ListFunction, StringFunction, StructFunction, TemporalFunction};
use crate::{DataFrameError, Result};

/// Apply a namespaced function to an evaluated input column.
pub(crate) fn apply(function: &FunctionExpr, values: &ArrayRef) -> Result<ArrayRef> {
    match function {
        FunctionExpr::Str(f) => string_function(f, values),
        FunctionExpr::List(f) => list_function(f, values),
        FunctionExpr::Temporal(f) => temporal_function(f, values),
        FunctionExpr::Struct(f) => struct_function(f, values),
    }
}

fn utf8(values: &ArrayRef) -> Result<ArrayRef> {
    match values.data_type() {
        DataType::Utf8 => Ok(values.clone()),
        DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) | DataType::Null => {
            Ok(cast(values, &DataType::Utf8)?)
        }
        other => Err(DataFrameError::type_mismatch(
            None::<String>,
            "Utf8".to_string(),
            other.to_string(),
        )),
    }
}

fn compile_regex(pattern: &str, literal: bool) -> Result<Regex> {
    let source = if literal {
        regex::escape(pattern)
    } else {
        pattern.to_string()
    };
    Regex::new(&source).map_err(|e| {
        DataFrameError::invalid_argument(format!("invalid pattern '{pattern}': {e}"))
    })
}

fn string_function(function: &StringFunction, values: &ArrayRef) -> Result<ArrayRef> {
    let text = utf8(values)?;
    let s = text.as_string::<i32>();
    let out: ArrayRef = match function {
        StringFunction::Lengths => Arc::new(
            s.iter()
                .map(|v| v.map(|v| v.chars().count() as u32))
                .collect::<UInt32Array>(),
        ),
        StringFunction::ToUppercase => Arc::new(
            s.iter()
                .map(|v| v.map(str::to_uppercase))
                .collect::<StringArray>(),
        ),
        StringFunction::ToLowercase => Arc::new(
            s.iter()
                .map(|v| v.map(str::to_lowercase))
                .collect::<StringArray>(),
        ),
        StringFunction::Contains { pattern, literal } => {
            let re = compile_regex(pattern, *literal)?;
            Arc::new(
                s.iter()
                    .map(|v| v.map(|v| re.is_match(v)))
                    .collect::<BooleanArray>(),
            )
        }
        StringFunction::StartsWith(prefix) => Arc::new(
            s.iter()
                .map(|v| v.map(|v| v.starts_with(prefix.as_str())))
                .collect::<BooleanArray>(),
        ),
        StringFunction::EndsWith(suffix) => Arc::new(
            s.iter()
                .map(|v| v.map(|v| v.ends_with(suffix.as_str())))
                .collect::<BooleanArray>(),
        ),
        StringFunction::Replace {
            pattern,
            value,
            literal,
            all,
        } => {
            let re = compile_regex(pattern, *literal)?;
            let limit = if *all { 0 } else { 1 };
            Arc::new(
                s.iter()
                    .map(|v| {
                        v.map(|v| {
                            if *literal {
                                re.replacen(v, limit, NoExpand(value)).into_owned()
                            } else {
                                re.replacen(v, limit, value.as_str()).into_owned()
                            }
                        })
                    })
                    .collect::<StringArray>(),
            )
        }
        StringFunction::Slice { offset, length } => Arc::new(
            s.iter()
                .map(|v| v.map(|v| slice_chars(v, *offset, *length)))
                .collect::<StringArray>(),
        ),
        StringFunction::Strip => Arc::new(
            s.iter()
                .map(|v| v.map(str::trim))
                .collect::<StringArray>(),
        ),
        StringFunction::Split(separator) => {
            let mut builder = ListBuilder::new(StringBuilder::new());
            for v in s.iter() {
                match v {
                    Some(v) => {
                        for part in v.split(separator.as_str()) {
                            builder.values().append_value(part);
                        }
                        builder.append(true);
                    }
                    None => builder.append(false),
                }
            }
            Arc::new(builder.finish())
        }
    };
    Ok(out)
}

fn slice_chars(v: &str, offset: i64, length: Option<usize>) -> String {
    let n = v.chars().count();
    let start = if offset < 0 {
        n.saturating_sub(offset.unsigned_abs() as usize)
    } else {
        (offset as usize).min(n)
    };
    let len = length.unwrap_or(n - start);
    v.chars().skip(start).take(len).collect()
}

fn list_function(function: &ListFunction, values: &ArrayRef) -> Result<ArrayRef> {
    let list = values.as_list_opt::<i32>().ok_or_else(|| {
        DataFrameError::type_mismatch(
            None::<String>,
            "List".to_string(),
            values.data_type().to_string(),
        )
    })?;

    let element = |index: i64| -> Result<ArrayRef> {
        let offsets = list.value_offsets();
        let indices: UInt32Array = (0..list.len())
            .map(|row| {
                if list.is_null(row) {
                    return None;
                }
                let len = list.value_length(row) as i64;
                let i = if index < 0 { len + index } else { index };
                (0..len)
                    .contains(&i)
                    .then(|| (offsets[row] as i64 + i) as u32)
            })
            .collect();
        Ok(take(list.values().as_ref(), &indices, None)?)
    };

    match function {
        ListFunction::Lengths => Ok(Arc::new(
            (0..list.len())
                .map(|row| list.is_valid(row).then(|| list.value_length(row) as u32))
                .collect::<UInt32Array>(),
        )),
        ListFunction::Get(index) => element(*index),
        ListFunction::First => element(0),
        ListFunction::Last => element(-1),
        ListFunction::Join(separator) => {
            let mut out = Vec::with_capacity(list.len());
            for row in list.iter() {
                match row {
                    Some(items) => {
                        let text = utf8(&items)?;
                        let parts: Vec<&str> = text.as_string::<i32>().iter().flatten().collect();
                        out.push(Some(parts.join(separator)));
                    }
                    None => out.push(None),
                }
            }
            Ok(Arc::new(StringArray::from(out)))
        }
    }
}

/// Wall-clock values of a temporal column; time zones are not applied.
fn datetimes(values: &ArrayRef) -> Result<Vec<Option<NaiveDateTime>>> {
    let from_epoch = |scale: i64, unit: TimeUnit| -> Result<Vec<Option<NaiveDateTime>>> {
        let ints = cast(values, &DataType::Int64)?;
        Ok(ints
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.and_then(|v| epoch_to_datetime(v.saturating_mul(scale), unit)))
            .collect())
    };
    match values.data_type() {
        DataType::Timestamp(ArrowTimeUnit::Second, _) => from_epoch(1_000, TimeUnit::Milliseconds),
        DataType::Timestamp(unit, _) => from_epoch(1, TimeUnit::from_arrow(unit)),
        DataType::Date64 => from_epoch(1, TimeUnit::Milliseconds),
        DataType::Date32 => Ok(values
            .as_primitive::<Date32Type>()
            .iter()
            .map(|d| d.and_then(date32_to_datetime))
            .collect()),
        other => Err(DataFrameError::type_mismatch(
            None::<String>,
            "Date or Datetime".to_string(),
            other.to_string(),
        )),
    }
}

fn temporal_function(function: &TemporalFunction, values: &ArrayRef) -> Result<ArrayRef> {
    let dts = datetimes(values)?;
    let part = |f: fn(&NaiveDateTime) -> u32| -> ArrayRef {
        Arc::new(dts.iter().map(|d| d.as_ref().map(f)).collect::<UInt32Array>())
    };
    let out: ArrayRef = match function {
        TemporalFunction::Year => Arc::new(
            dts.iter()
                .map(|d| d.as_ref().map(|d| d.year()))
                .collect::<Int32Array>(),
        ),
        TemporalFunction::Month => part(|d| d.month()),
        TemporalFunction::Day => part(|d| d.day()),
        TemporalFunction::Hour => part(|d| d.hour()),
        TemporalFunction::Minute => part(|d| d.minute()),
        TemporalFunction::Second => part(|d| d.second()),
        TemporalFunction::Millisecond => part(|d| d.nanosecond() / 1_000_000),
        TemporalFunction::Weekday => part(|d| d.weekday().number_from_monday()),
        TemporalFunction::OrdinalDay => part(|d| d.ordinal()),
        TemporalFunction::Strftime(format) => {
            let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
            if items.iter().any(|i| matches!(i, Item::Error)) {
                return Err(DataFrameError::configuration(
                    "strftime",
                    format!("invalid format string '{format}'"),
                ));
            }
            Arc::new(
                dts.iter()
                    .map(|d| {
                        d.as_ref()
                            .map(|d| d.format_with_items(items.iter()).to_string())
                    })
                    .collect::<StringArray>(),
            )
        }
    };
    Ok(out)
}

fn struct_function(function: &StructFunction, values: &ArrayRef) -> Result<ArrayRef> {
    let array = values.as_struct_opt().ok_or_else(|| {
        DataFrameError::type_mismatch(
            None::<String>,
            "Struct".to_string(),
            values.data_type().to_string(),
        )
    })?;
    match function {
        StructFunction::FieldByName(name) => array
            .column_by_name(name)
            .cloned()
            .ok_or_else(|| DataFrameError::column_not_found(name.clone())),
        StructFunction::RenameFields(names) => {
            if names.len() != array.num_columns() {
                return Err(DataFrameError::invalid_argument(format!(
                    "expected {} field names, got {}",
                    array.num_columns(),
                    names.len()
                )));
            }
            let fields: Fields = array
                .fields()
                .iter()
                .zip(names)
                .map(|(f, name)| f.as_ref().clone().with_name(name))
                .collect();
            let renamed = StructArray::try_new(
                fields,
                array.columns().to_vec(),
                array.nulls().cloned(),
            )?;
            Ok(Arc::new(renamed))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, AsArray, StringArray};
    use arrow::datatypes::UInt32Type;

    use super::apply;
    use crate::expr::{FunctionExpr, ListFunction, StringFunction};

    fn strings(v: Vec<Option<&str>>) -> ArrayRef {
        Arc::new(StringArray::from(v))
    }

    fn texts(a: &ArrayRef) -> Vec<Option<String>> {
        a.as_string::<i32>()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn literal_replace_does_not_expand_groups() {
        let a = strings(vec![Some("a.b.c"), None]);
        let f = FunctionExpr::Str(StringFunction::Replace {
            pattern: ".".to_string(),
            value: "$0".to_string(),
            literal: true,
            all: true,
        });
        let out = apply(&f, &a).unwrap();
        assert_eq!(texts(&out), vec![Some("a$0b$0c".to_string()), None]);
    }

    #[test]
    fn slice_counts_from_the_end() {
        let a = strings(vec![Some("hello")]);
        let f = FunctionExpr::Str(StringFunction::Slice {
            offset: -3,
            length: Some(2),
        });
        assert_eq!(texts(&apply(&f, &a).unwrap()), vec![Some("ll".to_string())]);
    }

    #[test]
    fn split_then_list_accessors() {
        let a = strings(vec![Some("a,b,c"), Some("d"), None]);
        let lists = apply(&FunctionExpr::Str(StringFunction::Split(",".to_string())), &a).unwrap();

        let lengths = apply(&FunctionExpr::List(ListFunction::Lengths), &lists).unwrap();
        let lengths: Vec<Option<u32>> = lengths.as_primitive::<UInt32Type>().iter().collect();
        assert_eq!(lengths, vec![Some(3), Some(1), None]);

        let last = apply(&FunctionExpr::List(ListFunction::Last), &lists).unwrap();
        assert_eq!(
            texts(&last),
            vec![Some("c".to_string()), Some("d".to_string()), None]
        );

        let second = apply(&FunctionExpr::List(ListFunction::Get(1)), &lists).unwrap();
        assert!(second.is_null(1));

        let joined = apply(&FunctionExpr::List(ListFunction::Join("-".to_string())), &lists).unwrap();
        assert_eq!(texts(&joined)[0], Some("a-b-c".to_string()));
    }
}
