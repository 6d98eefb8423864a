use std::collections::{HashMap, HashSet};

use arrow::array::{Array, ArrayRef, AsArray, UInt32Array};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{cast, is_not_null, take};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;

use crate::lazy::{AsofStrategy, JoinType};
use crate::physical::executor::ExecContext;
use crate::physical::expr_eval::{column, unify};
use crate::physical::keys::{GroupKey, KeyColumns};
use crate::physical::operators::build_batch;
use crate::{DataFrameError, Result};

/// Matched row pairs; `None` on either side yields nulls for that side.
struct JoinIndices {
    left: Vec<Option<u32>>,
    right: Vec<Option<u32>>,
}

impl JoinIndices {
    fn with_capacity(n: usize) -> Self {
        Self {
            left: Vec::with_capacity(n),
            right: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, left: Option<u32>, right: Option<u32>) {
        self.left.push(left);
        self.right.push(right);
    }

    fn len(&self) -> usize {
        self.left.len()
    }
}

/// Hash join on equal key columns.
///
/// Null keys never match. Outer joins coalesce the key columns.
#[allow(clippy::too_many_arguments)]
pub(crate) fn join(
    left: &RecordBatch,
    right: &RecordBatch,
    left_on: &[String],
    right_on: &[String],
    how: JoinType,
    suffix: &str,
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    if how == JoinType::Cross {
        return cross_join(left, right, suffix);
    }
    let (left_keys, right_keys) = key_columns(left, right, left_on, right_on, ctx)?;
    let left_index = KeyColumns::new(&left_keys)?;
    let right_index = KeyColumns::new(&right_keys)?;

    let mut table: HashMap<GroupKey, Vec<u32>> = HashMap::new();
    for row in 0..right.num_rows() {
        let key = right_index.key(row)?;
        if !key.has_null() {
            table.entry(key).or_default().push(row as u32);
        }
    }

    let mut indices = JoinIndices::with_capacity(left.num_rows());
    let mut right_matched = vec![false; right.num_rows()];
    for row in 0..left.num_rows() {
        let key = left_index.key(row)?;
        let matches = if key.has_null() {
            None
        } else {
            table.get(&key)
        };
        let l = Some(row as u32);
        match (how, matches) {
            (JoinType::Semi, m) => {
                if m.is_some() {
                    indices.push(l, None);
                }
            }
            (JoinType::Anti, m) => {
                if m.is_none() {
                    indices.push(l, None);
                }
            }
            (_, Some(rows)) => {
                for &r in rows {
                    right_matched[r as usize] = true;
                    indices.push(l, Some(r));
                }
            }
            (JoinType::Left | JoinType::Outer, None) => indices.push(l, None),
            (_, None) => {}
        }
    }
    if how == JoinType::Outer {
        for (r, matched) in right_matched.iter().enumerate() {
            if !matched {
                indices.push(None, Some(r as u32));
            }
        }
    }
    tracing::trace!(?how, rows = indices.len(), "hash join matched");

    let left_idx = UInt32Array::from(indices.left.clone());
    let right_idx = UInt32Array::from(indices.right.clone());
    let mut columns = Vec::with_capacity(left.num_columns() + right.num_columns());
    for (field, array) in left.schema().fields().iter().zip(left.columns()) {
        let taken = take(array.as_ref(), &left_idx, None)?;
        let key_pos = left_on.iter().position(|k| k == field.name());
        let out = match (how, key_pos) {
            (JoinType::Outer, Some(i)) => {
                let from_right = take(right_keys[i].as_ref(), &right_idx, None)?;
                let from_right = cast(&from_right, taken.data_type())?;
                zip(&is_not_null(taken.as_ref())?, &taken, &from_right)?
            }
            _ => taken,
        };
        columns.push((field.name().clone(), out));
    }
    if matches!(how, JoinType::Inner | JoinType::Left | JoinType::Outer) {
        append_right(&mut columns, right, &right_idx, right_on, suffix)?;
    }
    build_batch(columns, indices.len())
}

fn cross_join(left: &RecordBatch, right: &RecordBatch, suffix: &str) -> Result<RecordBatch> {
    let (n, m) = (left.num_rows(), right.num_rows());
    let mut indices = JoinIndices::with_capacity(n * m);
    for l in 0..n as u32 {
        for r in 0..m as u32 {
            indices.push(Some(l), Some(r));
        }
    }
    let left_idx = UInt32Array::from(indices.left.clone());
    let right_idx = UInt32Array::from(indices.right.clone());
    let mut columns = Vec::with_capacity(left.num_columns() + right.num_columns());
    for (field, array) in left.schema().fields().iter().zip(left.columns()) {
        columns.push((field.name().clone(), take(array.as_ref(), &left_idx, None)?));
    }
    append_right(&mut columns, right, &right_idx, &[], suffix)?;
    build_batch(columns, indices.len())
}

/// Add the right-hand columns not listed in `skip`, suffixing name collisions.
fn append_right(
    columns: &mut Vec<(String, ArrayRef)>,
    right: &RecordBatch,
    right_idx: &UInt32Array,
    skip: &[String],
    suffix: &str,
) -> Result<()> {
    let mut taken_names: HashSet<String> = columns.iter().map(|(n, _)| n.clone()).collect();
    for (field, array) in right.schema().fields().iter().zip(right.columns()) {
        if skip.contains(field.name()) {
            continue;
        }
        let mut name = field.name().clone();
        if taken_names.contains(&name) {
            name = format!("{name}{suffix}");
        }
        taken_names.insert(name.clone());
        columns.push((name, take(array.as_ref(), right_idx, None)?));
    }
    Ok(())
}

/// Resolve the key columns on both sides, unifying their types when allowed.
fn key_columns(
    left: &RecordBatch,
    right: &RecordBatch,
    left_on: &[String],
    right_on: &[String],
    ctx: &ExecContext,
) -> Result<(Vec<ArrayRef>, Vec<ArrayRef>)> {
    if left_on.len() != right_on.len() {
        return Err(DataFrameError::invalid_argument(format!(
            "join key count mismatch: {} on the left, {} on the right",
            left_on.len(),
            right_on.len()
        )));
    }
    let mut left_keys = Vec::with_capacity(left_on.len());
    let mut right_keys = Vec::with_capacity(right_on.len());
    for (l, r) in left_on.iter().zip(right_on) {
        let (a, b) = key_pair(column(left, l)?, column(right, r)?, r, ctx)?;
        left_keys.push(a);
        right_keys.push(b);
    }
    Ok((left_keys, right_keys))
}

fn key_pair(
    left: ArrayRef,
    right: ArrayRef,
    right_name: &str,
    ctx: &ExecContext,
) -> Result<(ArrayRef, ArrayRef)> {
    if left.data_type() == right.data_type() {
        return Ok((left, right));
    }
    if !ctx.flags.type_coercion {
        return Err(DataFrameError::type_mismatch(
            Some(right_name.to_string()),
            left.data_type().to_string(),
            right.data_type().to_string(),
        ));
    }
    unify(left, right)
}

/// Nearest-key join: every left row picks at most one right row.
///
/// Rows are matched within equal `by` keys. Both sides must already be sorted
/// by their `on` column.
#[allow(clippy::too_many_arguments)]
pub(crate) fn join_asof(
    left: &RecordBatch,
    right: &RecordBatch,
    left_on: &str,
    right_on: &str,
    by_left: &[String],
    by_right: &[String],
    strategy: AsofStrategy,
    suffix: &str,
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    let (left_on_values, right_on_values) =
        key_pair(column(left, left_on)?, column(right, right_on)?, right_on, ctx)?;
    let left_values = ordered_values(&left_on_values)?;
    let right_values = ordered_values(&right_on_values)?;
    let (left_by, right_by) = key_columns(left, right, by_left, by_right, ctx)?;
    let left_by = KeyColumns::new(&left_by)?;
    let right_by = KeyColumns::new(&right_by)?;

    // Right rows per `by` key, sorted by their `on` value.
    let mut partitions: HashMap<GroupKey, Vec<(i64, u32)>> = HashMap::new();
    for (row, value) in right_values.iter().enumerate() {
        let key = right_by.key(row)?;
        if let (Some(v), false) = (value, key.has_null()) {
            partitions.entry(key).or_default().push((*v, row as u32));
        }
    }
    for rows in partitions.values_mut() {
        rows.sort_by_key(|(v, _)| *v);
    }

    let mut right_idx = Vec::with_capacity(left.num_rows());
    for (row, value) in left_values.iter().enumerate() {
        let key = left_by.key(row)?;
        let found = match (value, key.has_null()) {
            (Some(t), false) => partitions
                .get(&key)
                .and_then(|rows| nearest(rows, *t, strategy)),
            _ => None,
        };
        right_idx.push(found);
    }

    let right_idx = UInt32Array::from(right_idx);
    let mut columns: Vec<(String, ArrayRef)> = left
        .schema()
        .fields()
        .iter()
        .zip(left.columns())
        .map(|(f, a)| (f.name().clone(), a.clone()))
        .collect();
    let mut skip: Vec<String> = Vec::new();
    if left_on == right_on {
        skip.push(right_on.to_string());
    }
    for (l, r) in by_left.iter().zip(by_right) {
        if l == r {
            skip.push(r.clone());
        }
    }
    append_right(&mut columns, right, &right_idx, &skip, suffix)?;
    build_batch(columns, left.num_rows())
}

fn nearest(rows: &[(i64, u32)], t: i64, strategy: AsofStrategy) -> Option<u32> {
    match strategy {
        AsofStrategy::Backward => {
            let pos = rows.partition_point(|(v, _)| *v <= t);
            pos.checked_sub(1).map(|i| rows[i].1)
        }
        AsofStrategy::Forward => {
            let pos = rows.partition_point(|(v, _)| *v < t);
            rows.get(pos).map(|(_, r)| *r)
        }
    }
}

/// Map an `on` column to `i64` values that sort like the originals.
fn ordered_values(array: &ArrayRef) -> Result<Vec<Option<i64>>> {
    let floats = |values: Vec<Option<f64>>| {
        values
            .into_iter()
            .map(|v| v.map(ordered_float_bits))
            .collect::<Vec<_>>()
    };
    match array.data_type() {
        DataType::Float64 => Ok(floats(array.as_primitive::<Float64Type>().iter().collect())),
        DataType::Float32 => Ok(floats(
            array
                .as_primitive::<Float32Type>()
                .iter()
                .map(|v| v.map(f64::from))
                .collect(),
        )),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Date32
        | DataType::Date64
        | DataType::Timestamp(_, _)
        | DataType::Duration(_) => {
            let source = match array.data_type() {
                DataType::Date32 => cast(array, &DataType::Int32)?,
                _ => array.clone(),
            };
            let values = cast(&source, &DataType::Int64)?;
            Ok(values.as_primitive::<Int64Type>().iter().collect())
        }
        other => Err(DataFrameError::type_mismatch(
            None::<String>,
            "numeric or temporal as-of key".to_string(),
            other.to_string(),
        )),
    }
}

fn ordered_float_bits(v: f64) -> i64 {
    let bits = v.to_bits() as i64;
    bits ^ (((bits >> 63) as u64) >> 1) as i64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, AsArray, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Int64Type, Schema};
    use arrow::record_batch::RecordBatch;

    use super::{join, join_asof, ordered_float_bits};
    use crate::lazy::{AsofStrategy, JoinType};
    use crate::physical::executor::ExecContext;

    fn frame(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(n, a)| Field::new(*n, a.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, a)| a).collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    fn left() -> RecordBatch {
        frame(vec![
            ("k", Arc::new(Int64Array::from(vec![Some(1), Some(2), None, Some(4)]))),
            ("v", Arc::new(StringArray::from(vec!["a", "b", "c", "d"]))),
        ])
    }

    fn right() -> RecordBatch {
        frame(vec![
            ("k", Arc::new(Int32Array::from(vec![Some(2), Some(1), None, Some(2)]))),
            ("v", Arc::new(StringArray::from(vec!["x", "y", "z", "w"]))),
        ])
    }

    fn on() -> Vec<String> {
        vec!["k".to_string()]
    }

    #[test]
    fn inner_join_follows_left_order_and_suffixes() {
        let out = join(&left(), &right(), &on(), &on(), JoinType::Inner, "_right", &ExecContext::default())
            .unwrap();
        let names: Vec<_> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["k", "v", "v_right"]);
        let keys: Vec<_> = out.column(0).as_primitive::<Int64Type>().values().to_vec();
        assert_eq!(keys, vec![1, 2, 2]);
    }

    #[test]
    fn null_keys_never_match() {
        let out = join(&left(), &right(), &on(), &on(), JoinType::Left, "_right", &ExecContext::default())
            .unwrap();
        assert_eq!(out.num_rows(), 5);
        assert_eq!(out.column(2).null_count(), 2);
    }

    #[test]
    fn outer_join_coalesces_keys() {
        let out = join(&left(), &right(), &on(), &on(), JoinType::Outer, "_right", &ExecContext::default())
            .unwrap();
        // 4 left rows (one duplicated by two matches) plus the unmatched null right row.
        assert_eq!(out.num_rows(), 6);
        assert_eq!(out.column(0).null_count(), 2);
    }

    #[test]
    fn semi_and_anti_keep_left_columns_only() {
        let ctx = ExecContext::default();
        let semi = join(&left(), &right(), &on(), &on(), JoinType::Semi, "_right", &ctx).unwrap();
        let anti = join(&left(), &right(), &on(), &on(), JoinType::Anti, "_right", &ctx).unwrap();
        assert_eq!(semi.num_rows(), 2);
        assert_eq!(anti.num_rows(), 2);
        assert_eq!(semi.num_columns(), 2);
    }

    #[test]
    fn mismatched_key_types_fail_without_coercion() {
        let mut ctx = ExecContext::default();
        ctx.flags.type_coercion = false;
        let err = join(&left(), &right(), &on(), &on(), JoinType::Inner, "_right", &ctx).unwrap_err();
        assert!(err.to_string().contains("type mismatch"));
    }

    #[test]
    fn asof_backward_and_forward() {
        let l = frame(vec![("t", Arc::new(Int64Array::from(vec![1, 5, 10])))]);
        let r = frame(vec![
            ("t", Arc::new(Int64Array::from(vec![2, 4, 6]))),
            ("p", Arc::new(StringArray::from(vec!["a", "b", "c"]))),
        ]);
        let ctx = ExecContext::default();
        let back = join_asof(&l, &r, "t", "t", &[], &[], AsofStrategy::Backward, "_right", &ctx)
            .unwrap();
        let p: Vec<_> = back.column(1).as_string::<i32>().iter().collect();
        assert_eq!(p, vec![None, Some("b"), Some("c")]);

        let fwd = join_asof(&l, &r, "t", "t", &[], &[], AsofStrategy::Forward, "_right", &ctx)
            .unwrap();
        let p: Vec<_> = fwd.column(1).as_string::<i32>().iter().collect();
        assert_eq!(p, vec![Some("a"), Some("c"), None]);
    }

    #[test]
    fn float_bits_preserve_order() {
        let values = [-3.5, -0.1, 0.0, 0.2, 7.0];
        let mapped: Vec<i64> = values.iter().map(|v| ordered_float_bits(*v)).collect();
        let mut sorted = mapped.clone();
        sorted.sort();
        assert_eq!(mapped, sorted);
    }
}
