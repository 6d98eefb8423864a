use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{
    new_empty_array, Array, ArrayRef, AsArray, ListArray, NullArray, StringArray, UInt32Array,
};
use arrow::buffer::OffsetBuffer;
use arrow::compute::{
    cast, concat, filter_record_batch, take, take_record_batch, LexicographicalComparator,
    SortColumn, SortOptions as ArrowSortOptions,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::dataframe::resolve_slice;
use crate::expr::{Expr as E, LiteralValue, SortOptions};
use crate::lazy::{ProjectionKind, UniqueKeep};
use crate::physical::executor::ExecContext;
use crate::physical::expr_eval::{column, common_len, supertype, ExprEval};
use crate::physical::kernels::{broadcast, take_rows};
use crate::physical::keys::KeyColumns;
use crate::{DataFrame, DataFrameError, Expr, Result};

/// Assemble named columns into a batch of `num_rows` rows.
pub(crate) fn build_batch(columns: Vec<(String, ArrayRef)>, num_rows: usize) -> Result<RecordBatch> {
    let mut seen = HashSet::with_capacity(columns.len());
    for (name, _) in &columns {
        if !seen.insert(name.as_str()) {
            return Err(DataFrameError::schema_mismatch(format!(
                "duplicate column name '{name}'"
            )));
        }
    }
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, a)| Field::new(name, a.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, a)| a).collect();
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .map_err(|e| DataFrameError::schema_mismatch(format!("failed to build RecordBatch: {e}")))
}

fn named_columns(batch: &RecordBatch) -> Vec<(String, ArrayRef)> {
    batch
        .schema()
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(f, a)| (f.name().clone(), a.clone()))
        .collect()
}

fn index_of(batch: &RecordBatch, name: &str) -> Result<usize> {
    batch
        .schema()
        .index_of(name)
        .map_err(|_| DataFrameError::column_not_found(name))
}

/// Read an in-memory frame: row cap first, then the predicate, then the projection.
pub(crate) fn scan(
    df: &DataFrame,
    projection: Option<&[String]>,
    predicate: Option<&Expr>,
    n_rows: Option<usize>,
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    let mut batch = df.to_batch()?;
    if let Some(n) = n_rows {
        batch = batch.slice(0, n.min(batch.num_rows()));
    }
    if let Some(predicate) = predicate {
        batch = filter(&batch, predicate, ctx)?;
    }
    if let Some(columns) = projection {
        let indices = columns
            .iter()
            .map(|c| index_of(&batch, c))
            .collect::<Result<Vec<_>>>()?;
        batch = batch.project(&indices)?;
    }
    Ok(batch)
}

pub(crate) fn filter(batch: &RecordBatch, predicate: &Expr, ctx: &ExecContext) -> Result<RecordBatch> {
    let mask = ExprEval::evaluate_mask(predicate, batch, ctx)?;
    Ok(filter_record_batch(batch, &mask)?)
}

fn expand_wildcard(exprs: &[Expr], batch: &RecordBatch) -> Vec<Expr> {
    let mut out = Vec::with_capacity(exprs.len());
    for expr in exprs {
        match expr {
            E::Wildcard => out.extend(
                batch
                    .schema()
                    .fields()
                    .iter()
                    .map(|f| E::Column(f.name().clone())),
            ),
            other => out.push(other.clone()),
        }
    }
    out
}

/// Apply a projection (`select` or `with_columns`).
pub(crate) fn project(
    batch: &RecordBatch,
    exprs: &[Expr],
    kind: ProjectionKind,
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    let exprs = expand_wildcard(exprs, batch);
    let mut evaluated = Vec::with_capacity(exprs.len());
    for expr in &exprs {
        evaluated.push((expr.output_name(), ExprEval::evaluate(expr, batch, ctx)?));
    }

    match kind {
        ProjectionKind::Select => {
            if evaluated.is_empty() {
                return build_batch(Vec::new(), 0);
            }
            let arrays: Vec<&ArrayRef> = evaluated.iter().map(|(_, a)| a).collect();
            let height = common_len(&arrays)?;
            let columns = evaluated
                .into_iter()
                .map(|(name, a)| Ok((name, broadcast(&a, height)?)))
                .collect::<Result<Vec<_>>>()?;
            build_batch(columns, height)
        }
        ProjectionKind::WithColumns => {
            let height = batch.num_rows();
            let mut columns = named_columns(batch);
            for (name, a) in evaluated {
                let a = broadcast(&a, height)?;
                match columns.iter().position(|(n, _)| *n == name) {
                    Some(idx) => columns[idx].1 = a,
                    None => columns.push((name, a)),
                }
            }
            build_batch(columns, height)
        }
    }
}

fn evaluate_keys(keys: &[Expr], batch: &RecordBatch, ctx: &ExecContext) -> Result<Vec<ArrayRef>> {
    if keys.is_empty() {
        return Err(DataFrameError::invalid_operation(
            "group_by expressions must be non-empty",
        ));
    }
    keys.iter()
        .map(|k| ExprEval::evaluate_full(k, batch, ctx))
        .collect()
}

/// Group rows by `keys` and evaluate every aggregation once per group.
///
/// Groups come out in order of first appearance.
pub(crate) fn aggregate(
    batch: &RecordBatch,
    keys: &[Expr],
    aggs: &[Expr],
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    let key_arrays = evaluate_keys(keys, batch, ctx)?;
    let groups = KeyColumns::new(&key_arrays)?.groups(batch.num_rows())?;
    let firsts: Vec<u32> = groups.iter().map(|g| g[0]).collect();

    let mut columns = Vec::with_capacity(keys.len() + aggs.len());
    for (key, array) in keys.iter().zip(&key_arrays) {
        columns.push((key.output_name(), take_rows(array, &firsts)?));
    }
    for agg in aggs {
        columns.push((agg.output_name(), aggregate_expr(agg, batch, &groups, ctx)?));
    }
    build_batch(columns, groups.len())
}

/// Evaluate `expr` per group; scalar results concatenate, others become lists.
pub(crate) fn aggregate_expr(
    expr: &Expr,
    batch: &RecordBatch,
    groups: &[Vec<u32>],
    ctx: &ExecContext,
) -> Result<ArrayRef> {
    let scalar = is_scalar(expr);
    if groups.is_empty() {
        let probe = ExprEval::evaluate(expr, &batch.slice(0, 0), ctx)?;
        let dtype = if scalar {
            probe.data_type().clone()
        } else {
            list_type(probe.data_type())
        };
        return Ok(new_empty_array(&dtype));
    }

    let mut per_group = Vec::with_capacity(groups.len());
    for rows in groups {
        let sub = take_record_batch(batch, &UInt32Array::from(rows.clone()))?;
        per_group.push(ExprEval::evaluate(expr, &sub, ctx)?);
    }
    let refs: Vec<&dyn Array> = per_group.iter().map(|a| a.as_ref()).collect();
    let values = concat(&refs)?;
    if scalar {
        if values.len() != groups.len() {
            return Err(DataFrameError::invalid_operation(format!(
                "aggregation '{expr}' did not produce one value per group"
            )));
        }
        return Ok(values);
    }

    let offsets = OffsetBuffer::from_lengths(per_group.iter().map(|a| a.len()));
    let field = Arc::new(Field::new("item", values.data_type().clone(), true));
    Ok(Arc::new(ListArray::try_new(field, offsets, values, None)?))
}

fn list_type(inner: &DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", inner.clone(), true)))
}

/// Whether `expr` yields exactly one value however many rows it sees.
fn is_scalar(expr: &Expr) -> bool {
    match expr {
        E::Agg { .. } => true,
        E::Literal(LiteralValue::Series(_)) => false,
        E::Literal(_) => true,
        E::Column(_)
        | E::Wildcard
        | E::Window { .. }
        | E::Cumulative { .. }
        | E::Rolling { .. }
        | E::Sample { .. }
        | E::Shift { .. }
        | E::Sort { .. } => false,
        E::Alias { expr, .. }
        | E::Cast { expr, .. }
        | E::UnaryOp { expr, .. }
        | E::FillNull { expr, .. } => is_scalar(expr),
        E::Function { input, .. } => is_scalar(input),
        E::BinaryOp { left, right, .. } => is_scalar(left) && is_scalar(right),
        E::Ternary {
            predicate,
            truthy,
            falsy,
        } => is_scalar(predicate) && is_scalar(truthy) && is_scalar(falsy),
    }
}

/// First (or last) `n` rows of every group, keys leading.
pub(crate) fn group_slice(
    batch: &RecordBatch,
    keys: &[Expr],
    n: usize,
    from_tail: bool,
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    let key_arrays = evaluate_keys(keys, batch, ctx)?;
    let groups = KeyColumns::new(&key_arrays)?.groups(batch.num_rows())?;
    let mut rows = Vec::new();
    for g in &groups {
        let take_n = n.min(g.len());
        if from_tail {
            rows.extend_from_slice(&g[g.len() - take_n..]);
        } else {
            rows.extend_from_slice(&g[..take_n]);
        }
    }

    let mut columns = Vec::with_capacity(batch.num_columns() + keys.len());
    let mut key_names = HashSet::new();
    for (key, array) in keys.iter().zip(&key_arrays) {
        let name = key.output_name();
        columns.push((name.clone(), take_rows(array, &rows)?));
        key_names.insert(name);
    }
    for (name, array) in named_columns(batch) {
        if !key_names.contains(&name) {
            columns.push((name, take_rows(&array, &rows)?));
        }
    }
    build_batch(columns, rows.len())
}

/// Stable multi-key sort.
pub(crate) fn sort(
    batch: &RecordBatch,
    by: &[Expr],
    options: SortOptions,
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    if by.is_empty() {
        return Ok(batch.clone());
    }
    let arrow_options = ArrowSortOptions {
        descending: options.descending,
        nulls_first: !options.nulls_last,
    };
    let sort_columns = by
        .iter()
        .map(|e| {
            Ok(SortColumn {
                values: ExprEval::evaluate_full(e, batch, ctx)?,
                options: Some(arrow_options),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let comparator = LexicographicalComparator::try_new(&sort_columns)?;
    let mut indices: Vec<u32> = (0..batch.num_rows() as u32).collect();
    indices.sort_by(|&a, &b| comparator.compare(a as usize, b as usize));
    Ok(take_record_batch(batch, &UInt32Array::from(indices))?)
}

pub(crate) fn slice(batch: &RecordBatch, offset: i64, len: usize) -> RecordBatch {
    let (start, len) = resolve_slice(offset, len, batch.num_rows());
    batch.slice(start, len)
}

/// Unpivot: one output block per value column, stacked in order.
pub(crate) fn melt(batch: &RecordBatch, id_vars: &[String], value_vars: &[String]) -> Result<RecordBatch> {
    let value_vars: Vec<String> = if value_vars.is_empty() {
        batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .filter(|n| !id_vars.contains(n))
            .collect()
    } else {
        value_vars.to_vec()
    };
    let n = batch.num_rows();
    let repeated: Vec<u32> = value_vars
        .iter()
        .flat_map(|_| 0..n as u32)
        .collect();

    let mut columns = Vec::with_capacity(id_vars.len() + 2);
    for id in id_vars {
        columns.push((id.clone(), take_rows(&column(batch, id)?, &repeated)?));
    }
    let names: Vec<&str> = value_vars
        .iter()
        .flat_map(|v| std::iter::repeat(v.as_str()).take(n))
        .collect();
    let variable = StringArray::from_iter_values(names);
    columns.push(("variable".to_string(), Arc::new(variable) as ArrayRef));

    let values = value_vars
        .iter()
        .map(|v| column(batch, v))
        .collect::<Result<Vec<_>>>()?;
    let value: ArrayRef = match values.split_first() {
        None => Arc::new(NullArray::new(0)),
        Some((first, rest)) => {
            let target = rest
                .iter()
                .try_fold(first.data_type().clone(), |acc, a| supertype(&acc, a.data_type()))
                .unwrap_or(DataType::Utf8);
            let cast_values = values
                .iter()
                .map(|a| cast(a, &target))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let refs: Vec<&dyn Array> = cast_values.iter().map(|a| a.as_ref()).collect();
            concat(&refs)?
        }
    };
    columns.push(("value".to_string(), value));
    build_batch(columns, repeated.len())
}

/// One row per list element; empty and null lists yield a single null.
pub(crate) fn explode(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch> {
    if columns.is_empty() {
        return Ok(batch.clone());
    }
    let lists = columns
        .iter()
        .map(|c| {
            let array = column(batch, c)?;
            if array.as_list_opt::<i32>().is_none() {
                return Err(DataFrameError::type_mismatch(
                    Some(c.clone()),
                    "List".to_string(),
                    array.data_type().to_string(),
                ));
            }
            Ok(array)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rows: Vec<u32> = Vec::new();
    let mut elements: Vec<Vec<Option<u32>>> = vec![Vec::new(); lists.len()];
    for row in 0..batch.num_rows() {
        let lengths: Vec<usize> = lists
            .iter()
            .map(|l| {
                let l = l.as_list::<i32>();
                if l.is_null(row) {
                    0
                } else {
                    l.value_length(row) as usize
                }
            })
            .collect();
        let len = lengths[0];
        if lengths.iter().any(|&l| l != len) {
            return Err(DataFrameError::schema_mismatch(format!(
                "exploded columns have different list lengths in row {row}"
            )));
        }
        let out_len = len.max(1);
        rows.extend(std::iter::repeat(row as u32).take(out_len));
        for (list, out) in lists.iter().zip(elements.iter_mut()) {
            let start = list.as_list::<i32>().value_offsets()[row] as u32;
            if len == 0 {
                out.push(None);
            } else {
                out.extend((0..len as u32).map(|i| Some(start + i)));
            }
        }
    }

    let mut out = Vec::with_capacity(batch.num_columns());
    for (name, array) in named_columns(batch) {
        match columns.iter().position(|c| *c == name) {
            Some(i) => {
                let values = lists[i].as_list::<i32>().values();
                let indices = UInt32Array::from(elements[i].clone());
                out.push((name, take(values.as_ref(), &indices, None)?));
            }
            None => out.push((name, take_rows(&array, &rows)?)),
        }
    }
    build_batch(out, rows.len())
}

/// Keep one row per distinct `subset` key (or drop every duplicated key).
///
/// Surviving rows keep their input order.
pub(crate) fn unique(batch: &RecordBatch, subset: Option<&[String]>, keep: UniqueKeep) -> Result<RecordBatch> {
    let key_arrays = match subset {
        Some(names) => names
            .iter()
            .map(|c| column(batch, c))
            .collect::<Result<Vec<_>>>()?,
        None => batch.columns().to_vec(),
    };
    let groups = KeyColumns::new(&key_arrays)?.groups(batch.num_rows())?;
    let mut rows: Vec<u32> = match keep {
        UniqueKeep::First => groups.iter().map(|g| g[0]).collect(),
        UniqueKeep::Last => groups.iter().map(|g| g[g.len() - 1]).collect(),
        UniqueKeep::None => groups.iter().filter(|g| g.len() == 1).map(|g| g[0]).collect(),
    };
    rows.sort_unstable();
    Ok(take_record_batch(batch, &UInt32Array::from(rows))?)
}

pub(crate) fn rename(batch: &RecordBatch, existing: &[String], new: &[String]) -> Result<RecordBatch> {
    if existing.len() != new.len() {
        return Err(DataFrameError::invalid_argument(format!(
            "rename expects as many new names as existing ones ({} vs {})",
            existing.len(),
            new.len()
        )));
    }
    for name in existing {
        index_of(batch, name)?;
    }
    let columns = named_columns(batch)
        .into_iter()
        .map(|(name, a)| match existing.iter().position(|e| *e == name) {
            Some(i) => (new[i].clone(), a),
            None => (name, a),
        })
        .collect();
    build_batch(columns, batch.num_rows())
}

pub(crate) fn drop(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch> {
    for name in columns {
        index_of(batch, name)?;
    }
    let kept = named_columns(batch)
        .into_iter()
        .filter(|(name, _)| !columns.contains(name))
        .collect();
    build_batch(kept, batch.num_rows())
}

pub(crate) fn with_row_count(batch: &RecordBatch, name: &str, offset: u32) -> Result<RecordBatch> {
    let n = batch.num_rows();
    let counts = UInt32Array::from_iter_values((0..n as u32).map(|i| offset.wrapping_add(i)));
    let mut columns = vec![(name.to_string(), Arc::new(counts) as ArrayRef)];
    columns.extend(named_columns(batch));
    build_batch(columns, n)
}
