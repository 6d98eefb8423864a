use std::sync::Arc;

use arrow::array::{
    new_empty_array, Array, ArrayRef, AsArray, BooleanArray, Datum, Float64Array, Int64Array,
    NullArray, Scalar, StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, UInt32Array, UInt64Array,
};
use arrow::compute::kernels::{boolean, cmp, numeric, zip::zip};
use arrow::compute::{
    cast, interleave, is_not_null, is_null, prep_null_mask_filter, take_record_batch,
    SortOptions as ArrowSortOptions,
};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::construction::cast_array;
use crate::datatypes::TimeUnit;
use crate::expr::{Expr as E, LiteralValue, Operator, UnaryOperator};
use crate::physical::executor::ExecContext;
use crate::physical::functions;
use crate::physical::kernels::{self, broadcast};
use crate::physical::keys::KeyColumns;
use crate::{DataFrameError, Expr, Result};

/// Evaluates `Expr` values over Arrow `RecordBatch` inputs.
///
/// Literals and aggregations evaluate to length-1 arrays; callers broadcast
/// them to the batch height where a full column is needed.
pub(crate) struct ExprEval;

impl ExprEval {
    /// Evaluate `expr` against `batch`.
    pub(crate) fn evaluate(expr: &Expr, batch: &RecordBatch, ctx: &ExecContext) -> Result<ArrayRef> {
        eval_expr(expr, batch, ctx)
    }

    /// Evaluate `expr` and broadcast the result to the batch height.
    pub(crate) fn evaluate_full(
        expr: &Expr,
        batch: &RecordBatch,
        ctx: &ExecContext,
    ) -> Result<ArrayRef> {
        let out = eval_expr(expr, batch, ctx)?;
        broadcast(&out, batch.num_rows())
    }

    /// Evaluate a predicate into a filter mask where null counts as false.
    pub(crate) fn evaluate_mask(
        expr: &Expr,
        batch: &RecordBatch,
        ctx: &ExecContext,
    ) -> Result<BooleanArray> {
        let out = null_as_boolean(&Self::evaluate_full(expr, batch, ctx)?)?;
        Ok(null_as_false(as_boolean(&out)?))
    }
}

pub(crate) fn column(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| DataFrameError::column_not_found(name))
}

fn eval_expr(expr: &Expr, batch: &RecordBatch, ctx: &ExecContext) -> Result<ArrayRef> {
    match expr {
        E::Column(name) => column(batch, name),
        E::Literal(value) => literal_array(value),
        E::Alias { expr, .. } => eval_expr(expr, batch, ctx),
        E::Wildcard => Err(DataFrameError::invalid_operation(
            "wildcard is only valid as a top-level projection",
        )),
        E::UnaryOp { op, expr } => {
            let v = eval_expr(expr, batch, ctx)?;
            eval_unary(*op, &v)
        }
        E::BinaryOp { left, op, right } => {
            let l = eval_expr(left, batch, ctx)?;
            let r = eval_expr(right, batch, ctx)?;
            eval_binary(*op, l, r, ctx)
        }
        E::Agg { func, expr } => {
            let v = eval_expr(expr, batch, ctx)?;
            kernels::reduce(*func, &v)
        }
        E::Cast {
            expr,
            dtype,
            strict,
        } => {
            let v = eval_expr(expr, batch, ctx)?;
            cast_array(&v, dtype, *strict, ctx.string_cache.as_ref())
        }
        E::Ternary {
            predicate,
            truthy,
            falsy,
        } => eval_ternary(predicate, truthy, falsy, batch, ctx),
        E::Window {
            function,
            partition_by,
        } => eval_window(function, partition_by, batch, ctx),
        E::Cumulative {
            func,
            expr,
            reverse,
        } => {
            let v = eval_expr(expr, batch, ctx)?;
            kernels::cumulative(*func, &v, *reverse)
        }
        E::Rolling {
            func,
            expr,
            options,
        } => {
            let v = eval_expr(expr, batch, ctx)?;
            kernels::rolling(*func, &v, options)
        }
        E::Sample { expr, spec } => {
            let v = eval_expr(expr, batch, ctx)?;
            let rows = kernels::sample_indices(v.len(), spec)?;
            kernels::take_rows(&v, &rows)
        }
        E::Shift { expr, periods } => {
            let v = eval_expr(expr, batch, ctx)?;
            kernels::shift(&v, *periods)
        }
        E::FillNull { expr, value } => {
            let v = eval_expr(expr, batch, ctx)?;
            let fill = eval_expr(value, batch, ctx)?;
            fill_null(v, fill)
        }
        E::Sort { expr, options } => {
            let v = eval_expr(expr, batch, ctx)?;
            let options = ArrowSortOptions {
                descending: options.descending,
                nulls_first: !options.nulls_last,
            };
            Ok(arrow::compute::sort(v.as_ref(), Some(options))?)
        }
        E::Function { input, function } => {
            let v = eval_expr(input, batch, ctx)?;
            functions::apply(function, &v)
        }
    }
}

fn literal_array(value: &LiteralValue) -> Result<ArrayRef> {
    let out: ArrayRef = match value {
        LiteralValue::Null => Arc::new(NullArray::new(1)),
        LiteralValue::Boolean(v) => Arc::new(BooleanArray::from(vec![*v])),
        LiteralValue::Int64(v) => Arc::new(Int64Array::from(vec![*v])),
        LiteralValue::UInt64(v) => Arc::new(UInt64Array::from(vec![*v])),
        LiteralValue::Float64(v) => Arc::new(Float64Array::from(vec![*v])),
        LiteralValue::Utf8(v) => Arc::new(StringArray::from(vec![v.as_str()])),
        LiteralValue::Datetime(v, TimeUnit::Milliseconds) => {
            Arc::new(TimestampMillisecondArray::from(vec![*v]))
        }
        LiteralValue::Datetime(v, TimeUnit::Microseconds) => {
            Arc::new(TimestampMicrosecondArray::from(vec![*v]))
        }
        LiteralValue::Datetime(v, TimeUnit::Nanoseconds) => {
            Arc::new(TimestampNanosecondArray::from(vec![*v]))
        }
        LiteralValue::Series(s) => s.to_array()?,
    };
    Ok(out)
}

fn eval_unary(op: UnaryOperator, v: &ArrayRef) -> Result<ArrayRef> {
    match op {
        UnaryOperator::Not => {
            let v = null_as_boolean(v)?;
            let b = as_boolean(&v)?;
            Ok(Arc::new(boolean::not(b)?))
        }
        UnaryOperator::Negate => Ok(numeric::neg(v.as_ref())?),
        UnaryOperator::IsNull => Ok(Arc::new(is_null(v.as_ref())?)),
        UnaryOperator::IsNotNull => Ok(Arc::new(is_not_null(v.as_ref())?)),
    }
}

fn as_boolean(v: &ArrayRef) -> Result<&BooleanArray> {
    v.as_boolean_opt().ok_or_else(|| {
        DataFrameError::type_mismatch(
            None::<String>,
            DataType::Boolean.to_string(),
            v.data_type().to_string(),
        )
    })
}

/// Length of an elementwise result over `arrays`; length-1 inputs broadcast.
pub(crate) fn common_len(arrays: &[&ArrayRef]) -> Result<usize> {
    let mut len = None;
    for a in arrays.iter().filter(|a| a.len() != 1) {
        match len {
            None => len = Some(a.len()),
            Some(l) if l != a.len() => {
                return Err(DataFrameError::schema_mismatch(format!(
                    "operands have incompatible lengths {l} and {}",
                    a.len()
                )))
            }
            Some(_) => {}
        }
    }
    Ok(len.unwrap_or(1))
}

fn eval_binary(op: Operator, lhs: ArrayRef, rhs: ArrayRef, ctx: &ExecContext) -> Result<ArrayRef> {
    let len = common_len(&[&lhs, &rhs])?;
    let (lhs, rhs) = if ctx.flags.type_coercion {
        coerce_pair(lhs, rhs)?
    } else {
        (lhs, rhs)
    };
    let (lt, rt) = (lhs.data_type(), rhs.data_type());
    if lt != rt && !lt.is_temporal() && !rt.is_temporal() {
        return Err(DataFrameError::type_mismatch(
            None::<String>,
            format!("operands of '{op}' with matching types ({lt})"),
            rt.to_string(),
        ));
    }

    // Integer division is true division.
    let (lhs, rhs) = if op == Operator::Div
        && lhs.data_type().is_integer()
        && rhs.data_type().is_integer()
    {
        (cast(&lhs, &DataType::Float64)?, cast(&rhs, &DataType::Float64)?)
    } else {
        (lhs, rhs)
    };

    match op {
        Operator::And => logical(&lhs, &rhs, len, boolean::and_kleene),
        Operator::Or => logical(&lhs, &rhs, len, boolean::or_kleene),
        Operator::Add => datum_op(&lhs, &rhs, len, numeric::add),
        Operator::Sub => datum_op(&lhs, &rhs, len, numeric::sub),
        Operator::Mul => datum_op(&lhs, &rhs, len, numeric::mul),
        Operator::Div => datum_op(&lhs, &rhs, len, numeric::div),
        Operator::Rem => datum_op(&lhs, &rhs, len, numeric::rem),
        Operator::Eq => datum_op(&lhs, &rhs, len, |l, r| Ok(Arc::new(cmp::eq(l, r)?))),
        Operator::Neq => datum_op(&lhs, &rhs, len, |l, r| Ok(Arc::new(cmp::neq(l, r)?))),
        Operator::Gt => datum_op(&lhs, &rhs, len, |l, r| Ok(Arc::new(cmp::gt(l, r)?))),
        Operator::Lt => datum_op(&lhs, &rhs, len, |l, r| Ok(Arc::new(cmp::lt(l, r)?))),
        Operator::Ge => datum_op(&lhs, &rhs, len, |l, r| Ok(Arc::new(cmp::gt_eq(l, r)?))),
        Operator::Le => datum_op(&lhs, &rhs, len, |l, r| Ok(Arc::new(cmp::lt_eq(l, r)?))),
    }
}

fn logical(
    lhs: &ArrayRef,
    rhs: &ArrayRef,
    len: usize,
    kernel: fn(&BooleanArray, &BooleanArray) -> std::result::Result<BooleanArray, ArrowError>,
) -> Result<ArrayRef> {
    let l = broadcast(&null_as_boolean(lhs)?, len)?;
    let r = broadcast(&null_as_boolean(rhs)?, len)?;
    Ok(Arc::new(kernel(as_boolean(&l)?, as_boolean(&r)?)?))
}

/// Clear the null bits of a mask, turning null slots into `false`.
fn null_as_false(mask: &BooleanArray) -> BooleanArray {
    if mask.null_count() == 0 {
        mask.clone()
    } else {
        prep_null_mask_filter(mask)
    }
}

fn null_as_boolean(v: &ArrayRef) -> Result<ArrayRef> {
    if v.data_type() == &DataType::Null {
        Ok(cast(v, &DataType::Boolean)?)
    } else {
        Ok(v.clone())
    }
}

/// Apply a `Datum` kernel, passing length-1 operands as scalars.
fn datum_op(
    lhs: &ArrayRef,
    rhs: &ArrayRef,
    len: usize,
    kernel: impl FnOnce(&dyn Datum, &dyn Datum) -> std::result::Result<ArrayRef, ArrowError>,
) -> Result<ArrayRef> {
    let l_scalar;
    let l: &dyn Datum = if lhs.len() == 1 && len != 1 {
        l_scalar = Scalar::new(lhs.clone());
        &l_scalar
    } else {
        lhs
    };
    let r_scalar;
    let r: &dyn Datum = if rhs.len() == 1 && len != 1 {
        r_scalar = Scalar::new(rhs.clone());
        &r_scalar
    } else {
        rhs
    };
    Ok(kernel(l, r)?)
}

fn coerce_pair(lhs: ArrayRef, rhs: ArrayRef) -> Result<(ArrayRef, ArrayRef)> {
    if lhs.data_type() == rhs.data_type() {
        return Ok((lhs, rhs));
    }
    match supertype(lhs.data_type(), rhs.data_type()) {
        Some(target) => Ok((cast_to(lhs, &target)?, cast_to(rhs, &target)?)),
        None => Ok((lhs, rhs)),
    }
}

fn cast_to(array: ArrayRef, target: &DataType) -> Result<ArrayRef> {
    if array.data_type() == target {
        Ok(array)
    } else {
        Ok(cast(&array, target)?)
    }
}

/// Smallest type both operands convert to without losing their meaning.
pub(crate) fn supertype(a: &DataType, b: &DataType) -> Option<DataType> {
    use DataType::*;

    if a == b {
        return Some(a.clone());
    }
    let is_text = |t: &DataType| matches!(t, Utf8 | LargeUtf8 | Utf8View | Dictionary(_, _));
    match (a, b) {
        (Null, t) | (t, Null) => Some(t.clone()),
        (x, y) if is_text(x) && is_text(y) => Some(Utf8),
        (Timestamp(unit, tz), Timestamp(_, _)) => Some(Timestamp(*unit, tz.clone())),
        (Timestamp(unit, tz), other) | (other, Timestamp(unit, tz))
            if matches!(other, Date32 | Date64) || is_text(other) =>
        {
            Some(Timestamp(*unit, tz.clone()))
        }
        (Date32, Date64) | (Date64, Date32) => Some(Date64),
        (date @ (Date32 | Date64), other) | (other, date @ (Date32 | Date64)) if is_text(other) => {
            Some(date.clone())
        }
        (Boolean, t) | (t, Boolean) if t.is_numeric() => Some(t.clone()),
        (x, y) if x.is_numeric() && y.is_numeric() => Some(numeric_supertype(x, y)),
        _ => None,
    }
}

fn numeric_supertype(a: &DataType, b: &DataType) -> DataType {
    let int_width = |t: &DataType| -> Option<(bool, u8)> {
        match t {
            DataType::Int8 => Some((true, 8)),
            DataType::Int16 => Some((true, 16)),
            DataType::Int32 => Some((true, 32)),
            DataType::Int64 => Some((true, 64)),
            DataType::UInt8 => Some((false, 8)),
            DataType::UInt16 => Some((false, 16)),
            DataType::UInt32 => Some((false, 32)),
            DataType::UInt64 => Some((false, 64)),
            _ => None,
        }
    };
    let (Some((sa, wa)), Some((sb, wb))) = (int_width(a), int_width(b)) else {
        return DataType::Float64;
    };
    let signed = |w: u8| match w {
        8 => DataType::Int8,
        16 => DataType::Int16,
        32 => DataType::Int32,
        _ => DataType::Int64,
    };
    match (sa, sb) {
        (true, true) => signed(wa.max(wb)),
        (false, false) => match wa.max(wb) {
            8 => DataType::UInt8,
            16 => DataType::UInt16,
            32 => DataType::UInt32,
            _ => DataType::UInt64,
        },
        (true, false) => signed(wa.max(wb.saturating_mul(2)).min(64)),
        (false, true) => signed(wb.max(wa.saturating_mul(2)).min(64)),
    }
}

/// Cast both arrays to their common type, or fail if there is none.
pub(crate) fn unify(a: ArrayRef, b: ArrayRef) -> Result<(ArrayRef, ArrayRef)> {
    if a.data_type() == b.data_type() {
        return Ok((a, b));
    }
    let target = supertype(a.data_type(), b.data_type()).ok_or_else(|| {
        DataFrameError::type_mismatch(None::<String>, a.data_type().to_string(), b.data_type().to_string())
    })?;
    Ok((cast_to(a, &target)?, cast_to(b, &target)?))
}

fn eval_ternary(
    predicate: &Expr,
    truthy: &Expr,
    falsy: &Expr,
    batch: &RecordBatch,
    ctx: &ExecContext,
) -> Result<ArrayRef> {
    let p = eval_expr(predicate, batch, ctx)?;
    let t = eval_expr(truthy, batch, ctx)?;
    let f = eval_expr(falsy, batch, ctx)?;
    let len = common_len(&[&p, &t, &f])?;

    let p = broadcast(&null_as_boolean(&p)?, len)?;
    let mask = null_as_false(as_boolean(&p)?);
    let (t, f) = unify(t, f)?;
    let (t, f) = (broadcast(&t, len)?, broadcast(&f, len)?);
    Ok(zip(&mask, &t, &f)?)
}

fn fill_null(values: ArrayRef, fill: ArrayRef) -> Result<ArrayRef> {
    if values.data_type() == &DataType::Null {
        return broadcast(&fill, values.len());
    }
    let fill = cast_to(fill, values.data_type())?;
    let fill = broadcast(&fill, values.len())?;
    let mask = is_not_null(values.as_ref())?;
    Ok(zip(&mask, &values, &fill)?)
}

/// Evaluate `function` per partition and scatter results back to row order.
fn eval_window(
    function: &Expr,
    partition_by: &[Expr],
    batch: &RecordBatch,
    ctx: &ExecContext,
) -> Result<ArrayRef> {
    let n = batch.num_rows();
    let keys = partition_by
        .iter()
        .map(|e| ExprEval::evaluate_full(e, batch, ctx))
        .collect::<Result<Vec<_>>>()?;
    let groups = KeyColumns::new(&keys)?.groups(n)?;
    if groups.is_empty() {
        let probe = eval_expr(function, batch, ctx)?;
        return Ok(new_empty_array(probe.data_type()));
    }

    let mut results = Vec::with_capacity(groups.len());
    for rows in &groups {
        let sub = take_record_batch(batch, &UInt32Array::from(rows.clone()))?;
        let out = eval_expr(function, &sub, ctx)?;
        if out.len() != 1 && out.len() != rows.len() {
            return Err(DataFrameError::schema_mismatch(format!(
                "window expression produced {} values for a partition of {} rows",
                out.len(),
                rows.len()
            )));
        }
        results.push(out);
    }

    let mut positions = vec![(0usize, 0usize); n];
    for (g, rows) in groups.iter().enumerate() {
        let scalar = results[g].len() == 1;
        for (p, &row) in rows.iter().enumerate() {
            positions[row as usize] = (g, if scalar { 0 } else { p });
        }
    }
    let refs: Vec<&dyn Array> = results.iter().map(|a| a.as_ref()).collect();
    Ok(interleave(&refs, &positions)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
    use arrow::record_batch::RecordBatch;

    use super::{supertype, ExprEval};
    use crate::expr::{col, lit, when};
    use crate::physical::executor::ExecContext;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("g", DataType::Utf8, true),
            Field::new("x", DataType::Int64, true),
            Field::new("f", DataType::Float64, true),
        ]));
        let g: ArrayRef = Arc::new(StringArray::from(vec!["a", "b", "a", "b"]));
        let x: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), Some(2), None, Some(4)]));
        let f: ArrayRef = Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5, 3.5]));
        RecordBatch::try_new(schema, vec![g, x, f]).unwrap()
    }

    fn ints(a: &ArrayRef) -> Vec<Option<i64>> {
        a.as_primitive::<Int64Type>().iter().collect()
    }

    #[test]
    fn literals_broadcast_in_arithmetic() {
        let ctx = ExecContext::default();
        let out = ExprEval::evaluate(&col("x").add(lit(10)), &batch(), &ctx).unwrap();
        assert_eq!(ints(&out), vec![Some(11), Some(12), None, Some(14)]);
    }

    #[test]
    fn mixed_numeric_operands_are_coerced() {
        let ctx = ExecContext::default();
        let out = ExprEval::evaluate(&col("x").add(col("f")), &batch(), &ctx).unwrap();
        let got: Vec<Option<f64>> = out.as_primitive::<Float64Type>().iter().collect();
        assert_eq!(got, vec![Some(1.5), Some(3.5), None, Some(7.5)]);
    }

    #[test]
    fn without_coercion_mismatched_operands_fail() {
        let mut ctx = ExecContext::default();
        ctx.flags.type_coercion = false;
        assert!(ExprEval::evaluate(&col("x").add(col("f")), &batch(), &ctx).is_err());
    }

    #[test]
    fn window_sum_scatters_back() {
        let ctx = ExecContext::default();
        let out = ExprEval::evaluate(&col("x").sum().over(["g"]), &batch(), &ctx).unwrap();
        assert_eq!(ints(&out), vec![Some(1), Some(6), Some(1), Some(6)]);
    }

    #[test]
    fn when_chain_picks_first_matching_branch() {
        let ctx = ExecContext::default();
        let expr = when(col("f").gt(lit(3.0)))
            .then(lit(3))
            .when(col("f").gt(lit(1.0)))
            .then(lit(2))
            .otherwise(lit(1));
        let out = ExprEval::evaluate(&expr, &batch(), &ctx).unwrap();
        assert_eq!(ints(&out), vec![Some(1), Some(2), Some(2), Some(3)]);
    }

    #[test]
    fn masks_with_and_without_nulls() {
        let ctx = ExecContext::default();
        let dense = ExprEval::evaluate_mask(&col("f").gt(lit(1.0)), &batch(), &ctx).unwrap();
        assert_eq!(dense.null_count(), 0);
        assert_eq!(dense.true_count(), 3);

        let sparse = ExprEval::evaluate_mask(&col("x").gt(lit(1)), &batch(), &ctx).unwrap();
        assert_eq!(sparse.null_count(), 0);
        let got: Vec<bool> = sparse.iter().map(|b| b == Some(true)).collect();
        assert_eq!(got, vec![false, true, false, true]);
    }

    #[test]
    fn fill_null_uses_the_column_type() {
        let ctx = ExecContext::default();
        let out = ExprEval::evaluate(&col("x").fill_null(0), &batch(), &ctx).unwrap();
        assert_eq!(ints(&out), vec![Some(1), Some(2), Some(0), Some(4)]);
    }

    #[test]
    fn supertypes() {
        assert_eq!(
            supertype(&DataType::Int32, &DataType::Int64),
            Some(DataType::Int64)
        );
        assert_eq!(
            supertype(&DataType::UInt32, &DataType::Int8),
            Some(DataType::Int64)
        );
        assert_eq!(
            supertype(&DataType::Int64, &DataType::Float32),
            Some(DataType::Float64)
        );
        assert_eq!(supertype(&DataType::Utf8, &DataType::Int64), None);
    }
}
