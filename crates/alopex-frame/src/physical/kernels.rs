use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, Float64Array, Int64Array, UInt32Array, UInt64Array,
};
use arrow::compute::{cast, concat, sort_to_indices, take, SortOptions as ArrowSortOptions};
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::expr::{AggFunc, CumulativeFunc, RollingFunc, RollingSpec, SampleSpec};
use crate::physical::keys::KeyColumns;
use crate::{DataFrameError, Result};

/// Repeat a length-1 array `len` times; arrays of length `len` pass through.
pub(crate) fn broadcast(array: &ArrayRef, len: usize) -> Result<ArrayRef> {
    if array.len() == len {
        return Ok(array.clone());
    }
    if array.len() != 1 {
        return Err(DataFrameError::schema_mismatch(format!(
            "cannot broadcast a column of length {} to length {len}",
            array.len()
        )));
    }
    let indices = UInt32Array::from(vec![0u32; len]);
    Ok(take(array.as_ref(), &indices, None)?)
}

pub(crate) fn take_rows(array: &ArrayRef, rows: &[u32]) -> Result<ArrayRef> {
    let indices = UInt32Array::from(rows.to_vec());
    Ok(take(array.as_ref(), &indices, None)?)
}

/// Row positions for a sample of `len` rows.
///
/// Positions come back ascending unless `shuffle` is set.
pub(crate) fn sample_indices(len: usize, spec: &SampleSpec) -> Result<Vec<u32>> {
    let n = spec.size.count(len);
    let mut rng = match spec.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut indices: Vec<u32> = if spec.with_replacement {
        if len == 0 && n > 0 {
            return Err(DataFrameError::invalid_argument(
                "cannot sample with replacement from an empty column",
            ));
        }
        (0..n).map(|_| rng.gen_range(0..len) as u32).collect()
    } else {
        if n > len {
            return Err(DataFrameError::invalid_argument(format!(
                "cannot take a larger sample ({n}) than the population ({len}) without replacement"
            )));
        }
        rand::seq::index::sample(&mut rng, len, n)
            .into_iter()
            .map(|i| i as u32)
            .collect()
    };

    if !spec.shuffle {
        indices.sort_unstable();
    }
    Ok(indices)
}

pub(crate) fn shift(values: &ArrayRef, periods: i64) -> Result<ArrayRef> {
    let len = values.len();
    let k = usize::try_from(periods.unsigned_abs()).map_or(len, |k| k.min(len));
    if k == 0 {
        return Ok(values.clone());
    }
    let nulls = new_null_array(values.data_type(), k);
    let kept = if periods > 0 {
        values.slice(0, len - k)
    } else {
        values.slice(k, len - k)
    };
    let parts: [&dyn Array; 2] = if periods > 0 {
        [nulls.as_ref(), kept.as_ref()]
    } else {
        [kept.as_ref(), nulls.as_ref()]
    };
    Ok(concat(&parts)?)
}

fn is_summable(dtype: &DataType) -> bool {
    dtype.is_numeric() || dtype == &DataType::Boolean
}

fn require_numeric(dtype: &DataType, what: &str) -> Result<()> {
    if is_summable(dtype) {
        Ok(())
    } else {
        Err(DataFrameError::type_mismatch(
            None::<String>,
            format!("numeric input for {what}"),
            dtype.to_string(),
        ))
    }
}

/// Non-null values as `f64`.
pub(crate) fn f64_values(values: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let as_f64 = cast(values, &DataType::Float64)?;
    Ok(as_f64.as_primitive::<Float64Type>().iter().collect())
}

fn float_scalar(v: Option<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(vec![v]))
}

/// Reduce `values` to a length-1 array.
pub(crate) fn reduce(func: AggFunc, values: &ArrayRef) -> Result<ArrayRef> {
    let dtype = values.data_type();
    let out: ArrayRef = match func {
        AggFunc::Count => Arc::new(UInt32Array::from(vec![
            (values.len() - values.null_count()) as u32,
        ])),
        AggFunc::NUnique => {
            let groups = KeyColumns::new(std::slice::from_ref(values))?.groups(values.len())?;
            Arc::new(UInt32Array::from(vec![groups.len() as u32]))
        }
        AggFunc::First | AggFunc::Last => {
            if values.is_empty() {
                new_null_array(dtype, 1)
            } else if func == AggFunc::First {
                values.slice(0, 1)
            } else {
                values.slice(values.len() - 1, 1)
            }
        }
        AggFunc::Min | AggFunc::Max => {
            if values.is_empty() {
                return Ok(new_null_array(dtype, 1));
            }
            let options = ArrowSortOptions {
                descending: func == AggFunc::Max,
                nulls_first: false,
            };
            let idx = sort_to_indices(values.as_ref(), Some(options), Some(1))?;
            take(values.as_ref(), &idx, None)?
        }
        AggFunc::Sum => {
            require_numeric(dtype, "sum")?;
            match sum_type(dtype) {
                DataType::Float64 => {
                    let v = cast(values, &DataType::Float64)?;
                    let total = arrow::compute::sum(v.as_primitive::<Float64Type>());
                    Arc::new(Float64Array::from(vec![total.unwrap_or(0.0)]))
                }
                DataType::UInt64 => {
                    let v = cast(values, &DataType::UInt64)?;
                    let total = arrow::compute::sum(v.as_primitive::<UInt64Type>());
                    Arc::new(UInt64Array::from(vec![total.unwrap_or(0)]))
                }
                _ => {
                    let v = cast(values, &DataType::Int64)?;
                    let total = arrow::compute::sum(v.as_primitive::<Int64Type>());
                    Arc::new(Int64Array::from(vec![total.unwrap_or(0)]))
                }
            }
        }
        AggFunc::Mean => {
            require_numeric(dtype, "mean")?;
            let xs = present(f64_values(values)?);
            float_scalar(mean(&xs))
        }
        AggFunc::Median => {
            require_numeric(dtype, "median")?;
            let mut xs = present(f64_values(values)?);
            float_scalar(quantile(&mut xs, 0.5))
        }
        AggFunc::Var { ddof } => {
            require_numeric(dtype, "var")?;
            let xs = present(f64_values(values)?);
            float_scalar(variance(&xs, ddof))
        }
        AggFunc::Std { ddof } => {
            require_numeric(dtype, "std")?;
            let xs = present(f64_values(values)?);
            float_scalar(variance(&xs, ddof).map(f64::sqrt))
        }
    };
    Ok(out)
}

fn sum_type(dtype: &DataType) -> DataType {
    match dtype {
        DataType::Float16 | DataType::Float32 | DataType::Float64 => DataType::Float64,
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => DataType::Float64,
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            DataType::UInt64
        }
        _ => DataType::Int64,
    }
}

fn present(values: Vec<Option<f64>>) -> Vec<f64> {
    values.into_iter().flatten().collect()
}

fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

fn variance(xs: &[f64], ddof: u8) -> Option<f64> {
    let n = xs.len();
    if n <= ddof as usize {
        return None;
    }
    let m = mean(xs)?;
    let ss: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
    Some(ss / (n - ddof as usize) as f64)
}

/// Linear-interpolated quantile; sorts `xs` in place.
fn quantile(xs: &mut [f64], q: f64) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    xs.sort_by(f64::total_cmp);
    let pos = q * (xs.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(xs[lo] + (xs[hi] - xs[lo]) * frac)
}

fn skew(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    let n = xs.len() as f64;
    let m2 = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    let m3 = xs.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n;
    Some(m3 / m2.powf(1.5))
}

/// Running aggregate; nulls stay null and do not reset the accumulator.
pub(crate) fn cumulative(func: CumulativeFunc, values: &ArrayRef, reverse: bool) -> Result<ArrayRef> {
    match func {
        CumulativeFunc::Count => {
            let valid: Vec<Option<u32>> = (0..values.len())
                .map(|i| Some(values.is_valid(i) as u32))
                .collect();
            Ok(Arc::new(UInt32Array::from(scan(valid, reverse, |a, b| a + b))))
        }
        CumulativeFunc::Sum => numeric_scan(values, reverse, |a, b| a + b, i64::wrapping_add),
        CumulativeFunc::Prod => numeric_scan(values, reverse, |a, b| a * b, i64::wrapping_mul),
        CumulativeFunc::Min => numeric_scan(values, reverse, f64::min, i64::min),
        CumulativeFunc::Max => numeric_scan(values, reverse, f64::max, i64::max),
    }
}

fn numeric_scan(
    values: &ArrayRef,
    reverse: bool,
    float_op: fn(f64, f64) -> f64,
    int_op: fn(i64, i64) -> i64,
) -> Result<ArrayRef> {
    let dtype = values.data_type();
    require_numeric(dtype, "cumulative aggregation")?;
    if sum_type(dtype) == DataType::Float64 {
        let xs = f64_values(values)?;
        return Ok(Arc::new(Float64Array::from(scan(xs, reverse, float_op))));
    }
    let as_i64 = cast(values, &DataType::Int64)?;
    let xs: Vec<Option<i64>> = as_i64.as_primitive::<Int64Type>().iter().collect();
    Ok(Arc::new(Int64Array::from(scan(xs, reverse, int_op))))
}

fn scan<T: Copy>(values: Vec<Option<T>>, reverse: bool, op: impl Fn(T, T) -> T) -> Vec<Option<T>> {
    let n = values.len();
    let mut out = vec![None; n];
    let mut acc: Option<T> = None;
    let mut step = |i: usize| {
        if let Some(v) = values[i] {
            let next = match acc {
                Some(a) => op(a, v),
                None => v,
            };
            acc = Some(next);
            out[i] = Some(next);
        }
    };
    if reverse {
        (0..n).rev().for_each(&mut step);
    } else {
        (0..n).for_each(&mut step);
    }
    out
}

/// Sliding-window statistic over the preceding (or centered) `window_size` rows.
pub(crate) fn rolling(func: RollingFunc, values: &ArrayRef, spec: &RollingSpec) -> Result<ArrayRef> {
    require_numeric(values.data_type(), "rolling aggregation")?;
    let window = spec.window_len()?;
    if window == 0 {
        return Err(DataFrameError::invalid_argument("window_size must be positive"));
    }
    if let Some(w) = &spec.weights {
        if w.len() != window {
            return Err(DataFrameError::invalid_argument(format!(
                "expected {window} weights, got {}",
                w.len()
            )));
        }
    }
    if let RollingFunc::Quantile(q) = func {
        if !(0.0..=1.0).contains(&q) {
            return Err(DataFrameError::invalid_argument(format!(
                "quantile must be within [0, 1], got {q}"
            )));
        }
    }

    let xs = f64_values(values)?;
    let n = xs.len() as i64;
    let w = window as i64;
    let mut out = Vec::with_capacity(xs.len());
    let mut buf = Vec::with_capacity(window);
    let mut weights = Vec::with_capacity(window);
    for i in 0..n {
        let start = if spec.center { i - w / 2 } else { i + 1 - w };
        buf.clear();
        weights.clear();
        for j in start.max(0)..(start + w).min(n) {
            if let Some(x) = xs[j as usize] {
                buf.push(x);
                weights.push(
                    spec.weights
                        .as_ref()
                        .map_or(1.0, |ws| ws[(j - start) as usize]),
                );
            }
        }
        if buf.len() < spec.min_periods.max(1) {
            out.push(None);
            continue;
        }
        let weighted = spec.weights.is_some();
        if weighted && !matches!(func, RollingFunc::Mean | RollingFunc::Var | RollingFunc::Std) {
            buf.iter_mut().zip(&weights).for_each(|(x, w)| *x *= w);
        }
        out.push(match func {
            RollingFunc::Sum => Some(buf.iter().sum()),
            RollingFunc::Mean if weighted => weighted_mean(&buf, &weights),
            RollingFunc::Mean => mean(&buf),
            RollingFunc::Min => buf.iter().copied().reduce(f64::min),
            RollingFunc::Max => buf.iter().copied().reduce(f64::max),
            RollingFunc::Var if weighted => weighted_variance(&buf, &weights),
            RollingFunc::Var => variance(&buf, 1),
            RollingFunc::Std if weighted => weighted_variance(&buf, &weights).map(f64::sqrt),
            RollingFunc::Std => variance(&buf, 1).map(f64::sqrt),
            RollingFunc::Median => quantile(&mut buf, 0.5),
            RollingFunc::Quantile(q) => quantile(&mut buf, q),
            RollingFunc::Skew => skew(&buf),
        });
    }
    Ok(Arc::new(Float64Array::from(out)))
}

/// Mean with `weights` normalised to sum to one.
fn weighted_mean(xs: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return None;
    }
    Some(xs.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>() / total)
}

/// Unbiased variance under reliability weights; equal weights give `ddof = 1`.
fn weighted_variance(xs: &[f64], weights: &[f64]) -> Option<f64> {
    let v1: f64 = weights.iter().sum();
    let v2: f64 = weights.iter().map(|w| w * w).sum();
    let denom = v1 - v2 / v1;
    if v1 == 0.0 || denom <= 0.0 {
        return None;
    }
    let m = weighted_mean(xs, weights)?;
    let ss: f64 = xs.iter().zip(weights).map(|(x, w)| w * (x - m).powi(2)).sum();
    Some(ss / denom)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array};
    use arrow::datatypes::{Float64Type, Int64Type};

    use super::{cumulative, reduce, rolling, sample_indices, shift};
    use crate::expr::{
        AggFunc, CumulativeFunc, RollingArgs, RollingFunc, RollingOptions, SampleArgs,
    };

    fn ints(v: Vec<Option<i64>>) -> ArrayRef {
        Arc::new(Int64Array::from(v))
    }

    fn floats(a: &ArrayRef) -> Vec<Option<f64>> {
        a.as_primitive::<Float64Type>().iter().collect()
    }

    #[test]
    fn reductions_skip_nulls() {
        let a = ints(vec![Some(3), None, Some(1), Some(2)]);
        let sum = reduce(AggFunc::Sum, &a).unwrap();
        assert_eq!(sum.as_primitive::<Int64Type>().value(0), 6);
        let min = reduce(AggFunc::Min, &a).unwrap();
        assert_eq!(min.as_primitive::<Int64Type>().value(0), 1);
        let max = reduce(AggFunc::Max, &a).unwrap();
        assert_eq!(max.as_primitive::<Int64Type>().value(0), 3);
        let mean = reduce(AggFunc::Mean, &a).unwrap();
        assert_eq!(floats(&mean), vec![Some(2.0)]);
        let count = reduce(AggFunc::Count, &a).unwrap();
        assert_eq!(count.as_primitive::<arrow::datatypes::UInt32Type>().value(0), 3);
        let var = reduce(AggFunc::Var { ddof: 1 }, &a).unwrap();
        assert_eq!(floats(&var), vec![Some(1.0)]);
    }

    #[test]
    fn first_of_empty_is_null() {
        let a = ints(vec![]);
        let first = reduce(AggFunc::First, &a).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first.is_null(0));
    }

    #[test]
    fn cumulative_sum_keeps_null_positions() {
        let a = ints(vec![Some(1), None, Some(2), Some(3)]);
        let out = cumulative(CumulativeFunc::Sum, &a, false).unwrap();
        let got: Vec<Option<i64>> = out.as_primitive::<Int64Type>().iter().collect();
        assert_eq!(got, vec![Some(1), None, Some(3), Some(6)]);

        let rev = cumulative(CumulativeFunc::Sum, &a, true).unwrap();
        let got: Vec<Option<i64>> = rev.as_primitive::<Int64Type>().iter().collect();
        assert_eq!(got, vec![Some(6), None, Some(5), Some(3)]);
    }

    #[test]
    fn rolling_sum_respects_min_periods() {
        let a: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0]));
        let spec = RollingArgs::from(2).resolve();
        let out = rolling(RollingFunc::Sum, &a, &spec).unwrap();
        assert_eq!(floats(&out), vec![None, Some(3.0), Some(5.0), Some(7.0)]);

        let spec = RollingArgs::from(RollingOptions::new(2).with_min_periods(1)).resolve();
        let out = rolling(RollingFunc::Sum, &a, &spec).unwrap();
        assert_eq!(floats(&out), vec![Some(1.0), Some(3.0), Some(5.0), Some(7.0)]);
    }

    #[test]
    fn rolling_weights_must_match_window() {
        let a: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0]));
        let spec = RollingArgs::from(RollingOptions::new(2).with_weights(vec![1.0])).resolve();
        assert!(rolling(RollingFunc::Mean, &a, &spec).is_err());
    }

    #[test]
    fn weighted_mean_normalises_weights() {
        let a: ArrayRef = Arc::new(Float64Array::from(vec![2.0, 4.0, 6.0]));
        let spec =
            RollingArgs::from(RollingOptions::new(2).with_weights(vec![0.5, 0.5])).resolve();
        let out = rolling(RollingFunc::Mean, &a, &spec).unwrap();
        assert_eq!(floats(&out), vec![None, Some(3.0), Some(5.0)]);

        let spec =
            RollingArgs::from(RollingOptions::new(2).with_weights(vec![1.0, 3.0])).resolve();
        let out = rolling(RollingFunc::Mean, &a, &spec).unwrap();
        assert_eq!(floats(&out), vec![None, Some(3.5), Some(5.5)]);
        let out = rolling(RollingFunc::Sum, &a, &spec).unwrap();
        assert_eq!(floats(&out), vec![None, Some(14.0), Some(22.0)]);
    }

    #[test]
    fn equal_weights_leave_variance_unchanged() {
        let a: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 3.0, 7.0]));
        let plain = rolling(RollingFunc::Var, &a, &RollingArgs::from(2).resolve()).unwrap();
        let spec =
            RollingArgs::from(RollingOptions::new(2).with_weights(vec![2.0, 2.0])).resolve();
        let weighted = rolling(RollingFunc::Var, &a, &spec).unwrap();
        assert_eq!(floats(&plain), vec![None, Some(2.0), Some(8.0)]);
        assert_eq!(floats(&weighted), floats(&plain));
    }

    #[test]
    fn shift_pads_with_nulls() {
        let a = ints(vec![Some(1), Some(2), Some(3)]);
        let fwd = shift(&a, 1).unwrap();
        let got: Vec<Option<i64>> = fwd.as_primitive::<Int64Type>().iter().collect();
        assert_eq!(got, vec![None, Some(1), Some(2)]);
        let back = shift(&a, -2).unwrap();
        let got: Vec<Option<i64>> = back.as_primitive::<Int64Type>().iter().collect();
        assert_eq!(got, vec![Some(3), None, None]);
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let spec = SampleArgs::N(3).resolve().unwrap();
        let spec = crate::expr::SampleSpec {
            seed: Some(7),
            ..spec
        };
        let a = sample_indices(10, &spec).unwrap();
        let b = sample_indices(10, &spec).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn oversampling_without_replacement_fails() {
        let spec = SampleArgs::N(5).resolve().unwrap();
        assert!(sample_indices(3, &spec).is_err());
    }
}
