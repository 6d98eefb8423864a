use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type, TimeUnit as ArrowTimeUnit};
use arrow::record_batch::RecordBatch;

use crate::datatypes::TimeUnit;
use crate::lazy::{ClosedWindow, Duration, DynamicGroupOptions, RollingGroupOptions};
use crate::physical::executor::ExecContext;
use crate::physical::expr_eval::column;
use crate::physical::kernels::take_rows;
use crate::physical::keys::KeyColumns;
use crate::physical::operators::{aggregate_expr, build_batch};
use crate::{DataFrameError, Expr, Result};

/// Rolling window parameters with parsed durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RollingWindow {
    pub index_column: String,
    pub period: Duration,
    pub offset: Duration,
    pub closed: ClosedWindow,
    pub by: Vec<String>,
}

impl RollingWindow {
    pub(crate) fn from_options(options: &RollingGroupOptions) -> Result<Self> {
        let period = positive("period", Duration::parse(&options.period)?)?;
        let offset = match &options.offset {
            Some(offset) => Duration::parse(offset)?,
            None => period.negate(),
        };
        same_kind(period, offset)?;
        Ok(Self {
            index_column: options.index_column.clone(),
            period,
            offset,
            closed: options.closed,
            by: options.by.clone(),
        })
    }
}

/// Dynamic (fixed-grid) window parameters with parsed durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DynamicWindow {
    pub index_column: String,
    pub every: Duration,
    pub period: Duration,
    pub offset: Duration,
    pub truncate: bool,
    pub include_boundaries: bool,
    pub closed: ClosedWindow,
    pub by: Vec<String>,
}

impl DynamicWindow {
    pub(crate) fn from_options(options: &DynamicGroupOptions) -> Result<Self> {
        let every = positive("every", Duration::parse(&options.every)?)?;
        let period = match &options.period {
            Some(period) => positive("period", Duration::parse(period)?)?,
            None => every,
        };
        let offset = match &options.offset {
            Some(offset) => Duration::parse(offset)?,
            None if every.is_index() => Duration::Index(0),
            None => Duration::Time { nanos: 0 },
        };
        same_kind(every, period)?;
        same_kind(every, offset)?;
        Ok(Self {
            index_column: options.index_column.clone(),
            every,
            period,
            offset,
            truncate: options.truncate,
            include_boundaries: options.include_boundaries,
            closed: options.closed,
            by: options.by.clone(),
        })
    }
}

fn positive(option: &str, d: Duration) -> Result<Duration> {
    if d.in_unit(None) <= 0 {
        return Err(DataFrameError::configuration(
            option,
            format!("window {option} must be positive, got {d}"),
        ));
    }
    Ok(d)
}

fn same_kind(a: Duration, b: Duration) -> Result<()> {
    // A zero offset parses as a time duration and fits either kind.
    if a.is_index() != b.is_index() && b.in_unit(None) != 0 {
        return Err(DataFrameError::configuration(
            "duration",
            format!("cannot mix index and time durations ({a} and {b})"),
        ));
    }
    Ok(())
}

/// The index column reduced to `i64` ticks.
struct IndexColumn {
    values: Vec<i64>,
    /// Tick unit for temporal indices; `None` for integer indices.
    unit: Option<TimeUnit>,
    /// Type used for window labels and boundaries.
    label_type: DataType,
}

impl IndexColumn {
    fn new(name: &str, array: &ArrayRef) -> Result<Self> {
        let (ticks, unit, label_type) = match array.data_type() {
            DataType::Timestamp(ArrowTimeUnit::Second, tz) => {
                let target = DataType::Timestamp(ArrowTimeUnit::Millisecond, tz.clone());
                let ticks = cast(array, &target)?;
                (ticks, Some(TimeUnit::Milliseconds), target)
            }
            DataType::Timestamp(unit, _) => (
                array.clone(),
                Some(TimeUnit::from_arrow(unit)),
                array.data_type().clone(),
            ),
            DataType::Date32 | DataType::Date64 => {
                let target = DataType::Timestamp(ArrowTimeUnit::Millisecond, None);
                (cast(array, &target)?, Some(TimeUnit::Milliseconds), target)
            }
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32 => (array.clone(), None, DataType::Int64),
            other => {
                return Err(DataFrameError::type_mismatch(
                    Some(name.to_string()),
                    "temporal or integer index".to_string(),
                    other.to_string(),
                ))
            }
        };
        let ticks = cast(&ticks, &DataType::Int64)?;
        let ticks = ticks.as_primitive::<Int64Type>();
        if ticks.null_count() > 0 {
            return Err(DataFrameError::invalid_operation(format!(
                "index column '{name}' contains nulls"
            )));
        }
        Ok(Self {
            values: ticks.values().to_vec(),
            unit,
            label_type,
        })
    }

    /// Length of `d` in index ticks.
    fn ticks(&self, d: Duration) -> Result<i64> {
        match (d.is_index(), self.unit) {
            (true, Some(_)) if d.in_unit(None) != 0 => Err(DataFrameError::configuration(
                "duration",
                format!("index duration '{d}' used with a temporal index column"),
            )),
            (false, None) if d.in_unit(None) != 0 => Err(DataFrameError::configuration(
                "duration",
                format!("time duration '{d}' used with an integer index column"),
            )),
            _ => Ok(d.in_unit(self.unit)),
        }
    }

    fn labels(&self, ticks: Vec<i64>) -> Result<ArrayRef> {
        let array: ArrayRef = Arc::new(Int64Array::from(ticks));
        Ok(cast(&array, &self.label_type)?)
    }
}

/// Rows of `group` whose index lies in the window starting at `start`.
///
/// `group` must be sorted by index value.
fn window_rows(
    values: &[i64],
    group: &[u32],
    start: i64,
    stop: i64,
    closed: ClosedWindow,
) -> Vec<u32> {
    let value = |row: &u32| values[*row as usize];
    let lo = match closed {
        ClosedWindow::Left | ClosedWindow::Both => group.partition_point(|r| value(r) < start),
        ClosedWindow::Right | ClosedWindow::None => group.partition_point(|r| value(r) <= start),
    };
    let hi = match closed {
        ClosedWindow::Right | ClosedWindow::Both => group.partition_point(|r| value(r) <= stop),
        ClosedWindow::Left | ClosedWindow::None => group.partition_point(|r| value(r) < stop),
    };
    if hi <= lo {
        Vec::new()
    } else {
        group[lo..hi].to_vec()
    }
}

fn partitions(batch: &RecordBatch, by: &[String]) -> Result<(Vec<ArrayRef>, Vec<Vec<u32>>)> {
    let by_arrays = by
        .iter()
        .map(|b| column(batch, b))
        .collect::<Result<Vec<_>>>()?;
    let groups = if by_arrays.is_empty() {
        vec![(0..batch.num_rows() as u32).collect()]
    } else {
        KeyColumns::new(&by_arrays)?.groups(batch.num_rows())?
    };
    Ok((by_arrays, groups))
}

/// One output row per input row, aggregating the window that ends at it.
pub(crate) fn rolling_aggregate(
    batch: &RecordBatch,
    window: &RollingWindow,
    aggs: &[Expr],
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    let index_array = column(batch, &window.index_column)?;
    let index = IndexColumn::new(&window.index_column, &index_array)?;
    let period = index.ticks(window.period)?;
    let offset = index.ticks(window.offset)?;
    let (by_arrays, groups) = partitions(batch, &window.by)?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    let mut windows = Vec::with_capacity(batch.num_rows());
    for group in &groups {
        for &row in group {
            let start = index.values[row as usize] + offset;
            windows.push(window_rows(
                &index.values,
                group,
                start,
                start + period,
                window.closed,
            ));
            rows.push(row);
        }
    }
    tracing::trace!(windows = windows.len(), "rolling windows built");

    let mut columns = Vec::with_capacity(window.by.len() + aggs.len() + 1);
    for (name, array) in window.by.iter().zip(&by_arrays) {
        columns.push((name.clone(), take_rows(array, &rows)?));
    }
    columns.push((window.index_column.clone(), take_rows(&index_array, &rows)?));
    for agg in aggs {
        columns.push((agg.output_name(), aggregate_expr(agg, batch, &windows, ctx)?));
    }
    build_batch(columns, rows.len())
}

/// Aggregate over a fixed grid of windows; empty windows are skipped.
pub(crate) fn dynamic_aggregate(
    batch: &RecordBatch,
    window: &DynamicWindow,
    aggs: &[Expr],
    ctx: &ExecContext,
) -> Result<RecordBatch> {
    let index_array = column(batch, &window.index_column)?;
    let index = IndexColumn::new(&window.index_column, &index_array)?;
    let every = index.ticks(window.every)?;
    let period = index.ticks(window.period)?;
    let offset = index.ticks(window.offset)?;
    let (by_arrays, groups) = partitions(batch, &window.by)?;

    let mut key_rows = Vec::new();
    let mut labels = Vec::new();
    let mut lower = Vec::new();
    let mut upper = Vec::new();
    let mut windows = Vec::new();
    for group in &groups {
        let (Some(t_min), Some(t_max)) = (
            group.iter().map(|r| index.values[*r as usize]).min(),
            group.iter().map(|r| index.values[*r as usize]).max(),
        ) else {
            continue;
        };
        let mut start = t_min.div_euclid(every) * every + offset;
        while start <= t_max {
            let stop = start + period;
            let rows = window_rows(&index.values, group, start, stop, window.closed);
            if let Some(&first) = rows.first() {
                key_rows.push(group[0]);
                labels.push(if window.truncate {
                    start
                } else {
                    index.values[first as usize]
                });
                lower.push(start);
                upper.push(stop);
                windows.push(rows);
            }
            start += every;
        }
    }
    tracing::trace!(windows = windows.len(), "dynamic windows built");

    let mut columns = Vec::with_capacity(window.by.len() + aggs.len() + 3);
    for (name, array) in window.by.iter().zip(&by_arrays) {
        columns.push((name.clone(), take_rows(array, &key_rows)?));
    }
    if window.include_boundaries {
        columns.push(("_lower_boundary".to_string(), index.labels(lower)?));
        columns.push(("_upper_boundary".to_string(), index.labels(upper)?));
    }
    columns.push((window.index_column.clone(), index.labels(labels)?));
    for agg in aggs {
        columns.push((agg.output_name(), aggregate_expr(agg, batch, &windows, ctx)?));
    }
    build_batch(columns, windows.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array, TimestampMillisecondArray};
    use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, TimeUnit};
    use arrow::record_batch::RecordBatch;

    use super::{dynamic_aggregate, rolling_aggregate, DynamicWindow, RollingWindow};
    use crate::expr::col;
    use crate::lazy::{ClosedWindow, DynamicGroupOptions, RollingGroupOptions};
    use crate::physical::executor::ExecContext;

    fn int_index() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("t", DataType::Int64, true),
            Field::new("v", DataType::Float64, true),
        ]));
        let t: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 5, 8]));
        let v: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
        RecordBatch::try_new(schema, vec![t, v]).unwrap()
    }

    #[test]
    fn rolling_sums_trailing_window() {
        let window = RollingWindow::from_options(&RollingGroupOptions::new("t", "2i")).unwrap();
        let out = rolling_aggregate(&int_index(), &window, &[col("v").sum()], &ExecContext::default())
            .unwrap();
        let sums: Vec<_> = out.column(1).as_primitive::<Float64Type>().values().to_vec();
        // windows (t-2, t]: {1}, {1,2}, {2,3}, {5}, {8}
        assert_eq!(sums, vec![1.0, 3.0, 5.0, 4.0, 5.0]);
    }

    #[test]
    fn dynamic_windows_skip_empty_buckets() {
        let options = DynamicGroupOptions::new("t", "3i").with_include_boundaries(true);
        let window = DynamicWindow::from_options(&options).unwrap();
        let out = dynamic_aggregate(&int_index(), &window, &[col("v").count()], &ExecContext::default())
            .unwrap();
        let names: Vec<_> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["_lower_boundary", "_upper_boundary", "t", "v"]);
        let labels: Vec<_> = out.column(2).as_primitive::<Int64Type>().values().to_vec();
        // [0,3) {1,2}, [3,6) {3,5}, [6,9) {8}
        assert_eq!(labels, vec![0, 3, 6]);
    }

    #[test]
    fn time_durations_need_a_temporal_index() {
        let window = RollingWindow::from_options(&RollingGroupOptions::new("t", "1h")).unwrap();
        let err = rolling_aggregate(&int_index(), &window, &[], &ExecContext::default()).unwrap_err();
        assert!(err.to_string().contains("integer index"));
    }

    #[test]
    fn hourly_buckets_on_timestamps() {
        let hour = 3_600_000;
        let schema = Arc::new(Schema::new(vec![
            Field::new("ts", DataType::Timestamp(TimeUnit::Millisecond, None), true),
            Field::new("v", DataType::Int64, true),
        ]));
        let ts: ArrayRef = Arc::new(TimestampMillisecondArray::from(vec![
            0,
            hour / 2,
            hour + 1,
            3 * hour,
        ]));
        let v: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 4]));
        let batch = RecordBatch::try_new(schema, vec![ts, v]).unwrap();

        let options = DynamicGroupOptions::new("ts", "1h").with_closed(ClosedWindow::Left);
        let window = DynamicWindow::from_options(&options).unwrap();
        let out = dynamic_aggregate(&batch, &window, &[col("v").sum()], &ExecContext::default())
            .unwrap();
        assert_eq!(out.num_rows(), 3);
        let sums: Vec<_> = out.column(1).as_primitive::<Int64Type>().values().to_vec();
        assert_eq!(sums, vec![3, 3, 4]);
    }

    #[test]
    fn non_positive_every_is_rejected() {
        let err = DynamicWindow::from_options(&DynamicGroupOptions::new("t", "0i")).unwrap_err();
        assert!(err.to_string().contains("every"));
    }
}
