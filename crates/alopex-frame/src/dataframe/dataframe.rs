use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StructArray, UInt32Array};
use arrow::datatypes::{Field as ArrowField, Schema as ArrowSchema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::construction::extract::value_at;
use crate::construction::{infer_column_type, ColumnBuilder, HostValue};
use crate::datatypes::{Field, Schema};
use crate::expr::SampleArgs;
use crate::lazy::CollectOptions;
use crate::physical::kernels::sample_indices;
use crate::{DataFrameError, Expr, LazyFrame, Result, Series};

/// An eager table backed by one or more Arrow `RecordBatch` values.
#[derive(Debug, Clone)]
pub struct DataFrame {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl DataFrame {
    /// Construct a `DataFrame` from a list of `Series`.
    ///
    /// Chunk boundaries do not need to align across series as long as total lengths match.
    pub fn new(columns: Vec<Series>) -> Result<Self> {
        if columns.is_empty() {
            return Ok(Self::empty());
        }

        let mut seen_names = HashSet::with_capacity(columns.len());
        for c in &columns {
            if !seen_names.insert(c.name().to_string()) {
                return Err(DataFrameError::schema_mismatch(format!(
                    "duplicate column name '{}'",
                    c.name()
                )));
            }
        }

        let expected_len = columns[0].len();
        for c in &columns[1..] {
            if c.len() != expected_len {
                return Err(DataFrameError::schema_mismatch(format!(
                    "column length mismatch: '{}' has length {}, expected {}",
                    c.name(),
                    c.len(),
                    expected_len
                )));
            }
        }

        let fields: Vec<ArrowField> = columns
            .iter()
            .map(|c| ArrowField::new(c.name(), c.arrow_dtype(), true))
            .collect();
        let schema: SchemaRef = Arc::new(ArrowSchema::new(fields));

        let arrays = columns
            .iter()
            .map(Series::to_array)
            .collect::<Result<Vec<_>>>()?;

        let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(|e| {
            DataFrameError::schema_mismatch(format!("failed to build RecordBatch: {e}"))
        })?;

        Ok(Self {
            schema,
            batches: vec![batch],
        })
    }

    /// Construct a `DataFrame` from Arrow record batches (all batches must share the same schema).
    pub fn from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        if batches.is_empty() {
            return Ok(Self::empty());
        }

        let schema = batches[0].schema();
        for (i, b) in batches.iter().enumerate().skip(1) {
            if b.schema().as_ref() != schema.as_ref() {
                return Err(DataFrameError::schema_mismatch(format!(
                    "schema mismatch between batches: batch 0 != batch {i}"
                )));
            }
        }

        Ok(Self { schema, batches })
    }

    /// Alias for `DataFrame::new`.
    pub fn from_series(series: Vec<Series>) -> Result<Self> {
        Self::new(series)
    }

    /// Build a frame from row-oriented records.
    ///
    /// Without a schema, columns appear in first-seen key order and each
    /// column type is inferred from its values. Missing keys become nulls.
    pub fn from_rows(rows: &[HostValue], schema: Option<&Schema>) -> Result<Self> {
        if let Some(bad) = rows
            .iter()
            .find(|r| !matches!(r, HostValue::Record(_) | HostValue::Null))
        {
            return Err(DataFrameError::invalid_argument(format!(
                "expected a record per row, got {bad}"
            )));
        }
        let fields = match schema {
            Some(schema) => schema.fields().to_vec(),
            None => infer_row_fields(rows)?,
        };
        let columns = ColumnBuilder::new("").build_record_columns(rows, &fields)?;
        let series = fields
            .iter()
            .zip(columns)
            .map(|(f, a)| Series::from_array(f.name(), a))
            .collect();
        Self::new(series)
    }

    /// Return an empty `DataFrame` (no columns, no rows).
    pub fn empty() -> Self {
        Self {
            schema: Arc::new(ArrowSchema::empty()),
            batches: Vec::new(),
        }
    }

    /// Return the number of rows.
    pub fn height(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// Return the number of columns.
    pub fn width(&self) -> usize {
        self.schema.fields().len()
    }

    /// Column names and types.
    pub fn schema(&self) -> Schema {
        Schema::from_arrow(&self.schema)
    }

    /// Return the Arrow schema.
    pub fn arrow_schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }

    /// Get a column by name (case-sensitive).
    pub fn column(&self, name: &str) -> Result<Series> {
        let idx = self
            .schema
            .fields()
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| DataFrameError::column_not_found(name.to_string()))?;

        let chunks = self
            .batches
            .iter()
            .map(|b| b.column(idx).clone())
            .collect::<Vec<_>>();
        Ok(Series::from_arrow_unchecked(name, chunks))
    }

    /// Return all columns in construction order.
    pub fn columns(&self) -> Vec<Series> {
        self.schema
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, f)| {
                let chunks = self
                    .batches
                    .iter()
                    .map(|b| b.column(idx).clone())
                    .collect::<Vec<_>>();
                Series::from_arrow_unchecked(f.name(), chunks)
            })
            .collect()
    }

    /// Values of row `index`, one per column.
    pub fn row(&self, index: usize) -> Result<Vec<HostValue>> {
        let mut offset = index;
        for batch in &self.batches {
            if offset < batch.num_rows() {
                return batch
                    .columns()
                    .iter()
                    .map(|c| value_at(c.as_ref(), offset))
                    .collect();
            }
            offset -= batch.num_rows();
        }
        Err(DataFrameError::invalid_argument(format!(
            "row {index} is out of bounds for a frame of height {}",
            self.height()
        )))
    }

    /// Pack every column into one struct-typed column.
    pub fn to_struct(&self, name: &str) -> Result<Series> {
        let batch = self.to_batch()?;
        let array: ArrayRef = Arc::new(StructArray::from(batch));
        Ok(Series::from_array(name, array))
    }

    /// Randomly sample rows.
    pub fn sample(&self, args: SampleArgs) -> Result<Self> {
        let spec = args.resolve()?;
        let batch = self.to_batch()?;
        let indices = UInt32Array::from(sample_indices(batch.num_rows(), &spec)?);
        Self::from_batches(vec![arrow::compute::take_record_batch(&batch, &indices)?])
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Result<Self> {
        self.slice(0, n)
    }

    /// Last `n` rows.
    pub fn tail(&self, n: usize) -> Result<Self> {
        let n = n.min(self.height());
        self.slice(-(n as i64), n)
    }

    /// Rows `offset..offset + length`; a negative offset counts from the end.
    pub fn slice(&self, offset: i64, length: usize) -> Result<Self> {
        let batch = self.to_batch()?;
        let (start, len) = super::series::resolve_slice(offset, length, batch.num_rows());
        Self::from_batches(vec![batch.slice(start, len)])
    }

    /// Return the underlying Arrow batches.
    pub fn to_arrow(&self) -> Vec<RecordBatch> {
        self.batches.clone()
    }

    /// Concatenate all batches into one.
    pub fn to_batch(&self) -> Result<RecordBatch> {
        match self.batches.as_slice() {
            [single] => Ok(single.clone()),
            batches => Ok(arrow::compute::concat_batches(&self.schema, batches)?),
        }
    }

    /// Convert this eager `DataFrame` to a `LazyFrame` for query planning/execution.
    pub fn lazy(&self) -> LazyFrame {
        LazyFrame::from_dataframe(self.clone())
    }

    /// Eager `select`, implemented by delegating to `LazyFrame`.
    pub fn select(&self, exprs: Vec<Expr>) -> Result<Self> {
        self.lazy()
            .select(exprs)
            .collect_sync(CollectOptions::default())
    }

    /// Eager `filter`, implemented by delegating to `LazyFrame`.
    pub fn filter(&self, predicate: Expr) -> Result<Self> {
        self.lazy()
            .filter(predicate)
            .collect_sync(CollectOptions::default())
    }

    /// Eager `with_columns`, implemented by delegating to `LazyFrame`.
    pub fn with_columns(&self, exprs: Vec<Expr>) -> Result<Self> {
        self.lazy()
            .with_columns(exprs)
            .collect_sync(CollectOptions::default())
    }

    /// Start a group-by aggregation (eager API).
    pub fn group_by(&self, by: Vec<Expr>) -> GroupBy {
        GroupBy {
            df: self.clone(),
            by,
        }
    }
}

impl PartialEq for DataFrame {
    fn eq(&self, other: &Self) -> bool {
        if self.schema != other.schema {
            return false;
        }
        match (self.to_batch(), other.to_batch()) {
            (Ok(a), Ok(b)) => a
                .columns()
                .iter()
                .zip(b.columns())
                .all(|(x, y)| x.to_data() == y.to_data()),
            _ => false,
        }
    }
}

fn infer_row_fields(rows: &[HostValue]) -> Result<Vec<Field>> {
    let mut names: Vec<&str> = Vec::new();
    for row in rows {
        if let HostValue::Record(pairs) = row {
            for (k, _) in pairs {
                if !names.contains(&k.as_str()) {
                    names.push(k.as_str());
                }
            }
        }
    }
    names
        .into_iter()
        .map(|name| {
            let values: Vec<HostValue> = rows
                .iter()
                .map(|r| r.get(name).cloned().unwrap_or(HostValue::Null))
                .collect();
            Ok(Field::new(name, infer_column_type(&values)?))
        })
        .collect()
}

/// Eager group-by handle that delegates execution to `LazyFrame`.
#[derive(Debug, Clone)]
pub struct GroupBy {
    df: DataFrame,
    by: Vec<Expr>,
}

impl GroupBy {
    /// Perform aggregations for this group-by.
    pub fn agg(self, aggs: Vec<Expr>) -> Result<DataFrame> {
        self.df
            .lazy()
            .group_by(self.by)
            .agg(aggs)
            .collect_sync(CollectOptions::default())
    }

    /// Return the underlying `DataFrame`.
    pub fn into_df(self) -> DataFrame {
        self.df
    }
}
