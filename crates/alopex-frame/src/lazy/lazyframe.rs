use std::sync::Arc;

use crate::expr::{col, SortOptions};
use crate::lazy::{
    AsofJoinOptions, CollectOptions, DynamicGroupBy, DynamicGroupOptions, JoinOptions,
    LazyGroupBy, LogicalPlan, OptFlags, Optimizer, ProjectionKind, RollingGroupBy,
    RollingGroupOptions, UniqueKeep,
};
use crate::physical::{ArrowEngine, ExecutionEngine};
use crate::{DataFrame, DataFrameError, Expr, Result};

/// A lazily-evaluated query backed by a `LogicalPlan`.
///
/// Operators consume `self` and return a frame wrapping a new plan node; the
/// nodes below it are shared, never modified. Materialization borrows the
/// frame, so the same plan can be collected any number of times.
#[derive(Debug, Clone)]
pub struct LazyFrame {
    plan: Arc<LogicalPlan>,
    engine: Arc<dyn ExecutionEngine>,
}

impl LazyFrame {
    /// Create a `LazyFrame` that scans an in-memory `DataFrame`.
    pub fn from_dataframe(df: DataFrame) -> Self {
        Self::from_parts(LogicalPlan::scan(df), Arc::new(ArrowEngine::default()))
    }

    pub(crate) fn from_parts(plan: LogicalPlan, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            plan: Arc::new(plan),
            engine,
        }
    }

    /// Run this frame (and everything derived from it) on `engine`.
    pub fn with_engine(self, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            plan: self.plan,
            engine,
        }
    }

    /// The accumulated, unoptimized plan.
    pub fn logical_plan(&self) -> &LogicalPlan {
        &self.plan
    }

    fn then(self, build: impl FnOnce(Arc<LogicalPlan>) -> LogicalPlan) -> Self {
        Self {
            plan: Arc::new(build(self.plan)),
            engine: self.engine,
        }
    }

    /// Add a projection (`select`) node to the logical plan.
    pub fn select(self, exprs: Vec<Expr>) -> Self {
        self.then(|input| LogicalPlan::Projection {
            input,
            exprs,
            kind: ProjectionKind::Select,
        })
    }

    /// Add a filter node to the logical plan.
    pub fn filter(self, predicate: Expr) -> Self {
        self.then(|input| LogicalPlan::Filter { input, predicate })
    }

    pub fn with_column(self, expr: Expr) -> Self {
        self.with_columns(vec![expr])
    }

    /// Add a projection (`with_columns`) node to the logical plan.
    pub fn with_columns(self, exprs: Vec<Expr>) -> Self {
        self.then(|input| LogicalPlan::Projection {
            input,
            exprs,
            kind: ProjectionKind::WithColumns,
        })
    }

    /// Start a group-by on this `LazyFrame`.
    pub fn group_by(self, by: Vec<Expr>) -> LazyGroupBy {
        self.group_by_with_order(by, false)
    }

    /// Like `group_by`, keeping groups in order of first appearance.
    pub fn group_by_stable(self, by: Vec<Expr>) -> LazyGroupBy {
        self.group_by_with_order(by, true)
    }

    fn group_by_with_order(self, keys: Vec<Expr>, maintain_order: bool) -> LazyGroupBy {
        LazyGroupBy {
            plan: self.plan,
            engine: self.engine,
            keys,
            maintain_order,
        }
    }

    /// Group each row with the rows whose index falls in the window ending at it.
    ///
    /// The index column must already be sorted ascending (per `by` group).
    pub fn group_by_rolling(self, options: RollingGroupOptions) -> RollingGroupBy {
        RollingGroupBy {
            plan: self.plan,
            engine: self.engine,
            options,
        }
    }

    /// Group rows into regular windows along the index column.
    ///
    /// The index column must already be sorted ascending (per `by` group).
    pub fn group_by_dynamic(self, options: DynamicGroupOptions) -> DynamicGroupBy {
        DynamicGroupBy {
            plan: self.plan,
            engine: self.engine,
            options,
        }
    }

    /// Join with `other`.
    ///
    /// Key options are validated here, before any plan reaches the engine.
    pub fn join(self, other: LazyFrame, options: JoinOptions) -> Result<Self> {
        let (left_on, right_on) = options.keys()?;
        Ok(self.then(|left| LogicalPlan::Join {
            left,
            right: other.plan,
            left_on,
            right_on,
            how: options.how,
            suffix: options.suffix,
        }))
    }

    /// Join each left row with the nearest right row on a sorted key.
    pub fn join_asof(self, other: LazyFrame, options: AsofJoinOptions) -> Result<Self> {
        let (left_on, right_on) = options.keys()?;
        let (by_left, by_right) = options.by_keys()?;
        Ok(self.then(|left| LogicalPlan::AsofJoin {
            left,
            right: other.plan,
            left_on,
            right_on,
            by_left,
            by_right,
            strategy: options.strategy,
            suffix: options.suffix,
        }))
    }

    pub fn sort(self, by: &str, descending: bool) -> Self {
        self.sort_by_exprs(
            vec![col(by)],
            SortOptions::default().with_descending(descending),
        )
    }

    /// Sort rows by several keys; ties keep their input order.
    pub fn sort_by_exprs(self, by: Vec<Expr>, options: SortOptions) -> Self {
        self.then(|input| LogicalPlan::Sort { input, by, options })
    }

    /// Rows `offset..offset + len`; a negative offset counts from the end.
    pub fn slice(self, offset: i64, len: usize) -> Self {
        self.then(|input| LogicalPlan::Slice { input, offset, len })
    }

    pub fn head(self, n: usize) -> Self {
        self.slice(0, n)
    }

    pub fn tail(self, n: usize) -> Self {
        let offset = i64::try_from(n).map_or(i64::MIN, |n| -n);
        self.slice(offset, n)
    }

    /// Alias for `head`.
    pub fn limit(self, n: usize) -> Self {
        self.head(n)
    }

    /// Unpivot `value_vars` into `variable` and `value` columns.
    ///
    /// An empty `value_vars` melts every column not listed in `id_vars`.
    pub fn melt<I, V, S, T>(self, id_vars: I, value_vars: V) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        V: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let id_vars = id_vars.into_iter().map(|s| s.as_ref().to_string()).collect();
        let value_vars = value_vars
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.then(|input| LogicalPlan::Melt {
            input,
            id_vars,
            value_vars,
        })
    }

    /// Flatten list columns into one row per element.
    pub fn explode<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = columns
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.then(|input| LogicalPlan::Explode { input, columns })
    }

    /// Drop duplicate rows, judged on `subset` (or every column).
    pub fn unique(
        self,
        maintain_order: bool,
        subset: Option<Vec<String>>,
        keep: UniqueKeep,
    ) -> Self {
        self.then(|input| LogicalPlan::Unique {
            input,
            subset,
            keep,
            maintain_order,
        })
    }

    pub fn distinct(self) -> Self {
        self.unique(true, None, UniqueKeep::First)
    }

    pub fn rename<I, J, S, T>(self, existing: I, new: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        J: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let existing = existing
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        let new = new.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.then(|input| LogicalPlan::Rename {
            input,
            existing,
            new,
        })
    }

    pub fn drop<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = columns
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.then(|input| LogicalPlan::Drop { input, columns })
    }

    /// Prepend a `UInt32` column counting rows from `offset`.
    pub fn with_row_count(self, name: impl Into<String>, offset: u32) -> Self {
        let name = name.into();
        self.then(|input| LogicalPlan::WithRowCount {
            input,
            name,
            offset,
        })
    }

    /// Render the logical plan as a human-readable string.
    ///
    /// If `optimized` is `true`, includes optimizer rewrites such as pushdowns.
    pub fn explain(&self, optimized: bool) -> String {
        if optimized {
            Optimizer::optimize(&self.plan, CollectOptions::default().flags()).display()
        } else {
            self.plan.display()
        }
    }

    /// Execute the plan, blocking the calling thread.
    pub fn collect_sync(&self, options: CollectOptions) -> Result<DataFrame> {
        let flags = options.flags();
        tracing::debug!(?flags, "submitting plan");
        tracing::trace!(plan = %self.plan.display(), "plan");
        self.engine.execute(&self.plan, flags)
    }

    /// Execute the plan on the blocking pool.
    ///
    /// Dropping the future before it resolves leaves this frame untouched.
    pub async fn collect(&self, options: CollectOptions) -> Result<DataFrame> {
        run_blocking(Arc::clone(&self.plan), Arc::clone(&self.engine), options.flags()).await
    }

    /// Like `collect_sync`, with every scan capped at `n` rows.
    ///
    /// Downstream filters and joins may still reduce the row count below `n`.
    pub fn fetch_sync(&self, n: usize, options: CollectOptions) -> Result<DataFrame> {
        let plan = limit_scans(&self.plan, n);
        let flags = options.flags();
        tracing::debug!(?flags, n, "submitting plan for fetch");
        self.engine.execute(&plan, flags)
    }

    pub async fn fetch(&self, n: usize, options: CollectOptions) -> Result<DataFrame> {
        let plan = Arc::new(limit_scans(&self.plan, n));
        run_blocking(plan, Arc::clone(&self.engine), options.flags()).await
    }
}

async fn run_blocking(
    plan: Arc<LogicalPlan>,
    engine: Arc<dyn ExecutionEngine>,
    flags: OptFlags,
) -> Result<DataFrame> {
    tracing::debug!(?flags, "submitting plan");
    tokio::task::spawn_blocking(move || engine.execute(&plan, flags))
        .await
        .map_err(|e| DataFrameError::engine(format!("collect task did not complete: {e}")))?
}

fn limit_scans(plan: &LogicalPlan, n: usize) -> LogicalPlan {
    match plan {
        LogicalPlan::DataFrameScan {
            df,
            projection,
            predicate,
            n_rows,
        } => LogicalPlan::DataFrameScan {
            df: df.clone(),
            projection: projection.clone(),
            predicate: predicate.clone(),
            n_rows: Some(n_rows.map_or(n, |m| m.min(n))),
        },
        other => other.map_inputs(&mut |p| limit_scans(p, n)),
    }
}
