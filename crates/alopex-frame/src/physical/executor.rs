use arrow::record_batch::RecordBatch;

use crate::lazy::OptFlags;
use crate::physical::plan::PhysicalPlan;
use crate::physical::{join, operators, temporal};
use crate::string_cache::StringCache;
use crate::Result;

/// Settings shared by every operator of one query.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExecContext {
    pub(crate) flags: OptFlags,
    /// Active categorical key space, when the query runs under a string cache.
    pub(crate) string_cache: Option<StringCache>,
}

/// Executes `PhysicalPlan` trees and returns the resulting `RecordBatch` output.
pub(crate) struct Executor;

impl Executor {
    /// Execute a physical plan into a single record batch.
    pub(crate) fn execute(plan: &PhysicalPlan, ctx: &ExecContext) -> Result<RecordBatch> {
        execute_plan(plan, ctx)
    }
}

fn execute_plan(plan: &PhysicalPlan, ctx: &ExecContext) -> Result<RecordBatch> {
    match plan {
        PhysicalPlan::ScanExec {
            df,
            projection,
            predicate,
            n_rows,
        } => operators::scan(df, projection.as_deref(), predicate.as_ref(), *n_rows, ctx),
        PhysicalPlan::ProjectionExec { input, exprs, kind } => {
            let batch = execute_plan(input, ctx)?;
            operators::project(&batch, exprs, *kind, ctx)
        }
        PhysicalPlan::FilterExec { input, predicate } => {
            let batch = execute_plan(input, ctx)?;
            operators::filter(&batch, predicate, ctx)
        }
        PhysicalPlan::AggregateExec { input, keys, aggs } => {
            let batch = execute_plan(input, ctx)?;
            operators::aggregate(&batch, keys, aggs, ctx)
        }
        PhysicalPlan::GroupSliceExec {
            input,
            keys,
            n,
            from_tail,
        } => {
            let batch = execute_plan(input, ctx)?;
            operators::group_slice(&batch, keys, *n, *from_tail, ctx)
        }
        PhysicalPlan::RollingExec {
            input,
            window,
            aggs,
        } => {
            let batch = execute_plan(input, ctx)?;
            temporal::rolling_aggregate(&batch, window, aggs, ctx)
        }
        PhysicalPlan::DynamicExec {
            input,
            window,
            aggs,
        } => {
            let batch = execute_plan(input, ctx)?;
            temporal::dynamic_aggregate(&batch, window, aggs, ctx)
        }
        PhysicalPlan::HashJoinExec {
            left,
            right,
            left_on,
            right_on,
            how,
            suffix,
        } => {
            let l = execute_plan(left, ctx)?;
            let r = execute_plan(right, ctx)?;
            join::join(&l, &r, left_on, right_on, *how, suffix, ctx)
        }
        PhysicalPlan::AsofJoinExec {
            left,
            right,
            left_on,
            right_on,
            by_left,
            by_right,
            strategy,
            suffix,
        } => {
            let l = execute_plan(left, ctx)?;
            let r = execute_plan(right, ctx)?;
            join::join_asof(
                &l, &r, left_on, right_on, by_left, by_right, *strategy, suffix, ctx,
            )
        }
        PhysicalPlan::SortExec { input, by, options } => {
            let batch = execute_plan(input, ctx)?;
            operators::sort(&batch, by, *options, ctx)
        }
        PhysicalPlan::SliceExec { input, offset, len } => {
            let batch = execute_plan(input, ctx)?;
            Ok(operators::slice(&batch, *offset, *len))
        }
        PhysicalPlan::MeltExec {
            input,
            id_vars,
            value_vars,
        } => {
            let batch = execute_plan(input, ctx)?;
            operators::melt(&batch, id_vars, value_vars)
        }
        PhysicalPlan::ExplodeExec { input, columns } => {
            let batch = execute_plan(input, ctx)?;
            operators::explode(&batch, columns)
        }
        PhysicalPlan::UniqueExec {
            input,
            subset,
            keep,
        } => {
            let batch = execute_plan(input, ctx)?;
            operators::unique(&batch, subset.as_deref(), *keep)
        }
        PhysicalPlan::RenameExec {
            input,
            existing,
            new,
        } => {
            let batch = execute_plan(input, ctx)?;
            operators::rename(&batch, existing, new)
        }
        PhysicalPlan::DropExec { input, columns } => {
            let batch = execute_plan(input, ctx)?;
            operators::drop(&batch, columns)
        }
        PhysicalPlan::RowCountExec {
            input,
            name,
            offset,
        } => {
            let batch = execute_plan(input, ctx)?;
            operators::with_row_count(&batch, name, *offset)
        }
    }
}
