use crate::expr::SortOptions;
use crate::lazy::{AsofStrategy, JoinType, LogicalPlan, ProjectionKind, UniqueKeep};
use crate::physical::temporal::{DynamicWindow, RollingWindow};
use crate::{DataFrame, Expr, Result};

/// Physical execution plan produced from a `LogicalPlan`.
#[derive(Debug, Clone)]
pub(crate) enum PhysicalPlan {
    /// In-memory scan with pushed-down row cap, predicate and projection.
    ScanExec {
        df: DataFrame,
        projection: Option<Vec<String>>,
        predicate: Option<Expr>,
        n_rows: Option<usize>,
    },
    ProjectionExec {
        input: Box<PhysicalPlan>,
        exprs: Vec<Expr>,
        kind: ProjectionKind,
    },
    FilterExec {
        input: Box<PhysicalPlan>,
        predicate: Expr,
    },
    AggregateExec {
        input: Box<PhysicalPlan>,
        keys: Vec<Expr>,
        aggs: Vec<Expr>,
    },
    GroupSliceExec {
        input: Box<PhysicalPlan>,
        keys: Vec<Expr>,
        n: usize,
        from_tail: bool,
    },
    RollingExec {
        input: Box<PhysicalPlan>,
        window: RollingWindow,
        aggs: Vec<Expr>,
    },
    DynamicExec {
        input: Box<PhysicalPlan>,
        window: DynamicWindow,
        aggs: Vec<Expr>,
    },
    HashJoinExec {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        left_on: Vec<String>,
        right_on: Vec<String>,
        how: JoinType,
        suffix: String,
    },
    AsofJoinExec {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        left_on: String,
        right_on: String,
        by_left: Vec<String>,
        by_right: Vec<String>,
        strategy: AsofStrategy,
        suffix: String,
    },
    SortExec {
        input: Box<PhysicalPlan>,
        by: Vec<Expr>,
        options: SortOptions,
    },
    SliceExec {
        input: Box<PhysicalPlan>,
        offset: i64,
        len: usize,
    },
    MeltExec {
        input: Box<PhysicalPlan>,
        id_vars: Vec<String>,
        value_vars: Vec<String>,
    },
    ExplodeExec {
        input: Box<PhysicalPlan>,
        columns: Vec<String>,
    },
    UniqueExec {
        input: Box<PhysicalPlan>,
        subset: Option<Vec<String>>,
        keep: UniqueKeep,
    },
    RenameExec {
        input: Box<PhysicalPlan>,
        existing: Vec<String>,
        new: Vec<String>,
    },
    DropExec {
        input: Box<PhysicalPlan>,
        columns: Vec<String>,
    },
    RowCountExec {
        input: Box<PhysicalPlan>,
        name: String,
        offset: u32,
    },
}

/// Compile a `LogicalPlan` into a `PhysicalPlan`.
///
/// Window durations are parsed and validated here, before any data is read.
pub(crate) fn compile(logical: &LogicalPlan) -> Result<PhysicalPlan> {
    let plan = match logical {
        LogicalPlan::DataFrameScan {
            df,
            projection,
            predicate,
            n_rows,
        } => PhysicalPlan::ScanExec {
            df: df.clone(),
            projection: projection.clone(),
            predicate: predicate.clone(),
            n_rows: *n_rows,
        },
        LogicalPlan::Projection {
            input: i,
            exprs,
            kind,
        } => PhysicalPlan::ProjectionExec {
            input: boxed(i)?,
            exprs: exprs.clone(),
            kind: *kind,
        },
        LogicalPlan::Filter {
            input: i,
            predicate,
        } => PhysicalPlan::FilterExec {
            input: boxed(i)?,
            predicate: predicate.clone(),
        },
        LogicalPlan::Aggregate {
            input: i,
            keys,
            aggs,
            ..
        } => PhysicalPlan::AggregateExec {
            input: boxed(i)?,
            keys: keys.clone(),
            aggs: aggs.clone(),
        },
        LogicalPlan::GroupSlice {
            input: i,
            keys,
            n,
            from_tail,
            ..
        } => PhysicalPlan::GroupSliceExec {
            input: boxed(i)?,
            keys: keys.clone(),
            n: *n,
            from_tail: *from_tail,
        },
        LogicalPlan::RollingAggregate {
            input: i,
            options,
            aggs,
        } => PhysicalPlan::RollingExec {
            input: boxed(i)?,
            window: RollingWindow::from_options(options)?,
            aggs: aggs.clone(),
        },
        LogicalPlan::DynamicAggregate {
            input: i,
            options,
            aggs,
        } => PhysicalPlan::DynamicExec {
            input: boxed(i)?,
            window: DynamicWindow::from_options(options)?,
            aggs: aggs.clone(),
        },
        LogicalPlan::Join {
            left,
            right,
            left_on,
            right_on,
            how,
            suffix,
        } => PhysicalPlan::HashJoinExec {
            left: boxed(left)?,
            right: boxed(right)?,
            left_on: left_on.clone(),
            right_on: right_on.clone(),
            how: *how,
            suffix: suffix.clone(),
        },
        LogicalPlan::AsofJoin {
            left,
            right,
            left_on,
            right_on,
            by_left,
            by_right,
            strategy,
            suffix,
        } => PhysicalPlan::AsofJoinExec {
            left: boxed(left)?,
            right: boxed(right)?,
            left_on: left_on.clone(),
            right_on: right_on.clone(),
            by_left: by_left.clone(),
            by_right: by_right.clone(),
            strategy: *strategy,
            suffix: suffix.clone(),
        },
        LogicalPlan::Sort {
            input: i,
            by,
            options,
        } => PhysicalPlan::SortExec {
            input: boxed(i)?,
            by: by.clone(),
            options: *options,
        },
        LogicalPlan::Slice {
            input: i,
            offset,
            len,
        } => PhysicalPlan::SliceExec {
            input: boxed(i)?,
            offset: *offset,
            len: *len,
        },
        LogicalPlan::Melt {
            input: i,
            id_vars,
            value_vars,
        } => PhysicalPlan::MeltExec {
            input: boxed(i)?,
            id_vars: id_vars.clone(),
            value_vars: value_vars.clone(),
        },
        LogicalPlan::Explode { input: i, columns } => PhysicalPlan::ExplodeExec {
            input: boxed(i)?,
            columns: columns.clone(),
        },
        LogicalPlan::Unique {
            input: i,
            subset,
            keep,
            ..
        } => PhysicalPlan::UniqueExec {
            input: boxed(i)?,
            subset: subset.clone(),
            keep: *keep,
        },
        LogicalPlan::Rename {
            input: i,
            existing,
            new,
        } => PhysicalPlan::RenameExec {
            input: boxed(i)?,
            existing: existing.clone(),
            new: new.clone(),
        },
        LogicalPlan::Drop { input: i, columns } => PhysicalPlan::DropExec {
            input: boxed(i)?,
            columns: columns.clone(),
        },
        LogicalPlan::WithRowCount {
            input: i,
            name,
            offset,
        } => PhysicalPlan::RowCountExec {
            input: boxed(i)?,
            name: name.clone(),
            offset: *offset,
        },
    };

    Ok(plan)
}

fn boxed(plan: &LogicalPlan) -> Result<Box<PhysicalPlan>> {
    Ok(Box::new(compile(plan)?))
}
