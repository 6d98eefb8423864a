use std::sync::Arc;

use crate::expr::SortOptions;
use crate::lazy::{
    AsofStrategy, DynamicGroupOptions, JoinType, RollingGroupOptions, UniqueKeep,
};
use crate::{DataFrame, Expr};

/// How a projection node should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Select columns/expressions, producing a new schema.
    Select,
    /// Add or overwrite columns, preserving existing columns.
    WithColumns,
}

/// Logical query plan nodes for `LazyFrame`.
///
/// Inputs are shared, so extending a plan never copies or mutates the nodes
/// below it.
#[derive(Debug, Clone)]
pub enum LogicalPlan {
    /// Scan an in-memory `DataFrame` (predicate/projection/row cap may be pushed down).
    DataFrameScan {
        df: DataFrame,
        projection: Option<Vec<String>>,
        predicate: Option<Expr>,
        n_rows: Option<usize>,
    },
    /// Projection node (select or with_columns).
    Projection {
        input: Arc<LogicalPlan>,
        exprs: Vec<Expr>,
        kind: ProjectionKind,
    },
    /// Filter node.
    Filter {
        input: Arc<LogicalPlan>,
        predicate: Expr,
    },
    /// Aggregate node (group keys and aggregations).
    Aggregate {
        input: Arc<LogicalPlan>,
        keys: Vec<Expr>,
        aggs: Vec<Expr>,
        maintain_order: bool,
    },
    /// First or last `n` rows of every group.
    GroupSlice {
        input: Arc<LogicalPlan>,
        keys: Vec<Expr>,
        n: usize,
        from_tail: bool,
        maintain_order: bool,
    },
    RollingAggregate {
        input: Arc<LogicalPlan>,
        options: RollingGroupOptions,
        aggs: Vec<Expr>,
    },
    DynamicAggregate {
        input: Arc<LogicalPlan>,
        options: DynamicGroupOptions,
        aggs: Vec<Expr>,
    },
    Join {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
        left_on: Vec<String>,
        right_on: Vec<String>,
        how: JoinType,
        suffix: String,
    },
    AsofJoin {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
        left_on: String,
        right_on: String,
        by_left: Vec<String>,
        by_right: Vec<String>,
        strategy: AsofStrategy,
        suffix: String,
    },
    Sort {
        input: Arc<LogicalPlan>,
        by: Vec<Expr>,
        options: SortOptions,
    },
    /// Rows `offset..offset + len`; a negative offset counts from the end.
    Slice {
        input: Arc<LogicalPlan>,
        offset: i64,
        len: usize,
    },
    /// Unpivot `value_vars` into `variable`/`value` columns.
    Melt {
        input: Arc<LogicalPlan>,
        id_vars: Vec<String>,
        value_vars: Vec<String>,
    },
    Explode {
        input: Arc<LogicalPlan>,
        columns: Vec<String>,
    },
    Unique {
        input: Arc<LogicalPlan>,
        subset: Option<Vec<String>>,
        keep: UniqueKeep,
        maintain_order: bool,
    },
    Rename {
        input: Arc<LogicalPlan>,
        existing: Vec<String>,
        new: Vec<String>,
    },
    Drop {
        input: Arc<LogicalPlan>,
        columns: Vec<String>,
    },
    /// Prepend a `UInt32` row index column.
    WithRowCount {
        input: Arc<LogicalPlan>,
        name: String,
        offset: u32,
    },
}

impl LogicalPlan {
    pub(crate) fn scan(df: DataFrame) -> Self {
        LogicalPlan::DataFrameScan {
            df,
            projection: None,
            predicate: None,
            n_rows: None,
        }
    }

    /// Direct inputs of this node.
    pub fn inputs(&self) -> Vec<&Arc<LogicalPlan>> {
        match self {
            LogicalPlan::DataFrameScan { .. } => vec![],
            LogicalPlan::Join { left, right, .. } | LogicalPlan::AsofJoin { left, right, .. } => {
                vec![left, right]
            }
            LogicalPlan::Projection { input, .. }
            | LogicalPlan::Filter { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::GroupSlice { input, .. }
            | LogicalPlan::RollingAggregate { input, .. }
            | LogicalPlan::DynamicAggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Slice { input, .. }
            | LogicalPlan::Melt { input, .. }
            | LogicalPlan::Explode { input, .. }
            | LogicalPlan::Unique { input, .. }
            | LogicalPlan::Rename { input, .. }
            | LogicalPlan::Drop { input, .. }
            | LogicalPlan::WithRowCount { input, .. } => vec![input],
        }
    }

    /// Rebuild this node with every input passed through `f`.
    pub(crate) fn map_inputs(&self, f: &mut impl FnMut(&LogicalPlan) -> LogicalPlan) -> Self {
        let mut map = |p: &Arc<LogicalPlan>| Arc::new(f(p.as_ref()));
        let mut node = self.clone();
        match &mut node {
            LogicalPlan::DataFrameScan { .. } => {}
            LogicalPlan::Join { left, right, .. } | LogicalPlan::AsofJoin { left, right, .. } => {
                *left = map(&*left);
                *right = map(&*right);
            }
            LogicalPlan::Projection { input, .. }
            | LogicalPlan::Filter { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::GroupSlice { input, .. }
            | LogicalPlan::RollingAggregate { input, .. }
            | LogicalPlan::DynamicAggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Slice { input, .. }
            | LogicalPlan::Melt { input, .. }
            | LogicalPlan::Explode { input, .. }
            | LogicalPlan::Unique { input, .. }
            | LogicalPlan::Rename { input, .. }
            | LogicalPlan::Drop { input, .. }
            | LogicalPlan::WithRowCount { input, .. } => *input = map(&*input),
        }
        node
    }

    /// Render this plan as a readable string (used by `explain()` and tests).
    pub fn display(&self) -> String {
        let mut out = String::new();
        self.fmt_into(&mut out, 0);
        out
    }

    fn fmt_into(&self, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        match self {
            LogicalPlan::DataFrameScan {
                df,
                projection,
                predicate,
                n_rows,
            } => {
                out.push_str(&format!("{pad}scan[dataframe rows={}]", df.height()));
                if let Some(projection) = projection {
                    out.push_str(&format!(" projection={:?}", projection));
                }
                if let Some(predicate) = predicate {
                    out.push_str(&format!(" filters=[{predicate}]"));
                }
                if let Some(n) = n_rows {
                    out.push_str(&format!(" n_rows={n}"));
                }
                out.push('\n');
                return;
            }
            LogicalPlan::Projection { exprs, kind, .. } => {
                let label = match kind {
                    ProjectionKind::Select => "project",
                    ProjectionKind::WithColumns => "with_columns",
                };
                out.push_str(&format!("{pad}{label} [{}]\n", join_exprs(exprs)));
            }
            LogicalPlan::Filter { predicate, .. } => {
                out.push_str(&format!("{pad}filter [{predicate}]\n"));
            }
            LogicalPlan::Aggregate { keys, aggs, .. } => {
                out.push_str(&format!(
                    "{pad}aggregate by=[{}] aggs=[{}]\n",
                    join_exprs(keys),
                    join_exprs(aggs)
                ));
            }
            LogicalPlan::GroupSlice {
                keys, n, from_tail, ..
            } => {
                let label = if *from_tail { "tail" } else { "head" };
                out.push_str(&format!("{pad}group_{label}({n}) by=[{}]\n", join_exprs(keys)));
            }
            LogicalPlan::RollingAggregate { options, aggs, .. } => {
                out.push_str(&format!(
                    "{pad}rolling_aggregate index={} period={} aggs=[{}]\n",
                    options.index_column,
                    options.period,
                    join_exprs(aggs)
                ));
            }
            LogicalPlan::DynamicAggregate { options, aggs, .. } => {
                out.push_str(&format!(
                    "{pad}dynamic_aggregate index={} every={} aggs=[{}]\n",
                    options.index_column,
                    options.every,
                    join_exprs(aggs)
                ));
            }
            LogicalPlan::Join {
                left_on,
                right_on,
                how,
                ..
            } => {
                out.push_str(&format!(
                    "{pad}join[{how:?}] left_on={left_on:?} right_on={right_on:?}\n"
                ));
            }
            LogicalPlan::AsofJoin {
                left_on,
                right_on,
                strategy,
                ..
            } => {
                out.push_str(&format!(
                    "{pad}join_asof[{strategy:?}] left_on={left_on} right_on={right_on}\n"
                ));
            }
            LogicalPlan::Sort { by, options, .. } => {
                out.push_str(&format!(
                    "{pad}sort by=[{}] descending={}\n",
                    join_exprs(by),
                    options.descending
                ));
            }
            LogicalPlan::Slice { offset, len, .. } => {
                out.push_str(&format!("{pad}slice offset={offset} len={len}\n"));
            }
            LogicalPlan::Melt {
                id_vars,
                value_vars,
                ..
            } => {
                out.push_str(&format!("{pad}melt id={id_vars:?} values={value_vars:?}\n"));
            }
            LogicalPlan::Explode { columns, .. } => {
                out.push_str(&format!("{pad}explode {columns:?}\n"));
            }
            LogicalPlan::Unique { subset, keep, .. } => {
                out.push_str(&format!("{pad}unique subset={subset:?} keep={keep:?}\n"));
            }
            LogicalPlan::Rename { existing, new, .. } => {
                out.push_str(&format!("{pad}rename {existing:?} -> {new:?}\n"));
            }
            LogicalPlan::Drop { columns, .. } => {
                out.push_str(&format!("{pad}drop {columns:?}\n"));
            }
            LogicalPlan::WithRowCount { name, offset, .. } => {
                out.push_str(&format!("{pad}with_row_count name={name} offset={offset}\n"));
            }
        }
        for input in self.inputs() {
            input.fmt_into(out, indent + 1);
        }
    }
}

fn join_exprs(exprs: &[Expr]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{LogicalPlan, ProjectionKind};
    use crate::expr::{col, lit};
    use crate::DataFrame;

    #[test]
    fn display_is_readable_and_stable() {
        let plan = LogicalPlan::Filter {
            input: Arc::new(LogicalPlan::Projection {
                input: Arc::new(LogicalPlan::DataFrameScan {
                    df: DataFrame::empty(),
                    projection: Some(vec!["a".to_string(), "b".to_string()]),
                    predicate: None,
                    n_rows: None,
                }),
                exprs: vec![col("a"), col("b").alias("bb")],
                kind: ProjectionKind::Select,
            }),
            predicate: col("a").gt(lit(1_i64)),
        };

        let s = plan.display();
        assert!(s.contains("scan[dataframe"));
        assert!(s.contains("project"));
        assert!(s.contains("filter"));
        assert!(s.contains("col(a)"));
    }
}
