use std::collections::HashSet;
use std::sync::Arc;

use crate::expr::{Expr as E, LiteralValue, Operator, UnaryOperator};
use crate::lazy::{LogicalPlan, OptFlags, ProjectionKind};
use crate::Expr;

/// Optimizer that rewrites `LogicalPlan` (e.g. predicate/projection pushdown).
pub struct Optimizer;

impl Optimizer {
    /// Optimize a `LogicalPlan` and return the rewritten plan.
    ///
    /// Each pass runs only when its flag is set.
    pub fn optimize(plan: &LogicalPlan, flags: OptFlags) -> LogicalPlan {
        let mut plan = plan.clone();
        if flags.simplify_expression {
            plan = simplify_plan(&plan);
        }
        if flags.predicate_pushdown {
            plan = predicate_pushdown(&plan);
        }
        if flags.projection_pushdown {
            plan = projection_pushdown(&plan);
        }
        if flags.slice_pushdown {
            plan = slice_pushdown(&plan);
        }
        tracing::trace!(plan = %plan.display(), "optimized plan");
        plan
    }
}

fn predicate_pushdown(plan: &LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { input, predicate } => {
            push_filter(predicate_pushdown(input), predicate.clone())
        }
        other => other.map_inputs(&mut predicate_pushdown),
    }
}

/// Place `predicate` as deep below `input` as semantics allow.
fn push_filter(input: LogicalPlan, predicate: Expr) -> LogicalPlan {
    match input {
        LogicalPlan::Filter {
            input: inner,
            predicate: inner_predicate,
        } => {
            let combined = and_expr(inner_predicate, predicate);
            push_filter((*inner).clone(), combined)
        }
        LogicalPlan::Projection { input, exprs, kind }
            if can_push_filter_through_projection(&predicate, &exprs, kind) =>
        {
            LogicalPlan::Projection {
                input: Arc::new(push_filter((*input).clone(), predicate)),
                exprs,
                kind,
            }
        }
        LogicalPlan::Sort { input, by, options } => LogicalPlan::Sort {
            input: Arc::new(push_filter((*input).clone(), predicate)),
            by,
            options,
        },
        LogicalPlan::DataFrameScan {
            df,
            projection,
            predicate: existing,
            n_rows,
        } => LogicalPlan::DataFrameScan {
            df,
            projection,
            predicate: Some(match existing {
                Some(existing) => and_expr(existing, predicate),
                None => predicate,
            }),
            n_rows,
        },
        other => LogicalPlan::Filter {
            input: Arc::new(other),
            predicate,
        },
    }
}

fn and_expr(left: Expr, right: Expr) -> Expr {
    let mut conjuncts = Vec::new();
    conjuncts.extend(flatten_and(left));
    conjuncts.extend(flatten_and(right));
    build_and(conjuncts)
}

fn flatten_and(expr: Expr) -> Vec<Expr> {
    match expr {
        E::BinaryOp {
            left,
            op: Operator::And,
            right,
        } => {
            let mut out = flatten_and(*left);
            out.extend(flatten_and(*right));
            out
        }
        other => vec![other],
    }
}

fn build_and(conjuncts: Vec<Expr>) -> Expr {
    let mut iter = conjuncts.into_iter().rev();
    let Some(last) = iter.next() else {
        return E::Literal(LiteralValue::Boolean(true));
    };
    iter.fold(last, |acc, expr| E::BinaryOp {
        left: Box::new(expr),
        op: Operator::And,
        right: Box::new(acc),
    })
}

fn can_push_filter_through_projection(
    predicate: &Expr,
    exprs: &[Expr],
    kind: ProjectionKind,
) -> bool {
    let RequiredColumns::Some(referenced) = referenced_columns(predicate) else {
        return false;
    };

    match kind {
        // Only plain column passthroughs keep their meaning below the select.
        ProjectionKind::Select => {
            let mut passthrough = HashSet::new();
            for expr in exprs {
                match expr {
                    E::Column(name) => {
                        passthrough.insert(name.clone());
                    }
                    _ if is_elementwise(expr) => {}
                    _ => return false,
                }
            }
            referenced.is_subset(&passthrough)
        }
        ProjectionKind::WithColumns => {
            if !exprs.iter().all(is_elementwise) {
                return false;
            }
            let assigned: HashSet<String> = exprs.iter().map(Expr::output_name).collect();
            !referenced.iter().any(|c| assigned.contains(c))
        }
    }
}

/// True when the value of each row depends only on that row.
fn is_elementwise(expr: &Expr) -> bool {
    match expr {
        E::Agg { .. }
        | E::Window { .. }
        | E::Cumulative { .. }
        | E::Rolling { .. }
        | E::Sample { .. }
        | E::Shift { .. }
        | E::Sort { .. }
        | E::Wildcard => false,
        E::Literal(LiteralValue::Series(_)) => false,
        other => other.inputs().into_iter().all(is_elementwise),
    }
}

#[derive(Debug, Clone)]
enum RequiredColumns {
    All,
    Some(HashSet<String>),
}

impl RequiredColumns {
    fn union(self, other: Self) -> Self {
        match (self, other) {
            (RequiredColumns::All, _) | (_, RequiredColumns::All) => RequiredColumns::All,
            (RequiredColumns::Some(mut a), RequiredColumns::Some(b)) => {
                a.extend(b);
                RequiredColumns::Some(a)
            }
        }
    }

    fn with_names<'a>(self, names: impl IntoIterator<Item = &'a String>) -> Self {
        self.union(RequiredColumns::Some(names.into_iter().cloned().collect()))
    }
}

fn referenced_columns(expr: &Expr) -> RequiredColumns {
    let mut out = HashSet::new();
    if collect_referenced_columns(expr, &mut out) {
        RequiredColumns::Some(out)
    } else {
        RequiredColumns::All
    }
}

/// Returns `false` when `expr` needs every column.
fn collect_referenced_columns(expr: &Expr, out: &mut HashSet<String>) -> bool {
    match expr {
        E::Column(name) => {
            out.insert(name.clone());
            true
        }
        E::Wildcard => false,
        other => other
            .inputs()
            .into_iter()
            .all(|e| collect_referenced_columns(e, out)),
    }
}

fn referenced_by_all(exprs: &[Expr]) -> RequiredColumns {
    exprs
        .iter()
        .map(referenced_columns)
        .fold(RequiredColumns::Some(HashSet::new()), RequiredColumns::union)
}

fn projection_pushdown(plan: &LogicalPlan) -> LogicalPlan {
    projection_pushdown_inner(plan, RequiredColumns::All)
}

fn projection_pushdown_inner(plan: &LogicalPlan, required: RequiredColumns) -> LogicalPlan {
    let single = |input: &Arc<LogicalPlan>, needed: RequiredColumns| {
        Arc::new(projection_pushdown_inner(input, needed))
    };
    let mut node = plan.clone();
    match &mut node {
        LogicalPlan::Projection { input, exprs, kind } => {
            let needed = match kind {
                ProjectionKind::Select => referenced_by_all(exprs),
                ProjectionKind::WithColumns => required.union(referenced_by_all(exprs)),
            };
            *input = single(&*input, needed);
        }
        LogicalPlan::Filter { input, predicate } => {
            *input = single(&*input, required.union(referenced_columns(predicate)));
        }
        LogicalPlan::Aggregate {
            input, keys, aggs, ..
        } => {
            *input = single(&*input, referenced_by_all(keys).union(referenced_by_all(aggs)));
        }
        LogicalPlan::RollingAggregate {
            input,
            options,
            aggs,
        } => {
            let needed = referenced_by_all(aggs)
                .with_names([&options.index_column])
                .with_names(&options.by);
            *input = single(&*input, needed);
        }
        LogicalPlan::DynamicAggregate {
            input,
            options,
            aggs,
        } => {
            let needed = referenced_by_all(aggs)
                .with_names([&options.index_column])
                .with_names(&options.by);
            *input = single(&*input, needed);
        }
        LogicalPlan::Sort { input, by, .. } => {
            *input = single(&*input, required.union(referenced_by_all(by)));
        }
        LogicalPlan::Slice { input, .. } => {
            *input = single(&*input, required);
        }
        LogicalPlan::Explode { input, columns } => {
            *input = single(&*input, required.with_names(columns.iter()));
        }
        LogicalPlan::Melt {
            input,
            id_vars,
            value_vars,
        } => {
            let needed = if value_vars.is_empty() {
                RequiredColumns::All
            } else {
                RequiredColumns::Some(id_vars.iter().chain(value_vars.iter()).cloned().collect())
            };
            *input = single(&*input, needed);
        }
        LogicalPlan::DataFrameScan { df, projection, .. } => {
            // The scan predicate runs before projecting, so only the parent's
            // columns are kept.
            if let RequiredColumns::Some(needed) = required {
                let mut keep: Vec<String> = df
                    .column_names()
                    .into_iter()
                    .filter(|c| needed.contains(c))
                    .collect();
                if let Some(existing) = projection.take() {
                    keep.retain(|c| existing.contains(c));
                }
                *projection = Some(keep);
            }
        }
        other => return other.map_inputs(&mut projection_pushdown),
    }
    node
}

fn slice_pushdown(plan: &LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Slice { input, offset, len } if *offset >= 0 => {
            let input = slice_pushdown(input);
            match input {
                LogicalPlan::DataFrameScan {
                    df,
                    projection,
                    predicate: None,
                    n_rows,
                } => {
                    let cap = (*offset as usize).saturating_add(*len);
                    let scan = LogicalPlan::DataFrameScan {
                        df,
                        projection,
                        predicate: None,
                        n_rows: Some(n_rows.map_or(cap, |n| n.min(cap))),
                    };
                    if *offset == 0 {
                        scan
                    } else {
                        LogicalPlan::Slice {
                            input: Arc::new(scan),
                            offset: *offset,
                            len: *len,
                        }
                    }
                }
                other => LogicalPlan::Slice {
                    input: Arc::new(other),
                    offset: *offset,
                    len: *len,
                },
            }
        }
        other => other.map_inputs(&mut slice_pushdown),
    }
}

fn simplify_plan(plan: &LogicalPlan) -> LogicalPlan {
    let simplify_all = |exprs: &mut Vec<Expr>| {
        for e in exprs.iter_mut() {
            *e = simplify_expr(e.clone());
        }
    };
    let mut node = plan.map_inputs(&mut simplify_plan);
    match &mut node {
        LogicalPlan::Projection { exprs, .. } => simplify_all(exprs),
        LogicalPlan::Filter { predicate, .. } => *predicate = simplify_expr(predicate.clone()),
        LogicalPlan::Aggregate { keys, aggs, .. } => {
            simplify_all(keys);
            simplify_all(aggs);
        }
        LogicalPlan::RollingAggregate { aggs, .. } | LogicalPlan::DynamicAggregate { aggs, .. } => {
            simplify_all(aggs)
        }
        LogicalPlan::DataFrameScan {
            predicate: Some(predicate),
            ..
        } => *predicate = simplify_expr(predicate.clone()),
        _ => {}
    }
    node
}

/// Fold literal arithmetic/comparisons and drop double negation.
pub(crate) fn simplify_expr(expr: Expr) -> Expr {
    let expr = expr.map_inputs(&mut simplify_expr);
    match expr {
        E::UnaryOp {
            op: UnaryOperator::Not,
            expr: inner,
        } => match *inner {
            E::UnaryOp {
                op: UnaryOperator::Not,
                expr: x,
            } => *x,
            E::Literal(LiteralValue::Boolean(b)) => E::Literal(LiteralValue::Boolean(!b)),
            other => E::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(other),
            },
        },
        E::BinaryOp { left, op, right } => match (&*left, &*right) {
            (E::Literal(l), E::Literal(r)) => match fold_literals(l, op, r) {
                Some(folded) => E::Literal(folded),
                None => E::BinaryOp { left, op, right },
            },
            _ => E::BinaryOp { left, op, right },
        },
        other => other,
    }
}

fn fold_literals(l: &LiteralValue, op: Operator, r: &LiteralValue) -> Option<LiteralValue> {
    use LiteralValue as L;

    match (l, r) {
        (L::Int64(a), L::Int64(b)) => match op {
            Operator::Add => a.checked_add(*b).map(L::Int64),
            Operator::Sub => a.checked_sub(*b).map(L::Int64),
            Operator::Mul => a.checked_mul(*b).map(L::Int64),
            _ if op.is_comparison() => Some(L::Boolean(compare(op, a, b))),
            _ => None,
        },
        (L::Float64(_) | L::Int64(_), L::Float64(_) | L::Int64(_)) => {
            let a = as_f64(l)?;
            let b = as_f64(r)?;
            match op {
                Operator::Add => Some(L::Float64(a + b)),
                Operator::Sub => Some(L::Float64(a - b)),
                Operator::Mul => Some(L::Float64(a * b)),
                Operator::Div => Some(L::Float64(a / b)),
                _ if op.is_comparison() => Some(L::Boolean(compare(op, &a, &b))),
                _ => None,
            }
        }
        (L::Boolean(a), L::Boolean(b)) => match op {
            Operator::And => Some(L::Boolean(*a && *b)),
            Operator::Or => Some(L::Boolean(*a || *b)),
            Operator::Eq => Some(L::Boolean(a == b)),
            Operator::Neq => Some(L::Boolean(a != b)),
            _ => None,
        },
        _ => None,
    }
}

fn as_f64(v: &LiteralValue) -> Option<f64> {
    match v {
        LiteralValue::Int64(v) => Some(*v as f64),
        LiteralValue::Float64(v) => Some(*v),
        _ => None,
    }
}

fn compare<T: PartialOrd>(op: Operator, a: &T, b: &T) -> bool {
    match op {
        Operator::Eq => a == b,
        Operator::Neq => a != b,
        Operator::Gt => a > b,
        Operator::Lt => a < b,
        Operator::Ge => a >= b,
        Operator::Le => a <= b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{simplify_expr, Optimizer};
    use crate::expr::{col, lit};
    use crate::lazy::{CollectOptions, LogicalPlan, OptFlags, ProjectionKind};
    use crate::DataFrame;

    fn scan() -> LogicalPlan {
        let df = DataFrame::from_rows(
            &[serde_json::json!({"a": 1, "b": 2, "c": 3}).into()],
            None,
        )
        .unwrap();
        LogicalPlan::scan(df)
    }

    #[test]
    fn predicate_pushdown_moves_filter_into_scan() {
        let plan = LogicalPlan::Filter {
            input: Arc::new(scan()),
            predicate: col("a").gt(lit(1_i64)),
        };

        let optimized = Optimizer::optimize(&plan, OptFlags::default());
        match optimized {
            LogicalPlan::DataFrameScan { predicate, .. } => assert!(predicate.is_some()),
            other => panic!("expected DataFrameScan, got {other:?}"),
        }
    }

    #[test]
    fn predicate_pushdown_combines_multiple_filters_with_and() {
        let plan = LogicalPlan::Filter {
            input: Arc::new(LogicalPlan::Filter {
                input: Arc::new(scan()),
                predicate: col("a").gt(lit(1_i64)),
            }),
            predicate: col("b").lt(lit(10_i64)),
        };

        let optimized = Optimizer::optimize(&plan, OptFlags::default());
        match optimized {
            LogicalPlan::DataFrameScan {
                predicate: Some(p), ..
            } => {
                let s = format!("{p:?}");
                assert!(s.contains("And"));
            }
            other => panic!("expected DataFrameScan with predicate, got {other:?}"),
        }
    }

    #[test]
    fn predicate_pushdown_does_not_cross_select_when_column_not_selected() {
        let plan = LogicalPlan::Filter {
            input: Arc::new(LogicalPlan::Projection {
                input: Arc::new(scan()),
                exprs: vec![col("a")],
                kind: ProjectionKind::Select,
            }),
            predicate: col("b").gt(lit(1_i64)),
        };

        let optimized = Optimizer::optimize(&plan, OptFlags::default());
        assert!(matches!(optimized, LogicalPlan::Filter { .. }));
    }

    #[test]
    fn predicate_pushdown_stops_at_aggregating_with_columns() {
        let plan = LogicalPlan::Filter {
            input: Arc::new(LogicalPlan::Projection {
                input: Arc::new(scan()),
                exprs: vec![col("a").sum().alias("total")],
                kind: ProjectionKind::WithColumns,
            }),
            predicate: col("b").gt(lit(1_i64)),
        };

        let optimized = Optimizer::optimize(&plan, OptFlags::default());
        assert!(matches!(optimized, LogicalPlan::Filter { .. }));
    }

    #[test]
    fn projection_pushdown_sets_scan_projection() {
        let plan = LogicalPlan::Projection {
            input: Arc::new(scan()),
            exprs: vec![col("a"), col("b")],
            kind: ProjectionKind::Select,
        };

        let optimized = Optimizer::optimize(&plan, OptFlags::default());
        let s = optimized.display();
        assert!(s.contains("projection=[\"a\", \"b\"]"), "{s}");
    }

    #[test]
    fn disabled_flags_leave_the_plan_alone() {
        let plan = LogicalPlan::Filter {
            input: Arc::new(LogicalPlan::Projection {
                input: Arc::new(scan()),
                exprs: vec![col("a")],
                kind: ProjectionKind::Select,
            }),
            predicate: col("a").gt(lit(1_i64)),
        };
        let flags = CollectOptions::default().with_no_optimization(true).flags();
        let optimized = Optimizer::optimize(&plan, flags);
        assert_eq!(optimized.display(), plan.display());
    }

    #[test]
    fn slice_pushdown_caps_the_scan() {
        let plan = LogicalPlan::Slice {
            input: Arc::new(scan()),
            offset: 0,
            len: 1,
        };
        let optimized = Optimizer::optimize(&plan, OptFlags::default());
        assert!(matches!(
            optimized,
            LogicalPlan::DataFrameScan {
                n_rows: Some(1),
                ..
            }
        ));
    }

    #[test]
    fn simplify_folds_literals_and_double_negation() {
        assert_eq!(simplify_expr(lit(1).add(lit(2))), lit(3));
        assert_eq!(simplify_expr(lit(1.5).gt(lit(1))), lit(true));
        assert_eq!(simplify_expr(col("p").not_().not_()), col("p"));
    }
}
