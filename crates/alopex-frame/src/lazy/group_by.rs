use std::sync::Arc;

use crate::lazy::{DynamicGroupOptions, LazyFrame, LogicalPlan, RollingGroupOptions};
use crate::physical::ExecutionEngine;
use crate::Expr;

/// Group-by builder for `LazyFrame`.
///
/// Every aggregation expression is evaluated once per group; expressions that
/// yield more than one value per group produce a list column.
#[derive(Debug, Clone)]
pub struct LazyGroupBy {
    pub(crate) plan: Arc<LogicalPlan>,
    pub(crate) engine: Arc<dyn ExecutionEngine>,
    pub(crate) keys: Vec<Expr>,
    pub(crate) maintain_order: bool,
}

impl LazyGroupBy {
    /// Add an aggregate node to the logical plan.
    pub fn agg(self, aggs: Vec<Expr>) -> LazyFrame {
        let plan = LogicalPlan::Aggregate {
            input: self.plan,
            keys: self.keys,
            aggs,
            maintain_order: self.maintain_order,
        };
        LazyFrame::from_parts(plan, self.engine)
    }

    /// First `n` rows of every group.
    pub fn head(self, n: usize) -> LazyFrame {
        self.slice_groups(n, false)
    }

    /// Last `n` rows of every group.
    pub fn tail(self, n: usize) -> LazyFrame {
        self.slice_groups(n, true)
    }

    fn slice_groups(self, n: usize, from_tail: bool) -> LazyFrame {
        let plan = LogicalPlan::GroupSlice {
            input: self.plan,
            keys: self.keys,
            n,
            from_tail,
            maintain_order: self.maintain_order,
        };
        LazyFrame::from_parts(plan, self.engine)
    }
}

/// One window per row, looking back `period` from that row's index value.
#[derive(Debug, Clone)]
pub struct RollingGroupBy {
    pub(crate) plan: Arc<LogicalPlan>,
    pub(crate) engine: Arc<dyn ExecutionEngine>,
    pub(crate) options: RollingGroupOptions,
}

impl RollingGroupBy {
    pub fn agg(self, aggs: Vec<Expr>) -> LazyFrame {
        let plan = LogicalPlan::RollingAggregate {
            input: self.plan,
            options: self.options,
            aggs,
        };
        LazyFrame::from_parts(plan, self.engine)
    }
}

/// Fixed windows laid out every `every` along the index column.
#[derive(Debug, Clone)]
pub struct DynamicGroupBy {
    pub(crate) plan: Arc<LogicalPlan>,
    pub(crate) engine: Arc<dyn ExecutionEngine>,
    pub(crate) options: DynamicGroupOptions,
}

impl DynamicGroupBy {
    pub fn agg(self, aggs: Vec<Expr>) -> LazyFrame {
        let plan = LogicalPlan::DynamicAggregate {
            input: self.plan,
            options: self.options,
            aggs,
        };
        LazyFrame::from_parts(plan, self.engine)
    }
}
