mod duration;
mod group_by;
mod lazyframe;
mod logical_plan;
mod optimizer;
mod options;

/// Fixed-length intervals for temporal grouping.
pub use duration::Duration;
/// Grouping contexts returned by `LazyFrame::group_by*`.
pub use group_by::{DynamicGroupBy, LazyGroupBy, RollingGroupBy};
/// Lazy query API.
pub use lazyframe::LazyFrame;
/// Logical plan nodes and projection kinds.
pub use logical_plan::{LogicalPlan, ProjectionKind};
/// Logical plan optimizer (pushdowns and simplification).
pub use optimizer::Optimizer;
/// Option records for materialization, joins and temporal grouping.
pub use options::{
    AsofJoinOptions, AsofStrategy, ClosedWindow, CollectOptions, DynamicGroupOptions,
    JoinOptions, JoinType, OptFlags, RollingGroupOptions, UniqueKeep,
};
