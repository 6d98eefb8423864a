mod conditional;
mod datetime;
#[allow(clippy::module_inception)]
mod expr;
mod functions;
mod list;
mod options;
mod string;
mod r#struct;

/// Conditional chain states.
pub use conditional::{ChainedThen, ChainedWhen, Then, When};
pub use datetime::{DateLikeNameSpace, TemporalFunction};
/// Expression AST and supporting enums.
pub use expr::{
    AggFunc, CumulativeFunc, Expr, FunctionExpr, LiteralValue, Operator, RollingFunc,
    UnaryOperator,
};
/// Expression builder helpers.
pub use functions::{all, col, cols, expr_to_lit_or_expr, lit, when, Operand};
pub use list::{ListFunction, ListNameSpace};
/// Option records for rolling, sampling and sorting.
pub use options::{
    RollingArgs, RollingOptions, RollingSpec, SampleArgs, SampleOptions, SampleSize, SampleSpec,
    SortOptions,
};
pub use r#struct::{StructFunction, StructNameSpace};
pub use string::{StringFunction, StringNameSpace};
