use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::construction::extract::datetime_to_epoch;
use crate::dataframe::Series;
use crate::datatypes::{DataType, TimeUnit};
use crate::expr::datetime::{DateLikeNameSpace, TemporalFunction};
use crate::expr::functions::{expr_to_lit_or_expr, Operand};
use crate::expr::list::{ListFunction, ListNameSpace};
use crate::expr::options::{RollingArgs, RollingSpec, SampleArgs, SampleSpec, SortOptions};
use crate::expr::r#struct::{StructFunction, StructNameSpace};
use crate::expr::string::{StringFunction, StringNameSpace};
use crate::format::SerializationFormat;
use crate::Result;

/// Expression AST used by `DataFrame` and `LazyFrame`.
///
/// Every builder method consumes `self` and returns a new node; nothing is
/// evaluated until a plan containing the expression is collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column reference.
    Column(String),
    /// Literal scalar value or literal column.
    Literal(LiteralValue),
    /// Binary operator expression.
    BinaryOp {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    /// Unary operator expression.
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },
    /// Aggregation expression; reduces its input to one value (per group).
    Agg { func: AggFunc, expr: Box<Expr> },
    /// Expression alias (renames the resulting column).
    Alias { expr: Box<Expr>, name: String },
    /// Type conversion.
    Cast {
        expr: Box<Expr>,
        dtype: DataType,
        strict: bool,
    },
    /// `when(predicate).then(truthy).otherwise(falsy)`.
    Ternary {
        predicate: Box<Expr>,
        truthy: Box<Expr>,
        falsy: Box<Expr>,
    },
    /// Window expression evaluated per partition and broadcast back to rows.
    Window {
        function: Box<Expr>,
        partition_by: Vec<Expr>,
    },
    Cumulative {
        func: CumulativeFunc,
        expr: Box<Expr>,
        reverse: bool,
    },
    Rolling {
        func: RollingFunc,
        expr: Box<Expr>,
        options: RollingSpec,
    },
    Sample { expr: Box<Expr>, spec: SampleSpec },
    Shift { expr: Box<Expr>, periods: i64 },
    FillNull { expr: Box<Expr>, value: Box<Expr> },
    Sort {
        expr: Box<Expr>,
        options: SortOptions,
    },
    /// Namespaced function (string, list, temporal, struct).
    Function {
        input: Box<Expr>,
        function: FunctionExpr,
    },
    /// Wildcard (`*`) that expands to all columns in projections.
    Wildcard,
}

/// Supported binary operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    /// Remainder.
    Rem,
    Eq,
    Neq,
    Gt,
    Lt,
    /// Greater-than-or-equal.
    Ge,
    /// Less-than-or-equal.
    Le,
    And,
    Or,
}

impl Operator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Neq | Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Rem
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Eq => "==",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::And => "and",
            Operator::Or => "or",
        };
        f.write_str(s)
    }
}

/// Supported unary operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Boolean NOT.
    Not,
    /// Arithmetic negation.
    Negate,
    IsNull,
    IsNotNull,
}

/// Supported aggregation functions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFunc {
    /// Sum of non-null values.
    Sum,
    /// Mean of non-null values.
    Mean,
    /// Count of non-null values.
    Count,
    /// Minimum of non-null values.
    Min,
    /// Maximum of non-null values.
    Max,
    First,
    Last,
    Median,
    /// Number of distinct values (null counts as one value).
    NUnique,
    /// Standard deviation with `ddof` delta degrees of freedom.
    Std { ddof: u8 },
    /// Variance with `ddof` delta degrees of freedom.
    Var { ddof: u8 },
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggFunc::Sum => f.write_str("sum"),
            AggFunc::Mean => f.write_str("mean"),
            AggFunc::Count => f.write_str("count"),
            AggFunc::Min => f.write_str("min"),
            AggFunc::Max => f.write_str("max"),
            AggFunc::First => f.write_str("first"),
            AggFunc::Last => f.write_str("last"),
            AggFunc::Median => f.write_str("median"),
            AggFunc::NUnique => f.write_str("n_unique"),
            AggFunc::Std { ddof } => write!(f, "std[ddof={ddof}]"),
            AggFunc::Var { ddof } => write!(f, "var[ddof={ddof}]"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CumulativeFunc {
    Sum,
    Min,
    Max,
    Prod,
    Count,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum RollingFunc {
    Max,
    Mean,
    Min,
    Sum,
    Std,
    Var,
    Median,
    Quantile(f64),
    Skew,
}

/// Function nodes grouped by the namespace that builds them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionExpr {
    Str(StringFunction),
    List(ListFunction),
    Temporal(TemporalFunction),
    Struct(StructFunction),
}

impl fmt::Display for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionExpr::Str(func) => write!(f, "str.{func:?}"),
            FunctionExpr::List(func) => write!(f, "list.{func:?}"),
            FunctionExpr::Temporal(func) => write!(f, "dt.{func:?}"),
            FunctionExpr::Struct(func) => write!(f, "struct.{func:?}"),
        }
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// Null literal.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// 64-bit integer literal.
    Int64(i64),
    UInt64(u64),
    /// 64-bit float literal.
    Float64(f64),
    /// UTF-8 string literal.
    Utf8(String),
    /// Epoch offset in `unit`.
    Datetime(i64, TimeUnit),
    /// A whole column used as a literal.
    Series(Series),
}

impl LiteralValue {
    pub fn dtype(&self) -> DataType {
        match self {
            LiteralValue::Null => DataType::Null,
            LiteralValue::Boolean(_) => DataType::Bool,
            LiteralValue::Int64(_) => DataType::Int64,
            LiteralValue::UInt64(_) => DataType::UInt64,
            LiteralValue::Float64(_) => DataType::Float64,
            LiteralValue::Utf8(_) => DataType::Utf8,
            LiteralValue::Datetime(_, unit) => DataType::Datetime(*unit, None),
            LiteralValue::Series(s) => s.dtype(),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Null => f.write_str("null"),
            LiteralValue::Boolean(v) => write!(f, "{v}"),
            LiteralValue::Int64(v) => write!(f, "{v}"),
            LiteralValue::UInt64(v) => write!(f, "{v}"),
            LiteralValue::Float64(v) => write!(f, "{v}"),
            LiteralValue::Utf8(v) => write!(f, "{v:?}"),
            LiteralValue::Datetime(v, unit) => write!(f, "{v}{unit}"),
            LiteralValue::Series(s) => write!(f, "Series[{}; {}]", s.name(), s.len()),
        }
    }
}

impl From<()> for LiteralValue {
    fn from(_: ()) -> Self {
        LiteralValue::Null
    }
}

impl From<bool> for LiteralValue {
    fn from(v: bool) -> Self {
        LiteralValue::Boolean(v)
    }
}

impl From<i32> for LiteralValue {
    fn from(v: i32) -> Self {
        LiteralValue::Int64(v as i64)
    }
}

impl From<i64> for LiteralValue {
    fn from(v: i64) -> Self {
        LiteralValue::Int64(v)
    }
}

impl From<u32> for LiteralValue {
    fn from(v: u32) -> Self {
        LiteralValue::UInt64(v as u64)
    }
}

impl From<u64> for LiteralValue {
    fn from(v: u64) -> Self {
        LiteralValue::UInt64(v)
    }
}

impl From<f32> for LiteralValue {
    fn from(v: f32) -> Self {
        LiteralValue::Float64(v as f64)
    }
}

impl From<f64> for LiteralValue {
    fn from(v: f64) -> Self {
        LiteralValue::Float64(v)
    }
}

impl From<String> for LiteralValue {
    fn from(v: String) -> Self {
        LiteralValue::Utf8(v)
    }
}

impl From<&str> for LiteralValue {
    fn from(v: &str) -> Self {
        LiteralValue::Utf8(v.to_string())
    }
}

impl From<NaiveDateTime> for LiteralValue {
    fn from(v: NaiveDateTime) -> Self {
        LiteralValue::Datetime(
            datetime_to_epoch(&v, TimeUnit::Milliseconds),
            TimeUnit::Milliseconds,
        )
    }
}

impl From<Series> for LiteralValue {
    fn from(v: Series) -> Self {
        LiteralValue::Series(v)
    }
}

macro_rules! binary_method {
    ($(#[$meta:meta])* $name:ident, $alias:ident, $op:expr) => {
        $(#[$meta])*
        pub fn $name(self, rhs: impl Into<Operand>) -> Expr {
            self.binary($op, rhs)
        }

        #[doc = concat!("Alias for [`Expr::", stringify!($name), "`].")]
        pub fn $alias(self, rhs: impl Into<Operand>) -> Expr {
            self.binary($op, rhs)
        }
    };
}

impl Expr {
    /// Alias this expression (used to name output columns).
    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::Alias {
            expr: Box::new(self),
            name: name.into(),
        }
    }

    /// Combine with `rhs`; bare strings on the right are string literals.
    fn binary(self, op: Operator, rhs: impl Into<Operand>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(expr_to_lit_or_expr(rhs, true)),
        }
    }

    fn unary(self, op: UnaryOperator) -> Expr {
        Expr::UnaryOp {
            op,
            expr: Box::new(self),
        }
    }

    fn agg(self, func: AggFunc) -> Expr {
        Expr::Agg {
            func,
            expr: Box::new(self),
        }
    }

    binary_method!(
        /// Build an addition expression.
        #[allow(clippy::should_implement_trait)]
        add, plus, Operator::Add
    );
    binary_method!(
        /// Build a subtraction expression.
        #[allow(clippy::should_implement_trait)]
        sub, minus, Operator::Sub
    );
    binary_method!(
        /// Build a multiplication expression.
        #[allow(clippy::should_implement_trait)]
        mul, multiply_by, Operator::Mul
    );
    binary_method!(
        /// Build a division expression.
        #[allow(clippy::should_implement_trait)]
        div, divide_by, Operator::Div
    );
    binary_method!(
        /// Build a remainder expression.
        #[allow(clippy::should_implement_trait)]
        rem, modulo, Operator::Rem
    );
    binary_method!(
        /// Build an equality predicate.
        #[allow(clippy::should_implement_trait)]
        eq, equals, Operator::Eq
    );
    binary_method!(
        /// Build an inequality predicate.
        neq, not_equals, Operator::Neq
    );
    binary_method!(
        /// Build a greater-than predicate.
        #[allow(clippy::should_implement_trait)]
        gt, greater_than, Operator::Gt
    );
    binary_method!(
        /// Build a greater-than-or-equal predicate.
        gt_eq, greater_than_equals, Operator::Ge
    );
    binary_method!(
        /// Build a less-than predicate.
        #[allow(clippy::should_implement_trait)]
        lt, less_than, Operator::Lt
    );
    binary_method!(
        /// Build a less-than-or-equal predicate.
        lt_eq, less_than_equals, Operator::Le
    );

    /// Build a boolean AND predicate.
    pub fn and_(self, rhs: impl Into<Operand>) -> Expr {
        self.binary(Operator::And, rhs)
    }

    /// Build a boolean OR predicate.
    pub fn or_(self, rhs: impl Into<Operand>) -> Expr {
        self.binary(Operator::Or, rhs)
    }

    /// Build a boolean NOT predicate.
    pub fn not_(self) -> Expr {
        self.unary(UnaryOperator::Not)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn neg(self) -> Expr {
        self.unary(UnaryOperator::Negate)
    }

    pub fn is_null(self) -> Expr {
        self.unary(UnaryOperator::IsNull)
    }

    pub fn is_not_null(self) -> Expr {
        self.unary(UnaryOperator::IsNotNull)
    }

    /// Cast to `dtype`; values that cannot be represented become null.
    pub fn cast(self, dtype: DataType) -> Expr {
        Expr::Cast {
            expr: Box::new(self),
            dtype,
            strict: false,
        }
    }

    /// Cast to `dtype`; a value that cannot be represented fails the query.
    pub fn strict_cast(self, dtype: DataType) -> Expr {
        Expr::Cast {
            expr: Box::new(self),
            dtype,
            strict: true,
        }
    }

    /// Replace nulls with `value` (bare strings are string literals).
    pub fn fill_null(self, value: impl Into<Operand>) -> Expr {
        Expr::FillNull {
            expr: Box::new(self),
            value: Box::new(expr_to_lit_or_expr(value, true)),
        }
    }

    /// Shift values by `periods` rows, filling the gap with nulls.
    pub fn shift(self, periods: i64) -> Expr {
        Expr::Shift {
            expr: Box::new(self),
            periods,
        }
    }

    pub fn sort(self, descending: bool) -> Expr {
        self.sort_with(SortOptions::default().with_descending(descending))
    }

    pub fn sort_with(self, options: SortOptions) -> Expr {
        Expr::Sort {
            expr: Box::new(self),
            options,
        }
    }

    /// Evaluate this expression per partition and broadcast the result back
    /// to the rows of each partition. Bare strings name columns.
    pub fn over<I, O>(self, partition_by: I) -> Expr
    where
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        Expr::Window {
            function: Box::new(self),
            partition_by: partition_by
                .into_iter()
                .map(|p| expr_to_lit_or_expr(p, false))
                .collect(),
        }
    }

    /// Build a `sum` aggregation.
    pub fn sum(self) -> Expr {
        self.agg(AggFunc::Sum)
    }

    /// Build a `mean` aggregation.
    pub fn mean(self) -> Expr {
        self.agg(AggFunc::Mean)
    }

    /// Build a `count` aggregation (nulls excluded).
    pub fn count(self) -> Expr {
        self.agg(AggFunc::Count)
    }

    /// Build a `min` aggregation.
    pub fn min(self) -> Expr {
        self.agg(AggFunc::Min)
    }

    /// Build a `max` aggregation.
    pub fn max(self) -> Expr {
        self.agg(AggFunc::Max)
    }

    pub fn first(self) -> Expr {
        self.agg(AggFunc::First)
    }

    pub fn last(self) -> Expr {
        self.agg(AggFunc::Last)
    }

    pub fn median(self) -> Expr {
        self.agg(AggFunc::Median)
    }

    pub fn n_unique(self) -> Expr {
        self.agg(AggFunc::NUnique)
    }

    pub fn std(self, ddof: u8) -> Expr {
        self.agg(AggFunc::Std { ddof })
    }

    pub fn var(self, ddof: u8) -> Expr {
        self.agg(AggFunc::Var { ddof })
    }

    fn cumulative(self, func: CumulativeFunc, reverse: bool) -> Expr {
        Expr::Cumulative {
            func,
            expr: Box::new(self),
            reverse,
        }
    }

    pub fn cum_sum(self, reverse: bool) -> Expr {
        self.cumulative(CumulativeFunc::Sum, reverse)
    }

    pub fn cum_min(self, reverse: bool) -> Expr {
        self.cumulative(CumulativeFunc::Min, reverse)
    }

    pub fn cum_max(self, reverse: bool) -> Expr {
        self.cumulative(CumulativeFunc::Max, reverse)
    }

    pub fn cum_prod(self, reverse: bool) -> Expr {
        self.cumulative(CumulativeFunc::Prod, reverse)
    }

    /// Running count of non-null values.
    pub fn cum_count(self, reverse: bool) -> Expr {
        self.cumulative(CumulativeFunc::Count, reverse)
    }

    fn rolling(self, func: RollingFunc, args: impl Into<RollingArgs>) -> Expr {
        Expr::Rolling {
            func,
            expr: Box::new(self),
            options: args.into().resolve(),
        }
    }

    /// Rolling maximum over a window given as a size or [`RollingOptions`].
    ///
    /// [`RollingOptions`]: crate::expr::RollingOptions
    pub fn rolling_max(self, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Max, args)
    }

    pub fn rolling_mean(self, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Mean, args)
    }

    pub fn rolling_min(self, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Min, args)
    }

    pub fn rolling_sum(self, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Sum, args)
    }

    pub fn rolling_std(self, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Std, args)
    }

    pub fn rolling_var(self, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Var, args)
    }

    pub fn rolling_median(self, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Median, args)
    }

    /// Rolling quantile; `quantile` lies in `[0, 1]` and uses linear
    /// interpolation between neighbours.
    pub fn rolling_quantile(self, quantile: f64, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Quantile(quantile), args)
    }

    pub fn rolling_skew(self, args: impl Into<RollingArgs>) -> Expr {
        self.rolling(RollingFunc::Skew, args)
    }

    /// Sample values from this expression.
    ///
    /// Fails when neither a count nor a fraction is given.
    pub fn sample(self, args: impl Into<SampleArgs>) -> Result<Expr> {
        Ok(Expr::Sample {
            expr: Box::new(self),
            spec: args.into().resolve()?,
        })
    }

    /// String functions.
    pub fn str(self) -> StringNameSpace {
        StringNameSpace(self)
    }

    /// List functions.
    pub fn list(self) -> ListNameSpace {
        ListNameSpace(self)
    }

    /// Date and time functions.
    pub fn dt(self) -> DateLikeNameSpace {
        DateLikeNameSpace(self)
    }

    /// Struct functions.
    pub fn struct_(self) -> StructNameSpace {
        StructNameSpace(self)
    }

    pub(crate) fn function(self, function: FunctionExpr) -> Expr {
        Expr::Function {
            input: Box::new(self),
            function,
        }
    }

    /// Serialize this expression using `format`.
    pub fn serialize_to(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        format.encode(self)
    }

    /// Rebuild an expression produced by [`Expr::serialize_to`].
    pub fn deserialize_from(format: SerializationFormat, bytes: &[u8]) -> Result<Expr> {
        format.decode(bytes)
    }

    /// Name of the column this expression produces.
    ///
    /// Follows the leftmost input: `col("a") + col("b")` is named `a`.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Column(name) => name.clone(),
            Expr::Alias { name, .. } => name.clone(),
            Expr::Literal(LiteralValue::Series(s)) => s.name().to_string(),
            Expr::Literal(_) => "literal".to_string(),
            Expr::Wildcard => "*".to_string(),
            Expr::Ternary { truthy, .. } => truthy.output_name(),
            Expr::BinaryOp { left, .. } => left.output_name(),
            Expr::UnaryOp { expr, .. }
            | Expr::Agg { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Cumulative { expr, .. }
            | Expr::Rolling { expr, .. }
            | Expr::Sample { expr, .. }
            | Expr::Shift { expr, .. }
            | Expr::FillNull { expr, .. }
            | Expr::Sort { expr, .. } => expr.output_name(),
            Expr::Window { function, .. } => function.output_name(),
            Expr::Function {
                function: FunctionExpr::Struct(StructFunction::FieldByName(name)),
                ..
            } => name.clone(),
            Expr::Function { input, .. } => input.output_name(),
        }
    }

    /// Direct child expressions.
    pub(crate) fn inputs(&self) -> Vec<&Expr> {
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Wildcard => vec![],
            Expr::BinaryOp { left, right, .. } => vec![left, right],
            Expr::Ternary {
                predicate,
                truthy,
                falsy,
            } => vec![predicate, truthy, falsy],
            Expr::Window {
                function,
                partition_by,
            } => std::iter::once(function.as_ref())
                .chain(partition_by.iter())
                .collect(),
            Expr::FillNull { expr, value } => vec![expr, value],
            Expr::UnaryOp { expr, .. }
            | Expr::Agg { expr, .. }
            | Expr::Alias { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Cumulative { expr, .. }
            | Expr::Rolling { expr, .. }
            | Expr::Sample { expr, .. }
            | Expr::Shift { expr, .. }
            | Expr::Sort { expr, .. } => vec![expr],
            Expr::Function { input, .. } => vec![input],
        }
    }

    /// Rebuild this node with every direct child passed through `f`.
    pub(crate) fn map_inputs(self, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
        let mut map = |e: Box<Expr>| Box::new(f(*e));
        match self {
            leaf @ (Expr::Column(_) | Expr::Literal(_) | Expr::Wildcard) => leaf,
            Expr::BinaryOp { left, op, right } => {
                let left = map(left);
                let right = map(right);
                Expr::BinaryOp { left, op, right }
            }
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op,
                expr: map(expr),
            },
            Expr::Agg { func, expr } => Expr::Agg {
                func,
                expr: map(expr),
            },
            Expr::Alias { expr, name } => Expr::Alias {
                expr: map(expr),
                name,
            },
            Expr::Cast {
                expr,
                dtype,
                strict,
            } => Expr::Cast {
                expr: map(expr),
                dtype,
                strict,
            },
            Expr::Ternary {
                predicate,
                truthy,
                falsy,
            } => {
                let predicate = map(predicate);
                let truthy = map(truthy);
                let falsy = map(falsy);
                Expr::Ternary {
                    predicate,
                    truthy,
                    falsy,
                }
            }
            Expr::Window {
                function,
                partition_by,
            } => {
                let function = map(function);
                let partition_by = partition_by.into_iter().map(|p| *map(Box::new(p))).collect();
                Expr::Window {
                    function,
                    partition_by,
                }
            }
            Expr::Cumulative {
                func,
                expr,
                reverse,
            } => Expr::Cumulative {
                func,
                expr: map(expr),
                reverse,
            },
            Expr::Rolling {
                func,
                expr,
                options,
            } => Expr::Rolling {
                func,
                expr: map(expr),
                options,
            },
            Expr::Sample { expr, spec } => Expr::Sample {
                expr: map(expr),
                spec,
            },
            Expr::Shift { expr, periods } => Expr::Shift {
                expr: map(expr),
                periods,
            },
            Expr::FillNull { expr, value } => {
                let expr = map(expr);
                let value = map(value);
                Expr::FillNull { expr, value }
            }
            Expr::Sort { expr, options } => Expr::Sort {
                expr: map(expr),
                options,
            },
            Expr::Function { input, function } => Expr::Function {
                input: map(input),
                function,
            },
        }
    }

    /// Returns `true` if this expression, or any child, aggregates.
    pub(crate) fn has_aggregation(&self) -> bool {
        match self {
            Expr::Agg { .. } => true,
            // a window aggregates but broadcasts back to full length
            Expr::Window { .. } => false,
            other => other.inputs().into_iter().any(Expr::has_aggregation),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "col({name})"),
            Expr::Literal(value) => write!(f, "lit({value})"),
            Expr::Wildcard => f.write_str("*"),
            Expr::Alias { expr, name } => write!(f, "{expr} as {name}"),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => write!(f, "not({expr})"),
                UnaryOperator::Negate => write!(f, "-({expr})"),
                UnaryOperator::IsNull => write!(f, "{expr}.is_null()"),
                UnaryOperator::IsNotNull => write!(f, "{expr}.is_not_null()"),
            },
            Expr::BinaryOp { left, op, right } => write!(f, "({left} {op} {right})"),
            Expr::Agg { func, expr } => write!(f, "{func}({expr})"),
            Expr::Cast { expr, dtype, strict } => {
                let kind = if *strict { "strict_cast" } else { "cast" };
                write!(f, "{expr}.{kind}({dtype})")
            }
            Expr::Ternary {
                predicate,
                truthy,
                falsy,
            } => write!(f, "when({predicate}).then({truthy}).otherwise({falsy})"),
            Expr::Window {
                function,
                partition_by,
            } => {
                let keys = partition_by
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{function}.over([{keys}])")
            }
            Expr::Cumulative {
                func,
                expr,
                reverse,
            } => write!(f, "{expr}.cum_{func:?}(reverse={reverse})"),
            Expr::Rolling {
                func,
                expr,
                options,
            } => write!(f, "{expr}.rolling_{func:?}({})", options.window_size),
            Expr::Sample { expr, spec } => write!(f, "{expr}.sample({:?})", spec.size),
            Expr::Shift { expr, periods } => write!(f, "{expr}.shift({periods})"),
            Expr::FillNull { expr, value } => write!(f, "{expr}.fill_null({value})"),
            Expr::Sort { expr, options } => {
                write!(f, "{expr}.sort(descending={})", options.descending)
            }
            Expr::Function { input, function } => write!(f, "{input}.{function}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AggFunc, Expr, LiteralValue, Operator, UnaryOperator};
    use crate::expr::{col, lit, RollingOptions, SampleArgs, SampleOptions};
    use crate::format::SerializationFormat;
    use crate::{DataType, Series};

    #[test]
    fn builder_and_chaining_works() {
        let expr = col("a").add(lit(1_i64)).alias("b");
        assert_eq!(
            expr,
            Expr::Alias {
                expr: Box::new(Expr::BinaryOp {
                    left: Box::new(Expr::Column("a".to_string())),
                    op: Operator::Add,
                    right: Box::new(Expr::Literal(LiteralValue::Int64(1))),
                }),
                name: "b".to_string(),
            }
        );
        assert_eq!(col("a").plus(1), col("a").add(lit(1)));
        assert_eq!(col("a").modulo(2), col("a").rem(lit(2)));
    }

    #[test]
    fn logical_and_agg_works() {
        let expr = col("x")
            .gt(lit(1_i64))
            .and_(col("y").lt(lit(10_i64)).not_())
            .alias("p");

        assert!(matches!(
            expr,
            Expr::Alias {
                expr: _,
                name
            } if name == "p"
        ));

        let agg = col("v").sum();
        assert_eq!(
            agg,
            Expr::Agg {
                func: AggFunc::Sum,
                expr: Box::new(Expr::Column("v".to_string()))
            }
        );

        let u = Expr::Column("a".to_string()).not_();
        assert_eq!(
            u,
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(Expr::Column("a".to_string()))
            }
        );
    }

    #[test]
    fn strings_on_the_right_of_a_comparison_are_literals() {
        assert_eq!(
            col("s").eq("x"),
            Expr::BinaryOp {
                left: Box::new(col("s")),
                op: Operator::Eq,
                right: Box::new(Expr::Literal(LiteralValue::Utf8("x".into()))),
            }
        );
    }

    #[test]
    fn over_treats_strings_as_columns() {
        let expr = col("v").sum().over(["g"]);
        match expr {
            Expr::Window { partition_by, .. } => assert_eq!(partition_by, vec![col("g")]),
            other => panic!("unexpected expr: {other:?}"),
        }
    }

    #[test]
    fn rolling_window_is_an_index_count() {
        match col("a").rolling_mean(RollingOptions::new(3).with_center(true)) {
            Expr::Rolling { options, .. } => {
                assert_eq!(options.window_size, "3i");
                assert_eq!(options.min_periods, 3);
                assert!(options.center);
            }
            other => panic!("unexpected expr: {other:?}"),
        }
    }

    #[test]
    fn sample_requires_n_or_frac() {
        assert!(col("a")
            .sample(SampleArgs::Options(SampleOptions::default()))
            .is_err());
        assert!(col("a").sample(SampleArgs::N(2)).is_ok());
    }

    #[test]
    fn output_name_follows_leftmost_input() {
        assert_eq!(col("a").add(col("b")).output_name(), "a");
        assert_eq!(col("a").sum().alias("s").output_name(), "s");
        assert_eq!(lit(1).output_name(), "literal");
    }

    #[test]
    fn serialization_roundtrips_with_series_literal() {
        let s = Series::new("s", serde_json::json!([1, 2])).unwrap();
        let expr = col("a")
            .cast(DataType::Int32)
            .add(lit(s))
            .rolling_sum(2)
            .over(["g"])
            .alias("out");
        for format in [SerializationFormat::Json, SerializationFormat::Bincode] {
            let bytes = expr.serialize_to(format).unwrap();
            assert_eq!(Expr::deserialize_from(format, &bytes).unwrap(), expr);
        }
    }

    #[test]
    fn display_is_readable() {
        let s = col("a").gt(lit(1)).and_(col("b").is_null()).to_string();
        assert_eq!(s, "((col(a) > lit(1)) and col(b).is_null())");
    }
}
