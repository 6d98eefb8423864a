use chrono::NaiveDateTime;

use crate::dataframe::Series;
use crate::expr::conditional::When;
use crate::expr::expr::LiteralValue;
use crate::Expr;

/// Anything that may stand on the other side of a binary or combinator call.
#[derive(Debug, Clone)]
pub enum Operand {
    Expr(Expr),
    Series(Series),
    /// A bare string; a column name or a string literal depending on context.
    Str(String),
    Literal(LiteralValue),
}

impl From<Expr> for Operand {
    fn from(v: Expr) -> Self {
        Operand::Expr(v)
    }
}

impl From<&Expr> for Operand {
    fn from(v: &Expr) -> Self {
        Operand::Expr(v.clone())
    }
}

impl From<Series> for Operand {
    fn from(v: Series) -> Self {
        Operand::Series(v)
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Str(v.to_string())
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Str(v)
    }
}

impl From<&String> for Operand {
    fn from(v: &String) -> Self {
        Operand::Str(v.clone())
    }
}

impl From<LiteralValue> for Operand {
    fn from(v: LiteralValue) -> Self {
        Operand::Literal(v)
    }
}

macro_rules! literal_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Literal(LiteralValue::from(v))
                }
            }
        )*
    };
}

literal_operand!(bool, i32, i64, u32, u64, f32, f64, NaiveDateTime);

/// Normalize `value` into an expression.
///
/// Expressions pass through, columns become literal columns, and a bare
/// string becomes a string literal when `str_to_lit` is set or a column
/// reference otherwise.
pub fn expr_to_lit_or_expr(value: impl Into<Operand>, str_to_lit: bool) -> Expr {
    match value.into() {
        Operand::Expr(expr) => expr,
        Operand::Series(series) => Expr::Literal(LiteralValue::Series(series)),
        Operand::Str(s) if str_to_lit => Expr::Literal(LiteralValue::Utf8(s)),
        Operand::Str(s) => Expr::Column(s),
        Operand::Literal(value) => Expr::Literal(value),
    }
}

/// Create an expression that refers to a column by name (case-sensitive).
pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

/// One column expression per name.
pub fn cols<I, S>(names: I) -> Vec<Expr>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| col(n.as_ref())).collect()
}

/// Create a literal expression from a scalar value or a whole column.
pub fn lit<T>(value: T) -> Expr
where
    T: Into<LiteralValue>,
{
    Expr::Literal(value.into())
}

/// Create a wildcard expression that expands to all columns in projections.
pub fn all() -> Expr {
    Expr::Wildcard
}

/// Start a conditional chain; a bare string predicate names a column.
pub fn when(predicate: impl Into<Operand>) -> When {
    When::new(expr_to_lit_or_expr(predicate, false))
}

#[cfg(test)]
mod tests {
    use super::{col, cols, expr_to_lit_or_expr, lit};
    use crate::expr::LiteralValue;
    use crate::{Expr, Series};

    #[test]
    fn strings_follow_the_flag() {
        assert_eq!(
            expr_to_lit_or_expr("a", true),
            Expr::Literal(LiteralValue::Utf8("a".into()))
        );
        assert_eq!(expr_to_lit_or_expr("a", false), col("a"));
    }

    #[test]
    fn expressions_and_columns_pass_through() {
        let e = col("x").add(lit(1));
        assert_eq!(expr_to_lit_or_expr(e.clone(), true), e);
        assert_eq!(expr_to_lit_or_expr(e.clone(), false), e);

        let s = Series::new("s", serde_json::json!([1, 2])).unwrap();
        assert_eq!(
            expr_to_lit_or_expr(s.clone(), false),
            Expr::Literal(LiteralValue::Series(s))
        );
        assert_eq!(
            expr_to_lit_or_expr(2.5, false),
            Expr::Literal(LiteralValue::Float64(2.5))
        );
    }

    #[test]
    fn cols_builds_column_references() {
        assert_eq!(cols(["a", "b"]), vec![col("a"), col("b")]);
    }
}
