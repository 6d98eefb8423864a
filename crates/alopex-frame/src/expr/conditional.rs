//! Conditional chains: `when(p).then(a).when(q).then(b).otherwise(c)`.
//!
//! Only `otherwise` produces an [`Expr`], so an unterminated chain cannot be
//! used where an expression is expected:
//!
//! ```compile_fail
//! use alopex_frame::{col, lit, when, Expr};
//!
//! let incomplete: Expr = when(col("a").gt(lit(1))).then(lit(1));
//! ```
//!
//! ```
//! use alopex_frame::{col, lit, when, Expr};
//!
//! let complete: Expr = when(col("a").gt(lit(1)))
//!     .then(lit("big"))
//!     .otherwise(lit("small"));
//! ```

use crate::expr::functions::{expr_to_lit_or_expr, Operand};
use crate::Expr;

/// A pending predicate awaiting its value.
#[derive(Debug, Clone)]
#[must_use = "a conditional chain must be terminated with `otherwise`"]
pub struct When {
    predicate: Expr,
}

/// One complete branch; may be extended or terminated.
#[derive(Debug, Clone)]
#[must_use = "a conditional chain must be terminated with `otherwise`"]
pub struct Then {
    branches: Vec<(Expr, Expr)>,
}

/// A further predicate on an existing chain.
#[derive(Debug, Clone)]
#[must_use = "a conditional chain must be terminated with `otherwise`"]
pub struct ChainedWhen {
    branches: Vec<(Expr, Expr)>,
    predicate: Expr,
}

#[derive(Debug, Clone)]
#[must_use = "a conditional chain must be terminated with `otherwise`"]
pub struct ChainedThen {
    branches: Vec<(Expr, Expr)>,
}

impl When {
    pub(crate) fn new(predicate: Expr) -> Self {
        Self { predicate }
    }

    /// Value where the predicate holds; bare strings name columns.
    pub fn then(self, value: impl Into<Operand>) -> Then {
        Then {
            branches: vec![(self.predicate, expr_to_lit_or_expr(value, false))],
        }
    }
}

impl Then {
    pub fn when(self, predicate: impl Into<Operand>) -> ChainedWhen {
        ChainedWhen {
            branches: self.branches,
            predicate: expr_to_lit_or_expr(predicate, false),
        }
    }

    /// Terminate the chain with the fallback value.
    pub fn otherwise(self, value: impl Into<Operand>) -> Expr {
        fold_branches(self.branches, expr_to_lit_or_expr(value, false))
    }
}

impl ChainedWhen {
    pub fn then(mut self, value: impl Into<Operand>) -> ChainedThen {
        self.branches
            .push((self.predicate, expr_to_lit_or_expr(value, false)));
        ChainedThen {
            branches: self.branches,
        }
    }
}

impl ChainedThen {
    pub fn when(self, predicate: impl Into<Operand>) -> ChainedWhen {
        ChainedWhen {
            branches: self.branches,
            predicate: expr_to_lit_or_expr(predicate, false),
        }
    }

    /// Terminate the chain with the fallback value.
    pub fn otherwise(self, value: impl Into<Operand>) -> Expr {
        fold_branches(self.branches, expr_to_lit_or_expr(value, false))
    }
}

/// Earlier branches take precedence, so they end up outermost.
fn fold_branches(branches: Vec<(Expr, Expr)>, otherwise: Expr) -> Expr {
    branches
        .into_iter()
        .rev()
        .fold(otherwise, |falsy, (predicate, truthy)| Expr::Ternary {
            predicate: Box::new(predicate),
            truthy: Box::new(truthy),
            falsy: Box::new(falsy),
        })
}
