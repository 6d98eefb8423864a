use serde::{Deserialize, Serialize};

use crate::expr::expr::FunctionExpr;
use crate::Expr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListFunction {
    Lengths,
    /// Element at an index; negative indices count from the end.
    Get(i64),
    First,
    Last,
    /// Concatenate string elements with a separator.
    Join(String),
}

/// List functions over a `List` expression.
pub struct ListNameSpace(pub(crate) Expr);

impl ListNameSpace {
    fn apply(self, function: ListFunction) -> Expr {
        self.0.function(FunctionExpr::List(function))
    }

    pub fn lengths(self) -> Expr {
        self.apply(ListFunction::Lengths)
    }

    /// Element at `index`; out-of-range positions yield null.
    pub fn get(self, index: i64) -> Expr {
        self.apply(ListFunction::Get(index))
    }

    pub fn first(self) -> Expr {
        self.apply(ListFunction::First)
    }

    pub fn last(self) -> Expr {
        self.apply(ListFunction::Last)
    }

    pub fn join(self, separator: &str) -> Expr {
        self.apply(ListFunction::Join(separator.to_string()))
    }
}
