use serde::{Deserialize, Serialize};

use crate::expr::expr::FunctionExpr;
use crate::Expr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructFunction {
    FieldByName(String),
    /// Rename fields positionally; the count must match.
    RenameFields(Vec<String>),
}

/// Struct functions over a `Struct` expression.
pub struct StructNameSpace(pub(crate) Expr);

impl StructNameSpace {
    /// Extract one field as a column named after the field.
    pub fn field_by_name(self, name: &str) -> Expr {
        self.0
            .function(FunctionExpr::Struct(StructFunction::FieldByName(
                name.to_string(),
            )))
    }

    pub fn rename_fields<I, S>(self, names: I) -> Expr
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.0
            .function(FunctionExpr::Struct(StructFunction::RenameFields(names)))
    }
}
