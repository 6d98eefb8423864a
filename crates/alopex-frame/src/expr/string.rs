use serde::{Deserialize, Serialize};

use crate::expr::expr::FunctionExpr;
use crate::Expr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringFunction {
    /// Length in characters.
    Lengths,
    ToUppercase,
    ToLowercase,
    /// Regex match, or substring match when `literal` is set.
    Contains { pattern: String, literal: bool },
    StartsWith(String),
    EndsWith(String),
    Replace {
        pattern: String,
        value: String,
        literal: bool,
        all: bool,
    },
    /// Character slice; a negative offset counts from the end.
    Slice { offset: i64, length: Option<usize> },
    Strip,
    Split(String),
}

/// String functions over a `Utf8` expression.
pub struct StringNameSpace(pub(crate) Expr);

impl StringNameSpace {
    fn apply(self, function: StringFunction) -> Expr {
        self.0.function(FunctionExpr::Str(function))
    }

    pub fn lengths(self) -> Expr {
        self.apply(StringFunction::Lengths)
    }

    pub fn to_uppercase(self) -> Expr {
        self.apply(StringFunction::ToUppercase)
    }

    pub fn to_lowercase(self) -> Expr {
        self.apply(StringFunction::ToLowercase)
    }

    /// Test each value against a regular expression.
    pub fn contains(self, pattern: &str) -> Expr {
        self.apply(StringFunction::Contains {
            pattern: pattern.to_string(),
            literal: false,
        })
    }

    pub fn contains_literal(self, pattern: &str) -> Expr {
        self.apply(StringFunction::Contains {
            pattern: pattern.to_string(),
            literal: true,
        })
    }

    pub fn starts_with(self, prefix: &str) -> Expr {
        self.apply(StringFunction::StartsWith(prefix.to_string()))
    }

    pub fn ends_with(self, suffix: &str) -> Expr {
        self.apply(StringFunction::EndsWith(suffix.to_string()))
    }

    /// Replace the first regex match with `value`.
    pub fn replace(self, pattern: &str, value: &str) -> Expr {
        self.apply(StringFunction::Replace {
            pattern: pattern.to_string(),
            value: value.to_string(),
            literal: false,
            all: false,
        })
    }

    /// Replace every regex match with `value`.
    pub fn replace_all(self, pattern: &str, value: &str) -> Expr {
        self.apply(StringFunction::Replace {
            pattern: pattern.to_string(),
            value: value.to_string(),
            literal: false,
            all: true,
        })
    }

    pub fn slice(self, offset: i64, length: Option<usize>) -> Expr {
        self.apply(StringFunction::Slice { offset, length })
    }

    /// Trim surrounding whitespace.
    pub fn strip(self) -> Expr {
        self.apply(StringFunction::Strip)
    }

    /// Split into a list of strings on `by`.
    pub fn split(self, by: &str) -> Expr {
        self.apply(StringFunction::Split(by.to_string()))
    }
}
