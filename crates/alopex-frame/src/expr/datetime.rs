use serde::{Deserialize, Serialize};

use crate::expr::expr::FunctionExpr;
use crate::Expr;

/// Component extraction and formatting for `Date`/`Datetime` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalFunction {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    /// ISO weekday, Monday = 1.
    Weekday,
    /// Day of the year starting at 1.
    OrdinalDay,
    /// Format with a `chrono` format string.
    Strftime(String),
}

pub struct DateLikeNameSpace(pub(crate) Expr);

impl DateLikeNameSpace {
    fn apply(self, function: TemporalFunction) -> Expr {
        self.0.function(FunctionExpr::Temporal(function))
    }

    pub fn year(self) -> Expr {
        self.apply(TemporalFunction::Year)
    }

    pub fn month(self) -> Expr {
        self.apply(TemporalFunction::Month)
    }

    pub fn day(self) -> Expr {
        self.apply(TemporalFunction::Day)
    }

    pub fn hour(self) -> Expr {
        self.apply(TemporalFunction::Hour)
    }

    pub fn minute(self) -> Expr {
        self.apply(TemporalFunction::Minute)
    }

    pub fn second(self) -> Expr {
        self.apply(TemporalFunction::Second)
    }

    pub fn millisecond(self) -> Expr {
        self.apply(TemporalFunction::Millisecond)
    }

    pub fn weekday(self) -> Expr {
        self.apply(TemporalFunction::Weekday)
    }

    pub fn ordinal_day(self) -> Expr {
        self.apply(TemporalFunction::OrdinalDay)
    }

    pub fn strftime(self, format: &str) -> Expr {
        self.apply(TemporalFunction::Strftime(format.to_string()))
    }
}
