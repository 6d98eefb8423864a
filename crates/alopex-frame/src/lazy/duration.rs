use std::fmt;
use std::str::FromStr;

use crate::datatypes::TimeUnit;
use crate::{DataFrameError, Result};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A fixed-length interval parsed from strings like `"1h30m"`, `"2d"` or `"3i"`.
///
/// Index durations (`i`) count rows or integer index steps and cannot be mixed
/// with time units. Calendar units (`mo`, `y`) have no fixed length and are
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duration {
    Time { nanos: i64 },
    Index(i64),
}

impl Duration {
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |message: String| DataFrameError::configuration("duration", message);

        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(invalid(format!("empty duration string '{s}'")));
        }

        let mut nanos: i64 = 0;
        let mut index: Option<i64> = None;
        let mut saw_time = false;
        let mut rest = body;
        while !rest.is_empty() {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return Err(invalid(format!("expected a number in duration '{s}'")));
            }
            let value: i64 = rest[..digits]
                .parse()
                .map_err(|_| invalid(format!("number out of range in duration '{s}'")))?;
            rest = &rest[digits..];
            let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
            let unit = &rest[..unit_len];
            rest = &rest[unit_len..];

            let per_unit = match unit {
                "ns" => 1,
                "us" => 1_000,
                "ms" => 1_000_000,
                "s" => NANOS_PER_SECOND,
                "m" => 60 * NANOS_PER_SECOND,
                "h" => 3_600 * NANOS_PER_SECOND,
                "d" => 86_400 * NANOS_PER_SECOND,
                "w" => 7 * 86_400 * NANOS_PER_SECOND,
                "i" => {
                    let total = index
                        .unwrap_or(0)
                        .checked_add(value)
                        .ok_or_else(|| invalid(format!("duration '{s}' overflows")))?;
                    index = Some(total);
                    continue;
                }
                "mo" | "y" => {
                    return Err(invalid(format!(
                        "calendar unit '{unit}' in '{s}' has no fixed length"
                    )))
                }
                "" => return Err(invalid(format!("missing unit in duration '{s}'"))),
                other => {
                    return Err(invalid(format!("unknown unit '{other}' in duration '{s}'")))
                }
            };
            saw_time = true;
            nanos = value
                .checked_mul(per_unit)
                .and_then(|v| nanos.checked_add(v))
                .ok_or_else(|| invalid(format!("duration '{s}' overflows")))?;
        }

        let sign = if negative { -1 } else { 1 };
        match (index, saw_time) {
            (Some(_), true) => Err(invalid(format!(
                "duration '{s}' mixes index and time units"
            ))),
            (Some(n), false) => Ok(Duration::Index(sign * n)),
            (None, _) => Ok(Duration::Time {
                nanos: sign * nanos,
            }),
        }
    }

    pub fn is_index(self) -> bool {
        matches!(self, Duration::Index(_))
    }

    pub fn negate(self) -> Self {
        match self {
            Duration::Time { nanos } => Duration::Time { nanos: -nanos },
            Duration::Index(n) => Duration::Index(-n),
        }
    }

    /// Length expressed in `unit`, or the raw step count for index durations.
    pub fn in_unit(self, unit: Option<TimeUnit>) -> i64 {
        match (self, unit) {
            (Duration::Index(n), _) => n,
            (Duration::Time { nanos }, Some(unit)) => nanos / (NANOS_PER_SECOND / unit.per_second()),
            (Duration::Time { nanos }, None) => nanos,
        }
    }
}

impl FromStr for Duration {
    type Err = DataFrameError;

    fn from_str(s: &str) -> Result<Self> {
        Duration::parse(s)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Duration::Index(n) => write!(f, "{n}i"),
            Duration::Time { nanos } => write!(f, "{nanos}ns"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Duration;
    use crate::datatypes::TimeUnit;
    use crate::DataFrameError;

    #[test]
    fn parses_compound_durations() {
        let d = Duration::parse("1h30m").unwrap();
        assert_eq!(d.in_unit(Some(TimeUnit::Milliseconds)), 90 * 60 * 1000);
        assert_eq!(Duration::parse("-2d").unwrap().in_unit(Some(TimeUnit::Milliseconds)), -2 * 86_400_000);
        assert_eq!(Duration::parse("3i").unwrap(), Duration::Index(3));
    }

    #[test]
    fn rejects_calendar_and_mixed_units() {
        for bad in ["1mo", "2y", "1i2h", "", "h", "5", "9223372036854775807i1i"] {
            let err = Duration::parse(bad).unwrap_err();
            assert!(
                matches!(err, DataFrameError::Configuration { .. }),
                "{bad}: {err:?}"
            );
        }
    }
}
