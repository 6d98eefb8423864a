use serde::{Deserialize, Serialize};

use crate::{DataFrameError, Result};

/// Options for the `rolling_*` expression family.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingOptions {
    /// Number of rows in each window.
    pub window_size: usize,
    /// Optional per-position weights (length must equal `window_size`).
    pub weights: Option<Vec<f64>>,
    /// Minimum non-null values required for a result; defaults to `window_size`.
    pub min_periods: Option<usize>,
    /// Center the window on the current row instead of ending at it.
    pub center: bool,
}

impl RollingOptions {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            weights: None,
            min_periods: None,
            center: false,
        }
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_min_periods(mut self, min_periods: usize) -> Self {
        self.min_periods = Some(min_periods);
        self
    }

    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }
}

/// Positional `(window_size, weights, min_periods, center)` arguments or a
/// full option record.
#[derive(Debug, Clone, PartialEq)]
pub enum RollingArgs {
    Positional {
        window_size: usize,
        weights: Option<Vec<f64>>,
        min_periods: Option<usize>,
        center: bool,
    },
    Options(RollingOptions),
}

impl RollingArgs {
    pub fn positional(
        window_size: usize,
        weights: Option<Vec<f64>>,
        min_periods: Option<usize>,
        center: bool,
    ) -> Self {
        RollingArgs::Positional {
            window_size,
            weights,
            min_periods,
            center,
        }
    }
}

impl From<usize> for RollingArgs {
    fn from(window_size: usize) -> Self {
        RollingArgs::positional(window_size, None, None, false)
    }
}

/// Negative sizes clamp to an empty window, which is rejected at evaluation.
impl From<i32> for RollingArgs {
    fn from(window_size: i32) -> Self {
        RollingArgs::from(window_size.max(0) as usize)
    }
}

impl From<RollingOptions> for RollingArgs {
    fn from(options: RollingOptions) -> Self {
        RollingArgs::Options(options)
    }
}

impl RollingArgs {
    /// Resolve into the form recorded on the expression node.
    pub fn resolve(self) -> RollingSpec {
        let options = match self {
            RollingArgs::Positional {
                window_size,
                weights,
                min_periods,
                center,
            } => RollingOptions {
                window_size,
                weights,
                min_periods,
                center,
            },
            RollingArgs::Options(options) => options,
        };
        RollingSpec {
            window_size: format!("{}i", options.window_size),
            min_periods: options.min_periods.unwrap_or(options.window_size),
            weights: options.weights,
            center: options.center,
        }
    }
}

/// Rolling window parameters as carried by an expression.
///
/// `window_size` is an index-count duration string such as `"3i"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingSpec {
    pub window_size: String,
    pub min_periods: usize,
    pub weights: Option<Vec<f64>>,
    pub center: bool,
}

impl RollingSpec {
    /// Window length in rows.
    pub fn window_len(&self) -> Result<usize> {
        self.window_size
            .strip_suffix('i')
            .and_then(|n| n.parse().ok())
            .filter(|n: &usize| *n > 0)
            .ok_or_else(|| {
                DataFrameError::configuration(
                    "window_size",
                    format!("expected a positive index count like '3i', got '{}'", self.window_size),
                )
            })
    }
}

/// Sort order for `Expr::sort_with` and `LazyFrame::sort`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortOptions {
    pub descending: bool,
    /// Place nulls after all values instead of before them.
    pub nulls_last: bool,
    /// Keep the input order of equal keys.
    pub maintain_order: bool,
}

impl SortOptions {
    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn with_nulls_last(mut self, nulls_last: bool) -> Self {
        self.nulls_last = nulls_last;
        self
    }

    pub fn with_maintain_order(mut self, maintain_order: bool) -> Self {
        self.maintain_order = maintain_order;
        self
    }
}

/// Options for row sampling.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleOptions {
    pub n: Option<usize>,
    pub frac: Option<f64>,
    pub with_replacement: bool,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl SampleOptions {
    pub fn with_n(mut self, n: usize) -> Self {
        self.n = Some(n);
        self
    }

    pub fn with_frac(mut self, frac: f64) -> Self {
        self.frac = Some(frac);
        self
    }

    pub fn with_replacement(mut self, with_replacement: bool) -> Self {
        self.with_replacement = with_replacement;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A sample size, a fraction, or a full option record.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleArgs {
    N(usize),
    Frac(f64),
    Options(SampleOptions),
}

impl From<SampleOptions> for SampleArgs {
    fn from(options: SampleOptions) -> Self {
        SampleArgs::Options(options)
    }
}

impl SampleArgs {
    /// Resolve into a sampling spec; `n` wins over `frac`.
    pub fn resolve(self) -> Result<SampleSpec> {
        let options = match self {
            SampleArgs::N(n) => SampleOptions::default().with_n(n),
            SampleArgs::Frac(frac) => SampleOptions::default().with_frac(frac),
            SampleArgs::Options(options) => options,
        };
        let size = match (options.n, options.frac) {
            (Some(n), _) => SampleSize::N(n),
            (None, Some(frac)) if frac.is_finite() && frac >= 0.0 => SampleSize::Frac(frac),
            (None, Some(frac)) => {
                return Err(DataFrameError::invalid_argument(format!(
                    "sample fraction must be a non-negative number, got {frac}"
                )))
            }
            (None, None) => {
                return Err(DataFrameError::invalid_argument(
                    "must specify either 'frac' or 'n'",
                ))
            }
        };
        Ok(SampleSpec {
            size,
            with_replacement: options.with_replacement,
            shuffle: options.shuffle,
            seed: options.seed,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleSize {
    N(usize),
    Frac(f64),
}

impl SampleSize {
    /// Number of rows to draw from a population of `len`.
    pub fn count(self, len: usize) -> usize {
        match self {
            SampleSize::N(n) => n,
            SampleSize::Frac(frac) => (frac * len as f64) as usize,
        }
    }
}

/// Resolved sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub size: SampleSize,
    pub with_replacement: bool,
    pub shuffle: bool,
    pub seed: Option<u64>,
}
