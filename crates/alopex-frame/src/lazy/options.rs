use serde::{Deserialize, Serialize};

use crate::{DataFrameError, Result};

/// Options accepted by `LazyFrame::collect*` and `LazyFrame::fetch*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectOptions {
    pub type_coercion: bool,
    pub predicate_pushdown: bool,
    pub projection_pushdown: bool,
    pub simplify_expression: bool,
    /// Share one categorical key space for the duration of the query.
    pub string_cache: bool,
    /// Turn off predicate and projection pushdown regardless of their settings.
    pub no_optimization: bool,
    pub slice_pushdown: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            type_coercion: true,
            predicate_pushdown: true,
            projection_pushdown: true,
            simplify_expression: true,
            string_cache: false,
            no_optimization: false,
            slice_pushdown: true,
        }
    }
}

impl CollectOptions {
    pub fn with_type_coercion(mut self, enabled: bool) -> Self {
        self.type_coercion = enabled;
        self
    }

    pub fn with_predicate_pushdown(mut self, enabled: bool) -> Self {
        self.predicate_pushdown = enabled;
        self
    }

    pub fn with_projection_pushdown(mut self, enabled: bool) -> Self {
        self.projection_pushdown = enabled;
        self
    }

    pub fn with_simplify_expression(mut self, enabled: bool) -> Self {
        self.simplify_expression = enabled;
        self
    }

    pub fn with_string_cache(mut self, enabled: bool) -> Self {
        self.string_cache = enabled;
        self
    }

    pub fn with_no_optimization(mut self, enabled: bool) -> Self {
        self.no_optimization = enabled;
        self
    }

    pub fn with_slice_pushdown(mut self, enabled: bool) -> Self {
        self.slice_pushdown = enabled;
        self
    }

    /// Resolve into the flag set handed to the execution engine.
    pub fn flags(&self) -> OptFlags {
        OptFlags {
            type_coercion: self.type_coercion,
            predicate_pushdown: self.predicate_pushdown && !self.no_optimization,
            projection_pushdown: self.projection_pushdown && !self.no_optimization,
            simplify_expression: self.simplify_expression,
            string_cache: self.string_cache,
            slice_pushdown: self.slice_pushdown,
        }
    }
}

/// Resolved optimization flags submitted with a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptFlags {
    pub type_coercion: bool,
    pub predicate_pushdown: bool,
    pub projection_pushdown: bool,
    pub simplify_expression: bool,
    pub string_cache: bool,
    pub slice_pushdown: bool,
}

impl Default for OptFlags {
    fn default() -> Self {
        CollectOptions::default().flags()
    }
}

/// Join strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Outer,
    /// Left rows with at least one match; right columns are not added.
    Semi,
    /// Left rows without a match; right columns are not added.
    Anti,
    /// Cartesian product; key options are ignored.
    Cross,
}

/// Options for `LazyFrame::join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    pub how: JoinType,
    pub on: Option<Vec<String>>,
    pub left_on: Option<Vec<String>>,
    pub right_on: Option<Vec<String>>,
    /// Appended to right-hand column names that collide with the left.
    pub suffix: String,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            how: JoinType::Inner,
            on: None,
            left_on: None,
            right_on: None,
            suffix: "_right".to_string(),
        }
    }
}

impl JoinOptions {
    pub fn with_how(mut self, how: JoinType) -> Self {
        self.how = how;
        self
    }

    pub fn with_on<I, S>(mut self, on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on = Some(on.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_left_on<I, S>(mut self, left_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.left_on = Some(left_on.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_right_on<I, S>(mut self, right_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.right_on = Some(right_on.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Resolve the left and right key lists.
    pub(crate) fn keys(&self) -> Result<(Vec<String>, Vec<String>)> {
        if self.how == JoinType::Cross {
            return Ok((vec![], vec![]));
        }
        let (left, right) = resolve_sides(&self.on, &self.left_on, &self.right_on)?;
        if left.len() != right.len() {
            return Err(DataFrameError::invalid_argument(format!(
                "join key count mismatch: {} on the left, {} on the right",
                left.len(),
                right.len()
            )));
        }
        if left.is_empty() {
            return Err(DataFrameError::invalid_argument(
                "join requires at least one key column",
            ));
        }
        Ok((left, right))
    }
}

/// `on` wins; otherwise both `left_on` and `right_on` are required.
fn resolve_sides<T: Clone>(
    on: &Option<T>,
    left_on: &Option<T>,
    right_on: &Option<T>,
) -> Result<(T, T)> {
    match (on, left_on, right_on) {
        (Some(on), _, _) => Ok((on.clone(), on.clone())),
        (None, Some(left), Some(right)) => Ok((left.clone(), right.clone())),
        (None, Some(_), None) | (None, None, Some(_)) => {
            Err(DataFrameError::invalid_argument("must pass both sides"))
        }
        (None, None, None) => Err(DataFrameError::invalid_argument(
            "must specify `on` or `left_on` and `right_on`",
        )),
    }
}

/// Direction an as-of join searches for the nearest key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AsofStrategy {
    /// Last right row whose key is `<=` the left key.
    #[default]
    Backward,
    /// First right row whose key is `>=` the left key.
    Forward,
}

/// Options for `LazyFrame::join_asof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsofJoinOptions {
    pub on: Option<String>,
    pub left_on: Option<String>,
    pub right_on: Option<String>,
    pub by: Option<Vec<String>>,
    pub by_left: Option<Vec<String>>,
    pub by_right: Option<Vec<String>>,
    pub strategy: AsofStrategy,
    pub suffix: String,
}

impl Default for AsofJoinOptions {
    fn default() -> Self {
        Self {
            on: None,
            left_on: None,
            right_on: None,
            by: None,
            by_left: None,
            by_right: None,
            strategy: AsofStrategy::Backward,
            suffix: "_right".to_string(),
        }
    }
}

impl AsofJoinOptions {
    pub fn with_on(mut self, on: impl Into<String>) -> Self {
        self.on = Some(on.into());
        self
    }

    pub fn with_left_on(mut self, left_on: impl Into<String>) -> Self {
        self.left_on = Some(left_on.into());
        self
    }

    pub fn with_right_on(mut self, right_on: impl Into<String>) -> Self {
        self.right_on = Some(right_on.into());
        self
    }

    pub fn with_by<I, S>(mut self, by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by = Some(by.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_by_left<I, S>(mut self, by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_left = Some(by.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_by_right<I, S>(mut self, by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_right = Some(by.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_strategy(mut self, strategy: AsofStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub(crate) fn keys(&self) -> Result<(String, String)> {
        resolve_sides(&self.on, &self.left_on, &self.right_on)
    }

    /// Equality keys matched before the as-of search; empty when not given.
    pub(crate) fn by_keys(&self) -> Result<(Vec<String>, Vec<String>)> {
        if self.by.is_none() && self.by_left.is_none() && self.by_right.is_none() {
            return Ok((vec![], vec![]));
        }
        let (left, right) = resolve_sides(&self.by, &self.by_left, &self.by_right)?;
        if left.len() != right.len() {
            return Err(DataFrameError::invalid_argument(format!(
                "asof `by` key count mismatch: {} on the left, {} on the right",
                left.len(),
                right.len()
            )));
        }
        Ok((left, right))
    }
}

/// Which window bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClosedWindow {
    Left,
    Right,
    Both,
    None,
}

/// Options for `LazyFrame::group_by_rolling`.
///
/// Each row `t` of the index column defines the window
/// `(t + offset, t + offset + period]` (closure per `closed`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingGroupOptions {
    pub index_column: String,
    pub period: String,
    /// Defaults to the negated period.
    pub offset: Option<String>,
    pub closed: ClosedWindow,
    pub by: Vec<String>,
}

impl RollingGroupOptions {
    pub fn new(index_column: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            index_column: index_column.into(),
            period: period.into(),
            offset: None,
            closed: ClosedWindow::Right,
            by: vec![],
        }
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn with_closed(mut self, closed: ClosedWindow) -> Self {
        self.closed = closed;
        self
    }

    pub fn with_by<I, S>(mut self, by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by = by.into_iter().map(Into::into).collect();
        self
    }
}

/// Options for `LazyFrame::group_by_dynamic`.
///
/// Windows start every `every`, span `period` (defaults to `every`) and are
/// shifted by `offset` (defaults to zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicGroupOptions {
    pub index_column: String,
    pub every: String,
    pub period: Option<String>,
    pub offset: Option<String>,
    /// Label each window by its start instead of the first index value in it.
    pub truncate: bool,
    /// Add `_lower_boundary` and `_upper_boundary` columns.
    pub include_boundaries: bool,
    pub closed: ClosedWindow,
    pub by: Vec<String>,
}

impl DynamicGroupOptions {
    pub fn new(index_column: impl Into<String>, every: impl Into<String>) -> Self {
        Self {
            index_column: index_column.into(),
            every: every.into(),
            period: None,
            offset: None,
            truncate: true,
            include_boundaries: false,
            closed: ClosedWindow::Left,
            by: vec![],
        }
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn with_include_boundaries(mut self, include_boundaries: bool) -> Self {
        self.include_boundaries = include_boundaries;
        self
    }

    pub fn with_closed(mut self, closed: ClosedWindow) -> Self {
        self.closed = closed;
        self
    }

    pub fn with_by<I, S>(mut self, by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by = by.into_iter().map(Into::into).collect();
        self
    }
}

/// Which row of a duplicate set `unique` keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UniqueKeep {
    #[default]
    First,
    Last,
    /// Drop every row that has a duplicate.
    None,
}
