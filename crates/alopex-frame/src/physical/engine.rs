use std::fmt::Debug;

use crate::lazy::{LogicalPlan, OptFlags, Optimizer};
use crate::physical::executor::{ExecContext, Executor};
use crate::physical::plan::compile;
use crate::string_cache::StringCache;
use crate::{DataFrame, Result};

/// Runs logical plans submitted by `LazyFrame::collect*` and `LazyFrame::fetch*`.
///
/// Implementations receive the plan exactly as built and decide for
/// themselves which of the requested optimizations to apply.
pub trait ExecutionEngine: Send + Sync + Debug {
    fn execute(&self, plan: &LogicalPlan, flags: OptFlags) -> Result<DataFrame>;
}

/// In-process engine over Arrow compute kernels.
///
/// Applies the optimizer passes enabled in `flags`, compiles the result into a
/// physical plan and executes it into a single-batch `DataFrame`.
#[derive(Debug, Default)]
pub struct ArrowEngine {
    string_cache: StringCache,
}

impl ArrowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cache` for queries collected with `string_cache` enabled.
    pub fn with_string_cache(cache: StringCache) -> Self {
        Self {
            string_cache: cache,
        }
    }
}

impl ExecutionEngine for ArrowEngine {
    fn execute(&self, plan: &LogicalPlan, flags: OptFlags) -> Result<DataFrame> {
        let _guard = flags.string_cache.then(|| self.string_cache.acquire());
        let ctx = ExecContext {
            flags,
            string_cache: flags.string_cache.then(|| self.string_cache.clone()),
        };

        let optimized = Optimizer::optimize(plan, flags);
        let physical = compile(&optimized)?;
        let batch = Executor::execute(&physical, &ctx)?;
        tracing::debug!(
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "plan executed"
        );
        DataFrame::from_batches(vec![batch])
    }
}

#[cfg(test)]
mod tests {
    use super::{ArrowEngine, ExecutionEngine};
    use crate::datatypes::DataType;
    use crate::expr::col;
    use crate::lazy::{CollectOptions, LazyFrame};
    use crate::string_cache::StringCache;
    use crate::{DataFrame, Series};

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("a", vec!["x", "y", "x"]).unwrap(),
            Series::new("b", vec!["y", "z", "x"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn categorical_casts_share_keys_under_the_string_cache() {
        let cache = StringCache::new();
        let engine = ArrowEngine::with_string_cache(cache.clone());
        let lf = LazyFrame::from_dataframe(frame()).select(vec![
            col("a").cast(DataType::Categorical),
            col("b").cast(DataType::Categorical),
        ]);
        let flags = CollectOptions::default().with_string_cache(true).flags();
        let out = engine.execute(lf.logical_plan(), flags).unwrap();
        assert_eq!(out.height(), 3);
        // The cache is released once the query finishes.
        assert!(!cache.is_active());
    }
}
