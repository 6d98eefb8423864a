use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use arrow::array::{DictionaryArray, StringArray, UInt32Array};
use arrow::datatypes::UInt32Type;

use crate::{DataFrameError, Result};

/// Shared categorical key space.
///
/// Cloning yields another handle to the same cache. Categorical columns
/// encoded while the cache is active agree on the key of every string, so
/// keys from separately built columns can be compared directly. The cache is
/// cleared when the last guard is dropped.
#[derive(Debug, Clone, Default)]
pub struct StringCache {
    inner: Arc<RwLock<CacheState>>,
}

#[derive(Debug, Default)]
struct CacheState {
    depth: usize,
    keys: HashMap<String, u32>,
    values: Vec<String>,
}

/// Scoped activation of a [`StringCache`]; deactivates on drop.
#[derive(Debug)]
#[must_use = "the string cache is released as soon as the guard is dropped"]
pub struct StringCacheGuard {
    cache: StringCache,
}

impl StringCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate the cache for the lifetime of the returned guard.
    pub fn acquire(&self) -> StringCacheGuard {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.depth += 1;
        tracing::trace!(depth = state.depth, "string cache acquired");
        StringCacheGuard {
            cache: self.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .depth
            > 0
    }

    /// Number of distinct strings currently interned.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the shared key of `value`, interning it if needed.
    pub fn intern(&self, value: &str) -> Result<u32> {
        if let Some(key) = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys
            .get(value)
        {
            return Ok(*key);
        }
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.depth == 0 {
            return Err(DataFrameError::invalid_operation("string cache is not active"));
        }
        if let Some(key) = state.keys.get(value) {
            return Ok(*key);
        }
        let key = u32::try_from(state.values.len())
            .map_err(|_| DataFrameError::invalid_operation("string cache is full"))?;
        state.keys.insert(value.to_string(), key);
        state.values.push(value.to_string());
        Ok(key)
    }

    /// Dictionary-encode `values` against the shared key space.
    ///
    /// The dictionary of the result holds every string interned so far.
    pub fn encode(&self, values: &StringArray) -> Result<DictionaryArray<UInt32Type>> {
        let keys = values
            .iter()
            .map(|v| v.map(|s| self.intern(s)).transpose())
            .collect::<Result<Vec<_>>>()?;
        let dictionary = {
            let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            StringArray::from_iter_values(state.values.iter())
        };
        let keys = UInt32Array::from(keys);
        Ok(DictionaryArray::try_new(keys, Arc::new(dictionary))?)
    }

    fn release(&self) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.depth = state.depth.saturating_sub(1);
        tracing::trace!(depth = state.depth, "string cache released");
        if state.depth == 0 {
            state.keys.clear();
            state.values.clear();
        }
    }
}

impl StringCacheGuard {
    /// The cache this guard keeps active.
    pub fn cache(&self) -> &StringCache {
        &self.cache
    }
}

impl Drop for StringCacheGuard {
    fn drop(&mut self) {
        self.cache.release();
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, StringArray};

    use super::StringCache;

    #[test]
    fn keys_are_shared_across_columns() {
        let cache = StringCache::new();
        let _guard = cache.acquire();
        let a = cache
            .encode(&StringArray::from(vec![Some("x"), Some("y"), None]))
            .unwrap();
        let b = cache
            .encode(&StringArray::from(vec!["y", "z", "x"]))
            .unwrap();
        assert_eq!(a.keys().value(1), b.keys().value(0));
        assert_eq!(a.keys().value(0), b.keys().value(2));
        assert!(a.keys().is_null(2));
        assert_eq!(b.values().len(), 3);
    }

    #[test]
    fn nested_guards_pop_in_order() {
        let cache = StringCache::new();
        let outer = cache.acquire();
        {
            let _inner = cache.acquire();
            cache.intern("a").unwrap();
        }
        assert!(cache.is_active());
        assert_eq!(cache.len(), 1);
        drop(outer);
        assert!(!cache.is_active());
        assert!(cache.is_empty());
    }

    #[test]
    fn interning_requires_activation() {
        let cache = StringCache::new();
        assert!(cache.intern("a").is_err());
    }
}
