use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::errors::{AppError, AppResult};

struct CachedValue<T> {
    value: Arc<T>,
    loaded_at: Instant,
}

/// Time-bounded memo of a single value. Callers inside one window share the same `Arc`.
pub struct TtlCache<T> {
    slot: Mutex<Option<CachedValue<T>>>,
    ttl: Duration,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    pub fn get_or_reload<F>(&self, loader: F) -> AppResult<Arc<T>>
    where
        F: FnOnce() -> AppResult<T>,
    {
        self.get_or_reload_at(Instant::now(), loader)
    }

    /// The lock is held across `loader`, so concurrent misses trigger one reload.
    /// A failed load leaves the slot empty and the next call retries.
    pub(crate) fn get_or_reload_at<F>(&self, now: Instant, loader: F) -> AppResult<Arc<T>>
    where
        F: FnOnce() -> AppResult<T>,
    {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AppError::Internal("cache mutex poisoned".to_string()))?;

        if let Some(cached) = slot.as_ref() {
            if now.saturating_duration_since(cached.loaded_at) < self.ttl {
                tracing::trace!("cache hit");
                return Ok(Arc::clone(&cached.value));
            }
            tracing::debug!(ttl_seconds = self.ttl.as_secs(), "cached value expired");
        }

        *slot = None;
        let value = Arc::new(loader()?);
        *slot = Some(CachedValue {
            value: Arc::clone(&value),
            loaded_at: now,
        });
        Ok(value)
    }

    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::TtlCache;
    use crate::errors::AppError;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn reuses_value_inside_window() {
        let cache = TtlCache::new(Duration::from_secs(600));
        let loads = Cell::new(0);
        let start = Instant::now();

        let first = cache
            .get_or_reload_at(start, || {
                loads.set(loads.get() + 1);
                Ok(vec![1, 2, 3])
            })
            .expect("first load");
        let second = cache
            .get_or_reload_at(start + Duration::from_secs(599), || {
                loads.set(loads.get() + 1);
                Ok(vec![9])
            })
            .expect("cached");

        assert_eq!(loads.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn reloads_after_expiry() {
        let cache = TtlCache::new(Duration::from_secs(600));
        let start = Instant::now();
        cache.get_or_reload_at(start, || Ok(1)).expect("first load");
        let value = cache
            .get_or_reload_at(start + Duration::from_secs(600), || Ok(2))
            .expect("reload");
        assert_eq!(*value, 2);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(600));
        let err = cache
            .get_or_reload(|| Err(AppError::Connection("refused".to_string())))
            .expect_err("load should fail");
        assert!(err.to_string().contains("refused"));
        assert!(!cache.is_loaded());
        assert_eq!(*cache.get_or_reload(|| Ok(7)).expect("retry"), 7);
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = TtlCache::new(Duration::from_secs(600));
        cache.get_or_reload(|| Ok("old")).expect("load");
        cache.invalidate();
        assert_eq!(*cache.get_or_reload(|| Ok("new")).expect("reload"), "new");
    }
}
