use crate::record::Level;
use std::collections::HashMap;
use std::sync::RwLock;

/// Concurrent, lazily-populated map from log level to verified stack
/// skip depth.
///
/// The depth from the capture anchor to the first frame outside the
/// logging front-end is structurally stable per level, so each level is
/// resolved at most once per process. Entries are never rewritten once
/// stored. Reads take a shared lock; the rare first-resolution write
/// path escalates to an exclusive lock and re-checks before computing,
/// so concurrent first uses of a level trigger a single stack walk.
#[derive(Debug, Default)]
pub struct SkipCache {
    depths: RwLock<HashMap<Level, usize>>,
}

impl SkipCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast read path; does not block writers beyond the shared lock.
    pub fn lookup(&self, level: Level) -> Option<usize> {
        self.depths.read().expect("skip cache lock poisoned").get(&level).copied()
    }

    /// Idempotent write: the first stored depth for a level wins and
    /// later stores for the same level are ignored.
    pub fn store(&self, level: Level, depth: usize) {
        self.depths
            .write()
            .expect("skip cache lock poisoned")
            .entry(level)
            .or_insert(depth);
    }

    /// Return the cached depth for `level`, computing and storing it on
    /// first use.
    ///
    /// Double-checked: an optimistic shared-lock read, then an
    /// exclusive lock with a re-check so that racing callers run
    /// `compute` only once. Errors from `compute` are propagated and
    /// nothing is cached, so the next caller retries.
    pub fn get_or_try_insert_with<E>(
        &self,
        level: Level,
        compute: impl FnOnce() -> Result<usize, E>,
    ) -> Result<usize, E> {
        if let Some(depth) = self.lookup(level) {
            return Ok(depth);
        }

        let mut depths = self.depths.write().expect("skip cache lock poisoned");
        if let Some(depth) = depths.get(&level) {
            return Ok(*depth);
        }

        let depth = compute()?;
        depths.insert(level, depth);
        Ok(depth)
    }

    /// Number of distinct levels resolved so far.
    pub fn len(&self) -> usize {
        self.depths.read().expect("skip cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn lookup_misses_then_hits_after_store() {
        let cache = SkipCache::new();
        assert_eq!(cache.lookup(Level::Info), None);
        cache.store(Level::Info, 4);
        assert_eq!(cache.lookup(Level::Info), Some(4));
    }

    #[test]
    fn first_store_wins() {
        let cache = SkipCache::new();
        cache.store(Level::Error, 5);
        cache.store(Level::Error, 9);
        assert_eq!(cache.lookup(Level::Error), Some(5));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn compute_runs_once_per_level() {
        let cache = SkipCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || -> Result<usize, Infallible> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        };
        assert_eq!(cache.get_or_try_insert_with(Level::Warn, compute), Ok(3));
        let compute = || -> Result<usize, Infallible> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };
        assert_eq!(cache.get_or_try_insert_with(Level::Warn, compute), Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = SkipCache::new();
        let result: Result<usize, &str> = cache.get_or_try_insert_with(Level::Debug, || Err("no caller"));
        assert_eq!(result, Err("no caller"));
        assert_eq!(cache.lookup(Level::Debug), None);
        let result: Result<usize, &str> = cache.get_or_try_insert_with(Level::Debug, || Ok(2));
        assert_eq!(result, Ok(2));
    }

    #[test]
    fn racing_first_uses_compute_once() {
        let cache = Arc::new(SkipCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache
                        .get_or_try_insert_with(Level::Panic, || -> Result<usize, Infallible> {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(6)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 6);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}
