//! Process-wide handles to heavy resources (model pipelines), loaded at most once per key.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tracing::info;

use crate::error::Result;

/// Initialise-once cache keyed by model identifier.
///
/// The map lock is held only to find the slot; loading happens on the slot's
/// own cell, so callers for different keys never wait on each other while
/// callers for the same key block until the first load finishes. A failed
/// load leaves the slot empty and the next caller retries.
pub struct ResourceCache<T> {
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<T>>>>>,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_try_init<F>(&self, key: &str, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(key.to_string()).or_default())
        };
        let value = slot.get_or_try_init(|| {
            info!(resource = key, "loading resource");
            load().map(Arc::new)
        })?;
        Ok(Arc::clone(value))
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(key).map(|slot| slot.get().is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DesignBridgeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_loads_once_per_key() {
        let cache = ResourceCache::<String>::new();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_init("sdxl", || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok("pipeline".to_string())
                })
                .unwrap();
            assert_eq!(value.as_str(), "pipeline");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.is_loaded("sdxl"));
        assert!(!cache.is_loaded("controlnet"));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let cache = ResourceCache::<u32>::new();
        let first = cache.get_or_try_init("m", || Err(DesignBridgeError::Inference("no gpu".into())));
        assert!(first.is_err());
        assert!(!cache.is_loaded("m"));

        let second = cache.get_or_try_init("m", || Ok(7)).unwrap();
        assert_eq!(*second, 7);
    }

    #[test]
    fn test_concurrent_callers_share_one_load() {
        let cache = Arc::new(ResourceCache::<usize>::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let loads = Arc::clone(&loads);
                thread::spawn(move || {
                    *cache
                        .get_or_try_init("shared", || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            Ok(42)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
