//! MutexKv - Named mutexes serializing operations that race server-side

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async mutexes keyed by string
#[derive(Debug, Default, Clone)]
pub struct MutexKv {
    store: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl MutexKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutex for `key`, waiting while another holder has it
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        debug!("locking {:?}", key);
        let mutex = self.get(key);
        let guard = mutex.lock_owned().await;
        debug!("locked {:?}", key);
        guard
    }

    fn get(&self, key: &str) -> Arc<AsyncMutex<()>> {
        // Entries are only ever inserted, so a poisoned map is still consistent
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let kv = MutexKv::new();
        let guard = kv.lock("fs-123").await;

        let kv2 = kv.clone();
        let waiter = tokio::spawn(async move {
            let _g = kv2.lock("fs-123").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_are_independent() {
        let kv = MutexKv::new();
        let _a = kv.lock("fs-a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), kv.lock("fs-b")).await;
        assert!(b.is_ok());
    }
}
