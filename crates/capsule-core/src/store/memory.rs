use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::KeyValueStore;

/// In-memory store that counts reads and writes per key
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    reads: Mutex<HashMap<String, usize>>,
    writes: Mutex<HashMap<String, usize>>,
    total_reads: AtomicUsize,
    fail_writes: AtomicBool,
    failing_key: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with text values
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
        Self {
            values: Mutex::new(values),
            ..Self::default()
        }
    }

    /// Make every subsequent `set` fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make any write touching `key` fail; None clears it
    pub async fn fail_writes_to(&self, key: Option<&str>) {
        *self.failing_key.lock().await = key.map(str::to_string);
    }

    async fn check_writable(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("Memory store rejected write to {}", key));
        }
        if self.failing_key.lock().await.as_deref() == Some(key) {
            return Err(anyhow!("Memory store rejected write to {}", key));
        }
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.values.lock().await.contains_key(key)
    }

    pub async fn writes_for(&self, key: &str) -> usize {
        self.writes.lock().await.get(key).copied().unwrap_or(0)
    }

    pub async fn reads_for(&self, key: &str) -> usize {
        self.reads.lock().await.get(key).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.total_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.total_reads.fetch_add(1, Ordering::SeqCst);
        *self.reads.lock().await.entry(key.to_string()).or_insert(0) += 1;
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_many(&[(key, value)]).await
    }

    async fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        // Validate the whole batch before touching anything
        for (key, _) in entries {
            self.check_writable(key).await?;
        }

        let mut values = self.values.lock().await;
        let mut writes = self.writes.lock().await;
        for (key, value) in entries {
            values.insert(key.to_string(), value.to_vec());
            *writes.entry(key.to_string()).or_insert(0) += 1;
        }
        Ok(())
    }
}
