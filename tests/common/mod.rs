#![allow(dead_code)]

use async_trait::async_trait;
use sceneformat_builder::contract::{ObjectStore, StoreError, StoredObject};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory bucket that records every write and can be told to reject one key.
#[derive(Default)]
pub struct RecordingStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    writes: Mutex<Vec<String>>,
    reject_key: Option<String>,
    delay: Option<Duration>,
}

impl RecordingStore {
    pub fn rejecting(key: &str) -> Self {
        Self {
            reject_key: Some(key.to_string()),
            ..Self::default()
        }
    }

    /// Store that takes `delay` before every write lands.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys in write order, including repeated writes.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content: Vec<u8>,
    ) -> Result<StoredObject, StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject_key.as_deref() == Some(key) {
            return Err(format!("quota exceeded for {key}").into());
        }
        self.writes.lock().unwrap().push(key.to_string());
        let size = content.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), content);
        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            generation: None,
        })
    }
}

/// Names of the entries in a zip held in memory, in archive order.
pub fn zip_entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Number of entries left directly under `dir`.
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
