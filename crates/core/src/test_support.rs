//! In-memory store and observer shared by unit tests

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::observer::{SyncEvent, SyncObserver};
use crate::traits::{ETAG_KEY, ObjectStore};

/// Object store keeping ETags in memory, with per-key failure injection
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<HashMap<String, String>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<Vec<String>>,
    fail_put: HashSet<String>,
    fail_exists: HashSet<String>,
    panic_put: HashSet<String>,
    put_delay: Option<Duration>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_put(mut self, key: &str) -> Self {
        self.fail_put.insert(key.to_string());
        self
    }

    pub fn fail_exists(mut self, key: &str) -> Self {
        self.fail_exists.insert(key.to_string());
        self
    }

    pub fn panic_put(mut self, key: &str) -> Self {
        self.panic_put.insert(key.to_string());
        self
    }

    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    pub fn insert_with_content(&self, key: &str, content: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), quoted_md5(content));
        self.contents
            .lock()
            .unwrap()
            .insert(key.to_string(), content.to_vec());
    }

    /// Keys uploaded so far, sorted
    pub fn uploaded_keys(&self) -> Vec<String> {
        let mut keys = self.puts.lock().unwrap().clone();
        keys.sort();
        keys
    }

    pub fn put_count(&self, key: &str) -> usize {
        self.puts.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

fn quoted_md5(content: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(content)))
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put_object(&self, key: &str, local_path: &Path) -> Result<()> {
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_put.contains(key) {
            panic!("injected put panic for {key}");
        }
        if self.fail_put.contains(key) {
            return Err(Error::Network("injected put failure".to_string()));
        }

        let content = std::fs::read(local_path)?;
        self.insert_with_content(key, &content);
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn get_object(&self, key: &str, local_path: &Path) -> Result<u64> {
        let content = self
            .contents
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        std::fs::write(local_path, &content)?;
        Ok(content.len() as u64)
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        if self.fail_exists.contains(key) {
            return Err(Error::Network("injected exists failure".to_string()));
        }
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn get_object_metadata(&self, key: &str) -> Result<HashMap<String, String>> {
        let objects = self.objects.lock().unwrap();
        let etag = objects
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        Ok(HashMap::from([(ETAG_KEY.to_string(), etag.clone())]))
    }
}

/// Observer recording the kind of every event
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingObserver {
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == kind)
            .count()
    }
}

impl SyncObserver for RecordingObserver {
    fn on_event(&self, event: &SyncEvent<'_>) {
        let kind = match event {
            SyncEvent::ScanComplete { .. } => "scan_complete",
            SyncEvent::CheckStarted { .. } => "check_started",
            SyncEvent::Unchanged { .. } => "unchanged",
            SyncEvent::CheckFailed { .. } => "check_failed",
            SyncEvent::CheckComplete { .. } => "check_complete",
            SyncEvent::UploadStarted { .. } => "upload_started",
            SyncEvent::Uploaded { .. } => "uploaded",
            SyncEvent::WouldUpload { .. } => "would_upload",
            SyncEvent::UploadFailed { .. } => "upload_failed",
            SyncEvent::Progress { .. } => "progress",
            SyncEvent::Finished { .. } => "finished",
        };
        self.events.lock().unwrap().push(kind);
    }
}
