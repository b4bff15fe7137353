use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

pub mod fs;


/// Small string key/value store, the persistence seam for question overrides,
/// exam metadata and progress logs. Writes can fail (quota and the like);
/// callers surface the failure but keep their in-memory state.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

/// One stored image payload, keyed by (exam id, filename).
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    pub exam_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn new(exam_id: &str, file_name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        ImageRecord {
            exam_id: exam_id.to_owned(),
            file_name: file_name.to_owned(),
            mime_type: mime_type.to_owned(),
            bytes,
            stored_at: Utc::now(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}_{}", self.exam_id, self.file_name)
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExamImageStats {
    pub count: usize,
    pub size_bytes: usize,
}

#[derive(Clone, Debug, Default)]
pub struct StorageStats {
    pub total_images: usize,
    pub total_size_bytes: usize,
    pub exams: HashMap<String, ExamImageStats>,
}

/// Larger binary-object store for question and explanation images. Lookups
/// may legitimately miss while data is still arriving from another context;
/// callers refresh via [`crate::bank::BankRegistry::on_ready`] rather than
/// treating a miss as an error.
pub trait ImageStore: Send + Sync {
    fn store(&self, record: ImageRecord) -> Result<String>;
    fn get(&self, exam_id: &str, file_name: &str) -> Option<ImageRecord>;
    fn delete_exam(&self, exam_id: &str) -> usize;
    fn count_for_exam(&self, exam_id: &str) -> usize;
    fn stats(&self) -> StorageStats;
}

#[derive(Default)]
pub struct MemoryImageStore {
    records: RwLock<HashMap<String, ImageRecord>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl ImageStore for MemoryImageStore {
    fn store(&self, record: ImageRecord) -> Result<String> {
        let key = record.key();
        self.records.write().insert(key.clone(), record);
        Ok(key)
    }

    fn get(&self, exam_id: &str, file_name: &str) -> Option<ImageRecord> {
        let key = format!("{}_{}", exam_id, file_name);
        self.records.read().get(&key).cloned()
    }

    fn delete_exam(&self, exam_id: &str) -> usize {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| record.exam_id != exam_id);
        before - records.len()
    }

    fn count_for_exam(&self, exam_id: &str) -> usize {
        self.records
            .read()
            .values()
            .filter(|record| record.exam_id == exam_id)
            .count()
    }

    fn stats(&self) -> StorageStats {
        let records = self.records.read();
        let mut stats = StorageStats::default();
        for record in records.values() {
            stats.total_images += 1;
            stats.total_size_bytes += record.size_bytes();
            let exam_stats = stats.exams.entry(record.exam_id.clone()).or_default();
            exam_stats.count += 1;
            exam_stats.size_bytes += record.size_bytes();
        }
        stats
    }
}
