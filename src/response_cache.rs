//! File-backed response cache with stale-while-revalidate semantics.
//!
//! One payload file per key plus an `index.json` manifest that owns every
//! eviction decision. The cache is an explicitly constructed value handed to
//! whoever needs it; there is no process-global instance.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const MAX_ENTRIES: usize = 1000;
pub const MAX_BYTES: u64 = 10 * 1024 * 1024;

const INDEX_FILE: &str = "index.json";
const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheIndex {
    version: u32,
    total_size_bytes: u64,
    entries: HashMap<String, IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    file: String,
    size_bytes: u64,
    last_accessed: i64,
}

/// On-disk payload record. Timestamps are unix millis.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    created_at: i64,
    stale_at: i64,
    expires_at: i64,
    payload: Value,
}

/// A successful cache read.
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub data: Value,
    pub is_stale: bool,
    pub cached_at: DateTime<Utc>,
}

pub struct ResponseCache {
    root: PathBuf,
    index: Mutex<CacheIndex>,
}

impl ResponseCache {
    /// Open (creating if needed) a cache rooted at `root`. A corrupt or
    /// version-mismatched index is discarded and rebuilt empty.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("create cache dir {}", root.display()))?;
        let index = load_index(&root);
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    pub fn get(&self, key: &str) -> Option<CachedValue> {
        self.get_at(key, Utc::now())
    }

    /// `get` with an explicit clock, so stale/expiry boundaries are testable.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CachedValue> {
        let mut index = self.index.lock().expect("cache index lock poisoned");
        let entry = index.entries.get(key)?.clone();
        let path = self.root.join(&entry.file);

        let record = fs::read(&path)
            .ok()
            .and_then(|raw| serde_json::from_slice::<CacheRecord>(&raw).ok());
        let Some(record) = record else {
            // Corrupt or missing payload: forget the entry, report absent.
            remove_entry(&mut index, key);
            let _ = fs::remove_file(&path);
            let _ = save_index(&self.root, &index);
            return None;
        };

        let now_ms = now.timestamp_millis();
        if now_ms > record.expires_at {
            remove_entry(&mut index, key);
            let _ = fs::remove_file(&path);
            let _ = save_index(&self.root, &index);
            return None;
        }

        if let Some(live) = index.entries.get_mut(key) {
            live.last_accessed = now_ms;
        }
        let _ = save_index(&self.root, &index);

        Some(CachedValue {
            data: record.payload,
            is_stale: now_ms > record.stale_at,
            cached_at: millis_to_datetime(record.created_at),
        })
    }

    pub fn set(
        &self,
        key: &str,
        data: &Value,
        stale_after: Duration,
        expires_after: Duration,
    ) -> Result<()> {
        self.set_at(key, data, stale_after, expires_after, Utc::now())
    }

    pub fn set_at(
        &self,
        key: &str,
        data: &Value,
        stale_after: Duration,
        expires_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now_ms = now.timestamp_millis();
        let record = CacheRecord {
            created_at: now_ms,
            stale_at: now_ms + stale_after.as_millis() as i64,
            expires_at: now_ms + expires_after.as_millis() as i64,
            payload: data.clone(),
        };
        let file = payload_filename(key);
        let path = self.root.join(&file);
        let raw = serde_json::to_vec(&record).context("serialize cache record")?;
        let size = raw.len() as u64;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &raw).context("write cache payload")?;
        fs::rename(&tmp, &path).context("swap cache payload")?;

        let mut index = self.index.lock().expect("cache index lock poisoned");
        remove_entry(&mut index, key);
        index.entries.insert(
            key.to_string(),
            IndexEntry {
                file,
                size_bytes: size,
                last_accessed: now_ms,
            },
        );
        index.total_size_bytes += size;
        self.evict_locked(&mut index);
        save_index(&self.root, &index)
    }

    pub fn delete(&self, key: &str) {
        let mut index = self.index.lock().expect("cache index lock poisoned");
        if let Some(entry) = index.entries.get(key) {
            let _ = fs::remove_file(self.root.join(&entry.file));
        }
        remove_entry(&mut index, key);
        let _ = save_index(&self.root, &index);
    }

    pub fn clear(&self) {
        let mut index = self.index.lock().expect("cache index lock poisoned");
        for entry in index.entries.values() {
            let _ = fs::remove_file(self.root.join(&entry.file));
        }
        index.entries.clear();
        index.total_size_bytes = 0;
        let _ = save_index(&self.root, &index);
    }

    pub fn entry_count(&self) -> usize {
        self.index
            .lock()
            .expect("cache index lock poisoned")
            .entries
            .len()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.index
            .lock()
            .expect("cache index lock poisoned")
            .total_size_bytes
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index
            .lock()
            .expect("cache index lock poisoned")
            .entries
            .contains_key(key)
    }

    /// Drop least-recently-accessed entries until both budget bounds hold.
    fn evict_locked(&self, index: &mut CacheIndex) {
        while index.entries.len() > MAX_ENTRIES || index.total_size_bytes > MAX_BYTES {
            let oldest = index
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, e)| (k.clone(), e.file.clone()));
            let Some((key, file)) = oldest else {
                break;
            };
            let _ = fs::remove_file(self.root.join(file));
            remove_entry(index, &key);
        }
    }
}

/// Composite cache key: endpoint plus query parameters sorted by name, so
/// parameter order never causes a miss.
pub fn cache_key(endpoint: &str, params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<(&str, &str)> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(b.1)));
    let mut key = endpoint.to_string();
    for (name, value) in sorted {
        key.push('|');
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}

/// Short, filesystem-safe filename derived from the composite key.
fn payload_filename(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut name = String::with_capacity(21);
    for byte in digest.iter().take(8) {
        name.push_str(&format!("{byte:02x}"));
    }
    name.push_str(".json");
    name
}

fn remove_entry(index: &mut CacheIndex, key: &str) {
    if let Some(old) = index.entries.remove(key) {
        index.total_size_bytes = index.total_size_bytes.saturating_sub(old.size_bytes);
    }
}

fn load_index(root: &Path) -> CacheIndex {
    let raw = fs::read_to_string(root.join(INDEX_FILE)).ok();
    let Some(raw) = raw else {
        return empty_index();
    };
    let index = serde_json::from_str::<CacheIndex>(&raw).unwrap_or_default();
    if index.version != INDEX_VERSION {
        return empty_index();
    }
    index
}

fn save_index(root: &Path, index: &CacheIndex) -> Result<()> {
    let path = root.join(INDEX_FILE);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(index).context("serialize cache index")?;
    fs::write(&tmp, json).context("write cache index")?;
    fs::rename(&tmp, &path).context("swap cache index")?;
    Ok(())
}

fn empty_index() -> CacheIndex {
    CacheIndex {
        version: INDEX_VERSION,
        ..CacheIndex::default()
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_order_insensitive() {
        let a = cache_key("games", &[("league", "16"), ("season", "2025")]);
        let b = cache_key("games", &[("season", "2025"), ("league", "16")]);
        assert_eq!(a, b);
        assert_ne!(a, cache_key("games", &[("league", "17"), ("season", "2025")]));
    }

    #[test]
    fn payload_filenames_are_short_and_stable() {
        let name = payload_filename("games|league=16|season=2025");
        assert_eq!(name.len(), 21);
        assert!(name.ends_with(".json"));
        assert_eq!(name, payload_filename("games|league=16|season=2025"));
    }
}
