//! Per-tuner channel list cache
//!
//! Each tuner id maps to the last channel list that was fetched successfully.
//! The in-memory copy serves cache-enabled lookups; a JSON side file per tuner
//! survives restarts and is only read back when a live fetch fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::models::ChannelRecord;
use crate::utils::fingerprint;

const CACHE_FILE_SUFFIX: &str = "_channels";

#[derive(Debug, Clone)]
struct CacheEntry {
    records: Arc<Vec<ChannelRecord>>,
    last_access: Instant,
}

#[derive(Debug)]
pub struct ChannelCache {
    directory: PathBuf,
    memory_ttl: Option<Duration>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ChannelCache {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
            memory_ttl: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.directory.clone()).with_memory_ttl(config.memory_ttl)
    }

    /// Expire in-memory entries that have not been read for `ttl`
    pub fn with_memory_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.memory_ttl = ttl;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// In-memory entry for the tuner. Never touches the disk.
    pub async fn get(&self, tuner_id: &str) -> Option<Vec<ChannelRecord>> {
        let key = Self::key(tuner_id);
        let mut entries = self.entries.write().await;

        let expired = match entries.get(&key) {
            None => return None,
            Some(entry) => self
                .memory_ttl
                .is_some_and(|ttl| entry.last_access.elapsed() >= ttl),
        };

        if expired {
            debug!("In-memory channel cache for tuner {} expired", tuner_id);
            entries.remove(&key);
            return None;
        }

        entries.get_mut(&key).map(|entry| {
            entry.last_access = Instant::now();
            entry.records.as_ref().clone()
        })
    }

    /// Replace the in-memory entry and overwrite the tuner's cache file
    pub async fn put(&self, tuner_id: &str, records: Vec<ChannelRecord>) {
        let records = Arc::new(records);
        self.store(tuner_id, Arc::clone(&records)).await;
        self.write_file(tuner_id, &records).await;
    }

    /// Replace the in-memory entry only
    pub async fn remember(&self, tuner_id: &str, records: Vec<ChannelRecord>) {
        self.store(tuner_id, Arc::new(records)).await;
    }

    /// Overwrite the tuner's cache file only
    pub async fn persist(&self, tuner_id: &str, records: &[ChannelRecord]) {
        self.write_file(tuner_id, records).await;
    }

    pub async fn invalidate(&self, tuner_id: &str) {
        self.entries.write().await.remove(&Self::key(tuner_id));
    }

    /// Read the tuner's cache file. Missing or unreadable files yield `None`.
    pub async fn load_from_disk(&self, tuner_id: &str) -> Option<Vec<ChannelRecord>> {
        let path = self.file_path(tuner_id);

        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No channel cache file at {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<Vec<ChannelRecord>>(&contents) {
            Ok(records) => {
                debug!(
                    "Loaded {} cached channels for tuner {} from {}",
                    records.len(),
                    tuner_id,
                    path.display()
                );
                Some(records)
            }
            Err(e) => {
                warn!(
                    "Ignoring corrupt channel cache file {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Location of the side file for a tuner
    ///
    /// Named after a fingerprint of the lowercased id, so ids that differ only
    /// in case share a file and no two distinct ids ever do.
    pub fn file_path(&self, tuner_id: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}", fingerprint(&Self::key(tuner_id)), CACHE_FILE_SUFFIX))
    }

    async fn store(&self, tuner_id: &str, records: Arc<Vec<ChannelRecord>>) {
        debug!(
            "Caching {} channels in memory for tuner {}",
            records.len(),
            tuner_id
        );
        self.entries.write().await.insert(
            Self::key(tuner_id),
            CacheEntry {
                records,
                last_access: Instant::now(),
            },
        );
    }

    async fn write_file(&self, tuner_id: &str, records: &[ChannelRecord]) {
        let path = self.file_path(tuner_id);
        if let Err(e) = self.try_write_file(&path, records).await {
            warn!(
                "Failed to write channel cache file {} for tuner {}: {}",
                path.display(),
                tuner_id,
                e
            );
        }
    }

    async fn try_write_file(&self, path: &Path, records: &[ChannelRecord]) -> std::io::Result<()> {
        let json = serde_json::to_vec(records)?;

        if !self.directory.exists() {
            fs::create_dir_all(&self.directory).await?;
        }

        // Readers must never observe a half-written file
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!("Wrote {} channels to {}", records.len(), path.display());
        Ok(())
    }

    fn key(tuner_id: &str) -> String {
        tuner_id.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelType;
    use tempfile::TempDir;

    fn record(id: &str, name: &str) -> ChannelRecord {
        ChannelRecord {
            id: id.to_string(),
            name: name.to_string(),
            number: None,
            image_url: None,
            path: format!("http://host/{name}.ts"),
            tuner_host_id: "tuner-a".to_string(),
            channel_type: ChannelType::Tv,
            group: None,
            tvg_id: None,
            attributes: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get_returns_records() {
        let dir = TempDir::new().unwrap();
        let cache = ChannelCache::new(dir.path());
        let records = vec![record("m3u_a_1", "One"), record("m3u_a_2", "Two")];

        cache.put("tuner-a", records.clone()).await;

        assert_eq!(cache.get("tuner-a").await, Some(records.clone()));
        assert_eq!(cache.get("TUNER-A").await, Some(records));
    }

    #[tokio::test]
    async fn test_get_does_not_read_disk() {
        let dir = TempDir::new().unwrap();
        let writer = ChannelCache::new(dir.path());
        writer.put("tuner-a", vec![record("m3u_a_1", "One")]).await;

        let fresh = ChannelCache::new(dir.path());
        assert!(fresh.get("tuner-a").await.is_none());
        assert_eq!(fresh.load_from_disk("tuner-a").await.map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn test_remember_skips_disk_and_persist_skips_memory() {
        let dir = TempDir::new().unwrap();
        let cache = ChannelCache::new(dir.path());

        cache.remember("tuner-a", vec![record("m3u_a_1", "One")]).await;
        assert!(cache.load_from_disk("tuner-a").await.is_none());

        cache.persist("tuner-b", &[record("m3u_b_1", "Uno")]).await;
        assert!(cache.get("tuner-b").await.is_none());
        assert!(cache.load_from_disk("tuner-b").await.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_file_yields_none() {
        let dir = TempDir::new().unwrap();
        let cache = ChannelCache::new(dir.path());
        std::fs::write(cache.file_path("tuner-a"), b"{not json").unwrap();

        assert!(cache.load_from_disk("tuner-a").await.is_none());
    }

    #[tokio::test]
    async fn test_put_creates_missing_directory_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("nested").join("cache");
        let cache = ChannelCache::new(&cache_dir);

        cache.put("tuner-a", vec![record("m3u_a_1", "One")]).await;

        let names: Vec<String> = std::fs::read_dir(&cache_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}_channels", fingerprint("tuner-a"))]);
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let cache = ChannelCache::new(blocker.join("cache"));

        cache.put("tuner-a", vec![record("m3u_a_1", "One")]).await;

        assert!(cache.get("tuner-a").await.is_some());
    }

    #[tokio::test]
    async fn test_memory_ttl_expires_entries() {
        let dir = TempDir::new().unwrap();
        let cache =
            ChannelCache::new(dir.path()).with_memory_ttl(Some(Duration::from_millis(20)));
        cache.remember("tuner-a", vec![record("m3u_a_1", "One")]).await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get("tuner-a").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_drops_memory_entry() {
        let dir = TempDir::new().unwrap();
        let cache = ChannelCache::new(dir.path());
        cache.remember("tuner-a", vec![record("m3u_a_1", "One")]).await;

        cache.invalidate("tuner-a").await;

        assert!(cache.get("tuner-a").await.is_none());
    }

    #[tokio::test]
    async fn test_similar_tuner_ids_use_separate_files() {
        let dir = TempDir::new().unwrap();
        let cache = ChannelCache::new(dir.path());
        cache.persist("a_b", &[record("fake_ab_1", "One")]).await;

        assert_ne!(cache.file_path("a_b"), cache.file_path("a.b"));
        assert_ne!(cache.file_path("a_b"), cache.file_path("a b"));
        assert!(cache.load_from_disk("a.b").await.is_none());
        assert!(cache.load_from_disk("a b").await.is_none());
        assert_eq!(cache.load_from_disk("A_B").await.map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_file_path_stays_inside_directory() {
        let cache = ChannelCache::new("/var/cache/tuners");
        let path = cache.file_path("../../etc/passwd");
        assert_eq!(path.parent(), Some(Path::new("/var/cache/tuners")));
    }
}
