//! Cache file persistence
//!
//! The cache is a single JSON file holding the last aggregation or
//! validation result. Writes replace it wholesale through a temp file in
//! the same directory followed by a rename, so readers only ever see the
//! old or the new contents.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::{StoreError, StoreResult};
use crate::models::Validatable;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw cache contents, or `None` when the file is absent or blank.
    pub async fn read(&self) -> StoreResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => {
                debug!("Cache file {:?} is empty", self.path);
                Ok(None)
            }
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Decode the cache into either persisted shape.
    pub async fn load(&self) -> StoreResult<Option<Validatable>> {
        match self.read().await? {
            Some(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(StoreError::Decode),
            None => Ok(None),
        }
    }

    /// Replace the cache file with the JSON encoding of `value`.
    pub async fn write<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<()> {
        let payload = serde_json::to_vec(value).map_err(StoreError::Encode)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &payload))
            .await
            .map_err(|e| StoreError::Write {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })?
    }
}

fn write_atomic(path: &Path, payload: &[u8]) -> StoreResult<()> {
    let write_error = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_error)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
    temp.write_all(payload).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|e| write_error(e.error))?;

    debug!("Wrote {} bytes to cache file {:?}", payload.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregatedConfig, ChannelGroup, FlatEntry, GroupKey, StreamRecord};
    use tempfile::TempDir;

    fn sample() -> AggregatedConfig {
        let mut group = ChannelGroup::new(GroupKey {
            name: "Channel One".to_string(),
            logo: "http://x/logo.png".to_string(),
            group: "News".to_string(),
        });
        group.streams.push(StreamRecord::new("http://x/stream.m3u8", "1"));
        group.streams.push(StreamRecord {
            available: true,
            ..StreamRecord::new("http://x/radio.mp3", "1")
        });
        AggregatedConfig::new(vec![group])
    }

    #[tokio::test]
    async fn test_missing_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        assert!(store.read().await.unwrap().is_none());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "  \n").unwrap();
        assert!(ConfigStore::new(path).read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("json").join("config.json"));
        let config = sample();

        store.write(&config).await.unwrap();

        let raw = store.read().await.unwrap().expect("cache hit");
        let decoded: AggregatedConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(
            store.load().await.unwrap(),
            Some(Validatable::Groups(config))
        );
    }

    #[tokio::test]
    async fn test_write_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        store.write(&sample()).await.unwrap();
        store.write(&AggregatedConfig::default()).await.unwrap();

        assert_eq!(store.read().await.unwrap().as_deref(), Some("[]"));
        // Only the cache file remains, no temp files left behind
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("config.json")]);
    }

    #[tokio::test]
    async fn test_legacy_flat_cache_is_accepted() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let flat = vec![FlatEntry {
            id: "1".to_string(),
            logo: "l".to_string(),
            group: "g".to_string(),
            name: "n".to_string(),
            link: "http://x/a.m3u8".to_string(),
            available: true,
        }];
        store.write(&flat).await.unwrap();

        assert_eq!(
            store.load().await.unwrap(),
            Some(Validatable::FlatStreams(flat))
        );
    }

    #[tokio::test]
    async fn test_garbage_cache_fails_to_decode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = ConfigStore::new(path);

        // Raw reads still serve the bytes verbatim
        assert_eq!(store.read().await.unwrap().as_deref(), Some("{not json"));
        assert!(matches!(store.load().await, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unwritable_location_reports_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let store = ConfigStore::new(blocker.join("config.json"));

        let result = store.write(&sample()).await;
        assert!(matches!(result, Err(StoreError::Write { .. })));
    }
}
