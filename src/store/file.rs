// ABOUTME: Durable file-backed side channel, one JSON file per key
// ABOUTME: Survives process restarts so offline-buffered coordinates outlive a crash
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Fieldtrack Contributors

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::SideChannel;
use crate::errors::StoreError;

/// Side channel writing each key to its own file under a base directory
///
/// Keys are sanitized to a filesystem-safe alphabet before use, so session
/// ids containing separators cannot escape the base directory.
#[derive(Debug, Clone)]
pub struct FileSideChannel {
    base_dir: PathBuf,
}

impl FileSideChannel {
    /// Create a side channel rooted at `base_dir`
    ///
    /// The directory is created on first write.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create a side channel under the platform-local data directory
    ///
    /// Returns `None` when the platform exposes no such directory.
    #[must_use]
    pub fn in_default_location() -> Option<Self> {
        dirs::data_local_dir().map(|dir| Self::new(dir.join("fieldtrack")))
    }

    /// Base directory the channel writes under
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl SideChannel for FileSideChannel {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|source| StoreError::Local {
                operation: "set",
                source,
            })?;
        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .map_err(|source| StoreError::Local {
                operation: "set",
                source,
            })?;
        debug!(key, path = %path.display(), bytes = value.len(), "side channel entry written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Local {
                operation: "get",
                source,
            }),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Local {
                operation: "remove",
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileSideChannel::new(dir.path());

        channel.set("route_session_abc", "[1,2,3]").await.unwrap();
        assert_eq!(
            channel.get("route_session_abc").await.unwrap().as_deref(),
            Some("[1,2,3]")
        );

        channel.remove("route_session_abc").await.unwrap();
        assert_eq!(channel.get("route_session_abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileSideChannel::new(dir.path());
        assert_eq!(channel.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn survives_reopen_from_same_directory() {
        let dir = tempfile::tempdir().unwrap();
        {
            let channel = FileSideChannel::new(dir.path());
            channel.set("route_session_x", "tail").await.unwrap();
        }
        let reopened = FileSideChannel::new(dir.path());
        assert_eq!(
            reopened.get("route_session_x").await.unwrap().as_deref(),
            Some("tail")
        );
    }

    #[tokio::test]
    async fn hostile_keys_stay_inside_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileSideChannel::new(dir.path());
        channel.set("../escape", "v").await.unwrap();
        assert_eq!(channel.get("../escape").await.unwrap().as_deref(), Some("v"));
        assert!(dir.path().join("___escape.json").exists());
    }
}
