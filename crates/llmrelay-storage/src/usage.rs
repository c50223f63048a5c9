//! JSON-file usage store

use crate::atomic_writer::write_json;
use crate::error::{StorageError, StorageResult};
use llmrelay_core::{Backend, UsageMap, UsageStats, UsageStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Usage map persisted as `{ "<backend-id>": UsageStats, ... }`
///
/// A missing file loads as an empty map. Entries for unknown backend ids are
/// skipped with a warning so that an older or newer file still loads.
#[derive(Debug, Clone)]
pub struct FileUsageStore {
    path: PathBuf,
}

impl FileUsageStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_blocking(path: &Path) -> StorageResult<UsageMap> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UsageMap::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(UsageMap::new());
        }

        let raw: BTreeMap<String, UsageStats> = serde_json::from_str(&content).map_err(|e| {
            StorageError::Serialization(format!(
                "Failed to parse usage file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut usage = UsageMap::new();
        for (id, stats) in raw {
            match id.parse::<Backend>() {
                Ok(backend) => {
                    usage.insert(backend, stats);
                }
                Err(_) => {
                    tracing::warn!(backend = %id, "Skipping usage entry for unknown backend");
                }
            }
        }
        Ok(usage)
    }

    fn save_blocking(path: &Path, stats: &UsageMap) -> StorageResult<()> {
        let ordered: BTreeMap<&str, &UsageStats> =
            stats.iter().map(|(backend, s)| (backend.id(), s)).collect();
        write_json(path, &ordered, false)
    }
}

#[async_trait::async_trait]
impl UsageStore for FileUsageStore {
    async fn load(&self) -> llmrelay_core::Result<UsageMap> {
        let path = self.path.clone();
        let usage = tokio::task::spawn_blocking(move || Self::load_blocking(&path))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;
        tracing::debug!(path = %self.path.display(), backends = usage.len(), "Loaded usage stats");
        Ok(usage)
    }

    async fn save(&self, stats: &UsageMap) -> llmrelay_core::Result<()> {
        let path = self.path.clone();
        let stats = stats.clone();
        tokio::task::spawn_blocking(move || Self::save_blocking(&path, &stats))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;
        Ok(())
    }
}
