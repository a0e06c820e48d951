use std::collections::BTreeMap;
use std::path::Path;

use rand::distr::Alphanumeric;
use rand::distr::SampleString;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use super::KeyValueStore;
use super::OperationStore;
use super::StoreError;
use crate::config_models::data_directory::DataDirectory;
use crate::models::operation::MiningOperationState;
use crate::models::operation::OperationId;

/// JSON files under the data directory.
///
/// Each operation lives in `operations/<id>.json`; settings share a single
/// `settings.json` object.  Writes go to a sibling temp file that is then
/// renamed over the target, so readers never observe a partial record.
#[derive(Debug)]
pub struct FileStore {
    data_dir: DataDirectory,

    // serializes settings read-modify-write cycles
    settings_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: DataDirectory) -> Self {
        Self {
            data_dir,
            settings_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &DataDirectory {
        &self.data_dir
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        // unique per write, concurrent writers of one record must not share it.
        let suffix = Alphanumeric.sample_string(&mut rand::rng(), 8);
        let tmp_path = path.with_extension(format!("{}.tmp", suffix));
        tokio::fs::write(&tmp_path, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(io_err)
    }

    async fn read_settings(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let path = self.data_dir.settings_file_path();
        match Self::read_optional(&path).await? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
                    what: path.display().to_string(),
                    source,
                })
            }
            None => Ok(BTreeMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl OperationStore for FileStore {
    async fn get_operation(
        &self,
        id: &OperationId,
    ) -> Result<Option<MiningOperationState>, StoreError> {
        let path = self.data_dir.operation_file_path(id);
        let Some(bytes) = Self::read_optional(&path).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                what: format!("operation {}", id),
                source,
            })
    }

    async fn get_active_operations(&self) -> Result<Vec<MiningOperationState>, StoreError> {
        let dir = self.data_dir.operations_dir_path();
        let io_err = |source| StoreError::Io {
            path: dir.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_err(e)),
        };

        let mut active = vec![];
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(bytes) = Self::read_optional(&path).await? else {
                continue;
            };

            // one unreadable record must not hide the others.
            match serde_json::from_slice::<MiningOperationState>(&bytes) {
                Ok(state) if !state.is_terminal() => active.push(state),
                Ok(_) => {}
                Err(e) => warn!("skipping corrupt operation file {}: {}", path.display(), e),
            }
        }

        debug!("loaded {} active operations from {}", active.len(), dir.display());
        Ok(active)
    }

    async fn save_operation(&self, state: &MiningOperationState) -> Result<(), StoreError> {
        let path = self.data_dir.operation_file_path(state.operation_id());
        let bytes =
            serde_json::to_vec_pretty(state).map_err(|source| StoreError::Serialization {
                what: format!("operation {}", state.operation_id()),
                source,
            })?;

        Self::write_atomically(&path, &bytes).await
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.settings_lock.lock().await;
        Ok(self.read_settings().await?.remove(key))
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.settings_lock.lock().await;

        let mut settings = self.read_settings().await?;
        settings.insert(key.to_owned(), value.to_owned());

        let path = self.data_dir.settings_file_path();
        let bytes =
            serde_json::to_vec_pretty(&settings).map_err(|source| StoreError::Serialization {
                what: path.display().to_string(),
                source,
            })?;
        Self::write_atomically(&path, &bytes).await
    }
}
