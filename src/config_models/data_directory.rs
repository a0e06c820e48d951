use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use directories::ProjectDirs;

use crate::models::operation::OperationId;

pub const OPERATIONS_DIRECTORY_NAME: &str = "operations";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const PRIVATE_KEYS_FILE_NAME: &str = "keys.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectory {
    data_dir: PathBuf,
}

impl DataDirectory {
    ///////////////////////////////////////////////////////////////////////////
    ///
    /// The data directory that contains persisted operations and settings
    ///
    /// The default varies by operating system, e.g.
    ///
    /// - Linux:   /home/alice/.local/share/pop-miner
    /// - Windows: C:\Users\Alice\AppData\Roaming\veriblock\pop-miner\data
    /// - macOS:   /Users/Alice/Library/Application Support/org.veriblock.pop-miner
    pub fn get(root_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match root_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("org", "veriblock", "pop-miner")
                .context("Could not determine data directory")?
                .data_dir()
                .to_path_buf(),
        };

        Ok(DataDirectory { data_dir })
    }

    /// Create directory if it does not exist
    pub async fn create_dir_if_not_exists(dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", dir.to_string_lossy()))
    }

    ///////////////////////////////////////////////////////////////////////////
    ///
    /// The root data directory path
    pub fn root_dir_path(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Directory holding one JSON file per mining operation.
    pub fn operations_dir_path(&self) -> PathBuf {
        self.data_dir.join(Path::new(OPERATIONS_DIRECTORY_NAME))
    }

    /// This file lives within `DataDirectory::operations_dir_path()`.
    pub fn operation_file_path(&self, id: &OperationId) -> PathBuf {
        self.operations_dir_path()
            .join(Path::new(&format!("{}.json", id)))
    }

    pub fn settings_file_path(&self) -> PathBuf {
        self.data_dir.join(Path::new(SETTINGS_FILE_NAME))
    }

    /// Destination of exported wallet private keys.
    pub fn private_keys_file_path(&self) -> PathBuf {
        self.data_dir.join(Path::new(PRIVATE_KEYS_FILE_NAME))
    }
}

impl std::fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data_dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_in_data_dir() -> Result<()> {
        let data_dir = DataDirectory::get(Some(PathBuf::from("/tmp/pop")))?;

        assert_eq!(PathBuf::from("/tmp/pop"), data_dir.root_dir_path());
        assert_eq!(
            PathBuf::from("/tmp/pop/operations/abc.json"),
            data_dir.operation_file_path(&"abc".into())
        );
        assert_eq!(
            PathBuf::from("/tmp/pop/settings.json"),
            data_dir.settings_file_path()
        );
        assert_eq!(
            PathBuf::from("/tmp/pop/keys.txt"),
            data_dir.private_keys_file_path()
        );
        Ok(())
    }
}
