//! Filesystem secret store
//!
//! Each key becomes one JSON file below the base directory:
//!
//! ```text
//! storage/
//! ├── account.json
//! ├── key.json
//! └── certificates/
//!     └── example.com.json
//! ```
//!
//! Directories are created 0700 and files written 0600 on Unix.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace};

use certsteward_common::StoreKey;

use super::{FieldMap, SecretStore, StoreError};

/// Secret store keeping one JSON document per key on disk
#[derive(Debug)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `base_path`
    pub async fn new(base_path: &Path) -> Result<Self, StoreError> {
        create_private_dir(base_path).await?;

        info!(
            storage_path = %base_path.display(),
            "Initialized file secret store"
        );

        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, key: &StoreKey) -> Result<PathBuf, StoreError> {
        let mut path = self.base_path.clone();
        for segment in key.as_str().split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StoreError::Encoding {
                    key: key.to_string(),
                    message: "key does not map to a file name".to_string(),
                });
            }
            path.push(segment);
        }
        let mut file_name = path.into_os_string();
        file_name.push(".json");
        Ok(PathBuf::from(file_name))
    }
}

#[async_trait]
impl SecretStore for FileStore {
    async fn read(&self, key: &StoreKey) -> Result<Option<FieldMap>, StoreError> {
        let path = self.record_path(key)?;

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(key = %key, "No stored record");
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let fields: FieldMap =
            serde_json::from_str(&content).map_err(|e| StoreError::Encoding {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        debug!(key = %key, path = %path.display(), "Read record");
        Ok(Some(fields))
    }

    async fn write(&self, key: &StoreKey, fields: &FieldMap) -> Result<(), StoreError> {
        let path = self.record_path(key)?;

        if let Some(parent) = path.parent() {
            create_private_dir(parent).await?;
        }

        let content = serde_json::to_string_pretty(fields).map_err(|e| StoreError::Encoding {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        let io_error = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&path).await.map_err(io_error)?;

        // mode() only applies when the file is created
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_error)?;
        }

        file.write_all(content.as_bytes()).await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;

        info!(key = %key, path = %path.display(), "Wrote record");
        Ok(())
    }
}

async fn create_private_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
    }

    Ok(())
}
