//! File system operations with permission checks

use super::permissions::PermissionManager;
use crate::error::{Error, Result, SandboxError};
use crate::types::FileEntry;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File system handler with permission checking
pub struct FileSystemHandler;

impl FileSystemHandler {
    /// Read a text file with permission check
    pub async fn read_text_file(
        permission_manager: &PermissionManager,
        path: impl AsRef<Path>,
    ) -> Result<String> {
        let path = permission_manager.validate_access(path)?;

        debug!("Reading file: {:?}", path);

        fs::read_to_string(&path)
            .await
            .map_err(|e| Self::not_found_or_io(e, &path))
    }

    /// Write a text file with permission check, creating parent directories.
    ///
    /// Returns the resolved path and the number of bytes written.
    pub async fn write_file(
        permission_manager: &PermissionManager,
        path: impl AsRef<Path>,
        content: &str,
    ) -> Result<(PathBuf, u64)> {
        let path = permission_manager.validate_access(path)?;

        debug!("Writing file: {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        fs::write(&path, content).await?;

        let size = content.len() as u64;
        info!("Wrote {} bytes to {:?}", size, path);

        Ok((path, size))
    }

    /// List directory contents with permission check
    ///
    /// Directories come first, then files, each group sorted by name.
    pub async fn list_directory(
        permission_manager: &PermissionManager,
        path: impl AsRef<Path>,
    ) -> Result<Vec<FileEntry>> {
        let path = permission_manager.validate_access(path)?;

        if !path.exists() {
            return Err(Error::Sandbox(SandboxError::DirectoryNotFound(
                path.to_string_lossy().to_string(),
            )));
        }

        if !path.is_dir() {
            return Err(Error::Sandbox(SandboxError::InvalidPath(format!(
                "{:?} is not a directory",
                path
            ))));
        }

        debug!("Listing directory: {:?}", path);

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&path).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: metadata.is_dir(),
                size: metadata.is_file().then(|| metadata.len()),
            });
        }

        entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });

        Ok(entries)
    }

    fn not_found_or_io(e: std::io::Error, path: &Path) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Sandbox(SandboxError::FileNotFound(path.to_string_lossy().to_string()))
        } else {
            Error::Io(e)
        }
    }
}
