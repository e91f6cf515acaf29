//! Path confinement for the builtin file tools

use crate::error::{Error, Result, SandboxError};
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Dangling-link chain length after which a path is rejected
const MAX_LINK_HOPS: usize = 40;

/// Permission manager for file system access
///
/// Relative paths are resolved against the base directory (the workspace).
/// A path is accessible when, after normalization, it lies under one of the
/// granted roots.
#[derive(Debug, Clone)]
pub struct PermissionManager {
    /// Directory relative paths are resolved against
    base_dir: PathBuf,
    /// Granted roots in grant order
    granted_paths: Vec<PathBuf>,
}

impl PermissionManager {
    /// Create a manager with no granted roots
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = Self::normalize_path(&Self::expand_home(base_dir.as_ref()))?;
        Ok(Self {
            base_dir,
            granted_paths: Vec::new(),
        })
    }

    /// Create a manager that grants its own base directory
    pub fn for_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        let mut manager = Self::new(workspace)?;
        let base = manager.base_dir.clone();
        manager.grant_access(base)?;
        Ok(manager)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Grant access to a path and everything below it
    pub fn grant_access(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(path)?;

        if self.granted_paths.contains(&path) {
            return Ok(());
        }

        info!("Granting access to: {:?}", path);
        self.granted_paths.push(path);
        Ok(())
    }

    /// Revoke access to a previously granted root
    pub fn revoke_access(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(path)?;
        let before = self.granted_paths.len();
        self.granted_paths.retain(|granted| granted != &path);

        if self.granted_paths.len() != before {
            info!("Revoked access to: {:?}", path);
        }
        Ok(())
    }

    /// Check if a path is accessible
    pub fn check_access(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = self.resolve(path)?;
        Ok(self.is_path_granted(&path))
    }

    /// Resolve a path and fail unless it lies under a granted root
    pub fn validate_access(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.resolve(path)?;

        if !self.is_path_granted(&path) {
            return Err(Error::Sandbox(SandboxError::PathNotGranted(
                path.to_string_lossy().to_string(),
            )));
        }

        Ok(path)
    }

    pub fn list_granted_paths(&self) -> &[PathBuf] {
        &self.granted_paths
    }

    /// Expand `~`, anchor relative paths at the base directory and normalize
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::Sandbox(SandboxError::InvalidPath(
                "empty path".to_string(),
            )));
        }

        let expanded = Self::expand_home(path);
        let anchored = if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        };

        Self::normalize_path(&anchored)
    }

    fn is_path_granted(&self, path: &Path) -> bool {
        self.granted_paths
            .iter()
            .any(|granted| path.starts_with(granted))
    }

    fn expand_home(path: &Path) -> PathBuf {
        match (path.strip_prefix("~"), dirs::home_dir()) {
            (Ok(rest), Some(home)) => home.join(rest),
            _ => path.to_path_buf(),
        }
    }

    /// Canonicalize the longest existing prefix and clean the remainder.
    ///
    /// Symlinks in the existing part are followed, so a link pointing out of
    /// a granted root resolves to its target and is judged there. Dangling
    /// links are followed by hand for the same reason.
    fn normalize_path(path: &Path) -> Result<PathBuf> {
        Self::normalize_following(path, 0)
    }

    fn normalize_following(path: &Path, hops: usize) -> Result<PathBuf> {
        let cleaned = Self::clean_path(path);

        if cleaned.exists() {
            return cleaned.canonicalize().map_err(|e| {
                Error::Sandbox(SandboxError::InvalidPath(format!(
                    "Failed to canonicalize path {:?}: {}",
                    cleaned, e
                )))
            });
        }

        let mut current = cleaned.clone();
        let mut remaining = Vec::new();

        loop {
            if let Ok(metadata) = std::fs::symlink_metadata(&current) {
                if metadata.file_type().is_symlink() {
                    let target = Self::follow_dangling_link(&current, hops)?;
                    let resolved = remaining
                        .iter()
                        .rev()
                        .fold(target, |path, part| path.join(part));
                    return Self::normalize_following(&resolved, hops + 1);
                }
                break;
            }

            let Some(name) = current.file_name().map(|n| n.to_owned()) else {
                break;
            };
            remaining.push(name);
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        let mut result = if current.exists() {
            current.canonicalize().unwrap_or(current)
        } else {
            current
        };

        for part in remaining.into_iter().rev() {
            result.push(part);
        }

        Ok(result)
    }

    /// Target of a link whose destination does not exist, anchored at the
    /// link's directory when relative
    fn follow_dangling_link(link: &Path, hops: usize) -> Result<PathBuf> {
        if hops >= MAX_LINK_HOPS {
            return Err(Error::Sandbox(SandboxError::InvalidPath(format!(
                "Too many levels of symbolic links at {:?}",
                link
            ))));
        }

        let target = std::fs::read_link(link).map_err(|e| {
            Error::Sandbox(SandboxError::InvalidPath(format!(
                "Failed to read link {:?}: {}",
                link, e
            )))
        })?;

        Ok(match link.parent() {
            Some(parent) => parent.join(target),
            None => target,
        })
    }

    /// Clean a path without requiring it to exist
    fn clean_path(path: &Path) -> PathBuf {
        let mut components = Vec::new();

        for component in path.components() {
            match component {
                Component::ParentDir => {
                    // Never climb above the root.
                    if matches!(components.last(), Some(Component::Normal(_))) {
                        components.pop();
                    }
                }
                Component::CurDir => {}
                c => components.push(c),
            }
        }

        components.iter().collect()
    }
}
