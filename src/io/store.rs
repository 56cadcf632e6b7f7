//! Filesystem Zarr store access.
//!
//! Each archive handle owns its own store, so handles opened by different
//! workers never share state.

use crate::error::ExtractError;
use std::path::Path;
use std::sync::Arc;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::Group;
use zarrs::storage::{ListableStorageTraits, StorePrefix};

/// Open a read-only handle onto a Zarr hierarchy rooted at `path`.
///
/// # Errors
/// Returns [`ExtractError::NotFound`] if the path does not exist or does not
/// hold a Zarr group at its root.
pub fn open_filesystem_store(path: &Path) -> Result<Arc<FilesystemStore>, ExtractError> {
    if !path.is_dir() {
        return Err(ExtractError::NotFound(format!(
            "Zarr archive '{}' does not exist",
            path.display()
        )));
    }

    let store = FilesystemStore::new(path).map_err(|e| {
        ExtractError::NotFound(format!("Cannot open Zarr archive '{}': {}", path.display(), e))
    })?;
    let store = Arc::new(store);

    Group::open(store.clone(), "/").map_err(|e| {
        ExtractError::NotFound(format!(
            "'{}' is not a valid Zarr store: {}",
            path.display(),
            e
        ))
    })?;

    tracing::debug!("Opened Zarr archive at {}", path.display());
    Ok(store)
}

/// Build an absolute node path (`/a/b/c`) from path segments.
pub fn node_path(segments: &[&str]) -> String {
    let mut path = String::from("/");
    path.push_str(&segments.join("/"));
    path
}

/// Store prefix (`a/b/`) for the node at `path`.
fn node_prefix(path: &str) -> Result<StorePrefix, ExtractError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(StorePrefix::root());
    }
    StorePrefix::new(format!("{}/", trimmed))
        .map_err(|e| ExtractError::decode(format!("Invalid node path '{}'", path), e))
}

/// Whether a group exists at `path`.
pub fn is_group(store: &Arc<FilesystemStore>, path: &str) -> bool {
    Group::open(store.clone(), path).is_ok()
}

/// Sorted names of the child groups directly below the group at `path`.
///
/// Child arrays and plain directories without group metadata are skipped.
pub fn child_groups(store: &Arc<FilesystemStore>, path: &str) -> Result<Vec<String>, ExtractError> {
    let prefix = node_prefix(path)?;
    let listing = store
        .list_dir(&prefix)
        .map_err(|e| ExtractError::decode(format!("Cannot list '{}'", path), e))?;

    let parent = path.trim_matches('/');
    let mut names: Vec<String> = listing
        .prefixes()
        .iter()
        .filter_map(|child| {
            child
                .as_str()
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
        .filter(|name| {
            let child_path = if parent.is_empty() {
                node_path(&[name])
            } else {
                node_path(&[parent, name])
            };
            is_group(store, &child_path)
        })
        .collect();

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_path() {
        assert_eq!(node_path(&[]), "/");
        assert_eq!(node_path(&["run001"]), "/run001");
        assert_eq!(node_path(&["run001", "masks", "m1"]), "/run001/masks/m1");
    }

    #[test]
    fn test_node_prefix() {
        assert_eq!(node_prefix("/").unwrap(), StorePrefix::root());
        assert_eq!(node_prefix("/run001/masks").unwrap().as_str(), "run001/masks/");
    }

    #[test]
    fn test_open_missing_path() {
        let result = open_filesystem_store(Path::new("/definitely/not/a/zarr/archive"));
        assert!(matches!(result, Err(ExtractError::NotFound(_))));
    }

    #[test]
    fn test_open_plain_directory_is_not_a_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = open_filesystem_store(dir.path());
        assert!(matches!(result, Err(ExtractError::NotFound(_))));
    }
}
