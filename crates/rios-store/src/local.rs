//! Local filesystem transfer (`file://` references and absolute paths)

use async_trait::async_trait;
use rios_core::{RiosError, RiosResult};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::traits::ObjectStore;

/// Object store backed by a locally mounted filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalStore;

impl LocalStore {
    pub fn new() -> Self {
        Self
    }

    /// Filesystem path named by a `file://` reference or absolute path
    pub fn path_of(reference: &str) -> RiosResult<PathBuf> {
        let path = reference.strip_prefix("file://").unwrap_or(reference);
        let path = PathBuf::from(path);
        if path.is_absolute() {
            Ok(path)
        } else {
            Err(RiosError::Transfer(format!(
                "'{}' is not an absolute file reference",
                reference
            )))
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn fetch(&self, reference: &str, dest: &Path) -> RiosResult<()> {
        let source = Self::path_of(reference)?;
        tokio::fs::copy(&source, dest).await.map_err(|e| {
            RiosError::Transfer(format!("Failed to copy {}: {}", source.display(), e))
        })?;
        debug!(source = %source.display(), dest = %dest.display(), "Copied input");
        Ok(())
    }

    async fn put(&self, source: &Path, destination: &str) -> RiosResult<String> {
        let target = Self::path_of(destination)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, &target).await.map_err(|e| {
            RiosError::Transfer(format!("Failed to copy to {}: {}", target.display(), e))
        })?;
        debug!(source = %source.display(), target = %target.display(), "Copied output");
        Ok(destination.to_string())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// List every regular file below `root`, as sorted paths relative to `root`
pub async fn list_files(root: &Path) -> RiosResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = path
                    .strip_prefix(root)
                    .map_err(|e| RiosError::Internal(e.to_string()))?;
                files.push(relative.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_files_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("frames")).unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("result.mp4"), b"video").unwrap();
        std::fs::write(dir.path().join("frames/0001.png"), b"png").unwrap();

        let files = list_files(dir.path()).await.unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("frames/0001.png"), PathBuf::from("result.mp4")]
        );
    }

    #[tokio::test]
    async fn test_list_files_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        assert!(list_files(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_and_publish() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let store = LocalStore::new();

        let input = src.path().join("dataset.csv");
        std::fs::write(&input, b"a,b\n1,2\n").unwrap();
        let staged = work.path().join("dataset.csv");
        store
            .fetch(&format!("file://{}", input.display()), &staged)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&staged).unwrap(), b"a,b\n1,2\n");

        std::fs::create_dir_all(work.path().join("out/sub")).unwrap();
        std::fs::write(work.path().join("out/a.txt"), b"A").unwrap();
        std::fs::write(work.path().join("out/sub/b.txt"), b"B").unwrap();
        let files = list_files(&work.path().join("out")).await.unwrap();

        let destination = format!("file://{}/job-1/", dest.path().display());
        let primary = store
            .publish(&work.path().join("out"), &files, &destination)
            .await
            .unwrap();

        assert_eq!(primary, format!("file://{}/job-1/a.txt", dest.path().display()));
        assert_eq!(std::fs::read(dest.path().join("job-1/sub/b.txt")).unwrap(), b"B");
    }

    #[tokio::test]
    async fn test_missing_source_is_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalStore::new()
            .fetch("/nonexistent/input.json", &dir.path().join("input.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, RiosError::Transfer(_)));
    }

    #[test]
    fn test_relative_reference_rejected() {
        assert!(LocalStore::path_of("file://relative/path").is_err());
        assert_eq!(
            LocalStore::path_of("file:///srv/data").unwrap(),
            PathBuf::from("/srv/data")
        );
    }
}
