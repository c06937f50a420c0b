//! Object store trait definitions

use async_trait::async_trait;
use rios_core::{RiosError, RiosResult};
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Transfer primitives handed to the job executor
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `reference` into the local file `dest`
    async fn fetch(&self, reference: &str, dest: &Path) -> RiosResult<()>;

    /// Upload the local file `source` to `destination`, returning the
    /// reference the object can be read back from
    async fn put(&self, source: &Path, destination: &str) -> RiosResult<String>;

    /// Upload every file in `files` (relative to `root`) below `destination`.
    ///
    /// Returns the reference of the first file, which callers treat as the
    /// primary artifact.
    async fn publish(
        &self,
        root: &Path,
        files: &[PathBuf],
        destination: &str,
    ) -> RiosResult<String> {
        let mut primary = None;
        for relative in files {
            let target = join_reference(destination, relative)?;
            let reference = self.put(&root.join(relative), &target).await?;
            primary.get_or_insert(reference);
        }

        let primary = primary
            .ok_or_else(|| RiosError::Transfer("nothing to publish".to_string()))?;
        info!(files = files.len(), primary = %primary, "Published output");
        Ok(primary)
    }

    /// Get the store name
    fn name(&self) -> &'static str;
}

/// Append a relative file path to a destination prefix using `/` separators.
///
/// A query string or fragment on the destination (presigned URLs) stays at
/// the end of the joined reference.
pub fn join_reference(destination: &str, relative: &Path) -> RiosResult<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            _ => {
                return Err(RiosError::Transfer(format!(
                    "'{}' is not a plain relative path",
                    relative.display()
                )))
            }
        }
    }
    if segments.is_empty() {
        return Err(RiosError::Transfer("empty relative path".to_string()));
    }

    let (base, suffix) = match destination.find(|c: char| c == '?' || c == '#') {
        Some(idx) => destination.split_at(idx),
        None => (destination, ""),
    };

    Ok(format!(
        "{}/{}{}",
        base.trim_end_matches('/'),
        segments.join("/"),
        suffix
    ))
}
