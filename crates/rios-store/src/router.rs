//! Scheme-based routing between transfer backends

use async_trait::async_trait;
use rios_core::{RiosError, RiosResult};
use std::path::Path;
use std::time::Duration;

use crate::http::HttpStore;
use crate::local::LocalStore;
use crate::traits::ObjectStore;

/// Transfer scheme of a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheme {
    /// `http://` or `https://`
    Http,
    /// `file://` or an absolute path
    File,
    /// Anything else, e.g. `s3://`
    Unsupported(String),
}

impl Scheme {
    pub fn of(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            Scheme::Http
        } else if reference.starts_with("file://") || reference.starts_with('/') {
            Scheme::File
        } else {
            let scheme = reference
                .split_once("://")
                .map(|(scheme, _)| scheme)
                .unwrap_or(reference);
            Scheme::Unsupported(scheme.to_string())
        }
    }
}

/// Object store that picks a backend from each reference's scheme
pub struct RoutingStore {
    http: HttpStore,
    local: LocalStore,
}

impl RoutingStore {
    pub fn new(connect_timeout: Duration) -> RiosResult<Self> {
        Ok(Self {
            http: HttpStore::new(connect_timeout)?,
            local: LocalStore::new(),
        })
    }

    fn backend(&self, reference: &str) -> RiosResult<&dyn ObjectStore> {
        match Scheme::of(reference) {
            Scheme::Http => Ok(&self.http),
            Scheme::File => Ok(&self.local),
            Scheme::Unsupported(scheme) => Err(RiosError::Transfer(format!(
                "unsupported scheme '{}' in reference '{}'",
                scheme, reference
            ))),
        }
    }
}

#[async_trait]
impl ObjectStore for RoutingStore {
    async fn fetch(&self, reference: &str, dest: &Path) -> RiosResult<()> {
        self.backend(reference)?.fetch(reference, dest).await
    }

    async fn put(&self, source: &Path, destination: &str) -> RiosResult<String> {
        self.backend(destination)?.put(source, destination).await
    }

    fn name(&self) -> &'static str {
        "routing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_of() {
        assert_eq!(Scheme::of("https://bucket.example.com/a"), Scheme::Http);
        assert_eq!(Scheme::of("http://localhost/a"), Scheme::Http);
        assert_eq!(Scheme::of("file:///srv/a"), Scheme::File);
        assert_eq!(Scheme::of("/srv/a"), Scheme::File);
        assert_eq!(
            Scheme::of("s3://bucket/key"),
            Scheme::Unsupported("s3".to_string())
        );
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_rejected() {
        let store = RoutingStore::new(Duration::from_secs(1)).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = store
            .fetch("s3://bucket/workflow.json", &dir.path().join("workflow.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 's3'"));
        assert!(!dir.path().join("workflow.json").exists());
    }

    #[tokio::test]
    async fn test_routes_file_references() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.json");
        std::fs::write(&source, b"{}").unwrap();

        let store = RoutingStore::new(Duration::from_secs(1)).unwrap();
        store
            .fetch(source.to_str().unwrap(), &dir.path().join("copy.json"))
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("copy.json")).unwrap(), b"{}");
    }
}
