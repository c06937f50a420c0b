//! HTTP(S) transfer
//!
//! Inputs are downloaded with GET and streamed to disk. Outputs are uploaded
//! with PUT, which works with presigned object storage URLs.

use async_trait::async_trait;
use futures::StreamExt;
use rios_core::{RiosError, RiosResult};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::traits::ObjectStore;

/// Object store speaking plain HTTP(S)
pub struct HttpStore {
    client: reqwest::Client,
}

impl HttpStore {
    /// Create a new HTTP store.
    ///
    /// Only connecting is bounded by `connect_timeout`; payloads can be
    /// large, so transfers themselves have no deadline.
    pub fn new(connect_timeout: Duration) -> RiosResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| RiosError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn fetch(&self, reference: &str, dest: &Path) -> RiosResult<()> {
        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| RiosError::Transfer(format!("GET {} failed: {}", reference, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %reference, status = %status, "Download rejected");
            return Err(RiosError::Transfer(format!(
                "GET {} returned {}",
                reference, status
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                RiosError::Transfer(format!("Download of {} interrupted: {}", reference, e))
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url = %reference, bytes = written, "Downloaded input");
        Ok(())
    }

    async fn put(&self, source: &Path, destination: &str) -> RiosResult<String> {
        let file = tokio::fs::File::open(source).await?;
        let size = file.metadata().await?.len();

        // Streamed from disk; outputs can be far larger than memory
        let response = self
            .client
            .put(destination)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::from(file))
            .send()
            .await
            .map_err(|e| RiosError::Transfer(format!("PUT {} failed: {}", destination, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RiosError::Transfer(format!(
                "PUT {} returned {}: {}",
                destination, status, detail
            )));
        }

        debug!(url = %destination, bytes = size, "Uploaded output");
        Ok(destination.to_string())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
