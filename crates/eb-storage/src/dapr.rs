//! Object store backed by a Dapr output binding.
//!
//! Every operation is a `POST {endpoint}/v1.0/bindings/{component}` whose
//! JSON body names the binding operation (`get`, `create`, `delete`) and
//! carries the key in its metadata.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde_json::json;
use tokio::io::AsyncWriteExt;

use eb_core::config::Config;
use eb_core::{Error, Result};

use crate::store::{local_file_name, ObjectStore};

/// Connection settings for [`DaprBindingStore`].
#[derive(Debug, Clone)]
pub struct DaprStoreOptions {
    /// Sidecar base URL, e.g. `http://127.0.0.1:3500`.
    pub endpoint: String,
    /// Binding component name.
    pub component: String,
    /// Payloads are base64 encoded in both directions.
    pub base64: bool,
    pub timeout: Duration,
    /// Largest upload the sidecar accepts, in bytes.
    pub max_request_bytes: u64,
}

impl DaprStoreOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.dapr.endpoint.clone(),
            component: config.storage.component.clone(),
            base64: config.storage.base64,
            timeout: Duration::from_secs(config.dapr.timeout_secs),
            max_request_bytes: config.dapr.max_request_size_mb * 1024 * 1024,
        }
    }
}

/// Dapr binding client.
pub struct DaprBindingStore {
    client: Client,
    url: String,
    name: String,
    options: DaprStoreOptions,
}

impl DaprBindingStore {
    pub fn new(options: DaprStoreOptions) -> Self {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build storage HTTP client: {e}");
                Client::new()
            });
        let url = format!(
            "{}/v1.0/bindings/{}",
            options.endpoint.trim_end_matches('/'),
            options.component
        );
        let name = format!("dapr:{}", options.component);
        Self {
            client,
            url,
            name,
            options,
        }
    }

    async fn invoke(&self, operation: &str, key: &str, data: Option<String>) -> Result<Response> {
        let mut body = json!({
            "operation": operation,
            "metadata": { "key": key, "fileName": key },
        });
        if let Some(data) = data {
            body["data"] = serde_json::Value::String(data);
        }

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::storage(operation, key, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::storage(
                operation,
                key,
                format!("status {status}: {}", text.trim()),
            ));
        }
        Ok(resp)
    }

    fn decode(&self, key: &str, raw: Bytes) -> Result<Bytes> {
        if !self.options.base64 {
            return Ok(raw);
        }
        let trimmed = raw.strip_suffix(b"\n").unwrap_or(&raw);
        STANDARD
            .decode(trimmed)
            .map(Bytes::from)
            .map_err(|e| Error::storage("get", key, format!("invalid base64 payload: {e}")))
    }
}

#[async_trait]
impl ObjectStore for DaprBindingStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, key: &str, dest_dir: &Path) -> Result<PathBuf> {
        let dest = dest_dir.join(local_file_name(key)?);
        tokio::fs::create_dir_all(dest_dir).await?;

        let mut resp = self.invoke("get", key, None).await?;
        if self.options.base64 {
            let raw = resp
                .bytes()
                .await
                .map_err(|e| Error::storage("get", key, e.to_string()))?;
            tokio::fs::write(&dest, self.decode(key, raw)?).await?;
        } else {
            let mut file = tokio::fs::File::create(&dest).await?;
            while let Some(chunk) = resp
                .chunk()
                .await
                .map_err(|e| Error::storage("get", key, e.to_string()))?
            {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
        }

        tracing::debug!(key, path = %dest.display(), store = %self.name, "Fetched object");
        Ok(dest)
    }

    async fn buffer(&self, key: &str) -> Result<Bytes> {
        let raw = self
            .invoke("get", key, None)
            .await?
            .bytes()
            .await
            .map_err(|e| Error::storage("get", key, e.to_string()))?;
        self.decode(key, raw)
    }

    async fn put(&self, local_path: &Path, key: &str) -> Result<()> {
        let content = tokio::fs::read(local_path).await?;
        if content.len() as u64 > self.options.max_request_bytes {
            return Err(Error::storage(
                "create",
                key,
                format!(
                    "{} bytes exceeds the sidecar request limit of {} bytes",
                    content.len(),
                    self.options.max_request_bytes
                ),
            ));
        }

        let data = if self.options.base64 {
            STANDARD.encode(&content)
        } else {
            String::from_utf8(content).map_err(|_| {
                Error::storage("create", key, "binary payload requires storage.base64")
            })?
        };

        self.invoke("create", key, Some(data)).await?;
        tracing::debug!(key, store = %self.name, "Uploaded object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.invoke("delete", key, None).await?;
        tracing::debug!(key, store = %self.name, "Deleted object");
        Ok(())
    }
}
