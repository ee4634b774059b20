//! Ollama model registry client.
//!
//! Resolves a model reference to the total size of its weight layers by
//! reading the OCI manifest from the registry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{PodError, PodResult};

/// Media type of the layer holding model weights.
pub const MODEL_MEDIA_TYPE: &str = "application/vnd.ollama.image.model";

const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// A model reference of the form `[namespace/]name[:tag]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference {
    raw: String,
    namespace: String,
    name: String,
    tag: String,
}

impl ModelReference {
    /// Parse a reference. The tag defaults to `latest`, the namespace to `library`.
    ///
    /// # Errors
    /// Returns [`PodError::RegistryLookup`] for an empty name or tag.
    pub fn parse(model: &str) -> PodResult<Self> {
        let raw = model.trim();
        let (path, tag) = match raw.rsplit_once(':') {
            Some((path, tag)) => (path, tag),
            None => (raw, "latest"),
        };
        let (namespace, name) = match path.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => ("library", path),
        };

        if name.is_empty() || tag.is_empty() || namespace.is_empty() {
            return Err(PodError::RegistryLookup {
                model: model.to_string(),
                reason: "expected [namespace/]name[:tag]".to_string(),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// The reference exactly as the user wrote it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Model name without namespace or tag.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag, `latest` when omitted.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Registry path of the manifest.
    #[must_use]
    pub fn manifest_path(&self) -> String {
        format!("/v2/{}/{}/manifests/{}", self.namespace, self.name, self.tag)
    }
}

impl std::fmt::Display for ModelReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Source of model sizes.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Total size in bytes of the model's weight layers.
    async fn model_size_bytes(&self, model: &ModelReference) -> PodResult<u64>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    layers: Vec<ManifestLayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestLayer {
    media_type: String,
    size: u64,
}

/// HTTP client for the Ollama registry.
#[derive(Clone)]
pub struct OllamaRegistry {
    client: Client,
    base_url: String,
}

impl OllamaRegistry {
    /// Create a registry client.
    ///
    /// # Errors
    /// Returns [`PodError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PodResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PodError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelRegistry for OllamaRegistry {
    async fn model_size_bytes(&self, model: &ModelReference) -> PodResult<u64> {
        let url = format!("{}{}", self.base_url, model.manifest_path());
        debug!(url = %url, "Fetching model manifest");

        let lookup_err = |reason: String| PodError::RegistryLookup {
            model: model.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .header("Accept", MANIFEST_ACCEPT)
            .send()
            .await
            .map_err(|e| lookup_err(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(lookup_err("model not found (registry returned 404)".to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(lookup_err(format!("registry returned {status}: {text}")));
        }

        let manifest: Manifest = response
            .json()
            .await
            .map_err(|e| lookup_err(format!("invalid manifest: {e}")))?;

        let total: u64 = manifest
            .layers
            .iter()
            .filter(|l| l.media_type == MODEL_MEDIA_TYPE)
            .map(|l| l.size)
            .sum();

        if total == 0 {
            return Err(lookup_err("no model layers found in manifest".to_string()));
        }

        debug!(model = %model, bytes = total, "Resolved model size");
        Ok(total)
    }
}
