//! Runtime configuration.
//!
//! Values come from CLI flags with environment fallbacks (see the binary);
//! this module holds the defaults and the resolved [`Settings`].

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PodError, PodResult};

/// Default Ollama container image.
pub const OLLAMA_IMAGE: &str = "ollama/ollama";

/// Port the Ollama service listens on inside the pod.
pub const OLLAMA_PORT: u16 = 11434;

/// Base URL of the RunPod GraphQL API.
pub const RUNPOD_API_URL: &str = "https://api.runpod.io/graphql";

/// Domain of RunPod's HTTPS port proxy.
pub const RUNPOD_PROXY_DOMAIN: &str = "proxy.runpod.net";

/// Base URL of the Ollama model registry.
pub const OLLAMA_REGISTRY_URL: &str = "https://registry.ollama.ai";

/// Environment variable holding the RunPod API key.
pub const API_KEY_ENV: &str = "RUNPOD_API_KEY";

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "OLLAMA_POD_STATE_DIR";

/// Default timeout for a single HTTP request.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Interval between readiness / health polls.
pub const POLL_INTERVAL_SECS: u64 = 5;

/// Default readiness timeout.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 300;

/// Default model pull timeout.
pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 600;

/// Timing for the readiness and pull loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Sleep between polls.
    pub interval: Duration,
    /// Upper bound on waiting for the pod (platform + health probe).
    pub ready_timeout: Duration,
    /// Upper bound on the model pull.
    pub pull_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            pull_timeout: Duration::from_secs(DEFAULT_PULL_TIMEOUT_SECS),
        }
    }
}

/// Pod shape used for every create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTemplate {
    /// Container disk in GB.
    pub container_disk_gb: u32,
    /// Pod-local volume in GB, used when no network volume is attached.
    pub volume_gb: u32,
    /// Mount path of the model cache.
    pub volume_mount_path: String,
    /// Environment passed to the container.
    pub env: Vec<(String, String)>,
}

impl Default for PodTemplate {
    fn default() -> Self {
        Self {
            container_disk_gb: 20,
            volume_gb: 50,
            volume_mount_path: "/root/.ollama".to_string(),
            env: vec![("OLLAMA_HOST".to_string(), "0.0.0.0".to_string())],
        }
    }
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// RunPod API key.
    pub api_key: String,
    /// RunPod GraphQL endpoint.
    pub runpod_api_url: String,
    /// Ollama registry base URL.
    pub registry_url: String,
    /// Directory holding one record per pod name.
    pub state_dir: PathBuf,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Polling behaviour.
    pub poll: PollSettings,
}

impl Settings {
    /// Validate the settings that every platform call depends on.
    ///
    /// # Errors
    /// Returns [`PodError::Config`] if the API key is empty.
    pub fn require_api_key(&self) -> PodResult<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(PodError::Config(format!(
                "missing required environment variable {API_KEY_ENV} (or pass --api-key)"
            )));
        }
        Ok(key)
    }
}

/// Load a `.env` file from the working directory if one exists.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env"),
    }
}

/// Default state directory: `~/.ollama-pod/pods`.
///
/// # Errors
/// Returns [`PodError::Config`] if the home directory cannot be determined.
pub fn default_state_dir() -> PodResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".ollama-pod").join("pods"))
        .ok_or_else(|| {
            PodError::Config(format!(
                "could not determine home directory; set {STATE_DIR_ENV}"
            ))
        })
}
