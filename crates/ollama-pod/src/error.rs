//! Error taxonomy for pod provisioning and lifecycle operations.
//!
//! Every variant is terminal for the command that produced it. Nothing in
//! this crate retries internally; callers surface the [`ErrorKind`] and the
//! message, then exit non-zero.

use thiserror::Error;

/// Errors raised by the provisioning engine.
#[derive(Error, Debug)]
pub enum PodError {
    /// The model tag could not be resolved to a size.
    #[error("Registry lookup failed for {model}: {reason}")]
    RegistryLookup { model: String, reason: String },

    /// An explicitly requested GPU type is not in the catalog.
    #[error("Unknown GPU type: {0}")]
    UnknownGpuType(String),

    /// An explicitly requested GPU type does not have enough memory.
    #[error("GPU {gpu_type} has {available_gb} GB VRAM, {required_gb} GB required")]
    InsufficientVram {
        gpu_type: String,
        available_gb: u32,
        required_gb: u32,
    },

    /// No catalog offering satisfies the requirement.
    #[error("No available GPU with >= {required_gb} GB VRAM (cloud type: {cloud_type}). Try again later or pass --gpu-type")]
    NoSuitableGpu { required_gb: u32, cloud_type: String },

    /// A live record already tracks this name.
    #[error("Pod '{name}' is already tracked ({pod_id}, {status}). Run `ollama-pod down --name {name}` first")]
    DuplicatePod {
        name: String,
        pod_id: String,
        status: String,
    },

    /// No local record for this name.
    #[error("No pod named '{name}'{}", tracked_hint(.tracked))]
    PodNotFound { name: String, tracked: Vec<String> },

    /// The platform reported a terminal failure while the pod was starting.
    #[error("Pod {pod_id} failed to start: platform reported {status}")]
    PodProvisioningFailed { pod_id: String, status: String },

    /// The pod did not become ready in time. The remote pod is left running.
    #[error("Pod {pod_id} did not become ready within {timeout_secs}s; it is still running, check it with `status` or remove it with `down`")]
    ProvisioningTimeout { pod_id: String, timeout_secs: u64 },

    /// The model pull on the pod failed. The remote pod is left running.
    #[error("Pulling {model} on pod {pod_id} failed: {reason}")]
    ModelPullFailed {
        pod_id: String,
        model: String,
        reason: String,
    },

    /// Transport, auth or protocol failure against the provisioning platform.
    #[error("Platform API error: {0}")]
    PlatformApi(String),

    /// A local record exists but cannot be read or parsed.
    #[error("Corrupt state record for '{name}' at {path}: {reason}")]
    CorruptState {
        name: String,
        path: String,
        reason: String,
    },

    /// The pod name is not usable as a file name.
    #[error("Invalid pod name {0:?}: use letters, digits, '.', '_' or '-' (max 64, not starting with '.')")]
    InvalidPodName(String),

    /// Missing or invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Local filesystem failure outside of record parsing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn tracked_hint(tracked: &[String]) -> String {
    if tracked.is_empty() {
        ". No tracked pods found".to_string()
    } else {
        format!(". Tracked pods: {}", tracked.join(", "))
    }
}

/// Stable, machine-distinguishable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RegistryLookup,
    UnknownGpuType,
    InsufficientVram,
    NoSuitableGpu,
    DuplicatePod,
    PodNotFound,
    PodProvisioningFailed,
    ProvisioningTimeout,
    ModelPullFailed,
    PlatformApi,
    CorruptState,
    InvalidPodName,
    Config,
    Io,
}

impl ErrorKind {
    /// Snake-case code printed as `error[<code>]`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RegistryLookup => "registry_lookup",
            Self::UnknownGpuType => "unknown_gpu_type",
            Self::InsufficientVram => "insufficient_vram",
            Self::NoSuitableGpu => "no_suitable_gpu",
            Self::DuplicatePod => "duplicate_pod",
            Self::PodNotFound => "pod_not_found",
            Self::PodProvisioningFailed => "pod_provisioning_failed",
            Self::ProvisioningTimeout => "provisioning_timeout",
            Self::ModelPullFailed => "model_pull_failed",
            Self::PlatformApi => "platform_api",
            Self::CorruptState => "corrupt_state",
            Self::InvalidPodName => "invalid_pod_name",
            Self::Config => "config",
            Self::Io => "io",
        }
    }

    /// Process exit code for this kind. Always non-zero.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Config => 2,
            Self::RegistryLookup => 10,
            Self::UnknownGpuType => 11,
            Self::InsufficientVram => 12,
            Self::NoSuitableGpu => 13,
            Self::DuplicatePod => 14,
            Self::PodNotFound => 15,
            Self::PodProvisioningFailed => 16,
            Self::ProvisioningTimeout => 17,
            Self::ModelPullFailed => 18,
            Self::PlatformApi => 19,
            Self::CorruptState => 20,
            Self::InvalidPodName => 21,
            Self::Io => 22,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PodError {
    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RegistryLookup { .. } => ErrorKind::RegistryLookup,
            Self::UnknownGpuType(_) => ErrorKind::UnknownGpuType,
            Self::InsufficientVram { .. } => ErrorKind::InsufficientVram,
            Self::NoSuitableGpu { .. } => ErrorKind::NoSuitableGpu,
            Self::DuplicatePod { .. } => ErrorKind::DuplicatePod,
            Self::PodNotFound { .. } => ErrorKind::PodNotFound,
            Self::PodProvisioningFailed { .. } => ErrorKind::PodProvisioningFailed,
            Self::ProvisioningTimeout { .. } => ErrorKind::ProvisioningTimeout,
            Self::ModelPullFailed { .. } => ErrorKind::ModelPullFailed,
            Self::PlatformApi(_) => ErrorKind::PlatformApi,
            Self::CorruptState { .. } => ErrorKind::CorruptState,
            Self::InvalidPodName(_) => ErrorKind::InvalidPodName,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<reqwest::Error> for PodError {
    fn from(err: reqwest::Error) -> Self {
        Self::PlatformApi(err.to_string())
    }
}

/// Result alias used across the crate.
pub type PodResult<T> = Result<T, PodError>;
