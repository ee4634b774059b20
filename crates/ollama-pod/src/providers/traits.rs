//! Pod provider trait and common types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PodTemplate;
use crate::error::PodResult;

/// Cloud category an offering is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudCategory {
    /// Community hosts.
    Community,
    /// Secure (datacenter) hosts.
    Secure,
}

impl std::fmt::Display for CloudCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Community => write!(f, "community"),
            Self::Secure => write!(f, "secure"),
        }
    }
}

/// Requested cloud filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CloudType {
    /// Either category.
    #[default]
    Any,
    /// Community only.
    Community,
    /// Secure only.
    Secure,
}

impl CloudType {
    /// Whether offerings in `category` pass this filter.
    #[must_use]
    pub fn matches(self, category: CloudCategory) -> bool {
        match self {
            Self::Any => true,
            Self::Community => category == CloudCategory::Community,
            Self::Secure => category == CloudCategory::Secure,
        }
    }
}

impl std::fmt::Display for CloudType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Community => write!(f, "community"),
            Self::Secure => write!(f, "secure"),
        }
    }
}

impl std::str::FromStr for CloudType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" | "all" => Ok(Self::Any),
            "community" => Ok(Self::Community),
            "secure" => Ok(Self::Secure),
            other => Err(format!(
                "invalid cloud type '{other}' (expected any, community or secure)"
            )),
        }
    }
}

/// One selectable GPU offering from the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuOffering {
    /// Platform GPU type ID (e.g. "NVIDIA RTX A5000").
    pub type_id: String,
    /// Human-readable name.
    pub display_name: String,
    /// GPU memory in GB.
    pub vram_gb: u32,
    /// Hourly price in USD for one GPU.
    pub cost_per_hour: f64,
    /// Cloud category of this price.
    pub cloud_category: CloudCategory,
    /// Coarse stock level (0 sold out, 1 low, 2 medium, 3 high).
    pub availability_count: u32,
}

/// Request to create a pod.
#[derive(Debug, Clone)]
pub struct CreatePodRequest {
    /// Pod name shown on the platform.
    pub name: String,
    /// Container image.
    pub image: String,
    /// GPU type ID.
    pub gpu_type_id: String,
    /// Cloud category of the selected offering.
    pub cloud_category: CloudCategory,
    /// Port exposed by the container.
    pub port: u16,
    /// Network volume to attach.
    pub volume_id: Option<String>,
    /// Datacenter to pin to (required by network volumes).
    pub data_center_id: Option<String>,
    /// Disk and env shape.
    pub template: PodTemplate,
}

/// Coarse pod lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePodStatus {
    /// Created, container not up yet.
    Pending,
    /// Container running.
    Running,
    /// Container exited.
    Exited,
    /// Pod terminated.
    Terminated,
    /// Unknown status.
    #[serde(other)]
    Unknown,
}

impl RemotePodStatus {
    /// A status the pod will not recover from by itself.
    #[must_use]
    pub const fn is_terminal_failure(self) -> bool {
        matches!(self, Self::Exited | Self::Terminated)
    }
}

impl std::fmt::Display for RemotePodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Terminated => write!(f, "terminated"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A port mapping reported by a running pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Address the port is reachable on.
    pub ip: String,
    /// Whether `ip` is publicly routable.
    pub is_public: bool,
    /// Port inside the container.
    pub private_port: u16,
    /// Port on `ip`.
    pub public_port: u16,
    /// `tcp` or `http`.
    pub protocol: String,
}

/// A pod as reported by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePod {
    /// Pod ID.
    pub id: String,
    /// Pod name.
    pub name: String,
    /// Coarse status.
    pub status: RemotePodStatus,
    /// Raw platform status string.
    pub desired_status: String,
    /// Hourly cost, when reported.
    pub cost_per_hour: Option<f64>,
    /// GPU name, when reported.
    pub gpu_display_name: Option<String>,
    /// Attached network volume.
    pub volume_id: Option<String>,
    /// Exposed ports declaration (e.g. "11434/http").
    pub exposed_ports: Option<String>,
    /// Runtime port mappings; empty until the container is up.
    pub ports: Vec<PortMapping>,
    /// Last status change as reported.
    pub last_status_change: Option<String>,
}

impl RemotePod {
    /// Direct address of `private_port`, when the pod maps it to a public TCP port.
    #[must_use]
    pub fn direct_endpoint(&self, private_port: u16) -> Option<String> {
        self.ports
            .iter()
            .find(|p| p.private_port == private_port && p.is_public && p.protocol == "tcp")
            .map(|p| format!("http://{}:{}", p.ip, p.public_port))
    }

    /// Whether the pod declares `port` as exposed.
    #[must_use]
    pub fn exposes_port(&self, port: u16) -> bool {
        let wanted = port.to_string();
        self.exposed_ports.as_deref().is_some_and(|decl| {
            decl.split(',')
                .any(|entry| entry.trim().split('/').next() == Some(wanted.as_str()))
        }) || self.ports.iter().any(|p| p.private_port == port)
    }
}

/// Trait for GPU pod platforms.
#[async_trait]
pub trait PodProvider: Send + Sync {
    /// Current GPU offerings. Never cached.
    async fn list_gpu_offerings(&self) -> PodResult<Vec<GpuOffering>>;

    /// Create a pod and return its ID.
    async fn create_pod(&self, req: CreatePodRequest) -> PodResult<String>;

    /// Look up a pod. `None` when the platform no longer knows it.
    async fn get_pod(&self, id: &str) -> PodResult<Option<RemotePod>>;

    /// List the account's pods.
    async fn list_pods(&self) -> PodResult<Vec<RemotePod>>;

    /// Terminate a pod. Terminating an unknown pod succeeds.
    async fn terminate_pod(&self, id: &str) -> PodResult<()>;

    /// Datacenter a network volume lives in, if the volume is known.
    async fn volume_data_center(&self, volume_id: &str) -> PodResult<Option<String>>;
}
