//! RunPod GraphQL API models.

use serde::{Deserialize, Serialize};

// ============================================================================
// GraphQL envelope
// ============================================================================

/// GraphQL request body.
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    /// Query or mutation document.
    pub query: &'a str,
    /// Variables for the document.
    pub variables: V,
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    /// Response data; absent when the whole request failed.
    pub data: Option<T>,
    /// Errors reported alongside or instead of data.
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// A single GraphQL error.
#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    /// Error message.
    pub message: String,
}

/// Variables wrapper for `input:` style arguments.
#[derive(Debug, Serialize)]
pub struct InputVariables<T: Serialize> {
    /// Input object.
    pub input: T,
}

// ============================================================================
// GPU types
// ============================================================================

/// `gpuTypes` query result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuTypesData {
    /// All GPU types.
    pub gpu_types: Vec<GpuType>,
}

/// A GPU type with per-cloud pricing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuType {
    /// GPU type ID.
    pub id: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Memory in GB.
    pub memory_in_gb: Option<u32>,
    /// Offered on secure cloud.
    #[serde(default)]
    pub secure_cloud: bool,
    /// Offered on community cloud.
    #[serde(default)]
    pub community_cloud: bool,
    /// Secure cloud hourly price.
    pub secure_price: Option<f64>,
    /// Community cloud hourly price.
    pub community_price: Option<f64>,
    /// Single-GPU stock on secure cloud (aliased `lowestPrice`).
    pub secure_stock: Option<LowestPrice>,
    /// Single-GPU stock on community cloud (aliased `lowestPrice`).
    pub community_stock: Option<LowestPrice>,
}

/// `lowestPrice` for one GPU in one cloud.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowestPrice {
    /// On-demand price; absent when nothing can be rented.
    pub uninterruptable_price: Option<f64>,
    /// `High`, `Medium`, `Low`, or absent when sold out.
    pub stock_status: Option<String>,
}

impl LowestPrice {
    /// Stock level as a count: 0 sold out through 3 high.
    #[must_use]
    pub fn stock_level(&self) -> u32 {
        if !self.uninterruptable_price.is_some_and(|p| p > 0.0) {
            return 0;
        }
        match self.stock_status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("high") => 3,
            Some("medium") => 2,
            Some("low") => 1,
            Some("") | None => 0,
            Some(_) => 1,
        }
    }
}

// ============================================================================
// Pods
// ============================================================================

/// Input for `podFindAndDeployOnDemand`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPodInput {
    /// `COMMUNITY` or `SECURE`.
    pub cloud_type: String,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// GPU type ID.
    pub gpu_type_id: String,
    /// Pod name.
    pub name: String,
    /// Container image.
    pub image_name: String,
    /// Container disk in GB.
    pub container_disk_in_gb: u32,
    /// Pod volume in GB; omitted with a network volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_in_gb: Option<u32>,
    /// Volume mount path.
    pub volume_mount_path: String,
    /// Exposed ports, e.g. `11434/http`.
    pub ports: String,
    /// Container environment.
    pub env: Vec<EnvVar>,
    /// Network volume ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_volume_id: Option<String>,
    /// Datacenter ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_center_id: Option<String>,
}

/// Container environment variable.
#[derive(Debug, Serialize)]
pub struct EnvVar {
    /// Name.
    pub key: String,
    /// Value.
    pub value: String,
}

/// `podFindAndDeployOnDemand` result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPodData {
    /// Created pod; null when no machine could be found.
    pub pod_find_and_deploy_on_demand: Option<CreatedPod>,
}

/// Minimal pod returned on create.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPod {
    /// Pod ID.
    pub id: String,
    /// Initial status.
    pub desired_status: Option<String>,
}

/// Input for `pod` and `podTerminate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodIdInput {
    /// Pod ID.
    pub pod_id: String,
}

/// `pod` query result.
#[derive(Debug, Deserialize)]
pub struct PodData {
    /// The pod, null when unknown.
    pub pod: Option<Pod>,
}

/// `myself { pods }` query result.
#[derive(Debug, Deserialize)]
pub struct PodsData {
    /// Current user.
    pub myself: PodsOwner,
}

/// Owner of the pods list.
#[derive(Debug, Deserialize)]
pub struct PodsOwner {
    /// All pods.
    #[serde(default)]
    pub pods: Vec<Pod>,
}

/// Pod resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// Pod ID.
    pub id: String,
    /// Pod name.
    pub name: Option<String>,
    /// `CREATED`, `RUNNING`, `RESTARTING`, `EXITED`, `TERMINATED`...
    pub desired_status: Option<String>,
    /// Last status change description.
    pub last_status_change: Option<String>,
    /// Hourly cost.
    pub cost_per_hr: Option<f64>,
    /// Exposed ports declaration.
    pub ports: Option<String>,
    /// Attached network volume.
    pub network_volume_id: Option<String>,
    /// Host machine.
    pub machine: Option<PodMachine>,
    /// Runtime, null until the container starts.
    pub runtime: Option<PodRuntime>,
}

/// Host machine info.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMachine {
    /// GPU name.
    pub gpu_display_name: Option<String>,
}

/// Pod runtime info.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRuntime {
    /// Uptime.
    pub uptime_in_seconds: Option<u64>,
    /// Port mappings.
    #[serde(default)]
    pub ports: Option<Vec<RuntimePort>>,
}

/// Runtime port mapping.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimePort {
    /// Address.
    pub ip: Option<String>,
    /// Whether `ip` is public.
    #[serde(default)]
    pub is_ip_public: bool,
    /// Container port.
    pub private_port: Option<u16>,
    /// Host port.
    pub public_port: Option<u16>,
    /// `tcp` or `http`.
    #[serde(rename = "type")]
    pub port_type: Option<String>,
}

// ============================================================================
// Network volumes
// ============================================================================

/// `myself { networkVolumes }` query result.
#[derive(Debug, Deserialize)]
pub struct VolumesData {
    /// Current user.
    pub myself: VolumesOwner,
}

/// Owner of the volumes list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumesOwner {
    /// All network volumes.
    #[serde(default)]
    pub network_volumes: Vec<NetworkVolume>,
}

/// Network volume resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkVolume {
    /// Volume ID.
    pub id: String,
    /// Volume name.
    pub name: Option<String>,
    /// Datacenter the volume lives in.
    pub data_center_id: Option<String>,
}
