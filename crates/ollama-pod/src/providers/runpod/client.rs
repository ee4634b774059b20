//! RunPod GraphQL API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::models::{
    DeployPodData, DeployPodInput, EnvVar, GpuType, GpuTypesData, GraphQlRequest, GraphQlResponse,
    InputVariables, LowestPrice, Pod, PodData, PodIdInput, PodsData, VolumesData,
};
use crate::error::{PodError, PodResult};
use crate::providers::traits::{
    CloudCategory, CreatePodRequest, GpuOffering, PodProvider, PortMapping, RemotePod,
    RemotePodStatus,
};

const GPU_TYPES_QUERY: &str = "query GpuTypes { gpuTypes { id displayName memoryInGb \
secureCloud communityCloud securePrice communityPrice \
secureStock: lowestPrice(input: { gpuCount: 1, secureCloud: true }) { uninterruptablePrice stockStatus } \
communityStock: lowestPrice(input: { gpuCount: 1, secureCloud: false }) { uninterruptablePrice stockStatus } } }";

const POD_FIELDS: &str = "id name desiredStatus lastStatusChange costPerHr ports \
networkVolumeId machine { gpuDisplayName } \
runtime { uptimeInSeconds ports { ip isIpPublic privatePort publicPort type } }";

const DEPLOY_MUTATION: &str = "mutation Deploy($input: PodFindAndDeployOnDemandInput!) { \
podFindAndDeployOnDemand(input: $input) { id desiredStatus } }";

const TERMINATE_MUTATION: &str =
    "mutation Terminate($input: PodTerminateInput!) { podTerminate(input: $input) }";

const VOLUMES_QUERY: &str =
    "query Volumes { myself { networkVolumes { id name dataCenterId } } }";

/// RunPod pod provider.
#[derive(Clone)]
pub struct RunPod {
    /// HTTP client.
    client: Client,
    /// API key for authentication.
    api_key: String,
    /// GraphQL endpoint.
    api_url: String,
}

impl RunPod {
    /// Create a new RunPod provider.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> PodResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PodError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_url: api_url.into(),
        })
    }

    /// Run a GraphQL document and return its data.
    async fn graphql<T, V>(&self, query: &str, variables: V) -> PodResult<T>
    where
        T: DeserializeOwned,
        V: Serialize + Send,
    {
        debug!(url = %self.api_url, "GraphQL request");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(PodError::PlatformApi(format!("{status}: {text}")));
        }

        let body: GraphQlResponse<T> = serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, body = %text, "Failed to parse response");
            PodError::PlatformApi(format!("invalid response: {e}"))
        })?;

        if !body.errors.is_empty() {
            let message = body
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PodError::PlatformApi(message));
        }

        body.data
            .ok_or_else(|| PodError::PlatformApi("response contained no data".to_string()))
    }

    /// Convert an API GPU type to one offering per cloud it is sold in.
    ///
    /// Availability comes from the per-cloud `lowestPrice` stock; a cloud
    /// that is disabled or reports no stock yields a zero count.
    fn to_offerings(gpu: &GpuType) -> Vec<GpuOffering> {
        let vram_gb = gpu.memory_in_gb.unwrap_or(0);
        let display_name = gpu.display_name.clone().unwrap_or_else(|| gpu.id.clone());

        let mut offerings = Vec::with_capacity(2);
        let clouds = [
            (
                CloudCategory::Community,
                gpu.community_cloud,
                gpu.community_price,
                gpu.community_stock.as_ref(),
            ),
            (
                CloudCategory::Secure,
                gpu.secure_cloud,
                gpu.secure_price,
                gpu.secure_stock.as_ref(),
            ),
        ];

        for (category, enabled, price, stock) in clouds {
            let Some(price) = price
                .filter(|p| *p > 0.0)
                .or_else(|| stock.and_then(|s| s.uninterruptable_price))
                .filter(|p| *p > 0.0)
            else {
                continue;
            };
            offerings.push(GpuOffering {
                type_id: gpu.id.clone(),
                display_name: display_name.clone(),
                vram_gb,
                cost_per_hour: price,
                cloud_category: category,
                availability_count: if enabled {
                    stock.map_or(0, LowestPrice::stock_level)
                } else {
                    0
                },
            });
        }

        offerings
    }

    /// Map the platform's desired status plus runtime presence to a coarse status.
    fn to_status(desired: Option<&str>, has_runtime: bool) -> RemotePodStatus {
        match desired {
            Some("RUNNING") if has_runtime => RemotePodStatus::Running,
            Some("RUNNING" | "CREATED" | "RESTARTING") => RemotePodStatus::Pending,
            Some("EXITED") => RemotePodStatus::Exited,
            Some("TERMINATED") => RemotePodStatus::Terminated,
            _ => RemotePodStatus::Unknown,
        }
    }

    /// Convert API pod resource to our `RemotePod` type.
    fn to_remote_pod(pod: Pod) -> RemotePod {
        let has_runtime = pod.runtime.is_some();
        let status = Self::to_status(pod.desired_status.as_deref(), has_runtime);

        let ports = pod
            .runtime
            .and_then(|r| r.ports)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| {
                Some(PortMapping {
                    ip: p.ip?,
                    is_public: p.is_ip_public,
                    private_port: p.private_port?,
                    public_port: p.public_port?,
                    protocol: p.port_type.unwrap_or_else(|| "tcp".to_string()),
                })
            })
            .collect();

        RemotePod {
            name: pod.name.unwrap_or_else(|| pod.id.clone()),
            id: pod.id,
            status,
            desired_status: pod.desired_status.unwrap_or_else(|| "UNKNOWN".to_string()),
            cost_per_hour: pod.cost_per_hr,
            gpu_display_name: pod.machine.and_then(|m| m.gpu_display_name),
            volume_id: pod.network_volume_id,
            exposed_ports: pod.ports,
            ports,
            last_status_change: pod.last_status_change,
        }
    }

    fn cloud_type_arg(category: CloudCategory) -> &'static str {
        match category {
            CloudCategory::Community => "COMMUNITY",
            CloudCategory::Secure => "SECURE",
        }
    }
}

/// GraphQL reports unknown pods as errors rather than nulls on some paths.
fn is_not_found(err: &PodError) -> bool {
    match err {
        PodError::PlatformApi(message) => {
            let message = message.to_ascii_lowercase();
            message.contains("not found") || message.contains("does not exist")
        }
        _ => false,
    }
}

#[async_trait]
impl PodProvider for RunPod {
    async fn list_gpu_offerings(&self) -> PodResult<Vec<GpuOffering>> {
        let data: GpuTypesData = self
            .graphql(GPU_TYPES_QUERY, serde_json::json!({}))
            .await?;
        let offerings: Vec<GpuOffering> =
            data.gpu_types.iter().flat_map(Self::to_offerings).collect();
        debug!(count = offerings.len(), "Fetched GPU offerings");
        Ok(offerings)
    }

    async fn create_pod(&self, req: CreatePodRequest) -> PodResult<String> {
        info!(name = %req.name, gpu_type = %req.gpu_type_id, cloud = %req.cloud_category, "Creating pod");

        let has_volume = req.volume_id.is_some();
        let input = DeployPodInput {
            cloud_type: Self::cloud_type_arg(req.cloud_category).to_string(),
            gpu_count: 1,
            gpu_type_id: req.gpu_type_id.clone(),
            name: req.name,
            image_name: req.image,
            container_disk_in_gb: req.template.container_disk_gb,
            volume_in_gb: (!has_volume).then_some(req.template.volume_gb),
            volume_mount_path: req.template.volume_mount_path,
            ports: format!("{}/http", req.port),
            env: req
                .template
                .env
                .into_iter()
                .map(|(key, value)| EnvVar { key, value })
                .collect(),
            network_volume_id: req.volume_id,
            data_center_id: req.data_center_id,
        };

        let data: DeployPodData = self
            .graphql(DEPLOY_MUTATION, InputVariables { input })
            .await?;

        let pod = data.pod_find_and_deploy_on_demand.ok_or_else(|| {
            PodError::PlatformApi(format!(
                "no machine available for GPU type {}",
                req.gpu_type_id
            ))
        })?;

        info!(pod_id = %pod.id, status = ?pod.desired_status, "Pod created");
        Ok(pod.id)
    }

    async fn get_pod(&self, id: &str) -> PodResult<Option<RemotePod>> {
        let query = format!("query Pod($input: PodFilter!) {{ pod(input: $input) {{ {POD_FIELDS} }} }}");
        let input = PodIdInput {
            pod_id: id.to_string(),
        };

        match self.graphql::<PodData, _>(&query, InputVariables { input }).await {
            Ok(data) => Ok(data.pod.map(Self::to_remote_pod)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_pods(&self) -> PodResult<Vec<RemotePod>> {
        let query = format!("query Pods {{ myself {{ pods {{ {POD_FIELDS} }} }} }}");
        let data: PodsData = self.graphql(&query, serde_json::json!({})).await?;
        Ok(data
            .myself
            .pods
            .into_iter()
            .map(Self::to_remote_pod)
            .collect())
    }

    async fn terminate_pod(&self, id: &str) -> PodResult<()> {
        info!(pod_id = %id, "Terminating pod");
        let input = PodIdInput {
            pod_id: id.to_string(),
        };

        match self
            .graphql::<serde_json::Value, _>(TERMINATE_MUTATION, InputVariables { input })
            .await
        {
            Ok(_) => {
                info!(pod_id = %id, "Pod terminated");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                info!(pod_id = %id, "Pod already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn volume_data_center(&self, volume_id: &str) -> PodResult<Option<String>> {
        let data: VolumesData = self
            .graphql(VOLUMES_QUERY, serde_json::json!({}))
            .await?;
        Ok(data
            .myself
            .network_volumes
            .into_iter()
            .find(|v| v.id == volume_id)
            .and_then(|v| v.data_center_id))
    }
}
