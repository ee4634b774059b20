//! Pod lifecycle: create, wait, pull, track, reconcile, tear down.
//!
//! ```text
//! absent ──create──► provisioning ──running + healthy + pulled──► ready
//!                         │                                        │
//!                         └──failure / timeout──► error            │
//!                                                   │              │
//!                                                   └────down──────┴──► absent
//! ```
//!
//! A `provisioning` record is written as soon as the platform returns a pod
//! ID, before any waiting. Failures after that point mark the record `error`
//! and leave the remote pod running; only `down` terminates pods.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{
    PodTemplate, PollSettings, DEFAULT_HTTP_TIMEOUT_SECS, OLLAMA_IMAGE, OLLAMA_PORT,
    RUNPOD_PROXY_DOMAIN,
};
use crate::error::{PodError, PodResult};
use crate::ollama::OllamaClient;
use crate::providers::{
    CloudType, CreatePodRequest, GpuOffering, PodProvider, RemotePod, RemotePodStatus,
};
use crate::registry::{ModelReference, ModelRegistry};
use crate::selector::select_offering;
use crate::state::{validate_name, PodRecord, PodStatus, StateStore};
use crate::vram::{self, VramRequirement};

/// Model recorded for pods adopted by `sync`.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Arguments of `up`.
#[derive(Debug, Clone)]
pub struct UpRequest {
    /// Tracking name.
    pub name: String,
    /// Model to pull.
    pub model: String,
    /// VRAM override in whole GB; skips the registry.
    pub vram_gb: Option<u32>,
    /// Explicit GPU type.
    pub gpu_type: Option<String>,
    /// Network volume to attach.
    pub volume_id: Option<String>,
    /// Cloud filter.
    pub cloud_type: CloudType,
    /// Container image; defaults to [`OLLAMA_IMAGE`].
    pub image: Option<String>,
    /// Estimate and select only.
    pub dry_run: bool,
}

impl UpRequest {
    /// Request with defaults for everything but name and model.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            vram_gb: None,
            gpu_type: None,
            volume_id: None,
            cloud_type: CloudType::Any,
            image: None,
            dry_run: false,
        }
    }
}

/// What `up` would do: estimate plus selection.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Tracking name.
    pub name: String,
    /// Parsed model reference.
    pub model: ModelReference,
    /// Container image.
    pub image: String,
    /// VRAM requirement and its source.
    pub vram: VramRequirement,
    /// Chosen offering.
    pub offering: GpuOffering,
    /// Network volume to attach.
    pub volume_id: Option<String>,
    /// Datacenter the volume pins the pod to.
    pub data_center_id: Option<String>,
}

/// Result of `up`.
#[derive(Debug, Clone)]
pub enum UpOutcome {
    /// Dry run: nothing was created.
    Planned(Plan),
    /// Pod running with the model pulled.
    Ready {
        /// Plan that was executed.
        plan: Plan,
        /// Final record.
        record: PodRecord,
    },
}

/// Reconciled view of one tracked name.
#[derive(Debug, Clone)]
pub enum PodCondition {
    /// The platform still knows the pod.
    Live(RemotePod),
    /// The platform reports the pod gone; the local record is left in place.
    Stale {
        /// Last status seen, if the platform still lists the pod.
        remote_status: Option<RemotePodStatus>,
    },
}

/// One line of `status`.
#[derive(Debug)]
pub struct StatusReport {
    /// Tracking name.
    pub name: String,
    /// The local record, or why it could not be read.
    pub record: PodResult<PodRecord>,
    /// Reconciled condition; `None` when the record is unreadable.
    pub condition: Option<PodCondition>,
}

/// Result of `down`.
#[derive(Debug, Clone)]
pub struct DownOutcome {
    /// The record that was removed.
    pub record: PodRecord,
    /// The platform no longer had the pod; only the record was removed.
    pub already_gone: bool,
}

/// HTTP endpoint for the pod's Ollama port.
///
/// Prefers a public TCP mapping, falling back to the platform's HTTPS proxy.
#[must_use]
pub fn resolve_endpoint(pod: &RemotePod, port: u16, proxy_domain: &str) -> String {
    pod.direct_endpoint(port)
        .unwrap_or_else(|| proxy_endpoint(&pod.id, port, proxy_domain))
}

/// `https://<pod_id>-<port>.<proxy_domain>`.
#[must_use]
pub fn proxy_endpoint(pod_id: &str, port: u16, proxy_domain: &str) -> String {
    format!("https://{pod_id}-{port}.{proxy_domain}")
}

/// Orchestrates the pod lifecycle against a provider, registry and store.
pub struct PodManager {
    provider: Arc<dyn PodProvider>,
    registry: Arc<dyn ModelRegistry>,
    store: StateStore,
    poll: PollSettings,
    template: PodTemplate,
    proxy_domain: String,
    http_timeout: Duration,
}

impl PodManager {
    /// Create a manager with default timing and pod template.
    pub fn new(
        provider: Arc<dyn PodProvider>,
        registry: Arc<dyn ModelRegistry>,
        store: StateStore,
    ) -> Self {
        Self {
            provider,
            registry,
            store,
            poll: PollSettings::default(),
            template: PodTemplate::default(),
            proxy_domain: RUNPOD_PROXY_DOMAIN.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Override polling behaviour.
    #[must_use]
    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Override the per-request HTTP timeout used against the pod.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Override the pod template.
    #[must_use]
    pub fn with_template(mut self, template: PodTemplate) -> Self {
        self.template = template;
        self
    }

    /// The state store.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Fail with `DuplicatePod` if `name` is tracked by a live record.
    fn ensure_name_free(&self, name: &str) -> PodResult<()> {
        if let Some(existing) = self.store.get(name)? {
            if existing.status.is_live() {
                return Err(PodError::DuplicatePod {
                    name: name.to_string(),
                    pod_id: existing.pod_id,
                    status: existing.status.to_string(),
                });
            }
            warn!(
                name = %name,
                pod_id = %existing.pod_id,
                "Replacing errored record; its pod is no longer tracked"
            );
        }
        Ok(())
    }

    /// Estimate VRAM and select a GPU without creating anything.
    ///
    /// # Errors
    /// Returns registry, catalog and selection errors.
    pub async fn plan(&self, req: &UpRequest) -> PodResult<Plan> {
        let model = ModelReference::parse(&req.model)?;
        let vram = vram::estimate(self.registry.as_ref(), &model, req.vram_gb).await?;

        let data_center_id = match &req.volume_id {
            Some(volume_id) => {
                let dc = self.provider.volume_data_center(volume_id).await?;
                match &dc {
                    Some(dc) => info!(volume_id = %volume_id, data_center = %dc, "Volume pinned to datacenter"),
                    None => warn!(volume_id = %volume_id, "Could not resolve datacenter for volume"),
                }
                dc
            }
            None => None,
        };

        let offering = select_offering(
            self.provider.as_ref(),
            vram.required_gb(),
            req.cloud_type,
            req.gpu_type.as_deref(),
        )
        .await?;

        Ok(Plan {
            name: req.name.clone(),
            model,
            image: req.image.clone().unwrap_or_else(|| OLLAMA_IMAGE.to_string()),
            vram,
            offering,
            volume_id: req.volume_id.clone(),
            data_center_id,
        })
    }

    /// Bring a pod up: plan, create, wait for readiness, pull the model.
    ///
    /// # Errors
    /// Returns `DuplicatePod` before any network call if the name is live.
    /// After creation, failures mark the record `error` and leave the pod
    /// running.
    pub async fn up(&self, req: &UpRequest) -> PodResult<UpOutcome> {
        validate_name(&req.name)?;
        self.ensure_name_free(&req.name)?;

        let plan = self.plan(req).await?;
        if req.dry_run {
            info!(name = %req.name, "Dry run, not creating a pod");
            return Ok(UpOutcome::Planned(plan));
        }

        let pod_id = self
            .provider
            .create_pod(CreatePodRequest {
                name: plan.name.clone(),
                image: plan.image.clone(),
                gpu_type_id: plan.offering.type_id.clone(),
                cloud_category: plan.offering.cloud_category,
                port: OLLAMA_PORT,
                volume_id: plan.volume_id.clone(),
                data_center_id: plan.data_center_id.clone(),
                template: self.template.clone(),
            })
            .await?;

        let mut record = PodRecord::provisioning(
            &plan.name,
            &pod_id,
            plan.model.as_str(),
            &plan.offering.type_id,
            plan.offering.cost_per_hour,
            plan.volume_id.clone(),
        );
        self.store.put(&record)?;
        info!(name = %record.name, pod_id = %pod_id, "Tracking new pod");

        match self.provision(&mut record, &plan.model).await {
            Ok(()) => {
                record.status = PodStatus::Ready;
                record.last_error = None;
                self.store.put(&record)?;
                info!(name = %record.name, endpoint = ?record.endpoint_url, "Pod ready");
                Ok(UpOutcome::Ready { plan, record })
            }
            Err(err) => {
                self.mark_error(&mut record, &err);
                Err(err)
            }
        }
    }

    /// Readiness, health and pull for a created pod.
    async fn provision(&self, record: &mut PodRecord, model: &ModelReference) -> PodResult<()> {
        let deadline = Instant::now() + self.poll.ready_timeout;

        let pod = self.wait_running(&record.pod_id, deadline).await?;
        let endpoint = resolve_endpoint(&pod, OLLAMA_PORT, &self.proxy_domain);
        record.endpoint_url = Some(endpoint.clone());
        self.store.put(record)?;

        let ollama = OllamaClient::new(&endpoint, self.http_timeout)
            .map_err(|e| PodError::Config(e.to_string()))?;
        self.wait_healthy(&record.pod_id, &ollama, deadline).await?;

        info!(pod_id = %record.pod_id, model = %model, "Pulling model");
        ollama
            .pull(model.as_str(), self.poll.pull_timeout)
            .await
            .map_err(|e| PodError::ModelPullFailed {
                pod_id: record.pod_id.clone(),
                model: model.to_string(),
                reason: e.to_string(),
            })
    }

    fn timeout_error(&self, pod_id: &str) -> PodError {
        PodError::ProvisioningTimeout {
            pod_id: pod_id.to_string(),
            timeout_secs: self.poll.ready_timeout.as_secs(),
        }
    }

    /// Poll the platform until the pod is running.
    async fn wait_running(&self, pod_id: &str, deadline: Instant) -> PodResult<RemotePod> {
        let start = Instant::now();
        loop {
            let pod = self.provider.get_pod(pod_id).await?.ok_or_else(|| {
                PodError::PodProvisioningFailed {
                    pod_id: pod_id.to_string(),
                    status: "gone".to_string(),
                }
            })?;

            debug!(
                pod_id = %pod_id,
                status = %pod.status,
                elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Polling pod status"
            );

            if pod.status == RemotePodStatus::Running {
                info!(pod_id = %pod_id, "Pod is running");
                return Ok(pod);
            }
            if pod.status.is_terminal_failure() {
                return Err(PodError::PodProvisioningFailed {
                    pod_id: pod_id.to_string(),
                    status: pod.desired_status,
                });
            }
            if Instant::now() >= deadline {
                return Err(self.timeout_error(pod_id));
            }

            tokio::time::sleep(self.poll.interval).await;
        }
    }

    /// Poll the pod's Ollama service until it answers.
    async fn wait_healthy(
        &self,
        pod_id: &str,
        ollama: &OllamaClient,
        deadline: Instant,
    ) -> PodResult<()> {
        loop {
            if ollama.is_healthy().await {
                info!(pod_id = %pod_id, endpoint = %ollama.base_url(), "Ollama is responding");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(self.timeout_error(pod_id));
            }
            tokio::time::sleep(self.poll.interval).await;
        }
    }

    /// Persist the `error` status. The original error is what the caller sees.
    fn mark_error(&self, record: &mut PodRecord, err: &PodError) {
        record.status = PodStatus::Error;
        record.last_error = Some(err.to_string());
        if let Err(e) = self.store.put(record) {
            warn!(name = %record.name, error = %e, "Failed to record error status");
        }
        warn!(name = %record.name, pod_id = %record.pod_id, error = %err, "Provisioning stopped; pod left running");
    }

    /// Compare one record against the platform.
    async fn reconcile(&self, record: &PodRecord) -> PodResult<PodCondition> {
        let condition = match self.provider.get_pod(&record.pod_id).await? {
            None => PodCondition::Stale {
                remote_status: None,
            },
            Some(pod) if pod.status == RemotePodStatus::Terminated => PodCondition::Stale {
                remote_status: Some(pod.status),
            },
            Some(pod) => PodCondition::Live(pod),
        };

        if let PodCondition::Stale { .. } = condition {
            warn!(name = %record.name, pod_id = %record.pod_id, "Tracked pod no longer exists on the platform");
        }
        Ok(condition)
    }

    /// Reconciled status for one name, or for every tracked name.
    ///
    /// Never modifies the store.
    ///
    /// # Errors
    /// For a single name: `PodNotFound` or `CorruptState`. Platform errors in
    /// either mode.
    pub async fn status(&self, name: Option<&str>) -> PodResult<Vec<StatusReport>> {
        let entries: Vec<(String, PodResult<PodRecord>)> = match name {
            Some(name) => {
                let record = self.store.get(name)?.ok_or_else(|| PodError::PodNotFound {
                    name: name.to_string(),
                    tracked: self.store.names().unwrap_or_default(),
                })?;
                vec![(name.to_string(), Ok(record))]
            }
            None => self.store.list()?,
        };

        let mut reports = Vec::with_capacity(entries.len());
        for (name, record) in entries {
            let condition = match &record {
                Ok(record) => Some(self.reconcile(record).await?),
                Err(e) => {
                    warn!(name = %name, error = %e, "Skipping unreadable record");
                    None
                }
            };
            reports.push(StatusReport {
                name,
                record,
                condition,
            });
        }
        Ok(reports)
    }

    /// Terminate the pod tracked as `name` and forget it.
    ///
    /// Network volumes are never deleted. If the platform no longer has the
    /// pod, the stale record is removed without error.
    ///
    /// # Errors
    /// `PodNotFound` when nothing is tracked under `name`, `CorruptState` for
    /// an unreadable record, platform errors from the terminate call.
    pub async fn down(&self, name: &str) -> PodResult<DownOutcome> {
        let record = self.store.get(name)?.ok_or_else(|| PodError::PodNotFound {
            name: name.to_string(),
            tracked: self.store.names().unwrap_or_default(),
        })?;

        let remote = self.provider.get_pod(&record.pod_id).await?;
        let already_gone = remote
            .as_ref()
            .map_or(true, |pod| pod.status == RemotePodStatus::Terminated);

        if already_gone {
            info!(name = %name, pod_id = %record.pod_id, "Pod already gone, removing stale record");
        } else {
            self.provider.terminate_pod(&record.pod_id).await?;
        }

        self.store.delete(name)?;
        if let Some(volume_id) = &record.volume_id {
            info!(volume_id = %volume_id, "Network volume preserved");
        }

        Ok(DownOutcome {
            record,
            already_gone,
        })
    }

    /// Start tracking running Ollama pods that have no record yet.
    ///
    /// Existing records, readable or not, are never overwritten. Pods whose
    /// name or ID matches an unreadable record are left alone.
    ///
    /// # Errors
    /// Platform errors and store write failures.
    pub async fn sync(&self) -> PodResult<Vec<PodRecord>> {
        let mut tracked_ids = Vec::new();
        let mut unreadable = Vec::new();
        for (name, record) in self.store.list()? {
            match record {
                Ok(record) => tracked_ids.push(record.pod_id),
                Err(_) => unreadable.push(name),
            }
        }
        if !unreadable.is_empty() {
            warn!(records = ?unreadable, "Unreadable records; pods they track cannot be matched by ID");
        }
        let mut taken = self.store.names()?;

        let mut adopted = Vec::new();
        for pod in self.provider.list_pods().await? {
            let active = matches!(pod.status, RemotePodStatus::Running | RemotePodStatus::Pending);
            if !active || !pod.exposes_port(OLLAMA_PORT) || tracked_ids.contains(&pod.id) {
                continue;
            }
            if unreadable.contains(&pod.id) || unreadable.contains(&pod.name) {
                warn!(pod_id = %pod.id, name = %pod.name, "Pod may be tracked by an unreadable record, skipping");
                continue;
            }

            let name = if validate_name(&pod.name).is_ok() {
                pod.name.clone()
            } else {
                pod.id.clone()
            };
            if validate_name(&name).is_err() || taken.contains(&name) {
                warn!(pod_id = %pod.id, name = %name, "Cannot adopt pod under this name, skipping");
                continue;
            }

            let mut record = PodRecord::provisioning(
                &name,
                &pod.id,
                UNKNOWN_MODEL,
                pod.gpu_display_name.clone().unwrap_or_else(|| "unknown".to_string()),
                pod.cost_per_hour.unwrap_or(0.0),
                pod.volume_id.clone(),
            );
            if pod.status == RemotePodStatus::Running {
                record.endpoint_url = Some(resolve_endpoint(&pod, OLLAMA_PORT, &self.proxy_domain));
                record.status = PodStatus::Ready;
            }

            self.store.put(&record)?;
            info!(name = %name, pod_id = %pod.id, "Adopted pod");
            taken.push(name);
            adopted.push(record);
        }

        Ok(adopted)
    }
}
