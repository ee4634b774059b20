//! End-to-end lifecycle scenarios against an in-memory provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ollama_pod::config::PollSettings;
use ollama_pod::lifecycle::{PodCondition, UpOutcome, UpRequest};
use ollama_pod::providers::{CreatePodRequest, PortMapping};
use ollama_pod::{
    CloudCategory, GpuOffering, ModelReference, ModelRegistry, PodError, PodManager, PodProvider,
    PodRecord, PodResult, PodStatus, RemotePod, RemotePodStatus, StateStore,
};

/// Provider fake: pods become `settle` after `pending_polls` status calls.
struct FakeProvider {
    offerings: Vec<GpuOffering>,
    settle: RemotePodStatus,
    pending_polls: usize,
    runtime_ports: Vec<PortMapping>,
    pods: Mutex<HashMap<String, (RemotePod, usize)>>,
    calls: Mutex<Vec<&'static str>>,
    created: Mutex<Vec<CreatePodRequest>>,
    next_id: AtomicUsize,
}

impl FakeProvider {
    fn new(settle: RemotePodStatus) -> Self {
        Self {
            offerings: vec![
                offering("NVIDIA RTX A4000", 16, 0.40, CloudCategory::Community),
                offering("NVIDIA RTX A5000", 24, 0.35, CloudCategory::Community),
                offering("NVIDIA L4", 24, 0.35, CloudCategory::Secure),
                offering("NVIDIA RTX A6000", 48, 0.49, CloudCategory::Secure),
            ],
            settle,
            pending_polls: 1,
            runtime_ports: Vec::new(),
            pods: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    fn serving_on(mut self, server: &MockServer) -> Self {
        self.runtime_ports = vec![PortMapping {
            ip: "127.0.0.1".to_string(),
            is_public: true,
            private_port: 11434,
            public_port: server.address().port(),
            protocol: "tcp".to_string(),
        }];
        self
    }

    fn insert_pod(&self, pod: RemotePod) {
        let polls = self.pending_polls.saturating_add(1);
        self.pods.lock().unwrap().insert(pod.id.clone(), (pod, polls));
    }

    fn remove_pod(&self, id: &str) {
        self.pods.lock().unwrap().remove(id);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

fn offering(id: &str, vram_gb: u32, cost: f64, cloud: CloudCategory) -> GpuOffering {
    GpuOffering {
        type_id: id.to_string(),
        display_name: id.to_string(),
        vram_gb,
        cost_per_hour: cost,
        cloud_category: cloud,
        availability_count: 3,
    }
}

fn remote_pod(id: &str, name: &str, status: RemotePodStatus) -> RemotePod {
    RemotePod {
        id: id.to_string(),
        name: name.to_string(),
        status,
        desired_status: match status {
            RemotePodStatus::Running | RemotePodStatus::Pending => "RUNNING",
            RemotePodStatus::Exited => "EXITED",
            RemotePodStatus::Terminated => "TERMINATED",
            RemotePodStatus::Unknown => "UNKNOWN",
        }
        .to_string(),
        cost_per_hour: Some(0.35),
        gpu_display_name: Some("RTX A5000".to_string()),
        volume_id: None,
        exposed_ports: Some("11434/http".to_string()),
        ports: Vec::new(),
        last_status_change: None,
    }
}

#[async_trait]
impl PodProvider for FakeProvider {
    async fn list_gpu_offerings(&self) -> PodResult<Vec<GpuOffering>> {
        self.record("list_gpu_offerings");
        Ok(self.offerings.clone())
    }

    async fn create_pod(&self, req: CreatePodRequest) -> PodResult<String> {
        self.record("create_pod");
        let id = format!("pod-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let pod = remote_pod(&id, &req.name, RemotePodStatus::Pending);
        self.pods.lock().unwrap().insert(id.clone(), (pod, 0));
        self.created.lock().unwrap().push(req);
        Ok(id)
    }

    async fn get_pod(&self, id: &str) -> PodResult<Option<RemotePod>> {
        self.record("get_pod");
        let mut pods = self.pods.lock().unwrap();
        let Some((pod, polls)) = pods.get_mut(id) else {
            return Ok(None);
        };
        *polls += 1;
        if *polls > self.pending_polls && pod.status == RemotePodStatus::Pending {
            pod.status = self.settle;
            pod.desired_status = remote_pod(id, "", self.settle).desired_status;
            if self.settle == RemotePodStatus::Running {
                pod.ports = self.runtime_ports.clone();
            }
        }
        Ok(Some(pod.clone()))
    }

    async fn list_pods(&self) -> PodResult<Vec<RemotePod>> {
        self.record("list_pods");
        let mut pods: Vec<RemotePod> = self
            .pods
            .lock()
            .unwrap()
            .values()
            .map(|(p, _)| p.clone())
            .collect();
        pods.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pods)
    }

    async fn terminate_pod(&self, id: &str) -> PodResult<()> {
        self.record("terminate_pod");
        self.pods.lock().unwrap().remove(id);
        Ok(())
    }

    async fn volume_data_center(&self, volume_id: &str) -> PodResult<Option<String>> {
        self.record("volume_data_center");
        Ok((volume_id == "vol-abc").then(|| "EU-RO-1".to_string()))
    }
}

/// Registry fake returning a fixed size, or not-found.
struct FakeRegistry {
    bytes: Option<u64>,
    calls: AtomicUsize,
}

impl FakeRegistry {
    fn sized(bytes: u64) -> Self {
        Self {
            bytes: Some(bytes),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelRegistry for FakeRegistry {
    async fn model_size_bytes(&self, model: &ModelReference) -> PodResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bytes.ok_or_else(|| PodError::RegistryLookup {
            model: model.to_string(),
            reason: "model not found (registry returned 404)".to_string(),
        })
    }
}

fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(10),
        ready_timeout: Duration::from_millis(300),
        pull_timeout: Duration::from_secs(5),
    }
}

struct Harness {
    _temp_dir: TempDir,
    provider: Arc<FakeProvider>,
    registry: Arc<FakeRegistry>,
    manager: PodManager,
}

fn harness(provider: FakeProvider) -> Harness {
    harness_with_registry(provider, FakeRegistry::sized(4_000_000_000))
}

fn harness_with_registry(provider: FakeProvider, registry: FakeRegistry) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let provider = Arc::new(provider);
    let registry = Arc::new(registry);
    let manager = PodManager::new(
        provider.clone(),
        registry.clone(),
        StateStore::new(temp_dir.path().join("pods")),
    )
    .with_poll(fast_poll())
    .with_http_timeout(Duration::from_secs(2));

    Harness {
        _temp_dir: temp_dir,
        provider,
        registry,
        manager,
    }
}

async fn ollama_server(pull_body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "version": "0.5.7" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(pull_body.to_string(), "application/x-ndjson"),
        )
        .mount(&server)
        .await;
    server
}

const PULL_OK: &str = "{\"status\":\"pulling manifest\"}\n{\"status\":\"success\"}\n";

#[tokio::test]
async fn test_dry_run_selects_without_creating() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));

    let mut req = UpRequest::new("default", "qwen2.5:7b");
    req.dry_run = true;

    let outcome = h.manager.up(&req).await.unwrap();
    let UpOutcome::Planned(plan) = outcome else {
        panic!("expected a plan");
    };

    assert_eq!(plan.vram.required_gb(), 5);
    assert_eq!(plan.offering.type_id, "NVIDIA RTX A5000");
    assert_eq!(h.provider.count("create_pod"), 0);
    assert!(h.manager.store().get("default").unwrap().is_none());
    assert!(h.manager.store().names().unwrap().is_empty());
}

#[tokio::test]
async fn test_selection_scenario_prefers_cheapest_then_smallest() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));

    let mut req = UpRequest::new("default", "any-model");
    req.vram_gb = Some(20);
    req.dry_run = true;

    let UpOutcome::Planned(plan) = h.manager.up(&req).await.unwrap() else {
        panic!("expected a plan");
    };
    assert_eq!(plan.offering.vram_gb, 24);
    assert!((plan.offering.cost_per_hour - 0.35).abs() < f64::EPSILON);
    // first of the tied offerings in catalog order
    assert_eq!(plan.offering.type_id, "NVIDIA RTX A5000");
    assert_eq!(h.registry.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_up_reaches_ready() {
    let server = ollama_server(PULL_OK).await;
    let h = harness(FakeProvider::new(RemotePodStatus::Running).serving_on(&server));

    let outcome = h.manager.up(&UpRequest::new("default", "qwen2.5:7b")).await.unwrap();
    let UpOutcome::Ready { record, .. } = outcome else {
        panic!("expected a ready pod");
    };

    assert_eq!(record.status, PodStatus::Ready);
    assert_eq!(
        record.endpoint_url.as_deref(),
        Some(format!("http://127.0.0.1:{}", server.address().port()).as_str())
    );
    assert_eq!(record.gpu_type_id, "NVIDIA RTX A5000");

    let stored = h.manager.store().get("default").unwrap().unwrap();
    assert_eq!(stored, record);

    let created = h.provider.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].port, 11434);
    assert_eq!(created[0].image, "ollama/ollama");
}

#[tokio::test]
async fn test_duplicate_name_makes_no_platform_calls() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    let existing = PodRecord::provisioning("default", "pod-99", "llama3", "NVIDIA L4", 0.35, None);
    h.manager.store().put(&existing).unwrap();

    let err = h
        .manager
        .up(&UpRequest::new("default", "qwen2.5:7b"))
        .await
        .unwrap_err();

    assert!(matches!(err, PodError::DuplicatePod { ref pod_id, .. } if pod_id == "pod-99"));
    assert!(h.provider.calls().is_empty());
    assert_eq!(h.registry.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.manager.store().get("default").unwrap().unwrap(), existing);
}

#[tokio::test]
async fn test_errored_record_can_be_replaced() {
    let server = ollama_server(PULL_OK).await;
    let h = harness(FakeProvider::new(RemotePodStatus::Running).serving_on(&server));
    let mut old = PodRecord::provisioning("default", "pod-old", "llama3", "NVIDIA L4", 0.35, None);
    old.status = PodStatus::Error;
    h.manager.store().put(&old).unwrap();

    h.manager.up(&UpRequest::new("default", "qwen2.5:7b")).await.unwrap();

    let stored = h.manager.store().get("default").unwrap().unwrap();
    assert_eq!(stored.status, PodStatus::Ready);
    assert_ne!(stored.pod_id, "pod-old");
}

#[tokio::test]
async fn test_readiness_timeout_leaves_pod_running() {
    let mut provider = FakeProvider::new(RemotePodStatus::Running);
    provider.pending_polls = usize::MAX;
    let h = harness(provider);

    let err = h
        .manager
        .up(&UpRequest::new("default", "qwen2.5:7b"))
        .await
        .unwrap_err();
    assert!(matches!(err, PodError::ProvisioningTimeout { .. }));

    let stored = h.manager.store().get("default").unwrap().unwrap();
    assert_eq!(stored.status, PodStatus::Error);
    assert!(stored.last_error.is_some());
    assert_eq!(h.provider.count("terminate_pod"), 0);

    // the pod is still there for a later status
    let reports = h.manager.status(Some("default")).await.unwrap();
    assert!(matches!(reports[0].condition, Some(PodCondition::Live(_))));
}

#[tokio::test]
async fn test_terminal_failure_marks_error() {
    let h = harness(FakeProvider::new(RemotePodStatus::Exited));

    let err = h
        .manager
        .up(&UpRequest::new("default", "qwen2.5:7b"))
        .await
        .unwrap_err();
    assert!(matches!(err, PodError::PodProvisioningFailed { ref status, .. } if status == "EXITED"));

    let stored = h.manager.store().get("default").unwrap().unwrap();
    assert_eq!(stored.status, PodStatus::Error);
    assert_eq!(h.provider.count("terminate_pod"), 0);
}

#[tokio::test]
async fn test_pull_failure_keeps_pod_and_endpoint() {
    let server = ollama_server("{\"error\":\"pull model manifest: file does not exist\"}\n").await;
    let h = harness(FakeProvider::new(RemotePodStatus::Running).serving_on(&server));

    let err = h
        .manager
        .up(&UpRequest::new("default", "nope:1b"))
        .await
        .unwrap_err();
    assert!(matches!(err, PodError::ModelPullFailed { .. }));

    let stored = h.manager.store().get("default").unwrap().unwrap();
    assert_eq!(stored.status, PodStatus::Error);
    assert!(stored.endpoint_url.is_some());
    assert_eq!(h.provider.count("terminate_pod"), 0);
}

#[tokio::test]
async fn test_registry_failure_stops_before_platform() {
    let h = harness_with_registry(
        FakeProvider::new(RemotePodStatus::Running),
        FakeRegistry {
            bytes: None,
            calls: AtomicUsize::new(0),
        },
    );

    let err = h
        .manager
        .up(&UpRequest::new("default", "nonexistent:v1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PodError::RegistryLookup { .. }));
    assert_eq!(h.provider.count("create_pod"), 0);
    assert!(h.manager.store().get("default").unwrap().is_none());
}

#[tokio::test]
async fn test_explicit_gpu_too_small() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));

    let mut req = UpRequest::new("default", "qwen2.5:7b");
    req.vram_gb = Some(30);
    req.gpu_type = Some("NVIDIA RTX A5000".to_string());

    let err = h.manager.up(&req).await.unwrap_err();
    assert!(matches!(err, PodError::InsufficientVram { .. }));
    assert_eq!(h.provider.count("create_pod"), 0);
}

#[tokio::test]
async fn test_volume_is_pinned_and_preserved() {
    let server = ollama_server(PULL_OK).await;
    let h = harness(FakeProvider::new(RemotePodStatus::Running).serving_on(&server));

    let mut req = UpRequest::new("cached", "qwen2.5:7b");
    req.volume_id = Some("vol-abc".to_string());
    h.manager.up(&req).await.unwrap();

    {
        let created = h.provider.created.lock().unwrap();
        assert_eq!(created[0].volume_id.as_deref(), Some("vol-abc"));
        assert_eq!(created[0].data_center_id.as_deref(), Some("EU-RO-1"));
    }

    let outcome = h.manager.down("cached").await.unwrap();
    assert!(!outcome.already_gone);
    assert_eq!(outcome.record.volume_id.as_deref(), Some("vol-abc"));
    assert_eq!(h.provider.count("terminate_pod"), 1);
    assert!(h.manager.store().get("cached").unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_name_is_rejected() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));

    let err = h
        .manager
        .up(&UpRequest::new("../escape", "qwen2.5:7b"))
        .await
        .unwrap_err();
    assert!(matches!(err, PodError::InvalidPodName(_)));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_down_unknown_name() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    h.manager
        .store()
        .put(&PodRecord::provisioning("other", "pod-7", "llama3", "NVIDIA L4", 0.35, None))
        .unwrap();

    let err = h.manager.down("default").await.unwrap_err();
    match err {
        PodError::PodNotFound { tracked, .. } => assert_eq!(tracked, vec!["other".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_down_when_remote_already_gone() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    h.manager
        .store()
        .put(&PodRecord::provisioning("default", "pod-gone", "llama3", "NVIDIA L4", 0.35, None))
        .unwrap();

    let outcome = h.manager.down("default").await.unwrap();
    assert!(outcome.already_gone);
    assert_eq!(h.provider.count("terminate_pod"), 0);
    assert!(h.manager.store().get("default").unwrap().is_none());
}

#[tokio::test]
async fn test_down_terminates_live_pod() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    h.provider
        .insert_pod(remote_pod("pod-live", "default", RemotePodStatus::Running));
    h.manager
        .store()
        .put(&PodRecord::provisioning("default", "pod-live", "llama3", "NVIDIA L4", 0.35, None))
        .unwrap();

    let outcome = h.manager.down("default").await.unwrap();
    assert!(!outcome.already_gone);
    assert_eq!(h.provider.count("terminate_pod"), 1);
    assert!(h.manager.store().get("default").unwrap().is_none());
}

#[tokio::test]
async fn test_status_reports_stale_without_deleting() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    h.provider
        .insert_pod(remote_pod("pod-live", "live", RemotePodStatus::Running));
    h.manager
        .store()
        .put(&PodRecord::provisioning("live", "pod-live", "llama3", "NVIDIA L4", 0.35, None))
        .unwrap();
    h.manager
        .store()
        .put(&PodRecord::provisioning("stale", "pod-gone", "llama3", "NVIDIA L4", 0.35, None))
        .unwrap();

    let reports = h.manager.status(None).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].name, "live");
    assert!(matches!(reports[0].condition, Some(PodCondition::Live(_))));
    assert_eq!(reports[1].name, "stale");
    assert!(matches!(
        reports[1].condition,
        Some(PodCondition::Stale { remote_status: None })
    ));

    // read-only
    assert!(h.manager.store().get("stale").unwrap().is_some());
    assert_eq!(h.provider.count("terminate_pod"), 0);

    // removing the live pod remotely turns it stale too
    h.provider.remove_pod("pod-live");
    let reports = h.manager.status(Some("live")).await.unwrap();
    assert!(matches!(reports[0].condition, Some(PodCondition::Stale { .. })));
}

#[tokio::test]
async fn test_status_isolates_corrupt_records() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    h.provider
        .insert_pod(remote_pod("pod-1", "good", RemotePodStatus::Running));
    h.manager
        .store()
        .put(&PodRecord::provisioning("good", "pod-1", "llama3", "NVIDIA L4", 0.35, None))
        .unwrap();
    std::fs::write(h.manager.store().root().join("broken.json"), "{").unwrap();

    let reports = h.manager.status(None).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0].record, Err(PodError::CorruptState { .. })));
    assert!(reports[0].condition.is_none());
    assert!(matches!(reports[1].condition, Some(PodCondition::Live(_))));

    let err = h.manager.status(Some("broken")).await.unwrap_err();
    assert!(matches!(err, PodError::CorruptState { .. }));

    // other names keep working
    h.manager.down("good").await.unwrap();
}

#[tokio::test]
async fn test_status_unknown_name() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    let err = h.manager.status(Some("nope")).await.unwrap_err();
    assert!(matches!(err, PodError::PodNotFound { .. }));
}

#[tokio::test]
async fn test_sync_adopts_untracked_ollama_pods() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    h.provider
        .insert_pod(remote_pod("pod-a", "default", RemotePodStatus::Running));
    h.provider
        .insert_pod(remote_pod("pod-b", "tracked", RemotePodStatus::Running));
    let mut other = remote_pod("pod-c", "jupyter", RemotePodStatus::Running);
    other.exposed_ports = Some("8888/http".to_string());
    h.provider.insert_pod(other);
    h.provider
        .insert_pod(remote_pod("pod-d", "old", RemotePodStatus::Exited));

    h.manager
        .store()
        .put(&PodRecord::provisioning("tracked", "pod-b", "llama3", "NVIDIA L4", 0.35, None))
        .unwrap();

    let adopted = h.manager.sync().await.unwrap();
    assert_eq!(adopted.len(), 1);
    assert_eq!(adopted[0].name, "default");
    assert_eq!(adopted[0].pod_id, "pod-a");
    assert_eq!(adopted[0].status, PodStatus::Ready);
    assert_eq!(
        adopted[0].endpoint_url.as_deref(),
        Some("https://pod-a-11434.proxy.runpod.net")
    );

    // second run finds nothing new
    assert!(h.manager.sync().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_targets_selected_cloud() {
    let server = ollama_server(PULL_OK).await;
    let h = harness(FakeProvider::new(RemotePodStatus::Running).serving_on(&server));

    let UpOutcome::Ready { plan, record } = h
        .manager
        .up(&UpRequest::new("default", "qwen2.5:7b"))
        .await
        .unwrap()
    else {
        panic!("expected a ready pod");
    };
    assert_eq!(plan.offering.cloud_category, CloudCategory::Community);
    assert!((record.cost_per_hour - plan.offering.cost_per_hour).abs() < f64::EPSILON);

    let mut req = UpRequest::new("secure", "qwen2.5:7b");
    req.cloud_type = ollama_pod::CloudType::Secure;
    h.manager.up(&req).await.unwrap();

    let created = h.provider.created.lock().unwrap();
    assert_eq!(created[0].cloud_category, CloudCategory::Community);
    assert_eq!(created[1].cloud_category, CloudCategory::Secure);
    assert_eq!(created[1].gpu_type_id, "NVIDIA L4");
}

#[tokio::test]
async fn test_interrupted_up_keeps_record_and_pod() {
    let mut provider = FakeProvider::new(RemotePodStatus::Running);
    provider.pending_polls = usize::MAX;
    let h = harness(provider);

    let req = UpRequest::new("default", "qwen2.5:7b");
    let interrupted = tokio::time::timeout(Duration::from_millis(100), h.manager.up(&req)).await;
    assert!(interrupted.is_err());

    let stored = h.manager.store().get("default").unwrap().unwrap();
    assert_eq!(stored.status, PodStatus::Provisioning);
    assert!(stored.last_error.is_none());
    assert_eq!(h.provider.count("create_pod"), 1);
    assert_eq!(h.provider.count("terminate_pod"), 0);

    let reports = h.manager.status(Some("default")).await.unwrap();
    assert!(matches!(reports[0].condition, Some(PodCondition::Live(_))));

    // the name stays taken until `down`
    let err = h.manager.up(&req).await.unwrap_err();
    assert!(matches!(err, PodError::DuplicatePod { .. }));
}

#[tokio::test]
async fn test_sync_leaves_pods_of_unreadable_records() {
    let h = harness(FakeProvider::new(RemotePodStatus::Running));
    h.provider
        .insert_pod(remote_pod("pod-a", "renamed", RemotePodStatus::Running));
    h.provider
        .insert_pod(remote_pod("pod-b", "fresh", RemotePodStatus::Running));

    // pod-a was adopted under its ID earlier and that record is now corrupt
    std::fs::create_dir_all(h.manager.store().root()).unwrap();
    let corrupt = h.manager.store().root().join("pod-a.json");
    std::fs::write(&corrupt, "{").unwrap();

    let adopted = h.manager.sync().await.unwrap();
    assert_eq!(adopted.len(), 1);
    assert_eq!(adopted[0].pod_id, "pod-b");
    assert!(h.manager.store().get("renamed").unwrap().is_none());
    assert_eq!(std::fs::read_to_string(&corrupt).unwrap(), "{");
}
