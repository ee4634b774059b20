//! Rent a GPU pod, run Ollama on it, and keep track of it.
//!
//! This crate holds the decision-making behind the `ollama-pod` CLI: how much
//! VRAM a model needs, which GPU offering to rent, and how to drive a pod
//! from creation to a pulled model and back to nothing without losing track
//! of a billable resource.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!   up/status/ ──►│  PodManager  │──────────────► StateStore (one JSON file per name)
//!   down/sync     └──────┬───────┘
//!                        │
//!        ┌───────────────┼──────────────────────┐
//!        ▼               ▼                      ▼
//!  ModelRegistry    PodProvider             OllamaClient
//!  + vram::estimate + selector::select      (health, pull)
//!  (Ollama registry) (RunPod GraphQL)       on the pod endpoint
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ollama_pod::{OllamaRegistry, PodManager, RunPod, StateStore, UpRequest};
//!
//! let provider = Arc::new(RunPod::new(api_key, RUNPOD_API_URL, timeout)?);
//! let registry = Arc::new(OllamaRegistry::new(OLLAMA_REGISTRY_URL, timeout)?);
//! let manager = PodManager::new(provider, registry, StateStore::new(state_dir));
//!
//! let outcome = manager.up(&UpRequest::new("default", "qwen2.5:7b")).await?;
//! manager.down("default").await?;
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod ollama;
pub mod providers;
pub mod registry;
pub mod selector;
pub mod state;
pub mod vram;

pub use error::{ErrorKind, PodError, PodResult};
pub use lifecycle::{DownOutcome, Plan, PodCondition, PodManager, StatusReport, UpOutcome, UpRequest};
pub use providers::runpod::RunPod;
pub use providers::{CloudCategory, CloudType, GpuOffering, PodProvider, RemotePod, RemotePodStatus};
pub use registry::{ModelReference, ModelRegistry, OllamaRegistry};
pub use state::{PodRecord, PodStatus, StateStore};
pub use vram::{VramEstimate, VramRequirement};
