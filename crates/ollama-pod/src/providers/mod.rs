//! Pod provider implementations.
//!
//! This module contains the [`PodProvider`] trait and the RunPod
//! implementation behind it.

pub mod runpod;
pub mod traits;

pub use traits::{
    CloudCategory, CloudType, CreatePodRequest, GpuOffering, PodProvider, PortMapping, RemotePod,
    RemotePodStatus,
};
