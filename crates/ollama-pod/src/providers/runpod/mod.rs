//! RunPod GPU pod provider.
//!
//! Implements the [`PodProvider`](crate::providers::PodProvider) trait over
//! RunPod's GraphQL API: GPU catalog, pod create / status / terminate and
//! network volume lookup.
//!
//! ## Example
//!
//! ```ignore
//! use ollama_pod::providers::runpod::RunPod;
//! use ollama_pod::providers::PodProvider;
//!
//! let provider = RunPod::new(api_key, "https://api.runpod.io/graphql", timeout)?;
//! let offerings = provider.list_gpu_offerings().await?;
//! ```

mod client;
mod models;

pub use client::RunPod;
