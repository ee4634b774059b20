//! VRAM estimation from model size.

use tracing::info;

use crate::error::{PodError, PodResult};
use crate::registry::{ModelReference, ModelRegistry};

/// Multiplier applied to the raw weight size for KV cache and runtime overhead.
pub const VRAM_OVERHEAD_FACTOR: f64 = 1.2;

// 1.2 as an exact ratio so the rounding never depends on float error.
const OVERHEAD_NUM: u128 = 6;
const OVERHEAD_DEN: u128 = 5;
const GIB: u128 = 1 << 30;

/// Estimated memory requirement of a model, derived per invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VramEstimate {
    /// Sum of the model's weight layers.
    pub raw_size_bytes: u64,
    /// Always [`VRAM_OVERHEAD_FACTOR`].
    pub overhead_factor: f64,
    /// `ceil(raw_size_bytes * overhead_factor / 2^30)`.
    pub required_gb: u32,
}

impl VramEstimate {
    /// Build an estimate from a raw size in bytes.
    #[must_use]
    pub fn from_bytes(raw_size_bytes: u64) -> Self {
        Self {
            raw_size_bytes,
            overhead_factor: VRAM_OVERHEAD_FACTOR,
            required_gb: required_gb(raw_size_bytes),
        }
    }
}

/// Whole GB of VRAM required for a model of `raw_size_bytes`.
#[must_use]
pub fn required_gb(raw_size_bytes: u64) -> u32 {
    let scaled = u128::from(raw_size_bytes) * OVERHEAD_NUM;
    let denom = OVERHEAD_DEN * GIB;
    let gb = scaled.div_ceil(denom);
    u32::try_from(gb).unwrap_or(u32::MAX)
}

/// Where a VRAM requirement came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VramRequirement {
    /// Looked up from the registry.
    Estimated(VramEstimate),
    /// Supplied by the caller; registry not consulted.
    Override(u32),
}

impl VramRequirement {
    /// Required VRAM in whole GB.
    #[must_use]
    pub const fn required_gb(&self) -> u32 {
        match self {
            Self::Estimated(e) => e.required_gb,
            Self::Override(gb) => *gb,
        }
    }
}

/// Turn a user-supplied GB figure into a whole-GB override.
///
/// # Errors
/// Returns [`PodError::Config`] for non-finite or non-positive values.
pub fn override_gb(vram_gb: f64) -> PodResult<u32> {
    if !vram_gb.is_finite() || vram_gb <= 0.0 {
        return Err(PodError::Config(format!(
            "--vram must be a positive number of GB, got {vram_gb}"
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let gb = vram_gb.ceil().min(f64::from(u32::MAX)) as u32;
    Ok(gb)
}

/// Resolve the VRAM requirement for `model`.
///
/// An override wins unconditionally and skips the registry.
///
/// # Errors
/// Returns [`PodError::RegistryLookup`] if the model cannot be resolved.
pub async fn estimate(
    registry: &dyn ModelRegistry,
    model: &ModelReference,
    vram_override: Option<u32>,
) -> PodResult<VramRequirement> {
    if let Some(gb) = vram_override {
        info!(model = %model, required_gb = gb, "Using VRAM override");
        return Ok(VramRequirement::Override(gb));
    }

    let bytes = registry.model_size_bytes(model).await?;
    let estimate = VramEstimate::from_bytes(bytes);
    info!(
        model = %model,
        raw_size_bytes = bytes,
        required_gb = estimate.required_gb,
        "Estimated VRAM"
    );
    Ok(VramRequirement::Estimated(estimate))
}
