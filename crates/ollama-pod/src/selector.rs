//! GPU selection over a catalog snapshot.

use std::cmp::Ordering;

use tracing::{info, warn};

use crate::error::{PodError, PodResult};
use crate::providers::{CloudType, GpuOffering, PodProvider};

fn by_cost_then_vram(a: &GpuOffering, b: &GpuOffering) -> Ordering {
    a.cost_per_hour
        .total_cmp(&b.cost_per_hour)
        .then(a.vram_gb.cmp(&b.vram_gb))
}

/// Pick the cheapest available offering with at least `required_gb` VRAM.
///
/// Ties on price go to the smaller card, then to catalog order.
///
/// # Errors
/// Returns [`PodError::NoSuitableGpu`] when nothing passes the filter.
pub fn select(
    catalog: &[GpuOffering],
    required_gb: u32,
    cloud_type: CloudType,
) -> PodResult<GpuOffering> {
    catalog
        .iter()
        .filter(|o| o.vram_gb >= required_gb)
        .filter(|o| o.availability_count > 0)
        .filter(|o| cloud_type.matches(o.cloud_category))
        .min_by(|a, b| by_cost_then_vram(a, b))
        .cloned()
        .ok_or_else(|| PodError::NoSuitableGpu {
            required_gb,
            cloud_type: cloud_type.to_string(),
        })
}

/// Validate an explicitly requested GPU type against the catalog.
///
/// Matches the type ID or display name, case-insensitively. Availability is
/// not checked; the platform rejects the create if the type is sold out.
///
/// # Errors
/// - [`PodError::UnknownGpuType`] if the type is not in the catalog.
/// - [`PodError::InsufficientVram`] if it has less than `required_gb`.
/// - [`PodError::NoSuitableGpu`] if it is not sold in the requested cloud.
pub fn select_explicit(
    catalog: &[GpuOffering],
    gpu_type: &str,
    required_gb: u32,
    cloud_type: CloudType,
) -> PodResult<GpuOffering> {
    let matching: Vec<&GpuOffering> = catalog
        .iter()
        .filter(|o| {
            o.type_id.eq_ignore_ascii_case(gpu_type) || o.display_name.eq_ignore_ascii_case(gpu_type)
        })
        .collect();

    let Some(first) = matching.first() else {
        return Err(PodError::UnknownGpuType(gpu_type.to_string()));
    };

    if first.vram_gb < required_gb {
        return Err(PodError::InsufficientVram {
            gpu_type: first.type_id.clone(),
            available_gb: first.vram_gb,
            required_gb,
        });
    }

    let chosen = matching
        .into_iter()
        .filter(|o| cloud_type.matches(o.cloud_category))
        .min_by(|a, b| by_cost_then_vram(a, b))
        .cloned()
        .ok_or_else(|| PodError::NoSuitableGpu {
            required_gb,
            cloud_type: cloud_type.to_string(),
        })?;

    if chosen.availability_count == 0 {
        warn!(gpu_type = %chosen.type_id, cloud = %chosen.cloud_category, "GPU type currently shows no availability");
    }
    Ok(chosen)
}

/// Fetch a fresh catalog and select an offering.
///
/// # Errors
/// Propagates catalog errors and the selection errors of [`select`] and
/// [`select_explicit`].
pub async fn select_offering(
    provider: &dyn PodProvider,
    required_gb: u32,
    cloud_type: CloudType,
    explicit_gpu_type: Option<&str>,
) -> PodResult<GpuOffering> {
    let catalog = provider.list_gpu_offerings().await?;

    let offering = match explicit_gpu_type {
        Some(gpu_type) => select_explicit(&catalog, gpu_type, required_gb, cloud_type)?,
        None => select(&catalog, required_gb, cloud_type)?,
    };

    info!(
        gpu_type = %offering.type_id,
        vram_gb = offering.vram_gb,
        cost_per_hour = offering.cost_per_hour,
        cloud = %offering.cloud_category,
        "Selected GPU"
    );
    Ok(offering)
}
