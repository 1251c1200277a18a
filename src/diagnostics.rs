//! Post-run summaries: pallet utilization and support checks.
//!
//! Nothing here influences placement. Support is only measured and reported;
//! no strategy rejects a position because of it.

use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::PackingResult;
use crate::geometry::support_ratio;
use crate::model::{ContainerId, ContainerSpec};
use crate::optimizer::PackingConfig;
use crate::types::{BoundingBox, Dimensional};

/// Support of the boxes that do not rest on the main pallet floor.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct SupportDiagnostics {
    /// Threshold the ratios were compared against.
    pub min_support_ratio: f64,
    /// Smallest ratio among raised boxes, `1.0` if every box is on the floor.
    pub lowest_ratio: f64,
    /// Ids of raised boxes below the threshold, in result order.
    pub unsupported: Vec<String>,
}

/// Summary of one strategy run.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PackingSummary {
    pub main_count: usize,
    pub buffer_count: usize,
    pub dropped: Vec<String>,
    pub skipped: Vec<String>,
    /// Main pallet volume utilization in percent.
    #[schema(example = 64.0)]
    pub stacking_rate: f64,
    /// Utilization after each main-pallet placement, in result order.
    pub rate_history: Vec<f64>,
    pub support: SupportDiagnostics,
}

/// Builds the summary of a finished run.
pub fn summarize(
    result: &PackingResult,
    pallet: &ContainerSpec,
    config: &PackingConfig,
) -> PackingSummary {
    let capacity = pallet.volume() as f64;
    let mut filled = 0u64;
    let rate_history: Vec<f64> = result
        .placements
        .iter()
        .filter(|p| p.container == ContainerId::Main)
        .map(|p| {
            filled += p.volume();
            percent(filled, capacity)
        })
        .collect();

    PackingSummary {
        main_count: result.main_count(),
        buffer_count: result.buffer_count(),
        dropped: result.dropped.clone(),
        skipped: result.skipped.iter().map(|s| s.box_id.clone()).collect(),
        stacking_rate: rate_history.last().copied().unwrap_or(0.0),
        rate_history,
        support: support_diagnostics(result, config),
    }
}

fn percent(filled: u64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        return 0.0;
    }
    filled as f64 * 100.0 / capacity
}

fn support_diagnostics(result: &PackingResult, config: &PackingConfig) -> SupportDiagnostics {
    let clearance = result.strategy.clearance(config.gap);
    let main: Vec<(&str, BoundingBox)> = result
        .placements
        .iter()
        .filter(|p| p.container == ContainerId::Main)
        .map(|p| (p.box_id.as_str(), p.padded_box(clearance)))
        .collect();
    let boxes: Vec<BoundingBox> = main.iter().map(|(_, b)| *b).collect();

    let mut lowest_ratio = 1.0_f64;
    let mut unsupported = Vec::new();
    for (id, target) in main.iter().filter(|(_, b)| b.min.z > 0) {
        let ratio = support_ratio(target, &boxes);
        lowest_ratio = lowest_ratio.min(ratio);
        if ratio < config.min_support_ratio {
            tracing::debug!(box_id = *id, ratio, "box is insufficiently supported");
            unsupported.push((*id).to_string());
        }
    }

    SupportDiagnostics {
        min_support_ratio: config.min_support_ratio,
        lowest_ratio,
        unsupported,
    }
}
