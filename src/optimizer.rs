//! Placement strategies on the main pallet.
//!
//! Every strategy is a first-fit search: candidate corners are visited in a
//! fixed order (z outer, then y, then x, rotation 0° before 90°) and the first
//! feasible one wins. The order decides which of several valid positions is
//! taken, so results are reproducible across runs.
//!
//! The buffer-aware strategies live in [`crate::buffer`].

use serde::Serialize;

use crate::error::{GridError, ValidationError};
use crate::geometry::{DEFAULT_MIN_SUPPORT_RATIO, overlaps_any};
use crate::grid::{DEFAULT_CELL_SIZE, OccupancyGrid};
use crate::model::{BoxOutcome, BoxSpec, ContainerId, ContainerSpec, Placement};
use crate::types::{BoundingBox, Dimensional, Extent3, Point3, Rotation};

/// Configuration for the placement strategies.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Scan stride and clearance added to every committed box (brute-force strategies).
    pub gap: u32,
    /// Voxel edge length of the collision grid.
    pub cell_size: u32,
    /// Maximum number of boxes resting on the buffer pallet at once.
    pub buffer_capacity: usize,
    /// Support share below which a box is reported as unsupported (diagnostics only).
    pub min_support_ratio: f64,
}

impl PackingConfig {
    pub const DEFAULT_GAP: u32 = 5;
    pub const DEFAULT_CELL_SIZE: u32 = DEFAULT_CELL_SIZE;
    pub const DEFAULT_BUFFER_CAPACITY: usize = 100;
    pub const DEFAULT_MIN_SUPPORT_RATIO: f64 = DEFAULT_MIN_SUPPORT_RATIO;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Checks the values a run cannot work with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.gap == 0 {
            return Err(ValidationError::InvalidConfiguration(
                "gap must be greater than 0".to_string(),
            ));
        }
        if self.cell_size == 0 {
            return Err(ValidationError::InvalidConfiguration(
                "cell_size must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_support_ratio) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "min_support_ratio must be between 0 and 1, got {}",
                self.min_support_ratio
            )));
        }
        Ok(())
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            gap: Self::DEFAULT_GAP,
            cell_size: Self::DEFAULT_CELL_SIZE,
            buffer_capacity: Self::DEFAULT_BUFFER_CAPACITY,
            min_support_ratio: Self::DEFAULT_MIN_SUPPORT_RATIO,
        }
    }
}

/// Builder for PackingConfig.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the clearance gap and scan stride.
    pub fn gap(mut self, gap: u32) -> Self {
        self.config.gap = gap;
        self
    }

    /// Sets the voxel size of the collision grid.
    pub fn cell_size(mut self, cell_size: u32) -> Self {
        self.config.cell_size = cell_size;
        self
    }

    /// Sets the buffer pallet capacity.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Sets the minimum support ratio used by diagnostics.
    pub fn min_support_ratio(mut self, ratio: f64) -> Self {
        self.config.min_support_ratio = ratio;
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Events emitted while a strategy runs, for live progress streams.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// A strategy run begins.
    RunStarted { strategy: String, boxes: usize },
    /// A box was committed to a pallet.
    BoxPlaced {
        box_id: String,
        box_loc: (u32, u32, u32),
        box_rot: u16,
        pallet_id: u8,
    },
    /// A buffered box moved to the main pallet.
    BoxPromoted {
        box_id: String,
        box_loc: (u32, u32, u32),
    },
    /// No position was found for a box.
    BoxDropped { box_id: String },
    /// The run is complete.
    Finished { placed: usize, dropped: usize },
}

impl PackEvent {
    pub(crate) fn placed(placement: &Placement) -> Self {
        PackEvent::BoxPlaced {
            box_id: placement.box_id.clone(),
            box_loc: placement.anchor.as_tuple(),
            box_rot: placement.rotation.degrees(),
            pallet_id: placement.container.code(),
        }
    }

    pub(crate) fn dropped(spec: &BoxSpec) -> Self {
        PackEvent::BoxDropped {
            box_id: spec.id.clone(),
        }
    }
}

/// Per-box outcomes of one strategy run plus the order placements were made in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrategyRun {
    outcomes: Vec<BoxOutcome>,
    order: Vec<usize>,
}

impl StrategyRun {
    pub(crate) fn new(box_count: usize) -> Self {
        Self {
            outcomes: vec![BoxOutcome::Unplaced; box_count],
            order: Vec::new(),
        }
    }

    /// Stores the outcome for the box at `index` and appends it to the result order.
    pub(crate) fn record(&mut self, index: usize, outcome: BoxOutcome) {
        if outcome.is_placed() {
            self.order.push(index);
        }
        self.outcomes[index] = outcome;
    }

    /// Moves a buffered box to the main pallet and to the end of the result order.
    pub(crate) fn promote(&mut self, index: usize, placement: Placement) {
        self.order.retain(|&i| i != index);
        self.order.push(index);
        self.outcomes[index] = BoxOutcome::MainPlaced(placement);
    }

    /// Box indices in result order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Outcomes aligned with the input boxes.
    pub fn outcomes(&self) -> &[BoxOutcome] {
        &self.outcomes
    }

    /// Number of boxes currently on the buffer pallet.
    pub fn buffered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_buffered()).count()
    }

    /// Placements in result order.
    pub fn placements(&self) -> Vec<Placement> {
        self.order
            .iter()
            .filter_map(|&i| self.outcomes[i].placement().cloned())
            .collect()
    }

    pub fn into_outcomes(self) -> Vec<BoxOutcome> {
        self.outcomes
    }
}

/// Candidate corners in scan order: z outer, then y, then x.
///
/// Bounds come from the unrotated extents. A box larger than the pallet on any
/// axis yields no candidates.
pub(crate) fn corner_positions(
    dims: Extent3,
    pallet: Extent3,
    step: u32,
) -> impl Iterator<Item = Point3> {
    let step = step.max(1) as usize;
    let limits = match (
        pallet.width.checked_sub(dims.width),
        pallet.length.checked_sub(dims.length),
        pallet.height.checked_sub(dims.height),
    ) {
        (Some(max_x), Some(max_y), Some(max_z)) => Some((max_x, max_y, max_z)),
        _ => None,
    };

    limits.into_iter().flat_map(move |(max_x, max_y, max_z)| {
        (0..=max_z).step_by(step).flat_map(move |z| {
            (0..=max_y)
                .step_by(step)
                .flat_map(move |y| (0..=max_x).step_by(step).map(move |x| Point3::new(x, y, z)))
        })
    })
}

/// Candidate corners on the floor of a single-layer pallet: y outer, then x.
///
/// Height is not bounded.
pub(crate) fn floor_positions(
    dims: Extent3,
    pallet: Extent3,
    step: u32,
) -> impl Iterator<Item = Point3> {
    let step = step.max(1) as usize;
    let limits = pallet
        .width
        .checked_sub(dims.width)
        .zip(pallet.length.checked_sub(dims.length));

    limits.into_iter().flat_map(move |(max_x, max_y)| {
        (0..=max_y)
            .step_by(step)
            .flat_map(move |y| (0..=max_x).step_by(step).map(move |x| Point3::new(x, y, 0)))
    })
}

/// First corner whose padded box clears every committed box.
pub(crate) fn first_fit(
    dims: Extent3,
    pallet: Extent3,
    gap: u32,
    committed: &[BoundingBox],
) -> Option<Point3> {
    corner_positions(dims, pallet, gap)
        .find(|corner| !overlaps_any(&BoundingBox::padded(*corner, dims, gap), committed))
}

/// Fallback of the greedy fill: only the column above corner `(0, 0)`.
///
/// Every corner tried here is also visited by [`first_fit`] against the same
/// committed boxes, so after a failed full scan this never finds anything. It
/// is kept so the greedy fill retains its two-stage shape; the footprint is
/// still bounded by the pallet.
pub(crate) fn corner_column_fit(
    dims: Extent3,
    pallet: Extent3,
    gap: u32,
    committed: &[BoundingBox],
) -> Option<Point3> {
    if dims.width > pallet.width || dims.length > pallet.length {
        return None;
    }
    let max_z = pallet.height.checked_sub(dims.height)?;

    (0..=max_z)
        .step_by(gap.max(1) as usize)
        .map(|z| Point3::new(0, 0, z))
        .find(|corner| !overlaps_any(&BoundingBox::padded(*corner, dims, gap), committed))
}

/// Places the first box at the pallet origin without any checks.
///
/// Debug aid for renderers: the anchor is reported as `(0, 0, 0)` verbatim.
pub fn origin_debug(boxes: &[BoxSpec], on_event: &mut impl FnMut(&PackEvent)) -> StrategyRun {
    let mut run = StrategyRun::new(boxes.len());
    if let Some(first) = boxes.first() {
        let placement = Placement {
            box_id: first.id.clone(),
            anchor: Point3::origin(),
            rotation: Rotation::Deg0,
            container: ContainerId::Main,
            extent: first.dims,
        };
        on_event(&PackEvent::placed(&placement));
        run.record(0, BoxOutcome::MainPlaced(placement));
    }
    run
}

/// Greedy first-fit of every box in input order on the main pallet.
///
/// Each box takes the first corner whose padded box clears all boxes accepted
/// so far. Boxes without a position are dropped.
///
/// # Parameters
/// * `boxes` - Boxes in processing order
/// * `pallet` - The main pallet
/// * `config` - Gap and scan stride
/// * `on_event` - Progress callback
pub fn greedy_fill_all(
    boxes: &[BoxSpec],
    pallet: &ContainerSpec,
    config: &PackingConfig,
    on_event: &mut impl FnMut(&PackEvent),
) -> StrategyRun {
    let gap = config.gap;
    let mut run = StrategyRun::new(boxes.len());
    let mut committed: Vec<BoundingBox> = Vec::with_capacity(boxes.len());

    for (idx, spec) in boxes.iter().enumerate() {
        let corner = first_fit(spec.dims, pallet.dims, gap, &committed)
            .or_else(|| corner_column_fit(spec.dims, pallet.dims, gap, &committed));

        match corner {
            Some(corner) => {
                committed.push(BoundingBox::padded(corner, spec.dims, gap));
                let placement =
                    Placement::at_corner(spec, corner, Rotation::Deg0, ContainerId::Main);
                tracing::debug!(box_id = %spec.id, ?corner, "placed on main pallet");
                on_event(&PackEvent::placed(&placement));
                run.record(idx, BoxOutcome::MainPlaced(placement));
            }
            None => {
                tracing::debug!(box_id = %spec.id, dims = ?spec.dims, "no position on main pallet");
                on_event(&PackEvent::dropped(spec));
            }
        }
    }

    run
}

/// Largest boxes first, on a voxel grid, trying both yaw rotations.
///
/// Boxes are stably sorted by descending volume, so equal volumes keep their
/// input order. For every corner the grid is asked for 0° and then 90°.
///
/// # Errors
/// Fails if the pallet cannot be divided into whole grid cells.
pub fn sorted_rotation(
    boxes: &[BoxSpec],
    pallet: &ContainerSpec,
    config: &PackingConfig,
    on_event: &mut impl FnMut(&PackEvent),
) -> Result<StrategyRun, GridError> {
    let mut grid = OccupancyGrid::new(pallet.dims, config.cell_size)?;
    let mut run = StrategyRun::new(boxes.len());

    for idx in volume_order(boxes) {
        let spec = &boxes[idx];
        let found = corner_positions(spec.dims, pallet.dims, config.gap).find_map(|corner| {
            Rotation::ALL
                .into_iter()
                .find(|rotation| grid.can_place(spec.dims, corner, *rotation))
                .map(|rotation| (corner, rotation))
        });

        match found {
            Some((corner, rotation)) => {
                grid.commit(spec.dims, corner, rotation);
                let placement = Placement::at_corner(spec, corner, rotation, ContainerId::Main);
                tracing::debug!(
                    box_id = %spec.id,
                    ?corner,
                    rotation = rotation.degrees(),
                    "placed on grid"
                );
                on_event(&PackEvent::placed(&placement));
                run.record(idx, BoxOutcome::MainPlaced(placement));
            }
            None => {
                tracing::debug!(box_id = %spec.id, dims = ?spec.dims, "no grid position");
                on_event(&PackEvent::dropped(spec));
            }
        }
    }

    Ok(run)
}

/// Box indices by descending volume; ties keep input order.
pub fn volume_order(boxes: &[BoxSpec]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    // `sort_by` is stable.
    order.sort_by(|&a, &b| boxes[b].volume().cmp(&boxes[a].volume()));
    order
}
