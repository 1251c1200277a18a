//! Strategies that use the single-layer buffer pallet.
//!
//! The buffer shares the main pallet's footprint but only its floor is used:
//! every buffered box rests at `z = 0` and collisions are checked on XY
//! footprints alone. Its height is never bounded.

use crate::geometry::overlaps_any_footprint;
use crate::model::{BoxOutcome, BoxSpec, ContainerId, ContainerSpec, Placement};
use crate::optimizer::{PackEvent, PackingConfig, StrategyRun, first_fit, floor_positions};
use crate::types::{BoundingBox, Dimensional, Extent3, Point3, Rotation};

/// First floor corner whose padded footprint clears every buffered box.
fn first_floor_fit(
    dims: Extent3,
    pallet: Extent3,
    gap: u32,
    buffered: &[BoundingBox],
) -> Option<Point3> {
    floor_positions(dims, pallet, gap).find(|corner| {
        !overlaps_any_footprint(&BoundingBox::padded(*corner, dims, gap), buffered)
    })
}

fn padded_boxes<'a>(
    placements: impl Iterator<Item = &'a Placement>,
    gap: u32,
) -> Vec<BoundingBox> {
    placements.map(|p| p.padded_box(gap)).collect()
}

/// Lays every box on the buffer floor in input order.
///
/// There is no capacity limit here. Boxes whose footprint finds no free spot
/// are dropped.
pub fn buffer_only(
    boxes: &[BoxSpec],
    pallet: &ContainerSpec,
    config: &PackingConfig,
    on_event: &mut impl FnMut(&PackEvent),
) -> StrategyRun {
    let gap = config.gap;
    let mut run = StrategyRun::new(boxes.len());
    let mut buffered: Vec<BoundingBox> = Vec::new();

    for (idx, spec) in boxes.iter().enumerate() {
        match first_floor_fit(spec.dims, pallet.dims, gap, &buffered) {
            Some(corner) => {
                buffered.push(BoundingBox::padded(corner, spec.dims, gap));
                let placement =
                    Placement::at_corner(spec, corner, Rotation::Deg0, ContainerId::Buffer);
                tracing::debug!(box_id = %spec.id, ?corner, "placed on buffer");
                on_event(&PackEvent::placed(&placement));
                run.record(idx, BoxOutcome::Buffered(placement));
            }
            None => {
                tracing::debug!(box_id = %spec.id, "no space on buffer floor");
                on_event(&PackEvent::dropped(spec));
            }
        }
    }

    run
}

/// Fills the buffer first, then promotes buffered boxes to the main pallet.
///
/// Fill phase: while fewer than `buffer_capacity` boxes are buffered, each box
/// tries the buffer floor; otherwise (or if the floor is full) it tries the
/// main pallet with the same first-fit scan as the greedy fill.
///
/// Promotion phase: among buffered boxes that fit somewhere on the main
/// pallet, the one with the largest volume moves over; the first one found in
/// result order wins ties. This repeats until no buffered box fits, at most
/// once per box buffered after the fill phase.
pub fn buffer_then_promote(
    boxes: &[BoxSpec],
    pallet: &ContainerSpec,
    config: &PackingConfig,
    on_event: &mut impl FnMut(&PackEvent),
) -> StrategyRun {
    let gap = config.gap;
    let mut run = StrategyRun::new(boxes.len());
    let mut main: Vec<BoundingBox> = Vec::new();
    let mut buffered: Vec<BoundingBox> = Vec::new();

    for (idx, spec) in boxes.iter().enumerate() {
        let buffer_corner = if buffered.len() < config.buffer_capacity {
            first_floor_fit(spec.dims, pallet.dims, gap, &buffered)
        } else {
            None
        };

        if let Some(corner) = buffer_corner {
            buffered.push(BoundingBox::padded(corner, spec.dims, gap));
            let placement =
                Placement::at_corner(spec, corner, Rotation::Deg0, ContainerId::Buffer);
            tracing::debug!(box_id = %spec.id, ?corner, "buffered");
            on_event(&PackEvent::placed(&placement));
            run.record(idx, BoxOutcome::Buffered(placement));
            continue;
        }

        match first_fit(spec.dims, pallet.dims, gap, &main) {
            Some(corner) => {
                main.push(BoundingBox::padded(corner, spec.dims, gap));
                let placement =
                    Placement::at_corner(spec, corner, Rotation::Deg0, ContainerId::Main);
                tracing::debug!(box_id = %spec.id, ?corner, "placed on main pallet");
                on_event(&PackEvent::placed(&placement));
                run.record(idx, BoxOutcome::MainPlaced(placement));
            }
            None => {
                tracing::debug!(box_id = %spec.id, "left unplaced after fill phase");
            }
        }
    }

    promote(boxes, pallet, gap, &mut run, &mut main, &mut buffered, on_event);

    for (spec, outcome) in boxes.iter().zip(run.outcomes()) {
        if !outcome.is_placed() {
            on_event(&PackEvent::dropped(spec));
        }
    }

    run
}

fn promote(
    boxes: &[BoxSpec],
    pallet: &ContainerSpec,
    gap: u32,
    run: &mut StrategyRun,
    main: &mut Vec<BoundingBox>,
    buffered: &mut Vec<BoundingBox>,
    on_event: &mut impl FnMut(&PackEvent),
) {
    let max_iterations = run.buffered_count();
    // Main only grows, so a box that fits nowhere stays that way.
    let mut stuck = vec![false; boxes.len()];

    for _ in 0..max_iterations {
        let mut best: Option<(usize, Point3)> = None;

        for &idx in run.order() {
            if stuck[idx] || !run.outcomes()[idx].is_buffered() {
                continue;
            }
            let spec = &boxes[idx];
            match first_fit(spec.dims, pallet.dims, gap, main.as_slice()) {
                Some(corner) => {
                    let larger = best.is_none_or(|(b, _)| spec.volume() > boxes[b].volume());
                    if larger {
                        best = Some((idx, corner));
                    }
                }
                None => stuck[idx] = true,
            }
        }

        let Some((idx, corner)) = best else {
            break;
        };

        let spec = &boxes[idx];
        main.push(BoundingBox::padded(corner, spec.dims, gap));
        let placement = Placement::at_corner(spec, corner, Rotation::Deg0, ContainerId::Main);
        tracing::debug!(box_id = %spec.id, ?corner, "promoted to main pallet");
        on_event(&PackEvent::BoxPromoted {
            box_id: spec.id.clone(),
            box_loc: placement.anchor.as_tuple(),
        });
        run.promote(idx, placement);

        *buffered = padded_boxes(
            run.outcomes()
                .iter()
                .filter(|o| o.is_buffered())
                .filter_map(BoxOutcome::placement),
            gap,
        );
    }
}
