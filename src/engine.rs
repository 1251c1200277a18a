//! Engine facade: holds one input set and runs strategies over it.
//!
//! The engine is immutable after construction. Every run builds its own grid
//! and collision lists, so one engine can serve any number of runs, from any
//! number of threads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::buffer::{buffer_only, buffer_then_promote};
use crate::error::EngineError;
use crate::model::{
    BoxOutcome, BoxRecord, BoxSpec, ContainerId, ContainerSpec, Placement, PlacementRecord,
    SkippedBox,
};
use crate::optimizer::{
    PackEvent, PackingConfig, StrategyRun, greedy_fill_all, origin_debug, sorted_rotation,
};

/// Placement policy selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// First box at the pallet origin, nothing else.
    OriginDebug,
    /// First-fit of every box in input order.
    GreedyFillAll,
    /// Every box on the buffer floor.
    BufferOnly,
    /// Buffer floor first, then promotion to the main pallet.
    BufferThenPromote,
    /// Largest volume first on a voxel grid with rotation.
    SortedRotation,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::OriginDebug,
        Strategy::GreedyFillAll,
        Strategy::BufferOnly,
        Strategy::BufferThenPromote,
        Strategy::SortedRotation,
    ];

    /// Canonical wire name.
    pub const fn name(self) -> &'static str {
        match self {
            Strategy::OriginDebug => "origin_debug",
            Strategy::GreedyFillAll => "greedy_fill_all",
            Strategy::BufferOnly => "buffer_only",
            Strategy::BufferThenPromote => "buffer_then_promote",
            Strategy::SortedRotation => "sorted_rotation",
        }
    }

    /// Clearance between committed boxes under this strategy.
    ///
    /// The grid strategy lets boxes touch; the brute-force ones keep `gap`.
    pub const fn clearance(self, gap: u32) -> u32 {
        match self {
            Strategy::SortedRotation | Strategy::OriginDebug => 0,
            Strategy::GreedyFillAll | Strategy::BufferOnly | Strategy::BufferThenPromote => gap,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = EngineError;

    /// Accepts the canonical names and the legacy selector names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "origin_debug" | "pallet_origin_out_of_bound" => Ok(Strategy::OriginDebug),
            "greedy_fill_all" | "stack_all_boxes" => Ok(Strategy::GreedyFillAll),
            "buffer_only" | "buffer" => Ok(Strategy::BufferOnly),
            "buffer_then_promote" | "stack_with_buffer" => Ok(Strategy::BufferThenPromote),
            "sorted_rotation" | "optimized_stack" => Ok(Strategy::SortedRotation),
            _ => Err(EngineError::UnsupportedStrategy(s.to_string())),
        }
    }
}

/// Result of one strategy run.
#[derive(Clone, Debug, PartialEq)]
pub struct PackingResult {
    pub strategy: Strategy,
    /// Placements in the strategy's processing order.
    pub placements: Vec<Placement>,
    /// Outcome per parsed box, aligned with [`StackingEngine::boxes`].
    pub outcomes: Vec<BoxOutcome>,
    /// Parsed boxes no strategy path could place.
    pub dropped: Vec<String>,
    /// Input records rejected before the run.
    pub skipped: Vec<SkippedBox>,
}

impl PackingResult {
    fn from_run(
        strategy: Strategy,
        boxes: &[BoxSpec],
        skipped: &[SkippedBox],
        run: StrategyRun,
    ) -> Self {
        let placements = run.placements();
        let outcomes = run.into_outcomes();
        let dropped = boxes
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| !outcome.is_placed())
            .map(|(spec, _)| spec.id.clone())
            .collect();

        Self {
            strategy,
            placements,
            outcomes,
            dropped,
            skipped: skipped.to_vec(),
        }
    }

    /// Output records in result order.
    pub fn records(&self) -> Vec<PlacementRecord> {
        self.placements.iter().map(PlacementRecord::from).collect()
    }

    pub fn main_count(&self) -> usize {
        self.count_on(ContainerId::Main)
    }

    pub fn buffer_count(&self) -> usize {
        self.count_on(ContainerId::Buffer)
    }

    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    /// `true` if every parsed box was placed somewhere.
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }

    fn count_on(&self, container: ContainerId) -> usize {
        self.placements
            .iter()
            .filter(|p| p.container == container)
            .count()
    }
}

/// Holds boxes, pallet and configuration; exposes strategy runs.
///
/// # Examples
/// ```
/// use pallet_stacker::engine::{StackingEngine, Strategy};
/// use pallet_stacker::model::{BoxRecord, ContainerSpec};
/// use pallet_stacker::optimizer::PackingConfig;
/// use pallet_stacker::types::Extent3;
///
/// let records = vec![BoxRecord::new("A", "[40,40,40]"), BoxRecord::new("B", "[40,40,40]")];
/// let pallet = ContainerSpec::new(Extent3::new(100, 100, 100)).unwrap();
/// let engine = StackingEngine::new(&records, pallet, PackingConfig::default()).unwrap();
///
/// let result = engine.run(Strategy::GreedyFillAll).unwrap();
/// assert_eq!(result.placed_count(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct StackingEngine {
    boxes: Vec<BoxSpec>,
    skipped: Vec<SkippedBox>,
    pallet: ContainerSpec,
    config: PackingConfig,
}

impl StackingEngine {
    /// Parses raw records and builds an engine.
    ///
    /// Records with malformed sizes are logged and skipped; they are reported
    /// in every [`PackingResult::skipped`].
    ///
    /// # Errors
    /// Fails only on an invalid configuration.
    pub fn new(
        records: &[BoxRecord],
        pallet: ContainerSpec,
        config: PackingConfig,
    ) -> Result<Self, EngineError> {
        let mut boxes = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();

        for record in records {
            match BoxSpec::from_record(record) {
                Ok(spec) => boxes.push(spec),
                Err(reason) => {
                    tracing::warn!(box_id = %record.box_id, %reason, "skipping box");
                    skipped.push(SkippedBox {
                        box_id: record.box_id.clone(),
                        reason,
                    });
                }
            }
        }

        let mut engine = Self::from_boxes(boxes, pallet, config)?;
        engine.skipped = skipped;
        Ok(engine)
    }

    /// Builds an engine from already validated boxes.
    pub fn from_boxes(
        boxes: Vec<BoxSpec>,
        pallet: ContainerSpec,
        config: PackingConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            boxes,
            skipped: Vec::new(),
            pallet,
            config,
        })
    }

    pub fn boxes(&self) -> &[BoxSpec] {
        &self.boxes
    }

    pub fn skipped(&self) -> &[SkippedBox] {
        &self.skipped
    }

    pub fn pallet(&self) -> &ContainerSpec {
        &self.pallet
    }

    pub fn config(&self) -> &PackingConfig {
        &self.config
    }

    /// Runs one strategy.
    pub fn run(&self, strategy: Strategy) -> Result<PackingResult, EngineError> {
        self.run_with_progress(strategy, |_| {})
    }

    /// Runs the strategy named by `selector`.
    ///
    /// # Errors
    /// [`EngineError::UnsupportedStrategy`] for an unknown selector.
    pub fn run_named(&self, selector: &str) -> Result<PackingResult, EngineError> {
        self.run(selector.parse()?)
    }

    /// Runs one strategy and reports every step to `on_event`.
    pub fn run_with_progress(
        &self,
        strategy: Strategy,
        mut on_event: impl FnMut(&PackEvent),
    ) -> Result<PackingResult, EngineError> {
        on_event(&PackEvent::RunStarted {
            strategy: strategy.name().to_string(),
            boxes: self.boxes.len(),
        });

        let boxes = &self.boxes;
        let pallet = &self.pallet;
        let config = &self.config;
        let run = match strategy {
            Strategy::OriginDebug => origin_debug(boxes, &mut on_event),
            Strategy::GreedyFillAll => greedy_fill_all(boxes, pallet, config, &mut on_event),
            Strategy::BufferOnly => buffer_only(boxes, pallet, config, &mut on_event),
            Strategy::BufferThenPromote => {
                buffer_then_promote(boxes, pallet, config, &mut on_event)
            }
            Strategy::SortedRotation => sorted_rotation(boxes, pallet, config, &mut on_event)?,
        };

        let result = PackingResult::from_run(strategy, boxes, &self.skipped, run);
        on_event(&PackEvent::Finished {
            placed: result.placed_count(),
            dropped: result.dropped.len(),
        });

        tracing::info!(
            %strategy,
            placed = result.placed_count(),
            main = result.main_count(),
            buffer = result.buffer_count(),
            dropped = result.dropped.len(),
            skipped = result.skipped.len(),
            "strategy run finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GridError, ValidationError};
    use crate::types::Extent3;

    fn pallet() -> ContainerSpec {
        ContainerSpec::new(Extent3::new(100, 100, 100)).unwrap()
    }

    fn engine(records: &[BoxRecord]) -> StackingEngine {
        StackingEngine::new(records, pallet(), PackingConfig::default()).unwrap()
    }

    #[test]
    fn strategy_names_round_trip_through_from_str() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.name().parse::<Strategy>().unwrap(), strategy);
        }
        assert_eq!(
            "stack_with_buffer".parse::<Strategy>().unwrap(),
            Strategy::BufferThenPromote
        );
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = engine(&[]).run_named("best_fit").unwrap_err();
        assert_eq!(err, EngineError::UnsupportedStrategy("best_fit".to_string()));
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let engine = engine(&[
            BoxRecord::new("good", "[10,10,10]"),
            BoxRecord::new("bad", "[10,10]"),
        ]);
        assert_eq!(engine.boxes().len(), 1);

        let result = engine.run(Strategy::GreedyFillAll).unwrap();
        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].box_id, "bad");
        assert!(result.dropped.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PackingConfig::builder().gap(0).build();
        let err = StackingEngine::new(&[], pallet(), config).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn grid_strategy_surfaces_misaligned_pallet() {
        let pallet = ContainerSpec::new(Extent3::new(100, 100, 98)).unwrap();
        let engine = StackingEngine::new(
            &[BoxRecord::new("a", "[10,10,10]")],
            pallet,
            PackingConfig::default(),
        )
        .unwrap();

        assert!(matches!(
            engine.run(Strategy::SortedRotation),
            Err(EngineError::Grid(GridError::Misaligned { axis: "height", .. }))
        ));
        assert!(engine.run(Strategy::GreedyFillAll).is_ok());
    }

    #[test]
    fn progress_brackets_the_run() {
        let engine = engine(&[
            BoxRecord::new("a", "[10,10,10]"),
            BoxRecord::new("huge", "[200,10,10]"),
        ]);
        let mut events = Vec::new();
        let result = engine
            .run_with_progress(Strategy::GreedyFillAll, |evt| events.push(evt.clone()))
            .unwrap();

        assert_eq!(result.dropped, vec!["huge".to_string()]);
        assert!(!result.is_complete());
        assert!(matches!(events.first(), Some(PackEvent::RunStarted { boxes: 2, .. })));
        assert_eq!(
            events.last(),
            Some(&PackEvent::Finished {
                placed: 1,
                dropped: 1
            })
        );
    }

    #[test]
    fn records_follow_result_order() {
        let engine = engine(&[
            BoxRecord::new("small", "[10,10,10]"),
            BoxRecord::new("large", "[20,20,20]"),
        ]);
        let result = engine.run(Strategy::SortedRotation).unwrap();
        let ids: Vec<String> = result.records().into_iter().map(|r| r.box_id).collect();
        assert_eq!(ids, vec!["large", "small"]);
    }

    #[test]
    fn clearance_depends_on_collision_model() {
        assert_eq!(Strategy::GreedyFillAll.clearance(5), 5);
        assert_eq!(Strategy::SortedRotation.clearance(5), 0);
    }
}
