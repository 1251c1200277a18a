//! Data models for the pallet stacking engine.
//!
//! This module defines the fundamental data structures:
//! - `BoxRecord`: A raw input record as delivered by an external loader
//! - `BoxSpec`: A validated box with integer dimensions
//! - `ContainerSpec`: The pallet the boxes are stacked on
//! - `Placement`: Where a box ended up, in the wire convention consumers replay
//! - `PlacementRecord`: The flat output record handed to persisters and renderers
//! - `BoxOutcome`: The per-box result of one strategy run

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;
use crate::types::{BoundingBox, Dimensional, Extent3, Point3, Rotation};

/// Helper function to validate a single dimension.
fn validate_dimension(value: u32, name: &str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_dims(dims: Extent3, prefix: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.width, &format!("{prefix}width"))?;
    validate_dimension(dims.length, &format!("{prefix}length"))?;
    validate_dimension(dims.height, &format!("{prefix}height"))?;
    Ok(())
}

/// A box record as produced by an external loader.
///
/// `box_size` is the bracketed textual triple `"[w,l,h]"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub box_id: String,
    pub box_size: String,
}

impl BoxRecord {
    pub fn new(box_id: impl Into<String>, box_size: impl Into<String>) -> Self {
        Self {
            box_id: box_id.into(),
            box_size: box_size.into(),
        }
    }
}

/// Parses a bracketed, comma-separated size such as `"[30, 40, 20]"`.
///
/// Tokens that are not whole integers are ignored, so `10.5` is dropped rather
/// than truncated. At least three integers are required and the first three
/// must be positive; any further values are ignored.
///
/// # Examples
/// ```
/// use pallet_stacker::model::parse_box_size;
/// use pallet_stacker::types::Extent3;
///
/// assert_eq!(parse_box_size("7", "[30,40,20]").unwrap(), Extent3::new(30, 40, 20));
/// assert!(parse_box_size("8", "[10,10]").is_err());
/// ```
pub fn parse_box_size(box_id: &str, raw: &str) -> Result<Extent3, ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedBoxSize {
        box_id: box_id.to_string(),
        raw: raw.to_string(),
        reason,
    };

    let values: Vec<i64> = raw
        .split(',')
        .map(|token| token.trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace()))
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<i64>() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(box_id, token, %err, "ignoring unparsable size component");
                None
            }
        })
        .collect();

    if values.len() < 3 {
        return Err(malformed(format!(
            "expected 3 dimensions, found {}",
            values.len()
        )));
    }

    let mut dims = [0u32; 3];
    for (slot, value) in dims.iter_mut().zip(&values) {
        *slot = u32::try_from(*value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| malformed(format!("dimension {value} is not a positive integer")))?;
    }

    Ok(Extent3::new(dims[0], dims[1], dims[2]))
}

/// A validated box to be stacked.
///
/// # Fields
/// * `id` - Identifier, unique within one input set
/// * `dims` - Dimensions (width, length, height) in pallet units
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxSpec {
    pub id: String,
    pub dims: Extent3,
}

impl BoxSpec {
    /// Creates a new box with validation.
    ///
    /// # Examples
    /// ```
    /// use pallet_stacker::model::BoxSpec;
    /// use pallet_stacker::types::Extent3;
    ///
    /// assert!(BoxSpec::new("a", Extent3::new(10, 20, 30)).is_ok());
    /// assert!(BoxSpec::new("b", Extent3::new(0, 20, 30)).is_err());
    /// ```
    pub fn new(id: impl Into<String>, dims: Extent3) -> Result<Self, ValidationError> {
        validate_dims(dims, "Box ")?;
        Ok(Self {
            id: id.into(),
            dims,
        })
    }

    /// Parses a raw record into a box.
    pub fn from_record(record: &BoxRecord) -> Result<Self, ValidationError> {
        let dims = parse_box_size(&record.box_id, &record.box_size)?;
        Self::new(record.box_id.clone(), dims)
    }
}

impl Dimensional for BoxSpec {
    fn dimensions(&self) -> Extent3 {
        self.dims
    }
}

/// The pallet boxes are stacked on.
///
/// The buffer pallet of buffer-aware strategies shares this footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub dims: Extent3,
}

impl ContainerSpec {
    /// Creates a new pallet with validation.
    pub fn new(dims: Extent3) -> Result<Self, ValidationError> {
        validate_dims(dims, "Pallet ")?;
        Ok(Self { dims })
    }
}

impl Dimensional for ContainerSpec {
    fn dimensions(&self) -> Extent3 {
        self.dims
    }
}

/// Which pallet a placement belongs to. Serialized as `1` (main) or `2` (buffer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ContainerId {
    Main,
    Buffer,
}

impl ContainerId {
    pub const fn code(self) -> u8 {
        match self {
            ContainerId::Main => 1,
            ContainerId::Buffer => 2,
        }
    }
}

impl From<ContainerId> for u8 {
    fn from(id: ContainerId) -> Self {
        id.code()
    }
}

impl TryFrom<u8> for ContainerId {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ContainerId::Main),
            2 => Ok(ContainerId::Buffer),
            other => Err(format!("unknown pallet id {other}")),
        }
    }
}

/// A box committed to a pallet.
///
/// `anchor.x`/`anchor.y` are the center of the rotated footprint
/// (`corner + ceil(extent / 2)`), `anchor.z` is the base of the box.
/// Renderers reconstruct corners from exactly this convention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub box_id: String,
    pub anchor: Point3,
    pub rotation: Rotation,
    pub container: ContainerId,
    /// Extents after rotation.
    pub extent: Extent3,
}

impl Placement {
    /// Builds a placement from the unpadded corner a strategy accepted.
    pub fn at_corner(
        spec: &BoxSpec,
        corner: Point3,
        rotation: Rotation,
        container: ContainerId,
    ) -> Self {
        let extent = spec.dims.rotated(rotation);
        Self {
            box_id: spec.id.clone(),
            anchor: corner.offset_by(extent.anchor_offset()),
            rotation,
            container,
            extent,
        }
    }

    /// Lower corner of the box, recovered from the anchor.
    pub fn corner(&self) -> Point3 {
        // The anchor is built from the corner, so this never underflows.
        self.anchor
            .checked_sub(self.extent.anchor_offset())
            .unwrap_or_default()
    }

    /// The unpadded box occupied by this placement.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.corner(), self.extent)
    }

    /// The padded box used by the brute-force checks.
    pub fn padded_box(&self, gap: u32) -> BoundingBox {
        BoundingBox::padded(self.corner(), self.extent, gap)
    }

    pub fn volume(&self) -> u64 {
        self.extent.volume()
    }
}

/// Output record of a placement: `{box_id, box_loc, box_rot, pallet_id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlacementRecord {
    pub box_id: String,
    /// Footprint center in x/y, base height in z.
    #[schema(value_type = [u32; 3], example = json!([20, 20, 0]))]
    pub box_loc: (u32, u32, u32),
    /// Yaw rotation in degrees, `0` or `90`.
    #[schema(example = 0)]
    pub box_rot: u16,
    /// `1` for the main pallet, `2` for the buffer.
    #[schema(example = 1)]
    pub pallet_id: u8,
}

impl From<&Placement> for PlacementRecord {
    fn from(placement: &Placement) -> Self {
        Self {
            box_id: placement.box_id.clone(),
            box_loc: placement.anchor.as_tuple(),
            box_rot: placement.rotation.degrees(),
            pallet_id: placement.container.code(),
        }
    }
}

/// Per-box result of one strategy run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BoxOutcome {
    /// No path placed the box; it is absent from the result list.
    #[default]
    Unplaced,
    /// Resting on the buffer pallet.
    Buffered(Placement),
    /// Committed to the main pallet.
    MainPlaced(Placement),
}

impl BoxOutcome {
    pub fn placement(&self) -> Option<&Placement> {
        match self {
            BoxOutcome::Unplaced => None,
            BoxOutcome::Buffered(placement) | BoxOutcome::MainPlaced(placement) => Some(placement),
        }
    }

    pub fn is_placed(&self) -> bool {
        !matches!(self, BoxOutcome::Unplaced)
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, BoxOutcome::Buffered(_))
    }
}

/// A box that was dropped before any strategy ran because its record was malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedBox {
    pub box_id: String,
    pub reason: ValidationError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_spaced_triples() {
        assert_eq!(
            parse_box_size("1", "[30,40,20]").unwrap(),
            Extent3::new(30, 40, 20)
        );
        assert_eq!(
            parse_box_size("1", " [ 30 , 40 , 20 ] ").unwrap(),
            Extent3::new(30, 40, 20)
        );
    }

    #[test]
    fn two_dimensions_are_malformed() {
        let err = parse_box_size("b7", "[10,10]").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MalformedBoxSize { ref box_id, .. } if box_id == "b7"
        ));
    }

    #[test]
    fn garbage_tokens_are_dropped_before_counting() {
        assert!(parse_box_size("1", "[10,abc,10]").is_err());
        assert_eq!(
            parse_box_size("1", "[10,abc,10,20]").unwrap(),
            Extent3::new(10, 10, 20)
        );
    }

    #[test]
    fn fractional_tokens_are_not_truncated() {
        assert!(parse_box_size("1", "[10.5,10,10]").is_err());
        assert_eq!(
            parse_box_size("1", "[10.5,20,30,40]").unwrap(),
            Extent3::new(20, 30, 40)
        );
    }

    #[test]
    fn extra_dimensions_are_ignored() {
        assert_eq!(
            parse_box_size("1", "[1,2,3,4]").unwrap(),
            Extent3::new(1, 2, 3)
        );
    }

    #[test]
    fn non_positive_dimensions_are_rejected() {
        assert!(parse_box_size("1", "[0,10,10]").is_err());
        assert!(parse_box_size("1", "[10,-5,10]").is_err());
        assert!(parse_box_size("1", "[]").is_err());
    }

    #[test]
    fn box_from_record() {
        let record = BoxRecord::new("42", "[10,20,30]");
        let spec = BoxSpec::from_record(&record).unwrap();
        assert_eq!(spec.id, "42");
        assert_eq!(spec.volume(), 6_000);
    }

    #[test]
    fn container_rejects_zero_dimension() {
        assert!(ContainerSpec::new(Extent3::new(100, 0, 100)).is_err());
        assert!(ContainerSpec::new(Extent3::new(100, 100, 100)).is_ok());
    }

    #[test]
    fn placement_anchor_is_center_of_footprint_and_base_height() {
        let spec = BoxSpec::new("a", Extent3::new(40, 40, 40)).unwrap();
        let placement =
            Placement::at_corner(&spec, Point3::new(45, 0, 10), Rotation::Deg0, ContainerId::Main);
        assert_eq!(placement.anchor, Point3::new(65, 20, 10));
        assert_eq!(placement.corner(), Point3::new(45, 0, 10));
    }

    #[test]
    fn rotated_placement_centers_on_rotated_footprint() {
        let spec = BoxSpec::new("a", Extent3::new(10, 31, 5)).unwrap();
        let placement =
            Placement::at_corner(&spec, Point3::origin(), Rotation::Deg90, ContainerId::Main);
        assert_eq!(placement.extent, Extent3::new(31, 10, 5));
        assert_eq!(placement.anchor, Point3::new(16, 5, 0));
        assert_eq!(placement.corner(), Point3::origin());
    }

    #[test]
    fn container_id_codes() {
        assert_eq!(serde_json::to_string(&ContainerId::Buffer).unwrap(), "2");
        assert_eq!(ContainerId::try_from(1).unwrap(), ContainerId::Main);
        assert!(ContainerId::try_from(3).is_err());
    }

    #[test]
    fn placement_record_serializes_wire_fields() {
        let spec = BoxSpec::new("A", Extent3::new(40, 40, 40)).unwrap();
        let placement =
            Placement::at_corner(&spec, Point3::origin(), Rotation::Deg0, ContainerId::Main);
        let json = serde_json::to_value(PlacementRecord::from(&placement)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "box_id": "A",
                "box_loc": [20, 20, 0],
                "box_rot": 0,
                "pallet_id": 1
            })
        );
    }

    #[test]
    fn outcome_accessors() {
        let spec = BoxSpec::new("a", Extent3::new(1, 1, 1)).unwrap();
        let placement =
            Placement::at_corner(&spec, Point3::origin(), Rotation::Deg0, ContainerId::Buffer);
        let buffered = BoxOutcome::Buffered(placement.clone());
        assert!(buffered.is_buffered());
        assert_eq!(buffered.placement(), Some(&placement));
        assert!(!BoxOutcome::Unplaced.is_placed());
    }
}
