//! Brute-force collision checks and contact geometry.
//!
//! Strategies that keep a short list of committed boxes test each candidate
//! against every entry instead of maintaining a voxel grid. Entries are padded
//! footprints (see [`BoundingBox::padded`]), so any two boxes accepted through
//! these checks keep at least one gap of clearance on the positive side.

use crate::types::BoundingBox;

/// Minimum supported share of a box base for [`has_support`].
pub const DEFAULT_MIN_SUPPORT_RATIO: f64 = 0.3;

/// Checks whether a candidate overlaps any committed box.
///
/// # Parameters
/// * `candidate` - The padded box to test
/// * `committed` - Padded boxes already accepted in the same container
///
/// # Returns
/// `true` if the candidate intersects at least one entry on all three axes
///
/// # Examples
/// ```
/// use pallet_stacker::geometry::overlaps_any;
/// use pallet_stacker::types::{BoundingBox, Extent3, Point3};
///
/// let placed = vec![BoundingBox::padded(Point3::origin(), Extent3::new(40, 40, 40), 5)];
/// let near = BoundingBox::padded(Point3::new(40, 0, 0), Extent3::new(40, 40, 40), 5);
/// let far = BoundingBox::padded(Point3::new(45, 0, 0), Extent3::new(40, 40, 40), 5);
/// assert!(overlaps_any(&near, &placed));
/// assert!(!overlaps_any(&far, &placed));
/// ```
pub fn overlaps_any(candidate: &BoundingBox, committed: &[BoundingBox]) -> bool {
    committed.iter().any(|placed| candidate.intersects(placed))
}

/// Like [`overlaps_any`], but only compares the XY footprints.
///
/// Used for single-layer containers where every box rests on the floor.
pub fn overlaps_any_footprint(candidate: &BoundingBox, committed: &[BoundingBox]) -> bool {
    committed
        .iter()
        .any(|placed| candidate.intersects_footprint(placed))
}

/// Length of the overlap of two half-open intervals, at least 0.
///
/// # Examples
/// ```
/// use pallet_stacker::geometry::overlap_1d;
///
/// assert_eq!(overlap_1d(0, 5, 3, 8), 2);
/// assert_eq!(overlap_1d(0, 5, 5, 8), 0);
/// ```
pub fn overlap_1d(a_min: u64, a_max: u64, b_min: u64, b_max: u64) -> u64 {
    a_max.min(b_max).saturating_sub(a_min.max(b_min))
}

/// Overlap area of two boxes in the XY plane.
pub fn overlap_area_xy(a: &BoundingBox, b: &BoundingBox) -> u64 {
    let over_x = overlap_1d(u64::from(a.min.x), a.max_x(), u64::from(b.min.x), b.max_x());
    let over_y = overlap_1d(u64::from(a.min.y), a.max_y(), u64::from(b.min.y), b.max_y());
    // Each overlap is bounded by a u32 extent.
    over_x * over_y
}

/// Fraction of a box base that rests on the tops of other boxes.
///
/// A supporting box counts only when its top ends exactly at the base height
/// of `target`. Boxes on the floor are fully supported.
///
/// # Parameters
/// * `target` - The box whose base is inspected
/// * `others` - Candidate supporting boxes (in the same padding convention as `target`'s base)
///
/// # Returns
/// Supported share of the base area in `[0.0, 1.0]`
pub fn support_ratio(target: &BoundingBox, others: &[BoundingBox]) -> f64 {
    if target.min.z == 0 {
        return 1.0;
    }

    let base_area = target.size.base_area();
    if base_area == 0 {
        return 0.0;
    }

    let supported: u64 = others
        .iter()
        .filter(|other| other.max_z() == u64::from(target.min.z))
        .map(|other| overlap_area_xy(target, other))
        .sum();

    (supported as f64 / base_area as f64).min(1.0)
}

/// Checks whether at least `min_ratio` of a box base is supported.
///
/// Not enforced by any placement strategy; used for run diagnostics.
pub fn has_support(target: &BoundingBox, others: &[BoundingBox], min_ratio: f64) -> bool {
    support_ratio(target, others) >= min_ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Extent3, Point3};

    fn padded(x: u32, y: u32, z: u32, w: u32, l: u32, h: u32) -> BoundingBox {
        BoundingBox::padded(Point3::new(x, y, z), Extent3::new(w, l, h), 5)
    }

    #[test]
    fn empty_list_never_overlaps() {
        assert!(!overlaps_any(&padded(0, 0, 0, 10, 10, 10), &[]));
    }

    #[test]
    fn padding_blocks_touching_neighbour() {
        let committed = vec![padded(0, 0, 0, 40, 40, 40)];
        for x in (0..45).step_by(5) {
            assert!(overlaps_any(&padded(x, 0, 0, 40, 40, 40), &committed));
        }
        assert!(!overlaps_any(&padded(45, 0, 0, 40, 40, 40), &committed));
    }

    #[test]
    fn separated_on_one_axis_is_enough() {
        let committed = vec![padded(0, 0, 0, 10, 10, 10)];
        assert!(!overlaps_any(&padded(0, 0, 15, 10, 10, 10), &committed));
        assert!(!overlaps_any(&padded(0, 15, 0, 10, 10, 10), &committed));
    }

    #[test]
    fn footprint_check_ignores_z() {
        let committed = vec![padded(0, 0, 0, 10, 10, 10)];
        let above = padded(0, 0, 100, 10, 10, 10);
        assert!(!overlaps_any(&above, &committed));
        assert!(overlaps_any_footprint(&above, &committed));
    }

    #[test]
    fn overlap_area_of_partially_shifted_boxes() {
        let a = BoundingBox::new(Point3::origin(), Extent3::new(10, 10, 10));
        let b = BoundingBox::new(Point3::new(5, 5, 0), Extent3::new(10, 10, 10));
        assert_eq!(overlap_area_xy(&a, &b), 25);
    }

    #[test]
    fn floor_boxes_are_fully_supported() {
        let target = padded(30, 30, 0, 10, 10, 10);
        assert_eq!(support_ratio(&target, &[]), 1.0);
    }

    #[test]
    fn support_counts_only_exact_contact() {
        // Padded top of the lower box ends at z = 15.
        let lower = padded(0, 0, 0, 10, 10, 10);
        let resting = padded(0, 0, 15, 10, 10, 10);
        let floating = padded(0, 0, 20, 10, 10, 10);

        assert!(has_support(&resting, &[lower], DEFAULT_MIN_SUPPORT_RATIO));
        assert!(!has_support(&floating, &[lower], DEFAULT_MIN_SUPPORT_RATIO));
    }

    #[test]
    fn partial_support_is_a_fraction_of_the_base() {
        let lower = BoundingBox::new(Point3::origin(), Extent3::new(10, 10, 10));
        let upper = BoundingBox::new(Point3::new(5, 0, 10), Extent3::new(10, 10, 10));
        let ratio = support_ratio(&upper, &[lower]);
        assert!((ratio - 0.5).abs() < 1e-9);
        assert!(has_support(&upper, &[lower], 0.5));
        assert!(!has_support(&upper, &[lower], 0.6));
    }
}
