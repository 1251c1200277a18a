//! Common types and traits for integer 3D geometry.
//!
//! All placement math in this crate runs on whole units: box and pallet
//! dimensions, corner positions and voxel indices are unsigned integers, so
//! two runs over the same input are bit-for-bit identical.

use serde::{Deserialize, Serialize};

/// Extents of an axis-aligned box: width (x), length (y) and height (z).
///
/// # Examples
/// ```
/// use pallet_stacker::types::{Extent3, Rotation};
///
/// let dims = Extent3::new(40, 20, 10);
/// assert_eq!(dims.volume(), 8_000);
/// assert_eq!(dims.rotated(Rotation::Deg90), Extent3::new(20, 40, 10));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent3 {
    pub width: u32,
    pub length: u32,
    pub height: u32,
}

impl Extent3 {
    /// Creates a new extent.
    #[inline]
    pub const fn new(width: u32, length: u32, height: u32) -> Self {
        Self {
            width,
            length,
            height,
        }
    }

    /// Volume as the product of all three extents.
    #[inline]
    pub fn volume(&self) -> u64 {
        u64::from(self.width) * u64::from(self.length) * u64::from(self.height)
    }

    /// Base area (width × length).
    #[inline]
    pub fn base_area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.length)
    }

    /// Applies a yaw rotation. 90° swaps width and length, height is untouched.
    #[inline]
    pub fn rotated(&self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::Deg0 => *self,
            Rotation::Deg90 => Self::new(self.length, self.width, self.height),
        }
    }

    /// Adds the stacking clearance on every axis.
    ///
    /// Saturates at `u32::MAX`. No other box can start at or past that
    /// coordinate, so a saturated extent collides exactly like the full one.
    #[inline]
    pub fn padded(&self, gap: u32) -> Self {
        Self::new(
            self.width.saturating_add(gap),
            self.length.saturating_add(gap),
            self.height.saturating_add(gap),
        )
    }

    /// Offset from a corner to the anchor point used in placement records.
    ///
    /// X and Y point at the footprint center (rounded up), Z stays on the base.
    #[inline]
    pub fn anchor_offset(&self) -> Point3 {
        Point3::new(self.width.div_ceil(2), self.length.div_ceil(2), 0)
    }

    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32, u32) {
        (self.width, self.length, self.height)
    }
}

impl From<(u32, u32, u32)> for Extent3 {
    #[inline]
    fn from((width, length, height): (u32, u32, u32)) -> Self {
        Self::new(width, length, height)
    }
}

/// An integer point inside a container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Point3 {
    #[inline]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// The container origin.
    #[inline]
    pub const fn origin() -> Self {
        Self::new(0, 0, 0)
    }

    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }

    /// Component-wise addition.
    #[inline]
    pub fn offset_by(&self, other: Point3) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Component-wise subtraction, `None` if any component would go negative.
    #[inline]
    pub fn checked_sub(&self, other: Point3) -> Option<Self> {
        Some(Self::new(
            self.x.checked_sub(other.x)?,
            self.y.checked_sub(other.y)?,
            self.z.checked_sub(other.z)?,
        ))
    }
}

/// Discrete yaw rotation about the vertical axis.
///
/// Serialized as the plain number of degrees (`0` or `90`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
}

impl Rotation {
    /// Rotations in the order a search tries them.
    pub const ALL: [Rotation; 2] = [Rotation::Deg0, Rotation::Deg90];

    #[inline]
    pub const fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            other => Err(format!("unsupported rotation {other}, expected 0 or 90")),
        }
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Extent3;

    /// Calculates the volume.
    fn volume(&self) -> u64 {
        self.dimensions().volume()
    }

    /// Calculates the base area.
    fn base_area(&self) -> u64 {
        self.dimensions().base_area()
    }
}

/// Axis-aligned bounding box over half-open integer intervals.
///
/// `[min.x, min.x + size.width) × [min.y, min.y + size.length) × [min.z, min.z + size.height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Point3,
    pub size: Extent3,
}

impl BoundingBox {
    #[inline]
    pub const fn new(min: Point3, size: Extent3) -> Self {
        Self { min, size }
    }

    /// The footprint a committed box claims: its extents plus the clearance gap,
    /// anchored at the unpadded corner.
    #[inline]
    pub fn padded(corner: Point3, extent: Extent3, gap: u32) -> Self {
        Self::new(corner, extent.padded(gap))
    }

    #[inline]
    pub fn max_x(&self) -> u64 {
        u64::from(self.min.x) + u64::from(self.size.width)
    }

    #[inline]
    pub fn max_y(&self) -> u64 {
        u64::from(self.min.y) + u64::from(self.size.length)
    }

    #[inline]
    pub fn max_z(&self) -> u64 {
        u64::from(self.min.z) + u64::from(self.size.height)
    }

    /// Separating axis test: no overlap iff the boxes are apart on at least one axis.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersects_footprint(other)
            && !(self.max_z() <= u64::from(other.min.z)
                || other.max_z() <= u64::from(self.min.z))
    }

    /// The same test restricted to the XY plane.
    #[inline]
    pub fn intersects_footprint(&self, other: &Self) -> bool {
        !(self.max_x() <= u64::from(other.min.x)
            || other.max_x() <= u64::from(self.min.x)
            || self.max_y() <= u64::from(other.min.y)
            || other.max_y() <= u64::from(self.min.y))
    }

    /// Checks whether this box lies entirely inside `[0, dims)` on every axis.
    #[inline]
    pub fn is_within(&self, dims: &Extent3) -> bool {
        self.max_x() <= u64::from(dims.width)
            && self.max_y() <= u64::from(dims.length)
            && self.max_z() <= u64::from(dims.height)
    }
}
