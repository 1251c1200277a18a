//! Voxelized occupancy for a single pallet.
//!
//! The pallet is split into cubic cells of `cell_size` units. A cell is
//! occupied iff some committed box covers any part of it, so two boxes may
//! touch but never share a cell. Unlike the padded brute-force checks in
//! [`crate::geometry`], no clearance gap is added here.

use std::ops::Range;

use crate::error::GridError;
use crate::types::{Extent3, Point3, Rotation};

/// Edge length of one voxel in pallet units.
pub const DEFAULT_CELL_SIZE: u32 = 5;

/// Largest number of cells a grid may allocate (one byte each).
pub const MAX_CELLS: u64 = 1 << 26;

/// Append-only occupancy grid over one pallet.
///
/// Cells are stored flat with index `z * (cells_x * cells_y) + y * cells_x + x`.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    cell_size: u32,
    cells_x: usize,
    cells_y: usize,
    cells_z: usize,
    occupied: Vec<bool>,
}

impl OccupancyGrid {
    /// Creates an empty grid.
    ///
    /// Every pallet dimension must be a multiple of `cell_size`; otherwise the
    /// last row of cells would not reach the pallet edge, so the grid refuses
    /// to be built. Grids above [`MAX_CELLS`] cells are refused as well.
    ///
    /// # Examples
    /// ```
    /// use pallet_stacker::grid::OccupancyGrid;
    /// use pallet_stacker::types::Extent3;
    ///
    /// assert!(OccupancyGrid::new(Extent3::new(100, 100, 100), 5).is_ok());
    /// assert!(OccupancyGrid::new(Extent3::new(102, 100, 100), 5).is_err());
    /// ```
    pub fn new(dims: Extent3, cell_size: u32) -> Result<Self, GridError> {
        if cell_size == 0 {
            return Err(GridError::ZeroCellSize);
        }

        for (axis, value) in [
            ("width", dims.width),
            ("length", dims.length),
            ("height", dims.height),
        ] {
            if value % cell_size != 0 {
                return Err(GridError::Misaligned {
                    axis,
                    value,
                    cell_size,
                });
            }
        }

        let counts = (
            u64::from(dims.width / cell_size),
            u64::from(dims.length / cell_size),
            u64::from(dims.height / cell_size),
        );
        let total = counts
            .0
            .checked_mul(counts.1)
            .and_then(|cells| cells.checked_mul(counts.2))
            .filter(|cells| *cells <= MAX_CELLS)
            .ok_or(GridError::TooLarge {
                cells: counts,
                limit: MAX_CELLS,
            })?;

        // Bounded by MAX_CELLS, so every count and index fits in usize.
        Ok(Self {
            cell_size,
            cells_x: counts.0 as usize,
            cells_y: counts.1 as usize,
            cells_z: counts.2 as usize,
            occupied: vec![false; total as usize],
        })
    }

    /// Cell counts along x, y and z.
    pub fn cell_counts(&self) -> (usize, usize, usize) {
        (self.cells_x, self.cells_y, self.cells_z)
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.occupied.iter().filter(|cell| **cell).count()
    }

    /// Checks whether a single cell is occupied. Out-of-range cells report `false`.
    pub fn is_occupied(&self, x: usize, y: usize, z: usize) -> bool {
        if x >= self.cells_x || y >= self.cells_y || z >= self.cells_z {
            return false;
        }
        self.occupied[self.index(x, y, z)]
    }

    /// Checks whether a box can be committed at `position` with `rotation`.
    ///
    /// Fails if the rotated box reaches outside the pallet on any axis or if any
    /// covered cell is already occupied.
    pub fn can_place(&self, size: Extent3, position: Point3, rotation: Rotation) -> bool {
        let Some((xs, ys, zs)) = self.spans(size.rotated(rotation), position) else {
            return false;
        };

        for z in zs {
            for y in ys.clone() {
                for x in xs.clone() {
                    if self.occupied[self.index(x, y, z)] {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Marks every cell covered by the rotated box as occupied.
    ///
    /// The caller must have checked [`can_place`](Self::can_place) with the same
    /// arguments; nothing is re-validated here. Parts outside the pallet are ignored.
    pub fn commit(&mut self, size: Extent3, position: Point3, rotation: Rotation) {
        let extent = size.rotated(rotation);
        let xs = self.clamp(self.span(position.x, extent.width), self.cells_x);
        let ys = self.clamp(self.span(position.y, extent.length), self.cells_y);
        let zs = self.clamp(self.span(position.z, extent.height), self.cells_z);

        for z in zs {
            for y in ys.clone() {
                for x in xs.clone() {
                    let idx = self.index(x, y, z);
                    self.occupied[idx] = true;
                }
            }
        }
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * (self.cells_x * self.cells_y) + y * self.cells_x + x
    }

    /// Cells touched by the interval `[start, start + len)`.
    #[inline]
    fn span(&self, start: u32, len: u32) -> Range<usize> {
        let first = start / self.cell_size;
        let end = (u64::from(start) + u64::from(len)).div_ceil(u64::from(self.cell_size));
        first as usize..end as usize
    }

    #[inline]
    fn clamp(&self, span: Range<usize>, limit: usize) -> Range<usize> {
        span.start.min(limit)..span.end.min(limit)
    }

    /// Cell ranges of a box, `None` if any range leaves the grid.
    fn spans(
        &self,
        extent: Extent3,
        position: Point3,
    ) -> Option<(Range<usize>, Range<usize>, Range<usize>)> {
        let xs = self.span(position.x, extent.width);
        let ys = self.span(position.y, extent.length);
        let zs = self.span(position.z, extent.height);

        if xs.end > self.cells_x || ys.end > self.cells_y || zs.end > self.cells_z {
            return None;
        }
        Some((xs, ys, zs))
    }
}
