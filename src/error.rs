//! Error types for the stacking engine.

use thiserror::Error;

/// Validation error for box, pallet and configuration data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    /// A box size string did not yield three positive integers.
    #[error("Malformed box size '{raw}' for box {box_id}: {reason}")]
    MalformedBoxSize {
        box_id: String,
        raw: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors raised while building a collision grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("Grid cell size must be positive")]
    ZeroCellSize,

    /// Coverage of the last voxel row would silently fall short of the pallet.
    #[error("Pallet {axis} of {value} is not a multiple of the grid cell size {cell_size}")]
    Misaligned {
        axis: &'static str,
        value: u32,
        cell_size: u32,
    },

    /// The pallet would need more voxels than one grid may allocate.
    #[error(
        "Grid of {}x{}x{} cells exceeds the limit of {limit} cells",
        .cells.0,
        .cells.1,
        .cells.2
    )]
    TooLarge { cells: (u64, u64, u64), limit: u64 },
}

/// Errors that abort an engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Unsupported strategy: {0}")]
    UnsupportedStrategy(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Grid(#[from] GridError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_error_names_the_axis() {
        let err = GridError::Misaligned {
            axis: "width",
            value: 102,
            cell_size: 5,
        };
        assert_eq!(
            err.to_string(),
            "Pallet width of 102 is not a multiple of the grid cell size 5"
        );
    }

    #[test]
    fn engine_error_is_transparent_over_sources() {
        let err: EngineError = GridError::ZeroCellSize.into();
        assert_eq!(err.to_string(), "Grid cell size must be positive");
        assert!(matches!(err, EngineError::Grid(GridError::ZeroCellSize)));
    }

    #[test]
    fn too_large_grid_reports_cell_counts() {
        let err = GridError::TooLarge {
            cells: (20_000, 20_000, 20_000),
            limit: 1 << 26,
        };
        assert_eq!(
            err.to_string(),
            "Grid of 20000x20000x20000 cells exceeds the limit of 67108864 cells"
        );
    }
}
