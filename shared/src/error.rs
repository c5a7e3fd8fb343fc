use crate::piece::MAX_SHAPE_SIZE;
use crate::{COLUMNS, ROWS};
use thiserror::Error;

/// Reasons a received board or piece is refused while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("board must be {}x{} cells", ROWS, COLUMNS)]
    BoardSize,
    #[error(
        "piece shape must be a non-empty rectangle of at most {}x{} cells",
        MAX_SHAPE_SIZE,
        MAX_SHAPE_SIZE
    )]
    ShapeSize,
    #[error("piece position ({x}, {y}) is off the board")]
    Position { x: i32, y: i32 },
}
