//! Piece shapes, rotation and collision testing
//!
//! A piece is a small rectangular grid of occupied/empty cells plus a colour
//! tag and a top-left offset on the board. Rotation and collision are pure
//! functions; the engine decides whether a rotated or moved piece is kept.

use crate::board::Board;
use crate::error::SnapshotError;
use crate::{COLUMNS, ROWS, SPAWN_X};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Colour tag carried by a piece and by every board cell it freezes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceColor {
    Purple,
    Cyan,
    Yellow,
    Green,
    Red,
    Orange,
}

/// Largest width or height of a shape accepted from the wire.
pub const MAX_SHAPE_SIZE: usize = 4;

/// Occupancy grid of a piece, indexed `[row][column]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<bool>>", into = "Vec<Vec<bool>>")]
pub struct Shape(pub Vec<Vec<bool>>);

impl TryFrom<Vec<Vec<bool>>> for Shape {
    type Error = SnapshotError;

    fn try_from(rows: Vec<Vec<bool>>) -> Result<Self, Self::Error> {
        let width = rows.first().map_or(0, Vec::len);
        if rows.is_empty()
            || rows.len() > MAX_SHAPE_SIZE
            || width == 0
            || width > MAX_SHAPE_SIZE
            || rows.iter().any(|row| row.len() != width)
        {
            return Err(SnapshotError::ShapeSize);
        }
        Ok(Shape(rows))
    }
}

impl From<Shape> for Vec<Vec<bool>> {
    fn from(shape: Shape) -> Self {
        shape.0
    }
}

impl Shape {
    /// Builds a shape from 0/1 rows.
    pub fn from_bits(rows: &[&[u8]]) -> Self {
        Shape(
            rows.iter()
                .map(|row| row.iter().map(|&bit| bit != 0).collect())
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.0.len()
    }

    pub fn width(&self) -> usize {
        self.0.first().map_or(0, Vec::len)
    }

    /// Iterates the `(dx, dy)` offsets of occupied cells.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.0.iter().enumerate().flat_map(|(dy, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, &filled)| filled)
                .map(move |(dx, _)| (dx as i32, dy as i32))
        })
    }
}

/// Clockwise rotation: the transpose of the row-reversed grid.
pub fn rotate(shape: &Shape) -> Shape {
    let height = shape.height();
    let width = shape.width();
    let rotated = (0..width)
        .map(|col| (0..height).rev().map(|row| shape.0[row][col]).collect())
        .collect();
    Shape(rotated)
}

/// A falling piece positioned on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PieceFields")]
pub struct Piece {
    pub shape: Shape,
    pub color: PieceColor,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    pub fn new(shape: Shape, color: PieceColor) -> Self {
        Self {
            shape,
            color,
            x: SPAWN_X,
            y: 0,
        }
    }

    /// Picks one of the catalog pieces uniformly at random, at spawn position.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (bits, color) = CATALOG[rng.gen_range(0..CATALOG.len())];
        Piece::new(Shape::from_bits(bits), color)
    }

    /// Moves the piece back to the spawn position without touching its shape.
    pub fn reset_position(&mut self) {
        self.x = SPAWN_X;
        self.y = 0;
    }

    /// Absolute board coordinates of every occupied cell.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.shape
            .cells()
            .map(move |(dx, dy)| (self.x + dx, self.y + dy))
    }
}

/// Wire form of a piece before its position is checked.
#[derive(Deserialize)]
struct PieceFields {
    shape: Shape,
    color: PieceColor,
    x: i32,
    y: i32,
}

impl TryFrom<PieceFields> for Piece {
    type Error = SnapshotError;

    /// Accepts positions within one shape's reach of the board edges.
    fn try_from(fields: PieceFields) -> Result<Self, Self::Error> {
        let reach = MAX_SHAPE_SIZE as i32;
        let PieceFields { shape, color, x, y } = fields;
        if !(-reach..=COLUMNS as i32).contains(&x) || !(-reach..=ROWS as i32).contains(&y) {
            return Err(SnapshotError::Position { x, y });
        }
        Ok(Piece { shape, color, x, y })
    }
}

/// Shape table: T, I, O, S, Z, L.
pub const CATALOG: [(&[&[u8]], PieceColor); 6] = [
    (&[&[1, 1, 1], &[0, 1, 0]], PieceColor::Purple),
    (&[&[1, 1, 1, 1]], PieceColor::Cyan),
    (&[&[1, 1], &[1, 1]], PieceColor::Yellow),
    (&[&[0, 1, 1], &[1, 1, 0]], PieceColor::Green),
    (&[&[1, 1, 0], &[0, 1, 1]], PieceColor::Red),
    (&[&[1, 0], &[1, 0], &[1, 1]], PieceColor::Orange),
];

/// True if any occupied cell is off the sides, below the floor, or on top of
/// an occupied board cell. Cells above the visible board never collide.
pub fn collides(board: &Board, piece: &Piece) -> bool {
    piece.cells().any(|(x, y)| {
        x < 0
            || x >= COLUMNS as i32
            || y >= ROWS as i32
            || (y >= 0 && board.is_occupied(x as usize, y as usize))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn i_piece() -> Piece {
        Piece::new(Shape::from_bits(CATALOG[1].0), PieceColor::Cyan)
    }

    #[test]
    fn test_rotate_horizontal_bar_becomes_vertical() {
        let bar = Shape::from_bits(&[&[1, 1, 1, 1]]);
        let rotated = rotate(&bar);
        assert_eq!(rotated.height(), 4);
        assert_eq!(rotated.width(), 1);
        assert!(rotated.0.iter().all(|row| row[0]));
    }

    #[test]
    fn test_rotate_is_clockwise() {
        // L: [1,0],[1,0],[1,1] -> [1,1,1],[1,0,0]
        let l = Shape::from_bits(&[&[1, 0], &[1, 0], &[1, 1]]);
        assert_eq!(rotate(&l), Shape::from_bits(&[&[1, 1, 1], &[1, 0, 0]]));
    }

    #[test]
    fn test_four_rotations_return_to_start() {
        for (bits, _) in CATALOG {
            let shape = Shape::from_bits(bits);
            let back = rotate(&rotate(&rotate(&rotate(&shape))));
            assert_eq!(back, shape);
        }
    }

    #[test]
    fn test_collides_with_walls_and_floor() {
        let board = Board::new();
        let mut piece = i_piece();
        assert!(!collides(&board, &piece));

        piece.x = -1;
        assert!(collides(&board, &piece));

        piece.x = COLUMNS as i32 - 3;
        assert!(collides(&board, &piece));

        piece.x = 0;
        piece.y = ROWS as i32;
        assert!(collides(&board, &piece));

        piece.y = ROWS as i32 - 1;
        assert!(!collides(&board, &piece));
    }

    #[test]
    fn test_cells_above_board_never_collide() {
        let board = Board::new();
        let mut piece = i_piece();
        piece.shape = rotate(&piece.shape);
        piece.y = -3;
        assert!(!collides(&board, &piece));
    }

    #[test]
    fn test_collides_with_occupied_cell() {
        let mut board = Board::new();
        board.set(5, 0, Some(PieceColor::Red));
        let piece = i_piece();
        assert!(collides(&board, &piece));
    }

    #[test]
    fn test_random_piece_spawns_centered() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let piece = Piece::random(&mut rng);
            assert_eq!(piece.x, SPAWN_X);
            assert_eq!(piece.y, 0);
            assert!(piece.shape.cells().count() == 4);
        }
    }

    #[test]
    fn test_shape_serializes_as_boolean_grid() {
        let shape = Shape::from_bits(&[&[1, 0]]);
        let json = serde_json::to_string(&shape).unwrap();
        assert_eq!(json, "[[true,false]]");
    }

    #[test]
    fn test_deserialize_rejects_ragged_or_oversized_shapes() {
        assert!(serde_json::from_str::<Shape>("[[true,false],[true]]").is_err());
        assert!(serde_json::from_str::<Shape>("[]").is_err());
        assert!(serde_json::from_str::<Shape>("[[true,true,true,true,true]]").is_err());
        assert_eq!(
            serde_json::from_str::<Shape>("[[true],[true]]").unwrap(),
            Shape::from_bits(&[&[1], &[1]])
        );
    }

    #[test]
    fn test_deserialize_rejects_far_off_board_position() {
        let far = r#"{"shape":[[true]],"color":"red","x":2147483647,"y":0}"#;
        let err = serde_json::from_str::<Piece>(far).unwrap_err();
        assert!(err.to_string().contains("off the board"));

        let spawned = serde_json::to_string(&i_piece()).unwrap();
        assert_eq!(serde_json::from_str::<Piece>(&spawned).unwrap(), i_piece());
    }
}
