// Board model queries and input validation
//
// Everything here is a pure function of a board snapshot. Occupancy treats every
// snake's last segment as vacating, since tails move unless the snake just ate;
// the ruleset resolves the growth case when the turn is actually simulated.

use std::collections::{HashSet, VecDeque};
use thiserror::Error;

use crate::profile;
use crate::types::{Battlesnake, Board, Coord, Direction};

/// Largest board area accepted for search; every leaf flood-fills the whole board
pub const MAX_BOARD_CELLS: i64 = 2_500;

/// Reasons a board is rejected before search begins
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("board dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("board of {width}x{height} exceeds the maximum board area")]
    TooLarge { width: i32, height: i32 },

    #[error("snake id '{0}' appears more than once")]
    DuplicateSnakeId(String),

    #[error("snake '{0}' has an empty body")]
    EmptyBody(String),

    #[error("snake '{id}' has a body segment out of bounds at ({x}, {y})")]
    SegmentOutOfBounds { id: String, x: i32, y: i32 },

    #[error("snake '{0}' has non-adjacent consecutive body segments")]
    DisjointBody(String),

    #[error("snake '{id}' reports head ({x}, {y}) but its body starts elsewhere")]
    HeadMismatch { id: String, x: i32, y: i32 },

    #[error("snake '{id}' reports length {length} but has {segments} segments")]
    LengthMismatch {
        id: String,
        length: i32,
        segments: usize,
    },

    #[error("snake '{id}' has health {health} outside 0..=100")]
    InvalidHealth { id: String, health: i32 },

    #[error("food at ({x}, {y}) is listed more than once")]
    DuplicateFood { x: i32, y: i32 },

    #[error("food at ({x}, {y}) is out of bounds")]
    FoodOutOfBounds { x: i32, y: i32 },
}

impl Board {
    /// Checks if a coordinate lies within `[0, width) x [0, height)`
    pub fn in_bounds(&self, coord: &Coord) -> bool {
        coord.x >= 0 && coord.x < self.width && coord.y >= 0 && coord.y < self.height
    }

    /// Finds a snake by identifier. Absence means the snake has been eliminated.
    pub fn snake(&self, id: &str) -> Option<&Battlesnake> {
        self.snakes.iter().find(|s| s.id == id)
    }

    pub fn is_food(&self, coord: &Coord) -> bool {
        self.food.contains(coord)
    }

    /// True when any snake's body covers the cell, tails included
    pub fn is_occupied(&self, coord: &Coord) -> bool {
        self.snakes.iter().any(|s| s.body.contains(coord))
    }

    /// True when the cell is covered by a body segment that will still be there
    /// next turn. Each snake's last segment is treated as vacating.
    pub fn is_blocked(&self, coord: &Coord) -> bool {
        self.snakes.iter().any(|s| {
            let keep = s.body.len().saturating_sub(1);
            s.body[..keep].contains(coord)
        })
    }

    /// Counts the cells reachable from `start` without crossing walls or
    /// blocked body segments. The start cell itself is not counted.
    pub fn free_space_from(&self, start: Coord) -> usize {
        profile!("flood_fill", {
            let mut seen: HashSet<Coord> = HashSet::new();
            let mut queue = VecDeque::new();
            seen.insert(start);
            queue.push_back(start);

            while let Some(cell) = queue.pop_front() {
                for dir in Direction::all() {
                    let next = dir.apply(&cell);
                    if !self.in_bounds(&next) || self.is_blocked(&next) || seen.contains(&next) {
                        continue;
                    }
                    seen.insert(next);
                    queue.push_back(next);
                }
            }

            seen.len() - 1
        })
    }

    /// Manhattan distance from `from` to the closest food, if any food exists
    pub fn nearest_food_distance(&self, from: &Coord) -> Option<i32> {
        self.food.iter().map(|f| from.manhattan_distance(f)).min()
    }

    /// All cells neither covered by a snake nor holding food
    pub fn empty_cells(&self) -> Vec<Coord> {
        let mut cells = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let c = Coord::new(x, y);
                if !self.is_occupied(&c) && !self.is_food(&c) {
                    cells.push(c);
                }
            }
        }
        cells
    }

    /// Rejects boards that would make every downstream score meaningless
    pub fn validate(&self) -> Result<(), BoardError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(BoardError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.width as i64 * self.height as i64 > MAX_BOARD_CELLS {
            return Err(BoardError::TooLarge {
                width: self.width,
                height: self.height,
            });
        }

        let mut ids = HashSet::new();
        for snake in &self.snakes {
            if !ids.insert(snake.id.as_str()) {
                return Err(BoardError::DuplicateSnakeId(snake.id.clone()));
            }
            if snake.body.is_empty() {
                return Err(BoardError::EmptyBody(snake.id.clone()));
            }
            if !(0..=100).contains(&snake.health) {
                return Err(BoardError::InvalidHealth {
                    id: snake.id.clone(),
                    health: snake.health,
                });
            }
            if let Some(seg) = snake.body.iter().find(|seg| !self.in_bounds(seg)) {
                return Err(BoardError::SegmentOutOfBounds {
                    id: snake.id.clone(),
                    x: seg.x,
                    y: seg.y,
                });
            }
            // growth stacks the tail, so equal neighbours are allowed
            let disjoint = snake
                .body
                .windows(2)
                .any(|pair| pair[0] != pair[1] && !pair[0].is_adjacent(&pair[1]));
            if disjoint {
                return Err(BoardError::DisjointBody(snake.id.clone()));
            }
            if snake.body[0] != snake.head {
                return Err(BoardError::HeadMismatch {
                    id: snake.id.clone(),
                    x: snake.head.x,
                    y: snake.head.y,
                });
            }
            if snake.length < 0 || snake.length as usize != snake.body.len() {
                return Err(BoardError::LengthMismatch {
                    id: snake.id.clone(),
                    length: snake.length,
                    segments: snake.body.len(),
                });
            }
        }

        let mut food = HashSet::new();
        for f in &self.food {
            if !self.in_bounds(f) {
                return Err(BoardError::FoodOutOfBounds { x: f.x, y: f.y });
            }
            if !food.insert(*f) {
                return Err(BoardError::DuplicateFood { x: f.x, y: f.y });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(snakes: Vec<Battlesnake>) -> Board {
        Board {
            height: 11,
            width: 11,
            food: vec![],
            snakes,
            hazards: vec![],
        }
    }

    fn body(cells: &[(i32, i32)]) -> Vec<Coord> {
        cells.iter().map(|&(x, y)| Coord::new(x, y)).collect()
    }

    #[test]
    fn test_in_bounds_at_all_corners() {
        let board = board_with(vec![]);
        for corner in [(0, 0), (0, 10), (10, 0), (10, 10)] {
            assert!(board.in_bounds(&Coord::new(corner.0, corner.1)));
        }
        for outside in [(-1, 0), (0, -1), (11, 10), (10, 11)] {
            assert!(!board.in_bounds(&Coord::new(outside.0, outside.1)));
        }
    }

    #[test]
    fn test_tail_is_not_blocked() {
        let snake = Battlesnake::new("a", 100, body(&[(5, 5), (5, 4), (5, 3)]));
        let board = board_with(vec![snake]);

        assert!(board.is_blocked(&Coord::new(5, 4)));
        assert!(!board.is_blocked(&Coord::new(5, 3)));
        assert!(board.is_occupied(&Coord::new(5, 3)));
    }

    #[test]
    fn test_stacked_tail_stays_blocked_once() {
        // a snake that just ate has its tail duplicated
        let snake = Battlesnake::new("a", 100, body(&[(5, 5), (5, 4), (5, 4)]));
        let board = board_with(vec![snake]);
        assert!(board.is_blocked(&Coord::new(5, 4)));
    }

    #[test]
    fn test_free_space_on_empty_board() {
        let snake = Battlesnake::new("a", 100, body(&[(0, 0)]));
        let board = board_with(vec![snake]);
        assert_eq!(board.free_space_from(Coord::new(0, 0)), 120);
    }

    #[test]
    fn test_free_space_in_sealed_pocket() {
        // wall of snake b cuts off the bottom-left 2x2 corner
        let a = Battlesnake::new("a", 100, body(&[(0, 0)]));
        let b = Battlesnake::new(
            "b",
            100,
            body(&[(2, 0), (2, 1), (2, 2), (1, 2), (0, 2), (0, 3)]),
        );
        let board = board_with(vec![a, b]);
        assert_eq!(board.free_space_from(Coord::new(0, 0)), 3);
    }

    #[test]
    fn test_nearest_food_distance() {
        let mut board = board_with(vec![]);
        assert_eq!(board.nearest_food_distance(&Coord::new(0, 0)), None);
        board.food = vec![Coord::new(3, 4), Coord::new(1, 1)];
        assert_eq!(board.nearest_food_distance(&Coord::new(0, 0)), Some(2));
    }

    #[test]
    fn test_validate_accepts_well_formed_board() {
        let a = Battlesnake::new("a", 100, body(&[(1, 1), (1, 1), (1, 1)]));
        let b = Battlesnake::new("b", 3, body(&[(5, 5), (6, 5)]));
        let mut board = board_with(vec![a, b]);
        board.food = vec![Coord::new(2, 2)];
        assert_eq!(board.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_malformed_boards() {
        let mut board = board_with(vec![]);
        board.width = 0;
        assert!(matches!(
            board.validate(),
            Err(BoardError::InvalidDimensions { .. })
        ));

        let a = Battlesnake::new("a", 100, body(&[(1, 1)]));
        let board = board_with(vec![a.clone(), a]);
        assert_eq!(
            board.validate(),
            Err(BoardError::DuplicateSnakeId("a".to_string()))
        );

        let board = board_with(vec![Battlesnake::new("a", 100, vec![])]);
        assert_eq!(board.validate(), Err(BoardError::EmptyBody("a".to_string())));

        let board = board_with(vec![Battlesnake::new("a", 100, body(&[(1, 1), (3, 1)]))]);
        assert_eq!(board.validate(), Err(BoardError::DisjointBody("a".to_string())));

        let board = board_with(vec![Battlesnake::new("a", 101, body(&[(1, 1)]))]);
        assert!(matches!(board.validate(), Err(BoardError::InvalidHealth { .. })));

        let mut board = board_with(vec![]);
        board.food = vec![Coord::new(2, 2), Coord::new(2, 2)];
        assert_eq!(board.validate(), Err(BoardError::DuplicateFood { x: 2, y: 2 }));

        let mut stray = Battlesnake::new("a", 100, body(&[(5, 5), (5, 4)]));
        stray.head = Coord::new(0, 0);
        let board = board_with(vec![stray]);
        assert_eq!(
            board.validate(),
            Err(BoardError::HeadMismatch {
                id: "a".to_string(),
                x: 0,
                y: 0
            })
        );

        let mut padded = Battlesnake::new("a", 100, body(&[(5, 5), (5, 4)]));
        padded.length = 42;
        let board = board_with(vec![padded]);
        assert_eq!(
            board.validate(),
            Err(BoardError::LengthMismatch {
                id: "a".to_string(),
                length: 42,
                segments: 2
            })
        );
    }

    #[test]
    fn test_validate_caps_board_area() {
        let snake = Battlesnake::new("a", 100, body(&[(1, 1)]));
        let mut board = board_with(vec![snake]);
        board.width = 50;
        board.height = 50;
        assert_eq!(board.validate(), Ok(()));

        board.width = 51;
        assert_eq!(
            board.validate(),
            Err(BoardError::TooLarge {
                width: 51,
                height: 50
            })
        );

        // the product would overflow i32
        board.width = 100_000;
        board.height = 100_000;
        assert!(matches!(board.validate(), Err(BoardError::TooLarge { .. })));
    }
}
