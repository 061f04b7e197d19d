// Move enumeration
//
// Legal single-step moves for one snake, plus the joint random move selection
// used by rollouts and MCTS expansion.

use rand::seq::IndexedRandom;
use rand::RngCore;

use crate::profile;
use crate::types::{Board, Coord, Direction, SnakeMove};

/// Direction returned when a snake has no legal move
pub const FALLBACK_DIRECTION: Direction = Direction::Up;

/// A legal single-step move for one snake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub direction: Direction,
    pub snake_id: String,
    /// Head position after the move
    pub head: Coord,
}

/// Generates all legal moves for a snake.
///
/// A move is legal if it stays in bounds and does not land on any body segment
/// other than a tail. Results follow [`Direction::all`] order. A snake missing
/// from the board has no moves.
pub fn legal_moves(board: &Board, snake_id: &str) -> Vec<Move> {
    profile!("move_gen", {
        let Some(snake) = board.snake(snake_id) else {
            return vec![];
        };
        let Some(&head) = snake.body.first() else {
            return vec![];
        };

        Direction::all()
            .iter()
            .map(|&direction| Move {
                direction,
                snake_id: snake.id.clone(),
                head: direction.apply(&head),
            })
            .filter(|mv| board.in_bounds(&mv.head) && !board.is_blocked(&mv.head))
            .collect()
    })
}

/// Directions of [`legal_moves`]
pub fn legal_directions(board: &Board, snake_id: &str) -> Vec<Direction> {
    legal_moves(board, snake_id)
        .into_iter()
        .map(|mv| mv.direction)
        .collect()
}

/// Legal directions, or just the fallback when there are none
pub fn directions_or_fallback(board: &Board, snake_id: &str) -> Vec<Direction> {
    let dirs = legal_directions(board, snake_id);
    if dirs.is_empty() {
        vec![FALLBACK_DIRECTION]
    } else {
        dirs
    }
}

/// Picks a uniformly random legal move (or the fallback) for every living snake
/// whose id is not in `skip`.
pub fn random_moves(board: &Board, skip: Option<&str>, rng: &mut dyn RngCore) -> Vec<SnakeMove> {
    board
        .snakes
        .iter()
        .filter(|s| Some(s.id.as_str()) != skip)
        .map(|s| {
            let dirs = legal_directions(board, &s.id);
            let direction = dirs.choose(&mut *rng).copied().unwrap_or(FALLBACK_DIRECTION);
            SnakeMove::new(&s.id, direction)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Battlesnake;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn body(cells: &[(i32, i32)]) -> Vec<Coord> {
        cells.iter().map(|&(x, y)| Coord::new(x, y)).collect()
    }

    fn board_with(snakes: Vec<Battlesnake>) -> Board {
        Board {
            height: 11,
            width: 11,
            food: vec![],
            snakes,
            hazards: vec![],
        }
    }

    #[test]
    fn test_neck_is_excluded_in_open_board() {
        let board = board_with(vec![Battlesnake::new(
            "me",
            100,
            body(&[(5, 5), (5, 4), (5, 3)]),
        )]);

        let dirs = legal_directions(&board, "me");
        assert_eq!(dirs, vec![Direction::Up, Direction::Left, Direction::Right]);
        assert!(!dirs.contains(&Direction::Down), "down runs into the neck");
    }

    #[test]
    fn test_moves_carry_resulting_head() {
        let board = board_with(vec![Battlesnake::new("me", 100, body(&[(5, 5), (5, 4)]))]);
        let up = legal_moves(&board, "me")
            .into_iter()
            .find(|m| m.direction == Direction::Up)
            .unwrap();
        assert_eq!(up.head, Coord::new(5, 6));
        assert_eq!(up.snake_id, "me");
    }

    #[test]
    fn test_corners_exclude_out_of_bounds() {
        let cases = [
            ((0, 0), vec![Direction::Up, Direction::Right]),
            ((0, 10), vec![Direction::Down, Direction::Right]),
            ((10, 0), vec![Direction::Up, Direction::Left]),
            ((10, 10), vec![Direction::Down, Direction::Left]),
        ];

        for ((x, y), expected) in cases {
            // freshly spawned snakes are stacked on one cell
            let board = board_with(vec![Battlesnake::new(
                "me",
                100,
                body(&[(x, y), (x, y), (x, y)]),
            )]);
            assert_eq!(legal_directions(&board, "me"), expected, "corner ({}, {})", x, y);
        }
    }

    #[test]
    fn test_edge_snake_moving_left_cannot_leave_board() {
        let board = board_with(vec![Battlesnake::new(
            "me",
            100,
            body(&[(0, 0), (1, 0), (2, 0)]),
        )]);
        assert_eq!(legal_directions(&board, "me"), vec![Direction::Up]);
    }

    #[test]
    fn test_other_snakes_tail_is_enterable() {
        let me = Battlesnake::new("me", 100, body(&[(5, 5), (4, 5)]));
        let other = Battlesnake::new("other", 100, body(&[(6, 3), (6, 4), (6, 5)]));
        let board = board_with(vec![me, other]);

        let dirs = legal_directions(&board, "me");
        assert!(dirs.contains(&Direction::Right), "tail at (6,5) vacates");
        assert!(dirs.contains(&Direction::Up));
        assert!(dirs.contains(&Direction::Down));
    }

    #[test]
    fn test_boxed_in_snake_has_no_moves() {
        let me = Battlesnake::new("me", 100, body(&[(0, 0), (1, 0), (1, 1), (0, 1), (0, 2)]));
        let board = board_with(vec![me]);
        assert!(legal_moves(&board, "me").is_empty());
        assert_eq!(directions_or_fallback(&board, "me"), vec![FALLBACK_DIRECTION]);
    }

    #[test]
    fn test_missing_snake_has_no_moves() {
        let board = board_with(vec![]);
        assert!(legal_moves(&board, "ghost").is_empty());
    }

    #[test]
    fn test_random_moves_are_legal_and_skip_self() {
        let me = Battlesnake::new("me", 100, body(&[(5, 5), (5, 4)]));
        let other = Battlesnake::new("other", 100, body(&[(0, 0), (1, 0), (2, 0)]));
        let board = board_with(vec![me, other]);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let moves = random_moves(&board, Some("me"), &mut rng);
            assert_eq!(moves, vec![SnakeMove::new("other", Direction::Up)]);
        }
    }
}
