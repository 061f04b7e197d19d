// Turn transition
//
// The search never reimplements collision or starvation rules; it asks a Ruleset
// for the successor board. StandardRuleset follows the official standard rules:
// move, reduce health, feed, spawn food, eliminate.

use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};
use std::collections::HashSet;

use crate::config::RulesConfig;
use crate::moves::FALLBACK_DIRECTION;
use crate::profile;
use crate::types::{Board, Coord, SnakeMove};

/// Advances a board by one turn.
///
/// Implementations must be pure apart from the supplied RNG, so they can be
/// called from concurrent rollouts without synchronization.
pub trait Ruleset: Send + Sync {
    /// Returns the successor of `board` given one move per living snake.
    /// Snakes without an entry in `moves` move [`FALLBACK_DIRECTION`].
    fn next_board(&self, board: &Board, moves: &[SnakeMove], rng: &mut dyn RngCore) -> Board;
}

/// Standard Battlesnake rules
#[derive(Debug, Clone, Copy)]
pub struct StandardRuleset {
    /// Percent chance of spawning one food per turn once the minimum is met
    pub food_spawn_chance: u32,
    pub minimum_food: usize,
    pub max_health: i32,
}

impl StandardRuleset {
    pub fn from_config(config: &RulesConfig) -> Self {
        StandardRuleset {
            food_spawn_chance: config.food_spawn_chance,
            minimum_food: config.minimum_food,
            max_health: config.max_health,
        }
    }

    /// Ruleset that never spawns food, so transitions are fully deterministic
    pub fn deterministic() -> Self {
        StandardRuleset {
            food_spawn_chance: 0,
            minimum_food: 0,
            max_health: 100,
        }
    }

    fn move_snakes(board: &mut Board, moves: &[SnakeMove]) {
        for snake in board.snakes.iter_mut() {
            let direction = moves
                .iter()
                .find(|m| m.id == snake.id)
                .map(|m| m.direction)
                .unwrap_or(FALLBACK_DIRECTION);

            let current = snake.body.first().copied().unwrap_or(snake.head);
            let new_head = direction.apply(&current);
            snake.body.insert(0, new_head);
            snake.body.pop();
            snake.head = new_head;
            snake.length = snake.body.len() as i32;
        }
    }

    fn feed_snakes(&self, board: &mut Board) {
        let mut eaten: HashSet<Coord> = HashSet::new();

        for snake in board.snakes.iter_mut() {
            if !board.food.contains(&snake.head) {
                continue;
            }
            snake.health = self.max_health;
            if let Some(tail) = snake.tail() {
                snake.body.push(tail);
            }
            snake.length = snake.body.len() as i32;
            eaten.insert(snake.head);
        }

        board.food.retain(|f| !eaten.contains(f));
    }

    fn spawn_food(&self, board: &mut Board, rng: &mut dyn RngCore) {
        let wanted = if board.food.len() < self.minimum_food {
            self.minimum_food - board.food.len()
        } else if self.food_spawn_chance > 0 && rng.random_range(0..100) < self.food_spawn_chance {
            1
        } else {
            0
        };

        if wanted == 0 {
            return;
        }

        let mut empty = board.empty_cells();
        for _ in 0..wanted {
            let Some(&cell) = empty.choose(&mut *rng) else {
                break;
            };
            board.food.push(cell);
            empty.retain(|c| *c != cell);
        }
    }

    fn eliminate(board: &mut Board) {
        // first pass: walls and starvation
        let survivors: Vec<bool> = board
            .snakes
            .iter()
            .map(|s| board.in_bounds(&s.head) && s.health > 0)
            .collect();

        // second pass: collisions against first-pass survivors only
        let mut eliminated: Vec<bool> = survivors.iter().map(|alive| !alive).collect();
        for (i, snake) in board.snakes.iter().enumerate() {
            if !survivors[i] {
                continue;
            }

            if snake.body[1..].contains(&snake.head) {
                eliminated[i] = true;
                continue;
            }

            for (j, other) in board.snakes.iter().enumerate() {
                if i == j || !survivors[j] {
                    continue;
                }
                if other.body[1..].contains(&snake.head) {
                    eliminated[i] = true;
                    break;
                }
                if other.head == snake.head && snake.body.len() <= other.body.len() {
                    eliminated[i] = true;
                    break;
                }
            }
        }

        let mut flags = eliminated.into_iter();
        board.snakes.retain(|_| !flags.next().unwrap_or(false));
    }
}

impl Default for StandardRuleset {
    fn default() -> Self {
        StandardRuleset {
            food_spawn_chance: 25,
            minimum_food: 1,
            max_health: 100,
        }
    }
}

impl Ruleset for StandardRuleset {
    fn next_board(&self, board: &Board, moves: &[SnakeMove], rng: &mut dyn RngCore) -> Board {
        profile!("transition", {
            let mut next = board.clone();

            Self::move_snakes(&mut next, moves);
            for snake in next.snakes.iter_mut() {
                snake.health -= 1;
            }
            self.feed_snakes(&mut next);
            self.spawn_food(&mut next, rng);
            Self::eliminate(&mut next);

            next
        })
    }
}
