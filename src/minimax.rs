//! Depth-bounded minimax with alpha-beta pruning.
//!
//! Battlesnake moves are simultaneous, so a round is split into two plies:
//! - MAX: our snake commits to a direction (the board is not advanced yet)
//! - MIN: every opponent picks a move jointly, as a single adversarial choice over
//!   the cartesian product of their legal moves, and the ruleset advances the board
//!   with our committed move plus that joint choice
//!
//! Depth counts plies. A MAX ply at depth 0 evaluates; a MIN ply always resolves
//! the round it belongs to, so depths `2k - 1` and `2k` both look `k` rounds ahead.

use itertools::Itertools;
use log::debug;
use rand::rngs::StdRng;
use std::time::Instant;

use crate::evaluator::Evaluator;
use crate::moves::{directions_or_fallback, legal_directions};
use crate::rules::Ruleset;
use crate::simple_profiler::record_alpha_beta_cutoff;
use crate::types::{Board, Direction, SnakeMove};

/// Returned up the recursion when the deadline passes mid-search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTimeout;

/// Which side chooses at a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ply {
    Max,
    /// Opponents choose; carries the direction our snake committed to
    Min(Direction),
}

/// Result of searching every root move at one depth
#[derive(Debug, Clone, Default)]
pub struct RootOutcome {
    /// Best root move among the ones that finished
    pub best: Option<(Direction, f64)>,
    /// Finished root moves in search order. Moves after the best may be bounds.
    pub scores: Vec<(Direction, f64)>,
    /// False when the deadline cut the iteration short
    pub completed: bool,
}

pub struct MinimaxSearch<'a> {
    ruleset: &'a dyn Ruleset,
    evaluator: &'a Evaluator,
    you: &'a str,
    deadline: Option<Instant>,
    rng: StdRng,
    pub nodes: u64,
    pub cutoffs: u64,
}

impl<'a> MinimaxSearch<'a> {
    pub fn new(ruleset: &'a dyn Ruleset, evaluator: &'a Evaluator, you: &'a str, rng: StdRng) -> Self {
        MinimaxSearch {
            ruleset,
            evaluator,
            you,
            deadline: None,
            rng,
            nodes: 0,
            cutoffs: 0,
        }
    }

    /// Aborts searches with [`SearchTimeout`] once `deadline` passes
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Scores `board` searched `depth` plies deep within the `(alpha, beta)` window.
    ///
    /// Pruning never changes the value: called with `(-inf, +inf)` this returns the
    /// exact minimax value. Only the deadline can end a search early.
    pub fn minimax(
        &mut self,
        board: &Board,
        depth: u32,
        mut alpha: f64,
        mut beta: f64,
        ply: Ply,
    ) -> Result<f64, SearchTimeout> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SearchTimeout);
        }
        self.nodes += 1;

        match ply {
            Ply::Max => {
                if depth == 0 || self.evaluator.is_terminal(board, self.you) {
                    return Ok(self.evaluator.evaluate(board, self.you));
                }

                let moves = legal_directions(board, self.you);
                if moves.is_empty() {
                    return Ok(self.evaluator.evaluate(board, self.you));
                }

                let mut best = f64::NEG_INFINITY;
                for dir in moves {
                    let value = self.minimax(board, depth - 1, alpha, beta, Ply::Min(dir))?;
                    best = best.max(value);
                    alpha = alpha.max(best);
                    if alpha >= beta {
                        self.cutoffs += 1;
                        record_alpha_beta_cutoff();
                        break;
                    }
                }
                Ok(best)
            }
            Ply::Min(committed) => {
                let mut best = f64::INFINITY;
                for joint in self.opponent_joint_moves(board) {
                    let mut moves = Vec::with_capacity(joint.len() + 1);
                    moves.push(SnakeMove::new(self.you, committed));
                    moves.extend(joint);

                    let next = self.ruleset.next_board(board, &moves, &mut self.rng);
                    let value = self.minimax(&next, depth.saturating_sub(1), alpha, beta, Ply::Max)?;
                    best = best.min(value);
                    beta = beta.min(best);
                    if alpha >= beta {
                        self.cutoffs += 1;
                        record_alpha_beta_cutoff();
                        break;
                    }
                }
                Ok(best)
            }
        }
    }

    /// Searches each root move in `ordering` at `depth` plies.
    ///
    /// Root moves that finish before the deadline are reported even when the
    /// iteration as a whole does not complete.
    pub fn search_root(&mut self, board: &Board, depth: u32, ordering: &[Direction]) -> RootOutcome {
        let mut outcome = RootOutcome::default();
        let mut alpha = f64::NEG_INFINITY;

        for &dir in ordering {
            match self.minimax(board, depth.saturating_sub(1), alpha, f64::INFINITY, Ply::Min(dir)) {
                Ok(value) => {
                    debug!("depth {} root {} -> {}", depth, dir.as_str(), value);
                    outcome.scores.push((dir, value));
                    if outcome.best.map_or(true, |(_, best)| value > best) {
                        outcome.best = Some((dir, value));
                    }
                    alpha = alpha.max(value);
                }
                Err(SearchTimeout) => return outcome,
            }
        }

        outcome.completed = true;
        outcome
    }

    /// Every joint choice of the opponents' moves. An opponent with no legal move
    /// contributes only the fallback direction, so the result is never empty.
    fn opponent_joint_moves(&self, board: &Board) -> Vec<Vec<SnakeMove>> {
        let options: Vec<Vec<SnakeMove>> = board
            .snakes
            .iter()
            .filter(|s| s.id != self.you)
            .map(|s| {
                directions_or_fallback(board, &s.id)
                    .into_iter()
                    .map(|d| SnakeMove::new(&s.id, d))
                    .collect()
            })
            .collect();

        if options.is_empty() {
            return vec![vec![]];
        }
        options.into_iter().multi_cartesian_product().collect()
    }
}
