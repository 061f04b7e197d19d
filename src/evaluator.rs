// Static board evaluation from one snake's perspective

use crate::config::ScoresConfig;
use crate::profile;
use crate::types::Board;

/// Heuristic scorer used at search leaves and rollout horizons.
///
/// Scores are finite: elimination maps to `score_loss` and being the last snake
/// standing maps to `score_win`, so results stay orderable and serializable.
/// In a solo game (only one snake at the root) there is nobody to outlast, so
/// the win sentinel never applies.
#[derive(Debug, Clone)]
pub struct Evaluator {
    weights: ScoresConfig,
    solo: bool,
}

impl Evaluator {
    pub fn new(weights: &ScoresConfig, solo: bool) -> Self {
        Evaluator {
            weights: weights.clone(),
            solo,
        }
    }

    /// Builds an evaluator for a search rooted at `board`
    pub fn for_root(weights: &ScoresConfig, board: &Board) -> Self {
        Self::new(weights, board.snakes.len() <= 1)
    }

    pub fn win_score(&self) -> f64 {
        self.weights.score_win
    }

    pub fn loss_score(&self) -> f64 {
        self.weights.score_loss
    }

    /// True when `you` has been eliminated, the board is empty, or (outside
    /// solo games) `you` is the only snake left.
    pub fn is_terminal(&self, board: &Board, you: &str) -> bool {
        if board.snake(you).is_none() {
            return true;
        }
        !self.solo && board.snakes.len() == 1
    }

    /// Scores `board` for `you`; higher is better.
    ///
    /// Weighted sum of health, length lead over the longest opponent, distance to
    /// the nearest food (penalty) and free space reachable from the head.
    ///
    /// Being the only snake left returns `score_win` unless the game started solo,
    /// in which case the board is scored like any other.
    pub fn evaluate(&self, board: &Board, you: &str) -> f64 {
        profile!("eval", {
            let Some(me) = board.snake(you) else {
                return self.weights.score_loss;
            };
            if !self.solo && board.snakes.len() == 1 {
                return self.weights.score_win;
            }

            let w = &self.weights;
            let head = me.body.first().copied().unwrap_or(me.head);

            let longest_opponent = board
                .snakes
                .iter()
                .filter(|s| s.id != me.id)
                .map(|s| s.body.len() as f64)
                .reduce(f64::max);
            let length_lead = longest_opponent.map_or(0.0, |longest| me.body.len() as f64 - longest);

            let food_distance = board
                .nearest_food_distance(&head)
                .map_or(0.0, |d| d as f64);

            let space = board.free_space_from(head) as f64;

            w.weight_health * me.health as f64 + w.weight_length * length_lead
                - w.weight_food_distance * food_distance
                + w.weight_space * space
        })
    }
}
