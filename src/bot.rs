// Decision controller
//
// Validates the request, picks a safe default answer immediately, then runs the
// configured search on a blocking thread while the async side polls for the
// deadline. Whatever the search has published when time runs out is the answer.

use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::board::BoardError;
use crate::config::{Config, SearchStrategy};
use crate::debug_logger::{DebugLogEntry, DebugLogger};
use crate::evaluator::Evaluator;
use crate::mcts::MctsSearch;
use crate::minimax::MinimaxSearch;
use crate::moves::{legal_directions, FALLBACK_DIRECTION};
use crate::rules::StandardRuleset;
use crate::simple_profiler;
use crate::types::{Battlesnake, Board, Direction, Game};

/// The move chosen for a turn and how it was reached
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub direction: Direction,
    /// Evaluator score (minimax) or mean rollout reward (MCTS); `None` if no search finished
    pub score: Option<f64>,
    /// Deepest minimax depth that produced this move, in plies
    pub depth: u32,
    pub iterations: u64,
    /// Why the move is a forced fallback, when it is
    pub annotation: Option<String>,
}

impl SearchResult {
    fn unsearched(direction: Direction, annotation: Option<&str>) -> Self {
        SearchResult {
            direction,
            score: None,
            depth: 0,
            iterations: 0,
            annotation: annotation.map(str::to_string),
        }
    }
}

/// Anytime result shared between the search thread and the poller
#[derive(Debug)]
pub struct SharedSearchState {
    best: Mutex<SearchResult>,
    search_complete: AtomicBool,
}

impl SharedSearchState {
    pub fn new(initial: SearchResult) -> Self {
        SharedSearchState {
            best: Mutex::new(initial),
            search_complete: AtomicBool::new(false),
        }
    }

    /// Replaces the current answer
    pub fn publish(&self, result: SearchResult) {
        *self.best.lock() = result;
    }

    /// Snapshot of the current answer
    pub fn best(&self) -> SearchResult {
        self.best.lock().clone()
    }

    pub fn mark_complete(&self) {
        self.search_complete.store(true, Ordering::Release);
    }

    pub fn is_complete(&self) -> bool {
        self.search_complete.load(Ordering::Acquire)
    }
}

/// Battlesnake bot
/// Takes static configuration and exposes methods corresponding to API endpoints
pub struct Bot {
    config: Config,
    ruleset: StandardRuleset,
    debug_logger: DebugLogger,
}

impl Bot {
    /// Creates a new Bot instance with the given configuration
    pub fn new(config: Config) -> Self {
        let ruleset = StandardRuleset::from_config(&config.rules);
        Bot {
            config,
            ruleset,
            debug_logger: DebugLogger::disabled(),
        }
    }

    pub fn with_debug_logger(mut self, debug_logger: DebugLogger) -> Self {
        self.debug_logger = debug_logger;
        self
    }

    /// Returns bot metadata and appearance
    /// Corresponds to GET / endpoint
    pub fn info(&self) -> Value {
        info!("INFO");

        let server = &self.config.server;
        json!({
            "apiversion": "1",
            "author": server.author,
            "color": server.color,
            "head": server.head,
            "tail": server.tail,
            "version": env!("CARGO_PKG_VERSION"),
        })
    }

    /// Called when a game starts
    /// Corresponds to POST /start endpoint
    pub fn start(&self, game: &Game, _turn: &i32, board: &Board, _you: &Battlesnake) {
        info!(
            "GAME START {} ({}x{}, {} snakes, strategy {})",
            game.id,
            board.width,
            board.height,
            board.snakes.len(),
            self.config.search.strategy.as_str()
        );
    }

    /// Called when a game ends
    /// Corresponds to POST /end endpoint
    pub fn end(&self, game: &Game, turn: &i32, board: &Board, you: &Battlesnake) {
        let outcome = if board.snake(&you.id).is_some() {
            "survived"
        } else {
            "eliminated"
        };
        info!("GAME OVER {} at turn {}: {}", game.id, turn, outcome);
    }

    /// Decides a move synchronously within `time_budget`.
    ///
    /// The budget includes the configured network overhead, which is reserved
    /// and not spent searching. Rejects malformed boards.
    pub fn decide(
        &self,
        board: &Board,
        you_id: &str,
        time_budget: Duration,
    ) -> Result<SearchResult, BoardError> {
        board.validate()?;
        let deadline = Instant::now() + self.search_window(time_budget);

        let shared = SharedSearchState::new(Self::initial_result(board, you_id));
        if Self::should_search(board, you_id) {
            Self::compute_best_move_internal(&self.config, &self.ruleset, board, you_id, deadline, &shared);
        }
        Ok(shared.best())
    }

    /// Computes the next move for the POST /move endpoint.
    ///
    /// The search runs on a blocking thread while this task polls the shared
    /// state, so the reply goes out on time even if an iteration is still running.
    pub async fn get_move(
        &self,
        game: &Game,
        turn: &i32,
        board: &Board,
        you: &Battlesnake,
    ) -> Result<Value, BoardError> {
        let start_time = Instant::now();
        board.validate()?;

        let budget = Duration::from_millis(self.config.timing.budget_for_timeout_ms(game.timeout));
        let window = self.search_window(budget);
        let deadline = start_time + window;

        info!("Turn {}: Computing move ({}ms window)", turn, window.as_millis());

        let shared = Arc::new(SharedSearchState::new(Self::initial_result(board, &you.id)));

        if Self::should_search(board, &you.id) {
            let shared_clone = shared.clone();
            let board_clone = board.clone();
            let you_id = you.id.clone();
            let config = self.config.clone();
            let ruleset = self.ruleset;

            tokio::task::spawn_blocking(move || {
                Bot::compute_best_move_internal(&config, &ruleset, &board_clone, &you_id, deadline, &shared_clone)
            });

            let polling_interval = Duration::from_millis(self.config.timing.polling_interval_ms.max(1));
            loop {
                tokio::time::sleep(polling_interval).await;
                if Instant::now() >= deadline || shared.is_complete() {
                    break;
                }
            }
        }

        let result = shared.best();
        info!(
            "Turn {}: Chose {} (score: {:?}, depth: {}, iterations: {}, time: {}ms)",
            turn,
            result.direction.as_str(),
            result.score,
            result.depth,
            result.iterations,
            start_time.elapsed().as_millis()
        );

        if self.debug_logger.is_enabled() {
            let mut entry = DebugLogEntry::new(
                *turn,
                &you.id,
                result.direction.as_str(),
                self.config.search.strategy.as_str(),
                board.clone(),
            );
            entry.score = result.score;
            entry.depth = result.depth;
            entry.iterations = result.iterations;
            self.debug_logger.log_move(entry);
        }

        let mut response = json!({ "move": result.direction.as_str() });
        if let Some(annotation) = result.annotation {
            response["shout"] = json!(annotation);
        }
        Ok(response)
    }

    fn search_window(&self, budget: Duration) -> Duration {
        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.config.timing.search_window_ms(budget_ms))
    }

    /// The answer before any search: first legal move, else the fallback
    fn initial_result(board: &Board, you_id: &str) -> SearchResult {
        if board.snake(you_id).is_none() {
            warn!("Snake {} is not on the board, answering {}", you_id, FALLBACK_DIRECTION);
            return SearchResult::unsearched(FALLBACK_DIRECTION, Some("eliminated"));
        }
        match legal_directions(board, you_id).first() {
            Some(&direction) => SearchResult::unsearched(direction, None),
            None => {
                info!("No legal moves available, answering {}", FALLBACK_DIRECTION);
                SearchResult::unsearched(FALLBACK_DIRECTION, Some("no legal moves"))
            }
        }
    }

    fn should_search(board: &Board, you_id: &str) -> bool {
        !legal_directions(board, you_id).is_empty()
    }

    /// Runs the configured search, publishing into `shared` as it improves
    fn compute_best_move_internal(
        config: &Config,
        ruleset: &StandardRuleset,
        board: &Board,
        you_id: &str,
        deadline: Instant,
        shared: &SharedSearchState,
    ) {
        let started = Instant::now();
        let evaluator = Evaluator::for_root(&config.scores, board);
        let rng = match config.search.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        match config.search.strategy {
            SearchStrategy::Minimax => {
                Self::iterative_deepening(config, ruleset, &evaluator, board, you_id, deadline, rng, shared)
            }
            SearchStrategy::Mcts => {
                Self::monte_carlo(config, ruleset, &evaluator, board, you_id, deadline, rng, shared)
            }
        }

        shared.mark_complete();
        simple_profiler::merge_thread_local();
        simple_profiler::print_report(started.elapsed().as_millis() as u64);
        simple_profiler::reset();
        info!("Search complete. Best move: {}", shared.best().direction.as_str());
    }

    #[allow(clippy::too_many_arguments)]
    fn iterative_deepening(
        config: &Config,
        ruleset: &StandardRuleset,
        evaluator: &Evaluator,
        board: &Board,
        you_id: &str,
        deadline: Instant,
        rng: StdRng,
        shared: &SharedSearchState,
    ) {
        let mut ordering = legal_directions(board, you_id);
        if ordering.is_empty() {
            return;
        }

        let mut search = MinimaxSearch::new(ruleset, evaluator, you_id, rng).with_deadline(deadline);
        let mut depth = config.minimax.initial_depth.max(1);
        let step = config.minimax.depth_step.max(1);
        let max_depth = config.minimax.max_depth.max(depth);

        while depth <= max_depth && Instant::now() < deadline {
            let outcome = search.search_root(board, depth, &ordering);

            let Some((direction, score)) = outcome.best else {
                debug!("Depth {} cut off before any root move finished", depth);
                break;
            };

            shared.publish(SearchResult {
                direction,
                score: Some(score),
                depth,
                iterations: search.nodes,
                annotation: None,
            });

            if !outcome.completed {
                info!("Depth {} cut off after {} root moves", depth, outcome.scores.len());
                break;
            }
            info!("Depth {} complete: {} ({})", depth, direction.as_str(), score);

            if score >= evaluator.win_score() || score <= evaluator.loss_score() {
                debug!("Outcome decided at depth {}", depth);
                break;
            }

            // principal variation first
            ordering.retain(|d| *d != direction);
            ordering.insert(0, direction);
            depth += step;
        }

        debug!("Minimax visited {} nodes with {} cutoffs", search.nodes, search.cutoffs);
    }

    #[allow(clippy::too_many_arguments)]
    fn monte_carlo(
        config: &Config,
        ruleset: &StandardRuleset,
        evaluator: &Evaluator,
        board: &Board,
        you_id: &str,
        deadline: Instant,
        rng: StdRng,
        shared: &SharedSearchState,
    ) {
        let mut search = MctsSearch::new(ruleset, evaluator, &config.mcts, you_id, board.clone(), rng);
        search.run(deadline, |tree| {
            let Some(direction) = tree.best_move() else {
                return;
            };
            let score = tree
                .root_children()
                .into_iter()
                .find(|c| c.direction == direction)
                .map(|c| c.mean_reward);
            shared.publish(SearchResult {
                direction,
                score,
                depth: 0,
                iterations: tree.iterations(),
                annotation: None,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coord;

    fn body(cells: &[(i32, i32)]) -> Vec<Coord> {
        cells.iter().map(|&(x, y)| Coord::new(x, y)).collect()
    }

    #[test]
    fn test_shared_state_publishes_latest() {
        let shared = SharedSearchState::new(SearchResult::unsearched(Direction::Up, None));
        assert!(!shared.is_complete());

        shared.publish(SearchResult {
            direction: Direction::Left,
            score: Some(3.0),
            depth: 4,
            iterations: 10,
            annotation: None,
        });
        shared.mark_complete();

        assert_eq!(shared.best().direction, Direction::Left);
        assert_eq!(shared.best().depth, 4);
        assert!(shared.is_complete());
    }

    #[test]
    fn test_initial_result_prefers_first_legal_move() {
        let board = Board {
            height: 11,
            width: 11,
            food: vec![],
            snakes: vec![Battlesnake::new("me", 50, body(&[(0, 5), (0, 4)]))],
            hazards: vec![],
        };
        let result = Bot::initial_result(&board, "me");
        assert_eq!(result.direction, Direction::Up);
        assert!(result.annotation.is_none());

        let gone = Bot::initial_result(&board, "ghost");
        assert_eq!(gone.direction, FALLBACK_DIRECTION);
        assert_eq!(gone.annotation.as_deref(), Some("eliminated"));
    }

    #[test]
    fn test_info_uses_configured_appearance() {
        let bot = Bot::new(Config::default_hardcoded());
        let info = bot.info();
        assert_eq!(info["apiversion"], "1");
        assert_eq!(info["author"], "Odin");
        assert_eq!(info["color"], "#3ebf37");
        assert_eq!(info["tail"], "freckled");
    }
}
