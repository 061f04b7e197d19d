//! Monte Carlo tree search over our snake's moves.
//!
//! Nodes live in an arena and refer to each other by index. Each node stores the
//! board reached by its action; opponent replies along an edge are sampled once,
//! when the edge is created. Selection follows UCB1, leaves are expanded on their
//! second visit, and rollouts play uniformly random legal moves for every snake.

use log::debug;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use std::time::Instant;

use crate::config::MctsConfig;
use crate::evaluator::Evaluator;
use crate::moves::{legal_directions, random_moves};
use crate::profile;
use crate::rules::Ruleset;
use crate::simple_profiler::merge_thread_local;
use crate::types::{Board, Direction, SnakeMove};

/// Upper confidence bound for a child.
///
/// An unvisited child scores `+inf` so every child is tried once before any is
/// revisited; no division by zero takes place.
pub fn ucb1(reward_sum: f64, visits: u32, parent_visits: u32, exploration: f64) -> f64 {
    if visits == 0 {
        return f64::INFINITY;
    }
    let n = visits as f64;
    let parent = parent_visits.max(1) as f64;
    reward_sum / n + exploration * (parent.ln() / n).sqrt()
}

#[derive(Debug, Clone)]
struct SearchNode {
    board: Board,
    /// Our move on the edge into this node; `None` at the root
    action: Option<Direction>,
    parent: Option<usize>,
    /// `None` until expanded
    children: Option<Vec<usize>>,
    visits: u32,
    reward_sum: f64,
}

impl SearchNode {
    fn new(board: Board, action: Option<Direction>, parent: Option<usize>) -> Self {
        SearchNode {
            board,
            action,
            parent,
            children: None,
            visits: 0,
            reward_sum: 0.0,
        }
    }
}

/// Visit statistics for one root move
#[derive(Debug, Clone, PartialEq)]
pub struct ChildStats {
    pub direction: Direction,
    pub visits: u32,
    pub mean_reward: f64,
}

/// Everything a rollout needs, shareable across rayon workers
#[derive(Clone, Copy)]
struct Rollout<'a> {
    ruleset: &'a dyn Ruleset,
    evaluator: &'a Evaluator,
    you: &'a str,
    max_depth: u32,
    reward_scale: f64,
    /// Evaluation of the root board; rewards are centred on it
    baseline: f64,
    deadline: Option<Instant>,
}

impl Rollout<'_> {
    /// Plays random moves from `board` until the horizon, a terminal board or
    /// the deadline, whichever comes first
    fn play(&self, board: &Board, rng: &mut dyn RngCore) -> f64 {
        profile!("rollout", {
            let mut current = board.clone();
            for _ in 0..self.max_depth {
                if self.evaluator.is_terminal(&current, self.you) {
                    break;
                }
                if self.deadline.is_some_and(|d| Instant::now() >= d) {
                    break;
                }
                let moves = random_moves(&current, None, rng);
                current = self.ruleset.next_board(&current, &moves, rng);
            }
            self.reward(&current)
        })
    }

    /// Maps a final board into `[0, 1]`; a board scoring like the root maps to 0.5
    fn reward(&self, board: &Board) -> f64 {
        if board.snake(self.you).is_none() {
            return 0.0;
        }
        if self.evaluator.is_terminal(board, self.you) {
            return 1.0;
        }
        let gain = self.evaluator.evaluate(board, self.you) - self.baseline;
        1.0 / (1.0 + (-gain / self.reward_scale).exp())
    }
}

pub struct MctsSearch<'a> {
    ruleset: &'a dyn Ruleset,
    evaluator: &'a Evaluator,
    config: &'a MctsConfig,
    you: &'a str,
    nodes: Vec<SearchNode>,
    rng: StdRng,
    iterations: u64,
    baseline: f64,
    deadline: Option<Instant>,
}

impl<'a> MctsSearch<'a> {
    /// Builds a tree rooted at `board` and expands the root immediately
    pub fn new(
        ruleset: &'a dyn Ruleset,
        evaluator: &'a Evaluator,
        config: &'a MctsConfig,
        you: &'a str,
        board: Board,
        rng: StdRng,
    ) -> Self {
        let baseline = if evaluator.is_terminal(&board, you) {
            0.0
        } else {
            evaluator.evaluate(&board, you)
        };
        let mut search = MctsSearch {
            ruleset,
            evaluator,
            config,
            you,
            nodes: vec![SearchNode::new(board, None, None)],
            rng,
            iterations: 0,
            baseline,
            deadline: None,
        };
        search.expand(0);
        search
    }

    /// False when our snake has no legal move at the root
    pub fn has_moves(&self) -> bool {
        self.nodes[0]
            .children
            .as_ref()
            .is_some_and(|c| !c.is_empty())
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn rollout(&self) -> Rollout<'a> {
        Rollout {
            ruleset: self.ruleset,
            evaluator: self.evaluator,
            you: self.you,
            max_depth: self.config.max_rollout_depth,
            reward_scale: self.config.reward_scale,
            baseline: self.baseline,
            deadline: self.deadline,
        }
    }

    /// Creates one child per legal move of ours; opponents' replies are sampled
    fn expand(&mut self, index: usize) {
        if self.nodes[index].children.is_some() {
            return;
        }

        let board = self.nodes[index].board.clone();
        let mut children = Vec::new();
        for direction in legal_directions(&board, self.you) {
            let mut moves = vec![SnakeMove::new(self.you, direction)];
            moves.extend(random_moves(&board, Some(self.you), &mut self.rng));
            let next = self.ruleset.next_board(&board, &moves, &mut self.rng);

            children.push(self.nodes.len());
            self.nodes.push(SearchNode::new(next, Some(direction), Some(index)));
        }
        self.nodes[index].children = Some(children);
    }

    /// Child with the highest UCB1 score; ties go to the first
    fn select_child(&self, index: usize) -> Option<usize> {
        let node = &self.nodes[index];
        let mut best: Option<(usize, f64)> = None;
        for &child in node.children.as_deref().unwrap_or(&[]) {
            let c = &self.nodes[child];
            let score = ucb1(
                c.reward_sum,
                c.visits,
                node.visits,
                self.config.exploration_constant,
            );
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((child, score));
            }
        }
        best.map(|(child, _)| child)
    }

    fn backpropagate(&mut self, mut index: usize, reward: f64) {
        loop {
            let node = &mut self.nodes[index];
            node.visits += 1;
            node.reward_sum += reward;
            match node.parent {
                Some(parent) => index = parent,
                None => break,
            }
        }
        self.iterations += 1;
    }

    /// Runs one select / expand / simulate / backpropagate cycle.
    ///
    /// With parallel rollouts enabled, a freshly expanded node has all of its
    /// children simulated at once, each counted as its own iteration.
    pub fn step(&mut self) {
        if !self.has_moves() {
            return;
        }

        let mut index = 0;
        while let Some(child) = self.select_child(index) {
            index = child;
        }

        let leaf = &self.nodes[index];
        let expandable = leaf.visits > 0
            && leaf.children.is_none()
            && !self.evaluator.is_terminal(&leaf.board, self.you);
        if !expandable {
            let reward = self.rollout().play(&self.nodes[index].board, &mut self.rng);
            self.backpropagate(index, reward);
            return;
        }

        self.expand(index);
        let children = self.nodes[index].children.clone().unwrap_or_default();
        if children.is_empty() {
            let reward = self.rollout().play(&self.nodes[index].board, &mut self.rng);
            self.backpropagate(index, reward);
            return;
        }

        if self.config.parallel_rollouts && children.len() > 1 {
            let jobs: Vec<(usize, u64)> = children
                .iter()
                .map(|&child| (child, self.rng.next_u64()))
                .collect();
            let rollout = self.rollout();
            let nodes = &self.nodes;
            let rewards: Vec<(usize, f64)> = jobs
                .par_iter()
                .map(|&(child, seed)| {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let reward = rollout.play(&nodes[child].board, &mut rng);
                    merge_thread_local();
                    (child, reward)
                })
                .collect();
            for (child, reward) in rewards {
                self.backpropagate(child, reward);
            }
        } else if let Some(first) = self.select_child(index) {
            let reward = self.rollout().play(&self.nodes[first].board, &mut self.rng);
            self.backpropagate(first, reward);
        }
    }

    /// Iterates until `deadline` or the configured iteration cap, calling
    /// `publish` every `publish_interval` iterations and once at the end.
    pub fn run<F: FnMut(&Self)>(&mut self, deadline: Instant, mut publish: F) -> u64 {
        if !self.has_moves() {
            return 0;
        }

        self.deadline = Some(deadline);
        let interval = self.config.publish_interval.max(1);
        let mut last_publish = 0;
        while Instant::now() < deadline {
            if self
                .config
                .max_iterations
                .is_some_and(|max| self.iterations >= max)
            {
                break;
            }
            self.step();
            if self.iterations - last_publish >= interval {
                publish(self);
                last_publish = self.iterations;
            }
        }
        publish(self);

        debug!(
            "mcts finished: {} iterations, {} nodes",
            self.iterations,
            self.node_count()
        );
        self.iterations
    }

    /// Root move with the most visits; ties go to the first in generation order
    pub fn best_move(&self) -> Option<Direction> {
        let mut best: Option<&SearchNode> = None;
        for &child in self.nodes[0].children.as_deref().unwrap_or(&[]) {
            let node = &self.nodes[child];
            if best.map_or(true, |b| node.visits > b.visits) {
                best = Some(node);
            }
        }
        best.and_then(|node| node.action)
    }

    /// Statistics for every root move, in generation order
    pub fn root_children(&self) -> Vec<ChildStats> {
        self.nodes[0]
            .children
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .filter_map(|&child| {
                let node = &self.nodes[child];
                node.action.map(|direction| ChildStats {
                    direction,
                    visits: node.visits,
                    mean_reward: if node.visits > 0 {
                        node.reward_sum / node.visits as f64
                    } else {
                        0.0
                    },
                })
            })
            .collect()
    }

    /// Visits recorded at the root
    pub fn root_visits(&self) -> u32 {
        self.nodes[0].visits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rules::StandardRuleset;
    use crate::types::{Battlesnake, Coord};
    use std::time::Duration;

    fn body(cells: &[(i32, i32)]) -> Vec<Coord> {
        cells.iter().map(|&(x, y)| Coord::new(x, y)).collect()
    }

    fn duel() -> Board {
        Board {
            height: 11,
            width: 11,
            food: vec![Coord::new(5, 8)],
            snakes: vec![
                Battlesnake::new("me", 80, body(&[(5, 5), (5, 4), (5, 3)])),
                Battlesnake::new("them", 80, body(&[(2, 2), (2, 1), (2, 0)])),
            ],
            hazards: vec![],
        }
    }

    fn config(iterations: u64, parallel: bool) -> MctsConfig {
        let mut config = Config::default_hardcoded().mcts;
        config.max_iterations = Some(iterations);
        config.parallel_rollouts = parallel;
        config.max_rollout_depth = 10;
        config
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[test]
    fn test_ucb1_unvisited_child_is_infinite() {
        assert_eq!(ucb1(0.0, 0, 0, 1.4), f64::INFINITY);
        assert_eq!(ucb1(0.0, 0, 10, 1.4), f64::INFINITY);
        let visited = ucb1(3.0, 5, 10, 1.4);
        assert!(visited.is_finite());
        assert!(ucb1(4.0, 5, 10, 1.4) > visited);
    }

    #[test]
    fn test_selection_prefers_unvisited_sibling() {
        let board = duel();
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let cfg = config(10, false);
        let mut search = MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(1));

        let children = search.nodes[0].children.clone().unwrap();
        search.nodes[0].visits = 1_000;
        for &child in &children[..2] {
            search.nodes[child].visits = 500;
            search.nodes[child].reward_sum = 1.0e12;
        }
        assert_eq!(search.select_child(0), Some(children[2]));
    }

    #[test]
    fn test_reward_is_centred_on_the_root() {
        let board = duel();
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let cfg = config(10, false);
        let search =
            MctsSearch::new(&ruleset, &eval, &cfg, "me", board.clone(), StdRng::seed_from_u64(1));
        let rollout = search.rollout();

        assert!((rollout.reward(&board) - 0.5).abs() < 1e-9);

        let mut hungry = board.clone();
        hungry.snakes[0].health = 20;
        let mut fed = board.clone();
        fed.snakes[0].health = 100;
        assert!(rollout.reward(&hungry) < 0.3);
        assert!(rollout.reward(&fed) > 0.55);

        let mut gone = board;
        gone.snakes.retain(|s| s.id != "me");
        assert_eq!(rollout.reward(&gone), 0.0);
    }

    #[test]
    fn test_rollout_stops_at_the_deadline() {
        let board = duel();
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let mut cfg = config(10, false);
        cfg.max_rollout_depth = 1_000;
        let mut search =
            MctsSearch::new(&ruleset, &eval, &cfg, "me", board.clone(), StdRng::seed_from_u64(1));
        search.deadline = Some(Instant::now());

        // an expired rollout scores the board it started from
        let reward = search.rollout().play(&board, &mut StdRng::seed_from_u64(2));
        assert!((reward - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_root_is_expanded_per_legal_move() {
        let board = duel();
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let cfg = config(10, false);
        let search = MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(1));

        let dirs: Vec<Direction> = search.root_children().iter().map(|c| c.direction).collect();
        assert_eq!(dirs, vec![Direction::Up, Direction::Left, Direction::Right]);
        assert!(search.has_moves());
    }

    #[test]
    fn test_visits_add_up_to_iterations() {
        for parallel in [false, true] {
            let board = duel();
            let ruleset = StandardRuleset::default();
            let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
            let cfg = config(300, parallel);
            let mut search =
                MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(7));

            let iterations = search.run(far_deadline(), |_| {});
            assert!(iterations >= 300);
            assert_eq!(search.root_visits() as u64, iterations);
            let child_visits: u32 = search.root_children().iter().map(|c| c.visits).sum();
            assert_eq!(child_visits, search.root_visits());
            for child in search.root_children() {
                assert!((0.0..=1.0).contains(&child.mean_reward));
            }
        }
    }

    #[test]
    fn test_best_move_has_most_visits() {
        let board = duel();
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let cfg = config(200, false);
        let mut search = MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(3));
        search.run(far_deadline(), |_| {});

        let stats = search.root_children();
        let most = stats.iter().map(|c| c.visits).max().unwrap();
        let first_with_most = stats.iter().find(|c| c.visits == most).unwrap();
        assert_eq!(search.best_move(), Some(first_with_most.direction));
    }

    #[test]
    fn test_visit_ties_go_to_first_child() {
        let board = duel();
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let cfg = config(10, false);
        let mut search = MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(3));

        let children = search.nodes[0].children.clone().unwrap();
        for &child in &children {
            search.nodes[child].visits = 4;
        }
        assert_eq!(search.best_move(), Some(Direction::Up));

        search.nodes[children[2]].visits = 5;
        assert_eq!(search.best_move(), Some(Direction::Right));
    }

    #[test]
    fn test_boxed_in_root_runs_no_iterations() {
        let board = Board {
            height: 11,
            width: 11,
            food: vec![],
            snakes: vec![Battlesnake::new(
                "me",
                50,
                body(&[(0, 0), (1, 0), (1, 1), (0, 1), (0, 2)]),
            )],
            hazards: vec![],
        };
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let cfg = config(100, false);
        let mut search = MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(1));

        assert!(!search.has_moves());
        assert_eq!(search.run(far_deadline(), |_| {}), 0);
        assert_eq!(search.best_move(), None);
    }

    #[test]
    fn test_same_seed_same_tree() {
        let stats = |seed: u64| {
            let board = duel();
            let ruleset = StandardRuleset::default();
            let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
            let cfg = config(150, false);
            let mut search =
                MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(seed));
            search.run(far_deadline(), |_| {});
            search.root_children()
        };
        assert_eq!(stats(11), stats(11));
    }

    #[test]
    fn test_publishes_periodically() {
        let board = duel();
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let mut cfg = config(100, false);
        cfg.publish_interval = 10;
        let mut search = MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(5));

        let mut published = 0;
        search.run(far_deadline(), |s| {
            published += 1;
            assert!(s.best_move().is_some());
        });
        assert_eq!(published, 11);
    }

    #[test]
    fn test_expired_deadline_runs_nothing() {
        let board = duel();
        let ruleset = StandardRuleset::deterministic();
        let eval = Evaluator::for_root(&Config::default_hardcoded().scores, &board);
        let cfg = config(100, false);
        let mut search = MctsSearch::new(&ruleset, &eval, &cfg, "me", board, StdRng::seed_from_u64(5));

        assert_eq!(search.run(Instant::now(), |_| {}), 0);
        // root children exist even without iterations
        assert_eq!(search.best_move(), Some(Direction::Up));
    }
}
