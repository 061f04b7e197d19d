// Configuration module for reading Snake.toml
// This module provides OOP-style configuration management for the Battlesnake bot

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub timing: TimingConfig,
    pub search: SearchConfig,
    pub minimax: MinimaxConfig,
    pub mcts: MctsConfig,
    pub scores: ScoresConfig,
    pub rules: RulesConfig,
    pub debug: DebugConfig,
    pub server: ServerConfig,
}

/// Timing constants
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Budget used when a request does not carry its own timeout
    pub response_time_budget_ms: u64,
    /// Safety margin subtracted from every budget
    pub network_overhead_ms: u64,
    pub polling_interval_ms: u64,
}

impl TimingConfig {
    /// Computes the search window left in `budget_ms` after the network overhead
    pub fn search_window_ms(&self, budget_ms: u64) -> u64 {
        budget_ms.saturating_sub(self.network_overhead_ms)
    }

    /// Time budget for a request, preferring the game's own timeout when set
    pub fn budget_for_timeout_ms(&self, game_timeout_ms: u32) -> u64 {
        if game_timeout_ms > 0 {
            game_timeout_ms as u64
        } else {
            self.response_time_budget_ms
        }
    }
}

/// Which search strategy decides moves. Fixed per process.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    Minimax,
    Mcts,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Minimax => "minimax",
            SearchStrategy::Mcts => "mcts",
        }
    }
}

/// Strategy selection
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub strategy: SearchStrategy,
    /// Seeds simulation randomness; entropy is used when absent
    pub rng_seed: Option<u64>,
}

/// Iterative deepening limits, in plies
#[derive(Debug, Deserialize, Clone)]
pub struct MinimaxConfig {
    pub initial_depth: u32,
    pub depth_step: u32,
    pub max_depth: u32,
}

/// Monte Carlo tree search parameters
#[derive(Debug, Deserialize, Clone)]
pub struct MctsConfig {
    pub exploration_constant: f64,
    pub max_rollout_depth: u32,
    /// Divisor applied to a rollout's score gain over the root before squashing
    /// it into (0, 1)
    pub reward_scale: f64,
    pub max_iterations: Option<u64>,
    pub parallel_rollouts: bool,
    /// Iterations between publishing the current best move
    pub publish_interval: u64,
}

/// Evaluation weights and sentinels
#[derive(Debug, Deserialize, Clone)]
pub struct ScoresConfig {
    pub score_win: f64,
    pub score_loss: f64,
    pub weight_health: f64,
    pub weight_length: f64,
    pub weight_food_distance: f64,
    pub weight_space: f64,
}

/// Simulation rules
#[derive(Debug, Deserialize, Clone)]
pub struct RulesConfig {
    pub food_spawn_chance: u32,
    pub minimum_food: usize,
    pub max_health: i32,
}

/// Debug configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

/// HTTP mount point and snake appearance
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub mount_path: String,
    pub author: String,
    pub color: String,
    pub head: String,
    pub tail: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Snake.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Snake.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Snake.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Snake.toml
    pub fn default_hardcoded() -> Self {
        Config {
            timing: TimingConfig {
                response_time_budget_ms: 500,
                network_overhead_ms: 100,
                polling_interval_ms: 10,
            },
            search: SearchConfig {
                strategy: SearchStrategy::Minimax,
                rng_seed: None,
            },
            minimax: MinimaxConfig {
                initial_depth: 2,
                depth_step: 2,
                max_depth: 24,
            },
            mcts: MctsConfig {
                exploration_constant: std::f64::consts::SQRT_2,
                max_rollout_depth: 30,
                reward_scale: 50.0,
                max_iterations: None,
                parallel_rollouts: false,
                publish_interval: 64,
            },
            scores: ScoresConfig {
                score_win: 1.0e9,
                score_loss: -1.0e9,
                weight_health: 1.0,
                weight_length: 10.0,
                weight_food_distance: 2.0,
                weight_space: 3.0,
            },
            rules: RulesConfig {
                food_spawn_chance: 25,
                minimum_food: 1,
                max_health: 100,
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "battlesnake_debug.jsonl".to_string(),
            },
            server: ServerConfig {
                mount_path: "/".to_string(),
                author: "Odin".to_string(),
                color: "#3ebf37".to_string(),
                head: "default".to_string(),
                tail: "freckled".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            log::warn!("Could not load Snake.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_window_calculation() {
        let config = Config::default_hardcoded();
        let timing = &config.timing;
        assert_eq!(timing.search_window_ms(timing.response_time_budget_ms), 400);
        assert_eq!(timing.search_window_ms(50), 0);
    }

    #[test]
    fn test_budget_prefers_game_timeout() {
        let config = Config::default_hardcoded();
        assert_eq!(config.timing.budget_for_timeout_ms(250), 250);
        assert_eq!(config.timing.budget_for_timeout_ms(0), 500);
    }

    #[test]
    fn test_snake_toml_can_be_parsed() {
        // This test ensures Snake.toml is valid and can be parsed
        let result = Config::from_file("Snake.toml");
        assert!(
            result.is_ok(),
            "Failed to parse Snake.toml: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_all_config_values_match_hardcoded_defaults() {
        let file_config = Config::from_file("Snake.toml").expect("Snake.toml should be parseable");
        let hardcoded = Config::default_hardcoded();

        // Timing
        assert_eq!(
            file_config.timing.response_time_budget_ms,
            hardcoded.timing.response_time_budget_ms
        );
        assert_eq!(
            file_config.timing.network_overhead_ms,
            hardcoded.timing.network_overhead_ms
        );
        assert_eq!(
            file_config.timing.polling_interval_ms,
            hardcoded.timing.polling_interval_ms
        );

        // Search
        assert_eq!(file_config.search.strategy, hardcoded.search.strategy);
        assert_eq!(file_config.search.rng_seed, hardcoded.search.rng_seed);
        assert_eq!(file_config.minimax.initial_depth, hardcoded.minimax.initial_depth);
        assert_eq!(file_config.minimax.depth_step, hardcoded.minimax.depth_step);
        assert_eq!(file_config.minimax.max_depth, hardcoded.minimax.max_depth);
        assert!(
            (file_config.mcts.exploration_constant - hardcoded.mcts.exploration_constant).abs()
                < 1e-9
        );
        assert_eq!(
            file_config.mcts.max_rollout_depth,
            hardcoded.mcts.max_rollout_depth
        );
        assert_eq!(file_config.mcts.max_iterations, hardcoded.mcts.max_iterations);
        assert_eq!(
            file_config.mcts.parallel_rollouts,
            hardcoded.mcts.parallel_rollouts
        );

        // Scores
        assert_eq!(file_config.scores.score_win, hardcoded.scores.score_win);
        assert_eq!(file_config.scores.score_loss, hardcoded.scores.score_loss);
        assert_eq!(file_config.scores.weight_health, hardcoded.scores.weight_health);
        assert_eq!(file_config.scores.weight_space, hardcoded.scores.weight_space);

        // Rules
        assert_eq!(
            file_config.rules.food_spawn_chance,
            hardcoded.rules.food_spawn_chance
        );
        assert_eq!(file_config.rules.minimum_food, hardcoded.rules.minimum_food);

        // Server
        assert_eq!(file_config.server.mount_path, hardcoded.server.mount_path);
    }

    #[test]
    fn test_sentinels_bracket_weights() {
        let config = Config::default_hardcoded();
        assert!(config.scores.score_loss < 0.0);
        assert!(config.scores.score_win > 0.0);
        assert!(config.scores.weight_health >= 0.0, "health must never lower the score");
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        // Test with a non-existent file
        let result = Config::from_file("nonexistent.toml");
        assert!(result.is_err());
    }
}
