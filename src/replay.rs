// Replay module for analyzing logged game states and debugging decisions
//
// Reads the JSONL files written by the debug logger, re-runs the decision on
// each logged board and compares the result with what was played.

use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::bot::{Bot, SearchResult};
use crate::config::Config;
use crate::debug_logger::DebugLogEntry;
use crate::types::{Board, Direction};

/// A logged turn, exactly as the debug logger wrote it
pub type LogEntry = DebugLogEntry;

/// Result of replaying a single turn
#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub turn: i32,
    pub original_move: Direction,
    pub replayed_move: Direction,
    pub matches: bool,
    pub original_score: Option<f64>,
    pub replayed_score: Option<f64>,
    pub search_depth: u32,
    pub iterations: u64,
    pub computation_time_ms: u128,
}

/// Statistics for a complete replay session
#[derive(Debug, Default)]
pub struct ReplayStats {
    pub total_turns: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub match_rate: f64,
}

/// Replay engine for analyzing debug logs
pub struct ReplayEngine {
    bot: Bot,
    budget: Duration,
    verbose: bool,
}

impl ReplayEngine {
    /// Creates a replay engine; every turn gets the configured default budget
    pub fn new(config: Config, verbose: bool) -> Self {
        let budget = Duration::from_millis(config.timing.response_time_budget_ms);
        ReplayEngine {
            bot: Bot::new(config),
            budget,
            verbose,
        }
    }

    /// Loads all log entries from a JSONL file
    pub fn load_log_file<P: AsRef<Path>>(&self, log_path: P) -> Result<Vec<LogEntry>, String> {
        let file = File::open(log_path.as_ref())
            .map_err(|e| format!("Failed to open log file: {}", e))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| format!("Failed to read line {}: {}", line_num + 1, e))?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line)
                .map_err(|e| format!("Failed to parse JSON on line {}: {}", line_num + 1, e))?;

            entries.push(entry);
        }

        info!("Loaded {} log entries", entries.len());
        Ok(entries)
    }

    /// Re-decides a single board for `you_id`
    pub fn replay_turn(&self, board: &Board, you_id: &str) -> Result<(SearchResult, u128), String> {
        if board.snake(you_id).is_none() {
            return Err(format!("Snake with id '{}' not found in board state", you_id));
        }

        let start_time = Instant::now();
        let result = self
            .bot
            .decide(board, you_id, self.budget)
            .map_err(|e| format!("Invalid board: {}", e))?;

        Ok((result, start_time.elapsed().as_millis()))
    }

    /// Replays a single log entry and compares the result
    pub fn replay_entry(&self, entry: &LogEntry) -> Result<ReplayResult, String> {
        if self.verbose {
            info!("Replaying turn {}...", entry.turn);
        }

        let original_move = Direction::parse(&entry.chosen_move)?;
        let (replayed, computation_time) = self.replay_turn(&entry.board, &entry.you_id)?;
        let matches = original_move == replayed.direction;

        let result = ReplayResult {
            turn: entry.turn,
            original_move,
            replayed_move: replayed.direction,
            matches,
            original_score: entry.score,
            replayed_score: replayed.score,
            search_depth: replayed.depth,
            iterations: replayed.iterations,
            computation_time_ms: computation_time,
        };

        if self.verbose {
            if matches {
                info!(
                    "Turn {}: MATCH - {} (score: {:?}, depth: {}, time: {}ms)",
                    entry.turn,
                    result.replayed_move.as_str(),
                    result.replayed_score,
                    result.search_depth,
                    computation_time
                );
            } else {
                warn!(
                    "Turn {}: MISMATCH - Original: {}, Replayed: {} (score: {:?}, depth: {}, time: {}ms)",
                    entry.turn,
                    original_move.as_str(),
                    result.replayed_move.as_str(),
                    result.replayed_score,
                    result.search_depth,
                    computation_time
                );
            }
        }

        Ok(result)
    }

    /// Replays all entries; entries that fail are logged and skipped
    pub fn replay_all(&self, entries: &[LogEntry]) -> Vec<ReplayResult> {
        entries
            .iter()
            .filter_map(|entry| match self.replay_entry(entry) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Failed to replay turn {}: {}", entry.turn, e);
                    None
                }
            })
            .collect()
    }

    /// Replays specific turns from a log file
    pub fn replay_turns(
        &self,
        entries: &[LogEntry],
        turn_numbers: &[i32],
    ) -> Result<Vec<ReplayResult>, String> {
        let mut results = Vec::new();

        for turn_num in turn_numbers {
            let entry = entries
                .iter()
                .find(|e| e.turn == *turn_num)
                .ok_or_else(|| format!("Turn {} not found in log file", turn_num))?;

            match self.replay_entry(entry) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Failed to replay turn {}: {}", turn_num, e);
                }
            }
        }

        Ok(results)
    }

    /// Generates statistics from replay results
    pub fn generate_stats(&self, results: &[ReplayResult]) -> ReplayStats {
        let total_turns = results.len();
        let matches = results.iter().filter(|r| r.matches).count();
        let mismatches = total_turns - matches;
        let match_rate = if total_turns > 0 {
            (matches as f64 / total_turns as f64) * 100.0
        } else {
            0.0
        };

        ReplayStats {
            total_turns,
            matches,
            mismatches,
            match_rate,
        }
    }

    /// Prints a detailed report of replay results
    pub fn print_report(&self, results: &[ReplayResult]) {
        let stats = self.generate_stats(results);

        println!("\n===========================================================");
        println!("                    REPLAY REPORT");
        println!("===========================================================");
        println!("Total Turns:    {}", stats.total_turns);
        println!("Matches:        {} ({:.1}%)", stats.matches, stats.match_rate);
        println!("Mismatches:     {}", stats.mismatches);
        println!("===========================================================\n");

        if !results.is_empty() {
            let n = results.len() as f64;
            let avg_time = results.iter().map(|r| r.computation_time_ms as f64).sum::<f64>() / n;
            let avg_depth = results.iter().map(|r| r.search_depth as f64).sum::<f64>() / n;
            let avg_iterations = results.iter().map(|r| r.iterations as f64).sum::<f64>() / n;

            println!("Average Search Depth:       {:.1}", avg_depth);
            println!("Average Iterations:         {:.0}", avg_iterations);
            println!("Average Computation Time:   {:.1}ms\n", avg_time);
        }

        let mismatches: Vec<_> = results.iter().filter(|r| !r.matches).collect();
        if !mismatches.is_empty() {
            println!("===========================================================");
            println!("                  DETAILED MISMATCHES");
            println!("===========================================================");

            for result in mismatches {
                println!(
                    "Turn {}: {} -> {} (logged score: {:?}, replayed score: {:?}, depth: {}, time: {}ms)",
                    result.turn,
                    result.original_move.as_str(),
                    result.replayed_move.as_str(),
                    result.original_score,
                    result.replayed_score,
                    result.search_depth,
                    result.computation_time_ms
                );
            }
            println!();
        }
    }

    /// Checks that the logged move of each listed turn is one of the acceptable ones
    pub fn validate_expected_moves(
        &self,
        entries: &[LogEntry],
        expected_moves: &[(i32, Vec<Direction>)],
    ) -> Result<(), String> {
        for (turn, acceptable) in expected_moves {
            let entry = entries
                .iter()
                .find(|e| e.turn == *turn)
                .ok_or_else(|| format!("Turn {} not found in log", turn))?;

            let actual_move = Direction::parse(&entry.chosen_move)?;

            if !acceptable.contains(&actual_move) {
                return Err(format!(
                    "Turn {}: Expected one of {:?}, but got {}",
                    turn,
                    acceptable.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
                    actual_move.as_str()
                ));
            }
        }

        Ok(())
    }
}

/// Parses `--validate` arguments such as `3:up|left`
pub fn parse_expectation(arg: &str) -> Result<(i32, Vec<Direction>), String> {
    let (turn, moves) = arg
        .split_once(':')
        .ok_or_else(|| format!("Expected TURN:MOVE[|MOVE], got '{}'", arg))?;
    let turn = turn
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("Invalid turn '{}': {}", turn, e))?;
    let moves = moves
        .split('|')
        .map(Direction::parse)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((turn, moves))
}
