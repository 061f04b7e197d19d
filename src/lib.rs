// Library exports for the Ygg Battlesnake
// The server binary, the replay tool and the integration tests all drive the bot through here

pub mod board;
pub mod bot;
pub mod config;
pub mod debug_logger;
pub mod evaluator;
pub mod mcts;
pub mod minimax;
pub mod moves;
pub mod replay;
pub mod rules;
pub mod simple_profiler;
pub mod types;
