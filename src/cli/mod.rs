//! Command-line interface for vizforge.
//!
//! Provides commands for dataset summaries, goal and chart generation,
//! explanations, and context store ingestion and retrieval.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
