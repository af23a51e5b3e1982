//! # Cli
//!
//! This module contains everything needed for parsing the CLI arguments
//! of the iterative solver.

use clap::{Parser, ValueEnum};

/// Struct containing the CLI configuration for the iterative solver.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Program specification in .sk file.
    #[arg(index = 1)]
    pub program_file: std::path::PathBuf,

    /// Stateful ALU template file to use.
    #[arg(index = 2)]
    pub stateful_alu_file: std::path::PathBuf,

    /// Stateless ALU template file to use.
    #[arg(index = 3)]
    pub stateless_alu_file: std::path::PathBuf,

    /// Number of pipeline stages.
    #[arg(index = 4)]
    pub num_pipeline_stages: usize,

    /// Number of stateless/stateful ALUs per stage.
    #[arg(index = 5)]
    pub num_alus_per_stage: usize,

    /// Packet fields to check correctness for (defaults to all).
    #[arg(long = "pkt-fields", num_args = 1..)]
    pub pkt_fields: Vec<usize>,

    /// Whether to run multiple sketches in parallel.
    #[arg(short, long)]
    pub parallel: bool,

    /// Whether the sketch process itself uses parallelism.
    #[arg(long)]
    pub parallel_sketch: bool,

    /// Whether to iterate by eliminating holes instead of using
    /// counterexamples.
    #[arg(long)]
    pub hole_elimination: bool,

    /// Specify the log level of the solver.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,
}

impl Cli {
    pub fn init() -> Self {
        Cli::parse()
    }
}

/// Enum for specifying the log level.
#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    /// Only critical errors will be logged.
    Error,

    /// Also log warnings.
    Warn,

    /// Log information about the general state of the solver, e.g., which
    /// sketches are generated, iteration counts, etc.
    #[default]
    Info,

    /// Log everything which happens internally in the solver.
    Debug,

    /// Log extra information, including per-node lowering detail.
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}
