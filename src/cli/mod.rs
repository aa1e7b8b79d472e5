//! CLI module for the Runa toolchain
//!
//! This module provides the command-line interface for the toolchain.
//!
//! ## Commands
//!
//! - `test <files...>` - Run contract tests, optionally with coverage
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `imports` - Import discovery and resolution for test scripts
//! - `test_runner` - Test orchestration and result aggregation
//! - `test_interfaces` - Executor seam and wire types
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod imports;
pub mod test_interfaces;
pub mod test_runner;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use crate::config;
use test_runner::{CoverCode, TestFlags};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// The Runa blockchain developer toolchain
#[derive(Parser, Debug)]
#[command(name = "runa")]
#[command(version = VERSION)]
#[command(about = "The Runa blockchain developer toolchain", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run Runa contract tests
    #[command(arg_required_else_help = true)]
    Test {
        /// Test script files to run
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Project configuration file
        #[arg(short = 'f', long = "config", default_value = config::DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Calculate a coverage report
        #[arg(long)]
        cover: bool,

        /// Filename to write the coverage report (.json or .lcov)
        #[arg(long, default_value = test_runner::DEFAULT_COVERPROFILE)]
        coverprofile: PathBuf,

        /// Code kinds included in the coverage report
        #[arg(long, value_enum, default_value_t = CoverCode::All)]
        covercode: CoverCode,

        /// Execute test cases in random order
        #[arg(long)]
        random: bool,

        /// Seed controlling random execution order
        #[arg(long, default_value_t = 0)]
        seed: i64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Test {
            files,
            config,
            cover,
            coverprofile,
            covercode,
            random,
            seed,
            json,
        } => {
            let flags = TestFlags {
                cover,
                coverprofile,
                covercode,
                random,
                seed,
            };
            commands::run_test_command(&files, &config, &flags, json)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
