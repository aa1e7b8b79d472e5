#![forbid(unsafe_code)]
//! Runa Blockchain Developer Toolchain
//!
//! Command surface for the Runa blockchain: this crate hosts the contract
//! test runner with its import resolution and code-coverage engine. Signing,
//! transaction construction and gateway communication live in the Runa SDK;
//! the contract-language runtime is the external `runa-vm` executor.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`.
//!   The `cli` module enforces `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod config;
pub mod coverage;

pub use cli::imports::{resolve_file, scan_imports, ImportLocation, ImportResolver};
pub use cli::test_interfaces::{SuiteOutput, SuitePlan, SuiteRunner, TestError, TestOutcome};
pub use cli::test_runner::{run_tests, CoverCode, RunResult, TestFlags};
pub use config::{FileReader, ProjectConfig, State};
pub use coverage::{CodeLocation, CoverageReport, LocationKind};
