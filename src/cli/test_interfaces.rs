//! Test engine I/O boundary interfaces
//!
//! The contract-language runtime itself lives outside this crate. This module
//! defines the seam: the [`SuiteRunner`] capability that executes one test
//! file's suite, the wire types crossing that boundary, and the error type for
//! everything that can go wrong around it.
//!
//! [`VmSuiteRunner`] is the default implementation, delegating to the external
//! `runa-vm` process over a JSON stdin/stdout protocol.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::coverage::LocationCoverage;

/// Environment variable overriding the executor binary invoked by
/// [`VmSuiteRunner::from_env`].
pub const VM_ENV_VAR: &str = "RUNA_VM";

const DEFAULT_VM_PROGRAM: &str = "runa-vm";

/// Errors raised while preparing or executing a test run.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("the '--coverprofile' flag requires the '--cover' flag")]
    CoverProfileWithoutCover,

    #[error("given format: {0}, only .json and .lcov are supported")]
    UnsupportedCoverageFormat(String),

    #[error("unable to find '{network}' alias for contract: {name}")]
    MissingAlias { name: String, network: String },

    #[error("cannot find contract with location '{0}' in configuration")]
    UnknownLocation(String),

    #[error("error reading file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run test suite for '{path}': {message}")]
    Execution { path: String, message: String },

    #[error("error serializing coverage report: {0}")]
    CoverageSerialize(#[from] serde_json::Error),

    #[error("error writing coverage report file '{path}': {source}")]
    CoverageWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one executed test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    /// Failure or runtime error detail; `None` means the test passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.error.is_none()
    }
}

/// Execution request for one test file, with every import already resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuitePlan {
    /// Path of the test file, for reporting.
    pub path: String,
    /// Raw test script source.
    pub source: String,
    /// Resolved import location -> source text.
    pub imports: BTreeMap<String, String>,
    /// Contract name -> address under the testing network.
    pub contracts: BTreeMap<String, String>,
    /// Seed for shuffled test ordering; `None` leaves executor-default order.
    pub seed: Option<i64>,
    /// Whether the executor should emit coverage records.
    pub coverage: bool,
}

/// Executor response for one test file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteOutput {
    /// Per-test outcomes, in execution order.
    pub tests: Vec<TestOutcome>,
    /// Per-location coverage records (empty unless requested).
    #[serde(default)]
    pub coverage: Vec<LocationCoverage>,
}

/// The opaque script-execution capability.
///
/// A returned error is structural (the suite could not be run at all) and
/// aborts the whole run; individual test failures are reported inside
/// [`SuiteOutput`] instead.
pub trait SuiteRunner {
    fn run_suite(&self, plan: &SuitePlan) -> Result<SuiteOutput, TestError>;
}

/// Runs suites by handing the plan to the external `runa-vm` process as JSON
/// on stdin and parsing its JSON response from stdout.
pub struct VmSuiteRunner {
    program: PathBuf,
}

impl VmSuiteRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use the binary named by `RUNA_VM`, falling back to `runa-vm` on PATH.
    pub fn from_env() -> Self {
        let program = std::env::var_os(VM_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_VM_PROGRAM));
        Self { program }
    }

    fn execution_error(&self, plan: &SuitePlan, message: impl Into<String>) -> TestError {
        TestError::Execution {
            path: plan.path.clone(),
            message: message.into(),
        }
    }
}

impl SuiteRunner for VmSuiteRunner {
    fn run_suite(&self, plan: &SuitePlan) -> Result<SuiteOutput, TestError> {
        tracing::debug!(path = %plan.path, vm = %self.program.display(), "running test suite");

        let request = serde_json::to_vec(plan)
            .map_err(|e| self.execution_error(plan, format!("failed to encode plan: {e}")))?;

        let mut child = Command::new(&self.program)
            .arg("test")
            .arg("--json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                self.execution_error(
                    plan,
                    format!("failed to start '{}': {e}", self.program.display()),
                )
            })?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(&request)
                .map_err(|e| self.execution_error(plan, format!("failed to send plan: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| self.execution_error(plan, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.execution_error(plan, stderr.trim().to_string()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| self.execution_error(plan, format!("invalid executor response: {e}")))
    }
}
