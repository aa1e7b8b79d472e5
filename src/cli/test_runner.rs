//! Contract test orchestration
//!
//! Drives one test run end to end: validate flags, pick the seed, bind
//! contract aliases for the testing network, resolve each file's imports,
//! hand every suite to the [`SuiteRunner`] capability, and fold outcomes and
//! coverage into a single [`RunResult`].
//!
//! Execution is single-threaded; the coverage report is the only state shared
//! across the per-file loop. The overall pass/fail status is an explicit
//! value on [`RunResult`], mapped to a process exit code only at the CLI
//! boundary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde_json::json;

use crate::config::{ProjectConfig, State, TESTING_NETWORK};
use crate::coverage::{CoverageReport, LocationKind};

use super::imports::{scan_imports, ImportResolver};
use super::test_interfaces::{SuitePlan, SuiteRunner, TestError, TestOutcome};

/// Default coverage report filename.
pub const DEFAULT_COVERPROFILE: &str = "coverage.json";

/// Exclusive upper bound for randomly drawn seeds.
const RANDOM_SEED_CEILING: i64 = 150_000;

/// Which code kinds a coverage report includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CoverCode {
    /// Cover contracts, scripts and transactions.
    #[default]
    All,
    /// Cover deployed contracts only. Scripts and transactions cannot be
    /// attributed back to a source file, so they are excluded.
    Contracts,
}

/// Flags controlling one test run.
#[derive(Debug, Clone)]
pub struct TestFlags {
    /// Calculate a coverage report.
    pub cover: bool,
    /// Filename for the coverage report (`.json` or `.lcov`).
    pub coverprofile: PathBuf,
    /// Code kinds included in the coverage report.
    pub covercode: CoverCode,
    /// Execute test cases in random order.
    pub random: bool,
    /// Explicit seed for random execution order (0 = unset).
    pub seed: i64,
}

impl Default for TestFlags {
    fn default() -> Self {
        Self {
            cover: false,
            coverprofile: PathBuf::from(DEFAULT_COVERPROFILE),
            covercode: CoverCode::All,
            random: false,
            seed: 0,
        }
    }
}

impl TestFlags {
    /// Validate flag combinations before any test file is read.
    pub fn validate(&self) -> Result<(), TestError> {
        if !self.cover && self.coverprofile != Path::new(DEFAULT_COVERPROFILE) {
            return Err(TestError::CoverProfileWithoutCover);
        }
        if self.cover {
            // Reject an unwritable artifact format up front rather than after
            // the whole run has executed.
            coverage_extension(&self.coverprofile)?;
        }
        Ok(())
    }
}

/// Coverage artifact formats, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageFormat {
    Json,
    Lcov,
}

/// Map a coverage report path to its artifact format.
pub fn coverage_extension(path: &Path) -> Result<CoverageFormat, TestError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(CoverageFormat::Json),
        Some("lcov") => Ok(CoverageFormat::Lcov),
        other => Err(TestError::UnsupportedCoverageFormat(
            other.map_or_else(String::new, |e| format!(".{e}")),
        )),
    }
}

/// Execute every file's test suite and aggregate one [`RunResult`].
pub fn run_tests(
    test_files: &BTreeMap<String, Vec<u8>>,
    state: &State,
    flags: &TestFlags,
    runner: &dyn SuiteRunner,
) -> Result<RunResult, TestError> {
    flags.validate()?;

    let mut coverage_report = if flags.cover {
        let report = CoverageReport::new();
        Some(match flags.covercode {
            CoverCode::Contracts => {
                report.with_location_filter(|loc| loc.kind == LocationKind::Contract)
            }
            CoverCode::All => report,
        })
    } else {
        None
    };

    // Seed selection happens exactly once per run, never per file.
    let seed = select_seed(flags);
    if seed > 0 {
        tracing::debug!(seed, "seeded test ordering");
    }

    let contracts = testing_aliases(state.config())?;

    let mut results: BTreeMap<String, Vec<TestOutcome>> = BTreeMap::new();
    for (script_path, code) in test_files {
        let source = String::from_utf8_lossy(code).into_owned();

        let resolver = ImportResolver::new(Path::new(script_path), state);
        let mut imports = BTreeMap::new();
        for location in scan_imports(&source) {
            let text = resolver.resolve(&location)?;
            imports.insert(location.to_string(), text);
        }

        let plan = SuitePlan {
            path: script_path.clone(),
            source,
            imports,
            contracts: contracts.clone(),
            seed: (seed > 0).then_some(seed),
            coverage: coverage_report.is_some(),
        };

        let output = runner.run_suite(&plan)?;

        if let Some(report) = coverage_report.as_mut() {
            for record in &output.coverage {
                report.record(record);
            }
        }

        results.insert(script_path.clone(), output.tests);
    }

    Ok(RunResult {
        results,
        coverage: coverage_report,
        seed,
    })
}

fn select_seed(flags: &TestFlags) -> i64 {
    if flags.random {
        rand::thread_rng().gen_range(0..RANDOM_SEED_CEILING)
    } else if flags.seed > 0 {
        flags.seed
    } else {
        0
    }
}

/// Bind every configured contract to its testing-network address.
/// A contract without a testing alias fails the whole run.
fn testing_aliases(config: &ProjectConfig) -> Result<BTreeMap<String, String>, TestError> {
    let mut contracts = BTreeMap::new();
    for (name, entry) in &config.contracts {
        let alias = entry
            .alias(TESTING_NETWORK)
            .ok_or_else(|| TestError::MissingAlias {
                name: name.clone(),
                network: TESTING_NETWORK.to_string(),
            })?;
        contracts.insert(name.clone(), alias.to_string());
    }
    Ok(contracts)
}

/// Aggregated result of one test run.
///
/// Immutable after construction; exposes JSON, human-readable and one-line
/// renderings plus the binary exit status.
#[derive(Debug)]
pub struct RunResult {
    results: BTreeMap<String, Vec<TestOutcome>>,
    coverage: Option<CoverageReport>,
    seed: i64,
}

impl RunResult {
    /// Per-file test outcomes, in execution order within each file.
    pub fn results(&self) -> &BTreeMap<String, Vec<TestOutcome>> {
        &self.results
    }

    pub fn coverage(&self) -> Option<&CoverageReport> {
        self.coverage.as_ref()
    }

    /// The seed applied to this run; 0 means no seeding.
    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// 0 when every test across every file passed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        let failed = self
            .results
            .values()
            .any(|outcomes| outcomes.iter().any(|o| !o.is_pass()));
        i32::from(failed)
    }

    /// JSON view: per file, test name -> `"PASS"` / `"FAIL: <error>"`, plus a
    /// `"meta"` entry carrying coverage percentage and seed when applicable.
    pub fn json(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();

        for (script_path, outcomes) in &self.results {
            let mut file_results = serde_json::Map::new();
            for outcome in outcomes {
                let status = match &outcome.error {
                    None => "PASS".to_string(),
                    Some(error) => format!("FAIL: {error}"),
                };
                file_results.insert(outcome.name.clone(), json!(status));
            }
            root.insert(script_path.clone(), serde_json::Value::Object(file_results));
        }

        let mut meta = serde_json::Map::new();
        if let Some(report) = &self.coverage {
            meta.insert("coverage".to_string(), json!(report.percentage()));
        }
        if self.seed > 0 {
            meta.insert("seed".to_string(), json!(self.seed.to_string()));
        }
        root.insert("meta".to_string(), serde_json::Value::Object(meta));

        serde_json::Value::Object(root)
    }

    /// Human-readable rendering: per-file results, then the coverage report,
    /// then the seed.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (script_path, outcomes) in &self.results {
            out.push_str(&format!("Test results: \"{script_path}\"\n"));
            for outcome in outcomes {
                match &outcome.error {
                    None => out.push_str(&format!("- PASS: {}\n", outcome.name)),
                    Some(error) => {
                        out.push_str(&format!("- FAIL: {}\n", outcome.name));
                        for line in error.lines() {
                            out.push_str(&format!("        {line}\n"));
                        }
                    }
                }
            }
        }

        if let Some(report) = &self.coverage {
            out.push_str(&format!("{report}\n"));
        }
        if self.seed > 0 {
            out.push_str(&format!("\nSeed: {}\n", self.seed));
        }

        out
    }

    /// Flat single-line rendering for grep-style consumption.
    pub fn oneliner(&self) -> String {
        let mut out = String::new();

        for (script_path, outcomes) in &self.results {
            for outcome in outcomes {
                match &outcome.error {
                    None => out.push_str(&format!("PASS {script_path}:{} ", outcome.name)),
                    Some(error) => {
                        out.push_str(&format!("FAIL {script_path}:{} ({error}) ", outcome.name))
                    }
                }
            }
        }

        if let Some(report) = &self.coverage {
            out.push_str(&format!("{report} "));
        }
        if self.seed > 0 {
            out.push_str(&format!("Seed: {}", self.seed));
        }

        out.trim_end().to_string()
    }
}
