//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{OsFileReader, State};
use crate::coverage::CoverageReport;

use super::test_interfaces::{TestError, VmSuiteRunner};
use super::test_runner::{self, coverage_extension, CoverageFormat, TestFlags};
use super::{CliError, CliResult, ExitCode};

/// Run contract tests and report results.
///
/// Flags are validated before any test file is read; configuration and
/// resolution errors abort with a single message, while individual test
/// failures are rendered inline and only affect the exit code.
pub fn run_test_command(
    files: &[PathBuf],
    config_path: &Path,
    flags: &TestFlags,
    json: bool,
) -> CliResult<ExitCode> {
    flags.validate().map_err(test_err)?;

    let state = State::load(config_path, Box::new(OsFileReader))
        .map_err(|e| CliError::failure(e.to_string()))?;

    let mut test_files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for file in files {
        let code = state.read_file(file).map_err(|e| {
            CliError::failure(format!("error loading script file '{}': {e}", file.display()))
        })?;
        test_files.insert(file.to_string_lossy().into_owned(), code);
    }

    let runner = VmSuiteRunner::from_env();
    let result =
        test_runner::run_tests(&test_files, &state, flags, &runner).map_err(test_err)?;

    if let Some(report) = result.coverage() {
        write_coverage_artifact(report, &flags.coverprofile).map_err(test_err)?;
        tracing::debug!(path = %flags.coverprofile.display(), "wrote coverage report");
    }

    if json {
        let rendered = serde_json::to_string_pretty(&result.json())
            .map_err(|e| CliError::failure(format!("error serializing results: {e}")))?;
        println!("{rendered}");
    } else {
        print!("{}", result.render());
    }

    Ok(ExitCode(result.exit_code()))
}

/// Serialize a coverage report to the artifact format selected by the file
/// extension and write it out.
pub fn write_coverage_artifact(report: &CoverageReport, path: &Path) -> Result<(), TestError> {
    let contents = match coverage_extension(path)? {
        CoverageFormat::Json => report.to_json_pretty()?,
        CoverageFormat::Lcov => report.marshal_lcov(),
    };
    fs::write(path, contents).map_err(|source| TestError::CoverageWrite {
        path: path.to_string_lossy().into_owned(),
        source,
    })?;
    Ok(())
}

fn test_err(err: TestError) -> CliError {
    CliError::failure(err.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::coverage::{CodeLocation, CoverageSummary, LocationCoverage, LocationKind};

    fn sample_report() -> CoverageReport {
        let mut report = CoverageReport::new();
        report.record(&LocationCoverage {
            location: CodeLocation::new(LocationKind::Contract, "Counter"),
            statements: vec![1, 2],
            hits: [(1u32, 3u64)].into(),
        });
        report
    }

    #[test]
    fn writes_json_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.json");
        write_coverage_artifact(&sample_report(), &path).unwrap();

        let parsed: CoverageSummary =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed.percentage, "50.0%");
    }

    #[test]
    fn writes_lcov_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.lcov");
        write_coverage_artifact(&sample_report(), &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("TN:\nSF:C.Counter\n"));
        assert!(contents.ends_with("end_of_record\n"));
    }

    #[test]
    fn rejects_other_extensions() {
        let err = write_coverage_artifact(&sample_report(), Path::new("coverage.xml")).unwrap_err();
        assert!(matches!(err, TestError::UnsupportedCoverageFormat(_)));
        assert!(err.to_string().contains(".xml"));
    }

    #[test]
    fn coverprofile_without_cover_rejected_before_reading_files() {
        // The input file deliberately does not exist: validation must fire
        // before any read is attempted.
        let flags = TestFlags {
            coverprofile: PathBuf::from("report.xml"),
            ..TestFlags::default()
        };
        let err = run_test_command(
            &[PathBuf::from("definitely_missing_test.runa")],
            Path::new("definitely_missing_runa.json"),
            &flags,
            false,
        )
        .unwrap_err();
        assert!(err.message.contains("--cover"));
    }
}
