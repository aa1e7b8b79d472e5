//! End-to-end tests for the contract test engine over a real project tree

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use runa::cli::commands::write_coverage_artifact;
use runa::config::OsFileReader;
use runa::coverage::{CodeLocation, CoverageSummary, LocationCoverage, LocationKind};
use runa::{
    run_tests, CoverCode, State, SuiteOutput, SuitePlan, SuiteRunner, TestError, TestFlags,
    TestOutcome,
};

/// Executor double: records the plans it receives and replays scripted
/// outcomes and coverage.
struct ScriptedRunner {
    outcomes: Vec<TestOutcome>,
    coverage: Vec<LocationCoverage>,
    plans: std::cell::RefCell<Vec<SuitePlan>>,
}

impl ScriptedRunner {
    fn new(outcomes: Vec<TestOutcome>, coverage: Vec<LocationCoverage>) -> Self {
        Self {
            outcomes,
            coverage,
            plans: std::cell::RefCell::new(Vec::new()),
        }
    }
}

impl SuiteRunner for ScriptedRunner {
    fn run_suite(&self, plan: &SuitePlan) -> Result<SuiteOutput, TestError> {
        self.plans.borrow_mut().push(plan.clone());
        Ok(SuiteOutput {
            tests: self.outcomes.clone(),
            coverage: self.coverage.clone(),
        })
    }
}

/// Write a small project: configuration, one contract, a helper script and a
/// test file importing all of them. Returns (state, test file path).
fn scaffold_project(dir: &Path) -> (State, String) {
    let contracts_dir = dir.join("contracts");
    let tests_dir = dir.join("tests");
    fs::create_dir_all(&contracts_dir).unwrap();
    fs::create_dir_all(&tests_dir).unwrap();

    let contract_path = contracts_dir.join("counter.runa");
    fs::write(&contract_path, "contract Counter { var count: Int }").unwrap();

    fs::write(
        tests_dir.join("util_helper.runa"),
        "fun deploy_counter() {}",
    )
    .unwrap();

    let test_path = tests_dir.join("counter_test.runa");
    fs::write(
        &test_path,
        "import Test\nimport Counter\nimport \"./util_helper.runa\"\n\nfun test_increment() {}\n",
    )
    .unwrap();

    let config_path = dir.join("runa.json");
    fs::write(
        &config_path,
        format!(
            r#"{{
                "contracts": {{
                    "Counter": {{
                        "source": "{}",
                        "aliases": {{ "testing": "0x0000000000000007" }}
                    }}
                }}
            }}"#,
            contract_path.display()
        ),
    )
    .unwrap();

    let state = State::load(&config_path, Box::new(OsFileReader)).unwrap();
    (state, test_path.to_string_lossy().into_owned())
}

fn read_files(state: &State, paths: &[&str]) -> BTreeMap<String, Vec<u8>> {
    paths
        .iter()
        .map(|p| (p.to_string(), state.read_file(Path::new(p)).unwrap()))
        .collect()
}

#[test]
fn passing_run_resolves_imports_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (state, test_path) = scaffold_project(dir.path());

    let runner = ScriptedRunner::new(vec![TestOutcome::passed("test_increment")], Vec::new());
    let files = read_files(&state, &[&test_path]);
    let result = run_tests(&files, &state, &TestFlags::default(), &runner).unwrap();

    assert_eq!(result.exit_code(), 0);

    let plans = runner.plans.borrow();
    assert_eq!(plans.len(), 1);
    assert_eq!(
        plans[0].imports["Counter"],
        "contract Counter { var count: Int }"
    );
    assert_eq!(
        plans[0].imports["./util_helper.runa"],
        "fun deploy_counter() {}"
    );
    assert_eq!(plans[0].contracts["Counter"], "0x0000000000000007");
    // The framework module never resolves through configuration.
    assert!(!plans[0].imports.contains_key("Test"));
}

#[test]
fn missing_helper_script_yields_empty_import() {
    let dir = tempfile::tempdir().unwrap();
    let (state, test_path) = scaffold_project(dir.path());
    fs::remove_file(dir.path().join("tests/util_helper.runa")).unwrap();

    let runner = ScriptedRunner::new(vec![TestOutcome::passed("test_increment")], Vec::new());
    let files = read_files(&state, &[&test_path]);
    let result = run_tests(&files, &state, &TestFlags::default(), &runner).unwrap();

    assert_eq!(result.exit_code(), 0);
    assert_eq!(runner.plans.borrow()[0].imports["./util_helper.runa"], "");
}

#[test]
fn failing_test_sets_exit_status_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let (state, test_path) = scaffold_project(dir.path());

    let runner = ScriptedRunner::new(
        vec![
            TestOutcome::passed("test_increment"),
            TestOutcome::failed("test_reset", "assertion failed: count is 1, expected 0"),
        ],
        Vec::new(),
    );
    let files = read_files(&state, &[&test_path]);
    let result = run_tests(&files, &state, &TestFlags::default(), &runner).unwrap();

    assert_eq!(result.exit_code(), 1);

    let json = result.json();
    assert_eq!(json[&test_path]["test_increment"], "PASS");
    assert_eq!(
        json[&test_path]["test_reset"],
        "FAIL: assertion failed: count is 1, expected 0"
    );
}

#[test]
fn coverage_artifacts_round_trip_from_a_real_run() {
    let dir = tempfile::tempdir().unwrap();
    let (state, test_path) = scaffold_project(dir.path());

    let coverage = vec![
        LocationCoverage {
            location: CodeLocation::new(LocationKind::Contract, "Counter"),
            statements: vec![1, 2, 3, 4],
            hits: [(1, 2), (2, 2), (3, 1)].into(),
        },
        LocationCoverage {
            location: CodeLocation::new(LocationKind::Script, "s.9fe0c1"),
            statements: vec![1],
            hits: [(1, 1)].into(),
        },
    ];
    let runner = ScriptedRunner::new(vec![TestOutcome::passed("test_increment")], coverage);

    let flags = TestFlags {
        cover: true,
        covercode: CoverCode::Contracts,
        ..TestFlags::default()
    };
    let files = read_files(&state, &[&test_path]);
    let result = run_tests(&files, &state, &flags, &runner).unwrap();

    let report = result.coverage().unwrap();
    // Scripts are excluded under the contracts scope.
    assert!(report.locations().all(|l| l.kind == LocationKind::Contract));
    assert_eq!(report.percentage(), "75.0%");

    let json_path = dir.path().join("coverage.json");
    write_coverage_artifact(report, &json_path).unwrap();
    let parsed: CoverageSummary = serde_json::from_slice(&fs::read(&json_path).unwrap()).unwrap();
    assert_eq!(parsed.percentage, "75.0%");

    let lcov_path = dir.path().join("coverage.lcov");
    write_coverage_artifact(report, &lcov_path).unwrap();
    let lcov = fs::read_to_string(&lcov_path).unwrap();
    assert!(lcov.contains("SF:C.Counter"));
    assert!(lcov.contains("LF:4"));
    assert!(lcov.contains("LH:3"));
}

#[test]
fn explicit_seed_produces_identical_runs() {
    let dir = tempfile::tempdir().unwrap();
    let (state, test_path) = scaffold_project(dir.path());
    let flags = TestFlags {
        seed: 42,
        ..TestFlags::default()
    };
    let files = read_files(&state, &[&test_path]);

    let run = || {
        let runner = ScriptedRunner::new(vec![TestOutcome::passed("test_increment")], Vec::new());
        let result = run_tests(&files, &state, &flags, &runner).unwrap();
        let seeds = (result.seed(), runner.plans.borrow()[0].seed);
        seeds
    };

    assert_eq!(run(), run());
    assert_eq!(run(), (42, Some(42)));
}
