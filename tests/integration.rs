//! End-to-end integration tests for the reftest CLI
//!
//! These tests verify the complete pipeline by:
//! 1. Copying fixtures into a fresh tests root
//! 2. Running the reftest binary with the mock renderer
//! 3. Checking exit status, printed reports and the JSON summary

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

/// Test context with paths and cleanup
struct TestContext {
    /// Temporary directory for this test
    temp_dir: PathBuf,
    /// Tests root handed to the harness
    tests_root: PathBuf,
    /// Empty config file, so user configuration never leaks in
    config: PathBuf,
}

impl TestContext {
    /// Create a new test context
    fn new(test_name: &str) -> Self {
        let temp_base = env::temp_dir().join("reftest-cli-tests");
        let temp_dir = temp_base.join(test_name);

        // Clean up any previous test artifacts
        let _ = fs::remove_dir_all(&temp_dir);
        let tests_root = temp_dir.join("tests");
        fs::create_dir_all(tests_root.join("suite")).expect("Failed to create tests root");

        let config = temp_dir.join("config.toml");
        fs::write(&config, "").expect("Failed to write config");

        Self {
            temp_dir,
            tests_root,
            config,
        }
    }

    /// Copy a fixture from tests/fixtures into the suite directory
    fn add_fixture(&self, name: &str) -> PathBuf {
        let source = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name);
        let target = self.tests_root.join("suite").join(name);
        fs::copy(&source, &target).expect("Failed to copy fixture");
        target
    }

    fn scratch_dir(&self) -> PathBuf {
        self.tests_root.join("tmp")
    }

    fn report_path(&self) -> PathBuf {
        self.temp_dir.join("report.json")
    }

    /// Run a reftest subcommand with the shared location flags
    fn reftest(&self, subcommand: &str, extra: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_reftest"));
        cmd.arg(subcommand)
            .arg("--config")
            .arg(&self.config)
            .arg("--tests-root")
            .arg(&self.tests_root)
            .env("NO_COLOR", "1");
        if subcommand == "run" {
            cmd.arg("--renderer")
                .arg(env!("CARGO_BIN_EXE_mock_renderer"))
                .arg("--no-color")
                .arg("--report")
                .arg(self.report_path());
        }
        cmd.args(extra).output().expect("Failed to run reftest")
    }

    fn report(&self) -> Value {
        let text = fs::read_to_string(self.report_path()).expect("Failed to read report");
        serde_json::from_str(&text).expect("Report is not JSON")
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.temp_dir);
    }
}

/// (test label, assertion verdict) pairs from a JSON report
fn verdicts(report: &Value) -> Vec<(String, String)> {
    report["records"]
        .as_array()
        .expect("records array")
        .iter()
        .map(|r| {
            let verdict = r["outcome"]["verdict"].as_str().unwrap().to_string();
            let verdict = match r["outcome"]["failure"]["kind"].as_str() {
                Some(kind) => format!("{verdict}:{kind}"),
                None => verdict,
            };
            (r["test"].as_str().unwrap().to_string(), verdict)
        })
        .collect()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|(t, v)| (t.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_passing_fixture_exits_zero() {
    let ctx = TestContext::new("passing");
    ctx.add_fixture("basic.xhtml");

    let output = ctx.reftest("run", &[]);
    assert!(output.status.success(), "stdout: {}", stdout(&output));

    assert_eq!(
        verdicts(&ctx.report()),
        pairs(&[
            ("Indentation does not matter", "baseline_established"),
            ("Indentation does not matter", "passed"),
            ("Different text is different", "baseline_established"),
            ("Different text is different", "passed"),
            ("Different text is different", "skipped"),
        ])
    );

    // Only baselines survive a passing run
    let scratch = ctx.scratch_dir();
    assert!(!scratch.join("reftest.xhtml").exists());
    let leftovers: Vec<_> = fs::read_dir(&scratch)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !name.contains(".expected."))
        .collect();
    assert!(leftovers.is_empty(), "leftover artifacts: {leftovers:?}");
}

#[test]
fn test_mismatches_are_reported() {
    let ctx = TestContext::new("mismatch");
    ctx.add_fixture("failing.xhtml");

    let output = ctx.reftest("run", &[]);
    assert_eq!(output.status.code(), Some(1));

    let out = stdout(&output);
    assert!(out.contains("Failed \"Text mismatch\""), "stdout: {out}");
    assert!(out.contains("- <p>red</p>"), "stdout: {out}");
    assert!(out.contains("+ <p>blue</p>"), "stdout: {out}");
    assert!(out.contains("help: paragraph text must not change"));
    assert!(out.contains("result should differ but did not"));

    assert_eq!(
        verdicts(&ctx.report()),
        pairs(&[
            ("Text mismatch", "baseline_established"),
            ("Text mismatch", "failed:mismatch"),
            ("Not different", "baseline_established"),
            ("Not different", "failed:mismatch"),
        ])
    );

    // Vector artifacts stay for inspection
    let scratch = ctx.scratch_dir();
    assert!(scratch.join("suite_2Ffailing.xhtml-color.expected.pdf").exists());
    assert!(scratch.join("suite_2Ffailing.xhtml-color-2.pdf").exists());
}

#[test]
fn test_keep_artifacts_retains_failing_rasters() {
    let ctx = TestContext::new("keep_artifacts");
    ctx.add_fixture("failing.xhtml");

    let output = ctx.reftest("run", &["--keep-artifacts"]);
    assert_eq!(output.status.code(), Some(1));

    let scratch = ctx.scratch_dir();
    assert!(scratch.join("suite_2Ffailing.xhtml-color-2.bmp").exists());
    // Baselines never leave a per-assertion raster behind
    assert!(!scratch.join("suite_2Ffailing.xhtml-color-1.bmp").exists());
}

#[test]
fn test_fast_stops_only_the_failing_test() {
    let ctx = TestContext::new("fast");
    ctx.add_fixture("fast.xhtml");

    let output = ctx.reftest("run", &["--fast"]);
    assert_eq!(output.status.code(), Some(1));

    assert_eq!(
        verdicts(&ctx.report()),
        pairs(&[
            ("Stops early", "baseline_established"),
            ("Stops early", "failed:mismatch"),
            ("Still runs", "baseline_established"),
            ("Still runs", "passed"),
        ])
    );
}

#[test]
fn test_without_fast_every_assertion_runs() {
    let ctx = TestContext::new("no_fast");
    ctx.add_fixture("fast.xhtml");

    let output = ctx.reftest("run", &[]);
    assert_eq!(output.status.code(), Some(1));

    let report = ctx.report();
    let first: Vec<_> = verdicts(&report)
        .into_iter()
        .filter(|(test, _)| test == "Stops early")
        .map(|(_, verdict)| verdict)
        .collect();
    assert_eq!(first, vec!["baseline_established", "failed:mismatch", "passed"]);
}

#[test]
fn test_render_failures_are_isolated() {
    let ctx = TestContext::new("crash");
    ctx.add_fixture("crash.xhtml");

    let output = ctx.reftest("run", &[]);
    assert_eq!(output.status.code(), Some(1));

    assert_eq!(
        verdicts(&ctx.report()),
        pairs(&[
            ("Renderer crash", "failed:render"),
            ("Renderer writes nothing", "failed:render"),
            ("Unaffected", "baseline_established"),
            ("Unaffected", "passed"),
        ])
    );
    assert!(stdout(&output).contains("exit code 3"));
}

#[test]
fn test_timeout_kills_hung_renderer() {
    let ctx = TestContext::new("timeout");
    ctx.add_fixture("slow.xhtml");

    let started = std::time::Instant::now();
    let output = ctx.reftest("run", &["--timeout", "1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(started.elapsed() < std::time::Duration::from_secs(8));

    assert_eq!(
        verdicts(&ctx.report()),
        pairs(&[("Renderer hangs", "failed:render")])
    );
}

#[test]
fn test_golden_image_round_trip() {
    let ctx = TestContext::new("golden");
    let fixture = ctx.add_fixture("golden.xhtml");
    let golden = fixture.with_file_name("golden-box.bmp");

    let output = ctx.reftest("run", &["--update-golden"]);
    assert!(output.status.success(), "stdout: {}", stdout(&output));
    assert!(golden.exists());
    assert_eq!(
        verdicts(&ctx.report()),
        pairs(&[
            ("Golden image", "baseline_established"),
            ("Golden image", "passed"),
        ])
    );

    // With a golden image every assertion is compared, and verdicts are stable
    for _ in 0..2 {
        let output = ctx.reftest("run", &[]);
        assert!(output.status.success(), "stdout: {}", stdout(&output));
        assert_eq!(
            verdicts(&ctx.report()),
            pairs(&[("Golden image", "passed"), ("Golden image", "passed")])
        );
    }

    // A stale golden image fails the first assertion
    fs::write(&golden, b"BM\nstale\n").unwrap();
    let output = ctx.reftest("run", &[]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        verdicts(&ctx.report()),
        pairs(&[
            ("Golden image", "failed:mismatch"),
            ("Golden image", "passed"),
        ])
    );
}

#[test]
fn test_no_matching_fixtures() {
    let ctx = TestContext::new("no_matches");
    ctx.add_fixture("basic.xhtml");

    let output = ctx.reftest("run", &["--glob", "missing/*.xhtml"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("0 file(s)"));
    assert_eq!(ctx.report()["records"].as_array().unwrap().len(), 0);
}

#[test]
fn test_missing_renderer() {
    let ctx = TestContext::new("missing_renderer");
    ctx.add_fixture("basic.xhtml");

    let output = Command::new(env!("CARGO_BIN_EXE_reftest"))
        .args(["run", "--renderer", "/nonexistent/paper-muncher", "--config"])
        .arg(&ctx.config)
        .arg("--tests-root")
        .arg(&ctx.tests_root)
        .output()
        .expect("Failed to run reftest");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn test_list_command() {
    let ctx = TestContext::new("list");
    ctx.add_fixture("basic.xhtml");

    let output = ctx.reftest("list", &[]);
    assert!(output.status.success());

    let out = stdout(&output);
    assert!(out.contains("basic.xhtml (container)"));
    assert!(out.contains("\"Indentation does not matter\" [indent]"));
    assert!(out.contains("2. error: two is not one"));
    assert!(out.contains("3. rendering (skip)"));
    // Listing never touches the scratch directory
    assert!(!ctx.scratch_dir().exists());
}

#[test]
fn test_clean_command() {
    let ctx = TestContext::new("clean");
    ctx.add_fixture("failing.xhtml");

    ctx.reftest("run", &["--keep-artifacts"]);
    assert!(fs::read_dir(ctx.scratch_dir()).unwrap().count() > 0);

    let output = ctx.reftest("clean", &[]);
    assert!(output.status.success());
    assert_eq!(fs::read_dir(ctx.scratch_dir()).unwrap().count(), 0);

    let output = ctx.reftest("clean", &[]);
    assert!(stdout(&output).contains("Removed 0 file(s)"));
}
