//! Reftest runner
//!
//! Walks every fixture matched by the glob, strictly one assertion at a time:
//! compose, render, compare against the test case's baseline, and report.
//! A failure in one assertion never stops sibling test cases or other fixtures;
//! with `fast` set it abandons the rest of its own test case.

use std::path::{Path, PathBuf};

use colored::Color;
use serde::Serialize;

use super::compare;
use super::composer::compose;
use super::diff::{DiagnosticReport, DiffReporter, Palette, ReportContext, SegmentSpec};
use super::parser::{extract_cases, Assertion, AssertionKind, ContainerTemplate, Fixture, TestCase};
use super::renderer::{Renderer, VectorArtifact};
use super::store::{ArtifactNames, CaseKey, FixtureStore};
use crate::common::{Error, Result};

/// Fixture file extension; other glob matches are ignored
pub const FIXTURE_EXT: &str = "xhtml";

/// Settings for one run, resolved from config and CLI flags
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub tests_root: PathBuf,
    /// Glob relative to `tests_root` (absolute patterns are used as-is)
    pub pattern: String,
    pub scratch_dir: PathBuf,
    /// Abandon a test case at its first failure
    pub fast: bool,
    /// Keep failing rasters after the run
    pub keep_artifacts: bool,
    /// Write newly established baselines as golden images
    pub update_golden: bool,
    pub segment: SegmentSpec,
    pub color: bool,
}

/// Terminal state of an assertion
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verdict", content = "failure", rename_all = "snake_case")]
pub enum Verdict {
    Skipped,
    BaselineEstablished,
    Passed,
    Failed(Failure),
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Failed(_))
    }
}

/// Why an assertion failed
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Failure {
    /// Raster comparison disagreed with the expectation
    Mismatch(Box<DiagnosticReport>),
    /// The renderer crashed, timed out, or wrote nothing
    Render(String),
    /// The document could not be composed or written
    Fixture(String),
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        if e.is_render_failure() {
            Failure::Render(e.to_string())
        } else {
            Failure::Fixture(e.to_string())
        }
    }
}

/// Outcome of one assertion
#[derive(Debug, Clone, Serialize)]
pub struct AssertionRecord {
    pub fixture: PathBuf,
    pub test: String,
    /// 1-based position in the test case
    pub assertion: usize,
    pub kind: AssertionKind,
    pub outcome: Verdict,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files: usize,
    pub cases: usize,
    pub records: Vec<AssertionRecord>,
    /// Fixtures that could not be read
    pub fixture_errors: Vec<String>,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&Verdict) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(Verdict::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Skipped))
    }

    pub fn baselines(&self) -> usize {
        self.count(|v| matches!(v, Verdict::BaselineEstablished))
    }

    /// No mismatch, render failure or unreadable fixture anywhere
    pub fn success(&self) -> bool {
        self.failed() == 0 && self.fixture_errors.is_empty()
    }
}

/// Fixture files matched by `pattern` below `root`, in path order
pub fn discover(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            pattern
        )
    };

    let mut files = Vec::new();
    for entry in glob::glob(&full_pattern)? {
        let path = entry?;
        if path.is_file() && path.extension().is_some_and(|ext| ext == FIXTURE_EXT) {
            files.push(path);
        } else {
            tracing::debug!(path = %path.display(), "skipping non-fixture match");
        }
    }
    files.sort();
    Ok(files)
}

/// Whether `file` lies inside `scratch_dir`, however either path is spelled
pub fn in_scratch_dir(file: &Path, scratch_dir: &Path) -> bool {
    match (file.canonicalize(), scratch_dir.canonicalize()) {
        (Ok(file), Ok(dir)) => file.starts_with(dir),
        _ => file.starts_with(scratch_dir),
    }
}

/// Read and parse one fixture file
pub fn read_fixture(path: &Path) -> Result<Fixture> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    Ok(extract_cases(&content))
}

/// Run every matched fixture against `renderer`
///
/// Only discovery and scratch setup errors are returned; everything else is
/// recorded in the summary. Scratch cleanup always runs once fixtures start.
pub async fn run<R: Renderer + ?Sized>(renderer: &R, options: &RunOptions) -> Result<RunSummary> {
    let files = discover(&options.tests_root, &options.pattern)?;
    let store = FixtureStore::open(&options.scratch_dir)?;

    let mut runner = Runner {
        renderer,
        options,
        store,
        reporter: DiffReporter::new(options.segment.clone()),
        palette: Palette::new(options.color),
    };

    let mut summary = RunSummary::default();
    for file in &files {
        if in_scratch_dir(file, &options.scratch_dir) {
            tracing::debug!(path = %file.display(), "skipping scratch file");
            continue;
        }
        runner.run_fixture(file, &mut summary).await;
    }

    runner.store.cleanup(options.keep_artifacts);
    runner.print_summary(&summary);
    Ok(summary)
}

/// Per-test-case baseline state
#[derive(Debug, Default)]
struct CaseState {
    /// Raster every later assertion is compared against
    baseline: Option<Vec<u8>>,
    /// Body of the first non-skipped assertion
    reference_snippet: Option<String>,
    /// Printed lazily on the first rendering mismatch
    expected_vector: Option<VectorArtifact>,
}

struct Runner<'a, R: ?Sized> {
    renderer: &'a R,
    options: &'a RunOptions,
    store: FixtureStore,
    reporter: DiffReporter,
    palette: Palette,
}

impl<R: Renderer + ?Sized> Runner<'_, R> {
    async fn run_fixture(&mut self, file: &Path, summary: &mut RunSummary) {
        summary.files += 1;
        println!(
            "\n{} {}",
            self.palette.bold("Running", Color::Blue),
            file.display()
        );

        let fixture = match read_fixture(file) {
            Ok(fixture) => fixture,
            Err(e) => {
                tracing::error!("{e}");
                summary.fixture_errors.push(e.to_string());
                return;
            }
        };

        // Artifact names are keyed on the path below the fixture root
        let key_path = file
            .strip_prefix(&self.options.tests_root)
            .unwrap_or(file)
            .to_path_buf();

        for (i, case) in fixture.cases.iter().enumerate() {
            summary.cases += 1;
            self.run_case(file, &key_path, &fixture.container, case, i + 1, summary)
                .await;
        }
    }

    async fn run_case(
        &mut self,
        file: &Path,
        key_path: &Path,
        container: &ContainerTemplate,
        case: &TestCase,
        index: usize,
        summary: &mut RunSummary,
    ) {
        let label = case.label(index);
        println!("{} {:?}", self.palette.bold("Test", Color::White), label);

        let names = self.store.artifacts(key_path, CaseKey::for_case(case, index));
        let mut state = CaseState::default();

        if let Some(id) = &case.id {
            match self.load_golden(file, id, &names) {
                Ok(golden) => state.baseline = golden,
                Err(e) => tracing::warn!("Ignoring unreadable golden image: {e}"),
            }
        }

        for (i, assertion) in case.assertions.iter().enumerate() {
            let n = i + 1;
            let verdict = if assertion.skip {
                Verdict::Skipped
            } else {
                match self
                    .run_assertion(file, container, case, &label, &names, &mut state, assertion, n)
                    .await
                {
                    Ok(verdict) => verdict,
                    Err(e) => Verdict::Failed(e.into()),
                }
            };

            self.print_verdict(&verdict, assertion.kind, n);
            let failed = verdict.is_failure();
            summary.records.push(AssertionRecord {
                fixture: file.to_path_buf(),
                test: label.clone(),
                assertion: n,
                kind: assertion.kind,
                outcome: verdict,
            });

            if failed && self.options.fast {
                let remaining = case.assertions.len() - n;
                if remaining > 0 {
                    tracing::info!("Abandoning {remaining} remaining assertion(s) of {label:?}");
                }
                break;
            }
        }
    }

    /// Golden raster of a test, mirrored into the scratch directory
    fn load_golden(&self, file: &Path, id: &str, names: &ArtifactNames) -> Result<Option<Vec<u8>>> {
        let Some(golden) = self.store.load_golden(file, id)? else {
            return Ok(None);
        };
        self.store.persist_baseline(names, &golden)?;
        Ok(Some(golden))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_assertion(
        &mut self,
        file: &Path,
        container: &ContainerTemplate,
        case: &TestCase,
        label: &str,
        names: &ArtifactNames,
        state: &mut CaseState,
        assertion: &Assertion,
        n: usize,
    ) -> Result<Verdict> {
        let document = compose(container, &assertion.body)?;
        self.store.write_document(&document)?;

        let raster = self
            .renderer
            .render(self.store.document_path(), &names.raster(n))
            .await?;

        if state.reference_snippet.is_none() {
            state.reference_snippet = Some(assertion.body.clone());
        }

        let Some(baseline) = &state.baseline else {
            self.store.persist_baseline(names, &raster.bytes)?;
            if self.options.update_golden {
                if let Some(id) = &case.id {
                    let path = self.store.persist_golden(file, id, &raster.bytes)?;
                    tracing::info!("Wrote golden image {}", path.display());
                }
            }
            self.store.discard(&raster.path);
            state.baseline = Some(raster.bytes);
            return Ok(Verdict::BaselineEstablished);
        };

        if compare::satisfies(assertion.kind, baseline, &raster.bytes) {
            self.store.discard(&raster.path);
            return Ok(Verdict::Passed);
        }

        // The shared document still holds this assertion
        let actual = self
            .renderer
            .print(self.store.document_path(), &names.vector(n))
            .await?;

        if assertion.kind == AssertionKind::Rendering {
            self.ensure_expected_vector(container, names, state).await?;
        }

        let report = self.reporter.report(
            state.expected_vector.as_ref(),
            &actual,
            assertion,
            ReportContext {
                test: label,
                baseline_snippet: state.reference_snippet.as_deref(),
                expected_raster: names.expected_raster(),
                actual_raster: raster.path,
            },
        );
        print!("{}", report.render(&self.palette));

        Ok(Verdict::Failed(Failure::Mismatch(Box::new(report))))
    }

    /// Print the reference snippet as a vector file, once per test case
    async fn ensure_expected_vector(
        &self,
        container: &ContainerTemplate,
        names: &ArtifactNames,
        state: &mut CaseState,
    ) -> Result<()> {
        if state.expected_vector.is_some() {
            return Ok(());
        }

        let snippet = state.reference_snippet.as_deref().unwrap_or_default();
        self.store.write_document(&compose(container, snippet)?)?;
        let vector = self
            .renderer
            .print(self.store.document_path(), &names.expected_vector())
            .await?;
        state.expected_vector = Some(vector);
        Ok(())
    }

    fn print_verdict(&self, verdict: &Verdict, kind: AssertionKind, n: usize) {
        let palette = &self.palette;
        let line = match verdict {
            Verdict::Skipped => format!(
                "  {} {} {n}",
                palette.paint("-", Color::Yellow),
                palette.paint("Skipped", Color::Yellow)
            ),
            Verdict::BaselineEstablished => format!(
                "  {} Baseline from {} {n}",
                palette.paint("●", Color::Cyan),
                kind.tag()
            ),
            Verdict::Passed => format!(
                "  {} {} {} {n}",
                palette.paint("✓", Color::Green),
                palette.paint("Passed", Color::Green),
                kind.tag()
            ),
            // Already printed as a full report
            Verdict::Failed(Failure::Mismatch(_)) => return,
            Verdict::Failed(Failure::Render(message) | Failure::Fixture(message)) => format!(
                "  {} {} {} {n}: {message}",
                palette.paint("✗", Color::Red),
                palette.bold("Error", Color::Red),
                kind.tag()
            ),
        };
        println!("{line}");
    }

    fn print_summary(&self, summary: &RunSummary) {
        let failed = format!("{} failed", summary.failed());
        println!(
            "\n{} file(s), {} test(s): {}, {}, {} skipped, {} baseline(s)",
            summary.files,
            summary.cases,
            self.palette.paint(&format!("{} passed", summary.passed()), Color::Green),
            if summary.failed() > 0 {
                self.palette.bold(&failed, Color::Red)
            } else {
                failed
            },
            summary.skipped(),
            summary.baselines(),
        );
    }
}
