//! Mismatch diagnostics
//!
//! When an assertion fails, the runner prints both documents as vector files.
//! Their textual serializations are split on a delimiter, one segment is
//! picked counting from the end, and the two segments are diffed line by line.

use std::fmt::Write as _;
use std::path::PathBuf;

use colored::{Color, Colorize};
use serde::Serialize;

use super::parser::{Assertion, AssertionKind};
use super::renderer::VectorArtifact;
use crate::common::config::DiffConfig;

/// Above this many LCS cells the diff degrades to remove-all/add-all
const MAX_LCS_CELLS: usize = 4_000_000;

/// Which part of a vector serialization is compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpec {
    pub delimiter: String,
    /// 1 = last segment
    pub from_end: usize,
}

impl From<&DiffConfig> for SegmentSpec {
    fn from(config: &DiffConfig) -> Self {
        Self {
            delimiter: config.delimiter.clone(),
            from_end: config.segment_from_end,
        }
    }
}

impl Default for SegmentSpec {
    fn default() -> Self {
        Self::from(&DiffConfig::default())
    }
}

/// Pick the configured segment, or `None` if the text has too few segments
pub fn extract_segment<'a>(text: &'a str, spec: &SegmentSpec) -> Option<&'a str> {
    if spec.from_end == 0 || spec.delimiter.is_empty() {
        return None;
    }
    let segments: Vec<&str> = text.split(spec.delimiter.as_str()).collect();
    segments
        .len()
        .checked_sub(spec.from_end)
        .map(|index| segments[index])
}

/// One line of a line diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "line", rename_all = "snake_case")]
pub enum DiffLine {
    Removed(String),
    Added(String),
    Unchanged(String),
}

/// Longest-common-subsequence line diff of `expected` against `actual`
pub fn diff_lines(expected: &str, actual: &str) -> Vec<DiffLine> {
    let old: Vec<&str> = expected.lines().collect();
    let new: Vec<&str> = actual.lines().collect();

    let prefix = old
        .iter()
        .zip(&new)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let mut lines: Vec<DiffLine> = old[..prefix]
        .iter()
        .map(|l| DiffLine::Unchanged(l.to_string()))
        .collect();
    lines.extend(diff_middle(old_mid, new_mid));
    lines.extend(
        old[old.len() - suffix..]
            .iter()
            .map(|l| DiffLine::Unchanged(l.to_string())),
    );
    lines
}

fn diff_middle(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let (n, m) = (old.len(), new.len());

    if n.saturating_mul(m) > MAX_LCS_CELLS {
        tracing::debug!("diff of {n}x{m} lines too large for LCS, showing replacement");
        return old
            .iter()
            .map(|l| DiffLine::Removed(l.to_string()))
            .chain(new.iter().map(|l| DiffLine::Added(l.to_string())))
            .collect();
    }

    // lcs[i][j] = LCS length of old[i..] and new[j..]
    let width = m + 1;
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if old[i] == new[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            lines.push(DiffLine::Unchanged(old[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            lines.push(DiffLine::Removed(old[i].to_string()));
            i += 1;
        } else {
            lines.push(DiffLine::Added(new[j].to_string()));
            j += 1;
        }
    }
    lines.extend(old[i..].iter().map(|l| DiffLine::Removed(l.to_string())));
    lines.extend(new[j..].iter().map(|l| DiffLine::Added(l.to_string())));
    lines
}

/// Textual comparison attached to a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum DiffOutcome {
    /// Segments differ
    Lines(Vec<DiffLine>),
    /// Segments are identical even though the rasters differ
    Identical,
    /// A vector serialization lacked the configured segment
    Unavailable(String),
    /// Error expectations carry no diff
    NotApplicable,
}

/// Everything needed to show one failed assertion
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub kind: AssertionKind,
    pub test: String,
    pub expected_snippet: String,
    pub actual_snippet: String,
    pub expected_paths: Vec<PathBuf>,
    pub actual_paths: Vec<PathBuf>,
    pub help: Option<String>,
    pub diff: DiffOutcome,
}

/// Inputs of a report that are not vector artifacts
#[derive(Debug)]
pub struct ReportContext<'a> {
    /// Test label
    pub test: &'a str,
    /// Snippet the baseline was rendered from, if it was rendered this run
    pub baseline_snippet: Option<&'a str>,
    pub expected_raster: PathBuf,
    pub actual_raster: PathBuf,
}

/// Builds diagnostic reports for failed assertions
#[derive(Debug, Clone, Default)]
pub struct DiffReporter {
    segment: SegmentSpec,
}

impl DiffReporter {
    pub fn new(segment: SegmentSpec) -> Self {
        Self { segment }
    }

    /// Report a failed assertion
    ///
    /// `expected` is only consulted for rendering expectations.
    pub fn report(
        &self,
        expected: Option<&VectorArtifact>,
        actual: &VectorArtifact,
        assertion: &Assertion,
        context: ReportContext<'_>,
    ) -> DiagnosticReport {
        let mut expected_paths = Vec::new();
        if let Some(expected) = expected {
            expected_paths.push(expected.path.clone());
        }
        expected_paths.push(context.expected_raster);

        let diff = match (assertion.kind, expected) {
            (AssertionKind::Error, _) => DiffOutcome::NotApplicable,
            (AssertionKind::Rendering, None) => {
                DiffOutcome::Unavailable("expected vector output is missing".to_string())
            }
            (AssertionKind::Rendering, Some(expected)) => self.compare(expected, actual),
        };

        DiagnosticReport {
            kind: assertion.kind,
            test: context.test.to_string(),
            expected_snippet: context
                .baseline_snippet
                .map(trim_snippet)
                .unwrap_or_else(|| "(golden image)".to_string()),
            actual_snippet: trim_snippet(&assertion.body),
            expected_paths,
            actual_paths: vec![actual.path.clone(), context.actual_raster],
            help: assertion.help.clone(),
            diff,
        }
    }

    fn compare(&self, expected: &VectorArtifact, actual: &VectorArtifact) -> DiffOutcome {
        let expected_text = expected.text();
        let actual_text = actual.text();

        let segments = (
            extract_segment(&expected_text, &self.segment),
            extract_segment(&actual_text, &self.segment),
        );
        match segments {
            (Some(old), Some(new)) if old == new => DiffOutcome::Identical,
            (Some(old), Some(new)) => DiffOutcome::Lines(diff_lines(old, new)),
            _ => DiffOutcome::Unavailable(format!(
                "vector output has fewer than {} '{}'-separated segments",
                self.segment.from_end, self.segment.delimiter
            )),
        }
    }
}

fn trim_snippet(snippet: &str) -> String {
    snippet.trim_start_matches(['\r', '\n']).trim_end().to_string()
}

/// Terminal styling, switched off for plain output
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str, color: Color) -> String {
        if self.color {
            text.color(color).bold().to_string()
        } else {
            text.to_string()
        }
    }
}

impl DiagnosticReport {
    /// Human-readable report, one item per line
    pub fn render(&self, palette: &Palette) -> String {
        let mut out = String::new();

        let headline = match self.kind {
            AssertionKind::Rendering => format!("Failed {:?}", self.test),
            AssertionKind::Error => {
                format!("Failed {:?} (result should differ but did not)", self.test)
            }
        };
        let _ = writeln!(
            out,
            "  {} {}",
            palette.paint("✗", Color::Red),
            palette.bold(&headline, Color::Red)
        );

        let _ = writeln!(out, "  {}", palette.paint("expected:", Color::White));
        for line in self.expected_snippet.lines() {
            let _ = writeln!(out, "    {}", palette.paint(line, Color::White));
        }
        for path in &self.expected_paths {
            let path = path.display().to_string();
            let _ = writeln!(out, "    {}", palette.paint(&path, Color::White));
        }

        let _ = writeln!(out, "  {}", palette.paint("actual:", Color::Blue));
        for line in self.actual_snippet.lines() {
            let _ = writeln!(out, "    {}", palette.paint(line, Color::Blue));
        }
        for path in &self.actual_paths {
            let path = path.display().to_string();
            let _ = writeln!(out, "    {}", palette.paint(&path, Color::Blue));
        }

        if let Some(help) = &self.help {
            let _ = writeln!(out, "  {} {}", palette.paint("help:", Color::Yellow), help);
        }

        match &self.diff {
            DiffOutcome::Lines(lines) => {
                let _ = writeln!(out, "  {}", palette.paint("diff:", Color::Cyan));
                for line in lines {
                    let rendered = match line {
                        DiffLine::Removed(text) => palette.paint(&format!("- {text}"), Color::Red),
                        DiffLine::Added(text) => palette.paint(&format!("+ {text}"), Color::Green),
                        DiffLine::Unchanged(text) => format!("  {text}"),
                    };
                    let _ = writeln!(out, "    {rendered}");
                }
            }
            DiffOutcome::Identical => {
                let note = palette.paint("vector output is identical", Color::Cyan);
                let _ = writeln!(out, "  {note}");
            }
            DiffOutcome::Unavailable(reason) => {
                let _ = writeln!(out, "  {} {reason}", palette.paint("no diff:", Color::Cyan));
            }
            DiffOutcome::NotApplicable => {}
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(path: &str, text: &str) -> VectorArtifact {
        VectorArtifact {
            path: PathBuf::from(path),
            bytes: Vec::new(),
            stdout: text.to_string(),
        }
    }

    fn assertion(kind: AssertionKind, body: &str, help: Option<&str>) -> Assertion {
        Assertion {
            kind,
            skip: false,
            help: help.map(str::to_string),
            body: body.to_string(),
        }
    }

    fn context<'a>(baseline: Option<&'a str>) -> ReportContext<'a> {
        ReportContext {
            test: "t1",
            baseline_snippet: baseline,
            expected_raster: PathBuf::from("tmp/f-t1.expected.bmp"),
            actual_raster: PathBuf::from("tmp/f-t1-2.bmp"),
        }
    }

    #[test]
    fn test_extract_segment_from_end() {
        let spec = SegmentSpec::default();
        assert_eq!(extract_segment("head---body---tail---", &spec), Some("body"));
        assert_eq!(extract_segment("a---b", &spec), None);

        let last = SegmentSpec {
            delimiter: "|".to_string(),
            from_end: 1,
        };
        assert_eq!(extract_segment("a|b|c", &last), Some("c"));
    }

    #[test]
    fn test_extract_segment_rejects_degenerate_settings() {
        let zero = SegmentSpec {
            delimiter: "---".to_string(),
            from_end: 0,
        };
        assert_eq!(extract_segment("a---b", &zero), None);
    }

    #[test]
    fn test_diff_lines_marks_changes() {
        let diff = diff_lines("a\nb\nc\nd", "a\nx\nc\nd\ne");
        assert_eq!(
            diff,
            vec![
                DiffLine::Unchanged("a".to_string()),
                DiffLine::Removed("b".to_string()),
                DiffLine::Added("x".to_string()),
                DiffLine::Unchanged("c".to_string()),
                DiffLine::Unchanged("d".to_string()),
                DiffLine::Added("e".to_string()),
            ]
        );
    }

    #[test]
    fn test_diff_lines_keeps_longest_common_run() {
        let diff = diff_lines("x\na\nb\nc", "a\nb\nc\ny");
        let unchanged = diff
            .iter()
            .filter(|l| matches!(l, DiffLine::Unchanged(_)))
            .count();
        assert_eq!(unchanged, 3);
        assert_eq!(diff.first(), Some(&DiffLine::Removed("x".to_string())));
        assert_eq!(diff.last(), Some(&DiffLine::Added("y".to_string())));
    }

    #[test]
    fn test_diff_of_identical_text_is_unchanged() {
        let diff = diff_lines("a\nb", "a\nb");
        assert!(diff.iter().all(|l| matches!(l, DiffLine::Unchanged(_))));
    }

    #[test]
    fn test_rendering_report_has_diff_and_paths() {
        let reporter = DiffReporter::default();
        let expected = vector("tmp/f-t1.expected.pdf", "h---fill red\nrect---t---");
        let actual = vector("tmp/f-t1-2.pdf", "h---fill blue\nrect---t---");
        let failed = assertion(AssertionKind::Rendering, "\n  <p>blue</p>\n", Some("colors"));

        let report = reporter.report(Some(&expected), &actual, &failed, context(Some("\n<p>red</p>")));

        assert_eq!(report.expected_snippet, "<p>red</p>");
        assert_eq!(report.actual_snippet, "  <p>blue</p>");
        assert_eq!(
            report.expected_paths,
            vec![
                PathBuf::from("tmp/f-t1.expected.pdf"),
                PathBuf::from("tmp/f-t1.expected.bmp")
            ]
        );
        assert_eq!(
            report.actual_paths,
            vec![PathBuf::from("tmp/f-t1-2.pdf"), PathBuf::from("tmp/f-t1-2.bmp")]
        );
        assert_eq!(
            report.diff,
            DiffOutcome::Lines(vec![
                DiffLine::Removed("fill red".to_string()),
                DiffLine::Added("fill blue".to_string()),
                DiffLine::Unchanged("rect".to_string()),
            ])
        );

        let text = report.render(&Palette::new(false));
        assert!(text.contains("Failed \"t1\""));
        assert!(text.contains("- fill red"));
        assert!(text.contains("+ fill blue"));
        assert!(text.contains("help: colors"));
        assert!(text.contains("tmp/f-t1-2.bmp"));
    }

    #[test]
    fn test_error_report_states_expectation() {
        let reporter = DiffReporter::default();
        let actual = vector("tmp/f-t1-2.pdf", "whatever");
        let failed = assertion(AssertionKind::Error, "<p>same</p>", None);

        let report = reporter.report(None, &actual, &failed, context(None));
        assert_eq!(report.diff, DiffOutcome::NotApplicable);
        assert_eq!(report.expected_snippet, "(golden image)");

        let text = report.render(&Palette::new(false));
        assert!(text.contains("result should differ but did not"));
        assert!(text.contains("tmp/f-t1-2.pdf"));
        assert!(text.contains("tmp/f-t1-2.bmp"));
        assert!(!text.contains("help:"));
    }

    #[test]
    fn test_short_vector_output_has_no_diff() {
        let reporter = DiffReporter::default();
        let expected = vector("e.pdf", "no delimiters");
        let actual = vector("a.pdf", "no delimiters either");
        let failed = assertion(AssertionKind::Rendering, "<p/>", None);

        let report = reporter.report(Some(&expected), &actual, &failed, context(Some("<p/>")));
        assert!(matches!(report.diff, DiffOutcome::Unavailable(_)));
    }

    #[test]
    fn test_identical_segments() {
        let reporter = DiffReporter::default();
        let expected = vector("e.pdf", "a---same---c---");
        let actual = vector("a.pdf", "b---same---d---");
        let failed = assertion(AssertionKind::Rendering, "<p/>", None);

        let report = reporter.report(Some(&expected), &actual, &failed, context(Some("<p/>")));
        assert_eq!(report.diff, DiffOutcome::Identical);
    }
}
