//! Fixture markup parsing
//!
//! Fixtures are scanned for four tags only: `<container>` and `<test>` at the
//! top level, `<rendering>` and `<error>` inside a test body. Tags do not nest:
//! an element ends at the first matching close tag. Anything malformed is
//! skipped and scanning resumes after it, so one broken test never hides the
//! rest of the file.

use serde::Serialize;

/// Tag holding the container template
const CONTAINER_TAG: &str = "container";
/// Tag holding one test case
const TEST_TAG: &str = "test";
/// Assertion that must render identically to the baseline
const RENDERING_TAG: &str = "rendering";
/// Assertion that must render differently from the baseline
const ERROR_TAG: &str = "error";

/// Everything extracted from one fixture file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub container: ContainerTemplate,
    pub cases: Vec<TestCase>,
}

/// Optional page wrapped around every snippet of a fixture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerTemplate {
    /// Template text expected to hold exactly one slot marker
    Template(String),
    /// No `<container>` in the file; snippets are rendered on their own
    Absent,
}

/// One `<test>` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Golden image key; empty ids are treated as absent
    pub id: Option<String>,
    pub name: Option<String>,
    /// Assertions in source order; the first non-skipped one sets the baseline
    pub assertions: Vec<Assertion>,
}

impl TestCase {
    /// Label used in progress output
    pub fn label(&self, index: usize) -> String {
        match (&self.name, &self.id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => id.clone(),
            (None, None) => format!("#{index}"),
        }
    }
}

/// Expectation of an assertion relative to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    /// Raster must be byte-identical to the baseline
    Rendering,
    /// Raster must differ from the baseline
    Error,
}

impl AssertionKind {
    pub fn tag(&self) -> &'static str {
        match self {
            AssertionKind::Rendering => RENDERING_TAG,
            AssertionKind::Error => ERROR_TAG,
        }
    }
}

/// One `<rendering>` or `<error>` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub kind: AssertionKind,
    pub skip: bool,
    pub help: Option<String>,
    /// Snippet rendered inside the container
    pub body: String,
}

/// Extract the container template and test cases from fixture markup
pub fn extract_cases(content: &str) -> Fixture {
    let mut container = ContainerTemplate::Absent;
    let mut cases = Vec::new();

    for element in scan(content, &[CONTAINER_TAG, TEST_TAG]) {
        match element.name {
            CONTAINER_TAG => {
                if let ContainerTemplate::Template(_) = container {
                    tracing::debug!("ignoring extra <container> block");
                    continue;
                }
                container = ContainerTemplate::Template(element.body.to_string());
            }
            _ => cases.push(TestCase {
                id: element.attr(TEST_ID_ATTR),
                name: element.attr(TEST_NAME_ATTR),
                assertions: extract_assertions(element.body),
            }),
        }
    }

    Fixture { container, cases }
}

const TEST_ID_ATTR: &str = "id";
const TEST_NAME_ATTR: &str = "name";

fn extract_assertions(body: &str) -> Vec<Assertion> {
    scan(body, &[RENDERING_TAG, ERROR_TAG])
        .into_iter()
        .map(|element| Assertion {
            kind: if element.name == ERROR_TAG {
                AssertionKind::Error
            } else {
                AssertionKind::Rendering
            },
            skip: element.has_attr("skip"),
            help: element.attr("help"),
            body: element.body.to_string(),
        })
        .collect()
}

/// A matched open/close tag pair
#[derive(Debug)]
struct Element<'a> {
    name: &'static str,
    attrs: Vec<(&'a str, Option<String>)>,
    body: &'a str,
}

impl Element<'_> {
    fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(key, _)| *key == name)
    }

    /// Non-empty value of an attribute
    fn attr(&self, name: &str) -> Option<String> {
        self.attrs
            .iter()
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
    }
}

/// Scan `input` for the given tags, in source order
fn scan<'a>(input: &'a str, names: &[&'static str]) -> Vec<Element<'a>> {
    let mut elements = Vec::new();
    let mut pos = 0;

    while let Some(offset) = input[pos..].find('<') {
        let lt = pos + offset;
        let Some(name) = open_tag_name(&input[lt + 1..], names) else {
            pos = lt + 1;
            continue;
        };

        let attrs_start = lt + 1 + name.len();
        let Some(gt) = tag_end(&input[attrs_start..]).map(|i| attrs_start + i) else {
            tracing::debug!("unterminated <{name}> tag at byte {lt}");
            break;
        };

        let raw_attrs = &input[attrs_start..gt];
        if raw_attrs.trim_end().ends_with('/') {
            tracing::debug!("skipping self-closing <{name}/> at byte {lt}");
            pos = gt + 1;
            continue;
        }

        let close = format!("</{name}>");
        let Some(end) = input[gt + 1..].find(&close).map(|i| gt + 1 + i) else {
            tracing::debug!("unmatched <{name}> tag at byte {lt}");
            pos = gt + 1;
            continue;
        };

        elements.push(Element {
            name,
            attrs: parse_attrs(raw_attrs),
            body: &input[gt + 1..end],
        });
        pos = end + close.len();
    }

    elements
}

/// Offset of the `>` closing an open tag, skipping quoted attribute values
fn tag_end(attrs: &str) -> Option<usize> {
    let mut quote = None;
    let mut after_eq = false;
    for (i, c) in attrs.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' if after_eq => quote = Some(c),
                '>' => return Some(i),
                _ => {}
            },
        }
        if !c.is_whitespace() {
            after_eq = quote.is_none() && c == '=';
        }
    }
    None
}

/// Tag name at the start of `rest` if it is one of `names` and is followed by a tag boundary
fn open_tag_name(rest: &str, names: &[&'static str]) -> Option<&'static str> {
    names.iter().copied().find(|name| {
        rest.strip_prefix(name)
            .and_then(|after| after.chars().next())
            .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
    })
}

/// Parse `key="value"`, `key='value'`, `key=value` and bare `key` attributes
fn parse_attrs(raw: &str) -> Vec<(&str, Option<String>)> {
    let mut attrs = Vec::new();
    let mut rest = raw.trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = rest[key_end..].trim_start();

        if key.is_empty() {
            // Stray '=' or '/'
            rest = rest[1..].trim_start();
            continue;
        }

        let Some(after_eq) = rest.strip_prefix('=') else {
            attrs.push((key, None));
            continue;
        };
        let after_eq = after_eq.trim_start();

        let (value, remaining) = match after_eq.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let inner = &after_eq[1..];
                match inner.find(quote) {
                    Some(close) => (&inner[..close], &inner[close + 1..]),
                    None => (inner, ""),
                }
            }
            _ => {
                let end = after_eq
                    .find(char::is_whitespace)
                    .unwrap_or(after_eq.len());
                (&after_eq[..end], &after_eq[end..])
            }
        };

        attrs.push((key, Some(value.to_string())));
        rest = remaining.trim_start();
    }

    attrs
}
