//! Composition of renderable documents from a container and a snippet

use super::parser::ContainerTemplate;
use crate::common::{Error, Result};

/// Placeholder in a container template replaced by each snippet
pub const SLOT_MARKER: &str = "<slot/>";

/// Declaration prepended to every composed document
pub const DOCTYPE: &str = "<!DOCTYPE html>\n";

/// A complete document ready to be handed to the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document(String);

impl Document {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Merge a snippet into the container template
///
/// Without a container the snippet is rendered on its own. A container that
/// lacks the slot marker is an error: rendering it would silently drop the snippet.
/// The template is dedented; the snippet is always inserted verbatim.
pub fn compose(container: &ContainerTemplate, snippet: &str) -> Result<Document> {
    let markup = match container {
        ContainerTemplate::Absent => {
            tracing::warn!("No <container> in fixture, rendering snippet directly");
            snippet.to_string()
        }
        ContainerTemplate::Template(template) => {
            if !template.contains(SLOT_MARKER) {
                return Err(Error::MissingSlot {
                    marker: SLOT_MARKER,
                });
            }
            dedent(template).replace(SLOT_MARKER, snippet)
        }
    };

    Ok(Document(format!("{DOCTYPE}{markup}")))
}

/// Remove the whitespace prefix shared by every non-blank line
///
/// Blank lines are ignored when computing the prefix and emitted empty.
fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .reduce(|common, indent| {
            let shared = common
                .char_indices()
                .zip(indent.chars())
                .find(|((_, a), b)| a != b)
                .map_or(common.len().min(indent.len()), |((i, _), _)| i);
            &common[..shared]
        })
        .unwrap_or("");

    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                if line.ends_with('\n') {
                    "\n"
                } else {
                    ""
                }
            } else {
                line.strip_prefix(margin).unwrap_or(line)
            }
        })
        .collect()
}
