//! Error types for the reftest harness
//!
//! Errors that concern a single assertion (a renderer crash, a missing slot
//! marker) are recorded against that assertion by the runner; only errors
//! that make the whole run impossible propagate out of `run`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the reftest harness
#[derive(Error, Debug)]
pub enum Error {
    // === Renderer Errors ===
    #[error("Renderer '{name}' not found. Set [renderer].program in the config or pass --renderer")]
    RendererNotFound { name: String },

    #[error("Failed to spawn renderer '{program}': {source}")]
    RendererSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Renderer '{mode}' exited with {status}: {stderr}")]
    RenderFailed {
        mode: String,
        status: String,
        stderr: String,
    },

    #[error("Renderer '{mode}' timed out after {limit:?}")]
    RenderTimeout { mode: String, limit: Duration },

    #[error("Renderer '{mode}' produced no output at '{}'", path.display())]
    RenderOutputMissing { mode: String, path: PathBuf },

    // === Fixture Errors ===
    #[error("Container template has no {marker} marker")]
    MissingSlot { marker: &'static str },

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Failed to walk glob matches: {0}")]
    GlobWalk(#[from] glob::GlobError),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Failed to write file '{path}': {error}")]
    FileWrite { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a render failure error from a process exit status
    pub fn render_failed(mode: &str, status: &str, stderr: &str) -> Self {
        Self::RenderFailed {
            mode: mode.to_string(),
            status: status.to_string(),
            stderr: tail(stderr.trim(), 400).to_string(),
        }
    }

    /// Create a file read error for a path
    pub fn file_read(path: &std::path::Path, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a file write error for a path
    pub fn file_write(path: &std::path::Path, error: impl ToString) -> Self {
        Self::FileWrite {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Whether this error came from invoking the external renderer
    pub fn is_render_failure(&self) -> bool {
        matches!(
            self,
            Error::RendererSpawn { .. }
                | Error::RenderFailed { .. }
                | Error::RenderTimeout { .. }
                | Error::RenderOutputMissing { .. }
        )
    }
}

/// Last `max` bytes of `s`, cut on a char boundary
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_failed_keeps_stderr_tail() {
        let stderr = format!("{}END", "x".repeat(1000));
        let err = Error::render_failed("render", "exit code 3", &stderr);
        match err {
            Error::RenderFailed { stderr, .. } => {
                assert_eq!(stderr.len(), 400);
                assert!(stderr.ends_with("END"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_render_failure_classification() {
        let err = Error::RenderTimeout {
            mode: "print".to_string(),
            limit: Duration::from_secs(5),
        };
        assert!(err.is_render_failure());
        assert_eq!(err.to_string(), "Renderer 'print' timed out after 5s");
        assert!(!Error::MissingSlot { marker: "<slot/>" }.is_render_failure());
    }
}
