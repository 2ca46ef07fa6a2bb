//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::{self, config_path};
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Fixture and scratch locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// External renderer invocation
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Vector diff settings
    #[serde(default)]
    pub diff: DiffConfig,

    /// Report and artifact settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Fixture discovery settings
#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    /// Root directory the glob pattern is resolved against
    #[serde(default = "default_tests_root")]
    pub tests_root: PathBuf,

    /// Scratch directory (default: `<tests_root>/tmp`)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Default fixture glob
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tests_root: default_tests_root(),
            scratch_dir: None,
            pattern: default_pattern(),
        }
    }
}

impl PathsConfig {
    /// Scratch directory, falling back to the one below the fixture root
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| paths::default_scratch_dir(&self.tests_root))
    }
}

fn default_tests_root() -> PathBuf {
    PathBuf::from(paths::DEFAULT_TESTS_ROOT)
}

fn default_pattern() -> String {
    "*/*.xhtml".to_string()
}

/// External renderer settings
#[derive(Debug, Deserialize, Clone)]
pub struct RendererConfig {
    /// Path to the renderer, or a name looked up on PATH
    #[serde(default = "default_program")]
    pub program: String,

    /// Flags passed between the mode keyword and the output path
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,

    /// Per-invocation timeout; no timeout when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            flags: default_flags(),
            timeout_secs: None,
        }
    }
}

fn default_program() -> String {
    "paper-muncher".to_string()
}

fn default_flags() -> Vec<String> {
    vec!["-sdlpo".to_string()]
}

/// Vector segment extraction settings
#[derive(Debug, Deserialize, Clone)]
pub struct DiffConfig {
    /// Separator between segments of the vector serialization
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Which segment to diff, counted from the end (1 = last)
    #[serde(default = "default_segment_from_end")]
    pub segment_from_end: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            segment_from_end: default_segment_from_end(),
        }
    }
}

fn default_delimiter() -> String {
    "---".to_string()
}

fn default_segment_from_end() -> usize {
    3
}

/// Output settings
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Colorize reports
    #[serde(default = "default_color")]
    pub color: bool,

    /// Keep failing artifacts after the run instead of sweeping them
    #[serde(default)]
    pub keep_artifacts: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
            keep_artifacts: false,
        }
    }
}

fn default_color() -> bool {
    true
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Resolve the renderer executable
    ///
    /// Paths containing a separator are taken as-is; bare names are searched on PATH
    pub fn resolve_renderer(&self) -> Result<PathBuf> {
        let program = Path::new(&self.renderer.program);
        if program.components().count() > 1 {
            if program.exists() {
                return Ok(program.to_path_buf());
            }
            return Err(Error::RendererNotFound {
                name: self.renderer.program.clone(),
            });
        }

        which::which(program).map_err(|_| Error::RendererNotFound {
            name: self.renderer.program.clone(),
        })
    }
}
