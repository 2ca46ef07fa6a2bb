//! Configuration and scratch paths
//!
//! Platform config location comes from the directories crate:
//! - Linux: `~/.config/reftest/`
//! - macOS: `~/Library/Application Support/reftest/`
//! - Windows: `%APPDATA%\reftest\`

use std::path::{Path, PathBuf};

/// Name used for the platform config directory
const APP_NAME: &str = "reftest";

/// Default fixture root, relative to the working directory
pub const DEFAULT_TESTS_ROOT: &str = "tests";

/// Scratch directory name below the fixture root
pub const SCRATCH_DIR_NAME: &str = "tmp";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Default scratch directory for a fixture root
pub fn default_scratch_dir(tests_root: &Path) -> PathBuf {
    tests_root.join(SCRATCH_DIR_NAME)
}
