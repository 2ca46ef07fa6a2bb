//! CLI command definitions
//!
//! Defines the clap commands for the reftest CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run reference tests
    Run(RunArgs),

    /// List test cases and assertions without rendering
    List {
        /// Fixture glob, relative to the tests root (default: */*.xhtml)
        #[arg(long, short = 'g')]
        glob: Option<String>,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Remove harness artifacts from the scratch directory
    Clean {
        #[command(flatten)]
        location: LocationArgs,
    },
}

/// Where fixtures and scratch files live
#[derive(Args, Clone, Default)]
pub struct LocationArgs {
    /// Configuration file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory the fixture glob is resolved against
    #[arg(long)]
    pub tests_root: Option<PathBuf>,

    /// Scratch directory for generated artifacts (default: <tests-root>/tmp)
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Args, Clone, Default)]
pub struct RunArgs {
    /// Fixture glob, relative to the tests root (default: */*.xhtml)
    #[arg(long, short = 'g')]
    pub glob: Option<String>,

    /// Proceed to the next test as soon as an assertion fails
    #[arg(long)]
    pub fast: bool,

    /// Renderer executable (path or name on PATH)
    #[arg(long)]
    pub renderer: Option<String>,

    /// Renderer flag placed after the mode keyword; repeat for several.
    /// Replaces the configured flags
    #[arg(long = "flag", allow_hyphen_values = true)]
    pub flags: Vec<String>,

    /// Kill the renderer after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Keep failing artifacts after the run
    #[arg(long)]
    pub keep_artifacts: bool,

    /// Save newly established baselines as golden images next to the fixture
    #[arg(long)]
    pub update_golden: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Write a JSON summary of every verdict to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub location: LocationArgs,
}
