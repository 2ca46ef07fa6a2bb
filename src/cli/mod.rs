//! CLI command handling
//!
//! Resolves configuration and flags, then dispatches onto the harness.

use crate::commands::{Commands, LocationArgs, RunArgs};
use crate::common::config::Config;
use crate::common::Result;
use crate::harness::diff::SegmentSpec;
use crate::harness::runner::{discover, in_scratch_dir, read_fixture};
use crate::harness::store::FixtureStore;
use crate::harness::{self, ContainerTemplate, ExternalRenderer, RunOptions};

/// Dispatch a CLI command
///
/// Returns whether every assertion passed; commands that run no tests return `true`.
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run(args) => run_tests(args).await,
        Commands::List { glob, location } => {
            list(glob, &location)?;
            Ok(true)
        }
        Commands::Clean { location } => {
            clean(&location)?;
            Ok(true)
        }
    }
}

/// Load the config file and apply location overrides
fn load_config(location: &LocationArgs) -> Result<Config> {
    let mut config = match &location.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(root) = &location.tests_root {
        config.paths.tests_root = root.clone();
    }
    if let Some(dir) = &location.scratch_dir {
        config.paths.scratch_dir = Some(dir.clone());
    }
    Ok(config)
}

/// Merge run flags over the loaded configuration
pub fn run_options(args: &RunArgs, config: &Config) -> RunOptions {
    RunOptions {
        tests_root: config.paths.tests_root.clone(),
        pattern: args
            .glob
            .clone()
            .unwrap_or_else(|| config.paths.pattern.clone()),
        scratch_dir: config.paths.scratch_dir(),
        fast: args.fast,
        keep_artifacts: args.keep_artifacts || config.output.keep_artifacts,
        update_golden: args.update_golden,
        segment: SegmentSpec::from(&config.diff),
        color: config.output.color && !args.no_color,
    }
}

async fn run_tests(args: RunArgs) -> Result<bool> {
    let mut config = load_config(&args.location)?;
    if let Some(renderer) = &args.renderer {
        config.renderer.program = renderer.clone();
    }
    if !args.flags.is_empty() {
        config.renderer.flags = args.flags.clone();
    }
    if args.timeout.is_some() {
        config.renderer.timeout_secs = args.timeout;
    }

    let program = config.resolve_renderer()?;
    tracing::debug!(renderer = %program.display(), "resolved renderer");
    let renderer = ExternalRenderer::from_config(program, &config.renderer);

    let options = run_options(&args, &config);
    let summary = harness::run(&renderer, &options).await?;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json).map_err(|e| crate::Error::file_write(path, e))?;
        tracing::info!("Wrote report to {}", path.display());
    }

    Ok(summary.success())
}

fn list(glob: Option<String>, location: &LocationArgs) -> Result<()> {
    let config = load_config(location)?;
    let pattern = glob.unwrap_or_else(|| config.paths.pattern.clone());
    let scratch_dir = config.paths.scratch_dir();

    for file in discover(&config.paths.tests_root, &pattern)? {
        if in_scratch_dir(&file, &scratch_dir) {
            continue;
        }

        let fixture = match read_fixture(&file) {
            Ok(fixture) => fixture,
            Err(e) => {
                tracing::error!("{e}");
                continue;
            }
        };

        let container = match fixture.container {
            ContainerTemplate::Template(_) => "container",
            ContainerTemplate::Absent => "no container",
        };
        println!("{} ({container})", file.display());

        for (i, case) in fixture.cases.iter().enumerate() {
            let id = case
                .id
                .as_deref()
                .map(|id| format!(" [{id}]"))
                .unwrap_or_default();
            println!("  {:?}{id}", case.label(i + 1));

            for (n, assertion) in case.assertions.iter().enumerate() {
                let mut line = format!("    {}. {}", n + 1, assertion.kind.tag());
                if assertion.skip {
                    line.push_str(" (skip)");
                }
                if let Some(help) = &assertion.help {
                    line.push_str(&format!(": {help}"));
                }
                println!("{line}");
            }
        }
    }

    Ok(())
}

fn clean(location: &LocationArgs) -> Result<()> {
    let config = load_config(location)?;
    let scratch_dir = config.paths.scratch_dir();
    if !scratch_dir.exists() {
        println!("Nothing to clean in {}", scratch_dir.display());
        return Ok(());
    }

    let store = FixtureStore::open(&scratch_dir)?;
    let removed = store.clean_all()?;
    println!("Removed {removed} file(s) from {}", scratch_dir.display());
    Ok(())
}
