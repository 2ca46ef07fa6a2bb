//! External renderer invocation
//!
//! The renderer is an opaque subprocess called as
//! `<program> <mode> <flags...> <output> <document>`, where mode is `render`
//! (raster) or `print` (vector). A non-zero exit, a timeout, or a missing
//! output file is an error for the assertion being run.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::common::config::RendererConfig;
use crate::common::{Error, Result};

/// Renderer mode keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Raster output
    Render,
    /// Vector output
    Print,
}

impl RenderMode {
    pub fn keyword(&self) -> &'static str {
        match self {
            RenderMode::Render => "render",
            RenderMode::Print => "print",
        }
    }
}

/// Raster produced by `render`
#[derive(Debug, Clone)]
pub struct RasterArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Vector document produced by `print`
#[derive(Debug, Clone)]
pub struct VectorArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// What the renderer wrote to stdout while printing
    pub stdout: String,
}

impl VectorArtifact {
    /// Textual serialization used for diffing
    ///
    /// The renderer's stdout dump when it produced one, else the file itself.
    pub fn text(&self) -> Cow<'_, str> {
        if self.stdout.trim().is_empty() {
            String::from_utf8_lossy(&self.bytes)
        } else {
            Cow::Borrowed(&self.stdout)
        }
    }
}

/// Something that turns composed documents into artifacts
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Rasterize `document` into `output`
    async fn render(&self, document: &Path, output: &Path) -> Result<RasterArtifact>;

    /// Print `document` as a vector file into `output`
    async fn print(&self, document: &Path, output: &Path) -> Result<VectorArtifact>;
}

/// Structured result of one subprocess run
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "a signal".to_string(),
        }
    }
}

/// Run a program to completion, killing it if `limit` elapses first
pub async fn run_process(
    program: &Path,
    args: &[String],
    limit: Option<Duration>,
    mode: RenderMode,
) -> Result<ProcessOutput> {
    let started = Instant::now();

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::RendererSpawn {
            program: program.display().to_string(),
            source: e,
        })?;

    let output = match limit {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| Error::RenderTimeout {
                mode: mode.keyword().to_string(),
                limit,
            })??,
        None => child.wait_with_output().await?,
    };

    Ok(ProcessOutput {
        code: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed: started.elapsed(),
    })
}

/// Renderer backed by an external executable
#[derive(Debug, Clone)]
pub struct ExternalRenderer {
    program: PathBuf,
    flags: Vec<String>,
    timeout: Option<Duration>,
}

impl ExternalRenderer {
    pub fn new(program: impl Into<PathBuf>, flags: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            flags,
            timeout,
        }
    }

    /// Build from the `[renderer]` config section and a resolved program path
    pub fn from_config(program: PathBuf, config: &RendererConfig) -> Self {
        Self::new(
            program,
            config.flags.clone(),
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    /// Command-line arguments for one invocation
    pub fn args(&self, mode: RenderMode, output: &Path, document: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(self.flags.len() + 3);
        args.push(mode.keyword().to_string());
        args.extend(self.flags.iter().cloned());
        args.push(output.display().to_string());
        args.push(document.display().to_string());
        args
    }

    async fn invoke(
        &self,
        mode: RenderMode,
        document: &Path,
        output: &Path,
    ) -> Result<(ProcessOutput, Vec<u8>)> {
        // A stale file from an earlier run must not pass for fresh output
        let _ = tokio::fs::remove_file(output).await;

        let args = self.args(mode, output, document);
        tracing::debug!(program = %self.program.display(), ?args, "invoking renderer");

        let result = run_process(&self.program, &args, self.timeout, mode).await?;
        tracing::debug!(
            mode = mode.keyword(),
            code = ?result.code,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "renderer finished"
        );

        if !result.success {
            return Err(Error::render_failed(
                mode.keyword(),
                &result.status_text(),
                &result.stderr,
            ));
        }

        let bytes = tokio::fs::read(output)
            .await
            .map_err(|_| Error::RenderOutputMissing {
                mode: mode.keyword().to_string(),
                path: output.to_path_buf(),
            })?;

        Ok((result, bytes))
    }
}

#[async_trait]
impl Renderer for ExternalRenderer {
    async fn render(&self, document: &Path, output: &Path) -> Result<RasterArtifact> {
        let (_, bytes) = self.invoke(RenderMode::Render, document, output).await?;
        Ok(RasterArtifact {
            path: output.to_path_buf(),
            bytes,
        })
    }

    async fn print(&self, document: &Path, output: &Path) -> Result<VectorArtifact> {
        let (result, bytes) = self.invoke(RenderMode::Print, document, output).await?;
        Ok(VectorArtifact {
            path: output.to_path_buf(),
            bytes,
            stdout: result.stdout,
        })
    }
}
