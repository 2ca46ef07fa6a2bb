//! Scratch directory and golden image management
//!
//! Every artifact of a run lives in one scratch directory under a name derived
//! from (fixture path, test key, assertion number). Names are escaped so the
//! mapping stays injective: components keep `[A-Za-z0-9.]`, `_` becomes `__`,
//! every other byte becomes `_XX` (hex), and components are joined with `-`.
//! Tests without an id use an empty id component (`<fixture>--<n>`), so an id
//! of `3` and the third anonymous test never share a name.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use super::composer::Document;
use super::parser::TestCase;
use crate::common::{Error, Result};

/// Shared composed-document file, rewritten for every assertion
pub const DOCUMENT_NAME: &str = "reftest.xhtml";

/// Raster artifact extension
pub const RASTER_EXT: &str = "bmp";

/// Vector artifact extension
pub const VECTOR_EXT: &str = "pdf";

/// Identity of a test case within its fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKey<'a> {
    /// Explicit `id` attribute
    Id(&'a str),
    /// 1-based position in the fixture
    Index(usize),
}

impl<'a> CaseKey<'a> {
    pub fn for_case(case: &'a TestCase, index: usize) -> Self {
        match case.id.as_deref() {
            Some(id) => CaseKey::Id(id),
            None => CaseKey::Index(index),
        }
    }
}

/// Artifact paths of one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    dir: PathBuf,
    stem: String,
}

impl ArtifactNames {
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Baseline raster: `<stem>.expected.bmp`
    pub fn expected_raster(&self) -> PathBuf {
        self.dir.join(format!("{}.expected.{RASTER_EXT}", self.stem))
    }

    /// Baseline vector: `<stem>.expected.pdf`
    pub fn expected_vector(&self) -> PathBuf {
        self.dir.join(format!("{}.expected.{VECTOR_EXT}", self.stem))
    }

    /// Raster of assertion `n` (1-based): `<stem>-<n>.bmp`
    pub fn raster(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}-{n}.{RASTER_EXT}", self.stem))
    }

    /// Vector of assertion `n` (1-based): `<stem>-<n>.pdf`
    pub fn vector(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}-{n}.{VECTOR_EXT}", self.stem))
    }
}

/// Owner of the scratch directory for one run
#[derive(Debug)]
pub struct FixtureStore {
    scratch_dir: PathBuf,
    document: PathBuf,
    stems: BTreeSet<String>,
}

impl FixtureStore {
    /// Open (creating if needed) a scratch directory
    pub fn open(scratch_dir: impl Into<PathBuf>) -> Result<Self> {
        let scratch_dir = scratch_dir.into();
        std::fs::create_dir_all(&scratch_dir).map_err(|e| Error::file_write(&scratch_dir, e))?;
        let document = scratch_dir.join(DOCUMENT_NAME);

        Ok(Self {
            scratch_dir,
            document,
            stems: BTreeSet::new(),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Path of the shared composed document
    pub fn document_path(&self) -> &Path {
        &self.document
    }

    /// Overwrite the shared composed document
    pub fn write_document(&self, document: &Document) -> Result<()> {
        std::fs::write(&self.document, document.as_str())
            .map_err(|e| Error::file_write(&self.document, e))
    }

    /// Artifact names for a test case, remembered for the final sweep
    pub fn artifacts(&mut self, fixture: &Path, key: CaseKey<'_>) -> ArtifactNames {
        let stem = artifact_stem(fixture, key);
        self.stems.insert(stem.clone());
        ArtifactNames {
            dir: self.scratch_dir.clone(),
            stem,
        }
    }

    /// Golden image location: `<id>.bmp` next to the fixture
    pub fn golden_path(fixture: &Path, id: &str) -> PathBuf {
        fixture
            .parent()
            .unwrap_or(Path::new("."))
            .join(format!("{id}.{RASTER_EXT}"))
    }

    /// Read the golden image of a test, if one exists
    pub fn load_golden(&self, fixture: &Path, id: &str) -> Result<Option<Vec<u8>>> {
        let path = Self::golden_path(fixture, id);
        match std::fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), "using golden image");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::file_read(&path, e)),
        }
    }

    /// Store the baseline raster in the scratch directory
    pub fn persist_baseline(&self, names: &ArtifactNames, raster: &[u8]) -> Result<PathBuf> {
        let path = names.expected_raster();
        std::fs::write(&path, raster).map_err(|e| Error::file_write(&path, e))?;
        Ok(path)
    }

    /// Store a raster as the golden image of a test
    pub fn persist_golden(&self, fixture: &Path, id: &str, raster: &[u8]) -> Result<PathBuf> {
        let path = Self::golden_path(fixture, id);
        std::fs::write(&path, raster).map_err(|e| Error::file_write(&path, e))?;
        Ok(path)
    }

    /// Delete an artifact; missing files are not an error
    pub fn discard(&self, path: &Path) {
        remove_quietly(path);
    }

    /// End-of-run cleanup
    ///
    /// Removes the composed document and, unless `keep_artifacts` is set, the
    /// per-assertion rasters of every test case seen this run.
    pub fn cleanup(&self, keep_artifacts: bool) {
        remove_quietly(&self.document);

        if keep_artifacts {
            return;
        }

        let dir = glob::Pattern::escape(&self.scratch_dir.to_string_lossy());
        for stem in &self.stems {
            let pattern = format!(
                "{dir}/{}-*.{RASTER_EXT}",
                glob::Pattern::escape(stem)
            );
            sweep(&pattern);
        }
    }

    /// Remove every harness artifact from the scratch directory
    ///
    /// Returns the number of files removed.
    pub fn clean_all(&self) -> Result<usize> {
        let dir = glob::Pattern::escape(&self.scratch_dir.to_string_lossy());
        let mut removed = usize::from(remove_quietly(&self.document));

        for ext in [RASTER_EXT, VECTOR_EXT] {
            for entry in glob::glob(&format!("{dir}/*.{ext}"))? {
                if remove_quietly(&entry?) {
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

/// Build the escaped artifact stem of a test case
pub fn artifact_stem(fixture: &Path, key: CaseKey<'_>) -> String {
    let mut stem = escape(&fixture.to_string_lossy());
    stem.push('-');
    match key {
        CaseKey::Id(id) => stem.push_str(&escape(id)),
        CaseKey::Index(n) => {
            let _ = write!(stem, "-{n}");
        }
    }
    stem
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for byte in component.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' => out.push(byte as char),
            b'_' => out.push_str("__"),
            _ => {
                let _ = write!(out, "_{byte:02X}");
            }
        }
    }
    out
}

fn sweep(pattern: &str) {
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Error sweeping '{pattern}': {e}");
            return;
        }
    };

    for entry in entries {
        match entry {
            Ok(path) => {
                remove_quietly(&path);
            }
            Err(e) => tracing::warn!("Error sweeping '{pattern}': {e}"),
        }
    }
}

/// Best-effort delete; returns whether a file was removed
fn remove_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Error deleting '{}': {e}", path.display());
            false
        }
    }
}
