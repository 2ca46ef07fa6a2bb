//! Raster comparison
//!
//! Comparison is exact: two rasters match only if their bytes are identical.
//! There is no perceptual tolerance and no normalization.

use super::parser::AssertionKind;

/// Exact byte equality of two rasters
pub fn equal(a: &[u8], b: &[u8]) -> bool {
    a == b
}

/// Whether a raster satisfies an assertion of `kind` against the baseline
pub fn satisfies(kind: AssertionKind, baseline: &[u8], actual: &[u8]) -> bool {
    let same = equal(baseline, actual);
    match kind {
        AssertionKind::Rendering => same,
        AssertionKind::Error => !same,
    }
}
