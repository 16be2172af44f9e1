//! Shared test utilities.
//!
//! Provides fixture setup and lookup helpers that work with scan-phase data
//! structures (`Manifest`, `SectionEntry`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let manifest = scan(tmp.path()).unwrap();
//!
//! let about = find_section(&manifest, "about");
//! assert!(!about.priority);
//! assert_eq!(section_keys(&manifest)[0], "header");
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::scan::Manifest;
use crate::types::SectionEntry;

// =========================================================================
// Fixture setup
// =========================================================================

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content")
}

/// Copy `fixtures/content/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    copy_dir_recursive(&fixtures_dir(), tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Manifest lookups (panic with a clear message on miss)
// =========================================================================

/// Find a section by key. Panics if not found.
pub fn find_section<'a>(manifest: &'a Manifest, key: &str) -> &'a SectionEntry {
    manifest
        .sections
        .iter()
        .find(|s| s.key == key)
        .unwrap_or_else(|| {
            let keys = section_keys(manifest);
            panic!("section '{key}' not found. Available: {keys:?}")
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// All section keys in document order.
pub fn section_keys(manifest: &Manifest) -> Vec<&str> {
    manifest.sections.iter().map(|s| s.key.as_str()).collect()
}

/// All image `src` values in manifest order.
pub fn image_srcs(manifest: &Manifest) -> Vec<&str> {
    manifest.images.iter().map(|i| i.src.as_str()).collect()
}
