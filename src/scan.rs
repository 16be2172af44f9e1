//! Content discovery and manifest generation.
//!
//! Stage 1 of the build pipeline. Reads the content directory and produces a
//! [`Manifest`] holding everything the later stages need, so neither of them
//! touches the source tree except to read image bytes.
//!
//! ## Directory Structure
//!
//! ```text
//! content/                         # Content root
//! ├── config.toml                  # Site configuration (optional)
//! ├── site.toml                    # Page-wide UI strings, [en] and [fr]
//! ├── sections/
//! │   ├── 010-header.toml          # Numbered = published, in number order
//! │   ├── 020-hero.toml
//! │   ├── 030-about.toml
//! │   └── notes.toml               # Unnumbered = draft, skipped
//! └── assets/images/
//!     ├── hero.png
//!     └── minerals/gold.png        # Subdirectories are fine
//! ```
//!
//! ## Naming Conventions
//!
//! - **Section files** (`NNN-key.toml`): the number fixes the document order,
//!   the key becomes the section's anchor id and fragment file name
//! - **Images**: referenced from records by site-absolute path,
//!   `/assets/images/hero.png`
//!
//! ## Validation
//!
//! The scanner rejects:
//! - Two section files with the same number, or the same key
//! - Keys that are not usable as HTML ids (`[a-z0-9-]`)
//! - Unknown section kinds and malformed records
//! - Local images referenced by a record but missing from `assets/images/`
//!
//! A section without a record for one of the locales is only a warning: that
//! section fails on its own page while every other section still renders.

use crate::config::{self, SiteConfig};
use crate::content::{self, ContentError, Dictionary, SiteStrings};
use crate::imaging::supported_input_extensions;
use crate::naming::{is_valid_key, parse_entry_name};
use crate::types::{ImageAsset, Locale, SectionEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Missing site strings file: {0}")]
    MissingSiteStrings(PathBuf),
    #[error("Invalid site strings in {path}: {source}")]
    SiteStrings { path: PathBuf, source: ContentError },
    #[error("Invalid section file {path}: {source}")]
    Section { path: PathBuf, source: ContentError },
    #[error("Invalid section key '{key}' in {path} (use a-z, 0-9 and dashes)")]
    InvalidKey { key: String, path: PathBuf },
    #[error("Duplicate section number {0} in {1}")]
    DuplicateNumber(u32, PathBuf),
    #[error("Duplicate section key '{0}' in {1}")]
    DuplicateKey(String, PathBuf),
    #[error("Section '{section}' references missing image {src}")]
    MissingImage { section: String, src: String },
}

/// Manifest output from the scan stage.
#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    /// Published sections in document order.
    pub sections: Vec<SectionEntry>,
    pub dictionary: Dictionary,
    pub strings: SiteStrings,
    /// Every local image under `assets/images/`, sorted by `src`.
    pub images: Vec<ImageAsset>,
    pub config: SiteConfig,
}

const SECTIONS_DIR: &str = "sections";
/// Image directory, relative to both the content root and the output roots.
pub const IMAGES_DIR: &str = "assets/images";
const SITE_STRINGS_FILE: &str = "site.toml";

pub fn scan(root: &Path) -> Result<Manifest, ScanError> {
    let config = config::load_config(root)?;
    let strings = load_site_strings(root)?;
    let (sections, dictionary) = scan_sections(root)?;
    let images = scan_images(root)?;

    check_image_references(&sections, &dictionary, &images)?;
    warn_missing_locales(&sections, &dictionary);
    warn_dangling_anchors(&sections, &dictionary);

    tracing::debug!(
        sections = sections.len(),
        images = images.len(),
        "scanned content"
    );

    Ok(Manifest {
        sections,
        dictionary,
        strings,
        images,
        config,
    })
}

fn load_site_strings(root: &Path) -> Result<SiteStrings, ScanError> {
    let path = root.join(SITE_STRINGS_FILE);
    if !path.exists() {
        return Err(ScanError::MissingSiteStrings(path));
    }
    let text = fs::read_to_string(&path)?;
    SiteStrings::parse(&text).map_err(|source| ScanError::SiteStrings { path, source })
}

/// Read every numbered `sections/*.toml` file into entries and a dictionary.
fn scan_sections(root: &Path) -> Result<(Vec<SectionEntry>, Dictionary), ScanError> {
    let dir = root.join(SECTIONS_DIR);
    let mut sections = Vec::new();
    let mut dictionary = Dictionary::default();
    if !dir.is_dir() {
        return Ok((sections, dictionary));
    }

    let mut seen_numbers: BTreeMap<u32, PathBuf> = BTreeMap::new();
    let walker = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, &["toml"]) {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let parsed = parse_entry_name(&stem);
        let Some(order) = parsed.number else {
            tracing::debug!(file = %path.display(), "skipping unnumbered draft section");
            continue;
        };
        if !is_valid_key(&parsed.key) {
            return Err(ScanError::InvalidKey {
                key: parsed.key,
                path: path.to_path_buf(),
            });
        }
        if seen_numbers.insert(order, path.to_path_buf()).is_some() {
            return Err(ScanError::DuplicateNumber(order, path.to_path_buf()));
        }
        if dictionary.get(&parsed.key).is_some() {
            return Err(ScanError::DuplicateKey(parsed.key, path.to_path_buf()));
        }

        let text = fs::read_to_string(path)?;
        let section =
            content::parse_section_file(&text).map_err(|source| ScanError::Section {
                path: path.to_path_buf(),
                source,
            })?;

        sections.push(SectionEntry {
            key: parsed.key.clone(),
            order,
            kind: section.record.kind,
            priority: section.priority,
            source: relative(path, root),
        });
        dictionary.insert(parsed.key, section.record);
    }

    sections.sort_by_key(|s| s.order);
    Ok((sections, dictionary))
}

/// Walk `assets/images/` for files with a supported image extension.
fn scan_images(root: &Path) -> Result<Vec<ImageAsset>, ScanError> {
    let dir = root.join(IMAGES_DIR);
    let mut images = Vec::new();
    if !dir.is_dir() {
        return Ok(images);
    }

    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !entry.file_type().is_file() {
            continue;
        }
        if !has_extension(path, supported_input_extensions()) {
            continue;
        }
        let source_path = relative(path, root);
        images.push(ImageAsset {
            src: format!("/{source_path}"),
            source_path,
        });
    }

    images.sort_by(|a, b| a.src.cmp(&b.src));
    Ok(images)
}

fn check_image_references(
    sections: &[SectionEntry],
    dictionary: &Dictionary,
    images: &[ImageAsset],
) -> Result<(), ScanError> {
    let known: BTreeSet<&str> = images.iter().map(|i| i.src.as_str()).collect();
    for section in sections {
        let Some(record) = dictionary.get(&section.key) else {
            continue;
        };
        for content in record.by_locale.values() {
            for image in content.images() {
                if !image.is_external() && !known.contains(image.src.as_str()) {
                    return Err(ScanError::MissingImage {
                        section: section.key.clone(),
                        src: image.src.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn warn_missing_locales(sections: &[SectionEntry], dictionary: &Dictionary) {
    for section in sections {
        let Some(record) = dictionary.get(&section.key) else {
            continue;
        };
        for locale in Locale::ALL {
            if !record.by_locale.contains_key(&locale) {
                tracing::warn!(
                    section = %section.key,
                    %locale,
                    "section has no content for this locale and will render as unavailable"
                );
            }
        }
    }
}

/// Navigation links point at section keys; a typo only shows up as a dead link.
fn warn_dangling_anchors(sections: &[SectionEntry], dictionary: &Dictionary) {
    let keys: BTreeSet<&str> = sections.iter().map(|s| s.key.as_str()).collect();
    for section in sections {
        let Some(record) = dictionary.get(&section.key) else {
            continue;
        };
        for content in record.by_locale.values() {
            for anchor in content.anchors() {
                if !keys.contains(anchor) {
                    tracing::warn!(section = %section.key, anchor, "link to unknown section");
                }
            }
        }
    }
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| allowed.contains(&ext.as_str()))
}

/// Path relative to `root` with forward slashes.
fn relative(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
