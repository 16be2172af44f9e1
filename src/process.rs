//! Image identification and fingerprinting.
//!
//! Stage 2 of the build pipeline. Takes the manifest from the scan stage,
//! reads the intrinsic dimensions of every local image and copies it under a
//! content fingerprint so the published URL changes whenever the bytes do.
//!
//! ## Output Structure
//!
//! ```text
//! processed/
//! ├── manifest.json              # Scan manifest + processed image table
//! ├── .cache-manifest.json       # See the cache module
//! └── assets/images/
//!     ├── hero-1a2b3c4d.png
//!     └── minerals/gold-9f8e7d6c.png
//! ```
//!
//! Dimensions end up on every lazy image container, which reserves the
//! image's aspect ratio before anything has loaded.
//!
//! Outputs that no current image points at (a previous fingerprint, a
//! renamed or deleted source) are removed at the end of each run.
//!
//! ## Parallel Processing
//!
//! Images are processed in parallel using [rayon](https://docs.rs/rayon). The
//! global pool is sized by `[processing] max_processes`. Progress is reported
//! through an optional channel so the CLI can print while work continues.

use crate::cache::{self, CacheManifest, CacheStats};
use crate::config::SiteConfig;
use crate::content::{Dictionary, SiteStrings};
use crate::imaging::{ImageCrateProbe, ImageProbe, ProbeError};
use crate::naming::fingerprinted_name;
use crate::scan::{IMAGES_DIR, Manifest};
use crate::types::{ImageAsset, ProcessedImage, SectionEntry};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image identification failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("Source image not found: {0}")]
    SourceNotFound(PathBuf),
}

/// Manifest after processing: the scan manifest plus the image table.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessedManifest {
    pub sections: Vec<SectionEntry>,
    pub dictionary: Dictionary,
    pub strings: SiteStrings,
    /// Processed images keyed by their original `src`.
    pub images: BTreeMap<String, ProcessedImage>,
    pub config: SiteConfig,
}

/// How an image's output was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// Output already in place from a previous build.
    Cached,
    /// Same content under a different name; previous output copied.
    Copied,
    /// Identified and copied from source.
    Processed,
}

/// Progress events emitted while processing.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        image_count: usize,
    },
    ImageProcessed {
        /// 1-based position in the scan manifest.
        index: usize,
        source_path: String,
        output_path: String,
        width: u32,
        height: u32,
        status: ImageStatus,
    },
}

pub struct ProcessResult {
    pub manifest: ProcessedManifest,
    pub cache_stats: CacheStats,
}

pub fn process(
    manifest_path: &Path,
    source_root: &Path,
    output_dir: &Path,
    use_cache: bool,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let probe = ImageCrateProbe::new();
    process_with_probe(
        &probe,
        manifest_path,
        source_root,
        output_dir,
        use_cache,
        progress,
    )
}

/// Process images using a specific probe (allows testing with mock).
pub fn process_with_probe(
    probe: &impl ImageProbe,
    manifest_path: &Path,
    source_root: &Path,
    output_dir: &Path,
    use_cache: bool,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let manifest_content = std::fs::read_to_string(manifest_path)?;
    let input: Manifest = serde_json::from_str(&manifest_content)?;

    std::fs::create_dir_all(output_dir)?;

    let mut cache = if use_cache {
        CacheManifest::load(output_dir)
    } else {
        CacheManifest::empty()
    };

    if let Some(tx) = &progress {
        tx.send(ProcessEvent::Started {
            image_count: input.images.len(),
        })
        .ok();
    }

    let outcomes: Vec<ImageOutcome> = input
        .images
        .par_iter()
        .enumerate()
        .map(|(idx, asset)| {
            let outcome = process_image(probe, asset, source_root, output_dir, &cache)?;
            if let Some(tx) = &progress {
                tx.send(ProcessEvent::ImageProcessed {
                    index: idx + 1,
                    source_path: asset.source_path.clone(),
                    output_path: outcome.image.path.clone(),
                    width: outcome.image.width,
                    height: outcome.image.height,
                    status: outcome.status,
                })
                .ok();
            }
            Ok(outcome)
        })
        .collect::<Result<_, ProcessError>>()?;

    let mut stats = CacheStats::default();
    let mut images = BTreeMap::new();
    for outcome in outcomes {
        match outcome.status {
            ImageStatus::Cached => stats.hit(),
            ImageStatus::Copied => stats.copy(),
            ImageStatus::Processed => stats.miss(),
        }
        cache.insert(
            outcome.image.path.clone(),
            outcome.source_hash,
            outcome.image.width,
            outcome.image.height,
        );
        images.insert(outcome.src, outcome.image);
    }

    let live: HashSet<&str> = images.values().map(|i| i.path.as_str()).collect();
    let removed = prune_stale_outputs(output_dir, &live)?;
    cache.retain_outputs(|path| live.contains(path));

    cache.save(output_dir)?;
    if removed > 0 {
        tracing::debug!(removed, "removed stale image outputs");
    }
    tracing::debug!(%stats, "processed images");

    Ok(ProcessResult {
        manifest: ProcessedManifest {
            sections: input.sections,
            dictionary: input.dictionary,
            strings: input.strings,
            images,
            config: input.config,
        },
        cache_stats: stats,
    })
}

struct ImageOutcome {
    src: String,
    source_hash: String,
    image: ProcessedImage,
    status: ImageStatus,
}

fn process_image(
    probe: &impl ImageProbe,
    asset: &ImageAsset,
    source_root: &Path,
    output_dir: &Path,
    cache: &CacheManifest,
) -> Result<ImageOutcome, ProcessError> {
    let source = source_root.join(&asset.source_path);
    if !source.exists() {
        return Err(ProcessError::SourceNotFound(source));
    }

    let source_hash = cache::hash_file(&source)?;
    let output_path = fingerprinted_path(&asset.source_path, &source_hash);
    let dest = output_dir.join(&output_path);

    let (width, height, status) = match cache.find_cached(&source_hash, output_dir) {
        Some(cached) if cached.path == output_path => {
            (cached.width, cached.height, ImageStatus::Cached)
        }
        Some(cached) => {
            ensure_parent(&dest)?;
            std::fs::copy(output_dir.join(&cached.path), &dest)?;
            (cached.width, cached.height, ImageStatus::Copied)
        }
        None => {
            let dims = probe.identify(&source)?;
            ensure_parent(&dest)?;
            std::fs::copy(&source, &dest)?;
            (dims.width, dims.height, ImageStatus::Processed)
        }
    };

    Ok(ImageOutcome {
        src: asset.src.clone(),
        source_hash,
        image: ProcessedImage {
            path: output_path,
            width,
            height,
        },
        status,
    })
}

/// Delete every file under the output image directory that no processed
/// image points at. Returns how many were removed.
fn prune_stale_outputs(output_dir: &Path, live: &HashSet<&str>) -> std::io::Result<usize> {
    let images_dir = output_dir.join(IMAGES_DIR);
    if !images_dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(&images_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(output_dir) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        if !live.contains(rel.as_str()) {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// `assets/images/op2.png` + hash → `assets/images/op2-<hash8>.png`.
fn fingerprinted_path(source_path: &str, hash: &str) -> String {
    match source_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/{}", fingerprinted_name(file, hash)),
        None => fingerprinted_name(source_path, hash),
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockProbe;
    use crate::scan;
    use crate::test_helpers::setup_fixtures;
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn fixture_probe() -> MockProbe {
        MockProbe::new()
            .with_size("hero.png", 48, 27)
            .with_size("op1.png", 40, 26)
            .with_size("gold.png", 16, 16)
    }

    /// Scan `content` and write the manifest into `work`.
    fn write_scan_manifest(content: &Path, work: &Path) -> PathBuf {
        let manifest = scan::scan(content).unwrap();
        let path = work.join("manifest.json");
        fs::write(&path, serde_json::to_string(&manifest).unwrap()).unwrap();
        path
    }

    fn run(
        probe: &MockProbe,
        content: &Path,
        work: &Path,
        use_cache: bool,
    ) -> ProcessResult {
        let manifest_path = write_scan_manifest(content, work);
        process_with_probe(
            probe,
            &manifest_path,
            content,
            &work.join("processed"),
            use_cache,
            None,
        )
        .unwrap()
    }

    #[test]
    fn fingerprinted_path_keeps_directory() {
        assert_eq!(
            fingerprinted_path("assets/images/op2.png", "deadbeefcafe"),
            "assets/images/op2-deadbeef.png"
        );
        assert_eq!(
            fingerprinted_path("assets/images/minerals/gold.jpg", "0123456789"),
            "assets/images/minerals/gold-01234567.jpg"
        );
    }

    #[test]
    fn every_image_is_fingerprinted_and_copied() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        let result = run(&fixture_probe(), content.path(), work.path(), true);

        assert_eq!(result.manifest.images.len(), 3);
        for (src, image) in &result.manifest.images {
            let stem = Path::new(src).file_stem().unwrap().to_string_lossy();
            assert!(image.path.starts_with(&format!("assets/images/{stem}-")));
            assert!(work.path().join("processed").join(&image.path).exists());
        }
    }

    #[test]
    fn dimensions_come_from_the_probe() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        let result = run(&fixture_probe(), content.path(), work.path(), true);

        let hero = &result.manifest.images["/assets/images/hero.png"];
        assert_eq!((hero.width, hero.height), (48, 27));
    }

    #[test]
    fn unchanged_images_are_cached_on_second_run() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        run(&fixture_probe(), content.path(), work.path(), true);

        let probe = fixture_probe();
        let second = run(&probe, content.path(), work.path(), true);

        assert_eq!(second.cache_stats.hits, 3);
        assert_eq!(second.cache_stats.misses, 0);
        assert!(probe.calls().is_empty());
        let gold = &second.manifest.images["/assets/images/gold.png"];
        assert_eq!((gold.width, gold.height), (16, 16));
    }

    #[test]
    fn renamed_image_is_copied_from_cache() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        run(&fixture_probe(), content.path(), work.path(), true);

        let images = content.path().join("assets/images");
        fs::rename(images.join("op1.png"), images.join("site.png")).unwrap();
        // Keep the reference valid so scan still passes.
        for file in ["sections/030-about.toml", "sections/050-gallery.toml"] {
            let path = content.path().join(file);
            let text = fs::read_to_string(&path).unwrap();
            fs::write(&path, text.replace("op1.png", "site.png")).unwrap();
        }

        let probe = fixture_probe();
        let result = run(&probe, content.path(), work.path(), true);

        assert_eq!(result.cache_stats.copies, 1);
        assert!(probe.calls().is_empty());
        let site = &result.manifest.images["/assets/images/site.png"];
        assert!(site.path.starts_with("assets/images/site-"));
        assert!(work.path().join("processed").join(&site.path).exists());
    }

    #[test]
    fn changed_content_gets_a_new_fingerprint() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        let first = run(&fixture_probe(), content.path(), work.path(), true);
        let before = first.manifest.images["/assets/images/gold.png"].path.clone();

        let gold = content.path().join("assets/images/gold.png");
        let mut bytes = fs::read(&gold).unwrap();
        bytes.extend_from_slice(b"trailing");
        fs::write(&gold, bytes).unwrap();

        let second = run(&fixture_probe(), content.path(), work.path(), true);
        let after = &second.manifest.images["/assets/images/gold.png"].path;
        assert_ne!(&before, after);
        assert_eq!(second.cache_stats.misses, 1);
    }

    #[test]
    fn superseded_outputs_are_removed() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        let processed = work.path().join("processed");
        let first = run(&fixture_probe(), content.path(), work.path(), true);
        let before = first.manifest.images["/assets/images/hero.png"].path.clone();

        let hero = content.path().join("assets/images/hero.png");
        let mut bytes = fs::read(&hero).unwrap();
        bytes.extend_from_slice(b"trailing");
        fs::write(&hero, bytes).unwrap();

        let second = run(&fixture_probe(), content.path(), work.path(), true);
        let after = &second.manifest.images["/assets/images/hero.png"].path;

        assert!(!processed.join(&before).exists());
        assert!(processed.join(after).exists());
        let heroes: Vec<_> = fs::read_dir(processed.join(IMAGES_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("hero-"))
            .collect();
        assert_eq!(heroes.len(), 1);

        let cache = CacheManifest::load(&processed);
        assert!(!cache.entries.contains_key(&before));
    }

    #[test]
    fn no_cache_reprocesses_everything() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        run(&fixture_probe(), content.path(), work.path(), true);

        let probe = fixture_probe();
        let result = run(&probe, content.path(), work.path(), false);
        assert_eq!(result.cache_stats.misses, 3);
        assert_eq!(probe.calls().len(), 3);
    }

    #[test]
    fn progress_events_cover_every_image() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        let manifest_path = write_scan_manifest(content.path(), work.path());
        let (tx, rx) = mpsc::channel();

        process_with_probe(
            &fixture_probe(),
            &manifest_path,
            content.path(),
            &work.path().join("processed"),
            true,
            Some(tx),
        )
        .unwrap();

        let events: Vec<ProcessEvent> = rx.iter().collect();
        assert!(matches!(
            events[0],
            ProcessEvent::Started { image_count: 3 }
        ));
        let processed = events
            .iter()
            .filter(|e| matches!(e, ProcessEvent::ImageProcessed { .. }))
            .count();
        assert_eq!(processed, 3);
    }

    #[test]
    fn sections_and_dictionary_pass_through() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        let result = run(&fixture_probe(), content.path(), work.path(), true);

        assert_eq!(result.manifest.sections.len(), 6);
        assert!(result.manifest.dictionary.get("gallery").is_some());
    }

    #[test]
    fn missing_source_is_an_error() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        let manifest_path = write_scan_manifest(content.path(), work.path());
        fs::remove_file(content.path().join("assets/images/hero.png")).unwrap();

        let result = process_with_probe(
            &fixture_probe(),
            &manifest_path,
            content.path(),
            &work.path().join("processed"),
            true,
            None,
        );
        assert!(matches!(result, Err(ProcessError::SourceNotFound(_))));
    }

    #[test]
    fn unreadable_image_is_an_error() {
        let content = setup_fixtures();
        let work = TempDir::new().unwrap();
        let manifest_path = write_scan_manifest(content.path(), work.path());
        let probe = MockProbe::new().with_size("hero.png", 1, 1);

        let result = process_with_probe(
            &probe,
            &manifest_path,
            content.path(),
            &work.path().join("processed"),
            false,
            None,
        );
        assert!(matches!(result, Err(ProcessError::Probe(_))));
    }
}
