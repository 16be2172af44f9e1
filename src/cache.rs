//! Image processing cache for incremental builds.
//!
//! Decoding an image to learn its intrinsic dimensions and hashing it for its
//! fingerprinted name are the only per-image costs of the process stage. This
//! module lets it skip both the probe and the copy when a source image has
//! not changed since the last build.
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: lookups go by the SHA-256 of the
//! source file, never by its name. Renaming `op2.png` to `operations.png`
//! does not invalidate anything; the previous output is copied to its new
//! name and the stored dimensions are reused.
//!
//! A cache hit requires:
//! 1. An entry with a matching `source_hash` exists
//! 2. The previously-written output file still exists on disk
//!
//! ## Storage
//!
//! The cache manifest is a JSON file at `<processed_dir>/.cache-manifest.json`,
//! next to the processed images so the two travel together.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to the `build` or `process` command to load an empty
//! manifest. Every image is probed and copied again.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the processed directory.
const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Bump to invalidate every existing cache when the format changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached output file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub width: u32,
    pub height: u32,
}

/// On-disk cache manifest mapping output paths to their cache entries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// Runtime reverse index: `source_hash` → output path. Built at load
    /// time, maintained on insert. Never serialized.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

/// A cache lookup that found usable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedOutput {
    /// Output path the content was stored under, relative to the processed
    /// directory. May differ from the caller's expected path after a rename.
    pub path: String,
    pub width: u32,
    pub height: u32,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the processed directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "discarding unreadable cache manifest");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.content_index = build_content_index(&manifest.entries);
        manifest
    }

    pub fn save(&self, dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(MANIFEST_FILENAME), json)
    }

    /// Look up previous output for a source hash whose file is still on disk.
    pub fn find_cached(&self, source_hash: &str, dir: &Path) -> Option<CachedOutput> {
        let stored_path = self.content_index.get(source_hash)?;
        let entry = self.entries.get(stored_path)?;
        if !dir.join(stored_path).exists() {
            return None;
        }
        Some(CachedOutput {
            path: stored_path.clone(),
            width: entry.width,
            height: entry.height,
        })
    }

    /// Record the output written for a source hash.
    ///
    /// An older entry for the same content under a different path is
    /// dropped so the manifest stays clean when images are renamed.
    pub fn insert(&mut self, output_path: String, source_hash: String, width: u32, height: u32) {
        if let Some(old_path) = self.content_index.get(&source_hash)
            && *old_path != output_path
        {
            self.entries.remove(old_path.as_str());
        }

        self.content_index
            .insert(source_hash.clone(), output_path.clone());
        self.entries.insert(
            output_path,
            CacheEntry {
                source_hash,
                width,
                height,
            },
        );
    }

    /// Keep only the entries whose output path passes `keep`.
    pub fn retain_outputs(&mut self, keep: impl Fn(&str) -> bool) {
        self.entries.retain(|path, _| keep(path));
        self.content_index.retain(|_, path| keep(path));
    }
}

fn build_content_index(entries: &HashMap<String, CacheEntry>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(output_path, entry)| (entry.source_hash.clone(), output_path.clone()))
        .collect()
}

/// SHA-256 of a file's contents as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.copies > 0 {
            if self.copies > 0 {
                write!(
                    f,
                    "{} cached, {} copied, {} processed ({} total)",
                    self.hits,
                    self.copies,
                    self.misses,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} processed ({} total)",
                    self.hits,
                    self.misses,
                    self.total()
                )
            }
        } else {
            write!(f, "{} processed", self.misses)
        }
    }
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILENAME)
}
