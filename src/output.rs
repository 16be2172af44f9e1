//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every entity (section, image, page) is its identity and positional
//! index, with filesystem paths shown as secondary context via indented
//! `Source:` lines.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Sections
//! 001 header (header, priority)
//!     Source: sections/010-header.toml
//! 002 about (about)
//!     Source: sections/030-about.toml
//!     Missing: fr
//!
//! Images
//! 001 hero.png
//!     Source: assets/images/hero.png
//!
//! Config
//!     config.toml
//!     site.toml
//! ```
//!
//! ## Process
//!
//! ```text
//! Images (3)
//!     001 hero.png
//!         Source: assets/images/hero.png
//!         Output: assets/images/hero-1a2b3c4d.png (1600x900): cached
//! ```
//!
//! ## Generate
//!
//! ```text
//! en → index.html
//!     Inline: header, hero
//!     Deferred: about, services → sections/en/
//! fr → fr/index.html
//!     Inline: header, hero
//!     Deferred: about → sections/fr/
//!     Failed: services
//!
//! Generated 2 pages, 3 section fragments
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::generate::{GenerateReport, fragment_dir};
use crate::process::{ImageStatus, ProcessEvent};
use crate::scan::Manifest;
use crate::types::Locale;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

// ============================================================================
// Stage 1: Scan output
// ============================================================================

/// Format scan stage output showing the discovered sections and images.
pub fn format_scan_output(manifest: &Manifest, source_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Sections".to_string());
    for (i, section) in manifest.sections.iter().enumerate() {
        let flags = if section.priority {
            format!("{}, priority", section.kind.as_str())
        } else {
            section.kind.as_str().to_string()
        };
        lines.push(format!("{} {} ({})", format_index(i + 1), section.key, flags));
        lines.push(format!("{}Source: {}", indent(1), section.source));

        let missing: Vec<&str> = Locale::ALL
            .iter()
            .filter(|&&locale| manifest.dictionary.lookup(locale, &section.key).is_err())
            .map(|locale| locale.code())
            .collect();
        if !missing.is_empty() {
            lines.push(format!("{}Missing: {}", indent(1), missing.join(", ")));
        }
    }

    if !manifest.images.is_empty() {
        lines.push(String::new());
        lines.push("Images".to_string());
        for (i, image) in manifest.images.iter().enumerate() {
            lines.push(format!(
                "{} {}",
                format_index(i + 1),
                file_name(&image.source_path)
            ));
            lines.push(format!("{}Source: {}", indent(1), image.source_path));
        }
    }

    lines.push(String::new());
    lines.push("Config".to_string());
    if source_root.join("config.toml").exists() {
        lines.push(format!("{}config.toml", indent(1)));
    }
    lines.push(format!("{}site.toml", indent(1)));

    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(manifest: &Manifest, source_root: &Path) {
    for line in format_scan_output(manifest, source_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 2: Process output
// ============================================================================

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { image_count } => {
            vec![format!("Images ({})", image_count)]
        }
        ProcessEvent::ImageProcessed {
            index,
            source_path,
            output_path,
            width,
            height,
            status,
        } => {
            let status_str = match status {
                ImageStatus::Cached => "cached",
                ImageStatus::Copied => "copied",
                ImageStatus::Processed => "processed",
            };
            vec![
                format!("{}{} {}", indent(1), format_index(*index), file_name(source_path)),
                format!("{}Source: {}", indent(2), source_path),
                format!(
                    "{}Output: {} ({}x{}): {}",
                    indent(2),
                    output_path,
                    width,
                    height,
                    status_str
                ),
            ]
        }
    }
}

// ============================================================================
// Stage 3: Generate output
// ============================================================================

/// Format generate stage output: one block per locale page.
pub fn format_generate_output(report: &GenerateReport) -> Vec<String> {
    let mut lines = Vec::new();

    for page in &report.pages {
        lines.push(format!("{} \u{2192} {}", page.locale, page.path));
        if !page.inline.is_empty() {
            lines.push(format!("{}Inline: {}", indent(1), page.inline.join(", ")));
        }
        if !page.deferred.is_empty() {
            lines.push(format!(
                "{}Deferred: {} \u{2192} {}/",
                indent(1),
                page.deferred.join(", "),
                fragment_dir(page.locale)
            ));
        }
        if !page.failed.is_empty() {
            lines.push(format!("{}Failed: {}", indent(1), page.failed.join(", ")));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Generated {} pages, {} section fragments",
        report.pages.len(),
        report.fragment_count()
    ));

    lines
}

/// Print generate output to stdout.
pub fn print_generate_output(report: &GenerateReport) {
    for line in format_generate_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the problems found by `check`. Empty input means a clean site.
pub fn format_check_output(report: &GenerateReport, broken_images: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    let failures = report.failures();

    if !failures.is_empty() {
        lines.push("Unavailable sections".to_string());
        for (locale, section) in failures {
            lines.push(format!("{}{} ({})", indent(1), section, locale));
        }
    }
    if !broken_images.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Broken images".to_string());
        for src in broken_images {
            lines.push(format!("{}{}", indent(1), src));
        }
    }
    lines
}

/// Print check output to stdout.
pub fn print_check_output(report: &GenerateReport, broken_images: &[String]) {
    for line in format_check_output(report, broken_images) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
