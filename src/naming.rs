//! Centralized filename conventions.
//!
//! Section files follow the `NNN-key.toml` pattern: the numeric prefix fixes
//! the document order of the section, the key names it (and becomes its
//! anchor id). Files without a prefix are drafts and are not published.
//!
//! Processed images are written under a content fingerprint:
//! `op2.png` → `op2-1a2b3c4d.png`, so a changed image always gets a new URL.

/// Result of parsing a section file stem like `030-about`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Number prefix if present (e.g., `30` from `030-about`)
    pub number: Option<u32>,
    /// Key after `NNN-`. For unnumbered entries, this is the full input.
    pub key: String,
}

/// Parse a section file stem following the `NNN-key` convention.
///
/// - `"030-about"` → number=Some(30), key="about"
/// - `"010-site-header"` → number=Some(10), key="site-header"
/// - `"about"` → number=None, key="about"
/// - `"030"` → number=Some(30), key=""
pub fn parse_entry_name(name: &str) -> ParsedName {
    if let Some((prefix, rest)) = name.split_once('-')
        && let Ok(num) = prefix.parse::<u32>()
    {
        return ParsedName {
            number: Some(num),
            key: rest.to_string(),
        };
    }
    if let Ok(num) = name.parse::<u32>() {
        return ParsedName {
            number: Some(num),
            key: String::new(),
        };
    }
    ParsedName {
        number: None,
        key: name.to_string(),
    }
}

/// Keys double as HTML ids and fragment file names: lowercase ASCII letters,
/// digits and inner dashes only.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('-')
        && !key.ends_with('-')
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Insert a short content fingerprint before the extension.
///
/// Only the first 8 hex characters of `hash` are used.
pub fn fingerprinted_name(file_name: &str, hash: &str) -> String {
    let short = &hash[..hash.len().min(8)];
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{short}.{ext}"),
        _ => format!("{file_name}-{short}"),
    }
}
