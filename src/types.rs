//! Shared types used across all pipeline stages.
//!
//! These types are serialized to JSON between stages (scan → process → generate)
//! and must be identical across all three modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A language the site is published in.
///
/// The active locale is never global state: the composition root
/// ([`generate`](crate::generate)) iterates [`Locale::ALL`] and passes the
/// current value down to every renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Fr,
}

impl Locale {
    /// Every published locale, in output order.
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Fr];

    /// ISO 639-1 code, used for `<html lang>` and output paths.
    pub fn code(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Fr => "fr",
        }
    }

    /// The locale offered by the header language toggle.
    pub fn other(self) -> Locale {
        match self {
            Locale::En => Locale::Fr,
            Locale::Fr => Locale::En,
        }
    }

    /// Directory prefix of this locale's page relative to the site root.
    ///
    /// The default locale lives at the root (`""`); every other locale gets
    /// its own directory (`"fr/"`).
    pub fn path_prefix(self, default: Locale) -> String {
        if self == default {
            String::new()
        } else {
            format!("{}/", self.code())
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "fr" => Ok(Locale::Fr),
            other => Err(format!("unsupported locale '{other}' (expected en or fr)")),
        }
    }
}

/// The kind of a page section, selecting its record type and renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Header,
    Hero,
    About,
    Services,
    Projects,
    Statistics,
    Gallery,
    Strategy,
    Governance,
    Contact,
    Footer,
}

impl SectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Header => "header",
            SectionKind::Hero => "hero",
            SectionKind::About => "about",
            SectionKind::Services => "services",
            SectionKind::Projects => "projects",
            SectionKind::Statistics => "statistics",
            SectionKind::Gallery => "gallery",
            SectionKind::Strategy => "strategy",
            SectionKind::Governance => "governance",
            SectionKind::Contact => "contact",
            SectionKind::Footer => "footer",
        }
    }
}

/// A section registered in the content tree (`sections/NNN-key.toml`).
///
/// Sections are rendered in `order`. Priority sections are part of the
/// initial page; all others are loaded on demand behind a placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionEntry {
    /// Unique key from the filename (`030-about.toml` → `about`), also the
    /// anchor id used by navigation links.
    pub key: String,
    /// Sort key from the number prefix.
    pub order: u32,
    pub kind: SectionKind,
    /// Above-the-fold: rendered inline instead of deferred.
    #[serde(default)]
    pub priority: bool,
    /// Source file relative to the content root.
    pub source: String,
}

/// A local image discovered under `assets/images/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Site-absolute URL used by content records (`/assets/images/op2.png`).
    pub src: String,
    /// Path relative to the content root.
    pub source_path: String,
}

/// A local image after the process stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedImage {
    /// Fingerprinted path relative to the output root.
    pub path: String,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_locale_lives_at_root() {
        assert_eq!(Locale::En.path_prefix(Locale::En), "");
        assert_eq!(Locale::Fr.path_prefix(Locale::En), "fr/");
        assert_eq!(Locale::En.path_prefix(Locale::Fr), "en/");
    }

    #[test]
    fn other_locale_toggles() {
        assert_eq!(Locale::En.other(), Locale::Fr);
        assert_eq!(Locale::Fr.other(), Locale::En);
    }

    #[test]
    fn locale_parses_case_insensitively() {
        assert_eq!("FR".parse::<Locale>(), Ok(Locale::Fr));
        assert!("de".parse::<Locale>().is_err());
    }

    #[test]
    fn locale_serializes_as_code() {
        assert_eq!(serde_json::to_string(&Locale::Fr).unwrap(), "\"fr\"");
    }
}
