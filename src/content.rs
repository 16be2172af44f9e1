//! Bilingual content dictionaries.
//!
//! Every section of the page is described by one TOML file holding a record
//! per locale:
//!
//! ```toml
//! kind = "about"
//! priority = false
//!
//! [en]
//! title = "About Bridgelink"
//! ...
//!
//! [fr]
//! title = "À Propos de Bridgelink"
//! ...
//! ```
//!
//! The record shape is selected by `kind`. Dictionaries are loaded once by the
//! scan stage and travel to generate inside the manifest; lookup is a plain
//! key lookup for the active locale. A section without a record for some
//! locale is not a scan error: it fails on its own when that locale's page is
//! composed and every sibling section still renders.
//!
//! UI strings that do not belong to any section (document title, loading and
//! error notices) live in `site.toml` and are held by [`SiteStrings`].

use crate::types::{Locale, SectionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("section '{key}' has no {locale} content")]
    MissingLocale { key: String, locale: Locale },
    #[error("unknown section '{0}'")]
    UnknownSection(String),
    #[error("site.toml has no [{0}] strings")]
    MissingStrings(Locale),
}

// ============================================================================
// Dictionaries
// ============================================================================

/// All section records, keyed by section key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    sections: BTreeMap<String, SectionRecord>,
}

/// The localized records of one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRecord {
    pub kind: SectionKind,
    pub by_locale: BTreeMap<Locale, SectionContent>,
}

impl Dictionary {
    pub fn insert(&mut self, key: impl Into<String>, record: SectionRecord) {
        self.sections.insert(key.into(), record);
    }

    pub fn lookup(&self, locale: Locale, key: &str) -> Result<&SectionContent, ContentError> {
        let record = self
            .sections
            .get(key)
            .ok_or_else(|| ContentError::UnknownSection(key.to_string()))?;
        record
            .by_locale
            .get(&locale)
            .ok_or_else(|| ContentError::MissingLocale {
                key: key.to_string(),
                locale,
            })
    }

    pub fn get(&self, key: &str) -> Option<&SectionRecord> {
        self.sections.get(key)
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut SectionRecord> {
        self.sections.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Raw shape of a `sections/NNN-key.toml` file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SectionFile {
    kind: SectionKind,
    #[serde(default)]
    priority: bool,
    en: Option<toml::Value>,
    fr: Option<toml::Value>,
}

/// A parsed section file.
#[derive(Debug)]
pub struct ParsedSection {
    pub priority: bool,
    pub record: SectionRecord,
}

/// Parse the text of a section file into its per-locale records.
pub fn parse_section_file(text: &str) -> Result<ParsedSection, ContentError> {
    let file: SectionFile = toml::from_str(text)?;
    let mut by_locale = BTreeMap::new();
    for (locale, value) in [(Locale::En, file.en), (Locale::Fr, file.fr)] {
        if let Some(value) = value {
            by_locale.insert(locale, SectionContent::from_value(file.kind, value)?);
        }
    }
    Ok(ParsedSection {
        priority: file.priority,
        record: SectionRecord {
            kind: file.kind,
            by_locale,
        },
    })
}

// ============================================================================
// Site-wide UI strings
// ============================================================================

/// Strings shared by the whole page for one locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UiStrings {
    /// `<title>` of the page.
    pub document_title: String,
    /// `<meta name="description">`.
    pub description: String,
    /// Accessible label of the toggle that switches to the other locale.
    pub language_toggle: String,
    /// Text of a pending section placeholder (screen readers only).
    pub loading: String,
    /// Fallback text prefix of an image that failed to load.
    pub image_unavailable: String,
    /// Notice rendered in place of a section that failed to load.
    pub section_unavailable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStrings {
    by_locale: BTreeMap<Locale, UiStrings>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteFile {
    en: Option<UiStrings>,
    fr: Option<UiStrings>,
}

impl SiteStrings {
    /// Parse `site.toml`. Unlike section records, every locale must be present.
    pub fn parse(text: &str) -> Result<Self, ContentError> {
        let file: SiteFile = toml::from_str(text)?;
        let mut by_locale = BTreeMap::new();
        for (locale, strings) in [(Locale::En, file.en), (Locale::Fr, file.fr)] {
            let strings = strings.ok_or(ContentError::MissingStrings(locale))?;
            by_locale.insert(locale, strings);
        }
        Ok(Self { by_locale })
    }

    pub fn get(&self, locale: Locale) -> Result<&UiStrings, ContentError> {
        self.by_locale
            .get(&locale)
            .ok_or(ContentError::MissingStrings(locale))
    }
}

// ============================================================================
// Section records
// ============================================================================

/// The content of one section in one locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionContent {
    Header(HeaderContent),
    Hero(HeroContent),
    About(AboutContent),
    Services(ServicesContent),
    Projects(ProjectsContent),
    Statistics(StatisticsContent),
    Gallery(GalleryContent),
    Strategy(StrategyContent),
    Governance(GovernanceContent),
    Contact(ContactContent),
    Footer(FooterContent),
}

impl SectionContent {
    /// Deserialize a locale table as the record type of `kind`.
    pub fn from_value(kind: SectionKind, value: toml::Value) -> Result<Self, ContentError> {
        Ok(match kind {
            SectionKind::Header => SectionContent::Header(value.try_into()?),
            SectionKind::Hero => SectionContent::Hero(value.try_into()?),
            SectionKind::About => SectionContent::About(value.try_into()?),
            SectionKind::Services => SectionContent::Services(value.try_into()?),
            SectionKind::Projects => SectionContent::Projects(value.try_into()?),
            SectionKind::Statistics => SectionContent::Statistics(value.try_into()?),
            SectionKind::Gallery => SectionContent::Gallery(value.try_into()?),
            SectionKind::Strategy => SectionContent::Strategy(value.try_into()?),
            SectionKind::Governance => SectionContent::Governance(value.try_into()?),
            SectionKind::Contact => SectionContent::Contact(value.try_into()?),
            SectionKind::Footer => SectionContent::Footer(value.try_into()?),
        })
    }

    pub fn kind(&self) -> SectionKind {
        match self {
            SectionContent::Header(_) => SectionKind::Header,
            SectionContent::Hero(_) => SectionKind::Hero,
            SectionContent::About(_) => SectionKind::About,
            SectionContent::Services(_) => SectionKind::Services,
            SectionContent::Projects(_) => SectionKind::Projects,
            SectionContent::Statistics(_) => SectionKind::Statistics,
            SectionContent::Gallery(_) => SectionKind::Gallery,
            SectionContent::Strategy(_) => SectionKind::Strategy,
            SectionContent::Governance(_) => SectionKind::Governance,
            SectionContent::Contact(_) => SectionKind::Contact,
            SectionContent::Footer(_) => SectionKind::Footer,
        }
    }

    /// Every image referenced by this record, in document order.
    pub fn images(&self) -> Vec<&ImageRef> {
        match self {
            SectionContent::Hero(c) => vec![&c.image],
            SectionContent::About(c) => c.gallery.iter().collect(),
            SectionContent::Projects(c) => c.minerals.iter().collect(),
            SectionContent::Gallery(c) => c.items.iter().map(|i| &i.image).collect(),
            _ => Vec::new(),
        }
    }

    pub fn images_mut(&mut self) -> Vec<&mut ImageRef> {
        match self {
            SectionContent::Hero(c) => vec![&mut c.image],
            SectionContent::About(c) => c.gallery.iter_mut().collect(),
            SectionContent::Projects(c) => c.minerals.iter_mut().collect(),
            SectionContent::Gallery(c) => c.items.iter_mut().map(|i| &mut i.image).collect(),
            _ => Vec::new(),
        }
    }

    /// Section keys this record links to.
    pub fn anchors(&self) -> Vec<&str> {
        match self {
            SectionContent::Header(c) => c.nav.iter().map(|l| l.anchor.as_str()).collect(),
            SectionContent::Hero(c) => vec![&c.primary_cta.anchor, &c.secondary_cta.anchor],
            SectionContent::Footer(c) => c.links.iter().map(|l| l.anchor.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// An image reference inside a record.
///
/// Local images use site-absolute paths under `/assets/images/`; anything
/// starting with `http://` or `https://` is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Visible label drawn over the image.
    pub caption: Option<String>,
    /// Above-the-fold: fetched on mount regardless of position.
    #[serde(default)]
    pub priority: bool,
}

impl ImageRef {
    pub fn is_external(&self) -> bool {
        self.src.starts_with("http://") || self.src.starts_with("https://")
    }
}

/// A titled block of text: mission, value, highlight, focus area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Card {
    pub title: String,
    pub text: String,
}

/// A link to another section of the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavLink {
    pub label: String,
    /// Key of the target section (used as `#anchor`).
    pub anchor: String,
}

/// A card with a bullet list: services, governance principles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Offering {
    pub title: String,
    pub description: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderContent {
    pub brand: String,
    pub tagline: String,
    pub nav: Vec<NavLink>,
    pub menu_label: String,
    pub profile_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeroContent {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub primary_cta: NavLink,
    pub secondary_cta: NavLink,
    pub scroll_hint: String,
    pub image: ImageRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AboutContent {
    pub title: String,
    pub subtitle: String,
    /// Markdown.
    pub history: String,
    pub mission: Card,
    pub vision: Card,
    pub values_title: String,
    pub values: Vec<Card>,
    #[serde(default)]
    pub gallery: Vec<ImageRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesContent {
    pub title: String,
    pub subtitle: String,
    pub services: Vec<Offering>,
    pub why_title: String,
    pub why: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    pub country: String,
    pub site: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductionTarget {
    pub mineral: String,
    pub value: u64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectsContent {
    pub title: String,
    pub subtitle: String,
    /// Markdown.
    pub description: String,
    pub locations: Vec<Location>,
    #[serde(default)]
    pub minerals: Vec<ImageRef>,
    pub production_title: String,
    pub production: Vec<ProductionTarget>,
    pub highlights: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stat {
    /// Display value, e.g. `"10+"` or `"24/7"`.
    pub value: String,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatisticsContent {
    pub title: String,
    pub subtitle: String,
    pub stats: Vec<Stat>,
    pub banner: Card,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GalleryCategory {
    pub label: String,
    /// Value matched against [`GalleryItem::category`]; `"all"` shows everything.
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GalleryItem {
    pub title: String,
    pub description: String,
    pub category: String,
    pub image: ImageRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GalleryContent {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub categories: Vec<GalleryCategory>,
    pub items: Vec<GalleryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Horizon {
    pub period: String,
    pub title: String,
    pub goals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyContent {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub horizons: Vec<Horizon>,
    pub focus_title: String,
    pub focus: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    pub title: String,
    pub status: String,
    /// Rendered with the warning accent instead of the check mark.
    #[serde(default)]
    pub attention: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceContent {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub principles: Vec<Offering>,
    pub policies_title: String,
    pub policies: Vec<Policy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactForm {
    pub name: String,
    pub name_placeholder: String,
    pub email: String,
    pub email_placeholder: String,
    pub subject: String,
    pub subject_placeholder: String,
    pub message: String,
    pub message_placeholder: String,
    pub send: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Office {
    pub title: String,
    /// Multi-line postal address.
    pub address: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactPerson {
    pub role: String,
    pub phone: String,
    pub department: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactContent {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub form: ContactForm,
    pub offices: Vec<Office>,
    pub contacts_title: String,
    pub contacts: Vec<ContactPerson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FooterContent {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub links_title: String,
    pub links: Vec<NavLink>,
    pub services_title: String,
    pub services: Vec<String>,
    pub contact_title: String,
    pub contact_lines: Vec<String>,
    pub email: String,
    pub website: String,
    pub copyright: String,
    pub legal: Vec<String>,
}
