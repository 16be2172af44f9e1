//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a `config.toml` in the content root overrides any subset
//! of them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! default_locale = "en"        # Locale published at the site root
//! company_name = "Bridgelink Mineral Consultants Ltd"
//!
//! [loading]
//! proximity_margin = 50        # px around the viewport that starts image fetches
//! fade_in_ms = 300             # image fade-in once loaded
//! image_sizes = "(max-width: 768px) 100vw, (max-width: 1200px) 50vw, 33vw"
//!
//! [theme]
//! content_width = "80rem"
//! card_radius = "1rem"
//! card_gap = "1.5rem"
//!
//! [theme.section_padding]
//! size = "8vw"
//! min = "3rem"
//! max = "5rem"
//!
//! [colors]
//! background = "#ffffff"
//! surface = "#f9fafb"
//! text = "#111827"
//! text_muted = "#4b5563"
//! accent = "#d97706"
//! accent_hover = "#b45309"
//! placeholder = "#e5e7eb"
//!
//! [processing]
//! max_processes = 4            # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::Locale;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Identity and locale settings.
    pub site: SiteSettings,
    /// Deferred loading behaviour shared by the page and `deferred.js`.
    pub loading: LoadingConfig,
    /// Color palette.
    pub colors: ColorConfig,
    /// Layout settings.
    pub theme: ThemeConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.company_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.company_name must not be empty".into(),
            ));
        }
        if self.loading.proximity_margin > 2000 {
            return Err(ConfigError::Validation(
                "loading.proximity_margin must be 0-2000 px".into(),
            ));
        }
        if self.loading.fade_in_ms > 5000 {
            return Err(ConfigError::Validation(
                "loading.fade_in_ms must be 0-5000".into(),
            ));
        }
        if self.loading.image_sizes.trim().is_empty() {
            return Err(ConfigError::Validation(
                "loading.image_sizes must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSettings {
    /// Locale published at the site root; every other locale gets a subdirectory.
    pub default_locale: Locale,
    /// Used in page titles and the footer copyright.
    pub company_name: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            default_locale: Locale::En,
            company_name: "Bridgelink Mineral Consultants Ltd".to_string(),
        }
    }
}

/// Deferred loading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadingConfig {
    /// Distance in CSS pixels around the viewport within which a deferred
    /// image starts fetching.
    pub proximity_margin: u32,
    /// Duration of the image fade-in after a successful load.
    pub fade_in_ms: u32,
    /// Default `sizes` attribute for content images.
    pub image_sizes: String,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            proximity_margin: 50,
            fade_in_ms: 300,
            image_sizes: "(max-width: 768px) 100vw, (max-width: 1200px) 50vw, 33vw".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// A responsive CSS size expressed as `clamp(min, size, max)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClampSize {
    /// Preferred/fluid value, typically viewport-relative (e.g. `"8vw"`).
    pub size: String,
    /// Minimum bound (e.g. `"3rem"`).
    pub min: String,
    /// Maximum bound (e.g. `"5rem"`).
    pub max: String,
}

impl ClampSize {
    /// Render as a CSS `clamp()` expression.
    pub fn to_css(&self) -> String {
        format!("clamp({}, {}, {})", self.min, self.size, self.max)
    }
}

/// Layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    /// Vertical padding of every section.
    pub section_padding: ClampSize,
    /// Maximum width of section content.
    pub content_width: String,
    /// Corner radius of cards and images.
    pub card_radius: String,
    /// Gap between cards in grids.
    pub card_gap: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            section_padding: ClampSize {
                size: "8vw".to_string(),
                min: "3rem".to_string(),
                max: "5rem".to_string(),
            },
            content_width: "80rem".to_string(),
            card_radius: "1rem".to_string(),
            card_gap: "1.5rem".to_string(),
        }
    }
}

/// Color palette. The site has a single (light) scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    pub background: String,
    /// Alternate section and card background.
    pub surface: String,
    pub text: String,
    pub text_muted: String,
    /// Brand amber used for buttons, subtitles and bullets.
    pub accent: String,
    pub accent_hover: String,
    /// Neutral block shown while an image or section is pending.
    pub placeholder: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            surface: "#f9fafb".to_string(),
            text: "#111827".to_string(),
            text_muted: "#4b5563".to_string(),
            accent: "#d97706".to_string(),
            accent_hover: "#b45309".to_string(),
            placeholder: "#e5e7eb".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    let config = resolve_config(base, overlay)?;
    tracing::debug!(
        default_locale = %config.site.default_locale,
        proximity_margin = config.loading.proximity_margin,
        "loaded site config"
    );
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Bridgelink Site Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at the root of the content directory.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site identity
# ---------------------------------------------------------------------------
[site]
# Locale published at the site root ("en" or "fr"). The other locale is
# written to its own directory, e.g. /fr/index.html.
default_locale = "en"

# Used in page titles and the footer copyright line.
company_name = "Bridgelink Mineral Consultants Ltd"

# ---------------------------------------------------------------------------
# Deferred loading
# ---------------------------------------------------------------------------
[loading]
# Distance in CSS pixels around the viewport within which an off-screen
# image starts downloading.
proximity_margin = 50

# Fade-in duration once an image has loaded (milliseconds).
fade_in_ms = 300

# Default `sizes` attribute for content images.
image_sizes = "(max-width: 768px) 100vw, (max-width: 1200px) 50vw, 33vw"

# ---------------------------------------------------------------------------
# Layout
# ---------------------------------------------------------------------------
[theme]
# Maximum width of section content (CSS value).
content_width = "80rem"

# Corner radius of cards and images (CSS value).
card_radius = "1rem"

# Gap between cards in grids (CSS value).
card_gap = "1.5rem"

# Vertical section padding, as CSS clamp(min, size, max).
[theme.section_padding]
size = "8vw"
min = "3rem"
max = "5rem"

# ---------------------------------------------------------------------------
# Colors
# ---------------------------------------------------------------------------
[colors]
background = "#ffffff"
surface = "#f9fafb"       # Alternate sections and cards
text = "#111827"
text_muted = "#4b5563"
accent = "#d97706"        # Buttons, subtitles, bullets
accent_hover = "#b45309"
placeholder = "#e5e7eb"   # Pending images and sections

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

/// Generate CSS custom properties from color config.
pub fn generate_color_css(colors: &ColorConfig) -> String {
    format!(
        r#":root {{
    --color-bg: {background};
    --color-surface: {surface};
    --color-text: {text};
    --color-text-muted: {text_muted};
    --color-accent: {accent};
    --color-accent-hover: {accent_hover};
    --color-placeholder: {placeholder};
}}"#,
        background = colors.background,
        surface = colors.surface,
        text = colors.text,
        text_muted = colors.text_muted,
        accent = colors.accent,
        accent_hover = colors.accent_hover,
        placeholder = colors.placeholder,
    )
}

/// Generate CSS custom properties from theme and loading config.
pub fn generate_theme_css(theme: &ThemeConfig, loading: &LoadingConfig) -> String {
    format!(
        r#":root {{
    --section-padding: {section_padding};
    --content-width: {content_width};
    --card-radius: {card_radius};
    --card-gap: {card_gap};
    --fade-in: {fade_in}ms;
}}"#,
        section_padding = theme.section_padding.to_css(),
        content_width = theme.content_width,
        card_radius = theme.card_radius,
        card_gap = theme.card_gap,
        fade_in = loading.fade_in_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.site.default_locale, Locale::En);
        assert_eq!(config.loading.proximity_margin, 50);
        assert_eq!(config.loading.fade_in_ms, 300);
        assert_eq!(config.colors.accent, "#d97706");
        assert_eq!(
            config.theme.section_padding.to_css(),
            "clamp(3rem, 8vw, 5rem)"
        );
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[colors]
accent = "#ea580c"
"##;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.colors.accent, "#ea580c");
        // Defaults preserved
        assert_eq!(config.colors.background, "#ffffff");
        assert_eq!(config.loading.proximity_margin, 50);
    }

    #[test]
    fn parse_default_locale() {
        let config: SiteConfig = toml::from_str("[site]\ndefault_locale = \"fr\"\n").unwrap();
        assert_eq!(config.site.default_locale, Locale::Fr);
    }

    #[test]
    fn unsupported_locale_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[site]\ndefault_locale = \"de\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn generate_color_css_uses_config() {
        let mut colors = ColorConfig::default();
        colors.placeholder = "#cccccc".to_string();
        let css = generate_color_css(&colors);
        assert!(css.contains("--color-placeholder: #cccccc"));
        assert!(css.contains("--color-accent: #d97706"));
    }

    #[test]
    fn generate_theme_css_includes_fade_and_padding() {
        let css = generate_theme_css(&ThemeConfig::default(), &LoadingConfig::default());
        assert!(css.contains("--section-padding: clamp(3rem, 8vw, 5rem)"));
        assert!(css.contains("--fade-in: 300ms"));
        assert!(css.contains("--content-width: 80rem"));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.loading.proximity_margin, 50);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[loading]\nproximity_margin = 120\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.loading.proximity_margin, 120);
        assert_eq!(config.loading.fade_in_ms, 300);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[loading]\nproximity_margin = 9000\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = SiteConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[loading]
proximity_margin = 50
fade_in_ms = 300
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[loading]\nfade_in_ms = 0\n").unwrap();
        let merged = merge_toml(base, overlay);
        let loading = merged.get("loading").unwrap();
        assert_eq!(loading.get("fade_in_ms").unwrap().as_integer(), Some(0));
        assert_eq!(
            loading.get("proximity_margin").unwrap().as_integer(),
            Some(50)
        );
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("a = 10\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[loading]\nmargin = 10\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[images]\nquality = 90\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.site.default_locale, Locale::En);
        assert_eq!(config.loading.proximity_margin, 50);
        assert_eq!(config.colors.placeholder, "#e5e7eb");
        assert_eq!(config.theme.card_gap, "1.5rem");
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        for key in ["site", "loading", "colors", "theme", "processing"] {
            assert!(val.get(key).is_some(), "missing [{key}]");
        }
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str("[loading]\nfade_in_ms = 60000\n").unwrap();
        let result = resolve_config(stock_defaults_value(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
