//! HTML site generation.
//!
//! Stage 3 of the build pipeline. Takes the processed manifest and composes
//! one page per locale with the [section loader](crate::loader).
//!
//! ## Composition
//!
//! For every locale the generator registers one [`SectionDescriptor`] per
//! published section and mounts the page:
//!
//! 1. Priority sections (header, hero) are loaded during mount and rendered
//!    inline into `index.html`.
//! 2. Every other section renders as a pending placeholder slot.
//! 3. The page is then settled: each deferred section is rendered on its own
//!    and written as a fragment that `deferred.js` fetches after the page has
//!    painted.
//!
//! A section that fails (for instance because it has no record for the
//! locale) is isolated: a failed priority section renders the error boundary
//! inline, a failed deferred section gets no fragment, and the browser turns
//! the missing fragment into the same error boundary. Either way the failure
//! is listed in the [`GenerateReport`].
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── index.html                  # Default locale
//! ├── fr/index.html               # Other locale
//! ├── sections/en/about.html      # Deferred section fragments
//! ├── sections/fr/about.html
//! ├── deferred.js
//! └── assets/images/hero-1a2b3c4d.png
//! ```
//!
//! ## CSS and JavaScript
//!
//! Static assets are embedded at compile time:
//! - `static/site.css`: Base styles (colors and theme injected from config)
//! - `static/deferred.js`: Fragment loader, image gate, gallery filter
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.

use crate::config::{self, LoadingConfig};
use crate::content::{ContentError, Dictionary, UiStrings};
use crate::lazy_image::{FetchError, ImageDescriptor, ImageFetcher, ImagePhase, LazyImage};
use crate::loader::{RegistrationError, SectionDescriptor, SectionLoader, SectionState, SlotLabels};
use crate::process::ProcessedManifest;
use crate::scan::IMAGES_DIR;
use crate::sections::{RenderContext, SectionRenderer};
use crate::types::{Locale, ProcessedImage};
use crate::viewport::{Bounds, Viewport};
use futures::executor::{LocalPool, block_on};
use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::SpawnError;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Content error: {0}")]
    Content(#[from] ContentError),
    #[error("Section registration failed: {0}")]
    Registration(#[from] RegistrationError),
    #[error("Cannot spawn image task: {0}")]
    Spawn(#[from] SpawnError),
}

const CSS_STATIC: &str = include_str!("../static/site.css");
const JS: &str = include_str!("../static/deferred.js");

/// What was written for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub locale: Locale,
    /// Page path relative to the output root.
    pub path: String,
    /// Sections rendered into the page itself.
    pub inline: Vec<String>,
    /// Sections written as fragments.
    pub deferred: Vec<String>,
    /// Sections that failed to render.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub pages: Vec<PageReport>,
}

impl GenerateReport {
    /// `(locale, section)` for every failed section.
    pub fn failures(&self) -> Vec<(Locale, &str)> {
        self.pages
            .iter()
            .flat_map(|p| p.failed.iter().map(move |s| (p.locale, s.as_str())))
            .collect()
    }

    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(|p| p.deferred.len()).sum()
    }
}

pub fn generate(
    manifest_path: &Path,
    processed_dir: &Path,
    output_dir: &Path,
) -> Result<GenerateReport, GenerateError> {
    let manifest_content = fs::read_to_string(manifest_path)?;
    let manifest: ProcessedManifest = serde_json::from_str(&manifest_content)?;

    let config = &manifest.config;
    let css = format!(
        "{}\n\n{}\n\n{}",
        config::generate_color_css(&config.colors),
        config::generate_theme_css(&config.theme, &config.loading),
        CSS_STATIC
    );

    fs::create_dir_all(output_dir)?;
    publish_images(&manifest.images, processed_dir, output_dir)?;
    fs::write(output_dir.join("deferred.js"), deferred_js(&config.loading))?;

    let dictionary = Rc::new(localize_images(
        manifest.dictionary.clone(),
        &manifest.images,
    ));

    let mut report = GenerateReport::default();
    for locale in Locale::ALL {
        let composed = compose_page(locale, &manifest, dictionary.clone())?;
        let document = base_document(
            locale,
            config.site.default_locale,
            manifest.strings.get(locale)?,
            &css,
            composed.body,
        );

        let page_path = format!("{}index.html", locale.path_prefix(config.site.default_locale));
        let page_file = output_dir.join(&page_path);
        if let Some(parent) = page_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&page_file, document.into_string())?;

        let fragment_dir = output_dir.join(fragment_dir(locale));
        if fragment_dir.exists() {
            fs::remove_dir_all(&fragment_dir)?;
        }
        fs::create_dir_all(&fragment_dir)?;
        for (name, markup) in &composed.fragments {
            fs::write(fragment_dir.join(format!("{name}.html")), markup.clone().into_string())?;
        }

        for name in &composed.failed {
            tracing::warn!(%locale, section = %name, "section will render as unavailable");
        }

        report.pages.push(PageReport {
            locale,
            path: page_path,
            inline: composed.inline,
            deferred: composed.fragments.into_iter().map(|(n, _)| n).collect(),
            failed: composed.failed,
        });
    }

    Ok(report)
}

/// A page composed by the section loader, before it is written out.
struct ComposedPage {
    body: Markup,
    inline: Vec<String>,
    fragments: Vec<(String, Markup)>,
    failed: Vec<String>,
}

fn compose_page(
    locale: Locale,
    manifest: &ProcessedManifest,
    dictionary: Rc<Dictionary>,
) -> Result<ComposedPage, GenerateError> {
    let strings = manifest.strings.get(locale)?.clone();
    let descriptors = manifest
        .sections
        .iter()
        .map(|s| SectionDescriptor::new(&s.key, SectionRenderer::new(&s.key)).priority(s.priority))
        .collect();
    let loader = SectionLoader::new(descriptors)?;
    tracing::debug!(%locale, sections = loader.len(), "composing page");

    let ctx = Rc::new(RenderContext {
        locale,
        default_locale: manifest.config.site.default_locale,
        dictionary,
        strings,
        image_sizes: manifest.config.loading.image_sizes.clone(),
    });

    Ok(block_on(async {
        let mut page = loader.mount(ctx.clone()).await;
        let labels = SlotLabels {
            loading: &ctx.strings.loading,
            unavailable: &ctx.strings.section_unavailable,
        };
        let body = page.render(labels);

        page.settle().await;

        let mut inline = Vec::new();
        let mut fragments = Vec::new();
        let mut failed = Vec::new();
        for slot in page.slots() {
            match slot.state {
                SectionState::Failed(_) => failed.push(slot.name.to_string()),
                SectionState::Loaded(_) if slot.priority => inline.push(slot.name.to_string()),
                SectionState::Loaded(markup) => {
                    fragments.push((slot.name.to_string(), markup.clone()))
                }
                SectionState::Pending => {}
            }
        }

        ComposedPage {
            body,
            inline,
            fragments,
            failed,
        }
    }))
}

/// Point local image references at their fingerprinted copies and fill in
/// intrinsic dimensions the content did not state.
pub fn localize_images(
    mut dictionary: Dictionary,
    images: &BTreeMap<String, ProcessedImage>,
) -> Dictionary {
    for record in dictionary.records_mut() {
        for content in record.by_locale.values_mut() {
            for image in content.images_mut() {
                if image.is_external() {
                    continue;
                }
                let Some(processed) = images.get(&image.src) else {
                    tracing::warn!(src = %image.src, "image was not processed, linking source path");
                    continue;
                };
                image.src = format!("/{}", processed.path);
                if image.width.is_none() && image.height.is_none() {
                    image.width = Some(processed.width);
                    image.height = Some(processed.height);
                }
            }
        }
    }
    dictionary
}

/// Directory of a locale's fragments relative to the output root.
pub fn fragment_dir(locale: Locale) -> String {
    format!("sections/{}", locale.code())
}

/// `deferred.js` with the loading settings baked in.
pub fn deferred_js(loading: &LoadingConfig) -> String {
    format!(
        "const LOADER_CONFIG = {{ proximityMargin: {}, fadeInMs: {} }};\n\n{}",
        loading.proximity_margin, loading.fade_in_ms, JS
    )
}

/// Copy the current fingerprinted images into a fresh output image directory.
fn publish_images(
    images: &BTreeMap<String, ProcessedImage>,
    processed_dir: &Path,
    output_dir: &Path,
) -> std::io::Result<()> {
    let images_dir = output_dir.join(IMAGES_DIR);
    if images_dir.exists() {
        fs::remove_dir_all(&images_dir)?;
    }
    fs::create_dir_all(&images_dir)?;

    for image in images.values() {
        let dest = output_dir.join(&image.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(processed_dir.join(&image.path), &dest)?;
    }
    Ok(())
}

// ============================================================================
// Published image check
// ============================================================================

/// Resolves image URLs against a generated output tree.
struct DistFetcher {
    root: PathBuf,
}

impl ImageFetcher for DistFetcher {
    fn fetch(&self, src: &str) -> LocalBoxFuture<'static, Result<(), FetchError>> {
        let result = if src.starts_with("http://") || src.starts_with("https://") {
            Ok(())
        } else if self.root.join(src.trim_start_matches('/')).is_file() {
            Ok(())
        } else {
            Err(FetchError::Status(404))
        };
        async move { result }.boxed_local()
    }
}

/// Mount every image of every page against the generated output and return
/// the sources that end up in the error state.
///
/// External URLs are assumed reachable.
pub fn verify_images(
    output_dir: &Path,
    manifest: &ProcessedManifest,
) -> Result<Vec<String>, GenerateError> {
    let dictionary = localize_images(manifest.dictionary.clone(), &manifest.images);
    let fetcher: Rc<dyn ImageFetcher> = Rc::new(DistFetcher {
        root: output_dir.to_path_buf(),
    });
    let viewport = Viewport::new(1280.0, 800.0);
    let margin = f64::from(manifest.config.loading.proximity_margin);

    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let mut mounted = Vec::new();
    for section in &manifest.sections {
        for locale in Locale::ALL {
            let Ok(content) = dictionary.lookup(locale, &section.key) else {
                continue;
            };
            for image in content.images() {
                let descriptor = ImageDescriptor::from_ref(image).eager();
                mounted.push(LazyImage::mount(
                    descriptor,
                    &viewport,
                    Bounds::block(0.0, 0.0),
                    margin,
                    fetcher.clone(),
                    &spawner,
                )?);
            }
        }
    }
    pool.run_until_stalled();

    let broken: BTreeSet<String> = mounted
        .iter()
        .filter(|image| image.phase() == ImagePhase::Errored)
        .map(|image| image.descriptor().src.clone())
        .collect();
    Ok(broken.into_iter().collect())
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(
    locale: Locale,
    default_locale: Locale,
    strings: &UiStrings,
    css: &str,
    content: Markup,
) -> Markup {
    let fragment_base = format!("/{}/", fragment_dir(locale));
    html! {
        (DOCTYPE)
        html lang=(locale.code()) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (strings.document_title) }
                meta name="description" content=(strings.description);
                @for alternate in Locale::ALL {
                    link rel="alternate" hreflang=(alternate.code())
                        href={ "/" (alternate.path_prefix(default_locale)) };
                }
                style { (PreEscaped(css)) }
                script src="/deferred.js" defer {}
            }
            body
                data-fragment-base=(fragment_base)
                data-section-unavailable=(strings.section_unavailable)
                data-image-unavailable=(strings.image_unavailable) {
                (content)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ImageRef, SectionContent};
    use crate::test_helpers::*;

    fn strings() -> UiStrings {
        UiStrings {
            document_title: "Bridgelink".into(),
            description: "Mining consultancy".into(),
            language_toggle: "Français".into(),
            loading: "Loading…".into(),
            image_unavailable: "Image unavailable".into(),
            section_unavailable: "This section could not be loaded.".into(),
        }
    }

    #[test]
    fn base_document_includes_doctype_and_lang() {
        let doc = base_document(
            Locale::Fr,
            Locale::En,
            &strings(),
            "body {}",
            html! { p { "test" } },
        )
        .into_string();
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains(r#"<html lang="fr">"#));
        assert!(doc.contains(r#"data-fragment-base="/sections/fr/""#));
    }

    #[test]
    fn base_document_links_both_locales() {
        let doc = base_document(Locale::En, Locale::En, &strings(), "", html! {}).into_string();
        assert!(doc.contains(r#"hreflang="en" href="/""#));
        assert!(doc.contains(r#"hreflang="fr" href="/fr/""#));
        assert!(doc.contains(r#"<script src="/deferred.js" defer></script>"#));
    }

    #[test]
    fn base_document_does_not_escape_css() {
        let doc = base_document(
            Locale::En,
            Locale::En,
            &strings(),
            ".a > .b { content: \"x\" }",
            html! {},
        )
        .into_string();
        assert!(doc.contains(".a > .b { content: \"x\" }"));
    }

    #[test]
    fn deferred_js_carries_loading_config() {
        let loading = LoadingConfig {
            proximity_margin: 120,
            fade_in_ms: 0,
            ..LoadingConfig::default()
        };
        let js = deferred_js(&loading);
        assert!(js.starts_with("const LOADER_CONFIG = { proximityMargin: 120, fadeInMs: 0 };"));
    }

    #[test]
    fn localize_images_rewrites_src_and_fills_dimensions() {
        let tmp = setup_fixtures();
        let manifest = crate::scan::scan(tmp.path()).unwrap();
        let mut images = BTreeMap::new();
        images.insert(
            "/assets/images/hero.png".to_string(),
            ProcessedImage {
                path: "assets/images/hero-abcd1234.png".to_string(),
                width: 48,
                height: 27,
            },
        );

        let dictionary = localize_images(manifest.dictionary, &images);
        let SectionContent::Hero(hero) = dictionary.lookup(Locale::En, "hero").unwrap() else {
            panic!("hero record expected");
        };
        assert_eq!(hero.image.src, "/assets/images/hero-abcd1234.png");
        assert_eq!((hero.image.width, hero.image.height), (Some(48), Some(27)));
    }

    #[test]
    fn localize_images_keeps_stated_dimensions() {
        let mut dictionary = Dictionary::default();
        let record = crate::content::parse_section_file(
            r#"
kind = "about"
[en]
title = "About"
subtitle = "Us"
history = "Since 2014."
mission = { title = "Mission", text = "m" }
vision = { title = "Vision", text = "v" }
values_title = "Values"
values = []
gallery = [{ src = "/assets/images/op1.png", alt = "Site", width = 200, height = 128 }]
"#,
        )
        .unwrap()
        .record;
        dictionary.insert("about", record);
        let mut images = BTreeMap::new();
        images.insert(
            "/assets/images/op1.png".to_string(),
            ProcessedImage {
                path: "assets/images/op1-00000000.png".to_string(),
                width: 4000,
                height: 2560,
            },
        );

        let dictionary = localize_images(dictionary, &images);
        let content = dictionary.lookup(Locale::En, "about").unwrap();
        let gallery: Vec<&ImageRef> = content.images();
        assert_eq!(gallery[0].src, "/assets/images/op1-00000000.png");
        assert_eq!(gallery[0].width, Some(200));
    }

    #[test]
    fn report_lists_failures_per_locale() {
        let report = GenerateReport {
            pages: vec![
                PageReport {
                    locale: Locale::En,
                    path: "index.html".into(),
                    inline: vec!["header".into()],
                    deferred: vec!["about".into()],
                    failed: vec![],
                },
                PageReport {
                    locale: Locale::Fr,
                    path: "fr/index.html".into(),
                    inline: vec!["header".into()],
                    deferred: vec![],
                    failed: vec!["about".into()],
                },
            ],
        };
        assert_eq!(report.failures(), vec![(Locale::Fr, "about")]);
        assert_eq!(report.fragment_count(), 1);
    }

    #[test]
    fn dist_fetcher_reports_missing_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("assets/images")).unwrap();
        fs::write(tmp.path().join("assets/images/a.png"), "x").unwrap();
        let fetcher = DistFetcher {
            root: tmp.path().to_path_buf(),
        };

        assert_eq!(block_on(fetcher.fetch("/assets/images/a.png")), Ok(()));
        assert_eq!(
            block_on(fetcher.fetch("/assets/images/b.png")),
            Err(FetchError::Status(404))
        );
        assert_eq!(block_on(fetcher.fetch("https://example.com/x.png")), Ok(()));
    }
}
