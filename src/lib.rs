//! # Bridgelink Site
//!
//! Static site generator for the bilingual (English/French) website of
//! Bridgelink Mineral Consultants. Every page section is a TOML file holding
//! one record per locale; the generator composes one page per locale.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! Content goes through three independent stages, each producing a JSON
//! manifest that the next stage consumes:
//!
//! ```text
//! 1. Scan      content/  →  manifest.json    (sections, dictionaries, image list)
//! 2. Process   manifest  →  processed/       (dimensions + fingerprinted copies)
//! 3. Generate  manifest  →  dist/            (one page per locale + section fragments)
//! ```
//!
//! # Deferred Loading
//!
//! The page itself only carries what is above the fold. Two pieces model the
//! rest, and `static/deferred.js` reproduces the same behaviour in the browser:
//!
//! - The [`loader`] registers named sections. Mounting loads the priority
//!   sections and leaves a placeholder slot for every other one; those are
//!   requested afterwards, all at once, and each slot fills in place when its
//!   own request resolves. A failed section shows an error notice in its slot
//!   and nothing else on the page is affected.
//! - The [`lazy_image`] gate keeps an image's URL out of the markup until its
//!   container is within the proximity margin of the [`viewport`]. It then
//!   requests the image exactly once and settles on the image or on a
//!   fallback block carrying the alt text.
//!
//! Both run on a single-threaded cooperative executor (`futures`), sharing
//! state through `Rc` and `Cell` without locks.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: reads sections, site strings, config and images into the scan manifest |
//! | [`process`] | Stage 2: identifies and fingerprints images, with a content-addressed [`cache`] |
//! | [`generate`] | Stage 3: composes each locale's page with the section loader and writes fragments |
//! | [`loader`] | Section loader: descriptors, mount, schedule, slots and unmount |
//! | [`lazy_image`] | Visibility-gated image: state machine, markup and runtime |
//! | [`viewport`] | Scroll position and one-shot visibility observations |
//! | [`sections`] | maud renderers, one per section kind |
//! | [`content`] | Bilingual dictionaries and section record types |
//! | [`config`] | `config.toml` loading, validation, merging and CSS generation |
//! | [`imaging`] | Image dimension probe |
//! | [`types`] | Shared types serialized between stages (`Locale`, `SectionEntry`) |
//! | [`naming`] | `NNN-key` filename convention and fingerprinted names |
//! | [`output`] | CLI output formatting for every stage |
//!
//! # Design Decisions
//!
//! ## The Locale Is a Parameter
//!
//! The active language is never global state. [`generate`] iterates
//! [`types::Locale::ALL`] and every renderer receives the locale through its
//! [`sections::RenderContext`]. A section without a record for a locale fails
//! on its own when that locale's page is composed.
//!
//! ## Fragments Instead of Bundles
//!
//! Deferred sections are prerendered HTML fragments under
//! `sections/<locale>/<key>.html`. A failed section gets no fragment; the
//! browser sees the missing file and shows the same error notice the loader
//! renders at build time.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/), a compile-time HTML
//! macro system. Malformed markup is a build error and all interpolation is
//! escaped.

pub mod cache;
pub mod config;
pub mod content;
pub mod generate;
pub mod imaging;
pub mod lazy_image;
pub mod loader;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;
pub mod sections;
pub mod types;
pub mod viewport;

#[cfg(test)]
pub(crate) mod test_helpers;
