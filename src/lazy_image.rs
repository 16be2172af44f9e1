//! Visibility-gated images.
//!
//! An image goes through four phases:
//!
//! ```text
//! NotRequested ──(container within margin)──▶ InView ──(fetch ok)────▶ Loaded
//!                                                    └─(fetch failed)─▶ Errored
//! ```
//!
//! Priority and non-deferred images start `InView`. `Loaded` and `Errored`
//! are terminal; an error also counts as loaded-for-display since the
//! fallback block is the final visual state. Nothing ever fetches before the
//! image is in view.
//!
//! The state machine ([`ImageLoadState`]) and the markup ([`render`]) are pure.
//! [`LazyImage`] is the runtime: it wires a descriptor to a [`Viewport`]
//! observation and an [`ImageFetcher`] on a local executor. `deferred.js`
//! applies the same rules in the browser to the markup produced here.

use crate::content::{ImageRef, UiStrings};
use crate::viewport::{Bounds, ObserverGuard, Viewport};
use futures::future::{FutureExt, LocalBoxFuture, RemoteHandle};
use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};
use maud::{Markup, html};
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

/// Immutable description of one image for the lifetime of its component.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub src: String,
    pub alt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Wait for visibility before fetching. Defaults to true.
    pub deferred: bool,
    /// Above-the-fold: fetch on mount regardless of position.
    pub priority: bool,
    /// `sizes` attribute for responsive layout.
    pub sizes: Option<String>,
}

impl ImageDescriptor {
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
            width: None,
            height: None,
            deferred: true,
            priority: false,
            sizes: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn eager(mut self) -> Self {
        self.deferred = false;
        self
    }

    pub fn priority(mut self) -> Self {
        self.priority = true;
        self
    }

    pub fn with_sizes(mut self, sizes: impl Into<String>) -> Self {
        self.sizes = Some(sizes.into());
        self
    }

    /// Build from a content record reference.
    pub fn from_ref(image: &ImageRef) -> Self {
        Self {
            src: image.src.clone(),
            alt: image.alt.clone(),
            width: image.width,
            height: image.height,
            deferred: true,
            priority: image.priority,
            sizes: None,
        }
    }

    fn aspect_ratio(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("aspect-ratio: {w} / {h}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePhase {
    NotRequested,
    InView,
    Loaded,
    Errored,
}

impl ImagePhase {
    /// Value of the `data-state` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            ImagePhase::NotRequested => "not-requested",
            ImagePhase::InView => "in-view",
            ImagePhase::Loaded => "loaded",
            ImagePhase::Errored => "errored",
        }
    }
}

/// Load state of one mounted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageLoadState {
    pub is_in_view: bool,
    pub is_loaded: bool,
    pub has_error: bool,
}

impl ImageLoadState {
    pub fn initial(descriptor: &ImageDescriptor) -> Self {
        Self {
            is_in_view: !descriptor.deferred || descriptor.priority,
            is_loaded: false,
            has_error: false,
        }
    }

    pub fn phase(&self) -> ImagePhase {
        if self.has_error {
            ImagePhase::Errored
        } else if self.is_loaded {
            ImagePhase::Loaded
        } else if self.is_in_view {
            ImagePhase::InView
        } else {
            ImagePhase::NotRequested
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_loaded || self.has_error
    }

    /// Returns whether the state changed.
    pub fn mark_in_view(&mut self) -> bool {
        if self.is_in_view {
            return false;
        }
        self.is_in_view = true;
        true
    }

    /// Ignored unless the image is in view and not yet terminal.
    pub fn mark_loaded(&mut self) -> bool {
        if !self.is_in_view || self.is_terminal() {
            return false;
        }
        self.is_loaded = true;
        true
    }

    /// Ignored unless the image is in view and not yet terminal.
    pub fn mark_error(&mut self) -> bool {
        if !self.is_in_view || self.is_terminal() {
            return false;
        }
        self.has_error = true;
        self.is_loaded = true;
        true
    }
}

/// Render the image container for the given state.
///
/// The container carries the intrinsic aspect ratio in every phase so the
/// layout never shifts. An image that is not in view yet has its URL in
/// `data-src` only, so the browser cannot request it.
pub fn render(descriptor: &ImageDescriptor, state: &ImageLoadState, strings: &UiStrings) -> Markup {
    let phase = state.phase();
    let loading = if descriptor.priority { "eager" } else { "lazy" };
    let fetch_priority = descriptor.priority.then_some("high");
    html! {
        div.lazy-image
            data-state=(phase.as_str())
            data-priority[descriptor.priority]
            style=[descriptor.aspect_ratio()] {
            @match phase {
                ImagePhase::NotRequested => {
                    img.lazy-image__img
                        data-src=(descriptor.src)
                        alt=(descriptor.alt)
                        width=[descriptor.width]
                        height=[descriptor.height]
                        sizes=[descriptor.sizes.as_deref()]
                        decoding="async";
                    div.lazy-image__placeholder aria-hidden="true" {}
                }
                ImagePhase::InView => {
                    img.lazy-image__img
                        src=(descriptor.src)
                        alt=(descriptor.alt)
                        width=[descriptor.width]
                        height=[descriptor.height]
                        sizes=[descriptor.sizes.as_deref()]
                        loading=(loading)
                        fetchpriority=[fetch_priority]
                        decoding="async";
                    div.lazy-image__placeholder aria-hidden="true" {}
                }
                ImagePhase::Loaded => {
                    img.lazy-image__img.is-loaded
                        src=(descriptor.src)
                        alt=(descriptor.alt)
                        width=[descriptor.width]
                        height=[descriptor.height]
                        sizes=[descriptor.sizes.as_deref()]
                        decoding="async";
                }
                ImagePhase::Errored => {
                    div.lazy-image__fallback role="img" aria-label=(descriptor.alt) {
                        span { (strings.image_unavailable) }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Runtime
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("{0}")]
    Other(String),
}

/// Issues the network request for one image URL.
///
/// The request counts as issued when `fetch` is called, not when the
/// returned future is first polled.
pub trait ImageFetcher {
    fn fetch(&self, src: &str) -> LocalBoxFuture<'static, Result<(), FetchError>>;
}

/// A mounted image: owns its visibility observation and its pending fetch.
///
/// Dropping it (or calling [`LazyImage::unmount`]) removes the observation
/// even if it never fired and cancels the fetch; a late result is ignored.
pub struct LazyImage {
    descriptor: ImageDescriptor,
    state: Rc<Cell<ImageLoadState>>,
    _observation: Option<ObserverGuard>,
    _task: RemoteHandle<()>,
}

impl LazyImage {
    /// Mount an image whose container occupies `bounds`.
    ///
    /// Images that start in view are requested right away. Deferred ones
    /// register a one-shot observation on `viewport` and are requested once
    /// their container comes within `margin` pixels of it.
    pub fn mount(
        descriptor: ImageDescriptor,
        viewport: &Viewport,
        bounds: Bounds,
        margin: f64,
        fetcher: Rc<dyn ImageFetcher>,
        spawner: &impl LocalSpawn,
    ) -> Result<Self, SpawnError> {
        let initial = ImageLoadState::initial(&descriptor);
        let state = Rc::new(Cell::new(initial));
        let src = descriptor.src.clone();

        let (observation, task) = if initial.is_in_view {
            tracing::debug!(%src, "requesting image on mount");
            let fetch = fetcher.fetch(&src);
            let cell = state.clone();
            let task = async move { finish(&cell, &src, fetch.await) }.boxed_local();
            (None, task)
        } else {
            let (guard, entered) = viewport.observe_once(bounds, margin);
            let cell = state.clone();
            let task = async move {
                if entered.await.is_err() {
                    return;
                }
                update(&cell, ImageLoadState::mark_in_view);
                tracing::debug!(%src, "image in view, requesting");
                let result = fetcher.fetch(&src).await;
                finish(&cell, &src, result);
            }
            .boxed_local();
            (Some(guard), task)
        };

        let task = spawner.spawn_local_with_handle(task)?;
        Ok(Self {
            descriptor,
            state,
            _observation: observation,
            _task: task,
        })
    }

    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ImageLoadState {
        self.state.get()
    }

    pub fn phase(&self) -> ImagePhase {
        self.state.get().phase()
    }

    pub fn render(&self, strings: &UiStrings) -> Markup {
        render(&self.descriptor, &self.state.get(), strings)
    }

    pub fn unmount(self) {}
}

fn update(cell: &Cell<ImageLoadState>, transition: fn(&mut ImageLoadState) -> bool) -> bool {
    let mut state = cell.get();
    let changed = transition(&mut state);
    cell.set(state);
    changed
}

fn finish(cell: &Cell<ImageLoadState>, src: &str, result: Result<(), FetchError>) {
    match result {
        Ok(()) => {
            update(cell, ImageLoadState::mark_loaded);
        }
        Err(e) => {
            tracing::warn!(%src, error = %e, "image failed to load");
            update(cell, ImageLoadState::mark_error);
        }
    }
}
