//! Viewport model and one-shot visibility observations.
//!
//! The browser side of the site uses an `IntersectionObserver` with a root
//! margin; this module is the same contract in Rust so the loading pipeline
//! can be driven and tested without a browser. A [`Viewport`] tracks the
//! visible rectangle of the document. [`Viewport::observe_once`] registers a
//! watcher for a region and returns:
//!
//! - an [`Entered`] future that resolves the first time the region comes
//!   within `margin` pixels of the visible rectangle, and
//! - an [`ObserverGuard`] that owns the registration. Dropping the guard
//!   removes the watcher whether or not it ever fired.
//!
//! Watchers are notified when the viewport scrolls or resizes, never polled.
//! A watcher fires at most once and is removed as soon as it has fired.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`), matching the
//! cooperative executor the loader and images run on.

use futures::channel::oneshot;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

pub use futures::channel::oneshot::Canceled;

/// A rectangle in document coordinates (CSS pixels, origin at the top-left
/// corner of the page).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A full-width block at vertical offset `top`.
    pub fn block(top: f64, height: f64) -> Self {
        Self::new(0.0, top, 0.0, height)
    }

    /// Whether this rectangle intersects `other` grown by `margin` on every
    /// side. Touching edges count as intersecting.
    fn within(&self, other: &Bounds, margin: f64) -> bool {
        let top = other.top - margin;
        let bottom = other.top + other.height + margin;
        let left = other.left - margin;
        let right = other.left + other.width + margin;
        self.top <= bottom
            && self.top + self.height >= top
            && self.left <= right
            && self.left + self.width >= left
    }
}

struct Watcher {
    id: u64,
    bounds: Bounds,
    margin: f64,
    tx: oneshot::Sender<()>,
}

struct ViewportState {
    width: f64,
    height: f64,
    scroll_y: f64,
    next_id: u64,
    watchers: Vec<Watcher>,
}

impl ViewportState {
    fn visible(&self) -> Bounds {
        Bounds::new(0.0, self.scroll_y, self.width, self.height)
    }
}

/// The visible part of the document. Cloning yields another handle to the
/// same viewport.
#[derive(Clone)]
pub struct Viewport {
    state: Rc<RefCell<ViewportState>>,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(ViewportState {
                width,
                height,
                scroll_y: 0.0,
                next_id: 0,
                watchers: Vec::new(),
            })),
        }
    }

    pub fn scroll_y(&self) -> f64 {
        self.state.borrow().scroll_y
    }

    /// Scroll so the top of the visible rectangle is at `y` and notify
    /// watchers.
    pub fn scroll_to(&self, y: f64) {
        self.state.borrow_mut().scroll_y = y.max(0.0);
        self.notify();
    }

    pub fn resize(&self, width: f64, height: f64) {
        {
            let mut state = self.state.borrow_mut();
            state.width = width;
            state.height = height;
        }
        self.notify();
    }

    /// Watch `bounds` until it first comes within `margin` pixels of the
    /// visible rectangle.
    ///
    /// If the region is already within the margin, the returned future is
    /// ready immediately and nothing is registered.
    pub fn observe_once(&self, bounds: Bounds, margin: f64) -> (ObserverGuard, Entered) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;

        if bounds.within(&state.visible(), margin) {
            // Receiver is alive, so this cannot fail.
            let _ = tx.send(());
        } else {
            state.watchers.push(Watcher {
                id,
                bounds,
                margin,
                tx,
            });
        }

        let guard = ObserverGuard {
            state: Rc::downgrade(&self.state),
            id,
        };
        (guard, Entered { rx })
    }

    /// Number of registered watchers that have not fired yet.
    pub fn active_observations(&self) -> usize {
        self.state.borrow().watchers.len()
    }

    fn notify(&self) {
        let fired: Vec<Watcher> = {
            let mut state = self.state.borrow_mut();
            let visible = state.visible();
            let (fired, waiting) = state
                .watchers
                .drain(..)
                .partition(|w| w.bounds.within(&visible, w.margin));
            state.watchers = waiting;
            fired
        };
        for watcher in fired {
            tracing::debug!(id = watcher.id, top = watcher.bounds.top, "region entered viewport");
            // A dropped receiver only means nobody is waiting any more.
            let _ = watcher.tx.send(());
        }
    }
}

/// Owns one visibility registration. Dropping it tears the registration down.
#[must_use = "dropping the guard cancels the observation"]
pub struct ObserverGuard {
    state: Weak<RefCell<ViewportState>>,
    id: u64,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.borrow_mut().watchers.retain(|w| w.id != self.id);
        }
    }
}

/// Resolves once the observed region has entered the margin.
///
/// Resolves to `Err(Canceled)` if the registration was torn down first.
pub struct Entered {
    rx: oneshot::Receiver<()>,
}

impl Future for Entered {
    type Output = Result<(), Canceled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx)
    }
}
