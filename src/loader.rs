//! Deferred section loading.
//!
//! A [`SectionLoader`] holds the page's sections in document order. Each one
//! is backed by a [`SectionModule`] that produces its markup asynchronously.
//!
//! Mounting a page loads the priority (above-the-fold) sections and leaves a
//! pending placeholder slot for every other section; it issues no request for
//! them. [`MountedPage::schedule`] then requests every deferred section at
//! once, and [`MountedPage::next_update`] yields them as they resolve, in
//! whatever order that happens. Slots never move: a section that resolves
//! early fills its own placeholder and nothing else.
//!
//! Each section is its own error boundary. A module that fails marks only its
//! slot as failed. There is no retry.
//!
//! Everything runs on a single-threaded cooperative executor; pending loads
//! are `Abortable` so a section can be unmounted while its request is in
//! flight, in which case the late result is dropped.

use futures::future::{AbortHandle, Abortable, Aborted, FutureExt, LocalBoxFuture, join_all};
use futures::stream::{FuturesUnordered, StreamExt};
use maud::{Markup, html};
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;

use crate::content::ContentError;

/// Why a section module failed to produce markup.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("{0}")]
    Module(String),
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("duplicate section name '{0}'")]
    DuplicateName(String),
}

pub type LoadFuture = LocalBoxFuture<'static, Result<Markup, LoadError>>;

/// The deferred code behind one section.
///
/// Calling `load` issues the request; the returned future resolves with the
/// section markup.
pub trait SectionModule<C> {
    fn load(&self, ctx: &C) -> LoadFuture;
}

impl<C, F> SectionModule<C> for F
where
    F: Fn(&C) -> LoadFuture,
{
    fn load(&self, ctx: &C) -> LoadFuture {
        self(ctx)
    }
}

/// Static registration of one section.
pub struct SectionDescriptor<C> {
    pub name: String,
    pub priority: bool,
    pub module: Rc<dyn SectionModule<C>>,
}

impl<C> SectionDescriptor<C> {
    pub fn new(name: impl Into<String>, module: impl SectionModule<C> + 'static) -> Self {
        Self {
            name: name.into(),
            priority: false,
            module: Rc::new(module),
        }
    }

    pub fn priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }
}

/// Load state of one slot.
#[derive(Debug, Clone)]
pub enum SectionState {
    Pending,
    Loaded(Markup),
    Failed(Rc<LoadError>),
}

impl SectionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SectionState::Pending)
    }

    /// Value of the slot's `data-state` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionState::Pending => "pending",
            SectionState::Loaded(_) => "loaded",
            SectionState::Failed(_) => "failed",
        }
    }
}

/// A slot that just reached a terminal state.
#[derive(Debug, Clone)]
pub struct SlotUpdate {
    /// Registration index of the slot.
    pub index: usize,
    pub name: String,
    pub state: SectionState,
}

/// Read-only view of one mounted slot.
#[derive(Debug)]
pub struct SlotView<'a> {
    pub index: usize,
    pub name: &'a str,
    pub priority: bool,
    pub state: &'a SectionState,
}

/// Text the loader puts into placeholder and error slots.
#[derive(Debug, Clone, Copy)]
pub struct SlotLabels<'a> {
    pub loading: &'a str,
    pub unavailable: &'a str,
}

pub struct SectionLoader<C> {
    descriptors: Vec<SectionDescriptor<C>>,
}

impl<C: 'static> SectionLoader<C> {
    /// Register sections in document order. Names must be unique.
    pub fn new(descriptors: Vec<SectionDescriptor<C>>) -> Result<Self, RegistrationError> {
        let mut seen = HashSet::new();
        for d in &descriptors {
            if !seen.insert(d.name.as_str()) {
                return Err(RegistrationError::DuplicateName(d.name.clone()));
            }
        }
        Ok(Self { descriptors })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Mount the page: load the priority sections and put a pending
    /// placeholder in place of every other one.
    pub async fn mount(&self, ctx: Rc<C>) -> MountedPage<C> {
        let priority_loads = self
            .descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.priority)
            .map(|(i, d)| d.module.load(&ctx).map(move |r| (i, r)));
        let mut loaded: Vec<Option<Result<Markup, LoadError>>> =
            self.descriptors.iter().map(|_| None).collect();
        for (i, result) in join_all(priority_loads).await {
            loaded[i] = Some(result);
        }

        let slots = self
            .descriptors
            .iter()
            .zip(loaded)
            .map(|(d, result)| Slot {
                name: d.name.clone(),
                priority: d.priority,
                module: d.module.clone(),
                state: match result {
                    None => SectionState::Pending,
                    Some(result) => terminal_state(&d.name, result),
                },
                abort: None,
                mounted: true,
            })
            .collect();

        MountedPage {
            ctx,
            slots,
            in_flight: FuturesUnordered::new(),
            scheduled: false,
        }
    }
}

type InFlight = LocalBoxFuture<'static, (usize, Result<Result<Markup, LoadError>, Aborted>)>;

struct Slot<C> {
    name: String,
    priority: bool,
    module: Rc<dyn SectionModule<C>>,
    state: SectionState,
    abort: Option<AbortHandle>,
    mounted: bool,
}

/// A mounted page: one slot per registered section.
pub struct MountedPage<C> {
    ctx: Rc<C>,
    slots: Vec<Slot<C>>,
    in_flight: FuturesUnordered<InFlight>,
    scheduled: bool,
}

impl<C> MountedPage<C> {
    /// Request every deferred section. Each is requested exactly once;
    /// calling this again does nothing.
    pub fn schedule(&mut self) {
        if self.scheduled {
            return;
        }
        self.scheduled = true;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.mounted || slot.state.is_terminal() {
                continue;
            }
            tracing::debug!(section = %slot.name, "requesting deferred section");
            let (handle, registration) = AbortHandle::new_pair();
            let load = Abortable::new(slot.module.load(&self.ctx), registration);
            slot.abort = Some(handle);
            self.in_flight
                .push(load.map(move |r| (index, r)).boxed_local());
        }
    }

    /// Drive outstanding requests until one slot resolves.
    ///
    /// Schedules the deferred sections first if that has not happened yet.
    /// Returns `None` once nothing is left in flight.
    pub async fn next_update(&mut self) -> Option<SlotUpdate> {
        self.schedule();
        while let Some((index, outcome)) = self.in_flight.next().await {
            let Ok(result) = outcome else {
                continue;
            };
            let slot = &mut self.slots[index];
            slot.abort = None;
            if !slot.mounted {
                continue;
            }
            slot.state = terminal_state(&slot.name, result);
            return Some(SlotUpdate {
                index,
                name: slot.name.clone(),
                state: slot.state.clone(),
            });
        }
        None
    }

    /// Drive every outstanding request to completion.
    pub async fn settle(&mut self) {
        while self.next_update().await.is_some() {}
    }

    /// Remove a section from the page. Its pending request is cancelled and
    /// a result that still arrives is ignored. Returns false if no mounted
    /// section has that name.
    pub fn unmount(&mut self, name: &str) -> bool {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.mounted && s.name == name)
        else {
            return false;
        };
        slot.mounted = false;
        if let Some(handle) = slot.abort.take() {
            tracing::debug!(section = %name, "cancelling deferred section");
            handle.abort();
        }
        true
    }

    /// Whether every mounted slot is loaded or failed.
    pub fn is_settled(&self) -> bool {
        self.slots
            .iter()
            .filter(|s| s.mounted)
            .all(|s| s.state.is_terminal())
    }

    /// Mounted slots in registration order.
    pub fn slots(&self) -> impl Iterator<Item = SlotView<'_>> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.mounted)
            .map(|(index, s)| SlotView {
                index,
                name: &s.name,
                priority: s.priority,
                state: &s.state,
            })
    }

    pub fn slot(&self, name: &str) -> Option<SlotView<'_>> {
        self.slots().find(|s| s.name == name)
    }

    /// The page body: every mounted slot in registration order.
    pub fn render(&self, labels: SlotLabels<'_>) -> Markup {
        html! {
            @for slot in self.slots() {
                (render_slot(&slot, labels))
            }
        }
    }
}

fn terminal_state(name: &str, result: Result<Markup, LoadError>) -> SectionState {
    match result {
        Ok(markup) => {
            tracing::debug!(section = %name, "section loaded");
            SectionState::Loaded(markup)
        }
        Err(e) => {
            tracing::warn!(section = %name, error = %e, "section failed to load");
            SectionState::Failed(Rc::new(e))
        }
    }
}

/// Wrap one slot in its container. The container carries the section's
/// anchor id in every state, so in-page links work before it has loaded.
pub fn render_slot(slot: &SlotView<'_>, labels: SlotLabels<'_>) -> Markup {
    html! {
        div.section-slot
            id=(slot.name)
            data-section=(slot.name)
            data-state=(slot.state.as_str())
            aria-busy=[(!slot.state.is_terminal()).then_some("true")] {
            @match slot.state {
                SectionState::Pending => { (render_placeholder(labels.loading)) }
                SectionState::Loaded(markup) => { (markup) }
                SectionState::Failed(_) => { (render_error_boundary(labels.unavailable)) }
            }
        }
    }
}

pub fn render_placeholder(loading: &str) -> Markup {
    html! {
        div.section-placeholder {
            div.spinner aria-hidden="true" {}
            span.visually-hidden { (loading) }
        }
    }
}

pub fn render_error_boundary(unavailable: &str) -> Markup {
    html! {
        div.section-error role="alert" {
            p { (unavailable) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const LABELS: SlotLabels<'static> = SlotLabels {
        loading: "Loading",
        unavailable: "This section could not be loaded.",
    };

    /// Records which modules were requested; modules registered with
    /// `hold` stay pending until the test resolves them.
    #[derive(Default)]
    struct Page {
        requests: RefCell<Vec<String>>,
        held: RefCell<HashMap<String, oneshot::Receiver<Result<Markup, LoadError>>>>,
    }

    impl Page {
        fn hold(&self, name: &str) -> oneshot::Sender<Result<Markup, LoadError>> {
            let (tx, rx) = oneshot::channel();
            self.held.borrow_mut().insert(name.to_string(), rx);
            tx
        }

        fn requested(&self) -> Vec<String> {
            self.requests.borrow().clone()
        }
    }

    fn module(name: &str) -> impl Fn(&Page) -> LoadFuture + 'static {
        let name = name.to_string();
        move |page: &Page| {
            page.requests.borrow_mut().push(name.clone());
            if let Some(rx) = page.held.borrow_mut().remove(&name) {
                return async move {
                    rx.await
                        .unwrap_or_else(|_| Err(LoadError::Module("dropped".into())))
                }
                .boxed_local();
            }
            let markup = html! { section { (name) } };
            async move { Ok(markup) }.boxed_local()
        }
    }

    fn failing(name: &str) -> impl Fn(&Page) -> LoadFuture + 'static {
        let name = name.to_string();
        move |page: &Page| {
            page.requests.borrow_mut().push(name.clone());
            async { Err(LoadError::Module("chunk failed".into())) }.boxed_local()
        }
    }

    /// Nine sections, the first two above the fold.
    fn nine_sections() -> SectionLoader<Page> {
        let descriptors = (1..=9)
            .map(|i| {
                let name = format!("s{i}");
                SectionDescriptor::new(name.clone(), module(&name)).priority(i <= 2)
            })
            .collect();
        SectionLoader::new(descriptors).unwrap()
    }

    fn names(page: &MountedPage<Page>) -> Vec<String> {
        page.slots().map(|s| s.name.to_string()).collect()
    }

    fn states(page: &MountedPage<Page>) -> Vec<&'static str> {
        page.slots().map(|s| s.state.as_str()).collect()
    }

    #[test]
    fn duplicate_names_rejected() {
        let result: Result<SectionLoader<Page>, _> = SectionLoader::new(vec![
            SectionDescriptor::new("about", module("about")),
            SectionDescriptor::new("about", module("about")),
        ]);
        assert!(matches!(result, Err(RegistrationError::DuplicateName(n)) if n == "about"));
    }

    #[test]
    fn empty_loader_mounts_an_empty_page() {
        let loader: SectionLoader<Page> = SectionLoader::new(Vec::new()).unwrap();
        assert!(loader.is_empty());

        let mut page = block_on(loader.mount(Rc::new(Page::default())));
        block_on(page.settle());
        assert!(page.is_settled());
        assert_eq!(page.slots().count(), 0);
    }

    #[test]
    fn mount_loads_only_priority_sections() {
        let ctx = Rc::new(Page::default());
        let loader = nine_sections();
        assert_eq!(loader.len(), 9);
        let page = block_on(loader.mount(ctx.clone()));

        assert_eq!(ctx.requested(), vec!["s1", "s2"]);
        assert_eq!(
            states(&page),
            vec!["loaded", "loaded", "pending", "pending", "pending", "pending", "pending", "pending", "pending"]
        );
        let html = page.render(LABELS).into_string();
        assert_eq!(html.matches("section-placeholder").count(), 7);
        assert!(html.contains("<section>s1</section>"));
    }

    #[test]
    fn deferred_sections_fill_in_after_schedule() {
        let ctx = Rc::new(Page::default());
        let mut page = block_on(nine_sections().mount(ctx.clone()));
        page.schedule();
        assert_eq!(ctx.requested().len(), 9);

        block_on(page.settle());
        assert!(page.is_settled());
        assert!(states(&page).iter().all(|s| *s == "loaded"));
        assert_eq!(names(&page), (1..=9).map(|i| format!("s{i}")).collect::<Vec<_>>());
    }

    #[test]
    fn schedule_is_idempotent() {
        let ctx = Rc::new(Page::default());
        let mut page = block_on(nine_sections().mount(ctx.clone()));
        page.schedule();
        page.schedule();
        block_on(page.settle());
        assert_eq!(ctx.requested().len(), 9);
    }

    #[test]
    fn next_update_schedules_implicitly() {
        let ctx = Rc::new(Page::default());
        let mut page = block_on(nine_sections().mount(ctx.clone()));
        let update = block_on(page.next_update()).unwrap();
        assert!(update.index >= 2);
        assert_eq!(ctx.requested().len(), 9);
    }

    #[test]
    fn out_of_order_resolution_keeps_slot_order() {
        let ctx = Rc::new(Page::default());
        let mut senders: HashMap<String, _> = (3..=9)
            .map(|i| {
                let name = format!("s{i}");
                let tx = ctx.hold(&name);
                (name, tx)
            })
            .collect();
        let loader = SectionLoader::new(
            (1..=9)
                .map(|i| {
                    let name = format!("s{i}");
                    SectionDescriptor::new(name.clone(), module(&name)).priority(i == 1)
                })
                .collect(),
        )
        .unwrap();
        let s2 = ctx.hold("s2");
        let mut page = block_on(loader.mount(ctx.clone()));
        page.schedule();

        let s7 = senders.remove("s7").unwrap();
        s7.send(Ok(html! { "seven" })).unwrap();
        let first = block_on(page.next_update()).unwrap();
        assert_eq!((first.index, first.name.as_str()), (6, "s7"));
        assert_eq!(page.slot("s2").unwrap().state.as_str(), "pending");

        s2.send(Ok(html! { "two" })).unwrap();
        let second = block_on(page.next_update()).unwrap();
        assert_eq!((second.index, second.name.as_str()), (1, "s2"));

        assert_eq!(names(&page), (1..=9).map(|i| format!("s{i}")).collect::<Vec<_>>());
        let html = page.render(LABELS).into_string();
        let two = html.find("two").unwrap();
        let seven = html.find("seven").unwrap();
        assert!(two < seven);
    }

    #[test]
    fn failure_is_isolated_to_its_slot() {
        let ctx = Rc::new(Page::default());
        let loader = SectionLoader::new(vec![
            SectionDescriptor::new("header", module("header")).priority(true),
            SectionDescriptor::new("gallery", failing("gallery")),
            SectionDescriptor::new("contact", module("contact")),
        ])
        .unwrap();
        let mut page = block_on(loader.mount(ctx.clone()));
        block_on(page.settle());

        assert_eq!(states(&page), vec!["loaded", "failed", "loaded"]);
        let html = page.render(LABELS).into_string();
        assert!(html.contains("This section could not be loaded."));
        assert!(html.contains("<section>contact</section>"));
        assert_eq!(ctx.requested(), vec!["header", "gallery", "contact"]);
    }

    #[test]
    fn priority_failure_renders_error_boundary_on_mount() {
        let ctx = Rc::new(Page::default());
        let loader = SectionLoader::new(vec![
            SectionDescriptor::new("hero", failing("hero")).priority(true),
        ])
        .unwrap();
        let page = block_on(loader.mount(ctx));
        assert_eq!(states(&page), vec!["failed"]);
    }

    #[test]
    fn unmount_cancels_pending_request() {
        let ctx = Rc::new(Page::default());
        let gallery = ctx.hold("gallery");
        let loader = SectionLoader::new(vec![
            SectionDescriptor::new("about", module("about")),
            SectionDescriptor::new("gallery", module("gallery")),
        ])
        .unwrap();
        let mut page = block_on(loader.mount(ctx.clone()));
        page.schedule();

        assert!(page.unmount("gallery"));
        assert!(!page.unmount("gallery"));
        // A result that arrives after unmount is ignored.
        let _ = gallery.send(Ok(html! { "late" }));
        block_on(page.settle());

        assert_eq!(names(&page), vec!["about"]);
        assert!(page.is_settled());
        assert!(!page.render(LABELS).into_string().contains("late"));
    }

    #[test]
    fn unmount_before_schedule_skips_request() {
        let ctx = Rc::new(Page::default());
        let mut page = block_on(nine_sections().mount(ctx.clone()));
        page.unmount("s5");
        block_on(page.settle());
        assert!(!ctx.requested().contains(&"s5".to_string()));
        assert_eq!(page.slots().count(), 8);
    }

    #[test]
    fn slot_keeps_anchor_in_every_state() {
        let ctx = Rc::new(Page::default());
        let mut page = block_on(nine_sections().mount(ctx));
        assert!(page.render(LABELS).into_string().contains(r#"id="s5""#));
        block_on(page.settle());
        let html = page.render(LABELS).into_string();
        assert!(html.contains(r#"id="s5""#));
        assert!(!html.contains("aria-busy"));
    }
}
