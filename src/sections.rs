//! Section renderers.
//!
//! One maud template per [`SectionKind`](crate::types::SectionKind). Every
//! renderer receives the [`RenderContext`] of the page being composed, which
//! carries the active locale; nothing here reads global state.
//!
//! Images go through [`lazy_image::render`] in their initial state: the hero
//! image is marked priority in content and ships with its `src`, everything
//! else ships with `data-src` only and is swapped in by `deferred.js` once it
//! nears the viewport.

use crate::content::{
    AboutContent, Card, ContactContent, Dictionary, FooterContent, GalleryContent,
    GovernanceContent, HeaderContent, HeroContent, ImageRef, Offering, ProjectsContent,
    SectionContent, ServicesContent, StatisticsContent, StrategyContent, UiStrings,
};
use crate::lazy_image::{self, ImageDescriptor, ImageLoadState};
use crate::loader::{LoadFuture, LoadError, SectionModule};
use crate::types::Locale;
use futures::future::FutureExt;
use maud::{Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use std::rc::Rc;

/// Everything a section needs to render for one locale.
pub struct RenderContext {
    pub locale: Locale,
    pub default_locale: Locale,
    pub dictionary: Rc<Dictionary>,
    pub strings: UiStrings,
    /// Default `sizes` attribute for content images.
    pub image_sizes: String,
}

impl RenderContext {
    /// Site-absolute URL of the page for `locale`.
    pub fn page_url(&self, locale: Locale) -> String {
        format!("/{}", locale.path_prefix(self.default_locale))
    }
}

/// The module behind one section: looks the record up for the active locale
/// and renders it.
pub struct SectionRenderer {
    key: String,
}

impl SectionRenderer {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl SectionModule<RenderContext> for SectionRenderer {
    fn load(&self, ctx: &RenderContext) -> LoadFuture {
        let result = ctx
            .dictionary
            .lookup(ctx.locale, &self.key)
            .map(|content| render_section(content, ctx))
            .map_err(LoadError::from);
        async move { result }.boxed_local()
    }
}

pub fn render_section(content: &SectionContent, ctx: &RenderContext) -> Markup {
    match content {
        SectionContent::Header(c) => header(c, ctx),
        SectionContent::Hero(c) => hero(c, ctx),
        SectionContent::About(c) => about(c, ctx),
        SectionContent::Services(c) => services(c),
        SectionContent::Projects(c) => projects(c, ctx),
        SectionContent::Statistics(c) => statistics(c),
        SectionContent::Gallery(c) => gallery(c, ctx),
        SectionContent::Strategy(c) => strategy(c),
        SectionContent::Governance(c) => governance(c),
        SectionContent::Contact(c) => contact(c),
        SectionContent::Footer(c) => footer(c),
    }
}

// ============================================================================
// Shared pieces
// ============================================================================

fn markdown(text: &str) -> Markup {
    let parser = Parser::new(text);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    PreEscaped(out)
}

fn image(img: &ImageRef, ctx: &RenderContext) -> Markup {
    let sizes = if img.priority {
        "100vw"
    } else {
        ctx.image_sizes.as_str()
    };
    let descriptor = ImageDescriptor::from_ref(img).with_sizes(sizes);
    lazy_image::render(&descriptor, &ImageLoadState::initial(&descriptor), &ctx.strings)
}

fn section_heading(title: &str, subtitle: &str) -> Markup {
    html! {
        header.section-heading {
            h2 { (title) }
            p.section-subtitle { (subtitle) }
        }
    }
}

fn card(c: &Card) -> Markup {
    html! {
        article.card {
            h3 { (c.title) }
            p { (c.text) }
        }
    }
}

fn offering(o: &Offering) -> Markup {
    html! {
        article.card.card--list {
            h3 { (o.title) }
            p { (o.description) }
            ul.bullets {
                @for feature in &o.features {
                    li { (feature) }
                }
            }
        }
    }
}

fn multiline(text: &str) -> Markup {
    html! {
        @for (i, line) in text.lines().map(str::trim).filter(|l| !l.is_empty()).enumerate() {
            @if i > 0 { br; }
            (line)
        }
    }
}

/// Group digits the way the locale writes them: `60,000` / `60 000`.
pub fn format_number(value: u64, locale: Locale) -> String {
    let sep = match locale {
        Locale::En => ',',
        Locale::Fr => '\u{202f}',
    };
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// Sections
// ============================================================================

fn header(c: &HeaderContent, ctx: &RenderContext) -> Markup {
    let other = ctx.locale.other();
    html! {
        header.site-header {
            div.site-header__inner {
                a.brand href=(ctx.page_url(ctx.locale)) {
                    span.brand__mark aria-hidden="true" { "BM" }
                    span.brand__text {
                        strong { (c.brand) }
                        small { (c.tagline) }
                    }
                }
                details.site-nav {
                    summary { (c.menu_label) }
                    nav {
                        ul {
                            @for link in &c.nav {
                                li { a href={ "#" (link.anchor) } { (link.label) } }
                            }
                        }
                    }
                }
                div.site-header__actions {
                    a.button.button--small href="#contact" { (c.profile_label) }
                    a.lang-toggle
                        href=(ctx.page_url(other))
                        hreflang=(other.code())
                        lang=(other.code())
                        aria-label=(ctx.strings.language_toggle) {
                        (other.code().to_uppercase())
                    }
                }
            }
        }
    }
}

fn hero(c: &HeroContent, ctx: &RenderContext) -> Markup {
    html! {
        section.section.section--hero {
            div.hero__background { (image(&c.image, ctx)) }
            div.hero__content {
                h1 { (c.title) }
                p.hero__subtitle { (c.subtitle) }
                p.hero__description { (c.description) }
                div.hero__actions {
                    a.button href={ "#" (c.primary_cta.anchor) } { (c.primary_cta.label) }
                    a.button.button--outline href={ "#" (c.secondary_cta.anchor) } { (c.secondary_cta.label) }
                }
                a.hero__scroll href={ "#" (c.primary_cta.anchor) } { (c.scroll_hint) }
            }
        }
    }
}

fn about(c: &AboutContent, ctx: &RenderContext) -> Markup {
    html! {
        section.section.section--about {
            (section_heading(&c.title, &c.subtitle))
            div.prose { (markdown(&c.history)) }
            div.grid.grid--2 {
                (card(&c.mission))
                (card(&c.vision))
            }
            h3.subheading { (c.values_title) }
            div.grid.grid--4 {
                @for value in &c.values { (card(value)) }
            }
            @if !c.gallery.is_empty() {
                div.grid.grid--4.image-strip {
                    @for img in &c.gallery {
                        figure.captioned {
                            (image(img, ctx))
                            @if let Some(caption) = &img.caption {
                                figcaption { (caption) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn services(c: &ServicesContent) -> Markup {
    html! {
        section.section.section--services {
            (section_heading(&c.title, &c.subtitle))
            div.grid.grid--2 {
                @for service in &c.services { (offering(service)) }
            }
            div.panel.panel--accent {
                h3 { (c.why_title) }
                div.grid.grid--4 {
                    @for item in &c.why { (card(item)) }
                }
            }
        }
    }
}

fn projects(c: &ProjectsContent, ctx: &RenderContext) -> Markup {
    let max = c.production.iter().map(|t| t.value).max().unwrap_or(0).max(1);
    html! {
        section.section.section--projects {
            (section_heading(&c.title, &c.subtitle))
            div.prose { (markdown(&c.description)) }
            div.grid.grid--2 {
                @for location in &c.locations {
                    article.card.location {
                        h3 { (location.country) }
                        p.location__site { (location.site) }
                        p { (location.description) }
                    }
                }
            }
            div.panel {
                @if !c.minerals.is_empty() {
                    div.minerals {
                        @for mineral in &c.minerals {
                            figure.mineral {
                                (image(mineral, ctx))
                                @if let Some(caption) = &mineral.caption {
                                    figcaption { (caption) }
                                }
                            }
                        }
                    }
                }
                h3 { (c.production_title) }
                table.production {
                    tbody {
                        @for target in &c.production {
                            @let pct = ((target.value as f64 / max as f64) * 100.0).round().max(2.0);
                            tr {
                                th scope="row" { (target.mineral) }
                                td.production__bar {
                                    span style={ "--bar: " (pct) "%" } {}
                                }
                                td.production__value {
                                    (format_number(target.value, ctx.locale)) " " (target.unit)
                                }
                            }
                        }
                    }
                }
            }
            div.grid.grid--3 {
                @for highlight in &c.highlights { (card(highlight)) }
            }
        }
    }
}

fn statistics(c: &StatisticsContent) -> Markup {
    html! {
        section.section.section--statistics {
            (section_heading(&c.title, &c.subtitle))
            div.grid.grid--3 {
                @for stat in &c.stats {
                    article.card.stat {
                        p.stat__value { (stat.value) }
                        h3 { (stat.label) }
                        p { (stat.description) }
                    }
                }
            }
            div.banner {
                h3 { (c.banner.title) }
                p { (c.banner.text) }
            }
        }
    }
}

fn gallery(c: &GalleryContent, ctx: &RenderContext) -> Markup {
    html! {
        section.section.section--gallery {
            (section_heading(&c.title, &c.subtitle))
            p.section-lead { (c.description) }
            div.gallery-filters role="group" {
                @for (i, category) in c.categories.iter().enumerate() {
                    button.filter
                        type="button"
                        data-filter=(category.filter)
                        aria-pressed=(if i == 0 { "true" } else { "false" }) {
                        (category.label)
                    }
                }
            }
            div.grid.grid--3.gallery-grid {
                @for item in &c.items {
                    figure.gallery-item data-category=(item.category) {
                        (image(&item.image, ctx))
                        figcaption {
                            strong { (item.title) }
                            span { (item.description) }
                        }
                    }
                }
            }
        }
    }
}

fn strategy(c: &StrategyContent) -> Markup {
    html! {
        section.section.section--strategy {
            (section_heading(&c.title, &c.subtitle))
            p.section-lead { (c.description) }
            ol.timeline {
                @for horizon in &c.horizons {
                    li.card.card--list {
                        p.timeline__period { (horizon.period) }
                        h3 { (horizon.title) }
                        ul.bullets {
                            @for goal in &horizon.goals { li { (goal) } }
                        }
                    }
                }
            }
            h3.subheading { (c.focus_title) }
            div.grid.grid--4 {
                @for area in &c.focus { (card(area)) }
            }
        }
    }
}

fn governance(c: &GovernanceContent) -> Markup {
    html! {
        section.section.section--governance {
            (section_heading(&c.title, &c.subtitle))
            p.section-lead { (c.description) }
            div.grid.grid--2 {
                @for principle in &c.principles { (offering(principle)) }
            }
            div.panel {
                h3 { (c.policies_title) }
                ul.policies {
                    @for policy in &c.policies {
                        li.policy.policy--attention[policy.attention] {
                            span.policy__title { (policy.title) }
                            span.policy__status { (policy.status) }
                        }
                    }
                }
            }
        }
    }
}

fn contact(c: &ContactContent) -> Markup {
    let f = &c.form;
    html! {
        section.section.section--contact {
            (section_heading(&c.title, &c.subtitle))
            p.section-lead { (c.description) }
            div.grid.grid--2 {
                form.contact-form method="post" action="#" {
                    label {
                        span { (f.name) }
                        input type="text" name="name" required placeholder=(f.name_placeholder);
                    }
                    label {
                        span { (f.email) }
                        input type="email" name="email" required placeholder=(f.email_placeholder);
                    }
                    label {
                        span { (f.subject) }
                        input type="text" name="subject" required placeholder=(f.subject_placeholder);
                    }
                    label {
                        span { (f.message) }
                        textarea name="message" rows="5" required placeholder=(f.message_placeholder) {}
                    }
                    button.button type="submit" { (f.send) }
                }
                div.offices {
                    @for office in &c.offices {
                        article.card.office {
                            h3 { (office.title) }
                            address { (multiline(&office.address)) }
                            p { (office.phone) }
                            p { a href={ "mailto:" (office.email) } { (office.email) } }
                        }
                    }
                }
            }
            h3.subheading { (c.contacts_title) }
            div.grid.grid--4 {
                @for person in &c.contacts {
                    article.card.person {
                        h4 { (person.role) }
                        p.person__department { (person.department) }
                        p { a href={ "tel:" (person.phone.replace(['-', ' '], "")) } { (person.phone) } }
                    }
                }
            }
        }
    }
}

fn footer(c: &FooterContent) -> Markup {
    html! {
        footer.site-footer {
            div.grid.grid--4 {
                div {
                    p.site-footer__name { (c.name) }
                    p.site-footer__tagline { (c.tagline) }
                    p { (c.description) }
                }
                nav {
                    h4 { (c.links_title) }
                    ul {
                        @for link in &c.links {
                            li { a href={ "#" (link.anchor) } { (link.label) } }
                        }
                    }
                }
                div {
                    h4 { (c.services_title) }
                    ul {
                        @for service in &c.services { li { (service) } }
                    }
                }
                div {
                    h4 { (c.contact_title) }
                    @for line in &c.contact_lines { p { (line) } }
                    p { a href={ "mailto:" (c.email) } { (c.email) } }
                    p { (c.website) }
                }
            }
            div.site-footer__legal {
                p { "© " (c.copyright) }
                ul {
                    @for item in &c.legal { li { (item) } }
                }
            }
        }
    }
}
