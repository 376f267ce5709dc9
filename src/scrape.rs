//! Setups-page classification: turn one rendered page snapshot into the
//! ordered set of downloadable *active* listings.
//!
//! The page carries three kinds of sections — active, inactive, and paid
//! bundles — distinguished by marker text in their headings, not by
//! position, since the site interleaves them freely. Paid-bundle headings
//! are styled like active ones, so the paid marker is checked first.
//!
//! All selectors and markers live in [`ScrapeRules`]: they are the parts
//! that break when the site ships a redesign.

use crate::error::ScrapeError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Classification of one entry on the setups page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Active,
    Inactive,
    PaidBundle,
}

/// One downloadable setup package, as seen on the setups page.
///
/// Immutable once produced; the status is never re-evaluated within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupListing {
    pub package_name: String,
    pub car_name: String,
    pub track_name: String,
    pub download_url: String,
    pub status: ListingStatus,
}

/// How entries are associated with their section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionBinding {
    /// An entry belongs to the nearest section heading before it in
    /// document order. Tolerant of container markup changes.
    PrecedingHeading,
    /// Entries are the anchors inside the element immediately following
    /// each heading — the site's current exact shape.
    SiblingContainer,
}

/// Selectors and marker texts that locate sections and entries.
#[derive(Debug, Clone)]
pub struct ScrapeRules {
    pub heading_selector: String,
    pub entry_selector: String,
    /// Optional per-entry field selectors; text-line order is the fallback.
    pub name_selector: String,
    pub car_selector: String,
    pub track_selector: String,
    pub active_marker: String,
    pub inactive_marker: String,
    pub paid_marker: String,
    pub binding: SectionBinding,
}

impl Default for ScrapeRules {
    fn default() -> Self {
        Self {
            heading_selector: "div.text-2xl".into(),
            entry_selector: "a[href]".into(),
            name_selector: ".setup-name".into(),
            car_selector: ".setup-car".into(),
            track_selector: ".setup-track".into(),
            active_marker: "(Active)".into(),
            inactive_marker: "(Inactive)".into(),
            paid_marker: "HYMO iRacing Bundles".into(),
            binding: SectionBinding::PrecedingHeading,
        }
    }
}

/// Extract the active listings from a rendered setups-page snapshot.
///
/// Inactive and paid-bundle entries are dropped, as are entries without a
/// usable download URL — filtering, not an error. Output preserves document order,
/// including same-name ties. If no section heading is recognized at all,
/// the page layout has changed and [`ScrapeError::StructureUnrecognized`]
/// is returned.
pub fn extract_active_listings(
    html: &str,
    page_url: &str,
    rules: &ScrapeRules,
) -> Result<Vec<SetupListing>, ScrapeError> {
    let heading_sel = parse_selector(&rules.heading_selector)?;
    let entry_sel = parse_selector(&rules.entry_selector)?;
    let name_sel = parse_selector(&rules.name_selector)?;
    let car_sel = parse_selector(&rules.car_selector)?;
    let track_sel = parse_selector(&rules.track_selector)?;

    let base = Url::parse(page_url).ok();
    let doc = Html::parse_document(html);

    let mut sections_seen = 0usize;
    let mut listings = Vec::new();

    match rules.binding {
        SectionBinding::PrecedingHeading => {
            let mut current: Option<ListingStatus> = None;
            for node in doc.root_element().descendants() {
                let Some(el) = ElementRef::wrap(node) else {
                    continue;
                };
                if heading_sel.matches(&el) {
                    if let Some(status) = classify_heading(&element_text(&el), rules) {
                        current = Some(status);
                        sections_seen += 1;
                    }
                    continue;
                }
                if current == Some(ListingStatus::Active) && entry_sel.matches(&el) {
                    if let Some(listing) =
                        extract_entry(&el, base.as_ref(), &name_sel, &car_sel, &track_sel)
                    {
                        listings.push(listing);
                    }
                }
            }
        }
        SectionBinding::SiblingContainer => {
            for heading in doc.select(&heading_sel) {
                let Some(status) = classify_heading(&element_text(&heading), rules) else {
                    continue;
                };
                sections_seen += 1;
                if status != ListingStatus::Active {
                    continue;
                }
                let Some(container) = heading.next_siblings().filter_map(ElementRef::wrap).next()
                else {
                    continue;
                };
                for el in container.select(&entry_sel) {
                    if let Some(listing) =
                        extract_entry(&el, base.as_ref(), &name_sel, &car_sel, &track_sel)
                    {
                        listings.push(listing);
                    }
                }
            }
        }
    }

    if sections_seen == 0 {
        return Err(ScrapeError::StructureUnrecognized {
            heading_selector: rules.heading_selector.clone(),
        });
    }

    Ok(listings)
}

fn parse_selector(raw: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(raw).map_err(|_| ScrapeError::Selector(raw.to_string()))
}

/// Classify a section heading by its marker text. Paid wins over active
/// because the site renders paid-bundle headings with the active styling.
fn classify_heading(text: &str, rules: &ScrapeRules) -> Option<ListingStatus> {
    if text.contains(&rules.paid_marker) {
        Some(ListingStatus::PaidBundle)
    } else if text.contains(&rules.inactive_marker) {
        Some(ListingStatus::Inactive)
    } else if text.contains(&rules.active_marker) {
        Some(ListingStatus::Active)
    } else {
        None
    }
}

fn extract_entry(
    el: &ElementRef,
    base: Option<&Url>,
    name_sel: &Selector,
    car_sel: &Selector,
    track_sel: &Selector,
) -> Option<SetupListing> {
    let href = entry_href(el)?;
    let download_url = resolve_url(&href, base)?;

    let chunks = text_chunks(el);
    let package_name = select_text(el, name_sel)
        .or_else(|| chunks.first().cloned())
        .or_else(|| url_tail(&download_url))
        .unwrap_or_default();
    let car_name = select_text(el, car_sel)
        .or_else(|| chunks.get(1).cloned())
        .unwrap_or_default();
    let track_name = select_text(el, track_sel)
        .or_else(|| chunks.get(2).cloned())
        .unwrap_or_default();

    Some(SetupListing {
        package_name,
        car_name,
        track_name,
        download_url,
        status: ListingStatus::Active,
    })
}

/// The entry's download href: the element's own when it is an anchor,
/// otherwise the first descendant anchor's. Placeholder hrefs count as
/// missing — entries without a real URL are dropped, not errors.
fn entry_href(el: &ElementRef) -> Option<String> {
    let own = el.value().attr("href").map(str::to_string);
    let href = own.or_else(|| {
        let a_sel = Selector::parse("a[href]").expect("static selector");
        el.select(&a_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
    })?;

    let trimmed = href.trim();
    if trimmed.is_empty() || trimmed == "#" || trimmed.starts_with("javascript:") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_url(href: &str, base: Option<&Url>) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

/// Collect all visible text content from an element, trimmed and
/// whitespace-collapsed.
fn element_text(el: &ElementRef) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty trimmed text nodes of an element, in document order.
fn text_chunks(el: &ElementRef) -> Vec<String> {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn select_text(el: &ElementRef, sel: &Selector) -> Option<String> {
    el.select(sel).next().map(|e| {
        e.text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    })
    .filter(|t| !t.is_empty())
}

fn url_tail(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
