//! Keyword and structure heuristics for pages that neither declare nor configure slots.
//!
//! Every candidate gets a [`CandidateRank`]:
//! 1. [`CandidateRank::Text`]: visible text (or a button `value`) names the role
//! 2. [`CandidateRank::Structure`]: id, class, `type` or `href` implies the role
//!
//! Rules, applied in order on every page type; an element joins at most one slot:
//! - `form_next` / `form_submit`: buttons inside a `form`, by text, then by `type`
//! - `nav_cta`: the best `a`/`button` inside `nav` or `header`
//! - `lead_anchor`: in-page links to a lead form (`#lead`, `#form`, ...)
//! - `homepage_buttons` (home and blog pages): remaining CTA candidates by rank, then
//!   document order, capped at [`MAX_HOMEPAGE_BUTTONS`]
//! - `blog_end_cta` (blog pages): the first CTA-like element in the article container

use super::{DiscoveryStrategy, is_excluded, tag_slot};
use crate::page_context::PageType;
use crate::slot::{SlotKey, SlotMap, insert_unique};
use page_dom::{Document, NodeId};

pub const MAX_HOMEPAGE_BUTTONS: usize = 5;

const TEXT_KEYWORDS: [&str; 8] = [
    "start",
    "eligibility",
    "check",
    "free",
    "qualify",
    "options",
    "assessment",
    "review",
];

const CLASS_HINTS: [&str; 5] = ["cta", "start", "eligib", "hero", "button"];

const NAV_KEYWORDS: [&str; 6] = ["apply", "get started", "start", "check", "free", "quote"];

const NEXT_KEYWORDS: [&str; 3] = ["next", "continue", "proceed"];

const SUBMIT_KEYWORDS: [&str; 5] = ["submit", "finish", "see my results", "get my", "send"];

const LEAD_ANCHOR_HREFS: [&str; 5] = ["#lead", "#form", "#apply", "#get-started", "#eligibility"];

const FORM_CONTROLS: &str = "button, input[type='submit'], input[type='button']";

const ARTICLE_CONTAINERS: [&str; 11] = [
    "article",
    "[class*='blog']",
    "[id*='blog']",
    "[class*='post']",
    "[id*='post']",
    "[class*='content']",
    "[id*='content']",
    "[class*='article-body']",
    "[id*='article-body']",
    "[class*='article']",
    "[id*='article']",
];

const END_CTA_SELECTOR: &str = "[class*='cta'], [id*='cta'], [class*='next-step'], [id*='next-step'], \
     [class*='eligibility'], [id*='eligibility'], [class*='start'], [id*='start']";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CandidateRank {
    Text,
    Structure,
}

/// Rank an element as a call-to-action candidate, `None` when it is not one.
pub fn rank_cta_candidate(doc: &Document, node: NodeId) -> Option<CandidateRank> {
    if !matches!(doc.tag_name(node), Some("a" | "button")) {
        return None;
    }
    let text = doc.text_content(node).to_lowercase();
    if TEXT_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        return Some(CandidateRank::Text);
    }
    let names = id_class(doc, node);
    CLASS_HINTS
        .iter()
        .any(|hint| names.contains(hint))
        .then_some(CandidateRank::Structure)
}

fn id_class(doc: &Document, node: NodeId) -> String {
    format!(
        "{} {}",
        doc.attr(node, "id").unwrap_or_default(),
        doc.attr(node, "class").unwrap_or_default()
    )
    .to_lowercase()
}

fn visible_label(doc: &Document, node: NodeId) -> String {
    if doc.tag_name(node) == Some("input") {
        return doc.attr(node, "value").unwrap_or_default().to_lowercase();
    }
    doc.text_content(node).to_lowercase()
}

/// Classify a button inside a form as `form_next` or `form_submit`.
pub fn rank_form_control(doc: &Document, node: NodeId) -> Option<(SlotKey, CandidateRank)> {
    doc.closest(node, "form")?;
    let label = visible_label(doc, node);
    if NEXT_KEYWORDS.iter().any(|keyword| label.contains(keyword)) {
        return Some((SlotKey::FormNext, CandidateRank::Text));
    }
    if SUBMIT_KEYWORDS.iter().any(|keyword| label.contains(keyword)) {
        return Some((SlotKey::FormSubmit, CandidateRank::Text));
    }
    // a <button> without a type submits its form
    let default_type = if doc.tag_name(node) == Some("button") { "submit" } else { "" };
    let kind = doc
        .attr(node, "type")
        .map_or_else(|| default_type.to_owned(), |kind| kind.trim().to_ascii_lowercase());
    match kind.as_str() {
        "submit" => Some((SlotKey::FormSubmit, CandidateRank::Structure)),
        "button" => Some((SlotKey::FormNext, CandidateRank::Structure)),
        _ => None,
    }
}

/// Rank a link or button inside site navigation as the nav CTA.
pub fn rank_nav_candidate(doc: &Document, node: NodeId) -> Option<CandidateRank> {
    if !matches!(doc.tag_name(node), Some("a" | "button")) {
        return None;
    }
    doc.closest(node, "nav, header")?;
    let text = doc.text_content(node).to_lowercase();
    if NAV_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        return Some(CandidateRank::Text);
    }
    let names = id_class(doc, node);
    CLASS_HINTS
        .iter()
        .any(|hint| names.contains(hint))
        .then_some(CandidateRank::Structure)
}

/// Rank an in-page link to the lead form.
pub fn rank_lead_anchor(doc: &Document, node: NodeId) -> Option<CandidateRank> {
    if doc.tag_name(node) != Some("a") {
        return None;
    }
    let href = doc.attr(node, "href")?.trim().to_ascii_lowercase();
    if !LEAD_ANCHOR_HREFS.iter().any(|prefix| href.starts_with(prefix)) {
        return None;
    }
    let text = doc.text_content(node).to_lowercase();
    if TEXT_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        Some(CandidateRank::Text)
    } else {
        Some(CandidateRank::Structure)
    }
}

/// Best ranked candidate; ties go to document order.
fn best(candidates: impl Iterator<Item = (CandidateRank, NodeId)>) -> Option<NodeId> {
    candidates.min_by_key(|(rank, _)| *rank).map(|(_, node)| node)
}

fn claim(doc: &mut Document, found: &mut SlotMap, slot: SlotKey, node: NodeId) {
    tag_slot(doc, node, slot);
    insert_unique(found, slot, node);
}

fn claimed(found: &SlotMap) -> Vec<NodeId> {
    found.values().flatten().copied().collect()
}

fn find_article_container(doc: &Document, scope: NodeId) -> Option<NodeId> {
    ARTICLE_CONTAINERS
        .iter()
        .find_map(|selector| doc.select_inclusive(scope, selector).into_iter().next())
}

pub struct HeuristicDiscovery {
    page_type: PageType,
}

impl HeuristicDiscovery {
    pub fn new(page_type: PageType) -> Self {
        Self { page_type }
    }

    fn form_controls(doc: &Document, scope: NodeId) -> Vec<(SlotKey, CandidateRank, NodeId)> {
        doc.select_inclusive(scope, FORM_CONTROLS)
            .into_iter()
            .filter(|node| !is_excluded(doc, *node))
            .filter_map(|node| rank_form_control(doc, node).map(|(slot, rank)| (slot, rank, node)))
            .collect()
    }

    fn nav_cta(doc: &Document, scope: NodeId, claimed: &[NodeId]) -> Option<NodeId> {
        best(
            doc.select_inclusive(scope, "a, button")
                .into_iter()
                .filter(|node| !claimed.contains(node) && !is_excluded(doc, *node))
                .filter_map(|node| rank_nav_candidate(doc, node).map(|rank| (rank, node))),
        )
    }

    fn lead_anchor(doc: &Document, scope: NodeId, claimed: &[NodeId]) -> Option<NodeId> {
        best(
            doc.select_inclusive(scope, "a[href]")
                .into_iter()
                .filter(|node| !claimed.contains(node))
                .filter_map(|node| rank_lead_anchor(doc, node).map(|rank| (rank, node))),
        )
    }

    fn homepage_buttons(doc: &Document, scope: NodeId, claimed: &[NodeId]) -> Vec<NodeId> {
        let mut ranked: Vec<(CandidateRank, NodeId)> = doc
            .select_inclusive(scope, "a, button")
            .into_iter()
            .filter(|node| !claimed.contains(node) && !is_excluded(doc, *node))
            .filter(|node| doc.closest(*node, "form").is_none())
            .filter_map(|node| rank_cta_candidate(doc, node).map(|rank| (rank, node)))
            .collect();
        // stable: document order within a rank
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked
            .into_iter()
            .take(MAX_HOMEPAGE_BUTTONS)
            .map(|(_, node)| node)
            .collect()
    }

    fn blog_end_cta(doc: &Document, scope: NodeId, claimed: &[NodeId]) -> Option<NodeId> {
        let container = find_article_container(doc, scope)?;
        doc.query_selector_all(container, END_CTA_SELECTOR)
            .into_iter()
            .find(|node| !claimed.contains(node) && !is_excluded(doc, *node))
    }
}

impl DiscoveryStrategy for HeuristicDiscovery {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn discover(&self, doc: &mut Document, scope: NodeId) -> SlotMap {
        let mut found = SlotMap::new();
        let controls = Self::form_controls(doc, scope);
        for slot in [SlotKey::FormNext, SlotKey::FormSubmit] {
            let candidates = controls
                .iter()
                .filter(|(kind, _, _)| *kind == slot)
                .map(|(_, rank, node)| (*rank, *node));
            if let Some(node) = best(candidates) {
                claim(doc, &mut found, slot, node);
            }
        }
        if let Some(node) = Self::nav_cta(doc, scope, &claimed(&found)) {
            claim(doc, &mut found, SlotKey::NavCta, node);
        }
        if let Some(node) = Self::lead_anchor(doc, scope, &claimed(&found)) {
            claim(doc, &mut found, SlotKey::LeadAnchor, node);
        }
        if matches!(self.page_type, PageType::Home | PageType::Blog) {
            for node in Self::homepage_buttons(doc, scope, &claimed(&found)) {
                claim(doc, &mut found, SlotKey::HomepageButtons, node);
            }
        }
        if self.page_type == PageType::Blog
            && let Some(node) = Self::blog_end_cta(doc, scope, &claimed(&found))
        {
            claim(doc, &mut found, SlotKey::BlogEndCta, node);
        }
        found
    }
}
