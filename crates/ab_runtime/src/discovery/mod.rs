//! Slot discovery.
//!
//! Strategies share one contract and run in a fixed order; the first one that finds
//! anything wins:
//! 1. [`AttributeDiscovery`]: elements carrying `data-ab-slot`
//! 2. [`SelectorDiscovery`]: the configured selector catalog
//! 3. [`HeuristicDiscovery`]: ranked text and structure heuristics, full passes only

mod attribute;
mod heuristic;
mod selector;

pub use attribute::AttributeDiscovery;
pub use heuristic::{
    CandidateRank, HeuristicDiscovery, MAX_HOMEPAGE_BUTTONS, rank_cta_candidate, rank_form_control,
    rank_lead_anchor, rank_nav_candidate,
};
pub use selector::SelectorDiscovery;

use crate::page_context::PageType;
use crate::settings::RuntimeSettings;
use crate::slot::{SLOT_ATTR, SlotKey, SlotMap};
use page_dom::{Document, NodeId};

/// One way of locating slot elements inside `scope` (inclusive).
pub trait DiscoveryStrategy {
    fn name(&self) -> &'static str;

    fn discover(&self, doc: &mut Document, scope: NodeId) -> SlotMap;
}

/// Elements whose link target is a phone number never join a slot.
pub fn is_excluded(doc: &Document, node: NodeId) -> bool {
    let is_tel = |id: NodeId| {
        doc.attr(id, "href")
            .is_some_and(|href| href.trim().to_ascii_lowercase().starts_with("tel:"))
    };
    is_tel(node) || doc.closest(node, "a[href]").is_some_and(is_tel)
}

/// Mark a discovered element with its canonical slot so later passes find it by attribute.
pub(crate) fn tag_slot(doc: &mut Document, node: NodeId, slot: SlotKey) {
    if doc.attr(node, SLOT_ATTR) != Some(slot.as_str()) {
        doc.set_attr(node, SLOT_ATTR, slot.as_str());
    }
}

/// Ordered strategies selected by first non-empty result.
pub struct DiscoveryPipeline {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl DiscoveryPipeline {
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// Attribute, selector and heuristic tiers for the initial page pass.
    pub fn full(settings: &RuntimeSettings, page_type: PageType) -> Self {
        Self::new(vec![
            Box::new(AttributeDiscovery::new(settings.aliases.clone())),
            Box::new(SelectorDiscovery::new(settings.selectors.clone())),
            Box::new(HeuristicDiscovery::new(page_type)),
        ])
    }

    /// Attribute and selector tiers for inserted subtrees.
    pub fn scoped(settings: &RuntimeSettings) -> Self {
        Self::new(vec![
            Box::new(AttributeDiscovery::new(settings.aliases.clone())),
            Box::new(SelectorDiscovery::new(settings.selectors.clone())),
        ])
    }

    pub fn discover(&self, doc: &mut Document, scope: NodeId) -> SlotMap {
        for strategy in &self.strategies {
            let found = strategy.discover(doc, scope);
            if found.values().any(|nodes| !nodes.is_empty()) {
                log::debug!(
                    "slot discovery: {} found {} slot(s)",
                    strategy.name(),
                    found.len()
                );
                return found;
            }
        }
        SlotMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_links_and_their_contents_are_excluded() {
        let doc = Document::parse(
            r#"<body><a id="call" href=" TEL:+18005550100"><span id="inner">Call</span></a><a id="go" href="/go">Go</a></body>"#,
        );
        let id = |name: &str| doc.get_element_by_id(name).expect("fixture element");
        assert!(is_excluded(&doc, id("call")));
        assert!(is_excluded(&doc, id("inner")));
        assert!(!is_excluded(&doc, id("go")));
    }

    #[test]
    fn first_non_empty_tier_wins() {
        let mut doc = Document::parse(
            r#"<body><h1 data-ab-slot="headline">Hi</h1><a class="btn-primary" href="/start">Start</a></body>"#,
        );
        let settings = RuntimeSettings::default();
        let pipeline = DiscoveryPipeline::full(&settings, PageType::Home);
        let body = doc.body();
        let found = pipeline.discover(&mut doc, body);
        assert_eq!(found.keys().copied().collect::<Vec<_>>(), vec![SlotKey::HeroHeadline]);
    }

    #[test]
    fn info_page_without_catalog_falls_back_to_role_heuristics() {
        let mut doc = Document::parse(
            r#"<body><nav><a id="apply" href="/apply">Apply now</a></nav>
            <form><input name="zip"><button id="next" type="button">Next</button>
            <button id="submit" type="submit">Submit</button></form></body>"#,
        );
        let mut settings = RuntimeSettings::default();
        settings.selectors.clear();
        let body = doc.body();
        let found = DiscoveryPipeline::full(&settings, PageType::Info).discover(&mut doc, body);
        let id = |name: &str| doc.get_element_by_id(name).expect("fixture element");
        assert_eq!(found.get(&SlotKey::NavCta), Some(&vec![id("apply")]));
        assert_eq!(found.get(&SlotKey::FormNext), Some(&vec![id("next")]));
        assert_eq!(found.get(&SlotKey::FormSubmit), Some(&vec![id("submit")]));
    }

    #[test]
    fn scoped_pipeline_never_guesses() {
        let mut doc = Document::parse(r#"<body><div><a href="/x">Check eligibility</a></div></body>"#);
        let settings = RuntimeSettings::default();
        let body = doc.body();
        assert!(DiscoveryPipeline::scoped(&settings).discover(&mut doc, body).is_empty());
        let full = DiscoveryPipeline::full(&settings, PageType::Home).discover(&mut doc, body);
        assert_eq!(full.get(&SlotKey::HomepageButtons).map(Vec::len), Some(1));
    }
}
