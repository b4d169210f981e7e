//! Canonical slot names, alias resolution and the slot to elements index.

use core::fmt;
use page_dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute naming the slot an element belongs to.
pub const SLOT_ATTR: &str = "data-ab-slot";

/// A canonical experiment slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    HeroHeadline,
    NavCta,
    HomepageButtons,
    BlogMidSegue,
    BlogEndCta,
    FormNext,
    FormSubmit,
    LeadAnchor,
}

impl SlotKey {
    pub const ALL: [Self; 8] = [
        Self::HeroHeadline,
        Self::NavCta,
        Self::HomepageButtons,
        Self::BlogMidSegue,
        Self::BlogEndCta,
        Self::FormNext,
        Self::FormSubmit,
        Self::LeadAnchor,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HeroHeadline => "hero_headline",
            Self::NavCta => "nav_cta",
            Self::HomepageButtons => "homepage_buttons",
            Self::BlogMidSegue => "blog_mid_segue",
            Self::BlogEndCta => "blog_end_cta",
            Self::FormNext => "form_next",
            Self::FormSubmit => "form_submit",
            Self::LeadAnchor => "lead_anchor",
        }
    }

    /// Key of this slot's label in the config blob.
    pub const fn label_key(self) -> &'static str {
        match self {
            Self::HeroHeadline => "heroHeadlineText",
            Self::NavCta => "navCtaLabel",
            Self::HomepageButtons => "primaryCtaLabel",
            Self::BlogMidSegue => "blogSegueText",
            Self::BlogEndCta => "blogCtaText",
            Self::FormNext => "formNextLabel",
            Self::FormSubmit => "formSubmitLabel",
            Self::LeadAnchor => "leadAnchorLabel",
        }
    }

    /// Exposure of these slots is recorded per variant rather than per slot.
    pub const fn is_variant_scoped(self) -> bool {
        matches!(self, Self::HomepageButtons)
    }

    /// Slots that occur once per page; selector discovery keeps only the first match.
    pub const fn is_single(self) -> bool {
        !matches!(self, Self::HomepageButtons)
    }

    /// Exact canonical name lookup.
    pub fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == name)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Normalize a stated slot name and map it onto a canonical slot.
/// Names are trimmed, lowercased and `-` becomes `_` before lookup.
pub fn canonicalize(name: &str, aliases: &BTreeMap<String, SlotKey>) -> Option<SlotKey> {
    let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
    if normalized.is_empty() {
        return None;
    }
    SlotKey::from_canonical(&normalized).or_else(|| aliases.get(&normalized).copied())
}

/// Slot to elements, ordered by slot with elements in discovery order.
pub type SlotMap = BTreeMap<SlotKey, Vec<NodeId>>;

/// Push `node` into `slot` unless it is already there.
pub fn insert_unique(map: &mut SlotMap, slot: SlotKey, node: NodeId) -> bool {
    let elements = map.entry(slot).or_default();
    if elements.contains(&node) {
        return false;
    }
    elements.push(node);
    true
}

/// Per-slot state kept for the page life.
#[derive(Clone, Debug, Default)]
pub struct SlotState {
    pub elements: Vec<NodeId>,
}

/// The page's slot index. Elements never appear twice in one slot; entries whose
/// node left the document are stale and skipped.
#[derive(Debug, Default)]
pub struct SlotIndex {
    slots: BTreeMap<SlotKey, SlotState>,
}

impl SlotIndex {
    /// Merge freshly discovered elements. Returns every slot present in `found`.
    pub fn merge(&mut self, found: &SlotMap) -> Vec<SlotKey> {
        let mut touched = Vec::new();
        for (slot, nodes) in found {
            if nodes.is_empty() {
                continue;
            }
            let state = self.slots.entry(*slot).or_default();
            for node in nodes {
                if !state.elements.contains(node) {
                    state.elements.push(*node);
                }
            }
            touched.push(*slot);
        }
        touched
    }

    pub fn slots(&self) -> Vec<SlotKey> {
        self.slots.keys().copied().collect()
    }

    pub fn elements(&self, slot: SlotKey) -> &[NodeId] {
        self.slots
            .get(&slot)
            .map_or(&[], |state| state.elements.as_slice())
    }

    /// Elements of `slot` that are still connected to `doc`.
    pub fn live_elements(&self, slot: SlotKey, doc: &Document) -> Vec<NodeId> {
        self.elements(slot)
            .iter()
            .copied()
            .filter(|node| doc.is_connected(*node))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RuntimeSettings;

    #[test]
    fn aliases_and_spelling_variants_canonicalize() {
        let aliases = RuntimeSettings::default().aliases;
        assert_eq!(canonicalize("primary_cta", &aliases), Some(SlotKey::HomepageButtons));
        assert_eq!(canonicalize(" Hero-Headline ", &aliases), Some(SlotKey::HeroHeadline));
        assert_eq!(canonicalize("form_submit", &aliases), Some(SlotKey::FormSubmit));
        assert_eq!(canonicalize("sidebar_widget", &aliases), None);
        assert_eq!(canonicalize("", &aliases), None);
    }

    #[test]
    fn index_merge_never_duplicates_and_skips_detached() {
        let mut doc = Document::parse("<body><a id=a>A</a><a id=b>B</a></body>");
        let (Some(first), Some(second)) = (doc.get_element_by_id("a"), doc.get_element_by_id("b"))
        else {
            panic!("fixture elements missing");
        };
        let mut index = SlotIndex::default();
        let mut found = SlotMap::new();
        insert_unique(&mut found, SlotKey::HomepageButtons, first);
        assert!(!insert_unique(&mut found, SlotKey::HomepageButtons, first));
        assert_eq!(index.merge(&found), vec![SlotKey::HomepageButtons]);

        insert_unique(&mut found, SlotKey::HomepageButtons, second);
        index.merge(&found);
        assert_eq!(index.elements(SlotKey::HomepageButtons), &[first, second]);

        doc.remove(first);
        assert_eq!(index.live_elements(SlotKey::HomepageButtons, &doc), vec![second]);
    }
}
