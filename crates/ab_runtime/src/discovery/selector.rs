use super::{DiscoveryStrategy, is_excluded, tag_slot};
use crate::slot::{SLOT_ATTR, SlotKey, SlotMap, insert_unique};
use page_dom::{Document, NodeId};
use std::collections::BTreeMap;

/// Matches the selector catalog and tags every hit with `data-ab-slot`.
/// Single-occurrence slots keep only the first match of each selector.
pub struct SelectorDiscovery {
    catalog: BTreeMap<SlotKey, Vec<String>>,
}

impl SelectorDiscovery {
    pub fn new(catalog: BTreeMap<SlotKey, Vec<String>>) -> Self {
        Self { catalog }
    }
}

impl DiscoveryStrategy for SelectorDiscovery {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn discover(&self, doc: &mut Document, scope: NodeId) -> SlotMap {
        let mut found = SlotMap::new();
        for (slot, selectors) in &self.catalog {
            for selector in selectors {
                let matches: Vec<NodeId> = doc
                    .select_inclusive(scope, selector)
                    .into_iter()
                    .filter(|node| !is_excluded(doc, *node))
                    // an element already claimed by another slot keeps its slot
                    .filter(|node| {
                        doc.attr(*node, SLOT_ATTR)
                            .is_none_or(|stated| stated == slot.as_str())
                    })
                    .collect();
                let keep = if slot.is_single() { 1 } else { matches.len() };
                let picked: Vec<NodeId> = matches.into_iter().take(keep).collect();
                for node in picked {
                    tag_slot(doc, node, *slot);
                    insert_unique(&mut found, *slot, node);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(SlotKey, &[&str])]) -> BTreeMap<SlotKey, Vec<String>> {
        entries
            .iter()
            .map(|(slot, selectors)| (*slot, selectors.iter().map(|s| (*s).to_owned()).collect()))
            .collect()
    }

    #[test]
    fn multi_slots_take_all_single_slots_take_first() {
        let mut doc = Document::parse(
            r#"<body><section class="hero"><h1 id="h1">One</h1><h1>Two</h1>
               <a class="btn" id="a1" href="/a">A</a><a class="btn" id="a2" href="/b">B</a>
               <a class="btn" href="tel:5">C</a></section></body>"#,
        );
        let strategy = SelectorDiscovery::new(catalog(&[
            (SlotKey::HeroHeadline, &[".hero h1"]),
            (SlotKey::HomepageButtons, &[".hero a.btn", "a.btn"]),
        ]));
        let body = doc.body();
        let found = strategy.discover(&mut doc, body);
        let id = |name: &str| doc.get_element_by_id(name).expect("fixture element");

        assert_eq!(found.get(&SlotKey::HeroHeadline), Some(&vec![id("h1")]));
        assert_eq!(found.get(&SlotKey::HomepageButtons), Some(&vec![id("a1"), id("a2")]));
        assert_eq!(doc.attr(id("a2"), SLOT_ATTR), Some("homepage_buttons"));
    }

    #[test]
    fn rerun_is_idempotent() {
        let mut doc = Document::parse(r#"<body><nav><a class="nav-cta" href="/apply">Apply</a></nav></body>"#);
        let strategy = SelectorDiscovery::new(catalog(&[(
            SlotKey::NavCta,
            &["nav a.nav-cta", "header .nav-cta, nav .nav-cta"],
        )]));
        let body = doc.body();
        let first = strategy.discover(&mut doc, body);
        let second = strategy.discover(&mut doc, body);
        assert_eq!(first.get(&SlotKey::NavCta).map(Vec::len), Some(1));
        assert_eq!(first, second);
    }
}
