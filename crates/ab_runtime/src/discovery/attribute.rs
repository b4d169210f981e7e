use super::{DiscoveryStrategy, is_excluded, tag_slot};
use crate::slot::{SLOT_ATTR, SlotKey, SlotMap, canonicalize, insert_unique};
use page_dom::{Document, NodeId};
use std::collections::BTreeMap;

/// Elements that state their slot through `data-ab-slot`. Alias names are rewritten to
/// the canonical name; unknown names are ignored.
pub struct AttributeDiscovery {
    aliases: BTreeMap<String, SlotKey>,
}

impl AttributeDiscovery {
    pub fn new(aliases: BTreeMap<String, SlotKey>) -> Self {
        Self { aliases }
    }
}

impl DiscoveryStrategy for AttributeDiscovery {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn discover(&self, doc: &mut Document, scope: NodeId) -> SlotMap {
        let mut found = SlotMap::new();
        for node in doc.select_inclusive(scope, "[data-ab-slot]") {
            let stated = doc.attr(node, SLOT_ATTR).unwrap_or_default().to_owned();
            let Some(slot) = canonicalize(&stated, &self.aliases) else {
                log::debug!("ignoring unknown slot name {stated:?}");
                continue;
            };
            if is_excluded(doc, node) {
                continue;
            }
            tag_slot(doc, node, slot);
            insert_unique(&mut found, slot, node);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RuntimeSettings;

    #[test]
    fn alias_names_canonicalize_and_unknown_names_drop() {
        let mut doc = Document::parse(
            r#"<body><a id="p" data-ab-slot="primary_cta" href="/apply">Apply</a>
               <a data-ab-slot="mystery">?</a>
               <a data-ab-slot="nav_cta" href="tel:123">Call</a></body>"#,
        );
        let strategy = AttributeDiscovery::new(RuntimeSettings::default().aliases);
        let body = doc.body();
        let found = strategy.discover(&mut doc, body);

        let primary = doc.get_element_by_id("p").expect("fixture element");
        assert_eq!(found.len(), 1);
        assert_eq!(found.get(&SlotKey::HomepageButtons), Some(&vec![primary]));
        assert_eq!(doc.attr(primary, SLOT_ATTR), Some("homepage_buttons"));
    }

    #[test]
    fn scope_node_itself_is_considered() {
        let mut doc = Document::parse(r#"<body><button id="b" data-ab-slot="form_next">Next</button></body>"#);
        let button = doc.get_element_by_id("b").expect("fixture element");
        let found = AttributeDiscovery::new(BTreeMap::new()).discover(&mut doc, button);
        assert_eq!(found.get(&SlotKey::FormNext), Some(&vec![button]));
    }
}
