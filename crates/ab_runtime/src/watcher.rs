use crate::discovery::DiscoveryPipeline;
use crate::settings::RuntimeSettings;
use crate::slot::{SlotMap, insert_unique};
use page_dom::Document;

/// Turns recorded subtree insertions into newly discovered slot elements.
/// Only the attribute and selector tiers run on inserted content.
pub struct DomWatcher {
    pipeline: DiscoveryPipeline,
}

impl DomWatcher {
    pub fn new(settings: &RuntimeSettings) -> Self {
        Self {
            pipeline: DiscoveryPipeline::scoped(settings),
        }
    }

    /// Drain pending insertions and discover slots inside each inserted subtree.
    pub fn collect(&self, doc: &mut Document) -> SlotMap {
        let mut found = SlotMap::new();
        for record in doc.take_mutations() {
            if !doc.is_connected(record.added) || !doc.is_element(record.added) {
                continue;
            }
            for (slot, nodes) in self.pipeline.discover(doc, record.added) {
                for node in nodes {
                    insert_unique(&mut found, slot, node);
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotKey;

    #[test]
    fn only_connected_insertions_are_scanned() {
        let mut doc = Document::parse("<body><main id=m></main></body>");
        let main = doc.get_element_by_id("m").expect("fixture element");
        doc.observe(true);
        let added = doc
            .append_html(main, r#"<div><a data-ab-slot="lead_link" href="/apply">Apply</a></div>"#)
            .expect("fragment parses");
        let detached = doc.create_element("div");
        doc.append_child(main, detached).expect("append");
        doc.remove(detached);

        let watcher = DomWatcher::new(&RuntimeSettings::default());
        let found = watcher.collect(&mut doc);
        assert_eq!(added.len(), 1);
        assert_eq!(found.get(&SlotKey::LeadAnchor).map(Vec::len), Some(1));
        assert!(watcher.collect(&mut doc).is_empty());
    }
}
