//! Click tracking on slot elements.

use crate::host::Host;
use crate::page_context::probe_step_index;
use crate::slot::SlotKey;
use crate::tracking::{TrackMeta, Tracker};
use page_dom::{Document, NodeId};
use std::rc::Rc;

/// Marker on elements whose clicks are tracked; holds the canonical slot name.
pub const TRACKING_BOUND_ATTR: &str = "data-ab-tracking-bound";

/// Event reported for a click on `slot`. Submitting the form counts as a completion.
pub const fn event_for(slot: SlotKey) -> &'static str {
    match slot {
        SlotKey::FormNext => "step_advance",
        SlotKey::FormSubmit => "completion",
        _ => "click",
    }
}

/// Mark `elements` as tracked for `slot`. Returns how many were newly bound.
pub fn bind(doc: &mut Document, slot: SlotKey, elements: &[NodeId]) -> usize {
    let mut bound = 0;
    for element in elements {
        if doc.is_element(*element) && !doc.has_attr(*element, TRACKING_BOUND_ATTR) {
            doc.set_attr(*element, TRACKING_BOUND_ATTR, slot.as_str());
            bound += 1;
        }
    }
    bound
}

/// Nearest bound element at or above `target` and its slot.
pub fn slot_for_target(doc: &Document, target: NodeId) -> Option<(SlotKey, NodeId)> {
    let mut current = Some(target);
    while let Some(node) = current {
        if let Some(slot) = doc
            .attr(node, TRACKING_BOUND_ATTR)
            .and_then(SlotKey::from_canonical)
        {
            return Some((slot, node));
        }
        current = doc.parent_element(node);
    }
    None
}

pub struct InteractionTracker {
    host: Rc<Host>,
    tracker: Rc<Tracker>,
}

impl InteractionTracker {
    pub fn new(host: Rc<Host>, tracker: Rc<Tracker>) -> Self {
        Self { host, tracker }
    }

    /// Report a click on `target`. `None` when the click is outside every bound element,
    /// otherwise whether delivery succeeded.
    pub async fn handle_click(&self, target: NodeId) -> Option<bool> {
        let (slot, _) = slot_for_target(&self.host.document.borrow(), target)?;
        let meta = TrackMeta {
            variant: None,
            step_index: Some(probe_step_index(&self.host.page).unwrap_or_else(|| String::from("0"))),
        };
        Some(self.tracker.track(event_for(slot), slot, &meta).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_is_once_and_clicks_bubble_to_bound_ancestor() {
        let mut doc = Document::parse(r#"<body><a id="go" href="/go"><span id="inner">Go</span></a><p id="p">x</p></body>"#);
        let go = doc.get_element_by_id("go").expect("fixture element");
        let inner = doc.get_element_by_id("inner").expect("fixture element");
        let outside = doc.get_element_by_id("p").expect("fixture element");

        assert_eq!(bind(&mut doc, SlotKey::NavCta, &[go]), 1);
        assert_eq!(bind(&mut doc, SlotKey::NavCta, &[go]), 0);
        assert_eq!(slot_for_target(&doc, inner), Some((SlotKey::NavCta, go)));
        assert_eq!(slot_for_target(&doc, outside), None);
    }

    #[test]
    fn form_slots_map_to_funnel_events() {
        assert_eq!(event_for(SlotKey::FormNext), "step_advance");
        assert_eq!(event_for(SlotKey::FormSubmit), "completion");
        assert_eq!(event_for(SlotKey::LeadAnchor), "click");
    }
}
