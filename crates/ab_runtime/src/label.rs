//! Idempotent text and aria-label replacement on slot elements.

use page_dom::{Document, NodeId};

/// Marker holding the label last applied to an element.
pub const APPLIED_ATTR: &str = "data-ab-applied";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelOutcome {
    Applied,
    /// The element already carries this exact label.
    AlreadyApplied,
    /// Blank label or a node that is not an element.
    Skipped,
}

/// Apply `label` to `element`.
///
/// `aria-label` is always set. Submit and button inputs get their `value` replaced;
/// elements without element children get their whole text replaced; otherwise only
/// the first non-blank direct text child changes, and nothing changes when there is
/// none.
pub fn apply_label(doc: &mut Document, element: NodeId, label: &str) -> LabelOutcome {
    if !doc.is_element(element) || label.trim().is_empty() {
        return LabelOutcome::Skipped;
    }
    if doc.attr(element, APPLIED_ATTR) == Some(label) {
        return LabelOutcome::AlreadyApplied;
    }
    doc.set_attr(element, "aria-label", label);
    if is_button_input(doc, element) {
        doc.set_attr(element, "value", label);
    } else if doc.child_element_count(element) == 0 {
        doc.set_text_content(element, label);
    } else {
        let first_text = doc
            .children(element)
            .into_iter()
            .find(|child| doc.text(*child).is_some_and(|text| !text.trim().is_empty()));
        if let Some(text_node) = first_text {
            doc.set_text(text_node, label);
        }
    }
    doc.set_attr(element, APPLIED_ATTR, label);
    LabelOutcome::Applied
}

fn is_button_input(doc: &Document, element: NodeId) -> bool {
    doc.tag_name(element) == Some("input")
        && doc
            .attr(element, "type")
            .is_some_and(|kind| kind.eq_ignore_ascii_case("submit") || kind.eq_ignore_ascii_case("button"))
}
