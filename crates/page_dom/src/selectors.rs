//! Selector matching over the arena document.

use crate::Document;
use css_selectors::ElementAdapter;
use indextree::NodeId;

impl ElementAdapter for Document {
    type Handle = NodeId;

    fn parent(&self, element: NodeId) -> Option<NodeId> {
        self.parent_element(element)
    }

    fn previous_sibling_element(&self, element: NodeId) -> Option<NodeId> {
        Self::previous_sibling_element(self, element)
    }

    fn tag_name(&self, element: NodeId) -> &str {
        Self::tag_name(self, element).unwrap_or("")
    }

    fn attr(&self, element: NodeId, name: &str) -> Option<&str> {
        Self::attr(self, element, name)
    }
}
