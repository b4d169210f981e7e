//! HTML5 parsing using html5ever.

use crate::{DomError, Document};
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use indextree::NodeId;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

fn parse_rcdom(html: &str) -> RcDom {
    parse_document(RcDom::default(), ParseOpts::default()).one(html)
}

/// Depth-first search for the first element named `tag` in the html5ever tree.
fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if let RcNodeData::Element { name, .. } = &handle.data {
        if &*name.local == tag {
            return Some(handle.clone());
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

impl Document {
    /// Parse a full HTML document. The returned document is not observed yet.
    pub fn parse(html: &str) -> Self {
        let dom = parse_rcdom(html);
        let mut document = Self::new();
        let root = document.root;
        document.convert_node(&dom.document, root);
        document
    }

    /// Parse `html` as body content and append the resulting nodes to `parent`.
    /// Each appended top-level element is recorded as an insertion.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>, DomError> {
        if self.node(parent).is_none() {
            return Err(DomError::UnknownNode);
        }
        let dom = parse_rcdom(html);
        let Some(body) = find_element(&dom.document, "body") else {
            return Ok(Vec::new());
        };
        let mut added = Vec::new();
        for child in body.children.borrow().iter() {
            if let Some(node) = self.convert_node(child, parent) {
                self.record_insertion(parent, node);
                added.push(node);
            }
        }
        Ok(added)
    }

    /// Convert an html5ever node into this arena under `parent`, returning the created node.
    fn convert_node(&mut self, rc_node: &Handle, parent: NodeId) -> Option<NodeId> {
        let created = match &rc_node.data {
            RcNodeData::Document => {
                for child in rc_node.children.borrow().iter() {
                    self.convert_node(child, parent);
                }
                return None;
            }
            RcNodeData::Doctype { name, .. } => {
                self.doctype = Some(name.to_string());
                return None;
            }
            RcNodeData::ProcessingInstruction { .. } => return None,
            RcNodeData::Text { contents } => self.create_text(&contents.borrow()),
            RcNodeData::Comment { contents } => self.create_comment(contents),
            RcNodeData::Element { name, attrs, .. } => {
                let node = self.create_element(&name.local);
                for attr in attrs.borrow().iter() {
                    self.set_attr(node, &attr.name.local, &attr.value);
                }
                node
            }
        };
        if let Err(err) = self.attach(parent, created) {
            log::warn!("Dropping parsed node: {err}");
            return None;
        }
        for child in rc_node.children.borrow().iter() {
            self.convert_node(child, created);
        }
        Some(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_builds_body_and_keeps_attributes() {
        let doc = Document::parse(
            "<!DOCTYPE html><html><body><a id=\"go\" class=\"btn\" href=\"/apply\">Go</a></body></html>",
        );
        let link = doc.get_element_by_id("go");
        assert!(link.is_some());
        let link = link.unwrap_or(doc.root());
        assert_eq!(doc.tag_name(link), Some("a"));
        assert_eq!(doc.attr(link, "href"), Some("/apply"));
        assert_eq!(doc.parent_element(link), Some(doc.body()));
        assert_eq!(doc.doctype.as_deref(), Some("html"));
    }

    #[test]
    fn append_html_records_only_when_observed() {
        let mut doc = Document::parse("<body><main></main></body>");
        let body = doc.body();
        let quiet = doc.append_html(body, "<p>one</p>");
        assert_eq!(quiet.map(|nodes| nodes.len()).ok(), Some(1));
        assert!(doc.take_mutations().is_empty());

        doc.observe(true);
        let added = doc.append_html(body, "<section><a>x</a></section>text").unwrap_or_default();
        assert_eq!(added.len(), 2);
        let records = doc.take_mutations();
        assert_eq!(records.len(), 1);
        assert_eq!(doc.tag_name(records[0].added), Some("section"));
    }
}
