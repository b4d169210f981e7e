use core::fmt::Write as _;

use super::{DomNode, Document, NodeKind};
use indextree::NodeId;

// -----------------------
// Module-scope helpers
// -----------------------

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "iframe", "xmp"];

fn escape_text(source: &str, out: &mut String) {
    for ch in source.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(source: &str, out: &mut String) {
    for ch in source.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    let Some(DomNode { kind, attrs }) = doc.node(id) else {
        return;
    };
    match kind {
        NodeKind::Document => write_children(doc, id, out),
        NodeKind::Text { text } => {
            let raw = doc
                .parent(id)
                .and_then(|parent| doc.tag_name(parent))
                .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
            if raw {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        NodeKind::Comment { text } => {
            // Writing into a String cannot fail.
            let _ignored = write!(out, "<!--{text}-->");
        }
        NodeKind::Element { tag } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            write_children(doc, id, out);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn write_children(doc: &Document, id: NodeId, out: &mut String) {
    for child in doc.children(id) {
        write_node(doc, child, out);
    }
}

impl Document {
    /// Serialize the whole document back to HTML.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if let Some(name) = &self.doctype {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        write_node(self, self.root, &mut out);
        out
    }

    /// HTML of a node including its own tag.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        write_node(self, id, &mut out);
        out
    }

    /// HTML of a node's children.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        write_children(self, id, &mut out);
        out
    }
}
