//! Classification of clicked elements and forms for engagement events.

use page_dom::{Document, NodeId};

const CTA_TEXT_KEYWORDS: [&str; 5] = ["start", "free", "eligibility", "get started", "check"];

const CTA_ATTR_KEYWORDS: [&str; 4] = ["cta", "start", "eligib", "form"];

const LEAD_FORM_KEYWORDS: [&str; 5] = ["lead", "debt", "eligib", "form", "start"];

const MAX_LABEL_CHARS: usize = 120;

/// Why an element counts as a call to action. Text matches rank first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CtaMatch {
    Text,
    Attribute,
}

impl CtaMatch {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Attribute => "attribute",
        }
    }
}

fn id_and_class(doc: &Document, node: NodeId) -> String {
    format!(
        "{} {}",
        doc.attr(node, "id").unwrap_or_default(),
        doc.attr(node, "class").unwrap_or_default()
    )
    .to_lowercase()
}

/// Nearest link or button at or above a click target.
pub fn cta_target(doc: &Document, target: NodeId) -> Option<NodeId> {
    doc.closest(target, "a, button")
}

pub fn classify_cta(doc: &Document, node: NodeId) -> Option<CtaMatch> {
    let text = doc.text_content(node).to_lowercase();
    if CTA_TEXT_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        return Some(CtaMatch::Text);
    }
    let attributes = id_and_class(doc, node);
    (CTA_ATTR_KEYWORDS.iter().any(|keyword| attributes.contains(keyword))
        || doc.has_attr(node, "data-cta"))
    .then_some(CtaMatch::Attribute)
}

/// `tag#id.firstClass`, omitting the parts the element lacks.
pub fn selector_hint(doc: &Document, node: NodeId) -> String {
    let mut hint = doc.tag_name(node).unwrap_or_default().to_owned();
    if let Some(id) = doc.attr(node, "id").filter(|id| !id.is_empty()) {
        hint.push('#');
        hint.push_str(id);
    }
    if let Some(class) = doc.attr(node, "class").and_then(|class| class.split_whitespace().next()) {
        hint.push('.');
        hint.push_str(class);
    }
    hint
}

/// Visible text with whitespace collapsed, falling back to `aria-label`, capped at 120 chars.
pub fn cta_label(doc: &Document, node: NodeId) -> String {
    let text = doc
        .text_content(node)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let label = if text.is_empty() {
        doc.attr(node, "aria-label").unwrap_or_default().trim().to_owned()
    } else {
        text
    };
    label.chars().take(MAX_LABEL_CHARS).collect()
}

pub fn is_lead_form(doc: &Document, form: NodeId) -> bool {
    if doc.tag_name(form) != Some("form") {
        return false;
    }
    let attributes = id_and_class(doc, form);
    LEAD_FORM_KEYWORDS.iter().any(|keyword| attributes.contains(keyword))
        || doc.query_selector_all(form, "input, select, textarea").len() >= 2
}

/// The lead form containing `target`, if any.
pub fn lead_form_for(doc: &Document, target: NodeId) -> Option<NodeId> {
    doc.closest(target, "form").filter(|form| is_lead_form(doc, *form))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<body>
        <a id="free" href="/x"><span id="free-inner">Get   a free quote</span></a>
        <button id="attr" class="btn nav-cta">Menu</button>
        <a id="data" data-cta="1" href="/y">Go</a>
        <a id="plain" href="/z">About</a>
        <form id="search"><input name="q"></form>
        <form id="contact"><input name="a"><textarea></textarea></form>
        <form class="debt-help"><input id="one"></form>
    </body>"#;

    fn id(doc: &Document, name: &str) -> NodeId {
        doc.get_element_by_id(name).expect("fixture element")
    }

    #[test]
    fn cta_ranks_and_hints() {
        let doc = Document::parse(PAGE);
        let free = cta_target(&doc, id(&doc, "free-inner")).expect("link ancestor");
        assert_eq!(free, id(&doc, "free"));
        assert_eq!(classify_cta(&doc, free), Some(CtaMatch::Text));
        assert_eq!(classify_cta(&doc, id(&doc, "attr")), Some(CtaMatch::Attribute));
        assert_eq!(classify_cta(&doc, id(&doc, "data")), Some(CtaMatch::Attribute));
        assert_eq!(classify_cta(&doc, id(&doc, "plain")), None);
        assert_eq!(selector_hint(&doc, id(&doc, "attr")), "button#attr.btn");
        assert_eq!(cta_label(&doc, free), "Get a free quote");
    }

    #[test]
    fn labels_are_capped() {
        let long = "x".repeat(300);
        let doc = Document::parse(&format!("<body><a id=l>{long}</a></body>"));
        assert_eq!(cta_label(&doc, id(&doc, "l")).chars().count(), 120);
    }

    #[test]
    fn lead_forms_by_name_or_field_count() {
        let doc = Document::parse(PAGE);
        assert!(!is_lead_form(&doc, id(&doc, "search")));
        assert!(is_lead_form(&doc, id(&doc, "contact")));
        assert!(lead_form_for(&doc, id(&doc, "one")).is_some());
    }
}
