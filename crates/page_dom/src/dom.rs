use core::fmt;
use css_selectors::{SelectorList, matches_selector_list, parse_selector_list};
use indextree::{Arena, NodeId};
use smallvec::SmallVec;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeKind {
    #[default]
    Document,
    Element {
        tag: String,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DomNode {
    pub kind: NodeKind,
    pub attrs: SmallVec<[(String, String); 4]>,
}

/// One element subtree inserted while the document was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: NodeId,
}

#[derive(Debug, Clone)]
pub enum DomError {
    /// The node id does not belong to this document.
    UnknownNode,
    /// The arena rejected the tree operation (cycle, self append).
    Tree(String),
}

impl fmt::Display for DomError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode => write!(formatter, "node does not belong to this document"),
            Self::Tree(message) => write!(formatter, "tree operation rejected: {message}"),
        }
    }
}

impl std::error::Error for DomError {}

/// A parsed page. Nodes live in an arena and are addressed by `NodeId`; detached
/// subtrees stay addressable but are no longer connected.
#[derive(Debug)]
pub struct Document {
    pub(crate) arena: Arena<DomNode>,
    pub(crate) root: NodeId,
    pub(crate) doctype: Option<String>,
    mutations: Vec<MutationRecord>,
    observing: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        Self {
            root: arena.new_node(DomNode::default()),
            arena,
            doctype: None,
            mutations: Vec::new(),
            observing: false,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<body>` element, or the document root for body-less documents.
    pub fn body(&self) -> NodeId {
        self.root
            .descendants(&self.arena)
            .find(|id| self.tag_name(*id) == Some("body"))
            .unwrap_or(self.root)
    }

    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.arena
            .get(id)
            .filter(|node| !node.is_removed())
            .map(indextree::Node::get)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut DomNode> {
        self.arena
            .get_mut(id)
            .filter(|node| !node.is_removed())
            .map(indextree::Node::get_mut)
    }

    // -----------------------
    // Construction and tree mutation
    // -----------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.new_node(DomNode {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
            attrs: SmallVec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(DomNode {
            kind: NodeKind::Text {
                text: text.to_owned(),
            },
            attrs: SmallVec::new(),
        })
    }

    pub(crate) fn create_comment(&mut self, text: &str) -> NodeId {
        self.arena.new_node(DomNode {
            kind: NodeKind::Comment {
                text: text.to_owned(),
            },
            attrs: SmallVec::new(),
        })
    }

    /// Append without producing a mutation record (used while building from the parser).
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.node(parent).is_none() || self.node(child).is_none() {
            return Err(DomError::UnknownNode);
        }
        parent
            .checked_append(child, &mut self.arena)
            .map_err(|err| DomError::Tree(err.to_string()))
    }

    /// Append `child` as the last child of `parent`. Element insertions are recorded
    /// while the document is observed.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.attach(parent, child)?;
        self.record_insertion(parent, child);
        Ok(())
    }

    pub(crate) fn record_insertion(&mut self, target: NodeId, added: NodeId) {
        if self.observing && self.is_element(added) {
            self.mutations.push(MutationRecord { target, added });
        }
    }

    /// Detach a node and its subtree from the document.
    pub fn remove(&mut self, id: NodeId) {
        if self.node(id).is_some() && id != self.root {
            id.detach(&mut self.arena);
        }
    }

    /// Start or stop recording element insertions.
    pub fn observe(&mut self, enabled: bool) {
        self.observing = enabled;
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Drain recorded insertions in the order they happened.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        core::mem::take(&mut self.mutations)
    }

    // -----------------------
    // Node inspection
    // -----------------------

    /// True while the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.node(id).is_some() && id.ancestors(&self.arena).any(|ancestor| ancestor == self.root)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.tag_name(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Element { tag } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)?
            .attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if !matches!(node.kind, NodeKind::Element { .. }) {
            return;
        }
        let name = name.to_ascii_lowercase();
        if let Some(slot) = node.attrs.iter_mut().find(|(key, _)| *key == name) {
            value.clone_into(&mut slot.1);
        } else {
            node.attrs.push((name, value.to_owned()));
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(node) = self.node_mut(id) {
            node.attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|token| token == class))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id)?.parent()
    }

    /// Parent node when it is an element (never the document root).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|parent| self.is_element(*parent))
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        if self.node(id).is_none() {
            return Vec::new();
        }
        id.children(&self.arena).collect()
    }

    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    pub fn child_element_count(&self, id: NodeId) -> usize {
        self.child_elements(id).len()
    }

    pub fn previous_sibling_element(&self, id: NodeId) -> Option<NodeId> {
        if self.node(id).is_none() {
            return None;
        }
        id.preceding_siblings(&self.arena)
            .skip(1)
            .find(|sibling| self.is_element(*sibling))
    }

    /// Text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    /// Replace the data of a text node; ignored for other node kinds.
    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let Some(DomNode {
            kind: NodeKind::Text { text },
            ..
        }) = self.node_mut(id)
        {
            value.clone_into(text);
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if self.node(id).is_none() {
            return String::new();
        }
        id.descendants(&self.arena)
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Replace every child with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, value: &str) {
        for child in self.children(id) {
            child.detach(&mut self.arena);
        }
        if value.is_empty() {
            return;
        }
        let text = self.create_text(value);
        if let Err(err) = self.attach(id, text) {
            log::debug!("set_text_content on {id:?} failed: {err}");
        }
    }

    /// Connected and detached elements under `scope` in document order.
    /// `inclusive` also yields `scope` itself.
    pub fn elements_within(&self, scope: NodeId, inclusive: bool) -> Vec<NodeId> {
        if self.node(scope).is_none() {
            return Vec::new();
        }
        scope
            .descendants(&self.arena)
            .skip(usize::from(!inclusive))
            .filter(|id| self.is_element(*id))
            .collect()
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.elements_within(self.root, false)
            .into_iter()
            .find(|id| self.attr(*id, "id") == Some(element_id))
    }

    // -----------------------
    // Selector queries
    // -----------------------

    pub fn matches(&self, id: NodeId, selectors: &str) -> bool {
        self.is_element(id) && matches_selector_list(self, id, &parse_selector_list(selectors))
    }

    pub fn matches_list(&self, id: NodeId, list: &SelectorList) -> bool {
        self.is_element(id) && matches_selector_list(self, id, list)
    }

    /// Nearest inclusive ancestor element matching `selectors`.
    pub fn closest(&self, id: NodeId, selectors: &str) -> Option<NodeId> {
        if self.node(id).is_none() {
            return None;
        }
        let list = parse_selector_list(selectors);
        id.ancestors(&self.arena)
            .find(|ancestor| self.matches_list(*ancestor, &list))
    }

    /// Matching descendants of `scope`, excluding `scope`.
    pub fn query_selector_all(&self, scope: NodeId, selectors: &str) -> Vec<NodeId> {
        self.select(scope, selectors, false)
    }

    /// Matching elements of the subtree rooted at `scope`, including `scope`.
    pub fn select_inclusive(&self, scope: NodeId, selectors: &str) -> Vec<NodeId> {
        self.select(scope, selectors, true)
    }

    pub fn query_selector(&self, scope: NodeId, selectors: &str) -> Option<NodeId> {
        self.query_selector_all(scope, selectors).into_iter().next()
    }

    fn select(&self, scope: NodeId, selectors: &str, inclusive: bool) -> Vec<NodeId> {
        let list = parse_selector_list(selectors);
        if list.is_empty() {
            return Vec::new();
        }
        self.elements_within(scope, inclusive)
            .into_iter()
            .filter(|id| matches_selector_list(self, *id, &list))
            .collect()
    }
}
