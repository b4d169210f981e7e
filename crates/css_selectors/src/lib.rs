//! Selectors Level 3 subset used by slot discovery.
//! Spec: <https://www.w3.org/TR/selectors-3/>
//!
//! Supported:
//! - Type, class, id and universal selectors
//! - Attribute presence and the `=`, `~=`, `^=`, `$=`, `*=` operators
//! - Combinators: descendant, child, adjacent sibling, general sibling
//! - Comma separated selector lists
//!
//! Parsing is permissive: unknown syntax degrades to a selector that matches
//! nothing instead of an error, so a bad catalog entry can never take discovery down.

mod matcher;
mod parser;

pub use matcher::{matches_complex, matches_compound, matches_selector_list};
pub use parser::{parse_complex_selector, parse_selector_list};

/// An adapter that abstracts DOM access for selector matching.
/// Implement this for your DOM layer.
pub trait ElementAdapter {
    type Handle: Copy + Eq;

    /// Parent element if any.
    /// Spec: Section 11 — Combinators (for tree relationships)
    fn parent(&self, element: Self::Handle) -> Option<Self::Handle>;

    /// Previous sibling element, skipping text and comment nodes.
    /// Spec: Section 11 — Sibling combinators
    fn previous_sibling_element(&self, element: Self::Handle) -> Option<Self::Handle>;

    /// Tag name in ASCII lowercase.
    fn tag_name(&self, element: Self::Handle) -> &str;

    /// Returns the attribute value if present. Attribute names are ASCII lowercase.
    /// Spec: Section 8 — Attribute selectors
    fn attr(&self, element: Self::Handle, name: &str) -> Option<&str>;

    /// Returns Some(id) if the element has an id attribute, else None.
    fn element_id(&self, element: Self::Handle) -> Option<&str> {
        self.attr(element, "id")
    }

    /// True if the element has the given class token.
    fn has_class(&self, element: Self::Handle, class: &str) -> bool {
        self.attr(element, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|token| token == class))
    }
}

/// How an attribute selector compares the attribute value.
/// Spec: Section 6.3 and 6.3.2 — attribute presence, value and substring selectors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttrOperator {
    /// `[name]`
    Exists,
    /// `[name=value]`
    Equals,
    /// `[name~=value]`, whitespace separated token match.
    Includes,
    /// `[name^=value]`
    Prefix,
    /// `[name$=value]`
    Suffix,
    /// `[name*=value]`
    Substring,
}

/// Simple selectors (subset).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SimpleSelector {
    /// Spec: Section 6.1 — Type selectors
    Type(String),
    /// Spec: Section 6.4 — Class selectors
    Class(String),
    /// Spec: Section 6.5 — ID selectors
    IdSelector(String),
    /// Spec: Section 6.3 — Attribute selectors
    Attribute {
        name: String,
        operator: AttrOperator,
        value: String,
    },
    /// Universal selector '*'.
    Universal,
    /// A token the parser could not understand; never matches.
    Invalid,
}

/// A compound selector is a sequence of simple selectors (no combinators).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    pub simples: Vec<SimpleSelector>,
}

/// Combinators between compounds.
/// Spec: Section 8 — Combinators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

/// A complex selector is one or more compounds separated by combinators.
/// `rest[i].0` is the combinator between compound `i` and compound `i + 1`,
/// counting `first` as compound zero.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ComplexSelector {
    pub first: CompoundSelector,
    pub rest: Vec<(Combinator, CompoundSelector)>,
}

impl ComplexSelector {
    /// Number of compounds in the selector.
    pub fn len(&self) -> usize {
        self.rest.len() + 1
    }

    /// True when no simple selector was parsed at all.
    pub fn is_empty(&self) -> bool {
        self.first.simples.is_empty() && self.rest.is_empty()
    }

    /// Compound at `index`, where zero is the left-most compound.
    fn compound(&self, index: usize) -> Option<&CompoundSelector> {
        if index == 0 {
            Some(&self.first)
        } else {
            self.rest.get(index - 1).map(|pair| &pair.1)
        }
    }

    /// Combinator that joins compound `index - 1` and compound `index`.
    fn combinator_before(&self, index: usize) -> Option<Combinator> {
        index
            .checked_sub(1)
            .and_then(|prev| self.rest.get(prev))
            .map(|pair| pair.0)
    }
}

/// A selector list separated by commas.
/// Spec: Section 5 — Groups of selectors
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SelectorList {
    pub selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    /// True when the list holds no usable selector.
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}
