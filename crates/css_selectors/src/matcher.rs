//! Right-to-left selector matching over an [`ElementAdapter`].
//! Spec: Section 8 — Combinators

use crate::{
    AttrOperator, Combinator, ComplexSelector, CompoundSelector, ElementAdapter, SelectorList,
    SimpleSelector,
};

/// Return true if any selector of the list matches `element`.
pub fn matches_selector_list<A: ElementAdapter>(
    adapter: &A,
    element: A::Handle,
    list: &SelectorList,
) -> bool {
    list.selectors
        .iter()
        .any(|selector| matches_complex(adapter, element, selector))
}

/// Match a complex selector against `element`, which is the subject (right-most compound).
pub fn matches_complex<A: ElementAdapter>(
    adapter: &A,
    element: A::Handle,
    selector: &ComplexSelector,
) -> bool {
    if selector.is_empty() {
        return false;
    }
    match_from(adapter, selector, selector.len() - 1, element)
}

/// Match compound `index` on `element`, then walk left through the remaining compounds.
/// Descendant and general sibling combinators backtrack over every candidate.
fn match_from<A: ElementAdapter>(
    adapter: &A,
    selector: &ComplexSelector,
    index: usize,
    element: A::Handle,
) -> bool {
    let Some(compound) = selector.compound(index) else {
        return false;
    };
    if !matches_compound(adapter, element, compound) {
        return false;
    }
    let Some(combinator) = selector.combinator_before(index) else {
        return true;
    };
    let previous = index - 1;
    match combinator {
        Combinator::Child => adapter
            .parent(element)
            .is_some_and(|parent| match_from(adapter, selector, previous, parent)),
        Combinator::AdjacentSibling => adapter
            .previous_sibling_element(element)
            .is_some_and(|sibling| match_from(adapter, selector, previous, sibling)),
        Combinator::Descendant => {
            let mut cursor = adapter.parent(element);
            while let Some(ancestor) = cursor {
                if match_from(adapter, selector, previous, ancestor) {
                    return true;
                }
                cursor = adapter.parent(ancestor);
            }
            false
        }
        Combinator::GeneralSibling => {
            let mut cursor = adapter.previous_sibling_element(element);
            while let Some(sibling) = cursor {
                if match_from(adapter, selector, previous, sibling) {
                    return true;
                }
                cursor = adapter.previous_sibling_element(sibling);
            }
            false
        }
    }
}

/// Return true if every simple selector in the compound matches.
pub fn matches_compound<A: ElementAdapter>(
    adapter: &A,
    element: A::Handle,
    compound: &CompoundSelector,
) -> bool {
    !compound.simples.is_empty()
        && compound
            .simples
            .iter()
            .all(|simple| matches_simple(adapter, element, simple))
}

fn matches_simple<A: ElementAdapter>(
    adapter: &A,
    element: A::Handle,
    simple: &SimpleSelector,
) -> bool {
    match simple {
        SimpleSelector::Universal => true,
        SimpleSelector::Type(name) => adapter.tag_name(element).eq_ignore_ascii_case(name),
        SimpleSelector::Class(class) => adapter.has_class(element, class),
        SimpleSelector::IdSelector(id) => adapter.element_id(element) == Some(id.as_str()),
        SimpleSelector::Attribute {
            name,
            operator,
            value,
        } => adapter
            .attr(element, name)
            .is_some_and(|actual| matches_attr(*operator, actual, value)),
        SimpleSelector::Invalid => false,
    }
}

/// Spec: Section 6.3.1 and 6.3.2 — empty values never match the substring forms.
fn matches_attr(operator: AttrOperator, actual: &str, expected: &str) -> bool {
    match operator {
        AttrOperator::Exists => true,
        AttrOperator::Equals => actual == expected,
        AttrOperator::Includes => {
            !expected.is_empty()
                && !expected.contains(char::is_whitespace)
                && actual.split_ascii_whitespace().any(|token| token == expected)
        }
        AttrOperator::Prefix => !expected.is_empty() && actual.starts_with(expected),
        AttrOperator::Suffix => !expected.is_empty() && actual.ends_with(expected),
        AttrOperator::Substring => !expected.is_empty() && actual.contains(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_selector_list;

    /// Flat test tree: each node stores its parent, previous element sibling, tag and attributes.
    struct TestTree {
        nodes: Vec<TestNode>,
    }

    struct TestNode {
        parent: Option<usize>,
        previous: Option<usize>,
        tag: &'static str,
        attrs: Vec<(&'static str, &'static str)>,
    }

    impl ElementAdapter for TestTree {
        type Handle = usize;

        fn parent(&self, element: usize) -> Option<usize> {
            self.nodes.get(element).and_then(|node| node.parent)
        }

        fn previous_sibling_element(&self, element: usize) -> Option<usize> {
            self.nodes.get(element).and_then(|node| node.previous)
        }

        fn tag_name(&self, element: usize) -> &str {
            self.nodes.get(element).map_or("", |node| node.tag)
        }

        fn attr(&self, element: usize, name: &str) -> Option<&str> {
            self.nodes.get(element).and_then(|node| {
                node.attrs
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
            })
        }
    }

    /// `<section class="hero"><div><h2/><a class="btn cta" href="/apply?x=1"/></div></section>`
    fn tree() -> TestTree {
        TestTree {
            nodes: vec![
                TestNode {
                    parent: None,
                    previous: None,
                    tag: "section",
                    attrs: vec![("class", "hero")],
                },
                TestNode {
                    parent: Some(0),
                    previous: None,
                    tag: "div",
                    attrs: vec![],
                },
                TestNode {
                    parent: Some(1),
                    previous: None,
                    tag: "h2",
                    attrs: vec![("id", "Title")],
                },
                TestNode {
                    parent: Some(1),
                    previous: Some(2),
                    tag: "a",
                    attrs: vec![("class", "btn cta"), ("href", "/apply?x=1")],
                },
            ],
        }
    }

    fn matches(selector: &str, element: usize) -> bool {
        matches_selector_list(&tree(), element, &parse_selector_list(selector))
    }

    #[test]
    fn descendant_backtracks_past_non_matching_parent() {
        assert!(matches(".hero a", 3));
        assert!(matches("section > div > a.cta", 3));
        assert!(!matches(".hero > a", 3));
    }

    #[test]
    fn sibling_combinators() {
        assert!(matches("h2 + a", 3));
        assert!(matches("#Title ~ a", 3));
        assert!(!matches("#title ~ a", 3));
        assert!(!matches("a + h2", 2));
    }

    #[test]
    fn attribute_operators() {
        assert!(matches("a[href]", 3));
        assert!(matches("a[href^='/apply']", 3));
        assert!(matches("a[href$=\"x=1\"]", 3));
        assert!(matches("a[href*=apply]", 3));
        assert!(matches("[class~=cta]", 3));
        assert!(!matches("[class~=ct]", 3));
        assert!(!matches("[href*='']", 3));
    }

    #[test]
    fn invalid_parts_never_match() {
        assert!(!matches("a:hover", 3));
        assert!(matches("a:hover, .btn", 3));
    }
}
