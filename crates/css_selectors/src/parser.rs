//! CSS selector parsing.
//! Spec: <https://www.w3.org/TR/selectors-3/>

use crate::{
    AttrOperator, Combinator, ComplexSelector, CompoundSelector, SelectorList, SimpleSelector,
};
use core::mem::take;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Internal tokenizer token kinds.
pub enum Tok {
    /// A combinator token like child/adjacent/general sibling.
    Combinator(Combinator),
    /// Whitespace that implies a descendant combinator.
    DescendantWS,
    /// A simple selector token (type, class, id, attribute, universal).
    Simple(SimpleSelector),
}

/// Tokenizer over a selector string.
pub struct SelectorTokenizer<'src> {
    /// Selector bytes.
    input_bytes: &'src [u8],
    /// Current cursor index into `input_bytes`.
    index: usize,
    /// Whether we should emit a descendant whitespace token on `next()` call.
    pending_whitespace: bool,
}

impl<'src> SelectorTokenizer<'src> {
    /// Construct a tokenizer from input.
    #[inline]
    pub(crate) fn new(input: &'src str) -> Self {
        Self {
            input_bytes: input.as_bytes(),
            index: 0,
            pending_whitespace: false,
        }
    }

    /// Return the next selector token, if any.
    pub(crate) fn next_token(&mut self) -> Option<Tok> {
        if self.pending_whitespace {
            self.pending_whitespace = false;
            return Some(Tok::DescendantWS);
        }
        if self.skip_whitespace_descendant() {
            // Trailing whitespace never implies a combinator.
            if self.index >= self.input_bytes.len() {
                return None;
            }
            self.pending_whitespace = false;
            return Some(Tok::DescendantWS);
        }
        let current = *self.input_bytes.get(self.index)?;
        let token = match current {
            b'*' => {
                self.bump();
                Tok::Simple(SimpleSelector::Universal)
            }
            b'.' => {
                self.bump();
                Tok::Simple(self.ident_or_invalid(SimpleSelector::Class))
            }
            b'#' => {
                self.bump();
                Tok::Simple(self.ident_or_invalid(SimpleSelector::IdSelector))
            }
            b'[' => Tok::Simple(self.consume_attr()),
            b'>' => {
                self.bump();
                Tok::Combinator(Combinator::Child)
            }
            b'+' => {
                self.bump();
                Tok::Combinator(Combinator::AdjacentSibling)
            }
            b'~' => {
                self.bump();
                Tok::Combinator(Combinator::GeneralSibling)
            }
            b':' => Tok::Simple(self.consume_pseudo()),
            _ => Tok::Simple(self.consume_type()),
        };
        Some(token)
    }

    #[inline]
    fn bump(&mut self) {
        self.index = self.index.saturating_add(1);
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input_bytes.get(self.index).copied()
    }

    /// Skip whitespace, returning true if any was consumed.
    fn skip_whitespace_descendant(&mut self) -> bool {
        let mut saw = false;
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            saw = true;
            self.bump();
        }
        saw
    }

    /// Consume an identifier of ASCII alphanumerics, '-' and '_' (case preserved).
    fn consume_ident(&mut self) -> String {
        let start = self.index;
        while self
            .peek()
            .is_some_and(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
        {
            self.bump();
        }
        let slice = self.input_bytes.get(start..self.index).unwrap_or(&[]);
        String::from_utf8_lossy(slice).into_owned()
    }

    fn ident_or_invalid(&mut self, build: fn(String) -> SimpleSelector) -> SimpleSelector {
        let ident = self.consume_ident();
        if ident.is_empty() {
            SimpleSelector::Invalid
        } else {
            build(ident)
        }
    }

    /// Type selectors are matched case-insensitively against lowercase tag names.
    fn consume_type(&mut self) -> SimpleSelector {
        let ident = self.consume_ident();
        if ident.is_empty() {
            // Unknown byte: step over it so tokenizing always makes progress.
            self.bump();
            return SimpleSelector::Invalid;
        }
        SimpleSelector::Type(ident.to_ascii_lowercase())
    }

    /// Pseudo-classes are not supported; consume `:name` and any `(...)` argument.
    fn consume_pseudo(&mut self) -> SimpleSelector {
        while self.peek() == Some(b':') {
            self.bump();
        }
        let _name = self.consume_ident();
        if self.peek() == Some(b'(') {
            let mut depth = 0_usize;
            while let Some(byte) = self.peek() {
                self.bump();
                match byte {
                    b'(' => depth = depth.saturating_add(1),
                    b')' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        SimpleSelector::Invalid
    }

    /// Parse `[name]` or `[name<op>value]` with a quoted or unquoted value.
    fn consume_attr(&mut self) -> SimpleSelector {
        // skip '['
        self.bump();
        self.skip_spaces();
        let name = self.consume_ident().to_ascii_lowercase();
        self.skip_spaces();
        let operator = match self.peek() {
            Some(b']') | None => {
                self.bump();
                return if name.is_empty() {
                    SimpleSelector::Invalid
                } else {
                    SimpleSelector::Attribute {
                        name,
                        operator: AttrOperator::Exists,
                        value: String::new(),
                    }
                };
            }
            Some(b'=') => {
                self.bump();
                AttrOperator::Equals
            }
            Some(prefix @ (b'~' | b'^' | b'$' | b'*'))
                if self.input_bytes.get(self.index + 1) == Some(&b'=') =>
            {
                self.bump();
                self.bump();
                match prefix {
                    b'~' => AttrOperator::Includes,
                    b'^' => AttrOperator::Prefix,
                    b'$' => AttrOperator::Suffix,
                    _ => AttrOperator::Substring,
                }
            }
            Some(_) => {
                self.skip_past(b']');
                return SimpleSelector::Invalid;
            }
        };
        self.skip_spaces();
        let value = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.bump();
                self.consume_quoted_attr_value(quote)
            }
            _ => self.consume_unquoted_attr_value(),
        };
        // Tolerate a trailing case flag such as ` i` by skipping to the bracket.
        self.skip_past(b']');
        if name.is_empty() {
            return SimpleSelector::Invalid;
        }
        SimpleSelector::Attribute {
            name,
            operator,
            value,
        }
    }

    /// Consume an unquoted attribute value until whitespace or a closing bracket.
    fn consume_unquoted_attr_value(&mut self) -> String {
        let start = self.index;
        while self
            .peek()
            .is_some_and(|byte| !byte.is_ascii_whitespace() && byte != b']')
        {
            self.bump();
        }
        let slice = self.input_bytes.get(start..self.index).unwrap_or(&[]);
        String::from_utf8_lossy(slice).into_owned()
    }

    /// Consume a quoted attribute value until the matching quote byte.
    fn consume_quoted_attr_value(&mut self, quote: u8) -> String {
        let start = self.index;
        while self.peek().is_some_and(|byte| byte != quote) {
            self.bump();
        }
        let slice = self.input_bytes.get(start..self.index).unwrap_or(&[]);
        let out = String::from_utf8_lossy(slice).into_owned();
        if self.peek().is_some() {
            self.bump();
        }
        out
    }

    fn skip_past(&mut self, terminator: u8) {
        while let Some(byte) = self.peek() {
            self.bump();
            if byte == terminator {
                break;
            }
        }
    }

    /// Skip ASCII whitespace.
    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.bump();
        }
    }
}

/// Split a selector list on top-level commas, ignoring commas inside quotes,
/// brackets and parentheses.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[' | '(') => depth = depth.saturating_add(1),
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Parse a selector list from CSS text.
/// Spec: Section 5 — Groups of selectors
pub fn parse_selector_list(input: &str) -> SelectorList {
    let selectors = split_top_level(input)
        .into_iter()
        .map(|part| parse_complex_selector(part.trim()))
        .filter(|selector| !selector.is_empty())
        .collect();
    SelectorList { selectors }
}

/// Parse one complex selector (permissive, never fails).
/// Spec: Section 8 — Combinators; Section 6 — simple selectors
pub fn parse_complex_selector(input: &str) -> ComplexSelector {
    let mut tokens = SelectorTokenizer::new(input.trim());
    let mut compounds: Vec<CompoundSelector> = Vec::new();
    let mut combinators: Vec<Combinator> = Vec::new();
    let mut current = CompoundSelector::default();
    let mut pending_combinator: Option<Combinator> = None;

    while let Some(token) = tokens.next_token() {
        match token {
            Tok::DescendantWS => {
                if !current.simples.is_empty() {
                    compounds.push(take(&mut current));
                }
                if pending_combinator.is_none() && !compounds.is_empty() {
                    pending_combinator = Some(Combinator::Descendant);
                }
            }
            Tok::Combinator(comb) => {
                if !current.simples.is_empty() {
                    compounds.push(take(&mut current));
                }
                pending_combinator = Some(comb);
            }
            Tok::Simple(simple) => {
                if let Some(comb) = pending_combinator.take() {
                    if !compounds.is_empty() {
                        combinators.push(comb);
                    }
                }
                current.simples.push(simple);
            }
        }
    }
    if !current.simples.is_empty() {
        compounds.push(current);
    }

    let mut compounds = compounds.into_iter();
    let Some(first) = compounds.next() else {
        return ComplexSelector::default();
    };
    ComplexSelector {
        first,
        rest: combinators.into_iter().zip(compounds).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_with_attribute_substring() {
        let selector = parse_complex_selector("a.btn[href*=\"apply\"]");
        assert!(selector.rest.is_empty());
        assert_eq!(
            selector.first.simples,
            vec![
                SimpleSelector::Type(String::from("a")),
                SimpleSelector::Class(String::from("btn")),
                SimpleSelector::Attribute {
                    name: String::from("href"),
                    operator: AttrOperator::Substring,
                    value: String::from("apply"),
                },
            ]
        );
    }

    #[test]
    fn parses_combinators_with_and_without_spaces() {
        let selector = parse_complex_selector("nav > ul li+a");
        assert_eq!(selector.len(), 4);
        let combinators: Vec<Combinator> = selector.rest.iter().map(|pair| pair.0).collect();
        assert_eq!(
            combinators,
            vec![
                Combinator::Child,
                Combinator::Descendant,
                Combinator::AdjacentSibling
            ]
        );
    }

    #[test]
    fn list_split_ignores_commas_in_quotes() {
        let list = parse_selector_list("[data-x=\"a,b\"], .hero , button");
        assert_eq!(list.selectors.len(), 3);
    }

    #[test]
    fn pseudo_classes_degrade_to_invalid() {
        let selector = parse_complex_selector("a:not(.x)");
        assert_eq!(
            selector.first.simples,
            vec![
                SimpleSelector::Type(String::from("a")),
                SimpleSelector::Invalid
            ]
        );
    }

    #[test]
    fn empty_input_is_empty_selector() {
        assert!(parse_complex_selector("   ").is_empty());
        assert!(parse_selector_list(",,").is_empty());
    }
}
