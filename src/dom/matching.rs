//! CSS selector queries over the arena
//!
//! Selectors are parsed with scraper's selector grammar and matched through the
//! `selectors` crate, so any selector `scraper::Selector::parse` accepts (lists,
//! combinators, attribute operators, `:not`, `:has`) works against the live tree.

use super::{Document, ElementData, NodeId, NodeKind};
use anyhow::{anyhow, Result};
use html5ever::Namespace;
use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use scraper::CaseSensitivity;
use selectors::attr::{AttrSelectorOperation, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{self, ElementSelectorFlags, MatchingContext};
use selectors::parser::ParseRelative;
use selectors::{Element, OpaqueElement, SelectorList};
use std::fmt;
use std::str::FromStr;

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed selector group, keeping the configured text for reporting
#[derive(Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<Simple>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&Parser, &mut parser, ParseRelative::No)
            .map_err(|e| anyhow!("{}", SelectorErrorKind::from(e)))?;
        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    /// The selector text as configured
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the live element `id` matches
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let mut caches = matching::SelectorCaches::default();
        let mut context = new_context(&mut caches);
        ArenaElement::new(doc, id).is_some_and(|element| {
            matching::matches_selector_list(&self.list, &element, &mut context)
        })
    }
}

fn new_context(caches: &mut matching::SelectorCaches) -> MatchingContext<'_, Simple> {
    MatchingContext::new(
        matching::MatchingMode::Normal,
        None,
        caches,
        matching::QuirksMode::NoQuirks,
        matching::NeedsSelectorFlags::No,
        matching::MatchingForInvalidation::No,
    )
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Selector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Document {
    /// Connected elements matching `selector`, in document order
    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        let body = self.body();
        let mut caches = matching::SelectorCaches::default();
        let mut context = new_context(&mut caches);
        std::iter::once(body)
            .chain(self.descendants(body))
            .filter(|id| {
                ArenaElement::new(self, *id).is_some_and(|element| {
                    matching::matches_selector_list(&selector.list, &element, &mut context)
                })
            })
            .collect()
    }
}

/// A live element of the arena, seen through the `selectors` matching API
#[derive(Clone, Copy)]
struct ArenaElement<'a> {
    doc: &'a Document,
    id: NodeId,
    data: &'a ElementData,
}

impl<'a> ArenaElement<'a> {
    fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.element(id).map(|data| Self { doc, id, data })
    }

    /// Nearest element among `ids`, scanning in iteration order
    fn first_element(doc: &'a Document, mut ids: impl Iterator<Item = &'a NodeId>) -> Option<Self> {
        ids.find_map(|id| Self::new(doc, *id))
    }

    fn siblings(&self) -> (&'a [NodeId], usize) {
        let Some(parent) = self.doc.parent(self.id) else {
            return (&[], 0);
        };
        let siblings = self.doc.children(parent);
        let position = siblings.iter().position(|c| *c == self.id).unwrap_or(0);
        (siblings, position)
    }
}

impl fmt::Debug for ArenaElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> {}", self.data.tag(), self.id)
    }
}

impl<'a> Element for ArenaElement<'a> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.data)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc
            .parent(self.id)
            .and_then(|parent| Self::new(self.doc, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        Self::first_element(self.doc, siblings[..position].iter().rev())
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        Self::first_element(self.doc, siblings.iter().skip(position + 1))
    }

    fn first_element_child(&self) -> Option<Self> {
        Self::first_element(self.doc, self.doc.children(self.id).iter())
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        &*name.0 == self.data.tag()
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        &**namespace == XHTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.tag() == other.data.tag()
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        // arena attributes carry no namespace
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.is_empty() {
                return false;
            }
        }
        self.data
            .attrs()
            .any(|(name, value)| name == &*local_name.0 && operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.data.tag() == "link"
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .classes()
            .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.id).iter().all(|child| match self.doc.kind(*child) {
            Some(NodeKind::Text(text)) => text.is_empty(),
            Some(NodeKind::Element(_)) => false,
            None => true,
        })
    }

    fn is_root(&self) -> bool {
        self.id == self.doc.body()
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose_page() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.body();
        let shell = doc.append_element(body, "div", &[("class", "editable dialog")]);
        let inner = doc.append_element(shell, "div", &[("contenteditable", "true"), ("id", "msg")]);
        let other = doc.append_element(body, "div", &[("contenteditable", "true")]);
        (doc, inner, other)
    }

    #[test]
    fn test_attribute_value_selector() {
        let (doc, inner, other) = compose_page();
        let selector = Selector::parse(r#"div[contenteditable="true"]"#).unwrap();

        assert_eq!(doc.query_selector_all(&selector), vec![inner, other]);
    }

    #[test]
    fn test_child_combinator_scopes_to_parent() {
        let (doc, inner, _) = compose_page();
        let selector = Selector::parse(r#"div.editable > div[contenteditable="true"]"#).unwrap();

        assert_eq!(doc.query_selector_all(&selector), vec![inner]);
    }

    #[test]
    fn test_compound_class_selector() {
        let mut doc = Document::new();
        let body = doc.body();
        let full = doc.append_element(body, "div", &[("class", "Am Al editable LW-avf")]);
        doc.append_element(body, "div", &[("class", "Am Al")]);
        let selector = Selector::parse("div.Am.Al.editable").unwrap();

        assert_eq!(doc.query_selector_all(&selector), vec![full]);
    }

    #[test]
    fn test_attribute_operators_and_negation() {
        let mut doc = Document::new();
        let body = doc.body();
        let reply = doc.append_element(body, "div", &[("aria-label", "Message Body reply")]);
        doc.append_element(body, "div", &[("aria-label", "Search")]);
        let id = doc.append_element(body, "section", &[("id", "msg")]);

        let contains = Selector::parse(r#"div[aria-label*="Message Body"]"#).unwrap();
        let negated = Selector::parse("#msg:not(div)").unwrap();

        assert_eq!(doc.query_selector_all(&contains), vec![reply]);
        assert_eq!(doc.query_selector_all(&negated), vec![id]);
        assert!(contains.matches(&doc, reply));
    }

    #[test]
    fn test_removed_elements_never_match() {
        let (mut doc, inner, other) = compose_page();
        let selector = Selector::parse("[contenteditable]").unwrap();
        doc.remove(other);

        assert_eq!(doc.query_selector_all(&selector), vec![inner]);
        assert!(!selector.matches(&doc, other));
    }

    #[test]
    fn test_rejects_malformed_selectors() {
        assert!(Selector::parse("div[role").is_err());
        assert!(Selector::parse("   ").is_err());
        assert!(Selector::parse("div.").is_err());
        assert!(Selector::parse("div >").is_err());
    }

    #[test]
    fn test_display_keeps_source() {
        let selector: Selector = " div[role=\"textbox\"] ".parse().unwrap();
        assert_eq!(selector.to_string(), "div[role=\"textbox\"]");
    }
}
