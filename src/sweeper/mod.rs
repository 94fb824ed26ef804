//! Tree sweeper - removes reply-chain content from a subtree
//!
//! # Architecture
//!
//! ```text
//! root → descendants (document order) → [Marker, Structural, Generic] → removals
//! ```
//!
//! Every element below the root is claimed by exactly one strategy:
//!
//! - **Marker**: carries a quoted-content marker class. Removed unconditionally.
//! - **Structural**: a quotation tag (`blockquote`). Removed when its own text
//!   classifies as a reply chain.
//! - **Generic**: any other element. Removed when its own text classifies as a
//!   reply chain.
//!
//! Strategies run in that order over one traversal of the subtree. Marker
//! removals first shrink what the text strategies have to look at, and a node
//! whose ancestor was already removed is never visited again. The root itself
//! is never removed.
//!
//! # Idempotence
//!
//! A second sweep over an unchanged subtree finds nothing to remove: it
//! performs no mutation and so triggers no change notification.

use crate::dom::{Document, ElementData, NodeId};
use crate::heuristics::HeuristicSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

/// Detection strategy, in the order the sweeper applies them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStrategy {
    Marker,
    Structural,
    Generic,
}

impl SweepStrategy {
    /// Fixed application order
    pub const ORDER: [SweepStrategy; 3] = [
        SweepStrategy::Marker,
        SweepStrategy::Structural,
        SweepStrategy::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SweepStrategy::Marker => "marker",
            SweepStrategy::Structural => "structural",
            SweepStrategy::Generic => "generic",
        }
    }

    /// Whether this strategy is responsible for the element. Every element is
    /// claimed by exactly one strategy.
    pub fn claims(&self, heuristics: &HeuristicSet, element: &ElementData) -> bool {
        let is_marker = heuristics.is_marker(element);
        let is_quote = heuristics.is_quote_tag(element);
        match self {
            SweepStrategy::Marker => is_marker,
            SweepStrategy::Structural => is_quote && !is_marker,
            SweepStrategy::Generic => !is_quote && !is_marker,
        }
    }

    /// Pure predicate: the node is claimed and judged reply-chain.
    ///
    /// Returns the name of the heuristic that fired ("marker" for marker nodes).
    pub fn matches<'h>(
        &self,
        heuristics: &'h HeuristicSet,
        doc: &Document,
        id: NodeId,
    ) -> Option<&'h str> {
        let element = doc.element(id)?;
        if !self.claims(heuristics, element) {
            return None;
        }
        if *self == SweepStrategy::Marker {
            return Some("marker");
        }
        heuristics
            .matcher()
            .explain(&doc.text_content(id))
            .map(|pattern| pattern.name())
    }
}

// ============================================================================
// Sweep Report
// ============================================================================

/// One node removed by a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub node: NodeId,
    pub tag: String,
    pub strategy: SweepStrategy,
    /// Heuristic that triggered the removal ("marker" for marker nodes)
    pub heuristic: String,
}

/// Outcome of one sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub root: NodeId,
    pub removals: Vec<Removal>,
    /// Nodes a strategy claimed (and, for text strategies, classified)
    pub examined: usize,
}

impl SweepReport {
    fn new(root: NodeId) -> Self {
        Self {
            root,
            removals: Vec::new(),
            examined: 0,
        }
    }

    pub fn removed_count(&self) -> usize {
        self.removals.len()
    }

    /// True when the sweep found nothing to remove
    pub fn is_clean(&self) -> bool {
        self.removals.is_empty()
    }
}

// ============================================================================
// Tree Sweeper
// ============================================================================

/// Applies the ordered strategies to a subtree
#[derive(Debug, Clone)]
pub struct TreeSweeper {
    heuristics: Arc<HeuristicSet>,
    strategies: Vec<SweepStrategy>,
}

impl TreeSweeper {
    /// Create a sweeper with the standard strategy order
    pub fn new(heuristics: Arc<HeuristicSet>) -> Self {
        Self {
            heuristics,
            strategies: SweepStrategy::ORDER.to_vec(),
        }
    }

    /// Remove every reply-chain node below `root`.
    ///
    /// A stale or removed root yields an empty report.
    pub fn sweep(&self, doc: &mut Document, root: NodeId) -> SweepReport {
        let mut report = SweepReport::new(root);
        if !doc.contains(root) {
            tracing::trace!(root = %root, "Sweep skipped: root no longer exists");
            return report;
        }

        let nodes = doc.descendants(root);

        for strategy in &self.strategies {
            for &id in &nodes {
                // Removed by an earlier strategy, or inside something that was
                let Some(element) = doc.element(id) else {
                    continue;
                };
                if !strategy.claims(&self.heuristics, element) {
                    continue;
                }
                report.examined += 1;

                let Some(heuristic) = strategy.matches(&self.heuristics, doc, id) else {
                    continue;
                };
                let heuristic = heuristic.to_string();

                let tag = doc.tag(id).unwrap_or_default().to_string();
                if doc.remove(id) {
                    tracing::debug!(
                        root = %root,
                        node = %id,
                        tag = %tag,
                        strategy = strategy.as_str(),
                        heuristic = %heuristic,
                        "Removing <{}> ({} strategy, {})",
                        tag,
                        strategy.as_str(),
                        heuristic
                    );
                    report.removals.push(Removal {
                        node: id,
                        tag,
                        strategy: *strategy,
                        heuristic,
                    });
                }
            }
        }

        report
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sweeper() -> TreeSweeper {
        TreeSweeper::new(Arc::new(HeuristicSet::default()))
    }

    fn compose(doc: &mut Document) -> NodeId {
        let body = doc.body();
        doc.append_element(body, "div", &[("contenteditable", "true")])
    }

    fn div_with_text(doc: &mut Document, parent: NodeId, text: &str) -> NodeId {
        let div = doc.append_element(parent, "div", &[]);
        doc.append_text(div, text);
        div
    }

    #[test]
    fn test_mixed_subtree_scenario() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let marker = doc.append_element(root, "div", &[("class", "gmail_quote")]);
        doc.append_text(marker, "anything at all");
        let quote = doc.append_element(root, "blockquote", &[]);
        doc.append_text(quote, "Measure twice, cut once.");
        let from = div_with_text(&mut doc, root, "From: Alice <alice@example.com>");

        let report = sweeper().sweep(&mut doc, root);

        assert!(doc.is_removed(marker));
        assert!(doc.is_removed(from));
        assert!(doc.contains(quote));
        assert_eq!(report.removed_count(), 2);
        assert_eq!(report.removals[0].strategy, SweepStrategy::Marker);
        assert_eq!(report.removals[1].strategy, SweepStrategy::Generic);
        assert_eq!(report.removals[1].heuristic, "from-header");
    }

    #[test]
    fn test_marker_removed_regardless_of_text() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let empty_marker = doc.append_element(root, "div", &[("class", "gmail_quote")]);
        let span_marker = doc.append_element(root, "span", &[("class", "x gmail_quote")]);
        doc.append_text(span_marker, "plain words");

        let report = sweeper().sweep(&mut doc, root);

        assert!(doc.is_removed(empty_marker));
        assert!(doc.is_removed(span_marker));
        assert!(report
            .removals
            .iter()
            .all(|r| r.strategy == SweepStrategy::Marker && r.heuristic == "marker"));
    }

    #[test]
    fn test_matching_blockquote_removed_by_structural_strategy() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let quote = doc.append_element(root, "blockquote", &[]);
        doc.append_text(quote, "On Mon, Jan 1, 2024 at 10:00 AM, a@b.com wrote:\nold text");

        let report = sweeper().sweep(&mut doc, root);

        assert!(doc.is_removed(quote));
        assert_eq!(report.removals[0].strategy, SweepStrategy::Structural);
        assert_eq!(report.removals[0].tag, "blockquote");
    }

    #[test]
    fn test_root_is_never_removed() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        doc.set_attr(root, "class", "gmail_quote");
        doc.append_text(root, "From: root text itself");

        let report = sweeper().sweep(&mut doc, root);

        assert!(doc.is_connected(root));
        assert!(report.is_clean());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        div_with_text(&mut doc, root, "Thanks!");
        div_with_text(&mut doc, root, "Subject: Re: lunch");
        let sweeper = sweeper();

        let first = sweeper.sweep(&mut doc, root);
        let html_after_first = doc.outer_html(root);
        let second = sweeper.sweep(&mut doc, root);

        assert_eq!(first.removed_count(), 1);
        assert!(second.is_clean());
        assert_eq!(doc.outer_html(root), html_after_first);
    }

    #[test]
    fn test_clean_sweep_emits_no_notifications() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        div_with_text(&mut doc, root, "Just a note");
        let (_observer, mut rx) = doc.observe(root);

        let report = sweeper().sweep(&mut doc, root);

        assert!(report.is_clean());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_subtree() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let (_observer, mut rx) = doc.observe(root);

        let report = sweeper().sweep(&mut doc, root);

        assert!(report.is_clean());
        assert_eq!(report.examined, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_removed_root_is_a_noop() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        doc.remove(root);

        let report = sweeper().sweep(&mut doc, root);
        assert!(report.is_clean());
    }

    #[test]
    fn test_descendants_of_removed_nodes_are_not_revisited() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let marker = doc.append_element(root, "div", &[("class", "gmail_quote")]);
        let nested_quote = doc.append_element(marker, "blockquote", &[]);
        doc.append_text(nested_quote, "From: nested");
        let nested_div = div_with_text(&mut doc, marker, "To: nested");

        let report = sweeper().sweep(&mut doc, root);

        // Only the marker itself is reported; its subtree went with it
        assert_eq!(report.removed_count(), 1);
        assert_eq!(report.removals[0].node, marker);
        assert!(doc.is_removed(nested_quote));
        assert!(doc.is_removed(nested_div));
    }

    #[test]
    fn test_outermost_matching_element_wins() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let wrapper = doc.append_element(root, "div", &[]);
        doc.append_text(wrapper, "From: Alice\n");
        let inner = div_with_text(&mut doc, wrapper, "Sent: Monday");

        let report = sweeper().sweep(&mut doc, root);

        assert_eq!(report.removed_count(), 1);
        assert_eq!(report.removals[0].node, wrapper);
        assert!(doc.is_removed(inner));
    }

    #[test]
    fn test_child_matches_when_parent_text_runs_together() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let wrapper = doc.append_element(root, "div", &[]);
        let greeting = div_with_text(&mut doc, wrapper, "Hi there");
        let header = div_with_text(&mut doc, wrapper, "From: a@b.com");

        sweeper().sweep(&mut doc, root);

        // "Hi thereFrom: a@b.com" has no header at a line start, the child does
        assert!(doc.contains(wrapper));
        assert!(doc.contains(greeting));
        assert!(doc.is_removed(header));
    }

    #[test]
    fn test_non_matching_blockquote_with_nested_quote_is_kept() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let outer = doc.append_element(root, "blockquote", &[]);
        doc.append_text(outer, "As the saying goes");
        let inner = doc.append_element(outer, "blockquote", &[]);
        doc.append_text(inner, " measure twice");

        let report = sweeper().sweep(&mut doc, root);

        assert!(report.is_clean());
        assert!(doc.contains(outer));
        assert!(doc.contains(inner));
    }

    #[test]
    fn test_each_element_claimed_by_one_strategy() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        let marker_quote = doc.append_element(root, "blockquote", &[("class", "gmail_quote")]);
        doc.append_text(marker_quote, "From: someone");
        let heuristics = HeuristicSet::default();

        let element = doc.element(marker_quote).unwrap();
        let claims: Vec<_> = SweepStrategy::ORDER
            .iter()
            .filter(|s| s.claims(&heuristics, element))
            .collect();
        assert_eq!(claims, vec![&SweepStrategy::Marker]);
        assert_eq!(
            SweepStrategy::Marker.matches(&heuristics, &doc, marker_quote),
            Some("marker")
        );
        assert_eq!(
            SweepStrategy::Generic.matches(&heuristics, &doc, marker_quote),
            None
        );
    }

    #[test]
    fn test_each_node_examined_once() {
        let mut doc = Document::new();
        let root = compose(&mut doc);
        div_with_text(&mut doc, root, "one");
        let quote = doc.append_element(root, "blockquote", &[]);
        doc.append_text(quote, "two");
        let span = doc.append_element(root, "span", &[]);
        doc.append_text(span, "three");

        let report = sweeper().sweep(&mut doc, root);

        // three elements, each claimed by exactly one strategy; text nodes are not
        assert_eq!(report.examined, 3);
    }
}
