//! In-memory host document
//!
//! This module stands in for the live document tree owned by the host page.
//! It provides exactly the primitives the cleaner relies on:
//!
//! - Selector queries over the connected tree
//! - Per-node text, tag, class and attribute accessors
//! - Node removal ("detach and discard", never reversible)
//! - Structural-change observers scoped to a node and its descendants
//!
//! # Node identity
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Ids are never reused,
//! so a reference held across a removal can always be recognised as stale. Every
//! operation on a stale id is a silent no-op.
//!
//! # Change notification
//!
//! ```text
//! append_child / remove → MutationRecord → every observer whose target is an
//!                                          ancestor-or-self of the mutated parent
//! ```
//!
//! Records are delivered over unbounded channels the moment the mutation happens.
//! A consumer that drains everything currently queued sees one "batch", which is
//! how the watcher groups notifications.

mod html;
mod matching;

pub use matching::Selector;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Document shared between the host and the cleaner tasks
pub type SharedDocument = Arc<Mutex<Document>>;

/// Lock the shared document.
///
/// A poisoned lock only means a task panicked while holding it; the arena is
/// still structurally valid, so the guard is recovered rather than propagated.
pub fn lock_document(document: &SharedDocument) -> MutexGuard<'_, Document> {
    document.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Stable identity of a node within one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Element payload: lowercase tag name plus attributes in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whitespace-separated entries of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.attrs.push((name, value.to_string())),
        }
    }
}

/// What a node holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Tombstone: set once the node (or an ancestor) was removed
    removed: bool,
}

/// One structural change, addressed to the parent whose child list changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

struct Observer {
    id: ObserverId,
    target: NodeId,
    tx: mpsc::UnboundedSender<MutationRecord>,
}

/// Arena-backed document tree rooted at a `<body>` element
pub struct Document {
    nodes: Vec<NodeData>,
    observers: Vec<Observer>,
    next_observer: u64,
    /// Markup outside `<body>` when loaded from a full page
    page: Option<html::PageShell>,
}

impl Document {
    /// Create an empty document containing only `<body>`
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            observers: Vec::new(),
            next_observer: 0,
            page: None,
        };
        doc.push_node(NodeKind::Element(ElementData::new("body")));
        doc
    }

    /// Wrap this document for sharing with cleaner tasks
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    /// The document root; it can never be removed
    pub fn body(&self) -> NodeId {
        NodeId(0)
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            removed: false,
        });
        id
    }

    fn live(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).filter(|node| !node.removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Construction (host side)
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an unparented element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData::new(tag)))
    }

    /// Create an unparented text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    /// Set an attribute on a live element. Returns false for stale ids or text nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(NodeData {
                kind: NodeKind::Element(element),
                removed: false,
                ..
            }) => {
                element.set_attr(name, value);
                true
            }
            _ => false,
        }
    }

    /// Append `child` to `parent`, notifying observers.
    ///
    /// Fails (returns false) when either node is stale, the parent is a text
    /// node, the child already has a parent, or the append would form a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let parent_ok = matches!(
            self.live(parent).map(|n| &n.kind),
            Some(NodeKind::Element(_))
        );
        let child_ok = self
            .live(child)
            .is_some_and(|n| n.parent.is_none() && child != self.body());
        if !parent_ok || !child_ok || self.is_inclusive_ancestor(child, parent) {
            return false;
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.notify(MutationRecord {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        true
    }

    /// Create an element with attributes and append it to `parent`
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attr(id, name, value);
        }
        self.append_child(parent, id);
        id
    }

    /// Create a text node and append it to `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────────────────

    /// Detach and discard a node with its whole subtree.
    ///
    /// Returns false when the node is already gone or is the body. Observers
    /// targeting anything inside the removed subtree are dropped, which closes
    /// their channels.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.body() || self.live(id).is_none() {
            return false;
        }

        let parent = self.nodes[id.0].parent.take();
        if let Some(parent) = parent {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            node.removed = true;
            stack.extend(node.children.iter().copied());
        }
        let nodes = &self.nodes;
        self.observers.retain(|o| !nodes[o.target.0].removed);

        if let Some(parent) = parent {
            self.notify(MutationRecord {
                target: parent,
                added: Vec::new(),
                removed: vec![id],
            });
        }
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────────

    /// Subscribe to child-list changes on `target` and all of its descendants
    pub fn observe(
        &mut self,
        target: NodeId,
    ) -> (ObserverId, mpsc::UnboundedReceiver<MutationRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        // Observing a stale node yields an already-closed receiver
        if self.live(target).is_some() {
            self.observers.push(Observer { id, target, tx });
        }
        (id, rx)
    }

    /// Stop delivering records to an observer
    pub fn disconnect(&mut self, observer: ObserverId) {
        self.observers.retain(|o| o.id != observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&mut self, record: MutationRecord) {
        if self.observers.is_empty() {
            return;
        }
        let mut chain = Vec::new();
        let mut current = Some(record.target);
        while let Some(id) = current {
            chain.push(id);
            current = self.nodes[id.0].parent;
        }
        // Closed receivers are pruned on the way
        self.observers.retain(|o| {
            if chain.contains(&o.target) {
                o.tx.send(record.clone()).is_ok()
            } else {
                !o.tx.is_closed()
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the id refers to a node that has not been removed
    pub fn contains(&self, id: NodeId) -> bool {
        self.live(id).is_some()
    }

    pub fn is_removed(&self, id: NodeId) -> bool {
        !self.contains(id)
    }

    /// Whether the node is reachable from the body
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_inclusive_ancestor(self.body(), id)
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.live(id).and_then(|n| n.parent);
        }
        false
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.live(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.live(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.live(id).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag())
    }

    /// Concatenated text of all descendant text nodes (DOM `textContent`)
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.kind(current) {
                Some(NodeKind::Text(text)) => out.push_str(text),
                Some(NodeKind::Element(_)) => {
                    stack.extend(self.children(current).iter().rev().copied());
                }
                None => {}
            }
        }
        out
    }

    /// All live descendants of `root` in document order, `root` excluded
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Number of live nodes, body included
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.removed).count()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn compose_doc() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.body();
        let compose = doc.append_element(body, "div", &[("contenteditable", "true")]);
        let line = doc.append_element(compose, "div", &[]);
        doc.append_text(line, "Hello ");
        let bold = doc.append_element(line, "b", &[]);
        doc.append_text(bold, "there");
        (doc, compose, line)
    }

    #[test]
    fn test_text_content_concatenates_without_separators() {
        let (mut doc, compose, _) = compose_doc();
        let second = doc.append_element(compose, "div", &[]);
        doc.append_text(second, "From: a@b.com");

        assert_eq!(doc.text_content(compose), "Hello thereFrom: a@b.com");
    }

    #[test]
    fn test_descendants_are_in_document_order() {
        let (doc, compose, line) = compose_doc();
        let descendants = doc.descendants(compose);

        assert_eq!(descendants[0], line);
        assert_eq!(descendants.len(), 4);
        assert!(!descendants.contains(&compose));
    }

    #[test]
    fn test_remove_discards_subtree() {
        let (mut doc, compose, line) = compose_doc();
        let inner = doc.descendants(line);

        assert!(doc.remove(line));
        assert!(doc.is_removed(line));
        assert!(inner.iter().all(|id| doc.is_removed(*id)));
        assert!(doc.children(compose).is_empty());
        assert_eq!(doc.text_content(compose), "");
    }

    #[test]
    fn test_stale_operations_are_noops() {
        let (mut doc, compose, line) = compose_doc();
        assert!(doc.remove(line));

        assert!(!doc.remove(line));
        assert!(!doc.set_attr(line, "class", "x"));
        assert!(doc.tag(line).is_none());
        assert_eq!(doc.text_content(line), "");
        assert!(doc.descendants(line).is_empty());

        let orphan = doc.create_element("div");
        assert!(!doc.append_child(line, orphan));
        assert!(doc.append_child(compose, orphan));
    }

    #[test]
    fn test_body_cannot_be_removed() {
        let mut doc = Document::new();
        let body = doc.body();
        assert!(!doc.remove(body));
        assert!(doc.is_connected(body));
    }

    #[test]
    fn test_append_rejects_cycles_and_reparenting() {
        let (mut doc, compose, line) = compose_doc();
        assert!(!doc.append_child(line, compose));
        assert!(!doc.append_child(compose, line));
        assert!(!doc.append_child(line, doc.body()));
    }

    #[test]
    fn test_observer_receives_subtree_changes() {
        let (mut doc, compose, line) = compose_doc();
        let (_id, mut rx) = doc.observe(compose);

        let added = doc.append_element(line, "span", &[]);
        doc.remove(added);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.target, line);
        assert_eq!(first.added, vec![added]);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.removed, vec![added]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_observer_ignores_changes_outside_target() {
        let (mut doc, compose, _) = compose_doc();
        let (_id, mut rx) = doc.observe(compose);

        let body = doc.body();
        doc.append_element(body, "nav", &[]);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_removing_observed_node_closes_channel() {
        let (mut doc, compose, _) = compose_doc();
        let (_id, mut rx) = doc.observe(compose);

        doc.remove(compose);

        assert_eq!(doc.observer_count(), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_disconnect_stops_delivery() {
        let (mut doc, compose, line) = compose_doc();
        let (id, mut rx) = doc.observe(compose);
        doc.disconnect(id);

        doc.append_element(line, "span", &[]);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_query_selector_all_matches_connected_elements() {
        let (mut doc, compose, _) = compose_doc();
        let selector = Selector::parse(r#"div[contenteditable="true"]"#).unwrap();
        let detached = doc.create_element("div");
        doc.set_attr(detached, "contenteditable", "true");

        assert_eq!(doc.query_selector_all(&selector), vec![compose]);
    }

    #[test]
    fn test_class_accessors() {
        let mut doc = Document::new();
        let body = doc.body();
        let quote = doc.append_element(
            body,
            "DIV",
            &[("class", "gmail_quote  gmail_quote_container")],
        );
        let element = doc.element(quote).unwrap();

        assert_eq!(element.tag(), "div");
        assert!(element.has_class("gmail_quote"));
        assert!(!element.has_class("gmail"));
        assert_eq!(element.classes().count(), 2);
    }
}
