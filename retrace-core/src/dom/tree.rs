//! Document arena and tree operations

use std::collections::BTreeMap;

use super::events::{ListenerId, Listener};
use super::node::{ElementData, NodeData, NodeKey, NodeKind, ScrollOffset, ShadowRootData, Viewport};
use super::observer::{MutationRecord, Observer, ObserverId};
use super::style::StyleSheet;

/// In-memory host document.
///
/// Nodes live in an arena and are never freed, so a detached node keeps its
/// key and can be reinserted. Every structural, attribute and character data
/// change is reported to the observers of the affected tree.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeKey,
    body: NodeKey,
    url: String,
    pub(crate) viewport: Viewport,
    pub(crate) scroll: ScrollOffset,
    pub(crate) has_focus: bool,
    pub(crate) observers: BTreeMap<ObserverId, Observer>,
    pub(crate) next_observer_id: u64,
    pub(crate) listeners: BTreeMap<ListenerId, Listener>,
    pub(crate) next_listener_id: u64,
}

impl Document {
    /// Create a document with an `html` element holding `head` and `body`
    pub fn new(url: impl Into<String>) -> Self {
        let mut doc = Self {
            nodes: vec![NodeData::new(NodeKind::Document)],
            root: NodeKey(0),
            body: NodeKey(0),
            url: url.into(),
            viewport: Viewport::default(),
            scroll: ScrollOffset::default(),
            has_focus: true,
            observers: BTreeMap::new(),
            next_observer_id: 1,
            listeners: BTreeMap::new(),
            next_listener_id: 1,
        };
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.append_child(doc.root, html);
        doc.append_child(html, head);
        doc.append_child(html, body);
        doc.body = body;
        doc
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn body(&self) -> NodeKey {
        self.body
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn has_focus(&self) -> bool {
        self.has_focus
    }

    fn insert_node(&mut self, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(kind));
        key
    }

    pub(crate) fn node(&self, key: NodeKey) -> &NodeData {
        &self.nodes[key.index()]
    }

    pub(crate) fn node_mut(&mut self, key: NodeKey) -> &mut NodeData {
        &mut self.nodes[key.index()]
    }

    // Creation

    pub fn create_element(&mut self, tag_name: &str) -> NodeKey {
        self.insert_node(NodeKind::Element(ElementData::new(tag_name)))
    }

    /// Element whose content the recorder cannot inspect
    pub fn create_foreign_element(&mut self, tag_name: &str) -> NodeKey {
        let mut element = ElementData::new(tag_name);
        element.foreign = true;
        self.insert_node(NodeKind::Element(element))
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> NodeKey {
        self.insert_node(NodeKind::Text(data.into()))
    }

    pub fn create_cdata(&mut self, data: impl Into<String>) -> NodeKey {
        self.insert_node(NodeKind::CData(data.into()))
    }

    pub fn create_comment(&mut self, data: impl Into<String>) -> NodeKey {
        self.insert_node(NodeKind::Comment(data.into()))
    }

    pub fn create_doctype(&mut self, name: &str, public_id: &str, system_id: &str) -> NodeKey {
        self.insert_node(NodeKind::DocumentType {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        })
    }

    /// Attach a shadow root to `host`, returning the existing one if present
    pub fn attach_shadow(&mut self, host: NodeKey) -> NodeKey {
        if let Some(existing) = self.shadow_root(host) {
            return existing;
        }
        let shadow = self.insert_node(NodeKind::ShadowRoot(ShadowRootData {
            host,
            adopted_style_sheets: Vec::new(),
        }));
        if let NodeKind::Element(element) = &mut self.node_mut(host).kind {
            element.shadow_root = Some(shadow);
        }
        shadow
    }

    // Structure

    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` before `reference` (or last), detaching it first
    pub fn insert_before(&mut self, parent: NodeKey, child: NodeKey, reference: Option<NodeKey>) {
        if self.is_inclusive_ancestor(child, parent) || reference == Some(child) {
            return;
        }
        if self.node(child).parent.is_some() {
            self.remove(child);
        }
        let children = &mut self.node_mut(parent).children;
        let position = reference
            .and_then(|reference| children.iter().position(|c| *c == reference))
            .unwrap_or(children.len());
        children.insert(position, child);
        self.node_mut(child).parent = Some(parent);
        self.queue_mutation(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
    }

    /// Detach a node from its parent; no-op for a detached node
    pub fn remove(&mut self, child: NodeKey) {
        let Some(parent) = self.node(child).parent else {
            return;
        };
        self.node_mut(parent).children.retain(|c| *c != child);
        self.node_mut(child).parent = None;
        self.queue_mutation(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
        });
    }

    // Attributes and character data

    pub fn set_attribute(&mut self, node: NodeKey, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let NodeKind::Element(element) = &mut self.node_mut(node).kind else {
            return;
        };
        let old_value = element.attributes.insert(name.clone(), value.to_string());
        self.queue_mutation(MutationRecord::Attributes {
            target: node,
            name,
            old_value,
        });
    }

    pub fn remove_attribute(&mut self, node: NodeKey, name: &str) {
        let name = name.to_ascii_lowercase();
        let NodeKind::Element(element) = &mut self.node_mut(node).kind else {
            return;
        };
        if let Some(old_value) = element.attributes.remove(&name) {
            self.queue_mutation(MutationRecord::Attributes {
                target: node,
                name,
                old_value: Some(old_value),
            });
        }
    }

    /// Replace the data of a text, CDATA or comment node
    pub fn set_text(&mut self, node: NodeKey, data: impl Into<String>) {
        match &mut self.node_mut(node).kind {
            NodeKind::Text(current) | NodeKind::CData(current) | NodeKind::Comment(current) => {
                *current = data.into();
            }
            _ => return,
        }
        self.queue_mutation(MutationRecord::CharacterData { target: node });
    }

    /// Set the parsed sheet of a `style` element or stylesheet `link`
    pub fn set_sheet(&mut self, node: NodeKey, sheet: StyleSheet) {
        if let NodeKind::Element(element) = &mut self.node_mut(node).kind {
            element.sheet = Some(sheet);
        }
    }

    pub fn set_adopted_style_sheets(&mut self, shadow_root: NodeKey, sheets: Vec<StyleSheet>) {
        if let NodeKind::ShadowRoot(shadow) = &mut self.node_mut(shadow_root).kind {
            shadow.adopted_style_sheets = sheets;
        }
    }

    /// Set the `selected` state of an `option`
    pub fn set_selected(&mut self, option: NodeKey, selected: bool) {
        if let NodeKind::Element(element) = &mut self.node_mut(option).kind {
            element.selected = selected;
        }
    }

    // Access

    pub fn kind(&self, node: NodeKey) -> &NodeKind {
        &self.node(node).kind
    }

    pub fn element(&self, node: NodeKey) -> Option<&ElementData> {
        match &self.node(node).kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, node: NodeKey) -> Option<&str> {
        self.element(node).map(|element| element.tag_name.as_str())
    }

    pub fn attribute(&self, node: NodeKey, name: &str) -> Option<&str> {
        self.element(node)
            .and_then(|element| element.attributes.get(name))
            .map(String::as_str)
    }

    /// Character data of a text, CDATA or comment node
    pub fn text(&self, node: NodeKey) -> Option<&str> {
        self.node(node).kind.character_data()
    }

    /// Live value of a form control, falling back to its `value` attribute
    pub fn value(&self, control: NodeKey) -> Option<&str> {
        let element = self.element(control)?;
        element
            .value
            .as_deref()
            .or_else(|| element.attributes.get("value").map(String::as_str))
    }

    pub fn parent(&self, node: NodeKey) -> Option<NodeKey> {
        self.node(node).parent
    }

    pub fn children(&self, node: NodeKey) -> &[NodeKey] {
        &self.node(node).children
    }

    pub fn shadow_root(&self, host: NodeKey) -> Option<NodeKey> {
        self.element(host).and_then(|element| element.shadow_root)
    }

    pub fn shadow_host(&self, shadow_root: NodeKey) -> Option<NodeKey> {
        match &self.node(shadow_root).kind {
            NodeKind::ShadowRoot(shadow) => Some(shadow.host),
            _ => None,
        }
    }

    pub fn is_shadow_root(&self, node: NodeKey) -> bool {
        matches!(self.node(node).kind, NodeKind::ShadowRoot(_))
    }

    /// Siblings following `node`, nearest first
    pub fn following_siblings(&self, node: NodeKey) -> &[NodeKey] {
        let Some(parent) = self.parent(node) else {
            return &[];
        };
        let siblings = self.children(parent);
        match siblings.iter().position(|c| *c == node) {
            Some(index) => &siblings[index + 1..],
            None => &[],
        }
    }

    pub fn scroll_offset(&self, node: NodeKey) -> ScrollOffset {
        if node == self.root {
            return self.scroll;
        }
        self.element(node)
            .map(|element| element.scroll)
            .unwrap_or_default()
    }

    // Tree relationships

    /// Parent, or host for a shadow root
    pub fn parent_or_host(&self, node: NodeKey) -> Option<NodeKey> {
        self.parent(node).or_else(|| self.shadow_host(node))
    }

    /// Topmost ancestor reachable through parents only
    pub fn tree_root(&self, node: NodeKey) -> NodeKey {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// True when `ancestor` is `node` or one of its parents (light tree only)
    pub fn is_inclusive_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut current = Some(node);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.parent(key);
        }
        false
    }

    /// True when `node` is in the tree rooted at `root`
    pub fn is_connected_to(&self, node: NodeKey, root: NodeKey) -> bool {
        self.tree_root(node) == root
    }

    /// True when `node` reaches the document through parents and shadow hosts
    pub fn is_connected(&self, node: NodeKey) -> bool {
        let mut current = node;
        loop {
            let top = self.tree_root(current);
            if top == self.root {
                return true;
            }
            match self.shadow_host(top) {
                Some(host) => current = host,
                None => return false,
            }
        }
    }

    /// Child indices from the tree root down to `node`
    pub fn path_from_root(&self, node: NodeKey) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            let index = self
                .children(parent)
                .iter()
                .position(|c| *c == current)
                .unwrap_or_default();
            path.push(index);
            current = parent;
        }
        path.reverse();
        path
    }

    /// `node` and all its descendants in document order, shadow trees included
    /// right after their host's light children
    pub fn inclusive_descendants(&self, node: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(shadow) = self.shadow_root(current) {
                stack.push(shadow);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton() {
        let doc = Document::new("https://example.test/");
        assert_eq!(doc.tag_name(doc.body()), Some("body"));
        assert_eq!(doc.children(doc.root()).len(), 1);
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn test_append_moves_node_and_reports_both_sides() {
        let mut doc = Document::new("https://example.test/");
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let child = doc.create_text("hi");
        doc.append_child(doc.body(), a);
        doc.append_child(doc.body(), b);
        doc.append_child(a, child);

        let observer = doc.observe(doc.root());
        doc.append_child(b, child);

        let records = doc.take_records(observer);
        assert_eq!(
            records,
            vec![
                MutationRecord::ChildList {
                    target: a,
                    added: vec![],
                    removed: vec![child],
                },
                MutationRecord::ChildList {
                    target: b,
                    added: vec![child],
                    removed: vec![],
                },
            ]
        );
    }

    #[test]
    fn test_insert_before_and_siblings() {
        let mut doc = Document::new("https://example.test/");
        let first = doc.create_element("p");
        let second = doc.create_element("p");
        let third = doc.create_element("p");
        doc.append_child(doc.body(), first);
        doc.append_child(doc.body(), third);
        doc.insert_before(doc.body(), second, Some(third));

        assert_eq!(doc.children(doc.body()), &[first, second, third]);
        assert_eq!(doc.following_siblings(first), &[second, third]);
        assert_eq!(doc.path_from_root(second), vec![0, 1, 1]);
    }

    #[test]
    fn test_attribute_old_values() {
        let mut doc = Document::new("https://example.test/");
        let div = doc.create_element("div");
        doc.append_child(doc.body(), div);
        let observer = doc.observe(doc.root());

        doc.set_attribute(div, "Title", "one");
        doc.set_attribute(div, "title", "two");
        doc.remove_attribute(div, "title");
        doc.remove_attribute(div, "title");

        let old_values: Vec<_> = doc
            .take_records(observer)
            .into_iter()
            .map(|record| match record {
                MutationRecord::Attributes { old_value, .. } => old_value,
                other => panic!("unexpected record {:?}", other),
            })
            .collect();
        assert_eq!(
            old_values,
            vec![None, Some("one".to_string()), Some("two".to_string())]
        );
    }

    #[test]
    fn test_shadow_connectivity() {
        let mut doc = Document::new("https://example.test/");
        let host = doc.create_element("div");
        doc.append_child(doc.body(), host);
        let shadow = doc.attach_shadow(host);
        let span = doc.create_element("span");
        doc.append_child(shadow, span);

        assert_eq!(doc.attach_shadow(host), shadow);
        assert_eq!(doc.tree_root(span), shadow);
        assert!(doc.is_connected_to(span, shadow));
        assert!(!doc.is_connected_to(span, doc.root()));
        assert!(doc.is_connected(span));
        assert_eq!(doc.parent_or_host(shadow), Some(host));
        assert_eq!(doc.inclusive_descendants(host), vec![host, shadow, span]);

        doc.remove(host);
        assert!(!doc.is_connected(span));
    }

    #[test]
    fn test_cycles_are_refused() {
        let mut doc = Document::new("https://example.test/");
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(doc.body(), outer);
        doc.append_child(outer, inner);
        doc.append_child(inner, outer);
        assert_eq!(doc.parent(outer), Some(doc.body()));
    }
}
