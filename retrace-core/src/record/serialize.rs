//! Tree serialization
//!
//! Turns a document or shadow root into a [`SerializedNode`] tree, assigning
//! ids through the [`IdentityRegistry`] and applying the redaction policy on
//! the way down. Used for full snapshots and for nodes added by mutations.

use std::collections::{BTreeMap, HashSet};

use crate::dom::{Document, ElementData, NodeKey, NodeKind};
use crate::types::{NodeId, SerializedNode, SerializedNodeData, StyleSheetRules};

use super::identity::IdentityRegistry;
use super::privacy::{self, PrivacyLevel, RedactionPolicy};

/// Attribute carrying the inlined CSS of a style carrier
pub const CSS_TEXT_ATTRIBUTE: &str = "_cssText";

/// Why a serialization pass is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationStatus {
    InitialFullSnapshot,
    SubsequentFullSnapshot,
    Mutation,
}

/// Per-pass state lent to the snapshotter
#[derive(Debug)]
pub struct SerializationContext<'a> {
    pub registry: &'a mut IdentityRegistry,
    pub status: SerializationStatus,
    /// Ids emitted during this pass
    pub serialized_ids: HashSet<NodeId>,
    /// Shadow roots met during this pass
    pub shadow_roots: Vec<NodeKey>,
}

impl<'a> SerializationContext<'a> {
    pub fn new(registry: &'a mut IdentityRegistry, status: SerializationStatus) -> Self {
        Self {
            registry,
            status,
            serialized_ids: HashSet::new(),
            shadow_roots: Vec::new(),
        }
    }

    /// True when `node` was emitted during this pass
    pub fn has_been_serialized(&self, node: NodeKey) -> bool {
        self.registry
            .id_of(node)
            .is_some_and(|id| self.serialized_ids.contains(&id))
    }
}

/// Tags never serialized
#[derive(Debug, Clone)]
pub struct IgnoreList {
    tags: HashSet<String>,
}

impl IgnoreList {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags
                .into_iter()
                .map(|tag| tag.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// True for ignore-listed elements and `link`s that are not stylesheets
    pub fn is_ignored(&self, doc: &Document, node: NodeKey) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };
        self.tags.contains(&element.tag_name)
            || (element.tag_name == "link" && !element.is_stylesheet_link())
    }
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self::new(["script", "noscript"])
    }
}

/// Serializer over one document
pub struct Snapshotter<'d> {
    doc: &'d Document,
    policy: &'d RedactionPolicy,
    ignore: &'d IgnoreList,
}

impl<'d> Snapshotter<'d> {
    pub fn new(doc: &'d Document, policy: &'d RedactionPolicy, ignore: &'d IgnoreList) -> Self {
        Self {
            doc,
            policy,
            ignore,
        }
    }

    /// Serialize a document or shadow root with the level inherited from above it
    pub fn serialize(&self, root: NodeKey, cx: &mut SerializationContext<'_>) -> Option<SerializedNode> {
        let parent_level = self
            .policy
            .level_below(self.doc, self.doc.parent_or_host(root));
        self.serialize_node(root, parent_level, cx)
    }

    /// Serialize `node` below a parent resolved to `parent_level`.
    ///
    /// Returns `None` for ignored nodes and hidden subtrees.
    pub fn serialize_node(
        &self,
        node: NodeKey,
        parent_level: PrivacyLevel,
        cx: &mut SerializationContext<'_>,
    ) -> Option<SerializedNode> {
        if self.ignore.is_ignored(self.doc, node) {
            return None;
        }
        let level = privacy::child_level(self.doc, node, parent_level);
        if level == PrivacyLevel::Hidden {
            return None;
        }

        let id = cx.registry.assign(node);
        cx.serialized_ids.insert(id);

        let data = match self.doc.kind(node) {
            NodeKind::Document => SerializedNodeData::Document {
                child_nodes: self.serialize_children(node, level, cx),
            },
            NodeKind::DocumentType {
                name,
                public_id,
                system_id,
            } => SerializedNodeData::DocumentType {
                name: name.clone(),
                public_id: public_id.clone(),
                system_id: system_id.clone(),
            },
            NodeKind::Element(element) => self.serialize_element(node, element, level, cx),
            NodeKind::Text(raw) => {
                cx.registry.record_text(id, raw);
                SerializedNodeData::Text {
                    text_content: self
                        .policy
                        .text_content(self.doc, node, parent_level)
                        .unwrap_or_default(),
                }
            }
            NodeKind::CData(raw) => {
                cx.registry.record_text(id, raw);
                SerializedNodeData::Cdata
            }
            NodeKind::Comment(raw) => {
                cx.registry.record_text(id, raw);
                SerializedNodeData::Comment {
                    text_content: self
                        .policy
                        .text_content(self.doc, node, parent_level)
                        .unwrap_or_default(),
                }
            }
            NodeKind::ShadowRoot(shadow) => {
                cx.shadow_roots.push(node);
                let adopted: Vec<StyleSheetRules> = shadow
                    .adopted_style_sheets
                    .iter()
                    .filter_map(|sheet| sheet.rule_texts())
                    .map(|css_rules| StyleSheetRules { css_rules })
                    .collect();
                SerializedNodeData::DocumentFragment {
                    is_shadow_root: true,
                    adopted_style_sheets: (!adopted.is_empty()).then_some(adopted),
                    child_nodes: self.serialize_children(node, level, cx),
                }
            }
        };

        Some(SerializedNode { id, data })
    }

    fn serialize_children(
        &self,
        node: NodeKey,
        level: PrivacyLevel,
        cx: &mut SerializationContext<'_>,
    ) -> Vec<SerializedNode> {
        let mut children: Vec<SerializedNode> = self
            .doc
            .children(node)
            .iter()
            .filter_map(|child| self.serialize_node(*child, level, cx))
            .collect();
        if let Some(shadow) = self.doc.shadow_root(node) {
            children.extend(self.serialize_node(shadow, level, cx));
        }
        children
    }

    fn serialize_element(
        &self,
        node: NodeKey,
        element: &ElementData,
        level: PrivacyLevel,
        cx: &mut SerializationContext<'_>,
    ) -> SerializedNodeData {
        let tag_name = element.tag_name.clone();

        // Opaque placeholder: keep only layout-relevant attributes
        if element.foreign {
            let attributes = ["width", "height"]
                .iter()
                .filter_map(|name| {
                    element
                        .attributes
                        .get(*name)
                        .map(|value| (name.to_string(), value.clone()))
                })
                .collect();
            return SerializedNodeData::Element {
                tag_name,
                attributes,
                child_nodes: Vec::new(),
            };
        }

        let mut attributes: BTreeMap<String, String> = element
            .attributes
            .iter()
            .filter_map(|(name, value)| {
                privacy::redact_attribute(&tag_name, name, value, level)
                    .map(|redacted| (name.clone(), redacted))
            })
            .collect();

        if let Some(value) = self.policy.input_value(self.doc, node, level) {
            attributes.insert("value".to_string(), value);
        }
        if level == PrivacyLevel::Allow {
            if element.is_checkable() && element.checked {
                attributes.insert("checked".to_string(), String::new());
            }
            if tag_name == "option" && element.selected {
                attributes.insert("selected".to_string(), String::new());
            }
        }

        let is_style_carrier = tag_name == "style" || element.is_stylesheet_link();
        if is_style_carrier {
            let css = element.sheet.as_ref().and_then(|sheet| sheet.css_text());
            match css {
                Some(css) => {
                    if tag_name == "link" {
                        attributes.remove("href");
                    }
                    attributes.insert(CSS_TEXT_ATTRIBUTE.to_string(), css);
                }
                None => {
                    if let Some(href) = element.attributes.get("href") {
                        attributes.insert("href".to_string(), href.clone());
                    }
                }
            }
        }

        let mut child_nodes = Vec::new();
        if !is_style_carrier {
            child_nodes = self.serialize_children(node, level, cx);
        }

        SerializedNodeData::Element {
            tag_name,
            attributes,
            child_nodes,
        }
    }
}
