//! Node kinds stored in the document arena

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::style::StyleSheet;

/// Opaque handle to a node in a [`Document`](super::Document).
///
/// Keys are handed out in creation order and never reused, so a key always
/// denotes the same node object even after it has been detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub(crate) u32);

impl NodeKey {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Horizontal and vertical scroll offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub left: i32,
    pub top: i32,
}

/// Layout viewport size of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

/// Element payload
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// Lower-cased tag name
    pub tag_name: String,
    pub attributes: BTreeMap<String, String>,
    /// Attached shadow root, if this element is a shadow host
    pub shadow_root: Option<NodeKey>,
    /// Parsed sheet of a `style` element or stylesheet `link`
    pub sheet: Option<StyleSheet>,
    /// Live value of a form control, distinct from the `value` attribute
    pub value: Option<String>,
    pub checked: bool,
    pub selected: bool,
    pub scroll: ScrollOffset,
    /// Content the recorder may not inspect (e.g. a cross-origin frame)
    pub foreign: bool,
}

impl ElementData {
    pub(crate) fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    /// `type` attribute, lower-cased
    pub fn input_type(&self) -> Option<String> {
        self.attributes
            .get("type")
            .map(|value| value.to_ascii_lowercase())
    }

    /// True for `link` elements whose `rel` names a stylesheet
    pub fn is_stylesheet_link(&self) -> bool {
        self.tag_name == "link"
            && self.attributes.get("rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("stylesheet"))
            })
    }

    /// True for checkbox and radio inputs
    pub fn is_checkable(&self) -> bool {
        self.tag_name == "input"
            && matches!(self.input_type().as_deref(), Some("checkbox" | "radio"))
    }
}

/// Shadow root payload
#[derive(Debug, Clone)]
pub struct ShadowRootData {
    pub host: NodeKey,
    pub adopted_style_sheets: Vec<StyleSheet>,
}

/// Closed set of node kinds
#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    DocumentType {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(ElementData),
    Text(String),
    CData(String),
    Comment(String),
    ShadowRoot(ShadowRootData),
}

impl NodeKind {
    /// Character data of text-like nodes
    pub fn character_data(&self) -> Option<&str> {
        match self {
            Self::Text(data) | Self::CData(data) | Self::Comment(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}
