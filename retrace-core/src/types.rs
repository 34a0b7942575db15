//! Record stream wire model
//!
//! Everything here is what leaves the recorder: serialized nodes, mutation
//! payloads and the timestamped [`Record`] envelope. Field names follow the
//! camelCase wire format consumed by the renderer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a serialized node, unique within a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serialized node: stable id plus kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub data: SerializedNodeData,
}

/// Rules of one adopted stylesheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSheetRules {
    pub css_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SerializedNodeData {
    Document {
        child_nodes: Vec<SerializedNode>,
    },
    DocumentType {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element {
        tag_name: String,
        attributes: BTreeMap<String, String>,
        child_nodes: Vec<SerializedNode>,
    },
    Text {
        text_content: String,
    },
    Cdata,
    Comment {
        text_content: String,
    },
    DocumentFragment {
        is_shadow_root: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        adopted_style_sheets: Option<Vec<StyleSheetRules>>,
        child_nodes: Vec<SerializedNode>,
    },
}

impl SerializedNode {
    pub fn child_nodes(&self) -> &[SerializedNode] {
        match &self.data {
            SerializedNodeData::Document { child_nodes }
            | SerializedNodeData::Element { child_nodes, .. }
            | SerializedNodeData::DocumentFragment { child_nodes, .. } => child_nodes,
            _ => &[],
        }
    }

    pub fn tag_name(&self) -> Option<&str> {
        match &self.data {
            SerializedNodeData::Element { tag_name, .. } => Some(tag_name),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match &self.data {
            SerializedNodeData::Element { attributes, .. } => {
                attributes.get(name).map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.data {
            SerializedNodeData::Text { text_content }
            | SerializedNodeData::Comment { text_content } => Some(text_content),
            _ => None,
        }
    }

    pub fn is_shadow_root(&self) -> bool {
        matches!(
            self.data,
            SerializedNodeData::DocumentFragment {
                is_shadow_root: true,
                ..
            }
        )
    }

    /// Depth-first search over this node and its descendants
    pub fn find(&self, predicate: &impl Fn(&SerializedNode) -> bool) -> Option<&SerializedNode> {
        if predicate(self) {
            return Some(self);
        }
        self.child_nodes()
            .iter()
            .find_map(|child| child.find(predicate))
    }

    /// First element with the given tag name
    pub fn find_element(&self, tag_name: &str) -> Option<&SerializedNode> {
        self.find(&|node| node.tag_name() == Some(tag_name))
    }

    /// Ids of this node and all its descendants
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.id];
        for child in self.child_nodes() {
            ids.extend(child.ids());
        }
        ids
    }
}

/// Node inserted under `parent_id`, before `next_id` when present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedNodeMutation {
    pub parent_id: NodeId,
    pub next_id: Option<NodeId>,
    pub node: SerializedNode,
}

/// Node detached from `parent_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedNodeMutation {
    pub parent_id: NodeId,
    pub id: NodeId,
}

/// Attribute changes of one node; `None` means the attribute was removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMutation {
    pub id: NodeId,
    pub attributes: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMutation {
    pub id: NodeId,
    pub value: String,
}

/// Reduced batch of changes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationPayload {
    pub adds: Vec<AddedNodeMutation>,
    pub removes: Vec<RemovedNodeMutation>,
    pub attributes: Vec<AttributeMutation>,
    pub texts: Vec<TextMutation>,
}

impl MutationPayload {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
            && self.removes.is_empty()
            && self.attributes.is_empty()
            && self.texts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    pub href: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialOffset {
    pub left: i32,
    pub top: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSnapshotData {
    pub node: SerializedNode,
    pub initial_offset: InitialOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MousePosition {
    pub id: NodeId,
    pub x: i32,
    pub y: i32,
    /// Milliseconds relative to the record timestamp (zero or negative)
    pub time_offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub id: NodeId,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportDimension {
    pub width: u32,
    pub height: u32,
}

/// Form control state; exactly one of `text` and `is_checked` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputState {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_checked: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaInteractionType {
    Play,
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInteraction {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: MediaInteractionType,
}

/// Payload of an incremental snapshot, tagged by its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum IncrementalData {
    Mutation(MutationPayload),
    MouseMove { positions: Vec<MousePosition> },
    Scroll(ScrollPosition),
    ViewportResize(ViewportDimension),
    Input(InputState),
    MediaInteraction(MediaInteraction),
}

impl IncrementalData {
    pub fn source(&self) -> IncrementalSource {
        match self {
            Self::Mutation(_) => IncrementalSource::Mutation,
            Self::MouseMove { .. } => IncrementalSource::MouseMove,
            Self::Scroll(_) => IncrementalSource::Scroll,
            Self::ViewportResize(_) => IncrementalSource::ViewportResize,
            Self::Input(_) => IncrementalSource::Input,
            Self::MediaInteraction(_) => IncrementalSource::MediaInteraction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncrementalSource {
    Mutation,
    MouseMove,
    Scroll,
    ViewportResize,
    Input,
    MediaInteraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusData {
    pub has_focus: bool,
}

/// Timestamped unit of the record stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Meta {
        timestamp: i64,
        data: MetaData,
    },
    FullSnapshot {
        timestamp: i64,
        data: FullSnapshotData,
    },
    IncrementalSnapshot {
        timestamp: i64,
        data: IncrementalData,
    },
    Focus {
        timestamp: i64,
        data: FocusData,
    },
    ViewEnd {
        timestamp: i64,
    },
}

/// Discriminant of [`Record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Meta,
    FullSnapshot,
    IncrementalSnapshot,
    Focus,
    ViewEnd,
}

impl Record {
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Meta { timestamp, .. }
            | Self::FullSnapshot { timestamp, .. }
            | Self::IncrementalSnapshot { timestamp, .. }
            | Self::Focus { timestamp, .. }
            | Self::ViewEnd { timestamp } => *timestamp,
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Meta { .. } => RecordType::Meta,
            Self::FullSnapshot { .. } => RecordType::FullSnapshot,
            Self::IncrementalSnapshot { .. } => RecordType::IncrementalSnapshot,
            Self::Focus { .. } => RecordType::Focus,
            Self::ViewEnd { .. } => RecordType::ViewEnd,
        }
    }

    /// Source of an incremental snapshot
    pub fn incremental_source(&self) -> Option<IncrementalSource> {
        match self {
            Self::IncrementalSnapshot { data, .. } => Some(data.source()),
            _ => None,
        }
    }

    /// Mutation payload of an incremental mutation record
    pub fn mutation(&self) -> Option<&MutationPayload> {
        match self {
            Self::IncrementalSnapshot {
                data: IncrementalData::Mutation(payload),
                ..
            } => Some(payload),
            _ => None,
        }
    }

    /// Snapshot root of a full snapshot record
    pub fn snapshot(&self) -> Option<&SerializedNode> {
        match self {
            Self::FullSnapshot { data, .. } => Some(&data.node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_wire_format() {
        let record = Record::IncrementalSnapshot {
            timestamp: 42,
            data: IncrementalData::Mutation(MutationPayload {
                adds: vec![AddedNodeMutation {
                    parent_id: NodeId(3),
                    next_id: None,
                    node: SerializedNode {
                        id: NodeId(9),
                        data: SerializedNodeData::Text {
                            text_content: "hi".to_string(),
                        },
                    },
                }],
                ..Default::default()
            }),
        };

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "type": "incremental_snapshot",
                "timestamp": 42,
                "data": {
                    "source": "mutation",
                    "adds": [{
                        "parentId": 3,
                        "nextId": null,
                        "node": { "id": 9, "type": "text", "textContent": "hi" }
                    }],
                    "removes": [],
                    "attributes": [],
                    "texts": []
                }
            })
        );
    }

    #[test]
    fn test_shadow_root_fragment_wire_format() {
        let node = SerializedNode {
            id: NodeId(5),
            data: SerializedNodeData::DocumentFragment {
                is_shadow_root: true,
                adopted_style_sheets: Some(vec![StyleSheetRules {
                    css_rules: vec!["div { width: 100%; }".to_string()],
                }]),
                child_nodes: vec![],
            },
        };

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "document_fragment");
        assert_eq!(value["isShadowRoot"], true);
        assert_eq!(
            value["adoptedStyleSheets"],
            json!([{ "cssRules": ["div { width: 100%; }"] }])
        );

        let parsed: SerializedNode = serde_json::from_value(value).unwrap();
        assert!(parsed.is_shadow_root());
    }

    #[test]
    fn test_find_element() {
        let tree = SerializedNode {
            id: NodeId(1),
            data: SerializedNodeData::Document {
                child_nodes: vec![SerializedNode {
                    id: NodeId(2),
                    data: SerializedNodeData::Element {
                        tag_name: "p".to_string(),
                        attributes: BTreeMap::new(),
                        child_nodes: vec![],
                    },
                }],
            },
        };
        assert_eq!(tree.find_element("p").map(|node| node.id), Some(NodeId(2)));
        assert_eq!(tree.ids(), vec![NodeId(1), NodeId(2)]);
    }
}
