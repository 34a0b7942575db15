//! In-memory host document
//!
//! The recorder only talks to the host through this module: an arena of nodes
//! addressed by [`NodeKey`], shadow trees hanging off their hosts, a change
//! notification primitive ([`Document::observe`]) and an event listener
//! primitive ([`Document::listen`]).

mod events;
mod node;
mod observer;
mod style;
mod tree;

pub use events::{DispatchedEvent, EventKind, HostEvent, ListenerId};
pub use node::{ElementData, NodeKey, NodeKind, ScrollOffset, ShadowRootData, Viewport};
pub use observer::{MutationRecord, ObserverId};
pub use style::{CssRule, InaccessibleSheet, StyleSheet};
pub use tree::Document;
