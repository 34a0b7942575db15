//! Event listener primitive and user-interaction helpers

use chrono::Utc;

use super::{Document, NodeKey, NodeKind};

/// Handle returned by [`Document::listen`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Event families a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Scroll,
    Media,
    Input,
    Resize,
    MouseMove,
    Focus,
}

/// Event raised by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Scroll { target: NodeKey },
    Play { target: NodeKey },
    Pause { target: NodeKey },
    Input { target: NodeKey },
    Resize { width: u32, height: u32 },
    MouseMove { target: NodeKey, x: i32, y: i32 },
    Focus { has_focus: bool },
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Scroll { .. } => EventKind::Scroll,
            Self::Play { .. } | Self::Pause { .. } => EventKind::Media,
            Self::Input { .. } => EventKind::Input,
            Self::Resize { .. } => EventKind::Resize,
            Self::MouseMove { .. } => EventKind::MouseMove,
            Self::Focus { .. } => EventKind::Focus,
        }
    }

    pub fn target(&self) -> Option<NodeKey> {
        match self {
            Self::Scroll { target }
            | Self::Play { target }
            | Self::Pause { target }
            | Self::Input { target }
            | Self::MouseMove { target, .. } => Some(*target),
            Self::Resize { .. } | Self::Focus { .. } => None,
        }
    }

    /// Composed events cross shadow boundaries and reach the document
    fn is_composed(&self) -> bool {
        matches!(
            self,
            Self::MouseMove { .. } | Self::Resize { .. } | Self::Focus { .. }
        )
    }
}

/// Event with the time (epoch milliseconds) it was dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub event: HostEvent,
    pub timestamp: i64,
}

#[derive(Debug)]
pub(crate) struct Listener {
    pub(crate) root: NodeKey,
    pub(crate) kinds: Vec<EventKind>,
    pub(crate) queue: Vec<DispatchedEvent>,
}

impl Document {
    /// Listen for events of the given kinds reaching `root`
    pub fn listen(&mut self, root: NodeKey, kinds: &[EventKind]) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.insert(
            id,
            Listener {
                root,
                kinds: kinds.to_vec(),
                queue: Vec::new(),
            },
        );
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unlisten(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Drain the events queued for a listener
    pub fn take_events(&mut self, id: ListenerId) -> Vec<DispatchedEvent> {
        self.listeners
            .get_mut(&id)
            .map(|listener| std::mem::take(&mut listener.queue))
            .unwrap_or_default()
    }

    /// Deliver an event to every listener of its tree.
    ///
    /// Non-composed events stay inside the tree of their target, so scroll or
    /// input inside a shadow root only reach listeners on that shadow root.
    pub fn dispatch(&mut self, event: HostEvent) {
        let root = match event.target() {
            Some(target) if !event.is_composed() => self.tree_root(target),
            _ => self.root(),
        };
        let kind = event.kind();
        let dispatched = DispatchedEvent {
            event,
            timestamp: Utc::now().timestamp_millis(),
        };
        for listener in self.listeners.values_mut() {
            if listener.root == root && listener.kinds.contains(&kind) {
                listener.queue.push(dispatched.clone());
            }
        }
    }

    /// Scroll an element, or the document when `node` is the document
    pub fn scroll_to(&mut self, node: NodeKey, left: i32, top: i32) {
        if node == self.root() {
            self.scroll.left = left;
            self.scroll.top = top;
        } else if let NodeKind::Element(element) = &mut self.node_mut(node).kind {
            element.scroll.left = left;
            element.scroll.top = top;
        } else {
            return;
        }
        self.dispatch(HostEvent::Scroll { target: node });
    }

    pub fn play(&mut self, media: NodeKey) {
        self.dispatch(HostEvent::Play { target: media });
    }

    pub fn pause(&mut self, media: NodeKey) {
        self.dispatch(HostEvent::Pause { target: media });
    }

    /// Type into a form control: updates its live value, not its attribute
    pub fn set_value(&mut self, control: NodeKey, value: impl Into<String>) {
        if let NodeKind::Element(element) = &mut self.node_mut(control).kind {
            element.value = Some(value.into());
            self.dispatch(HostEvent::Input { target: control });
        }
    }

    pub fn set_checked(&mut self, control: NodeKey, checked: bool) {
        if let NodeKind::Element(element) = &mut self.node_mut(control).kind {
            element.checked = checked;
            self.dispatch(HostEvent::Input { target: control });
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.width = width;
        self.viewport.height = height;
        self.dispatch(HostEvent::Resize { width, height });
    }

    pub fn move_mouse(&mut self, target: NodeKey, x: i32, y: i32) {
        self.dispatch(HostEvent::MouseMove { target, x, y });
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
        self.dispatch(HostEvent::Focus { has_focus });
    }
}
