//! Trackable node kinds and their derived state.
//!
//! Every tracked object carries one [`Node`]. The node holds derived fields
//! computed from the latest raw record and the consumer's [`Parameters`].
//! [`NODE_REGISTRY`] maps structure names to the node kind and the functions
//! that update and render it; unregistered structures get a [`Node::Raw`].

mod element;
mod game_state;
mod params;

use std::fmt;
use std::ops::{Div, Mul};

use serde::Serialize;
use strum::{Display, EnumString};

use crate::overlay::Record;
use crate::schema::{GAME_STATE, MAP_UI_ELEMENT, UI_ELEMENT_BASE};

pub use element::{MapElement, UiElement, VISIBLE_FLAG};
pub use game_state::GameStateNode;
pub use params::{Parameters, WINDOW_SCALE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;

    fn div(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    Element,
    Map,
    GameState,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Element(UiElement),
    Map(MapElement),
    GameState(GameStateNode),
    /// No derived state; the record is the whole object
    Raw,
}

impl Node {
    /// A node of `kind` with every derived field at its default
    pub fn new(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Element => Node::Element(UiElement::default()),
            NodeKind::Map => Node::Map(MapElement::default()),
            NodeKind::GameState => Node::GameState(GameStateNode::default()),
            NodeKind::Raw => Node::Raw,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Element(_) => NodeKind::Element,
            Node::Map(_) => NodeKind::Map,
            Node::GameState(_) => NodeKind::GameState,
            Node::Raw => NodeKind::Raw,
        }
    }

    /// Drop all derived state
    pub fn reset(&mut self) {
        *self = Node::new(self.kind());
    }

    pub fn as_element(&self) -> Option<&UiElement> {
        match self {
            Node::Element(element) => Some(element),
            Node::Map(map) => Some(&map.element),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapElement> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_game_state(&self) -> Option<&GameStateNode> {
        match self {
            Node::GameState(state) => Some(state),
            _ => None,
        }
    }
}

/// Binds a structure name to its node kind and update/render functions
pub struct NodeDescriptor {
    pub schema: &'static str,
    pub kind: NodeKind,
    pub apply: fn(&mut Node, &Record, &Parameters),
    pub describe: fn(&Node, &Record) -> String,
}

impl NodeDescriptor {
    pub fn create(&self) -> Node {
        Node::new(self.kind)
    }
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("schema", &self.schema)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

pub static NODE_REGISTRY: &[NodeDescriptor] = &[
    NodeDescriptor {
        schema: UI_ELEMENT_BASE,
        kind: NodeKind::Element,
        apply: apply_element,
        describe: describe_element,
    },
    NodeDescriptor {
        schema: MAP_UI_ELEMENT,
        kind: NodeKind::Map,
        apply: apply_map,
        describe: describe_map,
    },
    NodeDescriptor {
        schema: GAME_STATE,
        kind: NodeKind::GameState,
        apply: apply_game_state,
        describe: describe_game_state,
    },
];

/// Fallback for structures without a registered node kind
pub static RAW_DESCRIPTOR: NodeDescriptor = NodeDescriptor {
    schema: "",
    kind: NodeKind::Raw,
    apply: apply_raw,
    describe: describe_raw,
};

/// Descriptor for a structure name; unknown names map to [`RAW_DESCRIPTOR`]
pub fn descriptor_for(schema: &str) -> &'static NodeDescriptor {
    NODE_REGISTRY
        .iter()
        .find(|descriptor| descriptor.schema == schema)
        .unwrap_or(&RAW_DESCRIPTOR)
}

fn apply_element(node: &mut Node, record: &Record, params: &Parameters) {
    if let Node::Element(element) = node {
        element.apply(record, params);
    }
}

fn describe_element(node: &Node, record: &Record) -> String {
    match node {
        Node::Element(element) => format!("{}\n{}", header(record), element.describe()),
        _ => describe_raw(node, record),
    }
}

fn apply_map(node: &mut Node, record: &Record, params: &Parameters) {
    if let Node::Map(map) = node {
        map.apply(record, params);
    }
}

fn describe_map(node: &Node, record: &Record) -> String {
    match node {
        Node::Map(map) => format!("{}\n{}", header(record), map.describe()),
        _ => describe_raw(node, record),
    }
}

fn apply_game_state(node: &mut Node, record: &Record, _params: &Parameters) {
    if let Node::GameState(state) = node {
        state.apply(record);
    }
}

fn describe_game_state(node: &Node, record: &Record) -> String {
    match node {
        Node::GameState(state) => format!("{}\n{}", header(record), state.describe()),
        _ => describe_raw(node, record),
    }
}

fn apply_raw(_node: &mut Node, _record: &Record, _params: &Parameters) {}

fn describe_raw(_node: &Node, record: &Record) -> String {
    let mut out = header(record);
    for (name, value) in record.iter() {
        out.push_str(&format!("\n{}: {}", name, value));
    }
    out
}

fn header(record: &Record) -> String {
    format!("{} @ {:#X}", record.schema_name(), record.base())
}
