//! Raw platform callback shapes, as forwarded verbatim by the automation driver.
//!
//! These mirror the browser's performance-entry and observer-record objects.
//! Nothing here is normalized: the ingest adapters turn them into `Observation`s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::observation::ObservationKind;
use super::time::Timestamp;

/// Opaque, driver-assigned reference to a live DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeHandle(pub u64);

/// A DOM node plus its ancestry, nearest parent first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    pub handle: NodeHandle,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub parent: Option<Box<RawNode>>,
}

impl RawNode {
    pub fn new(handle: u64, tag: &str) -> Self {
        Self {
            handle: NodeHandle(handle),
            tag: tag.to_string(),
            id: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            parent: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_parent(mut self, parent: RawNode) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Iterates the node's ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &RawNode> {
        std::iter::successors(self.parent.as_deref(), |n| n.parent.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawShiftSource {
    #[serde(default)]
    pub node: Option<RawNode>,
    #[serde(default)]
    pub previous_rect: Rect,
    #[serde(default)]
    pub current_rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLayoutShift {
    pub start_time: Timestamp,
    pub value: f64,
    #[serde(default)]
    pub had_recent_input: bool,
    /// Absent on platforms that do not report attribution.
    #[serde(default)]
    pub sources: Option<Vec<RawShiftSource>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPaintCandidate {
    pub start_time: Timestamp,
    #[serde(default)]
    pub render_time: Timestamp,
    #[serde(default)]
    pub load_time: Timestamp,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub element: Option<RawNode>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventTiming {
    #[serde(default)]
    pub name: String,
    pub start_time: Timestamp,
    pub processing_start: Timestamp,
    pub processing_end: Timestamp,
    pub duration: f64,
    #[serde(default)]
    pub interaction_id: u64,
    #[serde(default)]
    pub target: Option<RawNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationType {
    ChildList,
    Attributes,
    CharacterData,
}

/// Mutation records carry no timestamp of their own; the driver stamps
/// `time` when the observer callback fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMutationRecord {
    pub time: Timestamp,
    #[serde(rename = "type")]
    pub mutation_type: MutationType,
    pub target: RawNode,
    #[serde(default)]
    pub added_nodes: Vec<RawNode>,
    #[serde(default)]
    pub removed_nodes: Vec<RawNode>,
    #[serde(default)]
    pub attribute_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScriptAttribution {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub invoker: Option<String>,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLongFrame {
    pub start_time: Timestamp,
    pub duration: f64,
    #[serde(default)]
    pub blocking_duration: Option<f64>,
    #[serde(default)]
    pub scripts: Vec<RawScriptAttribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIntersection {
    pub time: Timestamp,
    pub target: RawNode,
    pub intersection_ratio: f64,
    #[serde(default = "default_true")]
    pub is_intersecting: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsoleLevel {
    Error,
    Warning,
    Info,
    Log,
    Debug,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConsoleMessage {
    pub time: Timestamp,
    pub level: ConsoleLevel,
    #[serde(default)]
    pub text: String,
}

/// One platform callback, tagged by the stream that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "camelCase")]
pub enum RawEvent {
    LayoutShift(RawLayoutShift),
    PaintCandidate(RawPaintCandidate),
    EventTiming(RawEventTiming),
    Mutation(RawMutationRecord),
    LongFrame(RawLongFrame),
    Intersection(RawIntersection),
    Console(RawConsoleMessage),
}

impl RawEvent {
    /// The observation kind this stream feeds.
    pub fn kind(&self) -> ObservationKind {
        match self {
            RawEvent::LayoutShift(_) => ObservationKind::LayoutShift,
            RawEvent::PaintCandidate(_) => ObservationKind::PaintCandidate,
            RawEvent::EventTiming(_) => ObservationKind::InteractionTiming,
            RawEvent::Mutation(_) => ObservationKind::Mutation,
            RawEvent::LongFrame(_) => ObservationKind::LongFrame,
            RawEvent::Intersection(_) => ObservationKind::VisibilityChange,
            RawEvent::Console(_) => ObservationKind::ConsoleEntry,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            RawEvent::LayoutShift(e) => e.start_time,
            RawEvent::PaintCandidate(e) => e.start_time,
            RawEvent::EventTiming(e) => e.start_time,
            RawEvent::Mutation(e) => e.time,
            RawEvent::LongFrame(e) => e.start_time,
            RawEvent::Intersection(e) => e.time,
            RawEvent::Console(e) => e.time,
        }
    }

    /// Latest instant the event covers; interval entries end after their duration.
    pub fn end_time(&self) -> Timestamp {
        match self {
            RawEvent::EventTiming(e) => e.start_time + e.duration.max(0.0),
            RawEvent::LongFrame(e) => e.start_time + e.duration.max(0.0),
            other => other.timestamp(),
        }
    }
}
