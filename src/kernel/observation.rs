use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::event::{ConsoleLevel, NodeHandle, Rect};
use super::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObservationKind {
    LayoutShift,
    PaintCandidate,
    InteractionTiming,
    Mutation,
    LongFrame,
    VisibilityChange,
    ConsoleEntry,
}

impl ObservationKind {
    pub const ALL: [ObservationKind; 7] = [
        ObservationKind::LayoutShift,
        ObservationKind::PaintCandidate,
        ObservationKind::InteractionTiming,
        ObservationKind::Mutation,
        ObservationKind::LongFrame,
        ObservationKind::VisibilityChange,
        ObservationKind::ConsoleEntry,
    ];
}

/// The set of observation kinds the host platform can deliver for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeSet<ObservationKind>);

impl Capabilities {
    pub fn all() -> Self {
        Self(ObservationKind::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ObservationKind) -> Self {
        self.0.insert(kind);
        self
    }

    pub fn without(mut self, kind: ObservationKind) -> Self {
        self.0.remove(&kind);
        self
    }

    pub fn contains(&self, kind: ObservationKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = ObservationKind> + '_ {
        self.0.iter().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSource {
    pub subtree_id: Option<String>,
    pub previous: Rect,
    pub current: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutShift {
    pub value: f64,
    pub had_recent_input: bool,
    /// `None` when the platform delivered the entry without attribution.
    pub sources: Option<Vec<ShiftSource>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintCandidate {
    pub render_time: Timestamp,
    pub size: f64,
    pub element: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionTiming {
    pub name: String,
    pub start_time: Timestamp,
    pub processing_start: Timestamp,
    pub processing_end: Timestamp,
    pub duration: f64,
    pub interaction_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub added: u32,
    pub removed: u32,
    pub attribute_changed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptAttribution {
    pub source_url: Option<String>,
    pub invoker: Option<String>,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongFrame {
    pub duration: f64,
    pub blocking_duration: Option<f64>,
    pub scripts: Vec<ScriptAttribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityChange {
    pub element_id: String,
    /// The intersecting node. Siblings can share an `element_id`, so dwell is
    /// tracked per node and summed per label.
    #[serde(default)]
    pub node: Option<NodeHandle>,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub text: String,
}

/// Kind-indexed payload. The variant is the observation's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Payload {
    LayoutShift(LayoutShift),
    PaintCandidate(PaintCandidate),
    InteractionTiming(InteractionTiming),
    Mutation(Mutation),
    LongFrame(LongFrame),
    VisibilityChange(VisibilityChange),
    ConsoleEntry(ConsoleEntry),
}

impl Payload {
    pub fn kind(&self) -> ObservationKind {
        match self {
            Payload::LayoutShift(_) => ObservationKind::LayoutShift,
            Payload::PaintCandidate(_) => ObservationKind::PaintCandidate,
            Payload::InteractionTiming(_) => ObservationKind::InteractionTiming,
            Payload::Mutation(_) => ObservationKind::Mutation,
            Payload::LongFrame(_) => ObservationKind::LongFrame,
            Payload::VisibilityChange(_) => ObservationKind::VisibilityChange,
            Payload::ConsoleEntry(_) => ObservationKind::ConsoleEntry,
        }
    }
}

/// One normalized event in a session's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Append position within the owning session. Assigned by the session.
    pub seq: u64,
    pub timestamp: Timestamp,
    pub subtree_id: Option<String>,
    pub payload: Payload,
}

impl Observation {
    pub fn new(timestamp: Timestamp, subtree_id: Option<String>, payload: Payload) -> Self {
        Self {
            seq: 0,
            timestamp,
            subtree_id,
            payload,
        }
    }

    pub fn kind(&self) -> ObservationKind {
        self.payload.kind()
    }

    /// Interval length for entries that describe a span, zero otherwise.
    pub fn duration(&self) -> f64 {
        match &self.payload {
            Payload::LongFrame(f) => f.duration.max(0.0),
            Payload::InteractionTiming(i) => i.duration.max(0.0),
            _ => 0.0,
        }
    }

    pub fn end_time(&self) -> Timestamp {
        self.timestamp + self.duration()
    }

    pub fn layout_shift(timestamp: Timestamp, value: f64, had_recent_input: bool) -> Self {
        Self::new(
            timestamp,
            None,
            Payload::LayoutShift(LayoutShift {
                value,
                had_recent_input,
                sources: Some(Vec::new()),
            }),
        )
    }

    pub fn mutation(timestamp: Timestamp, subtree_id: &str, added: u32, removed: u32, attribute_changed: u32) -> Self {
        Self::new(
            timestamp,
            Some(subtree_id.to_string()),
            Payload::Mutation(Mutation {
                added,
                removed,
                attribute_changed,
            }),
        )
    }

    pub fn long_frame(timestamp: Timestamp, duration: f64) -> Self {
        Self::new(
            timestamp,
            None,
            Payload::LongFrame(LongFrame {
                duration,
                blocking_duration: None,
                scripts: Vec::new(),
            }),
        )
    }

    pub fn interaction(start_time: Timestamp, processing_start: Timestamp, processing_end: Timestamp, duration: f64, interaction_id: u64) -> Self {
        Self::new(
            start_time,
            None,
            Payload::InteractionTiming(InteractionTiming {
                name: "click".to_string(),
                start_time,
                processing_start,
                processing_end,
                duration,
                interaction_id,
            }),
        )
    }

    pub fn visibility(timestamp: Timestamp, element_id: &str, ratio: f64) -> Self {
        Self::new(
            timestamp,
            Some(element_id.to_string()),
            Payload::VisibilityChange(VisibilityChange {
                element_id: element_id.to_string(),
                node: None,
                ratio,
            }),
        )
    }

    pub fn console(timestamp: Timestamp, level: ConsoleLevel, text: &str) -> Self {
        Self::new(
            timestamp,
            None,
            Payload::ConsoleEntry(ConsoleEntry {
                level,
                text: text.to_string(),
            }),
        )
    }
}
