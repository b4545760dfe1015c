//! Viewport dwell tracking.
//!
//! Each node is a two-state machine: hidden, or visible with exactly one
//! open session. A 0 -> >0 ratio transition opens a session, >0 -> 0 closes
//! it, and `close_all` ends whatever is still open at harvest time.
//! Nodes sharing a label are reported together under that label.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::kernel::event::NodeHandle;
use crate::kernel::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilitySession {
    pub element_id: String,
    pub entered_at: Timestamp,
    pub exited_at: Option<Timestamp>,
    pub max_ratio: f64,
}

impl VisibilitySession {
    pub fn duration(&self) -> Option<f64> {
        self.exited_at.map(|exit| (exit - self.entered_at).max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Presence {
    Hidden,
    Visible(VisibilitySession),
}

#[derive(Debug, Clone)]
struct ElementTrack {
    tracked: bool,
    // `None` keys observations that arrive without a node handle.
    nodes: BTreeMap<Option<NodeHandle>, Presence>,
    closed: Vec<VisibilitySession>,
}

impl ElementTrack {
    fn new(tracked: bool) -> Self {
        Self {
            tracked,
            nodes: BTreeMap::new(),
            closed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityTracker {
    elements: BTreeMap<String, ElementTrack>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracked(tracked: &BTreeSet<String>) -> Self {
        let mut tracker = Self::new();
        for element in tracked {
            tracker.track(element);
        }
        tracker
    }

    /// Registers an element so it is reported even if it never intersects.
    pub fn track(&mut self, element_id: &str) {
        self.elements
            .entry(element_id.to_string())
            .or_insert_with(|| ElementTrack::new(true))
            .tracked = true;
    }

    pub fn observe(&mut self, element_id: &str, at: Timestamp, ratio: f64) {
        self.observe_node(element_id, None, at, ratio);
    }

    pub fn observe_node(&mut self, element_id: &str, node: Option<NodeHandle>, at: Timestamp, ratio: f64) {
        let track = self
            .elements
            .entry(element_id.to_string())
            .or_insert_with(|| ElementTrack::new(false));
        let presence = track.nodes.entry(node).or_insert(Presence::Hidden);
        let visible = ratio > 0.0;

        let open = matches!(presence, Presence::Visible(_));

        match (open, visible) {
            (false, true) => {
                *presence = Presence::Visible(VisibilitySession {
                    element_id: element_id.to_string(),
                    entered_at: at,
                    exited_at: None,
                    max_ratio: ratio,
                });
            }
            (true, true) => {
                if let Presence::Visible(session) = presence {
                    session.max_ratio = session.max_ratio.max(ratio);
                }
            }
            (true, false) => {
                if let Presence::Visible(mut session) = std::mem::replace(presence, Presence::Hidden) {
                    session.exited_at = Some(at.max(session.entered_at));
                    track.closed.push(session);
                }
            }
            (false, false) => {}
        }
    }

    /// The earliest-opened session still running for `element_id`, if any.
    pub fn open_session(&self, element_id: &str) -> Option<&VisibilitySession> {
        self.open_sessions(element_id).min_by(|a, b| a.entered_at.total_cmp(&b.entered_at))
    }

    pub fn open_sessions<'a>(&'a self, element_id: &str) -> impl Iterator<Item = &'a VisibilitySession> + 'a {
        self.elements
            .get(element_id)
            .into_iter()
            .flat_map(|track| track.nodes.values())
            .filter_map(|presence| match presence {
                Presence::Visible(session) => Some(session),
                Presence::Hidden => None,
            })
    }

    pub fn close_all(&mut self, at: Timestamp) {
        let open: Vec<(String, Option<NodeHandle>)> = self
            .elements
            .iter()
            .flat_map(|(id, track)| {
                track
                    .nodes
                    .iter()
                    .filter(|(_, presence)| matches!(presence, Presence::Visible(_)))
                    .map(move |(node, _)| (id.clone(), *node))
            })
            .collect();
        for (element_id, node) in open {
            self.observe_node(&element_id, node, at, 0.0);
        }
    }

    pub fn into_metrics(self, dwell_floor_ms: f64) -> VisibilityMetrics {
        let mut elements: Vec<ElementExposure> = self
            .elements
            .into_iter()
            .map(|(element_id, track)| {
                let mut sessions = track.closed;
                sessions.extend(track.nodes.into_values().filter_map(|presence| match presence {
                    Presence::Visible(open) => Some(open),
                    Presence::Hidden => None,
                }));
                sessions.sort_by(|a, b| a.entered_at.total_cmp(&b.entered_at));
                let dwell_ms: f64 = sessions.iter().filter_map(VisibilitySession::duration).sum();
                let max_ratio = sessions.iter().map(|s| s.max_ratio).fold(0.0, f64::max);
                ElementExposure {
                    element_id,
                    tracked: track.tracked,
                    sessions,
                    dwell_ms,
                    max_ratio,
                }
            })
            .collect();

        let never_seen = elements
            .iter()
            .filter(|e| e.sessions.is_empty())
            .map(|e| e.element_id.clone())
            .collect();
        let under_threshold = elements
            .iter()
            .filter(|e| !e.sessions.is_empty() && e.dwell_ms < dwell_floor_ms)
            .map(|e| e.element_id.clone())
            .collect();

        // BTreeMap iteration already ordered ids; stable sort keeps that for equal dwell.
        elements.sort_by(|a, b| b.dwell_ms.total_cmp(&a.dwell_ms));

        VisibilityMetrics {
            elements,
            never_seen,
            under_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementExposure {
    pub element_id: String,
    pub tracked: bool,
    pub sessions: Vec<VisibilitySession>,
    pub dwell_ms: f64,
    pub max_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityMetrics {
    /// Ranked by dwell time, longest first.
    pub elements: Vec<ElementExposure>,
    pub never_seen: Vec<String>,
    /// Seen at least once, but for less than the configured floor in total.
    pub under_threshold: Vec<String>,
}

impl VisibilityMetrics {
    pub fn element(&self, element_id: &str) -> Option<&ElementExposure> {
        self.elements.iter().find(|e| e.element_id == element_id)
    }
}
