//! Aggregator: reduces a frozen observation log into a `MetricSnapshot`.
//!
//! # AVAILABILITY INVARIANT
//! A metric whose stream was never registered (and never delivered anything)
//! is `Unavailable`, never zero. Zero means "measured, and nothing happened".

pub mod churn;
pub mod contrast;
pub mod frames;
pub mod interaction;
pub mod layout;
pub mod paint;
pub mod visibility;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::config::EngineConfig;
use super::correlator::Correlator;
use super::event::ConsoleLevel;
use super::observation::{Capabilities, ObservationKind, Observation, Payload};
use super::time::{cmp_time, Timestamp};

use churn::ChurnMetrics;
use contrast::{ColorSample, ContrastMetrics};
use frames::FrameMetrics;
use interaction::InteractionMetrics;
use layout::LayoutShiftMetrics;
use paint::LargestPaint;
use visibility::{VisibilityMetrics, VisibilityTracker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum Measured<T> {
    Available(T),
    Unavailable,
}

impl<T> Measured<T> {
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Measured::Available(v),
            None => Measured::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Measured::Available(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Measured::Available(v) => Some(v),
            Measured::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMetrics {
    pub errors: usize,
    pub warnings: usize,
    pub other: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub duration_ms: f64,
    pub observation_count: usize,
    pub layout: Measured<LayoutShiftMetrics>,
    pub paint: Measured<LargestPaint>,
    pub interactions: Measured<InteractionMetrics>,
    pub churn: Measured<ChurnMetrics>,
    pub frames: Measured<FrameMetrics>,
    pub visibility: Measured<VisibilityMetrics>,
    pub contrast: Measured<ContrastMetrics>,
    pub console: Measured<ConsoleMetrics>,
}

impl MetricSnapshot {
    /// What a harvest reports when no session was ever started.
    pub fn empty() -> Self {
        Self {
            duration_ms: 0.0,
            observation_count: 0,
            layout: Measured::Unavailable,
            paint: Measured::Unavailable,
            interactions: Measured::Unavailable,
            churn: Measured::Unavailable,
            frames: Measured::Unavailable,
            visibility: Measured::Unavailable,
            contrast: Measured::Unavailable,
            console: Measured::Unavailable,
        }
    }

    pub fn cls(&self) -> Option<f64> {
        self.layout.value().map(|l| l.cls)
    }

    pub fn inp(&self) -> Option<f64> {
        self.interactions.value().map(|i| i.p98_ms)
    }
}

/// Everything one harvest reads. Borrowed from the frozen session.
pub struct HarvestInput<'a> {
    pub log: &'a [Observation],
    pub capabilities: &'a Capabilities,
    pub tracked: &'a BTreeSet<String>,
    pub color_samples: &'a [ColorSample],
    pub harvest_time: Timestamp,
    pub config: &'a EngineConfig,
}

pub fn compute_snapshot(input: &HarvestInput) -> MetricSnapshot {
    let config = input.config;
    let correlator = Correlator::new(config.epsilon_ms);

    let mut shifts = Vec::new();
    let mut paints = Vec::new();
    let mut timings = Vec::new();
    let mut mutations = Vec::new();
    let mut long_frames = 0usize;
    let mut visibility = Vec::new();
    let mut console = ConsoleMetrics::default();
    let mut console_entries = 0usize;
    let mut latest = 0.0f64;

    for obs in input.log {
        if obs.end_time().is_finite() {
            latest = latest.max(obs.end_time());
        }
        match &obs.payload {
            Payload::LayoutShift(s) => shifts.push((obs, s)),
            Payload::PaintCandidate(p) => paints.push((obs, p)),
            Payload::InteractionTiming(t) => timings.push((obs, t)),
            Payload::Mutation(m) => mutations.push((obs, m)),
            Payload::LongFrame(_) => long_frames += 1,
            Payload::VisibilityChange(v) => visibility.push((obs, v)),
            Payload::ConsoleEntry(entry) => {
                console_entries += 1;
                match entry.level {
                    ConsoleLevel::Error => console.errors += 1,
                    ConsoleLevel::Warning => console.warnings += 1,
                    ConsoleLevel::Info | ConsoleLevel::Log | ConsoleLevel::Debug => console.other += 1,
                }
            }
        }
    }

    let duration_ms = if input.harvest_time.is_finite() {
        input.harvest_time.max(latest)
    } else {
        latest
    };
    let measured = |kind: ObservationKind, delivered: usize| input.capabilities.contains(kind) || delivered > 0;

    let layout = if measured(ObservationKind::LayoutShift, shifts.len()) {
        Measured::Available(layout::summarize(&shifts, input.log, &correlator, config.top_n))
    } else {
        Measured::Unavailable
    };

    let first_input = timings
        .iter()
        .filter(|(_, t)| t.interaction_id != 0)
        .map(|(obs, _)| obs.timestamp)
        .min_by(|a, b| cmp_time(*a, *b));
    let paint = Measured::from_option(paint::largest_paint(&paints, first_input));

    let interactions = Measured::from_option(interaction::summarize(&timings, config.top_n));

    let churn = if measured(ObservationKind::Mutation, mutations.len()) {
        Measured::Available(churn::summarize(&mutations, duration_ms, config.top_n))
    } else {
        Measured::Unavailable
    };

    let frames = if measured(ObservationKind::LongFrame, long_frames) {
        Measured::Available(frames::summarize(
            input.log,
            &correlator,
            config.long_frame_blocking_ms,
            config.top_n,
        ))
    } else {
        Measured::Unavailable
    };

    let visibility = if measured(ObservationKind::VisibilityChange, visibility.len()) {
        let mut tracker = VisibilityTracker::with_tracked(input.tracked);
        visibility.sort_by(|(a, _), (b, _)| cmp_time(a.timestamp, b.timestamp).then(a.seq.cmp(&b.seq)));
        for (obs, change) in &visibility {
            tracker.observe_node(&change.element_id, change.node, obs.timestamp, change.ratio);
        }
        // Open sessions end at the harvest instant.
        let close_at = if input.harvest_time.is_finite() { input.harvest_time } else { latest };
        tracker.close_all(close_at);
        Measured::Available(tracker.into_metrics(config.dwell_floor_ms))
    } else {
        Measured::Unavailable
    };

    let contrast = if input.color_samples.is_empty() {
        Measured::Unavailable
    } else {
        Measured::Available(contrast::evaluate(input.color_samples, config.top_n))
    };

    let console = if measured(ObservationKind::ConsoleEntry, console_entries) {
        Measured::Available(console)
    } else {
        Measured::Unavailable
    };

    MetricSnapshot {
        duration_ms,
        observation_count: input.log.len(),
        layout,
        paint,
        interactions,
        churn,
        frames,
        visibility,
        contrast,
        console,
    }
}
