use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::kernel::observation::{InteractionTiming, Observation};
use crate::kernel::time::Timestamp;

/// One interaction split into its three latency phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionBreakdown {
    pub interaction_id: u64,
    pub name: String,
    pub subtree_id: Option<String>,
    pub start_time: Timestamp,
    pub duration: f64,
    pub input_delay: f64,
    pub processing_time: f64,
    pub presentation_delay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionMetrics {
    /// Distinct interaction ids.
    pub interaction_count: usize,
    /// Entries with a non-zero interaction id; the percentile is taken over these.
    pub sample_count: usize,
    pub p98_ms: f64,
    pub slowest: Vec<InteractionBreakdown>,
}

/// `ceil(0.98 * n) - 1`, clamped into the slice.
pub fn p98_index(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let rank = (0.98 * n as f64).ceil() as usize;
    rank.saturating_sub(1).min(n - 1)
}

pub fn percentile_98(durations: &[f64]) -> Option<f64> {
    if durations.is_empty() {
        return None;
    }
    let mut sorted = durations.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[p98_index(sorted.len())])
}

pub fn breakdown(observation: &Observation, timing: &InteractionTiming) -> InteractionBreakdown {
    let end = timing.start_time + timing.duration;
    // Platform durations are rounded to 8ms, so the presentation phase can dip below zero.
    InteractionBreakdown {
        interaction_id: timing.interaction_id,
        name: timing.name.clone(),
        subtree_id: observation.subtree_id.clone(),
        start_time: timing.start_time,
        duration: timing.duration,
        input_delay: (timing.processing_start - timing.start_time).max(0.0),
        processing_time: (timing.processing_end - timing.processing_start).max(0.0),
        presentation_delay: (end - timing.processing_end).max(0.0),
    }
}

/// Entries without an interaction id (hover, scroll) are ignored. Every other
/// entry is a p98 sample. For the slowest list, entries sharing an id are one
/// interaction and the longest entry represents it.
pub fn summarize(timings: &[(&Observation, &InteractionTiming)], top_n: usize) -> Option<InteractionMetrics> {
    let samples: Vec<f64> = timings
        .iter()
        .filter(|(_, t)| t.interaction_id != 0)
        .map(|(_, t)| t.duration)
        .collect();
    let p98_ms = percentile_98(&samples)?;

    let mut interactions: BTreeMap<u64, InteractionBreakdown> = BTreeMap::new();
    for (observation, timing) in timings.iter().filter(|(_, t)| t.interaction_id != 0) {
        let candidate = breakdown(observation, timing);
        match interactions.get(&timing.interaction_id) {
            Some(existing) if existing.duration >= candidate.duration => {}
            _ => {
                interactions.insert(timing.interaction_id, candidate);
            }
        }
    }

    let mut slowest: Vec<InteractionBreakdown> = interactions.into_values().collect();
    slowest.sort_by(|a, b| {
        b.duration
            .total_cmp(&a.duration)
            .then(a.start_time.total_cmp(&b.start_time))
            .then(a.interaction_id.cmp(&b.interaction_id))
    });
    let interaction_count = slowest.len();
    slowest.truncate(top_n);

    Some(InteractionMetrics {
        interaction_count,
        sample_count: samples.len(),
        p98_ms,
        slowest,
    })
}
