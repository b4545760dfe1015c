use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::kernel::correlator::{Correlation, Correlator, LongFrameMutations};
use crate::kernel::observation::{LongFrame, Observation, Payload};
use crate::kernel::time::{cmp_time, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAttribution {
    pub start_time: Timestamp,
    pub duration: f64,
    pub blocking_ms: f64,
    pub contributor_count: usize,
    pub dominant_subtree_id: Option<String>,
    pub script_urls: Vec<String>,
}

/// A subtree ranked by how many janky frames it dominated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JankOffender {
    pub subtree_id: String,
    pub frames_dominated: usize,
    pub mutations_during_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetrics {
    pub long_frame_count: usize,
    pub total_blocking_time_ms: f64,
    pub longest_frame_ms: f64,
    pub worst_frames: Vec<FrameAttribution>,
    pub offenders: Vec<JankOffender>,
}

pub fn blocking_time(frame: &LongFrame, threshold_ms: f64) -> f64 {
    match frame.blocking_duration {
        Some(reported) if reported.is_finite() => reported.max(0.0),
        _ => (frame.duration - threshold_ms).max(0.0),
    }
}

pub fn summarize(log: &[Observation], correlator: &Correlator, threshold_ms: f64, top_n: usize) -> FrameMetrics {
    let correlations = correlator.correlate_log(log, &LongFrameMutations);

    let mut frames: Vec<FrameAttribution> = correlations.iter().filter_map(|c| attribute(c, threshold_ms)).collect();

    let total_blocking_time_ms: f64 = frames.iter().map(|f| f.blocking_ms).sum();
    let longest_frame_ms = frames.iter().map(|f| f.duration).fold(0.0, f64::max);
    let long_frame_count = frames.len();

    frames.sort_by(|a, b| b.duration.total_cmp(&a.duration).then(cmp_time(a.start_time, b.start_time)));
    frames.truncate(top_n);

    FrameMetrics {
        long_frame_count,
        total_blocking_time_ms,
        longest_frame_ms,
        worst_frames: frames,
        offenders: rank_offenders(&correlations, top_n),
    }
}

fn attribute(correlation: &Correlation, threshold_ms: f64) -> Option<FrameAttribution> {
    let Payload::LongFrame(frame) = &correlation.primary.payload else {
        return None;
    };
    Some(FrameAttribution {
        start_time: correlation.primary.timestamp,
        duration: frame.duration,
        blocking_ms: blocking_time(frame, threshold_ms),
        contributor_count: correlation.contributors.len(),
        dominant_subtree_id: correlation.dominant_subtree_id.clone(),
        script_urls: frame.scripts.iter().filter_map(|s| s.source_url.clone()).collect(),
    })
}

/// Answers "which part of the page caused the jank": each frame votes for
/// its dominant subtree.
pub fn rank_offenders(correlations: &[Correlation], top_n: usize) -> Vec<JankOffender> {
    let mut offenders: Vec<JankOffender> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for correlation in correlations {
        let Some(dominant) = &correlation.dominant_subtree_id else {
            continue;
        };
        let slot = *index.entry(dominant.clone()).or_insert_with(|| {
            offenders.push(JankOffender {
                subtree_id: dominant.clone(),
                frames_dominated: 0,
                mutations_during_frames: 0,
            });
            offenders.len() - 1
        });
        offenders[slot].frames_dominated += 1;
        offenders[slot].mutations_during_frames += correlation
            .contributors
            .iter()
            .filter(|c| c.subtree_id.as_deref() == Some(dominant.as_str()))
            .count();
    }

    offenders.sort_by(|a, b| {
        b.frames_dominated
            .cmp(&a.frames_dominated)
            .then(b.mutations_during_frames.cmp(&a.mutations_during_frames))
    });
    offenders.truncate(top_n);
    offenders
}
