//! Temporal correlation between two observation streams.
//!
//! For each primary observation the correlator derives a time window, pulls
//! every contributor whose timestamp lies inside it (inclusive on both ends)
//! and names the subtree that contributed most. Streams may interleave, so
//! contributors are merged into a time index first rather than trusting
//! arrival order.

use serde::{Deserialize, Serialize};

use super::observation::{Observation, ObservationKind, Payload};
use super::time::{cmp_time, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub primary: Observation,
    pub contributors: Vec<Observation>,
    pub dominant_subtree_id: Option<String>,
}

/// Decides which observations pair up and over what window.
pub trait Matcher {
    fn is_primary(&self, observation: &Observation) -> bool;

    fn is_contributor(&self, observation: &Observation) -> bool;

    /// Span entries cover `[t, t + duration]`; instantaneous ones `[t - epsilon, t + epsilon]`.
    fn window(&self, primary: &Observation, epsilon: f64) -> (Timestamp, Timestamp) {
        let duration = primary.duration();
        if duration > 0.0 {
            (primary.timestamp, primary.timestamp + duration)
        } else {
            let epsilon = epsilon.max(0.0);
            (primary.timestamp - epsilon, primary.timestamp + epsilon)
        }
    }

    fn accepts(&self, _primary: &Observation, _contributor: &Observation) -> bool {
        true
    }
}

/// Which subtrees were mutating while the main thread was blocked.
pub struct LongFrameMutations;

impl Matcher for LongFrameMutations {
    fn is_primary(&self, observation: &Observation) -> bool {
        observation.kind() == ObservationKind::LongFrame
    }

    fn is_contributor(&self, observation: &Observation) -> bool {
        observation.kind() == ObservationKind::Mutation
    }
}

/// Whether a layout shift's source subtree was itself being mutated.
/// Shifts without attribution are skipped.
pub struct ShiftMutations;

impl Matcher for ShiftMutations {
    fn is_primary(&self, observation: &Observation) -> bool {
        matches!(
            &observation.payload,
            Payload::LayoutShift(shift) if !shift.had_recent_input && shift.sources.is_some()
        )
    }

    fn is_contributor(&self, observation: &Observation) -> bool {
        observation.kind() == ObservationKind::Mutation
    }

    fn accepts(&self, primary: &Observation, contributor: &Observation) -> bool {
        let (Payload::LayoutShift(shift), Some(subtree)) = (&primary.payload, contributor.subtree_id.as_deref()) else {
            return false;
        };
        shift
            .sources
            .iter()
            .flatten()
            .filter_map(|s| s.subtree_id.as_deref())
            .any(|source| source == subtree || source.starts_with(&format!("{} > ", subtree)))
    }
}

/// Layout shifts active at the instant a tracked element changed visibility.
pub struct VisibilityShifts;

impl Matcher for VisibilityShifts {
    fn is_primary(&self, observation: &Observation) -> bool {
        observation.kind() == ObservationKind::VisibilityChange
    }

    fn is_contributor(&self, observation: &Observation) -> bool {
        matches!(&observation.payload, Payload::LayoutShift(shift) if shift.sources.is_some())
    }
}

/// Contributors ordered by `(timestamp, seq)` for range queries.
pub struct TimeIndex<'a> {
    entries: Vec<&'a Observation>,
}

impl<'a> TimeIndex<'a> {
    pub fn build(stream: impl IntoIterator<Item = &'a Observation>) -> Self {
        let mut entries: Vec<&'a Observation> = stream.into_iter().collect();
        entries.sort_by(|a, b| cmp_time(a.timestamp, b.timestamp).then(a.seq.cmp(&b.seq)));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries with `start <= timestamp <= end`, in time order.
    pub fn range(&self, start: Timestamp, end: Timestamp) -> &[&'a Observation] {
        let lo = self
            .entries
            .partition_point(|o| cmp_time(o.timestamp, start).is_lt());
        let hi = self
            .entries
            .partition_point(|o| cmp_time(o.timestamp, end).is_le());
        if lo >= hi {
            return &[];
        }
        &self.entries[lo..hi]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Correlator {
    pub epsilon: f64,
}

impl Correlator {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Pairs every primary in `primary_stream` with the contributors inside its window.
    /// One correlation per primary, in primary time order.
    pub fn correlate<M: Matcher>(
        &self,
        primary_stream: &[Observation],
        contributor_stream: &[Observation],
        matcher: &M,
    ) -> Vec<Correlation> {
        let index = TimeIndex::build(contributor_stream.iter().filter(|o| matcher.is_contributor(o)));

        let mut primaries: Vec<&Observation> = primary_stream
            .iter()
            .filter(|o| matcher.is_primary(o))
            .collect();
        primaries.sort_by(|a, b| cmp_time(a.timestamp, b.timestamp).then(a.seq.cmp(&b.seq)));

        primaries
            .into_iter()
            .map(|primary| {
                let (window_start, window_end) = matcher.window(primary, self.epsilon);
                let contributors: Vec<Observation> = index
                    .range(window_start, window_end)
                    .iter()
                    .filter(|c| c.seq != primary.seq || c.kind() != primary.kind())
                    .filter(|c| matcher.accepts(primary, c))
                    .map(|c| (*c).clone())
                    .collect();
                let dominant_subtree_id = dominant_subtree(&contributors);

                Correlation {
                    window_start,
                    window_end,
                    primary: primary.clone(),
                    contributors,
                    dominant_subtree_id,
                }
            })
            .collect()
    }

    /// Convenience for a single mixed log: both streams are drawn from `log`.
    pub fn correlate_log<M: Matcher>(&self, log: &[Observation], matcher: &M) -> Vec<Correlation> {
        self.correlate(log, log, matcher)
    }
}

/// Most frequent subtree among time-ordered contributors.
/// Equal counts go to the subtree seen first.
pub fn dominant_subtree(contributors: &[Observation]) -> Option<String> {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for subtree in contributors.iter().filter_map(|c| c.subtree_id.as_deref()) {
        match tally.iter_mut().find(|(s, _)| *s == subtree) {
            Some((_, count)) => *count += 1,
            None => tally.push((subtree, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (subtree, count) in tally {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((subtree, count));
        }
    }
    best.map(|(subtree, _)| subtree.to_string())
}
