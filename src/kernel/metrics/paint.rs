use serde::{Deserialize, Serialize};

use crate::kernel::observation::{Observation, PaintCandidate};
use crate::kernel::time::{cmp_time, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LargestPaint {
    pub render_time_ms: Timestamp,
    pub size: f64,
    pub element: Option<String>,
    pub url: Option<String>,
}

/// The last candidate reported before the first user interaction.
/// Input stops the platform from emitting further candidates, so anything
/// later is stale.
pub fn largest_paint(
    candidates: &[(&Observation, &PaintCandidate)],
    first_input: Option<Timestamp>,
) -> Option<LargestPaint> {
    candidates
        .iter()
        .filter(|(obs, _)| first_input.map_or(true, |t| cmp_time(obs.timestamp, t).is_le()))
        .max_by(|(a, _), (b, _)| cmp_time(a.timestamp, b.timestamp).then(a.seq.cmp(&b.seq)))
        .map(|(_, candidate)| LargestPaint {
            render_time_ms: candidate.render_time,
            size: candidate.size,
            element: candidate.element.clone(),
            url: candidate.url.clone(),
        })
}
