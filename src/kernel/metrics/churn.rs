use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::kernel::observation::{Mutation, Observation};

const UNATTRIBUTED: &str = "(unattributed)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeChurn {
    pub subtree_id: String,
    pub count: usize,
    pub added: u64,
    pub removed: u64,
    pub attribute_changes: u64,
    pub rate_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnMetrics {
    pub total_mutations: usize,
    pub rate_per_second: f64,
    pub subtree_count: usize,
    pub top_subtrees: Vec<SubtreeChurn>,
}

fn rate(count: usize, duration_seconds: f64) -> f64 {
    if duration_seconds > 0.0 {
        count as f64 / duration_seconds
    } else {
        0.0
    }
}

pub fn summarize(mutations: &[(&Observation, &Mutation)], duration_ms: f64, top_n: usize) -> ChurnMetrics {
    let seconds = duration_ms / 1000.0;
    let mut groups: Vec<SubtreeChurn> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for (observation, mutation) in mutations {
        let subtree = observation.subtree_id.as_deref().unwrap_or(UNATTRIBUTED);
        let slot = *index.entry(subtree).or_insert_with(|| {
            groups.push(SubtreeChurn {
                subtree_id: subtree.to_string(),
                count: 0,
                added: 0,
                removed: 0,
                attribute_changes: 0,
                rate_per_second: 0.0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.count += 1;
        group.added += u64::from(mutation.added);
        group.removed += u64::from(mutation.removed);
        group.attribute_changes += u64::from(mutation.attribute_changed);
    }

    for group in &mut groups {
        group.rate_per_second = rate(group.count, seconds);
    }
    // Stable sort keeps first-seen order among equal counts.
    groups.sort_by(|a, b| b.count.cmp(&a.count));

    let subtree_count = groups.len();
    groups.truncate(top_n);

    ChurnMetrics {
        total_mutations: mutations.len(),
        rate_per_second: rate(mutations.len(), seconds),
        subtree_count,
        top_subtrees: groups,
    }
}
