use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::kernel::correlator::{Correlator, ShiftMutations};
use crate::kernel::observation::{LayoutShift, Observation};
use crate::kernel::time::Millionths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeShift {
    pub subtree_id: String,
    pub total: f64,
    pub shifts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutShiftMetrics {
    pub cls: f64,
    pub shift_count: usize,
    /// Shifts dropped because they followed recent input.
    pub excluded_shift_count: usize,
    /// Shifts counted in the total but delivered without sources.
    pub unattributed_count: usize,
    /// Shifts whose source subtree was mutating at the same instant.
    pub mutated_shift_count: usize,
    pub top_subtrees: Vec<SubtreeShift>,
}

/// Flat running total: no decay, no session windows.
pub fn cumulative_layout_shift<'a>(shifts: impl IntoIterator<Item = &'a LayoutShift>) -> f64 {
    shifts
        .into_iter()
        .filter(|s| !s.had_recent_input)
        .map(|s| Millionths::from_f64(s.value))
        .sum::<Millionths>()
        .to_f64()
}

pub fn summarize(
    shifts: &[(&Observation, &LayoutShift)],
    log: &[Observation],
    correlator: &Correlator,
    top_n: usize,
) -> LayoutShiftMetrics {
    let counted: Vec<&LayoutShift> = shifts
        .iter()
        .map(|(_, s)| *s)
        .filter(|s| !s.had_recent_input)
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (Millionths, usize)> = HashMap::new();
    let mut unattributed_count = 0;

    for shift in &counted {
        let Some(sources) = &shift.sources else {
            unattributed_count += 1;
            continue;
        };
        let mut seen: Vec<&str> = Vec::new();
        for subtree in sources.iter().filter_map(|s| s.subtree_id.as_deref()) {
            if seen.contains(&subtree) {
                continue;
            }
            seen.push(subtree);
            let entry = totals.entry(subtree.to_string()).or_insert_with(|| {
                order.push(subtree.to_string());
                (Millionths::default(), 0)
            });
            entry.0 += Millionths::from_f64(shift.value);
            entry.1 += 1;
        }
    }

    let mut top_subtrees: Vec<SubtreeShift> = order
        .into_iter()
        .filter_map(|subtree_id| {
            totals.get(&subtree_id).map(|(total, shifts)| SubtreeShift {
                total: total.to_f64(),
                shifts: *shifts,
                subtree_id,
            })
        })
        .collect();
    // Stable: equal totals keep first-seen order.
    top_subtrees.sort_by(|a, b| b.total.total_cmp(&a.total));
    top_subtrees.truncate(top_n);

    let mutated_shift_count = correlator
        .correlate_log(log, &ShiftMutations)
        .iter()
        .filter(|c| !c.contributors.is_empty())
        .count();

    LayoutShiftMetrics {
        cls: cumulative_layout_shift(counted.iter().copied()),
        shift_count: counted.len(),
        excluded_shift_count: shifts.len() - counted.len(),
        unattributed_count,
        mutated_shift_count,
        top_subtrees,
    }
}
