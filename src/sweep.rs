// Chain-propagation line sweep.
//
// Extends candidate chains edge by edge. One priority queue exists per
// pattern note index; entries pushed into `queue[i]` are chains whose
// last matched pattern note is i, waiting to be extended by a candidate
// in table i. Queues pop in ascending (target end index, target start
// index) order while each table is walked in ascending target start
// order, so every antecedent is consumed once instead of rescanning
// earlier tables — intra-vector continuity (antecedent ends where the
// candidate starts) makes transitive matches fall out of the sweep.
//
// When several antecedent chains end on the same target note, the
// longest one wins the binding; the candidate then carries the
// antecedent's occurrence id (or a fresh one if the antecedent was an
// unextended root) and is pushed onward. After each table the last entry
// is re-enqueued as a sentinel so the next table always has an
// antecedent to pop, even when nothing matched.

use std::collections::BinaryHeap;

use tracing::{debug, trace};

use crate::error::{MatchError, Result};
use crate::ktable::{EntryId, KTables};

/// Sweep tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct SweepConfig {
    /// Abort with `MatchError::StepBudget` once the sweep has performed
    /// this many queue operations. Guards against pathological scores
    /// where many repeated intervals inflate the tables.
    pub max_steps: Option<u64>,
}

/// Statistics from one sweep run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    /// Queue pushes and pops performed.
    pub steps: u64,
    /// Chain extensions bound.
    pub bindings: u64,
    /// Distinct occurrence ids allocated.
    pub occurrences: u32,
}

/// Queue element: target end/start of an enqueued entry. Ordering is
/// inverted so `BinaryHeap` pops the smallest (end, start) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueItem {
    end: usize,
    start: usize,
    id: EntryId,
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .end
            .cmp(&self.end)
            .then_with(|| other.start.cmp(&self.start))
            .then_with(|| other.id.0.cmp(&self.id.0))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Run the line sweep over already-built tables, binding chain
/// extensions in place.
pub fn propagate(tables: &mut KTables, config: &SweepConfig) -> Result<SweepStats> {
    let num_notes = tables.num_pattern_notes();
    let mut stats = SweepStats::default();
    if num_notes < 3 || tables.num_tables() < 2 {
        return Ok(stats);
    }

    let mut queues: Vec<BinaryHeap<QueueItem>> =
        (0..num_notes).map(|_| BinaryHeap::new()).collect();
    let mut next_occurrence: u32 = 0;

    // Seed with every first-table candidate, keyed by the pattern note
    // its edge lands on.
    for &id in tables.table(0) {
        let entry = tables.entry(id);
        queues[entry.pattern_vec.end_index].push(queue_item(tables, id));
        stats.steps += 1;
    }

    for i in 1..=num_notes - 2 {
        let table_len = tables.table(i).len();
        debug!(
            table = i,
            candidates = table_len,
            queued = queues[i].len(),
            "sweeping edge"
        );

        let mut antecedent = queues[i].pop();

        for row in 0..table_len {
            let id = tables.table(i)[row];
            let candidate = *tables.entry(id);
            let cand_start = candidate.target_vec.start_index;
            check_budget(&stats, config)?;
            stats.steps += 1;

            // Advance past antecedents that end before this candidate starts.
            while let Some(q) = antecedent {
                if q.end < cand_start && !queues[i].is_empty() {
                    antecedent = queues[i].pop();
                    stats.steps += 1;
                } else {
                    break;
                }
            }

            let Some(q) = antecedent else { break };
            if q.end != cand_start {
                continue;
            }

            // Several chains may end on this target note; the longest wins.
            let mut best = q;
            while queues[i].peek().is_some_and(|r| r.end == best.end) {
                let r = queues[i].pop().unwrap_or(best);
                stats.steps += 1;
                if tables.entry(r.id).w >= tables.entry(best.id).w {
                    best = r;
                }
            }
            antecedent = Some(best);

            let ante = *tables.entry(best.id);
            let occurrence = ante.occurrence.unwrap_or_else(|| {
                let fresh = next_occurrence;
                next_occurrence += 1;
                fresh
            });
            let entry = tables.entry_mut(id);
            entry.w = ante.w + 1;
            entry.backlink = Some(best.id);
            entry.occurrence = Some(occurrence);
            stats.bindings += 1;
            trace!(
                table = i,
                row,
                w = ante.w + 1,
                occurrence,
                "bound chain extension"
            );

            queues[candidate.pattern_vec.end_index].push(queue_item(tables, id));
            stats.steps += 1;
        }

        // Sentinel: guarantee the next table has something to pop.
        if let Some(&last) = tables.table(i).last() {
            tables.entry_mut(last).sentinel = true;
            queues[i + 1].push(queue_item(tables, last));
            stats.steps += 1;
        }
    }

    stats.occurrences = next_occurrence;
    debug!(
        steps = stats.steps,
        bindings = stats.bindings,
        occurrences = stats.occurrences,
        "sweep complete"
    );
    Ok(stats)
}

fn queue_item(tables: &KTables, id: EntryId) -> QueueItem {
    let tv = &tables.entry(id).target_vec;
    QueueItem {
        end: tv.end_index,
        start: tv.start_index,
        id,
    }
}

fn check_budget(stats: &SweepStats, config: &SweepConfig) -> Result<()> {
    match config.max_steps {
        Some(limit) if stats.steps >= limit => Err(MatchError::StepBudget { limit }),
        _ => Ok(()),
    }
}
