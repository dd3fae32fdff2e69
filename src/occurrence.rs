// Chain extraction and occurrence filtering.
//
// After the sweep, every bound entry carries an occurrence id inherited
// along its chain. Extraction keeps, per id, the entry with the longest
// chain, walks its backlinks from terminal to root, and reassembles the
// note-level view: matched target notes, (pattern, target) note pairs,
// the transposition at the chain root, and the widest index gap crossed
// on either side. Occurrences are self-contained values that outlive the
// arena.
//
// Filtering drops degenerate two-note chains and anything missing more
// than `MAX_MISSING_NOTES` pattern notes.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ktable::{EntryId, KTables};

/// Most pattern notes an occurrence may be missing and still be reported.
pub const MAX_MISSING_NOTES: usize = 3;

/// A reported pattern match in the target score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// Target note positions matched, in score order.
    pub target_notes: Vec<usize>,
    /// Matched (pattern note, target note) pairs, in pattern order.
    pub matching_pairs: Vec<(usize, usize)>,
    /// Constant pitch offset from pattern to target at the chain root.
    pub transposition: i32,
    /// True when some edge matched diatonically but not chromatically.
    pub diatonic_only: bool,
    /// Widest pattern-side index gap crossed by a single edge.
    pub max_pattern_window: usize,
    /// Widest target-side index gap crossed by a single edge.
    pub max_target_window: usize,
    /// Number of matched notes; always `matching_pairs.len()`.
    pub size: usize,
}

/// Extract the filtered occurrence list from swept tables, in ascending
/// occurrence-id order.
pub fn extract_occurrences(tables: &KTables) -> Vec<Occurrence> {
    // Per occurrence id, the longest chain observed wins.
    let mut terminals: FxHashMap<u32, EntryId> = FxHashMap::default();
    for (id, entry) in tables.entries() {
        let Some(occurrence) = entry.occurrence else {
            continue;
        };
        match terminals.get(&occurrence) {
            Some(&best) if tables.entry(best).w >= entry.w => {}
            _ => {
                terminals.insert(occurrence, id);
            }
        }
    }

    let mut ids: Vec<u32> = terminals.keys().copied().collect();
    ids.sort_unstable();

    let num_pattern_notes = tables.num_pattern_notes();
    let mut occurrences = Vec::new();
    for occurrence_id in ids {
        let terminal = terminals[&occurrence_id];
        let entry = tables.entry(terminal);
        let size = entry.w as usize + 2;
        if entry.w == 0 || num_pattern_notes.saturating_sub(size) > MAX_MISSING_NOTES {
            continue;
        }
        occurrences.push(extract_chain(tables, terminal));
    }
    debug!(
        chains = terminals.len(),
        reported = occurrences.len(),
        "extracted occurrences"
    );
    occurrences
}

/// Walk backlinks from a terminal entry to its root and assemble the
/// occurrence. Iterative; a chain is at most one entry per pattern edge
/// and visits strictly decreasing target start indices.
fn extract_chain(tables: &KTables, terminal: EntryId) -> Occurrence {
    let mut chain = Vec::new();
    let mut cursor = Some(terminal);
    while let Some(id) = cursor {
        chain.push(id);
        debug_assert!(chain.len() <= tables.num_pattern_notes());
        cursor = tables.entry(id).backlink;
    }
    chain.reverse();

    let root = tables.entry(chain[0]);
    let mut target_notes = vec![
        root.target_vec.start_index,
        root.target_vec.end_index,
    ];
    let mut matching_pairs = vec![
        (root.pattern_vec.start_index, root.target_vec.start_index),
        (root.pattern_vec.end_index, root.target_vec.end_index),
    ];
    let transposition = root.target_vec.start_pitch - root.pattern_vec.start_pitch;

    let mut diatonic_only = false;
    let mut max_pattern_window = 0;
    let mut max_target_window = 0;
    for &id in &chain {
        let entry = tables.entry(id);
        max_pattern_window =
            max_pattern_window.max(entry.pattern_vec.end_index - entry.pattern_vec.start_index);
        max_target_window =
            max_target_window.max(entry.target_vec.end_index - entry.target_vec.start_index);
        if entry.target_vec.diatonic_diff == entry.pattern_vec.diatonic_diff
            && entry.target_vec.chromatic_diff != entry.pattern_vec.chromatic_diff
        {
            diatonic_only = true;
        }
    }

    for &id in &chain[1..] {
        let entry = tables.entry(id);
        target_notes.push(entry.target_vec.end_index);
        matching_pairs.push((entry.pattern_vec.end_index, entry.target_vec.end_index));
    }

    let size = matching_pairs.len();
    Occurrence {
        target_notes,
        matching_pairs,
        transposition,
        diatonic_only,
        max_pattern_window,
        max_target_window,
        size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ktable::KTables;
    use crate::score::{IntraVector, MatchFeature, Score, index_notes};
    use crate::sweep::{SweepConfig, propagate};

    fn occurrences_for(
        pattern: &[(f64, i32)],
        target: &[(f64, i32)],
        window: usize,
    ) -> Vec<Occurrence> {
        let pattern = index_notes(pattern, 1, MatchFeature::default());
        let target = index_notes(target, window, MatchFeature::default());
        let mut tables = KTables::build(&pattern, &target).unwrap();
        propagate(&mut tables, &SweepConfig::default()).unwrap();
        extract_occurrences(&tables)
    }

    #[test]
    fn literal_statement_is_reported_in_full() {
        let pattern = [(0.0, 60), (1.0, 62), (2.0, 64), (3.0, 65)];
        let target = [
            (0.0, 40),
            (1.0, 60),
            (2.0, 62),
            (3.0, 64),
            (4.0, 65),
            (5.0, 40),
        ];
        let occs = occurrences_for(&pattern, &target, 1);
        assert_eq!(occs.len(), 1);
        let occ = &occs[0];
        assert_eq!(occ.size, 4);
        assert_eq!(occ.target_notes, vec![1, 2, 3, 4]);
        assert_eq!(occ.matching_pairs, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
        assert_eq!(occ.transposition, 0);
        assert!(!occ.diatonic_only);
        assert_eq!(occ.max_pattern_window, 1);
        assert_eq!(occ.max_target_window, 1);
    }

    #[test]
    fn pairs_length_always_equals_size() {
        let pattern = [(0.0, 60), (1.0, 62), (2.0, 64), (3.0, 65)];
        let target = [
            (0.0, 60),
            (1.0, 62),
            (2.0, 64),
            (3.0, 65),
            (4.0, 62),
            (5.0, 64),
            (6.0, 65),
        ];
        for occ in occurrences_for(&pattern, &target, 2) {
            assert_eq!(occ.matching_pairs.len(), occ.size);
            assert_eq!(occ.target_notes.len(), occ.size);
        }
    }

    #[test]
    fn transposed_statement_reports_interval() {
        let pattern = [(0.0, 60), (1.0, 62), (2.0, 64), (3.0, 65)];
        let target = [(0.0, 65), (1.0, 67), (2.0, 69), (3.0, 70)];
        let occs = occurrences_for(&pattern, &target, 1);
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].transposition, 5);
        assert!(!occs[0].diatonic_only);
    }

    #[test]
    fn target_gap_widens_target_window() {
        let pattern = [(0.0, 60), (1.0, 62), (2.0, 64)];
        let target = [(0.0, 60), (1.0, 62), (2.0, 30), (3.0, 64)];
        let occs = occurrences_for(&pattern, &target, 2);
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].target_notes, vec![0, 1, 3]);
        assert_eq!(occs[0].max_target_window, 2);
        assert_eq!(occs[0].max_pattern_window, 1);
    }

    #[test]
    fn chain_missing_three_notes_is_kept() {
        // 7-note pattern, only the first four notes appear in the target.
        let pattern: Vec<(f64, i32)> = [60, 62, 64, 65, 67, 69, 71]
            .iter()
            .enumerate()
            .map(|(i, &p)| (i as f64, p))
            .collect();
        let target = [(0.0, 60), (1.0, 62), (2.0, 64), (3.0, 65), (4.0, 40)];
        let occs = occurrences_for(&pattern, &target, 1);
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].size, 4);
    }

    #[test]
    fn chain_missing_four_notes_is_dropped() {
        let pattern: Vec<(f64, i32)> = [60, 62, 64, 65, 67, 69, 71, 72]
            .iter()
            .enumerate()
            .map(|(i, &p)| (i as f64, p))
            .collect();
        let target = [(0.0, 60), (1.0, 62), (2.0, 64), (3.0, 65), (4.0, 40)];
        let occs = occurrences_for(&pattern, &target, 1);
        assert!(occs.is_empty());
    }

    #[test]
    fn degenerate_two_note_chains_are_dropped() {
        // Only one pattern edge ever matches, so no chain grows past w == 0.
        let pattern = [(0.0, 60), (1.0, 62), (2.0, 64)];
        let target = [(0.0, 60), (1.0, 62), (2.0, 90)];
        let occs = occurrences_for(&pattern, &target, 1);
        assert!(occs.is_empty());
    }

    #[test]
    fn diatonic_variant_flags_ornamented_match() {
        // Pattern rises a major third then a minor third; the target answers
        // with minor then major. Same diatonic steps, different chromatics.
        let unit = |start: usize, pitches: (i32, i32), diatonic: i32| IntraVector {
            x: 1.0,
            y: pitches.1 - pitches.0,
            start_index: start,
            end_index: start + 1,
            start_pitch: pitches.0,
            end_pitch: pitches.1,
            diatonic_diff: diatonic,
            chromatic_diff: pitches.1 - pitches.0,
        };
        let pattern = Score::new(
            3,
            vec![unit(0, (60, 64), 2), unit(1, (64, 67), 2)],
            MatchFeature::Diatonic,
        );
        let target = Score::new(
            3,
            vec![unit(0, (57, 60), 2), unit(1, (60, 64), 2)],
            MatchFeature::Diatonic,
        );
        let mut tables = KTables::build(&pattern, &target).unwrap();
        propagate(&mut tables, &SweepConfig::default()).unwrap();
        let occs = extract_occurrences(&tables);
        assert_eq!(occs.len(), 1);
        assert!(occs[0].diatonic_only);
        assert_eq!(occs[0].transposition, -3);
        assert_eq!(occs[0].size, 3);
    }

    #[test]
    fn repeated_statements_report_separate_occurrences() {
        let pattern = [(0.0, 60), (1.0, 62), (2.0, 64)];
        let target = [
            (0.0, 60),
            (1.0, 62),
            (2.0, 64),
            (3.0, 40),
            (4.0, 60),
            (5.0, 62),
            (6.0, 64),
        ];
        let occs = occurrences_for(&pattern, &target, 1);
        assert_eq!(occs.len(), 2);
        assert_eq!(occs[0].target_notes, vec![0, 1, 2]);
        assert_eq!(occs[1].target_notes, vec![4, 5, 6]);
    }

    #[test]
    fn occurrence_serializes_with_json_field_names() {
        let pattern = [(0.0, 60), (1.0, 62), (2.0, 64)];
        let target = [(0.0, 60), (1.0, 62), (2.0, 64)];
        let occs = occurrences_for(&pattern, &target, 1);
        let json = serde_json::to_value(&occs).unwrap();
        let first = &json[0];
        assert_eq!(first["targetNotes"], serde_json::json!([0, 1, 2]));
        assert_eq!(first["size"], 3);
        assert_eq!(first["diatonicOnly"], false);
        assert!(first["maxTargetWindow"].is_number());
    }

    #[test]
    fn occurrence_list_round_trips_through_json() {
        let pattern = [(0.0, 60), (1.0, 62), (2.0, 64), (3.0, 65)];
        let target = [
            (0.0, 65),
            (1.0, 67),
            (2.0, 69),
            (3.0, 70),
            (4.0, 60),
            (5.0, 62),
            (6.0, 64),
            (7.0, 65),
        ];
        let occs = occurrences_for(&pattern, &target, 1);
        assert!(!occs.is_empty());
        let json = serde_json::to_string(&occs).unwrap();
        let recovered: Vec<Occurrence> = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, occs);
    }
}
