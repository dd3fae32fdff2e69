// KTable arena and builder.
//
// One KTable exists per pattern edge: `table(i)` holds a candidate entry
// for every target vector sharing the matching feature of the unique
// pattern vector spanning notes i → i+1 (the unit edge). Entries for all
// tables live in a single arena and are addressed by `EntryId`, so the
// backlinks the sweep writes are plain indices — shared, non-owning, and
// impossible to dangle. The arena is the sole owner of every entry for
// the duration of a matching run.

use tracing::debug;

use crate::error::{MatchError, Result};
use crate::score::{IntraVector, Score};

/// Stable identifier of a `KEntry` in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub usize);

/// A candidate alignment of one pattern edge to one target edge.
///
/// Invariant once bound: `backlink` points at an entry whose target
/// vector ends where this one's starts, and `w` is the backlink's `w`
/// plus one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KEntry {
    pub pattern_vec: IntraVector,
    pub target_vec: IntraVector,
    /// Chain length in bound edges; 0 for an unextended candidate.
    pub w: u32,
    /// Occurrence chain this entry belongs to, assigned on first binding.
    pub occurrence: Option<u32>,
    /// Antecedent in the chain, owned by the arena.
    pub backlink: Option<EntryId>,
    /// Marks the per-table forward-progress entry the sweep re-enqueues.
    pub sentinel: bool,
}

impl KEntry {
    fn candidate(pattern_vec: IntraVector, target_vec: IntraVector) -> Self {
        KEntry {
            pattern_vec,
            target_vec,
            w: 0,
            occurrence: None,
            backlink: None,
            sentinel: false,
        }
    }
}

/// The per-edge candidate tables plus the arena backing them.
#[derive(Debug, Clone)]
pub struct KTables {
    num_pattern_notes: usize,
    entries: Vec<KEntry>,
    tables: Vec<Vec<EntryId>>,
}

impl KTables {
    /// Build the candidate tables for `pattern` against `target`.
    ///
    /// For each pattern edge i the unit vector i → i+1 is located (failing
    /// with `InvalidPattern` if the pattern is not densely indexed), every
    /// target vector sharing its matching feature becomes a candidate, and
    /// the table is sorted by target start index, ties by target end index.
    pub fn build(pattern: &Score, target: &Score) -> Result<Self> {
        let feature = target.feature;
        let num_edges = pattern.num_notes.saturating_sub(1);
        let mut entries = Vec::new();
        let mut tables = Vec::with_capacity(num_edges);

        for i in 0..num_edges {
            let unit = unit_edge(pattern, i)?;
            let key = feature.key(&unit);

            let mut ids: Vec<EntryId> = Vec::new();
            for &vector_index in target.vectors_with_key(key) {
                let id = EntryId(entries.len());
                entries.push(KEntry::candidate(unit, target.vectors[vector_index]));
                ids.push(id);
            }
            ids.sort_by_key(|&id| {
                let tv = &entries[id.0].target_vec;
                (tv.start_index, tv.end_index)
            });
            debug!(table = i, candidates = ids.len(), "built K table");
            tables.push(ids);
        }

        Ok(KTables {
            num_pattern_notes: pattern.num_notes,
            entries,
            tables,
        })
    }

    pub fn num_pattern_notes(&self) -> usize {
        self.num_pattern_notes
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    /// Entry ids of table `i`, sorted by target start index.
    pub fn table(&self, i: usize) -> &[EntryId] {
        &self.tables[i]
    }

    pub fn entry(&self, id: EntryId) -> &KEntry {
        &self.entries[id.0]
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> &mut KEntry {
        &mut self.entries[id.0]
    }

    /// All arena entries with their ids, in allocation order.
    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &KEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (EntryId(i), e))
    }
}

/// The unique pattern vector spanning notes i → i+1.
fn unit_edge(pattern: &Score, i: usize) -> Result<IntraVector> {
    pattern
        .vectors_starting_at(i)
        .iter()
        .map(|&v| pattern.vectors[v])
        .find(|v| v.end_index == i + 1)
        .ok_or(MatchError::InvalidPattern { index: i })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{MatchFeature, index_notes};

    fn pattern() -> Score {
        // C4 D4 E4: two unit edges, both +2 semitones.
        index_notes(&[(0.0, 60), (1.0, 62), (2.0, 64)], 1, MatchFeature::default())
    }

    #[test]
    fn builds_one_table_per_pattern_edge() {
        let target = index_notes(
            &[(0.0, 55), (1.0, 57), (2.0, 59), (3.0, 48)],
            2,
            MatchFeature::default(),
        );
        let tables = KTables::build(&pattern(), &target).unwrap();
        assert_eq!(tables.num_tables(), 2);
        assert_eq!(tables.num_pattern_notes(), 3);
        // Target edges with y == +2: 0→1 and 1→2.
        assert_eq!(tables.table(0).len(), 2);
        assert_eq!(tables.table(1).len(), 2);
    }

    #[test]
    fn tables_are_sorted_by_target_start_then_end() {
        let target = index_notes(
            &[(0.0, 60), (1.0, 62), (2.0, 64), (3.0, 66)],
            3,
            MatchFeature::default(),
        );
        let tables = KTables::build(&pattern(), &target).unwrap();
        for i in 0..tables.num_tables() {
            let keys: Vec<(usize, usize)> = tables
                .table(i)
                .iter()
                .map(|&id| {
                    let tv = &tables.entry(id).target_vec;
                    (tv.start_index, tv.end_index)
                })
                .collect();
            let mut sorted = keys.clone();
            sorted.sort();
            assert_eq!(keys, sorted);
        }
    }

    #[test]
    fn candidates_start_unbound() {
        let target = index_notes(&[(0.0, 60), (1.0, 62)], 1, MatchFeature::default());
        let tables = KTables::build(&pattern(), &target).unwrap();
        for (_, entry) in tables.entries() {
            assert_eq!(entry.w, 0);
            assert!(entry.backlink.is_none());
            assert!(entry.occurrence.is_none());
        }
    }

    #[test]
    fn sparse_pattern_is_invalid() {
        // Drop the 1→2 unit edge: only the 0→1 vector remains.
        let full = pattern();
        let vectors: Vec<IntraVector> = full
            .vectors
            .iter()
            .copied()
            .filter(|v| v.start_index == 0)
            .collect();
        let sparse = Score::new(3, vectors, MatchFeature::default());
        let target = index_notes(&[(0.0, 60), (1.0, 62)], 1, MatchFeature::default());
        assert!(matches!(
            KTables::build(&sparse, &target),
            Err(MatchError::InvalidPattern { index: 1 })
        ));
    }

    #[test]
    fn empty_feature_bucket_gives_empty_table() {
        // Target moves by fourths; no +2 edges anywhere.
        let target = index_notes(&[(0.0, 60), (1.0, 65), (2.0, 70)], 1, MatchFeature::default());
        let tables = KTables::build(&pattern(), &target).unwrap();
        assert!(tables.table(0).is_empty());
        assert!(tables.table(1).is_empty());
    }
}
