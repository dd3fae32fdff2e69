// motif_search — geometric melodic pattern matching.
//
// Locates occurrences of a short melodic pattern inside a longer score,
// tolerating transposition and a bounded number of missing or inserted
// notes. Scores arrive pre-indexed as "intra-vectors" — pairwise note
// relations carrying time delta and pitch interval — so matching is a
// question of chaining compatible edges, not comparing raw notes.
//
// Two independent matchers:
// - The W line sweep: per-pattern-edge candidate tables, a priority-queue
//   sweep that binds maximal chains of matching intra-vectors, then chain
//   extraction with a gap-tolerance filter.
// - DPW1: a bounded-window dynamic program over raw note lists for exact
//   interval matching with a fixed target-side skip window.
//
// Module overview:
// - `error.rs`:      `MatchError` taxonomy; every failure aborts the run.
// - `score.rs`:      `Note`, `IntraVector`, `Score` + derived indices and
//                    the two text input formats.
// - `ktable.rs`:     per-edge candidate tables in an id-addressed arena;
//                    backlinks are arena indices, never owning pointers.
// - `sweep.rs`:      the chain-propagation line sweep.
// - `occurrence.rs`: chain extraction, dedup, filtering, JSON shape.
// - `dpw.rs`:        the bounded-window DP and its matrix dump.
//
// Matching is single-threaded and in-memory; one `Score` and one arena
// live per run, and occurrences are copied out as self-contained values.

pub mod dpw;
pub mod error;
pub mod ktable;
pub mod occurrence;
pub mod score;
pub mod sweep;

pub use dpw::{DEFAULT_TARGET_WINDOW, DpwReport, DpwResult};
pub use error::{MatchError, Result};
pub use ktable::{EntryId, KEntry, KTables};
pub use occurrence::{MAX_MISSING_NOTES, Occurrence, extract_occurrences};
pub use score::{IntraVector, MatchFeature, Note, Score};
pub use sweep::{SweepConfig, SweepStats, propagate};

/// Run the full W pipeline: build tables, sweep, extract occurrences.
pub fn find_occurrences(
    pattern: &Score,
    target: &Score,
    config: &SweepConfig,
) -> Result<Vec<Occurrence>> {
    let mut tables = KTables::build(pattern, target)?;
    propagate(&mut tables, config)?;
    Ok(extract_occurrences(&tables))
}
