// Score data model and indexing.
//
// A score arrives pre-indexed: a note count plus a list of intra-vectors,
// each describing the directed relation between two notes (time delta,
// pitch interval, note positions, and optionally pitch/diatonic detail).
// This module parses the two text formats the matchers consume and builds
// the lookup maps the KTable builder needs: vectors grouped by matching
// feature, and vectors grouped by start note.
//
// Computing intra-vectors from raw notes is out of scope here — scores
// are indexed upstream. Raw `Note` lists are only read for the DP matcher.
//
// Indexed score format:
//   line 1: header (ignored)
//   line 2: note count
//   line 3: vector count
//   then one CSV row per vector: `x,y,startIndex,endIndex` or the
//   extended `x,y,startIndex,endIndex,startPitch,endPitch,diatonicDiff,chromaticDiff`
//
// Note list format (DP matcher input):
//   line 1: note count
//   then one `offset,pitch` row per note

use std::path::Path;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// A single note: onset time and MIDI pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub offset: f64,
    pub pitch: i32,
}

/// A directed relation between two notes of one score.
///
/// The four extended fields are zero when the score was indexed with the
/// compact 4-column format; diatonic-tolerant matching needs the full
/// 8-column format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntraVector {
    /// Time delta between the two notes.
    pub x: f64,
    /// Pitch interval in semitones.
    pub y: i32,
    /// Position of the first note in the score.
    pub start_index: usize,
    /// Position of the second note in the score.
    pub end_index: usize,
    pub start_pitch: i32,
    pub end_pitch: i32,
    /// Interval measured in scale steps.
    pub diatonic_diff: i32,
    /// Interval measured in semitones (signed, may differ from `y` in
    /// compact-format scores where `y` is the only interval column).
    pub chromatic_diff: i32,
}

/// Which vector feature two edges must share to be considered a match.
///
/// The two variants are mutually exclusive: exact pitch-interval matching
/// compares `y`, diatonic-tolerant matching compares `diatonic_diff` and
/// lets the chromatic interval differ (an ornamented or modal variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchFeature {
    #[default]
    PitchInterval,
    Diatonic,
}

impl MatchFeature {
    /// The key a vector contributes to the feature index.
    pub fn key(self, vector: &IntraVector) -> i32 {
        match self {
            MatchFeature::PitchInterval => vector.y,
            MatchFeature::Diatonic => vector.diatonic_diff,
        }
    }
}

/// A parsed score with its derived lookup indices.
///
/// The indices are built once in the constructor and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Score {
    pub num_notes: usize,
    pub vectors: Vec<IntraVector>,
    pub feature: MatchFeature,
    by_feature: FxHashMap<i32, Vec<usize>>,
    by_start: FxHashMap<usize, Vec<usize>>,
}

impl Score {
    /// Build a score from already-parsed vectors, indexing by `feature`.
    pub fn new(num_notes: usize, vectors: Vec<IntraVector>, feature: MatchFeature) -> Self {
        let mut by_feature: FxHashMap<i32, Vec<usize>> = FxHashMap::default();
        let mut by_start: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for (i, vector) in vectors.iter().enumerate() {
            by_feature.entry(feature.key(vector)).or_default().push(i);
            by_start.entry(vector.start_index).or_default().push(i);
        }
        Score {
            num_notes,
            vectors,
            feature,
            by_feature,
            by_start,
        }
    }

    /// Parse an indexed score from text.
    pub fn parse(text: &str, feature: MatchFeature) -> Result<Self> {
        let mut lines = numbered_lines(text);

        // Header line documents the CSV columns; skip it.
        lines.next();
        let (line_no, count_line) = lines.next().unwrap_or((2, ""));
        let num_notes: usize = parse_field(count_line.trim(), line_no)?;
        let (line_no, count_line) = lines.next().unwrap_or((3, ""));
        let num_vectors: usize = parse_field(count_line.trim(), line_no)?;

        let rows: Vec<(usize, &str)> = lines.collect();
        if rows.len() != num_vectors {
            return Err(MatchError::CountMismatch {
                what: "vector",
                declared: num_vectors,
                actual: rows.len(),
            });
        }

        let mut vectors = Vec::with_capacity(num_vectors);
        for (line_no, row) in rows {
            vectors.push(parse_vector(row, line_no)?);
        }
        Ok(Score::new(num_notes, vectors, feature))
    }

    /// Load an indexed score from a file.
    pub fn load(path: &Path, feature: MatchFeature) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MatchError::io(path.display().to_string(), e))?;
        Score::parse(&text, feature)
    }

    /// Indices of vectors whose matching-feature key equals `key`.
    pub fn vectors_with_key(&self, key: i32) -> &[usize] {
        self.by_feature.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Indices of vectors starting at note `index`.
    pub fn vectors_starting_at(&self, index: usize) -> &[usize] {
        self.by_start.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Parse a raw note list (DP matcher input) from text.
pub fn parse_notes(text: &str) -> Result<Vec<Note>> {
    let mut lines = numbered_lines(text);
    let (line_no, count_line) = lines.next().unwrap_or((1, ""));
    let num_notes: usize = parse_field(count_line.trim(), line_no)?;

    let rows: Vec<(usize, &str)> = lines.collect();
    if rows.len() != num_notes {
        return Err(MatchError::CountMismatch {
            what: "note",
            declared: num_notes,
            actual: rows.len(),
        });
    }

    let mut notes = Vec::with_capacity(num_notes);
    for (line_no, row) in rows {
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() != 2 {
            return Err(MatchError::MalformedField {
                line: line_no,
                text: row.to_string(),
            });
        }
        notes.push(Note {
            offset: parse_field(fields[0], line_no)?,
            pitch: parse_field(fields[1], line_no)?,
        });
    }
    Ok(notes)
}

/// Load a raw note list from a file.
pub fn load_notes(path: &Path) -> Result<Vec<Note>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| MatchError::io(path.display().to_string(), e))?;
    parse_notes(&text)
}

/// Non-empty lines paired with their 1-based line numbers.
fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end()))
        .filter(|(_, line)| !line.trim().is_empty())
}

fn parse_field<T: FromStr>(text: &str, line: usize) -> Result<T> {
    text.parse().map_err(|_| MatchError::MalformedField {
        line,
        text: text.to_string(),
    })
}

/// Parse one CSV vector row. Accepts the 4-column compact schema or the
/// 8-column extended schema; compact rows leave the pitch and diatonic
/// fields at zero.
fn parse_vector(row: &str, line: usize) -> Result<IntraVector> {
    let fields: Vec<&str> = row.split(',').map(str::trim).collect();
    if fields.len() != 4 && fields.len() != 8 {
        return Err(MatchError::MalformedField {
            line,
            text: row.to_string(),
        });
    }

    let mut vector = IntraVector {
        x: parse_field(fields[0], line)?,
        y: parse_field(fields[1], line)?,
        start_index: parse_field(fields[2], line)?,
        end_index: parse_field(fields[3], line)?,
        start_pitch: 0,
        end_pitch: 0,
        diatonic_diff: 0,
        chromatic_diff: 0,
    };
    if fields.len() == 8 {
        vector.start_pitch = parse_field(fields[4], line)?;
        vector.end_pitch = parse_field(fields[5], line)?;
        vector.diatonic_diff = parse_field(fields[6], line)?;
        vector.chromatic_diff = parse_field(fields[7], line)?;
    }
    if vector.end_index <= vector.start_index {
        return Err(MatchError::ReversedVector {
            line,
            start_index: vector.start_index,
            end_index: vector.end_index,
        });
    }
    Ok(vector)
}

/// Test fixture: index a note list into unit-window intra-vectors the way
/// the upstream indexer would, pairing each note with its successors up
/// to `window` positions ahead.
#[cfg(test)]
pub(crate) fn index_notes(notes: &[(f64, i32)], window: usize, feature: MatchFeature) -> Score {
    let mut vectors = Vec::new();
    for (i, &(offset_a, pitch_a)) in notes.iter().enumerate() {
        for j in (i + 1)..notes.len().min(i + 1 + window) {
            let (offset_b, pitch_b) = notes[j];
            let chromatic = pitch_b - pitch_a;
            vectors.push(IntraVector {
                x: offset_b - offset_a,
                y: chromatic,
                start_index: i,
                end_index: j,
                start_pitch: pitch_a,
                end_pitch: pitch_b,
                diatonic_diff: diatonic_steps(chromatic),
                chromatic_diff: chromatic,
            });
        }
    }
    Score::new(notes.len(), vectors, feature)
}

/// Rough semitone-to-scale-step mapping, good enough for fixtures.
#[cfg(test)]
fn diatonic_steps(chromatic: i32) -> i32 {
    const STEPS: [i32; 12] = [0, 0, 1, 2, 2, 3, 3, 4, 5, 5, 6, 6];
    let octaves = chromatic.div_euclid(12);
    let rem = chromatic.rem_euclid(12) as usize;
    octaves * 7 + STEPS[rem]
}
