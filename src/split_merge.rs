//! Merge and split of per-field symbol streams.
//!
//! The sequence model is trained on four parallel streams per staff line:
//! rhythm (symbol kind + duration), pitch (letter + octave), lift (the
//! printed accidental) and note presence.  `split_symbols` derives those
//! streams from a merged semantic encoding; `merge_symbols` is the inverse
//! direction.  The two are used together to normalize between "alteration"
//! spelling (the sounding pitch) and "accidental" spelling (what is
//! actually printed, given the active key signature and the accidentals
//! already placed earlier in the measure).

use std::collections::HashMap;

use tracing::warn;

use crate::tokens::key_signature_fifths;

pub const NO_NOTE: &str = "nonote";
pub const LIFT_NULL: &str = "lift_null";

/// The four parallel per-position streams for one staff line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolStreams {
    pub lifts: Vec<String>,
    pub pitches: Vec<String>,
    pub rhythms: Vec<String>,
    pub notes: Vec<String>,
}

impl SymbolStreams {
    fn push(&mut self, lift: &str, pitch: &str, rhythm: String, note: &str) {
        self.lifts.push(lift.to_string());
        self.pitches.push(pitch.to_string());
        self.rhythms.push(rhythm);
        self.notes.push(note.to_string());
    }

    fn push_rhythm_only(&mut self, rhythm: String) {
        self.push(NO_NOTE, NO_NOTE, rhythm, NO_NOTE);
    }
}

const LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];
const SHARP_ORDER: [char; 7] = ['F', 'C', 'G', 'D', 'A', 'E', 'B'];
const FLAT_ORDER: [char; 7] = ['B', 'E', 'A', 'D', 'G', 'C', 'F'];

/// Alteration a key signature applies to a letter (all octaves).
pub fn key_default_alter(fifths: i32, letter: char) -> i32 {
    if fifths > 0 {
        let sharps = &SHARP_ORDER[..fifths as usize];
        if sharps.contains(&letter) {
            return 1;
        }
    } else if fifths < 0 {
        let flats = &FLAT_ORDER[..(-fifths) as usize];
        if flats.contains(&letter) {
            return -1;
        }
    }
    0
}

fn letter_index(letter: char) -> i32 {
    LETTERS.iter().position(|&l| l == letter).unwrap_or(0) as i32
}

/// Diatonic height for chord sorting.
fn pitch_height(letter: char, octave: i32) -> i32 {
    octave * 7 + letter_index(letter)
}

/// Parse a pitch like "E4", "E4#" or "Eb4" (the accidental may sit on
/// either side of the octave digit) into (letter, octave, sounding alter).
fn parse_pitch(pitch: &str) -> Option<(char, i32, i32)> {
    let mut chars = pitch.chars();
    let letter = chars.next()?;
    if !LETTERS.contains(&letter) {
        return None;
    }
    let mut octave = None;
    let mut alter = 0;
    for c in chars {
        match c {
            '0'..='9' => octave = Some(c as i32 - '0' as i32),
            '#' => alter = 1,
            'b' => alter = -1,
            'N' => alter = 0,
            _ => return None,
        }
    }
    Some((letter, octave?, alter))
}

/// Measure-scoped accidental bookkeeping, keyed by (letter, octave) so an
/// accidental on F4 does not silence the one needed on F3.
#[derive(Default)]
struct AccidentalState {
    fifths: i32,
    placed: HashMap<(char, i32), i32>,
}

impl AccidentalState {
    fn current(&self, letter: char, octave: i32) -> i32 {
        self.placed
            .get(&(letter, octave))
            .copied()
            .unwrap_or_else(|| key_default_alter(self.fifths, letter))
    }

    /// The lift symbol for a note sounding at `alter`, updating state if an
    /// accidental has to be printed.
    fn lift_for(&mut self, letter: char, octave: i32, alter: i32) -> &'static str {
        if alter == self.current(letter, octave) {
            return LIFT_NULL;
        }
        self.placed.insert((letter, octave), alter);
        match alter {
            1 => "lift_#",
            -1 => "lift_b",
            _ => "lift_N",
        }
    }

    fn new_measure(&mut self) {
        self.placed.clear();
    }

    fn new_key(&mut self, fifths: i32) {
        self.fifths = fifths;
        self.placed.clear();
    }
}

/// Rewrite multi-measure rests into the canonical rhythm vocabulary:
/// `multirest-1` is just a whole rest, `rest-wholeN` is a multirest of N
/// measures, and multirest lengths clamp at 50.
fn normalize_multirest(token: &str) -> Option<String> {
    if let Some(count) = token.strip_prefix("multirest-") {
        let count: i32 = count.parse().ok()?;
        return Some(if count <= 1 {
            "rest-whole".to_string()
        } else {
            format!("multirest-{}", count.min(50))
        });
    }
    if let Some(rest) = token.strip_prefix("rest-whole") {
        if !rest.is_empty() {
            let count: i32 = rest.parse().ok()?;
            if count > 1 {
                return Some(format!("multirest-{}", count.min(50)));
            }
        }
    }
    None
}

/// Split a merged semantic encoding (symbols separated by `+` or
/// whitespace) into the four per-field streams.
pub fn split_symbols(merged: &str) -> SymbolStreams {
    let mut streams = SymbolStreams::default();
    let mut state = AccidentalState::default();

    let tokens = merged
        .split(|c: char| c == '+' || c.is_whitespace())
        .filter(|t| !t.is_empty());

    for token in tokens {
        if token == "barline" {
            state.new_measure();
            streams.push_rhythm_only(token.to_string());
        } else if token.starts_with("clef-") {
            state.new_measure();
            streams.push_rhythm_only(token.to_string());
        } else if let Some(name) = token.strip_prefix("keySignature-") {
            if let Some(fifths) = key_signature_fifths(name) {
                state.new_key(fifths);
            } else {
                warn!("unrecognized key signature: {name}");
            }
            streams.push_rhythm_only(token.to_string());
        } else if token.starts_with("timeSignature-") {
            streams.push_rhythm_only(token.to_string());
        } else if let Some(normalized) = normalize_multirest(token) {
            streams.push_rhythm_only(normalized);
        } else if token.starts_with("note") {
            split_note_token(token, &mut state, &mut streams);
        } else {
            // rests and anything else pass through on the rhythm stream
            streams.push_rhythm_only(token.to_string());
        }
    }
    streams
}

fn split_note_token(token: &str, state: &mut AccidentalState, streams: &mut SymbolStreams) {
    // Chord members sorted top note first
    let mut members: Vec<(char, i32, i32, String)> = token
        .split('|')
        .filter(|member| member.starts_with("note"))
        .filter_map(|member| {
            let details = member.split_once('-')?.1;
            let (pitch, duration) = details.split_once('_')?;
            let (letter, octave, alter) = parse_pitch(pitch)?;
            Some((letter, octave, alter, duration.to_string()))
        })
        .collect();
    if members.is_empty() {
        warn!("failed to split note token: {token}");
        return;
    }
    members.sort_by_key(|(letter, octave, _, _)| -pitch_height(*letter, *octave));

    for (i, (letter, octave, alter, duration)) in members.into_iter().enumerate() {
        if i > 0 {
            streams.push(NO_NOTE, NO_NOTE, "|".to_string(), NO_NOTE);
        }
        let lift = state.lift_for(letter, octave, alter);
        streams.push(
            lift,
            &format!("note-{letter}{octave}"),
            format!("note-{duration}"),
            "note",
        );
    }
}

/// Merge the rhythm/pitch/lift streams back into a single semantic
/// encoding.  Accidentals come from the lift stream (the printed form),
/// chord members are re-joined with `|` bottom note first, and symbols are
/// joined with `+`.
pub fn merge_symbols(rhythms: &[String], pitches: &[String], lifts: &[String]) -> String {
    let mut symbols: Vec<String> = Vec::new();
    // (sort height, member text) for the chord being accumulated
    let mut chord: Vec<(i32, String)> = Vec::new();
    let mut joining = false;

    let flush = |chord: &mut Vec<(i32, String)>, symbols: &mut Vec<String>| {
        if chord.is_empty() {
            return;
        }
        chord.sort_by_key(|(height, _)| *height);
        let joined = chord
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("|");
        symbols.push(joined);
        chord.clear();
    };

    for (i, rhythm) in rhythms.iter().enumerate() {
        if rhythm == "|" {
            joining = true;
            continue;
        }
        if let Some(duration) = rhythm.strip_prefix("note-") {
            let Some(pitch) = pitches.get(i).and_then(|p| p.strip_prefix("note-")) else {
                warn!("note rhythm without pitch at position {i}");
                continue;
            };
            let accidental = match lifts.get(i).map(String::as_str) {
                Some("lift_#") => "#",
                Some("lift_b") => "b",
                Some("lift_N") => "N",
                _ => "",
            };
            let member = format!("note-{pitch}{accidental}_{duration}");
            let height = parse_pitch(pitch)
                .map(|(letter, octave, _)| pitch_height(letter, octave))
                .unwrap_or(0);
            if !joining {
                flush(&mut chord, &mut symbols);
            }
            chord.push((height, member));
        } else {
            flush(&mut chord, &mut symbols);
            symbols.push(rhythm.clone());
        }
        joining = false;
    }
    flush(&mut chord, &mut symbols);
    symbols.join("+")
}

/// Rewrite a merged stream from alteration spelling (sounding pitches) to
/// accidental spelling (printed accidentals under the active key
/// signature).  Splitting restores the printed accidentals; merging puts
/// them back onto the pitch tokens.
pub fn convert_alter_to_accidentals(merged: &str) -> String {
    let streams = split_symbols(merged);
    merge_symbols(&streams.rhythms, &streams.pitches, &streams.lifts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_defaults_follow_the_circle() {
        // E major: F, C, G, D sharp
        assert_eq!(key_default_alter(4, 'F'), 1);
        assert_eq!(key_default_alter(4, 'D'), 1);
        assert_eq!(key_default_alter(4, 'E'), 0);
        // F major: B flat
        assert_eq!(key_default_alter(-1, 'B'), -1);
        assert_eq!(key_default_alter(-1, 'E'), 0);
    }

    #[test]
    fn pitch_accepts_accidental_on_either_side_of_the_octave() {
        assert_eq!(parse_pitch("E4#"), Some(('E', 4, 1)));
        assert_eq!(parse_pitch("Eb4"), Some(('E', 4, -1)));
        assert_eq!(parse_pitch("F4N"), Some(('F', 4, 0)));
        assert_eq!(parse_pitch("H4"), None);
    }

    #[test]
    fn multirest_normalization() {
        assert_eq!(normalize_multirest("multirest-1"), Some("rest-whole".into()));
        assert_eq!(normalize_multirest("multirest-3"), Some("multirest-3".into()));
        assert_eq!(normalize_multirest("multirest-100"), Some("multirest-50".into()));
        assert_eq!(normalize_multirest("rest-whole2"), Some("multirest-2".into()));
        assert_eq!(normalize_multirest("rest-whole"), None);
        assert_eq!(normalize_multirest("rest-quarter"), None);
    }
}
