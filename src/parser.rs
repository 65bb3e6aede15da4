//! Sequence-output parser — converts the sequence model's semantic token
//! stream for one staff into structured measures.
//!
//! The state machine accumulates symbols into the current measure and
//! flushes it on every `barline` token; trailing content after the last
//! bar line becomes a final measure.  A `keySignature-*` token does not
//! become a symbol of its own: it mutates the key-signature field of the
//! clef that was just emitted.  Parsing never aborts on a single bad
//! token; malformed notes are substituted with a default quarter at
//! middle C and unrecognized key names are skipped, both with a logged
//! warning.

use tracing::{debug, warn};

use crate::results::{
    ClefType, ResultClef, ResultDuration, ResultMeasure, ResultNote, ResultNoteGroup, ResultPitch,
    ResultRest, ResultStaff, ResultSymbol, ResultTimeSignature,
};
use crate::tokens::{duration_from_name, key_signature_fifths, tokenize, NoteToken, Token};

/// Counts collected while parsing; the candidate rating consumes these.
/// Returned next to the parse result instead of living as parser state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub clefs: usize,
    pub key_signatures: usize,
    pub time_signatures: usize,
    /// Accidentals carried by individual notes (not key signatures).
    pub explicit_accidentals: usize,
    /// Sum of |circle-of-fifths| over all recognized key signatures.
    pub key_signature_fifths: i32,
}

impl ParserStats {
    /// Total accidentals including those implied by key signatures.
    pub fn total_accidentals(&self) -> i32 {
        self.explicit_accidentals as i32 + self.key_signature_fifths
    }
}

fn note_from_token(token: &NoteToken, stats: &mut ParserStats) -> ResultNote {
    if token.alter.is_some() {
        stats.explicit_accidentals += 1;
    }
    ResultNote::new(
        ResultPitch::new(token.step, token.octave, token.alter),
        ResultDuration::new(duration_from_name(&token.duration_name), token.has_dot),
    )
}

/// Parse one staff's semantic stream into measures plus parse statistics.
pub fn parse_token_stream(stream: &str) -> (ResultStaff, ParserStats) {
    let mut stats = ParserStats::default();
    let mut measures: Vec<ResultMeasure> = Vec::new();
    let mut current = ResultMeasure::default();

    for token in tokenize(stream) {
        match token {
            Token::Barline => {
                measures.push(std::mem::take(&mut current));
            }
            Token::Clef { name } => {
                let clef_type = if name.starts_with('G') {
                    ClefType::Treble
                } else {
                    ClefType::Bass
                };
                stats.clefs += 1;
                current
                    .symbols
                    .push(ResultSymbol::Clef(ResultClef::new(clef_type, 0)));
            }
            Token::KeySignature { name } => {
                // Only meaningful right after a clef; the signature is
                // stored on that clef rather than as its own symbol.
                if let Some(ResultSymbol::Clef(clef)) = current.symbols.last_mut() {
                    match key_signature_fifths(&name) {
                        Some(fifths) => {
                            clef.circle_of_fifth = fifths;
                            stats.key_signatures += 1;
                            stats.key_signature_fifths += fifths.abs();
                        }
                        None => warn!("unrecognized key signature: {name}"),
                    }
                }
            }
            Token::TimeSignature { time } => {
                stats.time_signatures += 1;
                current
                    .symbols
                    .push(ResultSymbol::TimeSignature(ResultTimeSignature { time }));
            }
            Token::Note(note) => {
                let note = note_from_token(&note, &mut stats);
                current.symbols.push(ResultSymbol::Note(note));
            }
            Token::Chord(members) => {
                let notes = members
                    .iter()
                    .map(|member| note_from_token(member, &mut stats))
                    .collect();
                current
                    .symbols
                    .push(ResultSymbol::NoteGroup(ResultNoteGroup { notes }));
            }
            Token::Rest { duration_name, has_dot } => {
                current.symbols.push(ResultSymbol::Rest(ResultRest {
                    duration: ResultDuration::new(duration_from_name(&duration_name), has_dot),
                }));
            }
            Token::Multirest => {
                debug!("skipping over multirest");
            }
            Token::Unknown(part) => {
                debug!("ignoring unknown token: {part}");
            }
        }
    }

    if !current.symbols.is_empty() {
        measures.push(current);
    }
    (ResultStaff::new(measures), stats)
}
