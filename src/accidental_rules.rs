//! Resolution of implicit alterations.
//!
//! A parsed staff leaves the alteration of a note unset when the token
//! stream spelled no accidental.  Before the score is rendered, every such
//! note receives its sounding alteration: the one an earlier accidental in
//! the same measure placed on the same step and octave, or failing that the
//! key signature's default for the step.  Accidental state resets at every
//! bar line; a new clef (which carries the key) resets it too.

use std::collections::HashMap;

use crate::results::{ResultStaff, ResultSymbol};
use crate::split_merge::key_default_alter;

#[derive(Default)]
struct MeasureState {
    fifths: i32,
    placed: HashMap<(char, i32), i32>,
}

impl MeasureState {
    fn sounding_alter(&self, step: char, octave: i32) -> i32 {
        self.placed
            .get(&(step, octave))
            .copied()
            .unwrap_or_else(|| key_default_alter(self.fifths, step))
    }
}

fn resolve_note(note: &mut crate::results::ResultNote, state: &mut MeasureState) {
    let key = (note.pitch.step, note.pitch.octave);
    match note.pitch.alter {
        Some(alter) => {
            state.placed.insert(key, alter);
        }
        None => {
            note.pitch.alter = Some(state.sounding_alter(key.0, key.1));
        }
    }
}

/// Fill in the sounding alteration of every note whose token carried no
/// explicit accidental.
pub fn maintain_accidentals(staffs: &mut [ResultStaff]) {
    for staff in staffs {
        let mut state = MeasureState::default();
        for measure in &mut staff.measures {
            state.placed.clear();
            for symbol in &mut measure.symbols {
                match symbol {
                    ResultSymbol::Clef(clef) => {
                        state.fifths = clef.circle_of_fifth;
                        state.placed.clear();
                    }
                    ResultSymbol::Note(note) => resolve_note(note, &mut state),
                    ResultSymbol::NoteGroup(group) => {
                        for note in &mut group.notes {
                            resolve_note(note, &mut state);
                        }
                    }
                    ResultSymbol::TimeSignature(_) | ResultSymbol::Rest(_) => {}
                }
            }
        }
    }
}
