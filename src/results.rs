//! Data model for the decoded musical content of one staff.
//!
//! These structures are what the sequence-output parser produces: clefs,
//! key/time signatures, notes, chords and rests arranged into measures.
//! They are created fresh per parse attempt; only the best-scoring
//! candidate survives and is handed to the MusicXML generator.

use serde::{Deserialize, Serialize};

/// Duration of a quarter note in internal duration units.  All other
/// durations are fixed multiples of this.
pub const DURATION_OF_QUARTER: i32 = 16;

/// The two clef shapes the sequence model distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClefType {
    Treble,
    Bass,
}

impl ClefType {
    /// MusicXML clef sign.
    pub fn sign(&self) -> &'static str {
        match self {
            ClefType::Treble => "G",
            ClefType::Bass => "F",
        }
    }

    /// Staff line the clef sits on.
    pub fn line(&self) -> i32 {
        match self {
            ClefType::Treble => 2,
            ClefType::Bass => 4,
        }
    }
}

/// A clef, optionally carrying the key signature that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultClef {
    pub clef_type: ClefType,
    /// Key signature as a circle-of-fifths value: sharps positive,
    /// flats negative, 0 for C major.
    pub circle_of_fifth: i32,
}

impl ResultClef {
    pub fn new(clef_type: ClefType, circle_of_fifth: i32) -> Self {
        Self { clef_type, circle_of_fifth }
    }
}

/// Time signature, kept in its textual "beats/beat-type" form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTimeSignature {
    /// e.g. "4/4", "6/8"
    pub time: String,
}

/// Pitch of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPitch {
    /// Note letter A–G
    pub step: char,
    /// Octave number (middle C = C4)
    pub octave: i32,
    /// -1 flat, 0 natural, 1 sharp; None when the token did not specify one
    pub alter: Option<i32>,
}

impl ResultPitch {
    pub fn new(step: char, octave: i32, alter: Option<i32>) -> Self {
        Self { step, octave, alter }
    }

    /// Letter+octave name, e.g. "C4".  Accidentals are deliberately left
    /// out; this is the form the candidate rating compares against the
    /// geometric detections.
    pub fn name(&self) -> String {
        format!("{}{}", self.step, self.octave)
    }
}

/// Duration in internal units, with the dot already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDuration {
    pub duration: i32,
    pub has_dot: bool,
}

impl ResultDuration {
    /// `base` is the undotted duration; a dot multiplies by 3/2.
    pub fn new(base: i32, has_dot: bool) -> Self {
        let duration = if has_dot { base * 3 / 2 } else { base };
        Self { duration, has_dot }
    }

    /// The undotted base duration.
    pub fn base(&self) -> i32 {
        if self.has_dot {
            self.duration * 2 / 3
        } else {
            self.duration
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultNote {
    pub pitch: ResultPitch,
    pub duration: ResultDuration,
}

impl ResultNote {
    pub fn new(pitch: ResultPitch, duration: ResultDuration) -> Self {
        Self { pitch, duration }
    }
}

/// A chord: several noteheads sharing one temporal position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultNoteGroup {
    pub notes: Vec<ResultNote>,
}

impl ResultNoteGroup {
    /// A chord sounds as long as its longest member.
    pub fn duration(&self) -> i32 {
        self.notes.iter().map(|n| n.duration.duration).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRest {
    pub duration: ResultDuration,
}

/// One symbol in reading order within a measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultSymbol {
    Clef(ResultClef),
    TimeSignature(ResultTimeSignature),
    Note(ResultNote),
    NoteGroup(ResultNoteGroup),
    Rest(ResultRest),
}

impl ResultSymbol {
    /// Temporal length of the symbol in duration units; structural symbols
    /// (clefs, signatures) take no time.
    pub fn duration(&self) -> i32 {
        match self {
            ResultSymbol::Clef(_) | ResultSymbol::TimeSignature(_) => 0,
            ResultSymbol::Note(n) => n.duration.duration,
            ResultSymbol::NoteGroup(g) => g.duration(),
            ResultSymbol::Rest(r) => r.duration.duration,
        }
    }
}

/// One measure: symbols in left-to-right reading order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultMeasure {
    pub symbols: Vec<ResultSymbol>,
}

impl ResultMeasure {
    /// Total duration expressed in quarter notes.  Not enforced against the
    /// time signature; the candidate rating uses its spread as a quality
    /// signal.
    pub fn length_in_quarters(&self) -> f32 {
        let total: i32 = self.symbols.iter().map(|s| s.duration()).sum();
        total as f32 / DURATION_OF_QUARTER as f32
    }
}

/// The fully decoded content of one staff.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultStaff {
    pub measures: Vec<ResultMeasure>,
}

impl ResultStaff {
    pub fn new(measures: Vec<ResultMeasure>) -> Self {
        Self { measures }
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }
}
