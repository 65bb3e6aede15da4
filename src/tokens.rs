//! Lexer for the sequence model's semantic token vocabulary.
//!
//! The raw prediction is a `+`-joined stream of textual tokens
//! (`clef-G2+keySignature-EM+note-C4_half.+barline+...`), with chord
//! members joined by `|` inside one position.  The lexer turns each part
//! into a closed `Token` value so the parser can match exhaustively
//! instead of dispatching on string prefixes.

use tracing::warn;

use crate::results::DURATION_OF_QUARTER;

/// One lexed token of the semantic stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `clef-G2`, `clef-F4`, ... — payload is the part after the dash.
    Clef { name: String },
    /// `keySignature-EM`, ... — payload is the key name.
    KeySignature { name: String },
    /// `timeSignature-4/4`, ... — payload is the textual time.
    TimeSignature { time: String },
    /// A single `note-...` token.
    Note(NoteToken),
    /// Several pipe-joined `note-...` tokens at one position.
    Chord(Vec<NoteToken>),
    /// `rest-quarter`, `rest-half.`, ...
    Rest { duration_name: String, has_dot: bool },
    /// `multirest-N`; the parser skips these.
    Multirest,
    /// Measure separator.
    Barline,
    /// Anything the vocabulary does not cover.
    Unknown(String),
}

/// Decoded `note-<PITCH><OCTAVE>[<ACCIDENTAL>]_<DURATION_NAME>[.]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteToken {
    pub step: char,
    pub octave: i32,
    /// -1 flat, 1 sharp, 0 explicit natural; None when unmarked.
    pub alter: Option<i32>,
    pub duration_name: String,
    pub has_dot: bool,
}

impl NoteToken {
    /// A quarter note at middle C; substituted for malformed note tokens so
    /// a single bad token never aborts the parse.
    pub fn default_note() -> Self {
        Self {
            step: 'C',
            octave: 4,
            alter: None,
            duration_name: "quarter".to_string(),
            has_dot: false,
        }
    }

    /// Parse the payload of a note token ("C4#_quarter.").  Returns None
    /// for anything structurally off.
    fn parse_details(details: &str) -> Option<Self> {
        let (pitch, duration) = details.split_once('_')?;
        let has_dot = duration.ends_with('.');
        let duration_name = duration.trim_end_matches('.').to_string();

        let mut chars = pitch.chars();
        let step = chars.next()?;
        if !('A'..='G').contains(&step) {
            return None;
        }
        let octave = chars.next()?.to_digit(10)? as i32;
        let alter = chars.next().map(|accidental| match accidental {
            'b' => -1,
            '#' => 1,
            _ => 0,
        });

        Some(Self { step, octave, alter, duration_name, has_dot })
    }
}

/// Duration units for a duration name; the quarter note is the reference.
/// Unrecognized names fall back to a sixteenth of a quarter.
pub fn duration_from_name(name: &str) -> i32 {
    match name {
        "whole" => DURATION_OF_QUARTER * 4,
        "half" => DURATION_OF_QUARTER * 2,
        "quarter" => DURATION_OF_QUARTER,
        "eighth" => DURATION_OF_QUARTER / 2,
        "sixteenth" => DURATION_OF_QUARTER / 4,
        "thirty_second" => DURATION_OF_QUARTER / 8,
        _ => DURATION_OF_QUARTER / 16,
    }
}

/// Circle-of-fifths value for a key signature name, or None if the name is
/// not one of the 15 major keys the vocabulary covers.
pub fn key_signature_fifths(name: &str) -> Option<i32> {
    let fifths = match name {
        "CbM" => -7,
        "GbM" => -6,
        "DbM" => -5,
        "AbM" => -4,
        "EbM" => -3,
        "BbM" => -2,
        "FM" => -1,
        "CM" => 0,
        "GM" => 1,
        "DM" => 2,
        "AM" => 3,
        "EM" => 4,
        "BM" => 5,
        "F#M" => 6,
        "C#M" => 7,
        _ => return None,
    };
    Some(fifths)
}

fn lex_note(part: &str) -> Token {
    let members: Vec<NoteToken> = part
        .split('|')
        .filter(|member| member.starts_with("note"))
        .map(|member| {
            member
                .split_once('-')
                .and_then(|(_, details)| NoteToken::parse_details(details))
                .unwrap_or_else(|| {
                    warn!("failed to parse note token: {member}");
                    NoteToken::default_note()
                })
        })
        .collect();
    match members.len() {
        0 => Token::Unknown(part.to_string()),
        1 => Token::Note(members.into_iter().next().expect("one member")),
        _ => Token::Chord(members),
    }
}

fn lex_part(part: &str) -> Token {
    if part == "barline" {
        return Token::Barline;
    }
    if let Some(name) = part.strip_prefix("clef-") {
        return Token::Clef { name: name.to_string() };
    }
    if let Some(name) = part.strip_prefix("keySignature-") {
        return Token::KeySignature { name: name.to_string() };
    }
    if let Some(time) = part.strip_prefix("timeSignature-") {
        return Token::TimeSignature { time: time.to_string() };
    }
    if part.starts_with("multirest") {
        return Token::Multirest;
    }
    if part.starts_with("note") {
        return lex_note(part);
    }
    if part.starts_with("rest") {
        // A rest may carry pipe-joined noise; only the first member counts
        let rest = part.split('|').next().unwrap_or(part);
        return match rest.split_once('-') {
            Some((_, duration)) => {
                let has_dot = duration.ends_with('.');
                Token::Rest {
                    duration_name: duration.trim_end_matches('.').to_string(),
                    has_dot,
                }
            }
            None => Token::Unknown(part.to_string()),
        };
    }
    Token::Unknown(part.to_string())
}

/// Lex a full `+`-joined semantic stream.
pub fn tokenize(stream: &str) -> Vec<Token> {
    stream
        .split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(lex_part)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_structural_tokens() {
        let tokens = tokenize("clef-G2+keySignature-EM+timeSignature-6/8+barline");
        assert_eq!(
            tokens,
            vec![
                Token::Clef { name: "G2".to_string() },
                Token::KeySignature { name: "EM".to_string() },
                Token::TimeSignature { time: "6/8".to_string() },
                Token::Barline,
            ]
        );
    }

    #[test]
    fn lexes_notes_and_chords() {
        let tokens = tokenize("note-C4#_quarter.+note-E4_eighth|note-G4_eighth");
        match &tokens[0] {
            Token::Note(n) => {
                assert_eq!(n.step, 'C');
                assert_eq!(n.octave, 4);
                assert_eq!(n.alter, Some(1));
                assert_eq!(n.duration_name, "quarter");
                assert!(n.has_dot);
            }
            other => panic!("expected note, got {other:?}"),
        }
        match &tokens[1] {
            Token::Chord(members) => assert_eq!(members.len(), 2),
            other => panic!("expected chord, got {other:?}"),
        }
    }

    #[test]
    fn malformed_note_becomes_default() {
        let tokens = tokenize("note-garbage");
        assert_eq!(tokens, vec![Token::Note(NoteToken::default_note())]);
    }

    #[test]
    fn duration_table_matches_quarter_multiples() {
        assert_eq!(duration_from_name("whole"), DURATION_OF_QUARTER * 4);
        assert_eq!(duration_from_name("half"), DURATION_OF_QUARTER * 2);
        assert_eq!(duration_from_name("quarter"), DURATION_OF_QUARTER);
        assert_eq!(duration_from_name("eighth"), DURATION_OF_QUARTER / 2);
        assert_eq!(duration_from_name("sixteenth"), DURATION_OF_QUARTER / 4);
        assert_eq!(duration_from_name("thirty_second"), DURATION_OF_QUARTER / 8);
        assert_eq!(duration_from_name("breve"), DURATION_OF_QUARTER / 16);
    }

    #[test]
    fn key_signature_table_spans_the_circle() {
        assert_eq!(key_signature_fifths("CbM"), Some(-7));
        assert_eq!(key_signature_fifths("CM"), Some(0));
        assert_eq!(key_signature_fifths("C#M"), Some(7));
        assert_eq!(key_signature_fifths("HM"), None);
    }
}
