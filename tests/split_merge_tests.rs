//! Integration tests for the symbol stream split/merge round trip:
//! deriving the four per-field streams from a merged encoding and
//! reassembling them, including accidental restoration from the key.

use pretty_assertions::assert_eq;

use scanscore::split_merge::{convert_alter_to_accidentals, merge_symbols, split_symbols};

const MERGED: &str = "clef-G2+keySignature-EM+timeSignature-6/8+note-C4_half.+barline\
+note-F4_half.+barline+note-G4_half.+barline+note-B4_half.+barline\
+note-B4_half+note-C5_eighth+note-D5_eighth+barline\
+note-E4#_eighth|note-G4_eighth|note-C5_eighth";

fn strs(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn expected_lifts() -> Vec<String> {
    strs(&[
        "nonote", "nonote", "nonote", "lift_N", "nonote", "lift_N", "nonote", "lift_N",
        "nonote", "lift_null", "nonote", "lift_null", "lift_N", "lift_N", "nonote", "lift_N",
        "nonote", "lift_N", "nonote", "lift_#",
    ])
}

fn expected_pitches() -> Vec<String> {
    strs(&[
        "nonote", "nonote", "nonote", "note-C4", "nonote", "note-F4", "nonote", "note-G4",
        "nonote", "note-B4", "nonote", "note-B4", "note-C5", "note-D5", "nonote", "note-C5",
        "nonote", "note-G4", "nonote", "note-E4",
    ])
}

fn expected_rhythms() -> Vec<String> {
    strs(&[
        "clef-G2", "keySignature-EM", "timeSignature-6/8", "note-half.", "barline",
        "note-half.", "barline", "note-half.", "barline", "note-half.", "barline",
        "note-half", "note-eighth", "note-eighth", "barline", "note-eighth", "|",
        "note-eighth", "|", "note-eighth",
    ])
}

fn expected_notes() -> Vec<String> {
    strs(&[
        "nonote", "nonote", "nonote", "note", "nonote", "note", "nonote", "note",
        "nonote", "note", "nonote", "note", "note", "note", "nonote", "note",
        "nonote", "note", "nonote", "note",
    ])
}

// ═══════════════════════════════════════════════════════════════════════
// Split
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn split_derives_all_four_streams() {
    // Tab-separated input is equivalent to +-separated
    let streams = split_symbols(&MERGED.replace('+', "\t"));
    assert_eq!(streams.rhythms, expected_rhythms());
    assert_eq!(streams.lifts, expected_lifts());
    assert_eq!(streams.pitches, expected_pitches());
    assert_eq!(streams.notes, expected_notes());
}

#[test]
fn split_sorts_chord_members_top_note_first() {
    let streams = split_symbols(
        "note-E4#_eighth|note-G4_eighth|note-C5_eighth\t\
         note-C5_eighth|note-E4#_eighth|note-G4_eighth",
    );
    assert_eq!(
        streams.pitches,
        strs(&[
            "note-C5", "nonote", "note-G4", "nonote", "note-E4",
            "note-C5", "nonote", "note-G4", "nonote", "note-E4",
        ])
    );
}

#[test]
fn split_restores_accidentals_from_the_key_signature() {
    // F major: Eb and F# are foreign to the key and need printed accidentals
    let merged = "clef-G2 keySignature-FM timeSignature-4/4 \
        rest-sixteenth note-A3_sixteenth note-C4_sixteenth note-F4_sixteenth \
        note-A4_sixteenth note-C4_sixteenth note-F4_sixteenth rest-sixteenth \
        note-A3_sixteenth note-A3_sixteenth note-C4_sixteenth note-F4_sixteenth \
        note-A4_sixteenth note-C4_sixteenth note-F4_sixteenth rest-sixteenth \
        note-A3_sixteenth rest-sixteenth note-A3_quarter.. note-A3_quarter.. barline \
        rest-sixteenth note-C4_sixteenth note-Eb4_sixteenth note-F4_sixteenth \
        note-C5_sixteenth note-Eb4_sixteenth note-F4_sixteenth rest-sixteenth \
        note-C4_sixteenth note-C4_sixteenth note-D4_sixteenth note-F#4_sixteenth \
        note-C5_sixteenth note-D4_sixteenth note-F#4_sixteenth rest-sixteenth \
        note-C4_sixteenth rest-sixteenth note-C4_quarter.. note-C4_quarter.. barline \
        rest-sixteenth note-C4_sixteenth note-D4_sixteenth note-A4_sixteenth \
        note-C5_sixteenth note-D4_sixteenth note-A4_sixteenth rest-sixteenth \
        note-C4_sixteenth note-Bb3_sixteenth note-D4_sixteenth note-G4_sixteenth \
        note-Bb4_sixteenth note-D4_sixteenth note-G4_sixteenth rest-sixteenth \
        note-Bb3_sixteenth rest-sixteenth note-C4_quarter.. note-Bb3_quarter..";
    let streams = split_symbols(merged);
    let printed: Vec<String> = streams
        .lifts
        .iter()
        .enumerate()
        .filter(|(_, lift)| *lift != "nonote" && *lift != "lift_null")
        .map(|(i, lift)| format!("{}{}", streams.pitches[i], lift))
        .collect();
    assert_eq!(printed, strs(&["note-E4lift_b", "note-F4lift_#"]));
}

#[test]
fn split_restores_natural_signs() {
    // G major sharpens F; a plain F4 needs a printed natural
    let streams =
        split_symbols("clef-G2 keySignature-GM timeSignature-4/4 note-C4_sixteenth note-F4_sixteenth note-F4_sixteenth");
    let printed: Vec<String> = streams
        .lifts
        .iter()
        .enumerate()
        .filter(|(_, lift)| *lift != "nonote")
        .map(|(i, lift)| format!("{}{}", streams.pitches[i], lift))
        .collect();
    assert_eq!(
        printed,
        strs(&["note-C4lift_null", "note-F4lift_N", "note-F4lift_null"])
    );
}

#[test]
fn split_normalizes_multirests() {
    let streams =
        split_symbols("multirest-1 multirest-2 multirest-3 multirest-50 multirest-100 rest-whole2");
    assert_eq!(
        streams.rhythms,
        strs(&[
            "rest-whole", "multirest-2", "multirest-3", "multirest-50", "multirest-50",
            "multirest-2",
        ])
    );
}

#[test]
fn accidentals_track_octaves_independently() {
    let streams = split_symbols("clef-G2 keySignature-CM note-F#4_quarter note-F#3_quarter");
    let printed: Vec<String> = streams
        .lifts
        .iter()
        .enumerate()
        .filter(|(_, lift)| *lift != "nonote")
        .map(|(i, lift)| format!("{}{}", streams.pitches[i], lift))
        .collect();
    assert_eq!(printed, strs(&["note-F4lift_#", "note-F3lift_#"]));
}

// ═══════════════════════════════════════════════════════════════════════
// Merge
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn merge_matches_the_accidental_spelling_of_the_input() {
    let actual = merge_symbols(&expected_rhythms(), &expected_pitches(), &expected_lifts());
    let expected = convert_alter_to_accidentals(MERGED);
    assert_eq!(actual, expected);
}

#[test]
fn merge_rejoins_chords_bottom_note_first() {
    let rhythms = strs(&["note-eighth", "|", "note-eighth", "|", "note-eighth"]);
    let pitches = strs(&["note-C5", "nonote", "note-G4", "nonote", "note-E4"]);
    let lifts = strs(&["lift_null", "nonote", "lift_null", "nonote", "lift_#"]);
    assert_eq!(
        merge_symbols(&rhythms, &pitches, &lifts),
        "note-E4#_eighth|note-G4_eighth|note-C5_eighth"
    );
}
