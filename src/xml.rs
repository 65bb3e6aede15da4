//! MusicXML output.
//!
//! Renders the decoded staves as a partwise MusicXML document, one part
//! per staff.  Divisions are fixed at the internal quarter-note duration,
//! so every symbol duration maps to MusicXML unchanged.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::results::{
    ResultClef, ResultDuration, ResultNote, ResultStaff, ResultSymbol, ResultTimeSignature,
    DURATION_OF_QUARTER,
};

const XML_HEADER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<!DOCTYPE score-partwise PUBLIC \"-//Recordare//DTD MusicXML 4.0 Partwise//EN\" ",
    "\"http://www.musicxml.org/dtds/partwise.dtd\">\n",
);

fn duration_type_name(base: i32) -> &'static str {
    match base {
        64 => "whole",
        32 => "half",
        16 => "quarter",
        8 => "eighth",
        4 => "16th",
        2 => "32nd",
        _ => "quarter",
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

struct XmlWriter {
    out: String,
    depth: usize,
}

impl XmlWriter {
    fn new() -> Self {
        Self { out: String::from(XML_HEADER), depth: 0 }
    }

    fn open(&mut self, tag: &str) {
        let _ = writeln!(self.out, "{}<{}>", "  ".repeat(self.depth), tag);
        self.depth += 1;
    }

    fn open_with(&mut self, tag: &str, attrs: &str) {
        let _ = writeln!(self.out, "{}<{} {}>", "  ".repeat(self.depth), tag, attrs);
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        let _ = writeln!(self.out, "{}</{}>", "  ".repeat(self.depth), tag);
    }

    fn leaf(&mut self, tag: &str, text: &str) {
        let _ = writeln!(
            self.out,
            "{}<{}>{}</{}>",
            "  ".repeat(self.depth),
            tag,
            escape(text),
            tag
        );
    }

    fn empty(&mut self, tag: &str) {
        let _ = writeln!(self.out, "{}<{}/>", "  ".repeat(self.depth), tag);
    }
}

fn write_attributes(
    xml: &mut XmlWriter,
    clef: Option<&ResultClef>,
    time: Option<&ResultTimeSignature>,
) {
    xml.open("attributes");
    xml.leaf("divisions", &DURATION_OF_QUARTER.to_string());
    if let Some(clef) = clef {
        xml.open("key");
        xml.leaf("fifths", &clef.circle_of_fifth.to_string());
        xml.close("key");
    }
    if let Some(time) = time {
        if let Some((beats, beat_type)) = time.time.split_once('/') {
            xml.open("time");
            xml.leaf("beats", beats);
            xml.leaf("beat-type", beat_type);
            xml.close("time");
        }
    }
    if let Some(clef) = clef {
        xml.open("clef");
        xml.leaf("sign", clef.clef_type.sign());
        xml.leaf("line", &clef.clef_type.line().to_string());
        xml.close("clef");
    }
    xml.close("attributes");
}

fn write_duration_details(xml: &mut XmlWriter, duration: &ResultDuration) {
    xml.leaf("duration", &duration.duration.to_string());
    xml.leaf("type", duration_type_name(duration.base()));
    if duration.has_dot {
        xml.empty("dot");
    }
}

fn write_note(xml: &mut XmlWriter, note: &ResultNote, in_chord: bool) {
    xml.open("note");
    if in_chord {
        xml.empty("chord");
    }
    xml.open("pitch");
    xml.leaf("step", &note.pitch.step.to_string());
    if let Some(alter) = note.pitch.alter {
        if alter != 0 {
            xml.leaf("alter", &alter.to_string());
        }
    }
    xml.leaf("octave", &note.pitch.octave.to_string());
    xml.close("pitch");
    write_duration_details(xml, &note.duration);
    xml.close("note");
}

fn write_measure(xml: &mut XmlWriter, staff: &ResultStaff, measure_idx: usize) {
    let measure = &staff.measures[measure_idx];
    xml.open_with("measure", &format!("number=\"{}\"", measure_idx + 1));

    let clef = measure.symbols.iter().find_map(|s| match s {
        ResultSymbol::Clef(c) => Some(c),
        _ => None,
    });
    let time = measure.symbols.iter().find_map(|s| match s {
        ResultSymbol::TimeSignature(t) => Some(t),
        _ => None,
    });
    if clef.is_some() || time.is_some() {
        write_attributes(xml, clef, time);
    }

    for symbol in &measure.symbols {
        match symbol {
            ResultSymbol::Clef(_) | ResultSymbol::TimeSignature(_) => {}
            ResultSymbol::Note(note) => write_note(xml, note, false),
            ResultSymbol::NoteGroup(group) => {
                for (i, note) in group.notes.iter().enumerate() {
                    write_note(xml, note, i > 0);
                }
            }
            ResultSymbol::Rest(rest) => {
                xml.open("note");
                xml.empty("rest");
                write_duration_details(xml, &rest.duration);
                xml.close("note");
            }
        }
    }
    xml.close("measure");
}

/// Render the decoded staves as a partwise MusicXML document string.
pub fn generate_musicxml(staffs: &[ResultStaff], title: &str) -> String {
    let mut xml = XmlWriter::new();
    xml.open_with("score-partwise", "version=\"4.0\"");

    xml.open("work");
    xml.leaf("work-title", title);
    xml.close("work");

    xml.open("part-list");
    for (i, _) in staffs.iter().enumerate() {
        xml.open_with("score-part", &format!("id=\"P{}\"", i + 1));
        xml.leaf("part-name", &format!("Staff {}", i + 1));
        xml.close("score-part");
    }
    xml.close("part-list");

    for (i, staff) in staffs.iter().enumerate() {
        xml.open_with("part", &format!("id=\"P{}\"", i + 1));
        for measure_idx in 0..staff.measures.len() {
            write_measure(&mut xml, staff, measure_idx);
        }
        xml.close("part");
    }

    xml.close("score-partwise");
    xml.out
}

/// Write the rendered document to disk.
pub fn write_musicxml(path: &Path, staffs: &[ResultStaff], title: &str) -> Result<()> {
    let document = generate_musicxml(staffs, title);
    fs::write(path, document)?;
    info!(path = %path.display(), "wrote MusicXML");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{ClefType, ResultMeasure, ResultPitch};

    fn sample_staff() -> ResultStaff {
        ResultStaff::new(vec![ResultMeasure {
            symbols: vec![
                ResultSymbol::Clef(ResultClef::new(ClefType::Treble, 2)),
                ResultSymbol::TimeSignature(ResultTimeSignature { time: "3/4".into() }),
                ResultSymbol::Note(ResultNote::new(
                    ResultPitch::new('F', 4, Some(1)),
                    ResultDuration::new(DURATION_OF_QUARTER, true),
                )),
            ],
        }])
    }

    #[test]
    fn renders_attributes_and_a_dotted_note() {
        let xml = generate_musicxml(&[sample_staff()], "Test Score");
        assert!(xml.contains("<work-title>Test Score</work-title>"));
        assert!(xml.contains("<fifths>2</fifths>"));
        assert!(xml.contains("<beats>3</beats>"));
        assert!(xml.contains("<sign>G</sign>"));
        assert!(xml.contains("<alter>1</alter>"));
        assert!(xml.contains("<duration>24</duration>"));
        assert!(xml.contains("<type>quarter</type>"));
        assert!(xml.contains("<dot/>"));
    }

    #[test]
    fn chord_members_after_the_first_carry_the_chord_tag() {
        use crate::results::ResultNoteGroup;
        let group = ResultNoteGroup {
            notes: vec![
                ResultNote::new(ResultPitch::new('C', 4, Some(0)), ResultDuration::new(16, false)),
                ResultNote::new(ResultPitch::new('E', 4, Some(0)), ResultDuration::new(16, false)),
            ],
        };
        let staff = ResultStaff::new(vec![ResultMeasure {
            symbols: vec![ResultSymbol::NoteGroup(group)],
        }]);
        let xml = generate_musicxml(&[staff], "Chords");
        assert_eq!(xml.matches("<chord/>").count(), 1);
    }

    #[test]
    fn type_names_cover_the_duration_table() {
        assert_eq!(duration_type_name(64), "whole");
        assert_eq!(duration_type_name(2), "32nd");
        assert_eq!(duration_type_name(7), "quarter");
    }
}
