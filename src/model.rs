//! Geometric model of the detected page content.
//!
//! The segmentation collaborator delivers one mask per symbol class
//! (`InputMasks`); the grouping stages aggregate the regions extracted from
//! those masks into `NoteheadWithStem`, `Staff` and `MultiStaff` values.
//! Regions are immutable once extracted; the aggregates reference copies of
//! them and never write back.

use image::GrayImage;

use crate::geometry::{BoundingEllipse, RotatedBox};
use crate::results::ClefType;

/// The per-class masks produced by the segmentation collaborator, plus the
/// (resized) source image they were computed from.  All rasters share the
/// same dimensions.
pub struct InputMasks {
    pub original: GrayImage,
    pub notehead: GrayImage,
    pub symbols: GrayImage,
    pub staff: GrayImage,
    pub clefs_keys: GrayImage,
    pub stems_rests: GrayImage,
}

/// A notehead paired with at most one stem.  Rests and whole notes have
/// none; chord members may share a stem, in which case only the closest
/// member owns it.
#[derive(Debug, Clone)]
pub struct NoteheadWithStem {
    pub notehead: BoundingEllipse,
    pub stem: Option<RotatedBox>,
}

/// A notehead placed on a staff.  `position` counts half line spacings
/// above the middle staff line (negative below), which is all that is
/// needed to name its pitch once the clef is known.
#[derive(Debug, Clone)]
pub struct Note {
    pub notehead: BoundingEllipse,
    pub position: i32,
}

const LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];

/// Diatonic index of the middle staff line: B4 for treble, D3 for bass
/// (octave * 7 + letter index with C = 0).
fn middle_line_diatonic(clef: ClefType) -> i32 {
    match clef {
        ClefType::Treble => 4 * 7 + 6,
        ClefType::Bass => 3 * 7 + 1,
    }
}

impl Note {
    /// Pitch name ("C4") implied by staff position under the given clef.
    /// Position is a proxy derived from geometry alone; the sequence model
    /// output is matched against it during candidate rating.
    pub fn pitch_name(&self, clef: ClefType) -> String {
        let diatonic = (middle_line_diatonic(clef) + self.position).clamp(0, 8 * 7 - 1);
        let letter = LETTERS[(diatonic % 7) as usize];
        format!("{}{}", letter, diatonic / 7)
    }
}

/// Noteheads at the same temporal position on one staff; a chord when the
/// group has more than one member.
#[derive(Debug, Clone, Default)]
pub struct NoteGroup {
    pub notes: Vec<Note>,
}

/// A detected staff: five (or fewer, for percussion) roughly parallel,
/// roughly equidistant line boxes sorted top to bottom.
#[derive(Debug, Clone)]
pub struct Staff {
    /// Staff lines top to bottom, each spanning the full staff width.
    pub lines: Vec<RotatedBox>,
    /// Median spacing between adjacent lines; the geometric scale unit.
    pub average_unit_size: f32,
    /// Content attached by the downstream resolvers.
    pub notes: Vec<NoteGroup>,
    pub rests: Vec<RotatedBox>,
    pub accidentals: Vec<RotatedBox>,
    pub bar_lines: Vec<RotatedBox>,
}

impl Staff {
    pub fn new(lines: Vec<RotatedBox>, average_unit_size: f32) -> Self {
        Self {
            lines,
            average_unit_size,
            notes: Vec::new(),
            rests: Vec::new(),
            accidentals: Vec::new(),
            bar_lines: Vec::new(),
        }
    }

    pub fn min_x(&self) -> f32 {
        self.lines.iter().map(|l| l.min_x()).fold(f32::INFINITY, f32::min)
    }

    pub fn max_x(&self) -> f32 {
        self.lines.iter().map(|l| l.max_x()).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min_y(&self) -> f32 {
        self.lines.iter().map(|l| l.min_y()).fold(f32::INFINITY, f32::min)
    }

    pub fn max_y(&self) -> f32 {
        self.lines.iter().map(|l| l.max_y()).fold(f32::NEG_INFINITY, f32::max)
    }

    fn middle_line(&self) -> &RotatedBox {
        &self.lines[self.lines.len() / 2]
    }

    /// Does a point fall inside the staff's x-range and within `margin`
    /// line spacings of its y-range?  The standard attachment test.
    pub fn contains(&self, point: (f32, f32), margin: f32) -> bool {
        let m = margin * self.average_unit_size;
        point.0 >= self.min_x() - m
            && point.0 <= self.max_x() + m
            && point.1 >= self.min_y() - m
            && point.1 <= self.max_y() + m
    }

    /// Staff position of a point: half line spacings above the middle line
    /// at the point's x, rounded to the nearest step.  Follows the staff
    /// skew via the middle line's rotation.
    pub fn position_of(&self, point: (f32, f32)) -> i32 {
        let middle_y = self.middle_line().center_y_at(point.0);
        let half_unit = self.average_unit_size / 2.0;
        ((middle_y - point.1) / half_unit).round() as i32
    }

    /// Pitch names of all attached notes, chord groups flattened, in
    /// reading order.  This is the "expected notes" side of the candidate
    /// rating.
    pub fn expected_note_names(&self, clef: ClefType) -> Vec<String> {
        self.notes
            .iter()
            .flat_map(|group| group.notes.iter().map(|n| n.pitch_name(clef)))
            .collect()
    }
}

/// Staves joined by a brace, bracket or grand-staff connector into one
/// system of simultaneous voices.  Unconnected staves form singleton
/// groups.
#[derive(Debug)]
pub struct MultiStaff {
    pub staffs: Vec<Staff>,
}

impl MultiStaff {
    /// Number of simultaneous voices in this system.
    pub fn voice_count(&self) -> usize {
        self.staffs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff_with_unit(unit: f32) -> Staff {
        let lines = (0..5)
            .map(|i| RotatedBox::new((100.0, 50.0 + i as f32 * unit), (200.0, 1.0), 0.0))
            .collect();
        Staff::new(lines, unit)
    }

    #[test]
    fn position_counts_half_spacings_above_middle_line() {
        let staff = staff_with_unit(10.0);
        // Middle line is at y = 70
        assert_eq!(staff.position_of((100.0, 70.0)), 0);
        assert_eq!(staff.position_of((100.0, 65.0)), 1);
        assert_eq!(staff.position_of((100.0, 80.0)), -2);
    }

    #[test]
    fn pitch_names_follow_clef() {
        let treble = Note {
            notehead: BoundingEllipse::new((0.0, 0.0), (8.0, 6.0), 0.0),
            position: 0,
        };
        assert_eq!(treble.pitch_name(ClefType::Treble), "B4");
        assert_eq!(treble.pitch_name(ClefType::Bass), "D3");
        let third_space = Note { position: 2, ..treble.clone() };
        assert_eq!(third_space.pitch_name(ClefType::Treble), "D5");
    }
}
