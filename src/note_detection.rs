//! Notehead–stem combination and placing of notes on staves.

use tracing::debug;

use crate::geometry::{BoundingEllipse, RotatedBox};
use crate::model::{Note, NoteGroup, NoteheadWithStem, Staff};

/// How far beyond the notehead a stem may sit and still be claimed,
/// expressed as a fraction of the notehead size.
const STEM_SEARCH_MARGIN: f32 = 0.5;

/// Horizontal distance (in line spacings) under which two noteheads on one
/// staff are read as the same temporal position, i.e. a chord.
const CHORD_GROUP_DISTANCE: f32 = 1.3;

fn stem_search_area(notehead: &BoundingEllipse) -> RotatedBox {
    RotatedBox::new(
        notehead.center,
        (
            notehead.size.0 * (1.0 + STEM_SEARCH_MARGIN),
            notehead.size.1 * (1.0 + STEM_SEARCH_MARGIN),
        ),
        notehead.angle_deg,
    )
}

/// Pair each notehead with its closest overlapping stem candidate.
///
/// When several noteheads compete for one stem (a chord), the
/// geometrically closest notehead keeps it and the others stay stem-less;
/// chord membership is resolved later by position proximity, not stem
/// ownership.  Stem-shaped regions never claimed by any notehead are
/// returned as bar-line-or-rest candidates.
pub fn combine_noteheads_with_stems(
    noteheads: &[BoundingEllipse],
    stems: &[RotatedBox],
) -> (Vec<NoteheadWithStem>, Vec<RotatedBox>) {
    // Closest candidate stem per notehead
    let mut choices: Vec<Option<usize>> = noteheads
        .iter()
        .map(|head| {
            let search = stem_search_area(head);
            stems
                .iter()
                .enumerate()
                .filter(|(_, stem)| stem.overlaps(&search))
                .min_by(|(_, a), (_, b)| {
                    a.center_distance(&search)
                        .total_cmp(&b.center_distance(&search))
                })
                .map(|(i, _)| i)
        })
        .collect();

    // A stem claimed by several noteheads goes to the closest one
    for stem_idx in 0..stems.len() {
        let mut closest: Option<(usize, f32)> = None;
        for (head_idx, choice) in choices.iter().enumerate() {
            if *choice == Some(stem_idx) {
                let d = stems[stem_idx].center_distance(&noteheads[head_idx].to_box());
                if closest.map_or(true, |(_, best)| d < best) {
                    closest = Some((head_idx, d));
                }
            }
        }
        if let Some((winner, _)) = closest {
            for (head_idx, choice) in choices.iter_mut().enumerate() {
                if *choice == Some(stem_idx) && head_idx != winner {
                    *choice = None;
                }
            }
        }
    }

    let combined: Vec<NoteheadWithStem> = noteheads
        .iter()
        .zip(&choices)
        .map(|(head, choice)| NoteheadWithStem {
            notehead: *head,
            stem: choice.map(|i| stems[i]),
        })
        .collect();

    let unclaimed: Vec<RotatedBox> = stems
        .iter()
        .enumerate()
        .filter(|(i, _)| !choices.contains(&Some(*i)))
        .map(|(_, stem)| *stem)
        .collect();

    (combined, unclaimed)
}

/// Mean notehead height; the scale reference for bar-line classification.
pub fn average_notehead_height(noteheads: &[NoteheadWithStem]) -> f32 {
    if noteheads.is_empty() {
        return 0.0;
    }
    noteheads.iter().map(|n| n.notehead.size.1).sum::<f32>() / noteheads.len() as f32
}

/// Attach each notehead to the vertically closest staff and derive its
/// staff position; noteheads near no staff are dropped.  Attached notes
/// are grouped into chords by x proximity.  Returns the number of placed
/// notes.
pub fn add_notes_to_staffs(staffs: &mut [Staff], noteheads: &[NoteheadWithStem]) -> usize {
    let mut per_staff: Vec<Vec<Note>> = vec![Vec::new(); staffs.len()];

    for notehead in noteheads {
        let center = notehead.notehead.center;
        let best = staffs
            .iter()
            .enumerate()
            .filter(|(_, staff)| staff.contains(center, 2.0))
            .min_by(|&(_, a), &(_, b)| {
                vertical_distance(a, center.1).total_cmp(&vertical_distance(b, center.1))
            });
        match best {
            Some((idx, staff)) => {
                per_staff[idx].push(Note {
                    notehead: notehead.notehead,
                    position: staff.position_of(center),
                });
            }
            None => debug!("notehead at {center:?} matches no staff"),
        }
    }

    let mut placed = 0;
    for (staff, mut notes) in staffs.iter_mut().zip(per_staff) {
        notes.sort_by(|a, b| a.notehead.center.0.total_cmp(&b.notehead.center.0));
        placed += notes.len();
        staff.notes = group_into_chords(notes, staff.average_unit_size);
    }
    placed
}

fn vertical_distance(staff: &Staff, y: f32) -> f32 {
    if y < staff.min_y() {
        staff.min_y() - y
    } else if y > staff.max_y() {
        y - staff.max_y()
    } else {
        0.0
    }
}

fn group_into_chords(notes: Vec<Note>, unit_size: f32) -> Vec<NoteGroup> {
    let threshold = CHORD_GROUP_DISTANCE * unit_size;
    let mut groups: Vec<NoteGroup> = Vec::new();
    for note in notes {
        match groups.last_mut() {
            Some(group)
                if (note.notehead.center.0
                    - group.notes.last().expect("group is never empty").notehead.center.0)
                    .abs()
                    <= threshold =>
            {
                group.notes.push(note);
            }
            _ => groups.push(NoteGroup { notes: vec![note] }),
        }
    }
    groups
}
