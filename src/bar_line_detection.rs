//! Bar line classification and attachment.
//!
//! Stem-shaped regions that no notehead claimed are bar-line candidates;
//! a candidate is a bar line when it is clearly taller than a note stem
//! and thin relative to its height.

use tracing::debug;

use crate::geometry::RotatedBox;
use crate::model::Staff;

/// A bar line spans a whole staff, so it towers over noteheads.
const MIN_HEIGHT_FACTOR: f32 = 2.5;

/// Width bound relative to height; anything stouter is a rest or blob.
const MAX_ASPECT: f32 = 0.25;

/// Keep the candidates that read as bar lines at the page's notehead scale.
pub fn detect_bar_lines(candidates: &[RotatedBox], average_notehead_height: f32) -> Vec<RotatedBox> {
    if average_notehead_height <= 0.0 {
        return Vec::new();
    }
    candidates
        .iter()
        .filter(|c| {
            c.size.1 >= MIN_HEIGHT_FACTOR * average_notehead_height
                && c.size.0 <= MAX_ASPECT * c.size.1
        })
        .copied()
        .collect()
}

/// Attach each bar line to the staff it vertically overlaps the most,
/// keeping every staff's bar lines in reading order.  Returns the number
/// of attached lines.
pub fn add_bar_lines_to_staffs(staffs: &mut [Staff], bar_lines: &[RotatedBox]) -> usize {
    let mut attached = 0;
    for bar_line in bar_lines {
        let best = staffs
            .iter_mut()
            .filter(|staff| {
                bar_line.center.0 >= staff.min_x() - staff.average_unit_size
                    && bar_line.center.0 <= staff.max_x() + staff.average_unit_size
            })
            .map(|staff| {
                let overlap = bar_line.vertical_overlap(staff.min_y(), staff.max_y());
                (staff, overlap)
            })
            .filter(|(_, overlap)| *overlap > 0.0)
            .max_by(|(_, a), (_, b)| a.total_cmp(b));
        match best {
            Some((staff, _)) => {
                staff.bar_lines.push(*bar_line);
                attached += 1;
            }
            None => debug!("bar line at {:?} matches no staff", bar_line.center),
        }
    }
    for staff in staffs {
        staff
            .bar_lines
            .sort_by(|a, b| a.center.0.total_cmp(&b.center.0));
    }
    attached
}
