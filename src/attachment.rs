//! Attachment of rests and accidentals to staves.
//!
//! Both follow the same rule: a region belongs to the staff it vertically
//! overlaps the most (extended by a small margin for symbols hanging just
//! above or below the lines), and to at most one staff.  Regions near no
//! staff are dropped.

use tracing::debug;

use crate::geometry::RotatedBox;
use crate::model::Staff;

/// Vertical slack around a staff, in line spacings.
const ATTACH_MARGIN: f32 = 2.0;

fn best_staff_index(staffs: &[Staff], region: &RotatedBox) -> Option<usize> {
    staffs
        .iter()
        .enumerate()
        .filter(|(_, staff)| staff.contains(region.center, ATTACH_MARGIN))
        .map(|(i, staff)| {
            let margin = ATTACH_MARGIN * staff.average_unit_size;
            let overlap =
                region.vertical_overlap(staff.min_y() - margin, staff.max_y() + margin);
            (i, overlap)
        })
        .filter(|(_, overlap)| *overlap > 0.0)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

fn rests_of(staff: &mut Staff) -> &mut Vec<RotatedBox> {
    &mut staff.rests
}

fn accidentals_of(staff: &mut Staff) -> &mut Vec<RotatedBox> {
    &mut staff.accidentals
}

fn attach(
    staffs: &mut [Staff],
    regions: &[RotatedBox],
    pick: fn(&mut Staff) -> &mut Vec<RotatedBox>,
) -> usize {
    let mut attached = 0;
    for region in regions {
        match best_staff_index(staffs, region) {
            Some(i) => {
                pick(&mut staffs[i]).push(*region);
                attached += 1;
            }
            None => debug!("region at {:?} matches no staff", region.center),
        }
    }
    for staff in staffs {
        pick(staff).sort_by(|a, b| a.center.0.total_cmp(&b.center.0));
    }
    attached
}

/// Attach rest regions to their staves in reading order; returns the
/// number attached.
pub fn add_rests_to_staffs(staffs: &mut [Staff], rests: &[RotatedBox]) -> usize {
    attach(staffs, rests, rests_of)
}

/// Attach accidental regions (from the clefs/keys mask, filtered to
/// accidental-sized boxes) to their staves; returns the number attached.
pub fn add_accidentals_to_staffs(staffs: &mut [Staff], accidentals: &[RotatedBox]) -> usize {
    attach(staffs, accidentals, accidentals_of)
}
