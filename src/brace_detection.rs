//! Brace, bracket and grand-staff connector detection.
//!
//! Staves joined by a brace or bracket (piano grand staff, instrument
//! groups) belong to one system and are merged into a [`MultiStaff`].
//! Connector candidates come from the symbols mask with every already
//! classified pixel erased.

use image::GrayImage;
use tracing::debug;

use crate::geometry::RotatedBox;
use crate::model::{MultiStaff, Staff};

/// The symbols mask minus everything already classified as notehead,
/// clef/key or stem/rest.  What remains is braces, brackets and the
/// dotted connector lines some engravers use between grand-staff systems.
pub fn prepare_brace_dot_image(
    symbols: &GrayImage,
    notehead: &GrayImage,
    clefs_keys: &GrayImage,
    stems_rests: &GrayImage,
) -> GrayImage {
    let (width, height) = symbols.dimensions();
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let classified = notehead.get_pixel(x, y).0[0] != 0
                || clefs_keys.get_pixel(x, y).0[0] != 0
                || stems_rests.get_pixel(x, y).0[0] != 0;
            if symbols.get_pixel(x, y).0[0] != 0 && !classified {
                out.put_pixel(x, y, image::Luma([255]));
            }
        }
    }
    out
}

fn find_root(parents: &mut [usize], mut i: usize) -> usize {
    while parents[i] != i {
        parents[i] = parents[parents[i]];
        i = parents[i];
    }
    i
}

fn union(parents: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find_root(parents, a), find_root(parents, b));
    if ra != rb {
        let min = ra.min(rb);
        parents[ra] = min;
        parents[rb] = min;
    }
}

/// Does `connector` bridge the vertical gap between two adjacent staves?
fn bridges(connector: &RotatedBox, upper: &Staff, lower: &Staff) -> bool {
    connector.min_y() < upper.max_y() && connector.max_y() > lower.min_y()
}

/// Merge staves joined by braces, brackets or connector lines into
/// systems.  A connector bridging staves 1–2 and another bridging 2–3
/// transitively put all three into one [`MultiStaff`]; unconnected staves
/// become single-voice systems.  Vertical page order is preserved.
pub fn find_braces_brackets_and_grand_staff_lines(
    staffs: Vec<Staff>,
    connectors: &[RotatedBox],
) -> Vec<MultiStaff> {
    let mut parents: Vec<usize> = (0..staffs.len()).collect();
    for connector in connectors {
        for i in 0..staffs.len().saturating_sub(1) {
            if bridges(connector, &staffs[i], &staffs[i + 1]) {
                union(&mut parents, i, i + 1);
            }
        }
    }

    let mut systems: Vec<MultiStaff> = Vec::new();
    let mut root_to_system: Vec<Option<usize>> = vec![None; staffs.len()];
    for (i, staff) in staffs.into_iter().enumerate() {
        let root = find_root(&mut parents, i);
        match root_to_system[root] {
            Some(idx) => systems[idx].staffs.push(staff),
            None => {
                root_to_system[root] = Some(systems.len());
                systems.push(MultiStaff { staffs: vec![staff] });
            }
        }
    }
    debug!(systems = systems.len(), "merged staves into systems");
    systems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff_at(top: f32) -> Staff {
        let lines = (0..5)
            .map(|i| RotatedBox::new((100.0, top + i as f32 * 10.0), (200.0, 1.0), 0.0))
            .collect();
        Staff::new(lines, 10.0)
    }

    #[test]
    fn brace_joins_two_staves_into_a_grand_staff() {
        let staffs = vec![staff_at(100.0), staff_at(200.0), staff_at(400.0)];
        // Brace spanning the first two staves only
        let brace = RotatedBox::new((10.0, 170.0), (8.0, 150.0), 0.0);
        let systems = find_braces_brackets_and_grand_staff_lines(staffs, &[brace]);
        assert_eq!(systems.len(), 2);
        assert_eq!(systems[0].voice_count(), 2);
        assert_eq!(systems[1].voice_count(), 1);
    }

    #[test]
    fn chained_connectors_merge_transitively() {
        let staffs = vec![staff_at(100.0), staff_at(200.0), staff_at(300.0)];
        let upper = RotatedBox::new((10.0, 170.0), (4.0, 80.0), 0.0);
        let lower = RotatedBox::new((10.0, 270.0), (4.0, 80.0), 0.0);
        let systems = find_braces_brackets_and_grand_staff_lines(staffs, &[upper, lower]);
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].voice_count(), 3);
    }

    #[test]
    fn unconnected_staves_stay_separate() {
        let staffs = vec![staff_at(100.0), staff_at(300.0)];
        let systems = find_braces_brackets_and_grand_staff_lines(staffs, &[]);
        assert_eq!(systems.len(), 2);
    }

    #[test]
    fn classified_pixels_are_erased_from_the_symbols_mask() {
        let mut symbols = GrayImage::new(4, 4);
        let mut notehead = GrayImage::new(4, 4);
        symbols.put_pixel(1, 1, image::Luma([255]));
        symbols.put_pixel(2, 2, image::Luma([255]));
        notehead.put_pixel(2, 2, image::Luma([255]));
        let rest = GrayImage::new(4, 4);
        let out = prepare_brace_dot_image(&symbols, &notehead, &rest, &rest);
        assert_eq!(out.get_pixel(1, 1).0[0], 255);
        assert_eq!(out.get_pixel(2, 2).0[0], 0);
    }
}
