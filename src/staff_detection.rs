//! Staff detection: grouping staff-line fragments into five-line staves.
//!
//! The staff mask yields horizontal fragments broken by noteheads, stems and
//! bar lines crossing the lines.  Detection clusters fragments into line
//! rows, then bands rows into groups of five roughly equidistant lines.
//! Clefs and tall bar-line candidates act as anchors when neighbouring
//! staves leave ambiguous groupings.

use image::GrayImage;
use tracing::debug;

use crate::geometry::RotatedBox;
use crate::model::Staff;

/// Fragments wider than this are split so one warped line cannot smear a
/// whole row's angle estimate.
const MAX_FRAGMENT_WIDTH: f32 = 300.0;

/// A row must stay within this many pixels of a fragment's center to absorb it.
const ROW_TOLERANCE: f32 = 3.0;

/// Largest allowed spread between line gaps inside one staff.
const EQUIDISTANCE_RATIO: f32 = 1.5;

/// Bands backed by fewer fragments than this are treated as noise.
const MIN_STAFF_FRAGMENTS: usize = 5;

/// Thicken staff lines vertically by one pixel in each direction so that
/// lines interrupted by thin crossings stay connected in the mask.
pub fn make_lines_stronger(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = mask.clone();
    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y).0[0] == 0 {
                continue;
            }
            if y > 0 {
                out.put_pixel(x, y - 1, image::Luma([255]));
            }
            if y + 1 < height {
                out.put_pixel(x, y + 1, image::Luma([255]));
            }
        }
    }
    out
}

/// Split fragments wider than `max_width` into equal pieces along their own
/// axis.
pub fn break_wide_fragments(fragments: Vec<RotatedBox>, max_width: f32) -> Vec<RotatedBox> {
    let mut result = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        if fragment.size.0 <= max_width {
            result.push(fragment);
            continue;
        }
        let pieces = (fragment.size.0 / max_width).ceil() as usize;
        let piece_width = fragment.size.0 / pieces as f32;
        let rad = fragment.angle_deg.to_radians();
        let (cos, sin) = (rad.cos(), rad.sin());
        for i in 0..pieces {
            let offset = (i as f32 + 0.5) * piece_width - fragment.size.0 / 2.0;
            result.push(RotatedBox::new(
                (
                    fragment.center.0 + offset * cos,
                    fragment.center.1 + offset * sin,
                ),
                (piece_width, fragment.size.1),
                fragment.angle_deg,
            ));
        }
    }
    result
}

// ─── Line rows ───────────────────────────────────────────────────────────────

/// Fragments belonging to one staff line, accumulated left to right.
struct LineRow {
    fragments: Vec<RotatedBox>,
}

impl LineRow {
    fn new(fragment: RotatedBox) -> Self {
        Self { fragments: vec![fragment] }
    }

    fn width_sum(&self) -> f32 {
        self.fragments.iter().map(|f| f.size.0).sum()
    }

    /// Width-weighted mean angle; wide fragments carry the line's slope.
    fn angle_deg(&self) -> f32 {
        let total = self.width_sum();
        self.fragments
            .iter()
            .map(|f| f.angle_deg * f.size.0 / total)
            .sum()
    }

    fn centroid(&self) -> (f32, f32) {
        let total = self.width_sum();
        let x = self.fragments.iter().map(|f| f.center.0 * f.size.0 / total).sum();
        let y = self.fragments.iter().map(|f| f.center.1 * f.size.0 / total).sum();
        (x, y)
    }

    /// Estimated line y at a given x, extrapolating along the row angle.
    fn y_at(&self, x: f32) -> f32 {
        let (cx, cy) = self.centroid();
        cy + (x - cx) * self.angle_deg().to_radians().tan()
    }

    fn min_x(&self) -> f32 {
        self.fragments.iter().map(|f| f.min_x()).fold(f32::INFINITY, f32::min)
    }

    fn max_x(&self) -> f32 {
        self.fragments.iter().map(|f| f.max_x()).fold(f32::NEG_INFINITY, f32::max)
    }

    /// One synthesized box spanning the whole row; becomes a staff line.
    fn to_line(&self) -> RotatedBox {
        let (min_x, max_x) = (self.min_x(), self.max_x());
        let mid_x = (min_x + max_x) / 2.0;
        let mut heights: Vec<f32> = self.fragments.iter().map(|f| f.size.1).collect();
        heights.sort_by(f32::total_cmp);
        let height = heights[heights.len() / 2];
        RotatedBox::new(
            (mid_x, self.y_at(mid_x)),
            (max_x - min_x, height),
            self.angle_deg(),
        )
    }
}

fn cluster_into_rows(fragments: &[RotatedBox]) -> Vec<LineRow> {
    let mut sorted = fragments.to_vec();
    sorted.sort_by(|a, b| a.center.1.total_cmp(&b.center.1));

    let mut rows: Vec<LineRow> = Vec::new();
    for fragment in sorted {
        let matching = rows
            .iter_mut()
            .filter(|row| (row.y_at(fragment.center.0) - fragment.center.1).abs() <= ROW_TOLERANCE)
            .min_by(|a, b| {
                (a.y_at(fragment.center.0) - fragment.center.1)
                    .abs()
                    .total_cmp(&(b.y_at(fragment.center.0) - fragment.center.1).abs())
            });
        match matching {
            Some(row) => row.fragments.push(fragment),
            None => rows.push(LineRow::new(fragment)),
        }
    }
    rows.sort_by(|a, b| a.centroid().1.total_cmp(&b.centroid().1));
    rows
}

// ─── Banding ─────────────────────────────────────────────────────────────────

struct Band {
    first_row: usize,
    anchored: bool,
    spacing_score: f32,
}

fn band_gaps(rows: &[LineRow], first: usize) -> [f32; 4] {
    let mut gaps = [0.0f32; 4];
    for (i, gap) in gaps.iter_mut().enumerate() {
        *gap = rows[first + i + 1].centroid().1 - rows[first + i].centroid().1;
    }
    gaps
}

/// Does any anchor box vertically span most of the y-range `min_y..max_y`?
fn is_anchored(anchors: &[RotatedBox], min_y: f32, max_y: f32) -> bool {
    let span = max_y - min_y;
    anchors
        .iter()
        .any(|a| a.vertical_overlap(min_y, max_y) >= 0.8 * span)
}

/// Band staff-line rows into staves.  Clef boxes and tall bar-line
/// candidates anchor the choice when overlapping five-row windows both
/// look plausible.
pub fn detect_staffs(
    staff_fragments: &[RotatedBox],
    clefs_keys: &[RotatedBox],
    bar_line_candidates: &[RotatedBox],
) -> Vec<Staff> {
    let fragments = break_wide_fragments(staff_fragments.to_vec(), MAX_FRAGMENT_WIDTH);
    let rows = cluster_into_rows(&fragments);
    debug!(rows = rows.len(), "clustered staff line rows");
    if rows.len() < 5 {
        return Vec::new();
    }

    let mut candidates: Vec<Band> = Vec::new();
    for first in 0..=(rows.len() - 5) {
        let gaps = band_gaps(&rows, first);
        let min_gap = gaps.iter().copied().fold(f32::INFINITY, f32::min);
        let max_gap = gaps.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if min_gap < 2.0 || max_gap > EQUIDISTANCE_RATIO * min_gap {
            continue;
        }
        let fragment_count: usize = rows[first..first + 5]
            .iter()
            .map(|r| r.fragments.len())
            .sum();
        if fragment_count < MIN_STAFF_FRAGMENTS {
            continue;
        }
        let min_y = rows[first].centroid().1;
        let max_y = rows[first + 4].centroid().1;
        let anchored = is_anchored(clefs_keys, min_y, max_y)
            || is_anchored(bar_line_candidates, min_y, max_y);
        candidates.push(Band {
            first_row: first,
            anchored,
            spacing_score: min_gap / max_gap,
        });
    }

    // Anchored bands first, then the most evenly spaced; a band is skipped
    // when any of its five rows is already taken.
    candidates.sort_by(|a, b| {
        b.anchored
            .cmp(&a.anchored)
            .then(b.spacing_score.total_cmp(&a.spacing_score))
    });
    let mut taken = vec![false; rows.len()];
    let mut selected: Vec<usize> = Vec::new();
    for band in &candidates {
        let range = band.first_row..band.first_row + 5;
        if range.clone().any(|i| taken[i]) {
            continue;
        }
        for i in range {
            taken[i] = true;
        }
        selected.push(band.first_row);
    }
    selected.sort_unstable();

    selected
        .into_iter()
        .map(|first| {
            let mut gaps = band_gaps(&rows, first);
            gaps.sort_by(f32::total_cmp);
            // Median of an even count: midpoint of the middle pair
            let unit = (gaps[1] + gaps[2]) / 2.0;
            let lines = rows[first..first + 5].iter().map(LineRow::to_line).collect();
            Staff::new(lines, unit)
        })
        .collect()
}

/// Median line spacing across all detected staves; the page-global scale.
pub fn global_unit_size(staffs: &[Staff]) -> f32 {
    let mut units: Vec<f32> = staffs.iter().map(|s| s.average_unit_size).collect();
    if units.is_empty() {
        return 0.0;
    }
    units.sort_by(f32::total_cmp);
    units[units.len() / 2]
}
