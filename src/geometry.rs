//! Geometric primitives for symbol grouping.
//!
//! Everything the segmentation masks produce is represented as a rotated
//! bounding box (staff fragments, stems, bar lines, braces) or a bounding
//! ellipse (noteheads).  Boxes are oriented: `size.0` is the roughly
//! horizontal extent, `size.1` the roughly vertical one, and `angle_deg` is
//! normalized into (-45°, 45°] so that slightly skewed scans keep their
//! width/height semantics.

use std::collections::HashMap;

use image::GrayImage;
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};

/// An oriented bounding box around one connected mask component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedBox {
    /// Center in image coordinates (x, y).
    pub center: (f32, f32),
    /// (width, height): width is the near-horizontal extent.
    pub size: (f32, f32),
    /// Rotation in degrees, normalized into (-45, 45].
    pub angle_deg: f32,
}

/// An oriented bounding ellipse; used for noteheads, which the segmentation
/// produces as roughly elliptical blobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingEllipse {
    pub center: (f32, f32),
    /// Full axis lengths (width, height), not radii.
    pub size: (f32, f32),
    pub angle_deg: f32,
}

impl RotatedBox {
    pub fn new(center: (f32, f32), size: (f32, f32), angle_deg: f32) -> Self {
        Self { center, size, angle_deg }
    }

    /// The four corners in image coordinates.
    pub fn corners(&self) -> [(f32, f32); 4] {
        let rad = self.angle_deg.to_radians();
        let (cos, sin) = (rad.cos(), rad.sin());
        let (hw, hh) = (self.size.0 / 2.0, self.size.1 / 2.0);
        let offsets = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)];
        offsets.map(|(dx, dy)| {
            (
                self.center.0 + dx * cos - dy * sin,
                self.center.1 + dx * sin + dy * cos,
            )
        })
    }

    pub fn min_x(&self) -> f32 {
        self.corners().iter().map(|c| c.0).fold(f32::INFINITY, f32::min)
    }

    pub fn max_x(&self) -> f32 {
        self.corners().iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min_y(&self) -> f32 {
        self.corners().iter().map(|c| c.1).fold(f32::INFINITY, f32::min)
    }

    pub fn max_y(&self) -> f32 {
        self.corners().iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max)
    }

    /// Y of the box center line at a given x, following the box rotation.
    /// Used to read skewed staff lines at a notehead's horizontal position.
    pub fn center_y_at(&self, x: f32) -> f32 {
        self.center.1 + (x - self.center.0) * self.angle_deg.to_radians().tan()
    }

    pub fn center_distance(&self, other: &RotatedBox) -> f32 {
        let dx = self.center.0 - other.center.0;
        let dy = self.center.1 - other.center.1;
        (dx * dx + dy * dy).sqrt()
    }

    /// Separating-axis overlap test between two oriented boxes.
    pub fn overlaps(&self, other: &RotatedBox) -> bool {
        let a = self.corners();
        let b = other.corners();
        for rect in [&a, &b] {
            for i in [0usize, 1] {
                // Edge direction as projection axis
                let (ex, ey) = (rect[i + 1].0 - rect[i].0, rect[i + 1].1 - rect[i].1);
                let axis = (-ey, ex);
                let project = |corners: &[(f32, f32); 4]| {
                    let mut min = f32::INFINITY;
                    let mut max = f32::NEG_INFINITY;
                    for c in corners {
                        let p = c.0 * axis.0 + c.1 * axis.1;
                        min = min.min(p);
                        max = max.max(p);
                    }
                    (min, max)
                };
                let (amin, amax) = project(&a);
                let (bmin, bmax) = project(&b);
                if amax < bmin || bmax < amin {
                    return false;
                }
            }
        }
        true
    }

    pub fn overlaps_any(&self, others: &[RotatedBox]) -> bool {
        others.iter().any(|o| self.overlaps(o))
    }

    /// Vertical overlap (in pixels) of the axis-aligned extents.
    pub fn vertical_overlap(&self, min_y: f32, max_y: f32) -> f32 {
        (self.max_y().min(max_y) - self.min_y().max(min_y)).max(0.0)
    }
}

impl BoundingEllipse {
    pub fn new(center: (f32, f32), size: (f32, f32), angle_deg: f32) -> Self {
        Self { center, size, angle_deg }
    }

    /// The ellipse's oriented bounding box; overlap tests go through this.
    pub fn to_box(&self) -> RotatedBox {
        RotatedBox::new(self.center, self.size, self.angle_deg)
    }

    pub fn overlaps(&self, other: &RotatedBox) -> bool {
        self.to_box().overlaps(other)
    }
}

/// Normalize an angle (degrees) into (-45, 45], swapping width/height for
/// every quarter turn so the box keeps its horizontal/vertical semantics.
fn normalize(mut angle: f32, mut size: (f32, f32)) -> (f32, (f32, f32)) {
    while angle <= -90.0 {
        angle += 180.0;
    }
    while angle > 90.0 {
        angle -= 180.0;
    }
    if angle <= -45.0 {
        angle += 90.0;
        size = (size.1, size.0);
    } else if angle > 45.0 {
        angle -= 90.0;
        size = (size.1, size.0);
    }
    (angle, size)
}

/// Fit an oriented box to a pixel set via its principal axis.  Robust for
/// the degenerate components (1-pixel-thin lines) that staff masks produce.
fn box_from_points(points: &[Point<i32>]) -> RotatedBox {
    let n = points.len() as f32;
    let (mut mx, mut my) = (0.0f32, 0.0f32);
    for p in points {
        mx += p.x as f32;
        my += p.y as f32;
    }
    mx /= n;
    my /= n;

    let (mut sxx, mut sxy, mut syy) = (0.0f32, 0.0f32, 0.0f32);
    for p in points {
        let dx = p.x as f32 - mx;
        let dy = p.y as f32 - my;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let (cos, sin) = (theta.cos(), theta.sin());

    let mut umin = f32::INFINITY;
    let mut umax = f32::NEG_INFINITY;
    let mut vmin = f32::INFINITY;
    let mut vmax = f32::NEG_INFINITY;
    for p in points {
        let dx = p.x as f32 - mx;
        let dy = p.y as f32 - my;
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        umin = umin.min(u);
        umax = umax.max(u);
        vmin = vmin.min(v);
        vmax = vmax.max(v);
    }
    let umid = (umin + umax) / 2.0;
    let vmid = (vmin + vmax) / 2.0;
    let center = (mx + umid * cos - vmid * sin, my + umid * sin + vmid * cos);
    // +1 on both axes: projections span pixel centers, extents are pixel counts
    let size = (umax - umin + 1.0, vmax - vmin + 1.0);
    let (angle, size) = normalize(theta.to_degrees(), size);
    RotatedBox::new(center, size, angle)
}

/// Collect the foreground pixels of each connected component of a binary mask.
fn component_points(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    let labels = connected_components(mask, Connectivity::Eight, image::Luma([0u8]));
    let mut by_label: HashMap<u32, Vec<Point<i32>>> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        if label.0[0] != 0 {
            by_label
                .entry(label.0[0])
                .or_default()
                .push(Point::new(x as i32, y as i32));
        }
    }
    by_label.into_values().collect()
}

/// Extract one rotated bounding box per connected component of `mask`,
/// keeping only boxes whose size falls within `min_size..=max_size`.
pub fn extract_rotated_boxes(
    mask: &GrayImage,
    min_size: (f32, f32),
    max_size: (f32, f32),
) -> Vec<RotatedBox> {
    let mut boxes: Vec<RotatedBox> = component_points(mask)
        .iter()
        .filter(|points| points.len() >= 3)
        .map(|points| box_from_points(points))
        .filter(|b| {
            b.size.0 >= min_size.0
                && b.size.1 >= min_size.1
                && b.size.0 <= max_size.0
                && b.size.1 <= max_size.1
        })
        .collect();
    boxes.sort_by(|a, b| a.center.0.total_cmp(&b.center.0));
    boxes
}

/// Extract one bounding ellipse per connected component; used on the
/// notehead mask where blobs are close to elliptical.
pub fn extract_bounding_ellipses(mask: &GrayImage, min_size: (f32, f32)) -> Vec<BoundingEllipse> {
    let mut ellipses: Vec<BoundingEllipse> = component_points(mask)
        .iter()
        .filter(|points| points.len() >= 3)
        .map(|points| {
            let b = box_from_points(points);
            BoundingEllipse::new(b.center, b.size, b.angle_deg)
        })
        .filter(|e| e.size.0 >= min_size.0 && e.size.1 >= min_size.1)
        .collect();
    ellipses.sort_by(|a, b| a.center.0.total_cmp(&b.center.0));
    ellipses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_aligned_overlap() {
        let a = RotatedBox::new((10.0, 10.0), (10.0, 4.0), 0.0);
        let b = RotatedBox::new((14.0, 10.0), (10.0, 4.0), 0.0);
        let c = RotatedBox::new((30.0, 10.0), (10.0, 4.0), 0.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn rotated_overlap() {
        // A tall thin stem crossing a flat notehead-sized box at an angle
        let stem = RotatedBox::new((10.0, 10.0), (2.0, 30.0), 10.0);
        let head = RotatedBox::new((11.0, 20.0), (8.0, 6.0), 0.0);
        assert!(stem.overlaps(&head));
        let far = RotatedBox::new((40.0, 20.0), (8.0, 6.0), 0.0);
        assert!(!stem.overlaps(&far));
    }

    #[test]
    fn angle_normalization_swaps_sides() {
        let (angle, size) = super::normalize(90.0, (30.0, 2.0));
        assert_eq!(angle, 0.0);
        assert_eq!(size, (2.0, 30.0));
    }

    #[test]
    fn center_line_follows_skew() {
        let line = RotatedBox::new((100.0, 50.0), (200.0, 2.0), 45.0);
        assert!((line.center_y_at(100.0) - 50.0).abs() < 1e-5);
        assert!((line.center_y_at(110.0) - 60.0).abs() < 1e-3);
    }

    #[test]
    fn extracts_boxes_from_mask_components() {
        let mut mask = GrayImage::new(40, 20);
        // Horizontal line segment
        for x in 2..22 {
            mask.put_pixel(x, 5, image::Luma([255]));
        }
        // Small blob
        for x in 30..34 {
            for y in 10..14 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        let boxes = extract_rotated_boxes(&mask, (1.0, 1.0), (1000.0, 1000.0));
        assert_eq!(boxes.len(), 2);
        let line = &boxes[0];
        assert!(line.size.0 >= 19.0, "line width was {}", line.size.0);
        assert!(line.size.1 <= 2.0);
    }
}
