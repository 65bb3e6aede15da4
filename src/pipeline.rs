//! End-to-end reconstruction: segmentation masks in, MusicXML out.
//!
//! The pipeline is purely geometric until the very end: symbols are
//! extracted from the masks, combined into noteheads-with-stems, grouped
//! into staves and systems, and only then does the sequence model read
//! each staff image.  Segmentation and sequence inference are injected
//! through traits so the geometry can run against any backend.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::crop_imm;
use image::GrayImage;
use tracing::info;

use crate::accidental_rules::maintain_accidentals;
use crate::attachment::{add_accidentals_to_staffs, add_rests_to_staffs};
use crate::bar_line_detection::{add_bar_lines_to_staffs, detect_bar_lines};
use crate::brace_detection::{find_braces_brackets_and_grand_staff_lines, prepare_brace_dot_image};
use crate::error::{OmrError, Result};
use crate::geometry::{extract_bounding_ellipses, extract_rotated_boxes, RotatedBox};
use crate::model::{InputMasks, Staff};
use crate::note_detection::{
    add_notes_to_staffs, average_notehead_height, combine_noteheads_with_stems,
};
use crate::results::ResultStaff;
use crate::staff_detection::{detect_staffs, global_unit_size, make_lines_stronger};
use crate::staff_parsing::{predict_best, SequenceModel};
use crate::xml::write_musicxml;

/// Produces the per-class segmentation masks for a scanned page.
pub trait Segmenter {
    fn segment(&self, image: &GrayImage) -> Result<InputMasks>;
}

/// What a successful run leaves behind.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub xml_path: PathBuf,
    pub staffs: Vec<ResultStaff>,
}

/// Line spacings of context kept around a staff when cropping its image.
const STAFF_CROP_MARGIN: f32 = 2.0;

fn crop_staff_image(original: &GrayImage, staff: &Staff) -> GrayImage {
    let margin = STAFF_CROP_MARGIN * staff.average_unit_size;
    let (width, height) = original.dimensions();
    let x0 = (staff.min_x() - margin).max(0.0) as u32;
    let y0 = (staff.min_y() - margin).max(0.0) as u32;
    let x1 = ((staff.max_x() + margin) as u32).min(width);
    let y1 = ((staff.max_y() + margin) as u32).min(height);
    crop_imm(original, x0, y0, x1.saturating_sub(x0).max(1), y1.saturating_sub(y0).max(1))
        .to_image()
}

fn run(
    segmenter: &dyn Segmenter,
    model: &dyn SequenceModel,
    image: &GrayImage,
    output_path: &Path,
    title: &str,
) -> Result<ProcessOutcome> {
    let masks = segmenter.segment(image)?;

    let noteheads = extract_bounding_ellipses(&masks.notehead, (4.0, 4.0));
    let staff_mask = make_lines_stronger(&masks.staff);
    let staff_fragments =
        extract_rotated_boxes(&staff_mask, (5.0, 1.0), (10000.0, 100.0));
    let clefs_keys = extract_rotated_boxes(&masks.clefs_keys, (20.0, 40.0), (1000.0, 1000.0));
    let accidentals = extract_rotated_boxes(&masks.clefs_keys, (5.0, 5.0), (100.0, 100.0));
    let stems_rests =
        extract_rotated_boxes(&masks.stems_rests, (1.0, 1.0), (f32::INFINITY, f32::INFINITY));
    let bar_candidates =
        extract_rotated_boxes(&masks.stems_rests, (1.0, 5.0), (f32::INFINITY, f32::INFINITY));
    info!(
        noteheads = noteheads.len(),
        staff_fragments = staff_fragments.len(),
        clefs_keys = clefs_keys.len(),
        "extracted symbol regions"
    );

    let (noteheads_with_stems, _) = combine_noteheads_with_stems(&noteheads, &stems_rests);
    if noteheads_with_stems.is_empty() {
        return Err(OmrError::NoNoteheadsFound);
    }
    let notehead_height = average_notehead_height(&noteheads_with_stems);

    let notehead_boxes: Vec<RotatedBox> =
        noteheads_with_stems.iter().map(|n| n.notehead.to_box()).collect();
    let claimed_stems: Vec<RotatedBox> =
        noteheads_with_stems.iter().filter_map(|n| n.stem).collect();
    let bar_or_rests: Vec<RotatedBox> = bar_candidates
        .iter()
        .filter(|c| !c.overlaps_any(&notehead_boxes) && !c.overlaps_any(&claimed_stems))
        .copied()
        .collect();
    let bar_lines = detect_bar_lines(&bar_or_rests, notehead_height);
    info!(bar_lines = bar_lines.len(), "classified bar lines");

    let mut staffs = detect_staffs(&staff_fragments, &clefs_keys, &bar_lines);
    if staffs.is_empty() {
        return Err(OmrError::NoStaffsFound);
    }
    let unit_size = global_unit_size(&staffs);
    info!(staffs = staffs.len(), unit_size, "detected staves");

    let attached_bar_lines = add_bar_lines_to_staffs(&mut staffs, &bar_lines);
    let possible_rests: Vec<RotatedBox> = bar_or_rests
        .iter()
        .filter(|c| !c.overlaps_any(&bar_lines))
        .copied()
        .collect();
    let attached_rests = add_rests_to_staffs(&mut staffs, &possible_rests);
    let placed_notes = add_notes_to_staffs(&mut staffs, &noteheads_with_stems);
    let attached_accidentals = add_accidentals_to_staffs(&mut staffs, &accidentals);
    info!(
        bar_lines = attached_bar_lines,
        rests = attached_rests,
        notes = placed_notes,
        accidentals = attached_accidentals,
        "attached symbols to staves"
    );

    let brace_dot_image = prepare_brace_dot_image(
        &masks.symbols,
        &masks.notehead,
        &masks.clefs_keys,
        &masks.stems_rests,
    );
    let connectors: Vec<RotatedBox> =
        extract_rotated_boxes(&brace_dot_image, (1.0, 1.0), (100.0, 1000.0))
            .into_iter()
            .filter(|b| b.size.1 >= unit_size)
            .collect();
    let multi_staffs = find_braces_brackets_and_grand_staff_lines(staffs, &connectors);
    info!(
        systems = multi_staffs.len(),
        voices = ?multi_staffs.iter().map(|m| m.voice_count()).collect::<Vec<_>>(),
        "merged staves into systems"
    );

    let mut result_staffs: Vec<ResultStaff> = Vec::new();
    for multi_staff in &multi_staffs {
        for staff in &multi_staff.staffs {
            let staff_image = crop_staff_image(&masks.original, staff);
            result_staffs.push(predict_best(model, staff, &staff_image)?);
        }
    }

    maintain_accidentals(&mut result_staffs);

    write_musicxml(output_path, &result_staffs, title)?;
    info!(staffs = result_staffs.len(), "finished score reconstruction");
    Ok(ProcessOutcome { xml_path: output_path.to_path_buf(), staffs: result_staffs })
}

/// Process one scanned page into a MusicXML file.  On any failure a
/// partially written (or stale) output file is removed before the error
/// propagates.
pub fn process_image(
    segmenter: &dyn Segmenter,
    model: &dyn SequenceModel,
    image: &GrayImage,
    output_path: &Path,
    title: &str,
) -> Result<ProcessOutcome> {
    let outcome = run(segmenter, model, image, output_path, title);
    if outcome.is_err() && output_path.exists() {
        let _ = fs::remove_file(output_path);
    }
    outcome
}
