//! Integration tests for candidate selection and the pipeline's fatal
//! paths, using stub segmentation and sequence-model backends.

use std::cell::RefCell;

use image::GrayImage;
use pretty_assertions::assert_eq;

use scanscore::pipeline::{process_image, Segmenter};
use scanscore::staff_parsing::{predict_best, SequenceModel};
use scanscore::{parse_token_stream, InputMasks, OmrError, RotatedBox, Staff};

/// Returns one canned output per prediction call, repeating the last one.
struct StubModel {
    outputs: Vec<&'static str>,
    calls: RefCell<usize>,
}

impl StubModel {
    fn new(outputs: Vec<&'static str>) -> Self {
        Self { outputs, calls: RefCell::new(0) }
    }

    fn call_count(&self) -> usize {
        *self.calls.borrow()
    }
}

impl SequenceModel for StubModel {
    fn predict(&self, _staff_image: &GrayImage) -> scanscore::Result<String> {
        let mut calls = self.calls.borrow_mut();
        let output = self.outputs[(*calls).min(self.outputs.len() - 1)];
        *calls += 1;
        Ok(output.to_string())
    }
}

/// A five-line staff with no attached symbols.
fn empty_staff() -> Staff {
    let lines = (0..5)
        .map(|i| RotatedBox::new((100.0, 100.0 + i as f32 * 10.0), (200.0, 1.0), 0.0))
        .collect();
    Staff::new(lines, 10.0)
}

fn staff_image() -> GrayImage {
    GrayImage::new(100, 60)
}

// ═══════════════════════════════════════════════════════════════════════
// Candidate selection
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn best_rated_candidate_wins() {
    // The staff has no noteheads, so the candidate without notes rates best
    let model = StubModel::new(vec![
        "clef-G2+note-C4_quarter+barline",
        "clef-G2+barline",
        "clef-G2+note-C4_quarter+note-D4_quarter+barline",
    ]);
    let result = predict_best(&model, &empty_staff(), &staff_image()).unwrap();
    assert_eq!(result, parse_token_stream("clef-G2+barline").0);
    assert_eq!(model.call_count(), 3);
}

#[test]
fn ties_keep_the_earliest_attempt() {
    let model = StubModel::new(vec![
        "clef-G2+note-C4_quarter+barline",
        "clef-G2+note-D4_quarter+barline",
        "clef-G2+note-E4_quarter+barline",
    ]);
    let result = predict_best(&model, &empty_staff(), &staff_image()).unwrap();
    assert_eq!(result, parse_token_stream("clef-G2+note-C4_quarter+barline").0);
}

#[test]
fn output_without_a_clef_returns_immediately() {
    let model = StubModel::new(vec![
        "note-C4_quarter+barline",
        "clef-G2+barline",
    ]);
    let result = predict_best(&model, &empty_staff(), &staff_image()).unwrap();
    assert_eq!(result, parse_token_stream("note-C4_quarter+barline").0);
    // Remaining preprocessing variants are never tried
    assert_eq!(model.call_count(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Pipeline fatal paths
// ═══════════════════════════════════════════════════════════════════════

/// Produces all-background masks; the pipeline finds nothing in them.
struct BlankSegmenter;

impl Segmenter for BlankSegmenter {
    fn segment(&self, _image: &GrayImage) -> scanscore::Result<InputMasks> {
        let blank = || GrayImage::new(64, 64);
        Ok(InputMasks {
            original: blank(),
            notehead: blank(),
            symbols: blank(),
            staff: blank(),
            clefs_keys: blank(),
            stems_rests: blank(),
        })
    }
}

#[test]
fn empty_page_fails_with_no_noteheads() {
    let model = StubModel::new(vec!["clef-G2+barline"]);
    let output = std::env::temp_dir().join("scanscore_no_noteheads.musicxml");
    let err = process_image(
        &BlankSegmenter,
        &model,
        &GrayImage::new(64, 64),
        &output,
        "Empty",
    )
    .unwrap_err();
    assert!(matches!(err, OmrError::NoNoteheadsFound));
}

#[test]
fn failed_runs_remove_stale_output_files() {
    let model = StubModel::new(vec!["clef-G2+barline"]);
    let output = std::env::temp_dir().join("scanscore_stale_output.musicxml");
    std::fs::write(&output, "stale").unwrap();

    let result = process_image(
        &BlankSegmenter,
        &model,
        &GrayImage::new(64, 64),
        &output,
        "Empty",
    );
    assert!(result.is_err());
    assert!(!output.exists(), "stale output file should be removed");
}
