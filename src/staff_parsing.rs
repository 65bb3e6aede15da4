//! Staff image parsing: sequence model inference and candidate selection.
//!
//! The sequence model turns one staff image into a token stream.  Because
//! recognition quality depends on scan contrast and noise, several
//! preprocessed variants of the staff image are tried and each resulting
//! parse is rated against what the geometric pipeline already knows about
//! the staff (its notehead positions and accidental count).  The candidate
//! with the lowest rating wins.

use std::collections::HashMap;

use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use imageproc::filter::median_filter;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::Staff;
use crate::parser::parse_token_stream;
use crate::results::{ClefType, ResultStaff};

/// A model that reads one staff image into a `+`-separated token stream.
pub trait SequenceModel {
    fn predict(&self, staff_image: &GrayImage) -> Result<String>;
}

/// The preprocessing variants fed to the model: the untouched crop, a
/// median-denoised copy, and a contrast-equalized copy of the denoised one.
pub fn build_image_options(staff_image: &GrayImage) -> Vec<GrayImage> {
    let denoised = median_filter(staff_image, 1, 1);
    let equalized = equalize_histogram(&denoised);
    vec![staff_image.clone(), denoised, equalized]
}

/// The clef a token stream opens with, taken from whichever clef token
/// appears first.
pub fn first_clef_type(stream: &str) -> Option<ClefType> {
    let treble = stream.find("clef-G2");
    let bass = stream.find("clef-F4");
    match (treble, bass) {
        (None, None) => None,
        (Some(_), None) => Some(ClefType::Treble),
        (None, Some(_)) => Some(ClefType::Bass),
        (Some(t), Some(b)) => Some(if t < b { ClefType::Treble } else { ClefType::Bass }),
    }
}

/// Note pitches of a raw token stream, chords flattened, accidentals and
/// durations stripped.  The comparable form of the "actual" side of the
/// rating.
fn actual_pitches(stream: &str) -> Vec<String> {
    stream
        .split('+')
        .filter(|token| token.starts_with("note"))
        .flat_map(|token| token.split('|'))
        .filter_map(|symbol| {
            let pitch = symbol.split('_').next()?.strip_prefix("note-")?;
            Some(pitch.replace(['#', 'b', 'N'], ""))
        })
        .collect()
}

/// Size of the symmetric difference of two pitch multisets.
fn multiset_difference(actual: &[String], expected: &[String]) -> usize {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for pitch in actual {
        *counts.entry(pitch).or_default() += 1;
    }
    for pitch in expected {
        *counts.entry(pitch).or_default() -= 1;
    }
    counts.values().map(|c| c.unsigned_abs() as usize).sum()
}

/// Population standard deviation of the measure lengths in quarters.
/// Uneven measures hint at dropped or hallucinated tokens.
fn measure_length_deviation(staff: &ResultStaff) -> f32 {
    if staff.measures.is_empty() {
        return 0.0;
    }
    let lengths: Vec<f32> = staff.measures.iter().map(|m| m.length_in_quarters()).collect();
    let mean = lengths.iter().sum::<f32>() / lengths.len() as f32;
    let variance =
        lengths.iter().map(|l| (l - mean) * (l - mean)).sum::<f32>() / lengths.len() as f32;
    variance.sqrt()
}

/// Structural symbols (clef, key, time) appear at most once per staff;
/// every extra occurrence costs one rating point.
fn superfluous(count: usize) -> usize {
    count.saturating_sub(1)
}

/// Outcome of rating one model output against the detected staff.
enum CandidateEvaluation {
    Rated { result: ResultStaff, rating: f32 },
    NoClefFound { result: ResultStaff },
}

fn evaluate_candidate(stream: &str, staff: &Staff) -> CandidateEvaluation {
    let (result, stats) = parse_token_stream(stream);
    let Some(clef_type) = first_clef_type(stream) else {
        return CandidateEvaluation::NoClefFound { result };
    };

    let actual = actual_pitches(stream);
    let expected = staff.expected_note_names(clef_type);
    let pitch_distance = multiset_difference(&actual, &expected) as f32;
    let accidental_difference =
        (staff.accidentals.len() as i64 - stats.total_accidentals() as i64).abs() as f32;
    let structural_excess = (superfluous(stats.clefs)
        + superfluous(stats.key_signatures)
        + superfluous(stats.time_signatures)) as f32;
    let rating = pitch_distance
        + accidental_difference
        + measure_length_deviation(&result)
        + structural_excess;
    CandidateEvaluation::Rated { result, rating }
}

/// Run the model on every preprocessing variant of the staff image and keep
/// the best-rated parse.  Ties keep the earlier attempt.  A parse without
/// any clef cannot be rated (pitch names need a clef) and is returned as is.
pub fn predict_best(
    model: &dyn SequenceModel,
    staff: &Staff,
    staff_image: &GrayImage,
) -> Result<ResultStaff> {
    let mut best_result = ResultStaff::new(Vec::new());
    let mut best_rating = 0.0f32;
    let mut best_attempt = 0;

    for (attempt, image) in build_image_options(staff_image).iter().enumerate() {
        let stream = model.predict(image)?;
        match evaluate_candidate(&stream, staff) {
            CandidateEvaluation::NoClefFound { result } => {
                warn!(attempt, "no clef in model output, keeping the parse unrated");
                return Ok(result);
            }
            CandidateEvaluation::Rated { result, rating } => {
                debug!(attempt, rating, "rated staff candidate");
                if best_result.is_empty() || rating < best_rating {
                    best_rating = rating;
                    best_result = result;
                    best_attempt = attempt;
                }
            }
        }
    }
    info!(attempt = best_attempt + 1, rating = best_rating, "selected staff candidate");
    Ok(best_result)
}
