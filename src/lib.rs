//! scanscore — optical music recognition: reconstructs MusicXML scores
//! from segmented sheet-music scans.
//!
//! The crate takes the per-class segmentation masks of a scanned page
//! (noteheads, staff lines, stems/rests, clefs/keys), reassembles them
//! geometrically into staves and systems, reads each staff with an
//! injected sequence model, and writes the best-rated interpretation as
//! MusicXML.
//!
//! # Example
//! ```no_run
//! use std::path::Path;
//! use scanscore::{process_image, Segmenter, SequenceModel};
//!
//! fn reconstruct(
//!     segmenter: &dyn Segmenter,
//!     model: &dyn SequenceModel,
//!     page: &image::GrayImage,
//! ) -> scanscore::Result<()> {
//!     let outcome = process_image(segmenter, model, page, Path::new("score.musicxml"), "Scan")?;
//!     println!("Parsed {} staffs", outcome.staffs.len());
//!     Ok(())
//! }
//! ```

pub mod accidental_rules;
pub mod attachment;
pub mod bar_line_detection;
pub mod brace_detection;
pub mod error;
pub mod geometry;
pub mod model;
pub mod note_detection;
pub mod parser;
pub mod pipeline;
pub mod results;
pub mod split_merge;
pub mod staff_detection;
pub mod staff_parsing;
pub mod tokens;
pub mod xml;

pub use error::{OmrError, Result};
pub use geometry::{BoundingEllipse, RotatedBox};
pub use model::{InputMasks, MultiStaff, Note, NoteGroup, NoteheadWithStem, Staff};
pub use parser::{parse_token_stream, ParserStats};
pub use pipeline::{process_image, ProcessOutcome, Segmenter};
pub use results::{ClefType, ResultMeasure, ResultStaff, ResultSymbol};
pub use split_merge::{convert_alter_to_accidentals, merge_symbols, split_symbols};
pub use staff_parsing::{predict_best, SequenceModel};
pub use xml::{generate_musicxml, write_musicxml};

/// Serialize decoded staves as pretty-printed JSON; handy for inspecting
/// intermediate results or feeding downstream tools.
pub fn score_to_json(staffs: &[ResultStaff]) -> Result<String> {
    Ok(serde_json::to_string_pretty(staffs)?)
}
