//! Error taxonomy for the recognition pipeline.
//!
//! Fatal errors abort the whole per-image pass (and trigger cleanup of any
//! partially written output file); everything recoverable is handled locally
//! with a logged warning and never surfaces here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OmrError>;

#[derive(Debug, Error)]
pub enum OmrError {
    /// The notehead mask produced no usable detections; nothing downstream
    /// can work without them.
    #[error("no noteheads found in the input image")]
    NoNoteheadsFound,

    /// Staff detection produced no staffs.
    #[error("no staffs found in the input image")]
    NoStaffsFound,

    /// The segmentation collaborator failed.
    #[error("segmentation failed: {0}")]
    Segmentation(String),

    /// The sequence-model collaborator failed.
    #[error("sequence model failed: {0}")]
    SequenceModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
