//! Input normalization: decode, orient, letterbox, background removal, and
//! full-body validation.

mod pass;

pub use pass::{
    BBOX_ALPHA_MIN, MAX_SOURCE_BYTES, Normalized, WORK_CANVAS, coverage, normalize_source,
    validate_submission,
};
