//! Automated quality control: silhouette, grounding, jitter and palette
//! scoring with hard accept/reject thresholds.

mod gate;

pub use gate::{QcReport, enforce, evaluate};
