//! Keypoint synthesis and the rig descriptor.
//!
//! Everything here is a pure function of the foreground bounding box; no
//! pixel content is ever inspected.

mod descriptor;
mod keypoints;

pub use descriptor::{Rig, RigConstraints, TEMPLATE_ID, build_rig};
pub use keypoints::{Keypoint, KeypointId, KeypointSet, synthesize_keypoints};
