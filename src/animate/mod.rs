//! Directional pose synthesis and idle/walk clip generation.

mod clips;
mod pose;

pub use clips::{
    AnimFrame, Clip, DirectionSet, FrameAnchors, IDLE_FRAME_MS, IDLE_FRAMES, WALK_FRAME_MS,
    WALK_FRAMES, synthesize_all, synthesize_direction,
};
pub use pose::{Direction, FRAME_H, FRAME_W, frame_base, pose_direction};
