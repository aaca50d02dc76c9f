use std::f32::consts::{FRAC_PI_2, TAU};

use crate::animate::pose::{Direction, pose_direction};
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::{Point, Raster, transform_point};
use crate::rig::{KeypointId, synthesize_keypoints};
use crate::segment::{LayerSet, segment_limbs};

/// Idle frames per direction.
pub const IDLE_FRAMES: usize = 2;

/// Walk frames per direction (one full gait cycle).
pub const WALK_FRAMES: usize = 8;

/// Per-frame display duration for the idle clip, in milliseconds.
pub const IDLE_FRAME_MS: u32 = 220;

/// Per-frame display duration for the walk clip, in milliseconds.
pub const WALK_FRAME_MS: u32 = 120;

/// Idle arm swing amplitude about the shoulder pivots, degrees.
const IDLE_ARM_SWING_DEG: f32 = 4.0;

/// Walk leg swing amplitude about the hip pivots, degrees.
const WALK_LEG_SWING_DEG: f32 = 18.0;

/// Walk arm counter-swing amplitude about the shoulder pivots, degrees.
const WALK_ARM_SWING_DEG: f32 = 14.0;

/// An animation sequence name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clip {
    /// Two-frame breathing loop.
    Idle,
    /// Eight-frame gait cycle.
    Walk,
}

impl Clip {
    /// Both clips in atlas row order.
    pub const ALL: [Clip; 2] = [Clip::Idle, Clip::Walk];

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Walk => "walk",
        }
    }

    /// Per-frame display duration in milliseconds.
    pub fn frame_ms(self) -> u32 {
        match self {
            Self::Idle => IDLE_FRAME_MS,
            Self::Walk => WALK_FRAME_MS,
        }
    }
}

/// Attachment points recorded per synthesized frame, transformed by the same
/// rotation/translation as their owning layer (e.g. for held items).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnchors {
    /// Left hand, owned by the left arm layer.
    pub hand_l: Point,
    /// Right hand, owned by the right arm layer.
    pub hand_r: Point,
    /// Head, owned by the core layer.
    pub head: Point,
}

/// One rendered 32x48 pose image plus its anchors.
#[derive(Clone, Debug)]
pub struct AnimFrame {
    /// The composited frame raster.
    pub raster: Raster,
    /// Anchor points for downstream attachment.
    pub anchors: FrameAnchors,
}

/// All frames synthesized for one view direction.
#[derive(Clone, Debug)]
pub struct DirectionSet {
    /// The direction these frames belong to.
    pub direction: Direction,
    /// Idle clip frames.
    pub idle: Vec<AnimFrame>,
    /// Walk clip frames.
    pub walk: Vec<AnimFrame>,
}

impl DirectionSet {
    /// Frames of the given clip.
    pub fn frames(&self, clip: Clip) -> &[AnimFrame] {
        match clip {
            Clip::Idle => &self.idle,
            Clip::Walk => &self.walk,
        }
    }
}

/// Synthesize idle and walk frames for every direction from the south base
/// frame.
#[tracing::instrument(skip(base))]
pub fn synthesize_all(base: &Raster) -> SpriteResult<Vec<DirectionSet>> {
    Direction::ALL
        .iter()
        .map(|&dir| synthesize_direction(base, dir))
        .collect()
}

/// Synthesize one direction: pose the base, re-derive limb layers on the
/// posed frame, then build both clips.
pub fn synthesize_direction(base: &Raster, dir: Direction) -> SpriteResult<DirectionSet> {
    let posed = pose_direction(base, dir);
    let bbox = posed
        .alpha_bbox(0)
        .ok_or_else(|| SpriteError::failed(format!("{} pose lost all foreground", dir.as_str())))?;
    let kps = synthesize_keypoints(bbox);
    let layers = segment_limbs(&posed, &kps);
    let head_rest = kps.get(KeypointId::Nose);
    let hand_l_rest = kps.get(KeypointId::HandL);
    let hand_r_rest = kps.get(KeypointId::HandR);

    let idle = (0..IDLE_FRAMES)
        .map(|i| idle_frame(&layers, i, head_rest, hand_l_rest, hand_r_rest))
        .collect();
    let walk = (0..WALK_FRAMES)
        .map(|i| walk_frame(&layers, i, head_rest, hand_l_rest, hand_r_rest))
        .collect();
    Ok(DirectionSet {
        direction: dir,
        idle,
        walk,
    })
}

/// Breathing bob with a gentle arm swing. Legs stay merged in the core for
/// this clip; composite order is core, left arm, right arm.
fn idle_frame(
    layers: &LayerSet,
    i: usize,
    head_rest: Point,
    hand_l_rest: Point,
    hand_r_rest: Point,
) -> AnimFrame {
    let phase = i as f32 * FRAC_PI_2;
    let dy = -(phase.sin().abs().round() as i32);
    let swing = (phase.sin() * IDLE_ARM_SWING_DEG).to_radians();
    let p = &layers.pivots;

    let mut frame = Raster::new(layers.core.width, layers.core.height);
    frame.overwrite_from(&layers.core_with_legs().splat_transform(0.0, p.shoulder_l, 0, dy));
    frame.overwrite_from(&layers.arm_l.splat_transform(swing, p.shoulder_l, 0, dy));
    frame.overwrite_from(&layers.arm_r.splat_transform(-swing, p.shoulder_r, 0, dy));

    AnimFrame {
        raster: frame,
        anchors: FrameAnchors {
            hand_l: transform_point(hand_l_rest, swing, p.shoulder_l, 0, dy),
            hand_r: transform_point(hand_r_rest, -swing, p.shoulder_r, 0, dy),
            head: transform_point(head_rest, 0.0, p.shoulder_l, 0, dy),
        },
    }
}

/// One gait-cycle frame: legs swing about the hips with the forward leg
/// lifted, arms counter-swing, the core bobs without rotation. Composite
/// order flips with the sign of `step` so forward limbs draw on top.
fn walk_frame(
    layers: &LayerSet,
    i: usize,
    head_rest: Point,
    hand_l_rest: Point,
    hand_r_rest: Point,
) -> AnimFrame {
    let phase = TAU * (i as f32) / WALK_FRAMES as f32;
    let step = phase.sin();
    let dy = -((step.abs() * 2.0).round() as i32);
    let lift_l = (step.max(0.0) * -1.0).round() as i32;
    let lift_r = ((-step).max(0.0) * -1.0).round() as i32;
    let leg_l_angle = (step * WALK_LEG_SWING_DEG).to_radians();
    let leg_r_angle = -leg_l_angle;
    let arm_l_angle = (-step * WALK_ARM_SWING_DEG).to_radians();
    let arm_r_angle = -arm_l_angle;
    let p = &layers.pivots;

    let core = layers.core.splat_transform(0.0, p.shoulder_l, 0, dy);
    let leg_l = layers
        .leg_l
        .splat_transform(leg_l_angle, p.hip_l, 0, dy + lift_l);
    let leg_r = layers
        .leg_r
        .splat_transform(leg_r_angle, p.hip_r, 0, dy + lift_r);
    let arm_l = layers
        .arm_l
        .splat_transform(arm_l_angle, p.shoulder_l, 0, dy);
    let arm_r = layers
        .arm_r
        .splat_transform(arm_r_angle, p.shoulder_r, 0, dy);

    let mut frame = Raster::new(layers.core.width, layers.core.height);
    let order: [&Raster; 5] = if step >= 0.0 {
        // Left leg and right arm lead.
        [&leg_r, &arm_l, &core, &leg_l, &arm_r]
    } else {
        [&leg_l, &arm_r, &core, &leg_r, &arm_l]
    };
    for layer in order {
        frame.overwrite_from(layer);
    }

    AnimFrame {
        raster: frame,
        anchors: FrameAnchors {
            hand_l: transform_point(hand_l_rest, arm_l_angle, p.shoulder_l, 0, dy),
            hand_r: transform_point(hand_r_rest, arm_r_angle, p.shoulder_r, 0, dy),
            head: transform_point(head_rest, 0.0, p.shoulder_l, 0, dy),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animate::pose::{FRAME_H, FRAME_W, frame_base};

    fn south_base() -> Raster {
        let mut canvas = Raster::new(128, 128);
        for y in 22..112 {
            for x in 44..84 {
                canvas.put(x, y, [200, 30, 40, 255]);
            }
        }
        let bbox = canvas.alpha_bbox(24).unwrap();
        frame_base(&canvas, bbox)
    }

    #[test]
    fn synthesizes_expected_frame_counts_for_all_directions() {
        let sets = synthesize_all(&south_base()).unwrap();
        assert_eq!(sets.len(), 4);
        for set in &sets {
            assert_eq!(set.idle.len(), IDLE_FRAMES);
            assert_eq!(set.walk.len(), WALK_FRAMES);
            for frame in set.idle.iter().chain(&set.walk) {
                assert_eq!((frame.raster.width, frame.raster.height), (FRAME_W, FRAME_H));
                assert!(frame.raster.opaque_count() > 0);
            }
        }
    }

    #[test]
    fn idle_frame_zero_is_the_rest_pose() {
        let set = synthesize_direction(&south_base(), Direction::South).unwrap();
        let rest = &set.idle[0];
        let bobbed = &set.idle[1];
        // Frame 0 has no bob and no swing; frame 1 is shifted up one pixel.
        let rest_bbox = rest.raster.alpha_bbox(0).unwrap();
        let bob_bbox = bobbed.raster.alpha_bbox(0).unwrap();
        assert_eq!(rest_bbox.max_y(), FRAME_H - 1);
        assert_eq!(bob_bbox.max_y(), FRAME_H - 2);
        assert_eq!(bobbed.anchors.head.y, rest.anchors.head.y - 1.0);
    }

    #[test]
    fn walk_cycle_is_phase_symmetric_in_bob() {
        let set = synthesize_direction(&south_base(), Direction::South).unwrap();
        // |sin| repeats with period pi: frames i and i+4 share the same bob.
        for i in 0..4 {
            let a = set.walk[i].anchors.head.y;
            let b = set.walk[i + 4].anchors.head.y;
            assert_eq!(a, b, "frame {i} vs {}", i + 4);
        }
        // Contact frames (0 and 4) have no bob.
        assert_eq!(set.walk[0].anchors.head.y, set.idle[0].anchors.head.y);
    }

    #[test]
    fn walk_anchors_follow_the_arm_swing() {
        let set = synthesize_direction(&south_base(), Direction::South).unwrap();
        let rest = set.walk[0].anchors;
        let swung = set.walk[2].anchors;
        // At peak step the hands rotate away from their rest positions.
        assert_ne!(rest.hand_l, swung.hand_l);
        assert_ne!(rest.hand_r, swung.hand_r);
    }
}
