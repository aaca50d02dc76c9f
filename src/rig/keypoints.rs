use crate::foundation::raster::{BBox, Point};

/// Labels of the fixed 18-point pseudo-skeleton.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointId {
    /// Nose tip.
    Nose,
    /// Base of the neck.
    Neck,
    /// Left shoulder.
    ShoulderL,
    /// Right shoulder.
    ShoulderR,
    /// Left elbow.
    ElbowL,
    /// Right elbow.
    ElbowR,
    /// Left hand.
    HandL,
    /// Right hand.
    HandR,
    /// Left hip.
    HipL,
    /// Right hip.
    HipR,
    /// Left knee.
    KneeL,
    /// Right knee.
    KneeR,
    /// Left foot.
    FootL,
    /// Right foot.
    FootR,
    /// Left eye.
    EyeL,
    /// Right eye.
    EyeR,
    /// Left ear.
    EarL,
    /// Right ear.
    EarR,
}

/// One synthesized skeleton point with its z-order hint.
///
/// Higher `z` draws in front when layering hints are consulted downstream.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keypoint {
    /// Point label.
    pub id: KeypointId,
    /// Horizontal canvas coordinate.
    pub x: f32,
    /// Vertical canvas coordinate.
    pub y: f32,
    /// Layering hint.
    pub z: i8,
}

/// The full 18-point set synthesized for one raster.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeypointSet {
    /// Bounding box the points were derived from.
    pub bbox: BBox,
    /// All 18 points, in the fixed template order.
    pub points: Vec<Keypoint>,
}

/// Fractional (x, y) offsets of each point inside the bounding box, with the
/// z-order hint. Limb points are symmetric about the box midline.
const TEMPLATE: [(KeypointId, f32, f32, i8); 18] = [
    (KeypointId::Nose, 0.50, 0.10, 3),
    (KeypointId::Neck, 0.50, 0.21, 2),
    (KeypointId::ShoulderL, 0.31, 0.28, 2),
    (KeypointId::ShoulderR, 0.69, 0.28, 2),
    (KeypointId::ElbowL, 0.24, 0.43, 2),
    (KeypointId::ElbowR, 0.76, 0.43, 2),
    (KeypointId::HandL, 0.19, 0.57, 2),
    (KeypointId::HandR, 0.81, 0.57, 2),
    (KeypointId::HipL, 0.43, 0.58, 1),
    (KeypointId::HipR, 0.57, 0.58, 1),
    (KeypointId::KneeL, 0.41, 0.78, 1),
    (KeypointId::KneeR, 0.59, 0.78, 1),
    (KeypointId::FootL, 0.40, 0.96, 1),
    (KeypointId::FootR, 0.60, 0.96, 1),
    (KeypointId::EyeL, 0.44, 0.07, 3),
    (KeypointId::EyeR, 0.56, 0.07, 3),
    (KeypointId::EarL, 0.38, 0.09, 3),
    (KeypointId::EarR, 0.62, 0.09, 3),
];

/// Derive the pseudo-skeleton from a foreground bounding box.
///
/// Pure function of the box: the points are fixed fractional offsets, never
/// inferred from pixel content.
pub fn synthesize_keypoints(bbox: BBox) -> KeypointSet {
    let points = TEMPLATE
        .iter()
        .map(|&(id, fx, fy, z)| Keypoint {
            id,
            x: bbox.min_x as f32 + fx * bbox.w as f32,
            y: bbox.min_y as f32 + fy * bbox.h as f32,
            z,
        })
        .collect();
    KeypointSet { bbox, points }
}

impl KeypointSet {
    /// Position of a labeled point. The template always contains every label.
    pub fn get(&self, id: KeypointId) -> Point {
        let kp = self
            .points
            .iter()
            .find(|kp| kp.id == id)
            .expect("template contains every keypoint label");
        Point::new(kp.x, kp.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_box() -> BBox {
        BBox {
            min_x: 40,
            min_y: 20,
            w: 50,
            h: 90,
        }
    }

    #[test]
    fn synthesizes_all_18_points_inside_the_box() {
        let set = synthesize_keypoints(sample_box());
        assert_eq!(set.points.len(), 18);
        for kp in &set.points {
            assert!(kp.x >= 40.0 && kp.x <= 90.0, "{:?} x out of box", kp.id);
            assert!(kp.y >= 20.0 && kp.y <= 110.0, "{:?} y out of box", kp.id);
        }
    }

    #[test]
    fn anchor_offsets_match_template() {
        let set = synthesize_keypoints(sample_box());
        let shoulder_l = set.get(KeypointId::ShoulderL);
        assert_eq!(shoulder_l.x, 40.0 + 0.31 * 50.0);
        assert_eq!(shoulder_l.y, 20.0 + 0.28 * 90.0);
        let hip_r = set.get(KeypointId::HipR);
        assert_eq!(hip_r.x, 40.0 + 0.57 * 50.0);
        assert_eq!(hip_r.y, 20.0 + 0.58 * 90.0);
    }

    #[test]
    fn left_right_pairs_are_symmetric_about_the_midline() {
        let set = synthesize_keypoints(sample_box());
        let mid = 2.0 * (40.0 + 25.0);
        for (l, r) in [
            (KeypointId::ShoulderL, KeypointId::ShoulderR),
            (KeypointId::ElbowL, KeypointId::ElbowR),
            (KeypointId::HandL, KeypointId::HandR),
            (KeypointId::HipL, KeypointId::HipR),
            (KeypointId::KneeL, KeypointId::KneeR),
            (KeypointId::FootL, KeypointId::FootR),
        ] {
            let (lp, rp) = (set.get(l), set.get(r));
            assert!((lp.x + rp.x - mid).abs() < 1e-4);
            assert_eq!(lp.y, rp.y);
        }
    }
}
