use crate::foundation::raster::{Point, Raster, point_segment_dist2};
use crate::rig::{KeypointId, KeypointSet};

/// Classification radius around the arm chains, in pixels.
pub const ARM_RADIUS_PX: f32 = 6.2;

/// Classification radius around the leg chains, in pixels.
pub const LEG_RADIUS_PX: f32 = 7.4;

/// Leg band starts at this fraction of box height.
const LEG_BAND_MIN_FRAC: f32 = 0.48;

/// Arm band spans this fraction range of box height.
const ARM_BAND_FRAC: (f32, f32) = (0.22, 0.78);

/// Inpaint sweeps over vacated core pixels.
const INPAINT_SWEEPS: usize = 4;

/// Rotation pivots for the four animated limb layers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pivots {
    /// Left arm rotates about this point.
    pub shoulder_l: Point,
    /// Right arm rotates about this point.
    pub shoulder_r: Point,
    /// Left leg rotates about this point.
    pub hip_l: Point,
    /// Right leg rotates about this point.
    pub hip_r: Point,
}

/// The five canvas-sized layers one raster partitions into, plus pivots.
#[derive(Clone, Debug)]
pub struct LayerSet {
    /// Torso/head remainder, holes inpainted.
    pub core: Raster,
    /// Left arm pixels.
    pub arm_l: Raster,
    /// Right arm pixels.
    pub arm_r: Raster,
    /// Left leg pixels.
    pub leg_l: Raster,
    /// Right leg pixels.
    pub leg_r: Raster,
    /// Shoulder/hip rotation pivots.
    pub pivots: Pivots,
}

impl LayerSet {
    /// A copy of the core with both leg layers merged back in.
    ///
    /// The idle clip animates arms only; legs render as part of the body.
    pub fn core_with_legs(&self) -> Raster {
        let mut merged = self.core.clone();
        merged.overwrite_from(&self.leg_l);
        merged.overwrite_from(&self.leg_r);
        merged
    }
}

/// Partition every opaque pixel of `src` into core/arm/leg layers using
/// distance-to-skeleton-segment thresholds, then inpaint the holes the
/// removed limbs left in the core.
pub fn segment_limbs(src: &Raster, kps: &KeypointSet) -> LayerSet {
    let (mut layers, removed) = classify(src, kps);
    inpaint_removed_core(&mut layers.core, &removed);
    layers
}

fn classify(src: &Raster, kps: &KeypointSet) -> (LayerSet, Vec<bool>) {
    let bbox = kps.bbox;
    let leg_band_min = bbox.min_y as f32 + LEG_BAND_MIN_FRAC * bbox.h as f32;
    let arm_band_min = bbox.min_y as f32 + ARM_BAND_FRAC.0 * bbox.h as f32;
    let arm_band_max = bbox.min_y as f32 + ARM_BAND_FRAC.1 * bbox.h as f32;
    let center_x = bbox.center_x();

    let arm_chain_l = chain(kps, KeypointId::ShoulderL, KeypointId::ElbowL, KeypointId::HandL);
    let arm_chain_r = chain(kps, KeypointId::ShoulderR, KeypointId::ElbowR, KeypointId::HandR);
    let leg_chain_l = chain(kps, KeypointId::HipL, KeypointId::KneeL, KeypointId::FootL);
    let leg_chain_r = chain(kps, KeypointId::HipR, KeypointId::KneeR, KeypointId::FootR);

    let mut core = src.clone();
    let mut arm_l = Raster::new(src.width, src.height);
    let mut arm_r = Raster::new(src.width, src.height);
    let mut leg_l = Raster::new(src.width, src.height);
    let mut leg_r = Raster::new(src.width, src.height);
    let mut removed = vec![false; (src.width as usize) * (src.height as usize)];

    let arm_r2 = ARM_RADIUS_PX * ARM_RADIUS_PX;
    let leg_r2 = LEG_RADIUS_PX * LEG_RADIUS_PX;

    for y in 0..src.height {
        for x in 0..src.width {
            let px = src.get(x, y);
            if px[3] == 0 {
                continue;
            }
            let p = Point::new(x as f32, y as f32);
            let left = p.x < center_x;

            // Where the bands overlap the leg chain is tested first.
            let mut target: Option<&mut Raster> = None;
            if p.y >= leg_band_min {
                let c = if left { &leg_chain_l } else { &leg_chain_r };
                if chain_dist2(p, c) <= leg_r2 {
                    target = Some(if left { &mut leg_l } else { &mut leg_r });
                }
            }
            if target.is_none() && p.y >= arm_band_min && p.y <= arm_band_max {
                let c = if left { &arm_chain_l } else { &arm_chain_r };
                if chain_dist2(p, c) <= arm_r2 {
                    target = Some(if left { &mut arm_l } else { &mut arm_r });
                }
            }

            if let Some(layer) = target {
                layer.put(x, y, px);
                core.put(x, y, [0, 0, 0, 0]);
                removed[(y as usize) * (src.width as usize) + (x as usize)] = true;
            }
        }
    }

    let pivots = Pivots {
        shoulder_l: kps.get(KeypointId::ShoulderL),
        shoulder_r: kps.get(KeypointId::ShoulderR),
        hip_l: kps.get(KeypointId::HipL),
        hip_r: kps.get(KeypointId::HipR),
    };
    (
        LayerSet {
            core,
            arm_l,
            arm_r,
            leg_l,
            leg_r,
            pivots,
        },
        removed,
    )
}

fn chain(kps: &KeypointSet, a: KeypointId, b: KeypointId, c: KeypointId) -> [Point; 3] {
    [kps.get(a), kps.get(b), kps.get(c)]
}

fn chain_dist2(p: Point, chain: &[Point; 3]) -> f32 {
    point_segment_dist2(p, chain[0], chain[1]).min(point_segment_dist2(p, chain[1], chain[2]))
}

/// Close holes limb removal left in the core so the torso remains visually
/// whole once limbs are animated away from the body.
///
/// Each sweep copies color from any 4-connected opaque neighbor into vacated
/// pixels. Writes are double-buffered per sweep so the result is independent
/// of scan order.
fn inpaint_removed_core(core: &mut Raster, removed: &[bool]) {
    let w = core.width;
    let h = core.height;
    for _ in 0..INPAINT_SWEEPS {
        let mut writes: Vec<(u32, u32, [u8; 4])> = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let idx = (y as usize) * (w as usize) + (x as usize);
                if !removed[idx] || core.get(x, y)[3] > 0 {
                    continue;
                }
                let neighbor = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ]
                .into_iter()
                .filter(|&(nx, ny)| nx < w && ny < h)
                .map(|(nx, ny)| core.get(nx, ny))
                .find(|px| px[3] > 0);
                if let Some(px) = neighbor {
                    writes.push((x, y, px));
                }
            }
        }
        if writes.is_empty() {
            break;
        }
        for (x, y, px) in writes {
            core.put(x, y, px);
        }
    }
}
