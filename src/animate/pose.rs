use crate::foundation::raster::{BBox, Raster};

/// Animation frame width in pixels.
pub const FRAME_W: u32 = 32;

/// Animation frame height in pixels.
pub const FRAME_H: u32 = 48;

/// Profile width the east/west poses squeeze the frame to before re-padding.
const PROFILE_W: u32 = 28;

/// Brightness multiplier for the away-facing pose.
const NORTH_BRIGHTNESS: f32 = 0.84;

/// Saturation multiplier for the away-facing pose.
const NORTH_SATURATION: f32 = 0.88;

/// Solid color of the occlusion rectangle suggesting the upper back.
const OCCLUSION_RGBA: [u8; 4] = [38, 34, 44, 255];

/// Occlusion rectangle extent as fractions of the posed frame's box:
/// horizontal span, then vertical span.
const OCCLUSION_X_FRAC: (f32, f32) = (0.28, 0.72);
const OCCLUSION_Y_FRAC: (f32, f32) = (0.10, 0.32);

/// One of the four view directions an avatar renders in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Facing the camera; the baseline pose.
    South,
    /// Facing right.
    East,
    /// Facing left.
    West,
    /// Facing away from the camera.
    North,
}

impl Direction {
    /// All directions in atlas row order.
    pub const ALL: [Direction; 4] = [
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::North,
    ];

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
            Self::North => "north",
        }
    }
}

/// Resize the normalized subject into the 32x48 animation frame.
///
/// The foreground box is cropped out, nearest-fit preserving aspect, and
/// anchored bottom-center so the feet sit on the frame floor.
pub fn frame_base(normalized: &Raster, bbox: BBox) -> Raster {
    let subject = normalized.crop(bbox);
    let scale = (FRAME_W as f32 / subject.width as f32).min(FRAME_H as f32 / subject.height as f32);
    let tw = ((subject.width as f32 * scale).round() as u32).clamp(1, FRAME_W);
    let th = ((subject.height as f32 * scale).round() as u32).clamp(1, FRAME_H);
    let scaled = subject.resized_nearest(tw, th);

    let mut frame = Raster::new(FRAME_W, FRAME_H);
    frame.blit(&scaled, (FRAME_W - tw) / 2, FRAME_H - th);
    frame
}

/// Derive the posed base frame for a direction from the south baseline.
pub fn pose_direction(base: &Raster, dir: Direction) -> Raster {
    match dir {
        Direction::South => base.clone(),
        Direction::East => squeeze_profile(base),
        Direction::West => squeeze_profile(base).flip_horizontal(),
        Direction::North => occlude_back(base),
    }
}

/// Narrow to profile width and re-pad to the full frame, keeping the
/// subject centered.
fn squeeze_profile(base: &Raster) -> Raster {
    let narrow = base.resized_nearest(PROFILE_W, FRAME_H);
    let mut frame = Raster::new(FRAME_W, FRAME_H);
    frame.blit(&narrow, (FRAME_W - PROFILE_W) / 2, 0);
    frame
}

/// Cheap stand-in for a true back view: darken and desaturate slightly,
/// then draw a small dark rectangle over the upper-back region.
fn occlude_back(base: &Raster) -> Raster {
    let mut frame = base.clone();
    for px in frame.data.chunks_exact_mut(4) {
        if px[3] == 0 {
            continue;
        }
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        for (c, v) in px.iter_mut().zip([r, g, b]) {
            let desat = luma + (v - luma) * NORTH_SATURATION;
            *c = (desat * NORTH_BRIGHTNESS).round().clamp(0.0, 255.0) as u8;
        }
    }

    if let Some(bbox) = frame.alpha_bbox(0) {
        let (w, h) = (bbox.w as f32, bbox.h as f32);
        let x0 = bbox.min_x + (w * OCCLUSION_X_FRAC.0) as u32;
        let x1 = bbox.min_x + (w * OCCLUSION_X_FRAC.1) as u32;
        let y0 = bbox.min_y + (h * OCCLUSION_Y_FRAC.0) as u32;
        let y1 = bbox.min_y + (h * OCCLUSION_Y_FRAC.1) as u32;
        for y in y0..y1.min(frame.height) {
            for x in x0..x1.min(frame.width) {
                frame.put(x, y, OCCLUSION_RGBA);
            }
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_frame() -> Raster {
        let mut canvas = Raster::new(128, 128);
        for y in 20..116 {
            for x in 40..88 {
                canvas.put(x, y, [120, 180, 90, 255]);
            }
        }
        let bbox = canvas.alpha_bbox(24).unwrap();
        frame_base(&canvas, bbox)
    }

    #[test]
    fn frame_base_is_bottom_anchored_and_frame_sized() {
        let frame = base_frame();
        assert_eq!((frame.width, frame.height), (FRAME_W, FRAME_H));
        let bbox = frame.alpha_bbox(0).unwrap();
        assert_eq!(bbox.max_y(), FRAME_H - 1);
        // 48x96 subject scales by 0.5 into a 24x48 column, centered.
        assert_eq!((bbox.min_x, bbox.w), (4, 24));
    }

    #[test]
    fn south_pose_is_identity() {
        let frame = base_frame();
        assert_eq!(pose_direction(&frame, Direction::South), frame);
    }

    #[test]
    fn east_west_poses_mirror_each_other() {
        let frame = base_frame();
        let east = pose_direction(&frame, Direction::East);
        let west = pose_direction(&frame, Direction::West);
        assert_eq!(east.flip_horizontal(), west);
        let bbox = east.alpha_bbox(0).unwrap();
        assert!(bbox.w <= PROFILE_W);
    }

    #[test]
    fn north_pose_darkens_and_occludes() {
        let frame = base_frame();
        let north = pose_direction(&frame, Direction::North);
        assert_eq!(north.alpha_bbox(0), frame.alpha_bbox(0));
        // Outside the occlusion rectangle pixels are dimmed, not recolored.
        let bbox = frame.alpha_bbox(0).unwrap();
        let sample = north.get(bbox.min_x, bbox.max_y());
        let original = frame.get(bbox.min_x, bbox.max_y());
        assert!(sample[0] < original[0]);
        assert!(sample[1] < original[1]);
        // Inside the rectangle the occlusion color wins.
        let cx = bbox.min_x + bbox.w / 2;
        let cy = bbox.min_y + bbox.h / 5;
        assert_eq!(north.get(cx, cy), OCCLUSION_RGBA);
    }
}
