use crate::animate::{
    Clip, Direction, DirectionSet, FRAME_H, FRAME_W, FrameAnchors, WALK_FRAMES,
};
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::{Dim, Raster};

/// Atlas columns; the walk clip's frame count sets the width.
pub const ATLAS_COLS: u32 = WALK_FRAMES as u32;

/// Atlas rows: {idle, walk} x {south, east, west, north}.
pub const ATLAS_ROWS: u32 = 8;

/// Walk frame indices copied into each two-frame preview strip (the extreme
/// contact poses of the gait cycle).
const PREVIEW_FRAMES: [usize; 2] = [2, 6];

/// Preview file stems in write order: the four compass strips, then the
/// semantic copies consumed by the presentation layer.
pub const PREVIEW_STEMS: [&str; 8] = [
    "walk_south",
    "walk_east",
    "walk_west",
    "walk_north",
    "walk_left",
    "walk_right",
    "walk_towards_camera",
    "walk_away_from_camera",
];

/// Resolve a semantic preview name to its file stem.
pub fn preview_stem(name: &str) -> Option<&'static str> {
    let stem = match name {
        "left" | "walk_left" => "walk_left",
        "right" | "walk_right" => "walk_right",
        "towards_camera" | "walk_towards_camera" => "walk_towards_camera",
        "away_from_camera" | "walk_away_from_camera" => "walk_away_from_camera",
        "south" | "walk_south" => "walk_south",
        "east" | "walk_east" => "walk_east",
        "west" | "walk_west" => "walk_west",
        "north" | "walk_north" => "walk_north",
        _ => return None,
    };
    Some(stem)
}

/// One frame's placement inside the atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRect {
    /// Left edge in atlas pixels.
    pub x: u32,
    /// Top edge in atlas pixels.
    pub y: u32,
    /// Frame width.
    pub w: u32,
    /// Frame height.
    pub h: u32,
    /// Display duration in milliseconds.
    pub duration_ms: u32,
}

/// Fixed-order map over the four view directions.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PerDirection<T> {
    /// South entries.
    pub south: T,
    /// East entries.
    pub east: T,
    /// West entries.
    pub west: T,
    /// North entries.
    pub north: T,
}

impl<T> PerDirection<T> {
    /// Borrow the entry for a direction.
    pub fn get(&self, dir: Direction) -> &T {
        match dir {
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &self.west,
            Direction::North => &self.north,
        }
    }

    fn get_mut(&mut self, dir: Direction) -> &mut T {
        match dir {
            Direction::South => &mut self.south,
            Direction::East => &mut self.east,
            Direction::West => &mut self.west,
            Direction::North => &mut self.north,
        }
    }
}

impl<T: Default> Default for PerDirection<T> {
    fn default() -> Self {
        Self {
            south: T::default(),
            east: T::default(),
            west: T::default(),
            north: T::default(),
        }
    }
}

/// Fixed-order map over the two clips.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PerClip<T> {
    /// Idle entries.
    pub idle: T,
    /// Walk entries.
    pub walk: T,
}

impl<T> PerClip<T> {
    /// Borrow the entry for a clip.
    pub fn get(&self, clip: Clip) -> &T {
        match clip {
            Clip::Idle => &self.idle,
            Clip::Walk => &self.walk,
        }
    }

    fn get_mut(&mut self, clip: Clip) -> &mut T {
        match clip {
            Clip::Idle => &mut self.idle,
            Clip::Walk => &mut self.walk,
        }
    }
}

/// Output scale dimensions recorded in the metadata document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Scales {
    /// 1x sheet dimensions.
    pub x1: Dim,
    /// 2x sheet dimensions.
    pub x2: Dim,
}

/// The frame/anchor metadata document persisted as `atlas.json`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasMetadata {
    /// Metadata document format version.
    pub version: u32,
    /// Pipeline version that produced the sheet.
    pub pipeline_version: String,
    /// Template version that produced the sheet.
    pub template_version: String,
    /// Per-frame dimensions.
    pub frame: Dim,
    /// 1x sheet dimensions.
    pub atlas: Dim,
    /// Dimensions per emitted scale.
    pub scales: Scales,
    /// Ordered frame placements per clip and direction.
    pub clips: PerClip<PerDirection<Vec<FrameRect>>>,
    /// Per-frame anchors per clip and direction.
    pub anchors: PerClip<PerDirection<Vec<FrameAnchors>>>,
}

/// Everything the assembler produces for one avatar.
#[derive(Clone, Debug)]
pub struct AtlasBundle {
    /// 1x packed sheet.
    pub atlas: Raster,
    /// Nearest-neighbor 2x upscale of the whole sheet.
    pub atlas2x: Raster,
    /// Frame/anchor metadata document.
    pub metadata: AtlasMetadata,
    /// Preview strips keyed by file stem, in [`PREVIEW_STEMS`] order.
    pub previews: Vec<(&'static str, Raster)>,
}

/// Pack every generated frame into the sprite sheet and derive metadata and
/// preview strips.
#[tracing::instrument(skip(sets))]
pub fn assemble(
    sets: &[DirectionSet],
    pipeline_version: &str,
    template_version: &str,
) -> SpriteResult<AtlasBundle> {
    let atlas_dim = Dim {
        w: ATLAS_COLS * FRAME_W,
        h: ATLAS_ROWS * FRAME_H,
    };
    let mut atlas = Raster::new(atlas_dim.w, atlas_dim.h);
    let mut clips: PerClip<PerDirection<Vec<FrameRect>>> = PerClip::default();
    let mut anchors: PerClip<PerDirection<Vec<FrameAnchors>>> = PerClip::default();

    for (clip_row, clip) in Clip::ALL.iter().enumerate() {
        for (dir_row, dir) in Direction::ALL.iter().enumerate() {
            let set = sets
                .iter()
                .find(|s| s.direction == *dir)
                .ok_or_else(|| SpriteError::failed(format!("missing {} frames", dir.as_str())))?;
            let row = (clip_row * Direction::ALL.len() + dir_row) as u32;
            let frames = set.frames(*clip);
            let rects = clips.get_mut(*clip).get_mut(*dir);
            let anchor_list = anchors.get_mut(*clip).get_mut(*dir);
            for (col, frame) in frames.iter().enumerate() {
                let (x, y) = (col as u32 * FRAME_W, row * FRAME_H);
                atlas.blit(&frame.raster, x, y);
                rects.push(FrameRect {
                    x,
                    y,
                    w: FRAME_W,
                    h: FRAME_H,
                    duration_ms: clip.frame_ms(),
                });
                anchor_list.push(frame.anchors);
            }
        }
    }

    let atlas2x = atlas.resized_nearest(atlas_dim.w * 2, atlas_dim.h * 2);
    let metadata = AtlasMetadata {
        version: 1,
        pipeline_version: pipeline_version.to_string(),
        template_version: template_version.to_string(),
        frame: Dim {
            w: FRAME_W,
            h: FRAME_H,
        },
        atlas: atlas_dim,
        scales: Scales {
            x1: atlas_dim,
            x2: Dim {
                w: atlas_dim.w * 2,
                h: atlas_dim.h * 2,
            },
        },
        clips,
        anchors,
    };

    let previews = build_previews(sets)?;
    Ok(AtlasBundle {
        atlas,
        atlas2x,
        metadata,
        previews,
    })
}

/// Two-frame walk strips per direction, plus the semantic copies:
/// left <- west, right <- east, towards_camera <- south,
/// away_from_camera <- north.
fn build_previews(sets: &[DirectionSet]) -> SpriteResult<Vec<(&'static str, Raster)>> {
    let strip_for = |dir: Direction| -> SpriteResult<Raster> {
        let set = sets
            .iter()
            .find(|s| s.direction == dir)
            .ok_or_else(|| SpriteError::failed(format!("missing {} frames", dir.as_str())))?;
        let mut strip = Raster::new(FRAME_W * PREVIEW_FRAMES.len() as u32, FRAME_H);
        for (slot, &idx) in PREVIEW_FRAMES.iter().enumerate() {
            let frame = set.walk.get(idx).ok_or_else(|| {
                SpriteError::failed(format!("walk frame {idx} missing for preview strip"))
            })?;
            strip.blit(&frame.raster, slot as u32 * FRAME_W, 0);
        }
        Ok(strip)
    };

    let south = strip_for(Direction::South)?;
    let east = strip_for(Direction::East)?;
    let west = strip_for(Direction::West)?;
    let north = strip_for(Direction::North)?;
    Ok(vec![
        ("walk_south", south.clone()),
        ("walk_east", east.clone()),
        ("walk_west", west.clone()),
        ("walk_north", north.clone()),
        ("walk_left", west),
        ("walk_right", east),
        ("walk_towards_camera", south),
        ("walk_away_from_camera", north),
    ])
}
