use std::io::Cursor;

use anyhow::Context as _;
use image::ImageDecoder as _;

use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::hash::sha256_hex;
use crate::foundation::raster::{BBox, Raster, l1_rgb};

/// Side of the square working canvas every source is resampled into.
pub const WORK_CANVAS: u32 = 128;

/// Maximum accepted source payload size.
pub const MAX_SOURCE_BYTES: usize = 5 * 1024 * 1024;

/// Alpha threshold for the foreground bounding box.
pub const BBOX_ALPHA_MIN: u8 = 24;

/// Corner pixels must agree within this L1 distance of their mean before the
/// mean is trusted as a background estimate.
const CORNER_AGREEMENT_L1: u32 = 30;

/// L1 color distance gate for the border flood fill.
const BG_FLOOD_L1: u32 = 36;

/// Pixels below this alpha are cleared outright.
const CLEAR_ALPHA_BELOW: u8 = 10;

/// Pixels with all channels above this are treated as cutout residue.
const CLEAR_WHITE_ABOVE: u8 = 245;

/// Minimum foreground box height for a full-body subject.
const MIN_BODY_HEIGHT: u32 = 70;

/// The foreground box bottom row must reach at least this far down.
const MIN_BODY_BOTTOM: u32 = 108;

/// Result of the normalization stage.
#[derive(Clone, Debug)]
pub struct Normalized {
    /// The 128x128 working canvas after background removal.
    pub raster: Raster,
    /// PNG encoding of the working canvas (the persisted stage artifact).
    pub png: Vec<u8>,
    /// SHA-256 of the PNG bytes.
    pub sha256: String,
    /// Foreground bounding box at alpha > 24.
    pub bbox: BBox,
}

/// Foreground coverage of the working canvas, `area / 16384`.
pub fn coverage(bbox: BBox) -> f32 {
    bbox.area() as f32 / (WORK_CANVAS * WORK_CANVAS) as f32
}

/// Enqueue-time payload validation. Never enters the job queue on failure.
pub fn validate_submission(bytes: &[u8], mime: &str) -> SpriteResult<()> {
    if bytes.is_empty() {
        return Err(SpriteError::MissingImage);
    }
    if bytes.len() > MAX_SOURCE_BYTES {
        return Err(SpriteError::ImageTooLarge {
            got: bytes.len(),
            limit: MAX_SOURCE_BYTES,
        });
    }
    let subtype = mime.trim().to_ascii_lowercase();
    let subtype = subtype.strip_prefix("image/").unwrap_or(&subtype);
    match subtype {
        "png" | "jpeg" | "jpg" | "webp" => Ok(()),
        _ => Err(SpriteError::UnsupportedMediaType(mime.to_string())),
    }
}

/// Normalize raw source bytes into the working canvas.
///
/// Decodes (honoring embedded EXIF orientation), letterboxes into the
/// transparent 128x128 canvas with nearest-neighbor resampling, removes the
/// estimated background, and validates that a full-body foreground subject
/// remains.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn normalize_source(bytes: &[u8], mime: &str) -> SpriteResult<Normalized> {
    validate_submission(bytes, mime)?;

    let rgba = decode_oriented_rgba(bytes)?;
    let mut canvas = letterbox(&rgba);
    remove_background(&mut canvas);

    let bbox = canvas
        .alpha_bbox(BBOX_ALPHA_MIN)
        .ok_or(SpriteError::NoForeground)?;
    if bbox.h < MIN_BODY_HEIGHT {
        return Err(SpriteError::FullBodyRequired(format!(
            "subject height {}px is below the {MIN_BODY_HEIGHT}px minimum",
            bbox.h
        )));
    }
    if bbox.max_y() < MIN_BODY_BOTTOM {
        return Err(SpriteError::FullBodyRequired(format!(
            "subject bottom row {} does not reach the canvas floor (y >= {MIN_BODY_BOTTOM})",
            bbox.max_y()
        )));
    }

    let png = canvas.encode_png()?;
    let sha256 = sha256_hex(&png);
    tracing::debug!(w = bbox.w, h = bbox.h, coverage = coverage(bbox), "normalized source");
    Ok(Normalized {
        raster: canvas,
        png,
        sha256,
        bbox,
    })
}

fn decode_oriented_rgba(bytes: &[u8]) -> SpriteResult<image::RgbaImage> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("sniff image container")?;
    let mut decoder = reader.into_decoder().context("decode source image")?;
    let orientation = decoder
        .orientation()
        .unwrap_or(image::metadata::Orientation::NoTransforms);
    let mut img = image::DynamicImage::from_decoder(decoder).context("decode source image")?;
    img.apply_orientation(orientation);
    Ok(img.to_rgba8())
}

/// Fit the source into the working canvas, centered, transparency-padded.
/// Nearest-neighbor keeps hard pixel edges intact.
fn letterbox(src: &image::RgbaImage) -> Raster {
    let (sw, sh) = src.dimensions();
    let scale = (WORK_CANVAS as f32 / sw as f32).min(WORK_CANVAS as f32 / sh as f32);
    let tw = ((sw as f32 * scale).round() as u32).clamp(1, WORK_CANVAS);
    let th = ((sh as f32 * scale).round() as u32).clamp(1, WORK_CANVAS);
    let scaled = Raster::from_rgba_image(image::imageops::resize(
        src,
        tw,
        th,
        image::imageops::FilterType::Nearest,
    ));

    let mut canvas = Raster::new(WORK_CANVAS, WORK_CANVAS);
    canvas.blit(&scaled, (WORK_CANVAS - tw) / 2, (WORK_CANVAS - th) / 2);
    canvas
}

/// Background estimate + removal over the working canvas.
fn remove_background(canvas: &mut Raster) {
    let far = WORK_CANVAS - 1;
    let corners = [
        canvas.get(0, 0),
        canvas.get(far, 0),
        canvas.get(0, far),
        canvas.get(far, far),
    ];
    let mean = [
        (corners.iter().map(|c| u32::from(c[0])).sum::<u32>() / 4) as u8,
        (corners.iter().map(|c| u32::from(c[1])).sum::<u32>() / 4) as u8,
        (corners.iter().map(|c| u32::from(c[2])).sum::<u32>() / 4) as u8,
    ];
    let corners_agree = corners
        .iter()
        .all(|c| l1_rgb([c[0], c[1], c[2]], mean) <= CORNER_AGREEMENT_L1);
    if corners_agree {
        canvas.flood_fill_clear(mean, BG_FLOOD_L1);
    }

    // Near-transparent and near-white cutout residue, independent of the
    // flood fill.
    for px in canvas.data.chunks_exact_mut(4) {
        let near_white =
            px[0] > CLEAR_WHITE_ABOVE && px[1] > CLEAR_WHITE_ABOVE && px[2] > CLEAR_WHITE_ABOVE;
        if px[3] < CLEAR_ALPHA_BELOW || near_white {
            px.copy_from_slice(&[0, 0, 0, 0]);
        }
    }
}
