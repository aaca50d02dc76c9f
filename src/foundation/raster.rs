use std::io::Cursor;

use anyhow::Context as _;

use crate::foundation::error::SpriteResult;

/// 2D point in canvas pixel space (y grows downward).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    /// Horizontal coordinate in pixels.
    pub x: f32,
    /// Vertical coordinate in pixels.
    pub y: f32,
}

impl Point {
    /// Construct a point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Width/height pair used by rig descriptors and atlas metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dim {
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
}

/// Axis-aligned bounding box of opaque content, in integer pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BBox {
    /// Leftmost column containing opaque content.
    pub min_x: u32,
    /// Topmost row containing opaque content.
    pub min_y: u32,
    /// Width in pixels (>= 1).
    pub w: u32,
    /// Height in pixels (>= 1).
    pub h: u32,
}

impl BBox {
    /// Inclusive bottom row of the box.
    pub fn max_y(self) -> u32 {
        self.min_y + self.h - 1
    }

    /// Covered area in pixels.
    pub fn area(self) -> u32 {
        self.w * self.h
    }

    /// Horizontal center in continuous pixel space.
    pub fn center_x(self) -> f32 {
        self.min_x as f32 + self.w as f32 / 2.0
    }
}

/// Straight-alpha RGBA8 pixel buffer.
///
/// All pipeline raster work happens on this type; conversion to the `image`
/// crate's buffers is confined to decode, resize and PNG encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 bytes, `width * height * 4` long.
    pub data: Vec<u8>,
}

impl Raster {
    /// Fully transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    /// Wrap an `image` RGBA buffer without copying.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    /// Convert into an `image` RGBA buffer without copying.
    pub fn into_rgba_image(self) -> image::RgbaImage {
        image::RgbaImage::from_raw(self.width, self.height, self.data)
            .expect("raster buffer length matches dimensions")
    }

    fn idx(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 4
    }

    /// Read one pixel. Caller guarantees in-bounds coordinates.
    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.idx(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Write one pixel. Caller guarantees in-bounds coordinates.
    pub fn put(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = self.idx(x, y);
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Whether the pixel carries any alpha.
    pub fn is_opaque(&self, x: u32, y: u32) -> bool {
        self.get(x, y)[3] > 0
    }

    /// Bounding box of pixels with alpha strictly above `min_alpha`.
    pub fn alpha_bbox(&self, min_alpha: u8) -> Option<BBox> {
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        let mut any = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y)[3] > min_alpha {
                    any = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }
        any.then(|| BBox {
            min_x,
            min_y,
            w: max_x - min_x + 1,
            h: max_y - min_y + 1,
        })
    }

    /// Clear every pixel reachable from the canvas border whose L1 RGB
    /// distance from `reference` is at most `max_l1`.
    ///
    /// Stack-based 4-connected fill. Pixels outside the distance gate block
    /// traversal, so enclosed foreground interiors are never entered. Returns
    /// the number of pixels cleared.
    pub fn flood_fill_clear(&mut self, reference: [u8; 3], max_l1: u32) -> usize {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        let mut visited = vec![false; (self.width as usize) * (self.height as usize)];
        let mut stack: Vec<(u32, u32)> = Vec::new();
        for x in 0..self.width {
            stack.push((x, 0));
            stack.push((x, self.height - 1));
        }
        for y in 0..self.height {
            stack.push((0, y));
            stack.push((self.width - 1, y));
        }

        let mut cleared = 0usize;
        while let Some((x, y)) = stack.pop() {
            let vi = (y as usize) * (self.width as usize) + (x as usize);
            if visited[vi] {
                continue;
            }
            visited[vi] = true;

            let px = self.get(x, y);
            let dist = l1_rgb(reference, [px[0], px[1], px[2]]);
            if dist > max_l1 {
                continue;
            }
            if px != [0, 0, 0, 0] {
                self.put(x, y, [0, 0, 0, 0]);
                cleared += 1;
            }

            if x > 0 {
                stack.push((x - 1, y));
            }
            if x + 1 < self.width {
                stack.push((x + 1, y));
            }
            if y > 0 {
                stack.push((x, y - 1));
            }
            if y + 1 < self.height {
                stack.push((x, y + 1));
            }
        }
        cleared
    }

    /// Copy the box region into a new raster.
    pub fn crop(&self, bbox: BBox) -> Raster {
        let mut out = Raster::new(bbox.w, bbox.h);
        for y in 0..bbox.h {
            for x in 0..bbox.w {
                out.put(x, y, self.get(bbox.min_x + x, bbox.min_y + y));
            }
        }
        out
    }

    /// Mirror around the vertical axis.
    pub fn flip_horizontal(&self) -> Raster {
        let mut out = Raster::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.put(self.width - 1 - x, y, self.get(x, y));
            }
        }
        out
    }

    /// Nearest-neighbor resize (hard pixel edges preserved).
    pub fn resized_nearest(&self, width: u32, height: u32) -> Raster {
        let img = image::imageops::resize(
            &self.clone().into_rgba_image(),
            width,
            height,
            image::imageops::FilterType::Nearest,
        );
        Raster::from_rgba_image(img)
    }

    /// Copy `src` into `self` at `(dst_x, dst_y)`, replacing destination
    /// pixels unconditionally (atlas packing blit).
    pub fn blit(&mut self, src: &Raster, dst_x: u32, dst_y: u32) {
        for y in 0..src.height {
            for x in 0..src.width {
                let (tx, ty) = (dst_x + x, dst_y + y);
                if tx < self.width && ty < self.height {
                    self.put(tx, ty, src.get(x, y));
                }
            }
        }
    }

    /// Composite `src` over `self` with overwrite-alpha semantics: any source
    /// pixel with alpha > 0 replaces the destination pixel entirely.
    pub fn overwrite_from(&mut self, src: &Raster) {
        debug_assert_eq!((self.width, self.height), (src.width, src.height));
        for (d, s) in self.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
            if s[3] > 0 {
                d.copy_from_slice(s);
            }
        }
    }

    /// Forward-splat affine transform: rotate by `angle_rad` around `pivot`,
    /// then translate by `(dx, dy)`.
    ///
    /// Each opaque source pixel is mapped and rounded into the destination;
    /// out-of-canvas results are dropped. This is a source-to-destination
    /// splat, not an inverse-sampled transform, so small transparent holes
    /// after rotation are an accepted artifact the quality thresholds were
    /// tuned against.
    pub fn splat_transform(&self, angle_rad: f32, pivot: Point, dx: i32, dy: i32) -> Raster {
        let mut out = Raster::new(self.width, self.height);
        let (sin, cos) = angle_rad.sin_cos();
        for y in 0..self.height {
            for x in 0..self.width {
                let px = self.get(x, y);
                if px[3] == 0 {
                    continue;
                }
                let (tx, ty) = transform_coords(x as f32, y as f32, sin, cos, pivot, dx, dy);
                if tx >= 0 && ty >= 0 && (tx as u32) < out.width && (ty as u32) < out.height {
                    out.put(tx as u32, ty as u32, px);
                }
            }
        }
        out
    }

    /// Encode to PNG bytes in memory.
    pub fn encode_png(&self) -> SpriteResult<Vec<u8>> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(self.clone().into_rgba_image())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .context("encode raster as png")?;
        Ok(buf)
    }

    /// Count of pixels with alpha > 0.
    pub fn opaque_count(&self) -> usize {
        self.data.chunks_exact(4).filter(|px| px[3] > 0).count()
    }
}

/// Map a point through the same rotation+translation a layer splat uses.
///
/// Used for anchor points so they stay attached to their transformed layer.
pub fn transform_point(p: Point, angle_rad: f32, pivot: Point, dx: i32, dy: i32) -> Point {
    let (sin, cos) = angle_rad.sin_cos();
    let (tx, ty) = transform_coords(p.x, p.y, sin, cos, pivot, dx, dy);
    Point::new(tx as f32, ty as f32)
}

fn transform_coords(
    x: f32,
    y: f32,
    sin: f32,
    cos: f32,
    pivot: Point,
    dx: i32,
    dy: i32,
) -> (i64, i64) {
    let rx = x - pivot.x;
    let ry = y - pivot.y;
    let tx = (cos * rx - sin * ry + pivot.x).round() as i64 + dx as i64;
    let ty = (sin * rx + cos * ry + pivot.y).round() as i64 + dy as i64;
    (tx, ty)
}

/// L1 distance between two RGB triples.
pub fn l1_rgb(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (i32::from(x) - i32::from(y)).unsigned_abs())
        .sum()
}

/// Squared distance from point `p` to the segment `a..b`.
pub fn point_segment_dist2(p: Point, a: Point, b: Point) -> f32 {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let (apx, apy) = (p.x - a.x, p.y - a.y);
    let len2 = abx * abx + aby * aby;
    let t = if len2 <= f32::EPSILON {
        0.0
    } else {
        ((apx * abx + apy * aby) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * abx, a.y + t * aby);
    let (dx, dy) = (p.x - cx, p.y - cy);
    dx * dx + dy * dy
}
