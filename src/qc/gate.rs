use crate::animate::{AnimFrame, Clip, DirectionSet};
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::{BBox, Raster};
use crate::normalize::coverage;

/// Coverage value that saturates silhouette integrity at 1.0.
const SILHOUETTE_NORM: f32 = 0.42;

/// Hard rejection floor for silhouette integrity.
const SILHOUETTE_MIN: f32 = 0.35;

/// Bottom row at or below which the subject counts as fully grounded.
const GROUNDED_BOTTOM: u32 = 112;

/// Hard rejection ceiling for inter-frame centroid jitter, pixels.
const JITTER_MAX_PX: f32 = 7.5;

/// Jitter value that zeroes the jitter score term.
const JITTER_NORM_PX: f32 = 6.0;

/// Hard rejection ceiling for palette drift.
const DRIFT_MAX: f32 = 0.14;

/// Drift value that zeroes the drift score term.
const DRIFT_NORM: f32 = 0.18;

/// Quality-control scores for one generation run. Persisted as
/// `stages/qc.json` once the gate passes.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcReport {
    /// Subject size relative to canvas, saturated at 1.0.
    pub silhouette_integrity: f32,
    /// 1.0 when the subject reaches the canvas floor, else 0.5.
    pub grounded: f32,
    /// Worst per-axis alpha-weighted centroid delta between consecutive
    /// frames of any sequence.
    pub temporal_jitter_px: f32,
    /// Worst normalized L1 mean-RGB distance between a frame and its
    /// sequence's first frame.
    pub palette_drift: f32,
    /// Weighted aggregate score.
    pub score: f32,
}

/// Compute the quality report over the normalized box and every generated
/// frame sequence.
#[tracing::instrument(skip(bbox, sets))]
pub fn evaluate(bbox: BBox, sets: &[DirectionSet]) -> QcReport {
    let silhouette_integrity = (coverage(bbox) / SILHOUETTE_NORM).min(1.0);
    let grounded = if bbox.max_y() >= GROUNDED_BOTTOM {
        1.0
    } else {
        0.5
    };

    let mut temporal_jitter_px = 0.0f32;
    let mut palette_drift = 0.0f32;
    for set in sets {
        for clip in Clip::ALL {
            let frames = set.frames(clip);
            temporal_jitter_px = temporal_jitter_px.max(sequence_jitter(frames));
            palette_drift = palette_drift.max(sequence_drift(frames));
        }
    }

    let score = 0.55 * silhouette_integrity
        + 0.15 * grounded
        + 0.15 * (1.0 - temporal_jitter_px / JITTER_NORM_PX).max(0.0)
        + 0.15 * (1.0 - palette_drift / DRIFT_NORM).max(0.0);
    QcReport {
        silhouette_integrity,
        grounded,
        temporal_jitter_px,
        palette_drift,
        score,
    }
}

/// Apply the hard rejection thresholds. Failures are terminal, never retried.
pub fn enforce(report: &QcReport) -> SpriteResult<()> {
    if report.silhouette_integrity < SILHOUETTE_MIN {
        return Err(SpriteError::QcSilhouetteLow {
            score: report.silhouette_integrity,
            min: SILHOUETTE_MIN,
        });
    }
    if report.temporal_jitter_px > JITTER_MAX_PX {
        return Err(SpriteError::QcTemporalJitter {
            jitter: report.temporal_jitter_px,
            max: JITTER_MAX_PX,
        });
    }
    if report.palette_drift > DRIFT_MAX {
        return Err(SpriteError::QcPaletteDrift {
            drift: report.palette_drift,
            max: DRIFT_MAX,
        });
    }
    Ok(())
}

/// Max absolute per-axis change of the alpha-weighted centroid between
/// consecutive frames.
fn sequence_jitter(frames: &[AnimFrame]) -> f32 {
    let centroids: Vec<Option<(f32, f32)>> =
        frames.iter().map(|f| centroid(&f.raster)).collect();
    let mut worst = 0.0f32;
    for pair in centroids.windows(2) {
        if let (Some(a), Some(b)) = (pair[0], pair[1]) {
            worst = worst.max((a.0 - b.0).abs()).max((a.1 - b.1).abs());
        }
    }
    worst
}

/// Max normalized L1 distance of the opaque-pixel mean RGB from the first
/// frame of the sequence.
fn sequence_drift(frames: &[AnimFrame]) -> f32 {
    let means: Vec<Option<[f32; 3]>> = frames.iter().map(|f| mean_rgb(&f.raster)).collect();
    let Some(Some(first)) = means.first().copied() else {
        return 0.0;
    };
    let mut worst = 0.0f32;
    for mean in means.iter().flatten() {
        let l1: f32 = first
            .iter()
            .zip(mean.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        worst = worst.max(l1 / (3.0 * 255.0));
    }
    worst
}

fn centroid(r: &Raster) -> Option<(f32, f32)> {
    let (mut sx, mut sy, mut sa) = (0.0f64, 0.0f64, 0.0f64);
    for y in 0..r.height {
        for x in 0..r.width {
            let a = f64::from(r.get(x, y)[3]);
            sx += a * f64::from(x);
            sy += a * f64::from(y);
            sa += a;
        }
    }
    (sa > 0.0).then(|| ((sx / sa) as f32, (sy / sa) as f32))
}

fn mean_rgb(r: &Raster) -> Option<[f32; 3]> {
    let (mut sr, mut sg, mut sb, mut n) = (0.0f64, 0.0f64, 0.0f64, 0u64);
    for px in r.data.chunks_exact(4) {
        if px[3] > 0 {
            sr += f64::from(px[0]);
            sg += f64::from(px[1]);
            sb += f64::from(px[2]);
            n += 1;
        }
    }
    (n > 0).then(|| {
        [
            (sr / n as f64) as f32,
            (sg / n as f64) as f32,
            (sb / n as f64) as f32,
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animate::{Direction, FrameAnchors};
    use crate::foundation::raster::Point;

    fn frame_with_block(x0: u32, color: [u8; 4]) -> AnimFrame {
        let mut r = Raster::new(32, 48);
        for y in 10..40 {
            for x in x0..x0 + 8 {
                r.put(x, y, color);
            }
        }
        AnimFrame {
            raster: r,
            anchors: FrameAnchors {
                hand_l: Point::new(0.0, 0.0),
                hand_r: Point::new(0.0, 0.0),
                head: Point::new(0.0, 0.0),
            },
        }
    }

    fn single_set(idle: Vec<AnimFrame>, walk: Vec<AnimFrame>) -> Vec<DirectionSet> {
        vec![DirectionSet {
            direction: Direction::South,
            idle,
            walk,
        }]
    }

    fn grounded_box(area_side: u32) -> BBox {
        BBox {
            min_x: 10,
            min_y: 120 - area_side,
            w: area_side,
            h: area_side,
        }
    }

    #[test]
    fn silhouette_saturates_at_one() {
        // 90x90 box: coverage 0.494 > 0.42.
        let report = evaluate(
            BBox {
                min_x: 0,
                min_y: 30,
                w: 90,
                h: 90,
            },
            &single_set(vec![], vec![]),
        );
        assert_eq!(report.silhouette_integrity, 1.0);
        assert_eq!(report.grounded, 1.0);
    }

    #[test]
    fn ungrounded_subjects_score_half() {
        let report = evaluate(
            BBox {
                min_x: 0,
                min_y: 20,
                w: 80,
                h: 80,
            },
            &single_set(vec![], vec![]),
        );
        // Bottom row 99 < 112.
        assert_eq!(report.grounded, 0.5);
    }

    #[test]
    fn jitter_tracks_centroid_movement() {
        let frames = vec![
            frame_with_block(4, [100, 100, 100, 255]),
            frame_with_block(12, [100, 100, 100, 255]),
        ];
        let report = evaluate(grounded_box(90), &single_set(vec![], frames));
        assert!((report.temporal_jitter_px - 8.0).abs() < 1e-3);
        assert!(matches!(
            enforce(&report),
            Err(SpriteError::QcTemporalJitter { .. })
        ));
    }

    #[test]
    fn drift_tracks_palette_change_from_first_frame() {
        let frames = vec![
            frame_with_block(4, [100, 100, 100, 255]),
            frame_with_block(4, [200, 100, 100, 255]),
        ];
        let report = evaluate(grounded_box(90), &single_set(frames, vec![]));
        assert!((report.palette_drift - 100.0 / 765.0).abs() < 1e-4);
        assert!(enforce(&report).is_ok());
    }

    #[test]
    fn small_silhouettes_are_rejected_first() {
        // 20x70 box: coverage 0.0854, integrity 0.203 < 0.35.
        let report = evaluate(
            BBox {
                min_x: 50,
                min_y: 50,
                w: 20,
                h: 70,
            },
            &single_set(vec![], vec![]),
        );
        assert!(matches!(
            enforce(&report),
            Err(SpriteError::QcSilhouetteLow { .. })
        ));
    }

    #[test]
    fn steady_sequences_pass_with_high_score() {
        let frames = vec![
            frame_with_block(10, [90, 120, 150, 255]),
            frame_with_block(10, [90, 120, 150, 255]),
        ];
        let report = evaluate(grounded_box(90), &single_set(frames.clone(), frames));
        assert_eq!(report.temporal_jitter_px, 0.0);
        assert_eq!(report.palette_drift, 0.0);
        assert!(enforce(&report).is_ok());
        assert!((report.score - 1.0).abs() < 1e-6);
    }
}
