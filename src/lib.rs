//! Spriteforge turns one user-submitted character photo into a
//! deterministic, cacheable animated sprite package (atlas + metadata +
//! previews) for a 2D multiplayer world.
//!
//! # Pipeline overview
//!
//! 1. **Normalize**: decode, orient, letterbox into a 128x128 working canvas,
//!    remove the estimated background, validate a full-body subject
//! 2. **Rig**: synthesize the fixed 18-point pseudo-skeleton and rig
//!    descriptor from the foreground bounding box
//! 3. **Render**: segment limb layers, pose four view directions, synthesize
//!    idle/walk clips, pack the sprite sheets and metadata
//! 4. **QC**: score silhouette/grounding/jitter/palette and gate the run
//! 5. **Publish**: content-address every artifact on disk and in the cache
//!
//! The public surface is service-oriented: construct a [`PipelineService`],
//! [`PipelineService::enqueue`] source bytes per session, and poll avatar/job
//! snapshots while the single worker drains the queue.
//!
//! Key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: byte-identical source and version stamps
//!   always produce byte-identical atlases and metadata.
//! - **Forward-splat transforms**: layer rotation splats source pixels into
//!   the destination; small transparent holes are accepted and the quality
//!   thresholds are tuned against them.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod animate;
mod atlas;
mod foundation;
mod normalize;
mod qc;
mod rig;
mod segment;
mod service;

pub use animate::{
    AnimFrame, Clip, Direction, DirectionSet, FRAME_H, FRAME_W, FrameAnchors, IDLE_FRAME_MS,
    IDLE_FRAMES, WALK_FRAME_MS, WALK_FRAMES, frame_base, pose_direction, synthesize_all,
    synthesize_direction,
};
pub use atlas::{
    ATLAS_COLS, ATLAS_ROWS, AtlasBundle, AtlasMetadata, FrameRect, PREVIEW_STEMS, PerClip,
    PerDirection, Scales, assemble, preview_stem,
};
pub use foundation::error::{SpriteError, SpriteResult};
pub use foundation::hash::{artifact_key, sha256_hex};
pub use foundation::raster::{BBox, Dim, Point, Raster, l1_rgb, point_segment_dist2, transform_point};
pub use normalize::{
    BBOX_ALPHA_MIN, MAX_SOURCE_BYTES, Normalized, WORK_CANVAS, coverage, normalize_source,
    validate_submission,
};
pub use qc::{QcReport, enforce as qc_enforce, evaluate as qc_evaluate};
pub use rig::{
    Keypoint, KeypointId, KeypointSet, Rig, RigConstraints, TEMPLATE_ID, build_rig,
    synthesize_keypoints,
};
pub use segment::{ARM_RADIUS_PX, LEG_RADIUS_PX, LayerSet, Pivots, segment_limbs};
pub use service::{
    ArtifactStore, Avatar, CacheEntry, EnqueueOptions, EnqueueReceipt, Job, MAX_ATTEMPTS,
    PIPELINE_VERSION, Package, PackageHashes, PackagePaths, PipelineOptions, PipelineService,
    RunStatus, ServiceStats, Stage, TEMPLATE_VERSION,
};
