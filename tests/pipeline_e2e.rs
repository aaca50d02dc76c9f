use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use spriteforge::{
    AtlasMetadata, EnqueueOptions, PipelineOptions, PipelineService, RunStatus, Stage, sha256_hex,
};

const WAIT: Duration = Duration::from_secs(60);

fn temp_root(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "spriteforge_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// A full-body two-tone subject on a transparent background: head band over
/// a torso column, reaching the canvas floor region.
fn body_photo() -> Vec<u8> {
    let mut img = image::RgbaImage::from_pixel(128, 128, image::Rgba([0, 0, 0, 0]));
    for y in 22..112 {
        for x in 44..84 {
            let color = if y < 40 {
                [120, 80, 60, 255]
            } else {
                [200, 30, 40, 255]
            };
            img.put_pixel(x, y, image::Rgba(color));
        }
    }
    encode_png(&img)
}

/// Tall enough and grounded, but far too thin to pass the silhouette gate.
fn thin_photo() -> Vec<u8> {
    let mut img = image::RgbaImage::from_pixel(128, 128, image::Rgba([0, 0, 0, 0]));
    for y in 22..112 {
        for x in 63..65 {
            img.put_pixel(x, y, image::Rgba([200, 30, 40, 255]));
        }
    }
    encode_png(&img)
}

/// A 50px-tall subject: not a full body.
fn short_photo() -> Vec<u8> {
    let mut img = image::RgbaImage::from_pixel(128, 128, image::Rgba([0, 0, 0, 0]));
    for y in 60..110 {
        for x in 40..90 {
            img.put_pixel(x, y, image::Rgba([90, 140, 60, 255]));
        }
    }
    encode_png(&img)
}

fn transparent_photo() -> Vec<u8> {
    encode_png(&image::RgbaImage::from_pixel(
        128,
        128,
        image::Rgba([0, 0, 0, 0]),
    ))
}

fn png_dims(path: &std::path::Path) -> (u32, u32) {
    let img = image::open(path).unwrap();
    (img.width(), img.height())
}

#[test]
fn completed_run_publishes_the_full_package() {
    let root = temp_root("publish");
    let svc = PipelineService::new(PipelineOptions::new(&root));
    let receipt = svc.enqueue("session-a", &body_photo(), "image/png").unwrap();
    assert!(!receipt.reused);
    assert_eq!(receipt.avatar.status, RunStatus::Queued);

    let avatar = svc.wait_terminal(&receipt.avatar.id, WAIT).unwrap();
    assert_eq!(avatar.status, RunStatus::Completed);
    assert_eq!(avatar.stage, Stage::Qc);
    let pkg = avatar.package.expect("completed avatar carries a package");

    // Atlas geometry is fixed: 8 cols x 32px, 8 rows x 48px, 2x doubled.
    let atlas_path = svc.resolve_asset_path(&avatar.id, "atlas").unwrap();
    let atlas2x_path = svc.resolve_asset_path(&avatar.id, "atlas2x").unwrap();
    assert_eq!(png_dims(&atlas_path), (256, 384));
    assert_eq!(png_dims(&atlas2x_path), (512, 768));

    // Package hashes match the persisted bytes.
    let atlas_bytes = std::fs::read(&atlas_path).unwrap();
    assert_eq!(pkg.hashes.atlas, sha256_hex(&atlas_bytes));
    assert_eq!(pkg.hashes.source, avatar.source_sha256);

    // Metadata document shape.
    let meta_path = svc.resolve_asset_path(&avatar.id, "metadata").unwrap();
    let meta: AtlasMetadata =
        serde_json::from_slice(&std::fs::read(&meta_path).unwrap()).unwrap();
    assert_eq!(meta.clips.walk.south.len(), 8);
    for rect in &meta.clips.walk.south {
        assert_eq!((rect.w, rect.h), (32, 48));
    }
    assert_eq!(meta.clips.idle.north.len(), 2);
    assert_eq!(meta.anchors.walk.east.len(), 8);

    // Every published file exists, previews included.
    for kind in ["atlas", "atlas2x", "metadata", "stage:normalized", "stage:keypoints",
        "stage:rig", "stage:qc"]
    {
        let path = svc.resolve_asset_path(&avatar.id, kind).unwrap();
        assert!(path.is_file(), "missing {kind}");
    }
    for name in ["left", "right", "towards_camera", "away_from_camera", "south", "north"] {
        let path = svc
            .resolve_asset_path(&avatar.id, &format!("preview:{name}"))
            .unwrap();
        assert!(path.is_file(), "missing preview {name}");
        assert_eq!(png_dims(&path), (64, 48));
    }

    let stats = svc.stats();
    assert_eq!(stats.full_runs, 1);
    assert_eq!(stats.cache_hits, 0);

    let payload = svc.package_payload(&avatar.id).unwrap();
    assert_eq!(payload["status"], "completed");
    assert_eq!(payload["assets"]["previews"]["left"],
        format!("/avatars/{}/preview/walk_left.png", avatar.id));

    drop(svc);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn byte_identical_sources_render_byte_identical_artifacts() {
    let (root_a, root_b) = (temp_root("det_a"), temp_root("det_b"));
    let photo = body_photo();

    let read_artifacts = |root: &PathBuf, session: &str| {
        let svc = PipelineService::new(PipelineOptions::new(root));
        let receipt = svc.enqueue(session, &photo, "image/png").unwrap();
        let avatar = svc.wait_terminal(&receipt.avatar.id, WAIT).unwrap();
        assert_eq!(avatar.status, RunStatus::Completed);
        let read = |kind: &str| {
            std::fs::read(svc.resolve_asset_path(&avatar.id, kind).unwrap()).unwrap()
        };
        (read("atlas"), read("atlas2x"), read("metadata"))
    };

    let a = read_artifacts(&root_a, "session-one");
    let b = read_artifacts(&root_b, "session-two");
    assert_eq!(a.0, b.0, "atlas.png differs");
    assert_eq!(a.1, b.1, "atlas@2x.png differs");
    assert_eq!(a.2, b.2, "atlas.json differs");

    std::fs::remove_dir_all(&root_a).ok();
    std::fs::remove_dir_all(&root_b).ok();
}

#[test]
fn same_session_resubmission_reuses_the_avatar() {
    let root = temp_root("dedup");
    let svc = PipelineService::new(PipelineOptions::new(&root));
    let photo = body_photo();

    let first = svc.enqueue("session-a", &photo, "image/png").unwrap();
    svc.wait_terminal(&first.avatar.id, WAIT).unwrap();

    let second = svc.enqueue("session-a", &photo, "image/png").unwrap();
    assert!(second.reused);
    assert_eq!(second.avatar.id, first.avatar.id);
    assert_eq!(second.job.id, first.job.id);
    assert_eq!(second.avatar.status, RunStatus::Completed);
    assert_eq!(svc.stats().full_runs, 1);

    drop(svc);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn second_session_is_served_from_the_artifact_cache() {
    let root = temp_root("cache");
    let svc = PipelineService::new(PipelineOptions::new(&root));
    let photo = body_photo();

    let a = svc.enqueue("session-a", &photo, "image/png").unwrap();
    svc.wait_terminal(&a.avatar.id, WAIT).unwrap();

    let b = svc.enqueue("session-b", &photo, "image/png").unwrap();
    assert!(!b.reused);
    assert_ne!(b.avatar.id, a.avatar.id);
    let avatar_b = svc.wait_terminal(&b.avatar.id, WAIT).unwrap();
    assert_eq!(avatar_b.status, RunStatus::Completed);
    assert!(avatar_b.package.is_some());

    let stats = svc.stats();
    assert_eq!(stats.full_runs, 1);
    assert_eq!(stats.cache_hits, 1);

    drop(svc);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn on_disk_artifacts_survive_a_process_restart() {
    let root = temp_root("restart");
    let photo = body_photo();

    {
        let svc = PipelineService::new(PipelineOptions::new(&root));
        let receipt = svc.enqueue("session-a", &photo, "image/png").unwrap();
        let avatar = svc.wait_terminal(&receipt.avatar.id, WAIT).unwrap();
        assert_eq!(avatar.status, RunStatus::Completed);
    }

    // New service, empty memory, same artifact root: the worker rebuilds the
    // package from disk without re-running normalize/render.
    let svc = PipelineService::new(PipelineOptions::new(&root));
    let receipt = svc.enqueue("session-c", &photo, "image/png").unwrap();
    let avatar = svc.wait_terminal(&receipt.avatar.id, WAIT).unwrap();
    assert_eq!(avatar.status, RunStatus::Completed);
    let pkg = avatar.package.unwrap();
    assert!(pkg.paths.atlas.is_file());

    let stats = svc.stats();
    assert_eq!(stats.full_runs, 0, "pipeline re-ran despite complete slot");
    assert_eq!(stats.disk_rehydrations, 1);

    drop(svc);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn injected_fault_is_retried_exactly_once() {
    let root = temp_root("retry");
    let svc = PipelineService::new(PipelineOptions::new(&root));
    let receipt = svc
        .enqueue_with(
            "session-a",
            &body_photo(),
            "image/png",
            EnqueueOptions {
                inject_fail_once: true,
            },
        )
        .unwrap();

    let avatar = svc.wait_terminal(&receipt.avatar.id, WAIT).unwrap();
    assert_eq!(avatar.status, RunStatus::Completed);

    let job = svc.job(&receipt.job.id).unwrap();
    assert_eq!(job.attempts, 2);
    assert_eq!(job.status, RunStatus::Completed);
    assert_eq!(svc.stats().full_runs, 2);

    drop(svc);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn content_rejections_are_terminal_and_coded() {
    let root = temp_root("reject");
    let svc = PipelineService::new(PipelineOptions::new(&root));

    let cases: [(Vec<u8>, &str, Stage); 3] = [
        (transparent_photo(), "NO_FOREGROUND", Stage::Normalize),
        (short_photo(), "FULL_BODY_REQUIRED", Stage::Normalize),
        (thin_photo(), "QC_SILHOUETTE_LOW", Stage::Qc),
    ];
    for (i, (photo, code, stage)) in cases.iter().enumerate() {
        let session = format!("session-{i}");
        let receipt = svc.enqueue(&session, photo, "image/png").unwrap();
        let avatar = svc.wait_terminal(&receipt.avatar.id, WAIT).unwrap();
        assert_eq!(avatar.status, RunStatus::Failed, "case {code}");
        assert_eq!(avatar.error_code.as_deref(), Some(*code));
        assert_eq!(avatar.stage, *stage, "case {code}");

        let job = svc.job(&receipt.job.id).unwrap();
        assert_eq!(job.status, RunStatus::Failed);
        assert_eq!(job.error_code.as_deref(), Some(*code));
        assert_eq!(job.attempts, 1, "terminal failures are never retried");
    }

    drop(svc);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn failed_content_is_reported_on_resubmission() {
    let root = temp_root("failed_resubmit");
    let svc = PipelineService::new(PipelineOptions::new(&root));
    let photo = thin_photo();

    let first = svc.enqueue("session-a", &photo, "image/png").unwrap();
    let avatar = svc.wait_terminal(&first.avatar.id, WAIT).unwrap();
    assert_eq!(avatar.status, RunStatus::Failed);

    let second = svc.enqueue("session-a", &photo, "image/png").unwrap();
    assert!(second.reused);
    assert_eq!(second.avatar.status, RunStatus::Failed);
    assert_eq!(second.avatar.error_code.as_deref(), Some("QC_SILHOUETTE_LOW"));

    let payload = svc.preview_payload(&second.avatar.id).unwrap();
    assert_eq!(payload["status"], "failed");
    assert_eq!(payload["errorCode"], "QC_SILHOUETTE_LOW");
    assert!(payload.get("previews").is_none());

    drop(svc);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn reset_state_clears_memory_and_disk() {
    let root = temp_root("reset");
    let svc = PipelineService::new(PipelineOptions::new(&root));
    let receipt = svc.enqueue("session-a", &body_photo(), "image/png").unwrap();
    svc.wait_terminal(&receipt.avatar.id, WAIT).unwrap();
    assert!(root.exists());

    svc.reset_state();
    assert!(svc.avatar(&receipt.avatar.id).is_none());
    assert!(!root.exists());
    assert_eq!(svc.stats().full_runs, 0);

    drop(svc);
    std::fs::remove_dir_all(&root).ok();
}
