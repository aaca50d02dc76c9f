use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Condvar, Mutex};
use serde_json::json;

use crate::animate::{frame_base, synthesize_all};
use crate::atlas;
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::hash::{artifact_key, sha256_hex};
use crate::normalize::{normalize_source, validate_submission};
use crate::qc;
use crate::rig::{build_rig, synthesize_keypoints};
use crate::service::model::{
    Avatar, CacheEntry, Job, MAX_ATTEMPTS, PIPELINE_VERSION, Package, PackageHashes, RunStatus,
    Stage, TEMPLATE_VERSION,
};
use crate::service::store::ArtifactStore;

/// Service construction options.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// Root directory of the content-addressed artifact store.
    pub artifact_root: PathBuf,
    /// Pipeline version stamp baked into artifact keys and packages.
    pub pipeline_version: String,
    /// Template version stamp baked into artifact keys and packages.
    pub template_version: String,
    /// Attempt ceiling for transient failures.
    pub max_attempts: u32,
}

impl PipelineOptions {
    /// Options with production version stamps rooted at `artifact_root`.
    pub fn new(artifact_root: impl Into<PathBuf>) -> Self {
        Self {
            artifact_root: artifact_root.into(),
            pipeline_version: PIPELINE_VERSION.to_string(),
            template_version: TEMPLATE_VERSION.to_string(),
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Per-submission options; `Default` for production callers.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnqueueOptions {
    /// Test-only fault injector: the job's first execution fails with
    /// `PIPELINE_FAILED`.
    pub inject_fail_once: bool,
}

/// What `enqueue` hands back: snapshots plus whether an existing avatar was
/// reused for this (session, content) identity.
#[derive(Clone, Debug)]
pub struct EnqueueReceipt {
    /// Avatar snapshot at enqueue time.
    pub avatar: Avatar,
    /// Job snapshot at enqueue time.
    pub job: Job,
    /// True when the session already held this artifact key.
    pub reused: bool,
}

/// Worker counters, observable for tests and diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    /// Full pipeline executions (attempts), including failed ones.
    pub full_runs: u64,
    /// Jobs satisfied from the in-memory artifact cache.
    pub cache_hits: u64,
    /// Jobs satisfied by rebuilding a package from on-disk artifacts.
    pub disk_rehydrations: u64,
}

struct State {
    avatars: HashMap<String, Avatar>,
    jobs: HashMap<String, Job>,
    /// (session, artifact key) -> (avatar id, job id).
    session_index: HashMap<(String, String), (String, String)>,
    cache: HashMap<String, CacheEntry>,
    queue: VecDeque<String>,
    stats: ServiceStats,
    next_avatar: u64,
    next_job: u64,
    shutdown: bool,
}

impl State {
    fn new() -> Self {
        Self {
            avatars: HashMap::new(),
            jobs: HashMap::new(),
            session_index: HashMap::new(),
            cache: HashMap::new(),
            queue: VecDeque::new(),
            stats: ServiceStats::default(),
            next_avatar: 1,
            next_job: 1,
            shutdown: false,
        }
    }
}

struct Inner {
    state: Mutex<State>,
    signal: Condvar,
    store: ArtifactStore,
    opts: PipelineOptions,
}

/// The avatar pipeline orchestrator: content-addressed cache, session
/// deduplication, and a single-worker retryable job queue.
///
/// All maps live behind one mutex; a dedicated worker thread drains the FIFO
/// queue and runs pipeline stages to completion, one job at a time. Request
/// paths only lock, mutate and notify. There is no mid-stage cancellation
/// and no per-job timeout: a stuck transform would block the worker, an
/// accepted limitation of the single-worker design.
pub struct PipelineService {
    inner: Arc<Inner>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl PipelineService {
    /// Start the service and its worker thread.
    pub fn new(opts: PipelineOptions) -> Self {
        let store = ArtifactStore::new(
            &opts.artifact_root,
            &opts.pipeline_version,
            &opts.template_version,
        );
        let inner = Arc::new(Inner {
            state: Mutex::new(State::new()),
            signal: Condvar::new(),
            store,
            opts,
        });
        let worker_inner = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("spriteforge-worker".into())
            .spawn(move || worker_loop(worker_inner))
            .expect("spawn worker thread");
        Self {
            inner,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Root directory of the artifact store.
    pub fn artifact_root(&self) -> &Path {
        self.inner.store.root()
    }

    /// Submit source bytes for a session.
    ///
    /// Validation failures surface here synchronously and never enter the
    /// queue. A repeat submission of byte-identical content by the same
    /// session returns the existing avatar/job with `reused = true`.
    pub fn enqueue(
        &self,
        session_id: &str,
        bytes: &[u8],
        mime: &str,
    ) -> SpriteResult<EnqueueReceipt> {
        self.enqueue_with(session_id, bytes, mime, EnqueueOptions::default())
    }

    /// [`PipelineService::enqueue`] with per-submission options.
    pub fn enqueue_with(
        &self,
        session_id: &str,
        bytes: &[u8],
        mime: &str,
        opts: EnqueueOptions,
    ) -> SpriteResult<EnqueueReceipt> {
        validate_submission(bytes, mime)?;
        let source_sha256 = sha256_hex(bytes);
        let key = artifact_key(
            &source_sha256,
            &self.inner.opts.pipeline_version,
            &self.inner.opts.template_version,
        );

        let mut state = self.inner.state.lock();
        let dedup_key = (session_id.to_string(), key.clone());
        if let Some((avatar_id, job_id)) = state.session_index.get(&dedup_key).cloned() {
            let avatar = state.avatars[&avatar_id].clone();
            let job = state.jobs[&job_id].clone();
            tracing::debug!(avatar = %avatar_id, "deduplicated submission");
            return Ok(EnqueueReceipt {
                avatar,
                job,
                reused: true,
            });
        }

        let now = SystemTime::now();
        let avatar_id = format!("av-{:06}", state.next_avatar);
        let job_id = format!("job-{:06}", state.next_job);
        state.next_avatar += 1;
        state.next_job += 1;

        let avatar = Avatar {
            id: avatar_id.clone(),
            session_id: session_id.to_string(),
            artifact_key: key.clone(),
            source_sha256: source_sha256.clone(),
            source: Arc::new(bytes.to_vec()),
            mime: mime.to_string(),
            status: RunStatus::Queued,
            stage: Stage::Normalize,
            error_code: None,
            error_detail: None,
            package: None,
            created_at: now,
            updated_at: now,
        };
        let job = Job {
            id: job_id.clone(),
            avatar_id: avatar_id.clone(),
            session_id: session_id.to_string(),
            artifact_key: key,
            status: RunStatus::Queued,
            stage: Stage::Normalize,
            error_code: None,
            error_detail: None,
            attempts: 0,
            max_attempts: self.inner.opts.max_attempts,
            inject_fail_once: opts.inject_fail_once,
        };

        state.avatars.insert(avatar_id.clone(), avatar.clone());
        state.jobs.insert(job_id.clone(), job.clone());
        state.session_index.insert(dedup_key, (avatar_id.clone(), job_id.clone()));
        state.queue.push_back(job_id);
        self.inner.signal.notify_all();
        tracing::info!(avatar = %avatar_id, session = session_id, "queued avatar generation");
        Ok(EnqueueReceipt {
            avatar,
            job,
            reused: false,
        })
    }

    /// Snapshot of an avatar record.
    pub fn avatar(&self, avatar_id: &str) -> Option<Avatar> {
        self.inner.state.lock().avatars.get(avatar_id).cloned()
    }

    /// Snapshot of a job record.
    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.inner.state.lock().jobs.get(job_id).cloned()
    }

    /// Snapshot of the worker counters.
    pub fn stats(&self) -> ServiceStats {
        self.inner.state.lock().stats
    }

    /// Block until the avatar reaches a terminal status or the timeout
    /// elapses.
    pub fn wait_terminal(&self, avatar_id: &str, timeout: Duration) -> SpriteResult<Avatar> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            let Some(avatar) = state.avatars.get(avatar_id) else {
                return Err(SpriteError::AvatarNotFound(avatar_id.to_string()));
            };
            if avatar.status.is_terminal() {
                return Ok(avatar.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SpriteError::failed(format!(
                    "timed out waiting for avatar '{avatar_id}'"
                )));
            }
            let _ = self.inner.signal.wait_for(&mut state, deadline - now);
        }
    }

    /// Resolve the on-disk path of one published asset.
    ///
    /// Kinds: `atlas`, `atlas2x`, `metadata`, `previewDir`, `stage:<name>`,
    /// `preview:<semanticName>`.
    pub fn resolve_asset_path(&self, avatar_id: &str, kind: &str) -> SpriteResult<PathBuf> {
        let avatar = self
            .avatar(avatar_id)
            .ok_or_else(|| SpriteError::AvatarNotFound(avatar_id.to_string()))?;
        let paths = self.inner.store.paths_for(&avatar.source_sha256);
        if let Some(stage) = kind.strip_prefix("stage:") {
            return match stage {
                "normalized" => Ok(paths.normalized),
                "keypoints" => Ok(paths.keypoints),
                "rig" => Ok(paths.rig),
                "qc" => Ok(paths.qc),
                other => Err(SpriteError::failed(format!(
                    "unknown stage asset '{other}'"
                ))),
            };
        }
        if let Some(name) = kind.strip_prefix("preview:") {
            let stem = atlas::preview_stem(name).ok_or_else(|| {
                SpriteError::failed(format!("unknown preview asset '{name}'"))
            })?;
            return Ok(paths.preview_dir.join(format!("{stem}.png")));
        }
        match kind {
            "atlas" => Ok(paths.atlas),
            "atlas2x" => Ok(paths.atlas2x),
            "metadata" => Ok(paths.metadata),
            "previewDir" => Ok(paths.preview_dir),
            other => Err(SpriteError::failed(format!("unknown asset kind '{other}'"))),
        }
    }

    /// JSON summary of a completed (or in-flight) avatar with asset URLs.
    pub fn package_payload(&self, avatar_id: &str) -> SpriteResult<serde_json::Value> {
        let avatar = self
            .avatar(avatar_id)
            .ok_or_else(|| SpriteError::AvatarNotFound(avatar_id.to_string()))?;
        let mut payload = json!({
            "avatarId": avatar.id,
            "status": avatar.status,
            "stage": avatar.stage,
            "pipelineVersion": self.inner.opts.pipeline_version,
            "templateVersion": self.inner.opts.template_version,
            "errorCode": avatar.error_code,
            "errorDetail": avatar.error_detail,
        });
        if let Some(pkg) = &avatar.package {
            payload["package"] = serde_json::to_value(pkg)
                .map_err(|e| SpriteError::failed(format!("serialize package: {e}")))?;
            payload["assets"] = asset_urls(&avatar.id);
        }
        Ok(payload)
    }

    /// Lightweight status/preview JSON for polling callers.
    pub fn preview_payload(&self, avatar_id: &str) -> SpriteResult<serde_json::Value> {
        let avatar = self
            .avatar(avatar_id)
            .ok_or_else(|| SpriteError::AvatarNotFound(avatar_id.to_string()))?;
        let mut payload = json!({
            "avatarId": avatar.id,
            "status": avatar.status,
            "stage": avatar.stage,
            "errorCode": avatar.error_code,
        });
        if avatar.status == RunStatus::Completed {
            payload["previews"] = preview_urls(&avatar.id);
        }
        Ok(payload)
    }

    /// Test isolation: clear every in-memory map and delete the artifact
    /// root directory.
    pub fn reset_state(&self) {
        {
            let mut state = self.inner.state.lock();
            *state = State::new();
        }
        self.inner.store.remove_root();
        self.inner.signal.notify_all();
    }
}

impl Drop for PipelineService {
    fn drop(&mut self) {
        self.inner.state.lock().shutdown = true;
        self.inner.signal.notify_all();
        if let Some(handle) = self.worker.get_mut().take() {
            let _ = handle.join();
        }
    }
}

fn asset_urls(avatar_id: &str) -> serde_json::Value {
    json!({
        "atlas": format!("/avatars/{avatar_id}/atlas.png"),
        "atlas2x": format!("/avatars/{avatar_id}/atlas@2x.png"),
        "metadata": format!("/avatars/{avatar_id}/atlas.json"),
        "previews": preview_urls(avatar_id),
    })
}

fn preview_urls(avatar_id: &str) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for semantic in ["left", "right", "towards_camera", "away_from_camera"] {
        map.insert(
            semantic.to_string(),
            json!(format!("/avatars/{avatar_id}/preview/walk_{semantic}.png")),
        );
    }
    serde_json::Value::Object(map)
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        let job_id = {
            let mut state = inner.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(id) = state.queue.pop_front() {
                    break id;
                }
                inner.signal.wait(&mut state);
            }
        };
        process_job(&inner, &job_id);
    }
}

/// Inputs a run needs after the pickup lock is released.
struct JobIntake {
    avatar_id: String,
    artifact_key: String,
    source_sha256: String,
    source: Arc<Vec<u8>>,
    mime: String,
    inject_fail: bool,
    attempts_before: u32,
    max_attempts: u32,
}

fn process_job(inner: &Inner, job_id: &str) {
    // Pickup: mark running, consume the fault injector, resolve the
    // in-memory cache.
    let intake = {
        let mut state = inner.state.lock();
        let Some(job) = state.jobs.get(job_id) else {
            return;
        };
        let avatar_id = job.avatar_id.clone();
        if !state.avatars.contains_key(&avatar_id) {
            let err = SpriteError::AvatarNotFound(avatar_id);
            finish_failed(&mut state, job_id, err.code(), &err.to_string());
            inner.signal.notify_all();
            return;
        }

        let job = state.jobs.get_mut(job_id).expect("job present");
        job.status = RunStatus::Running;
        let inject_fail = std::mem::take(&mut job.inject_fail_once);
        let artifact_key = job.artifact_key.clone();
        let attempts_before = job.attempts;
        let max_attempts = job.max_attempts;

        let avatar = state
            .avatars
            .get_mut(&avatar_id)
            .expect("avatar present");
        avatar.status = RunStatus::Running;
        avatar.updated_at = SystemTime::now();
        let intake = JobIntake {
            avatar_id: avatar_id.clone(),
            artifact_key,
            source_sha256: avatar.source_sha256.clone(),
            source: Arc::clone(&avatar.source),
            mime: avatar.mime.clone(),
            inject_fail,
            attempts_before,
            max_attempts,
        };

        if let Some(CacheEntry::Completed(pkg)) = state.cache.get(&intake.artifact_key).cloned() {
            state.stats.cache_hits += 1;
            finish_completed(&mut state, job_id, pkg);
            inner.signal.notify_all();
            tracing::info!(avatar = %intake.avatar_id, "served from artifact cache");
            return;
        }
        intake
    };

    // Disk probe: a complete slot from a previous process short-circuits the
    // pipeline.
    if inner.store.is_complete(&intake.source_sha256) {
        match inner.store.load_package(&intake.source_sha256) {
            Ok(pkg) => {
                let mut state = inner.state.lock();
                state
                    .cache
                    .insert(intake.artifact_key.clone(), CacheEntry::Completed(pkg.clone()));
                state.stats.disk_rehydrations += 1;
                finish_completed(&mut state, job_id, pkg);
                inner.signal.notify_all();
                tracing::info!(avatar = %intake.avatar_id, "rehydrated package from disk");
                return;
            }
            Err(err) => {
                tracing::warn!(
                    avatar = %intake.avatar_id,
                    error = %err,
                    "on-disk slot unreadable, recomputing"
                );
            }
        }
    }

    // Full pipeline execution.
    {
        let mut state = inner.state.lock();
        if let Some(job) = state.jobs.get_mut(job_id) {
            job.attempts += 1;
        }
        state.stats.full_runs += 1;
    }

    let result = if intake.inject_fail {
        Err(SpriteError::failed("injected transient fault"))
    } else {
        run_pipeline(inner, job_id, &intake)
    };

    match result {
        Ok(pkg) => {
            let mut state = inner.state.lock();
            state
                .cache
                .insert(intake.artifact_key.clone(), CacheEntry::Completed(pkg.clone()));
            finish_completed(&mut state, job_id, pkg);
            inner.signal.notify_all();
            tracing::info!(avatar = %intake.avatar_id, "avatar generation completed");
        }
        Err(err) => {
            let attempts = intake.attempts_before + 1;
            let mut state = inner.state.lock();
            if err.is_retriable() && attempts < intake.max_attempts {
                requeue_for_retry(&mut state, job_id, &err);
                inner.signal.notify_all();
                tracing::warn!(
                    avatar = %intake.avatar_id,
                    attempts,
                    error = %err,
                    "transient failure, retrying"
                );
            } else {
                state.cache.insert(
                    intake.artifact_key.clone(),
                    CacheEntry::Failed {
                        code: err.code().to_string(),
                        detail: err.to_string(),
                    },
                );
                finish_failed(&mut state, job_id, err.code(), &err.to_string());
                inner.signal.notify_all();
                tracing::warn!(
                    avatar = %intake.avatar_id,
                    code = err.code(),
                    error = %err,
                    "avatar generation failed"
                );
            }
        }
    }
}

/// Execute normalize -> keypoints -> rig -> render -> qc, persisting every
/// stage artifact as it completes so a later process can resume from disk.
fn run_pipeline(inner: &Inner, job_id: &str, intake: &JobIntake) -> SpriteResult<Package> {
    let store = &inner.store;
    let pv = &inner.opts.pipeline_version;
    let tv = &inner.opts.template_version;
    let paths = store.paths_for(&intake.source_sha256);

    set_stage(inner, job_id, Stage::Normalize);
    store.write_bytes(&store.source_path(&intake.source_sha256), &intake.source)?;
    let normalized = normalize_source(&intake.source, &intake.mime)?;
    store.write_bytes(&paths.normalized, &normalized.png)?;

    set_stage(inner, job_id, Stage::Keypoints);
    let kps = synthesize_keypoints(normalized.bbox);
    store.write_json(&paths.keypoints, &kps)?;

    set_stage(inner, job_id, Stage::Rig);
    let rig = build_rig(normalized.bbox, pv, tv);
    store.write_json(&paths.rig, &rig)?;

    set_stage(inner, job_id, Stage::Render);
    let base = frame_base(&normalized.raster, normalized.bbox);
    let sets = synthesize_all(&base)?;
    let bundle = atlas::assemble(&sets, pv, tv)?;
    let atlas_png = bundle.atlas.encode_png()?;
    let atlas2x_png = bundle.atlas2x.encode_png()?;
    store.write_bytes(&paths.atlas, &atlas_png)?;
    store.write_bytes(&paths.atlas2x, &atlas2x_png)?;
    let metadata_bytes = store.write_json(&paths.metadata, &bundle.metadata)?;
    for (stem, strip) in &bundle.previews {
        store.write_bytes(&paths.previews[*stem], &strip.encode_png()?)?;
    }

    set_stage(inner, job_id, Stage::Qc);
    let report = qc::evaluate(normalized.bbox, &sets);
    qc::enforce(&report)?;
    // Written only on acceptance: a rejected run must never satisfy the
    // disk-completeness probe.
    store.write_json(&paths.qc, &report)?;

    Ok(Package {
        pipeline_version: pv.clone(),
        template_version: tv.clone(),
        hashes: PackageHashes {
            source: intake.source_sha256.clone(),
            normalized: normalized.sha256,
            atlas: sha256_hex(&atlas_png),
            atlas2x: sha256_hex(&atlas2x_png),
            metadata: sha256_hex(&metadata_bytes),
        },
        qc: report,
        paths,
    })
}

fn set_stage(inner: &Inner, job_id: &str, stage: Stage) {
    let mut state = inner.state.lock();
    let Some(job) = state.jobs.get_mut(job_id) else {
        return;
    };
    job.stage = stage;
    let avatar_id = job.avatar_id.clone();
    if let Some(avatar) = state.avatars.get_mut(&avatar_id) {
        avatar.stage = stage;
        avatar.updated_at = SystemTime::now();
    }
    inner.signal.notify_all();
    tracing::debug!(job = job_id, stage = stage.as_str(), "stage transition");
}

fn finish_completed(state: &mut State, job_id: &str, pkg: Package) {
    let Some(job) = state.jobs.get_mut(job_id) else {
        return;
    };
    job.status = RunStatus::Completed;
    job.stage = Stage::Qc;
    job.error_code = None;
    job.error_detail = None;
    let avatar_id = job.avatar_id.clone();
    if let Some(avatar) = state.avatars.get_mut(&avatar_id) {
        avatar.status = RunStatus::Completed;
        avatar.stage = Stage::Qc;
        avatar.error_code = None;
        avatar.error_detail = None;
        avatar.package = Some(pkg);
        avatar.updated_at = SystemTime::now();
    }
}

fn finish_failed(state: &mut State, job_id: &str, code: &str, detail: &str) {
    let Some(job) = state.jobs.get_mut(job_id) else {
        return;
    };
    job.status = RunStatus::Failed;
    job.error_code = Some(code.to_string());
    job.error_detail = Some(detail.to_string());
    let avatar_id = job.avatar_id.clone();
    let stage = job.stage;
    if let Some(avatar) = state.avatars.get_mut(&avatar_id) {
        avatar.status = RunStatus::Failed;
        avatar.stage = stage;
        avatar.error_code = Some(code.to_string());
        avatar.error_detail = Some(detail.to_string());
        avatar.updated_at = SystemTime::now();
    }
}

/// Reset the job to the queue for another attempt: stage back to normalize,
/// same job id pushed onto the same queue.
fn requeue_for_retry(state: &mut State, job_id: &str, err: &SpriteError) {
    let Some(job) = state.jobs.get_mut(job_id) else {
        return;
    };
    job.status = RunStatus::Queued;
    job.stage = Stage::Normalize;
    job.error_code = Some(err.code().to_string());
    job.error_detail = Some(err.to_string());
    let avatar_id = job.avatar_id.clone();
    if let Some(avatar) = state.avatars.get_mut(&avatar_id) {
        avatar.status = RunStatus::Queued;
        avatar.stage = Stage::Normalize;
        avatar.error_code = Some(err.code().to_string());
        avatar.error_detail = Some(err.to_string());
        avatar.updated_at = SystemTime::now();
    }
    state.queue.push_back(job_id.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn options_default_to_production_stamps() {
        let opts = PipelineOptions::new("/tmp/x");
        assert_eq!(opts.pipeline_version, PIPELINE_VERSION);
        assert_eq!(opts.template_version, TEMPLATE_VERSION);
        assert_eq!(opts.max_attempts, 2);
    }

    #[test]
    fn validation_failures_never_enter_the_queue() {
        let root = temp_root("validation");
        let svc = PipelineService::new(PipelineOptions::new(&root));
        assert!(matches!(
            svc.enqueue("s1", &[], "image/png"),
            Err(SpriteError::MissingImage)
        ));
        assert!(matches!(
            svc.enqueue("s1", b"x", "image/gif"),
            Err(SpriteError::UnsupportedMediaType(_))
        ));
        assert!(svc.avatar("av-000001").is_none());
        assert_eq!(svc.stats(), ServiceStats::default());
        svc.reset_state();
    }

    #[test]
    fn unknown_avatar_lookups_error() {
        let root = temp_root("lookup");
        let svc = PipelineService::new(PipelineOptions::new(&root));
        assert!(matches!(
            svc.resolve_asset_path("av-nope", "atlas"),
            Err(SpriteError::AvatarNotFound(_))
        ));
        assert!(matches!(
            svc.package_payload("av-nope"),
            Err(SpriteError::AvatarNotFound(_))
        ));
        assert!(svc.avatar("av-nope").is_none());
        svc.reset_state();
    }

    #[test]
    fn asset_kinds_resolve_to_slot_paths() {
        let root = temp_root("kinds");
        let svc = PipelineService::new(PipelineOptions::new(&root));
        // A tiny valid PNG gets an avatar record even before the worker runs.
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 0]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let receipt = svc.enqueue("s1", &png, "image/png").unwrap();

        let atlas = svc.resolve_asset_path(&receipt.avatar.id, "atlas").unwrap();
        assert!(atlas.ends_with(
            PathBuf::from(&receipt.avatar.source_sha256).join("atlas.png")
        ));
        let norm = svc
            .resolve_asset_path(&receipt.avatar.id, "stage:normalized")
            .unwrap();
        assert!(norm.ends_with("stages/normalized.png"));
        let preview = svc
            .resolve_asset_path(&receipt.avatar.id, "preview:left")
            .unwrap();
        assert!(preview.ends_with("preview/walk_left.png"));
        assert!(svc.resolve_asset_path(&receipt.avatar.id, "preview:bogus").is_err());
        assert!(svc.resolve_asset_path(&receipt.avatar.id, "stage:bogus").is_err());
        svc.reset_state();
        drop(svc);
        std::fs::remove_dir_all(&root).ok();
    }
}
