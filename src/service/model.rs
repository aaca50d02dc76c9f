use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::qc::QcReport;

/// Version stamp of the generation pipeline. Bumping it re-addresses every
/// cached artifact.
pub const PIPELINE_VERSION: &str = "1.2.0";

/// Version stamp of the skeleton/animation template.
pub const TEMPLATE_VERSION: &str = "humanoid-v1";

/// Execution attempts a job may consume before a transient failure sticks.
pub const MAX_ATTEMPTS: u32 = 2;

/// Lifecycle of an avatar or its job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting in the FIFO queue (again, after a retry reset).
    Queued,
    /// The worker is executing pipeline stages.
    Running,
    /// Package published.
    Completed,
    /// Terminal failure (or retries exhausted).
    Failed,
}

impl RunStatus {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Pipeline stages in execution order. A job never moves backward except the
/// explicit retry reset to [`Stage::Normalize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Decode, letterbox, background removal, full-body validation.
    Normalize,
    /// Skeleton synthesis from the foreground box.
    Keypoints,
    /// Rig descriptor assembly.
    Rig,
    /// Segmentation, posing, animation, atlas assembly.
    Render,
    /// Quality gate scoring and thresholds.
    Qc,
}

impl Stage {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Keypoints => "keypoints",
            Self::Rig => "rig",
            Self::Render => "render",
            Self::Qc => "qc",
        }
    }
}

/// One avatar generation request: a (session, content, versions) identity and
/// its observable progress. Never deleted in-process; superseded only by a
/// new avatar for different content.
#[derive(Clone, Debug)]
pub struct Avatar {
    /// Deterministic id, `av-NNNNNN`.
    pub id: String,
    /// Submitting session.
    pub session_id: String,
    /// Cache/dedup identity, see [`crate::foundation::hash::artifact_key`].
    pub artifact_key: String,
    /// SHA-256 of the source bytes.
    pub source_sha256: String,
    /// Owned source payload.
    pub source: Arc<Vec<u8>>,
    /// Declared MIME type.
    pub mime: String,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Stage the run is in (or stopped at).
    pub stage: Stage,
    /// Stable error code when failed.
    pub error_code: Option<String>,
    /// Human-readable error detail when failed.
    pub error_detail: Option<String>,
    /// Published package once completed.
    pub package: Option<Package>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last state transition time.
    pub updated_at: SystemTime,
}

/// The execution record for an avatar. The same job is reused across
/// retries; `attempts` counts pipeline executions.
#[derive(Clone, Debug)]
pub struct Job {
    /// Deterministic id, `job-NNNNNN`.
    pub id: String,
    /// Owning avatar.
    pub avatar_id: String,
    /// Submitting session.
    pub session_id: String,
    /// Cache/dedup identity shared with the avatar.
    pub artifact_key: String,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Stage the run is in (or stopped at).
    pub stage: Stage,
    /// Stable error code of the most recent failure.
    pub error_code: Option<String>,
    /// Detail of the most recent failure.
    pub error_detail: Option<String>,
    /// Pipeline executions consumed so far.
    pub attempts: u32,
    /// Attempt ceiling for transient failures.
    pub max_attempts: u32,
    /// Test-only fault injector: the next execution fails with
    /// `PIPELINE_FAILED` and clears the flag.
    pub inject_fail_once: bool,
}

/// Content hashes of every published artifact.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageHashes {
    /// Source payload hash.
    pub source: String,
    /// Normalized canvas PNG hash.
    pub normalized: String,
    /// 1x atlas PNG hash.
    pub atlas: String,
    /// 2x atlas PNG hash.
    pub atlas2x: String,
    /// Metadata JSON hash.
    pub metadata: String,
}

/// Filesystem locations of every published artifact.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagePaths {
    /// Normalized working canvas PNG.
    pub normalized: PathBuf,
    /// Keypoints stage document.
    pub keypoints: PathBuf,
    /// Rig stage document.
    pub rig: PathBuf,
    /// Quality report document.
    pub qc: PathBuf,
    /// 1x atlas sheet.
    pub atlas: PathBuf,
    /// 2x atlas sheet.
    pub atlas2x: PathBuf,
    /// Atlas metadata document.
    pub metadata: PathBuf,
    /// Preview directory.
    pub preview_dir: PathBuf,
    /// Preview strips by file stem.
    pub previews: BTreeMap<String, PathBuf>,
}

/// The published result of one successful generation run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Pipeline version that produced the package.
    pub pipeline_version: String,
    /// Template version that produced the package.
    pub template_version: String,
    /// Content hashes of the artifacts.
    pub hashes: PackageHashes,
    /// Quality-control scores.
    pub qc: QcReport,
    /// Artifact locations.
    pub paths: PackagePaths,
}

/// Artifact-cache slot for one artifact key.
#[derive(Clone, Debug)]
pub enum CacheEntry {
    /// Finished package, deep-copied into completing avatars.
    Completed(Package),
    /// Terminal failure, advisory for repeat submissions of the same bytes.
    Failed {
        /// Stable error code.
        code: String,
        /// Human-readable detail.
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_terminality() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn wire_names_are_lowercase() {
        assert_eq!(RunStatus::Queued.as_str(), "queued");
        assert_eq!(Stage::Normalize.as_str(), "normalize");
        assert_eq!(Stage::Qc.as_str(), "qc");
        assert_eq!(
            serde_json::to_value(Stage::Render).unwrap(),
            serde_json::json!("render")
        );
    }
}
