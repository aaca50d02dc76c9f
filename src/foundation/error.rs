/// Convenience result type used across spriteforge.
pub type SpriteResult<T> = Result<T, SpriteError>;

/// Top-level error taxonomy for the avatar pipeline.
///
/// Every variant maps to a stable wire code via [`SpriteError::code`]. The
/// worker loop branches on [`SpriteError::is_retriable`] only: `PIPELINE_FAILED`
/// (and wrapped lower-level errors, which surface under the same code) may be
/// retried; validation, content and quality rejections are terminal.
#[derive(thiserror::Error, Debug)]
pub enum SpriteError {
    /// Empty or absent image payload at enqueue time.
    #[error("missing image payload")]
    MissingImage,

    /// Payload larger than the accepted source limit.
    #[error("image payload is {got} bytes, limit is {limit}")]
    ImageTooLarge {
        /// Submitted payload size in bytes.
        got: usize,
        /// Maximum accepted size in bytes.
        limit: usize,
    },

    /// Declared MIME type outside the accepted set.
    #[error("unsupported media type '{0}'")]
    UnsupportedMediaType(String),

    /// No opaque foreground survived background removal.
    #[error("no opaque foreground after background removal")]
    NoForeground,

    /// Foreground present but not a usable full-body subject.
    #[error("full-body subject required: {0}")]
    FullBodyRequired(String),

    /// Subject silhouette too small or thin relative to the canvas.
    #[error("silhouette integrity {score:.3} below minimum {min:.3}")]
    QcSilhouetteLow {
        /// Measured silhouette integrity.
        score: f32,
        /// Hard rejection floor.
        min: f32,
    },

    /// Animation frames shift their centroid more than allowed.
    #[error("temporal jitter {jitter:.2}px exceeds {max:.2}px")]
    QcTemporalJitter {
        /// Worst per-axis centroid delta observed.
        jitter: f32,
        /// Hard rejection ceiling.
        max: f32,
    },

    /// Frame palette drifts too far from the sequence baseline.
    #[error("palette drift {drift:.3} exceeds {max:.3}")]
    QcPaletteDrift {
        /// Worst normalized mean-RGB distance observed.
        drift: f32,
        /// Hard rejection ceiling.
        max: f32,
    },

    /// Job references an avatar no longer known to the service.
    #[error("avatar '{0}' not found")]
    AvatarNotFound(String),

    /// Generic or transient pipeline failure; the only retriable code.
    #[error("pipeline failed: {0}")]
    PipelineFailed(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpriteError {
    /// Build a [`SpriteError::PipelineFailed`] value.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::PipelineFailed(msg.into())
    }

    /// Stable wire code for this error, used in job records and payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingImage => "MISSING_IMAGE",
            Self::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::NoForeground => "NO_FOREGROUND",
            Self::FullBodyRequired(_) => "FULL_BODY_REQUIRED",
            Self::QcSilhouetteLow { .. } => "QC_SILHOUETTE_LOW",
            Self::QcTemporalJitter { .. } => "QC_TEMPORAL_JITTER",
            Self::QcPaletteDrift { .. } => "QC_PALETTE_DRIFT",
            Self::AvatarNotFound(_) => "AVATAR_NOT_FOUND",
            Self::PipelineFailed(_) | Self::Other(_) => "PIPELINE_FAILED",
        }
    }

    /// Whether the worker loop may re-queue the job after this error.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::PipelineFailed(_) | Self::Other(_))
    }
}
