//! The pipeline orchestrator: avatar/job records, the content-addressed
//! artifact store, session deduplication, and the single-worker retryable
//! job queue.

mod model;
mod orchestrator;
mod store;

pub use model::{
    Avatar, CacheEntry, Job, MAX_ATTEMPTS, PIPELINE_VERSION, Package, PackageHashes, PackagePaths,
    RunStatus, Stage, TEMPLATE_VERSION,
};
pub use orchestrator::{
    EnqueueOptions, EnqueueReceipt, PipelineOptions, PipelineService, ServiceStats,
};
pub use store::ArtifactStore;
