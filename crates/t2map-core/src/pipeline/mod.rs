pub mod config;
mod orchestrator;
mod types;

pub use config::T2Config;
pub use orchestrator::{compute_t2_map, compute_t2_map_reported, run_from_folder};
pub use types::{PipelineStage, ProgressReporter, RunArtifacts, RunOutcome};
