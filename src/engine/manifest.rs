//! Run Manifest (§6): the "birth certificate" persisted alongside every
//! run's results — the content hashes, timestamps, and build metadata
//! needed to reproduce or audit a run later. No publication or trust-gate
//! surface; this engine only ever records a finished run.

use serde::{Deserialize, Serialize};

use crate::engine::config::EngineConfig;
use crate::engine::hashing::ContentHash;
use crate::engine::model::run_id::RunId;
use crate::engine::time::UnixMs;

/// Content hashes of the three inputs that together determine a run's
/// output deterministically (§3, §5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInputs {
    pub slice: ContentHash,
    pub policy: ContentHash,
    pub calls: ContentHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub started_at: UnixMs,
    pub finished_at: UnixMs,
    /// Git commit of the binary that produced this run, if known. Set via
    /// `GIT_COMMIT` at build time by a build script; no `git2` dependency
    /// needed for a value this static.
    pub git_commit: Option<String>,
    pub git_dirty: bool,
    pub inputs: RunInputs,
    pub config: EngineConfig,
}

impl RunManifest {
    pub fn new(run_id: RunId, started_at: UnixMs, finished_at: UnixMs, inputs: RunInputs, config: EngineConfig) -> Self {
        let git_commit = option_env!("GIT_COMMIT").map(|s| s.to_string());
        let git_dirty = option_env!("GIT_DIRTY").map(|s| s == "1").unwrap_or(false);
        Self { run_id, started_at, finished_at, git_commit, git_dirty, inputs, config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_carries_input_hashes() {
        let run_id = RunId::from_parts(1_700_000_000_000, [0; 10]);
        let inputs = RunInputs { slice: "a".into(), policy: "b".into(), calls: "c".into() };
        let manifest = RunManifest::new(run_id, 0, 1_000, inputs.clone(), EngineConfig::default());
        assert_eq!(manifest.inputs, inputs);
        assert!(manifest.finished_at >= manifest.started_at);
    }
}
