use std::path::{Path, PathBuf};

use crate::error::RunnerError;

pub const GENAI_CONFIG_FILE: &str = "genai_config.json";
pub const LEGACY_CONFIG_FILE: &str = "config.json";

/// Which on-disk layout the runtime expects. Fixed per build: current
/// runtime generations consume the model root directory, older ones a direct
/// path to the configuration artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    ConfigArtifact,
    ModelRoot,
}

pub const DEFAULT_STRATEGY: ResolutionStrategy = ResolutionStrategy::ModelRoot;

/// Path the runtime can consume directly to build its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModelLocation {
    path: PathBuf,
}

impl ResolvedModelLocation {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn resolve(
    model_path: &str,
    strategy: ResolutionStrategy,
) -> Result<ResolvedModelLocation, RunnerError> {
    let root = PathBuf::from(model_path);
    match strategy {
        ResolutionStrategy::ConfigArtifact => resolve_config_artifact(root),
        ResolutionStrategy::ModelRoot => resolve_model_root(root),
    }
}

fn resolve_config_artifact(root: PathBuf) -> Result<ResolvedModelLocation, RunnerError> {
    if root.is_file() {
        return Ok(ResolvedModelLocation { path: root });
    }
    let preferred = root.join(GENAI_CONFIG_FILE);
    if preferred.is_file() {
        return Ok(ResolvedModelLocation { path: preferred });
    }
    let fallback = root.join(LEGACY_CONFIG_FILE);
    if fallback.is_file() {
        return Ok(ResolvedModelLocation { path: fallback });
    }
    Err(RunnerError::ModelConfigNotFound(root))
}

fn resolve_model_root(root: PathBuf) -> Result<ResolvedModelLocation, RunnerError> {
    if !root.is_dir() {
        return Err(RunnerError::ModelRootNotFound(root));
    }
    if root.join(GENAI_CONFIG_FILE).is_file() {
        return Ok(ResolvedModelLocation { path: root });
    }
    if root.join(LEGACY_CONFIG_FILE).is_file() {
        // A legacy artifact without the primary one means a model built for
        // an older runtime generation, not an absent model.
        return Err(RunnerError::GenaiConfigNotFoundInModelRoot(root));
    }
    Err(RunnerError::ModelRootNotFound(root))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn model_dir(files: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in files {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        dir
    }

    fn resolve_in(dir: &TempDir, strategy: ResolutionStrategy) -> Result<ResolvedModelLocation, RunnerError> {
        resolve(dir.path().to_str().unwrap(), strategy)
    }

    #[test]
    fn model_root_resolves_to_directory() {
        let dir = model_dir(&[GENAI_CONFIG_FILE]);
        let location = resolve_in(&dir, ResolutionStrategy::ModelRoot).unwrap();
        assert_eq!(location.path(), dir.path());
    }

    #[test]
    fn model_root_distinguishes_legacy_layout() {
        let dir = model_dir(&[LEGACY_CONFIG_FILE]);
        let err = resolve_in(&dir, ResolutionStrategy::ModelRoot).unwrap_err();
        assert!(matches!(err, RunnerError::GenaiConfigNotFoundInModelRoot(_)));
        assert!(
            err.to_string()
                .starts_with("genai_config_not_found_in_model_root: ")
        );
    }

    #[test]
    fn model_root_rejects_empty_directory() {
        let dir = model_dir(&[]);
        let err = resolve_in(&dir, ResolutionStrategy::ModelRoot).unwrap_err();
        assert!(matches!(err, RunnerError::ModelRootNotFound(_)));
    }

    #[test]
    fn model_root_rejects_missing_path() {
        let err = resolve("/no/such/model", ResolutionStrategy::ModelRoot).unwrap_err();
        assert_eq!(err.to_string(), "model_root_not_found: /no/such/model");
    }

    #[test]
    fn model_root_rejects_plain_file() {
        let dir = model_dir(&[GENAI_CONFIG_FILE]);
        let file = dir.path().join(GENAI_CONFIG_FILE);
        let err = resolve(file.to_str().unwrap(), ResolutionStrategy::ModelRoot).unwrap_err();
        assert!(matches!(err, RunnerError::ModelRootNotFound(_)));
    }

    #[test]
    fn config_artifact_accepts_direct_file() {
        let dir = model_dir(&[GENAI_CONFIG_FILE]);
        let file = dir.path().join(GENAI_CONFIG_FILE);
        let location =
            resolve(file.to_str().unwrap(), ResolutionStrategy::ConfigArtifact).unwrap();
        assert_eq!(location.path(), file);
    }

    #[test]
    fn config_artifact_prefers_primary_name() {
        let dir = model_dir(&[GENAI_CONFIG_FILE, LEGACY_CONFIG_FILE]);
        let location = resolve_in(&dir, ResolutionStrategy::ConfigArtifact).unwrap();
        assert_eq!(location.path(), dir.path().join(GENAI_CONFIG_FILE));
    }

    #[test]
    fn config_artifact_falls_back_to_legacy_name() {
        let dir = model_dir(&[LEGACY_CONFIG_FILE]);
        let location = resolve_in(&dir, ResolutionStrategy::ConfigArtifact).unwrap();
        assert_eq!(location.path(), dir.path().join(LEGACY_CONFIG_FILE));
    }

    #[test]
    fn config_artifact_reports_missing_config() {
        let dir = model_dir(&[]);
        let err = resolve_in(&dir, ResolutionStrategy::ConfigArtifact).unwrap_err();
        assert!(matches!(err, RunnerError::ModelConfigNotFound(_)));
    }
}
