use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Terminal failure kinds. `Display` output is the exact single-line
/// diagnostic written to stderr: `<error_kind>[: <details>]`.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid_request_json: {0}")]
    InvalidRequestJson(String),
    #[error("invalid_request_field: {0}")]
    InvalidRequestField(String),
    #[error("missing_model_path")]
    MissingModelPath,
    #[error("missing_prompt")]
    MissingPrompt,
    #[error("model_config_not_found: {}", .0.display())]
    ModelConfigNotFound(PathBuf),
    #[error("model_root_not_found: {}", .0.display())]
    ModelRootNotFound(PathBuf),
    #[error("genai_config_not_found_in_model_root: {}", .0.display())]
    GenaiConfigNotFoundInModelRoot(PathBuf),
    #[error("onnxruntime_genai_import_failed: {0}")]
    RuntimeUnavailable(String),
    #[error("onnxruntime_generation_failed: {0}")]
    GenerationFailed(String),
    #[error("io_error: {0}")]
    Io(#[from] io::Error),
}
