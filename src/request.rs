use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

pub const DEFAULT_MAX_NEW_TOKENS: i64 = 512;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_TOP_P: f64 = 0.95;

/// Validated generation request. `model_path` is stored trimmed.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model_path: String,
    pub prompt: String,
    pub max_new_tokens: i64,
    pub temperature: f64,
    pub top_p: f64,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(default)]
    model_path: String,
    #[serde(default)]
    prompt: String,
    #[serde(default = "default_max_new_tokens")]
    max_new_tokens: i64,
    #[serde(default = "default_temperature")]
    temperature: f64,
    #[serde(default = "default_top_p")]
    top_p: f64,
    #[serde(default)]
    provider: Option<String>,
}

fn default_max_new_tokens() -> i64 {
    DEFAULT_MAX_NEW_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_top_p() -> f64 {
    DEFAULT_TOP_P
}

impl GenerationRequest {
    pub fn from_reader(mut input: impl Read) -> Result<Self, RunnerError> {
        let mut raw = String::new();
        input
            .read_to_string(&mut raw)
            .map_err(|err| RunnerError::InvalidRequestJson(err.to_string()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, RunnerError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| RunnerError::InvalidRequestJson(err.to_string()))?;
        if !value.is_object() {
            return Err(RunnerError::InvalidRequestJson(
                "request must be a JSON object".into(),
            ));
        }
        // A present field of the wrong type is its own failure kind, distinct
        // from the missing-field diagnostics below.
        let fields: RawRequest = serde_json::from_value(value)
            .map_err(|err| RunnerError::InvalidRequestField(err.to_string()))?;

        let model_path = fields.model_path.trim().to_string();
        if model_path.is_empty() {
            return Err(RunnerError::MissingModelPath);
        }
        if fields.prompt.is_empty() {
            return Err(RunnerError::MissingPrompt);
        }

        Ok(Self {
            model_path,
            prompt: fields.prompt,
            max_new_tokens: fields.max_new_tokens,
            temperature: fields.temperature,
            top_p: fields.top_p,
            provider: fields.provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_defaults() {
        let request =
            GenerationRequest::from_json(r#"{"model_path": "/models/phi", "prompt": "hi"}"#)
                .unwrap();
        assert_eq!(request.model_path, "/models/phi");
        assert_eq!(request.prompt, "hi");
        assert_eq!(request.max_new_tokens, DEFAULT_MAX_NEW_TOKENS);
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(request.top_p, DEFAULT_TOP_P);
        assert_eq!(request.provider, None);
    }

    #[test]
    fn keeps_explicit_fields() {
        let request = GenerationRequest::from_json(
            r#"{"model_path": " /m ", "prompt": "p", "max_new_tokens": 8,
                "temperature": 1, "top_p": 0.5, "provider": "cuda"}"#,
        )
        .unwrap();
        assert_eq!(request.model_path, "/m");
        assert_eq!(request.max_new_tokens, 8);
        assert_eq!(request.temperature, 1.0);
        assert_eq!(request.top_p, 0.5);
        assert_eq!(request.provider.as_deref(), Some("cuda"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = GenerationRequest::from_json("not json").unwrap_err();
        assert!(matches!(err, RunnerError::InvalidRequestJson(_)));
    }

    #[test]
    fn rejects_non_object_payload() {
        let err = GenerationRequest::from_json(r#"["model_path"]"#).unwrap_err();
        assert!(matches!(err, RunnerError::InvalidRequestJson(_)));
    }

    #[test]
    fn rejects_uncoercible_numeric_field() {
        let err = GenerationRequest::from_json(
            r#"{"model_path": "/m", "prompt": "p", "temperature": "hot"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidRequestField(_)));
    }

    #[test]
    fn missing_model_path_reported_first() {
        let err = GenerationRequest::from_json("{}").unwrap_err();
        assert!(matches!(err, RunnerError::MissingModelPath));
        assert_eq!(err.to_string(), "missing_model_path");
    }

    #[test]
    fn whitespace_model_path_is_missing() {
        let err =
            GenerationRequest::from_json(r#"{"model_path": "   ", "prompt": "p"}"#).unwrap_err();
        assert!(matches!(err, RunnerError::MissingModelPath));
    }

    #[test]
    fn empty_prompt_is_missing() {
        let err =
            GenerationRequest::from_json(r#"{"model_path": "/m", "prompt": ""}"#).unwrap_err();
        assert!(matches!(err, RunnerError::MissingPrompt));
        assert_eq!(err.to_string(), "missing_prompt");
    }
}
