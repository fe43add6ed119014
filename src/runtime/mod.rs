use std::path::Path;

use thiserror::Error;

pub mod oga;

pub type TokenId = i32;

/// Error surfaced by the model-runtime collaborator. The generation driver
/// reports the message verbatim inside its failure diagnostic.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RuntimeError(String);

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The model-runtime collaborator. Everything the driver needs is behind
/// these traits so tests can substitute a deterministic stub.
pub trait TextGenRuntime {
    type Config: RuntimeConfig;
    type Model: Model;

    fn config(&self, location: &Path) -> Result<Self::Config, RuntimeError>;
    fn load_model(&self, config: Self::Config) -> Result<Self::Model, RuntimeError>;
}

pub trait RuntimeConfig {
    fn clear_backends(&mut self) -> Result<(), RuntimeError>;
    fn append_backend(&mut self, identifier: &str) -> Result<(), RuntimeError>;
}

pub trait Model {
    type Tokenizer: Tokenizer;
    type Params: GeneratorParams;
    type Generator: Generator;

    fn tokenizer(&self) -> Result<Self::Tokenizer, RuntimeError>;
    fn generator_params(&self) -> Result<Self::Params, RuntimeError>;
    fn generator(&self, params: Self::Params) -> Result<Self::Generator, RuntimeError>;
}

pub trait Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, RuntimeError>;
    fn decode(&self, tokens: &[TokenId]) -> Result<String, RuntimeError>;

    /// Chat formatting is an optional tokenizer capability; `None` means the
    /// loaded runtime does not expose it.
    fn apply_chat_template(
        &self,
        messages_json: &str,
        add_generation_prompt: bool,
    ) -> Option<Result<String, RuntimeError>>;
}

pub trait GeneratorParams {
    fn set_search_options(
        &mut self,
        max_length: usize,
        temperature: f64,
        top_p: f64,
    ) -> Result<(), RuntimeError>;
}

pub trait Generator {
    fn append_tokens(&mut self, tokens: &[TokenId]) -> Result<(), RuntimeError>;
    fn is_done(&self) -> Result<bool, RuntimeError>;
    fn generate_next_token(&mut self) -> Result<(), RuntimeError>;
    fn sequence(&self, index: usize) -> Result<Vec<TokenId>, RuntimeError>;
}
