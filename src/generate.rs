use tracing::debug;

use crate::backend::BackendChoice;
use crate::error::RunnerError;
use crate::locator::ResolvedModelLocation;
use crate::request::{GenerationRequest, GenerationResponse};
use crate::runtime::{
    Generator, GeneratorParams, Model, RuntimeConfig, RuntimeError, TextGenRuntime, Tokenizer,
};

/// Token budget for one request. `max_length` covers prompt and completion
/// and is fixed before the decode loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationBudget {
    prompt_tokens: usize,
    max_length: usize,
}

impl GenerationBudget {
    pub const MIN_COMPLETION_TOKENS: i64 = 32;

    pub fn new(prompt_tokens: usize, max_new_tokens: i64) -> Self {
        let completion = max_new_tokens.max(Self::MIN_COMPLETION_TOKENS) as usize;
        Self {
            prompt_tokens,
            max_length: prompt_tokens.saturating_add(completion),
        }
    }

    pub fn prompt_tokens(&self) -> usize {
        self.prompt_tokens
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

/// Drives one request through the runtime: configure, load, tokenize, run
/// the decode loop, then detokenize only the newly generated tokens. Any
/// collaborator error aborts the request as a generation failure carrying
/// the underlying message.
pub fn run<R: TextGenRuntime>(
    runtime: &R,
    location: &ResolvedModelLocation,
    backend: Option<&BackendChoice>,
    request: &GenerationRequest,
) -> Result<GenerationResponse, RunnerError> {
    drive(runtime, location, backend, request)
        .map_err(|err| RunnerError::GenerationFailed(err.to_string()))
}

fn drive<R: TextGenRuntime>(
    runtime: &R,
    location: &ResolvedModelLocation,
    backend: Option<&BackendChoice>,
    request: &GenerationRequest,
) -> Result<GenerationResponse, RuntimeError> {
    let mut config = runtime.config(location.path())?;
    if let Some(backend) = backend {
        config.clear_backends()?;
        config.append_backend(backend.identifier())?;
        debug!(backend = backend.identifier(), "backend override applied");
    }

    let model = runtime.load_model(config)?;
    let tokenizer = model.tokenizer()?;

    let prompt = format_prompt(&tokenizer, &request.prompt);
    let input_ids = tokenizer.encode(&prompt)?;
    let budget = GenerationBudget::new(input_ids.len(), request.max_new_tokens);
    debug!(
        prompt_tokens = budget.prompt_tokens(),
        max_length = budget.max_length(),
        "prompt encoded"
    );

    let mut params = model.generator_params()?;
    params.set_search_options(
        budget.max_length(),
        request.temperature.max(0.0),
        request.top_p.clamp(0.0, 1.0),
    )?;

    let mut generator = model.generator(params)?;
    generator.append_tokens(&input_ids)?;
    while !generator.is_done()? {
        generator.generate_next_token()?;
    }

    let output_ids = generator.sequence(0)?;
    let split = budget.prompt_tokens().min(output_ids.len());
    let text = tokenizer.decode(&output_ids[split..])?;
    debug!(generated_tokens = output_ids.len() - split, "decode loop finished");

    Ok(GenerationResponse { text })
}

fn format_prompt<T: Tokenizer>(tokenizer: &T, prompt: &str) -> String {
    let messages = serde_json::json!([{ "role": "user", "content": prompt }]).to_string();
    match tokenizer.apply_chat_template(&messages, true) {
        Some(Ok(formatted)) => formatted,
        Some(Err(err)) => {
            debug!(%err, "chat template failed, falling back to raw prompt");
            prompt.to_string()
        }
        None => prompt.to_string(),
    }
}
