//! One-shot text generation runner for ONNX Runtime GenAI models.
//!
//! Reads a JSON request from stdin, writes the JSON response to stdout and
//! reports any failure as a single diagnostic line on stderr with exit
//! status 1.

use std::io::{self, Write};
use std::process;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onnx_genai_runner::backend::BackendChoice;
use onnx_genai_runner::error::RunnerError;
use onnx_genai_runner::request::{GenerationRequest, GenerationResponse};
use onnx_genai_runner::runtime::oga::OgaRuntime;
use onnx_genai_runner::{generate, locator};

fn main() {
    init_tracing();
    let response = run().unwrap_or_else(|err| fail(&err));
    if let Err(err) = emit(&response) {
        fail(&err);
    }
}

fn run() -> Result<GenerationResponse, RunnerError> {
    let request = GenerationRequest::from_reader(io::stdin().lock())?;
    let location = locator::resolve(&request.model_path, locator::DEFAULT_STRATEGY)?;
    let backend = BackendChoice::from_provider(request.provider.as_deref());
    let runtime =
        OgaRuntime::load().map_err(|err| RunnerError::RuntimeUnavailable(err.to_string()))?;
    generate::run(&runtime, &location, backend.as_ref(), &request)
}

fn emit(response: &GenerationResponse) -> Result<(), RunnerError> {
    // Serialize fully before touching stdout so a failure never leaves a
    // partial object behind.
    let payload = serde_json::to_string(response)
        .map_err(|err| RunnerError::Io(io::Error::other(err)))?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(payload.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn fail(err: &RunnerError) -> ! {
    eprintln!("{err}");
    process::exit(1);
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    // stdout carries the response payload; all logging goes to stderr and
    // stays quiet unless RUST_LOG opts in.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
