//! Single bounded inference call

use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use crate::model::{LanguageModel, ModelError, PromptContext, Token};
use crate::prompt::PromptPayload;

/// What a finished call produced. The response is diagnostic only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceOutcome {
    pub response: String,
    pub pieces: usize,
    pub elapsed: Duration,
}

/// Run `payload` through `model` once, collecting generated pieces.
///
/// Prompt batches are always allowed to continue; generation ends when the
/// model finishes or `ctx.n_predict` is exhausted.
#[instrument(skip(model, payload), fields(prompt_len = payload.len(), n_predict = ctx.n_predict))]
pub fn run_prompt(
    model: &mut dyn LanguageModel,
    payload: &PromptPayload,
    ctx: &PromptContext,
) -> Result<InferenceOutcome, ModelError> {
    if !model.is_model_loaded() {
        return Err(ModelError::NotLoaded);
    }

    let start = Instant::now();
    let mut response = String::new();
    let mut pieces = 0usize;

    let mut on_prompt = |_tokens: &[Token], _cached: bool| true;
    let mut on_response = |_token: Token, piece: &str| {
        response.push_str(piece);
        pieces += 1;
        true
    };

    model.prompt(payload.as_str(), &mut on_prompt, &mut on_response, ctx)?;

    let outcome = InferenceOutcome {
        response,
        pieces,
        elapsed: start.elapsed(),
    };
    debug!(
        "Model response ({} pieces in {:?}): {:?}",
        outcome.pieces, outcome.elapsed, outcome.response
    );
    Ok(outcome)
}
