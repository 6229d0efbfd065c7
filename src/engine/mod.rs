use std::num::NonZeroU32;
use std::path::PathBuf;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::{send_logs_to_tracing, LogOptions};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::debug;

type LibError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to initialize inference backend")]
    Backend(#[source] LibError),
    #[error("failed to load model from {}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: LibError,
    },
    #[error("failed to create inference context")]
    Context(#[source] LibError),
    #[error("failed to tokenize prompt")]
    Tokenize(#[source] LibError),
    #[error("prompt needs {required} tokens but the context window holds {n_ctx}")]
    PromptTooLong { required: usize, n_ctx: u32 },
    #[error("prompt evaluation failed")]
    PromptEval(#[source] LibError),
    #[error("token generation failed")]
    Generation(#[source] LibError),
}

static BACKEND: OnceCell<LlamaBackend> = OnceCell::new();

/// llama.cpp allows one backend per process; its native log stream is
/// forwarded into `tracing`.
fn backend() -> Result<&'static LlamaBackend, EngineError> {
    BACKEND.get_or_try_init(|| {
        send_logs_to_tracing(LogOptions::default().with_logs_enabled(true));
        LlamaBackend::init().map_err(|e| EngineError::Backend(e.into()))
    })
}

/// Returns the total token count when prompt plus completion cannot fit
/// the context window.
fn context_overflow(n_prompt: usize, max_tokens: usize, n_ctx: u32) -> Option<usize> {
    let required = n_prompt + max_tokens;
    (required > n_ctx as usize).then_some(required)
}

#[derive(Debug, Clone)]
pub struct EngineParams {
    pub model_path: PathBuf,
    pub n_gpu_layers: u32,
    pub n_threads: i32,
    /// Context window size; `None` keeps the model's own.
    pub n_ctx: Option<NonZeroU32>,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_tokens: i32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { max_tokens: 64 }
    }
}

/// A loaded model. Each `begin` call gets a fresh context, so the struct
/// itself stays immutable and reusable across prompts.
pub struct Engine {
    model: LlamaModel,
    n_threads: i32,
    n_ctx: Option<NonZeroU32>,
}

impl Engine {
    pub fn load(params: &EngineParams) -> Result<Self, EngineError> {
        let backend = backend()?;

        let model_params = LlamaModelParams::default().with_n_gpu_layers(params.n_gpu_layers);
        let model = LlamaModel::load_from_file(backend, &params.model_path, &model_params)
            .map_err(|e| EngineError::ModelLoad {
                path: params.model_path.clone(),
                source: e.into(),
            })?;

        Ok(Self {
            model,
            n_threads: params.n_threads,
            n_ctx: params.n_ctx,
        })
    }

    /// Tokenizes the prompt (BOS prepended) and evaluates it in one batch.
    /// Anything that fails here is fatal to the caller; failures while
    /// pulling tokens from the returned [`Generation`] are not.
    pub fn begin<'m>(
        &'m self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<Generation<'m>, EngineError> {
        let backend = backend()?;

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(self.n_ctx)
            .with_n_threads(self.n_threads)
            .with_n_threads_batch(self.n_threads);
        let mut ctx = self
            .model
            .new_context(backend, ctx_params)
            .map_err(|e| EngineError::Context(e.into()))?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| EngineError::Tokenize(e.into()))?;

        let max_tokens = opts.max_tokens.max(0) as usize;
        let n_ctx = ctx.n_ctx();
        if let Some(required) = context_overflow(tokens.len(), max_tokens, n_ctx) {
            return Err(EngineError::PromptTooLong { required, n_ctx });
        }

        debug!(
            n_prompt = tokens.len(),
            max_tokens,
            n_ctx,
            "evaluating prompt"
        );

        // Logits are only needed for the last prompt token.
        let mut batch = LlamaBatch::new(tokens.len().max(1), 1);
        let last_index = tokens.len() as i32 - 1;
        for (i, token) in (0_i32..).zip(tokens.iter().copied()) {
            batch
                .add(token, i, &[0], i == last_index)
                .map_err(|e| EngineError::PromptEval(e.into()))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| EngineError::PromptEval(e.into()))?;

        Ok(Generation {
            model: &self.model,
            ctx,
            batch,
            sampler: LlamaSampler::greedy(),
            // Streaming decoder: a token can end mid-way through a
            // multi-byte UTF-8 sequence.
            decoder: encoding_rs::UTF_8.new_decoder(),
            n_pos: tokens.len() as i32,
            remaining: max_tokens,
            deferred: None,
        })
    }
}

/// Greedy token stream over an evaluated prompt.
pub struct Generation<'m> {
    model: &'m LlamaModel,
    ctx: LlamaContext<'m>,
    batch: LlamaBatch<'m>,
    sampler: LlamaSampler,
    decoder: encoding_rs::Decoder,
    n_pos: i32,
    remaining: usize,
    deferred: Option<EngineError>,
}

impl Generation<'_> {
    /// Samples the next token greedily and returns its decoded text, or
    /// `None` once `max_tokens` is reached or an end-of-generation token
    /// comes up. A failure while evaluating a sampled token is reported on
    /// the call *after* the one that returned the token's text, so the
    /// caller has already received everything that was sampled.
    pub fn next_piece(&mut self) -> Result<Option<String>, EngineError> {
        if let Some(e) = self.deferred.take() {
            self.remaining = 0;
            return Err(e);
        }
        if self.remaining == 0 {
            return Ok(None);
        }

        let token = self.sampler.sample(&self.ctx, self.batch.n_tokens() - 1);
        self.sampler.accept(token);

        if self.model.is_eog_token(token) {
            debug!("end of generation token sampled");
            self.remaining = 0;
            return Ok(None);
        }

        let bytes = self
            .model
            .token_to_bytes(token, Special::Tokenize)
            .map_err(|e| EngineError::Generation(e.into()))?;
        let mut piece = String::with_capacity(bytes.len());
        let _ = self.decoder.decode_to_string(&bytes, &mut piece, false);
        self.remaining -= 1;

        self.batch.clear();
        if let Err(e) = self
            .batch
            .add(token, self.n_pos, &[0], true)
            .map_err(|e| EngineError::Generation(e.into()))
            .and_then(|()| {
                self.ctx
                    .decode(&mut self.batch)
                    .map_err(|e| EngineError::Generation(e.into()))
            })
        {
            self.deferred = Some(e);
        }
        self.n_pos += 1;

        Ok(Some(piece))
    }
}
