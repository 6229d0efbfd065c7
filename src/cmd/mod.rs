use std::io::{self, Write};
use std::num::NonZeroU32;
use std::path::PathBuf;

use crate::engine::{Engine, EngineError, EngineParams, GenerateOptions};
use crate::envconfig;
use crate::server::Server;
use crate::Result;

pub struct RunArgs {
    pub model: PathBuf,
    pub n_gpu_layers: u32,
    pub prompt: String,
    pub max_tokens: i32,
    pub threads: i32,
    pub ctx_size: Option<NonZeroU32>,
}

pub fn run_model_load_test(args: RunArgs) -> Result<()> {
    let engine = Engine::load(&EngineParams {
        model_path: args.model,
        n_gpu_layers: args.n_gpu_layers,
        n_threads: args.threads,
        n_ctx: args.ctx_size,
    })?;

    // Context creation and prompt evaluation happen here; nothing is
    // echoed to stdout until both have succeeded.
    let mut generation = engine.begin(
        &args.prompt,
        &GenerateOptions {
            max_tokens: args.max_tokens,
        },
    )?;

    println!("Prompt: {}", args.prompt);
    print!("Response: ");
    io::stdout().flush()?;

    let mut tokens = 0usize;
    let outcome = loop {
        match generation.next_piece() {
            Ok(Some(piece)) => {
                print!("{piece}");
                let _ = io::stdout().flush();
                tokens += 1;
            }
            Ok(None) => break Ok(()),
            // A failure while evaluating an already-sampled token leaves
            // the partial response on stdout and does not fail the
            // process.
            Err(EngineError::Generation(e)) => {
                eprintln!("Generation failed: {e}");
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    println!();

    match outcome {
        Ok(()) => {
            tracing::debug!(tokens, "generation finished");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn run_response_router() -> Result<()> {
    let host = envconfig::Host::from_env();
    Server::new().host(host.host).port(host.port).run().await
}
