use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;

use llm_harness::cmd::{self, RunArgs};
use llm_harness::envconfig;

#[derive(Parser)]
#[command(name = "model_load_test")]
#[command(version)]
#[command(about = "Load a GGUF model and greedily generate tokens from a prompt", long_about = None)]
struct Cli {
    /// Path to the model weights (gguf)
    model: PathBuf,
    /// Number of layers to offload to the GPU
    n_gpu_layers: u32,
    /// Prompt to tokenize and complete
    prompt: String,
    /// Maximum number of tokens to generate
    #[arg(long, default_value_t = 64)]
    max_tokens: i32,
    /// Inference thread count (defaults to LLM_HARNESS_THREADS or 8)
    #[arg(long)]
    threads: Option<i32>,
    /// Context window size (defaults to the model's own)
    #[arg(long)]
    ctx_size: Option<NonZeroU32>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Argument errors exit 1, not clap's default 2.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    let args = RunArgs {
        model: cli.model,
        n_gpu_layers: cli.n_gpu_layers,
        prompt: cli.prompt,
        max_tokens: cli.max_tokens,
        threads: cli.threads.unwrap_or_else(envconfig::n_threads),
        ctx_size: cli.ctx_size,
    };

    if let Err(e) = cmd::run_model_load_test(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_arguments() {
        let cli = Cli::try_parse_from(["model_load_test", "model.gguf", "32", "hello world"])
            .expect("three positional arguments should parse");
        assert_eq!(cli.model, PathBuf::from("model.gguf"));
        assert_eq!(cli.n_gpu_layers, 32);
        assert_eq!(cli.prompt, "hello world");
        assert_eq!(cli.max_tokens, 64);
    }

    #[test]
    fn rejects_missing_arguments() {
        assert!(Cli::try_parse_from(["model_load_test", "model.gguf"]).is_err());
    }
}
