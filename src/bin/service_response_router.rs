use std::process;

use llm_harness::cmd;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = cmd::run_response_router().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
