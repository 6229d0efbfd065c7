use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use crate::Result;

pub const RESPONSE_BODY: &str = "Hello from response router";
pub const DEFAULT_PORT: u16 = 9001;

pub struct Server {
    host: String,
    port: u16,
    router: Router,
}

impl Server {
    pub fn new() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            router: create_router(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);

        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                eprintln!("Failed to listen on port {}", self.port);
                return Err(e).with_context(|| format!("failed to bind {addr}"));
            }
        };

        println!("Server is listening on port {}", self.port);
        tracing::info!("serving on {}", addr);

        axum::serve(listener, self.router).await?;

        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Every method and path gets the same fixed body.
pub fn create_router() -> Router {
    Router::new().fallback(respond)
}

async fn respond() -> &'static str {
    RESPONSE_BODY
}
