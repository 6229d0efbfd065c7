pub mod cmd;
pub mod engine;
pub mod envconfig;
pub mod server;

pub use engine::{Engine, EngineError, EngineParams, GenerateOptions, Generation};
pub use server::Server;

pub type Result<T> = anyhow::Result<T>;
